//! 描述符来源与行格式解析。
//!
//! # 行格式（What）
//! - 每个扩展点对应一份以扩展点名称命名的资源，逐行书写 `名称[,名称...]=实现标识`；
//! - `#` 之后的内容是注释，空行忽略；名称只允许 `[A-Za-z0-9_.-]`；
//! - 缺少 `=`、名称为空、实现标识为空都会让整个扩展点加载失败。

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use super::ExtensionPoint;
use crate::error::{ExtensionError, ExtensionResult};

/// 描述符来源：为给定扩展点返回一份文本资源。
///
/// 返回 `Ok(None)` 表示该来源没有此扩展点的条目；读取失败必须以 [`ExtensionError::Load`] 表达。
pub trait DescriptorSource: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn read(&self, point: &str) -> ExtensionResult<Option<String>>;
}

/// 以代码方式声明的描述符来源。
#[derive(Clone, Debug, Default)]
pub struct InlineSource {
    name: String,
    texts: HashMap<String, String>,
}

impl InlineSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            texts: HashMap::new(),
        }
    }

    /// 追加一段原始资源文本。
    pub fn with_text(mut self, point: impl Into<String>, text: &str) -> Self {
        let entry = self.texts.entry(point.into()).or_default();
        entry.push_str(text);
        if !text.ends_with('\n') {
            entry.push('\n');
        }
        self
    }

    /// 为扩展点 `T` 绑定 `name=identifier`。
    pub fn define<T: ?Sized + ExtensionPoint>(self, name: &str, identifier: &str) -> Self {
        self.with_text(T::NAME, &format!("{name}={identifier}"))
    }
}

impl DescriptorSource for InlineSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, point: &str) -> ExtensionResult<Option<String>> {
        Ok(self.texts.get(point).cloned())
    }
}

/// 从目录读取 `<root>/<扩展点名称>` 文件的描述符来源。
#[derive(Clone, Debug)]
pub struct DirectorySource {
    name: String,
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            name: root.display().to_string(),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DescriptorSource for DirectorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, point: &str) -> ExtensionResult<Option<String>> {
        let path = self.root.join(point);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ExtensionError::load(
                point,
                format!("failed to read `{}`: {err}", path.display()),
            )),
        }
    }
}

/// 解析后的一行描述符。
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct DescriptorLine {
    pub(crate) names: Vec<String>,
    pub(crate) identifier: String,
    pub(crate) line: usize,
}

pub(crate) fn parse(point: &str, source: &str, text: &str) -> ExtensionResult<Vec<DescriptorLine>> {
    let mut lines = Vec::new();
    for (number, raw) in text.lines().enumerate() {
        let line = number + 1;
        let content = raw.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }

        let malformed = |detail: String| {
            ExtensionError::load(point, format!("{source}:{line}: {detail} in `{content}`"))
        };

        let (names, identifier) = content
            .split_once('=')
            .ok_or_else(|| malformed("missing `=`".to_owned()))?;
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(malformed("empty implementation identifier".to_owned()));
        }

        let names = names
            .split(',')
            .map(str::trim)
            .map(|name| {
                if name.is_empty() {
                    Err(malformed("empty extension name".to_owned()))
                } else if !is_valid_name(name) {
                    Err(malformed(format!("invalid extension name `{name}`")))
                } else {
                    Ok(name.to_owned())
                }
            })
            .collect::<ExtensionResult<Vec<_>>>()?;

        lines.push(DescriptorLine {
            names,
            identifier: identifier.to_owned(),
            line,
        });
    }
    Ok(lines)
}

fn is_valid_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

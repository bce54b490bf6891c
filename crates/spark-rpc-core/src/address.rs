//! `CallAddress`：不可变的调用地址与参数包。
//!
//! 地址在构造后不再改变；`with_parameter` 等派生方法返回新实例，原实例保持原样，
//! 因此同一地址可以被多个 Invoker、扩展与并发调用共享只读引用。

use std::{fmt, sync::Arc};

use thiserror::Error;

/// 解析地址字符串失败。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("call address `{input}` is missing the `scheme://` prefix")]
    MissingScheme { input: String },
    #[error("call address `{input}` has an invalid port `{port}`")]
    InvalidPort { input: String, port: String },
    #[error("call address `{input}` has an empty parameter key")]
    EmptyParameterKey { input: String },
}

/// 标识一个调用目标并携带配置参数的不可变地址。
///
/// # 契约说明（What）
/// - 身份由 `(scheme, host, port, path, parameters)` 决定，`PartialEq`/`Hash` 均基于这五项，参数顺序计入身份；
/// - 参数保持出现顺序，同一键可以出现多次；`Display` 按原顺序输出，与 [`CallAddress::parse`] 可互相还原；
/// - 单值读取（[`parameter`](Self::parameter) 及其派生方法）取该键第一次出现的值；
/// - 多值既可以逗号分隔写在一个键下，也可以重复该键，[`parameter_values`](Self::parameter_values)
///   按出现顺序合并两种写法。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallAddress {
    scheme: Arc<str>,
    host: Arc<str>,
    port: u16,
    path: Arc<str>,
    parameters: Arc<[(String, String)]>,
}

impl CallAddress {
    /// 以协议、主机、端口与路径构造不带参数的地址。
    pub fn new(scheme: &str, host: &str, port: u16, path: &str) -> Self {
        Self {
            scheme: Arc::from(scheme),
            host: Arc::from(host),
            port,
            path: Arc::from(path.trim_start_matches('/')),
            parameters: Arc::from(Vec::new()),
        }
    }

    /// 解析 `scheme://host:port/path?k=v&k2=v2` 形式的字符串。
    ///
    /// - 端口缺省为 `0`，路径缺省为空；
    /// - 无 `=` 的参数视为值为空字符串；
    /// - 同一键重复出现时全部保留，顺序不变。
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let (scheme, rest) = input
            .split_once("://")
            .ok_or_else(|| AddressError::MissingScheme {
                input: input.to_owned(),
            })?;
        if scheme.is_empty() {
            return Err(AddressError::MissingScheme {
                input: input.to_owned(),
            });
        }

        let (location, query) = match rest.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (rest, None),
        };
        let (authority, path) = match location.split_once('/') {
            Some((authority, path)) => (authority, path),
            None => (location, ""),
        };
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| AddressError::InvalidPort {
                    input: input.to_owned(),
                    port: port.to_owned(),
                })?;
                (host, port)
            }
            None => (authority, 0),
        };

        let mut parameters = Vec::new();
        if let Some(query) = query {
            for pair in query.split('&').filter(|pair| !pair.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                if key.is_empty() {
                    return Err(AddressError::EmptyParameterKey {
                        input: input.to_owned(),
                    });
                }
                parameters.push((key.to_owned(), value.to_owned()));
            }
        }

        Ok(Self {
            scheme: Arc::from(scheme),
            host: Arc::from(host),
            port,
            path: Arc::from(path),
            parameters: Arc::from(parameters),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// 全部参数的只读视图，按出现顺序排列，重复键各占一项。
    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }

    /// 读取参数原值；键重复时取第一次出现的值。
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// 读取参数，缺失或为空时返回 `default`。
    pub fn parameter_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.parameter(key) {
            Some(value) if !value.is_empty() => value,
            _ => default,
        }
    }

    /// 以布尔语义读取参数；只有 `true`（忽略大小写）视为真，缺失时返回 `default`。
    pub fn bool_parameter(&self, key: &str, default: bool) -> bool {
        match self.parameter(key) {
            Some(value) if !value.is_empty() => value.eq_ignore_ascii_case("true"),
            _ => default,
        }
    }

    /// 合并该键的全部出现并拆分逗号分隔的值，按出现顺序返回，忽略空白项。
    pub fn parameter_values(&self, key: &str) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|(name, _)| name == key)
            .flat_map(|(_, value)| value.split(','))
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .collect()
    }

    /// 方法级参数：优先读取 `method.key`，缺失时回退到 `key`。
    pub fn method_parameter(&self, method: &str, key: &str) -> Option<&str> {
        let scoped = format!("{method}.{key}");
        match self.parameter(&scoped) {
            Some(value) if !value.is_empty() => Some(value),
            _ => self.parameter(key).filter(|value| !value.is_empty()),
        }
    }

    pub fn has_parameter(&self, key: &str) -> bool {
        self.parameter(key).is_some_and(|value| !value.is_empty())
    }

    /// 返回把 `key` 设为唯一值后的新地址：已有的键在第一次出现处改写并去掉其余重复项，否则追加到末尾。
    pub fn with_parameter(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let mut value = Some(value.into());
        let mut parameters = Vec::with_capacity(self.parameters.len() + 1);
        for (name, existing) in self.parameters.iter() {
            if *name != key {
                parameters.push((name.clone(), existing.clone()));
            } else if let Some(value) = value.take() {
                parameters.push((key.clone(), value));
            }
        }
        if let Some(value) = value {
            parameters.push((key, value));
        }
        self.with_parameters(parameters)
    }

    /// 返回在末尾追加一次 `key` 出现后的新地址，已有的同名参数保持不变。
    pub fn add_parameter(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut parameters = self.parameters.to_vec();
        parameters.push((key.into(), value.into()));
        self.with_parameters(parameters)
    }

    /// 返回移除 `key` 全部出现后的新地址。
    pub fn without_parameter(&self, key: &str) -> Self {
        let parameters = self
            .parameters
            .iter()
            .filter(|(name, _)| name != key)
            .cloned()
            .collect();
        self.with_parameters(parameters)
    }

    fn with_parameters(&self, parameters: Vec<(String, String)>) -> Self {
        Self {
            parameters: Arc::from(parameters),
            ..self.clone()
        }
    }
}

impl fmt::Display for CallAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        if self.port != 0 {
            write!(f, ":{}", self.port)?;
        }
        if !self.path.is_empty() {
            write!(f, "/{}", self.path)?;
        }
        let mut separator = '?';
        for (key, value) in self.parameters.iter() {
            write!(f, "{separator}{key}={value}")?;
            separator = '&';
        }
        Ok(())
    }
}

impl std::str::FromStr for CallAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

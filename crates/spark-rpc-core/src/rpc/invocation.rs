use std::{collections::BTreeMap, fmt, sync::Arc};

use serde_json::Value;

use super::Invoker;

/// 一次逻辑调用。
///
/// # 契约说明（What）
/// - 方法名与参数类型在构造后不可变；
/// - 附件只服务于当前这一次调用，下一次调用应通过 [`renew`](Self::renew) 得到不带附件的新实例，
///   附件从不隐式跨调用携带；
/// - [`invoker`](Self::invoker) 始终指向正在执行本次调用的 Invoker，由过滤链在进入每一层时重新绑定；
///   这是一条回指引用，不表达所有权；
/// - 不实现 `Clone`：调用对象属于单次调用，不在并发调用之间共享。
pub struct Invocation {
    method_name: String,
    parameter_types: Vec<String>,
    arguments: Vec<Value>,
    attachments: BTreeMap<String, String>,
    invoker: Option<Arc<dyn Invoker>>,
}

impl Invocation {
    pub fn new(
        method_name: impl Into<String>,
        parameter_types: Vec<String>,
        arguments: Vec<Value>,
    ) -> Self {
        Self {
            method_name: method_name.into(),
            parameter_types,
            arguments,
            attachments: BTreeMap::new(),
            invoker: None,
        }
    }

    /// 构造时附带一个附件。
    pub fn with_attachment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attachments.insert(key.into(), value.into());
        self
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn argument(&self, index: usize) -> Option<&Value> {
        self.arguments.get(index)
    }

    pub fn attachments(&self) -> &BTreeMap<String, String> {
        &self.attachments
    }

    pub fn attachment(&self, key: &str) -> Option<&str> {
        self.attachments.get(key).map(String::as_str)
    }

    pub fn attachment_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.attachment(key).unwrap_or(default)
    }

    /// 写入附件，返回旧值。
    pub fn set_attachment(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        self.attachments.insert(key.into(), value.into())
    }

    /// 仅在键不存在时写入。
    pub fn set_attachment_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attachments.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn remove_attachment(&mut self, key: &str) -> Option<String> {
        self.attachments.remove(key)
    }

    pub fn clear_attachments(&mut self) {
        self.attachments.clear();
    }

    /// 当前正在执行本次调用的 Invoker。
    pub fn invoker(&self) -> Option<&Arc<dyn Invoker>> {
        self.invoker.as_ref()
    }

    /// 绑定执行者；过滤链在进入每一层前调用。
    pub fn bind_invoker(&mut self, invoker: Arc<dyn Invoker>) {
        self.invoker = Some(invoker);
    }

    /// 以相同的方法、参数类型与参数构造下一次调用；附件与执行者不会被带入。
    pub fn renew(&self) -> Self {
        Self::new(
            self.method_name.clone(),
            self.parameter_types.clone(),
            self.arguments.clone(),
        )
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("method_name", &self.method_name)
            .field("parameter_types", &self.parameter_types)
            .field("arguments", &self.arguments)
            .field("attachments", &self.attachments)
            .field(
                "invoker",
                &self.invoker.as_ref().map(|invoker| invoker.interface().name()),
            )
            .finish()
    }
}

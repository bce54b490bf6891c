use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RpcError, RpcOutcome};

/// 可序列化的远端异常描述。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteException {
    type_name: String,
    message: String,
}

impl RemoteException {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// 由调用期错误生成，类型名取错误码。
    pub fn from_error(error: &RpcError) -> Self {
        Self::new(error.code(), error.message())
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// 调用结果：返回值或异常值，二者至多其一，另带结果附件。
///
/// 携带异常的结果不是错误：它已被某个过滤器显式降级为值，调用方需要时通过
/// [`recreate`](Self::recreate) 还原为 [`RpcError`]。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcResult {
    value: Option<Value>,
    exception: Option<RemoteException>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attachments: BTreeMap<String, String>,
}

impl RpcResult {
    pub fn value(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    /// 无返回值。
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_exception(exception: RemoteException) -> Self {
        Self {
            exception: Some(exception),
            ..Self::default()
        }
    }

    pub fn get_value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn exception(&self) -> Option<&RemoteException> {
        self.exception.as_ref()
    }

    pub fn has_exception(&self) -> bool {
        self.exception.is_some()
    }

    pub fn attachments(&self) -> &BTreeMap<String, String> {
        &self.attachments
    }

    pub fn attachment(&self, key: &str) -> Option<&str> {
        self.attachments.get(key).map(String::as_str)
    }

    pub fn set_attachment(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attachments.insert(key.into(), value.into());
    }

    /// 还原调用语义：异常值转换为业务失败，否则返回值本身。
    pub fn recreate(self) -> RpcOutcome<Option<Value>> {
        match self.exception {
            Some(exception) => Err(RpcError::business(format!(
                "{}: {}",
                exception.type_name, exception.message
            ))),
            None => Ok(self.value),
        }
    }
}

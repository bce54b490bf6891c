//! 错误域：扩展点装配错误（[`ExtensionError`]）与调用期错误（[`RpcError`]）。
//!
//! # 分层约定（What）
//! - 装配期（加载描述符、实例化、注入、自适应派发）统一返回 [`ExtensionError`]，以带标签的枚举
//!   表达错误种类，调用方可直接模式匹配，不依赖字符串解析；
//! - 调用期（过滤链、终端 Invoker）统一返回 [`RpcError`]，它沿用“稳定错误码 + 消息 + 底层原因”
//!   的结构，装配期错误可经 `From` 上浮为调用期错误并保留在 `source()` 链上；
//! - 注入缺失不是错误：提供者未返回对象时属性保持未设置。

use std::{borrow::Cow, error::Error as StdError, fmt};

use thiserror::Error;

/// 框架内置的稳定错误码，遵循 `<领域>.<语义>` 命名。
pub mod codes {
    /// 描述符格式错误、冲突或循环引用。
    pub const EXTENSION_LOAD: &str = "extension.load";
    /// 指定名称的扩展不存在。
    pub const EXTENSION_NOT_FOUND: &str = "extension.not_found";
    /// 组合提供者查找命中多个候选且无名称消歧。
    pub const EXTENSION_AMBIGUOUS_PROVIDER: &str = "extension.ambiguous_provider";
    /// 自适应派发在调用时无法解析出具体实现。
    pub const EXTENSION_NO_MATCHING: &str = "extension.no_matching";
    /// 扩展点既没有自适应实现类，也没有提供派发器。
    pub const EXTENSION_ADAPTIVE_UNAVAILABLE: &str = "extension.adaptive_unavailable";
    /// 扩展点未在作用域中注册。
    pub const EXTENSION_UNKNOWN_POINT: &str = "extension.unknown_point";
    /// 作用域已销毁。
    pub const EXTENSION_SCOPE_DESTROYED: &str = "extension.scope_destroyed";

    /// 未分类的调用失败。
    pub const RPC_UNKNOWN: &str = "rpc.unknown";
    /// 网络层失败。
    pub const RPC_NETWORK: &str = "rpc.network";
    /// 调用超时。
    pub const RPC_TIMEOUT: &str = "rpc.timeout";
    /// 业务逻辑抛出的失败。
    pub const RPC_BUSINESS: &str = "rpc.business";
    /// 调用被拒绝（鉴权、限流等）。
    pub const RPC_FORBIDDEN: &str = "rpc.forbidden";
    /// 参数或结果无法序列化。
    pub const RPC_SERIALIZATION: &str = "rpc.serialization";
    /// Invoker 已销毁后仍被调用。
    pub const RPC_INVOKER_DESTROYED: &str = "rpc.invoker_destroyed";
}

/// 扩展点装配期错误。
///
/// # 契约说明（What）
/// - 所有变体只携带字符串上下文，因此可 `Clone`：加载结果会被缓存，并在之后的每次访问时原样返回；
/// - [`code`](Self::code) 给出稳定错误码，用于日志聚合与 [`RpcError`] 映射。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExtensionError {
    /// 描述符格式错误、跨源冲突、循环包装或自引用。加载失败对整个扩展点生效。
    #[error("failed to load extension point `{point}`: {detail}")]
    Load { point: String, detail: String },

    /// 指定名称未注册，且没有可回退的默认实现。
    #[error("no extension named `{name}` for extension point `{point}`")]
    NotFound { point: String, name: String },

    /// 某个提供者对 `type_name` 返回多个候选，且 `name` 无法消歧。
    #[error(
        "provider `{provider}` found {candidates} candidates of `{type_name}` (name: {name:?}); lookup aborted"
    )]
    AmbiguousProvider {
        type_name: String,
        name: Option<String>,
        provider: String,
        candidates: usize,
    },

    /// 自适应派发在调用时既没有从地址参数、也没有从默认值解析出可用实现。
    #[error(
        "adaptive dispatch for `{point}` resolved no extension (keys: {keys:?}, method: {method:?})"
    )]
    NoMatchingExtension {
        point: String,
        keys: Vec<String>,
        method: Option<String>,
    },

    /// 扩展点没有可用的自适应实现。
    #[error("extension point `{point}` has no adaptive implementation")]
    AdaptiveUnavailable { point: String },

    /// 请求的扩展点类型未在作用域中注册。
    #[error("extension point `{point}` is not registered in this scope")]
    UnknownPoint { point: String },

    /// 作用域已被显式销毁。
    #[error("extension scope has been destroyed")]
    ScopeDestroyed,
}

impl ExtensionError {
    /// 构造加载错误的便捷入口。
    pub fn load(point: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Load {
            point: point.into(),
            detail: detail.into(),
        }
    }

    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Load { .. } => codes::EXTENSION_LOAD,
            Self::NotFound { .. } => codes::EXTENSION_NOT_FOUND,
            Self::AmbiguousProvider { .. } => codes::EXTENSION_AMBIGUOUS_PROVIDER,
            Self::NoMatchingExtension { .. } => codes::EXTENSION_NO_MATCHING,
            Self::AdaptiveUnavailable { .. } => codes::EXTENSION_ADAPTIVE_UNAVAILABLE,
            Self::UnknownPoint { .. } => codes::EXTENSION_UNKNOWN_POINT,
            Self::ScopeDestroyed => codes::EXTENSION_SCOPE_DESTROYED,
        }
    }
}

/// 调用失败的粗粒度分类，驱动过滤器的处置策略（例如只把业务失败转换为结果值）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RpcErrorKind {
    Unknown,
    Network,
    Timeout,
    Business,
    Forbidden,
    Serialization,
    /// 自适应派发或扩展解析在调用路径上失败。
    Extension,
}

impl RpcErrorKind {
    fn default_code(self) -> &'static str {
        match self {
            Self::Unknown => codes::RPC_UNKNOWN,
            Self::Network => codes::RPC_NETWORK,
            Self::Timeout => codes::RPC_TIMEOUT,
            Self::Business => codes::RPC_BUSINESS,
            Self::Forbidden => codes::RPC_FORBIDDEN,
            Self::Serialization => codes::RPC_SERIALIZATION,
            Self::Extension => codes::EXTENSION_NO_MATCHING,
        }
    }
}

/// 底层原因，保持 `Send + Sync` 以便跨线程传递。
pub type ErrorCause = Box<dyn StdError + Send + Sync + 'static>;

/// 调用期错误：沿过滤链向调用方传播，除非某个过滤器显式把它转换为携带异常值的结果。
///
/// # 设计背景（Why）
/// - 与核心错误同构：稳定错误码 `code` 承载机读语义，`message` 面向排障人员，`cause` 串联底层错误；
/// - 额外的 [`RpcErrorKind`] 让过滤器无需解析错误码即可区分业务失败与框架失败。
///
/// # 契约说明（What）
/// - 构造后不可变，仅可通过 `with_*` 叠加上下文；
/// - `Send + Sync + 'static`，可跨异步任务移动。
#[derive(Debug)]
pub struct RpcError {
    kind: RpcErrorKind,
    code: &'static str,
    message: Cow<'static, str>,
    cause: Option<ErrorCause>,
}

impl RpcError {
    /// 使用分类、稳定错误码与消息构造错误。
    pub fn new(
        kind: RpcErrorKind,
        code: &'static str,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// 以分类的默认错误码构造。
    pub fn of_kind(kind: RpcErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(kind, kind.default_code(), message)
    }

    /// 业务失败。
    pub fn business(message: impl Into<Cow<'static, str>>) -> Self {
        Self::of_kind(RpcErrorKind::Business, message)
    }

    /// 调用被拒绝。
    pub fn forbidden(message: impl Into<Cow<'static, str>>) -> Self {
        Self::of_kind(RpcErrorKind::Forbidden, message)
    }

    /// 附带底层原因。
    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn kind(&self) -> RpcErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&ErrorCause> {
        self.cause.as_ref()
    }

    /// 是否为业务失败。
    pub fn is_business(&self) -> bool {
        self.kind == RpcErrorKind::Business
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl StdError for RpcError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_ref()
            .map(|boxed| boxed.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<ExtensionError> for RpcError {
    /// 扩展解析失败在调用路径上表现为 `Extension` 分类，错误码沿用装配期错误码。
    fn from(value: ExtensionError) -> Self {
        RpcError::new(RpcErrorKind::Extension, value.code(), value.to_string()).with_cause(value)
    }
}

/// 装配期结果别名。
pub type ExtensionResult<T> = Result<T, ExtensionError>;

/// 调用期结果别名。
pub type RpcOutcome<T> = Result<T, RpcError>;

const _: fn() = || {
    fn assert_error_traits<T: StdError + Send + Sync + 'static>() {}

    assert_error_traits::<ExtensionError>();
    assert_error_traits::<RpcError>();
};

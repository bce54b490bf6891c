//! 调用契约：`Invocation`、`RpcResult`、`Invoker`，以及围绕它们的过滤链与生命周期通知。
//!
//! # 调用流程（How）
//! 终端 Invoker 绑定地址 → [`FilterChainBuilder`] 按角色选出过滤器并嵌套 → [`InvokerLifecycleNotifier`]
//! 触发 `referred` → 每次调用自外向内穿过过滤器到达终端，再逐层返回 → 下线时触发 `destroyed`。

mod chain;
mod filter;
mod invocation;
mod invoker;
mod listener;
mod result;

pub use chain::{FilterChain, FilterChainBuilder};
pub use filter::{Filter, Next};
pub use invocation::Invocation;
pub use invoker::{FnInvoker, Invoker, ServiceInterface};
pub use listener::{InvokerLifecycleNotifier, InvokerListener, LifecycleState, ListenedInvoker};
pub use result::{RemoteException, RpcResult};

/// 核心使用的地址参数键。
pub mod keys {
    /// 消费端显式过滤器名单。
    pub const REFERENCE_FILTER: &str = "reference.filter";
    /// 提供端显式过滤器名单。
    pub const SERVICE_FILTER: &str = "service.filter";
    /// 显式 Invoker 监听器名单。
    pub const INVOKER_LISTENER: &str = "invoker.listener";
    /// 标记服务已废弃。
    pub const DEPRECATED: &str = "deprecated";
    /// 开启访问日志。
    pub const ACCESS_LOG: &str = "accesslog";
    /// 回声探测方法名。
    pub const ECHO_METHOD: &str = "$echo";
}

/// 调用方所处的一侧，决定过滤器分组与显式名单参数键。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Consumer,
    Provider,
}

impl Role {
    /// 激活元数据中使用的分组名。
    pub fn group(self) -> &'static str {
        match self {
            Self::Consumer => "consumer",
            Self::Provider => "provider",
        }
    }

    /// 该侧读取显式过滤器名单的参数键。
    pub fn filter_key(self) -> &'static str {
        match self {
            Self::Consumer => keys::REFERENCE_FILTER,
            Self::Provider => keys::SERVICE_FILTER,
        }
    }
}

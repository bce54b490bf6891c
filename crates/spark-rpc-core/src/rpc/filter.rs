use std::{fmt, sync::Arc};

use async_trait::async_trait;

use super::{Invocation, Invoker, RpcResult, ServiceInterface};
use crate::{address::CallAddress, error::RpcOutcome, extension::ExtensionPoint};

/// 调用过滤器：包裹下一个 Invoker，在调用前后观察或修改调用。
///
/// # 契约说明（What）
/// - 可以在委托前读写调用附件；
/// - 要么通过 `next.invoke(invocation).await` 委托恰好一次并返回（可能经过处理的）结果，
///   要么不委托而直接构造结果或错误（短路）；[`Next`] 按值消费且不暴露下一层 Invoker，
///   经由它的第二次委托无法通过编译；
/// - 委托返回后 `invocation.invoker()` 仍指向内层执行者，借它再次调用属于违约，只能由终端计数发现；
/// - 返回 `Err` 时错误沿链向调用方传播，除非某个过滤器显式把它转换为携带异常值的结果；
/// - 同一实例并发服务多次调用，实现必须无状态或内部线程安全。
#[async_trait]
pub trait Filter: Send + Sync + 'static {
    async fn invoke(&self, next: Next, invocation: &mut Invocation) -> RpcOutcome<RpcResult>;
}

impl ExtensionPoint for dyn Filter {
    const NAME: &'static str = "filter";
}

/// 过滤器通往下一层的一次性句柄。
///
/// 只提供下一层的接口与地址；委托唯一的入口是消费自身的 [`invoke`](Self::invoke)。
pub struct Next {
    invoker: Arc<dyn Invoker>,
}

impl Next {
    pub fn new(invoker: Arc<dyn Invoker>) -> Self {
        Self { invoker }
    }

    /// 下一层服务的接口。
    pub fn interface(&self) -> &ServiceInterface {
        self.invoker.interface()
    }

    /// 下一层绑定的地址。
    pub fn address(&self) -> &CallAddress {
        self.invoker.address()
    }

    /// 委托下一层执行；进入前把调用的执行者重新绑定为下一层。
    pub async fn invoke(self, invocation: &mut Invocation) -> RpcOutcome<RpcResult> {
        invocation.bind_invoker(Arc::clone(&self.invoker));
        self.invoker.invoke(invocation).await
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("interface", self.invoker.interface())
            .finish()
    }
}

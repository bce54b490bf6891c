use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;

use super::{Invocation, RpcResult};
use crate::{
    address::CallAddress,
    error::{RpcError, RpcErrorKind, RpcOutcome, codes},
};

/// 服务接口标识。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceInterface(Arc<str>);

impl ServiceInterface {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 可执行调用的对象，绑定一个接口与一个地址。
///
/// # 契约说明（What）
/// - `interface`/`address` 在构造后不变；
/// - `is_available`/`destroy` 可以并发调用，实现需自行保证线程安全；
/// - `invoke` 返回 `Err` 表示调用失败并沿链向上传播；携带异常值的 `Ok` 表示失败已被降级为结果；
/// - 异步契约由终端 Invoker 决定，装饰层只做 `.await` 转发，不把异步执行变为阻塞。
#[async_trait]
pub trait Invoker: Send + Sync + 'static {
    fn interface(&self) -> &ServiceInterface;

    fn address(&self) -> &CallAddress;

    fn is_available(&self) -> bool;

    fn destroy(&self);

    async fn invoke(&self, invocation: &mut Invocation) -> RpcOutcome<RpcResult>;
}

type Handler = dyn Fn(&Invocation) -> RpcOutcome<RpcResult> + Send + Sync;

/// 以闭包执行调用的终端 Invoker。
///
/// 销毁后 `is_available` 返回 `false`，继续调用得到 `rpc.invoker_destroyed` 错误。
pub struct FnInvoker {
    interface: ServiceInterface,
    address: CallAddress,
    available: AtomicBool,
    handler: Box<Handler>,
}

impl FnInvoker {
    pub fn new<F>(interface: ServiceInterface, address: CallAddress, handler: F) -> Self
    where
        F: Fn(&Invocation) -> RpcOutcome<RpcResult> + Send + Sync + 'static,
    {
        Self {
            interface,
            address,
            available: AtomicBool::new(true),
            handler: Box::new(handler),
        }
    }
}

impl fmt::Debug for FnInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnInvoker")
            .field("interface", &self.interface)
            .field("address", &self.address.to_string())
            .field("available", &self.is_available())
            .finish()
    }
}

#[async_trait]
impl Invoker for FnInvoker {
    fn interface(&self) -> &ServiceInterface {
        &self.interface
    }

    fn address(&self) -> &CallAddress {
        &self.address
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    fn destroy(&self) {
        self.available.store(false, Ordering::Release);
    }

    async fn invoke(&self, invocation: &mut Invocation) -> RpcOutcome<RpcResult> {
        if !self.is_available() {
            return Err(RpcError::new(
                RpcErrorKind::Unknown,
                codes::RPC_INVOKER_DESTROYED,
                format!(
                    "invoker for `{}` at {} has been destroyed",
                    self.interface, self.address
                ),
            ));
        }
        (self.handler)(invocation)
    }
}

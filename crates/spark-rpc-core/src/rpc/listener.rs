use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Invocation, Invoker, Next, RpcResult, ServiceInterface, keys};
use crate::{
    address::CallAddress,
    error::{ExtensionResult, RpcOutcome},
    extension::{Activated, ActivationQuery, ExtensionPoint, ExtensionScope},
};

const TARGET: &str = "spark.rpc.listener";

/// Invoker 生命周期监听器。
///
/// 两个回调都有空实现，监听器只需覆写关心的那一个。回调返回的错误只会被记录，
/// 不影响其他监听器，也不阻止生命周期转换。
pub trait InvokerListener: Send + Sync + 'static {
    fn referred(&self, invoker: &dyn Invoker) -> RpcOutcome<()> {
        let _ = invoker;
        Ok(())
    }

    fn destroyed(&self, invoker: &dyn Invoker) -> RpcOutcome<()> {
        let _ = invoker;
        Ok(())
    }
}

impl ExtensionPoint for dyn InvokerListener {
    const NAME: &'static str = "invoker.listener";
}

/// Invoker 的生命周期状态；`Destroyed` 为终态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Referenced,
    Destroyed,
}

const CREATED: u8 = 0;
const REFERENCED: u8 = 1;
const DESTROYED: u8 = 2;

/// 附带监听器的 Invoker。
///
/// # 契约说明（What）
/// - 监听器集合在引用时确定，销毁时通知同一组监听器；
/// - 状态转换通过原子操作完成，`referred` 与 `destroyed` 对每个实例各最多触发一次，
///   重复销毁是空操作；
/// - 调用直接委托被包装的 Invoker；销毁后 `is_available` 返回 `false`。
pub struct ListenedInvoker {
    inner: Arc<dyn Invoker>,
    listeners: Vec<Activated<dyn InvokerListener>>,
    state: AtomicU8,
}

impl ListenedInvoker {
    pub fn state(&self) -> LifecycleState {
        match self.state.load(Ordering::Acquire) {
            CREATED => LifecycleState::Created,
            REFERENCED => LifecycleState::Referenced,
            _ => LifecycleState::Destroyed,
        }
    }

    pub fn inner(&self) -> &Arc<dyn Invoker> {
        &self.inner
    }

    /// 生效的监听器名称，按通知顺序排列。
    pub fn listener_names(&self) -> Vec<&str> {
        self.listeners
            .iter()
            .map(|entry| entry.name.as_str())
            .collect()
    }

    fn fire_referenced(&self) -> bool {
        if self
            .state
            .compare_exchange(CREATED, REFERENCED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        for entry in &self.listeners {
            if let Err(err) = entry.extension.referred(self.inner.as_ref()) {
                warn!(
                    target: TARGET,
                    listener = %entry.name,
                    interface = %self.inner.interface(),
                    error = %err,
                    "invoker listener failed in `referred`"
                );
            }
        }
        debug!(
            target: TARGET,
            interface = %self.inner.interface(),
            listeners = self.listeners.len(),
            "invoker referenced"
        );
        true
    }

    fn fire_destroyed(&self) -> bool {
        if self.state.swap(DESTROYED, Ordering::AcqRel) == DESTROYED {
            return false;
        }
        self.inner.destroy();
        for entry in &self.listeners {
            if let Err(err) = entry.extension.destroyed(self.inner.as_ref()) {
                warn!(
                    target: TARGET,
                    listener = %entry.name,
                    interface = %self.inner.interface(),
                    error = %err,
                    "invoker listener failed in `destroyed`"
                );
            }
        }
        debug!(
            target: TARGET,
            interface = %self.inner.interface(),
            "invoker destroyed"
        );
        true
    }
}

impl fmt::Debug for ListenedInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenedInvoker")
            .field("interface", self.inner.interface())
            .field("state", &self.state())
            .field("listeners", &self.listener_names())
            .finish()
    }
}

#[async_trait]
impl Invoker for ListenedInvoker {
    fn interface(&self) -> &ServiceInterface {
        self.inner.interface()
    }

    fn address(&self) -> &CallAddress {
        self.inner.address()
    }

    fn is_available(&self) -> bool {
        self.state() != LifecycleState::Destroyed && self.inner.is_available()
    }

    fn destroy(&self) {
        self.fire_destroyed();
    }

    async fn invoke(&self, invocation: &mut Invocation) -> RpcOutcome<RpcResult> {
        Next::new(Arc::clone(&self.inner)).invoke(invocation).await
    }
}

/// 生命周期通知器：为 Invoker 选出监听器并在引用、销毁时通知它们。
///
/// # 逻辑解析（How）
/// - 监听器通过 `dyn InvokerListener` 注册表激活，显式名单读取地址参数 `invoker.listener`，
///   不区分分组，顺序即激活顺序（未声明 rank 时为注册顺序）；
/// - 单个监听器失败只记录告警，其余监听器照常执行。
#[derive(Clone, Debug)]
pub struct InvokerLifecycleNotifier {
    scope: ExtensionScope,
}

impl InvokerLifecycleNotifier {
    pub fn new(scope: &ExtensionScope) -> Self {
        Self {
            scope: scope.clone(),
        }
    }

    /// 解析监听器、触发 `referred`，返回带生命周期的 Invoker。
    pub fn on_referenced(
        &self,
        invoker: Arc<dyn Invoker>,
    ) -> ExtensionResult<Arc<ListenedInvoker>> {
        let query = ActivationQuery::new().with_key(keys::INVOKER_LISTENER);
        let listeners = self
            .scope
            .activate::<dyn InvokerListener>(invoker.address(), &query)?;
        let listened = Arc::new(ListenedInvoker {
            inner: invoker,
            listeners,
            state: AtomicU8::new(CREATED),
        });
        listened.fire_referenced();
        Ok(listened)
    }

    /// 销毁 Invoker 并触发 `destroyed`；已销毁时返回 `false` 且不再通知。
    pub fn on_destroyed(&self, invoker: &ListenedInvoker) -> bool {
        invoker.fire_destroyed()
    }
}

//! 测试桩：供过滤链、监听器契约测试复用的终端 Invoker。
//!
//! # 使用方式（How）
//! - [`CountingInvoker`] 记录被执行的次数与最后一次看到的附件，用于断言过滤器“恰好委托一次”；
//! - 桩对象只用于测试或示例，不产生 I/O。

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::{
    address::CallAddress,
    error::{RpcError, RpcOutcome},
    rpc::{Invocation, Invoker, RpcResult, ServiceInterface},
};

type Responder = dyn Fn(&Invocation) -> RpcOutcome<RpcResult> + Send + Sync;

/// 计数终端 Invoker。
///
/// 默认把方法名作为返回值；可通过 [`failing`](Self::failing) 或
/// [`responding`](Self::responding) 改变行为。
pub struct CountingInvoker {
    interface: ServiceInterface,
    address: CallAddress,
    calls: AtomicUsize,
    destroyed: AtomicBool,
    last_attachments: Mutex<BTreeMap<String, String>>,
    responder: Box<Responder>,
}

impl CountingInvoker {
    pub fn new(interface: &str, address: CallAddress) -> Arc<Self> {
        Self::responding(interface, address, |invocation| {
            Ok(RpcResult::value(Value::String(
                invocation.method_name().to_owned(),
            )))
        })
    }

    /// 每次调用都返回给定错误的副本。
    pub fn failing(interface: &str, address: CallAddress, error: fn() -> RpcError) -> Arc<Self> {
        Self::responding(interface, address, move |_| Err(error()))
    }

    pub fn responding<F>(interface: &str, address: CallAddress, responder: F) -> Arc<Self>
    where
        F: Fn(&Invocation) -> RpcOutcome<RpcResult> + Send + Sync + 'static,
    {
        Arc::new(Self {
            interface: ServiceInterface::new(interface),
            address,
            calls: AtomicUsize::new(0),
            destroyed: AtomicBool::new(false),
            last_attachments: Mutex::new(BTreeMap::new()),
            responder: Box::new(responder),
        })
    }

    /// 被执行的次数。
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 最近一次执行时调用携带的附件。
    pub fn last_attachments(&self) -> BTreeMap<String, String> {
        self.last_attachments.lock().clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Invoker for CountingInvoker {
    fn interface(&self) -> &ServiceInterface {
        &self.interface
    }

    fn address(&self) -> &CallAddress {
        &self.address
    }

    fn is_available(&self) -> bool {
        !self.is_destroyed()
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }

    async fn invoke(&self, invocation: &mut Invocation) -> RpcOutcome<RpcResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_attachments.lock() = invocation.attachments().clone();
        (self.responder)(invocation)
    }
}

/// 便捷构造：以 `json!` 值作为固定返回值。
pub fn constant_invoker(
    interface: &str,
    address: CallAddress,
    value: Value,
) -> Arc<CountingInvoker> {
    CountingInvoker::responding(interface, address, move |_| Ok(RpcResult::value(value.clone())))
}

//! 调用测试夹具：记录轨迹的过滤器、短路过滤器与记录事件的生命周期监听器。

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use spark_rpc_core::{
    Activation, CallAddress, ExtensionClass, ExtensionScope, Filter, Invocation, Invoker,
    InvokerListener, Next, RpcError, RpcOutcome, RpcResult,
    extension::{InlineSource, Injectable, PointSetup},
};

/// 过滤器把自己的名称追加到这个附件中，终端据此还原经过的顺序。
pub const TRACE: &str = "trace";

async fn traced(name: &str, next: Next, invocation: &mut Invocation) -> RpcOutcome<RpcResult> {
    let trace = match invocation.attachment(TRACE) {
        Some(existing) => format!("{existing},{name}"),
        None => name.to_owned(),
    };
    invocation.set_attachment(TRACE, trace);
    next.invoke(invocation).await
}

macro_rules! traced_filter {
    ($ty:ident, $name:literal) => {
        #[derive(Default)]
        pub struct $ty;

        impl Injectable for $ty {}

        #[async_trait]
        impl Filter for $ty {
            async fn invoke(
                &self,
                next: Next,
                invocation: &mut Invocation,
            ) -> RpcOutcome<RpcResult> {
                traced($name, next, invocation).await
            }
        }
    };
}

traced_filter!(First, "f1");
traced_filter!(Second, "f2");
traced_filter!(ProviderOnly, "f3");

/// 地址带 `cache` 参数时激活，直接返回缓存值而不委托。
#[derive(Default)]
pub struct Cache;

impl Injectable for Cache {}

#[async_trait]
impl Filter for Cache {
    async fn invoke(&self, _next: Next, invocation: &mut Invocation) -> RpcOutcome<RpcResult> {
        let mut result = RpcResult::value(json!("cached"));
        result.set_attachment("cache.method", invocation.method_name());
        Ok(result)
    }
}

/// 显式点名时启用：拒绝 `forbidden` 方法。
#[derive(Default)]
pub struct Guard;

impl Injectable for Guard {}

#[async_trait]
impl Filter for Guard {
    async fn invoke(&self, next: Next, invocation: &mut Invocation) -> RpcOutcome<RpcResult> {
        if invocation.method_name() == "forbidden" {
            return Err(RpcError::forbidden("method is blocked"));
        }
        traced("guard", next, invocation).await
    }
}

/// 违约过滤器：不委托却返回成功结果。
#[derive(Default)]
pub struct Swallow;

impl Injectable for Swallow {}

#[async_trait]
impl Filter for Swallow {
    async fn invoke(&self, _next: Next, _invocation: &mut Invocation) -> RpcOutcome<RpcResult> {
        Ok(RpcResult::empty())
    }
}

/// 违约过滤器：正常委托后，再经调用的回指引用把内层执行一遍。
#[derive(Default)]
pub struct Replay;

impl Injectable for Replay {}

#[async_trait]
impl Filter for Replay {
    async fn invoke(&self, next: Next, invocation: &mut Invocation) -> RpcOutcome<RpcResult> {
        next.invoke(invocation).await?;
        match invocation.invoker().cloned() {
            Some(inner) => inner.invoke(invocation).await,
            None => Err(RpcError::business("invocation lost its executing invoker")),
        }
    }
}

/// `f1` 为消费端 rank 1；`f2` 声明在 `f1` 之后；`f3` 只属于提供端。
pub fn filter_classes(point: &mut PointSetup<dyn Filter>) {
    point
        .activated_class::<First>(
            "filter::First",
            |filter| filter,
            Activation::new().group("consumer").rank(1),
        )
        .activated_class::<Second>(
            "filter::Second",
            |filter| filter,
            Activation::new().group("consumer").after("f1"),
        )
        .activated_class::<ProviderOnly>(
            "filter::ProviderOnly",
            |filter| filter,
            Activation::new().group("provider"),
        )
        .activated_class::<Cache>(
            "filter::Cache",
            |filter| filter,
            Activation::new()
                .group("consumer")
                .group("provider")
                .key("cache")
                .rank(-10),
        )
        .class(ExtensionClass::new::<Guard>("filter::Guard", |filter| filter))
        .class(ExtensionClass::new::<Swallow>("filter::Swallow", |filter| filter))
        .class(ExtensionClass::new::<Replay>("filter::Replay", |filter| filter));
}

/// 监听器事件日志：`(监听器, 事件, 接口)`；测试以各自唯一的接口名过滤，互不干扰。
static EVENTS: Mutex<Vec<(&'static str, &'static str, String)>> =
    parking_lot::const_mutex(Vec::new());

pub fn events_for(interface: &str) -> Vec<(&'static str, &'static str)> {
    EVENTS
        .lock()
        .iter()
        .filter(|(_, _, seen)| seen == interface)
        .map(|(listener, event, _)| (*listener, *event))
        .collect()
}

fn record(listener: &'static str, event: &'static str, invoker: &dyn Invoker) {
    EVENTS
        .lock()
        .push((listener, event, invoker.interface().name().to_owned()));
}

#[derive(Default)]
pub struct Audit;

impl Injectable for Audit {}

impl InvokerListener for Audit {
    fn referred(&self, invoker: &dyn Invoker) -> RpcOutcome<()> {
        record("audit", "referred", invoker);
        Ok(())
    }

    fn destroyed(&self, invoker: &dyn Invoker) -> RpcOutcome<()> {
        record("audit", "destroyed", invoker);
        Ok(())
    }
}

/// 两个回调都失败，用于验证失败隔离。
#[derive(Default)]
pub struct Broken;

impl Injectable for Broken {}

impl InvokerListener for Broken {
    fn referred(&self, invoker: &dyn Invoker) -> RpcOutcome<()> {
        record("broken", "referred", invoker);
        Err(RpcError::business("listener exploded on refer"))
    }

    fn destroyed(&self, invoker: &dyn Invoker) -> RpcOutcome<()> {
        record("broken", "destroyed", invoker);
        Err(RpcError::business("listener exploded on destroy"))
    }
}

/// 只覆写 `destroyed` 的监听器，且只在显式点名时启用。
#[derive(Default)]
pub struct Janitor;

impl Injectable for Janitor {}

impl InvokerListener for Janitor {
    fn destroyed(&self, invoker: &dyn Invoker) -> RpcOutcome<()> {
        record("janitor", "destroyed", invoker);
        Ok(())
    }
}

pub fn listener_classes(point: &mut PointSetup<dyn InvokerListener>) {
    point
        .activated_class::<Broken>(
            "listener::Broken",
            |listener| listener,
            Activation::new().rank(-1),
        )
        .activated_class::<Audit>("listener::Audit", |listener| listener, Activation::new())
        .class(ExtensionClass::new::<Janitor>("listener::Janitor", |listener| listener));
}

pub fn scope() -> ExtensionScope {
    ExtensionScope::builder()
        .point::<dyn Filter>(filter_classes)
        .point::<dyn InvokerListener>(listener_classes)
        .source(
            InlineSource::new("test")
                .define::<dyn Filter>("f1", "filter::First")
                .define::<dyn Filter>("f2", "filter::Second")
                .define::<dyn Filter>("f3", "filter::ProviderOnly")
                .define::<dyn Filter>("cache", "filter::Cache")
                .define::<dyn Filter>("guard", "filter::Guard")
                .define::<dyn Filter>("swallow", "filter::Swallow")
                .define::<dyn Filter>("replay", "filter::Replay")
                .define::<dyn InvokerListener>("broken", "listener::Broken")
                .define::<dyn InvokerListener>("audit", "listener::Audit")
                .define::<dyn InvokerListener>("janitor", "listener::Janitor"),
        )
        .build()
        .expect("作用域构造成功")
}

pub fn address(raw: &str) -> CallAddress {
    CallAddress::parse(raw).expect("测试地址合法")
}

pub fn call(method: &str) -> Invocation {
    Invocation::new(method, vec!["java.lang.String".to_owned()], vec![json!("ann")])
}

pub fn as_invoker<I: Invoker>(invoker: &Arc<I>) -> Arc<dyn Invoker> {
    Arc::clone(invoker) as Arc<dyn Invoker>
}

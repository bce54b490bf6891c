//! 废弃服务告警：消费端过滤器与引用期监听器。

use async_trait::async_trait;
use dashmap::DashSet;
use spark_rpc_core::{
    Filter, Invocation, Invoker, InvokerListener, Next, RpcOutcome, RpcResult,
    extension::Injectable, rpc::keys,
};
use tracing::error;

const TARGET: &str = "spark.rpc.deprecated";

/// 调用被标记为废弃的方法时记录一次错误日志。
///
/// # 逻辑解析（How）
/// - 方法级参数 `方法名.deprecated` 优先，缺失时读取接口级 `deprecated`；
/// - 已告警的 `接口.方法` 记入 `DashSet`，同一实例对同一方法只告警一次；
/// - 告警之后照常委托，不拦截调用。
#[derive(Debug, Default)]
pub struct DeprecatedFilter {
    logged: DashSet<String>,
}

impl DeprecatedFilter {
    pub const IDENTIFIER: &'static str = "spark.rpc.filter.Deprecated";
}

impl Injectable for DeprecatedFilter {}

#[async_trait]
impl Filter for DeprecatedFilter {
    async fn invoke(&self, next: Next, invocation: &mut Invocation) -> RpcOutcome<RpcResult> {
        let deprecated = next
            .address()
            .method_parameter(invocation.method_name(), keys::DEPRECATED)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
        if deprecated {
            let key = format!("{}.{}", next.interface(), invocation.method_name());
            if self.logged.insert(key) {
                error!(
                    target: TARGET,
                    interface = %next.interface(),
                    method = invocation.method_name(),
                    address = %next.address(),
                    "the invoked method is deprecated and may be removed"
                );
            }
        }
        next.invoke(invocation).await
    }
}

/// 引用一个被标记为 `deprecated=true` 的服务时记录错误日志。
#[derive(Debug, Default)]
pub struct DeprecatedInvokerListener;

impl DeprecatedInvokerListener {
    pub const IDENTIFIER: &'static str = "spark.rpc.listener.Deprecated";
}

impl Injectable for DeprecatedInvokerListener {}

impl InvokerListener for DeprecatedInvokerListener {
    fn referred(&self, invoker: &dyn Invoker) -> RpcOutcome<()> {
        if invoker.address().bool_parameter(keys::DEPRECATED, false) {
            error!(
                target: TARGET,
                interface = %invoker.interface(),
                address = %invoker.address(),
                "the referenced service is deprecated"
            );
        }
        Ok(())
    }
}

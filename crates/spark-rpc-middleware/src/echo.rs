//! 回声探测过滤器。

use async_trait::async_trait;
use spark_rpc_core::{
    Filter, Invocation, Next, RpcOutcome, RpcResult, extension::Injectable, rpc::keys,
};
use tracing::debug;

/// 对 `$echo` 调用直接返回其唯一参数，用于在不触达业务实现的情况下检查链路连通性。
///
/// 参数个数不是 1 的 `$echo` 调用按普通调用继续委托。
#[derive(Debug, Default)]
pub struct EchoFilter;

impl EchoFilter {
    pub const IDENTIFIER: &'static str = "spark.rpc.filter.Echo";
}

impl Injectable for EchoFilter {}

#[async_trait]
impl Filter for EchoFilter {
    async fn invoke(&self, next: Next, invocation: &mut Invocation) -> RpcOutcome<RpcResult> {
        if invocation.method_name() == keys::ECHO_METHOD {
            if let [argument] = invocation.arguments() {
                debug!(
                    target: "spark.rpc.filter.echo",
                    interface = %next.interface(),
                    "echo short-circuited"
                );
                return Ok(RpcResult::value(argument.clone()));
            }
        }
        next.invoke(invocation).await
    }
}

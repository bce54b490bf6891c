//! 访问日志过滤器。

use std::time::Instant;

use async_trait::async_trait;
use spark_rpc_core::{Filter, Invocation, Next, RpcOutcome, RpcResult, extension::Injectable};
use tracing::info;

const TARGET: &str = "spark.rpc.accesslog";

/// 每次调用输出一条 `info` 级结构化事件。
///
/// # 契约说明（What）
/// - 字段：`interface`、`method`、`remote`（地址 `host:port`）、`outcome`（`ok` / `exception` / `error`）
///   与 `elapsed_us`；
/// - 过滤器只观察，不修改调用或结果；
/// - 日志目标固定为 `spark.rpc.accesslog`，由宿主订阅者决定落盘位置。
#[derive(Debug, Default)]
pub struct AccessLogFilter;

impl AccessLogFilter {
    pub const IDENTIFIER: &'static str = "spark.rpc.filter.AccessLog";
}

impl Injectable for AccessLogFilter {}

#[async_trait]
impl Filter for AccessLogFilter {
    async fn invoke(&self, next: Next, invocation: &mut Invocation) -> RpcOutcome<RpcResult> {
        let interface = next.interface().clone();
        let remote = format!("{}:{}", next.address().host(), next.address().port());
        let started = Instant::now();

        let outcome = next.invoke(invocation).await;

        let status = match &outcome {
            Ok(result) if result.has_exception() => "exception",
            Ok(_) => "ok",
            Err(_) => "error",
        };
        info!(
            target: TARGET,
            interface = %interface,
            method = invocation.method_name(),
            remote = %remote,
            outcome = %status,
            elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
            "rpc access"
        );
        outcome
    }
}

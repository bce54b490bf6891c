//! 业务异常降级过滤器。

use async_trait::async_trait;
use spark_rpc_core::{
    Filter, Invocation, Next, RpcOutcome, RpcResult,
    extension::Injectable,
    rpc::RemoteException,
};
use tracing::{debug, error};

const TARGET: &str = "spark.rpc.filter.exception";

/// 把业务失败转换为携带 [`RemoteException`] 的结果值，框架失败原样传播。
///
/// # 设计背景（Why）
/// - 业务失败需要跨进程送达调用方，以结果值的形式携带可以被序列化；
/// - 网络、超时、权限等框架失败由调用方的重试、熔断逻辑处理，不应被包装成普通结果。
///
/// # 契约说明（What）
/// - `RpcErrorKind::Business` → `Ok(RpcResult::from_exception(..))`，异常类型名取错误码；
/// - 其他分类 → 记录错误日志后返回原错误；
/// - 下一层已经返回异常值时不做处理。
#[derive(Debug, Default)]
pub struct ExceptionFilter;

impl ExceptionFilter {
    pub const IDENTIFIER: &'static str = "spark.rpc.filter.Exception";
}

impl Injectable for ExceptionFilter {}

#[async_trait]
impl Filter for ExceptionFilter {
    async fn invoke(&self, next: Next, invocation: &mut Invocation) -> RpcOutcome<RpcResult> {
        let interface = next.interface().clone();
        match next.invoke(invocation).await {
            Ok(result) => Ok(result),
            Err(err) if err.is_business() => {
                debug!(
                    target: TARGET,
                    interface = %interface,
                    method = invocation.method_name(),
                    code = err.code(),
                    "business failure returned as exception value"
                );
                Ok(RpcResult::from_exception(RemoteException::from_error(&err)))
            }
            Err(err) => {
                error!(
                    target: TARGET,
                    interface = %interface,
                    method = invocation.method_name(),
                    error = %err,
                    "framework failure while serving call"
                );
                Err(err)
            }
        }
    }
}

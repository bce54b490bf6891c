//! spark-rpc-middleware：内置的调用过滤器与 Invoker 生命周期监听器。
//!
//! # 教案式概览
//! - **意图（Why）**：回声探测、业务异常降级、访问日志与废弃告警是每个服务都需要的横切能力，
//!   以扩展形式提供后可由地址参数按需开关，不必在业务代码中重复编写。
//! - **结构（How）**：[`echo`]、[`exception`]、[`access_log`]、[`deprecated`] 各自实现
//!   [`Filter`](spark_rpc_core::Filter) 或 [`InvokerListener`](spark_rpc_core::InvokerListener)；
//!   [`install`] 把它们登记到作用域构造器并追加名为 `spark-builtin` 的描述符来源。
//! - **契约（What）**：
//!   - `echo`、`exception` 只在提供端自动激活；
//!   - `accesslog` 两端都可激活，需要地址携带 `accesslog` 参数；
//!   - `deprecated` 过滤器只在消费端、且地址携带 `deprecated` 参数时激活；同名监听器同样以该参数为开关。
//! - **风险提示（Trade-offs）**：`install` 追加的来源排在调用它之前登记的来源之后，应用可以在更早的
//!   来源中以其他名称覆盖这些实现，但不能把同一名称绑定到不同实现。

pub mod access_log;
pub mod deprecated;
pub mod echo;
pub mod exception;

use spark_rpc_core::{
    Activation, Filter, InvokerListener, Role, ScopeBuilder, extension::InlineSource, rpc::keys,
};

pub use access_log::AccessLogFilter;
pub use deprecated::{DeprecatedFilter, DeprecatedInvokerListener};
pub use echo::EchoFilter;
pub use exception::ExceptionFilter;

/// 内置描述符来源的名称。
pub const BUILTIN_SOURCE: &str = "spark-builtin";

/// 登记全部内置扩展并追加内置描述符来源。
pub fn install(builder: ScopeBuilder) -> ScopeBuilder {
    let consumer = Role::Consumer.group();
    let provider = Role::Provider.group();
    builder
        .point::<dyn Filter>(|point| {
            point
                .activated_class::<EchoFilter>(
                    EchoFilter::IDENTIFIER,
                    |filter| filter,
                    Activation::new().group(provider).rank(-110_000),
                )
                .activated_class::<AccessLogFilter>(
                    AccessLogFilter::IDENTIFIER,
                    |filter| filter,
                    Activation::new()
                        .group(consumer)
                        .group(provider)
                        .key(keys::ACCESS_LOG)
                        .rank(-100_000),
                )
                .activated_class::<ExceptionFilter>(
                    ExceptionFilter::IDENTIFIER,
                    |filter| filter,
                    Activation::new().group(provider),
                )
                .activated_class::<DeprecatedFilter>(
                    DeprecatedFilter::IDENTIFIER,
                    |filter| filter,
                    Activation::new().group(consumer).key(keys::DEPRECATED),
                );
        })
        .point::<dyn InvokerListener>(|point| {
            point.activated_class::<DeprecatedInvokerListener>(
                DeprecatedInvokerListener::IDENTIFIER,
                |listener| listener,
                Activation::new().key(keys::DEPRECATED),
            );
        })
        .source(builtin_source())
}

/// 内置扩展的名称绑定。
pub fn builtin_source() -> InlineSource {
    InlineSource::new(BUILTIN_SOURCE)
        .define::<dyn Filter>("echo", EchoFilter::IDENTIFIER)
        .define::<dyn Filter>("accesslog", AccessLogFilter::IDENTIFIER)
        .define::<dyn Filter>("exception", ExceptionFilter::IDENTIFIER)
        .define::<dyn Filter>("deprecated", DeprecatedFilter::IDENTIFIER)
        .define::<dyn InvokerListener>("deprecated", DeprecatedInvokerListener::IDENTIFIER)
}

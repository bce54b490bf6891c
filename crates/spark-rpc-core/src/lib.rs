//! spark-rpc-core：RPC 框架的扩展与调用内核。
//!
//! # 教案式概览
//! - **意图（Why）**：协议、过滤器、生命周期监听器等横切能力都以可插拔扩展的形式存在，内核负责发现、
//!   实例化、注入并按地址参数选择它们，再把过滤器组装成围绕终端 Invoker 的调用链。
//! - **结构（How）**：
//!   - [`extension`]：扩展点注册表、描述符来源、激活与自适应派发；
//!   - [`provider`]：属性注入使用的组合提供者查找；
//!   - [`rpc`]：`Invocation`/`RpcResult`/`Invoker` 契约、过滤链构建与生命周期通知；
//!   - [`address`]：不可变调用地址；[`config`]：作用域配置；[`error`]：错误域。
//! - **契约（What）**：所有共享结构均为 `Send + Sync`，可被多线程并发访问；同一作用域内每个扩展名称
//!   只实例化一次。
//! - **风险提示（Trade-offs）**：内核不做网络 I/O，也不安装日志订阅者；日志通过 `tracing` 输出，
//!   由宿主决定是否采集。

pub mod address;
pub mod config;
pub mod error;
pub mod extension;
pub mod provider;
pub mod rpc;
/// 测试桩命名空间，集中提供计数型终端 Invoker，供集成测试与基准复用。
pub mod test_stubs;

pub use address::{AddressError, CallAddress};
pub use config::{ConfigError, ScopeConfig};
pub use error::{
    ExtensionError, ExtensionResult, RpcError, RpcErrorKind, RpcOutcome, codes,
};
pub use extension::{
    Activation, ActivationQuery, ExtensionClass, ExtensionPoint, ExtensionRegistry,
    ExtensionScope, Injectable, Injector, ScopeBuilder,
};
pub use provider::{AmbiguityPolicy, LookupOutcome, ObjectProvider, ProviderChain};
pub use rpc::{
    Filter, FilterChain, FilterChainBuilder, Invocation, Invoker, InvokerLifecycleNotifier,
    InvokerListener, Next, Role, RpcResult, ServiceInterface,
};

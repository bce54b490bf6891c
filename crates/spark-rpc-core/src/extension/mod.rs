//! 扩展点注册表：发现、实例化、注入、包装与自适应派发。
//!
//! # 设计背景（Why）
//! - RPC 框架的协议、过滤器、监听器等能力都以“扩展点 + 具名实现”的形式插拔，具体实现由描述符声明、
//!   在运行期按名称或地址参数选择；
//! - 实现类通过显式登记的构造闭包接入，描述符只负责把名称映射到实现标识，二者在作用域构建时汇合。
//!
//! # 模块划分（How）
//! - `point`：扩展点契约 [`ExtensionPoint`]；
//! - `class`：实现类登记 [`ExtensionClass`] 与属性注入 [`Injectable`]/[`Injector`]；
//! - `activation`：激活元数据与排序；
//! - `source`/`loader`：描述符来源、行格式解析与合并；
//! - `registry`：单扩展点注册表 [`ExtensionRegistry`]；
//! - `adaptive`：调用期派发 [`AdaptiveDispatcher`]；
//! - `scope`：作用域 [`ExtensionScope`] 与构造器 [`ScopeBuilder`]。
//!
//! # 契约说明（What）
//! - 同一作用域内每个扩展点只有一张注册表，每个名称只产生一个实例；
//! - 装载错误对整个扩展点生效且被缓存，注入缺失不是错误。

mod activation;
mod adaptive;
mod class;
mod loader;
mod point;
mod registry;
mod scope;
mod source;

pub use activation::{Activation, ActivationQuery};
pub use adaptive::AdaptiveDispatcher;
pub use class::{ClassKind, ExtensionClass, Injectable, Injector};
pub use point::ExtensionPoint;
pub use registry::{Activated, ExtensionRegistry};
pub use scope::{ExtensionScope, PointSetup, ScopeBuilder};
pub use source::{DescriptorSource, DirectorySource, InlineSource};

//! spark-rpc-container：外部对象容器适配层。
//!
//! # 教案式概览
//! - **意图（Why）**：扩展实例的属性注入除了作用域内的扩展点，还需要读取宿主应用自己的对象
//!   （数据源、配置、客户端等）。宿主容器千差万别，内核只认识 `ObjectProvider` 这一窄接口。
//! - **结构（How）**：[`ObjectContainer`] 描述“按名称 / 按类型取对象”的容器契约，
//!   [`InMemoryContainer`] 是线程安全的默认实现，[`ContainerProvider`] 把一组容器包装成
//!   组合查找链上的一个外部提供者，容器可以在运行期挂载与卸载。
//! - **契约（What）**：按名称命中但类型不符的对象会被跳过并回退到按类型查找；任何容器报告
//!   “不唯一”时整个提供者返回多候选，由查找链按策略处理。

mod container;
mod provider;

pub use container::{ContainerError, InMemoryContainer, ObjectContainer};
pub use provider::ContainerProvider;

//! 扩展点注册表集成测试。
//!
//! # 覆盖范围（What）
//! - `registry`：单例、并发首访、包装器顺序、属性注入与作用域销毁；
//! - `adaptive`：按地址参数派发、方法级参数、协议键与缺省回退；
//! - `descriptors`：多来源合并、格式错误与目录来源配置。

mod adaptive;
mod fixtures;
mod registry;

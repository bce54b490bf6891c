use std::sync::Arc;

use super::AdaptiveDispatcher;

/// 扩展点：一个可以注册多个具名实现的能力接口。
///
/// # 设计背景（Why）
/// - 扩展点通常是 trait object（例如 `dyn Filter`），实现者在描述符中以名称登记，运行期按名称或地址参数选择；
/// - 扩展点的元信息（描述符资源名、默认实现、自适应参数键）是类型级常量，不随实例变化，因此用关联常量表达。
///
/// # 契约说明（What）
/// - `NAME`：描述符资源名，也是自适应派发在未声明参数键时的兜底键；
/// - `DEFAULT`：默认实现名称，`extension("true")` 与自适应派发兜底都使用它；
/// - `ADAPTIVE_KEYS`：自适应派发依次检查的地址参数键，`protocol` 保留为地址协议；
/// - [`adaptive`](Self::adaptive)：扩展点可借助 [`AdaptiveDispatcher`] 提供调用期派发实现，
///   默认返回 `None` 表示该扩展点不支持自适应。
///
/// # 风险提示（Trade-offs）
/// - 描述符中登记的自适应实现类优先于 `adaptive` 返回的派发实现。
pub trait ExtensionPoint: Send + Sync + 'static {
    const NAME: &'static str;

    const DEFAULT: Option<&'static str> = None;

    const ADAPTIVE_KEYS: &'static [&'static str] = &[];

    fn adaptive(dispatcher: AdaptiveDispatcher<Self>) -> Option<Arc<Self>> {
        let _ = dispatcher;
        None
    }
}

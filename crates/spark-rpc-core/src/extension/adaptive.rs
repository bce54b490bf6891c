use std::{
    fmt,
    sync::{Arc, Weak},
};

use super::{ExtensionPoint, ExtensionRegistry, registry::RegistryInner};
use crate::{
    address::CallAddress,
    error::{ExtensionError, ExtensionResult},
};

/// 保留键：取地址协议而不是参数。
const PROTOCOL_KEY: &str = "protocol";

/// 自适应派发器：在调用时根据地址参数选出具体扩展。
///
/// # 设计背景（Why）
/// - 扩展点的自适应实现需要“调用时再决定实现”，而决定逻辑对所有扩展点都一样：查参数键、回退默认值、
///   交给注册表取单例；派发器把这部分收拢，扩展点只需把方法转发到 [`resolve`](Self::resolve) 的结果上。
///
/// # 逻辑解析（How）
/// - 依次检查 `ADAPTIVE_KEYS`（未声明时使用扩展点名称）；`protocol` 读取地址协议；
/// - 指定方法时优先读取 `方法名.键`，缺失再读取 `键`；
/// - 都未命中时回退到扩展点默认名称，仍无结果则返回 [`ExtensionError::NoMatchingExtension`]。
///
/// # 风险提示（Trade-offs）
/// - 派发器只持有注册表的弱引用，作用域释放后调用返回 [`ExtensionError::ScopeDestroyed`]。
pub struct AdaptiveDispatcher<T: ?Sized> {
    registry: Weak<RegistryInner<T>>,
}

impl<T: ?Sized> Clone for AdaptiveDispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Weak::clone(&self.registry),
        }
    }
}

impl<T: ?Sized + ExtensionPoint> fmt::Debug for AdaptiveDispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveDispatcher")
            .field("point", &T::NAME)
            .field("keys", &Self::keys())
            .finish()
    }
}

impl<T: ?Sized + ExtensionPoint> AdaptiveDispatcher<T> {
    pub(crate) fn new(registry: Weak<RegistryInner<T>>) -> Self {
        Self { registry }
    }

    /// 实际参与派发的参数键。
    pub fn keys() -> Vec<&'static str> {
        if T::ADAPTIVE_KEYS.is_empty() {
            vec![T::NAME]
        } else {
            T::ADAPTIVE_KEYS.to_vec()
        }
    }

    pub fn registry(&self) -> ExtensionResult<ExtensionRegistry<T>> {
        self.registry
            .upgrade()
            .map(ExtensionRegistry::from_inner)
            .ok_or(ExtensionError::ScopeDestroyed)
    }

    /// 计算应派发到的扩展名称，不触发实例化。
    pub fn select_name(&self, address: &CallAddress, method: Option<&str>) -> Option<String> {
        Self::keys()
            .into_iter()
            .find_map(|key| lookup_key(address, key, method))
            .or(T::DEFAULT)
            .map(str::to_owned)
    }

    /// 按地址参数选出扩展。
    pub fn resolve(&self, address: &CallAddress) -> ExtensionResult<Arc<T>> {
        self.resolve_with(address, None)
    }

    /// 按方法级参数选出扩展，`方法名.键` 优先。
    pub fn resolve_for_method(
        &self,
        address: &CallAddress,
        method: &str,
    ) -> ExtensionResult<Arc<T>> {
        self.resolve_with(address, Some(method))
    }

    fn resolve_with(&self, address: &CallAddress, method: Option<&str>) -> ExtensionResult<Arc<T>> {
        let registry = self.registry()?;
        match self.select_name(address, method) {
            Some(name) => registry.extension(&name),
            None => Err(ExtensionError::NoMatchingExtension {
                point: T::NAME.to_owned(),
                keys: Self::keys().into_iter().map(str::to_owned).collect(),
                method: method.map(str::to_owned),
            }),
        }
    }
}

fn lookup_key<'a>(address: &'a CallAddress, key: &str, method: Option<&str>) -> Option<&'a str> {
    if key == PROTOCOL_KEY {
        return Some(address.scheme()).filter(|scheme| !scheme.is_empty());
    }
    match method {
        Some(method) => address.method_parameter(method, key),
        None => address.parameter(key).filter(|value| !value.is_empty()),
    }
}

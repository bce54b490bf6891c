use std::{fmt, sync::Arc};

use tracing::debug;

use super::{Activation, ExtensionPoint};
use crate::{
    error::{ExtensionError, ExtensionResult},
    provider::{LookupRequest, ProviderChain},
};

const TARGET: &str = "spark.rpc.extension";

/// 实现类的角色。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassKind {
    /// 普通具名实现。
    Plain,
    /// 包装器：对该扩展点产出的每个实例再包一层。
    Wrapper,
    /// 手写的自适应实现，优先于扩展点自带的派发实现。
    Adaptive,
}

/// 属性注入入口。
///
/// 默认实现不声明任何可注入属性；需要依赖的实现类覆写 `inject`，逐个调用
/// [`Injector::resolve`] 并在返回 `Some` 时写入字段。
pub trait Injectable {
    fn inject(&mut self, injector: &Injector<'_>) -> ExtensionResult<()> {
        let _ = injector;
        Ok(())
    }
}

/// 注入上下文：把属性查找委托给组合提供者查找链。
pub struct Injector<'a> {
    providers: &'a ProviderChain,
    point: &'static str,
    identifier: &'static str,
}

impl<'a> Injector<'a> {
    pub(crate) fn new(
        providers: &'a ProviderChain,
        point: &'static str,
        identifier: &'static str,
    ) -> Self {
        Self {
            providers,
            point,
            identifier,
        }
    }

    /// 以属性名与类型 `D` 查找依赖。
    ///
    /// # 契约说明（What）
    /// - 所有提供者都未命中时返回 `Ok(None)`，属性应保持未设置；
    /// - 多候选在 `FailFast` 策略下返回 [`ExtensionError::AmbiguousProvider`]，调用方应直接 `?` 传播。
    pub fn resolve<D: ?Sized + Send + Sync + 'static>(
        &self,
        property: &str,
    ) -> ExtensionResult<Option<Arc<D>>> {
        let request = LookupRequest::of::<D>(Some(property));
        let resolved = self
            .providers
            .resolve(&request)?
            .and_then(|object| object.downcast::<D>());
        match &resolved {
            Some(_) => debug!(
                target: TARGET,
                point = self.point,
                class = self.identifier,
                property,
                "dependency injected"
            ),
            None => debug!(
                target: TARGET,
                point = self.point,
                class = self.identifier,
                property,
                "no provider for property; left unset"
            ),
        }
        Ok(resolved)
    }

    pub fn point(&self) -> &'static str {
        self.point
    }

    /// 正在注入的实现类标识。
    pub fn class(&self) -> &'static str {
        self.identifier
    }
}

type Constructor<T> = dyn Fn(&Injector<'_>) -> ExtensionResult<Arc<T>> + Send + Sync;
type WrapperFactory<T> = dyn Fn(Arc<T>, &Injector<'_>) -> ExtensionResult<Arc<T>> + Send + Sync;

fn constructor<T, F>(f: F) -> Arc<Constructor<T>>
where
    T: ?Sized,
    F: Fn(&Injector<'_>) -> ExtensionResult<Arc<T>> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn wrapper_factory<T, F>(f: F) -> Arc<WrapperFactory<T>>
where
    T: ?Sized,
    F: Fn(Arc<T>, &Injector<'_>) -> ExtensionResult<Arc<T>> + Send + Sync + 'static,
{
    Arc::new(f)
}

enum Factory<T: ?Sized> {
    Instance(Arc<Constructor<T>>),
    Wrapper(Arc<WrapperFactory<T>>),
}

impl<T: ?Sized> Clone for Factory<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Instance(constructor) => Self::Instance(Arc::clone(constructor)),
            Self::Wrapper(factory) => Self::Wrapper(Arc::clone(factory)),
        }
    }
}

/// 注册到扩展点的实现类。
///
/// # 设计背景（Why）
/// - 描述符只写“名称 = 实现标识”，标识需要映射到可执行的构造逻辑；这里以显式登记的构造闭包代替反射，
///   构造、注入、向上转型三步都在登记时确定。
///
/// # 契约说明（What）
/// - `identifier` 在同一扩展点内唯一，描述符通过它引用实现类；
/// - 普通实现与自适应实现要求 `Default + Injectable`，构造后立即注入；
/// - 包装器由 `construct` 接收被包装实例，构造后同样注入；
/// - 激活元数据只对普通实现生效，且只绑定到该类在描述符中出现的第一个名称。
///
/// # 风险提示（Trade-offs）
/// - `upcast` 以函数指针传入，通常写作 `|instance| instance`，由编译器完成到 trait object 的转换。
pub struct ExtensionClass<T: ?Sized> {
    identifier: &'static str,
    kind: ClassKind,
    activation: Option<Activation>,
    factory: Factory<T>,
}

impl<T: ?Sized> Clone for ExtensionClass<T> {
    fn clone(&self) -> Self {
        Self {
            identifier: self.identifier,
            kind: self.kind,
            activation: self.activation.clone(),
            factory: self.factory.clone(),
        }
    }
}

impl<T: ?Sized + ExtensionPoint> ExtensionClass<T> {
    /// 普通实现类。
    pub fn new<C>(identifier: &'static str, upcast: fn(Arc<C>) -> Arc<T>) -> Self
    where
        C: Default + Injectable + Send + Sync + 'static,
    {
        Self::instance(identifier, ClassKind::Plain, upcast)
    }

    /// 手写自适应实现类。
    pub fn adaptive<C>(identifier: &'static str, upcast: fn(Arc<C>) -> Arc<T>) -> Self
    where
        C: Default + Injectable + Send + Sync + 'static,
    {
        Self::instance(identifier, ClassKind::Adaptive, upcast)
    }

    /// 包装器类：`construct` 以被包装实例为唯一参数。
    pub fn wrapper<C>(
        identifier: &'static str,
        construct: fn(Arc<T>) -> C,
        upcast: fn(Arc<C>) -> Arc<T>,
    ) -> Self
    where
        C: Injectable + Send + Sync + 'static,
    {
        let factory = wrapper_factory(move |inner, injector| {
            let mut wrapper = construct(inner);
            wrapper.inject(injector)?;
            Ok(upcast(Arc::new(wrapper)))
        });
        Self {
            identifier,
            kind: ClassKind::Wrapper,
            activation: None,
            factory: Factory::Wrapper(factory),
        }
    }

    fn instance<C>(
        identifier: &'static str,
        kind: ClassKind,
        upcast: fn(Arc<C>) -> Arc<T>,
    ) -> Self
    where
        C: Default + Injectable + Send + Sync + 'static,
    {
        let constructor = constructor(move |injector| {
            let mut instance = C::default();
            instance.inject(injector)?;
            Ok(upcast(Arc::new(instance)))
        });
        Self {
            identifier,
            kind,
            activation: None,
            factory: Factory::Instance(constructor),
        }
    }

    /// 附加激活元数据。
    ///
    /// 链式调用时接收者没有预期类型，需写成 `ExtensionClass::<dyn Filter>::new::<C>(..)`；
    /// 在扩展点登记闭包中优先使用 [`PointSetup::activated_class`](super::PointSetup::activated_class)。
    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = Some(activation);
        self
    }

    pub fn identifier(&self) -> &'static str {
        self.identifier
    }

    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    pub fn activation(&self) -> Option<&Activation> {
        self.activation.as_ref()
    }

    pub(crate) fn instantiate(&self, injector: &Injector<'_>) -> ExtensionResult<Arc<T>> {
        match &self.factory {
            Factory::Instance(constructor) => constructor(injector),
            Factory::Wrapper(_) => Err(ExtensionError::load(
                T::NAME,
                format!("wrapper `{}` cannot be instantiated on its own", self.identifier),
            )),
        }
    }

    pub(crate) fn wrap(&self, inner: Arc<T>, injector: &Injector<'_>) -> ExtensionResult<Arc<T>> {
        match &self.factory {
            Factory::Wrapper(factory) => factory(inner, injector),
            Factory::Instance(_) => Err(ExtensionError::load(
                T::NAME,
                format!("`{}` is not a wrapper", self.identifier),
            )),
        }
    }
}

impl<T: ?Sized> fmt::Debug for ExtensionClass<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionClass")
            .field("identifier", &self.identifier)
            .field("kind", &self.kind)
            .field("activation", &self.activation)
            .finish()
    }
}

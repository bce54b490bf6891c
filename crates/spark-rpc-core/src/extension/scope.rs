use std::{
    any::{Any, TypeId},
    collections::{HashMap, HashSet},
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use tracing::{debug, warn};

use super::{
    Activated, Activation, ActivationQuery, DescriptorSource, DirectorySource, ExtensionClass,
    ExtensionPoint, ExtensionRegistry, Injectable,
};
use crate::{
    address::CallAddress,
    config::ScopeConfig,
    error::{ExtensionError, ExtensionResult},
    provider::{
        AmbiguityPolicy, LookupOutcome, LookupRequest, ObjectProvider, ProviderChain, ProviderKind,
    },
};

const TARGET: &str = "spark.rpc.extension";

/// 类型擦除后的注册表，供作用域统一管理。
trait ErasedRegistry: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn point_name(&self) -> &'static str;
    fn adaptive_object(&self) -> ExtensionResult<Option<crate::provider::ProvidedObject>>;
    fn preload(&self) -> ExtensionResult<()>;
    fn clear(&self);
}

impl<T: ?Sized + ExtensionPoint> ErasedRegistry for ExtensionRegistry<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn point_name(&self) -> &'static str {
        T::NAME
    }

    fn adaptive_object(&self) -> ExtensionResult<Option<crate::provider::ProvidedObject>> {
        ExtensionRegistry::adaptive_object(self)
    }

    fn preload(&self) -> ExtensionResult<()> {
        ExtensionRegistry::preload(self)
    }

    fn clear(&self) {
        ExtensionRegistry::clear(self)
    }
}

struct ScopeInner {
    registries: HashMap<TypeId, Arc<dyn ErasedRegistry>>,
    /// 扩展点按登记顺序排列，`preload` 依此顺序装载。
    order: Vec<TypeId>,
    providers: Arc<ProviderChain>,
    destroyed: Arc<AtomicBool>,
}

/// 扩展作用域：一组扩展点注册表、描述符来源与组合提供者查找链的生命周期边界。
///
/// # 设计背景（Why）
/// - 注册表与外部容器集合都是显式对象，不存在进程级全局状态；多个作用域可以并存（例如测试之间互不干扰）；
/// - 作用域本身是句柄，克隆后共享同一组注册表。
///
/// # 契约说明（What）
/// - 通过 [`ExtensionScope::builder`] 构造，构造后扩展点集合不可变；
/// - [`destroy`](Self::destroy) 释放全部缓存实例，之后所有访问返回 [`ExtensionError::ScopeDestroyed`]；
/// - 外部提供者可在运行期经 [`providers`](Self::providers) 挂载或卸载。
#[derive(Clone)]
pub struct ExtensionScope {
    inner: Arc<ScopeInner>,
}

impl fmt::Debug for ExtensionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let points: Vec<&'static str> = self
            .inner
            .order
            .iter()
            .filter_map(|id| self.inner.registries.get(id))
            .map(|registry| registry.point_name())
            .collect();
        f.debug_struct("ExtensionScope")
            .field("points", &points)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl ExtensionScope {
    pub fn builder() -> ScopeBuilder {
        ScopeBuilder::default()
    }

    /// 取得扩展点 `T` 的注册表。
    pub fn registry<T: ?Sized + ExtensionPoint>(&self) -> ExtensionResult<ExtensionRegistry<T>> {
        self.ensure_alive()?;
        self.inner
            .registries
            .get(&TypeId::of::<T>())
            .and_then(|registry| registry.as_any().downcast_ref::<ExtensionRegistry<T>>())
            .cloned()
            .ok_or_else(|| ExtensionError::UnknownPoint {
                point: T::NAME.to_owned(),
            })
    }

    pub fn extension<T: ?Sized + ExtensionPoint>(&self, name: &str) -> ExtensionResult<Arc<T>> {
        self.registry::<T>()?.extension(name)
    }

    pub fn adaptive_extension<T: ?Sized + ExtensionPoint>(&self) -> ExtensionResult<Arc<T>> {
        self.registry::<T>()?.adaptive_extension()
    }

    pub fn activate<T: ?Sized + ExtensionPoint>(
        &self,
        address: &CallAddress,
        query: &ActivationQuery<'_>,
    ) -> ExtensionResult<Vec<Activated<T>>> {
        self.registry::<T>()?.activate(address, query)
    }

    /// 组合提供者查找链，可用于运行期挂载外部提供者。
    pub fn providers(&self) -> &ProviderChain {
        &self.inner.providers
    }

    /// 装载所有扩展点的描述符，返回遇到的第一个错误。
    pub fn preload(&self) -> ExtensionResult<()> {
        self.ensure_alive()?;
        for id in &self.inner.order {
            if let Some(registry) = self.inner.registries.get(id) {
                registry.preload()?;
            }
        }
        Ok(())
    }

    /// 销毁作用域并释放所有缓存实例；重复调用无副作用。
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        for registry in self.inner.registries.values() {
            registry.clear();
        }
        debug!(target: TARGET, points = self.inner.order.len(), "extension scope destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    fn ensure_alive(&self) -> ExtensionResult<()> {
        if self.is_destroyed() {
            Err(ExtensionError::ScopeDestroyed)
        } else {
            Ok(())
        }
    }
}

/// 自注册提供者：对作用域内已登记名称的扩展点返回其自适应实例。
struct ExtensionProvider {
    scope: Weak<ScopeInner>,
}

impl ObjectProvider for ExtensionProvider {
    fn name(&self) -> &str {
        "extension"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::SelfRegistry
    }

    fn lookup(&self, request: &LookupRequest<'_>) -> LookupOutcome {
        let Some(scope) = self.scope.upgrade() else {
            return LookupOutcome::NotFound;
        };
        if scope.destroyed.load(Ordering::Acquire) {
            return LookupOutcome::NotFound;
        }
        let Some(registry) = scope.registries.get(&request.type_key().id()) else {
            return LookupOutcome::NotFound;
        };
        match registry.adaptive_object() {
            Ok(Some(object)) => LookupOutcome::Found(object),
            Ok(None) => LookupOutcome::NotFound,
            Err(err) => {
                warn!(
                    target: TARGET,
                    point = registry.point_name(),
                    error = %err,
                    "adaptive extension unavailable for injection"
                );
                LookupOutcome::NotFound
            }
        }
    }
}

/// 单个扩展点的登记入口。
pub struct PointSetup<T: ?Sized> {
    classes: Vec<ExtensionClass<T>>,
}

impl<T: ?Sized + ExtensionPoint> PointSetup<T> {
    /// 登记一个实现类；描述符通过其标识引用它。
    pub fn class(&mut self, class: ExtensionClass<T>) -> &mut Self {
        self.classes.push(class);
        self
    }

    /// 登记一个带激活元数据的普通实现类。
    ///
    /// 扩展点类型取自 `PointSetup<T>`，`upcast` 写作 `|instance| instance` 即可完成到 `Arc<T>` 的转换；
    /// 直接对 `ExtensionClass::new` 的结果链式调用 `with_activation` 时必须显式写出扩展点类型。
    pub fn activated_class<C>(
        &mut self,
        identifier: &'static str,
        upcast: fn(Arc<C>) -> Arc<T>,
        activation: Activation,
    ) -> &mut Self
    where
        C: Default + Injectable + Send + Sync + 'static,
    {
        self.class(ExtensionClass::new::<C>(identifier, upcast).with_activation(activation))
    }
}

struct RegistryContext {
    sources: Arc<[Arc<dyn DescriptorSource>]>,
    providers: Arc<ProviderChain>,
    destroyed: Arc<AtomicBool>,
}

trait PendingPoint: Send {
    fn point_type(&self) -> TypeId;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn validate(&self) -> ExtensionResult<()>;
    fn into_registry(self: Box<Self>, context: &RegistryContext) -> Arc<dyn ErasedRegistry>;
}

impl<T: ?Sized + ExtensionPoint> PendingPoint for PointSetup<T> {
    fn point_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn validate(&self) -> ExtensionResult<()> {
        let mut seen = HashSet::new();
        for class in &self.classes {
            if !seen.insert(class.identifier()) {
                return Err(ExtensionError::load(
                    T::NAME,
                    format!(
                        "implementation identifier `{}` is registered twice",
                        class.identifier()
                    ),
                ));
            }
        }
        Ok(())
    }

    fn into_registry(self: Box<Self>, context: &RegistryContext) -> Arc<dyn ErasedRegistry> {
        let catalog = self
            .classes
            .into_iter()
            .map(|class| (class.identifier(), Arc::new(class)))
            .collect();
        Arc::new(ExtensionRegistry::<T>::new(
            catalog,
            Arc::clone(&context.sources),
            Arc::clone(&context.providers),
            Arc::clone(&context.destroyed),
        ))
    }
}

/// [`ExtensionScope`] 的构造器。
///
/// # 使用方式（How）
/// ```
/// use std::sync::Arc;
/// use spark_rpc_core::extension::{
///     ExtensionClass, ExtensionPoint, ExtensionScope, InlineSource, Injectable,
/// };
///
/// trait Codec: Send + Sync {
///     fn id(&self) -> &'static str;
/// }
///
/// impl ExtensionPoint for dyn Codec {
///     const NAME: &'static str = "codec";
/// }
///
/// #[derive(Default)]
/// struct Json;
///
/// impl Injectable for Json {}
///
/// impl Codec for Json {
///     fn id(&self) -> &'static str {
///         "json"
///     }
/// }
///
/// let scope = ExtensionScope::builder()
///     .point::<dyn Codec>(|point| {
///         point.class(ExtensionClass::new::<Json>("codec::Json", |codec| codec));
///     })
///     .source(InlineSource::new("app").define::<dyn Codec>("json", "codec::Json"))
///     .build()
///     .expect("scope");
///
/// let codec: Arc<dyn Codec> = scope.extension::<dyn Codec>("json").expect("json codec");
/// assert_eq!(codec.id(), "json");
/// ```
#[derive(Default)]
pub struct ScopeBuilder {
    points: Vec<Box<dyn PendingPoint>>,
    sources: Vec<Arc<dyn DescriptorSource>>,
    providers: Vec<Arc<dyn ObjectProvider>>,
    ambiguity: AmbiguityPolicy,
}

impl ScopeBuilder {
    /// 登记（或追加登记）扩展点 `T` 的实现类。
    pub fn point<T: ?Sized + ExtensionPoint>(
        mut self,
        configure: impl FnOnce(&mut PointSetup<T>),
    ) -> Self {
        let type_id = TypeId::of::<T>();
        let existing = self
            .points
            .iter_mut()
            .find(|pending| pending.point_type() == type_id)
            .and_then(|pending| pending.as_any_mut().downcast_mut::<PointSetup<T>>());
        match existing {
            Some(setup) => configure(setup),
            None => {
                let mut setup = PointSetup::<T> {
                    classes: Vec::new(),
                };
                configure(&mut setup);
                self.points.push(Box::new(setup));
            }
        }
        self
    }

    /// 追加描述符来源；先追加的来源优先。
    pub fn source(mut self, source: impl DescriptorSource) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// 追加外部提供者；自注册提供者始终排在它们之前。
    pub fn provider(mut self, provider: Arc<dyn ObjectProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn ambiguity(mut self, policy: AmbiguityPolicy) -> Self {
        self.ambiguity = policy;
        self
    }

    /// 应用配置：每个描述符目录追加为一个来源，并采用配置中的多候选策略。
    pub fn with_config(mut self, config: &ScopeConfig) -> Self {
        for dir in &config.descriptor_dirs {
            self = self.source(DirectorySource::new(dir.clone()));
        }
        self.ambiguity(config.ambiguity)
    }

    pub fn build(self) -> ExtensionResult<ExtensionScope> {
        for pending in &self.points {
            pending.validate()?;
        }

        let self_describing: HashSet<TypeId> =
            self.points.iter().map(|pending| pending.point_type()).collect();
        let order: Vec<TypeId> = self.points.iter().map(|pending| pending.point_type()).collect();
        let sources: Arc<[Arc<dyn DescriptorSource>]> = self.sources.into();
        let destroyed = Arc::new(AtomicBool::new(false));
        let ambiguity = self.ambiguity;
        let externals = self.providers;
        let points = self.points;

        let inner = Arc::new_cyclic(|weak: &Weak<ScopeInner>| {
            let providers = Arc::new(ProviderChain::new(
                Arc::new(ExtensionProvider {
                    scope: Weak::clone(weak),
                }),
                self_describing,
                ambiguity,
            ));
            for provider in externals {
                providers.attach(provider);
            }

            let context = RegistryContext {
                sources,
                providers: Arc::clone(&providers),
                destroyed: Arc::clone(&destroyed),
            };
            let registries = points
                .into_iter()
                .map(|pending| (pending.point_type(), pending.into_registry(&context)))
                .collect();

            ScopeInner {
                registries,
                order,
                providers,
                destroyed,
            }
        });

        debug!(target: TARGET, points = inner.order.len(), "extension scope built");
        Ok(ExtensionScope { inner })
    }
}

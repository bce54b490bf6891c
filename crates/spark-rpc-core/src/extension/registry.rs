use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::{
    ActivationQuery, AdaptiveDispatcher, DescriptorSource, ExtensionClass, ExtensionPoint, Injector,
    activation::{self, Candidate},
    loader::{self, LoadedPoint},
};
use crate::{
    address::CallAddress,
    error::{ExtensionError, ExtensionResult},
    provider::{ProvidedObject, ProviderChain},
};

const TARGET: &str = "spark.rpc.extension";

/// 单个名称的实例槽位：`OnceLock` 负责无锁读取，`Mutex` 保证构造只发生一次。
struct Holder<T: ?Sized> {
    instance: OnceLock<Arc<T>>,
    init: Mutex<()>,
}

impl<T: ?Sized> Default for Holder<T> {
    fn default() -> Self {
        Self {
            instance: OnceLock::new(),
            init: Mutex::new(()),
        }
    }
}

impl<T: ?Sized> Holder<T> {
    fn get(&self) -> Option<Arc<T>> {
        self.instance.get().cloned()
    }

    fn get_or_try_init(
        &self,
        create: impl FnOnce() -> ExtensionResult<Arc<T>>,
    ) -> ExtensionResult<Arc<T>> {
        if let Some(existing) = self.get() {
            return Ok(existing);
        }
        let _guard = self.init.lock();
        if let Some(existing) = self.get() {
            return Ok(existing);
        }
        let created = create()?;
        Ok(Arc::clone(self.instance.get_or_init(|| created)))
    }
}

pub(crate) struct RegistryInner<T: ?Sized> {
    catalog: HashMap<&'static str, Arc<ExtensionClass<T>>>,
    sources: Arc<[Arc<dyn DescriptorSource>]>,
    providers: Arc<ProviderChain>,
    destroyed: Arc<AtomicBool>,
    loaded: OnceLock<ExtensionResult<LoadedPoint<T>>>,
    holders: DashMap<String, Arc<Holder<T>>>,
    adaptive: RwLock<Option<Arc<T>>>,
    adaptive_init: Mutex<()>,
}

impl<T: ?Sized + ExtensionPoint> RegistryInner<T> {
    fn loaded(&self) -> ExtensionResult<&LoadedPoint<T>> {
        self.loaded
            .get_or_init(|| loader::load::<T>(&self.catalog, &self.sources))
            .as_ref()
            .map_err(Clone::clone)
    }

    fn ensure_alive(&self) -> ExtensionResult<()> {
        if self.destroyed.load(Ordering::Acquire) {
            Err(ExtensionError::ScopeDestroyed)
        } else {
            Ok(())
        }
    }

    /// 构造 → 注入 → 按登记顺序套上包装器；最后登记的包装器位于最外层。
    fn create(&self, name: &str, class: &ExtensionClass<T>) -> ExtensionResult<Arc<T>> {
        let loaded = self.loaded()?;
        let injector = Injector::new(&self.providers, T::NAME, class.identifier());
        let mut instance = class.instantiate(&injector)?;
        debug!(
            target: TARGET,
            point = T::NAME,
            name,
            class = class.identifier(),
            "extension instantiated"
        );

        for wrapper in &loaded.wrappers {
            let injector = Injector::new(&self.providers, T::NAME, wrapper.identifier());
            instance = wrapper.wrap(instance, &injector)?;
            debug!(
                target: TARGET,
                point = T::NAME,
                name,
                wrapper = wrapper.identifier(),
                "wrapper applied"
            );
        }
        Ok(instance)
    }
}

/// 某个扩展点的注册表句柄。
///
/// # 设计背景（Why）
/// - 每个扩展点类型在一个作用域内只有一张注册表，名称到单例的缓存、自适应实例缓存都挂在这里；
/// - 句柄可廉价克隆，所有克隆共享同一份缓存。
///
/// # 逻辑解析（How）
/// - 描述符在第一次访问时经 `OnceLock` 装载，装载结果（包括失败）被缓存，之后的访问返回同一结果；
/// - 名称槽位存放在 `DashMap` 中，槽位内部的互斥锁只覆盖该名称的构造，不同名称互不阻塞；
/// - 自适应实例单独缓存，构造同样只发生一次。
///
/// # 契约说明（What）
/// - 同一名称在注册表生命周期内只产生一个实例，注入与包装只执行一次；
/// - 名称 `"true"` 等价于扩展点默认名称；
/// - 作用域销毁后所有访问返回 [`ExtensionError::ScopeDestroyed`]。
pub struct ExtensionRegistry<T: ?Sized> {
    inner: Arc<RegistryInner<T>>,
}

impl<T: ?Sized> Clone for ExtensionRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: ?Sized + ExtensionPoint> fmt::Debug for ExtensionRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("point", &T::NAME)
            .field("cached", &self.inner.holders.len())
            .finish()
    }
}

/// 一次激活的结果项。
pub struct Activated<T: ?Sized> {
    pub name: String,
    pub extension: Arc<T>,
}

impl<T: ?Sized> Clone for Activated<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            extension: Arc::clone(&self.extension),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Activated<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activated").field("name", &self.name).finish()
    }
}

impl<T: ?Sized + ExtensionPoint> ExtensionRegistry<T> {
    pub(crate) fn new(
        catalog: HashMap<&'static str, Arc<ExtensionClass<T>>>,
        sources: Arc<[Arc<dyn DescriptorSource>]>,
        providers: Arc<ProviderChain>,
        destroyed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                catalog,
                sources,
                providers,
                destroyed,
                loaded: OnceLock::new(),
                holders: DashMap::new(),
                adaptive: RwLock::new(None),
                adaptive_init: Mutex::new(()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<RegistryInner<T>>) -> Self {
        Self { inner }
    }

    pub fn point_name(&self) -> &'static str {
        T::NAME
    }

    pub fn default_name(&self) -> Option<&'static str> {
        T::DEFAULT
    }

    /// 返回 `name` 对应的单例，首次访问时构造。
    pub fn extension(&self, name: &str) -> ExtensionResult<Arc<T>> {
        self.inner.ensure_alive()?;
        let name = self.resolve_name(name)?;
        let loaded = self.inner.loaded()?;
        let class = loaded
            .class(name)
            .ok_or_else(|| not_found::<T>(name))?;

        let holder = match self.inner.holders.get(name) {
            Some(holder) => Arc::clone(holder.value()),
            None => Arc::clone(self.inner.holders.entry(name.to_owned()).or_default().value()),
        };
        holder.get_or_try_init(|| self.inner.create(name, class))
    }

    /// 默认实现；扩展点未声明默认名称时返回 `None`。
    pub fn default_extension(&self) -> ExtensionResult<Option<Arc<T>>> {
        match T::DEFAULT {
            Some(name) => self.extension(name).map(Some),
            None => Ok(None),
        }
    }

    pub fn has_extension(&self, name: &str) -> ExtensionResult<bool> {
        self.inner.ensure_alive()?;
        Ok(self.inner.loaded()?.contains(name))
    }

    /// 已登记的全部名称，按字典序排列。
    pub fn supported_extensions(&self) -> ExtensionResult<Vec<String>> {
        self.inner.ensure_alive()?;
        let mut names = self.inner.loaded()?.names().to_vec();
        names.sort();
        Ok(names)
    }

    /// 仅在实例已构造时返回，不触发构造。
    pub fn loaded_extension(&self, name: &str) -> Option<Arc<T>> {
        self.inner
            .holders
            .get(name)
            .and_then(|holder| holder.value().get())
    }

    /// 返回自适应实例；实例只构造一次，构造本身不依赖任何地址参数。
    pub fn adaptive_extension(&self) -> ExtensionResult<Arc<T>> {
        self.inner.ensure_alive()?;
        if let Some(existing) = self.inner.adaptive.read().as_ref() {
            return Ok(Arc::clone(existing));
        }

        let _guard = self.inner.adaptive_init.lock();
        if let Some(existing) = self.inner.adaptive.read().as_ref() {
            return Ok(Arc::clone(existing));
        }

        let loaded = self.inner.loaded()?;
        let instance = match &loaded.adaptive {
            Some(class) => {
                let injector = Injector::new(&self.inner.providers, T::NAME, class.identifier());
                class.instantiate(&injector)?
            }
            None => T::adaptive(AdaptiveDispatcher::new(Arc::downgrade(&self.inner))).ok_or_else(
                || ExtensionError::AdaptiveUnavailable {
                    point: T::NAME.to_owned(),
                },
            )?,
        };
        *self.inner.adaptive.write() = Some(Arc::clone(&instance));
        debug!(
            target: TARGET,
            point = T::NAME,
            class = loaded.adaptive.as_ref().map(|class| class.identifier()),
            "adaptive extension created"
        );
        Ok(instance)
    }

    /// 按地址与查询条件选出激活的扩展，返回值顺序即调用顺序。
    ///
    /// # 逻辑解析（How）
    /// 1. 读取 `query.key()` 对应的显式名单；名单不含 `-default` 时，自动激活满足分组与参数键条件、
    ///    且未被显式点名或排除的扩展，并做拓扑排序；
    /// 2. 显式点名的扩展按名单顺序追加；出现在 `default` 之前的名称被移到自动激活部分之前；
    /// 3. `-name` 从两部分中都排除该名称。
    ///
    /// # 契约说明（What）
    /// - 显式点名但未登记的名称返回 [`ExtensionError::NotFound`]；
    /// - 自动激活子集中存在前后关系环时返回 [`ExtensionError::Load`]。
    pub fn activate(
        &self,
        address: &CallAddress,
        query: &ActivationQuery<'_>,
    ) -> ExtensionResult<Vec<Activated<T>>> {
        self.inner.ensure_alive()?;
        let loaded = self.inner.loaded()?;
        let listed: Vec<&str> = query
            .key()
            .map(|key| address.parameter_values(key))
            .unwrap_or_default();
        let excluded = |name: &str| {
            listed
                .iter()
                .any(|item| item.strip_prefix('-') == Some(name))
        };

        let mut activated = Vec::new();
        if !listed.contains(&"-default") {
            let candidates: Vec<Candidate<'_>> = loaded
                .activatable
                .iter()
                .filter(|entry| {
                    entry.activation.matches_group(query.group())
                        && !listed.contains(&entry.name.as_str())
                        && !excluded(&entry.name)
                        && entry.activation.matches_address(address)
                })
                .map(|entry| Candidate {
                    name: &entry.name,
                    index: entry.index,
                    activation: &entry.activation,
                })
                .collect();
            let ordered = activation::order(&candidates).map_err(|cycle| {
                ExtensionError::load(
                    T::NAME,
                    format!("before/after relations form a cycle among {cycle:?}"),
                )
            })?;
            for position in ordered {
                let name = candidates[position].name;
                activated.push(Activated {
                    name: name.to_owned(),
                    extension: self.extension(name)?,
                });
            }
        }

        let mut explicit = Vec::new();
        for &name in &listed {
            if name.starts_with('-') || excluded(name) {
                continue;
            }
            if name == "default" {
                explicit.append(&mut activated);
                activated = std::mem::take(&mut explicit);
            } else {
                explicit.push(Activated {
                    name: name.to_owned(),
                    extension: self.extension(name)?,
                });
            }
        }
        activated.append(&mut explicit);
        Ok(activated)
    }

    /// 强制装载描述符，尽早暴露格式或冲突错误。
    pub fn preload(&self) -> ExtensionResult<()> {
        self.inner.ensure_alive()?;
        self.inner.loaded().map(|_| ())
    }

    /// 供自注册提供者使用：扩展点至少登记了一个名称时返回自适应实例。
    pub(crate) fn adaptive_object(&self) -> ExtensionResult<Option<ProvidedObject>> {
        if self.inner.loaded()?.names().is_empty() {
            return Ok(None);
        }
        match self.adaptive_extension() {
            Ok(adaptive) => Ok(Some(ProvidedObject::new::<T>(adaptive))),
            Err(ExtensionError::AdaptiveUnavailable { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub(crate) fn clear(&self) {
        self.inner.holders.clear();
        *self.inner.adaptive.write() = None;
    }

    fn resolve_name<'n>(&self, name: &'n str) -> ExtensionResult<&'n str> {
        match name {
            "" => Err(not_found::<T>(name)),
            "true" => T::DEFAULT.ok_or_else(|| not_found::<T>(name)),
            _ => Ok(name),
        }
    }
}

fn not_found<T: ?Sized + ExtensionPoint>(name: &str) -> ExtensionError {
    ExtensionError::NotFound {
        point: T::NAME.to_owned(),
        name: name.to_owned(),
    }
}

//! 组合提供者查找：为扩展实例的属性注入提供候选对象。
//!
//! # 设计背景（Why）
//! - 扩展实例在构造后需要按“名称 + 类型”装配依赖，而依赖可能来自扩展系统自身（其他扩展点的自适应实例）
//!   或外部容器；
//! - 查找结果必须区分“命中”“未找到”“多候选”三种语义，以便组合层决定是继续、返回还是中止。
//!
//! # 契约说明（What）
//! - [`ObjectProvider`] 是单个提供者的最小契约，返回 [`LookupOutcome`] 标签值而非错误；
//! - [`ProviderChain`] 持有自注册提供者与外部提供者，按固定优先级串联查找；
//! - [`TypeKey`]/[`ProvidedObject`] 以 `TypeId` 擦除具体类型，`downcast` 时再恢复为 `Arc<D>`。

mod chain;

use std::{
    any::{Any, TypeId},
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

pub use chain::{ProviderChain, ProviderId};

/// 类型标识：`TypeId` 用于比较，类型名仅用于日志与错误上下文。
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// 取得 `D` 的类型标识，`D` 可以是 trait object（例如 `dyn Filter`）。
    pub fn of<D: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<D>(),
            name: std::any::type_name::<D>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 提供者返回的类型擦除对象，内部保存一个 `Arc<D>`。
#[derive(Clone)]
pub struct ProvidedObject {
    type_key: TypeKey,
    value: Arc<dyn Any + Send + Sync>,
}

impl ProvidedObject {
    /// 包装共享对象，类型标识取自 `D`。
    pub fn new<D: ?Sized + Send + Sync + 'static>(value: Arc<D>) -> Self {
        Self {
            type_key: TypeKey::of::<D>(),
            value: Arc::new(value),
        }
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// 恢复为 `Arc<D>`；类型不符时返回 `None`。
    pub fn downcast<D: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<D>> {
        self.value.downcast_ref::<Arc<D>>().cloned()
    }
}

impl fmt::Debug for ProvidedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvidedObject")
            .field("type", &self.type_key)
            .finish_non_exhaustive()
    }
}

/// 单次查找请求：目标类型必填，名称可选。
#[derive(Clone, Copy, Debug)]
pub struct LookupRequest<'a> {
    type_key: TypeKey,
    name: Option<&'a str>,
}

impl<'a> LookupRequest<'a> {
    pub fn new(type_key: TypeKey, name: Option<&'a str>) -> Self {
        Self { type_key, name }
    }

    /// 按类型 `D` 构造请求。
    pub fn of<D: ?Sized + 'static>(name: Option<&'a str>) -> Self {
        Self::new(TypeKey::of::<D>(), name)
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    pub fn name(&self) -> Option<&'a str> {
        self.name
    }
}

/// 单个提供者的查找结果。
#[derive(Clone, Debug)]
pub enum LookupOutcome {
    /// 唯一命中。
    Found(ProvidedObject),
    /// 没有任何候选，组合层继续询问下一个提供者。
    NotFound,
    /// 存在多个该类型的候选且名称无法消歧。
    Ambiguous { candidates: usize },
}

/// 提供者类别：自注册提供者固定排在首位，且独占自描述扩展点类型的解析。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    SelfRegistry,
    External,
}

/// 注入候选对象的来源。
///
/// # 契约说明（What）
/// - `lookup` 必须是只读且线程安全的，组合层会在并发注入中同时调用；
/// - 返回 `Found` 时对象类型应与请求一致，不一致会被组合层记录告警并跳过；
/// - 多候选必须以 `Ambiguous` 表达，而不是任选其一。
pub trait ObjectProvider: Send + Sync + 'static {
    /// 提供者名称，用于日志与错误上下文。
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind {
        ProviderKind::External
    }

    fn lookup(&self, request: &LookupRequest<'_>) -> LookupOutcome;
}

/// 多候选时的处理策略。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguityPolicy {
    /// 立即中止整次查找并返回 `AmbiguousProvider` 错误。
    #[default]
    FailFast,
    /// 记录告警后继续询问下一个提供者。
    TryNext,
}

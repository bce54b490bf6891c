use std::{
    any::TypeId,
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use arc_swap::ArcSwap;
use tracing::{debug, warn};

use super::{
    AmbiguityPolicy, LookupOutcome, LookupRequest, ObjectProvider, ProvidedObject, ProviderKind,
};
use crate::error::{ExtensionError, ExtensionResult};

const TARGET: &str = "spark.rpc.provider";

/// 外部提供者的挂载句柄，用于之后卸载。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProviderId(u64);

#[derive(Clone)]
struct ProviderEntry {
    id: ProviderId,
    provider: Arc<dyn ObjectProvider>,
}

/// 组合提供者查找链。
///
/// # 设计背景（Why）
/// - 属性注入需要同时面向扩展系统自身与外部容器，两者的优先级固定：自注册提供者在前，外部提供者按挂载顺序在后；
/// - 外部容器可能在运行期挂载或卸载，查找不能因此阻塞或观察到半更新状态。
///
/// # 逻辑解析（How）
/// - 外部提供者集合存放在 `ArcSwap<Vec<_>>` 中，挂载/卸载通过 `rcu` 生成新快照，查找只读取一次快照后遍历；
/// - 自描述类型（作用域内注册的扩展点 trait object）只交给自注册提供者，外部提供者永远不会被询问；
/// - `Found` 但类型不符的结果会被告警并跳过，`NotFound` 继续下一个，`Ambiguous` 依据 [`AmbiguityPolicy`] 处理。
///
/// # 契约说明（What）
/// - 返回 `Ok(None)` 表示所有提供者均未命中，调用方应将其视为“属性保持未设置”；
/// - `FailFast` 策略下，首个 `Ambiguous` 即终止查找，之后的提供者不会被调用。
pub struct ProviderChain {
    self_provider: Arc<dyn ObjectProvider>,
    externals: ArcSwap<Vec<ProviderEntry>>,
    next_id: AtomicU64,
    self_describing: HashSet<TypeId>,
    policy: AmbiguityPolicy,
}

impl ProviderChain {
    pub(crate) fn new(
        self_provider: Arc<dyn ObjectProvider>,
        self_describing: HashSet<TypeId>,
        policy: AmbiguityPolicy,
    ) -> Self {
        debug_assert_eq!(self_provider.kind(), ProviderKind::SelfRegistry);
        Self {
            self_provider,
            externals: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
            self_describing,
            policy,
        }
    }

    /// 在链尾挂载一个外部提供者。
    pub fn attach(&self, provider: Arc<dyn ObjectProvider>) -> ProviderId {
        let id = ProviderId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = ProviderEntry { id, provider };
        debug!(target: TARGET, provider = entry.provider.name(), ?id, "provider attached");
        self.externals.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(entry.clone());
            next
        });
        id
    }

    /// 卸载外部提供者；句柄未知时返回 `false`。
    pub fn detach(&self, id: ProviderId) -> bool {
        let previous = self.externals.rcu(|current| {
            current
                .iter()
                .filter(|entry| entry.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        let removed = previous.iter().any(|entry| entry.id == id);
        if removed {
            debug!(target: TARGET, ?id, "provider detached");
        }
        removed
    }

    /// 当前生效的提供者名称，按查找顺序排列（自注册提供者在首位）。
    pub fn provider_names(&self) -> Vec<String> {
        let snapshot = self.externals.load();
        std::iter::once(self.self_provider.name().to_owned())
            .chain(snapshot.iter().map(|entry| entry.provider.name().to_owned()))
            .collect()
    }

    pub fn policy(&self) -> AmbiguityPolicy {
        self.policy
    }

    /// 是否为只由自注册提供者解析的类型。
    pub fn is_self_describing(&self, type_id: TypeId) -> bool {
        self.self_describing.contains(&type_id)
    }

    /// 按优先级依次询问提供者。
    pub fn resolve(&self, request: &LookupRequest<'_>) -> ExtensionResult<Option<ProvidedObject>> {
        if let Some(found) = self.consult(&self.self_provider, request)? {
            return Ok(Some(found));
        }
        if self.is_self_describing(request.type_key().id()) {
            return Ok(None);
        }

        let snapshot = self.externals.load_full();
        for entry in snapshot.iter() {
            if let Some(found) = self.consult(&entry.provider, request)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// 按类型 `D` 查找并还原为 `Arc<D>`。
    pub fn resolve_as<D: ?Sized + Send + Sync + 'static>(
        &self,
        name: Option<&str>,
    ) -> ExtensionResult<Option<Arc<D>>> {
        let request = LookupRequest::of::<D>(name);
        Ok(self
            .resolve(&request)?
            .and_then(|object| object.downcast::<D>()))
    }

    fn consult(
        &self,
        provider: &Arc<dyn ObjectProvider>,
        request: &LookupRequest<'_>,
    ) -> ExtensionResult<Option<ProvidedObject>> {
        match provider.lookup(request) {
            LookupOutcome::Found(object) if object.type_key() == request.type_key() => {
                Ok(Some(object))
            }
            LookupOutcome::Found(object) => {
                warn!(
                    target: TARGET,
                    provider = provider.name(),
                    expected = request.type_key().name(),
                    actual = object.type_key().name(),
                    name = request.name(),
                    "provider returned an object of the wrong type; skipping"
                );
                Ok(None)
            }
            LookupOutcome::NotFound => {
                debug!(
                    target: TARGET,
                    provider = provider.name(),
                    type_name = request.type_key().name(),
                    name = request.name(),
                    "provider has no candidate"
                );
                Ok(None)
            }
            LookupOutcome::Ambiguous { candidates } => match self.policy {
                AmbiguityPolicy::FailFast => Err(ExtensionError::AmbiguousProvider {
                    type_name: request.type_key().name().to_owned(),
                    name: request.name().map(str::to_owned),
                    provider: provider.name().to_owned(),
                    candidates,
                }),
                AmbiguityPolicy::TryNext => {
                    warn!(
                        target: TARGET,
                        provider = provider.name(),
                        type_name = request.type_key().name(),
                        name = request.name(),
                        candidates,
                        "provider returned several candidates; trying the next provider"
                    );
                    Ok(None)
                }
            },
        }
    }
}

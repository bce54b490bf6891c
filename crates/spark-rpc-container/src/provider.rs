use std::{fmt, sync::Arc};

use arc_swap::ArcSwap;
use spark_rpc_core::provider::{LookupOutcome, LookupRequest, ObjectProvider};
use tracing::{debug, warn};

use crate::container::{ContainerError, ObjectContainer};

const TARGET: &str = "spark.rpc.container";

/// 把一组外部容器接入组合查找链的提供者。
///
/// # 设计背景（Why）
/// - 宿主可能同时持有多个容器（例如父子上下文），注入时应依次询问；
/// - 容器集合是显式对象而非进程级静态表，挂载到哪个作用域由宿主决定。
///
/// # 逻辑解析（How）
/// 1. 请求带名称时，依次询问包含该名称的容器；类型一致即命中，不一致则记录并跳过；
/// 2. 名称未命中时按类型依次询问；某个容器报告不唯一，整个查找返回多候选；
/// 3. 容器集合以 `ArcSwap` 保存快照，`add`/`remove` 不阻塞正在进行的查找。
///
/// # 风险提示（Trade-offs）
/// - 按类型查找只比较精确类型，不理解容器内部的继承或别名关系。
pub struct ContainerProvider {
    containers: ArcSwap<Vec<Arc<dyn ObjectContainer>>>,
}

impl Default for ContainerProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerProvider {
    pub fn new() -> Self {
        Self {
            containers: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// 挂载容器；同一标识的旧容器被替换并保留原位置。
    pub fn add(&self, container: Arc<dyn ObjectContainer>) {
        self.containers.rcu(|current| {
            let mut next: Vec<Arc<dyn ObjectContainer>> = current.iter().cloned().collect();
            match next.iter().position(|existing| existing.id() == container.id()) {
                Some(index) => next[index] = Arc::clone(&container),
                None => next.push(Arc::clone(&container)),
            }
            next
        });
        debug!(target: TARGET, container = container.id(), "container attached");
    }

    /// 卸载指定标识的容器，返回是否存在。
    pub fn remove(&self, id: &str) -> bool {
        let previous = self.containers.rcu(|current| {
            current
                .iter()
                .filter(|existing| existing.id() != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        let removed = previous.iter().any(|existing| existing.id() == id);
        if removed {
            debug!(target: TARGET, container = id, "container detached");
        }
        removed
    }

    /// 当前挂载的容器标识，按询问顺序排列。
    pub fn container_ids(&self) -> Vec<String> {
        self.containers
            .load()
            .iter()
            .map(|container| container.id().to_owned())
            .collect()
    }
}

impl fmt::Debug for ContainerProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerProvider")
            .field("containers", &self.container_ids())
            .finish()
    }
}

impl ObjectProvider for ContainerProvider {
    fn name(&self) -> &str {
        "container"
    }

    fn lookup(&self, request: &LookupRequest<'_>) -> LookupOutcome {
        let containers = self.containers.load();
        let wanted = request.type_key();

        if let Some(name) = request.name() {
            for container in containers.iter().filter(|c| c.contains(name)) {
                match container.get_by_name(name) {
                    Ok(object) if object.type_key() == wanted => {
                        return LookupOutcome::Found(object);
                    }
                    Ok(object) => debug!(
                        target: TARGET,
                        container = container.id(),
                        name,
                        expected = wanted.name(),
                        actual = object.type_key().name(),
                        "named object has a different type; falling back to type lookup"
                    ),
                    Err(err) => debug!(
                        target: TARGET,
                        container = container.id(),
                        name,
                        error = %err,
                        "named lookup failed"
                    ),
                }
            }
        }

        for container in containers.iter() {
            match container.get_by_type(wanted) {
                Ok(object) => return LookupOutcome::Found(object),
                Err(ContainerError::NotFound { .. }) => {}
                Err(ContainerError::NotUnique { count, .. }) => {
                    warn!(
                        target: TARGET,
                        container = container.id(),
                        type_name = wanted.name(),
                        name = request.name(),
                        count,
                        "container holds several objects of the requested type"
                    );
                    return LookupOutcome::Ambiguous { candidates: count };
                }
            }
        }
        LookupOutcome::NotFound
    }
}

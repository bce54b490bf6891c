use std::{collections::BTreeMap, fmt, sync::Arc};

use parking_lot::RwLock;
use spark_rpc_core::provider::{ProvidedObject, TypeKey};
use thiserror::Error;

/// 容器查找失败的两种语义。
///
/// - `NotFound`：没有候选，查找方应继续询问下一个容器；
/// - `NotUnique`：同一类型存在多个候选，名称也无法消歧，查找方不应任选其一。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ContainerError {
    #[error("container `{container}` has no object for {target}")]
    NotFound { container: String, target: String },

    #[error("container `{container}` holds {count} objects of type `{type_name}`")]
    NotUnique {
        container: String,
        type_name: String,
        count: usize,
    },
}

/// 外部对象容器的最小契约。
///
/// # 契约说明（What）
/// - 三个查询都必须是只读且线程安全的，注入可能在多个线程上同时发生；
/// - `get_by_name` 不做类型检查，类型匹配由调用方负责；
/// - `get_by_type` 在候选多于一个时必须返回 [`ContainerError::NotUnique`]。
pub trait ObjectContainer: Send + Sync + 'static {
    /// 容器标识，挂载到提供者时用作去重键。
    fn id(&self) -> &str;

    fn contains(&self, name: &str) -> bool;

    fn get_by_name(&self, name: &str) -> Result<ProvidedObject, ContainerError>;

    fn get_by_type(&self, type_key: TypeKey) -> Result<ProvidedObject, ContainerError>;
}

/// 以名称为键的内存容器。
///
/// 名称唯一，重复注册会替换旧对象；对象按名称字典序保存，按类型查找的结果因此与注册顺序无关。
pub struct InMemoryContainer {
    id: String,
    objects: RwLock<BTreeMap<String, ProvidedObject>>,
}

impl InMemoryContainer {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// 以 `name` 注册对象，返回被替换的旧对象。
    pub fn register<D: ?Sized + Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
        object: Arc<D>,
    ) -> Option<ProvidedObject> {
        self.objects
            .write()
            .insert(name.into(), ProvidedObject::new(object))
    }

    /// 链式注册，便于在构造时一次性填充。
    pub fn with<D: ?Sized + Send + Sync + 'static>(
        self,
        name: impl Into<String>,
        object: Arc<D>,
    ) -> Self {
        self.register(name, object);
        self
    }

    pub fn remove(&self, name: &str) -> bool {
        self.objects.write().remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    fn not_found(&self, target: String) -> ContainerError {
        ContainerError::NotFound {
            container: self.id.clone(),
            target,
        }
    }
}

impl fmt::Debug for InMemoryContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.objects.read().keys().cloned().collect();
        f.debug_struct("InMemoryContainer")
            .field("id", &self.id)
            .field("names", &names)
            .finish()
    }
}

impl ObjectContainer for InMemoryContainer {
    fn id(&self) -> &str {
        &self.id
    }

    fn contains(&self, name: &str) -> bool {
        self.objects.read().contains_key(name)
    }

    fn get_by_name(&self, name: &str) -> Result<ProvidedObject, ContainerError> {
        self.objects
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| self.not_found(format!("name `{name}`")))
    }

    fn get_by_type(&self, type_key: TypeKey) -> Result<ProvidedObject, ContainerError> {
        let objects = self.objects.read();
        let mut matches = objects
            .values()
            .filter(|object| object.type_key() == type_key);
        let Some(first) = matches.next() else {
            return Err(self.not_found(format!("type `{}`", type_key.name())));
        };
        let extra = matches.count();
        if extra > 0 {
            return Err(ContainerError::NotUnique {
                container: self.id.clone(),
                type_name: type_key.name().to_owned(),
                count: extra + 1,
            });
        }
        Ok(first.clone())
    }
}

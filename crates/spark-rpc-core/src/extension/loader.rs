//! 描述符装载：把各来源的文本合并为一个扩展点的不可变类表。

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tracing::debug;

use super::{
    Activation, ClassKind, DescriptorSource, ExtensionClass, ExtensionPoint, source::parse,
};
use crate::error::{ExtensionError, ExtensionResult};

const TARGET: &str = "spark.rpc.extension";

/// 带激活元数据的具名实现，保存其注册序号。
#[derive(Debug)]
pub(crate) struct ActivatableEntry {
    pub(crate) name: String,
    pub(crate) index: usize,
    pub(crate) activation: Activation,
}

/// 一个扩展点装载完成后的类表。
pub(crate) struct LoadedPoint<T: ?Sized> {
    /// 名称 → 实现类。
    bindings: HashMap<String, Arc<ExtensionClass<T>>>,
    /// 名称按首次出现顺序排列，即注册序号。
    order: Vec<String>,
    pub(crate) wrappers: Vec<Arc<ExtensionClass<T>>>,
    pub(crate) adaptive: Option<Arc<ExtensionClass<T>>>,
    pub(crate) activatable: Vec<ActivatableEntry>,
}

impl<T: ?Sized> LoadedPoint<T> {
    pub(crate) fn class(&self, name: &str) -> Option<&Arc<ExtensionClass<T>>> {
        self.bindings.get(name)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub(crate) fn names(&self) -> &[String] {
        &self.order
    }
}

struct Binding {
    identifier: String,
    source: String,
}

/// 依次读取来源并合并。
///
/// # 逻辑解析（How）
/// 1. 来源按登记顺序读取，先出现的名称生效；同名绑定到不同实现标识时整体失败；
/// 2. 包装器按出现顺序收集，同一包装器出现两次视为循环包装；
/// 3. 自适应实现最多一个；
/// 4. 普通实现的激活元数据绑定到该类第一次出现的名称，且不得在 `before`/`after` 中引用自身名称。
pub(crate) fn load<T: ?Sized + ExtensionPoint>(
    catalog: &HashMap<&'static str, Arc<ExtensionClass<T>>>,
    sources: &[Arc<dyn DescriptorSource>],
) -> ExtensionResult<LoadedPoint<T>> {
    let point = T::NAME;
    let mut bindings: HashMap<String, Arc<ExtensionClass<T>>> = HashMap::new();
    let mut origins: HashMap<String, Binding> = HashMap::new();
    let mut order = Vec::new();
    let mut wrappers: Vec<Arc<ExtensionClass<T>>> = Vec::new();
    let mut wrapper_ids = HashSet::new();
    let mut adaptive: Option<Arc<ExtensionClass<T>>> = None;
    let mut activatable = Vec::new();
    let mut activated_classes = HashSet::new();

    for source in sources {
        let Some(text) = source.read(point)? else {
            continue;
        };
        for line in parse(point, source.name(), &text)? {
            let class = catalog.get(line.identifier.as_str()).ok_or_else(|| {
                ExtensionError::load(
                    point,
                    format!(
                        "{}:{}: unknown implementation identifier `{}`",
                        source.name(),
                        line.line,
                        line.identifier
                    ),
                )
            })?;

            match class.kind() {
                ClassKind::Wrapper => {
                    if !wrapper_ids.insert(class.identifier()) {
                        return Err(ExtensionError::load(
                            point,
                            format!(
                                "wrapper `{}` is listed more than once (circular wrapper)",
                                class.identifier()
                            ),
                        ));
                    }
                    wrappers.push(Arc::clone(class));
                }
                ClassKind::Adaptive => match &adaptive {
                    Some(existing) if existing.identifier() != class.identifier() => {
                        return Err(ExtensionError::load(
                            point,
                            format!(
                                "more than one adaptive class: `{}` and `{}`",
                                existing.identifier(),
                                class.identifier()
                            ),
                        ));
                    }
                    Some(_) => {}
                    None => adaptive = Some(Arc::clone(class)),
                },
                ClassKind::Plain => {
                    if let Some(activation) = class.activation() {
                        if let Some(reference) = activation.references_any(&line.names) {
                            return Err(ExtensionError::load(
                                point,
                                format!(
                                    "`{}` orders itself relative to its own name `{reference}`",
                                    class.identifier()
                                ),
                            ));
                        }
                    }

                    for name in &line.names {
                        if let Some(existing) = origins.get(name) {
                            if existing.identifier != class.identifier() {
                                return Err(ExtensionError::load(
                                    point,
                                    format!(
                                        "duplicate extension name `{name}`: `{}` from {} conflicts with `{}` from {}",
                                        existing.identifier,
                                        existing.source,
                                        class.identifier(),
                                        source.name()
                                    ),
                                ));
                            }
                            continue;
                        }

                        origins.insert(
                            name.clone(),
                            Binding {
                                identifier: class.identifier().to_owned(),
                                source: source.name().to_owned(),
                            },
                        );
                        bindings.insert(name.clone(), Arc::clone(class));
                        order.push(name.clone());

                        if let Some(activation) = class.activation() {
                            if activated_classes.insert(class.identifier()) {
                                activatable.push(ActivatableEntry {
                                    name: name.clone(),
                                    index: order.len() - 1,
                                    activation: activation.clone(),
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    debug!(
        target: TARGET,
        point,
        extensions = order.len(),
        wrappers = wrappers.len(),
        adaptive = adaptive.is_some(),
        "extension point loaded"
    );

    Ok(LoadedPoint {
        bindings,
        order,
        wrappers,
        adaptive,
        activatable,
    })
}

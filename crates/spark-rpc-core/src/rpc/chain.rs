use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tracing::debug;

use super::{Filter, Invocation, Invoker, Next, Role, RpcResult, ServiceInterface};
use crate::{
    address::CallAddress,
    error::{ExtensionResult, RpcOutcome},
    extension::{ActivationQuery, ExtensionScope},
};

const TARGET: &str = "spark.rpc.filter";

/// 过滤链中的一层：持有过滤器与独占的下一层。
struct FilterNode {
    name: String,
    filter: Arc<dyn Filter>,
    next: Arc<dyn Invoker>,
}

#[async_trait]
impl Invoker for FilterNode {
    fn interface(&self) -> &ServiceInterface {
        self.next.interface()
    }

    fn address(&self) -> &CallAddress {
        self.next.address()
    }

    fn is_available(&self) -> bool {
        self.next.is_available()
    }

    fn destroy(&self) {
        self.next.destroy();
    }

    async fn invoke(&self, invocation: &mut Invocation) -> RpcOutcome<RpcResult> {
        debug!(
            target: TARGET,
            filter = %self.name,
            method = invocation.method_name(),
            "entering filter"
        );
        self.filter
            .invoke(Next::new(Arc::clone(&self.next)), invocation)
            .await
    }
}

/// 过滤链构建器。
///
/// # 逻辑解析（How）
/// 1. 以 `role` 的分组与显式名单键（消费端 `reference.filter`、提供端 `service.filter`）向
///    `dyn Filter` 注册表请求激活结果，得到有序过滤器列表；
/// 2. 自内向外嵌套：列表中的第一个过滤器位于最外层，最先看到调用、最后看到结果。
///
/// # 契约说明（What）
/// - 构建结果不可变；地址变化时应重新构建新链，而不是修改旧链；
/// - 作用域未登记 `dyn Filter` 时返回 [`ExtensionError::UnknownPoint`](crate::error::ExtensionError::UnknownPoint)。
#[derive(Clone, Debug)]
pub struct FilterChainBuilder {
    scope: ExtensionScope,
}

impl FilterChainBuilder {
    pub fn new(scope: &ExtensionScope) -> Self {
        Self {
            scope: scope.clone(),
        }
    }

    pub fn build(&self, terminal: Arc<dyn Invoker>, role: Role) -> ExtensionResult<FilterChain> {
        let query = ActivationQuery::new()
            .with_key(role.filter_key())
            .with_group(role.group());
        let activated = self
            .scope
            .activate::<dyn Filter>(terminal.address(), &query)?;

        let names: Vec<String> = activated.iter().map(|entry| entry.name.clone()).collect();
        let mut head = Arc::clone(&terminal);
        for entry in activated.into_iter().rev() {
            let node: Arc<dyn Invoker> = Arc::new(FilterNode {
                name: entry.name,
                filter: entry.extension,
                next: head,
            });
            head = node;
        }

        debug!(
            target: TARGET,
            interface = %terminal.interface(),
            role = role.group(),
            filters = ?names,
            "filter chain built"
        );
        Ok(FilterChain {
            names,
            head,
            terminal,
        })
    }
}

/// 组装完成的过滤链，本身也是一个 Invoker。
pub struct FilterChain {
    names: Vec<String>,
    head: Arc<dyn Invoker>,
    terminal: Arc<dyn Invoker>,
}

impl FilterChain {
    /// 过滤器名称，外层在前。
    pub fn filter_names(&self) -> &[String] {
        &self.names
    }

    pub fn terminal(&self) -> &Arc<dyn Invoker> {
        &self.terminal
    }

    pub fn into_invoker(self) -> Arc<dyn Invoker> {
        Arc::new(self)
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("interface", self.terminal.interface())
            .field("filters", &self.names)
            .finish()
    }
}

#[async_trait]
impl Invoker for FilterChain {
    fn interface(&self) -> &ServiceInterface {
        self.terminal.interface()
    }

    fn address(&self) -> &CallAddress {
        self.terminal.address()
    }

    fn is_available(&self) -> bool {
        self.head.is_available()
    }

    fn destroy(&self) {
        self.head.destroy();
    }

    async fn invoke(&self, invocation: &mut Invocation) -> RpcOutcome<RpcResult> {
        Next::new(Arc::clone(&self.head)).invoke(invocation).await
    }
}

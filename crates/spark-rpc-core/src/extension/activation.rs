//! 激活元数据与排序。
//!
//! # 契约说明（What）
//! - [`Activation`] 是注册时附加在实现类上的纯值：分组、激活参数键、排序等级与前后关系；
//! - [`ActivationQuery`] 描述一次激活查询：读取显式名单的地址参数键与调用方角色分组；
//! - 排序规则：在命中的子集上做拓扑排序，`before`/`after` 形成边，入度为零的节点按 `(rank, 注册序号)`
//!   由小到大出队；引用不在子集中的名称被忽略，存在环时返回加载错误。

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
};

use crate::address::CallAddress;

/// 视为“未配置”的参数值。
const INACTIVE_VALUES: [&str; 4] = ["false", "0", "null", "n/a"];

/// 扩展实现的激活元数据。
///
/// # 契约说明（What）
/// - `groups` 为空表示匹配任意分组；
/// - `keys` 为空表示无条件激活；否则地址中任一参数键等于 `key` 或以 `.key` 结尾，且取值不是空串、
///   `false`、`0`、`null`、`N/A` 时才激活；
/// - `rank` 越小越靠前（越靠外层），相同时按注册顺序；
/// - `before`/`after` 引用其他扩展名称，只在同一次激活的命中子集内生效。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Activation {
    groups: Vec<String>,
    keys: Vec<String>,
    rank: i32,
    before: Vec<String>,
    after: Vec<String>,
}

impl Activation {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个所属分组。
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// 追加一个激活参数键。
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }

    pub fn rank(mut self, rank: i32) -> Self {
        self.rank = rank;
        self
    }

    /// 声明本扩展排在 `name` 之前。
    pub fn before(mut self, name: impl Into<String>) -> Self {
        self.before.push(name.into());
        self
    }

    /// 声明本扩展排在 `name` 之后。
    pub fn after(mut self, name: impl Into<String>) -> Self {
        self.after.push(name.into());
        self
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn rank_value(&self) -> i32 {
        self.rank
    }

    pub fn befores(&self) -> &[String] {
        &self.before
    }

    pub fn afters(&self) -> &[String] {
        &self.after
    }

    /// 分组匹配：未声明分组或查询未指定分组时均视为匹配。
    pub fn matches_group(&self, group: Option<&str>) -> bool {
        match group {
            None | Some("") => true,
            Some(group) => self.groups.is_empty() || self.groups.iter().any(|g| g == group),
        }
    }

    /// 参数键匹配。
    pub fn matches_address(&self, address: &CallAddress) -> bool {
        if self.keys.is_empty() {
            return true;
        }
        self.keys.iter().any(|key| {
            let suffix = format!(".{key}");
            address.parameters().iter().any(|(name, value)| {
                (name == key || name.ends_with(&suffix)) && is_active_value(value)
            })
        })
    }

    /// `before`/`after` 是否引用了 `names` 中的任一名称。
    pub(crate) fn references_any(&self, names: &[String]) -> Option<&str> {
        self.before
            .iter()
            .chain(self.after.iter())
            .find(|reference| names.contains(*reference))
            .map(String::as_str)
    }
}

fn is_active_value(value: &str) -> bool {
    !value.is_empty()
        && !INACTIVE_VALUES
            .iter()
            .any(|inactive| value.eq_ignore_ascii_case(inactive))
}

/// 一次激活查询的参数。
#[derive(Clone, Copy, Debug, Default)]
pub struct ActivationQuery<'a> {
    key: Option<&'a str>,
    group: Option<&'a str>,
}

impl<'a> ActivationQuery<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 地址中承载显式名单（`name`、`-name`、`default`、`-default`）的参数键。
    pub fn with_key(mut self, key: &'a str) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_group(mut self, group: &'a str) -> Self {
        self.group = Some(group);
        self
    }

    pub fn key(&self) -> Option<&'a str> {
        self.key
    }

    pub fn group(&self) -> Option<&'a str> {
        self.group
    }
}

/// 参与排序的候选：名称、注册序号与元数据。
pub(crate) struct Candidate<'a> {
    pub(crate) name: &'a str,
    pub(crate) index: usize,
    pub(crate) activation: &'a Activation,
}

/// 返回候选的排序结果（候选在输入切片中的下标）；存在环时返回参与环的名称。
pub(crate) fn order(candidates: &[Candidate<'_>]) -> Result<Vec<usize>, Vec<String>> {
    let positions: HashMap<&str, usize> = candidates
        .iter()
        .enumerate()
        .map(|(position, candidate)| (candidate.name, position))
        .collect();

    let mut successors = vec![Vec::new(); candidates.len()];
    let mut indegree = vec![0usize; candidates.len()];
    for (position, candidate) in candidates.iter().enumerate() {
        for target in &candidate.activation.before {
            if let Some(&other) = positions.get(target.as_str()) {
                successors[position].push(other);
                indegree[other] += 1;
            }
        }
        for source in &candidate.activation.after {
            if let Some(&other) = positions.get(source.as_str()) {
                successors[other].push(position);
                indegree[position] += 1;
            }
        }
    }

    let mut ready = BinaryHeap::new();
    for (position, candidate) in candidates.iter().enumerate() {
        if indegree[position] == 0 {
            ready.push(Reverse((candidate.activation.rank, candidate.index, position)));
        }
    }

    let mut ordered = Vec::with_capacity(candidates.len());
    while let Some(Reverse((_, _, position))) = ready.pop() {
        ordered.push(position);
        for &next in &successors[position] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                let candidate = &candidates[next];
                ready.push(Reverse((candidate.activation.rank, candidate.index, next)));
            }
        }
    }

    if ordered.len() == candidates.len() {
        Ok(ordered)
    } else {
        Err(candidates
            .iter()
            .enumerate()
            .filter(|(position, _)| indegree[*position] > 0)
            .map(|(_, candidate)| candidate.name.to_owned())
            .collect())
    }
}

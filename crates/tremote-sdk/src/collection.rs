//! 集合同步引擎
//!
//! 持有权威的无序快照和派生的"排序 + 过滤"投影，投影是视图唯一
//! 观察到的序列。每次快照替换、排序列切换或过滤条件变更都会重算
//! 投影，并返回旧投影到新投影的编辑脚本。
//!
//! 不变式：
//! - 投影顺序是 (快照, 排序列, 过滤) 的严格函数，相同输入必得相同顺序
//! - 比较器经 ID 决胜后是全序，保证差分稳定
//! - 本引擎是快照与投影的唯一写者；脚本的应用与选中读取都应发生在
//!   消费视图的同一逻辑线程上

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::changeset::{diff, Differentiable, EditScript};
use crate::error::{Result, TremoteSDKError};

/// 三路比较器
pub type Comparator<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// 过滤谓词；`None` 时投影等于完整快照
pub type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// 集合同步引擎
///
/// `K` 是排序列的封闭枚举；列 → 比较器的映射表在构造时一次给齐，
/// 新增列是表编辑而不是控制流修改。
pub struct CollectionEngine<T, K>
where
    T: Differentiable + Clone,
    K: Eq + Hash + Copy + fmt::Debug,
{
    snapshot: Vec<T>,
    projection: Vec<T>,
    comparators: HashMap<K, Comparator<T>>,
    sort_key: K,
    filter: Option<Predicate<T>>,
}

impl<T, K> CollectionEngine<T, K>
where
    T: Differentiable + Clone,
    K: Eq + Hash + Copy + fmt::Debug,
{
    pub fn new(comparators: HashMap<K, Comparator<T>>, sort_key: K) -> Result<Self> {
        if !comparators.contains_key(&sort_key) {
            return Err(TremoteSDKError::InvalidArgument(format!(
                "未注册的排序列: {:?}",
                sort_key
            )));
        }
        Ok(Self {
            snapshot: Vec::new(),
            projection: Vec::new(),
            comparators,
            sort_key,
            filter: None,
        })
    }

    /// 整体替换快照（服务端不做增量合并，最近一次抓取即权威），
    /// 返回旧投影到新投影的编辑脚本
    pub fn set_snapshot(&mut self, snapshot: Vec<T>) -> EditScript<T> {
        self.snapshot = snapshot;
        self.reproject()
    }

    /// 切换排序列；永远整体重排后差分，不做增量调序
    pub fn set_sort_key(&mut self, key: K) -> Result<EditScript<T>> {
        if !self.comparators.contains_key(&key) {
            return Err(TremoteSDKError::InvalidArgument(format!(
                "未注册的排序列: {:?}",
                key
            )));
        }
        self.sort_key = key;
        Ok(self.reproject())
    }

    /// 设置或清除过滤谓词
    pub fn set_filter(&mut self, filter: Option<Predicate<T>>) -> EditScript<T> {
        self.filter = filter;
        self.reproject()
    }

    /// 把当前投影位置映射回条目；越界下标直接跳过
    pub fn selected_entities(&self, indices: &[usize]) -> Vec<T> {
        indices
            .iter()
            .filter_map(|&i| self.projection.get(i).cloned())
            .collect()
    }

    pub fn projection(&self) -> &[T] {
        &self.projection
    }

    pub fn snapshot(&self) -> &[T] {
        &self.snapshot
    }

    pub fn sort_key(&self) -> K {
        self.sort_key
    }

    pub fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }

    pub fn len(&self) -> usize {
        self.projection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projection.is_empty()
    }

    fn reproject(&mut self) -> EditScript<T> {
        let new_projection = self.compute_projection();
        let script = diff(&self.projection, &new_projection);
        self.projection = new_projection;
        script
    }

    fn compute_projection(&self) -> Vec<T> {
        let mut rows: Vec<T> = match &self.filter {
            Some(predicate) => self
                .snapshot
                .iter()
                .filter(|e| predicate(*e))
                .cloned()
                .collect(),
            None => self.snapshot.clone(),
        };
        // sort_key 在构造与切换时都已校验过，查表必中；
        // ID 决胜把比较器补成全序，同输入必得同序
        if let Some(cmp) = self.comparators.get(&self.sort_key) {
            rows.sort_by(|a, b| cmp(a, b).then_with(|| a.diff_id().cmp(&b.diff_id())));
        }
        rows
    }
}

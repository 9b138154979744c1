//! 投影差分 - 把两个有序投影之间的差异压缩成分阶段的最小编辑脚本
//!
//! 算法约定：
//! - 新旧投影都以条目 ID 为键；ID 在单个快照内唯一
//! - 两边都有但位置变化的条目是 Move；只在新投影出现的是 Insert；
//!   只在旧投影出现的是 Delete；内容变化的条目按旧位置发 Update
//! - Move 集合必须最小：对共同 ID（按旧位置排列）的新位置序列求
//!   最长递增子序列，落在 LIS 上的条目原地不动，其余全部作为 Move
//! - 输出分阶段：每个阶段的位置都以"前序阶段全部应用之后"的序列为
//!   坐标系，按序回放即可精确重建新投影
//!
//! 阶段顺序固定为 更新 → 删除 → 移动 → 插入。把不同类操作拆进独立
//! 阶段，是为了避开同阶段内删除/插入/移动交错时坐标互相踩踏的组合。

use std::collections::{HashMap, HashSet};

/// 可差分条目：以整数 ID 为身份，内容相等性用于判定 Update
pub trait Differentiable {
    fn diff_id(&self) -> i64;
    fn content_equal(&self, other: &Self) -> bool;
}

/// 一次行移动。语义：先 `remove(from)`，再在缩短后的序列上 `insert(to)`。
///
/// `from >= to` 是上移，`from < to` 是下移；两种方向都会出现
/// （例如共同序列 [C,A,B] → [A,B,C] 只能用一次下移完成）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowMove {
    pub from: usize,
    pub to: usize,
}

/// 编辑脚本中的一个阶段
#[derive(Debug, Clone)]
pub struct Stage<T> {
    /// 待删除位置（相对本阶段输入序列）
    pub deletes: Vec<usize>,
    /// 待插入的（最终位置，条目）
    pub inserts: Vec<(usize, T)>,
    /// 原位内容刷新（位置，新内容）
    pub updates: Vec<(usize, T)>,
    /// 行移动，按脚本顺序回放
    pub moves: Vec<RowMove>,
}

impl<T> Stage<T> {
    fn empty() -> Self {
        Self {
            deletes: Vec::new(),
            inserts: Vec::new(),
            updates: Vec::new(),
            moves: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty()
            && self.inserts.is_empty()
            && self.updates.is_empty()
            && self.moves.is_empty()
    }
}

/// 两个投影之间的分阶段编辑脚本
///
/// 不变式：把各阶段按序应用到旧投影上，结果与 `final_rows` 完全一致。
#[derive(Debug, Clone)]
pub struct EditScript<T> {
    pub stages: Vec<Stage<T>>,
    /// 新投影的完整数据（视图不在屏上时直接整体替换用）
    pub final_rows: Vec<T>,
}

impl<T> EditScript<T> {
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn delete_count(&self) -> usize {
        self.stages.iter().map(|s| s.deletes.len()).sum()
    }

    pub fn insert_count(&self) -> usize {
        self.stages.iter().map(|s| s.inserts.len()).sum()
    }

    pub fn update_count(&self) -> usize {
        self.stages.iter().map(|s| s.updates.len()).sum()
    }

    pub fn move_count(&self) -> usize {
        self.stages.iter().map(|s| s.moves.len()).sum()
    }
}

/// 计算 old → new 的编辑脚本
pub fn diff<T>(old: &[T], new: &[T]) -> EditScript<T>
where
    T: Differentiable + Clone,
{
    let old_pos: HashMap<i64, usize> = old
        .iter()
        .enumerate()
        .map(|(i, e)| (e.diff_id(), i))
        .collect();
    let new_pos: HashMap<i64, usize> = new
        .iter()
        .enumerate()
        .map(|(i, e)| (e.diff_id(), i))
        .collect();

    // 更新：两边都有且内容变化的条目。位置不变的是经典 Update；
    // 即将移动的条目也在这里刷新内容，移动本身只负责搬位置。
    let mut updates: Vec<(usize, T)> = Vec::new();
    for (i, e) in old.iter().enumerate() {
        if let Some(&j) = new_pos.get(&e.diff_id()) {
            if !e.content_equal(&new[j]) {
                updates.push((i, new[j].clone()));
            }
        }
    }

    // 删除：只在旧投影里出现的条目，旧位置为坐标
    let deletes: Vec<usize> = old
        .iter()
        .enumerate()
        .filter(|(_, e)| !new_pos.contains_key(&e.diff_id()))
        .map(|(i, _)| i)
        .collect();

    // 共同条目按旧顺序排列，取它们的新位置序列求 LIS
    let common: Vec<i64> = old
        .iter()
        .map(|e| e.diff_id())
        .filter(|id| new_pos.contains_key(id))
        .collect();
    let rank_of = |id: &i64| -> usize { new_pos[id] };
    let seq: Vec<usize> = common.iter().map(rank_of).collect();
    let keep = longest_increasing_subsequence(&seq);
    let kept: HashSet<usize> = keep.iter().copied().collect();

    // 移动：非 LIS 条目按新位置升序逐个落位。
    // working 模拟删除阶段之后的序列；settled 是已处于正确相对位置的
    // 条目（LIS + 已移动者）。每个移动条目插到"最后一个新位置比它小的
    // 已落位条目"之后，记录下来的 (from, to) 对按序回放即精确。
    let mut working: Vec<i64> = common.clone();
    let mut settled: HashSet<i64> = keep.iter().map(|&k| common[k]).collect();
    let mut movers: Vec<i64> = (0..common.len())
        .filter(|k| !kept.contains(k))
        .map(|k| common[k])
        .collect();
    movers.sort_unstable_by_key(rank_of);

    let mut moves: Vec<RowMove> = Vec::new();
    for id in movers {
        let from = match working.iter().position(|&x| x == id) {
            Some(p) => p,
            None => continue,
        };
        working.remove(from);
        let rank = rank_of(&id);
        let mut to = 0usize;
        for (idx, x) in working.iter().enumerate() {
            if settled.contains(x) && rank_of(x) < rank {
                to = idx + 1;
            }
        }
        working.insert(to, id);
        settled.insert(id);
        if from != to {
            moves.push(RowMove { from, to });
        }
    }

    // 插入：只在新投影里出现的条目，最终位置为坐标
    let inserts: Vec<(usize, T)> = new
        .iter()
        .enumerate()
        .filter(|(_, e)| !old_pos.contains_key(&e.diff_id()))
        .map(|(j, e)| (j, e.clone()))
        .collect();

    let mut stages: Vec<Stage<T>> = Vec::new();
    if !updates.is_empty() {
        let mut stage = Stage::empty();
        stage.updates = updates;
        stages.push(stage);
    }
    if !deletes.is_empty() {
        let mut stage = Stage::empty();
        stage.deletes = deletes;
        stages.push(stage);
    }
    if !moves.is_empty() {
        let mut stage = Stage::empty();
        stage.moves = moves;
        stages.push(stage);
    }
    if !inserts.is_empty() {
        let mut stage = Stage::empty();
        stage.inserts = inserts;
        stages.push(stage);
    }

    EditScript {
        stages,
        final_rows: new.to_vec(),
    }
}

/// 最长严格递增子序列，返回入参序列中的下标集合（升序）
///
/// patience 算法，O(n log n)；tails 保存每个长度的最小结尾下标，
/// prev 记录前驱用于回溯。
pub(crate) fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    if seq.is_empty() {
        return Vec::new();
    }
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];
    for i in 0..seq.len() {
        let pos = tails.partition_point(|&t| seq[t] < seq[i]);
        if pos > 0 {
            prev[i] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }
    let mut out = Vec::with_capacity(tails.len());
    let mut cur = tails.last().copied();
    while let Some(i) = cur {
        out.push(i);
        cur = prev[i];
    }
    out.reverse();
    out
}

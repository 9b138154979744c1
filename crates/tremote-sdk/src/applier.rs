//! 编辑脚本应用器
//!
//! 消费 [`EditScript`]，逐阶段作用到一个外部有序视图上。视图通过
//! [`RowView`] 抽象暴露删除/插入/移动等按位置的原语。
//!
//! 阶段内的执行顺序固定：删除（按位置降序，前面的删除不会使后面的
//! 下标失效）→ 插入（按位置升序）→ 原位刷新 → 移动。移动的坐标在
//! 差分阶段已经按回放顺序解析好，上移（from ≥ to）和下移（from < to）
//! 都按 `remove(from)` + `insert(to)` 的语义直接执行。
//!
//! 视图不在屏上（detached）时跳过增量路径，直接用脚本的最终数据整体
//! 替换，省去对不可见状态的逐行编辑。

use thiserror::Error;

use crate::changeset::EditScript;

/// 应用前的脚本校验错误。
///
/// 脚本与视图长度不匹配说明两者脱节（例如漏应用了上一个脚本），
/// 此时任何一行都不会被修改。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApplyError {
    #[error("第 {stage} 阶段删除位置 {index} 越界（序列长度 {len}）")]
    DeleteOutOfBounds { stage: usize, index: usize, len: usize },
    #[error("第 {stage} 阶段插入位置 {index} 越界（序列长度 {len}）")]
    InsertOutOfBounds { stage: usize, index: usize, len: usize },
    #[error("第 {stage} 阶段更新位置 {index} 越界（序列长度 {len}）")]
    UpdateOutOfBounds { stage: usize, index: usize, len: usize },
    #[error("第 {stage} 阶段移动 {from}->{to} 越界（序列长度 {len}）")]
    MoveOutOfBounds { stage: usize, from: usize, to: usize, len: usize },
    #[error("脚本回放后的长度 {expected} 与最终数据长度 {actual} 不一致")]
    LengthMismatch { expected: usize, actual: usize },
}

/// 外部有序视图的最小操作面
///
/// `move_row` 的语义是先 `remove(from)`，再在缩短后的序列上
/// `insert(to)`，与 [`crate::changeset::RowMove`] 的坐标约定一致。
pub trait RowView<T> {
    /// 视图当前是否已挂载（不在屏上时走整体替换路径）
    fn is_attached(&self) -> bool;
    fn len(&self) -> usize;
    fn replace_all(&mut self, rows: &[T]);
    fn remove_row(&mut self, index: usize);
    fn insert_row(&mut self, index: usize, row: &T);
    fn refresh_row(&mut self, index: usize, row: &T);
    fn move_row(&mut self, from: usize, to: usize);
}

/// 编辑脚本应用器（无状态）
pub struct ChangesetApplier;

impl ChangesetApplier {
    /// 把脚本逐阶段应用到视图上
    pub fn apply<T: Clone>(script: &EditScript<T>, view: &mut dyn RowView<T>) -> Result<(), ApplyError> {
        if script.is_empty() {
            return Ok(());
        }
        if !view.is_attached() {
            view.replace_all(&script.final_rows);
            return Ok(());
        }

        Self::validate(script, view.len())?;

        for stage in &script.stages {
            let mut deletes = stage.deletes.clone();
            deletes.sort_unstable_by(|a, b| b.cmp(a));
            for &index in &deletes {
                view.remove_row(index);
            }

            let mut inserts: Vec<&(usize, T)> = stage.inserts.iter().collect();
            inserts.sort_by_key(|entry| entry.0);
            for (index, row) in inserts {
                view.insert_row(*index, row);
            }

            for (index, row) in &stage.updates {
                view.refresh_row(*index, row);
            }

            for mv in &stage.moves {
                if mv.from != mv.to {
                    view.move_row(mv.from, mv.to);
                }
            }
        }
        Ok(())
    }

    /// 在动手之前对整个脚本做坐标校验，失败时视图保持原样
    fn validate<T>(script: &EditScript<T>, initial_len: usize) -> Result<(), ApplyError> {
        let mut len = initial_len;
        for (stage_index, stage) in script.stages.iter().enumerate() {
            for &index in &stage.deletes {
                if index >= len {
                    return Err(ApplyError::DeleteOutOfBounds { stage: stage_index, index, len });
                }
            }
            if stage.deletes.len() > len {
                return Err(ApplyError::LengthMismatch {
                    expected: len,
                    actual: stage.deletes.len(),
                });
            }
            len -= stage.deletes.len();

            // 升序逐个插入时，第 k 个插入最多允许落在 len + k 处
            let mut insert_positions: Vec<usize> = stage.inserts.iter().map(|(i, _)| *i).collect();
            insert_positions.sort_unstable();
            for (k, &index) in insert_positions.iter().enumerate() {
                if index > len + k {
                    return Err(ApplyError::InsertOutOfBounds { stage: stage_index, index, len });
                }
            }
            len += stage.inserts.len();

            for &(index, _) in &stage.updates {
                if index >= len {
                    return Err(ApplyError::UpdateOutOfBounds { stage: stage_index, index, len });
                }
            }

            for mv in &stage.moves {
                if mv.from >= len || mv.to >= len {
                    return Err(ApplyError::MoveOutOfBounds {
                        stage: stage_index,
                        from: mv.from,
                        to: mv.to,
                        len,
                    });
                }
            }
        }
        if len != script.final_rows.len() {
            return Err(ApplyError::LengthMismatch {
                expected: len,
                actual: script.final_rows.len(),
            });
        }
        Ok(())
    }
}

/// `Vec` 背后的视图适配器，供测试和无界面消费方使用
#[derive(Debug, Clone)]
pub struct VecView<T> {
    pub rows: Vec<T>,
    pub attached: bool,
}

impl<T: Clone> VecView<T> {
    pub fn attached(rows: Vec<T>) -> Self {
        Self { rows, attached: true }
    }

    pub fn detached(rows: Vec<T>) -> Self {
        Self { rows, attached: false }
    }
}

impl<T: Clone> RowView<T> for VecView<T> {
    fn is_attached(&self) -> bool {
        self.attached
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn replace_all(&mut self, rows: &[T]) {
        self.rows = rows.to_vec();
    }

    fn remove_row(&mut self, index: usize) {
        self.rows.remove(index);
    }

    fn insert_row(&mut self, index: usize, row: &T) {
        self.rows.insert(index, row.clone());
    }

    fn refresh_row(&mut self, index: usize, row: &T) {
        self.rows[index] = row.clone();
    }

    fn move_row(&mut self, from: usize, to: usize) {
        let row = self.rows.remove(from);
        self.rows.insert(to, row);
    }
}

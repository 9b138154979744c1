//! KV 存储模块 - 基于 sled 的键值存储
//!
//! 本模块提供：
//! - 进程重启后仍然可用的键值存储（会话令牌依赖它跨进程存活）
//! - JSON 序列化的类型化读写
//! - 常用键名常量

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sled::{Db, Tree};

use crate::error::{Result, TremoteSDKError};

const TREE_NAME: &str = "remote";

/// KV 存储组件
#[derive(Debug)]
pub struct KvStore {
    #[allow(dead_code)]
    base_path: PathBuf,
    #[allow(dead_code)]
    db: Db,
    tree: Tree,
}

impl KvStore {
    /// 打开（或创建）KV 存储
    pub async fn open(base_path: &Path) -> Result<Self> {
        let base_path = base_path.to_path_buf();
        let kv_path = base_path.join("kv");

        tokio::fs::create_dir_all(&kv_path)
            .await
            .map_err(|e| TremoteSDKError::IO(format!("创建 KV 存储目录失败: {}", e)))?;

        // 打开 sled 数据库（上一个实例可能刚释放锁，重试多次带退避）
        const MAX_OPEN_RETRIES: u32 = 8;
        const RETRY_DELAY_MS: u64 = 300;
        let mut db_opt: Option<Db> = None;
        let mut last_err: Option<sled::Error> = None;
        for attempt in 0..MAX_OPEN_RETRIES {
            match sled::open(&kv_path) {
                Ok(d) => {
                    db_opt = Some(d);
                    break;
                }
                Err(e) => {
                    let msg = format!("{}", e);
                    last_err = Some(e);
                    let is_lock = msg.contains("could not acquire lock")
                        || msg.contains("Resource temporarily unavailable")
                        || msg.contains("WouldBlock");
                    if is_lock && attempt + 1 < MAX_OPEN_RETRIES {
                        let delay_ms = RETRY_DELAY_MS * (1 << attempt);
                        tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                    } else {
                        break;
                    }
                }
            }
        }
        let db = db_opt.ok_or_else(|| {
            TremoteSDKError::KvStore(
                last_err
                    .map(|e| format!("打开 sled 数据库失败: {}", e))
                    .unwrap_or_else(|| "打开 sled 数据库失败".to_string()),
            )
        })?;

        let tree = db
            .open_tree(TREE_NAME)
            .map_err(|e| TremoteSDKError::KvStore(format!("打开 Tree 失败: {}", e)))?;

        Ok(Self {
            base_path,
            db,
            tree,
        })
    }

    /// 设置键值对
    pub fn set<K, V>(&self, key: K, value: &V) -> Result<()>
    where
        K: AsRef<[u8]>,
        V: Serialize,
    {
        let value_bytes = serde_json::to_vec(value)
            .map_err(|e| TremoteSDKError::Serialization(format!("序列化值失败: {}", e)))?;

        self.tree
            .insert(key, value_bytes)
            .map_err(|e| TremoteSDKError::KvStore(format!("设置键值对失败: {}", e)))?;
        self.tree
            .flush()
            .map_err(|e| TremoteSDKError::KvStore(format!("刷新 KV 存储失败: {}", e)))?;

        Ok(())
    }

    /// 获取键值对
    pub fn get<K, V>(&self, key: K) -> Result<Option<V>>
    where
        K: AsRef<[u8]>,
        V: for<'de> Deserialize<'de>,
    {
        let result = self
            .tree
            .get(key)
            .map_err(|e| TremoteSDKError::KvStore(format!("获取键值对失败: {}", e)))?;

        match result {
            Some(value_bytes) => {
                let value = serde_json::from_slice(&value_bytes)
                    .map_err(|e| TremoteSDKError::Serialization(format!("反序列化值失败: {}", e)))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// 删除键值对
    pub fn delete<K>(&self, key: K) -> Result<()>
    where
        K: AsRef<[u8]>,
    {
        self.tree
            .remove(key)
            .map_err(|e| TremoteSDKError::KvStore(format!("删除键值对失败: {}", e)))?;
        Ok(())
    }

    /// 检查键是否存在
    pub fn exists<K>(&self, key: K) -> Result<bool>
    where
        K: AsRef<[u8]>,
    {
        self.tree
            .contains_key(key)
            .map_err(|e| TremoteSDKError::KvStore(format!("检查键存在失败: {}", e)))
    }
}

/// 常用的键名常量
pub mod keys {
    /// RPC 会话令牌（固定键名，跨进程重启复用）
    pub const SESSION_TOKEN: &str = "session_token";
}

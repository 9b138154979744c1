//! 存储模块
//!
//! 本 SDK 唯一需要落盘的状态是 RPC 会话令牌，用一个 sled KV 库承载。

pub mod kv;

pub use kv::{keys, KvStore};

//! 事件系统模块
//!
//! 功能包括：
//! - 请求开始/结束事件（驱动忙碌指示器）
//! - 快照抓取完成/失败事件
//! - 会话信息与令牌变更事件
//! - 事件广播和订阅机制
//!
//! 取代进程级通知中心：事件通过构造时传入的 `EventManager` 广播，
//! 订阅方拿到的是类型化的 `RemoteEvent`，没有全局状态。

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// SDK 事件类型
#[derive(Debug, Clone)]
pub enum RemoteEvent {
    /// 一次 RPC 请求开始（携带当前在途请求数）
    RequestStarted { in_flight: usize },
    /// 一次 RPC 请求结束
    RequestFinished { in_flight: usize },
    /// 一轮快照抓取完成
    TorrentsFetched { count: usize },
    /// 一轮快照抓取失败（已在驱动层吞掉，仅用于观测）
    FetchFailed { reason: String },
    /// session-get 刷新完成
    SessionUpdated { version: String },
    /// 会话令牌被服务端换新
    SessionTokenRenewed,
}

/// 事件管理器
///
/// 内部是一个 `tokio::sync::broadcast` 通道；没有订阅者时事件被静默丢弃。
pub struct EventManager {
    sender: broadcast::Sender<RemoteEvent>,
}

impl EventManager {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    /// 订阅事件流
    pub fn subscribe(&self) -> broadcast::Receiver<RemoteEvent> {
        self.sender.subscribe()
    }

    /// 广播一个事件
    pub fn emit(&self, event: RemoteEvent) {
        if self.sender.send(event).is_err() {
            debug!("事件无订阅者，已丢弃");
        }
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

//! 周期同步驱动
//!
//! 定时调用 torrent-get 抓取全量快照，通过 mpsc 通道交给消费视图的
//! 单一逻辑线程（由它驱动 CollectionEngine 并应用编辑脚本）。
//!
//! 行为约定：
//! - 前台/后台两档轮询间隔，运行期可切换，切换后立即按新间隔计时
//! - 上一轮抓取未完成时跳过本轮 tick，不允许重叠抓取
//! - 单次抓取失败只记录日志并广播事件，不打断周期轮询
//! - `refresh_now()` 强制立刻抓取一轮（变更操作之后用）

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::RemoteConfig;
use crate::events::{EventManager, RemoteEvent};
use crate::gateway::RpcGateway;
use crate::torrent::Torrent;

/// 轮询档位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    Foreground,
    Background,
}

/// 周期同步驱动
pub struct SyncDriver {
    gateway: Arc<RpcGateway>,
    events: Arc<EventManager>,
    foreground_interval: Duration,
    background_interval: Duration,
    mode_tx: watch::Sender<PollMode>,
    refresh_tx: mpsc::Sender<()>,
    refresh_rx: Mutex<Option<mpsc::Receiver<()>>>,
    fetch_in_flight: Arc<AtomicBool>,
    last_fetched_at: Arc<RwLock<Option<DateTime<Utc>>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncDriver {
    pub fn new(
        gateway: Arc<RpcGateway>,
        events: Arc<EventManager>,
        config: &RemoteConfig,
    ) -> Arc<Self> {
        let (mode_tx, _) = watch::channel(PollMode::Foreground);
        // 容量 1：抓取进行中时重复的 refresh 请求直接合并
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        Arc::new(Self {
            gateway,
            events,
            foreground_interval: config.foreground_interval(),
            background_interval: config.background_interval(),
            mode_tx,
            refresh_tx,
            refresh_rx: Mutex::new(Some(refresh_rx)),
            fetch_in_flight: Arc::new(AtomicBool::new(false)),
            last_fetched_at: Arc::new(RwLock::new(None)),
            task: Mutex::new(None),
        })
    }

    /// 启动轮询循环；快照经 `snapshot_tx` 交给消费侧
    pub fn start(self: Arc<Self>, snapshot_tx: mpsc::UnboundedSender<Vec<Torrent>>) {
        let mut refresh_rx = match self.refresh_rx.lock().take() {
            Some(rx) => rx,
            None => {
                warn!("SyncDriver 已经启动，忽略重复 start");
                return;
            }
        };

        let driver = self.clone();
        let handle = tokio::spawn(async move {
            let mut mode_rx = driver.mode_tx.subscribe();
            loop {
                let interval = match *mode_rx.borrow() {
                    PollMode::Foreground => driver.foreground_interval,
                    PollMode::Background => driver.background_interval,
                };
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    changed = mode_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        debug!("轮询档位切换: {:?}", *mode_rx.borrow());
                        // 用新间隔重新计时
                        continue;
                    }
                    received = refresh_rx.recv() => {
                        if received.is_none() {
                            break;
                        }
                    }
                }
                if snapshot_tx.is_closed() {
                    break;
                }
                Self::tick(driver.clone(), snapshot_tx.clone());
            }
            debug!("SyncDriver 轮询循环退出");
        });
        *self.task.lock() = Some(handle);
    }

    /// 执行一轮 tick：上一轮抓取未完成则跳过
    fn tick(driver: Arc<Self>, snapshot_tx: mpsc::UnboundedSender<Vec<Torrent>>) {
        if driver.fetch_in_flight.swap(true, AtomicOrdering::SeqCst) {
            debug!("上一轮抓取尚未完成，跳过本次轮询");
            return;
        }
        tokio::spawn(async move {
            match driver.gateway.torrent_get().await {
                Ok(torrents) => {
                    *driver.last_fetched_at.write() = Some(Utc::now());
                    driver
                        .events
                        .emit(RemoteEvent::TorrentsFetched { count: torrents.len() });
                    if snapshot_tx.send(torrents).is_err() {
                        debug!("快照消费端已关闭");
                    }
                }
                Err(e) => {
                    // 一次坏 tick 不应打断周期轮询：吞掉错误，只留痕
                    warn!("抓取 torrent 快照失败: {}", e);
                    driver
                        .events
                        .emit(RemoteEvent::FetchFailed { reason: e.to_string() });
                }
            }
            driver.fetch_in_flight.store(false, AtomicOrdering::SeqCst);
        });
    }

    /// 切换前台/后台轮询档位
    pub fn set_mode(&self, mode: PollMode) {
        self.mode_tx.send_replace(mode);
    }

    pub fn mode(&self) -> PollMode {
        *self.mode_tx.borrow()
    }

    /// 强制立即抓取一轮（已有待处理的刷新请求时合并）
    pub fn refresh_now(&self) {
        let _ = self.refresh_tx.try_send(());
    }

    pub fn is_fetch_in_flight(&self) -> bool {
        self.fetch_in_flight.load(AtomicOrdering::SeqCst)
    }

    /// 最近一次成功抓取的时间
    pub fn last_fetched_at(&self) -> Option<DateTime<Utc>> {
        *self.last_fetched_at.read()
    }

    /// 停止轮询循环
    pub fn shutdown(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for SyncDriver {
    fn drop(&mut self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}

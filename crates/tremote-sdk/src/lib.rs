//! Tremote SDK - Transmission 守护进程的远程控制 SDK
//!
//! 本 SDK 提供桌面远程控制客户端需要的全部非 UI 能力，包括：
//! - 🔑 会话层：透明协商/续期不透明会话令牌，授权失败精确重发一次
//! - 📡 RPC 网关：torrent-get/add/start/stop/remove/set 等领域操作的类型安全封装
//! - 🔄 周期同步：前台/后台双间隔轮询，不重叠抓取，坏 tick 不中断
//! - 📋 集合引擎：排序 + 过滤投影，快照替换时产出最小的分阶段编辑脚本
//! - 🎞 脚本应用：把编辑脚本逐阶段作用到外部有序视图，视图离屏时整体替换
//! - ⚙️ 事件系统：类型化的事件广播（请求计数、抓取结果、令牌续期）
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use tremote_sdk::{RemoteConfig, RemoteService, SortColumn};
//! use tremote_sdk::collection::CollectionEngine;
//! use tremote_sdk::torrent::sort_predicates;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RemoteConfig::builder()
//!         .server_url("http://192.168.1.10:9091")
//!         .data_dir("/path/to/data")
//!         .build()?;
//!
//!     let (service, mut snapshots) = RemoteService::connect(config).await?;
//!     service.refresh_session().await?;
//!
//!     // 消费侧的单一逻辑线程：驱动引擎并把脚本应用到视图
//!     let mut engine = CollectionEngine::new(sort_predicates(), SortColumn::Name)?;
//!     while let Some(snapshot) = snapshots.recv().await {
//!         let script = engine.set_snapshot(snapshot);
//!         let _ = script; // 交给 ChangesetApplier::apply(&script, &mut view)
//!     }
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod applier;
pub mod changeset;
pub mod collection;
pub mod config;
pub mod debounce;
pub mod driver;
pub mod error;
pub mod events;
pub mod gateway;
pub mod service;
pub mod session;
pub mod storage;
pub mod torrent;
pub mod version;
pub mod wire;

// 重新导出核心类型，方便使用
pub use applier::{ApplyError, ChangesetApplier, RowView, VecView};
pub use changeset::{diff, Differentiable, EditScript, RowMove, Stage};
pub use collection::{CollectionEngine, Comparator, Predicate};
pub use config::{HttpClientConfig, RemoteConfig, RemoteConfigBuilder};
pub use debounce::Debouncer;
pub use driver::{PollMode, SyncDriver};
pub use error::{Result, TremoteSDKError};
pub use events::{EventManager, RemoteEvent};
pub use gateway::{AddTorrentOptions, RpcGateway, TorrentSource, TORRENT_FIELDS};
pub use service::RemoteService;
pub use session::{
    HttpReply, HttpTransport, RequestCounter, SessionClient, SessionTokenStore, Transport,
    SESSION_HEADER, STATUS_SESSION_REQUIRED,
};
pub use storage::KvStore;
pub use torrent::{
    name_filter, sort_predicates, AddedTorrent, AggregateStats, BandwidthPriority, Server,
    SortColumn, Torrent, TorrentStatus,
};

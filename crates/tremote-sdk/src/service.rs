//! 服务门面
//!
//! 把 KV 存储、会话客户端、RPC 网关、同步驱动装配在一起，并对外提供
//! 变更操作（启动/停止/移除/改属性/添加）。
//!
//! 约定：
//! - 空 ID 列表的变更是调用方层面的 no-op，在这里直接返回，不打扰网关
//! - 变更失败原样上抛给发起方做用户可见的报告；本地不做乐观更新，
//!   引擎只对后续抓取确认过的快照做出反应，所以也没有什么可回滚的
//! - 每次变更成功后触发一次立即抓取，让确认结果尽快到达

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::info;

use crate::config::RemoteConfig;
use crate::driver::{PollMode, SyncDriver};
use crate::error::Result;
use crate::events::{EventManager, RemoteEvent};
use crate::gateway::{AddTorrentOptions, RpcGateway, TorrentSource};
use crate::session::{HttpTransport, SessionClient, SessionTokenStore, Transport};
use crate::storage::KvStore;
use crate::torrent::{AddedTorrent, AggregateStats, BandwidthPriority, Server, Torrent};

/// 服务门面
pub struct RemoteService {
    #[allow(dead_code)]
    config: RemoteConfig,
    #[allow(dead_code)]
    kv: Arc<KvStore>,
    client: Arc<SessionClient>,
    gateway: Arc<RpcGateway>,
    driver: Arc<SyncDriver>,
    events: Arc<EventManager>,
    server: RwLock<Option<Server>>,
}

impl RemoteService {
    /// 装配全部组件并启动轮询；返回服务句柄与快照接收端。
    /// 接收端应交给消费视图的单一逻辑线程去驱动 CollectionEngine。
    pub async fn connect(
        config: RemoteConfig,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<Vec<Torrent>>)> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config)?);
        Self::connect_with_transport(config, transport).await
    }

    /// 注入自定义传输层的装配入口（测试与内嵌场景）
    pub async fn connect_with_transport(
        config: RemoteConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<Vec<Torrent>>)> {
        let events = EventManager::new(config.event_channel_capacity);
        let kv = Arc::new(KvStore::open(&config.data_dir).await?);
        let tokens = SessionTokenStore::load(kv.clone())?;
        let client = SessionClient::new(transport, tokens, events.clone());
        let gateway = RpcGateway::new(client.clone());
        let driver = SyncDriver::new(gateway.clone(), events.clone(), &config);

        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        driver.clone().start(snapshot_tx);

        info!("🚀 RemoteService 已启动: {}", config.rpc_endpoint());

        let service = Arc::new(Self {
            config,
            kv,
            client,
            gateway,
            driver,
            events,
            server: RwLock::new(None),
        });
        Ok((service, snapshot_rx))
    }

    /// 刷新并缓存服务端会话信息
    pub async fn refresh_session(&self) -> Result<Server> {
        let server = self.gateway.session_get().await?;
        self.events.emit(RemoteEvent::SessionUpdated {
            version: server.version.clone(),
        });
        *self.server.write().await = Some(server.clone());
        info!("📡 会话信息已刷新: Transmission {}", server.version);
        Ok(server)
    }

    pub async fn cached_server(&self) -> Option<Server> {
        self.server.read().await.clone()
    }

    /// 状态栏汇总：服务端信息 + 当前快照的总速率
    pub async fn aggregate_stats(&self, torrents: &[Torrent]) -> Option<AggregateStats> {
        self.server
            .read()
            .await
            .as_ref()
            .map(|server| AggregateStats::collect(server, torrents))
    }

    // ---- 变更操作 ----

    pub async fn start_torrents(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.gateway.torrent_start(ids).await?;
        self.driver.refresh_now();
        Ok(())
    }

    pub async fn start_torrents_now(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.gateway.torrent_start_now(ids).await?;
        self.driver.refresh_now();
        Ok(())
    }

    pub async fn stop_torrents(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.gateway.torrent_stop(ids).await?;
        self.driver.refresh_now();
        Ok(())
    }

    pub async fn remove_torrents(&self, ids: &[i64], delete_local_data: bool) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.gateway.torrent_remove(ids, delete_local_data).await?;
        self.driver.refresh_now();
        Ok(())
    }

    pub async fn reannounce_torrents(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.gateway.torrent_reannounce(ids).await?;
        self.driver.refresh_now();
        Ok(())
    }

    pub async fn set_priority(&self, ids: &[i64], priority: BandwidthPriority) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.gateway.torrent_set_priority(ids, priority).await?;
        self.driver.refresh_now();
        Ok(())
    }

    pub async fn set_location(&self, ids: &[i64], location: &str, move_data: bool) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.gateway
            .torrent_set_location(ids, location, move_data)
            .await?;
        self.driver.refresh_now();
        Ok(())
    }

    pub async fn set_wanted_files(
        &self,
        ids: &[i64],
        wanted: &[i64],
        unwanted: &[i64],
    ) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.gateway.torrent_set_files(ids, wanted, unwanted).await?;
        self.driver.refresh_now();
        Ok(())
    }

    pub async fn rename_path(&self, id: i64, path: &str, name: &str) -> Result<()> {
        self.gateway.torrent_rename_path(id, path, name).await?;
        self.driver.refresh_now();
        Ok(())
    }

    /// 添加 torrent；下载目录与 peer 上限缺省时用缓存的服务端默认值补齐
    pub async fn add_torrent(
        &self,
        source: TorrentSource,
        mut options: AddTorrentOptions,
    ) -> Result<AddedTorrent> {
        if options.download_dir.is_none() || options.peer_limit.is_none() {
            if let Some(server) = self.cached_server().await {
                if options.download_dir.is_none() && !server.download_dir.is_empty() {
                    options.download_dir = Some(server.download_dir.clone());
                }
                if options.peer_limit.is_none() && server.peer_limit_per_torrent > 0 {
                    options.peer_limit = Some(server.peer_limit_per_torrent);
                }
            }
        }
        let added = self.gateway.torrent_add(&source, &options).await?;
        info!("➕ 已添加 torrent: id={}, name={}", added.id, added.name);
        self.driver.refresh_now();
        Ok(added)
    }

    // ---- 观测与控制 ----

    pub fn set_poll_mode(&self, mode: PollMode) {
        self.driver.set_mode(mode);
    }

    pub fn refresh_now(&self) {
        self.driver.refresh_now();
    }

    pub fn events(&self) -> Arc<EventManager> {
        self.events.clone()
    }

    pub fn gateway(&self) -> Arc<RpcGateway> {
        self.gateway.clone()
    }

    /// 当前在途请求数（忙碌指示器用，仅观测）
    pub fn in_flight_requests(&self) -> usize {
        self.client.in_flight()
    }

    pub async fn shutdown(&self) {
        self.driver.shutdown();
        info!("🛑 RemoteService 已关闭");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::{ok_reply, ScriptedTransport};
    use tempfile::TempDir;

    fn config(data_dir: &std::path::Path) -> RemoteConfig {
        RemoteConfig::builder()
            .server_url("http://localhost:9091")
            .data_dir(data_dir)
            .foreground_interval(3600)
            .background_interval(3600)
            .build()
            .unwrap()
    }

    async fn service_with(
        transport: Arc<ScriptedTransport>,
        temp_dir: &TempDir,
    ) -> (Arc<RemoteService>, mpsc::UnboundedReceiver<Vec<Torrent>>) {
        RemoteService::connect_with_transport(config(temp_dir.path()), transport)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_id_list_is_a_local_noop() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let (service, _rx) = service_with(transport.clone(), &temp_dir).await;

        service.start_torrents(&[]).await.unwrap();
        service.stop_torrents(&[]).await.unwrap();
        service.remove_torrents(&[], true).await.unwrap();
        service.reannounce_torrents(&[]).await.unwrap();
        service.set_priority(&[], BandwidthPriority::High).await.unwrap();
        service.set_location(&[], "/mnt", false).await.unwrap();
        service.set_wanted_files(&[], &[], &[]).await.unwrap();

        // 一个请求都不应发出
        assert_eq!(transport.request_count(), 0);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_mutation_failure_is_surfaced_to_caller() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new(vec![ok_reply(
            r#"{"result":"torrent not found","arguments":{}}"#,
        )]));
        let (service, _rx) = service_with(transport, &temp_dir).await;

        let err = service.start_torrents(&[42]).await.unwrap_err();
        match err {
            crate::error::TremoteSDKError::Protocol(reason) => {
                assert_eq!(reason, "torrent not found")
            }
            other => panic!("期望 Protocol 错误，实际: {}", other),
        }
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_add_torrent_fills_defaults_from_cached_server() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new(vec![
            ok_reply(
                r#"{"result":"success","arguments":{"version":"2.94","download-dir":"/srv/dl","peer-limit-per-torrent":60}}"#,
            ),
            ok_reply(
                r#"{"result":"success","arguments":{"torrent-added":{"id":1,"name":"x","hashString":"aa"}}}"#,
            ),
        ]));
        let (service, _rx) = service_with(transport.clone(), &temp_dir).await;

        service.refresh_session().await.unwrap();
        service
            .add_torrent(
                TorrentSource::MagnetLink("magnet:?xt=urn:btih:aa".to_string()),
                AddTorrentOptions::default(),
            )
            .await
            .unwrap();

        let log = transport.log.lock();
        let request: serde_json::Value = serde_json::from_slice(&log[1].0).unwrap();
        assert_eq!(request["arguments"]["download-dir"], "/srv/dl");
        assert_eq!(request["arguments"]["peer-limit"], 60);
        drop(log);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_aggregate_stats_requires_session() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new(vec![ok_reply(
            r#"{"result":"success","arguments":{"version":"4.0","download-dir-free-space":77}}"#,
        )]));
        let (service, _rx) = service_with(transport, &temp_dir).await;

        assert!(service.aggregate_stats(&[]).await.is_none());
        service.refresh_session().await.unwrap();
        let stats = service.aggregate_stats(&[]).await.unwrap();
        assert_eq!(stats.server_version, "4.0");
        assert_eq!(stats.free_space_bytes, 77);
        service.shutdown().await;
    }
}

//! RPC 网关 - 领域操作的类型安全封装
//!
//! 每个 Transmission 领域方法一个函数，内部统一走 SessionClient 发送、
//! wire 解码。传输/解码失败映射到统一的错误分类。
//!
//! torrent-get 的字段清单是契约的一部分：清单与 [`crate::torrent::Torrent`]
//! 的反序列化字段一一对应，漏掉任何一个字段都是静默丢数据的 bug，
//! 由测试强制两边保持同步。
//!
//! 变更操作接受显式 ID 列表；空列表的 no-op 语义由调用方
//! （[`crate::service::RemoteService`]）负责，网关收到什么就发什么。

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Result, TremoteSDKError};
use crate::session::SessionClient;
use crate::torrent::{AddedTorrent, BandwidthPriority, Server, Torrent};
use crate::wire;

/// torrent-get 请求的固定字段清单
pub const TORRENT_FIELDS: &[&str] = &[
    "id",
    "name",
    "status",
    "errorString",
    "sizeWhenDone",
    "leftUntilDone",
    "rateDownload",
    "rateUpload",
    "metadataPercentComplete",
    "totalSize",
    "peersSendingToUs",
    "seeders",
    "peersGettingFromUs",
    "leechers",
    "eta",
    "uploadRatio",
    "downloadDir",
    "comment",
    "addedDate",
    "doneDate",
    "activityDate",
    "downloadedEver",
    "uploadedEver",
    "bandwidthPriority",
    "queuePosition",
    "secondsSeeding",
];

/// torrent-add 的数据来源
#[derive(Debug, Clone)]
pub enum TorrentSource {
    /// .torrent 文件内容，请求体里以 base64 传输
    Metainfo(Vec<u8>),
    /// magnet 链接（或服务端可访问的 URL/路径）
    MagnetLink(String),
}

/// torrent-add 的可选参数
#[derive(Debug, Clone, Default)]
pub struct AddTorrentOptions {
    /// 下载目录；None 时由调用方（或服务端默认值）决定
    pub download_dir: Option<String>,
    pub peer_limit: Option<i64>,
    /// true 表示添加后保持暂停
    pub paused: bool,
    pub files_wanted: Vec<i64>,
    pub files_unwanted: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct TorrentsWrapper {
    torrents: Vec<Torrent>,
}

#[derive(Debug, Deserialize)]
struct TorrentAddedWrapper {
    #[serde(rename = "torrent-added")]
    torrent_added: Option<AddedTorrent>,
    /// 重复添加时服务端改用这个字段返回已有条目
    #[serde(rename = "torrent-duplicate")]
    torrent_duplicate: Option<AddedTorrent>,
}

/// RPC 网关
pub struct RpcGateway {
    client: Arc<SessionClient>,
}

impl RpcGateway {
    pub fn new(client: Arc<SessionClient>) -> Arc<Self> {
        Arc::new(Self { client })
    }

    pub fn session_client(&self) -> Arc<SessionClient> {
        self.client.clone()
    }

    /// session-get：服务端信息（版本、下载目录、剩余空间等）
    pub async fn session_get(&self) -> Result<Server> {
        let body = self.client.send("session-get", None).await?;
        wire::decode_envelope(&body)
    }

    /// torrent-get：按固定字段清单抓取全量快照
    pub async fn torrent_get(&self) -> Result<Vec<Torrent>> {
        let arguments = json!({ "fields": TORRENT_FIELDS });
        let body = self.client.send("torrent-get", Some(arguments)).await?;
        let wrapper: TorrentsWrapper = wire::decode_envelope(&body)?;
        Ok(wrapper.torrents)
    }

    /// torrent-add：添加种子文件或 magnet 链接
    pub async fn torrent_add(
        &self,
        source: &TorrentSource,
        options: &AddTorrentOptions,
    ) -> Result<AddedTorrent> {
        let mut arguments = serde_json::Map::new();
        if let Some(dir) = &options.download_dir {
            arguments.insert("download-dir".to_string(), json!(dir));
        }
        if let Some(limit) = options.peer_limit {
            arguments.insert("peer-limit".to_string(), json!(limit));
        }
        arguments.insert("paused".to_string(), json!(if options.paused { 1 } else { 0 }));
        arguments.insert("files-wanted".to_string(), json!(options.files_wanted));
        arguments.insert("files-unwanted".to_string(), json!(options.files_unwanted));
        match source {
            TorrentSource::Metainfo(data) => {
                arguments.insert("metainfo".to_string(), json!(BASE64_STANDARD.encode(data)));
            }
            TorrentSource::MagnetLink(link) => {
                arguments.insert("filename".to_string(), json!(link));
            }
        }

        let body = self
            .client
            .send("torrent-add", Some(Value::Object(arguments)))
            .await?;
        let wrapper: TorrentAddedWrapper = wire::decode_envelope(&body)?;
        wrapper
            .torrent_added
            .or(wrapper.torrent_duplicate)
            .ok_or_else(|| {
                TremoteSDKError::Decode(
                    "torrent-add 响应缺少 torrent-added/torrent-duplicate".to_string(),
                )
            })
    }

    /// torrent-remove：移除 torrent，可选删除本地数据
    pub async fn torrent_remove(&self, ids: &[i64], delete_local_data: bool) -> Result<()> {
        let arguments = json!({
            "ids": ids,
            "delete-local-data": if delete_local_data { 1 } else { 0 },
        });
        let body = self.client.send("torrent-remove", Some(arguments)).await?;
        wire::decode_ack(&body)
    }

    pub async fn torrent_start(&self, ids: &[i64]) -> Result<()> {
        self.ids_only("torrent-start", ids).await
    }

    /// 跳过队列立即开始
    pub async fn torrent_start_now(&self, ids: &[i64]) -> Result<()> {
        self.ids_only("torrent-start-now", ids).await
    }

    pub async fn torrent_stop(&self, ids: &[i64]) -> Result<()> {
        self.ids_only("torrent-stop", ids).await
    }

    pub async fn torrent_reannounce(&self, ids: &[i64]) -> Result<()> {
        self.ids_only("torrent-reannounce", ids).await
    }

    /// torrent-set：调整带宽优先级
    pub async fn torrent_set_priority(
        &self,
        ids: &[i64],
        priority: BandwidthPriority,
    ) -> Result<()> {
        let arguments = json!({
            "ids": ids,
            "bandwidthPriority": priority.as_i64(),
        });
        let body = self.client.send("torrent-set", Some(arguments)).await?;
        wire::decode_ack(&body)
    }

    /// torrent-set：标记想要/不想要的文件
    pub async fn torrent_set_files(
        &self,
        ids: &[i64],
        wanted: &[i64],
        unwanted: &[i64],
    ) -> Result<()> {
        let arguments = json!({
            "ids": ids,
            "files-wanted": wanted,
            "files-unwanted": unwanted,
        });
        let body = self.client.send("torrent-set", Some(arguments)).await?;
        wire::decode_ack(&body)
    }

    /// torrent-set-location：迁移数据目录
    pub async fn torrent_set_location(
        &self,
        ids: &[i64],
        location: &str,
        move_data: bool,
    ) -> Result<()> {
        let arguments = json!({
            "ids": ids,
            "location": location,
            "move": if move_data { 1 } else { 0 },
        });
        let body = self
            .client
            .send("torrent-set-location", Some(arguments))
            .await?;
        wire::decode_ack(&body)
    }

    /// torrent-rename-path：重命名 torrent 内的路径
    pub async fn torrent_rename_path(&self, id: i64, path: &str, name: &str) -> Result<()> {
        let arguments = json!({
            "ids": [id],
            "path": path,
            "name": name,
        });
        let body = self
            .client
            .send("torrent-rename-path", Some(arguments))
            .await?;
        wire::decode_ack(&body)
    }

    async fn ids_only(&self, method: &str, ids: &[i64]) -> Result<()> {
        let body = self.client.send(method, Some(json!({ "ids": ids }))).await?;
        wire::decode_ack(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventManager;
    use crate::session::testing::{ok_reply, ScriptedTransport};
    use crate::session::SessionTokenStore;

    fn gateway_with(transport: Arc<ScriptedTransport>) -> Arc<RpcGateway> {
        let client = SessionClient::new(
            transport,
            SessionTokenStore::in_memory(),
            EventManager::new(16),
        );
        RpcGateway::new(client)
    }

    fn sent_request(transport: &ScriptedTransport, index: usize) -> Value {
        let log = transport.log.lock();
        serde_json::from_slice(&log[index].0).unwrap()
    }

    #[test]
    fn test_field_list_matches_torrent_struct_exactly() {
        // 字段清单是契约：Torrent 反序列化的每个字段都必须被请求，
        // 请求的每个字段也必须被建模
        let value = serde_json::to_value(Torrent::default()).unwrap();
        let keys: std::collections::BTreeSet<String> = value
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        let fields: std::collections::BTreeSet<String> =
            TORRENT_FIELDS.iter().map(|s| s.to_string()).collect();
        assert_eq!(keys, fields);
    }

    #[tokio::test]
    async fn test_torrent_get_requests_field_list_and_decodes() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok_reply(
            r#"{"result":"success","arguments":{"torrents":[
                {"id":1,"name":"ubuntu","rateDownload":500},
                {"id":2,"name":"debian"}
            ]}}"#,
        )]));
        let gateway = gateway_with(transport.clone());

        let torrents = gateway.torrent_get().await.unwrap();
        assert_eq!(torrents.len(), 2);
        assert_eq!(torrents[0].name, "ubuntu");
        assert_eq!(torrents[0].rate_download, 500);

        let request = sent_request(&transport, 0);
        assert_eq!(request["method"], "torrent-get");
        assert_eq!(
            request["arguments"]["fields"].as_array().unwrap().len(),
            TORRENT_FIELDS.len()
        );
    }

    #[tokio::test]
    async fn test_session_get() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok_reply(
            r#"{"result":"success","arguments":{"version":"2.94","download-dir":"/srv/dl"}}"#,
        )]));
        let gateway = gateway_with(transport.clone());

        let server = gateway.session_get().await.unwrap();
        assert_eq!(server.version, "2.94");
        assert_eq!(server.download_dir, "/srv/dl");

        let request = sent_request(&transport, 0);
        assert_eq!(request["method"], "session-get");
        assert!(request.get("arguments").is_none());
    }

    #[tokio::test]
    async fn test_torrent_add_magnet() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok_reply(
            r#"{"result":"success","arguments":{"torrent-added":{"id":9,"name":"new","hashString":"ff"}}}"#,
        )]));
        let gateway = gateway_with(transport.clone());

        let options = AddTorrentOptions {
            download_dir: Some("/srv/dl".to_string()),
            peer_limit: Some(50),
            paused: true,
            files_wanted: vec![0, 1],
            files_unwanted: vec![2],
        };
        let added = gateway
            .torrent_add(&TorrentSource::MagnetLink("magnet:?xt=urn:btih:ff".to_string()), &options)
            .await
            .unwrap();
        assert_eq!(added.id, 9);

        let request = sent_request(&transport, 0);
        let arguments = &request["arguments"];
        assert_eq!(arguments["filename"], "magnet:?xt=urn:btih:ff");
        assert_eq!(arguments["download-dir"], "/srv/dl");
        assert_eq!(arguments["peer-limit"], 50);
        assert_eq!(arguments["paused"], 1);
        assert_eq!(arguments["files-wanted"], json!([0, 1]));
        assert_eq!(arguments["files-unwanted"], json!([2]));
        assert!(arguments.get("metainfo").is_none());
    }

    #[tokio::test]
    async fn test_torrent_add_metainfo_is_base64() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok_reply(
            r#"{"result":"success","arguments":{"torrent-duplicate":{"id":3,"name":"dup","hashString":"aa"}}}"#,
        )]));
        let gateway = gateway_with(transport.clone());

        let added = gateway
            .torrent_add(
                &TorrentSource::Metainfo(b"d8:announce0:e".to_vec()),
                &AddTorrentOptions::default(),
            )
            .await
            .unwrap();
        // 重复添加走 torrent-duplicate 分支
        assert_eq!(added.id, 3);

        let request = sent_request(&transport, 0);
        let metainfo = request["arguments"]["metainfo"].as_str().unwrap();
        assert_eq!(
            BASE64_STANDARD.decode(metainfo).unwrap(),
            b"d8:announce0:e".to_vec()
        );
    }

    #[tokio::test]
    async fn test_torrent_remove_flags() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok_reply(
            r#"{"result":"success","arguments":{}}"#,
        )]));
        let gateway = gateway_with(transport.clone());

        gateway.torrent_remove(&[4, 5], true).await.unwrap();

        let request = sent_request(&transport, 0);
        assert_eq!(request["method"], "torrent-remove");
        assert_eq!(request["arguments"]["ids"], json!([4, 5]));
        assert_eq!(request["arguments"]["delete-local-data"], 1);
    }

    #[tokio::test]
    async fn test_protocol_error_carries_server_reason() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok_reply(
            r#"{"result":"invalid or corrupt torrent file","arguments":{}}"#,
        )]));
        let gateway = gateway_with(transport);

        let err = gateway.torrent_start(&[1]).await.unwrap_err();
        match err {
            TremoteSDKError::Protocol(reason) => {
                assert_eq!(reason, "invalid or corrupt torrent file")
            }
            other => panic!("期望 Protocol 错误，实际: {}", other),
        }
    }

    #[tokio::test]
    async fn test_set_location_and_rename() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            ok_reply(r#"{"result":"success","arguments":{}}"#),
            ok_reply(r#"{"result":"success","arguments":{}}"#),
        ]));
        let gateway = gateway_with(transport.clone());

        gateway.torrent_set_location(&[7], "/mnt/big", true).await.unwrap();
        gateway.torrent_rename_path(7, "old/name", "new-name").await.unwrap();

        let request = sent_request(&transport, 0);
        assert_eq!(request["method"], "torrent-set-location");
        assert_eq!(request["arguments"]["move"], 1);

        let request = sent_request(&transport, 1);
        assert_eq!(request["method"], "torrent-rename-path");
        assert_eq!(request["arguments"]["ids"], json!([7]));
        assert_eq!(request["arguments"]["path"], "old/name");
        assert_eq!(request["arguments"]["name"], "new-name");
    }

    #[tokio::test]
    async fn test_set_priority_value() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok_reply(
            r#"{"result":"success","arguments":{}}"#,
        )]));
        let gateway = gateway_with(transport.clone());

        gateway
            .torrent_set_priority(&[1], BandwidthPriority::High)
            .await
            .unwrap();

        let request = sent_request(&transport, 0);
        assert_eq!(request["method"], "torrent-set");
        assert_eq!(request["arguments"]["bandwidthPriority"], 1);
    }
}

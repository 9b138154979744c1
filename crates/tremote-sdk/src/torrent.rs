//! Torrent 领域模型
//!
//! 只建模排序、过滤与标识需要的标量字段；文件列表、tracker、peer 等
//! 明细结构属于展示层，不在本 SDK 范围内。字段名与 RPC 协议一一对应
//! （torrent 字段 camelCase，session 字段 kebab-case）。

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::changeset::Differentiable;
use crate::collection::{Comparator, Predicate};

/// 单个 torrent 的快照条目
///
/// 标识是快照内唯一的整数 id；其余字段是可排序/可过滤属性。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Torrent {
    pub id: i64,
    pub name: String,
    /// 原始状态码（0-6），语义见 [`TorrentStatus`]
    pub status: i64,
    pub error_string: String,
    pub size_when_done: i64,
    pub left_until_done: i64,
    pub rate_download: i64,
    pub rate_upload: i64,
    pub metadata_percent_complete: f64,
    pub total_size: i64,
    pub peers_sending_to_us: i64,
    pub seeders: i64,
    pub peers_getting_from_us: i64,
    pub leechers: i64,
    pub eta: i64,
    pub upload_ratio: f64,
    pub download_dir: String,
    pub comment: String,
    pub added_date: i64,
    pub done_date: i64,
    pub activity_date: i64,
    pub downloaded_ever: i64,
    pub uploaded_ever: i64,
    pub bandwidth_priority: i64,
    pub queue_position: i64,
    pub seconds_seeding: i64,
}

impl Torrent {
    /// 下载进度（0.0 - 100.0）
    pub fn downloaded_percents(&self) -> f64 {
        if self.size_when_done <= 0 {
            return 0.0;
        }
        (self.size_when_done - self.left_until_done) as f64 / self.size_when_done as f64 * 100.0
    }

    pub fn torrent_status(&self) -> TorrentStatus {
        TorrentStatus::from_code(self.status)
    }

    pub fn is_finished(&self) -> bool {
        self.left_until_done == 0 && self.size_when_done > 0
    }
}

impl Differentiable for Torrent {
    fn diff_id(&self) -> i64 {
        self.id
    }

    fn content_equal(&self, other: &Self) -> bool {
        self == other
    }
}

/// Transmission 状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TorrentStatus {
    Stopped,
    CheckWait,
    Check,
    DownloadWait,
    Download,
    SeedWait,
    Seed,
    Unknown,
}

impl TorrentStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => TorrentStatus::Stopped,
            1 => TorrentStatus::CheckWait,
            2 => TorrentStatus::Check,
            3 => TorrentStatus::DownloadWait,
            4 => TorrentStatus::Download,
            5 => TorrentStatus::SeedWait,
            6 => TorrentStatus::Seed,
            _ => TorrentStatus::Unknown,
        }
    }
}

/// 带宽优先级（torrent-set 的 bandwidthPriority 取值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandwidthPriority {
    Low,
    Normal,
    High,
}

impl BandwidthPriority {
    pub fn as_i64(self) -> i64 {
        match self {
            BandwidthPriority::Low => -1,
            BandwidthPriority::Normal => 0,
            BandwidthPriority::High => 1,
        }
    }
}

/// session-get 的响应负载（字段名沿用协议的 kebab-case/camelCase 混排）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub version: String,
    #[serde(rename = "download-dir")]
    pub download_dir: String,
    #[serde(rename = "peer-limit-per-torrent")]
    pub peer_limit_per_torrent: i64,
    #[serde(rename = "incomplete-dir-enabled")]
    pub incomplete_dir_enabled: bool,
    #[serde(rename = "incomplete-dir")]
    pub incomplete_dir: String,
    #[serde(rename = "download-dir-free-space")]
    pub free_space: i64,
    #[serde(rename = "seedRatioLimit")]
    pub seed_ratio_limit: f64,
    #[serde(rename = "seedRatioLimited")]
    pub seed_ratio_limited: bool,
}

/// torrent-add 成功后的条目（torrent-added / torrent-duplicate）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddedTorrent {
    pub id: i64,
    pub name: String,
    #[serde(rename = "hashString")]
    pub hash_string: String,
}

/// 汇总统计（状态栏展示用：服务器版本、剩余空间、总速率）
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateStats {
    pub server_version: String,
    pub free_space_bytes: i64,
    pub total_rate_download: i64,
    pub total_rate_upload: i64,
}

impl AggregateStats {
    pub fn collect(server: &Server, torrents: &[Torrent]) -> Self {
        Self {
            server_version: server.version.clone(),
            free_space_bytes: server.free_space,
            total_rate_download: torrents.iter().map(|t| t.rate_download).sum(),
            total_rate_upload: torrents.iter().map(|t| t.rate_upload).sum(),
        }
    }
}

/// 可排序列的封闭枚举
///
/// 新增一列只需要在 [`sort_predicates`] 的表里加一行，不需要改任何控制流。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortColumn {
    Name,
    Size,
    Progress,
    Seeds,
    Peers,
    DownloadSpeed,
    UploadSpeed,
    Eta,
    Ratio,
    Priority,
    QueuePosition,
    SeedingTime,
    AddedDate,
    ActivityDate,
    Uploaded,
    Downloaded,
    Status,
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// 列 → 三路比较器的映射表
pub fn sort_predicates() -> HashMap<SortColumn, Comparator<Torrent>> {
    let mut table: HashMap<SortColumn, Comparator<Torrent>> = HashMap::new();
    table.insert(
        SortColumn::Name,
        Box::new(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase())),
    );
    table.insert(
        SortColumn::Size,
        Box::new(|a, b| a.size_when_done.cmp(&b.size_when_done)),
    );
    table.insert(
        SortColumn::Progress,
        Box::new(|a, b| cmp_f64(a.downloaded_percents(), b.downloaded_percents())),
    );
    table.insert(
        SortColumn::Seeds,
        Box::new(|a, b| a.peers_sending_to_us.cmp(&b.peers_sending_to_us)),
    );
    table.insert(
        SortColumn::Peers,
        Box::new(|a, b| a.peers_getting_from_us.cmp(&b.peers_getting_from_us)),
    );
    table.insert(
        SortColumn::DownloadSpeed,
        Box::new(|a, b| a.rate_download.cmp(&b.rate_download)),
    );
    table.insert(
        SortColumn::UploadSpeed,
        Box::new(|a, b| a.rate_upload.cmp(&b.rate_upload)),
    );
    table.insert(SortColumn::Eta, Box::new(|a, b| a.eta.cmp(&b.eta)));
    table.insert(
        SortColumn::Ratio,
        Box::new(|a, b| cmp_f64(a.upload_ratio, b.upload_ratio)),
    );
    table.insert(
        SortColumn::Priority,
        Box::new(|a, b| a.bandwidth_priority.cmp(&b.bandwidth_priority)),
    );
    table.insert(
        SortColumn::QueuePosition,
        Box::new(|a, b| a.queue_position.cmp(&b.queue_position)),
    );
    table.insert(
        SortColumn::SeedingTime,
        Box::new(|a, b| a.seconds_seeding.cmp(&b.seconds_seeding)),
    );
    table.insert(
        SortColumn::AddedDate,
        Box::new(|a, b| a.added_date.cmp(&b.added_date)),
    );
    table.insert(
        SortColumn::ActivityDate,
        Box::new(|a, b| a.activity_date.cmp(&b.activity_date)),
    );
    table.insert(
        SortColumn::Uploaded,
        Box::new(|a, b| a.uploaded_ever.cmp(&b.uploaded_ever)),
    );
    table.insert(
        SortColumn::Downloaded,
        Box::new(|a, b| a.downloaded_ever.cmp(&b.downloaded_ever)),
    );
    table.insert(SortColumn::Status, Box::new(|a, b| a.status.cmp(&b.status)));
    table
}

/// 名称过滤谓词：大小写不敏感的子串匹配，只作用于 name 字段。
/// 空串（或纯空白）等价于没有过滤。
pub fn name_filter(text: &str) -> Option<Predicate<Torrent>> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    Some(Box::new(move |t: &Torrent| {
        t.name.to_lowercase().contains(&needle)
    }))
}

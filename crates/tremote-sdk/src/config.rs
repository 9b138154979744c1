//! SDK 配置
//!
//! `RemoteConfig` 描述一个 Transmission 守护进程的连接方式与轮询策略，
//! 通过 `RemoteConfig::builder()` 构建。配置本身不做任何 IO，
//! 校验（URL 形状、间隔合法性）集中在 `build()` 里一次完成。

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, TremoteSDKError};

/// RPC 固定路径（Transmission 默认值）
pub const DEFAULT_RPC_PATH: &str = "/transmission/rpc";

/// HTTP 客户端配置
#[derive(Debug, Clone, Default)]
pub struct HttpClientConfig {
    /// 连接超时（秒），None 表示使用 reqwest 默认值
    pub connect_timeout_secs: Option<u64>,
    /// 单次请求超时（秒）——网络调用必须有上限，交给传输层执行
    pub request_timeout_secs: Option<u64>,
}

/// SDK 配置
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// 服务器基地址，例如 `http://192.168.1.10:9091`
    pub server_url: String,
    /// RPC 路径，默认 `/transmission/rpc`
    pub rpc_path: String,
    /// HTTP Basic Auth 用户名（可选）
    pub username: Option<String>,
    /// HTTP Basic Auth 密码（可选）
    pub password: Option<String>,
    /// 本地数据目录（存放会话令牌的 KV 库）
    pub data_dir: PathBuf,
    /// HTTP 客户端配置
    pub http: HttpClientConfig,
    /// 前台轮询间隔（秒）
    pub foreground_interval_secs: u64,
    /// 后台轮询间隔（秒）
    pub background_interval_secs: u64,
    /// 过滤输入的防抖延迟（毫秒）
    pub filter_debounce_ms: u64,
    /// 事件广播通道容量
    pub event_channel_capacity: usize,
}

impl RemoteConfig {
    pub fn builder() -> RemoteConfigBuilder {
        RemoteConfigBuilder::default()
    }

    /// 完整的 RPC endpoint URL
    pub fn rpc_endpoint(&self) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), self.rpc_path)
    }

    pub fn foreground_interval(&self) -> Duration {
        Duration::from_secs(self.foreground_interval_secs)
    }

    pub fn background_interval(&self) -> Duration {
        Duration::from_secs(self.background_interval_secs)
    }

    pub fn filter_debounce(&self) -> Duration {
        Duration::from_millis(self.filter_debounce_ms)
    }
}

/// RemoteConfig 构建器
#[derive(Debug, Clone)]
pub struct RemoteConfigBuilder {
    server_url: Option<String>,
    rpc_path: String,
    username: Option<String>,
    password: Option<String>,
    data_dir: Option<PathBuf>,
    http: HttpClientConfig,
    foreground_interval_secs: u64,
    background_interval_secs: u64,
    filter_debounce_ms: u64,
    event_channel_capacity: usize,
}

impl Default for RemoteConfigBuilder {
    fn default() -> Self {
        Self {
            server_url: None,
            rpc_path: DEFAULT_RPC_PATH.to_string(),
            username: None,
            password: None,
            data_dir: None,
            // 网络调用必须有上限，缺省给一个保守的天花板
            http: HttpClientConfig {
                connect_timeout_secs: Some(10),
                request_timeout_secs: Some(30),
            },
            foreground_interval_secs: 5,
            background_interval_secs: 30,
            filter_debounce_ms: 500,
            event_channel_capacity: 256,
        }
    }
}

impl RemoteConfigBuilder {
    /// 服务器基地址，必须以 http:// 或 https:// 开头
    pub fn server_url<S: Into<String>>(mut self, url: S) -> Self {
        self.server_url = Some(url.into());
        self
    }

    pub fn rpc_path<S: Into<String>>(mut self, path: S) -> Self {
        self.rpc_path = path.into();
        self
    }

    /// HTTP Basic Auth 凭据
    pub fn credentials<S: Into<String>>(mut self, username: S, password: S) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn connect_timeout(mut self, secs: u64) -> Self {
        self.http.connect_timeout_secs = Some(secs);
        self
    }

    pub fn request_timeout(mut self, secs: u64) -> Self {
        self.http.request_timeout_secs = Some(secs);
        self
    }

    /// 前台轮询间隔（秒）
    pub fn foreground_interval(mut self, secs: u64) -> Self {
        self.foreground_interval_secs = secs;
        self
    }

    /// 后台轮询间隔（秒）
    pub fn background_interval(mut self, secs: u64) -> Self {
        self.background_interval_secs = secs;
        self
    }

    /// 过滤输入防抖延迟（毫秒）
    pub fn filter_debounce_ms(mut self, millis: u64) -> Self {
        self.filter_debounce_ms = millis;
        self
    }

    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<RemoteConfig> {
        let server_url = self
            .server_url
            .ok_or_else(|| TremoteSDKError::Config("server_url 未设置".to_string()))?;
        if !server_url.starts_with("http://") && !server_url.starts_with("https://") {
            return Err(TremoteSDKError::Config(format!(
                "server_url 必须以 http:// 或 https:// 开头: {}",
                server_url
            )));
        }
        let data_dir = self
            .data_dir
            .ok_or_else(|| TremoteSDKError::Config("data_dir 未设置".to_string()))?;
        if self.foreground_interval_secs == 0 || self.background_interval_secs == 0 {
            return Err(TremoteSDKError::Config(
                "轮询间隔必须大于 0 秒".to_string(),
            ));
        }
        let mut rpc_path = self.rpc_path;
        if !rpc_path.starts_with('/') {
            rpc_path.insert(0, '/');
        }
        Ok(RemoteConfig {
            server_url,
            rpc_path,
            username: self.username,
            password: self.password,
            data_dir,
            http: self.http,
            foreground_interval_secs: self.foreground_interval_secs,
            background_interval_secs: self.background_interval_secs,
            filter_debounce_ms: self.filter_debounce_ms,
            event_channel_capacity: self.event_channel_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = RemoteConfig::builder()
            .server_url("http://localhost:9091")
            .data_dir("/tmp/tremote")
            .build()
            .unwrap();

        assert_eq!(config.rpc_path, DEFAULT_RPC_PATH);
        assert_eq!(config.rpc_endpoint(), "http://localhost:9091/transmission/rpc");
        assert_eq!(config.foreground_interval_secs, 5);
        assert_eq!(config.background_interval_secs, 30);
        assert_eq!(config.filter_debounce_ms, 500);
    }

    #[test]
    fn test_builder_rejects_bad_url() {
        let result = RemoteConfig::builder()
            .server_url("ftp://localhost")
            .data_dir("/tmp/tremote")
            .build();
        assert!(matches!(result, Err(TremoteSDKError::Config(_))));
    }

    #[test]
    fn test_builder_requires_server_url() {
        let result = RemoteConfig::builder().data_dir("/tmp/tremote").build();
        assert!(matches!(result, Err(TremoteSDKError::Config(_))));
    }

    #[test]
    fn test_rpc_path_normalized() {
        let config = RemoteConfig::builder()
            .server_url("http://localhost:9091/")
            .rpc_path("rpc")
            .data_dir("/tmp/tremote")
            .build()
            .unwrap();
        assert_eq!(config.rpc_endpoint(), "http://localhost:9091/rpc");
    }
}

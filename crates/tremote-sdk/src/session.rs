//! RPC 会话层
//!
//! 负责三件事：
//! - 持有并续期不透明的会话令牌（服务端用 409 + 响应头下发新令牌）
//! - 在授权失败时用完全相同的请求体精确重发一次，第二次 409 即终态
//! - 维护在途请求计数（钳制不为负）供忙碌指示器观测
//!
//! 令牌的读写全部经过 [`SessionTokenStore`] 这一个所有者，调用点
//! 不允许各自加锁。正在途中的调用使用它出发时拿到的令牌，续期只对
//! 后续调用可见，不会广播给其他在途请求。

use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::RemoteConfig;
use crate::error::{Result, TremoteSDKError};
use crate::events::{EventManager, RemoteEvent};
use crate::storage::{keys, KvStore};
use crate::wire;

/// 会话令牌的 HTTP 头字段
pub const SESSION_HEADER: &str = "X-Transmission-Session-Id";

/// 服务端要求续期会话的状态码
pub const STATUS_SESSION_REQUIRED: u16 = 409;

/// 一次 HTTP 往返的结果
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    /// 服务端随 409 下发的新令牌（取自响应头）
    pub renewed_token: Option<String>,
    pub body: Vec<u8>,
}

/// 传输层抽象：POST 一个请求体并带上当前会话令牌
///
/// 生产实现是 [`HttpTransport`]；测试注入脚本化的替身。
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, body: &[u8], session_token: &str) -> Result<HttpReply>;
}

/// 基于 reqwest 的传输层实现
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();

        if let Some(timeout) = config.http.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(timeout));
        }

        if let Some(timeout) = config.http.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder
            .build()
            .map_err(|e| TremoteSDKError::Transport(format!("创建 HTTP 客户端失败: {}", e)))?;

        info!("✅ HTTP 客户端已创建 (endpoint: {})", config.rpc_endpoint());

        Ok(Self {
            client,
            endpoint: config.rpc_endpoint(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, body: &[u8], session_token: &str) -> Result<HttpReply> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header(SESSION_HEADER, session_token)
            .body(body.to_vec());

        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| TremoteSDKError::Transport(format!("发送 RPC 请求失败: {}", e)))?;

        let status = response.status().as_u16();
        let renewed_token = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response
            .bytes()
            .await
            .map_err(|e| TremoteSDKError::Transport(format!("读取响应体失败: {}", e)))?
            .to_vec();

        Ok(HttpReply {
            status,
            renewed_token,
            body,
        })
    }
}

/// 会话令牌的唯一所有者
///
/// 冷启动时为空（或从 KV 存储恢复上次进程持久化的值）；
/// 每次服务端下发新令牌都覆盖旧值并落盘。
pub struct SessionTokenStore {
    token: RwLock<String>,
    kv: Option<Arc<KvStore>>,
}

impl SessionTokenStore {
    /// 仅内存，不落盘（测试用）
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self {
            token: RwLock::new(String::new()),
            kv: None,
        })
    }

    /// 从 KV 存储恢复持久化的令牌
    pub fn load(kv: Arc<KvStore>) -> Result<Arc<Self>> {
        let persisted: Option<String> = kv.get(keys::SESSION_TOKEN)?;
        if persisted.is_some() {
            info!("🔑 已恢复持久化的会话令牌");
        }
        Ok(Arc::new(Self {
            token: RwLock::new(persisted.unwrap_or_default()),
            kv: Some(kv),
        }))
    }

    pub async fn current(&self) -> String {
        self.token.read().await.clone()
    }

    /// 覆盖令牌并持久化，对后续调用立即可见
    pub async fn replace(&self, token: &str) -> Result<()> {
        {
            let mut guard = self.token.write().await;
            *guard = token.to_string();
        }
        if let Some(kv) = &self.kv {
            kv.set(keys::SESSION_TOKEN, &token.to_string())?;
        }
        Ok(())
    }
}

/// 在途请求计数，递减钳制为 0（只做观测，不承担正确性职责）
#[derive(Debug, Default)]
pub struct RequestCounter {
    current: AtomicUsize,
}

impl RequestCounter {
    pub fn started(&self) -> usize {
        self.current.fetch_add(1, AtomicOrdering::SeqCst) + 1
    }

    pub fn finished(&self) -> usize {
        let mut value = self.current.load(AtomicOrdering::SeqCst);
        loop {
            if value == 0 {
                return 0;
            }
            match self.current.compare_exchange(
                value,
                value - 1,
                AtomicOrdering::SeqCst,
                AtomicOrdering::SeqCst,
            ) {
                Ok(_) => return value - 1,
                Err(actual) => value = actual,
            }
        }
    }

    pub fn current(&self) -> usize {
        self.current.load(AtomicOrdering::SeqCst)
    }
}

/// 会话客户端
pub struct SessionClient {
    transport: Arc<dyn Transport>,
    tokens: Arc<SessionTokenStore>,
    counter: RequestCounter,
    events: Arc<EventManager>,
    /// 续期闸门：并发调用各自撞上 409 时，令牌覆盖与重发逐个通过，
    /// 不允许两个调用同时改写令牌
    renewal_gate: Mutex<()>,
}

impl SessionClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<SessionTokenStore>,
        events: Arc<EventManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            tokens,
            counter: RequestCounter::default(),
            events,
            renewal_gate: Mutex::new(()),
        })
    }

    /// 当前在途请求数
    pub fn in_flight(&self) -> usize {
        self.counter.current()
    }

    pub fn token_store(&self) -> Arc<SessionTokenStore> {
        self.tokens.clone()
    }

    /// 发送一次 RPC 调用，返回原始响应体
    pub async fn send(&self, method: &str, arguments: Option<Value>) -> Result<Vec<u8>> {
        let body = wire::encode_request(method, arguments)?;

        let in_flight = self.counter.started();
        self.events.emit(RemoteEvent::RequestStarted { in_flight });

        let result = self.send_with_renewal(method, &body).await;

        let in_flight = self.counter.finished();
        self.events.emit(RemoteEvent::RequestFinished { in_flight });

        result
    }

    async fn send_with_renewal(&self, method: &str, body: &[u8]) -> Result<Vec<u8>> {
        let token = self.tokens.current().await;
        let reply = self.transport.post(body, &token).await?;

        if reply.status != STATUS_SESSION_REQUIRED {
            return Self::accept(method, reply);
        }

        // 409：取服务端下发的新令牌，覆盖并持久化，
        // 然后用完全相同的请求体重发一次
        let renewed = reply.renewed_token.ok_or_else(|| {
            TremoteSDKError::Session("服务端要求续期但未下发新令牌".to_string())
        })?;
        let _gate = self.renewal_gate.lock().await;
        self.tokens.replace(&renewed).await?;
        self.events.emit(RemoteEvent::SessionTokenRenewed);
        debug!("🔑 会话令牌已续期，重发请求: {}", method);

        let retry = self.transport.post(body, &renewed).await?;
        if retry.status == STATUS_SESSION_REQUIRED {
            // 重试后仍被拒绝是终态，不再重试，避免对异常服务端无限循环
            return Err(TremoteSDKError::Session(format!(
                "令牌续期后仍被拒绝: {}",
                method
            )));
        }
        Self::accept(method, retry)
    }

    fn accept(method: &str, reply: HttpReply) -> Result<Vec<u8>> {
        if !(200..300).contains(&reply.status) {
            return Err(TremoteSDKError::Transport(format!(
                "{} 返回 HTTP {}",
                method, reply.status
            )));
        }
        Ok(reply.body)
    }
}

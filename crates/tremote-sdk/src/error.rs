use std::fmt;

#[derive(Debug)]
pub enum TremoteSDKError {
    /// 网络层错误：连接失败、URL 非法、非 2xx 状态码
    Transport(String),
    /// 会话续期后仍然被拒绝（重试一次后的终态，不再重试）
    Session(String),
    /// 服务端返回了非 "success" 的 result 字符串（即使 HTTP 200）
    Protocol(String),
    /// 响应体不符合预期结构（重试无法修复，永不重试）
    Decode(String),
    KvStore(String),
    Serialization(String),
    IO(String),
    Config(String),
    InvalidArgument(String),
}

impl fmt::Display for TremoteSDKError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TremoteSDKError::Transport(e) => write!(f, "Transport error: {}", e),
            TremoteSDKError::Session(e) => write!(f, "Session error: {}", e),
            TremoteSDKError::Protocol(e) => write!(f, "Protocol error: {}", e),
            TremoteSDKError::Decode(e) => write!(f, "Decode error: {}", e),
            TremoteSDKError::KvStore(e) => write!(f, "KV store error: {}", e),
            TremoteSDKError::Serialization(e) => write!(f, "Serialization error: {}", e),
            TremoteSDKError::IO(e) => write!(f, "IO error: {}", e),
            TremoteSDKError::Config(e) => write!(f, "Config error: {}", e),
            TremoteSDKError::InvalidArgument(e) => write!(f, "Invalid argument: {}", e),
        }
    }
}

impl std::error::Error for TremoteSDKError {}

impl From<serde_json::Error> for TremoteSDKError {
    fn from(error: serde_json::Error) -> Self {
        TremoteSDKError::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for TremoteSDKError {
    fn from(error: std::io::Error) -> Self {
        TremoteSDKError::IO(error.to_string())
    }
}

impl TremoteSDKError {
    /// 判断是否是会话终态错误（续期重试后仍 409）
    pub fn is_session_error(&self) -> bool {
        matches!(self, TremoteSDKError::Session(_))
    }

    /// 判断该错误是否可以通过重试缓解。
    /// Decode / Protocol / Session 都是终态：形状不匹配重试不会变好，
    /// 服务端明确拒绝的请求重发也只会再被拒绝一次。
    pub fn is_retryable(&self) -> bool {
        matches!(self, TremoteSDKError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, TremoteSDKError>;

//! RPC 报文编解码
//!
//! Transmission 的 RPC 报文是 HTTP POST 的 JSON body：
//! - 请求：`{"method": <string>, "arguments": <object, 可选>}`
//! - 响应：`{"result": "success"|<错误字符串>, "arguments": <T>}`
//!
//! 本模块无状态：只做序列化与信封解包。`result != "success"` 即使在
//! HTTP 200 下也是协议级失败，映射为 `Protocol`；形状不匹配映射为
//! `Decode`（重试无法修复，调用方永不重试）。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TremoteSDKError};

/// 服务端约定的成功 result 字符串
pub const RESULT_SUCCESS: &str = "success";

/// RPC 请求体
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a> {
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// 序列化请求体
pub fn encode_request(method: &str, arguments: Option<Value>) -> Result<Vec<u8>> {
    let request = RpcRequest { method, arguments };
    serde_json::to_vec(&request)
        .map_err(|e| TremoteSDKError::Serialization(format!("序列化 RPC 请求失败: {}", e)))
}

/// RPC 响应信封
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub result: String,
    pub arguments: Option<T>,
}

/// 解包响应信封并取出类型化的 arguments
pub fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_slice(body)
        .map_err(|e| TremoteSDKError::Decode(format!("解析响应信封失败: {}", e)))?;
    if envelope.result != RESULT_SUCCESS {
        return Err(TremoteSDKError::Protocol(envelope.result));
    }
    envelope
        .arguments
        .ok_or_else(|| TremoteSDKError::Decode("响应缺少 arguments 字段".to_string()))
}

/// 解包只关心成败的响应（torrent-start 等操作的 arguments 为空对象）
pub fn decode_ack(body: &[u8]) -> Result<()> {
    let envelope: Envelope<Value> = serde_json::from_slice(body)
        .map_err(|e| TremoteSDKError::Decode(format!("解析响应信封失败: {}", e)))?;
    if envelope.result != RESULT_SUCCESS {
        return Err(TremoteSDKError::Protocol(envelope.result));
    }
    Ok(())
}

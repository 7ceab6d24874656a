//! エンベロープ
//!
//! 関数間・ゲートウェイ間でやり取りする`{statusCode, headers, body}`形式の
//! ラッパーを扱う。
//! - リクエストエンベロープから`body`を取り出してデコードする
//! - 上流のレスポンスを多段にアンラップする（中継層による二重エンコードを含む）
//! - レスポンスエンベロープを構築する

use std::collections::BTreeMap;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::ResponseBody;

/// アンラップの最大段数
///
/// ゲートウェイ → 関数 → 内部ネットワーク → 関数 の中継で生じる
/// エンコード段数より十分大きい値。
pub const MAX_UNWRAP_DEPTH: usize = 8;

/// エンベロープ処理のエラー型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// リクエストボディがJSONとして不正
    #[error("request body is not valid JSON: {0}")]
    InvalidRequestBody(String),
    /// base64エンコードされたボディのデコード失敗
    #[error("request body is not valid base64: {0}")]
    InvalidBase64(String),
    /// リクエストボディがJSONオブジェクトではない
    #[error("request body must be a JSON object")]
    RequestNotObject,
    /// 上流レスポンスがJSONとして不正
    #[error("upstream response is not valid JSON: {0}")]
    MalformedUpstream(String),
    /// 上流レスポンスのネストが深すぎる
    #[error("upstream response is nested deeper than {0} levels")]
    TooDeep(usize),
    /// 上流レスポンスのボディがJSONオブジェクトではない
    #[error("upstream response body must be a JSON object, got {0}")]
    UnexpectedUpstreamShape(&'static str),
    /// 上流エンベロープのstatusCodeが不正
    #[error("invalid statusCode in upstream envelope: {0}")]
    InvalidStatusCode(String),
}

/// レスポンスエンベロープ
///
/// Lambdaプロキシ統合の戻り値形式。`body`はJSONエンコード済み文字列。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    /// HTTPステータスコード
    pub status_code: u16,
    /// レスポンスヘッダー
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    /// JSONエンコード済みボディ
    pub body: String,
}

impl ProxyResponse {
    /// レスポンスボディからエンベロープを作成
    pub fn new(status_code: u16, body: &ResponseBody) -> Self {
        Self {
            status_code,
            headers: None,
            body: body.to_json(),
        }
    }

    /// 200 OKレスポンスを作成
    pub fn ok(body: &ResponseBody) -> Self {
        Self::new(200, body)
    }

    /// エラーレスポンスを作成
    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        Self::new(status_code, &ResponseBody::error(message))
    }

    /// 任意のJSONマッピングからエンベロープを作成（上流ボディの再ラップ用）
    pub fn from_json_body(status_code: u16, body: &Map<String, Value>) -> Self {
        Self {
            status_code,
            headers: None,
            body: Value::Object(body.clone()).to_string(),
        }
    }

    /// ブラウザ向けのCORSヘッダーを付与
    ///
    /// - Access-Control-Allow-Origin: *
    /// - Content-Type: application/json
    pub fn with_cors(mut self) -> Self {
        let headers = self.headers.get_or_insert_with(BTreeMap::new);
        headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        self
    }

    /// ボディをデコード
    pub fn decoded_body(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// 上流からアンラップしたレスポンス
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply {
    /// 最も内側のエンベロープのステータスコード
    pub status_code: u16,
    /// 最も内側のボディ（JSONオブジェクト）
    pub body: Map<String, Value>,
}

/// リクエストエンベロープからボディを取り出してデコードする
///
/// - `body`が無い、またはnullの場合は空オブジェクト
/// - `body`が文字列の場合はJSONとしてデコード（`isBase64Encoded`ならbase64デコード後）
/// - `body`が既にオブジェクトの場合（ツールからの直接呼び出し）はそのまま使う
pub fn parse_request_body(event: &Value) -> Result<Value, EnvelopeError> {
    let decoded = match event.get("body") {
        None | Some(Value::Null) => return Ok(Value::Object(Map::new())),
        Some(Value::Object(body)) => return Ok(Value::Object(body.clone())),
        Some(Value::String(body)) => {
            let is_base64 = event
                .get("isBase64Encoded")
                .and_then(Value::as_bool)
                .unwrap_or(false);

            let text = if is_base64 {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(body.trim())
                    .map_err(|e| EnvelopeError::InvalidBase64(e.to_string()))?;
                String::from_utf8(bytes).map_err(|e| EnvelopeError::InvalidBase64(e.to_string()))?
            } else {
                body.clone()
            };

            if text.trim().is_empty() {
                return Ok(Value::Object(Map::new()));
            }

            serde_json::from_str::<Value>(&text)
                .map_err(|e| EnvelopeError::InvalidRequestBody(e.to_string()))?
        }
        Some(_) => return Err(EnvelopeError::RequestNotObject),
    };

    match decoded {
        Value::Object(_) => Ok(decoded),
        _ => Err(EnvelopeError::RequestNotObject),
    }
}

/// 上流のレスポンスペイロードを多段にアンラップする
///
/// 以下を繰り返し、JSONオブジェクト（エンベロープ以外）に到達したら終了する:
/// - JSON文字列 → 中身を再デコード（二重エンコード）
/// - `statusCode`を持つオブジェクト → エンベロープとしてステータスを取り出し、`body`を再デコード
///
/// # 引数
/// * `default_status` - エンベロープが無い場合に使うステータス（HTTP応答のステータス等）
/// * `payload` - 上流から受け取った生のペイロード
pub fn unwrap_upstream(default_status: u16, payload: &[u8]) -> Result<UpstreamReply, EnvelopeError> {
    let mut value: Value = serde_json::from_slice(payload)
        .map_err(|e| EnvelopeError::MalformedUpstream(e.to_string()))?;
    let mut status_code = default_status;

    for _ in 0..MAX_UNWRAP_DEPTH {
        value = match value {
            Value::String(encoded) => serde_json::from_str(&encoded)
                .map_err(|e| EnvelopeError::MalformedUpstream(e.to_string()))?,
            Value::Object(mut map) if map.contains_key("statusCode") => {
                status_code = parse_status_code(map.get("statusCode").unwrap_or(&Value::Null))?;
                match map.remove("body") {
                    None | Some(Value::Null) => Value::Object(Map::new()),
                    Some(body) => body,
                }
            }
            Value::Object(body) => return Ok(UpstreamReply { status_code, body }),
            other => return Err(EnvelopeError::UnexpectedUpstreamShape(json_type_name(&other))),
        };
    }

    Err(EnvelopeError::TooDeep(MAX_UNWRAP_DEPTH))
}

/// エンベロープのstatusCode（数値または数値文字列）を解釈する
fn parse_status_code(value: &Value) -> Result<u16, EnvelopeError> {
    let code = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    code.filter(|c| (100..=599).contains(c))
        .map(|c| c as u16)
        .ok_or_else(|| EnvelopeError::InvalidStatusCode(value.to_string()))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransactionId;
    use serde_json::json;

    // ==================== parse_request_body テスト ====================

    #[test]
    fn test_parse_string_body() {
        let event = json!({"body": "{\"transaction_id\": \"10234567\"}"});
        assert_eq!(
            parse_request_body(&event).unwrap(),
            json!({"transaction_id": "10234567"})
        );
    }

    #[test]
    fn test_parse_missing_body_defaults_to_empty_object() {
        assert_eq!(parse_request_body(&json!({})).unwrap(), json!({}));
        assert_eq!(parse_request_body(&json!({"body": null})).unwrap(), json!({}));
        assert_eq!(parse_request_body(&json!({"body": ""})).unwrap(), json!({}));
    }

    #[test]
    fn test_parse_object_body_is_used_directly() {
        let event = json!({"body": {"transaction_id": 5}});
        assert_eq!(parse_request_body(&event).unwrap(), json!({"transaction_id": 5}));
    }

    #[test]
    fn test_parse_base64_body() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("{\"transaction_id\": 1}");
        let event = json!({"body": encoded, "isBase64Encoded": true});
        assert_eq!(parse_request_body(&event).unwrap(), json!({"transaction_id": 1}));
    }

    #[test]
    fn test_parse_invalid_base64_body() {
        let event = json!({"body": "***", "isBase64Encoded": true});
        assert!(matches!(
            parse_request_body(&event),
            Err(EnvelopeError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_parse_invalid_json_body() {
        let event = json!({"body": "{not json"});
        assert!(matches!(
            parse_request_body(&event),
            Err(EnvelopeError::InvalidRequestBody(_))
        ));
    }

    #[test]
    fn test_parse_non_object_body() {
        assert_eq!(
            parse_request_body(&json!({"body": "[1, 2]"})),
            Err(EnvelopeError::RequestNotObject)
        );
        assert_eq!(
            parse_request_body(&json!({"body": 12})),
            Err(EnvelopeError::RequestNotObject)
        );
    }

    // ==================== unwrap_upstream テスト ====================

    #[test]
    fn test_unwrap_function_envelope() {
        let payload = json!({
            "statusCode": 200,
            "body": "{\"10234567\": \"Online purchase at Amazon\"}"
        });

        let reply = unwrap_upstream(200, payload.to_string().as_bytes()).unwrap();

        assert_eq!(reply.status_code, 200);
        assert_eq!(
            Value::Object(reply.body),
            json!({"10234567": "Online purchase at Amazon"})
        );
    }

    #[test]
    fn test_unwrap_plain_body_uses_default_status() {
        let reply = unwrap_upstream(404, br#"{"error": "not here"}"#).unwrap();

        assert_eq!(reply.status_code, 404);
        assert_eq!(Value::Object(reply.body), json!({"error": "not here"}));
    }

    #[test]
    fn test_unwrap_double_encoded_body() {
        // 中継層がボディ文字列をさらにJSON文字列としてエンコードしたケース
        let inner = json!({"42": "Coffee"}).to_string();
        let relayed = Value::String(inner).to_string();

        let reply = unwrap_upstream(200, relayed.as_bytes()).unwrap();

        assert_eq!(Value::Object(reply.body), json!({"42": "Coffee"}));
    }

    #[test]
    fn test_unwrap_double_encoded_envelope() {
        let envelope = json!({"statusCode": 500, "body": "{\"error\": \"boom\"}"}).to_string();
        let relayed = Value::String(envelope).to_string();

        let reply = unwrap_upstream(200, relayed.as_bytes()).unwrap();

        assert_eq!(reply.status_code, 500);
        assert_eq!(Value::Object(reply.body), json!({"error": "boom"}));
    }

    #[test]
    fn test_unwrap_nested_envelopes_take_innermost_status() {
        let inner = json!({"statusCode": 400, "body": "{\"error\": \"transaction_id required\"}"});
        let outer = json!({"statusCode": 200, "body": inner.to_string()});

        let reply = unwrap_upstream(200, outer.to_string().as_bytes()).unwrap();

        assert_eq!(reply.status_code, 400);
        assert_eq!(
            Value::Object(reply.body),
            json!({"error": "transaction_id required"})
        );
    }

    #[test]
    fn test_unwrap_envelope_without_body() {
        let reply = unwrap_upstream(200, br#"{"statusCode": "204"}"#).unwrap();

        assert_eq!(reply.status_code, 204);
        assert!(reply.body.is_empty());
    }

    #[test]
    fn test_unwrap_malformed_payload() {
        assert!(matches!(
            unwrap_upstream(200, b"<html>502 Bad Gateway</html>"),
            Err(EnvelopeError::MalformedUpstream(_))
        ));
        assert!(matches!(
            unwrap_upstream(200, b""),
            Err(EnvelopeError::MalformedUpstream(_))
        ));
    }

    #[test]
    fn test_unwrap_non_object_body() {
        assert_eq!(
            unwrap_upstream(200, b"[1, 2, 3]"),
            Err(EnvelopeError::UnexpectedUpstreamShape("array"))
        );
    }

    #[test]
    fn test_unwrap_invalid_status_code() {
        assert!(matches!(
            unwrap_upstream(200, br#"{"statusCode": 42, "body": "{}"}"#),
            Err(EnvelopeError::InvalidStatusCode(_))
        ));
    }

    #[test]
    fn test_unwrap_too_deep() {
        let mut value = json!({"ok": true}).to_string();
        for _ in 0..=MAX_UNWRAP_DEPTH {
            value = Value::String(value).to_string();
        }

        assert_eq!(
            unwrap_upstream(200, value.as_bytes()),
            Err(EnvelopeError::TooDeep(MAX_UNWRAP_DEPTH))
        );
    }

    // ==================== ProxyResponse テスト ====================

    #[test]
    fn test_proxy_response_serialization_without_headers() {
        let response = ProxyResponse::error(400, "transaction_id required");
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(
            json,
            json!({
                "statusCode": 400,
                "body": "{\"error\":\"transaction_id required\"}"
            })
        );
    }

    #[test]
    fn test_proxy_response_with_cors() {
        let id = TransactionId::from_value(&json!("1")).unwrap();
        let response = ProxyResponse::ok(&ResponseBody::lookup(&id, None)).with_cors();
        let headers = response.headers.as_ref().unwrap();

        assert_eq!(headers.get("Access-Control-Allow-Origin").unwrap(), "*");
        assert_eq!(headers.get("Content-Type").unwrap(), "application/json");
        assert_eq!(response.decoded_body().unwrap(), json!({"1": null}));
    }

    #[test]
    fn test_round_trip_through_both_hops() {
        let id = TransactionId::from_value(&json!("10234567")).unwrap();
        let sent_body = ResponseBody::lookup(&id, Some("Online purchase at Amazon".to_string()));

        // 内部関数の戻り値
        let internal = ProxyResponse::ok(&sent_body);
        let payload = serde_json::to_vec(&internal).unwrap();

        // エッジ関数でアンラップして再ラップ
        let reply = unwrap_upstream(200, &payload).unwrap();
        let edge = ProxyResponse::from_json_body(reply.status_code, &reply.body).with_cors();

        // ブラウザが受け取る内容
        let received = edge.decoded_body().unwrap();
        assert_eq!(edge.status_code, 200);
        assert_eq!(received, serde_json::from_str::<Value>(&sent_body.to_json()).unwrap());
        assert_eq!(received["10234567"], "Online purchase at Amazon");
    }
}

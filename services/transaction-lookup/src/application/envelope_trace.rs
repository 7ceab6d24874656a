// エンベロープ往復トレース
//
// 内部Lambda → (内部ネットワーク) → エッジLambda → ブラウザ の各段で
// JSONがどのような形になるかを再現し、元のマッピングが復元されることを確認する。

use serde_json::Value;

use crate::domain::{unwrap_upstream, EnvelopeError, ProxyResponse, ResponseBody, TransactionId};

/// 各段のJSON
#[derive(Debug, Clone)]
pub struct EnvelopeTrace {
    /// 内部Lambdaの戻り値
    pub internal_response: ProxyResponse,
    /// 中継層を通過したペイロード
    pub relayed_payload: Value,
    /// エッジLambdaがアンラップしたボディ
    pub edge_parsed: Value,
    /// エッジLambdaの戻り値
    pub edge_response: ProxyResponse,
    /// ブラウザが受け取るボディ
    pub received: Value,
    /// ブラウザが取引IDで引いた説明
    pub description: Option<String>,
    /// 元のマッピングが復元されたか
    pub round_trip_ok: bool,
}

/// 往復をトレースする
///
/// # 引数
/// * `transaction_id` - 取引ID
/// * `description` - 内部Lambdaが返す説明
/// * `double_encode` - 中継層がエンベロープをJSON文字列として再エンコードするか
pub fn trace_round_trip(
    transaction_id: &TransactionId,
    description: &str,
    double_encode: bool,
) -> Result<EnvelopeTrace, EnvelopeError> {
    let sent_body = ResponseBody::lookup(transaction_id, Some(description.to_string()));
    let internal_response = ProxyResponse::ok(&sent_body);

    let internal_json = serde_json::to_string(&internal_response)
        .map_err(|e| EnvelopeError::MalformedUpstream(e.to_string()))?;
    let relayed_payload = if double_encode {
        Value::String(internal_json)
    } else {
        serde_json::from_str(&internal_json).map_err(|e| EnvelopeError::MalformedUpstream(e.to_string()))?
    };

    let reply = unwrap_upstream(200, relayed_payload.to_string().as_bytes())?;
    let edge_parsed = Value::Object(reply.body.clone());
    let edge_response = ProxyResponse::from_json_body(reply.status_code, &reply.body).with_cors();

    let received = edge_response
        .decoded_body()
        .map_err(|e| EnvelopeError::MalformedUpstream(e.to_string()))?;
    let description_found = received
        .get(transaction_id.as_str())
        .and_then(Value::as_str)
        .map(str::to_string);

    let expected: Value = serde_json::from_str(&sent_body.to_json())
        .map_err(|e| EnvelopeError::MalformedUpstream(e.to_string()))?;
    let round_trip_ok = received == expected && edge_response.status_code == 200;

    Ok(EnvelopeTrace {
        internal_response,
        relayed_payload,
        edge_parsed,
        edge_response,
        received,
        description: description_found,
        round_trip_ok,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(raw: &str) -> TransactionId {
        TransactionId::from_value(&json!(raw)).unwrap()
    }

    #[test]
    fn test_round_trip_reference_case() {
        let trace = trace_round_trip(&id("10234567"), "Online purchase at Amazon", false).unwrap();

        assert!(trace.round_trip_ok);
        assert_eq!(trace.description.as_deref(), Some("Online purchase at Amazon"));
        assert_eq!(
            serde_json::to_value(&trace.internal_response).unwrap(),
            json!({
                "statusCode": 200,
                "body": "{\"10234567\":\"Online purchase at Amazon\"}"
            })
        );
        assert_eq!(trace.edge_parsed, json!({"10234567": "Online purchase at Amazon"}));
        assert_eq!(trace.received, trace.edge_parsed);
    }

    #[test]
    fn test_round_trip_with_double_encoding() {
        let trace = trace_round_trip(&id("10234567"), "Online purchase at Amazon", true).unwrap();

        assert!(trace.relayed_payload.is_string());
        assert!(trace.round_trip_ok);
        assert_eq!(trace.description.as_deref(), Some("Online purchase at Amazon"));
    }

    #[test]
    fn test_round_trip_preserves_unicode_and_quotes() {
        let description = "コンビニ \"ローソン\" で購入 \u{1F6D2}";
        let trace = trace_round_trip(&id("42"), description, true).unwrap();

        assert!(trace.round_trip_ok);
        assert_eq!(trace.description.as_deref(), Some(description));
    }

    #[test]
    fn test_edge_response_has_cors_headers() {
        let trace = trace_round_trip(&id("1"), "x", false).unwrap();
        let headers = trace.edge_response.headers.unwrap();

        assert_eq!(headers.get("Access-Control-Allow-Origin").unwrap(), "*");
    }
}

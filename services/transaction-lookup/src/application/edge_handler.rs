/// エッジハンドラー
///
/// API Gatewayから受け取ったリクエストを検証し、内部の協調先へ転送する。
/// 協調先のレスポンスをアンラップし、CORSヘッダー付きで再ラップして返す。
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::domain::{
    parse_request_body, unwrap_upstream, EnvelopeError, ProxyResponse, TransactionId,
    TransactionIdError,
};
use crate::infrastructure::{ForwardError, Forwarder};

/// エッジハンドラーのエラー型
#[derive(Debug, Error)]
pub enum EdgeHandlerError {
    /// リクエストボディが不正
    #[error(transparent)]
    InvalidRequest(EnvelopeError),
    /// transaction_idが未指定または不正
    #[error(transparent)]
    TransactionId(#[from] TransactionIdError),
    /// 転送失敗
    #[error(transparent)]
    Forward(#[from] ForwardError),
    /// 協調先のレスポンスが不正
    #[error(transparent)]
    MalformedUpstream(EnvelopeError),
}

impl EdgeHandlerError {
    /// エラーに対応するHTTPステータスコード
    pub fn status_code(&self) -> u16 {
        match self {
            EdgeHandlerError::TransactionId(err) if err.is_missing() => 400,
            EdgeHandlerError::Forward(err) if err.is_timeout() => 504,
            _ => 500,
        }
    }

    /// エラーレスポンスに変換
    pub fn into_response(self) -> ProxyResponse {
        ProxyResponse::error(self.status_code(), self.to_string())
    }
}

/// エッジハンドラー
pub struct EdgeHandler<F>
where
    F: Forwarder,
{
    /// 転送実装
    forwarder: F,
}

impl<F> EdgeHandler<F>
where
    F: Forwarder,
{
    /// 新しいEdgeHandlerを作成
    pub fn new(forwarder: F) -> Self {
        Self { forwarder }
    }

    /// リクエストを処理
    ///
    /// # 処理フロー
    /// 1. リクエストボディをデコードしtransaction_idを検証（欠落時は400）
    /// 2. 協調先へ転送
    /// 3. 協調先のレスポンスをアンラップ
    /// 4. CORSヘッダー付きで再ラップ
    ///
    /// エラーはすべてレスポンスに変換されるため、このメソッドは失敗しない。
    /// タイムアウトは504、その他の失敗は500。
    pub async fn handle(&self, event: &Value) -> ProxyResponse {
        let response = match self.try_handle(event).await {
            Ok(response) => response,
            Err(err) => {
                let status = err.status_code();
                if status >= 500 {
                    error!(
                        status = status,
                        target = %self.forwarder.target(),
                        error = %err,
                        "転送処理に失敗"
                    );
                } else {
                    warn!(status = status, error = %err, "不正なリクエスト");
                }
                err.into_response()
            }
        };

        response.with_cors()
    }

    async fn try_handle(&self, event: &Value) -> Result<ProxyResponse, EdgeHandlerError> {
        let request = parse_request_body(event).map_err(EdgeHandlerError::InvalidRequest)?;
        let transaction_id = TransactionId::from_request(&request)?;

        info!(
            transaction_id = %transaction_id,
            target = %self.forwarder.target(),
            "取引検索リクエストを転送"
        );

        let upstream = self.forwarder.forward(&transaction_id).await?;
        let reply = unwrap_upstream(upstream.status_code, &upstream.payload)
            .map_err(EdgeHandlerError::MalformedUpstream)?;

        info!(
            transaction_id = %transaction_id,
            status = reply.status_code,
            "協調先レスポンスを受信"
        );

        Ok(ProxyResponse::from_json_body(reply.status_code, &reply.body))
    }
}

// HttpForwarder - 内部ネットワークエンドポイントへのHTTP転送
//
// エッジLambdaから内部ネットワーク（VPC Lattice等）経由で内部Lambdaを呼び出す。
// 固定タイムアウトで打ち切り、再試行はデフォルトで行わない。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use super::forwarder::{ForwardError, Forwarder, UpstreamResponse};
use crate::domain::TransactionId;

/// 接続タイムアウトの上限（秒）
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// HTTP転送実装
#[derive(Clone)]
pub struct HttpForwarder {
    /// HTTPクライアント（再試行が有効な場合はミドルウェア付き）
    client: ClientWithMiddleware,
    /// 転送先URL
    endpoint: String,
    /// リクエストタイムアウト
    timeout: Duration,
}

impl std::fmt::Debug for HttpForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpForwarder")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpForwarder {
    /// 新しいHttpForwarderを作成
    ///
    /// # 引数
    /// * `endpoint` - 転送先URL
    /// * `timeout` - リクエスト全体のタイムアウト
    /// * `max_retries` - 一時的エラー時の再試行回数（0で再試行しない）
    pub fn new(endpoint: impl Into<String>, timeout: Duration, max_retries: u32) -> Result<Self, ForwardError> {
        let endpoint = endpoint.into();

        let base_client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(CONNECT_TIMEOUT_SECS)))
            .build()
            .map_err(|e| ForwardError::Configuration(e.to_string()))?;

        let mut builder = ClientBuilder::new(base_client);
        if max_retries > 0 {
            let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
            builder = builder.with(RetryTransientMiddleware::new_with_policy(retry_policy));
        }

        info!(
            endpoint = %endpoint,
            timeout_secs = timeout.as_secs(),
            max_retries = max_retries,
            "HttpForwarderを初期化"
        );

        Ok(Self {
            client: builder.build(),
            endpoint,
            timeout,
        })
    }

    fn timeout_error(&self, cause: impl std::fmt::Display) -> ForwardError {
        ForwardError::Timeout(format!(
            "no response from {} within {}s ({})",
            self.endpoint,
            self.timeout.as_secs(),
            cause
        ))
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    #[instrument(skip(self, transaction_id), fields(endpoint = %self.endpoint, transaction_id = %transaction_id))]
    async fn forward(&self, transaction_id: &TransactionId) -> Result<UpstreamResponse, ForwardError> {
        let body = serde_json::to_string(&json!({"transaction_id": transaction_id.as_str()}))
            .map_err(|e| ForwardError::Serialization(e.to_string()))?;

        debug!("内部エンドポイントへ転送");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!(error = %e, "転送タイムアウト");
                    self.timeout_error(&e)
                } else {
                    error!(error = %e, "転送リクエスト失敗");
                    ForwardError::Network(e.to_string())
                }
            })?;

        let status = response.status();

        let payload = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                warn!(error = %e, "レスポンス受信中にタイムアウト");
                self.timeout_error(&e)
            } else {
                error!(error = %e, "レスポンス受信失敗");
                ForwardError::Network(e.to_string())
            }
        })?;

        info!(
            status = %status,
            payload_bytes = payload.len(),
            "転送完了"
        );

        Ok(UpstreamResponse::new(status.as_u16(), payload.to_vec()))
    }

    fn target(&self) -> String {
        self.endpoint.clone()
    }
}

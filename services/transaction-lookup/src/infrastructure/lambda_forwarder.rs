//! Lambda関数呼び出しによる転送
//!
//! 内部Lambdaを`RequestResponse`で同期呼び出しする。
//! 関数名の代わりにARNを指定すれば別アカウントの関数も呼び出せる。
//! SDKの再試行は無効化し、タイムアウトはオペレーションタイムアウトで制御する。

use std::time::Duration;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_lambda::error::{DisplayErrorContext, SdkError};
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use aws_sdk_lambda::Client as LambdaClient;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use super::forwarder::{ForwardError, Forwarder, UpstreamResponse};
use crate::domain::TransactionId;

/// Lambda呼び出しによる転送実装
pub struct LambdaForwarder {
    client: LambdaClient,
    /// 呼び出す関数名またはARN
    function_name: String,
    /// オペレーションタイムアウト（エラーメッセージ用）
    timeout: Duration,
}

impl LambdaForwarder {
    /// 新しいLambdaForwarderを作成
    pub fn new(client: LambdaClient, function_name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            function_name: function_name.into(),
            timeout,
        }
    }

    /// AWS設定からクライアントを作成
    ///
    /// タイムアウトをオペレーションタイムアウトとして設定し、SDKの再試行は行わない。
    pub async fn from_config(function_name: &str, timeout: Duration) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build())
            .retry_config(RetryConfig::standard().with_max_attempts(1))
            .load()
            .await;

        info!(
            function_name = %function_name,
            timeout_secs = timeout.as_secs(),
            "LambdaForwarderを初期化"
        );

        Self::new(LambdaClient::new(&config), function_name, timeout)
    }

    /// 内部Lambdaへ渡すペイロードを構築
    ///
    /// 内部Lambdaはゲートウェイ経由と同じ形でボディを受け取るため、
    /// `{"body": "<JSONエンコード済みリクエスト>"}`の形にする。
    pub fn build_payload(transaction_id: &TransactionId) -> Result<Vec<u8>, ForwardError> {
        let request = json!({"transaction_id": transaction_id.as_str()});
        serde_json::to_vec(&json!({"body": request.to_string()}))
            .map_err(|e| ForwardError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl Forwarder for LambdaForwarder {
    #[instrument(skip(self, transaction_id), fields(function_name = %self.function_name, transaction_id = %transaction_id))]
    async fn forward(&self, transaction_id: &TransactionId) -> Result<UpstreamResponse, ForwardError> {
        let payload = Self::build_payload(transaction_id)?;

        let output = self
            .client
            .invoke()
            .function_name(&self.function_name)
            .invocation_type(InvocationType::RequestResponse)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|err| {
                if matches!(err, SdkError::TimeoutError(_)) {
                    warn!("Lambda呼び出しタイムアウト");
                    ForwardError::Timeout(format!(
                        "function {} did not respond within {}s",
                        self.function_name,
                        self.timeout.as_secs()
                    ))
                } else {
                    error!(error = %DisplayErrorContext(&err), "Lambda呼び出しエラー");
                    ForwardError::AwsSdkError(DisplayErrorContext(&err).to_string())
                }
            })?;

        let body = output
            .payload()
            .map(|blob| blob.as_ref().to_vec())
            .unwrap_or_default();

        // 関数内で未処理のエラーが発生した場合（ペイロードはerrorMessage等）
        if let Some(function_error) = output.function_error() {
            let detail = String::from_utf8_lossy(&body).to_string();
            error!(
                function_error = %function_error,
                detail = %detail,
                "呼び出し先関数がエラーを返却"
            );
            return Err(ForwardError::FunctionError(format!("{}: {}", function_error, detail)));
        }

        info!(
            status_code = output.status_code(),
            payload_bytes = body.len(),
            "Lambda呼び出し完了"
        );

        // 呼び出し自体のステータスは200。実際のステータスはペイロードのエンベロープが持つ
        Ok(UpstreamResponse::new(200, body))
    }

    fn target(&self) -> String {
        self.function_name.clone()
    }
}

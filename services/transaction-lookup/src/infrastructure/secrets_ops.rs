//! Secrets Manager操作モジュール
//!
//! 内部Lambdaで使用するDB認証情報をシークレットストアから取得する。
//! - シークレットIDまたはARNを指定してシークレット文字列を取得
//! - バイナリシークレットはUTF-8として解釈する

use async_trait::async_trait;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use thiserror::Error;
use tracing::{info, warn};

/// シークレット操作のエラー型
#[derive(Debug, Error)]
pub enum SecretsOpsError {
    /// AWS SDK エラー
    #[error("AWS Secrets Manager API error: {0}")]
    AwsSdkError(String),
    /// シークレットに値が無い、または文字列として解釈できない
    #[error("secret {0} has no string value")]
    NoSecretString(String),
}

/// シークレット操作トレイト（テスト用の抽象化）
#[async_trait]
pub trait SecretsOps: Send + Sync {
    /// シークレット文字列を取得する
    ///
    /// # 引数
    /// * `secret_id` - シークレットIDまたはARN
    ///
    /// # 戻り値
    /// * `Ok(String)` - シークレット文字列（通常はJSON）
    /// * `Err(SecretsOpsError)` - エラー
    async fn get_secret_string(&self, secret_id: &str) -> Result<String, SecretsOpsError>;
}

/// 実際のAWS Secrets Manager SDKを使用した実装
pub struct AwsSecretsOps {
    client: SecretsManagerClient,
}

impl AwsSecretsOps {
    /// 新しいAwsSecretsOpsを作成
    pub fn new(client: SecretsManagerClient) -> Self {
        Self { client }
    }

    /// AWS設定からデフォルトのクライアントを作成
    pub async fn from_config() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(SecretsManagerClient::new(&config))
    }
}

#[async_trait]
impl SecretsOps for AwsSecretsOps {
    async fn get_secret_string(&self, secret_id: &str) -> Result<String, SecretsOpsError> {
        info!(secret_id = %secret_id, "シークレット取得開始");

        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|err| {
                warn!(
                    secret_id = %secret_id,
                    error = %DisplayErrorContext(&err),
                    "GetSecretValueエラー"
                );
                SecretsOpsError::AwsSdkError(DisplayErrorContext(&err).to_string())
            })?;

        if let Some(secret) = output.secret_string() {
            return Ok(secret.to_string());
        }

        // バイナリシークレット
        output
            .secret_binary()
            .and_then(|blob| String::from_utf8(blob.as_ref().to_vec()).ok())
            .ok_or_else(|| SecretsOpsError::NoSecretString(secret_id.to_string()))
    }
}

//! 転送モジュール
//!
//! エッジLambdaから内部の協調先へリクエストを転送する抽象化。
//! - Lambda関数の同期呼び出し（同一アカウント・別アカウント）
//! - 内部ネットワークエンドポイントへのHTTPS呼び出し
//!
//! 転送実装は協調先の生のレスポンスペイロードを返し、
//! エンベロープのアンラップは呼び出し側で行う。

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::forward_config::{ForwardConfig, ForwardTarget};
use super::http_forwarder::HttpForwarder;
use super::lambda_forwarder::LambdaForwarder;
use crate::domain::TransactionId;

/// 転送のエラー型
#[derive(Debug, Clone, Error)]
pub enum ForwardError {
    /// タイムアウト
    #[error("upstream timeout: {0}")]
    Timeout(String),
    /// ネットワークエラー
    #[error("upstream network error: {0}")]
    Network(String),
    /// 呼び出した関数自体がエラーを返した
    #[error("upstream function error: {0}")]
    FunctionError(String),
    /// AWS SDK エラー
    #[error("AWS Lambda API error: {0}")]
    AwsSdkError(String),
    /// 転送先が構築できない
    #[error("forwarding is not configured: {0}")]
    Configuration(String),
    /// 転送リクエストのシリアライズ失敗
    #[error("failed to serialize forwarded request: {0}")]
    Serialization(String),
}

impl ForwardError {
    /// タイムアウトかどうか
    pub fn is_timeout(&self) -> bool {
        matches!(self, ForwardError::Timeout(_))
    }
}

/// 協調先から受け取った生のレスポンス
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    /// トランスポート層のステータス（エンベロープが無い場合に使用）
    pub status_code: u16,
    /// レスポンスペイロード
    pub payload: Vec<u8>,
}

impl UpstreamResponse {
    /// 新しいレスポンスを作成
    pub fn new(status_code: u16, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code,
            payload: payload.into(),
        }
    }
}

/// 転送トレイト（テスト用の抽象化）
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// 取引IDの検索リクエストを協調先へ転送する
    async fn forward(&self, transaction_id: &TransactionId) -> Result<UpstreamResponse, ForwardError>;

    /// ログ用の転送先表示名
    fn target(&self) -> String;
}

#[async_trait]
impl<T: Forwarder + ?Sized> Forwarder for Arc<T> {
    async fn forward(&self, transaction_id: &TransactionId) -> Result<UpstreamResponse, ForwardError> {
        (**self).forward(transaction_id).await
    }

    fn target(&self) -> String {
        (**self).target()
    }
}

/// 転送先を構築できなかった場合の実装
///
/// 入力検証（400）は転送先の有無に関係なく行うため、
/// 設定エラーは転送時点で返す。
#[derive(Debug, Clone)]
pub struct UnavailableForwarder {
    reason: String,
}

impl UnavailableForwarder {
    /// 新しいUnavailableForwarderを作成
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Forwarder for UnavailableForwarder {
    async fn forward(&self, _transaction_id: &TransactionId) -> Result<UpstreamResponse, ForwardError> {
        Err(ForwardError::Configuration(self.reason.clone()))
    }

    fn target(&self) -> String {
        "(unavailable)".to_string()
    }
}

/// 設定から転送実装を構築する
pub async fn build_forwarder(config: &ForwardConfig) -> Result<Arc<dyn Forwarder>, ForwardError> {
    match config.target() {
        ForwardTarget::Function { function_name } => Ok(Arc::new(
            LambdaForwarder::from_config(function_name, config.timeout()).await,
        )),
        ForwardTarget::Endpoint { url } => Ok(Arc::new(HttpForwarder::new(
            url,
            config.timeout(),
            config.max_retries(),
        )?)),
    }
}

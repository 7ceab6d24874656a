//! DB認証情報の解決
//!
//! 呼び出し時点で接続パラメータを確定する。
//! - 環境変数から直接構築
//! - シークレットストアからJSONシークレットを取得して構築

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use super::db_config::{DbConfig, DbConfigError, DbEnv};
use super::secrets_ops::{SecretsOps, SecretsOpsError};

/// 認証情報解決のエラー型
#[derive(Debug, Error)]
pub enum CredentialError {
    /// 設定エラー
    #[error(transparent)]
    Config(#[from] DbConfigError),
    /// シークレット取得エラー
    #[error(transparent)]
    Secrets(#[from] SecretsOpsError),
}

/// 認証情報の取得元
#[derive(Clone)]
pub enum CredentialSource {
    /// 環境変数（DB_HOST等）
    Environment,
    /// シークレットストア
    SecretsStore {
        /// シークレットIDまたはARN
        secret_id: String,
        /// シークレット操作
        secrets: Arc<dyn SecretsOps>,
    },
}

impl std::fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::Environment => f.write_str("Environment"),
            CredentialSource::SecretsStore { secret_id, .. } => f
                .debug_struct("SecretsStore")
                .field("secret_id", secret_id)
                .finish_non_exhaustive(),
        }
    }
}

/// 認証情報リゾルバー
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    source: CredentialSource,
    env: DbEnv,
}

impl CredentialResolver {
    /// 新しいリゾルバーを作成
    ///
    /// # 引数
    /// * `source` - 認証情報の取得元
    /// * `env` - DB関連の環境変数（シークレットに無い項目のフォールバックにも使う）
    pub fn new(source: CredentialSource, env: DbEnv) -> Self {
        Self { source, env }
    }

    /// 接続設定を解決する
    pub async fn resolve(&self) -> Result<DbConfig, CredentialError> {
        match &self.source {
            CredentialSource::Environment => Ok(DbConfig::from_env_values(&self.env)?),
            CredentialSource::SecretsStore { secret_id, secrets } => {
                let secret = secrets.get_secret_string(secret_id).await?;
                let config = DbConfig::from_secret(&secret, &self.env)?;

                info!(
                    secret_id = %secret_id,
                    host = %config.host(),
                    database = %config.database(),
                    "シークレットからDB接続設定を解決"
                );

                Ok(config)
            }
        }
    }
}

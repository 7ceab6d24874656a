//! 取引リポジトリ
//!
//! `transactions`テーブルへのアクセスを提供する。
//! 呼び出しごとに接続を開き、成功・失敗いずれの経路でも返却前に閉じる。

use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Executor};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::credentials::{CredentialError, CredentialResolver};
use crate::domain::TransactionRecord;

/// 取引検索SQL
const FIND_TRANSACTION_SQL: &str =
    "SELECT description FROM transactions WHERE transaction_id = $1";

/// プレースホルダー挿入SQL
const INSERT_TRANSACTION_SQL: &str =
    "INSERT INTO transactions (transaction_id, description) VALUES ($1, $2)";

/// リポジトリ操作のエラー型
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// 認証情報の解決に失敗
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    /// 接続エラー
    #[error("database connection failed: {0}")]
    Connection(String),
    /// クエリ実行エラー
    #[error("database query failed: {0}")]
    Query(String),
}

/// 取引リポジトリトレイト
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// 取引IDで1件検索する（最大1行）
    async fn find_by_id(&self, transaction_id: i64) -> Result<Option<TransactionRecord>, RepositoryError>;

    /// 取引レコードを挿入する
    async fn insert(&self, record: &TransactionRecord) -> Result<(), RepositoryError>;

    /// SQL文をそのまま実行し、影響行数を返す
    async fn execute_raw(&self, statement: &str) -> Result<u64, RepositoryError>;
}

/// PostgreSQL実装
#[derive(Debug, Clone)]
pub struct PgTransactionRepository {
    credentials: CredentialResolver,
}

impl PgTransactionRepository {
    /// 新しいリポジトリを作成
    ///
    /// 認証情報は接続時に解決する。
    pub fn new(credentials: CredentialResolver) -> Self {
        Self { credentials }
    }

    /// 認証情報を解決して接続を開く
    async fn connect(&self) -> Result<PgConnection, RepositoryError> {
        let config = self.credentials.resolve().await?;
        let timeout = config.connect_timeout();

        debug!(
            host = %config.host(),
            port = config.port(),
            database = %config.database(),
            "DB接続開始"
        );

        match tokio::time::timeout(timeout, PgConnection::connect_with(&config.connect_options())).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(err)) => Err(RepositoryError::Connection(err.to_string())),
            Err(_) => Err(RepositoryError::Connection(format!(
                "timed out after {}s connecting to {}:{}",
                timeout.as_secs(),
                config.host(),
                config.port()
            ))),
        }
    }
}

/// 接続を閉じる（失敗は警告ログのみ）
async fn close(conn: PgConnection) {
    if let Err(err) = conn.close().await {
        warn!(error = %err, "DB接続のクローズに失敗");
    }
}

#[async_trait]
impl TransactionRepository for PgTransactionRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, transaction_id: i64) -> Result<Option<TransactionRecord>, RepositoryError> {
        let mut conn = self.connect().await?;

        let result = sqlx::query_as::<_, (Option<String>,)>(FIND_TRANSACTION_SQL)
            .bind(transaction_id)
            .fetch_optional(&mut conn)
            .await;

        close(conn).await;

        let row = result.map_err(|e| RepositoryError::Query(e.to_string()))?;
        debug!(found = row.is_some(), "取引検索完了");

        Ok(row.map(|(description,)| TransactionRecord::new(transaction_id, description)))
    }

    #[instrument(skip(self, record), fields(transaction_id = record.transaction_id))]
    async fn insert(&self, record: &TransactionRecord) -> Result<(), RepositoryError> {
        let mut conn = self.connect().await?;

        let result = sqlx::query(INSERT_TRANSACTION_SQL)
            .bind(record.transaction_id)
            .bind(record.description.as_deref())
            .execute(&mut conn)
            .await;

        close(conn).await;

        result.map_err(|e| RepositoryError::Query(e.to_string()))?;
        info!("取引レコードを挿入");
        Ok(())
    }

    #[instrument(skip(self, statement))]
    async fn execute_raw(&self, statement: &str) -> Result<u64, RepositoryError> {
        let mut conn = self.connect().await?;

        // 単純クエリプロトコルで実行する（複数文もそのまま送る）
        let result = Executor::execute(&mut conn, statement).await;

        close(conn).await;

        let rows_affected = result
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .rows_affected();
        info!(rows_affected = rows_affected, "SQL文を実行");
        Ok(rows_affected)
    }
}

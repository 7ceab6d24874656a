/// 内部ハンドラー
///
/// DBへ直接到達できる環境で実行され、取引IDで1件検索した結果を返す。
/// 生SQL実行・プレースホルダー挿入は設定で有効化した場合のみ動作する。
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::domain::{
    parse_request_body, placeholder_description, EnvelopeError, ProxyResponse, ResponseBody,
    TransactionId, TransactionIdError, TransactionRecord,
};
use crate::infrastructure::{InternalHandlerConfig, RepositoryError, TransactionRepository};

/// 内部ハンドラーのエラー型
#[derive(Debug, Error)]
pub enum InternalHandlerError {
    /// リクエストボディが不正
    #[error(transparent)]
    InvalidRequest(#[from] EnvelopeError),
    /// transaction_idが未指定または不正
    #[error(transparent)]
    TransactionId(#[from] TransactionIdError),
    /// 生SQL実行が無効
    #[error("sql execution is disabled")]
    RawSqlDisabled,
    /// sqlフィールドが文字列ではない
    #[error("sql must be a string")]
    InvalidSqlField,
    /// DB操作の失敗
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl InternalHandlerError {
    /// エラーに対応するHTTPステータスコード
    pub fn status_code(&self) -> u16 {
        match self {
            InternalHandlerError::TransactionId(err) if err.is_missing() => 400,
            InternalHandlerError::RawSqlDisabled => 400,
            _ => 500,
        }
    }

    /// エラーレスポンスに変換
    pub fn into_response(self) -> ProxyResponse {
        ProxyResponse::error(self.status_code(), self.to_string())
    }
}

/// 内部ハンドラー
pub struct InternalHandler<R>
where
    R: TransactionRepository,
{
    /// 取引リポジトリ
    repository: R,
    /// 動作設定
    config: InternalHandlerConfig,
}

impl<R> InternalHandler<R>
where
    R: TransactionRepository,
{
    /// デフォルト設定（安全でない経路はすべて無効）で作成
    pub fn new(repository: R) -> Self {
        Self::with_config(repository, InternalHandlerConfig::default())
    }

    /// 動作設定を指定して作成
    pub fn with_config(repository: R, config: InternalHandlerConfig) -> Self {
        Self { repository, config }
    }

    /// リクエストを処理
    ///
    /// # 処理フロー
    /// 1. リクエストボディをデコード
    /// 2. `sql`フィールドがあれば生SQL実行（有効時のみ）
    /// 3. transaction_idを検証して1件検索
    /// 4. 見つからない場合、挿入フォールバックが有効ならプレースホルダーを挿入
    ///
    /// エラーはすべてレスポンスに変換されるため、このメソッドは失敗しない。
    pub async fn handle(&self, event: &Value) -> ProxyResponse {
        match self.try_handle(event).await {
            Ok(response) => response,
            Err(err) => {
                let status = err.status_code();
                if status >= 500 {
                    error!(status = status, error = %err, "取引検索に失敗");
                } else {
                    warn!(status = status, error = %err, "不正なリクエスト");
                }
                err.into_response()
            }
        }
    }

    async fn try_handle(&self, event: &Value) -> Result<ProxyResponse, InternalHandlerError> {
        let request = parse_request_body(event)?;

        match request.get("sql") {
            None | Some(Value::Null) => {}
            Some(Value::String(statement)) => return self.execute_raw(statement).await,
            Some(_) => return Err(InternalHandlerError::InvalidSqlField),
        }

        let transaction_id = TransactionId::from_request(&request)?;
        let key = transaction_id.to_i64()?;

        match self.repository.find_by_id(key).await? {
            Some(record) => {
                info!(
                    transaction_id = %transaction_id,
                    has_description = record.description.is_some(),
                    "取引を検索"
                );
                Ok(ProxyResponse::ok(&ResponseBody::lookup(
                    &transaction_id,
                    record.description,
                )))
            }
            None if self.config.insert_on_miss => self.insert_placeholder(&transaction_id, key).await,
            None => {
                info!(transaction_id = %transaction_id, "取引が見つからない");
                Ok(ProxyResponse::ok(&ResponseBody::lookup(&transaction_id, None)))
            }
        }
    }

    /// 生SQLを実行
    async fn execute_raw(&self, statement: &str) -> Result<ProxyResponse, InternalHandlerError> {
        if !self.config.allow_raw_sql {
            return Err(InternalHandlerError::RawSqlDisabled);
        }

        warn!(statement_len = statement.len(), "リクエストのSQL文をそのまま実行");

        let rows_affected = self.repository.execute_raw(statement).await?;

        Ok(ProxyResponse::ok(&ResponseBody::message(format!(
            "statement executed, {} rows affected",
            rows_affected
        ))))
    }

    /// 未登録の取引IDにプレースホルダー行を挿入
    async fn insert_placeholder(
        &self,
        transaction_id: &TransactionId,
        key: i64,
    ) -> Result<ProxyResponse, InternalHandlerError> {
        let record = TransactionRecord::new(
            key,
            Some(placeholder_description(key, chrono::Utc::now())),
        );
        self.repository.insert(&record).await?;

        info!(transaction_id = %transaction_id, "プレースホルダー行を挿入");

        Ok(ProxyResponse::ok(&ResponseBody::message(format!(
            "transaction {} not found; placeholder inserted",
            transaction_id
        ))))
    }
}

//! 取引ID
//!
//! リクエストの`transaction_id`フィールドを表す値オブジェクト。
//! - JSON文字列またはJSON整数を受け付ける
//! - 欠落・null・空文字列・0・falseは「未指定」として扱う
//! - レスポンスのキーには受け取ったテキスト表現をそのまま使う

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// 取引IDの解析エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionIdError {
    /// transaction_idが指定されていない
    #[error("transaction_id required")]
    Missing,
    /// 文字列・整数以外の型が指定された
    #[error("transaction_id must be a string or an integer")]
    UnsupportedType,
    /// 整数として解釈できない
    #[error("transaction_id must be an integer: {0}")]
    NotInteger(String),
}

impl TransactionIdError {
    /// 必須フィールドの欠落か（クライアントエラーとして扱うのはこの場合のみ）
    pub fn is_missing(&self) -> bool {
        matches!(self, TransactionIdError::Missing)
    }
}

/// 取引ID
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId(String);

impl TransactionId {
    /// デコード済みリクエストボディから取引IDを取り出す
    pub fn from_request(request: &Value) -> Result<Self, TransactionIdError> {
        Self::from_value(request.get("transaction_id").unwrap_or(&Value::Null))
    }

    /// JSON値から取引IDを作成
    pub fn from_value(value: &Value) -> Result<Self, TransactionIdError> {
        match value {
            Value::Null | Value::Bool(false) => Err(TransactionIdError::Missing),
            Value::String(text) if text.trim().is_empty() => Err(TransactionIdError::Missing),
            Value::String(text) => Ok(Self(text.clone())),
            Value::Number(number) => {
                if let Some(n) = number.as_i64() {
                    if n == 0 {
                        return Err(TransactionIdError::Missing);
                    }
                    Ok(Self(n.to_string()))
                } else if let Some(n) = number.as_u64() {
                    Ok(Self(n.to_string()))
                } else if number.as_f64() == Some(0.0) {
                    Err(TransactionIdError::Missing)
                } else {
                    Err(TransactionIdError::UnsupportedType)
                }
            }
            _ => Err(TransactionIdError::UnsupportedType),
        }
    }

    /// テキスト表現を取得
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// DB検索用の整数値に変換
    pub fn to_i64(&self) -> Result<i64, TransactionIdError> {
        self.0
            .trim()
            .parse::<i64>()
            .map_err(|_| TransactionIdError::NotInteger(self.0.clone()))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

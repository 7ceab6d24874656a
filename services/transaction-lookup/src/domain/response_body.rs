//! レスポンスボディ
//!
//! エンベロープの`body`に入るJSONマッピング。
//! 結果（検索結果またはメッセージ）かエラーのどちらか一方のみを持つ。

use std::collections::BTreeMap;

use serde::Serialize;

use super::TransactionId;

/// レスポンスボディ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    /// 検索結果 `{"<id>": "<description>" | null}`
    Lookup(BTreeMap<String, Option<String>>),
    /// 処理結果メッセージ `{"message": "..."}`
    Message {
        /// メッセージ本文
        message: String,
    },
    /// エラー `{"error": "..."}`
    Error {
        /// エラーメッセージ
        error: String,
    },
}

impl ResponseBody {
    /// 検索結果ボディを作成
    pub fn lookup(transaction_id: &TransactionId, description: Option<String>) -> Self {
        let mut result = BTreeMap::new();
        result.insert(transaction_id.as_str().to_string(), description);
        Self::Lookup(result)
    }

    /// メッセージボディを作成
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    /// エラーボディを作成
    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    /// JSON文字列にエンコード
    pub fn to_json(&self) -> String {
        // キーは文字列、値は文字列かnullのみなのでシリアライズは失敗しない
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// 取引レコード
///
/// `transactions`テーブルの1行を表す。
/// 関数はテーブルのライフサイクルを所有せず、1行の読み書きのみ行う。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    /// 取引ID（整数キー）
    pub transaction_id: i64,
    /// 取引の説明（NULL許容列）
    pub description: Option<String>,
}

impl TransactionRecord {
    /// 新しいレコードを作成
    pub fn new(transaction_id: i64, description: Option<String>) -> Self {
        Self {
            transaction_id,
            description,
        }
    }
}

/// 未登録の取引IDに対して挿入するプレースホルダーの説明文を生成
pub fn placeholder_description(transaction_id: i64, created_at: chrono::DateTime<chrono::Utc>) -> String {
    format!(
        "Placeholder transaction {} created {}",
        transaction_id,
        created_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    )
}

/// 内部Lambdaの動作設定
///
/// 安全でない経路（生SQL実行・未登録IDへのプレースホルダー挿入）は
/// 環境変数で明示的に有効化した場合のみ動作する。
use thiserror::Error;

/// 内部Lambda設定のエラー型
#[derive(Debug, Error)]
pub enum InternalConfigError {
    #[error("Invalid boolean for {name}: {value}")]
    InvalidFlag { name: String, value: String },
}

/// 内部Lambdaの動作設定
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InternalHandlerConfig {
    /// リクエストの`sql`フィールドをそのまま実行する（ALLOW_RAW_SQL）
    pub allow_raw_sql: bool,
    /// 未登録の取引IDにプレースホルダー行を挿入する（INSERT_ON_MISS）
    pub insert_on_miss: bool,
}

impl InternalHandlerConfig {
    /// 環境変数から読み込み（未設定はすべてfalse）
    pub fn from_env() -> Result<Self, InternalConfigError> {
        Ok(Self {
            allow_raw_sql: read_flag("ALLOW_RAW_SQL")?,
            insert_on_miss: read_flag("INSERT_ON_MISS")?,
        })
    }
}

fn read_flag(name: &str) -> Result<bool, InternalConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(false),
        Ok(value) => parse_flag(&value).ok_or_else(|| InternalConfigError::InvalidFlag {
            name: name.to_string(),
            value,
        }),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Some(false),
        "1" | "true" | "yes" | "on" => Some(true),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_flag() {
        for truthy in ["1", "true", "TRUE", " yes ", "on"] {
            assert_eq!(parse_flag(truthy), Some(true), "{}", truthy);
        }
        for falsy in ["", "0", "false", "No", "off"] {
            assert_eq!(parse_flag(falsy), Some(false), "{}", falsy);
        }
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_default_is_all_disabled() {
        let config = InternalHandlerConfig::default();
        assert!(!config.allow_raw_sql);
        assert!(!config.insert_on_miss);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        unsafe {
            std::env::set_var("ALLOW_RAW_SQL", "true");
            std::env::remove_var("INSERT_ON_MISS");
        }

        let config = InternalHandlerConfig::from_env().unwrap();
        assert!(config.allow_raw_sql);
        assert!(!config.insert_on_miss);

        unsafe {
            std::env::set_var("INSERT_ON_MISS", "sometimes");
        }

        match InternalHandlerConfig::from_env() {
            Err(InternalConfigError::InvalidFlag { name, value }) => {
                assert_eq!(name, "INSERT_ON_MISS");
                assert_eq!(value, "sometimes");
            }
            other => panic!("InvalidFlagを期待: {:?}", other),
        }

        unsafe {
            std::env::remove_var("ALLOW_RAW_SQL");
            std::env::remove_var("INSERT_ON_MISS");
        }
    }
}

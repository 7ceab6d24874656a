// データベース接続設定
//
// 環境変数またはシークレットJSONからPostgreSQL接続パラメータを構築する。

use std::time::Duration;

use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use thiserror::Error;

/// デフォルトのPostgreSQLポート
pub const DEFAULT_DB_PORT: u16 = 5432;

/// デフォルトの接続タイムアウト（秒）
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// DB設定エラー
#[derive(Debug, Error)]
pub enum DbConfigError {
    /// 必須の環境変数が設定されていない
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    /// シークレットにも環境変数にも値が無い
    #[error("Missing database setting: {field} (not in secret, {env_var} not set)")]
    MissingSetting {
        /// シークレット上のフィールド名
        field: &'static str,
        /// フォールバックする環境変数名
        env_var: &'static str,
    },
    /// 値が不正
    #[error("Invalid value for {name}: {value}")]
    InvalidValue {
        /// 設定名
        name: String,
        /// 不正な値
        value: String,
    },
    /// シークレットJSONが不正
    #[error("Invalid database secret: {0}")]
    InvalidSecret(String),
}

/// DB関連の環境変数スナップショット
///
/// 呼び出しごとに読み込み、直接指定とシークレットのフォールバックの両方に使う。
#[derive(Clone, Default)]
pub struct DbEnv {
    /// DB_HOST
    pub host: Option<String>,
    /// DB_PORT
    pub port: Option<String>,
    /// DB_NAME
    pub name: Option<String>,
    /// DB_USER
    pub user: Option<String>,
    /// DB_PASSWORD
    pub password: Option<String>,
    /// DB_SECRET_ID
    pub secret_id: Option<String>,
    /// DB_CONNECT_TIMEOUT_SECS
    pub connect_timeout_secs: Option<String>,
}

impl std::fmt::Debug for DbEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbEnv")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("secret_id", &self.secret_id)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl DbEnv {
    /// 環境変数から読み込み（空文字列は未設定として扱う）
    ///
    /// # 環境変数
    /// - `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD`
    /// - `DB_SECRET_ID`: 設定されている場合はシークレットストアから認証情報を取得
    /// - `DB_CONNECT_TIMEOUT_SECS`: 接続タイムアウト（デフォルト: 5）
    pub fn from_env() -> Self {
        Self {
            host: read_env("DB_HOST"),
            port: read_env("DB_PORT"),
            name: read_env("DB_NAME"),
            user: read_env("DB_USER"),
            password: read_env("DB_PASSWORD"),
            secret_id: read_env("DB_SECRET_ID"),
            connect_timeout_secs: read_env("DB_CONNECT_TIMEOUT_SECS"),
        }
    }

    /// 接続タイムアウトを解釈
    fn connect_timeout(&self) -> Result<Duration, DbConfigError> {
        match &self.connect_timeout_secs {
            None => Ok(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)),
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| DbConfigError::InvalidValue {
                    name: "DB_CONNECT_TIMEOUT_SECS".to_string(),
                    value: raw.clone(),
                }),
        }
    }
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// シークレットのポート値（数値・文字列のどちらも許容）
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u64),
    Text(String),
}

/// RDS形式のシークレットJSON
#[derive(Deserialize)]
struct DbSecret {
    host: Option<String>,
    port: Option<PortValue>,
    #[serde(alias = "database")]
    dbname: Option<String>,
    #[serde(alias = "user")]
    username: Option<String>,
    password: Option<String>,
}

/// PostgreSQL接続設定
#[derive(Clone)]
pub struct DbConfig {
    host: String,
    port: u16,
    database: String,
    user: String,
    password: String,
    connect_timeout: Duration,
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl DbConfig {
    /// 明示的な値で作成（テスト用）
    pub fn new(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            user: user.into(),
            password: password.into(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// 環境変数の値から作成
    pub fn from_env_values(env: &DbEnv) -> Result<Self, DbConfigError> {
        let required = |value: &Option<String>, key: &str| {
            value
                .clone()
                .ok_or_else(|| DbConfigError::MissingEnvVar(key.to_string()))
        };

        let port = match &env.port {
            Some(raw) => parse_port("DB_PORT", raw)?,
            None => DEFAULT_DB_PORT,
        };

        Ok(Self {
            host: required(&env.host, "DB_HOST")?,
            port,
            database: required(&env.name, "DB_NAME")?,
            user: required(&env.user, "DB_USER")?,
            password: required(&env.password, "DB_PASSWORD")?,
            connect_timeout: env.connect_timeout()?,
        })
    }

    /// シークレットJSONから作成
    ///
    /// シークレットに無い項目は環境変数の値で補う
    /// （認証情報のみを持つシークレットとDB_HOSTの組み合わせ等）。
    pub fn from_secret(secret: &str, env: &DbEnv) -> Result<Self, DbConfigError> {
        let secret: DbSecret = serde_json::from_str(secret)
            .map_err(|e| DbConfigError::InvalidSecret(e.to_string()))?;

        let pick = |value: Option<String>, fallback: &Option<String>, field, env_var| {
            value
                .filter(|v| !v.trim().is_empty())
                .or_else(|| fallback.clone())
                .ok_or(DbConfigError::MissingSetting { field, env_var })
        };

        let port = match (secret.port, &env.port) {
            (Some(PortValue::Number(n)), _) => u16::try_from(n)
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| DbConfigError::InvalidValue {
                    name: "port".to_string(),
                    value: n.to_string(),
                })?,
            (Some(PortValue::Text(raw)), _) => parse_port("port", &raw)?,
            (None, Some(raw)) => parse_port("DB_PORT", raw)?,
            (None, None) => DEFAULT_DB_PORT,
        };

        Ok(Self {
            host: pick(secret.host, &env.host, "host", "DB_HOST")?,
            port,
            database: pick(secret.dbname, &env.name, "dbname", "DB_NAME")?,
            user: pick(secret.username, &env.user, "username", "DB_USER")?,
            password: pick(secret.password, &env.password, "password", "DB_PASSWORD")?,
            connect_timeout: env.connect_timeout()?,
        })
    }

    /// ホスト名を取得
    pub fn host(&self) -> &str {
        &self.host
    }

    /// ポート番号を取得
    pub fn port(&self) -> u16 {
        self.port
    }

    /// データベース名を取得
    pub fn database(&self) -> &str {
        &self.database
    }

    /// ユーザー名を取得
    pub fn user(&self) -> &str {
        &self.user
    }

    /// 接続タイムアウトを取得
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// sqlxの接続オプションに変換
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
    }
}

fn parse_port(name: &str, raw: &str) -> Result<u16, DbConfigError> {
    raw.trim()
        .parse::<u16>()
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| DbConfigError::InvalidValue {
            name: name.to_string(),
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn full_env() -> DbEnv {
        DbEnv {
            host: Some("db.internal".to_string()),
            port: None,
            name: Some("payments".to_string()),
            user: Some("reader".to_string()),
            password: Some("s3cret".to_string()),
            secret_id: None,
            connect_timeout_secs: None,
        }
    }

    // ==================== from_env_values テスト ====================

    #[test]
    fn test_from_env_values_success() {
        let config = DbConfig::from_env_values(&full_env()).unwrap();

        assert_eq!(config.host(), "db.internal");
        assert_eq!(config.port(), DEFAULT_DB_PORT);
        assert_eq!(config.database(), "payments");
        assert_eq!(config.user(), "reader");
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_from_env_values_missing_each_required_var() {
        let cases: [(&str, fn(&mut DbEnv)); 4] = [
            ("DB_HOST", |env| env.host = None),
            ("DB_NAME", |env| env.name = None),
            ("DB_USER", |env| env.user = None),
            ("DB_PASSWORD", |env| env.password = None),
        ];

        for (expected, clear) in cases {
            let mut env = full_env();
            clear(&mut env);

            match DbConfig::from_env_values(&env) {
                Err(DbConfigError::MissingEnvVar(var)) => assert_eq!(var, expected),
                other => panic!("{} の欠落でMissingEnvVarを期待: {:?}", expected, other),
            }
        }
    }

    #[test]
    fn test_from_env_values_custom_port_and_timeout() {
        let mut env = full_env();
        env.port = Some("6543".to_string());
        env.connect_timeout_secs = Some("12".to_string());

        let config = DbConfig::from_env_values(&env).unwrap();

        assert_eq!(config.port(), 6543);
        assert_eq!(config.connect_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn test_from_env_values_invalid_port() {
        let mut env = full_env();
        env.port = Some("postgres".to_string());

        assert!(matches!(
            DbConfig::from_env_values(&env),
            Err(DbConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_from_env_values_invalid_timeout() {
        let mut env = full_env();
        env.connect_timeout_secs = Some("0".to_string());

        assert!(matches!(
            DbConfig::from_env_values(&env),
            Err(DbConfigError::InvalidValue { name, .. }) if name == "DB_CONNECT_TIMEOUT_SECS"
        ));
    }

    // ==================== from_secret テスト ====================

    #[test]
    fn test_from_secret_rds_format() {
        let secret = r#"{
            "engine": "postgres",
            "host": "prod.cluster.rds.amazonaws.com",
            "port": 5433,
            "dbname": "ledger",
            "username": "app",
            "password": "pw"
        }"#;

        let config = DbConfig::from_secret(secret, &DbEnv::default()).unwrap();

        assert_eq!(config.host(), "prod.cluster.rds.amazonaws.com");
        assert_eq!(config.port(), 5433);
        assert_eq!(config.database(), "ledger");
        assert_eq!(config.user(), "app");
    }

    #[test]
    fn test_from_secret_string_port_and_aliases() {
        let secret = r#"{"host": "h", "port": "5544", "database": "d", "user": "u", "password": "p"}"#;

        let config = DbConfig::from_secret(secret, &DbEnv::default()).unwrap();

        assert_eq!(config.port(), 5544);
        assert_eq!(config.database(), "d");
        assert_eq!(config.user(), "u");
    }

    #[test]
    fn test_from_secret_falls_back_to_env() {
        // 認証情報のみのシークレット
        let secret = r#"{"username": "app", "password": "pw"}"#;

        let config = DbConfig::from_secret(secret, &full_env()).unwrap();

        assert_eq!(config.host(), "db.internal");
        assert_eq!(config.database(), "payments");
        assert_eq!(config.user(), "app");
    }

    #[test]
    fn test_from_secret_missing_setting() {
        let secret = r#"{"username": "app", "password": "pw", "dbname": "d"}"#;

        match DbConfig::from_secret(secret, &DbEnv::default()) {
            Err(DbConfigError::MissingSetting { field, env_var }) => {
                assert_eq!(field, "host");
                assert_eq!(env_var, "DB_HOST");
            }
            other => panic!("MissingSettingを期待: {:?}", other),
        }
    }

    #[test]
    fn test_from_secret_invalid_json() {
        assert!(matches!(
            DbConfig::from_secret("not-json", &full_env()),
            Err(DbConfigError::InvalidSecret(_))
        ));
    }

    #[test]
    fn test_from_secret_port_out_of_range() {
        let secret = r#"{"host": "h", "port": 70000, "dbname": "d", "username": "u", "password": "p"}"#;

        assert!(matches!(
            DbConfig::from_secret(secret, &DbEnv::default()),
            Err(DbConfigError::InvalidValue { .. })
        ));
    }

    // ==================== Debug出力 テスト ====================

    #[test]
    fn test_debug_output_hides_password() {
        let config = DbConfig::new("h", 5432, "d", "u", "topsecret");
        let env = full_env();

        assert!(!format!("{:?}", config).contains("topsecret"));
        assert!(!format!("{:?}", env).contains("s3cret"));
    }

    // ==================== DbEnv::from_env テスト ====================

    #[test]
    #[serial]
    fn test_db_env_from_env() {
        unsafe {
            std::env::set_var("DB_HOST", "env-host");
            std::env::set_var("DB_NAME", "env-db");
            std::env::set_var("DB_USER", "");
            std::env::remove_var("DB_PASSWORD");
            std::env::set_var("DB_SECRET_ID", "prod/db");
        }

        let env = DbEnv::from_env();

        assert_eq!(env.host.as_deref(), Some("env-host"));
        assert_eq!(env.name.as_deref(), Some("env-db"));
        // 空文字列は未設定扱い
        assert_eq!(env.user, None);
        assert_eq!(env.password, None);
        assert_eq!(env.secret_id.as_deref(), Some("prod/db"));

        unsafe {
            std::env::remove_var("DB_HOST");
            std::env::remove_var("DB_NAME");
            std::env::remove_var("DB_USER");
            std::env::remove_var("DB_SECRET_ID");
        }
    }
}

// 転送先設定
//
// エッジLambdaがリクエストを転送する先（関数呼び出しまたは内部ネットワークHTTP）を管理

use std::time::Duration;

use thiserror::Error;

/// デフォルトの転送タイムアウト（秒）
pub const DEFAULT_FORWARD_TIMEOUT_SECS: u64 = 30;

/// 転送タイムアウトの上限（秒）
pub const MAX_FORWARD_TIMEOUT_SECS: u64 = 300;

/// HTTP転送の再試行回数の上限
pub const MAX_FORWARD_RETRIES: u32 = 10;

/// 転送設定エラー
#[derive(Debug, Error)]
pub enum ForwardConfigError {
    /// 転送先が設定されていない
    #[error("Missing environment variable: FORWARD_FUNCTION_NAME or FORWARD_ENDPOINT_URL")]
    MissingTarget,
    /// 値が不正
    #[error("Invalid value for {name}: {value}")]
    InvalidValue {
        /// 環境変数名
        name: String,
        /// 不正な値
        value: String,
    },
}

/// 転送先
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardTarget {
    /// Lambda関数の同期呼び出し（関数名またはARN。別アカウントはARNで指定）
    Function {
        /// 関数名またはARN
        function_name: String,
    },
    /// 内部ネットワークエンドポイントへのHTTP POST
    Endpoint {
        /// エンドポイントURL
        url: String,
    },
}

/// 転送設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardConfig {
    target: ForwardTarget,
    timeout: Duration,
    max_retries: u32,
}

impl ForwardConfig {
    /// 明示的な値で作成
    pub fn new(target: ForwardTarget, timeout: Duration, max_retries: u32) -> Self {
        Self {
            target,
            timeout,
            max_retries,
        }
    }

    /// 環境変数から設定を読み込み
    ///
    /// # 環境変数
    /// - `FORWARD_FUNCTION_NAME`: 呼び出す関数名またはARN（優先）
    /// - `FORWARD_ENDPOINT_URL`: 内部ネットワークエンドポイントURL（http/https）
    /// - `FORWARD_TIMEOUT_SECS`: タイムアウト秒数（デフォルト: 30、1〜300）
    /// - `FORWARD_MAX_RETRIES`: HTTP転送の再試行回数（デフォルト: 0 = 再試行しない）
    pub fn from_env() -> Result<Self, ForwardConfigError> {
        Self::from_values(
            std::env::var("FORWARD_FUNCTION_NAME").ok(),
            std::env::var("FORWARD_ENDPOINT_URL").ok(),
            std::env::var("FORWARD_TIMEOUT_SECS").ok(),
            std::env::var("FORWARD_MAX_RETRIES").ok(),
        )
    }

    fn from_values(
        function_name: Option<String>,
        endpoint_url: Option<String>,
        timeout_secs: Option<String>,
        max_retries: Option<String>,
    ) -> Result<Self, ForwardConfigError> {
        let function_name = function_name.filter(|v| !v.trim().is_empty());
        let endpoint_url = endpoint_url.filter(|v| !v.trim().is_empty());

        let target = match (function_name, endpoint_url) {
            (Some(function_name), _) => ForwardTarget::Function {
                function_name: function_name.trim().to_string(),
            },
            (None, Some(url)) => ForwardTarget::Endpoint {
                url: validate_endpoint(url.trim())?,
            },
            (None, None) => return Err(ForwardConfigError::MissingTarget),
        };

        let timeout_secs = match timeout_secs.filter(|v| !v.trim().is_empty()) {
            None => DEFAULT_FORWARD_TIMEOUT_SECS,
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| (1..=MAX_FORWARD_TIMEOUT_SECS).contains(secs))
                .ok_or(ForwardConfigError::InvalidValue {
                    name: "FORWARD_TIMEOUT_SECS".to_string(),
                    value: raw,
                })?,
        };

        let max_retries = match max_retries.filter(|v| !v.trim().is_empty()) {
            None => 0,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n <= MAX_FORWARD_RETRIES)
                .ok_or(ForwardConfigError::InvalidValue {
                    name: "FORWARD_MAX_RETRIES".to_string(),
                    value: raw,
                })?,
        };

        Ok(Self {
            target,
            timeout: Duration::from_secs(timeout_secs),
            max_retries,
        })
    }

    /// 転送先を取得
    pub fn target(&self) -> &ForwardTarget {
        &self.target
    }

    /// タイムアウトを取得
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// HTTP転送の再試行回数を取得
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

/// エンドポイントURLを検証（http/httpsかつホスト付き）
fn validate_endpoint(raw: &str) -> Result<String, ForwardConfigError> {
    let invalid = || ForwardConfigError::InvalidValue {
        name: "FORWARD_ENDPOINT_URL".to_string(),
        value: raw.to_string(),
    };

    let url = url::Url::parse(raw).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }

    Ok(raw.to_string())
}

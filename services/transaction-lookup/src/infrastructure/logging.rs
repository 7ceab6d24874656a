/// ログ基盤モジュール
///
/// 両Lambda共通の構造化ログ設定。
/// - 出力形式は`LOG_FORMAT`（json / text、デフォルト: json）
/// - ログレベルは`RUST_LOG`（デフォルト: info）
/// - 呼び出し単位のspanにリクエストIDと関数種別を付与する
use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// ログ出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// CloudWatch Logs向けJSON（1行1イベント）
    #[default]
    Json,
    /// ローカル実行向けのテキスト
    Text,
}

impl LogFormat {
    /// `LOG_FORMAT`の値を解釈（不明な値はJSON）
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "text" || v == "pretty" => LogFormat::Text,
            _ => LogFormat::Json,
        }
    }

    /// 環境変数から読み込み
    pub fn from_env() -> Self {
        Self::parse(std::env::var("LOG_FORMAT").ok().as_deref())
    }
}

/// 環境変数に従ってログサブスクライバーを初期化する
///
/// 複数回呼び出しても初期化は1回のみ。
pub fn init_logging() {
    init_logging_with(LogFormat::from_env());
}

/// 出力形式を指定してログサブスクライバーを初期化する
pub fn init_logging_with(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(env_filter);

        match format {
            LogFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true)
                        .flatten_event(true)
                        // 呼び出し単位のフィールド（request_id等）はspanList側に出す
                        .with_current_span(false),
                )
                .init(),
            LogFormat::Text => registry
                .with(tracing_subscriber::fmt::layer().with_target(false).compact())
                .init(),
        }
    });
}

/// Lambda呼び出し単位のspanを作成する
///
/// # 引数
/// * `function` - 関数種別（edge / internal）
/// * `request_id` - Lambdaのリクエスト ID
pub fn invocation_span(function: &'static str, request_id: &str) -> Span {
    tracing::info_span!("invocation", function = function, request_id = %request_id)
}

/// テスト用のログサブスクライバーを初期化する
#[cfg(test)]
pub fn init_test_logging() {
    static TEST_INIT: Once = Once::new();

    TEST_INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer().compact())
            .try_init();
    });
}

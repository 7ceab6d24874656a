/// エッジLambdaエントリポイント
///
/// API Gatewayから受け取った取引検索リクエストを検証し、
/// 内部Lambda（直接呼び出し）または内部ネットワークエンドポイント（HTTPS）へ転送する。
///
/// # 環境変数
/// - FORWARD_FUNCTION_NAME: 呼び出す関数名またはARN（優先）
/// - FORWARD_ENDPOINT_URL: 内部ネットワークエンドポイントURL
/// - FORWARD_TIMEOUT_SECS: 転送タイムアウト（デフォルト: 30）
/// - FORWARD_MAX_RETRIES: HTTP転送の再試行回数（デフォルト: 0）
/// - LOG_FORMAT: ログ出力形式 json / text（デフォルト: json）
use std::sync::Arc;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{error, info, Instrument};
use transaction_lookup::application::EdgeHandler;
use transaction_lookup::infrastructure::{
    build_forwarder, init_logging, invocation_span, ForwardConfig, ForwardError, Forwarder, UnavailableForwarder,
};

/// 転送実装の静的インスタンス
///
/// Lambda warm start時にHTTP/SDKクライアントを再利用する。
/// 初期化に失敗した場合はキャッシュせず、次の呼び出しで再試行する。
static FORWARDER: OnceCell<Arc<dyn Forwarder>> = OnceCell::const_new();

/// 転送実装を取得（初期化されていなければ初期化）
async fn get_forwarder() -> Result<Arc<dyn Forwarder>, ForwardError> {
    FORWARDER
        .get_or_try_init(|| async {
            let config = ForwardConfig::from_env()
                .map_err(|e| ForwardError::Configuration(e.to_string()))?;
            build_forwarder(&config).await
        })
        .await
        .cloned()
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();

    info!("エッジLambda関数を初期化");

    lambda_runtime::run(service_fn(handler)).await?;
    Ok(())
}

/// Lambda関数のメインハンドラー
///
/// 転送先の設定が不正な場合も入力検証（400）は行い、
/// 有効なリクエストに対しては500を返す。
async fn handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let span = invocation_span("edge", &event.context.request_id);
    handle_event(event.payload).instrument(span).await
}

async fn handle_event(payload: Value) -> Result<Value, Error> {
    let forwarder: Arc<dyn Forwarder> = match get_forwarder().await {
        Ok(forwarder) => forwarder,
        Err(err) => {
            error!(error = %err, "転送先の初期化に失敗");
            Arc::new(UnavailableForwarder::new(err.to_string()))
        }
    };

    let response = EdgeHandler::new(forwarder).handle(&payload).await;

    info!(status = response.status_code, "レスポンス送信");

    Ok(serde_json::to_value(response)?)
}

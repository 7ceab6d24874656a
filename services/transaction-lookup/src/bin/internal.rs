/// 内部Lambdaエントリポイント
///
/// DBへ直接到達できるVPC内で実行し、取引IDで`transactions`テーブルを検索する。
/// エッジLambdaからの直接呼び出し、または内部ネットワーク経由で呼び出される。
///
/// # 環境変数
/// - DB_SECRET_ID: 設定時はシークレットストアからDB認証情報を取得
/// - DB_HOST, DB_PORT, DB_NAME, DB_USER, DB_PASSWORD: 直接指定（シークレットのフォールバックにも使用）
/// - DB_CONNECT_TIMEOUT_SECS: 接続タイムアウト（デフォルト: 5）
/// - ALLOW_RAW_SQL: `sql`フィールドの実行を許可（デフォルト: false）
/// - INSERT_ON_MISS: 未登録IDへのプレースホルダー挿入（デフォルト: false）
/// - LOG_FORMAT: ログ出力形式 json / text（デフォルト: json）
use std::sync::Arc;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{error, info, Instrument};
use transaction_lookup::application::InternalHandler;
use transaction_lookup::domain::ProxyResponse;
use transaction_lookup::infrastructure::{
    init_logging, invocation_span, AwsSecretsOps, CredentialResolver, CredentialSource, DbEnv,
    InternalHandlerConfig, PgTransactionRepository, SecretsOps,
};

/// シークレット操作の静的インスタンス
///
/// クライアントのみ再利用し、シークレット値は呼び出しごとに取得する。
static SECRETS_OPS: OnceCell<Arc<dyn SecretsOps>> = OnceCell::const_new();

async fn get_secrets_ops() -> Arc<dyn SecretsOps> {
    SECRETS_OPS
        .get_or_init(|| async { Arc::new(AwsSecretsOps::from_config().await) as Arc<dyn SecretsOps> })
        .await
        .clone()
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();

    info!("内部Lambda関数を初期化");

    lambda_runtime::run(service_fn(handler)).await?;
    Ok(())
}

/// Lambda関数のメインハンドラー
///
/// # 処理フロー
/// 1. 動作設定とDB関連の環境変数を読み込み
/// 2. 認証情報の取得元（環境変数 or シークレットストア）を決定
/// 3. InternalHandlerで検索してレスポンスを返却
async fn handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let span = invocation_span("internal", &event.context.request_id);
    handle_event(event.payload).instrument(span).await
}

async fn handle_event(payload: Value) -> Result<Value, Error> {
    let config = match InternalHandlerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "動作設定の読み込みに失敗");
            return Ok(serde_json::to_value(ProxyResponse::error(500, err.to_string()))?);
        }
    };

    let env = DbEnv::from_env();
    let source = match &env.secret_id {
        Some(secret_id) => CredentialSource::SecretsStore {
            secret_id: secret_id.clone(),
            secrets: get_secrets_ops().await,
        },
        None => CredentialSource::Environment,
    };

    let repository = PgTransactionRepository::new(CredentialResolver::new(source, env));
    let response = InternalHandler::with_config(repository, config)
        .handle(&payload)
        .await;

    info!(status = response.status_code, "レスポンス送信");

    Ok(serde_json::to_value(response)?)
}

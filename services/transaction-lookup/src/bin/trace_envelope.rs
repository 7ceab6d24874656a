/// エンベロープ往復トレースCLI
///
/// 内部Lambda → エッジLambda → ブラウザ の各段でJSONがどう見えるかを表示し、
/// 元のマッピングが復元されることを確認する。
///
/// # ローカル実行
/// ```bash
/// cargo run --bin trace-envelope
/// cargo run --bin trace-envelope -- --transaction-id 42 --description "Coffee" --double-encode
/// ```
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use transaction_lookup::application::envelope_trace::trace_round_trip;
use transaction_lookup::domain::TransactionId;

/// コマンドライン引数
#[derive(Parser, Debug)]
#[command(name = "trace-envelope")]
#[command(about = "取引検索レスポンスのエンベロープ往復をトレース")]
struct CliArgs {
    /// 取引ID
    #[arg(long, short = 't', default_value = "10234567")]
    transaction_id: String,

    /// 内部Lambdaが返す説明
    #[arg(long, short = 'd', default_value = "Online purchase at Amazon")]
    description: String,

    /// 中継層でのJSON文字列再エンコードを再現する
    #[arg(long)]
    double_encode: bool,
}

fn print_json<T: Serialize>(title: &str, value: &T) {
    println!("{}", title);
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(err) => println!("(シリアライズ失敗: {})", err),
    }
    println!();
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let transaction_id = match TransactionId::from_value(&serde_json::Value::String(args.transaction_id)) {
        Ok(id) => id,
        Err(err) => {
            eprintln!("不正な取引ID: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let trace = match trace_round_trip(&transaction_id, &args.description, args.double_encode) {
        Ok(trace) => trace,
        Err(err) => {
            eprintln!("トレース失敗: {}", err);
            return ExitCode::FAILURE;
        }
    };

    print_json("内部Lambdaの戻り値:", &trace.internal_response);
    print_json("中継層を通過したペイロード:", &trace.relayed_payload);
    print_json("エッジLambdaがアンラップしたボディ:", &trace.edge_parsed);
    print_json("エッジLambdaの戻り値:", &trace.edge_response);
    print_json("ブラウザが受け取るボディ:", &trace.received);

    println!("ブラウザが data['{}'] で引く値:", transaction_id);
    println!("結果: {}", trace.description.as_deref().unwrap_or("(なし)"));

    if trace.round_trip_ok {
        ExitCode::SUCCESS
    } else {
        eprintln!("往復後のマッピングが元と一致しません");
        ExitCode::FAILURE
    }
}

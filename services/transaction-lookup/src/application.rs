// アプリケーション層モジュール
pub mod edge_handler;
pub mod envelope_trace;
pub mod internal_handler;

// 再エクスポート
pub use edge_handler::{EdgeHandler, EdgeHandlerError};
pub use envelope_trace::{trace_round_trip, EnvelopeTrace};
pub use internal_handler::{InternalHandler, InternalHandlerError};

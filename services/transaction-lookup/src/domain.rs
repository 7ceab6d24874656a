// Domain layer modules
pub mod envelope;
pub mod response_body;
pub mod transaction;
pub mod transaction_id;

// Re-exports
pub use envelope::{
    parse_request_body, unwrap_upstream, EnvelopeError, ProxyResponse, UpstreamReply,
    MAX_UNWRAP_DEPTH,
};
pub use response_body::ResponseBody;
pub use transaction::{placeholder_description, TransactionRecord};
pub use transaction_id::{TransactionId, TransactionIdError};

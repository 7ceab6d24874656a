// Infrastructure layer modules
pub mod credentials;
pub mod db_config;
pub mod forward_config;
pub mod forwarder;
pub mod http_forwarder;
pub mod internal_config;
pub mod lambda_forwarder;
pub mod logging;
pub mod secrets_ops;
pub mod transaction_repository;

// Re-exports
pub use credentials::{CredentialError, CredentialResolver, CredentialSource};
pub use db_config::{DbConfig, DbConfigError, DbEnv};
pub use forward_config::{ForwardConfig, ForwardConfigError, ForwardTarget};
pub use forwarder::{build_forwarder, ForwardError, Forwarder, UnavailableForwarder, UpstreamResponse};
pub use http_forwarder::HttpForwarder;
pub use internal_config::{InternalConfigError, InternalHandlerConfig};
pub use lambda_forwarder::LambdaForwarder;
pub use logging::{init_logging, init_logging_with, invocation_span, LogFormat};
pub use secrets_ops::{AwsSecretsOps, SecretsOps, SecretsOpsError};
pub use transaction_repository::{PgTransactionRepository, RepositoryError, TransactionRepository};

// Adapters layer: concrete implementations for external systems.

pub mod auth;
pub mod bigquery;
pub mod storage;

pub use auth::TokenProvider;
pub use bigquery::BigQueryClient;
pub use storage::LocalStorage;

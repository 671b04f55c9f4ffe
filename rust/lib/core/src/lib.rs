pub mod auth;
pub mod error;
pub mod lifecycle;
pub mod module;
pub mod types;

pub use auth::{permission_matches, AllowAll, Authenticator, DenyAll, Principal};
pub use error::ServiceError;
pub use lifecycle::{parse_status_filter, Lifecycle};
pub use module::Module;
pub use types::{
    apply_patch, ensure_non_negative, ensure_not_blank, ensure_positive, merge_patch, new_id, now_rfc3339,
    ListParams, ListResult, MAX_LIMIT,
};

// Re-exported so module crates name one Decimal type.
pub use rust_decimal::Decimal;

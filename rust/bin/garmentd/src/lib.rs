//! `garmentd` building blocks, shared with the `garment` operations CLI and
//! the end-to-end tests.

pub mod bootstrap;
pub mod config;
pub mod registry;
pub mod routes;

pub use config::ServerConfig;
pub use routes::build_router;

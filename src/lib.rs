pub mod api;
pub mod config;
pub mod relay;
pub mod router;
pub mod server;
pub mod template;
pub mod vault;

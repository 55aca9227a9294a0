pub mod auth;
pub mod chat;
pub mod chat_flow;
pub mod middleware;
pub mod rest;
pub mod state;

// Re-exported for the binary that builds the web server router.
pub use middleware::require_auth;
pub use rest::ApiDoc;

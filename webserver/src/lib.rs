//! Webserver library for the search battle system
//!
//! A thin HTTP API in front of the battle orchestrator: backend registration,
//! battle creation with background processing, listing, drill-down, retry and
//! deletion, scoped to the caller's session.

pub mod error;
pub mod state;
pub mod web;
pub mod webserver_impl;

// Re-export main types
pub use error::{WebServerError, WebServerResult};
pub use state::AppState;
pub use web::session::{Session, SESSION_HEADER};
pub use webserver_impl::WebServer;

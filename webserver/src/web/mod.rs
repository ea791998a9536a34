//! HTTP surface: route handlers and request extractors

pub mod handlers;
pub mod session;

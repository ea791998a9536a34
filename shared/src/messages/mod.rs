//! Request and view messages exchanged between the webserver and the orchestrator

pub mod jobs;
pub mod results;
pub mod backends;

pub use jobs::*;
pub use results::*;
pub use backends::*;

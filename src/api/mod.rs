//! Web surface: upload a video, follow its job, download the results.

pub mod handlers;
pub mod server;

pub use server::{router, start_http_server, AppState};

//! HTTP wrapper that drives helpdesk ticket automation runs.

pub mod config;
pub mod flow;
pub mod jobs;
pub mod popups;
pub mod server;

mod backlog_repository;
mod client;
mod config;
mod migrations;

pub use backlog_repository::*;
pub use client::*;
pub use config::*;
pub use migrations::*;

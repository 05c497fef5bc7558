mod backlog_repository;

pub use backlog_repository::*;

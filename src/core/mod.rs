pub mod config;
pub mod db;
pub mod error;
pub mod job;
pub mod lifecycle;
pub mod notify;
pub mod report;
pub mod scheduler;
pub mod terminal;

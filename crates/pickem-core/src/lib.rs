// Library root: re-exports all modules so integration tests and the CLI
// binary can access the crate's public API.

pub mod artifact;
pub mod config;
pub mod db;
pub mod feed;
pub mod integrity;
pub mod leaderboard;
pub mod model;
pub mod scoring;
pub mod session;

pub mod actions;
pub mod cli;
pub mod config;
pub mod error;
pub mod messages;
pub mod process;
pub mod pulls;
pub mod repo;
pub mod report;
pub mod roles;
pub mod rules;
pub mod store;
pub mod test_helpers;

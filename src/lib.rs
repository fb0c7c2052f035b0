pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod housekeeping;
pub mod normalize;
pub mod output;
pub mod query;
pub mod resolver;
pub mod schedule;
pub mod walker;

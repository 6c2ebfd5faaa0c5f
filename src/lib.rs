pub mod client;
pub mod config;
pub mod evaluator;
pub mod humanize;
pub mod observability;
pub mod queue;
pub mod scheduler;
pub mod strikes;

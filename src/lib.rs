pub mod config;
pub mod controller;
pub mod dashboard;
pub mod error;
pub mod metrics;
pub mod query;
pub mod types;

#[cfg(test)]
mod test_support;

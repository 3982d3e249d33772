// Library for tests and the daemon to access modules

pub mod collector;
pub mod config;
pub mod counter_source;
pub mod error;
pub mod format;
pub mod models;
pub mod rate;
pub mod traffic_store;

pub use error::{Result, TrafficError};

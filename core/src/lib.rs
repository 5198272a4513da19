//! opsmon-core: threshold checking and dashboard aggregation over the
//! operations-report workbook.

pub mod access;
pub mod aggregate;
pub mod checker;
pub mod config;
pub mod error;
pub mod loader;
pub mod notification;
pub mod provider;
pub mod session;
pub mod threshold;
pub mod types;
pub mod view;

//! Shared foundation: store layout, the DB broker, schemas, errors, time and configuration.

pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod schemas;
pub mod store;
pub mod time;
pub mod validate;

//! Hot dog detection pipeline
//!
//! Uploaded images are stored in an object store, tracked by a status record and
//! classified asynchronously by a queue worker. Clients poll `GET /list` for results.

pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

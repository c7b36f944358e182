//! Cardwise library
//!
//! Card data service: a time-bounded card cache in front of a third-party card
//! API, a static fallback dataset, a batched catalog sync and the HTTP
//! endpoints exposing them.

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod data;
pub mod refresh;
pub mod server;
pub mod service;
pub mod sync;

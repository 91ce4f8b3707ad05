//! Remarque: threaded comment retrieval with a time-boxed result cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

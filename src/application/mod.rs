//! Application services: request validation, row fetching and the cache-first facade.

pub mod error;
pub mod fetch;
pub mod pagination;
pub mod repos;
pub mod search;
pub mod threads;

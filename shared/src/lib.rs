//! Shared building blocks of the classification services: configuration,
//! the status record model, the status store (PostgreSQL and in-memory) and
//! the Kafka trigger plumbing.

pub mod config;
pub mod db;
pub mod dto;
pub mod error;
pub mod kafka;
pub mod status_store;

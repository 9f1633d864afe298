//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP client, file I/O).
//!
//! Adapter categories:
//! - `feeds`: Ergast-compatible race results API
//! - `persistence`: JSON snapshots, JSONL history and an in-memory store

pub mod feeds;
pub mod persistence;

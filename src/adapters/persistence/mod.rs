//! Persistence Adapters - File-based Settlement Storage
//!
//! Implements the Repository ports using atomic JSON snapshots for
//! keyed documents and append-only JSONL files for history and roster
//! snapshots. No database dependency. An in-memory store backs tests
//! and dry runs.

pub mod file_repository;
pub mod jsonl;
pub mod memory;
pub mod price_book;
pub mod snapshot;

pub use file_repository::FileRepository;
pub use memory::InMemoryRepository;
pub use price_book::PriceBook;

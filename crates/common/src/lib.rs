//! Common utilities and shared types for inkwell.
//!
//! This crate provides foundational components used across all inkwell crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Pagination**: Page-number pagination via [`Paginator`] and [`Page`]
//! - **Page cache**: TTL caching of rendered responses via [`PageCache`]
//! - **Storage**: File storage for post images
//!
//! # Example
//!
//! ```no_run
//! use inkwell_common::{AppResult, Config, IdGenerator, Paginator};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let paginator = Paginator::new(config.pagination.posts_per_page);
//!     let window = paginator.resolve(Some("2"), 42);
//!     println!("offset {} limit {}", window.offset, window.limit);
//!     println!("new id {}", IdGenerator::new().generate());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod id;
pub mod pagination;
pub mod storage;

pub use cache::{MemoryPageCache, PageCache, RedisPageCache, SharedPageCache};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use pagination::{Page, PageWindow, Paginator};
pub use storage::{LocalStorage, SharedStorage, StorageBackend, UploadedFile};

//! # Quiver Engine
//!
//! The engine coordinator of the Quiver vector database, plus the
//! services it orchestrates: the metadata store, the per-table memory
//! manager and the job scheduler.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Database                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Write Path:                                                 │
//! │  Insert ──► MemManager ──flush──► NEW ──► RAW / TO_INDEX     │
//! │                                                              │
//! │  Background (1s timer):                                      │
//! │  metrics ──► compaction (merge per date) ──► index builder   │
//! │                                                              │
//! │  Read Path:                                                  │
//! │  Query ──► FilesToSearch ──► SearchJob ──► JobManager        │
//! │                  │                              │            │
//! │                  └──────── IndexCache ◄─────────┘            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```no_run
//! use quiver_core::{DbOptions, TableSchema};
//! use quiver_engine::Database;
//!
//! # async fn demo() -> quiver_core::Result<()> {
//! let db = Database::open(DbOptions::with_path("./data")).await?;
//!
//! let mut schema = TableSchema::new("demo", 4);
//! schema.index_file_size = 64; // MB
//! db.create_table(schema).await?;
//!
//! let ids = db.insert_vectors("demo", &[1.0, 0.0, 0.0, 0.0], None).await?;
//! # let _ = ids;
//! db.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod memory;
pub mod meta;
pub mod scheduler;

pub use db::Database;
pub use memory::{MemManager, TableBuffer};
pub use meta::{LocalMeta, MetaStore};
pub use scheduler::{BuildIndexJob, DeleteJob, Job, JobManager, SearchJob};

//! Durable storage for the Flowline workflow engine.
//!
//! Four storage traits cover the records the engine reads and writes:
//!
//! ```text
//! WorkflowStorage   - workflow definitions (read by the engine)
//! ExecutionStorage  - runs and their append-only steps
//! SecretStorage     - tenant/global variables and encrypted credentials
//! EntityStorage     - structured rows touched by record blocks
//! ```
//!
//! [`SqliteStore`] implements all four on one SQLite database;
//! [`MockStorage`] is the in-memory equivalent used in tests.

pub mod error;
pub mod mock;
pub mod sqlite;
pub mod storage;

pub use error::{Result, StoreError};
pub use mock::MockStorage;
pub use sqlite::SqliteStore;
pub use storage::{EntityRow, EntityStorage, ExecutionStorage, SecretStorage, WorkflowStorage};

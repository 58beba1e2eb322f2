//! WbsStore - generic record persistence over SQLite
//!
//! Records are stored as JSON documents keyed by `(collection, id)`. Each
//! record also publishes a set of indexed fields which are written to a side
//! table so that `list` can filter without deserialising every document.
//!
//! # Example
//!
//! ```ignore
//! use wbsstore::{Filter, FilterOp, IndexValue, Store};
//!
//! let mut store = Store::open("wbs.db")?;
//! store.create(record)?;
//! let active: Vec<MyRecord> = store.list(&[Filter::eq("is_active", IndexValue::Bool(true))])?;
//!
//! // All-or-nothing writes
//! store.batch(|b| {
//!     b.create(&first)?;
//!     b.create(&second)?;
//!     Ok(())
//! })?;
//! ```

mod record;
mod store;

pub use record::{Filter, FilterOp, IndexValue, Record};
pub use store::{Batch, Store};

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

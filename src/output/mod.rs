//! Output writers and record routing.

pub mod cache;
pub mod router;

pub use cache::{WriterCache, WriterHandle};
pub use router::{FixedRouter, KeyedRouter, Router};

//! Runtime value representation and arenas (component C1).
//!
//! A [`Value`] is a small tagged enum; everything heap-allocated (strings,
//! arrays, mappings) lives in a [`Heap`] and is referenced by handle. This
//! keeps `Value` cheap to push onto the evaluation stack and store into
//! locals/globals/properties, while refcount bookkeeping for strings (and
//! cascading release for aggregates) is centralized in one place the VM
//! owns.

pub mod error;
pub mod handle;
pub mod heap;
pub mod value;

pub use error::{ValueError, ValueResult};
pub use handle::{ArrayId, FunctionRef, MappingId, ObjectId, StringId};
pub use heap::{ArrayHeap, Heap, MappingHeap, StringHeap};
pub use value::Value;

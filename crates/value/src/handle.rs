//! Lightweight handles into the heap's arenas.
//!
//! A `Value` never owns heap-allocated payload directly; it carries an id
//! that indexes into whichever `Heap` it was produced by. This keeps
//! `Value` `Copy`-able and cheap to push/pop/store, matching the spec's
//! "uniform Value shape" requirement for strings while generalizing the
//! same indirection to arrays and mappings.

use std::rc::Rc;

macro_rules! handle_type {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub const KIND: &'static str = $kind;

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

handle_type!(StringId, "string");
handle_type!(ArrayId, "array");
handle_type!(MappingId, "mapping");

/// Non-owning reference to an object record held by the object manager
/// (amlp-objects). `amlp-value` does not know about objects beyond their
/// identity; dereferencing one is the object manager's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A first-class reference to a VM function, used when a script takes a
/// function value (e.g. a callback passed as an argument). Functions are
/// immutable once loaded, so this carries its name for diagnostics without
/// needing heap bookkeeping of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub index: u32,
    pub name: Rc<str>,
}

//! Errors produced by value operations (as opposed to VM dispatch errors,
//! which live in `amlp-vm`).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A string/array/mapping handle did not resolve to a live heap slot.
    /// Indicates a use-after-free or a handle from a different heap.
    #[error("stale or foreign {kind} handle {id}")]
    StaleHandle { kind: &'static str, id: u32 },

    /// A release was attempted on a handle whose refcount was already zero.
    /// This is a programming error in the VM, not a script-visible failure.
    #[error("refcount underflow releasing {kind} handle {id}")]
    RefcountUnderflow { kind: &'static str, id: u32 },

    /// An aggregate-store instruction attempted to store an aggregate into
    /// one of its own cells, which would create a cycle the reference
    /// counter cannot reclaim.
    #[error("cannot store a {kind} into one of its own cells")]
    SelfReferentialStore { kind: &'static str },
}

pub type ValueResult<T> = Result<T, ValueError>;

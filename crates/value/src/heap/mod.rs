mod arrays;
mod mappings;
mod strings;

pub use arrays::ArrayHeap;
pub use mappings::MappingHeap;
pub use strings::StringHeap;

use hashbrown::HashMap;

use crate::error::{ValueError, ValueResult};
use crate::value::Value;

/// The VM's heap: owns every array and mapping, and the refcounted string
/// payloads both may hold. `amlp-vm` is the sole owner of one `Heap`
/// instance; no other component allocates into it directly (spec section 3,
/// "Ownership").
#[derive(Default)]
pub struct Heap {
    pub strings: StringHeap,
    pub arrays: ArrayHeap,
    pub mappings: MappingHeap,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_string(&mut self, s: impl Into<Box<str>>) -> Value {
        Value::String(self.strings.alloc(s))
    }

    pub fn alloc_array(&mut self, elements: Vec<Value>) -> Value {
        Value::Array(self.arrays.alloc(elements))
    }

    pub fn alloc_mapping(&mut self, entries: HashMap<String, Value>) -> Value {
        Value::Mapping(self.mappings.alloc(entries))
    }

    /// Increments the refcount of the payload a Value holds, if any.
    /// Arrays and mappings are not refcounted themselves (they are owned
    /// outright by whoever holds a live `Value::Array`/`Value::Mapping`
    /// referring to them; the object/local/global slot is that owner), but
    /// every string nested inside one was already addref'd when it was
    /// stored, so `addref` on a bare scalar Value only touches strings.
    pub fn addref(&mut self, value: &Value) -> ValueResult<()> {
        if let Value::String(id) = value {
            self.strings.addref(*id)?;
        }
        Ok(())
    }

    /// Releases the payload a Value holds. Releasing an array or mapping
    /// recursively releases every string it (transitively) contains and
    /// frees the arena slot; this is the only place cascading release
    /// happens, matching spec section 9's no-cycles guarantee (arrays/mappings
    /// cannot contain themselves, enforced at the store opcodes).
    pub fn release(&mut self, value: &Value) -> ValueResult<()> {
        match value {
            Value::String(id) => self.strings.release(*id),
            Value::Array(id) => {
                let elements = self.arrays.free(*id)?;
                for element in &elements {
                    self.release(element)?;
                }
                Ok(())
            }
            Value::Mapping(id) => {
                let entries = self.mappings.free(*id)?;
                for element in entries.values() {
                    self.release(element)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Deep clone for aggregates, refcount bump for strings; scalars are
    /// `Copy`-like and returned as-is (spec section 4.1).
    pub fn clone_value(&mut self, value: &Value) -> ValueResult<Value> {
        match value {
            Value::String(id) => {
                self.strings.addref(*id)?;
                Ok(Value::String(*id))
            }
            Value::Array(id) => {
                let elements = self.arrays.get(*id)?.to_vec();
                let mut cloned = Vec::with_capacity(elements.len());
                for element in &elements {
                    cloned.push(self.clone_value(element)?);
                }
                Ok(Value::Array(self.arrays.alloc(cloned)))
            }
            Value::Mapping(id) => {
                let entries = self.mappings.get(*id)?.clone();
                let mut cloned = HashMap::with_capacity(entries.len());
                for (k, v) in entries.iter() {
                    cloned.insert(k.clone(), self.clone_value(v)?);
                }
                Ok(Value::Mapping(self.mappings.alloc(cloned)))
            }
            other => Ok(other.clone()),
        }
    }

    /// Truthiness dispatch that resolves the string-length case the bare
    /// `Value::is_truthy_scalar` can't (spec section 4.1: non-empty strings
    /// are true).
    pub fn is_truthy(&self, value: &Value) -> ValueResult<bool> {
        if let Some(truth) = value.is_truthy_scalar() {
            return Ok(truth);
        }
        match value {
            Value::String(id) => Ok(!self.strings.payload(*id)?.is_empty()),
            _ => unreachable!("is_truthy_scalar covers every non-string variant"),
        }
    }

    /// Best-effort `to_string` used by `PRINT`, string concatenation and
    /// diagnostics.
    pub fn to_display_string(&self, value: &Value) -> ValueResult<String> {
        Ok(match value {
            Value::Uninitialized => "<uninitialized>".to_string(),
            Value::Null => "0".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format!("{f}"),
            Value::String(id) => self.strings.payload(*id)?.to_string(),
            Value::Array(id) => {
                let elements = self.arrays.get(*id)?;
                let mut parts = Vec::with_capacity(elements.len());
                for element in elements {
                    parts.push(self.to_display_string(element)?);
                }
                format!("({{ {} }})", parts.join(", "))
            }
            Value::Mapping(id) => {
                let entries = self.mappings.get(*id)?;
                let mut parts = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    parts.push(format!("{k}: {}", self.to_display_string(v)?));
                }
                format!("([ {} ])", parts.join(", "))
            }
            Value::Object(id) => format!("<object #{}>", id.0),
            Value::Function(f) => format!("<function {}>", f.name),
        })
    }

    /// Guards `STORE_ARRAY`/`STORE_MAPPING` against writing an aggregate
    /// into one of its own cells (spec section 9's belt-and-braces cycle guard).
    pub fn check_no_self_reference(
        &self,
        container: &Value,
        value: &Value,
    ) -> ValueResult<()> {
        match container {
            Value::Array(id) if self.arrays.would_self_reference(*id, value) => {
                Err(ValueError::SelfReferentialStore { kind: "array" })
            }
            Value::Mapping(id) if self.mappings.would_self_reference(*id, value) => {
                Err(ValueError::SelfReferentialStore { kind: "mapping" })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_then_release_leaves_no_dangling_refcount() {
        let mut heap = Heap::new();
        let s = heap.alloc_string("hi");
        let arr = heap.alloc_array(vec![s.clone(), Value::Int(1)]);
        let cloned = heap.clone_value(&arr).unwrap();
        // original array + string still referenced, refcount is 2 on the string now
        if let Value::String(id) = &s {
            assert_eq!(heap.strings.refcount(*id).unwrap(), 2);
        }
        heap.release(&arr).unwrap();
        if let Value::String(id) = &s {
            assert_eq!(heap.strings.refcount(*id).unwrap(), 1);
        }
        heap.release(&cloned).unwrap();
        if let Value::String(id) = &s {
            assert!(heap.strings.payload(*id).is_err());
        }
    }

    #[test]
    fn self_referential_array_store_is_rejected() {
        let mut heap = Heap::new();
        let arr = heap.alloc_array(vec![Value::Null]);
        assert!(heap.check_no_self_reference(&arr, &arr).is_err());
        assert!(heap.check_no_self_reference(&arr, &Value::Int(1)).is_ok());
    }
}

/// Property tests for spec section 8 invariants 1 and 8: refcount symmetry
/// across an arbitrary sequence of addref/release, and clone-then-free
/// round-tripping without dangling references. Grounded in the teacher's
/// `neo-vm` property-test convention (see SPEC_FULL.md's "Test tooling").
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Addref,
        Release,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Addref), Just(Op::Release)]
    }

    proptest! {
        /// Invariant 1: for any balanced sequence of pushes (addref) and
        /// pops (release) on a single string, the refcount returns exactly
        /// to its starting value.
        #[test]
        fn refcount_returns_to_start_after_balanced_ops(extra_pushes in 0usize..20) {
            let mut heap = Heap::new();
            let value = heap.alloc_string("balanced");
            let Value::String(id) = value else { unreachable!() };
            let starting = heap.strings.refcount(id).unwrap();

            for _ in 0..extra_pushes {
                heap.addref(&value).unwrap();
            }
            for _ in 0..extra_pushes {
                heap.release(&value).unwrap();
            }

            prop_assert_eq!(heap.strings.refcount(id).unwrap(), starting);
        }

        /// Same invariant under an interleaved (not strictly push-then-pop)
        /// schedule, as long as the schedule never pops below the starting
        /// count and ends balanced.
        #[test]
        fn refcount_returns_to_start_under_interleaved_ops(
            ops in prop::collection::vec(op_strategy(), 0..40)
        ) {
            let mut heap = Heap::new();
            let value = heap.alloc_string("interleaved");
            let Value::String(id) = value else { unreachable!() };
            let starting = heap.strings.refcount(id).unwrap();

            let mut outstanding: i64 = 0;
            let mut applied = Vec::new();
            for op in ops {
                match op {
                    Op::Addref => {
                        heap.addref(&value).unwrap();
                        outstanding += 1;
                        applied.push(Op::Addref);
                    }
                    Op::Release if outstanding > 0 => {
                        heap.release(&value).unwrap();
                        outstanding -= 1;
                        applied.push(Op::Release);
                    }
                    Op::Release => {} // would underflow below the starting refcount; skip
                }
            }
            for _ in 0..outstanding {
                heap.release(&value).unwrap();
            }

            prop_assert_eq!(heap.strings.refcount(id).unwrap(), starting);
        }

        /// Invariant 8: `clone(v)` for an arbitrary nested array of strings
        /// compares equal to `v`, and releasing both the original and the
        /// clone frees every payload with no dangling references.
        #[test]
        fn clone_of_nested_array_frees_without_dangling_refs(
            payloads in prop::collection::vec("[a-z]{1,8}", 1..6)
        ) {
            let mut heap = Heap::new();
            let strings: Vec<Value> = payloads.iter().map(|p| heap.alloc_string(p.as_str())).collect();
            let inner = heap.alloc_array(strings.clone());
            let outer = heap.alloc_array(vec![inner.clone(), Value::Int(7)]);

            let cloned = heap.clone_value(&outer).unwrap();
            prop_assert_eq!(heap.to_display_string(&outer).unwrap(), heap.to_display_string(&cloned).unwrap());

            heap.release(&outer).unwrap();
            heap.release(&cloned).unwrap();

            for s in &strings {
                if let Value::String(id) = s {
                    prop_assert!(heap.strings.payload(*id).is_err());
                }
            }
        }
    }
}

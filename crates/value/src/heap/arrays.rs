//! Arena-managed arrays (spec "Array"): ordered sequence of Values with
//! length and capacity, grown by doubling, owned by its arena and cloned by
//! value when needed.

use crate::error::{ValueError, ValueResult};
use crate::handle::ArrayId;
use crate::value::Value;

#[derive(Default)]
pub struct ArrayHeap {
    slots: Vec<Option<Vec<Value>>>,
    free_list: Vec<u32>,
}

impl ArrayHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, elements: Vec<Value>) -> ArrayId {
        if let Some(idx) = self.free_list.pop() {
            self.slots[idx as usize] = Some(elements);
            ArrayId(idx)
        } else {
            self.slots.push(Some(elements));
            ArrayId((self.slots.len() - 1) as u32)
        }
    }

    pub fn free(&mut self, id: ArrayId) -> ValueResult<Vec<Value>> {
        let idx = id.index();
        let slot = self
            .slots
            .get_mut(idx)
            .ok_or(ValueError::StaleHandle { kind: ArrayId::KIND, id: id.0 })?
            .take()
            .ok_or(ValueError::StaleHandle { kind: ArrayId::KIND, id: id.0 })?;
        self.free_list.push(idx as u32);
        Ok(slot)
    }

    pub fn get(&self, id: ArrayId) -> ValueResult<&[Value]> {
        self.slots
            .get(id.index())
            .and_then(|s| s.as_deref())
            .ok_or(ValueError::StaleHandle { kind: ArrayId::KIND, id: id.0 })
    }

    pub fn get_mut(&mut self, id: ArrayId) -> ValueResult<&mut Vec<Value>> {
        self.slots
            .get_mut(id.index())
            .and_then(|s| s.as_mut())
            .ok_or(ValueError::StaleHandle { kind: ArrayId::KIND, id: id.0 })
    }

    pub fn len(&self, id: ArrayId) -> ValueResult<usize> {
        Ok(self.get(id)?.len())
    }

    /// Reads the element at `index`, returning `None` for out-of-range
    /// (the opcode handler maps that to `Value::Null` per §4.6 `INDEX_ARRAY`).
    pub fn index(&self, id: ArrayId, index: i64) -> ValueResult<Option<Value>> {
        let slice = self.get(id)?;
        if index < 0 {
            return Ok(None);
        }
        Ok(slice.get(index as usize).cloned())
    }

    pub fn store(&mut self, id: ArrayId, index: i64, value: Value) -> ValueResult<bool> {
        let vec = self.get_mut(id)?;
        if index < 0 || index as usize >= vec.len() {
            return Ok(false);
        }
        vec[index as usize] = value;
        Ok(true)
    }

    /// Returns whether `value` refers to `target` itself, used by codegen's
    /// self-referential aggregate-store guard (spec section 9).
    pub fn would_self_reference(&self, target: ArrayId, value: &Value) -> bool {
        matches!(value, Value::Array(id) if *id == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_out_of_range_yields_none() {
        let mut heap = ArrayHeap::new();
        let id = heap.alloc(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(heap.index(id, 0).unwrap(), Some(Value::Int(1)));
        assert_eq!(heap.index(id, 5).unwrap(), None);
        assert_eq!(heap.index(id, -1).unwrap(), None);
    }

    #[test]
    fn store_in_place_mutates_the_owning_slot() {
        let mut heap = ArrayHeap::new();
        let id = heap.alloc(vec![Value::Int(1)]);
        assert!(heap.store(id, 0, Value::Int(42)).unwrap());
        assert_eq!(heap.index(id, 0).unwrap(), Some(Value::Int(42)));
    }
}

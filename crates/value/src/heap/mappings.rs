//! Arena-managed mappings (spec "Mapping"): hash table of string keys to
//! Values with collision chaining; iteration order is not guaranteed, so we
//! back it directly with `hashbrown::HashMap` rather than hand-rolling
//! buckets.

use hashbrown::HashMap;

use crate::error::{ValueError, ValueResult};
use crate::handle::MappingId;
use crate::value::Value;

#[derive(Default)]
pub struct MappingHeap {
    slots: Vec<Option<HashMap<String, Value>>>,
    free_list: Vec<u32>,
}

impl MappingHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, entries: HashMap<String, Value>) -> MappingId {
        if let Some(idx) = self.free_list.pop() {
            self.slots[idx as usize] = Some(entries);
            MappingId(idx)
        } else {
            self.slots.push(Some(entries));
            MappingId((self.slots.len() - 1) as u32)
        }
    }

    pub fn free(&mut self, id: MappingId) -> ValueResult<HashMap<String, Value>> {
        let idx = id.index();
        let taken = self
            .slots
            .get_mut(idx)
            .ok_or(ValueError::StaleHandle { kind: MappingId::KIND, id: id.0 })?
            .take()
            .ok_or(ValueError::StaleHandle { kind: MappingId::KIND, id: id.0 })?;
        self.free_list.push(idx as u32);
        Ok(taken)
    }

    pub fn get(&self, id: MappingId) -> ValueResult<&HashMap<String, Value>> {
        self.slots
            .get(id.index())
            .and_then(|s| s.as_ref())
            .ok_or(ValueError::StaleHandle { kind: MappingId::KIND, id: id.0 })
    }

    pub fn get_mut(&mut self, id: MappingId) -> ValueResult<&mut HashMap<String, Value>> {
        self.slots
            .get_mut(id.index())
            .and_then(|s| s.as_mut())
            .ok_or(ValueError::StaleHandle { kind: MappingId::KIND, id: id.0 })
    }

    pub fn len(&self, id: MappingId) -> ValueResult<usize> {
        Ok(self.get(id)?.len())
    }

    pub fn index(&self, id: MappingId, key: &str) -> ValueResult<Option<Value>> {
        Ok(self.get(id)?.get(key).cloned())
    }

    pub fn store(&mut self, id: MappingId, key: String, value: Value) -> ValueResult<()> {
        self.get_mut(id)?.insert(key, value);
        Ok(())
    }

    pub fn would_self_reference(&self, target: MappingId, value: &Value) -> bool {
        matches!(value, Value::Mapping(id) if *id == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_yields_none() {
        let mut heap = MappingHeap::new();
        let id = heap.alloc(HashMap::new());
        assert_eq!(heap.index(id, "nope").unwrap(), None);
        heap.store(id, "k".into(), Value::Int(7)).unwrap();
        assert_eq!(heap.index(id, "k").unwrap(), Some(Value::Int(7)));
    }
}

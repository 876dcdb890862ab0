//! A single object record (spec section 3 "Object"): name, single prototype
//! pointer, a property hash table with prototype-chain lookup, and a method
//! table of VM function indices, also prototype-chain resolved.

use hashbrown::HashMap;

use amlp_value::{ObjectId, Value};

/// Grounded on `examples/original_source/src/object.c`'s `obj_t`: a
/// polynomial-hashed property table with chained buckets and a flat
/// methods array, searched linearly by name. `hashbrown::HashMap` replaces
/// the hand-rolled bucket array (spec section 3 only requires "hash-chained
/// name->Value entries", not a specific collision strategy); the flat
/// `Vec<usize>` of function-table indices replaces the raw `VMFunction*`
/// array since `amlp-vm` owns function storage centrally (spec section 3
/// "Ownership": "objects own their property and method tables but not the
/// VMFunctions they reference").
pub struct Object {
    pub name: String,
    pub prototype: Option<ObjectId>,
    properties: HashMap<String, Value>,
    /// Indices into the VM's function table, in attach order; resolved by
    /// name against `amlp_vm::Vm::function` rather than by pointer, since
    /// Rust has no direct pointer-identity match for `VMFunction` the way
    /// `object.c`'s `obj_get_method` does (it compares `VMFunction*`
    /// values directly).
    methods: Vec<usize>,
    pub ref_count: u32,
    pub destroyed: bool,
}

impl Object {
    pub fn new(name: impl Into<String>) -> Self {
        Object {
            name: name.into(),
            prototype: None,
            properties: HashMap::new(),
            methods: Vec::new(),
            ref_count: 1,
            destroyed: false,
        }
    }

    pub fn attach_method(&mut self, function_index: usize) {
        self.methods.push(function_index);
    }

    pub fn own_methods(&self) -> &[usize] {
        &self.methods
    }

    /// Property writes always target the current object, never the
    /// prototype chain (spec section 4.7).
    pub fn set_property(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.properties.insert(name.into(), value)
    }

    pub fn own_property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn delete_property(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &String> {
        self.properties.keys()
    }

    pub fn property_values(&self) -> impl Iterator<Item = &Value> {
        self.properties.values()
    }
}

/// A method found by walking the prototype chain: the VM function-table
/// index plus the id of the object record that actually declares it.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedMethod {
    pub function_index: usize,
    pub declaring_object: ObjectId,
}

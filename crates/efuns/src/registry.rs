//! The efun registry (spec section 4.8): "flat vector of entries.
//! Registration appends; lookup is linear scan by name (case-sensitive). A
//! call checks `arg_count ∈ [min_args, max_args]` (max_args == -1 means
//! unbounded) and otherwise returns Null with a diagnostic."
//!
//! Grounded on `examples/original_source/src/efun.h`'s `EfunEntry`/
//! `EfunRegistry`: name, min/max arity, and a callback, looked up linearly
//! by `efun_find`. The callback itself lives one level up in `host.rs`'s
//! big dispatch match, since most efuns here need more than `(vm, args)` —
//! `call_other`/`clone_object`/`tell_object` all need the object manager
//! and session context too, which a bare `fn` pointer can't close over.

pub struct EfunEntry {
    pub name: &'static str,
    pub min_args: i32,
    pub max_args: i32,
}

/// `-1` max_args, matching the teacher source's "unlimited" sentinel.
pub const UNBOUNDED: i32 = -1;

pub struct EfunRegistry {
    entries: Vec<EfunEntry>,
}

impl EfunRegistry {
    pub fn find(&self, name: &str) -> Option<&EfunEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn arity_ok(&self, name: &str, arg_count: usize) -> bool {
        match self.find(name) {
            Some(entry) => {
                let count = arg_count as i32;
                count >= entry.min_args && (entry.max_args == UNBOUNDED || count <= entry.max_args)
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }
}

impl Default for EfunRegistry {
    fn default() -> Self {
        let entries = vec![
            // Strings
            EfunEntry { name: "strlen", min_args: 1, max_args: 1 },
            EfunEntry { name: "substring", min_args: 2, max_args: 3 },
            EfunEntry { name: "upper_case", min_args: 1, max_args: 1 },
            EfunEntry { name: "lower_case", min_args: 1, max_args: 1 },
            EfunEntry { name: "trim", min_args: 1, max_args: 1 },
            EfunEntry { name: "explode", min_args: 2, max_args: 2 },
            EfunEntry { name: "implode", min_args: 2, max_args: 2 },
            // Aggregates
            EfunEntry { name: "sizeof", min_args: 1, max_args: 1 },
            EfunEntry { name: "intp", min_args: 1, max_args: 1 },
            EfunEntry { name: "floatp", min_args: 1, max_args: 1 },
            EfunEntry { name: "stringp", min_args: 1, max_args: 1 },
            EfunEntry { name: "arrayp", min_args: 1, max_args: 1 },
            EfunEntry { name: "mappingp", min_args: 1, max_args: 1 },
            EfunEntry { name: "objectp", min_args: 1, max_args: 1 },
            EfunEntry { name: "sort_array", min_args: 1, max_args: 1 },
            EfunEntry { name: "reverse_array", min_args: 1, max_args: 1 },
            // Math
            EfunEntry { name: "abs", min_args: 1, max_args: 1 },
            EfunEntry { name: "sqrt", min_args: 1, max_args: 1 },
            EfunEntry { name: "pow", min_args: 2, max_args: 2 },
            EfunEntry { name: "random", min_args: 1, max_args: 1 },
            EfunEntry { name: "min", min_args: 1, max_args: UNBOUNDED },
            EfunEntry { name: "max", min_args: 1, max_args: UNBOUNDED },
            // Host I/O
            EfunEntry { name: "read_file", min_args: 1, max_args: 3 },
            EfunEntry { name: "write_file", min_args: 2, max_args: 2 },
            EfunEntry { name: "file_size", min_args: 1, max_args: 1 },
            EfunEntry { name: "get_dir", min_args: 1, max_args: 1 },
            EfunEntry { name: "mkdir", min_args: 1, max_args: 1 },
            EfunEntry { name: "rm", min_args: 1, max_args: 1 },
            // Object/player
            EfunEntry { name: "clone_object", min_args: 1, max_args: 1 },
            EfunEntry { name: "find_object", min_args: 1, max_args: 1 },
            EfunEntry { name: "call_other", min_args: 2, max_args: UNBOUNDED },
            EfunEntry { name: "present", min_args: 1, max_args: 2 },
            EfunEntry { name: "environment", min_args: 1, max_args: 1 },
            EfunEntry { name: "move_object", min_args: 2, max_args: 2 },
            EfunEntry { name: "this_player", min_args: 0, max_args: 0 },
            EfunEntry { name: "file_name", min_args: 1, max_args: 1 },
            // Messaging
            EfunEntry { name: "tell_object", min_args: 2, max_args: 2 },
            // Output
            EfunEntry { name: "write", min_args: 1, max_args: 1 },
            EfunEntry { name: "printf", min_args: 1, max_args: UNBOUNDED },
        ];
        EfunRegistry { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_bounds_are_enforced() {
        let registry = EfunRegistry::default();
        assert!(registry.arity_ok("strlen", 1));
        assert!(!registry.arity_ok("strlen", 2));
        assert!(registry.arity_ok("min", 7));
        assert!(!registry.arity_ok("min", 0));
    }

    #[test]
    fn unknown_efun_has_no_entry() {
        let registry = EfunRegistry::default();
        assert!(!registry.contains("not_a_real_efun"));
    }
}

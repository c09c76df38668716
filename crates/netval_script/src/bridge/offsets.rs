//! Record field offset cache
//!
//! Property access on a record proxy arrives as a field name. Resolving it
//! with a linear scan on every access is wasteful, so the offsets of a record
//! type are memoized the first time any of its fields is queried.
//!
//! Each cached layout is keyed by descriptor identity and holds two maps
//! filled in one pass: a hash of the field name (checked against the declared
//! name before use) and the name itself. Layouts are never evicted; record
//! layouts do not change once built.

use netval_core::{HostType, TypePtr};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

struct Layout {
    // Pins the descriptor so its address cannot be reused by another type.
    ty: TypePtr,
    by_hash: HashMap<u64, usize>,
    by_name: HashMap<String, usize>,
}

#[derive(Default)]
pub struct FieldOffsetCache {
    layouts: HashMap<*const HostType, Layout>,
}

fn name_hash(name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}

impl Layout {
    fn build(ty: &TypePtr) -> Option<Self> {
        let record = ty.as_record()?;
        let mut by_hash = HashMap::with_capacity(record.num_fields());
        let mut by_name = HashMap::with_capacity(record.num_fields());
        for (offset, field) in record.fields().iter().enumerate() {
            // First field wins a hash collision; later ones resolve by name.
            by_hash.entry(name_hash(&field.name)).or_insert(offset);
            by_name.insert(field.name.clone(), offset);
        }
        tracing::debug!(
            "cached {} field offsets for record {}",
            record.num_fields(),
            record.name()
        );
        Some(Self {
            ty: ty.clone(),
            by_hash,
            by_name,
        })
    }

    fn lookup(&self, name: &str) -> Option<usize> {
        let record = self.ty.as_record()?;
        if let Some(&offset) = self.by_hash.get(&name_hash(name)) {
            if record.field(offset).is_some_and(|f| f.name == name) {
                return Some(offset);
            }
        }
        self.by_name.get(name).copied()
    }
}

impl FieldOffsetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of `field` in record type `ty`, or `None` when the type is not
    /// a record or has no such field.
    pub fn lookup(&mut self, ty: &TypePtr, field: &str) -> Option<usize> {
        let key = Rc::as_ptr(ty);
        if !self.layouts.contains_key(&key) {
            let layout = Layout::build(ty)?;
            self.layouts.insert(key, layout);
        }
        self.layouts.get(&key)?.lookup(field)
    }

    /// Number of record types with cached layouts.
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netval_core::{Attrs, RecordType};

    fn endpoint() -> TypePtr {
        RecordType::builder("endpoint")
            .field("host", HostType::Addr.into_ptr(), Attrs::LOG)
            .field("port", HostType::Port.into_ptr(), Attrs::LOG)
            .field("bytes", HostType::Count.into_ptr(), Attrs::OPTIONAL)
            .build()
    }

    #[test]
    fn lookup_matches_declaration_order() {
        let ty = endpoint();
        let mut cache = FieldOffsetCache::new();
        assert_eq!(cache.lookup(&ty, "host"), Some(0));
        assert_eq!(cache.lookup(&ty, "port"), Some(1));
        assert_eq!(cache.lookup(&ty, "bytes"), Some(2));
        assert_eq!(cache.lookup(&ty, "missing"), None);
    }

    #[test]
    fn layout_is_populated_once_per_descriptor() {
        let ty = endpoint();
        let mut cache = FieldOffsetCache::new();
        for _ in 0..3 {
            assert_eq!(cache.lookup(&ty, "port"), Some(1));
        }
        assert_eq!(cache.len(), 1);

        // Structurally equal but distinct descriptors get their own entry.
        let other = endpoint();
        assert_eq!(cache.lookup(&other, "bytes"), Some(2));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn offsets_agree_with_linear_scan() {
        let ty = endpoint();
        let mut cache = FieldOffsetCache::new();
        let record = ty.as_record().unwrap();
        for field in record.fields() {
            assert_eq!(cache.lookup(&ty, &field.name), record.field_offset(&field.name));
        }
    }

    #[test]
    fn non_records_are_not_cached() {
        let mut cache = FieldOffsetCache::new();
        assert_eq!(cache.lookup(&HostType::Count.into_ptr(), "x"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn hash_collision_falls_back_to_name() {
        let ty = endpoint();
        let mut cache = FieldOffsetCache::new();
        cache.lookup(&ty, "host");

        // Point the hash slot for "port" at the wrong field.
        let layout = cache.layouts.get_mut(&Rc::as_ptr(&ty)).unwrap();
        layout.by_hash.insert(name_hash("port"), 0);

        assert_eq!(cache.lookup(&ty, "port"), Some(1));
        assert_eq!(cache.lookup(&ty, "host"), Some(0));
    }

    #[test]
    fn cache_keeps_descriptor_alive() {
        let ty = endpoint();
        let mut cache = FieldOffsetCache::new();
        cache.lookup(&ty, "host");
        assert_eq!(Rc::strong_count(&ty), 2);
    }
}

use slotmap::{Key, SlotMap};

use crate::backend::NativeName;

/// A pool entry: one logical GPU object.
#[derive(Debug)]
pub struct ObjectEntry<T> {
    /// `None` for driver defaults (default VAO / transform feedback), syncs,
    /// and for every object while the context is lost.
    pub native: Option<NativeName>,
    pub deleted: bool,
    /// Creation registry reference plus one per binding slot.
    refs: u32,
    pub has_been_bound: bool,
    pub data: T,
}

impl<T> ObjectEntry<T> {
    #[inline]
    #[must_use]
    pub fn refs(&self) -> u32 {
        self.refs
    }
}

/// Per-kind storage for reference-counted GPU objects.
///
/// Objects stay addressable while anything references them. The native
/// resource is handed to the graveyard exactly once, when the object is both
/// `deleted` and unreferenced, whichever of the two happens last.
#[derive(Debug)]
pub struct ObjectPool<K: Key, T> {
    map: SlotMap<K, ObjectEntry<T>>,
    graveyard: Vec<NativeName>,
}

impl<K: Key, T> Default for ObjectPool<K, T> {
    fn default() -> Self {
        Self {
            map: SlotMap::with_key(),
            graveyard: Vec::new(),
        }
    }
}

impl<K: Key, T> ObjectPool<K, T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new object holding the creation reference.
    pub fn insert(&mut self, native: Option<NativeName>, data: T) -> K {
        self.map.insert(ObjectEntry {
            native,
            deleted: false,
            refs: 1,
            has_been_bound: false,
            data,
        })
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: K) -> Option<&ObjectEntry<T>> {
        self.map.get(id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: K) -> Option<&mut ObjectEntry<T>> {
        self.map.get_mut(id)
    }

    #[inline]
    #[must_use]
    pub fn data(&self, id: K) -> Option<&T> {
        self.map.get(id).map(|e| &e.data)
    }

    #[inline]
    pub fn data_mut(&mut self, id: K) -> Option<&mut T> {
        self.map.get_mut(id).map(|e| &mut e.data)
    }

    /// Present and not flagged deleted.
    #[inline]
    #[must_use]
    pub fn is_live(&self, id: K) -> bool {
        self.map.get(id).is_some_and(|e| !e.deleted)
    }

    #[inline]
    #[must_use]
    pub fn native(&self, id: K) -> Option<NativeName> {
        self.map.get(id).and_then(|e| e.native)
    }

    /// Resolves an optional id to its native name, `None` meaning "zero".
    #[inline]
    #[must_use]
    pub fn native_of(&self, id: Option<K>) -> Option<NativeName> {
        id.and_then(|id| self.native(id))
    }

    pub fn mark_bound(&mut self, id: K) {
        if let Some(entry) = self.map.get_mut(id) {
            entry.has_been_bound = true;
        }
    }

    /// Flags the object deleted and drops the creation reference.
    ///
    /// Returns `false` if the object was already deleted or is unknown.
    pub fn mark_deleted(&mut self, id: K) -> bool {
        match self.map.get_mut(id) {
            Some(entry) if !entry.deleted => {
                entry.deleted = true;
                self.release_ref(id);
                true
            }
            _ => false,
        }
    }

    pub fn add_ref(&mut self, id: K) {
        if let Some(entry) = self.map.get_mut(id) {
            entry.refs += 1;
        }
    }

    pub fn release_ref(&mut self, id: K) {
        let Some(entry) = self.map.get_mut(id) else {
            return;
        };
        debug_assert!(entry.refs > 0, "object reference count underflow");
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 && entry.deleted {
            if let Some(entry) = self.map.remove(id)
                && let Some(native) = entry.native
            {
                self.graveyard.push(native);
            }
        }
    }

    /// Replaces the occupant of a binding slot, moving its reference.
    pub fn rebind(&mut self, slot: &mut Option<K>, new: Option<K>) {
        if *slot == new {
            return;
        }
        if let Some(id) = new {
            self.add_ref(id);
        }
        if let Some(old) = slot.take() {
            self.release_ref(old);
        }
        *slot = new;
    }

    /// Native names whose release became due since the last drain.
    pub fn drain_graveyard(&mut self) -> std::vec::Drain<'_, NativeName> {
        self.graveyard.drain(..)
    }

    /// Removes every object, returning all native names still alive.
    pub fn clear(&mut self) -> Vec<NativeName> {
        let mut natives: Vec<NativeName> = self.graveyard.drain(..).collect();
        natives.extend(self.map.drain().filter_map(|(_, e)| e.native));
        natives
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &ObjectEntry<T>)> {
        self.map.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut ObjectEntry<T>)> {
        self.map.iter_mut()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;
    use crate::objects::BufferId;

    fn name(n: u32) -> NativeName {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn delete_without_bindings_releases_immediately() {
        let mut pool: ObjectPool<BufferId, ()> = ObjectPool::new();
        let id = pool.insert(Some(name(7)), ());
        assert!(pool.mark_deleted(id));
        assert_eq!(pool.drain_graveyard().collect::<Vec<_>>(), vec![name(7)]);
        assert!(pool.get(id).is_none());
    }

    #[test]
    fn bound_object_outlives_delete_until_unbound() {
        let mut pool: ObjectPool<BufferId, ()> = ObjectPool::new();
        let id = pool.insert(Some(name(3)), ());
        let mut slot = None;
        pool.rebind(&mut slot, Some(id));

        pool.mark_deleted(id);
        assert_eq!(pool.drain_graveyard().count(), 0);
        assert!(pool.get(id).is_some_and(|e| e.deleted));
        assert!(!pool.is_live(id));

        pool.rebind(&mut slot, None);
        assert_eq!(pool.drain_graveyard().collect::<Vec<_>>(), vec![name(3)]);
    }

    #[test]
    fn double_delete_is_ignored() {
        let mut pool: ObjectPool<BufferId, ()> = ObjectPool::new();
        let id = pool.insert(Some(name(1)), ());
        let mut slot = None;
        pool.rebind(&mut slot, Some(id));
        assert!(pool.mark_deleted(id));
        assert!(!pool.mark_deleted(id));
        assert_eq!(pool.get(id).map(ObjectEntry::refs), Some(1));
    }

    #[test]
    fn rebinding_same_object_keeps_count() {
        let mut pool: ObjectPool<BufferId, ()> = ObjectPool::new();
        let id = pool.insert(Some(name(1)), ());
        let mut slot = None;
        pool.rebind(&mut slot, Some(id));
        pool.rebind(&mut slot, Some(id));
        assert_eq!(pool.get(id).map(ObjectEntry::refs), Some(2));
    }
}

//! Process-wide mapping from native instance addresses to bridge state.
//!
//! Generic dispatch and callback functions receive nothing but the raw
//! effect pointer, so each side keeps one registry to find its state again.
//! State lives in an arena of slots addressed by [`InstanceId`]; the native
//! address is only a lookup key.
//!
//! A dispatch call may re-enter the bridge through a callback on the same
//! thread. Lookups therefore take the read lock only long enough to clone
//! an `Arc` and never hold it while user code runs.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Stable synthetic handle of a registered instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId {
    index: u32,
    generation: u32,
}

impl InstanceId {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

struct Slot<T: ?Sized> {
    generation: u32,
    entry: Option<(usize, Arc<T>)>,
}

struct Inner<T: ?Sized> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    by_address: HashMap<usize, InstanceId>,
}

pub struct InstanceRegistry<T: ?Sized> {
    inner: RwLock<Inner<T>>,
}

impl<T: ?Sized> Default for InstanceRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> InstanceRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                slots: Vec::new(),
                free: Vec::new(),
                by_address: HashMap::new(),
            }),
        }
    }

    /// Registers `value` under `address`.
    ///
    /// An entry still registered at the same address belongs to an instance
    /// whose memory was released without unregistering. It is evicted with
    /// a warning and its id becomes stale.
    pub fn register(&self, address: usize, value: impl Into<Arc<T>>) -> InstanceId {
        let value = value.into();
        let mut inner = self.inner.write();
        let evicted = match inner.by_address.get(&address).copied() {
            Some(stale) => {
                tracing::warn!(
                    "instance {} at {:#x} was never unregistered; replacing it",
                    stale,
                    address
                );
                Self::take_slot(&mut inner, stale)
            }
            None => None,
        };
        let entry = Some((address, value));
        let recycled = inner.free.pop();
        let id = match recycled {
            Some(index) => {
                let slot = &mut inner.slots[index as usize];
                slot.generation = slot.generation.wrapping_add(1);
                slot.entry = entry;
                InstanceId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = inner.slots.len() as u32;
                inner.slots.push(Slot {
                    generation: 0,
                    entry,
                });
                InstanceId {
                    index,
                    generation: 0,
                }
            }
        };
        inner.by_address.insert(address, id);
        drop(inner);
        drop(evicted);
        tracing::trace!("registered instance {} at {:#x}", id, address);
        id
    }

    /// State registered under a native address.
    pub fn lookup(&self, address: usize) -> Option<Arc<T>> {
        let inner = self.inner.read();
        let id = *inner.by_address.get(&address)?;
        Self::slot_value(&inner, id)
    }

    pub fn id_of(&self, address: usize) -> Option<InstanceId> {
        self.inner.read().by_address.get(&address).copied()
    }

    /// State registered under a synthetic id. Stale ids return `None`.
    pub fn get(&self, id: InstanceId) -> Option<Arc<T>> {
        Self::slot_value(&self.inner.read(), id)
    }

    /// Removes the entry for `address` and returns its state.
    pub fn unregister(&self, address: usize) -> Option<Arc<T>> {
        let mut inner = self.inner.write();
        let id = *inner.by_address.get(&address)?;
        let value = Self::take_slot(&mut inner, id)?;
        tracing::trace!("unregistered instance {} at {:#x}", id, address);
        Some(value)
    }

    /// Removes the entry for `id` and returns its state. The address key is
    /// released only while it still maps to `id`, so a stale id never
    /// removes a newer instance registered at the same address.
    pub fn unregister_id(&self, id: InstanceId) -> Option<Arc<T>> {
        let mut inner = self.inner.write();
        let value = Self::take_slot(&mut inner, id)?;
        tracing::trace!("unregistered instance {}", id);
        Some(value)
    }

    fn take_slot(inner: &mut Inner<T>, id: InstanceId) -> Option<Arc<T>> {
        let slot = inner.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let (address, value) = slot.entry.take()?;
        inner.free.push(id.index);
        if inner.by_address.get(&address) == Some(&id) {
            inner.by_address.remove(&address);
        }
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot_value(inner: &Inner<T>, id: InstanceId) -> Option<Arc<T>> {
        let slot = inner.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref().map(|(_, value)| Arc::clone(value))
    }
}

impl<T: ?Sized> fmt::Debug for InstanceRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("InstanceRegistry")
            .field("live", &inner.by_address.len())
            .field("slots", &inner.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = InstanceRegistry::<&str>::new();
        let a = registry.register(0x1000, "a");
        let b = registry.register(0x2000, "b");
        assert_ne!(a, b);
        assert_eq!(*registry.lookup(0x1000).unwrap(), "a");
        assert_eq!(*registry.lookup(0x2000).unwrap(), "b");
        assert_eq!(*registry.get(b).unwrap(), "b");
        assert_eq!(registry.id_of(0x1000), Some(a));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unregister_makes_lookup_fail() {
        let registry = InstanceRegistry::<u32>::new();
        let id = registry.register(0x1000, 1u32);
        assert_eq!(registry.unregister(0x1000).as_deref(), Some(&1));
        assert!(registry.lookup(0x1000).is_none(), "closed instance must not be found");
        assert!(registry.get(id).is_none());
        assert!(registry.unregister(0x1000).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reused_slot_invalidates_stale_id() {
        let registry = InstanceRegistry::<u32>::new();
        let first = registry.register(0x1000, 1u32);
        registry.unregister(0x1000);
        let second = registry.register(0x1000, 2u32);
        assert_eq!(first.index(), second.index(), "slot should be recycled");
        assert_ne!(first.generation(), second.generation());
        assert!(registry.get(first).is_none());
        assert_eq!(*registry.lookup(0x1000).unwrap(), 2);
    }

    #[test]
    fn test_duplicate_address_replaces_stale_entry() {
        let registry = InstanceRegistry::<u32>::new();
        let stale = registry.register(0x1000, 1u32);
        let fresh = registry.register(0x1000, 2u32);
        assert_ne!(stale, fresh);
        assert!(registry.get(stale).is_none(), "evicted id must be stale");
        assert_eq!(*registry.lookup(0x1000).unwrap(), 2);
        assert_eq!(registry.id_of(0x1000), Some(fresh));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_by_id_spares_newer_instance_at_same_address() {
        let registry = InstanceRegistry::<u32>::new();
        let first = registry.register(0x1000, 1u32);
        assert_eq!(registry.unregister_id(first).as_deref(), Some(&1));
        assert!(registry.lookup(0x1000).is_none());

        let second = registry.register(0x1000, 2u32);
        assert!(registry.unregister_id(first).is_none(), "stale id removes nothing");
        assert_eq!(*registry.lookup(0x1000).unwrap(), 2);
        assert_eq!(registry.unregister_id(second).as_deref(), Some(&2));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lookup_does_not_hold_lock() {
        let registry = InstanceRegistry::<u8>::new();
        registry.register(0x1000, 7u8);
        let held = registry.lookup(0x1000).unwrap();
        // Writers must make progress while a looked-up value is alive.
        registry.register(0x2000, 8u8);
        registry.unregister(0x1000);
        assert_eq!(*held, 7);
    }

    #[test]
    fn test_unsized_entries_share_arc() {
        let registry = InstanceRegistry::<dyn Fn(i32) -> i32 + Send + Sync>::new();
        let handler: Arc<dyn Fn(i32) -> i32 + Send + Sync> = Arc::new(|x: i32| x * 2);
        registry.register(0x1000, Arc::clone(&handler));
        let found = registry.lookup(0x1000).unwrap();
        assert!(Arc::ptr_eq(&found, &handler));
        assert_eq!(found(21), 42);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(InstanceRegistry::<usize>::new());
        let handles: Vec<_> = (0..8usize)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..100usize {
                        let address = (t << 16) | (i + 1);
                        registry.register(address, address);
                        assert_eq!(*registry.lookup(address).unwrap(), address);
                        if i % 2 == 0 {
                            registry.unregister(address);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 8 * 50);
    }
}

//! Per type instance pools.
//!
//! An [`InstancePool`] hands out boxed records and takes them back. A returned
//! instance has every descriptor covered field reset to its zero value before
//! it becomes visible to the next [`acquire`](InstancePool::acquire), so no
//! request ever observes data bound for another one.

use crate::descriptor::FieldDescriptor;
use crate::record::Record;
use parking_lot::Mutex;
use std::convert::Infallible;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::trace;

/// How many idle instances a pool keeps by default.
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

pub struct InstancePool<R> {
    free: Mutex<Vec<Box<R>>>,
    // fields reset on release, indexed by field position
    covered: Box<[bool]>,
    capacity: usize,
}

impl<R: Record> InstancePool<R> {
    /// A pool resetting the fields `descriptors` cover, keeping at most `capacity` idle instances.
    pub fn new(descriptors: &[FieldDescriptor], capacity: usize) -> Self {
        let mut covered = vec![false; R::specs().len()];
        for descriptor in descriptors {
            covered[descriptor.index()] = true;
        }
        Self { free: Mutex::new(Vec::new()), covered: covered.into_boxed_slice(), capacity }
    }

    /// Takes an idle instance, or allocates a zero valued one if none is left.
    pub fn acquire(&self) -> Box<R> {
        let recycled = self.free.lock().pop();
        recycled.unwrap_or_else(|| {
            trace!(record = std::any::type_name::<R>(), "allocate pooled instance");
            Box::default()
        })
    }

    /// Resets `instance` and keeps it for reuse, dropping it if the pool is full.
    pub fn release(&self, mut instance: Box<R>) {
        self.reset(&mut instance);

        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(instance);
        }
    }

    /// Zeroes every descriptor covered field of `instance`.
    pub fn reset(&self, instance: &mut R) {
        if self.covered.is_empty() {
            return;
        }

        let Ok(()) = instance.visit_fields_mut(|index, slot| {
            if self.covered.get(index).copied().unwrap_or(false) {
                slot.reset();
            }
            Ok::<_, Infallible>(())
        });
    }

    /// Number of instances waiting for reuse.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<R> fmt::Debug for InstancePool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstancePool")
            .field("record", &std::any::type_name::<R>())
            .field("idle", &self.free.lock().len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// A record checked out of an [`InstancePool`].
///
/// The instance is exclusively owned until the guard drops, at which point it
/// is reset and handed back.
pub struct Pooled<R: Record> {
    instance: Option<Box<R>>,
    pool: Arc<InstancePool<R>>,
}

impl<R: Record> Pooled<R> {
    /// Checks an instance out of `pool`; it goes back on drop.
    pub fn new(pool: Arc<InstancePool<R>>) -> Self {
        let instance = pool.acquire();
        Self { instance: Some(instance), pool }
    }

    /// Takes the record out of pool management, it won't be reset nor reused.
    pub fn detach(mut self) -> Box<R> {
        match self.instance.take() {
            Some(instance) => instance,
            None => unreachable!("pooled instance is only taken once"),
        }
    }
}

impl<R: Record> Deref for Pooled<R> {
    type Target = R;

    fn deref(&self) -> &R {
        match &self.instance {
            Some(instance) => instance,
            None => unreachable!("pooled instance is only taken once"),
        }
    }
}

impl<R: Record> DerefMut for Pooled<R> {
    fn deref_mut(&mut self) -> &mut R {
        match &mut self.instance {
            Some(instance) => instance,
            None => unreachable!("pooled instance is only taken once"),
        }
    }
}

impl<R: Record> Drop for Pooled<R> {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            self.pool.release(instance);
        }
    }
}

impl<R: Record + fmt::Debug> fmt::Debug for Pooled<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pooled").field(&self.instance).finish()
    }
}

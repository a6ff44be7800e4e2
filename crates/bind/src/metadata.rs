//! Type metadata and the cache serving it.

use crate::descriptor::{FieldDescriptor, extract};
use crate::pool::{DEFAULT_POOL_CAPACITY, InstancePool, Pooled};
use crate::record::Record;
use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

/// Everything the engine precomputes for one record type.
///
/// Immutable once built, only the pool's free list changes afterwards.
pub struct TypeMetadata<R> {
    descriptors: Vec<FieldDescriptor>,
    // field position -> position in `descriptors`
    lookup: Vec<Option<usize>>,
    pool: Arc<InstancePool<R>>,
    reads_body: bool,
}

impl<R: Record> TypeMetadata<R> {
    /// Extracts the descriptors of `R` and creates its pool.
    pub fn build() -> Self {
        Self::with_pool_capacity(DEFAULT_POOL_CAPACITY)
    }

    pub fn with_pool_capacity(capacity: usize) -> Self {
        let descriptors = extract::<R>();

        let mut lookup = vec![None; R::specs().len()];
        for (position, descriptor) in descriptors.iter().enumerate() {
            lookup[descriptor.index()] = Some(position);
        }

        let reads_body = descriptors.iter().any(|d| d.source().reads_body());
        let pool = Arc::new(InstancePool::new(&descriptors, capacity));

        Self { descriptors, lookup, pool, reads_body }
    }

    /// Descriptors in declaration order.
    pub fn descriptors(&self) -> &[FieldDescriptor] {
        &self.descriptors
    }

    /// The descriptor of the field at `index`, `None` for embedded fields.
    pub fn descriptor_at(&self, index: usize) -> Option<&FieldDescriptor> {
        self.lookup.get(index).copied().flatten().map(|position| &self.descriptors[position])
    }

    /// Looks a descriptor up by Rust field name.
    pub fn descriptor(&self, field_name: &str) -> Option<&FieldDescriptor> {
        self.descriptors.iter().find(|d| d.field_name() == field_name)
    }

    /// Whether binding needs the request body at all.
    pub fn reads_body(&self) -> bool {
        self.reads_body
    }

    pub fn pool(&self) -> &Arc<InstancePool<R>> {
        &self.pool
    }

    /// Checks out a zero valued instance.
    pub fn acquire(&self) -> Pooled<R> {
        Pooled::new(Arc::clone(&self.pool))
    }

    pub fn type_name(&self) -> &'static str {
        type_name::<R>()
    }
}

impl<R> fmt::Debug for TypeMetadata<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMetadata")
            .field("record", &type_name::<R>())
            .field("descriptors", &self.descriptors)
            .field("reads_body", &self.reads_body)
            .field("pool", &self.pool)
            .finish()
    }
}

type Entry = Arc<dyn Any + Send + Sync>;

static GLOBAL_CACHE: Lazy<MetadataCache> = Lazy::new(MetadataCache::new);

/// Concurrent cache of [`TypeMetadata`], keyed by record type.
///
/// Reads are lock free. A miss builds the metadata and publishes a new map;
/// racing misses for the same type may each build, the last published wins.
pub struct MetadataCache {
    entries: ArcSwap<HashMap<TypeId, Entry>>,
    pool_capacity: usize,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::with_pool_capacity(DEFAULT_POOL_CAPACITY)
    }

    /// A cache whose pools keep at most `pool_capacity` idle instances each.
    pub fn with_pool_capacity(pool_capacity: usize) -> Self {
        Self { entries: ArcSwap::from_pointee(HashMap::new()), pool_capacity }
    }

    /// The process wide cache, used when no explicit cache is configured.
    pub fn global() -> &'static MetadataCache {
        &GLOBAL_CACHE
    }

    /// The cached metadata of `R`, built and published on first use.
    pub fn get_or_build<R: Record>(&self) -> Arc<TypeMetadata<R>> {
        let key = TypeId::of::<R>();

        if let Some(entry) = self.entries.load().get(&key) {
            match Arc::clone(entry).downcast::<TypeMetadata<R>>() {
                Ok(metadata) => return metadata,
                Err(_entry) => warn!(record = type_name::<R>(), "cached metadata has a mismatched type, rebuilding"),
            }
        }

        let metadata = Arc::new(TypeMetadata::<R>::with_pool_capacity(self.pool_capacity));
        trace!(record = type_name::<R>(), fields = metadata.descriptors().len(), "built type metadata");

        let entry: Entry = Arc::<TypeMetadata<R>>::clone(&metadata);
        self.entries.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(key, Arc::clone(&entry));
            next
        });
        metadata
    }

    /// Builds the metadata of every record in `S` ahead of the first request.
    pub fn prewarm<S: RecordSet>(&self) {
        S::prewarm(self);
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        self.entries.store(Arc::new(HashMap::new()));
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Whether `R` has been built or prewarmed.
    pub fn contains<R: Record>(&self) -> bool {
        self.entries.load().contains_key(&TypeId::of::<R>())
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataCache")
            .field("entries", &self.len())
            .field("pool_capacity", &self.pool_capacity)
            .finish()
    }
}

/// A tuple of record types, see [`MetadataCache::prewarm`].
pub trait RecordSet {
    fn prewarm(cache: &MetadataCache);
}

impl RecordSet for () {
    fn prewarm(_cache: &MetadataCache) {}
}

macro_rules! impl_record_set {
    ($($param:ident)*) => {
        impl<$($param,)*> RecordSet for ($($param,)*)
        where
            $($param: Record,)*
        {
            fn prewarm(cache: &MetadataCache) {
                $(
                    cache.get_or_build::<$param>();
                )*
            }
        }
    };
}

impl_record_set! { A }
impl_record_set! { A B }
impl_record_set! { A B C }
impl_record_set! { A B C D }
impl_record_set! { A B C D E }
impl_record_set! { A B C D E F }
impl_record_set! { A B C D E F G }
impl_record_set! { A B C D E F G H }
impl_record_set! { A B C D E F G H I }
impl_record_set! { A B C D E F G H I J }
impl_record_set! { A B C D E F G H I J K }
impl_record_set! { A B C D E F G H I J K L }

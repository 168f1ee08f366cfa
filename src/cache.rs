/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Caches of native render passes and pipelines.
//!
//! Native objects are looked up by value-typed queries and created on the
//! first miss. Entries are never evicted while the device is alive; on
//! teardown every entry is handed to the deletion queue.

use crate::{hal, FastHashMap, Format, LoadOp, ObjectId, StoreOp, MAX_COLOR_ATTACHMENTS};

use arrayvec::ArrayVec;

use std::{
    fmt,
    hash::{Hash, Hasher},
};

/// Format and operations of one colour attachment slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AttachmentKey {
    pub format: Format,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
}

impl AttachmentKey {
    /// Contents of an unpopulated slot. Never compared.
    const VACANT: Self = Self {
        format: Format::Rgba8Unorm,
        load_op: LoadOp::DontCare,
        store_op: StoreOp::DontCare,
    };
}

/// Format and operations of the depth-stencil attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DepthStencilKey {
    pub format: Format,
    pub depth_load_op: LoadOp,
    pub depth_store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
}

/// Identifies a compatible native render pass.
///
/// Equality and hashing only look at the populated colour slots,
/// and queries with different slot masks are never equal.
#[derive(Clone, Copy, Debug)]
pub struct RenderPassQuery {
    color_mask: u8,
    colors: [AttachmentKey; MAX_COLOR_ATTACHMENTS],
    depth_stencil: Option<DepthStencilKey>,
}

impl RenderPassQuery {
    pub fn new() -> Self {
        Self {
            color_mask: 0,
            colors: [AttachmentKey::VACANT; MAX_COLOR_ATTACHMENTS],
            depth_stencil: None,
        }
    }

    pub fn set_color(&mut self, slot: usize, key: AttachmentKey) {
        assert!(slot < MAX_COLOR_ATTACHMENTS, "Color slot {} is out of range", slot);
        self.color_mask |= 1 << slot;
        self.colors[slot] = key;
    }

    pub fn set_depth_stencil(&mut self, key: Option<DepthStencilKey>) {
        self.depth_stencil = key;
    }

    pub fn color_mask(&self) -> u8 {
        self.color_mask
    }

    pub fn color(&self, slot: usize) -> Option<&AttachmentKey> {
        if slot < MAX_COLOR_ATTACHMENTS && self.color_mask & (1 << slot) != 0 {
            Some(&self.colors[slot])
        } else {
            None
        }
    }

    /// Populated colour slots, in slot order.
    pub fn colors(&self) -> impl Iterator<Item = (usize, &AttachmentKey)> {
        let mask = self.color_mask;
        self.colors
            .iter()
            .enumerate()
            .filter(move |&(slot, _)| mask & (1 << slot) != 0)
    }

    pub fn color_count(&self) -> usize {
        self.color_mask.count_ones() as usize
    }

    pub fn depth_stencil(&self) -> Option<&DepthStencilKey> {
        self.depth_stencil.as_ref()
    }

    /// Colour slots up to the last populated one.
    pub(crate) fn color_slots(&self) -> ArrayVec<Option<AttachmentKey>, MAX_COLOR_ATTACHMENTS> {
        let end = MAX_COLOR_ATTACHMENTS - self.color_mask.leading_zeros() as usize;
        (0..end).map(|slot| self.color(slot).cloned()).collect()
    }
}

impl Default for RenderPassQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for RenderPassQuery {
    fn eq(&self, other: &Self) -> bool {
        self.color_mask == other.color_mask
            && self.depth_stencil == other.depth_stencil
            && self.colors().zip(other.colors()).all(|(a, b)| a.1 == b.1)
    }
}

impl Eq for RenderPassQuery {}

impl Hash for RenderPassQuery {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.color_mask.hash(state);
        for (_, key) in self.colors() {
            key.hash(state);
        }
        self.depth_stencil.hash(state);
    }
}

/// Identifies a native graphics pipeline: the bound program and
/// state objects, plus the render pass it runs in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineQuery {
    pub program: ObjectId,
    pub rasterizer: ObjectId,
    pub color_blend: ObjectId,
    pub input_assembly: ObjectId,
    pub vertex_input: ObjectId,
    pub depth_stencil: ObjectId,
    pub render_pass: RenderPassQuery,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Map from a query to a native handle, created once per distinct query.
pub struct ObjectCache<K, V> {
    map: FastHashMap<K, V>,
    stats: CacheStats,
}

pub type RenderPassCache<A> = ObjectCache<RenderPassQuery, <A as hal::Api>::RenderPass>;
pub type PipelineCache<A> = ObjectCache<PipelineQuery, <A as hal::Api>::RenderPipeline>;

impl<K: Eq + Hash + Clone + fmt::Debug, V: Copy> ObjectCache<K, V> {
    pub fn new() -> Self {
        Self {
            map: FastHashMap::default(),
            stats: CacheStats::default(),
        }
    }

    /// Returns the handle for `query`, calling `create` on a miss.
    ///
    /// A failed creation leaves the cache untouched, so the next lookup
    /// of the same query tries again.
    pub fn get_or_create<E>(
        &mut self,
        query: &K,
        create: impl FnOnce(&K) -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(&value) = self.map.get(query) {
            self.stats.hits += 1;
            return Ok(value);
        }
        log::trace!("Cache miss for {:?}", query);
        let value = create(query)?;
        self.stats.misses += 1;
        self.map.insert(query.clone(), value);
        Ok(value)
    }

    pub fn get(&self, query: &K) -> Option<V> {
        self.map.get(query).cloned()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Removes every entry, yielding the handles for destruction.
    pub fn drain(&mut self) -> impl Iterator<Item = (K, V)> + '_ {
        self.map.drain()
    }
}

impl<K, V> fmt::Debug for ObjectCache<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("ObjectCache")
            .field("len", &self.map.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::id::IdentityManager;

    fn color(format: Format) -> AttachmentKey {
        AttachmentKey {
            format,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
        }
    }

    fn pipeline_query(ids: &IdentityManager, render_pass: RenderPassQuery) -> PipelineQuery {
        let id = ids.alloc();
        PipelineQuery {
            program: id,
            rasterizer: id,
            color_blend: id,
            input_assembly: id,
            vertex_input: id,
            depth_stencil: id,
            render_pass,
        }
    }

    #[test]
    fn equal_queries_share_a_handle() {
        let mut cache = ObjectCache::<RenderPassQuery, u32>::new();
        let mut next = 0;
        let mut create = |_: &RenderPassQuery| -> Result<u32, ()> {
            next += 1;
            Ok(next)
        };

        let mut a = RenderPassQuery::new();
        a.set_color(0, color(Format::Rgba8Unorm));
        let mut b = RenderPassQuery::new();
        b.set_color(0, color(Format::Bgra8Unorm));

        let first = cache.get_or_create(&a, &mut create).unwrap();
        let second = cache.get_or_create(&b, &mut create).unwrap();
        let again = cache.get_or_create(&a.clone(), &mut create).unwrap();

        assert_eq!(first, again);
        assert_ne!(first, second);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 2 });
    }

    #[test]
    fn vacant_slot_contents_are_ignored() {
        let mut a = RenderPassQuery::new();
        a.set_color(1, color(Format::R8Unorm));
        let mut b = RenderPassQuery::new();
        b.colors[0] = color(Format::Rgba32Float);
        b.set_color(1, color(Format::R8Unorm));
        assert_eq!(a, b);

        let mut cache = ObjectCache::<RenderPassQuery, u32>::new();
        cache.get_or_create(&a, |_| Ok::<_, ()>(7)).unwrap();
        assert_eq!(cache.get(&b), Some(7));
    }

    #[test]
    fn mask_difference_is_a_distinct_key() {
        let ids = IdentityManager::new();
        let mut narrow = RenderPassQuery::new();
        narrow.set_color(0, color(Format::Rgba8Unorm));
        // Same slot contents, one more populated slot.
        let mut wide = narrow;
        wide.set_color(1, AttachmentKey::VACANT);
        assert_eq!(narrow.colors[1], wide.colors[1]);
        assert_ne!(narrow, wide);

        let mut a = pipeline_query(&ids, narrow);
        let mut b = a;
        b.render_pass = wide;
        assert_ne!(a, b);

        let mut cache = ObjectCache::<PipelineQuery, u32>::new();
        let first = cache.get_or_create(&a, |_| Ok::<_, ()>(1)).unwrap();
        let second = cache.get_or_create(&b, |_| Ok::<_, ()>(2)).unwrap();
        assert_ne!(first, second);

        a.render_pass = wide;
        assert_eq!(cache.get(&a), Some(2));
    }

    #[test]
    fn failed_creation_does_not_poison() {
        let mut cache = ObjectCache::<RenderPassQuery, u32>::new();
        let query = RenderPassQuery::new();
        assert_eq!(cache.get_or_create(&query, |_| Err("oom")), Err("oom"));
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_create(&query, |_| Ok::<_, &str>(3)), Ok(3));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn color_slots_stop_at_last_populated() {
        let mut query = RenderPassQuery::new();
        assert!(query.color_slots().is_empty());
        query.set_color(2, color(Format::Rgba8Unorm));
        let slots = query.color_slots();
        assert_eq!(slots.len(), 3);
        assert!(slots[0].is_none() && slots[1].is_none());
        assert_eq!(slots[2], Some(color(Format::Rgba8Unorm)));
        assert_eq!(query.color_count(), 1);
    }
}

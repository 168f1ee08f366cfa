/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

/*! Resource state trackers.

Every texture used on a queue gets a [`RectTracker`] over its
mip level × array layer grid. Transitioning a subresource range
produces one pending transition per region whose prior state has to
be synchronized with the new one.

A transition between two identical states is skipped, unless the state
writes: write-after-write still needs a barrier.
*/

pub mod rect;

use crate::{
    hal, resource::Texture, FastHashMap, ObjectId, SubresourceRange, TextureState,
};

use smallvec::SmallVec;

use std::{
    ops::Range,
    sync::{Arc, Weak},
};

use self::rect::{RectBounds, RectTracker};

/// A barrier the queue has to record before the new state is used.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingTransition {
    pub range: SubresourceRange,
    pub state: Range<TextureState>,
}

impl PendingTransition {
    pub(crate) fn into_hal<'a, A: hal::Api>(
        self,
        texture: &'a Texture<A>,
    ) -> hal::TextureBarrier<'a, A> {
        hal::TextureBarrier {
            texture: &texture.raw,
            range: self.range,
            state: self.state,
        }
    }
}

fn needs_barrier(from: &TextureState, to: &TextureState) -> bool {
    from != to || to.is_write()
}

#[derive(Debug)]
struct TrackedTexture<A: hal::Api> {
    texture: Weak<Texture<A>>,
    rects: RectTracker<TextureState>,
}

/// Subresource states of the textures used on one queue.
#[derive(Debug)]
pub(crate) struct TextureTracker<A: hal::Api> {
    textures: FastHashMap<ObjectId, TrackedTexture<A>>,
    validate: bool,
}

impl<A: hal::Api> TextureTracker<A> {
    pub fn new(validate: bool) -> Self {
        Self {
            textures: FastHashMap::default(),
            validate,
        }
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// Starts tracking `texture`, with every subresource undefined.
    fn track(&mut self, texture: &Arc<Texture<A>>) -> &mut TrackedTexture<A> {
        self.textures
            .entry(texture.id())
            .or_insert_with(|| TrackedTexture {
                texture: Arc::downgrade(texture),
                rects: RectTracker::new(
                    texture.mip_level_count(),
                    texture.array_layer_count(),
                    TextureState::UNDEFINED,
                ),
            })
    }

    /// Registers a texture claimed by the owning queue, so that the claim
    /// is released with the tracker.
    pub fn insert(&mut self, texture: &Arc<Texture<A>>) {
        self.track(texture);
    }

    /// Moves `range` of `texture` into `state`, returning the barriers needed.
    pub fn transition(
        &mut self,
        texture: &Arc<Texture<A>>,
        range: &SubresourceRange,
        state: TextureState,
    ) -> SmallVec<[PendingTransition; 2]> {
        let mut pending = SmallVec::new();
        if range.mip_levels.start >= range.mip_levels.end
            || range.array_layers.start >= range.array_layers.end
        {
            return pending;
        }

        let validate = self.validate;
        let tracked = self.track(texture);
        let aspects = texture.aspects();
        tracked
            .rects
            .transition(RectBounds::from_range(range), state, |bounds, prior| {
                if needs_barrier(&prior, &state) {
                    pending.push(PendingTransition {
                        range: bounds.to_range(aspects),
                        state: prior..state,
                    });
                }
            });

        if validate {
            if let Err(err) = tracked.rects.check_partition() {
                panic!("State tracker of {:?} is corrupted: {}", texture.id(), err);
            }
        }
        log::trace!(
            "Texture {:?} {:?} -> {:?}: {} barriers",
            texture.id(),
            range,
            state,
            pending.len()
        );
        pending
    }

    /// Current state of `range`, if it is uniform and tracked.
    pub fn query(&self, id: ObjectId, range: &SubresourceRange) -> Option<TextureState> {
        let tracked = self.textures.get(&id)?;
        tracked.rects.query(&RectBounds::from_range(range))
    }

    /// Forgets the textures that were dropped by the application.
    pub fn prune(&mut self) -> usize {
        let before = self.textures.len();
        self.textures
            .retain(|_, tracked| tracked.texture.strong_count() != 0);
        before - self.textures.len()
    }

    /// Gives up the ownership of all the tracked textures.
    pub fn release_claims(&self, queue: ObjectId) {
        for tracked in self.textures.values() {
            if let Some(texture) = tracked.texture.upgrade() {
                texture.release(queue);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{hal::empty, id::IdentityManager, Extent, Format, TextureDescriptor};

    fn texture(ids: &IdentityManager, mips: u32, layers: u32) -> Arc<Texture<empty::Api>> {
        let device = empty::Device::new();
        Arc::new(Texture::new(
            device.create_resource(),
            ids.alloc(),
            &TextureDescriptor {
                label: None,
                extent: Extent {
                    width: 64,
                    height: 64,
                },
                mip_level_count: mips,
                array_layer_count: layers,
                format: Format::Rgba8Unorm,
            },
        ))
    }

    #[test]
    fn read_after_read_is_free() {
        let ids = IdentityManager::new();
        let tex = texture(&ids, 1, 1);
        let mut tracker = TextureTracker::new(true);
        let range = tex.full_range();

        let first = tracker.transition(&tex, &range, TextureState::SHADER_READ);
        assert_eq!(first.len(), 1);
        assert_eq!(
            first[0].state,
            TextureState::UNDEFINED..TextureState::SHADER_READ
        );
        assert!(tracker
            .transition(&tex, &range, TextureState::SHADER_READ)
            .is_empty());
    }

    #[test]
    fn write_after_write_needs_barrier() {
        let ids = IdentityManager::new();
        let tex = texture(&ids, 1, 1);
        let mut tracker = TextureTracker::new(true);
        let range = tex.full_range();

        tracker.transition(&tex, &range, TextureState::COLOR_ATTACHMENT);
        let second = tracker.transition(&tex, &range, TextureState::COLOR_ATTACHMENT);
        assert_eq!(
            second.as_slice(),
            &[PendingTransition {
                range: range.clone(),
                state: TextureState::COLOR_ATTACHMENT..TextureState::COLOR_ATTACHMENT,
            }]
        );
    }

    #[test]
    fn partial_ranges_split_barriers() {
        let ids = IdentityManager::new();
        let tex = texture(&ids, 4, 2);
        let mut tracker = TextureTracker::new(true);

        let level_one = SubresourceRange {
            aspects: tex.aspects(),
            mip_levels: 1..2,
            array_layers: 0..2,
        };
        tracker.transition(&tex, &level_one, TextureState::TRANSFER_DST);
        let all = tracker.transition(&tex, &tex.full_range(), TextureState::SHADER_READ);
        // level 1 comes from TRANSFER_DST, levels 0 and 2..4 from UNDEFINED
        assert_eq!(all.len(), 3);
        assert_eq!(
            tracker.query(tex.id(), &tex.full_range()),
            Some(TextureState::SHADER_READ)
        );
    }

    #[test]
    fn dropped_textures_are_pruned() {
        let ids = IdentityManager::new();
        let tex = texture(&ids, 1, 1);
        let mut tracker = TextureTracker::new(false);
        tracker.transition(&tex, &tex.full_range(), TextureState::COLOR_ATTACHMENT);
        assert_eq!(tracker.prune(), 0);
        drop(tex);
        assert_eq!(tracker.prune(), 1);
        assert_eq!(tracker.len(), 0);
    }
}

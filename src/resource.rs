/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Resources wrapping native handles supplied by the application.
//!
//! Native objects are adopted, not created: the wrappers never destroy
//! them. They carry the identity used by the trackers and the metadata
//! the queue needs to derive barriers and framebuffers.

use crate::{
    hal, id::ObjectId, Extent, Format, FormatAspects, SubresourceRange, TextureDescriptor,
    TextureViewDescriptor,
};

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

const UNCLAIMED: u64 = 0;

#[derive(Debug)]
pub struct Texture<A: hal::Api> {
    pub(crate) raw: A::Texture,
    pub(crate) id: ObjectId,
    label: Option<String>,
    extent: Extent,
    mip_level_count: u32,
    array_layer_count: u32,
    format: Format,
    /// Queue that submitted work touching this texture, if any.
    owner: AtomicU64,
}

impl<A: hal::Api> Texture<A> {
    pub(crate) fn new(raw: A::Texture, id: ObjectId, desc: &TextureDescriptor) -> Self {
        Self {
            raw,
            id,
            label: desc.label.map(str::to_string),
            extent: desc.extent,
            mip_level_count: desc.mip_level_count.max(1),
            array_layer_count: desc.array_layer_count.max(1),
            format: desc.format,
            owner: AtomicU64::new(UNCLAIMED),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn raw(&self) -> &A::Texture {
        &self.raw
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn aspects(&self) -> FormatAspects {
        self.format.aspects()
    }

    pub fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }

    pub fn array_layer_count(&self) -> u32 {
        self.array_layer_count
    }

    /// Range covering every subresource of the texture.
    pub fn full_range(&self) -> SubresourceRange {
        SubresourceRange {
            aspects: self.aspects(),
            mip_levels: 0..self.mip_level_count,
            array_layers: 0..self.array_layer_count,
        }
    }

    /// Marks the texture as used by `queue`, returning true if it was unclaimed.
    ///
    /// Returns the current owner if another queue already claimed it.
    pub(crate) fn claim(&self, queue: ObjectId) -> Result<bool, u64> {
        match self.owner.compare_exchange(
            UNCLAIMED,
            queue.raw(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(true),
            Err(owner) if owner == queue.raw() => Ok(false),
            Err(owner) => Err(owner),
        }
    }

    pub(crate) fn release(&self, queue: ObjectId) {
        let _ = self.owner.compare_exchange(
            queue.raw(),
            UNCLAIMED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

#[derive(Debug)]
pub struct TextureView<A: hal::Api> {
    pub(crate) raw: A::TextureView,
    pub(crate) id: ObjectId,
    texture: Arc<Texture<A>>,
    format: Format,
    range: SubresourceRange,
    extent: Extent,
}

impl<A: hal::Api> TextureView<A> {
    /// Resolves the defaulted parts of `desc` against `texture`.
    pub(crate) fn new(
        raw: A::TextureView,
        id: ObjectId,
        texture: &Arc<Texture<A>>,
        desc: &TextureViewDescriptor,
    ) -> Self {
        let format = desc.format.unwrap_or_else(|| texture.format());
        let aspects = if desc.aspects.is_empty() {
            format.aspects()
        } else {
            desc.aspects & texture.aspects()
        };
        let mip_end = match desc.mip_level_count {
            Some(count) => desc.base_mip_level + count,
            None => texture.mip_level_count(),
        };
        let layer_end = match desc.array_layer_count {
            Some(count) => desc.base_array_layer + count,
            None => texture.array_layer_count(),
        };
        Self {
            raw,
            id,
            texture: Arc::clone(texture),
            format,
            range: SubresourceRange {
                aspects,
                mip_levels: desc.base_mip_level..mip_end,
                array_layers: desc.base_array_layer..layer_end,
            },
            extent: texture.extent().at_mip_level(desc.base_mip_level),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn raw(&self) -> &A::TextureView {
        &self.raw
    }

    pub fn texture(&self) -> &Arc<Texture<A>> {
        &self.texture
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn aspects(&self) -> FormatAspects {
        self.range.aspects
    }

    pub fn range(&self) -> &SubresourceRange {
        &self.range
    }

    /// Size of the base mip level of the view.
    pub fn extent(&self) -> Extent {
        self.extent
    }
}

#[derive(Debug)]
pub struct Buffer<A: hal::Api> {
    pub(crate) raw: A::Buffer,
    pub(crate) id: ObjectId,
    size: u64,
}

impl<A: hal::Api> Buffer<A> {
    pub(crate) fn new(raw: A::Buffer, id: ObjectId, size: u64) -> Self {
        Self { raw, id, size }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn raw(&self) -> &A::Buffer {
        &self.raw
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// A populated set of shader-visible resources.
pub struct ResourceSet<A: hal::Api> {
    pub(crate) raw: A::ResourceSet,
    pub(crate) id: ObjectId,
}

impl<A: hal::Api> ResourceSet<A> {
    pub(crate) fn new(raw: A::ResourceSet, id: ObjectId) -> Self {
        Self { raw, id }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn raw(&self) -> &A::ResourceSet {
        &self.raw
    }
}

impl<A: hal::Api> fmt::Debug for ResourceSet<A> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "ResourceSet({:?})", self.id)
    }
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

/*! Portable GPU command recording and translation.
 *
 *  Rendering work is recorded into a [`CommandList`] without touching the
 *  GPU. A [`Queue`] later interprets the list against a backend selected at
 *  compile time through the [`hal::Api`] trait:
 *  - Recording is allocation-free per command: records live in reusable
 *    arena chunks.
 *  - Native render passes and pipelines are created lazily and cached by
 *    value-typed queries, so repeated state is free.
 *  - Barriers are derived per subresource region by a rectangle tracker.
 *  - Native objects are reclaimed through an epoch-based deletion queue,
 *    only after the GPU work that could reference them has retired.
 */

#![allow(
    // We don't use syntax sugar where it's not necessary.
    clippy::match_like_matches_macro,
    // Redundant matching is more explicit.
    clippy::redundant_pattern_matching,
    // Explicit lifetimes are often easier to reason about.
    clippy::needless_lifetimes,
    // No need for defaults in the internal types.
    clippy::new_without_default,
    // Backend entry points are unsafe by contract, not by body.
    clippy::missing_safety_doc,
)]
#![warn(
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_qualifications,
    // We don't match on a reference, unless required.
    clippy::pattern_type_mismatch,
)]

#[macro_use]
mod macros;

mod arena;
pub mod cache;
pub mod command;
pub mod device;
pub mod hal;
mod id;
pub mod resource;
pub mod state;
pub mod track;
mod types;

pub use crate::{
    arena::{Arena, Handle},
    cache::{
        AttachmentKey, CacheStats, DepthStencilKey, ObjectCache, PipelineQuery, RenderPassQuery,
    },
    command::{
        ColorAttachment, Command, CommandList, DepthStencilAttachment, RenderPassDescriptor,
        RenderPassEncoder,
    },
    device::{
        life::{DeletionQueue, Epoch},
        queue::{Queue, QueueError},
        Device, DeviceDescriptor, DeviceFlags,
    },
    id::ObjectId,
    resource::{Buffer, ResourceSet, Texture, TextureView},
    state::{
        ColorBlendState, DefaultStates, DepthStencilState, InputAssemblyState, ProgrammableStage,
        RasterizerState, ShaderProgram, ShaderProgramDescriptor, VertexInputState,
    },
    track::rect::{RectBounds, RectTracker, StateRect},
    types::*,
};

pub const MAX_COLOR_ATTACHMENTS: usize = 8;
pub const MAX_VERTEX_BUFFERS: usize = 16;
pub const MAX_RESOURCE_SETS: usize = 4;

/// Number of command records carved out of one arena chunk by default.
pub const DEFAULT_CHUNK_CAPACITY: usize = 256;

pub type Label<'a> = Option<&'a str>;

type FastHashMap<K, V> = fxhash::FxHashMap<K, V>;

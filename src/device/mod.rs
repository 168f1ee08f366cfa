/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::{
    cache::{CacheStats, PipelineCache, RenderPassCache},
    command::CommandList,
    hal::{self, DeviceError},
    id::IdentityManager,
    resource::{Buffer, ResourceSet, Texture, TextureView},
    state::{
        ColorBlendState, DefaultStates, DepthStencilState, InputAssemblyState, RasterizerState,
        ShaderProgram, ShaderProgramDescriptor, VertexInputState,
    },
    ColorBlendDescriptor, DepthStencilDescriptor, InputAssemblyDescriptor, Label,
    RasterizerDescriptor, TextureDescriptor, TextureViewDescriptor, VertexInputDescriptor,
    DEFAULT_CHUNK_CAPACITY,
};

use bitflags::bitflags;
use parking_lot::Mutex;

use std::{fmt, sync::Arc};

pub mod life;
pub mod queue;

use self::{
    life::{Epoch, LifeTracker},
    queue::Queue,
};

bitflags!(
    /// Debugging behavior of a device.
    pub struct DeviceFlags: u32 {
        /// Check the partition of every texture state tracker after each transition.
        const VALIDATE_TRACKERS = 1 << 0;
    }
);

impl DeviceFlags {
    /// Flags matching the build configuration: validation in debug builds.
    pub fn from_build_config() -> Self {
        if cfg!(debug_assertions) {
            Self::VALIDATE_TRACKERS
        } else {
            Self::empty()
        }
    }
}

#[derive(Clone, Debug)]
pub struct DeviceDescriptor<'a> {
    pub label: Label<'a>,
    pub flags: DeviceFlags,
    /// Number of records per arena chunk of the command lists.
    pub command_chunk_capacity: usize,
}

impl Default for DeviceDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            flags: DeviceFlags::from_build_config(),
            command_chunk_capacity: DEFAULT_CHUNK_CAPACITY,
        }
    }
}

/// Device state shared with the queues.
pub(crate) struct DeviceShared<A: hal::Api> {
    pub raw: A::Device,
    pub render_passes: Mutex<RenderPassCache<A>>,
    pub pipelines: Mutex<PipelineCache<A>>,
    // Never locked while one of the caches is.
    pub life: Mutex<LifeTracker<A>>,
    pub defaults: Arc<DefaultStates>,
    pub ids: IdentityManager,
    pub flags: DeviceFlags,
    pub chunk_capacity: usize,
    pub label: Option<String>,
}

impl<A: hal::Api> Drop for DeviceShared<A> {
    fn drop(&mut self) {
        let life = self.life.get_mut();
        for (_, pipeline) in self.pipelines.get_mut().drain() {
            life.schedule(move |raw| unsafe { hal::Device::destroy_render_pipeline(raw, pipeline) });
        }
        for (_, pass) in self.render_passes.get_mut().drain() {
            life.schedule(move |raw| unsafe { hal::Device::destroy_render_pass(raw, pass) });
        }
        let count = life.drain_all(&self.raw);
        log::debug!("Device {:?} destroyed, {} objects released", self.label, count);
    }
}

/// Owner of the caches, the deletion queue and the default states.
///
/// Queues keep the shared state alive, so native objects are only
/// released once the device and all of its queues are dropped.
pub struct Device<A: hal::Api> {
    shared: Arc<DeviceShared<A>>,
}

impl<A: hal::Api> Device<A> {
    pub fn new(raw: A::Device, desc: &DeviceDescriptor) -> Self {
        let ids = IdentityManager::new();
        let defaults = Arc::new(DefaultStates::new(&ids));
        log::debug!("Creating device {:?} with {:?}", desc.label, desc.flags);
        Self {
            shared: Arc::new(DeviceShared {
                raw,
                render_passes: Mutex::new(RenderPassCache::<A>::new()),
                pipelines: Mutex::new(PipelineCache::<A>::new()),
                life: Mutex::new(LifeTracker::new()),
                defaults,
                ids,
                flags: desc.flags,
                chunk_capacity: desc.command_chunk_capacity.max(1),
                label: desc.label.map(str::to_string),
            }),
        }
    }

    pub fn raw(&self) -> &A::Device {
        &self.shared.raw
    }

    pub fn flags(&self) -> DeviceFlags {
        self.shared.flags
    }

    pub fn create_command_list(&self, label: Label) -> CommandList<A> {
        CommandList::new(
            Arc::clone(&self.shared.defaults),
            self.shared.chunk_capacity,
            label,
        )
    }

    /// Wraps a native queue of this device into an execution engine.
    pub fn create_queue(&self, raw: A::Queue, label: Label) -> Result<Queue<A>, DeviceError> {
        Queue::new(Arc::clone(&self.shared), raw, label)
    }

    pub fn texture_from_raw(&self, raw: A::Texture, desc: &TextureDescriptor) -> Arc<Texture<A>> {
        Arc::new(Texture::new(raw, self.shared.ids.alloc(), desc))
    }

    pub fn texture_view_from_raw(
        &self,
        raw: A::TextureView,
        texture: &Arc<Texture<A>>,
        desc: &TextureViewDescriptor,
    ) -> Arc<TextureView<A>> {
        Arc::new(TextureView::new(raw, self.shared.ids.alloc(), texture, desc))
    }

    pub fn buffer_from_raw(&self, raw: A::Buffer, size: u64) -> Arc<Buffer<A>> {
        Arc::new(Buffer::new(raw, self.shared.ids.alloc(), size))
    }

    pub fn resource_set_from_raw(&self, raw: A::ResourceSet) -> Arc<ResourceSet<A>> {
        Arc::new(ResourceSet::new(raw, self.shared.ids.alloc()))
    }

    pub fn create_shader_program(
        &self,
        desc: ShaderProgramDescriptor<A>,
    ) -> Arc<ShaderProgram<A>> {
        Arc::new(ShaderProgram::new(self.shared.ids.alloc(), desc))
    }

    pub fn create_rasterizer_state(&self, desc: RasterizerDescriptor) -> Arc<RasterizerState> {
        Arc::new(RasterizerState::new(self.shared.ids.alloc(), desc))
    }

    pub fn create_color_blend_state(&self, desc: ColorBlendDescriptor) -> Arc<ColorBlendState> {
        Arc::new(ColorBlendState::new(self.shared.ids.alloc(), desc))
    }

    pub fn create_input_assembly_state(
        &self,
        desc: InputAssemblyDescriptor,
    ) -> Arc<InputAssemblyState> {
        Arc::new(InputAssemblyState::new(self.shared.ids.alloc(), desc))
    }

    pub fn create_vertex_input_state(&self, desc: VertexInputDescriptor) -> Arc<VertexInputState> {
        Arc::new(VertexInputState::new(self.shared.ids.alloc(), desc))
    }

    pub fn create_depth_stencil_state(
        &self,
        desc: DepthStencilDescriptor,
    ) -> Arc<DepthStencilState> {
        Arc::new(DepthStencilState::new(self.shared.ids.alloc(), desc))
    }

    /// States bound at the start of every render pass.
    pub fn default_states(&self) -> &Arc<DefaultStates> {
        &self.shared.defaults
    }

    pub fn render_pass_cache_stats(&self) -> CacheStats {
        self.shared.render_passes.lock().stats()
    }

    pub fn pipeline_cache_stats(&self) -> CacheStats {
        self.shared.pipelines.lock().stats()
    }

    pub fn current_epoch(&self) -> Epoch {
        self.shared.life.lock().current_epoch()
    }

    pub fn pending_deletions(&self) -> usize {
        self.shared.life.lock().pending()
    }

    /// Defers `action` until no queue can still be using objects
    /// referenced by work recorded so far.
    pub fn schedule_deletion(&self, action: impl FnOnce(&A::Device) + Send + 'static) {
        self.shared.life.lock().schedule(action);
    }

    /// Runs the deletions whose epoch has retired on every queue.
    pub fn maintain(&self) -> usize {
        self.shared.life.lock().maintain(&self.shared.raw)
    }
}

impl<A: hal::Api> fmt::Debug for Device<A> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("Device")
            .field("label", &self.shared.label)
            .field("flags", &self.shared.flags)
            .finish()
    }
}

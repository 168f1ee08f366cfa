/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Backend that performs no GPU work.
//!
//! Every object is a sequential [`Resource`] handle, and every call that
//! reaches the backend is appended to a journal shared by the device, its
//! queues and its encoders. Creation failures can be injected to exercise
//! error paths.

use crate::{Extent, IndexFormat, Rect, SubresourceRange, TextureState};

use parking_lot::Mutex;

use std::{
    ops::Range,
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering},
        Arc,
    },
};

type DeviceResult<T> = Result<T, super::DeviceError>;

#[derive(Clone, Debug)]
pub struct Api;

/// An opaque sequential handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Resource(u64);

impl Resource {
    pub fn index(self) -> u64 {
        self.0
    }
}

/// A call that reached the backend.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CreateRenderPass(Resource),
    DestroyRenderPass(Resource),
    CreateFramebuffer(Resource),
    DestroyFramebuffer(Resource),
    CreateRenderPipeline(Resource),
    DestroyRenderPipeline(Resource),
    BeginEncoding,
    EndEncoding,
    Barrier {
        texture: Resource,
        range: SubresourceRange,
        state: Range<TextureState>,
    },
    BeginRenderPass {
        render_pass: Resource,
        framebuffer: Resource,
        extent: Extent,
    },
    EndRenderPass,
    SetRenderPipeline(Resource),
    SetResourceSet {
        index: u32,
        set: Resource,
    },
    SetVertexBuffer {
        index: u32,
        buffer: Resource,
        offset: u64,
    },
    SetIndexBuffer {
        buffer: Resource,
        offset: u64,
        format: IndexFormat,
    },
    SetViewport(Rect<f32>),
    SetScissor(Rect<u32>),
    Draw {
        start_vertex: u32,
        vertex_count: u32,
        start_instance: u32,
        instance_count: u32,
    },
    DrawIndexed {
        start_index: u32,
        index_count: u32,
        base_vertex: i32,
        start_instance: u32,
        instance_count: u32,
    },
    Submit,
    Wait,
}

#[derive(Debug)]
struct Shared {
    next_resource: AtomicU64,
    journal: Mutex<Vec<Call>>,
    failing_pipelines: AtomicU32,
    failing_render_passes: AtomicU32,
    failing_submissions: AtomicU32,
}

impl Shared {
    fn record(&self, call: Call) {
        self.journal.lock().push(call);
    }

    fn alloc(&self) -> Resource {
        Resource(self.next_resource.fetch_add(1, Ordering::Relaxed))
    }

    fn should_fail(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Cloning shares the journal and the handle counter.
#[derive(Clone, Debug)]
pub struct Device {
    shared: Arc<Shared>,
}

#[derive(Debug)]
pub struct Queue {
    shared: Arc<Shared>,
}

#[derive(Debug)]
pub struct Encoder {
    shared: Arc<Shared>,
}

impl Device {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                next_resource: AtomicU64::new(1),
                journal: Mutex::new(Vec::new()),
                failing_pipelines: AtomicU32::new(0),
                failing_render_passes: AtomicU32::new(0),
                failing_submissions: AtomicU32::new(0),
            }),
        }
    }

    /// Hands out a fresh handle, usable as any kind of native object.
    pub fn create_resource(&self) -> Resource {
        self.shared.alloc()
    }

    pub fn create_queue(&self) -> Queue {
        Queue {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Returns a copy of every call recorded so far.
    pub fn journal(&self) -> Vec<Call> {
        self.shared.journal.lock().clone()
    }

    /// Returns the calls recorded so far and starts a fresh journal.
    pub fn take_journal(&self) -> Vec<Call> {
        std::mem::take(&mut *self.shared.journal.lock())
    }

    /// Makes the next `count` pipeline creations fail with an out-of-memory error.
    pub fn fail_next_pipelines(&self, count: u32) {
        self.shared
            .failing_pipelines
            .store(count, Ordering::Relaxed);
    }

    /// Makes the next `count` render pass creations fail with an out-of-memory error.
    pub fn fail_next_render_passes(&self, count: u32) {
        self.shared
            .failing_render_passes
            .store(count, Ordering::Relaxed);
    }

    /// Makes the next `count` queue submissions fail as if the device was lost.
    pub fn fail_next_submissions(&self, count: u32) {
        self.shared
            .failing_submissions
            .store(count, Ordering::Relaxed);
    }
}

impl super::Api for Api {
    type Device = Device;
    type Queue = Queue;
    type CommandEncoder = Encoder;
    type CommandBuffer = Resource;
    type Fence = Resource;

    type Buffer = Resource;
    type Texture = Resource;
    type TextureView = Resource;
    type ResourceSet = Resource;
    type ShaderModule = Resource;
    type PipelineLayout = Resource;

    type RenderPass = Resource;
    type RenderPipeline = Resource;
    type Framebuffer = Resource;
}

impl super::Device<Api> for Device {
    unsafe fn create_render_pass(
        &self,
        _desc: &super::RenderPassDescriptor,
    ) -> DeviceResult<Resource> {
        if Shared::should_fail(&self.shared.failing_render_passes) {
            return Err(super::DeviceError::OutOfMemory);
        }
        let pass = self.shared.alloc();
        self.shared.record(Call::CreateRenderPass(pass));
        Ok(pass)
    }
    unsafe fn destroy_render_pass(&self, pass: Resource) {
        self.shared.record(Call::DestroyRenderPass(pass));
    }

    unsafe fn create_framebuffer(
        &self,
        _desc: &super::FramebufferDescriptor<Api>,
    ) -> DeviceResult<Resource> {
        let framebuffer = self.shared.alloc();
        self.shared.record(Call::CreateFramebuffer(framebuffer));
        Ok(framebuffer)
    }
    unsafe fn destroy_framebuffer(&self, framebuffer: Resource) {
        self.shared.record(Call::DestroyFramebuffer(framebuffer));
    }

    unsafe fn create_render_pipeline(
        &self,
        _desc: &super::RenderPipelineDescriptor<Api>,
    ) -> Result<Resource, super::PipelineError> {
        if Shared::should_fail(&self.shared.failing_pipelines) {
            return Err(super::DeviceError::OutOfMemory.into());
        }
        let pipeline = self.shared.alloc();
        self.shared.record(Call::CreateRenderPipeline(pipeline));
        Ok(pipeline)
    }
    unsafe fn destroy_render_pipeline(&self, pipeline: Resource) {
        self.shared.record(Call::DestroyRenderPipeline(pipeline));
    }

    unsafe fn create_command_encoder(
        &self,
        _desc: &super::CommandEncoderDescriptor<Api>,
    ) -> DeviceResult<Encoder> {
        Ok(Encoder {
            shared: Arc::clone(&self.shared),
        })
    }
    unsafe fn destroy_command_encoder(&self, _encoder: Encoder) {}

    unsafe fn create_fence(&self) -> DeviceResult<Resource> {
        Ok(self.shared.alloc())
    }
    unsafe fn destroy_fence(&self, _fence: Resource) {}
    unsafe fn wait(&self, _fence: &Resource) -> DeviceResult<()> {
        self.shared.record(Call::Wait);
        Ok(())
    }
}

impl super::Queue<Api> for Queue {
    unsafe fn submit(
        &mut self,
        _command_buffer: &Resource,
        _fence: &mut Resource,
    ) -> DeviceResult<()> {
        if Shared::should_fail(&self.shared.failing_submissions) {
            return Err(super::DeviceError::Lost);
        }
        self.shared.record(Call::Submit);
        Ok(())
    }
}

impl super::CommandEncoder<Api> for Encoder {
    unsafe fn begin_encoding(&mut self, _label: crate::Label) -> DeviceResult<()> {
        self.shared.record(Call::BeginEncoding);
        Ok(())
    }
    unsafe fn end_encoding(&mut self) -> DeviceResult<Resource> {
        self.shared.record(Call::EndEncoding);
        Ok(self.shared.alloc())
    }
    unsafe fn reset_all<I>(&mut self, _command_buffers: I)
    where
        I: Iterator<Item = Resource>,
    {
    }

    unsafe fn transition_textures<'a, T>(&mut self, barriers: T)
    where
        T: Iterator<Item = super::TextureBarrier<'a, Api>>,
    {
        for barrier in barriers {
            self.shared.record(Call::Barrier {
                texture: *barrier.texture,
                range: barrier.range,
                state: barrier.state,
            });
        }
    }

    unsafe fn begin_render_pass(&mut self, desc: &super::RenderPassBegin<Api>) {
        self.shared.record(Call::BeginRenderPass {
            render_pass: *desc.render_pass,
            framebuffer: *desc.framebuffer,
            extent: desc.extent,
        });
    }
    unsafe fn end_render_pass(&mut self) {
        self.shared.record(Call::EndRenderPass);
    }

    unsafe fn set_render_pipeline(&mut self, pipeline: &Resource) {
        self.shared.record(Call::SetRenderPipeline(*pipeline));
    }

    unsafe fn set_resource_set(&mut self, _layout: &Resource, index: u32, set: &Resource) {
        self.shared
            .record(Call::SetResourceSet { index, set: *set });
    }

    unsafe fn set_index_buffer<'a>(
        &mut self,
        binding: super::BufferBinding<'a, Api>,
        format: IndexFormat,
    ) {
        self.shared.record(Call::SetIndexBuffer {
            buffer: *binding.buffer,
            offset: binding.offset,
            format,
        });
    }
    unsafe fn set_vertex_buffer<'a>(&mut self, index: u32, binding: super::BufferBinding<'a, Api>) {
        self.shared.record(Call::SetVertexBuffer {
            index,
            buffer: *binding.buffer,
            offset: binding.offset,
        });
    }
    unsafe fn set_viewport(&mut self, rect: &Rect<f32>, _depth_range: Range<f32>) {
        self.shared.record(Call::SetViewport(*rect));
    }
    unsafe fn set_scissor_rect(&mut self, rect: &Rect<u32>) {
        self.shared.record(Call::SetScissor(*rect));
    }

    unsafe fn draw(
        &mut self,
        start_vertex: u32,
        vertex_count: u32,
        start_instance: u32,
        instance_count: u32,
    ) {
        self.shared.record(Call::Draw {
            start_vertex,
            vertex_count,
            start_instance,
            instance_count,
        });
    }
    unsafe fn draw_indexed(
        &mut self,
        start_index: u32,
        index_count: u32,
        base_vertex: i32,
        start_instance: u32,
        instance_count: u32,
    ) {
        self.shared.record(Call::DrawIndexed {
            start_index,
            index_count,
            base_vertex,
            start_instance,
            instance_count,
        });
    }
}

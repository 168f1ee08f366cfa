/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

/*! Backend contract.
 *
 *  The translation core only talks to the GPU through these traits:
 *  - Fully unsafe: zero overhead, zero validation.
 *  - Compile-time backend selection via the [`Api`] trait.
 *  - Objects are passed by references and returned by value. No IDs.
 *  - Resource transitions are explicit.
 */

pub mod empty;
#[cfg(feature = "vulkan")]
pub mod vulkan;

use crate::{
    cache::{AttachmentKey, DepthStencilKey},
    ClearValue, ColorBlendDescriptor, DepthStencilDescriptor, Extent, IndexFormat,
    InputAssemblyDescriptor, Label, RasterizerDescriptor, Rect, SubresourceRange, TextureState,
    VertexInputDescriptor,
};

use thiserror::Error;

use std::{fmt, ops::Range};

#[derive(Clone, Debug, PartialEq, Error)]
pub enum DeviceError {
    #[error("out of memory")]
    OutOfMemory,
    #[error("device is lost")]
    Lost,
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum PipelineError {
    #[error("linkage failed for the {0} stage: {1}")]
    Linkage(&'static str, String),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

pub trait Api: Clone + fmt::Debug + Sized + 'static {
    type Device: Device<Self>;
    type Queue: Queue<Self>;
    type CommandEncoder: CommandEncoder<Self>;
    type CommandBuffer: fmt::Debug + Send + Sync;
    type Fence: fmt::Debug + Send + Sync;

    type Buffer: fmt::Debug + Send + Sync + 'static;
    type Texture: fmt::Debug + Send + Sync + 'static;
    type TextureView: fmt::Debug + Send + Sync + 'static;
    type ResourceSet: fmt::Debug + Send + Sync + 'static;
    type ShaderModule: fmt::Debug + Send + Sync + 'static;
    type PipelineLayout: fmt::Debug + Send + Sync + 'static;

    type RenderPass: Copy + fmt::Debug + PartialEq + Send + Sync + 'static;
    type RenderPipeline: Copy + fmt::Debug + PartialEq + Send + Sync + 'static;
    type Framebuffer: fmt::Debug + Send + Sync + 'static;
}

pub trait Device<A: Api>: Send + Sync + 'static {
    unsafe fn create_render_pass(
        &self,
        desc: &RenderPassDescriptor,
    ) -> Result<A::RenderPass, DeviceError>;
    unsafe fn destroy_render_pass(&self, pass: A::RenderPass);

    /// Creates a framebuffer compatible with `desc.render_pass`.
    ///
    /// Attachments are the populated colour slots in slot order,
    /// followed by the depth-stencil attachment.
    unsafe fn create_framebuffer(
        &self,
        desc: &FramebufferDescriptor<A>,
    ) -> Result<A::Framebuffer, DeviceError>;
    unsafe fn destroy_framebuffer(&self, framebuffer: A::Framebuffer);

    unsafe fn create_render_pipeline(
        &self,
        desc: &RenderPipelineDescriptor<A>,
    ) -> Result<A::RenderPipeline, PipelineError>;
    unsafe fn destroy_render_pipeline(&self, pipeline: A::RenderPipeline);

    unsafe fn create_command_encoder(
        &self,
        desc: &CommandEncoderDescriptor<A>,
    ) -> Result<A::CommandEncoder, DeviceError>;
    unsafe fn destroy_command_encoder(&self, encoder: A::CommandEncoder);

    unsafe fn create_fence(&self) -> Result<A::Fence, DeviceError>;
    unsafe fn destroy_fence(&self, fence: A::Fence);
    /// Blocks until the last submission signalling `fence` has completed.
    unsafe fn wait(&self, fence: &A::Fence) -> Result<(), DeviceError>;
}

pub trait Queue<A: Api>: Send {
    /// Submits a command buffer, arranging for `fence` to signal on completion.
    unsafe fn submit(
        &mut self,
        command_buffer: &A::CommandBuffer,
        fence: &mut A::Fence,
    ) -> Result<(), DeviceError>;
}

/// Encoder for commands in command buffers.
/// Serves as a parent for all the encoded command buffers.
/// Works in bursts of action: one or more command buffers are recorded,
/// then submitted to a queue, and then it needs to be `reset_all()`.
pub trait CommandEncoder<A: Api>: Send {
    /// Begin encoding a new command buffer.
    unsafe fn begin_encoding(&mut self, label: Label) -> Result<(), DeviceError>;
    /// Finish encoding and return the resulting command buffer.
    unsafe fn end_encoding(&mut self) -> Result<A::CommandBuffer, DeviceError>;
    /// Reclaims all resources that are allocated for this encoder.
    /// Must get all of the produced command buffers back,
    /// and they must not be used by GPU at this moment.
    unsafe fn reset_all<I>(&mut self, command_buffers: I)
    where
        I: Iterator<Item = A::CommandBuffer>;

    unsafe fn transition_textures<'a, T>(&mut self, barriers: T)
    where
        T: Iterator<Item = TextureBarrier<'a, A>>;

    // render passes

    unsafe fn begin_render_pass(&mut self, desc: &RenderPassBegin<A>);
    unsafe fn end_render_pass(&mut self);

    unsafe fn set_render_pipeline(&mut self, pipeline: &A::RenderPipeline);

    /// Sets the resource set at `index` to `set`, assuming the layout
    /// of all the preceeding sets to be taken from `layout`.
    unsafe fn set_resource_set(
        &mut self,
        layout: &A::PipelineLayout,
        index: u32,
        set: &A::ResourceSet,
    );

    unsafe fn set_index_buffer<'a>(&mut self, binding: BufferBinding<'a, A>, format: IndexFormat);
    unsafe fn set_vertex_buffer<'a>(&mut self, index: u32, binding: BufferBinding<'a, A>);
    unsafe fn set_viewport(&mut self, rect: &Rect<f32>, depth_range: Range<f32>);
    unsafe fn set_scissor_rect(&mut self, rect: &Rect<u32>);

    unsafe fn draw(
        &mut self,
        start_vertex: u32,
        vertex_count: u32,
        start_instance: u32,
        instance_count: u32,
    );
    unsafe fn draw_indexed(
        &mut self,
        start_index: u32,
        index_count: u32,
        base_vertex: i32,
        start_instance: u32,
        instance_count: u32,
    );
}

#[derive(Clone, Debug)]
pub struct RenderPassDescriptor<'a> {
    pub label: Label<'a>,
    /// Colour slots up to the last populated one. `None` marks an unused slot.
    pub color_attachments: &'a [Option<AttachmentKey>],
    pub depth_stencil_attachment: Option<&'a DepthStencilKey>,
}

#[derive(Debug)]
pub struct FramebufferDescriptor<'a, A: Api> {
    pub label: Label<'a>,
    pub render_pass: &'a A::RenderPass,
    pub attachments: &'a [&'a A::TextureView],
    pub extent: Extent,
}

#[derive(Debug)]
pub struct CommandEncoderDescriptor<'a, A: Api> {
    pub label: Label<'a>,
    pub queue: &'a A::Queue,
}

/// Describes a programmable pipeline stage.
#[derive(Debug)]
pub struct ProgrammableStage<'a, A: Api> {
    pub module: &'a A::ShaderModule,
    pub entry_point: &'a str,
}

// Rust gets confused about the impl requirements for `A`
impl<A: Api> Clone for ProgrammableStage<'_, A> {
    fn clone(&self) -> Self {
        Self {
            module: self.module,
            entry_point: self.entry_point,
        }
    }
}

/// Describes a render (graphics) pipeline, assembled from the state
/// objects bound at draw time.
#[derive(Debug)]
pub struct RenderPipelineDescriptor<'a, A: Api> {
    pub label: Label<'a>,
    /// The layout of resource sets for this pipeline.
    pub layout: &'a A::PipelineLayout,
    pub vertex_stage: ProgrammableStage<'a, A>,
    pub fragment_stage: Option<ProgrammableStage<'a, A>>,
    pub rasterizer: &'a RasterizerDescriptor,
    pub color_blend: &'a ColorBlendDescriptor,
    pub input_assembly: &'a InputAssemblyDescriptor,
    pub vertex_input: &'a VertexInputDescriptor,
    /// Only present when the render pass has a depth-stencil attachment.
    pub depth_stencil: Option<&'a DepthStencilDescriptor>,
    pub render_pass: &'a A::RenderPass,
}

#[derive(Debug)]
pub struct RenderPassBegin<'a, A: Api> {
    pub render_pass: &'a A::RenderPass,
    pub framebuffer: &'a A::Framebuffer,
    pub extent: Extent,
    /// One value per framebuffer attachment, in framebuffer order.
    pub clear_values: &'a [ClearValue],
}

#[derive(Debug)]
pub struct BufferBinding<'a, A: Api> {
    pub buffer: &'a A::Buffer,
    pub offset: u64,
}

// Rust gets confused about the impl requirements for `A`
impl<A: Api> Clone for BufferBinding<'_, A> {
    fn clone(&self) -> Self {
        Self {
            buffer: self.buffer,
            offset: self.offset,
        }
    }
}

#[derive(Debug)]
pub struct TextureBarrier<'a, A: Api> {
    pub texture: &'a A::Texture,
    pub range: SubresourceRange,
    pub state: Range<TextureState>,
}

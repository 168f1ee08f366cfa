/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::{
    cache::{PipelineQuery, RenderPassQuery},
    command::{Command, CommandList, RenderTargets},
    device::{DeviceFlags, DeviceShared},
    hal::{self, CommandEncoder as _, Device as _, DeviceError, PipelineError, Queue as _},
    id::ObjectId,
    resource::{ResourceSet, Texture},
    state::{
        ColorBlendState, DepthStencilState, InputAssemblyState, RasterizerState, ShaderProgram,
        VertexInputState,
    },
    track::TextureTracker,
    Label, Rect, SubresourceRange, TextureState, Viewport, MAX_COLOR_ATTACHMENTS,
    MAX_RESOURCE_SETS,
};

use arrayvec::ArrayVec;
use smallvec::SmallVec;
use thiserror::Error;

use std::{fmt, iter, mem::ManuallyDrop, sync::Arc};

#[derive(Clone, Debug, Error)]
pub enum QueueError {
    #[error("command list has recording errors or an unfinished render pass")]
    BadCommandList,
    #[error("texture {texture:?} is in use by another queue")]
    ForeignTexture { texture: ObjectId },
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Working state while a render pass is interpreted.
struct PassState<'a, A: hal::Api> {
    render_pass: A::RenderPass,
    query: RenderPassQuery,
    has_depth_stencil: bool,
    program: Option<&'a Arc<ShaderProgram<A>>>,
    rasterizer: Option<&'a Arc<RasterizerState>>,
    color_blend: Option<&'a Arc<ColorBlendState>>,
    input_assembly: Option<&'a Arc<InputAssemblyState>>,
    vertex_input: Option<&'a Arc<VertexInputState>>,
    depth_stencil: Option<&'a Arc<DepthStencilState>>,
    pipeline_dirty: bool,
    bound_pipeline: Option<A::RenderPipeline>,
    resource_sets: [Option<&'a Arc<ResourceSet<A>>>; MAX_RESOURCE_SETS],
    dirty_sets: u8,
}

impl<'a, A: hal::Api> PassState<'a, A> {
    fn new(render_pass: A::RenderPass, query: RenderPassQuery) -> Self {
        Self {
            render_pass,
            has_depth_stencil: query.depth_stencil().is_some(),
            query,
            program: None,
            rasterizer: None,
            color_blend: None,
            input_assembly: None,
            vertex_input: None,
            depth_stencil: None,
            pipeline_dirty: true,
            bound_pipeline: None,
            resource_sets: [None; MAX_RESOURCE_SETS],
            dirty_sets: 0,
        }
    }

    fn pipeline_query(&self) -> PipelineQuery {
        PipelineQuery {
            program: expect_state(self.program, "shader program").id(),
            rasterizer: expect_state(self.rasterizer, "rasterizer").id(),
            color_blend: expect_state(self.color_blend, "color blend").id(),
            input_assembly: expect_state(self.input_assembly, "input assembly").id(),
            vertex_input: expect_state(self.vertex_input, "vertex input").id(),
            depth_stencil: expect_state(self.depth_stencil, "depth stencil").id(),
            render_pass: self.query,
        }
    }
}

fn expect_state<T>(state: Option<T>, name: &str) -> T {
    match state {
        Some(state) => state,
        None => panic!("Draw without a {} state in a validated list", name),
    }
}

/// Interprets command lists into native command buffers.
///
/// Recording into the native encoder is always open: [`submit`](Self::submit)
/// appends to it, and [`flush`](Self::flush) hands it to the GPU, waits for
/// completion and starts the next one.
pub struct Queue<A: hal::Api> {
    device: Arc<DeviceShared<A>>,
    id: ObjectId,
    label: Option<String>,
    raw: A::Queue,
    encoder: ManuallyDrop<A::CommandEncoder>,
    fence: ManuallyDrop<A::Fence>,
    trackers: TextureTracker<A>,
    submissions: u64,
    /// Set once a flush fails. The native recording is gone at that point.
    lost: bool,
}

impl<A: hal::Api> Queue<A> {
    pub(crate) fn new(
        device: Arc<DeviceShared<A>>,
        raw: A::Queue,
        label: Label,
    ) -> Result<Self, DeviceError> {
        let mut encoder = unsafe {
            device
                .raw
                .create_command_encoder(&hal::CommandEncoderDescriptor { label, queue: &raw })?
        };
        let fence = match unsafe { device.raw.create_fence() } {
            Ok(fence) => fence,
            Err(err) => {
                unsafe { device.raw.destroy_command_encoder(encoder) };
                return Err(err);
            }
        };
        if let Err(err) = unsafe { encoder.begin_encoding(label) } {
            unsafe {
                device.raw.destroy_fence(fence);
                device.raw.destroy_command_encoder(encoder);
            }
            return Err(err);
        }

        let id = device.ids.alloc();
        device.life.lock().register_queue(id);
        log::debug!("Created queue {:?} ({:?})", id, label);
        let validate = device.flags.contains(DeviceFlags::VALIDATE_TRACKERS);
        Ok(Self {
            device,
            id,
            label: label.map(str::to_string),
            raw,
            encoder: ManuallyDrop::new(encoder),
            fence: ManuallyDrop::new(fence),
            trackers: TextureTracker::new(validate),
            submissions: 0,
            lost: false,
        })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Number of flushes performed so far.
    pub fn submission_count(&self) -> u64 {
        self.submissions
    }

    /// Returns true after a failed [`flush`](Self::flush). A lost queue
    /// rejects all further work.
    pub fn is_lost(&self) -> bool {
        self.lost
    }

    pub fn tracked_texture_count(&self) -> usize {
        self.trackers.len()
    }

    /// Last known state of `range`, if it is uniform and the texture
    /// was used on this queue.
    pub fn texture_state(
        &self,
        texture: &Texture<A>,
        range: &SubresourceRange,
    ) -> Option<TextureState> {
        self.trackers.query(texture.id(), range)
    }

    /// Takes ownership of every texture `list` touches.
    fn claim_textures(&mut self, list: &CommandList<A>) -> Result<(), QueueError> {
        let mut claimed = SmallVec::<[&Arc<Texture<A>>; 8]>::new();
        let mut result = Ok(());
        'outer: for command in list.iter() {
            let textures: SmallVec<[&Arc<Texture<A>>; 4]> = match *command {
                Command::BeginRenderPass(ref targets) => {
                    targets.views().map(|view| view.texture()).collect()
                }
                Command::TransitionTexture { ref texture, .. } => iter::once(texture).collect(),
                _ => continue,
            };
            for texture in textures {
                match texture.claim(self.id) {
                    Ok(true) => claimed.push(texture),
                    Ok(false) => {}
                    Err(owner) => {
                        log::warn!(
                            "Texture {:?} is owned by queue {}, not {:?}",
                            texture.id(),
                            owner,
                            self.id
                        );
                        result = Err(QueueError::ForeignTexture {
                            texture: texture.id(),
                        });
                        break 'outer;
                    }
                }
            }
        }
        for texture in claimed {
            match result {
                Ok(()) => self.trackers.insert(texture),
                Err(_) => texture.release(self.id),
            }
        }
        result
    }

    /// Translates `list` into the open native recording.
    ///
    /// Nothing reaches the backend if the list has recording errors or
    /// touches a texture owned by another queue. If a native object can't
    /// be created midway, the commands translated so far stay recorded and
    /// any open native render pass is closed.
    pub fn submit(&mut self, list: &CommandList<A>) -> Result<(), QueueError> {
        profiling::scope!("submit", "Queue");
        if self.lost {
            return Err(DeviceError::Lost.into());
        }
        if list.has_errors() {
            log::error!("Rejecting command list {:?}", list.label());
            return Err(QueueError::BadCommandList);
        }
        self.claim_textures(list)?;
        log::debug!(
            "Queue {:?} translating {} commands of {:?}",
            self.id,
            list.len(),
            list.label()
        );

        let mut pass = None;
        let result = self.translate(list, &mut pass);
        if let Err(ref err) = result {
            log::error!("Translation of {:?} failed: {}", list.label(), err);
            if pass.is_some() {
                unsafe { self.encoder.end_render_pass() };
            }
        }
        result
    }

    fn translate<'a>(
        &mut self,
        list: &'a CommandList<A>,
        pass: &mut Option<PassState<'a, A>>,
    ) -> Result<(), QueueError> {
        for command in list.iter() {
            match *command {
                Command::BeginRenderPass(ref targets) => {
                    *pass = Some(self.begin_render_pass(targets)?);
                }
                Command::EndRenderPass => {
                    unsafe { self.encoder.end_render_pass() };
                    *pass = None;
                }
                Command::UseProgram(ref program) => {
                    let state = active(pass);
                    if let Some(prev) = state.program {
                        if prev.id() != program.id() {
                            // a new layout invalidates every bound set
                            state.dirty_sets = state
                                .resource_sets
                                .iter()
                                .enumerate()
                                .filter(|&(_, set)| set.is_some())
                                .fold(0, |mask, (index, _)| mask | 1 << index);
                        }
                    }
                    state.program = Some(program);
                    state.pipeline_dirty = true;
                }
                Command::UseRasterizerState(ref rs) => {
                    let state = active(pass);
                    state.rasterizer = Some(rs);
                    state.pipeline_dirty = true;
                }
                Command::UseColorBlendState(ref cbs) => {
                    let state = active(pass);
                    state.color_blend = Some(cbs);
                    state.pipeline_dirty = true;
                }
                Command::UseInputAssemblyState(ref ias) => {
                    let state = active(pass);
                    state.input_assembly = Some(ias);
                    state.pipeline_dirty = true;
                }
                Command::UseVertexInputState(ref vis) => {
                    let state = active(pass);
                    state.vertex_input = Some(vis);
                    state.pipeline_dirty = true;
                }
                Command::UseDepthStencilState(ref dss) => {
                    let state = active(pass);
                    state.depth_stencil = Some(dss);
                    state.pipeline_dirty = true;
                }
                Command::SetViewport(ref viewport) => unsafe {
                    self.encoder
                        .set_viewport(&viewport.rect, viewport.depth.clone());
                },
                Command::SetScissor(ref rect) => unsafe {
                    self.encoder.set_scissor_rect(rect);
                },
                Command::BindVertexBuffer {
                    slot,
                    ref buffer,
                    offset,
                } => unsafe {
                    self.encoder.set_vertex_buffer(
                        slot,
                        hal::BufferBinding {
                            buffer: buffer.raw(),
                            offset,
                        },
                    );
                },
                Command::BindIndexBuffer {
                    ref buffer,
                    offset,
                    format,
                } => unsafe {
                    self.encoder.set_index_buffer(
                        hal::BufferBinding {
                            buffer: buffer.raw(),
                            offset,
                        },
                        format,
                    );
                },
                Command::BindResourceSet { index, ref set } => {
                    let state = active(pass);
                    state.resource_sets[index as usize] = Some(set);
                    state.dirty_sets |= 1 << index;
                }
                Command::Draw {
                    vertex_count,
                    instance_count,
                    first_vertex,
                    first_instance,
                } => {
                    self.flush_draw_state(active(pass))?;
                    unsafe {
                        self.encoder
                            .draw(first_vertex, vertex_count, first_instance, instance_count);
                    }
                }
                Command::DrawIndexed {
                    index_count,
                    instance_count,
                    first_index,
                    base_vertex,
                    first_instance,
                } => {
                    self.flush_draw_state(active(pass))?;
                    unsafe {
                        self.encoder.draw_indexed(
                            first_index,
                            index_count,
                            base_vertex,
                            first_instance,
                            instance_count,
                        );
                    }
                }
                Command::TransitionTexture {
                    ref texture,
                    ref range,
                    state,
                } => {
                    self.transition(texture, range, state);
                }
            }
        }
        Ok(())
    }

    fn transition(&mut self, texture: &Arc<Texture<A>>, range: &SubresourceRange, state: TextureState) {
        let transitions = self.trackers.transition(texture, range, state);
        if !transitions.is_empty() {
            unsafe {
                self.encoder.transition_textures(
                    transitions
                        .into_iter()
                        .map(|pending| pending.into_hal(texture)),
                );
            }
        }
    }

    fn begin_render_pass<'a>(
        &mut self,
        targets: &'a RenderTargets<A>,
    ) -> Result<PassState<'a, A>, QueueError> {
        let device = Arc::clone(&self.device);
        let query = targets.query();
        let render_pass = device
            .render_passes
            .lock()
            .get_or_create(&query, |query| {
                let colors = query.color_slots();
                unsafe {
                    device.raw.create_render_pass(&hal::RenderPassDescriptor {
                        label: None,
                        color_attachments: &colors,
                        depth_stencil_attachment: query.depth_stencil(),
                    })
                }
            })?;

        for view in targets.views() {
            let state = TextureState::attachment(view.format());
            self.transition(view.texture(), view.range(), state);
        }

        let extent = targets.extent();
        let raw_views = targets
            .views()
            .map(|view| view.raw())
            .collect::<ArrayVec<_, { MAX_COLOR_ATTACHMENTS + 1 }>>();
        let framebuffer = unsafe {
            device.raw.create_framebuffer(&hal::FramebufferDescriptor {
                label: None,
                render_pass: &render_pass,
                attachments: &raw_views,
                extent,
            })?
        };
        let clear_values = targets.clear_values();
        let viewport = Viewport::from_extent(extent);
        unsafe {
            self.encoder.begin_render_pass(&hal::RenderPassBegin {
                render_pass: &render_pass,
                framebuffer: &framebuffer,
                extent,
                clear_values: &clear_values,
            });
            self.encoder
                .set_viewport(&viewport.rect, viewport.depth.clone());
            self.encoder.set_scissor_rect(&Rect {
                x: 0,
                y: 0,
                w: extent.width,
                h: extent.height,
            });
        }
        device
            .life
            .lock()
            .schedule(move |raw| unsafe { raw.destroy_framebuffer(framebuffer) });

        Ok(PassState::new(render_pass, query))
    }

    /// Binds the pipeline and resource sets a draw depends on.
    fn flush_draw_state(&mut self, state: &mut PassState<A>) -> Result<(), QueueError> {
        let program = expect_state(state.program, "shader program");
        if state.pipeline_dirty {
            let device = &*self.device;
            let query = state.pipeline_query();
            let pipeline = device.pipelines.lock().get_or_create(&query, |_| {
                let depth_stencil = if state.has_depth_stencil {
                    Some(expect_state(state.depth_stencil, "depth stencil").description())
                } else {
                    None
                };
                unsafe {
                    device
                        .raw
                        .create_render_pipeline(&hal::RenderPipelineDescriptor {
                            label: program.label(),
                            layout: program.layout(),
                            vertex_stage: program.vertex_stage(),
                            fragment_stage: program.fragment_stage(),
                            rasterizer: expect_state(state.rasterizer, "rasterizer")
                                .description(),
                            color_blend: expect_state(state.color_blend, "color blend")
                                .description(),
                            input_assembly: expect_state(state.input_assembly, "input assembly")
                                .description(),
                            vertex_input: expect_state(state.vertex_input, "vertex input")
                                .description(),
                            depth_stencil,
                            render_pass: &state.render_pass,
                        })
                }
            })?;
            if state.bound_pipeline != Some(pipeline) {
                unsafe { self.encoder.set_render_pipeline(&pipeline) };
                state.bound_pipeline = Some(pipeline);
            }
            state.pipeline_dirty = false;
        }

        while state.dirty_sets != 0 {
            let index = state.dirty_sets.trailing_zeros();
            state.dirty_sets &= !(1 << index);
            if let Some(set) = state.resource_sets[index as usize] {
                unsafe {
                    self.encoder
                        .set_resource_set(program.layout(), index, set.raw());
                }
            }
        }
        Ok(())
    }

    /// Submits the recorded work and blocks until the GPU is done with it.
    ///
    /// Deletions that no queue depends on anymore run afterwards, and a
    /// new native recording is started. Any failure leaves the queue lost.
    pub fn flush(&mut self) -> Result<(), DeviceError> {
        profiling::scope!("flush", "Queue");
        if self.lost {
            return Err(DeviceError::Lost);
        }
        let result = unsafe { self.flush_raw() };
        if let Err(ref err) = result {
            log::error!("Queue {:?} is lost: {}", self.id, err);
            self.lost = true;
            // nothing this queue recorded will execute anymore
            let mut life = self.device.life.lock();
            life.unregister_queue(self.id);
            life.maintain(&self.device.raw);
        }
        result
    }

    unsafe fn flush_raw(&mut self) -> Result<(), DeviceError> {
        let device = &*self.device;
        let label = self.label.as_deref();
        let cmd_buf = self.encoder.end_encoding()?;
        let epoch = device.life.lock().begin_submission();
        self.raw.submit(&cmd_buf, &mut self.fence)?;
        device.raw.wait(&self.fence)?;
        self.encoder.reset_all(iter::once(cmd_buf));

        let reclaimed = {
            let mut life = device.life.lock();
            life.retire(self.id, epoch);
            life.maintain(&device.raw)
        };
        let pruned = self.trackers.prune();
        self.submissions += 1;
        log::debug!(
            "Queue {:?} retired epoch {}: {} objects reclaimed, {} textures untracked",
            self.id,
            epoch,
            reclaimed,
            pruned
        );

        self.encoder.begin_encoding(label)
    }
}

fn active<'p, 'a, A: hal::Api>(pass: &'p mut Option<PassState<'a, A>>) -> &'p mut PassState<'a, A> {
    match *pass {
        Some(ref mut state) => state,
        None => panic!("Pass command outside of a render pass in a validated list"),
    }
}

impl<A: hal::Api> Drop for Queue<A> {
    fn drop(&mut self) {
        log::debug!("Destroying queue {:?}", self.id);
        self.trackers.release_claims(self.id);
        let device = &*self.device;
        unsafe {
            let mut encoder = ManuallyDrop::take(&mut self.encoder);
            // drop whatever was translated since the last flush
            if !self.lost {
                match encoder.end_encoding() {
                    Ok(cmd_buf) => encoder.reset_all(iter::once(cmd_buf)),
                    Err(err) => {
                        log::warn!("Failed to close the recording of {:?}: {}", self.id, err)
                    }
                }
            }
            device.raw.destroy_command_encoder(encoder);
            device.raw.destroy_fence(ManuallyDrop::take(&mut self.fence));
        }
        let mut life = device.life.lock();
        life.unregister_queue(self.id);
        life.maintain(&device.raw);
    }
}

impl<A: hal::Api> fmt::Debug for Queue<A> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("Queue")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("submissions", &self.submissions)
            .field("lost", &self.lost)
            .field("tracked_textures", &self.trackers.len())
            .finish()
    }
}

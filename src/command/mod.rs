/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

/*! Command recording.
 *
 *  A [`CommandList`] is a singly-linked sequence of [`Command`] records
 *  carved out of a chunked arena. Recording never talks to the GPU: it only
 *  stores the records, along with strong references to every object they
 *  use, until a queue interprets them.
 *
 *  Misuse is not reported per call. It sets a sticky error flag instead,
 *  and a list with errors is rejected as a whole at submission.
 */

mod render;

pub use self::render::*;

use crate::{
    arena::{Arena, Handle},
    resource::{Buffer, ResourceSet, Texture},
    state::{
        ColorBlendState, DefaultStates, DepthStencilState, InputAssemblyState, RasterizerState,
        ShaderProgram, VertexInputState,
    },
    hal, IndexFormat, Label, Rect, SubresourceRange, TextureState, Viewport,
    MAX_COLOR_ATTACHMENTS,
};

use std::{fmt, sync::Arc};

/// A single recorded command.
#[derive(Debug)]
pub enum Command<A: hal::Api> {
    BeginRenderPass(RenderTargets<A>),
    EndRenderPass,
    UseProgram(Arc<ShaderProgram<A>>),
    UseRasterizerState(Arc<RasterizerState>),
    UseColorBlendState(Arc<ColorBlendState>),
    UseInputAssemblyState(Arc<InputAssemblyState>),
    UseVertexInputState(Arc<VertexInputState>),
    UseDepthStencilState(Arc<DepthStencilState>),
    SetViewport(Viewport),
    SetScissor(Rect<u32>),
    BindVertexBuffer {
        slot: u32,
        buffer: Arc<Buffer<A>>,
        offset: u64,
    },
    BindIndexBuffer {
        buffer: Arc<Buffer<A>>,
        offset: u64,
        format: IndexFormat,
    },
    BindResourceSet {
        index: u32,
        set: Arc<ResourceSet<A>>,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    },
    /// Moves a texture region into a new state outside of a render pass.
    TransitionTexture {
        texture: Arc<Texture<A>>,
        range: SubresourceRange,
        state: TextureState,
    },
}

#[derive(Debug)]
struct Node<A: hal::Api> {
    command: Command<A>,
    next: Option<Handle<Node<A>>>,
}

/// A retained sequence of commands, interpreted later by a queue.
pub struct CommandList<A: hal::Api> {
    arena: Arena<Node<A>>,
    head: Option<Handle<Node<A>>>,
    tail: Option<Handle<Node<A>>>,
    defaults: Arc<DefaultStates>,
    label: Option<String>,
    has_errors: bool,
    inside_render_pass: bool,
}

impl<A: hal::Api> CommandList<A> {
    pub(crate) fn new(
        defaults: Arc<DefaultStates>,
        chunk_capacity: usize,
        label: Label,
    ) -> Self {
        Self {
            arena: Arena::new(chunk_capacity),
            head: None,
            tail: None,
            defaults,
            label: label.map(str::to_string),
            has_errors: false,
            inside_render_pass: false,
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn push(&mut self, command: Command<A>) {
        log::trace!("Recording {:?}", CommandName(&command));
        let handle = self.arena.append(Node {
            command,
            next: None,
        });
        match self.tail {
            Some(tail) => self.arena.get_mut(tail).next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
    }

    fn error(&mut self, message: fmt::Arguments) {
        log::error!("{}: {}", self.label.as_deref().unwrap_or("CommandList"), message);
        self.has_errors = true;
    }

    /// Opens a render pass and returns the encoder recording into it.
    ///
    /// The pass starts with the device default states bound. Opening a
    /// pass while another one is open is an error, but the pass is still
    /// recorded.
    pub fn begin_render_pass(&mut self, desc: &RenderPassDescriptor<A>) -> RenderPassEncoder<A> {
        if self.inside_render_pass {
            self.error(format_args!("render pass {:?} begins inside another pass", desc.label));
        }
        if desc.color_attachments.len() > MAX_COLOR_ATTACHMENTS {
            self.error(format_args!(
                "render pass {:?} declares {} colour attachments, the limit is {}",
                desc.label,
                desc.color_attachments.len(),
                MAX_COLOR_ATTACHMENTS
            ));
        }
        let targets = RenderTargets::from_descriptor(desc);
        if targets.is_empty() {
            self.error(format_args!("render pass {:?} has no attachments", desc.label));
        }
        let color_slot_count = targets.color_slot_count();
        self.push(Command::BeginRenderPass(targets));
        self.inside_render_pass = true;

        let defaults = Arc::clone(&self.defaults);
        self.push(Command::UseRasterizerState(Arc::clone(&defaults.rasterizer)));
        self.push(Command::UseColorBlendState(Arc::clone(
            defaults.color_blend(color_slot_count),
        )));
        self.push(Command::UseInputAssemblyState(Arc::clone(
            &defaults.input_assembly,
        )));
        self.push(Command::UseVertexInputState(Arc::clone(
            &defaults.vertex_input,
        )));
        self.push(Command::UseDepthStencilState(Arc::clone(
            &defaults.depth_stencil,
        )));

        RenderPassEncoder::new(self, color_slot_count)
    }

    /// Closes the open render pass.
    pub fn end_render_pass(&mut self) {
        if !self.inside_render_pass {
            self.error(format_args!("no render pass to end"));
            return;
        }
        self.push(Command::EndRenderPass);
        self.inside_render_pass = false;
    }

    /// Records an explicit state change of a texture region.
    ///
    /// Only valid outside of render passes.
    pub fn transition_texture(
        &mut self,
        texture: &Arc<Texture<A>>,
        range: SubresourceRange,
        state: TextureState,
    ) {
        if self.inside_render_pass {
            self.error(format_args!(
                "texture {:?} is transitioned inside a render pass",
                texture.id()
            ));
        }
        self.push(Command::TransitionTexture {
            texture: Arc::clone(texture),
            range,
            state,
        });
    }

    /// Returns true if the list can't be submitted: a recording error
    /// happened, or a render pass is still open.
    pub fn has_errors(&self) -> bool {
        self.has_errors || self.inside_render_pass
    }

    pub fn is_inside_render_pass(&self) -> bool {
        self.inside_render_pass
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.arena.chunk_count()
    }

    /// Iterates over the recorded commands, following the links.
    pub fn iter(&self) -> Iter<A> {
        Iter {
            arena: &self.arena,
            next: self.head,
        }
    }

    /// Drops every record and resets the error state.
    ///
    /// Arena chunks are kept for the next recording.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.head = None;
        self.tail = None;
        self.has_errors = false;
        self.inside_render_pass = false;
    }
}

impl<A: hal::Api> fmt::Debug for CommandList<A> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("CommandList")
            .field("label", &self.label)
            .field("len", &self.arena.len())
            .field("has_errors", &self.has_errors)
            .field("inside_render_pass", &self.inside_render_pass)
            .finish()
    }
}

impl<'a, A: hal::Api> IntoIterator for &'a CommandList<A> {
    type Item = &'a Command<A>;
    type IntoIter = Iter<'a, A>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Iter<'a, A: hal::Api> {
    arena: &'a Arena<Node<A>>,
    next: Option<Handle<Node<A>>>,
}

impl<'a, A: hal::Api> Iterator for Iter<'a, A> {
    type Item = &'a Command<A>;
    fn next(&mut self) -> Option<Self::Item> {
        let node = &self.arena[self.next?];
        self.next = node.next;
        Some(&node.command)
    }
}

/// Short form of a command for logging, without the referenced objects.
struct CommandName<'a, A: hal::Api>(&'a Command<A>);

impl<A: hal::Api> fmt::Debug for CommandName<'_, A> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self.0 {
            Command::BeginRenderPass(_) => "BeginRenderPass",
            Command::EndRenderPass => "EndRenderPass",
            Command::UseProgram(_) => "UseProgram",
            Command::UseRasterizerState(_) => "UseRasterizerState",
            Command::UseColorBlendState(_) => "UseColorBlendState",
            Command::UseInputAssemblyState(_) => "UseInputAssemblyState",
            Command::UseVertexInputState(_) => "UseVertexInputState",
            Command::UseDepthStencilState(_) => "UseDepthStencilState",
            Command::SetViewport(_) => "SetViewport",
            Command::SetScissor(_) => "SetScissor",
            Command::BindVertexBuffer { .. } => "BindVertexBuffer",
            Command::BindIndexBuffer { .. } => "BindIndexBuffer",
            Command::BindResourceSet { .. } => "BindResourceSet",
            Command::Draw { .. } => "Draw",
            Command::DrawIndexed { .. } => "DrawIndexed",
            Command::TransitionTexture { .. } => "TransitionTexture",
        };
        formatter.write_str(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{hal::empty, id::IdentityManager};

    fn list(ids: &IdentityManager, chunk_capacity: usize) -> CommandList<empty::Api> {
        CommandList::new(Arc::new(DefaultStates::new(ids)), chunk_capacity, None)
    }

    fn names(list: &CommandList<empty::Api>) -> Vec<String> {
        list.iter()
            .map(|command| format!("{:?}", CommandName(command)))
            .collect()
    }

    #[test]
    fn ending_without_a_pass_is_an_error() {
        let ids = IdentityManager::new();
        let mut list = list(&ids, 4);
        assert!(!list.has_errors());
        list.end_render_pass();
        assert!(list.has_errors());
        assert!(list.is_empty());
        list.clear();
        assert!(!list.has_errors());
    }

    #[test]
    fn links_follow_recording_order_across_chunks() {
        let ids = IdentityManager::new();
        let mut list = list(&ids, 2);
        let device = empty::Device::new();
        let texture = Arc::new(Texture::<empty::Api>::new(
            device.create_resource(),
            ids.alloc(),
            &crate::TextureDescriptor {
                label: None,
                extent: crate::Extent {
                    width: 4,
                    height: 4,
                },
                mip_level_count: 1,
                array_layer_count: 1,
                format: crate::Format::Rgba8Unorm,
            },
        ));
        for _ in 0..5 {
            list.transition_texture(&texture, texture.full_range(), TextureState::SHADER_READ);
        }
        assert_eq!(list.len(), 5);
        assert_eq!(list.chunk_count(), 3);
        assert_eq!(list.iter().count(), 5);
        assert_eq!(names(&list)[4], "TransitionTexture");
        assert!(!list.has_errors());

        // the records hold the texture alive until cleared
        assert_eq!(Arc::strong_count(&texture), 6);
        list.clear();
        assert_eq!(Arc::strong_count(&texture), 1);
        assert_eq!(list.chunk_count(), 3);
    }
}

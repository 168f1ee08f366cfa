/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::{
    cache::{AttachmentKey, DepthStencilKey, RenderPassQuery},
    command::{Command, CommandList},
    hal,
    resource::{Buffer, ResourceSet, TextureView},
    state::{
        ColorBlendState, DepthStencilState, InputAssemblyState, RasterizerState, ShaderProgram,
        VertexInputState,
    },
    ClearValue, Color, Extent, IndexFormat, Label, LoadOp, Rect, StoreOp, Viewport,
    MAX_COLOR_ATTACHMENTS, MAX_RESOURCE_SETS, MAX_VERTEX_BUFFERS,
};

use arrayvec::ArrayVec;

use std::{ops::Range, sync::Arc};

#[derive(Clone, Debug)]
pub struct ColorAttachment<A: hal::Api> {
    pub view: Arc<TextureView<A>>,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear_color: Color,
}

#[derive(Clone, Debug)]
pub struct DepthStencilAttachment<A: hal::Api> {
    pub view: Arc<TextureView<A>>,
    pub depth_load_op: LoadOp,
    pub depth_store_op: StoreOp,
    pub clear_depth: f32,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub clear_stencil: u32,
}

#[derive(Debug)]
pub struct RenderPassDescriptor<'a, A: hal::Api> {
    pub label: Label<'a>,
    /// Colour attachments by slot. `None` leaves the slot unused.
    pub color_attachments: &'a [Option<ColorAttachment<A>>],
    pub depth_stencil_attachment: Option<&'a DepthStencilAttachment<A>>,
}

/// Attachments of a recorded render pass.
#[derive(Debug)]
pub struct RenderTargets<A: hal::Api> {
    pub colors: ArrayVec<Option<ColorAttachment<A>>, MAX_COLOR_ATTACHMENTS>,
    pub depth_stencil: Option<DepthStencilAttachment<A>>,
}

impl<A: hal::Api> RenderTargets<A> {
    pub(crate) fn from_descriptor(desc: &RenderPassDescriptor<A>) -> Self {
        let mut colors = desc
            .color_attachments
            .iter()
            .take(MAX_COLOR_ATTACHMENTS)
            .cloned()
            .collect::<ArrayVec<_, MAX_COLOR_ATTACHMENTS>>();
        while let Some(&None) = colors.last() {
            colors.pop();
        }
        Self {
            colors,
            depth_stencil: desc.depth_stencil_attachment.cloned(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty() && self.depth_stencil.is_none()
    }

    /// Number of colour slots up to the last populated one.
    pub fn color_slot_count(&self) -> usize {
        self.colors.len()
    }

    /// Key of the native render pass these targets are compatible with.
    pub fn query(&self) -> RenderPassQuery {
        let mut query = RenderPassQuery::new();
        for (slot, color) in self.colors.iter().enumerate() {
            if let Some(ref color) = *color {
                query.set_color(
                    slot,
                    AttachmentKey {
                        format: color.view.format(),
                        load_op: color.load_op,
                        store_op: color.store_op,
                    },
                );
            }
        }
        query.set_depth_stencil(self.depth_stencil.as_ref().map(|ds| DepthStencilKey {
            format: ds.view.format(),
            depth_load_op: ds.depth_load_op,
            depth_store_op: ds.depth_store_op,
            stencil_load_op: ds.stencil_load_op,
            stencil_store_op: ds.stencil_store_op,
        }));
        query
    }

    /// Populated attachment views in framebuffer order: colours by slot,
    /// then depth-stencil.
    pub fn views(&self) -> impl Iterator<Item = &Arc<TextureView<A>>> {
        self.colors
            .iter()
            .filter_map(|color| color.as_ref().map(|c| &c.view))
            .chain(self.depth_stencil.as_ref().map(|ds| &ds.view))
    }

    pub(crate) fn clear_values(&self) -> ArrayVec<ClearValue, { MAX_COLOR_ATTACHMENTS + 1 }> {
        self.colors
            .iter()
            .filter_map(|color| color.as_ref().map(|c| ClearValue::Color(c.clear_color)))
            .chain(self.depth_stencil.as_ref().map(|ds| ClearValue::DepthStencil {
                depth: ds.clear_depth,
                stencil: ds.clear_stencil,
            }))
            .collect()
    }

    /// The area shared by every attachment.
    pub fn extent(&self) -> Extent {
        self.views()
            .map(|view| view.extent())
            .fold(None, |acc: Option<Extent>, e| {
                Some(match acc {
                    Some(acc) => Extent {
                        width: acc.width.min(e.width),
                        height: acc.height.min(e.height),
                    },
                    None => e,
                })
            })
            .unwrap_or_default()
    }
}

/// Records the contents of one render pass.
///
/// Dropping the encoder without calling [`end`](Self::end) leaves the pass
/// open, and the list can't be submitted until it is ended through
/// [`CommandList::end_render_pass`].
#[derive(Debug)]
pub struct RenderPassEncoder<'a, A: hal::Api> {
    list: &'a mut CommandList<A>,
    color_slot_count: usize,
    has_program: bool,
    has_index_buffer: bool,
}

impl<'a, A: hal::Api> RenderPassEncoder<'a, A> {
    pub(super) fn new(list: &'a mut CommandList<A>, color_slot_count: usize) -> Self {
        Self {
            list,
            color_slot_count,
            has_program: false,
            has_index_buffer: false,
        }
    }

    pub fn use_program(&mut self, program: &Arc<ShaderProgram<A>>) {
        self.has_program = true;
        self.list.push(Command::UseProgram(Arc::clone(program)));
    }

    pub fn use_rasterizer_state(&mut self, state: &Arc<RasterizerState>) {
        self.list.push(Command::UseRasterizerState(Arc::clone(state)));
    }

    pub fn use_color_blend_state(&mut self, state: &Arc<ColorBlendState>) {
        if state.attachment_count() != self.color_slot_count {
            self.list.error(format_args!(
                "color blend state {:?} has {} attachments, but the pass has {}",
                state.id(),
                state.attachment_count(),
                self.color_slot_count
            ));
        }
        self.list.push(Command::UseColorBlendState(Arc::clone(state)));
    }

    pub fn use_input_assembly_state(&mut self, state: &Arc<InputAssemblyState>) {
        self.list
            .push(Command::UseInputAssemblyState(Arc::clone(state)));
    }

    pub fn use_vertex_input_state(&mut self, state: &Arc<VertexInputState>) {
        self.list.push(Command::UseVertexInputState(Arc::clone(state)));
    }

    pub fn use_depth_stencil_state(&mut self, state: &Arc<DepthStencilState>) {
        self.list
            .push(Command::UseDepthStencilState(Arc::clone(state)));
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.list.push(Command::SetViewport(viewport));
    }

    pub fn set_scissor(&mut self, rect: Rect<u32>) {
        self.list.push(Command::SetScissor(rect));
    }

    pub fn bind_vertex_buffer(&mut self, slot: u32, buffer: &Arc<Buffer<A>>, offset: u64) {
        if slot as usize >= MAX_VERTEX_BUFFERS {
            self.list
                .error(format_args!("vertex buffer slot {} is out of range", slot));
        }
        self.list.push(Command::BindVertexBuffer {
            slot,
            buffer: Arc::clone(buffer),
            offset,
        });
    }

    pub fn bind_index_buffer(&mut self, buffer: &Arc<Buffer<A>>, offset: u64, format: IndexFormat) {
        self.has_index_buffer = true;
        self.list.push(Command::BindIndexBuffer {
            buffer: Arc::clone(buffer),
            offset,
            format,
        });
    }

    pub fn bind_resource_set(&mut self, index: u32, set: &Arc<ResourceSet<A>>) {
        if index as usize >= MAX_RESOURCE_SETS {
            self.list
                .error(format_args!("resource set index {} is out of range", index));
        }
        self.list.push(Command::BindResourceSet {
            index,
            set: Arc::clone(set),
        });
    }

    pub fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        if !self.has_program {
            self.list.error(format_args!("draw without a shader program"));
        }
        self.list.push(Command::Draw {
            vertex_count: vertices.end.saturating_sub(vertices.start),
            instance_count: instances.end.saturating_sub(instances.start),
            first_vertex: vertices.start,
            first_instance: instances.start,
        });
    }

    pub fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        if !self.has_program {
            self.list
                .error(format_args!("indexed draw without a shader program"));
        }
        if !self.has_index_buffer {
            self.list
                .error(format_args!("indexed draw without an index buffer"));
        }
        self.list.push(Command::DrawIndexed {
            index_count: indices.end.saturating_sub(indices.start),
            instance_count: instances.end.saturating_sub(instances.start),
            first_index: indices.start,
            base_vertex,
            first_instance: instances.start,
        });
    }

    /// Closes the pass.
    pub fn end(self) {
        self.list.end_render_pass();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        hal::empty, id::IdentityManager, resource::Texture, state::DefaultStates,
        ColorBlendDescriptor, Format, TextureDescriptor, TextureViewDescriptor,
    };

    struct Fixture {
        ids: IdentityManager,
        device: empty::Device,
        defaults: Arc<DefaultStates>,
    }

    impl Fixture {
        fn new() -> Self {
            let ids = IdentityManager::new();
            let defaults = Arc::new(DefaultStates::new(&ids));
            Self {
                ids,
                device: empty::Device::new(),
                defaults,
            }
        }

        fn list(&self) -> CommandList<empty::Api> {
            CommandList::new(Arc::clone(&self.defaults), 16, Some("test"))
        }

        fn target(&self, format: Format) -> ColorAttachment<empty::Api> {
            let texture = Arc::new(Texture::new(
                self.device.create_resource(),
                self.ids.alloc(),
                &TextureDescriptor {
                    label: None,
                    extent: Extent {
                        width: 32,
                        height: 16,
                    },
                    mip_level_count: 1,
                    array_layer_count: 1,
                    format,
                },
            ));
            let view = TextureView::new(
                self.device.create_resource(),
                self.ids.alloc(),
                &texture,
                &TextureViewDescriptor::default(),
            );
            ColorAttachment {
                view: Arc::new(view),
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                clear_color: Color::BLACK,
            }
        }
    }

    #[test]
    fn begin_injects_default_states() {
        let fixture = Fixture::new();
        let mut list = fixture.list();
        let colors = [Some(fixture.target(Format::Rgba8Unorm))];
        list.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &colors,
            depth_stencil_attachment: None,
        })
        .end();

        let commands = list.iter().collect::<Vec<_>>();
        assert_eq!(commands.len(), 7);
        match *commands[2] {
            Command::UseColorBlendState(ref state) => {
                assert_eq!(state.id(), fixture.defaults.color_blend(1).id())
            }
            ref other => panic!("unexpected {:?}", other),
        }
        assert!(!list.has_errors());
    }

    #[test]
    fn nested_begin_is_sticky() {
        let fixture = Fixture::new();
        let mut list = fixture.list();
        let colors = [Some(fixture.target(Format::Rgba8Unorm))];
        let desc = RenderPassDescriptor {
            label: None,
            color_attachments: &colors,
            depth_stencil_attachment: None,
        };
        list.begin_render_pass(&desc);
        assert!(list.has_errors());
        list.begin_render_pass(&desc);
        list.end_render_pass();
        assert!(!list.is_inside_render_pass());
        assert!(list.has_errors());
    }

    #[test]
    fn open_pass_blocks_submission() {
        let fixture = Fixture::new();
        let mut list = fixture.list();
        let colors = [Some(fixture.target(Format::Rgba8Unorm))];
        list.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &colors,
            depth_stencil_attachment: None,
        });
        assert!(list.has_errors());
        list.end_render_pass();
        assert!(!list.has_errors());
    }

    #[test]
    fn draw_without_program_is_an_error() {
        let fixture = Fixture::new();
        let mut list = fixture.list();
        let colors = [Some(fixture.target(Format::Rgba8Unorm))];
        let mut pass = list.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &colors,
            depth_stencil_attachment: None,
        });
        pass.draw(0..3, 0..1);
        pass.end();
        assert!(list.has_errors());
    }

    #[test]
    fn blend_state_must_cover_every_slot() {
        let fixture = Fixture::new();
        let mut list = fixture.list();
        let colors = [None, Some(fixture.target(Format::R8Unorm)), None];
        let wrong = Arc::new(ColorBlendState::new(
            fixture.ids.alloc(),
            ColorBlendDescriptor::opaque(1),
        ));
        let mut pass = list.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &colors,
            depth_stencil_attachment: None,
        });
        // trailing unused slots are dropped, leading ones are kept
        assert_eq!(pass.color_slot_count, 2);
        pass.use_color_blend_state(&wrong);
        pass.end();
        assert!(list.has_errors());
    }

    #[test]
    fn targets_build_the_pass_query() {
        let fixture = Fixture::new();
        let colors = [None, Some(fixture.target(Format::Bgra8Unorm))];
        let targets = RenderTargets::from_descriptor(&RenderPassDescriptor {
            label: None,
            color_attachments: &colors,
            depth_stencil_attachment: None,
        });
        let query = targets.query();
        assert_eq!(query.color_mask(), 0b10);
        assert_eq!(query.color(1).map(|key| key.format), Some(Format::Bgra8Unorm));
        assert_eq!(targets.views().count(), 1);
        assert_eq!(
            targets.extent(),
            Extent {
                width: 32,
                height: 16
            }
        );
    }
}

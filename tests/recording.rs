use crate::common::{color, initialize_test};

use gfx_port::{
    hal::empty, Command, CommandList, RenderPassDescriptor, ShaderProgram, TextureState,
    TextureView, Viewport,
};

use std::sync::Arc;

fn record_frame(
    list: &mut CommandList<empty::Api>,
    target: &Arc<TextureView<empty::Api>>,
    program: &Arc<ShaderProgram<empty::Api>>,
) {
    let colors = [Some(color(target))];
    let mut pass = list.begin_render_pass(&RenderPassDescriptor {
        label: Some("frame"),
        color_attachments: &colors,
        depth_stencil_attachment: None,
    });
    pass.use_program(program);
    pass.set_viewport(Viewport::from_extent(target.extent()));
    for first in 0..4 {
        pass.draw(first * 3..first * 3 + 3, 0..1);
    }
    pass.end();
    list.transition_texture(
        target.texture(),
        target.range().clone(),
        TextureState::SHADER_READ,
    );
}

fn shape(list: &CommandList<empty::Api>) -> Vec<String> {
    list.iter().map(|command| format!("{:?}", command)).collect()
}

#[test]
fn nested_begin_keeps_the_list_invalid() {
    initialize_test(|ctx| {
        let target = ctx.target();
        let mut list = ctx.list();
        let colors = [Some(color(&target))];
        let desc = RenderPassDescriptor {
            label: None,
            color_attachments: &colors,
            depth_stencil_attachment: None,
        };
        list.begin_render_pass(&desc);
        list.begin_render_pass(&desc);
        list.end_render_pass();
        assert!(list.has_errors());
        // both passes were recorded
        let begins = list
            .iter()
            .filter(|command| matches!(**command, Command::BeginRenderPass(_)))
            .count();
        assert_eq!(begins, 2);
    })
}

#[test]
fn clear_reproduces_the_same_recording() {
    initialize_test(|ctx| {
        let target = ctx.target();
        let program = ctx.program();
        let mut list = ctx.list();
        record_frame(&mut list, &target, &program);
        let first = shape(&list);
        let chunks = list.chunk_count();
        assert!(chunks > 1);
        assert_eq!(list.len(), first.len());

        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.iter().count(), 0);

        record_frame(&mut list, &target, &program);
        assert_eq!(shape(&list), first);
        assert_eq!(list.chunk_count(), chunks);
        assert!(!list.has_errors());
    })
}

#[test]
fn too_many_color_attachments_are_an_error() {
    initialize_test(|ctx| {
        let targets = (0..gfx_port::MAX_COLOR_ATTACHMENTS + 1)
            .map(|_| ctx.target())
            .collect::<Vec<_>>();
        let colors = targets
            .iter()
            .map(|target| Some(color(target)))
            .collect::<Vec<_>>();
        let mut list = ctx.list();
        list.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &colors,
            depth_stencil_attachment: None,
        })
        .end();
        assert!(list.has_errors());
        match list.iter().next() {
            Some(&Command::BeginRenderPass(ref recorded)) => {
                assert_eq!(recorded.color_slot_count(), gfx_port::MAX_COLOR_ATTACHMENTS)
            }
            other => panic!("unexpected {:?}", other),
        }
    })
}

#[test]
fn out_of_range_slots_are_errors() {
    initialize_test(|ctx| {
        let target = ctx.target();
        let program = ctx.program();
        let buffer = ctx.device.buffer_from_raw(ctx.raw.create_resource(), 64);
        let set = ctx.device.resource_set_from_raw(ctx.raw.create_resource());
        let colors = [Some(color(&target))];
        let desc = RenderPassDescriptor {
            label: None,
            color_attachments: &colors,
            depth_stencil_attachment: None,
        };

        let mut list = ctx.list();
        let mut pass = list.begin_render_pass(&desc);
        pass.use_program(&program);
        pass.bind_vertex_buffer(gfx_port::MAX_VERTEX_BUFFERS as u32, &buffer, 0);
        pass.end();
        assert!(list.has_errors());

        list.clear();
        let mut pass = list.begin_render_pass(&desc);
        pass.bind_resource_set(gfx_port::MAX_RESOURCE_SETS as u32, &set);
        pass.end();
        assert!(list.has_errors());
    })
}

#[test]
fn indexed_draw_needs_an_index_buffer() {
    initialize_test(|ctx| {
        let target = ctx.target();
        let program = ctx.program();
        let colors = [Some(color(&target))];
        let mut list = ctx.list();
        let mut pass = list.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &colors,
            depth_stencil_attachment: None,
        });
        pass.use_program(&program);
        pass.draw_indexed(0..3, 0, 0..1);
        pass.end();
        assert!(list.has_errors());
    })
}

#[test]
fn transitions_inside_a_pass_are_errors() {
    initialize_test(|ctx| {
        let target = ctx.target();
        let other = ctx.target();
        let colors = [Some(color(&target))];
        let mut list = ctx.list();
        list.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &colors,
            depth_stencil_attachment: None,
        });
        list.transition_texture(
            other.texture(),
            other.texture().full_range(),
            TextureState::SHADER_READ,
        );
        list.end_render_pass();
        assert!(list.has_errors());
    })
}

#[test]
fn pass_without_attachments_is_an_error() {
    initialize_test(|ctx| {
        let mut list = ctx.list();
        list.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &[],
            depth_stencil_attachment: None,
        })
        .end();
        assert!(list.has_errors());
    })
}

use crate::common::{color, count, initialize_test};

use gfx_port::{
    hal::{self, empty::Call, DeviceError},
    QueueError, RenderPassDescriptor,
};

fn created_framebuffer(calls: &[Call]) -> hal::empty::Resource {
    calls
        .iter()
        .find_map(|call| match *call {
            Call::CreateFramebuffer(fb) => Some(fb),
            _ => None,
        })
        .unwrap()
}

#[test]
fn framebuffers_outlive_their_submission() {
    initialize_test(|ctx| {
        let mut queue = ctx.queue();
        let target = ctx.target();
        let mut list = ctx.list();
        let colors = [Some(color(&target))];
        list.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &colors,
            depth_stencil_attachment: None,
        })
        .end();

        queue.submit(&list).unwrap();
        let calls = ctx.take_calls();
        let framebuffer = created_framebuffer(&calls);
        assert_eq!(ctx.device.pending_deletions(), 1);
        assert_eq!(ctx.device.maintain(), 0);

        queue.flush().unwrap();
        let calls = ctx.take_calls();
        assert_eq!(
            calls,
            vec![
                Call::EndEncoding,
                Call::Submit,
                Call::Wait,
                Call::DestroyFramebuffer(framebuffer),
                Call::BeginEncoding,
            ]
        );
        assert_eq!(ctx.device.pending_deletions(), 0);
        assert_eq!(ctx.device.current_epoch(), 1);
    })
}

#[test]
fn slowest_queue_delays_reclamation() {
    initialize_test(|ctx| {
        let mut busy = ctx.queue();
        let mut idle = ctx.queue();
        let target = ctx.target();
        let mut list = ctx.list();
        let colors = [Some(color(&target))];
        list.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &colors,
            depth_stencil_attachment: None,
        })
        .end();

        busy.submit(&list).unwrap();
        busy.flush().unwrap();
        // the idle queue's recording began before the framebuffer was scheduled
        assert_eq!(ctx.device.pending_deletions(), 1);

        idle.flush().unwrap();
        assert_eq!(ctx.device.pending_deletions(), 0);
        assert_eq!(
            count(&ctx.take_calls(), |c| matches!(*c, Call::DestroyFramebuffer(_))),
            1
        );
    })
}

#[test]
fn dropping_a_queue_unblocks_reclamation() {
    initialize_test(|ctx| {
        let mut busy = ctx.queue();
        let idle = ctx.queue();
        let target = ctx.target();
        let mut list = ctx.list();
        let colors = [Some(color(&target))];
        list.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &colors,
            depth_stencil_attachment: None,
        })
        .end();

        busy.submit(&list).unwrap();
        busy.flush().unwrap();
        assert_eq!(ctx.device.pending_deletions(), 1);
        drop(idle);
        assert_eq!(ctx.device.pending_deletions(), 0);
    })
}

#[test]
fn user_deletions_wait_for_queues() {
    initialize_test(|ctx| {
        let mut queue = ctx.queue();
        let pipeline = ctx.raw.create_resource();
        ctx.device.schedule_deletion(move |raw| unsafe {
            hal::Device::destroy_render_pipeline(raw, pipeline)
        });
        assert_eq!(ctx.device.maintain(), 0);
        queue.flush().unwrap();
        assert!(ctx
            .take_calls()
            .contains(&Call::DestroyRenderPipeline(pipeline)));
    })
}

#[test]
fn teardown_destroys_cached_objects_last() {
    initialize_test(|ctx| {
        let mut queue = ctx.queue();
        let target = ctx.target();
        let program = ctx.program();
        let mut list = ctx.list();
        let colors = [Some(color(&target))];
        let mut pass = list.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &colors,
            depth_stencil_attachment: None,
        });
        pass.use_program(&program);
        pass.draw(0..3, 0..1);
        pass.end();
        queue.submit(&list).unwrap();
        queue.flush().unwrap();
        ctx.take_calls();

        let device = std::mem::replace(
            &mut ctx.device,
            gfx_port::Device::new(ctx.raw.clone(), &Default::default()),
        );
        drop(device);
        // the queue keeps the shared state alive
        assert!(ctx.take_calls().is_empty());

        drop(queue);
        let calls = ctx.take_calls();
        assert_eq!(count(&calls, |c| matches!(*c, Call::DestroyRenderPipeline(_))), 1);
        assert_eq!(count(&calls, |c| matches!(*c, Call::DestroyRenderPass(_))), 1);
        let pipeline_at = calls
            .iter()
            .position(|c| matches!(*c, Call::DestroyRenderPipeline(_)))
            .unwrap();
        let pass_at = calls
            .iter()
            .position(|c| matches!(*c, Call::DestroyRenderPass(_)))
            .unwrap();
        assert!(pipeline_at < pass_at);
    })
}

#[test]
fn failed_flush_loses_the_queue() {
    initialize_test(|ctx| {
        let mut lost = ctx.queue();
        let mut healthy = ctx.queue();
        let target = ctx.target();
        let mut list = ctx.list();
        let colors = [Some(color(&target))];
        list.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &colors,
            depth_stencil_attachment: None,
        })
        .end();

        lost.submit(&list).unwrap();
        ctx.take_calls();
        ctx.raw.fail_next_submissions(1);
        assert_eq!(lost.flush(), Err(DeviceError::Lost));
        assert!(lost.is_lost());
        assert_eq!(ctx.take_calls(), vec![Call::EndEncoding]);

        // no more native work goes through the dead recording
        match lost.submit(&list) {
            Err(QueueError::Device(DeviceError::Lost)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(lost.flush(), Err(DeviceError::Lost));
        assert!(ctx.take_calls().is_empty());

        // the lost queue does not hold back reclamation
        assert_eq!(ctx.device.pending_deletions(), 1);
        healthy.flush().unwrap();
        assert_eq!(ctx.device.pending_deletions(), 0);

        drop(lost);
        assert!(!ctx.take_calls().contains(&Call::EndEncoding));
    })
}

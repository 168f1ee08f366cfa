use super::{conv, DeviceResult};
use crate::{hal, IndexFormat, Rect};

use ash::{version::DeviceV1_0, vk};
use smallvec::SmallVec;

use std::ops::Range;

const ALLOCATION_GRANULARITY: u32 = 16;

impl hal::CommandEncoder<super::Api> for super::CommandEncoder {
    unsafe fn begin_encoding(&mut self, _label: crate::Label) -> DeviceResult<()> {
        if self.free.is_empty() {
            let vk_info = vk::CommandBufferAllocateInfo::builder()
                .command_pool(self.raw)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(ALLOCATION_GRANULARITY)
                .build();
            let cmd_buf_vec = self.device.raw.allocate_command_buffers(&vk_info)?;
            self.free.extend(cmd_buf_vec);
        }
        let raw = match self.free.pop() {
            Some(raw) => raw,
            None => return Err(hal::DeviceError::OutOfMemory),
        };

        let vk_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
            .build();
        self.device.raw.begin_command_buffer(raw, &vk_info)?;
        self.active = raw;

        Ok(())
    }

    unsafe fn end_encoding(&mut self) -> DeviceResult<super::CommandBuffer> {
        let raw = self.active;
        self.active = vk::CommandBuffer::null();
        self.device.raw.end_command_buffer(raw)?;
        Ok(super::CommandBuffer { raw })
    }

    unsafe fn reset_all<I>(&mut self, command_buffers: I)
    where
        I: Iterator<Item = super::CommandBuffer>,
    {
        self.free
            .extend(command_buffers.map(|cmd_buf| cmd_buf.raw));
        let _ = self
            .device
            .raw
            .reset_command_pool(self.raw, vk::CommandPoolResetFlags::RELEASE_RESOURCES);
    }

    unsafe fn transition_textures<'a, T>(&mut self, barriers: T)
    where
        T: Iterator<Item = hal::TextureBarrier<'a, super::Api>>,
    {
        let mut src_stages = vk::PipelineStageFlags::empty();
        let mut dst_stages = vk::PipelineStageFlags::empty();
        let vk_barriers = barriers
            .map(|bar| {
                src_stages |= conv::map_pipeline_stages(bar.state.start.stages);
                dst_stages |= conv::map_pipeline_stages(bar.state.end.stages);
                vk::ImageMemoryBarrier::builder()
                    .image(bar.texture.raw)
                    .subresource_range(conv::map_subresource_range(&bar.range))
                    .src_access_mask(conv::map_access(bar.state.start.access))
                    .dst_access_mask(conv::map_access(bar.state.end.access))
                    .old_layout(conv::map_texture_layout(bar.state.start.layout))
                    .new_layout(conv::map_texture_layout(bar.state.end.layout))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .build()
            })
            .collect::<SmallVec<[vk::ImageMemoryBarrier; 4]>>();

        if vk_barriers.is_empty() {
            return;
        }
        if src_stages.is_empty() {
            src_stages = vk::PipelineStageFlags::TOP_OF_PIPE;
        }
        if dst_stages.is_empty() {
            dst_stages = vk::PipelineStageFlags::BOTTOM_OF_PIPE;
        }

        self.device.raw.cmd_pipeline_barrier(
            self.active,
            src_stages,
            dst_stages,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &vk_barriers,
        );
    }

    // render

    unsafe fn begin_render_pass(&mut self, desc: &hal::RenderPassBegin<super::Api>) {
        let clear_values = desc
            .clear_values
            .iter()
            .map(conv::map_clear_value)
            .collect::<SmallVec<[vk::ClearValue; 4]>>();
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D {
                width: desc.extent.width,
                height: desc.extent.height,
            },
        };
        let vk_info = vk::RenderPassBeginInfo::builder()
            .render_pass(desc.render_pass.raw)
            .framebuffer(desc.framebuffer.raw)
            .render_area(render_area)
            .clear_values(&clear_values);

        self.device
            .raw
            .cmd_begin_render_pass(self.active, &vk_info, vk::SubpassContents::INLINE);
    }
    unsafe fn end_render_pass(&mut self) {
        self.device.raw.cmd_end_render_pass(self.active);
    }

    unsafe fn set_render_pipeline(&mut self, pipeline: &super::RenderPipeline) {
        self.device.raw.cmd_bind_pipeline(
            self.active,
            vk::PipelineBindPoint::GRAPHICS,
            pipeline.raw,
        );
    }

    unsafe fn set_resource_set(
        &mut self,
        layout: &super::PipelineLayout,
        index: u32,
        set: &super::ResourceSet,
    ) {
        self.device.raw.cmd_bind_descriptor_sets(
            self.active,
            vk::PipelineBindPoint::GRAPHICS,
            layout.raw,
            index,
            &[set.raw],
            &[],
        );
    }

    unsafe fn set_index_buffer<'a>(
        &mut self,
        binding: hal::BufferBinding<'a, super::Api>,
        format: IndexFormat,
    ) {
        self.device.raw.cmd_bind_index_buffer(
            self.active,
            binding.buffer.raw,
            binding.offset,
            conv::map_index_format(format),
        );
    }
    unsafe fn set_vertex_buffer<'a>(
        &mut self,
        index: u32,
        binding: hal::BufferBinding<'a, super::Api>,
    ) {
        self.device.raw.cmd_bind_vertex_buffers(
            self.active,
            index,
            &[binding.buffer.raw],
            &[binding.offset],
        );
    }
    unsafe fn set_viewport(&mut self, rect: &Rect<f32>, depth_range: Range<f32>) {
        let vk_viewports = [vk::Viewport {
            x: rect.x,
            y: rect.y,
            width: rect.w,
            height: rect.h,
            min_depth: depth_range.start,
            max_depth: depth_range.end,
        }];
        self.device
            .raw
            .cmd_set_viewport(self.active, 0, &vk_viewports);
    }
    unsafe fn set_scissor_rect(&mut self, rect: &Rect<u32>) {
        let vk_scissors = [vk::Rect2D {
            offset: vk::Offset2D {
                x: rect.x as i32,
                y: rect.y as i32,
            },
            extent: vk::Extent2D {
                width: rect.w,
                height: rect.h,
            },
        }];
        self.device
            .raw
            .cmd_set_scissor(self.active, 0, &vk_scissors);
    }

    unsafe fn draw(
        &mut self,
        start_vertex: u32,
        vertex_count: u32,
        start_instance: u32,
        instance_count: u32,
    ) {
        self.device.raw.cmd_draw(
            self.active,
            vertex_count,
            instance_count,
            start_vertex,
            start_instance,
        );
    }
    unsafe fn draw_indexed(
        &mut self,
        start_index: u32,
        index_count: u32,
        base_vertex: i32,
        start_instance: u32,
        instance_count: u32,
    ) {
        self.device.raw.cmd_draw_indexed(
            self.active,
            index_count,
            instance_count,
            start_index,
            base_vertex,
            start_instance,
        );
    }
}

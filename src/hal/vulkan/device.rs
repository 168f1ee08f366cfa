use super::{conv, DeviceResult};
use crate::hal::{self, DeviceError, PipelineError};

use arrayvec::ArrayVec;
use ash::{version::DeviceV1_0, vk};
use smallvec::SmallVec;

use std::{ffi::CString, sync::Arc};

fn entry_point_name(stage: &'static str, name: &str) -> Result<CString, PipelineError> {
    CString::new(name).map_err(|_| {
        PipelineError::Linkage(stage, format!("entry point {:?} contains a nul byte", name))
    })
}

impl hal::Device<super::Api> for super::Device {
    unsafe fn create_render_pass(
        &self,
        desc: &hal::RenderPassDescriptor,
    ) -> DeviceResult<super::RenderPass> {
        let mut attachments = ArrayVec::<vk::AttachmentDescription, { crate::MAX_COLOR_ATTACHMENTS + 1 }>::new();
        let mut color_refs = ArrayVec::<vk::AttachmentReference, { crate::MAX_COLOR_ATTACHMENTS }>::new();

        for slot in desc.color_attachments.iter() {
            let reference = match *slot {
                Some(ref key) => {
                    let layout = vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL;
                    attachments.push(
                        vk::AttachmentDescription::builder()
                            .format(conv::map_texture_format(key.format))
                            .samples(vk::SampleCountFlags::TYPE_1)
                            .load_op(conv::map_load_op(key.load_op))
                            .store_op(conv::map_store_op(key.store_op))
                            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                            .initial_layout(layout)
                            .final_layout(layout)
                            .build(),
                    );
                    vk::AttachmentReference {
                        attachment: attachments.len() as u32 - 1,
                        layout,
                    }
                }
                None => vk::AttachmentReference {
                    attachment: vk::ATTACHMENT_UNUSED,
                    layout: vk::ImageLayout::UNDEFINED,
                },
            };
            color_refs.push(reference);
        }

        let mut depth_stencil_ref = None;
        if let Some(key) = desc.depth_stencil_attachment {
            let layout = vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL;
            attachments.push(
                vk::AttachmentDescription::builder()
                    .format(conv::map_texture_format(key.format))
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .load_op(conv::map_load_op(key.depth_load_op))
                    .store_op(conv::map_store_op(key.depth_store_op))
                    .stencil_load_op(conv::map_load_op(key.stencil_load_op))
                    .stencil_store_op(conv::map_store_op(key.stencil_store_op))
                    .initial_layout(layout)
                    .final_layout(layout)
                    .build(),
            );
            depth_stencil_ref = Some(vk::AttachmentReference {
                attachment: attachments.len() as u32 - 1,
                layout,
            });
        }

        let mut subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if let Some(ref reference) = depth_stencil_ref {
            subpass = subpass.depth_stencil_attachment(reference);
        }
        let subpasses = [subpass.build()];

        let vk_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses);

        let raw = self.shared.raw.create_render_pass(&vk_info, None)?;
        Ok(super::RenderPass { raw })
    }
    unsafe fn destroy_render_pass(&self, pass: super::RenderPass) {
        self.shared.raw.destroy_render_pass(pass.raw, None);
    }

    unsafe fn create_framebuffer(
        &self,
        desc: &hal::FramebufferDescriptor<super::Api>,
    ) -> DeviceResult<super::Framebuffer> {
        let raw_views = desc
            .attachments
            .iter()
            .map(|view| view.raw)
            .collect::<SmallVec<[vk::ImageView; 4]>>();
        let vk_info = vk::FramebufferCreateInfo::builder()
            .render_pass(desc.render_pass.raw)
            .attachments(&raw_views)
            .width(desc.extent.width)
            .height(desc.extent.height)
            .layers(1);

        let raw = self.shared.raw.create_framebuffer(&vk_info, None)?;
        Ok(super::Framebuffer { raw })
    }
    unsafe fn destroy_framebuffer(&self, framebuffer: super::Framebuffer) {
        self.shared.raw.destroy_framebuffer(framebuffer.raw, None);
    }

    unsafe fn create_render_pipeline(
        &self,
        desc: &hal::RenderPipelineDescriptor<super::Api>,
    ) -> Result<super::RenderPipeline, PipelineError> {
        let vs_entry = entry_point_name("vertex", desc.vertex_stage.entry_point)?;
        let fs_entry = match desc.fragment_stage {
            Some(ref stage) => Some(entry_point_name("fragment", stage.entry_point)?),
            None => None,
        };

        let mut stages = ArrayVec::<vk::PipelineShaderStageCreateInfo, 2>::new();
        stages.push(
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(desc.vertex_stage.module.raw)
                .name(&vs_entry)
                .build(),
        );
        if let (Some(stage), Some(entry)) = (desc.fragment_stage.as_ref(), fs_entry.as_ref()) {
            stages.push(
                vk::PipelineShaderStageCreateInfo::builder()
                    .stage(vk::ShaderStageFlags::FRAGMENT)
                    .module(stage.module.raw)
                    .name(entry)
                    .build(),
            );
        }

        let mut vertex_buffers = Vec::with_capacity(desc.vertex_input.buffers.len());
        let mut vertex_attributes = Vec::new();
        for (i, vb) in desc.vertex_input.buffers.iter().enumerate() {
            vertex_buffers.push(vk::VertexInputBindingDescription {
                binding: i as u32,
                stride: vb.stride as u32,
                input_rate: conv::map_step_mode(vb.step_mode),
            });
            for at in vb.attributes.iter() {
                vertex_attributes.push(vk::VertexInputAttributeDescription {
                    location: at.shader_location,
                    binding: i as u32,
                    format: conv::map_vertex_format(at.format),
                    offset: at.offset as u32,
                });
            }
        }
        let vk_vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&vertex_buffers)
            .vertex_attribute_descriptions(&vertex_attributes);

        let vk_input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(conv::map_topology(desc.input_assembly.topology))
            .primitive_restart_enable(desc.input_assembly.primitive_restart);

        let raster = desc.rasterizer;
        let mut vk_rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(raster.depth_clamp)
            .polygon_mode(conv::map_polygon_mode(raster.polygon_mode))
            .cull_mode(conv::map_cull_face(raster.cull_mode))
            .front_face(conv::map_front_face(raster.front_face))
            .line_width(1.0);
        if let Some(ref bias) = raster.depth_bias {
            vk_rasterization = vk_rasterization
                .depth_bias_enable(true)
                .depth_bias_constant_factor(bias.constant as f32)
                .depth_bias_slope_factor(bias.slope_scale)
                .depth_bias_clamp(bias.clamp);
        }

        // viewport and scissor are always dynamic
        let vk_viewport = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let vk_dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let vk_multisample = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let mut vk_depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder();
        if let Some(ds) = desc.depth_stencil {
            if let Some(compare) = ds.depth_compare {
                vk_depth_stencil = vk_depth_stencil
                    .depth_test_enable(true)
                    .depth_write_enable(ds.depth_write_enabled)
                    .depth_compare_op(conv::map_comparison(compare));
            }
            if ds.stencil_enabled {
                let front = conv::map_stencil_face(
                    &ds.stencil_front,
                    ds.stencil_read_mask,
                    ds.stencil_write_mask,
                );
                let back = conv::map_stencil_face(
                    &ds.stencil_back,
                    ds.stencil_read_mask,
                    ds.stencil_write_mask,
                );
                vk_depth_stencil = vk_depth_stencil
                    .stencil_test_enable(true)
                    .front(front)
                    .back(back);
            }
        }

        let vk_attachments = desc
            .color_blend
            .attachments
            .iter()
            .map(|attachment| {
                let mut vk_attachment = vk::PipelineColorBlendAttachmentState::builder()
                    .color_write_mask(conv::map_color_writes(attachment.write_mask));
                if let Some(ref blend) = attachment.blend {
                    let (color_op, color_src, color_dst) =
                        conv::map_blend_component(&blend.color);
                    let (alpha_op, alpha_src, alpha_dst) =
                        conv::map_blend_component(&blend.alpha);
                    vk_attachment = vk_attachment
                        .blend_enable(true)
                        .color_blend_op(color_op)
                        .src_color_blend_factor(color_src)
                        .dst_color_blend_factor(color_dst)
                        .alpha_blend_op(alpha_op)
                        .src_alpha_blend_factor(alpha_src)
                        .dst_alpha_blend_factor(alpha_dst);
                }
                vk_attachment.build()
            })
            .collect::<ArrayVec<_, { crate::MAX_COLOR_ATTACHMENTS }>>();
        let vk_color_blend = vk::PipelineColorBlendStateCreateInfo::builder()
            .attachments(&vk_attachments)
            .blend_constants(desc.color_blend.constants);

        let vk_info = vk::GraphicsPipelineCreateInfo::builder()
            .layout(desc.layout.raw)
            .stages(&stages)
            .vertex_input_state(&vk_vertex_input)
            .input_assembly_state(&vk_input_assembly)
            .rasterization_state(&vk_rasterization)
            .viewport_state(&vk_viewport)
            .multisample_state(&vk_multisample)
            .depth_stencil_state(&vk_depth_stencil)
            .color_blend_state(&vk_color_blend)
            .dynamic_state(&vk_dynamic_state)
            .render_pass(desc.render_pass.raw)
            .subpass(0)
            .build();

        let mut raw_vec = self
            .shared
            .raw
            .create_graphics_pipelines(vk::PipelineCache::null(), &[vk_info], None)
            .map_err(|(_, result)| DeviceError::from(result))?;
        match raw_vec.pop() {
            Some(raw) => Ok(super::RenderPipeline { raw }),
            None => Err(DeviceError::Lost.into()),
        }
    }
    unsafe fn destroy_render_pipeline(&self, pipeline: super::RenderPipeline) {
        self.shared.raw.destroy_pipeline(pipeline.raw, None);
    }

    unsafe fn create_command_encoder(
        &self,
        desc: &hal::CommandEncoderDescriptor<super::Api>,
    ) -> DeviceResult<super::CommandEncoder> {
        let vk_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(desc.queue.family_index)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let raw = self.shared.raw.create_command_pool(&vk_info, None)?;

        Ok(super::CommandEncoder {
            raw,
            device: Arc::clone(&self.shared),
            active: vk::CommandBuffer::null(),
            free: Vec::new(),
        })
    }
    unsafe fn destroy_command_encoder(&self, encoder: super::CommandEncoder) {
        // command buffers are freed together with their pool
        self.shared.raw.destroy_command_pool(encoder.raw, None);
    }

    unsafe fn create_fence(&self) -> DeviceResult<super::Fence> {
        let vk_info = vk::FenceCreateInfo::builder();
        let raw = self.shared.raw.create_fence(&vk_info, None)?;
        Ok(super::Fence { raw })
    }
    unsafe fn destroy_fence(&self, fence: super::Fence) {
        self.shared.raw.destroy_fence(fence.raw, None);
    }
    unsafe fn wait(&self, fence: &super::Fence) -> DeviceResult<()> {
        self.shared
            .raw
            .wait_for_fences(&[fence.raw], true, !0)?;
        Ok(())
    }
}

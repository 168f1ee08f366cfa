/*!
# Vulkan backend.

Built on `ash`. Instance creation, physical device selection and device
creation happen outside of this crate: the device and its queues are
adopted from raw handles, and so are the resources the application
binds. Adopted handles remain owned by the caller.

Render passes, framebuffers, pipelines, command pools and fences are
created and destroyed here.
!*/

mod command;
mod conv;
mod device;

use ash::{version::DeviceV1_0, vk};

use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Api;

type DeviceResult<T> = Result<T, super::DeviceError>;

impl super::Api for Api {
    type Device = Device;
    type Queue = Queue;
    type CommandEncoder = CommandEncoder;
    type CommandBuffer = CommandBuffer;
    type Fence = Fence;

    type Buffer = Buffer;
    type Texture = Texture;
    type TextureView = TextureView;
    type ResourceSet = ResourceSet;
    type ShaderModule = ShaderModule;
    type PipelineLayout = PipelineLayout;

    type RenderPass = RenderPass;
    type RenderPipeline = RenderPipeline;
    type Framebuffer = Framebuffer;
}

struct DeviceShared {
    raw: ash::Device,
}

pub struct Device {
    shared: Arc<DeviceShared>,
}

impl Device {
    /// Adopts a logical device.
    ///
    /// # Safety
    ///
    /// - `raw` must outlive this object and everything created from it.
    pub unsafe fn from_raw(raw: ash::Device) -> Self {
        Self {
            shared: Arc::new(DeviceShared { raw }),
        }
    }

    pub fn raw_device(&self) -> &ash::Device {
        &self.shared.raw
    }
}

pub struct Queue {
    raw: vk::Queue,
    family_index: u32,
    device: Arc<DeviceShared>,
}

impl Queue {
    /// Adopts a queue of `device`.
    ///
    /// # Safety
    ///
    /// - `raw` must be a queue of the family `family_index`,
    ///   retrieved from the logical device `device` was adopted from.
    pub unsafe fn from_raw(device: &Device, raw: vk::Queue, family_index: u32) -> Self {
        Self {
            raw,
            family_index,
            device: Arc::clone(&device.shared),
        }
    }
}

pub struct CommandEncoder {
    raw: vk::CommandPool,
    device: Arc<DeviceShared>,
    active: vk::CommandBuffer,
    free: Vec<vk::CommandBuffer>,
}

#[derive(Debug)]
pub struct CommandBuffer {
    raw: vk::CommandBuffer,
}

#[derive(Debug)]
pub struct Fence {
    raw: vk::Fence,
}

macro_rules! raw_handle {
    ($(#[$meta:meta])* $name:ident => $raw:ty) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name {
            raw: $raw,
        }

        impl $name {
            /// Wraps a native handle without taking ownership of it.
            pub fn from_raw(raw: $raw) -> Self {
                Self { raw }
            }

            pub fn raw(&self) -> $raw {
                self.raw
            }
        }
    };
}

raw_handle!(Buffer => vk::Buffer);
raw_handle!(Texture => vk::Image);
raw_handle!(TextureView => vk::ImageView);
raw_handle!(
    /// A populated descriptor set.
    ResourceSet => vk::DescriptorSet
);
raw_handle!(ShaderModule => vk::ShaderModule);
raw_handle!(PipelineLayout => vk::PipelineLayout);
raw_handle!(Framebuffer => vk::Framebuffer);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderPass {
    raw: vk::RenderPass,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderPipeline {
    raw: vk::Pipeline,
}

impl super::Queue<Api> for Queue {
    unsafe fn submit(
        &mut self,
        command_buffer: &CommandBuffer,
        fence: &mut Fence,
    ) -> DeviceResult<()> {
        self.device.raw.reset_fences(&[fence.raw])?;
        let command_buffers = [command_buffer.raw];
        let vk_info = vk::SubmitInfo::builder()
            .command_buffers(&command_buffers)
            .build();
        self.device
            .raw
            .queue_submit(self.raw, &[vk_info], fence.raw)?;
        Ok(())
    }
}

impl From<vk::Result> for super::DeviceError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
                Self::OutOfMemory
            }
            vk::Result::ERROR_DEVICE_LOST => Self::Lost,
            _ => {
                log::warn!("Unrecognized device error {:?}", result);
                Self::Lost
            }
        }
    }
}

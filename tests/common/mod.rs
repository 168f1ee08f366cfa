//! Test utilities for driving the translation core on the empty backend.

use gfx_port::{
    hal::empty::{self, Call},
    Color, ColorAttachment, CommandList, Device, DeviceDescriptor, DeviceFlags, Extent, Format,
    LoadOp, ProgrammableStage, Queue, ShaderProgram, ShaderProgramDescriptor, StoreOp, Texture,
    TextureDescriptor, TextureView, TextureViewDescriptor,
};

use std::sync::Arc;

pub struct TestingContext {
    /// Shares the journal with the backend device owned by `device`.
    pub raw: empty::Device,
    pub device: Device<empty::Api>,
}

pub fn initialize_test(test_function: impl FnOnce(&mut TestingContext)) {
    // We don't actually care if it fails
    let _ = env_logger::builder().is_test(true).try_init();

    let raw = empty::Device::new();
    let device = Device::new(
        raw.clone(),
        &DeviceDescriptor {
            label: Some("test"),
            flags: DeviceFlags::VALIDATE_TRACKERS,
            command_chunk_capacity: 8,
        },
    );
    let mut ctx = TestingContext { raw, device };
    test_function(&mut ctx);
}

impl TestingContext {
    /// Creates a queue and discards the calls made while creating it.
    pub fn queue(&self) -> Queue<empty::Api> {
        let queue = self
            .device
            .create_queue(self.raw.create_queue(), Some("queue"))
            .unwrap();
        self.raw.take_journal();
        queue
    }

    pub fn list(&self) -> CommandList<empty::Api> {
        self.device.create_command_list(Some("list"))
    }

    pub fn texture(&self, format: Format, mips: u32, layers: u32) -> Arc<Texture<empty::Api>> {
        self.device.texture_from_raw(
            self.raw.create_resource(),
            &TextureDescriptor {
                label: None,
                extent: Extent {
                    width: 256,
                    height: 128,
                },
                mip_level_count: mips,
                array_layer_count: layers,
                format,
            },
        )
    }

    pub fn view(&self, texture: &Arc<Texture<empty::Api>>) -> Arc<TextureView<empty::Api>> {
        self.device.texture_view_from_raw(
            self.raw.create_resource(),
            texture,
            &TextureViewDescriptor::default(),
        )
    }

    /// A render target view over a fresh single-level texture.
    pub fn target(&self) -> Arc<TextureView<empty::Api>> {
        let texture = self.texture(Format::Rgba8Unorm, 1, 1);
        self.view(&texture)
    }

    pub fn program(&self) -> Arc<ShaderProgram<empty::Api>> {
        self.device.create_shader_program(ShaderProgramDescriptor {
            label: Some("program"),
            vertex: ProgrammableStage {
                module: self.raw.create_resource(),
                entry_point: "vs_main".to_string(),
            },
            fragment: Some(ProgrammableStage {
                module: self.raw.create_resource(),
                entry_point: "fs_main".to_string(),
            }),
            layout: self.raw.create_resource(),
        })
    }

    pub fn take_calls(&self) -> Vec<Call> {
        self.raw.take_journal()
    }
}

pub fn color(view: &Arc<TextureView<empty::Api>>) -> ColorAttachment<empty::Api> {
    ColorAttachment {
        view: Arc::clone(view),
        load_op: LoadOp::Clear,
        store_op: StoreOp::Store,
        clear_color: Color::TRANSPARENT,
    }
}

pub fn count(calls: &[Call], predicate: impl Fn(&Call) -> bool) -> usize {
    calls.iter().filter(|call| predicate(call)).count()
}

pub fn barriers(calls: &[Call]) -> Vec<Call> {
    calls
        .iter()
        .filter(|call| matches!(**call, Call::Barrier { .. }))
        .cloned()
        .collect()
}

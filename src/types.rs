/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Plain value types shared by the recording API, the caches and the backends.

use crate::MAX_COLOR_ATTACHMENTS;

use arrayvec::ArrayVec;
use bitflags::bitflags;

use std::ops::Range;

/// Texel formats usable as attachments or vertex-fetched textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgb10a2Unorm,
    R32Float,
    Rg32Float,
    Rgba16Float,
    Rgba32Float,
    Depth16Unorm,
    Depth32Float,
    Depth24PlusStencil8,
}

impl Format {
    pub fn aspects(self) -> FormatAspects {
        match self {
            Self::Depth16Unorm | Self::Depth32Float => FormatAspects::DEPTH,
            Self::Depth24PlusStencil8 => FormatAspects::DEPTH | FormatAspects::STENCIL,
            _ => FormatAspects::COLOR,
        }
    }

    pub fn is_depth_stencil(self) -> bool {
        !self.aspects().contains(FormatAspects::COLOR)
    }
}

bitflags!(
    /// Planes of a texture a view or barrier applies to.
    #[derive(Default)]
    pub struct FormatAspects: u8 {
        const COLOR = 1;
        const DEPTH = 2;
        const STENCIL = 4;
    }
);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Store,
    DontCare,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    /// Size of the given mip level of a surface with this extent.
    pub fn at_mip_level(self, level: u32) -> Self {
        Self {
            width: (self.width >> level).max(1),
            height: (self.height >> level).max(1),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClearValue {
    Color(Color),
    DepthStencil { depth: f32, stencil: u32 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect<T> {
    pub x: T,
    pub y: T,
    pub w: T,
    pub h: T,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    pub rect: Rect<f32>,
    pub depth: Range<f32>,
}

impl Viewport {
    pub fn from_extent(extent: Extent) -> Self {
        Self {
            rect: Rect {
                x: 0.0,
                y: 0.0,
                w: extent.width as f32,
                h: extent.height as f32,
            },
            depth: 0.0..1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

/// Description of a texture adopted from a native handle.
#[derive(Clone, Debug)]
pub struct TextureDescriptor<'a> {
    pub label: crate::Label<'a>,
    pub extent: Extent,
    pub mip_level_count: u32,
    pub array_layer_count: u32,
    pub format: Format,
}

#[derive(Clone, Debug, Default)]
pub struct TextureViewDescriptor<'a> {
    pub label: crate::Label<'a>,
    /// Defaults to the texture format.
    pub format: Option<Format>,
    /// Empty means all the aspects of the format.
    pub aspects: FormatAspects,
    pub base_mip_level: u32,
    /// Defaults to the remaining levels.
    pub mip_level_count: Option<u32>,
    pub base_array_layer: u32,
    /// Defaults to the remaining layers.
    pub array_layer_count: Option<u32>,
}

/// A block of mip levels and array layers of one texture.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubresourceRange {
    pub aspects: FormatAspects,
    pub mip_levels: Range<u32>,
    pub array_layers: Range<u32>,
}

// Synchronization

bitflags!(
    /// Memory accesses a resource state is made of.
    pub struct Access: u32 {
        const COLOR_ATTACHMENT_READ = 1 << 0;
        const COLOR_ATTACHMENT_WRITE = 1 << 1;
        const DEPTH_STENCIL_READ = 1 << 2;
        const DEPTH_STENCIL_WRITE = 1 << 3;
        const SHADER_READ = 1 << 4;
        const SHADER_WRITE = 1 << 5;
        const TRANSFER_READ = 1 << 6;
        const TRANSFER_WRITE = 1 << 7;
        const VERTEX_ATTRIBUTE_READ = 1 << 8;
        const INDEX_READ = 1 << 9;
        const HOST_READ = 1 << 10;
        const HOST_WRITE = 1 << 11;
        const WRITE_ALL = Self::COLOR_ATTACHMENT_WRITE.bits
            | Self::DEPTH_STENCIL_WRITE.bits
            | Self::SHADER_WRITE.bits
            | Self::TRANSFER_WRITE.bits
            | Self::HOST_WRITE.bits;
    }
);

bitflags!(
    /// Execution stages a resource state is bound to.
    pub struct PipelineStages: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const VERTEX_INPUT = 1 << 1;
        const VERTEX_SHADER = 1 << 2;
        const FRAGMENT_SHADER = 1 << 3;
        const EARLY_FRAGMENT_TESTS = 1 << 4;
        const LATE_FRAGMENT_TESTS = 1 << 5;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 6;
        const TRANSFER = 1 << 7;
        const HOST = 1 << 8;
        const BOTTOM_OF_PIPE = 1 << 9;
    }
);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureLayout {
    Undefined,
    General,
    ColorAttachment,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    Present,
}

/// Synchronization state of a texture subresource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureState {
    pub access: Access,
    pub stages: PipelineStages,
    pub layout: TextureLayout,
}

impl TextureState {
    pub const UNDEFINED: Self = Self {
        access: Access::empty(),
        stages: PipelineStages::TOP_OF_PIPE,
        layout: TextureLayout::Undefined,
    };
    pub const COLOR_ATTACHMENT: Self = Self {
        access: Access::from_bits_truncate(
            Access::COLOR_ATTACHMENT_READ.bits() | Access::COLOR_ATTACHMENT_WRITE.bits(),
        ),
        stages: PipelineStages::COLOR_ATTACHMENT_OUTPUT,
        layout: TextureLayout::ColorAttachment,
    };
    pub const DEPTH_STENCIL_ATTACHMENT: Self = Self {
        access: Access::from_bits_truncate(
            Access::DEPTH_STENCIL_READ.bits() | Access::DEPTH_STENCIL_WRITE.bits(),
        ),
        stages: PipelineStages::from_bits_truncate(
            PipelineStages::EARLY_FRAGMENT_TESTS.bits()
                | PipelineStages::LATE_FRAGMENT_TESTS.bits(),
        ),
        layout: TextureLayout::DepthStencilAttachment,
    };
    pub const SHADER_READ: Self = Self {
        access: Access::SHADER_READ,
        stages: PipelineStages::FRAGMENT_SHADER,
        layout: TextureLayout::ShaderReadOnly,
    };
    pub const TRANSFER_SRC: Self = Self {
        access: Access::TRANSFER_READ,
        stages: PipelineStages::TRANSFER,
        layout: TextureLayout::TransferSrc,
    };
    pub const TRANSFER_DST: Self = Self {
        access: Access::TRANSFER_WRITE,
        stages: PipelineStages::TRANSFER,
        layout: TextureLayout::TransferDst,
    };
    pub const PRESENT: Self = Self {
        access: Access::empty(),
        stages: PipelineStages::BOTTOM_OF_PIPE,
        layout: TextureLayout::Present,
    };

    /// Attachment state matching the aspects of a format.
    pub fn attachment(format: Format) -> Self {
        if format.is_depth_stencil() {
            Self::DEPTH_STENCIL_ATTACHMENT
        } else {
            Self::COLOR_ATTACHMENT
        }
    }

    pub fn is_write(&self) -> bool {
        self.access.intersects(Access::WRITE_ALL)
    }
}

// Fixed-function state descriptions

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    Fill,
    Line,
    Point,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    Front,
    Back,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrontFace {
    Ccw,
    Cw,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DepthBias {
    pub constant: i32,
    pub slope_scale: f32,
    pub clamp: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RasterizerDescriptor {
    pub polygon_mode: PolygonMode,
    pub cull_mode: Option<Face>,
    pub front_face: FrontFace,
    pub depth_bias: Option<DepthBias>,
    pub depth_clamp: bool,
}

impl Default for RasterizerDescriptor {
    fn default() -> Self {
        Self {
            polygon_mode: PolygonMode::Fill,
            cull_mode: None,
            front_face: FrontFace::Ccw,
            depth_bias: None,
            depth_clamp: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    Src,
    OneMinusSrc,
    SrcAlpha,
    OneMinusSrcAlpha,
    Dst,
    OneMinusDst,
    DstAlpha,
    OneMinusDstAlpha,
    Constant,
    OneMinusConstant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendOperation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub operation: BlendOperation,
}

impl BlendComponent {
    pub const REPLACE: Self = Self {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::Zero,
        operation: BlendOperation::Add,
    };
    pub const OVER: Self = Self {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::OneMinusSrcAlpha,
        operation: BlendOperation::Add,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

impl BlendState {
    pub const ALPHA_BLENDING: Self = Self {
        color: BlendComponent {
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            operation: BlendOperation::Add,
        },
        alpha: BlendComponent::OVER,
    };
}

bitflags!(
    pub struct ColorWrites: u8 {
        const RED = 1;
        const GREEN = 2;
        const BLUE = 4;
        const ALPHA = 8;
        const COLOR = 7;
        const ALL = 0xF;
    }
);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColorBlendAttachment {
    pub blend: Option<BlendState>,
    pub write_mask: ColorWrites,
}

impl Default for ColorBlendAttachment {
    fn default() -> Self {
        Self {
            blend: None,
            write_mask: ColorWrites::ALL,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColorBlendDescriptor {
    pub attachments: ArrayVec<ColorBlendAttachment, MAX_COLOR_ATTACHMENTS>,
    pub constants: [f32; 4],
}

impl ColorBlendDescriptor {
    /// Blending disabled and all channels written, for `count` attachments.
    pub fn opaque(count: usize) -> Self {
        Self {
            attachments: (0..count.min(MAX_COLOR_ATTACHMENTS))
                .map(|_| ColorBlendAttachment::default())
                .collect(),
            constants: [0.0; 4],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InputAssemblyDescriptor {
    pub topology: PrimitiveTopology,
    pub primitive_restart: bool,
}

impl Default for InputAssemblyDescriptor {
    fn default() -> Self {
        Self {
            topology: PrimitiveTopology::TriangleList,
            primitive_restart: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Uint8x4,
    Unorm8x4,
    Uint16x2,
    Uint16x4,
    Uint32,
    Uint32x2,
    Uint32x4,
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    pub const fn size(self) -> u64 {
        match self {
            Self::Uint8x4 | Self::Unorm8x4 | Self::Uint16x2 | Self::Uint32 | Self::Float32 => 4,
            Self::Uint16x4 | Self::Uint32x2 | Self::Float32x2 => 8,
            Self::Float32x3 => 12,
            Self::Uint32x4 | Self::Float32x4 => 16,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexStepMode {
    Vertex,
    Instance,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub format: VertexFormat,
    pub offset: u64,
    pub shader_location: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VertexBufferLayout {
    pub stride: u64,
    pub step_mode: VertexStepMode,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct VertexInputDescriptor {
    /// Buffer layouts, indexed by vertex buffer slot.
    pub buffers: Vec<VertexBufferLayout>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StencilOperation {
    Keep,
    Zero,
    Replace,
    Invert,
    IncrementClamp,
    DecrementClamp,
    IncrementWrap,
    DecrementWrap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StencilFaceState {
    pub compare: CompareFunction,
    pub fail_op: StencilOperation,
    pub depth_fail_op: StencilOperation,
    pub pass_op: StencilOperation,
}

impl StencilFaceState {
    pub const IGNORE: Self = Self {
        compare: CompareFunction::Always,
        fail_op: StencilOperation::Keep,
        depth_fail_op: StencilOperation::Keep,
        pass_op: StencilOperation::Keep,
    };
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DepthStencilDescriptor {
    /// `None` disables the depth test.
    pub depth_compare: Option<CompareFunction>,
    pub depth_write_enabled: bool,
    pub stencil_enabled: bool,
    pub stencil_front: StencilFaceState,
    pub stencil_back: StencilFaceState,
    pub stencil_read_mask: u32,
    pub stencil_write_mask: u32,
}

impl Default for DepthStencilDescriptor {
    fn default() -> Self {
        Self {
            depth_compare: None,
            depth_write_enabled: false,
            stencil_enabled: false,
            stencil_front: StencilFaceState::IGNORE,
            stencil_back: StencilFaceState::IGNORE,
            stencil_read_mask: !0,
            stencil_write_mask: !0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn format_aspects() {
        assert_eq!(Format::Rgba8Unorm.aspects(), FormatAspects::COLOR);
        assert!(Format::Depth24PlusStencil8.is_depth_stencil());
        assert_eq!(
            Format::Depth24PlusStencil8.aspects(),
            FormatAspects::DEPTH | FormatAspects::STENCIL
        );
    }

    #[test]
    fn default_view_selects_every_aspect() {
        let desc = TextureViewDescriptor::default();
        assert!(desc.aspects.is_empty());
        assert_eq!(desc.format, None);
        assert_eq!(desc.mip_level_count, None);
    }

    #[test]
    fn attachment_states() {
        assert!(TextureState::COLOR_ATTACHMENT.is_write());
        assert!(TextureState::DEPTH_STENCIL_ATTACHMENT.is_write());
        assert!(!TextureState::SHADER_READ.is_write());
        assert_eq!(
            TextureState::attachment(Format::Depth32Float),
            TextureState::DEPTH_STENCIL_ATTACHMENT
        );
    }

    #[test]
    fn mip_extent() {
        let extent = Extent {
            width: 64,
            height: 16,
        };
        assert_eq!(
            extent.at_mip_level(5),
            Extent {
                width: 2,
                height: 1
            }
        );
    }
}

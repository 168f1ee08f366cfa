use crate::{
    Access, BlendComponent, BlendFactor, BlendOperation, ClearValue, ColorWrites,
    CompareFunction, Face, Format, FormatAspects, FrontFace, IndexFormat, LoadOp, PipelineStages,
    PolygonMode, PrimitiveTopology, StencilFaceState, StencilOperation, StoreOp,
    SubresourceRange, TextureLayout, VertexFormat, VertexStepMode,
};

use ash::vk;

pub fn map_texture_format(format: Format) -> vk::Format {
    use ash::vk::Format as F;
    match format {
        Format::R8Unorm => F::R8_UNORM,
        Format::Rg8Unorm => F::R8G8_UNORM,
        Format::Rgba8Unorm => F::R8G8B8A8_UNORM,
        Format::Rgba8UnormSrgb => F::R8G8B8A8_SRGB,
        Format::Bgra8Unorm => F::B8G8R8A8_UNORM,
        Format::Bgra8UnormSrgb => F::B8G8R8A8_SRGB,
        Format::Rgb10a2Unorm => F::A2B10G10R10_UNORM_PACK32,
        Format::R32Float => F::R32_SFLOAT,
        Format::Rg32Float => F::R32G32_SFLOAT,
        Format::Rgba16Float => F::R16G16B16A16_SFLOAT,
        Format::Rgba32Float => F::R32G32B32A32_SFLOAT,
        Format::Depth16Unorm => F::D16_UNORM,
        Format::Depth32Float => F::D32_SFLOAT,
        Format::Depth24PlusStencil8 => F::D24_UNORM_S8_UINT,
    }
}

pub fn map_aspects(aspects: FormatAspects) -> vk::ImageAspectFlags {
    let mut flags = vk::ImageAspectFlags::empty();
    if aspects.contains(FormatAspects::COLOR) {
        flags |= vk::ImageAspectFlags::COLOR;
    }
    if aspects.contains(FormatAspects::DEPTH) {
        flags |= vk::ImageAspectFlags::DEPTH;
    }
    if aspects.contains(FormatAspects::STENCIL) {
        flags |= vk::ImageAspectFlags::STENCIL;
    }
    flags
}

pub fn map_subresource_range(range: &SubresourceRange) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: map_aspects(range.aspects),
        base_mip_level: range.mip_levels.start,
        level_count: range.mip_levels.end - range.mip_levels.start,
        base_array_layer: range.array_layers.start,
        layer_count: range.array_layers.end - range.array_layers.start,
    }
}

pub fn map_load_op(op: LoadOp) -> vk::AttachmentLoadOp {
    match op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub fn map_store_op(op: StoreOp) -> vk::AttachmentStoreOp {
    match op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

pub fn map_texture_layout(layout: TextureLayout) -> vk::ImageLayout {
    match layout {
        TextureLayout::Undefined => vk::ImageLayout::UNDEFINED,
        TextureLayout::General => vk::ImageLayout::GENERAL,
        TextureLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        TextureLayout::DepthStencilAttachment => {
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        }
        TextureLayout::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        TextureLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        TextureLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        TextureLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        TextureLayout::Present => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

pub fn map_access(access: Access) -> vk::AccessFlags {
    let mut flags = vk::AccessFlags::empty();
    if access.contains(Access::COLOR_ATTACHMENT_READ) {
        flags |= vk::AccessFlags::COLOR_ATTACHMENT_READ;
    }
    if access.contains(Access::COLOR_ATTACHMENT_WRITE) {
        flags |= vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
    }
    if access.contains(Access::DEPTH_STENCIL_READ) {
        flags |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ;
    }
    if access.contains(Access::DEPTH_STENCIL_WRITE) {
        flags |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
    }
    if access.contains(Access::SHADER_READ) {
        flags |= vk::AccessFlags::SHADER_READ;
    }
    if access.contains(Access::SHADER_WRITE) {
        flags |= vk::AccessFlags::SHADER_WRITE;
    }
    if access.contains(Access::TRANSFER_READ) {
        flags |= vk::AccessFlags::TRANSFER_READ;
    }
    if access.contains(Access::TRANSFER_WRITE) {
        flags |= vk::AccessFlags::TRANSFER_WRITE;
    }
    if access.contains(Access::VERTEX_ATTRIBUTE_READ) {
        flags |= vk::AccessFlags::VERTEX_ATTRIBUTE_READ;
    }
    if access.contains(Access::INDEX_READ) {
        flags |= vk::AccessFlags::INDEX_READ;
    }
    if access.contains(Access::HOST_READ) {
        flags |= vk::AccessFlags::HOST_READ;
    }
    if access.contains(Access::HOST_WRITE) {
        flags |= vk::AccessFlags::HOST_WRITE;
    }
    flags
}

pub fn map_pipeline_stages(stages: PipelineStages) -> vk::PipelineStageFlags {
    let mut flags = vk::PipelineStageFlags::empty();
    if stages.contains(PipelineStages::TOP_OF_PIPE) {
        flags |= vk::PipelineStageFlags::TOP_OF_PIPE;
    }
    if stages.contains(PipelineStages::VERTEX_INPUT) {
        flags |= vk::PipelineStageFlags::VERTEX_INPUT;
    }
    if stages.contains(PipelineStages::VERTEX_SHADER) {
        flags |= vk::PipelineStageFlags::VERTEX_SHADER;
    }
    if stages.contains(PipelineStages::FRAGMENT_SHADER) {
        flags |= vk::PipelineStageFlags::FRAGMENT_SHADER;
    }
    if stages.contains(PipelineStages::EARLY_FRAGMENT_TESTS) {
        flags |= vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    }
    if stages.contains(PipelineStages::LATE_FRAGMENT_TESTS) {
        flags |= vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
    }
    if stages.contains(PipelineStages::COLOR_ATTACHMENT_OUTPUT) {
        flags |= vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
    }
    if stages.contains(PipelineStages::TRANSFER) {
        flags |= vk::PipelineStageFlags::TRANSFER;
    }
    if stages.contains(PipelineStages::HOST) {
        flags |= vk::PipelineStageFlags::HOST;
    }
    if stages.contains(PipelineStages::BOTTOM_OF_PIPE) {
        flags |= vk::PipelineStageFlags::BOTTOM_OF_PIPE;
    }
    flags
}

pub fn map_clear_value(value: &ClearValue) -> vk::ClearValue {
    match *value {
        ClearValue::Color(color) => vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [
                    color.r as f32,
                    color.g as f32,
                    color.b as f32,
                    color.a as f32,
                ],
            },
        },
        ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
        },
    }
}

pub fn map_index_format(index_format: IndexFormat) -> vk::IndexType {
    match index_format {
        IndexFormat::Uint16 => vk::IndexType::UINT16,
        IndexFormat::Uint32 => vk::IndexType::UINT32,
    }
}

pub fn map_vertex_format(vertex_format: VertexFormat) -> vk::Format {
    use VertexFormat as Vf;
    match vertex_format {
        Vf::Uint8x4 => vk::Format::R8G8B8A8_UINT,
        Vf::Unorm8x4 => vk::Format::R8G8B8A8_UNORM,
        Vf::Uint16x2 => vk::Format::R16G16_UINT,
        Vf::Uint16x4 => vk::Format::R16G16B16A16_UINT,
        Vf::Uint32 => vk::Format::R32_UINT,
        Vf::Uint32x2 => vk::Format::R32G32_UINT,
        Vf::Uint32x4 => vk::Format::R32G32B32A32_UINT,
        Vf::Float32 => vk::Format::R32_SFLOAT,
        Vf::Float32x2 => vk::Format::R32G32_SFLOAT,
        Vf::Float32x3 => vk::Format::R32G32B32_SFLOAT,
        Vf::Float32x4 => vk::Format::R32G32B32A32_SFLOAT,
    }
}

pub fn map_step_mode(mode: VertexStepMode) -> vk::VertexInputRate {
    match mode {
        VertexStepMode::Vertex => vk::VertexInputRate::VERTEX,
        VertexStepMode::Instance => vk::VertexInputRate::INSTANCE,
    }
}

pub fn map_comparison(fun: CompareFunction) -> vk::CompareOp {
    use CompareFunction as Cf;
    match fun {
        Cf::Never => vk::CompareOp::NEVER,
        Cf::Less => vk::CompareOp::LESS,
        Cf::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        Cf::Equal => vk::CompareOp::EQUAL,
        Cf::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        Cf::Greater => vk::CompareOp::GREATER,
        Cf::NotEqual => vk::CompareOp::NOT_EQUAL,
        Cf::Always => vk::CompareOp::ALWAYS,
    }
}

pub fn map_topology(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    use PrimitiveTopology as Pt;
    match topology {
        Pt::PointList => vk::PrimitiveTopology::POINT_LIST,
        Pt::LineList => vk::PrimitiveTopology::LINE_LIST,
        Pt::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        Pt::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        Pt::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
    }
}

pub fn map_polygon_mode(mode: PolygonMode) -> vk::PolygonMode {
    match mode {
        PolygonMode::Fill => vk::PolygonMode::FILL,
        PolygonMode::Line => vk::PolygonMode::LINE,
        PolygonMode::Point => vk::PolygonMode::POINT,
    }
}

pub fn map_front_face(front_face: FrontFace) -> vk::FrontFace {
    match front_face {
        FrontFace::Cw => vk::FrontFace::CLOCKWISE,
        FrontFace::Ccw => vk::FrontFace::COUNTER_CLOCKWISE,
    }
}

pub fn map_cull_face(face: Option<Face>) -> vk::CullModeFlags {
    match face {
        None => vk::CullModeFlags::NONE,
        Some(Face::Front) => vk::CullModeFlags::FRONT,
        Some(Face::Back) => vk::CullModeFlags::BACK,
    }
}

pub fn map_stencil_op(op: StencilOperation) -> vk::StencilOp {
    use StencilOperation as So;
    match op {
        So::Keep => vk::StencilOp::KEEP,
        So::Zero => vk::StencilOp::ZERO,
        So::Replace => vk::StencilOp::REPLACE,
        So::Invert => vk::StencilOp::INVERT,
        So::IncrementClamp => vk::StencilOp::INCREMENT_AND_CLAMP,
        So::IncrementWrap => vk::StencilOp::INCREMENT_AND_WRAP,
        So::DecrementClamp => vk::StencilOp::DECREMENT_AND_CLAMP,
        So::DecrementWrap => vk::StencilOp::DECREMENT_AND_WRAP,
    }
}

pub fn map_stencil_face(
    face: &StencilFaceState,
    compare_mask: u32,
    write_mask: u32,
) -> vk::StencilOpState {
    vk::StencilOpState {
        fail_op: map_stencil_op(face.fail_op),
        pass_op: map_stencil_op(face.pass_op),
        depth_fail_op: map_stencil_op(face.depth_fail_op),
        compare_op: map_comparison(face.compare),
        compare_mask,
        write_mask,
        reference: 0,
    }
}

fn map_blend_factor(factor: BlendFactor) -> vk::BlendFactor {
    use BlendFactor as Bf;
    match factor {
        Bf::Zero => vk::BlendFactor::ZERO,
        Bf::One => vk::BlendFactor::ONE,
        Bf::Src => vk::BlendFactor::SRC_COLOR,
        Bf::OneMinusSrc => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        Bf::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        Bf::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        Bf::Dst => vk::BlendFactor::DST_COLOR,
        Bf::OneMinusDst => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        Bf::DstAlpha => vk::BlendFactor::DST_ALPHA,
        Bf::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        Bf::Constant => vk::BlendFactor::CONSTANT_COLOR,
        Bf::OneMinusConstant => vk::BlendFactor::ONE_MINUS_CONSTANT_COLOR,
    }
}

fn map_blend_op(operation: BlendOperation) -> vk::BlendOp {
    use BlendOperation as Bo;
    match operation {
        Bo::Add => vk::BlendOp::ADD,
        Bo::Subtract => vk::BlendOp::SUBTRACT,
        Bo::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        Bo::Min => vk::BlendOp::MIN,
        Bo::Max => vk::BlendOp::MAX,
    }
}

pub fn map_blend_component(
    component: &BlendComponent,
) -> (vk::BlendOp, vk::BlendFactor, vk::BlendFactor) {
    let op = map_blend_op(component.operation);
    let src = map_blend_factor(component.src_factor);
    let dst = map_blend_factor(component.dst_factor);
    (op, src, dst)
}

pub fn map_color_writes(mask: ColorWrites) -> vk::ColorComponentFlags {
    let mut flags = vk::ColorComponentFlags::empty();
    if mask.contains(ColorWrites::RED) {
        flags |= vk::ColorComponentFlags::R;
    }
    if mask.contains(ColorWrites::GREEN) {
        flags |= vk::ColorComponentFlags::G;
    }
    if mask.contains(ColorWrites::BLUE) {
        flags |= vk::ColorComponentFlags::B;
    }
    if mask.contains(ColorWrites::ALPHA) {
        flags |= vk::ColorComponentFlags::A;
    }
    flags
}

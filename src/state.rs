/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Immutable pipeline state objects.
//!
//! Each object gets a device-unique identity at creation. Pipeline queries
//! are keyed by these identities, so two objects with equal descriptions
//! still produce distinct pipelines.

use crate::{
    hal, id::IdentityManager, ColorBlendDescriptor, DepthStencilDescriptor,
    InputAssemblyDescriptor, Label, ObjectId, RasterizerDescriptor, VertexInputDescriptor,
    MAX_COLOR_ATTACHMENTS,
};

use arrayvec::ArrayVec;

use std::{fmt, sync::Arc};

state_object!(
    /// Polygon mode, culling and depth bias.
    RasterizerState => RasterizerDescriptor
);
state_object!(
    /// Per-attachment blending. The attachment count must match the
    /// colour attachment count of the render pass it is used in.
    ColorBlendState => ColorBlendDescriptor
);
state_object!(InputAssemblyState => InputAssemblyDescriptor);
state_object!(VertexInputState => VertexInputDescriptor);
state_object!(DepthStencilState => DepthStencilDescriptor);

impl ColorBlendState {
    pub fn attachment_count(&self) -> usize {
        self.desc.attachments.len()
    }
}

/// A shader module entry point.
#[derive(Debug)]
pub struct ProgrammableStage<A: hal::Api> {
    pub module: A::ShaderModule,
    pub entry_point: String,
}

impl<A: hal::Api> ProgrammableStage<A> {
    fn to_hal(&self) -> hal::ProgrammableStage<A> {
        hal::ProgrammableStage {
            module: &self.module,
            entry_point: &self.entry_point,
        }
    }
}

#[derive(Debug)]
pub struct ShaderProgramDescriptor<'a, A: hal::Api> {
    pub label: Label<'a>,
    pub vertex: ProgrammableStage<A>,
    pub fragment: Option<ProgrammableStage<A>>,
    /// Layout of the resource sets the program reads.
    pub layout: A::PipelineLayout,
}

/// Linked vertex and fragment stages, with their resource layout.
pub struct ShaderProgram<A: hal::Api> {
    id: ObjectId,
    label: Option<String>,
    vertex: ProgrammableStage<A>,
    fragment: Option<ProgrammableStage<A>>,
    layout: A::PipelineLayout,
}

impl<A: hal::Api> ShaderProgram<A> {
    pub(crate) fn new(id: ObjectId, desc: ShaderProgramDescriptor<A>) -> Self {
        Self {
            id,
            label: desc.label.map(str::to_string),
            vertex: desc.vertex,
            fragment: desc.fragment,
            layout: desc.layout,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn layout(&self) -> &A::PipelineLayout {
        &self.layout
    }

    pub(crate) fn vertex_stage(&self) -> hal::ProgrammableStage<A> {
        self.vertex.to_hal()
    }

    pub(crate) fn fragment_stage(&self) -> Option<hal::ProgrammableStage<A>> {
        self.fragment.as_ref().map(ProgrammableStage::to_hal)
    }
}

impl<A: hal::Api> fmt::Debug for ShaderProgram<A> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("ShaderProgram")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

/// State objects injected at the start of every render pass.
#[derive(Debug)]
pub struct DefaultStates {
    pub rasterizer: Arc<RasterizerState>,
    /// Opaque blending, indexed by colour attachment count.
    color_blend: ArrayVec<Arc<ColorBlendState>, { MAX_COLOR_ATTACHMENTS + 1 }>,
    pub input_assembly: Arc<InputAssemblyState>,
    pub vertex_input: Arc<VertexInputState>,
    pub depth_stencil: Arc<DepthStencilState>,
}

impl DefaultStates {
    pub(crate) fn new(ids: &IdentityManager) -> Self {
        Self {
            rasterizer: Arc::new(RasterizerState::new(
                ids.alloc(),
                RasterizerDescriptor::default(),
            )),
            color_blend: (0..=MAX_COLOR_ATTACHMENTS)
                .map(|count| {
                    Arc::new(ColorBlendState::new(
                        ids.alloc(),
                        ColorBlendDescriptor::opaque(count),
                    ))
                })
                .collect(),
            input_assembly: Arc::new(InputAssemblyState::new(
                ids.alloc(),
                InputAssemblyDescriptor::default(),
            )),
            vertex_input: Arc::new(VertexInputState::new(
                ids.alloc(),
                VertexInputDescriptor::default(),
            )),
            depth_stencil: Arc::new(DepthStencilState::new(
                ids.alloc(),
                DepthStencilDescriptor::default(),
            )),
        }
    }

    /// Opaque colour blend state for `attachment_count` attachments.
    pub fn color_blend(&self, attachment_count: usize) -> &Arc<ColorBlendState> {
        &self.color_blend[attachment_count.min(MAX_COLOR_ATTACHMENTS)]
    }
}

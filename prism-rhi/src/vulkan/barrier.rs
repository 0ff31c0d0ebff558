//! Resource states lowered to sync2 stage/access/layout triples.

use ash::vk;
use ash::vk::Handle;
use prism_core::collections::{smallvec, SmallVec};
use crate::barrier::{project_states, uniform, PendingBarrier};
use crate::resource::{GpuResource, TextureAspect, TextureInfo};
use crate::state::{ResourceState, Subresource};

/// How a resource in some [`ResourceState`] is accessed on Vulkan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VulkanAccess {
    pub stages: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
    /// Only meaningful for images.
    pub layout: vk::ImageLayout,
}

impl VulkanAccess {
    const fn new(stages: vk::PipelineStageFlags2, access: vk::AccessFlags2, layout: vk::ImageLayout) -> Self {
        Self { stages, access, layout }
    }
}

const SHADER_STAGES: vk::PipelineStageFlags2 = vk::PipelineStageFlags2::from_raw(
    vk::PipelineStageFlags2::VERTEX_SHADER.as_raw()
        | vk::PipelineStageFlags2::FRAGMENT_SHADER.as_raw()
        | vk::PipelineStageFlags2::COMPUTE_SHADER.as_raw(),
);

const SHADER_READ: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
    vk::AccessFlags2::SHADER_SAMPLED_READ.as_raw() | vk::AccessFlags2::SHADER_STORAGE_READ.as_raw(),
);

pub fn vulkan_access(state: ResourceState) -> VulkanAccess {
    type S = vk::PipelineStageFlags2;
    type A = vk::AccessFlags2;
    type L = vk::ImageLayout;

    match state {
        ResourceState::Undefined => VulkanAccess::new(S::NONE, A::NONE, L::UNDEFINED),
        ResourceState::Common => VulkanAccess::new(S::ALL_COMMANDS, A::MEMORY_READ | A::MEMORY_WRITE, L::GENERAL),
        ResourceState::CopySource => VulkanAccess::new(S::TRANSFER, A::TRANSFER_READ, L::TRANSFER_SRC_OPTIMAL),
        ResourceState::CopyDestination => VulkanAccess::new(S::TRANSFER, A::TRANSFER_WRITE, L::TRANSFER_DST_OPTIMAL),
        ResourceState::VertexOrConstantBuffer => VulkanAccess::new(
            S::VERTEX_ATTRIBUTE_INPUT | SHADER_STAGES,
            A::VERTEX_ATTRIBUTE_READ | A::UNIFORM_READ,
            L::GENERAL,
        ),
        ResourceState::IndexBuffer => VulkanAccess::new(S::INDEX_INPUT, A::INDEX_READ, L::GENERAL),
        ResourceState::RenderTarget => VulkanAccess::new(
            S::COLOR_ATTACHMENT_OUTPUT,
            A::COLOR_ATTACHMENT_READ | A::COLOR_ATTACHMENT_WRITE,
            L::COLOR_ATTACHMENT_OPTIMAL,
        ),
        ResourceState::DepthWrite => VulkanAccess::new(
            S::EARLY_FRAGMENT_TESTS | S::LATE_FRAGMENT_TESTS,
            A::DEPTH_STENCIL_ATTACHMENT_READ | A::DEPTH_STENCIL_ATTACHMENT_WRITE,
            L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ),
        ResourceState::DepthRead => VulkanAccess::new(
            S::EARLY_FRAGMENT_TESTS | S::LATE_FRAGMENT_TESTS | SHADER_STAGES,
            A::DEPTH_STENCIL_ATTACHMENT_READ | SHADER_READ,
            L::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        ),
        ResourceState::UnorderedAccess => VulkanAccess::new(
            SHADER_STAGES,
            A::SHADER_STORAGE_READ | A::SHADER_STORAGE_WRITE,
            L::GENERAL,
        ),
        ResourceState::ShaderResource => VulkanAccess::new(SHADER_STAGES, SHADER_READ, L::SHADER_READ_ONLY_OPTIMAL),
        ResourceState::PixelShaderResource => {
            VulkanAccess::new(S::FRAGMENT_SHADER, SHADER_READ, L::SHADER_READ_ONLY_OPTIMAL)
        }
        ResourceState::NonPixelShaderResource => VulkanAccess::new(
            S::VERTEX_SHADER | S::COMPUTE_SHADER,
            SHADER_READ,
            L::SHADER_READ_ONLY_OPTIMAL,
        ),
        ResourceState::Present => VulkanAccess::new(S::NONE, A::NONE, L::PRESENT_SRC_KHR),
        ResourceState::GenericRead => VulkanAccess::new(S::ALL_COMMANDS, A::MEMORY_READ, L::GENERAL),
        ResourceState::Predication => {
            VulkanAccess::new(S::CONDITIONAL_RENDERING_EXT, A::CONDITIONAL_RENDERING_READ_EXT, L::GENERAL)
        }
        ResourceState::IndirectArgument => VulkanAccess::new(S::DRAW_INDIRECT, A::INDIRECT_COMMAND_READ, L::GENERAL),
        ResourceState::ResolveSource => VulkanAccess::new(S::TRANSFER, A::TRANSFER_READ, L::TRANSFER_SRC_OPTIMAL),
        ResourceState::ResolveDestination => {
            VulkanAccess::new(S::TRANSFER, A::TRANSFER_WRITE, L::TRANSFER_DST_OPTIMAL)
        }
        ResourceState::RaytracingAccelerationStructure => VulkanAccess::new(
            S::ACCELERATION_STRUCTURE_BUILD_KHR | S::RAY_TRACING_SHADER_KHR,
            A::ACCELERATION_STRUCTURE_READ_KHR | A::ACCELERATION_STRUCTURE_WRITE_KHR,
            L::GENERAL,
        ),
        ResourceState::ShadingRateSource => VulkanAccess::new(
            S::FRAGMENT_SHADING_RATE_ATTACHMENT_KHR,
            A::FRAGMENT_SHADING_RATE_ATTACHMENT_READ_KHR,
            L::FRAGMENT_SHADING_RATE_ATTACHMENT_OPTIMAL_KHR,
        ),
    }
}

/// Flush all memory writes so they are visible to subsequent GPU operations.
pub fn flush_all_memory_writes() -> vk::MemoryBarrier2<'static> {
    vk::MemoryBarrier2::default()
        .src_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
        .src_access_mask(vk::AccessFlags2::MEMORY_WRITE)
        .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
        .dst_access_mask(vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE)
}

fn aspect_mask(aspect: TextureAspect) -> vk::ImageAspectFlags {
    match aspect {
        TextureAspect::Color => vk::ImageAspectFlags::COLOR,
        TextureAspect::Depth => vk::ImageAspectFlags::DEPTH,
        TextureAspect::Stencil => vk::ImageAspectFlags::STENCIL,
        TextureAspect::DepthStencil => vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
    }
}

fn subresource_range(info: TextureInfo, subresource: Subresource) -> vk::ImageSubresourceRange {
    let range = vk::ImageSubresourceRange::default().aspect_mask(aspect_mask(info.aspect));
    match subresource {
        Subresource::All => range
            .base_mip_level(0)
            .level_count(vk::REMAINING_MIP_LEVELS)
            .base_array_layer(0)
            .layer_count(vk::REMAINING_ARRAY_LAYERS),
        Subresource::Index(index) => {
            let (mip, layer) = Subresource::decompose(index, info.mip_levels);
            range.base_mip_level(mip).level_count(1).base_array_layer(layer).layer_count(1)
        }
    }
}

fn buffer_barrier(resource: &GpuResource, src: VulkanAccess, dst: VulkanAccess) -> vk::BufferMemoryBarrier2<'static> {
    vk::BufferMemoryBarrier2::default()
        .src_stage_mask(src.stages)
        .src_access_mask(src.access)
        .dst_stage_mask(dst.stages)
        .dst_access_mask(dst.access)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .buffer(vk::Buffer::from_raw(resource.handle().0))
        .offset(0)
        .size(vk::WHOLE_SIZE)
}

fn image_barrier(
    resource: &GpuResource,
    info: TextureInfo,
    subresource: Subresource,
    src: VulkanAccess,
    dst: VulkanAccess,
) -> vk::ImageMemoryBarrier2<'static> {
    vk::ImageMemoryBarrier2::default()
        .src_stage_mask(src.stages)
        .src_access_mask(src.access)
        .dst_stage_mask(dst.stages)
        .dst_access_mask(dst.access)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .old_layout(src.layout)
        .new_layout(dst.layout)
        .image(vk::Image::from_raw(resource.handle().0))
        .subresource_range(subresource_range(info, subresource))
}

/// One `VkDependencyInfo` worth of barriers.
#[derive(Default)]
pub struct VulkanBarriers {
    pub memory: SmallVec<[vk::MemoryBarrier2<'static>; 2]>,
    pub buffers: SmallVec<[vk::BufferMemoryBarrier2<'static>; 8]>,
    pub images: SmallVec<[vk::ImageMemoryBarrier2<'static>; 8]>,
}

impl VulkanBarriers {
    pub fn from_pending(barriers: &[PendingBarrier]) -> Self {
        let mut out = Self::default();
        for (index, barrier) in barriers.iter().enumerate() {
            out.push_after(barrier, &barriers[..index]);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty() && self.buffers.is_empty() && self.images.is_empty()
    }

    pub fn len(&self) -> usize {
        self.memory.len() + self.buffers.len() + self.images.len()
    }

    /// Translate a barrier recorded on its own, against committed resource states.
    pub fn push(&mut self, barrier: &PendingBarrier) {
        self.push_after(barrier, &[]);
    }

    /// `earlier` are the barriers recorded before `barrier` in the same batch.
    fn push_after(&mut self, barrier: &PendingBarrier, earlier: &[PendingBarrier]) {
        match barrier {
            PendingBarrier::Transition { resource, before, after, subresource } => {
                let src = vulkan_access(*before);
                let dst = vulkan_access(*after);
                match resource.texture_info() {
                    Some(info) => self.images.push(image_barrier(resource, info, *subresource, src, dst)),
                    None => self.buffers.push(buffer_barrier(resource, src, dst)),
                }
            }
            PendingBarrier::Aliasing { after, .. } => {
                self.memory.push(flush_all_memory_writes());
                // Aliased images start with undefined contents.
                if let Some(info) = after.texture_info() {
                    let src = vulkan_access(ResourceState::Undefined);
                    let states = project_states(after, earlier);
                    let targets: SmallVec<[(Subresource, ResourceState); 16]> = match uniform(&states) {
                        Some(state) => smallvec![(Subresource::All, state)],
                        None => states
                            .iter()
                            .enumerate()
                            .map(|(index, state)| (Subresource::Index(index as u32), *state))
                            .collect(),
                    };
                    for (subresource, state) in targets {
                        let dst = vulkan_access(state);
                        if dst.layout != vk::ImageLayout::UNDEFINED {
                            self.images.push(image_barrier(after, info, subresource, src, dst));
                        }
                    }
                }
            }
            PendingBarrier::Uav { resource } => {
                let src = VulkanAccess::new(SHADER_STAGES, vk::AccessFlags2::SHADER_STORAGE_WRITE, vk::ImageLayout::GENERAL);
                let dst = vulkan_access(ResourceState::UnorderedAccess);
                match resource.texture_info() {
                    Some(info) => self.images.push(image_barrier(resource, info, Subresource::All, src, dst)),
                    None => self.buffers.push(buffer_barrier(resource, src, dst)),
                }
            }
        }
    }

    pub fn dependency_info(&self) -> vk::DependencyInfo<'_> {
        vk::DependencyInfo::default()
            .memory_barriers(&self.memory)
            .buffer_memory_barriers(&self.buffers)
            .image_memory_barriers(&self.images)
    }
}

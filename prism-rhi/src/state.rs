//! Semantic resource states tracked on every GPU buffer and texture.

/// Usage state of a GPU resource.
///
/// This is the closed set both backends can express. Each backend maps it to its own
/// representation: D3D12 resource-state bits, or a Vulkan (stage, access, layout) triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ResourceState {
    Undefined,
    Common,
    CopySource,
    CopyDestination,
    VertexOrConstantBuffer,
    IndexBuffer,
    RenderTarget,
    DepthWrite,
    DepthRead,
    UnorderedAccess,
    /// Readable from every shader stage.
    ShaderResource,
    PixelShaderResource,
    NonPixelShaderResource,
    Present,
    GenericRead,
    Predication,
    IndirectArgument,
    ResolveSource,
    ResolveDestination,
    RaytracingAccelerationStructure,
    ShadingRateSource,
}

impl ResourceState {
    pub const ALL: [ResourceState; 21] = [
        ResourceState::Undefined,
        ResourceState::Common,
        ResourceState::CopySource,
        ResourceState::CopyDestination,
        ResourceState::VertexOrConstantBuffer,
        ResourceState::IndexBuffer,
        ResourceState::RenderTarget,
        ResourceState::DepthWrite,
        ResourceState::DepthRead,
        ResourceState::UnorderedAccess,
        ResourceState::ShaderResource,
        ResourceState::PixelShaderResource,
        ResourceState::NonPixelShaderResource,
        ResourceState::Present,
        ResourceState::GenericRead,
        ResourceState::Predication,
        ResourceState::IndirectArgument,
        ResourceState::ResolveSource,
        ResourceState::ResolveDestination,
        ResourceState::RaytracingAccelerationStructure,
        ResourceState::ShadingRateSource,
    ];

    /// True if the GPU may write to the resource while it is in this state.
    pub fn is_writable(self) -> bool {
        matches!(
            self,
            ResourceState::Common
                | ResourceState::CopyDestination
                | ResourceState::RenderTarget
                | ResourceState::DepthWrite
                | ResourceState::UnorderedAccess
                | ResourceState::ResolveDestination
                | ResourceState::RaytracingAccelerationStructure
        )
    }
}

/// Which part of a resource a transition applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Subresource {
    #[default]
    All,
    /// Flat subresource index, `mip + array_layer * mip_levels`.
    Index(u32),
}

impl Subresource {
    pub fn of(mip: u32, array_layer: u32, mip_levels: u32) -> Self {
        Subresource::Index(mip + array_layer * mip_levels)
    }

    /// Split a flat index back into `(mip, array_layer)`.
    pub fn decompose(index: u32, mip_levels: u32) -> (u32, u32) {
        let mip_levels = mip_levels.max(1);
        (index % mip_levels, index / mip_levels)
    }
}

//! `ResourceBarrier` translation for DirectX12 command lists.

use prism_core::collections::SmallVec;
use prism_core::log;
use crate::barrier::{BarrierRecorder, PendingBarrier};
use crate::error::RhiError;
use crate::resource::NativeHandle;
use crate::state::{ResourceState, Subresource};

/// `D3D12_RESOURCE_STATES`. Not an enum: `COMMON` is zero and several states are unions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct D3d12ResourceStates(pub u32);

impl D3d12ResourceStates {
    pub const COMMON: Self = Self(0);
    pub const VERTEX_AND_CONSTANT_BUFFER: Self = Self(0x1);
    pub const INDEX_BUFFER: Self = Self(0x2);
    pub const RENDER_TARGET: Self = Self(0x4);
    pub const UNORDERED_ACCESS: Self = Self(0x8);
    pub const DEPTH_WRITE: Self = Self(0x10);
    pub const DEPTH_READ: Self = Self(0x20);
    pub const NON_PIXEL_SHADER_RESOURCE: Self = Self(0x40);
    pub const PIXEL_SHADER_RESOURCE: Self = Self(0x80);
    pub const INDIRECT_ARGUMENT: Self = Self(0x200);
    pub const COPY_DEST: Self = Self(0x400);
    pub const COPY_SOURCE: Self = Self(0x800);
    pub const RESOLVE_DEST: Self = Self(0x1000);
    pub const RESOLVE_SOURCE: Self = Self(0x2000);
    pub const RAYTRACING_ACCELERATION_STRUCTURE: Self = Self(0x40_0000);
    pub const SHADING_RATE_SOURCE: Self = Self(0x100_0000);
    pub const GENERIC_READ: Self = Self(0xAC3);
    pub const PRESENT: Self = Self(0);
    pub const PREDICATION: Self = Self(0x200);

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for D3d12ResourceStates {
    type Output = D3d12ResourceStates;
    fn bitor(self, rhs: D3d12ResourceStates) -> Self::Output {
        D3d12ResourceStates(self.0 | rhs.0)
    }
}

/// `D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES`.
pub const ALL_SUBRESOURCES: u32 = 0xFFFF_FFFF;

pub fn d3d12_state(state: ResourceState) -> D3d12ResourceStates {
    match state {
        ResourceState::Undefined | ResourceState::Common => D3d12ResourceStates::COMMON,
        ResourceState::CopySource => D3d12ResourceStates::COPY_SOURCE,
        ResourceState::CopyDestination => D3d12ResourceStates::COPY_DEST,
        ResourceState::VertexOrConstantBuffer => D3d12ResourceStates::VERTEX_AND_CONSTANT_BUFFER,
        ResourceState::IndexBuffer => D3d12ResourceStates::INDEX_BUFFER,
        ResourceState::RenderTarget => D3d12ResourceStates::RENDER_TARGET,
        ResourceState::DepthWrite => D3d12ResourceStates::DEPTH_WRITE,
        ResourceState::DepthRead => D3d12ResourceStates::DEPTH_READ,
        ResourceState::UnorderedAccess => D3d12ResourceStates::UNORDERED_ACCESS,
        ResourceState::ShaderResource => {
            D3d12ResourceStates::PIXEL_SHADER_RESOURCE | D3d12ResourceStates::NON_PIXEL_SHADER_RESOURCE
        }
        ResourceState::PixelShaderResource => D3d12ResourceStates::PIXEL_SHADER_RESOURCE,
        ResourceState::NonPixelShaderResource => D3d12ResourceStates::NON_PIXEL_SHADER_RESOURCE,
        ResourceState::Present => D3d12ResourceStates::PRESENT,
        ResourceState::GenericRead => D3d12ResourceStates::GENERIC_READ,
        ResourceState::Predication => D3d12ResourceStates::PREDICATION,
        ResourceState::IndirectArgument => D3d12ResourceStates::INDIRECT_ARGUMENT,
        ResourceState::ResolveSource => D3d12ResourceStates::RESOLVE_SOURCE,
        ResourceState::ResolveDestination => D3d12ResourceStates::RESOLVE_DEST,
        ResourceState::RaytracingAccelerationStructure => D3d12ResourceStates::RAYTRACING_ACCELERATION_STRUCTURE,
        ResourceState::ShadingRateSource => D3d12ResourceStates::SHADING_RATE_SOURCE,
    }
}

/// `D3D12_RESOURCE_BARRIER`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum D3d12ResourceBarrier {
    Transition {
        resource: NativeHandle,
        subresource: u32,
        before: D3d12ResourceStates,
        after: D3d12ResourceStates,
    },
    Aliasing {
        before: NativeHandle,
        after: NativeHandle,
    },
    Uav {
        resource: NativeHandle,
    },
}

impl D3d12ResourceBarrier {
    /// `None` for transitions both sides of which map to the same D3D12 state.
    pub fn from_pending(barrier: &PendingBarrier) -> Option<Self> {
        match barrier {
            PendingBarrier::Transition { resource, before, after, subresource } => {
                let before = d3d12_state(*before);
                let after = d3d12_state(*after);
                if before == after {
                    return None;
                }
                Some(D3d12ResourceBarrier::Transition {
                    resource: resource.handle(),
                    subresource: match subresource {
                        Subresource::All => ALL_SUBRESOURCES,
                        Subresource::Index(index) => *index,
                    },
                    before,
                    after,
                })
            }
            PendingBarrier::Aliasing { before, after } => Some(D3d12ResourceBarrier::Aliasing {
                before: before.handle(),
                after: after.handle(),
            }),
            PendingBarrier::Uav { resource } => Some(D3d12ResourceBarrier::Uav {
                resource: resource.handle(),
            }),
        }
    }
}

/// The `ID3D12GraphicsCommandList` a batch is recorded into.
pub trait Dx12CommandSink {
    /// `ID3D12GraphicsCommandList::ResourceBarrier`.
    fn resource_barrier(&mut self, barriers: &[D3d12ResourceBarrier]) -> Result<(), RhiError>;
}

/// Records barrier batches into a DirectX12 command list.
pub struct Dx12CommandList<'a> {
    sink: &'a mut dyn Dx12CommandSink,
}

impl<'a> Dx12CommandList<'a> {
    pub fn new(sink: &'a mut dyn Dx12CommandSink) -> Self {
        Self { sink }
    }
}

impl BarrierRecorder for Dx12CommandList<'_> {
    fn record_barriers(&mut self, barriers: &[PendingBarrier]) -> Result<(), RhiError> {
        let native: SmallVec<[D3d12ResourceBarrier; 16]> =
            barriers.iter().filter_map(D3d12ResourceBarrier::from_pending).collect();
        if native.is_empty() {
            log::trace!("all {} barrier(s) are no-ops on DirectX12", barriers.len());
            return Ok(());
        }
        self.sink.resource_barrier(&native)
    }
}

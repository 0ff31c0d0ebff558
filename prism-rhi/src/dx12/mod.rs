//! DirectX12 backend: root signatures and resource barriers.
//!
//! The native calls sit behind [`Dx12Driver`] and [`Dx12CommandSink`]. On Windows both are
//! implemented over the `windows` crate's `ID3D12Device` and `ID3D12GraphicsCommandList`.

mod barrier;
#[cfg(windows)]
mod native;
mod root_signature;

use std::sync::Arc;
use crate::device::DeviceCapabilities;
use crate::error::RhiError;
use crate::layout::LayoutPlan;
use crate::resource::NativeHandle;

pub use barrier::{d3d12_state, D3d12ResourceBarrier, D3d12ResourceStates, Dx12CommandList, Dx12CommandSink, ALL_SUBRESOURCES};
#[cfg(windows)]
pub use native::D3d12DeviceDriver;
pub use root_signature::{
    d3d12_filter, D3d12AddressMode, D3d12BorderColor, D3d12ComparisonFunc, D3d12DescriptorRangeType, D3d12ShaderVisibility, D3d12StaticSampler, DescriptorRange, DescriptorRange1,
    Dx12RootSignature, RootConstants, RootDescriptor, RootDescriptor1, RootParameter, RootParameter1,
    RootParameterKind, RootSignatureDesc, RootSignatureDesc1, VersionedRootSignatureDesc,
};

/// A failed `HRESULT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HResult(pub i32);

impl std::fmt::Display for HResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HRESULT 0x{:08X}", self.0 as u32)
    }
}

/// Native root-signature entry points of an `ID3D12Device`.
pub trait Dx12Driver: Send + Sync {
    /// `D3D12SerializeVersionedRootSignature`.
    fn serialize_root_signature(&self, desc: &VersionedRootSignatureDesc) -> Result<Vec<u8>, RhiError>;

    /// `ID3D12Device::CreateRootSignature`.
    fn create_root_signature(&self, node_mask: u32, blob: &[u8]) -> Result<NativeHandle, RhiError>;

    /// Releases a root signature returned by [`Dx12Driver::create_root_signature`].
    fn release_root_signature(&self, handle: NativeHandle);
}

#[derive(Clone)]
pub struct Dx12Device {
    driver: Arc<dyn Dx12Driver>,
}

impl Dx12Device {
    pub fn new(driver: Arc<dyn Dx12Driver>) -> Self {
        Self { driver }
    }

    #[cfg(windows)]
    pub fn from_d3d12(device: windows::Win32::Graphics::Direct3D12::ID3D12Device) -> Self {
        Self::new(Arc::new(D3d12DeviceDriver::new(device)))
    }

    #[inline]
    pub fn driver(&self) -> &Arc<dyn Dx12Driver> {
        &self.driver
    }
}

pub(crate) fn create_root_signature(
    plan: &LayoutPlan,
    device: &Dx12Device,
    capabilities: &DeviceCapabilities,
) -> Result<Dx12RootSignature, RhiError> {
    Dx12RootSignature::new(plan, device, capabilities)
}

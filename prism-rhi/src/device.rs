//! Device handle, capability queries and backend selection.

use std::sync::Arc;
use crate::config::RhiConfig;
use crate::dx12::Dx12Device;
use crate::vulkan::VulkanDevice;

/// How freely descriptor tables may change between recording and execution.
///
/// Ordered: `Tier1 < Tier2 < Tier3`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub enum ResourceBindingTier {
    Tier1,
    Tier2,
    Tier3,
}

impl ResourceBindingTier {
    pub fn index(self) -> usize {
        match self {
            ResourceBindingTier::Tier1 => 0,
            ResourceBindingTier::Tier2 => 1,
            ResourceBindingTier::Tier3 => 2,
        }
    }
}

/// Root signature serialization format. Only meaningful on DirectX12.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub enum RootSignatureVersion {
    #[display("1.0")]
    V1_0,
    #[display("1.1")]
    V1_1,
}

impl RootSignatureVersion {
    /// Newest version this crate knows how to produce.
    pub const LATEST: RootSignatureVersion = RootSignatureVersion::V1_1;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum GraphicsApi {
    #[display("DirectX12")]
    Dx12,
    Vulkan,
}

/// Capabilities reported by the device once, at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub binding_tier: ResourceBindingTier,
    pub max_root_signature_version: RootSignatureVersion,
    pub ray_tracing: bool,
    /// Node mask of the GPU this device drives (bit per adapter node).
    pub gpu_mask: u32,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            binding_tier: ResourceBindingTier::Tier1,
            max_root_signature_version: RootSignatureVersion::V1_0,
            ray_tracing: false,
            gpu_mask: 1,
        }
    }
}

/// The active graphics API. Chosen once when the device is created.
#[derive(Clone)]
pub enum GraphicsBackend {
    Dx12(Dx12Device),
    Vulkan(VulkanDevice),
}

impl GraphicsBackend {
    pub fn api(&self) -> GraphicsApi {
        match self {
            GraphicsBackend::Dx12(_) => GraphicsApi::Dx12,
            GraphicsBackend::Vulkan(_) => GraphicsApi::Vulkan,
        }
    }
}

/// Graphics device as seen by the barrier and layout layers.
///
/// Cheap to clone; all state is shared and read-only after creation.
#[derive(Clone)]
pub struct RenderDevice {
    name: Arc<str>,
    backend: GraphicsBackend,
    capabilities: DeviceCapabilities,
    config: Arc<RhiConfig>,
}

impl RenderDevice {
    pub fn new(name: &str, backend: GraphicsBackend, capabilities: DeviceCapabilities, config: RhiConfig) -> Self {
        prism_core::log::info!(
            "created {} device '{}': binding {}, root signature {}, ray tracing {}",
            backend.api(),
            name,
            capabilities.binding_tier,
            capabilities.max_root_signature_version,
            capabilities.ray_tracing,
        );
        Self {
            name: name.into(),
            backend,
            capabilities,
            config: Arc::new(config),
        }
    }

    #[inline]
    pub fn name(&self) -> &str { &self.name }

    #[inline]
    pub fn api(&self) -> GraphicsApi { self.backend.api() }

    #[inline]
    pub fn backend(&self) -> &GraphicsBackend { &self.backend }

    #[inline]
    pub fn capabilities(&self) -> &DeviceCapabilities { &self.capabilities }

    #[inline]
    pub fn config(&self) -> &RhiConfig { &self.config }

    #[inline]
    pub fn resource_binding_tier(&self) -> ResourceBindingTier {
        self.capabilities.binding_tier
    }

    #[inline]
    pub fn max_root_signature_version(&self) -> RootSignatureVersion {
        self.capabilities.max_root_signature_version
    }

    #[inline]
    pub fn is_supported_ray_tracing(&self) -> bool {
        self.capabilities.ray_tracing
    }

    #[inline]
    pub fn gpu_mask(&self) -> u32 {
        self.capabilities.gpu_mask
    }
}

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Crate-only trait for objects that own a native object and release it through a driver.
///
/// Implemented by the `#[DeviceObject(..)]` attribute, which also injects the `driver` field.
pub(crate) trait DeviceObject: sealed::Sealed {
    type Driver: ?Sized;

    fn driver(&self) -> &Arc<Self::Driver>;
}

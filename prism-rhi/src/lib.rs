//! Prism RHI (Render Hardware Interface).
//!
//! GPU resource-state tracking with transition-barrier batching, and resource binding layouts
//! that map one API-neutral description onto DirectX12 root signatures or Vulkan descriptor
//! set layouts.

/// Assert an RHI usage contract. Active in debug builds and with the `validation` feature.
macro_rules! rhi_assert {
    ($cond:expr, $($arg:tt)+) => {
        if cfg!(any(debug_assertions, feature = "validation")) {
            assert!($cond, $($arg)+);
        }
    };
}

pub mod barrier;
pub mod binding;
pub mod config;
pub mod device;
pub mod dx12;
pub mod error;
pub mod layout;
pub mod resource;
pub mod state;
pub mod vulkan;

#[cfg(test)]
mod testing;

pub use ash::vk;
pub use barrier::{BarrierBatcher, BarrierRecorder, PendingBarrier};
pub use binding::{
    AddressMode, BindingLayoutDesc, BindingSlot, BorderColor, CompareOp, Constants32Block,
    DescriptorKind, LayoutKind, ResourceShape, SamplerFilter, ShaderStage, ShaderVisibility,
    StaticSamplerDesc, StaticSamplerDescBuilder, StaticSamplerDescBuilderError,
};
pub use config::{RhiConfig, RhiConfigBuilder, RhiConfigBuilderError, VulkanBindingShifts};
pub use device::{
    DeviceCapabilities, GraphicsApi, GraphicsBackend, RenderDevice, ResourceBindingTier,
    RootSignatureVersion,
};
pub use error::RhiError;
pub use layout::{
    range_volatility, BackendLayout, BuiltResourceLayout, LayoutFlag, LayoutFlags, LayoutSummary,
    ResourceLayoutBuilder, Volatility, VolatilityFlags,
};
pub use resource::{GpuResource, NativeHandle, ResourceKind, TextureAspect, TextureInfo};
pub use state::{ResourceState, Subresource};

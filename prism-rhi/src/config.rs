//! Device-level RHI configuration, injected at device creation.

use derive_builder::Builder;
use crate::binding::DescriptorKind;

/// Vulkan binding offsets per HLSL register class, matching DXC's `-fvk-{b,t,u,s}-shift`.
///
/// Vulkan has a single binding namespace per set, so `b0`, `t0` and `u0` need distinct binding
/// numbers after translation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VulkanBindingShifts {
    pub constant_buffer: u32,
    pub shader_resource: u32,
    pub unordered_access: u32,
    pub sampler: u32,
}

impl Default for VulkanBindingShifts {
    fn default() -> Self {
        Self {
            constant_buffer: 0,
            shader_resource: 1000,
            unordered_access: 2000,
            sampler: 3000,
        }
    }
}

impl VulkanBindingShifts {
    pub fn shift(&self, kind: DescriptorKind) -> u32 {
        match kind {
            DescriptorKind::ConstantBuffer => self.constant_buffer,
            DescriptorKind::ShaderResource => self.shader_resource,
            DescriptorKind::UnorderedAccess => self.unordered_access,
            DescriptorKind::Sampler => self.sampler,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Builder)]
#[builder(setter(into))]
pub struct RhiConfig {
    /// Check layout descriptors before handing them to the driver and log what looks wrong.
    #[builder(default = "cfg!(feature = \"validation\")")]
    pub validation: bool,
    #[builder(default)]
    pub vulkan_binding_shifts: VulkanBindingShifts,
}

impl Default for RhiConfig {
    fn default() -> Self {
        Self {
            validation: cfg!(feature = "validation"),
            vulkan_binding_shifts: VulkanBindingShifts::default(),
        }
    }
}

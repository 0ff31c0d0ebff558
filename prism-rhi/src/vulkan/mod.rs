//! Vulkan backend: descriptor set / pipeline layouts and sync2 barriers.

mod barrier;
mod command;
mod layout;
mod sampler;

use std::sync::Arc;
use ash::vk;
use crate::config::VulkanBindingShifts;
use crate::device::ResourceBindingTier;
use crate::error::RhiError;
use crate::layout::LayoutPlan;

pub use barrier::{flush_all_memory_writes, vulkan_access, VulkanAccess, VulkanBarriers};
pub use command::CommandEncoder;
pub use layout::VulkanResourceLayout;
pub use sampler::sampler_create_info;

/// The `VkDevice` entry points this crate calls.
///
/// Implemented for [`ash::Device`]; the object-creating calls are the only fallible ones.
pub trait VulkanDriver: Send + Sync {
    fn create_sampler(&self, info: &vk::SamplerCreateInfo<'_>) -> Result<vk::Sampler, RhiError>;
    fn destroy_sampler(&self, sampler: vk::Sampler);

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> Result<vk::DescriptorSetLayout, RhiError>;
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    fn create_pipeline_layout(&self, info: &vk::PipelineLayoutCreateInfo<'_>) -> Result<vk::PipelineLayout, RhiError>;
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);

    fn cmd_pipeline_barrier2(&self, cmd: vk::CommandBuffer, dependency: &vk::DependencyInfo<'_>);
}

impl VulkanDriver for ash::Device {
    fn create_sampler(&self, info: &vk::SamplerCreateInfo<'_>) -> Result<vk::Sampler, RhiError> {
        Ok(unsafe { ash::Device::create_sampler(self, info, None)? })
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        unsafe { ash::Device::destroy_sampler(self, sampler, None) }
    }

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> Result<vk::DescriptorSetLayout, RhiError> {
        Ok(unsafe { ash::Device::create_descriptor_set_layout(self, info, None)? })
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { ash::Device::destroy_descriptor_set_layout(self, layout, None) }
    }

    fn create_pipeline_layout(&self, info: &vk::PipelineLayoutCreateInfo<'_>) -> Result<vk::PipelineLayout, RhiError> {
        Ok(unsafe { ash::Device::create_pipeline_layout(self, info, None)? })
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { ash::Device::destroy_pipeline_layout(self, layout, None) }
    }

    fn cmd_pipeline_barrier2(&self, cmd: vk::CommandBuffer, dependency: &vk::DependencyInfo<'_>) {
        unsafe { ash::Device::cmd_pipeline_barrier2(self, cmd, dependency) }
    }
}

#[derive(Clone)]
pub struct VulkanDevice {
    driver: Arc<dyn VulkanDriver>,
}

impl VulkanDevice {
    pub fn new(driver: Arc<dyn VulkanDriver>) -> Self {
        Self { driver }
    }

    /// Wrap an `ash` logical device.
    pub fn from_ash(device: ash::Device) -> Self {
        Self::new(Arc::new(device))
    }

    #[inline]
    pub fn driver(&self) -> &Arc<dyn VulkanDriver> {
        &self.driver
    }
}

/// The binding tier a Vulkan device can honour, from its descriptor-indexing features.
///
/// Tier2 needs update-after-bind for sampled images, storage images and storage buffers;
/// Tier3 additionally needs it for uniform buffers.
pub fn binding_tier_from_features(features: &vk::PhysicalDeviceDescriptorIndexingFeatures<'_>) -> ResourceBindingTier {
    let tier2 = features.descriptor_binding_sampled_image_update_after_bind == vk::TRUE
        && features.descriptor_binding_storage_image_update_after_bind == vk::TRUE
        && features.descriptor_binding_storage_buffer_update_after_bind == vk::TRUE;
    if !tier2 {
        return ResourceBindingTier::Tier1;
    }
    if features.descriptor_binding_uniform_buffer_update_after_bind == vk::TRUE {
        ResourceBindingTier::Tier3
    } else {
        ResourceBindingTier::Tier2
    }
}

pub(crate) fn create_resource_layout(
    plan: &LayoutPlan,
    device: &VulkanDevice,
    shifts: &VulkanBindingShifts,
) -> Result<VulkanResourceLayout, RhiError> {
    VulkanResourceLayout::new(plan, device, shifts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(uniform: bool, sampled: bool, storage: bool) -> vk::PhysicalDeviceDescriptorIndexingFeatures<'static> {
        vk::PhysicalDeviceDescriptorIndexingFeatures::default()
            .descriptor_binding_uniform_buffer_update_after_bind(uniform)
            .descriptor_binding_sampled_image_update_after_bind(sampled)
            .descriptor_binding_storage_image_update_after_bind(storage)
            .descriptor_binding_storage_buffer_update_after_bind(storage)
    }

    #[test]
    fn tier_follows_update_after_bind_support() {
        assert_eq!(binding_tier_from_features(&features(false, false, false)), ResourceBindingTier::Tier1);
        assert_eq!(binding_tier_from_features(&features(false, true, false)), ResourceBindingTier::Tier1);
        assert_eq!(binding_tier_from_features(&features(false, true, true)), ResourceBindingTier::Tier2);
        assert_eq!(binding_tier_from_features(&features(true, true, true)), ResourceBindingTier::Tier3);
        assert_eq!(binding_tier_from_features(&features(true, false, false)), ResourceBindingTier::Tier1);
    }
}

//! Drivers that accept every call and log it, for running without a GPU.

use std::sync::atomic::{AtomicU64, Ordering};
use prism_core::log;
use prism_rhi::dx12::{D3d12ResourceBarrier, Dx12CommandSink, Dx12Driver, VersionedRootSignatureDesc};
use prism_rhi::vk::{self, Handle};
use prism_rhi::vulkan::VulkanDriver;
use prism_rhi::{NativeHandle, RhiError};

#[derive(Default)]
pub struct HeadlessDriver {
    next_handle: AtomicU64,
}

impl HeadlessDriver {
    fn next(&self) -> u64 {
        1 + self.next_handle.fetch_add(1, Ordering::Relaxed)
    }
}

impl Dx12Driver for HeadlessDriver {
    fn serialize_root_signature(&self, desc: &VersionedRootSignatureDesc) -> Result<Vec<u8>, RhiError> {
        log::debug!(
            "serialize root signature {}: {} parameter(s), {} static sampler(s), flags {:?}",
            desc.version(),
            desc.num_parameters(),
            desc.static_samplers().len(),
            desc.flags()
        );
        // Header only; nothing reads the blob back.
        Ok(vec![0u8; 4 * (1 + desc.num_parameters())])
    }

    fn create_root_signature(&self, node_mask: u32, _blob: &[u8]) -> Result<NativeHandle, RhiError> {
        let handle = NativeHandle(self.next());
        log::debug!("create root signature {:#x} on node mask {:#b}", handle.0, node_mask);
        Ok(handle)
    }

    fn release_root_signature(&self, handle: NativeHandle) {
        log::debug!("release root signature {:#x}", handle.0);
    }
}

impl VulkanDriver for HeadlessDriver {
    fn create_sampler(&self, _info: &vk::SamplerCreateInfo<'_>) -> Result<vk::Sampler, RhiError> {
        Ok(vk::Sampler::from_raw(self.next()))
    }

    fn destroy_sampler(&self, _sampler: vk::Sampler) {}

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> Result<vk::DescriptorSetLayout, RhiError> {
        log::debug!("create descriptor set layout: {} binding(s), flags {:?}", info.binding_count, info.flags);
        Ok(vk::DescriptorSetLayout::from_raw(self.next()))
    }

    fn destroy_descriptor_set_layout(&self, _layout: vk::DescriptorSetLayout) {}

    fn create_pipeline_layout(&self, info: &vk::PipelineLayoutCreateInfo<'_>) -> Result<vk::PipelineLayout, RhiError> {
        log::debug!(
            "create pipeline layout: {} set(s), {} push constant range(s)",
            info.set_layout_count,
            info.push_constant_range_count
        );
        Ok(vk::PipelineLayout::from_raw(self.next()))
    }

    fn destroy_pipeline_layout(&self, _layout: vk::PipelineLayout) {}

    fn cmd_pipeline_barrier2(&self, _cmd: vk::CommandBuffer, dependency: &vk::DependencyInfo<'_>) {
        log::info!(
            "vkCmdPipelineBarrier2: {} memory, {} buffer, {} image barrier(s)",
            dependency.memory_barrier_count,
            dependency.buffer_memory_barrier_count,
            dependency.image_memory_barrier_count
        );
    }
}

/// A DirectX12 command list that prints what it is asked to record.
#[derive(Default)]
pub struct HeadlessCommandList {
    pub recorded: usize,
}

impl Dx12CommandSink for HeadlessCommandList {
    fn resource_barrier(&mut self, barriers: &[D3d12ResourceBarrier]) -> Result<(), RhiError> {
        log::info!("ResourceBarrier: {} barrier(s)", barriers.len());
        for barrier in barriers {
            log::debug!("  {:?}", barrier);
        }
        self.recorded += barriers.len();
        Ok(())
    }
}

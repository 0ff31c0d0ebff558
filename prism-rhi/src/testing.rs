//! In-crate test doubles for the recorder and driver seams.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use ash::vk;
use ash::vk::Handle;
use parking_lot::{Mutex, MutexGuard};
use crate::barrier::{BarrierRecorder, PendingBarrier};
use crate::config::RhiConfig;
use crate::device::{DeviceCapabilities, GraphicsBackend, RenderDevice, ResourceBindingTier, RootSignatureVersion};
use crate::dx12::{Dx12Device, Dx12Driver, HResult, VersionedRootSignatureDesc};
use crate::error::RhiError;
use crate::resource::NativeHandle;
use crate::state::{ResourceState, Subresource};
use crate::vulkan::{VulkanDevice, VulkanDriver};

/// A barrier as the recorder saw it, with resources identified by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedBarrier {
    Transition {
        resource: String,
        before: ResourceState,
        after: ResourceState,
        subresource: Subresource,
    },
    Aliasing {
        before: String,
        after: String,
    },
    Uav {
        resource: String,
    },
}

impl RecordedBarrier {
    pub fn resource_name(&self) -> &str {
        match self {
            RecordedBarrier::Transition { resource, .. } => resource,
            RecordedBarrier::Aliasing { after, .. } => after,
            RecordedBarrier::Uav { resource } => resource,
        }
    }
}

impl From<&PendingBarrier> for RecordedBarrier {
    fn from(barrier: &PendingBarrier) -> Self {
        match barrier {
            PendingBarrier::Transition { resource, before, after, subresource } => RecordedBarrier::Transition {
                resource: resource.name().to_owned(),
                before: *before,
                after: *after,
                subresource: *subresource,
            },
            PendingBarrier::Aliasing { before, after } => RecordedBarrier::Aliasing {
                before: before.name().to_owned(),
                after: after.name().to_owned(),
            },
            PendingBarrier::Uav { resource } => RecordedBarrier::Uav {
                resource: resource.name().to_owned(),
            },
        }
    }
}

/// Records each flushed batch as one entry of `calls`.
#[derive(Default)]
pub struct RecordingRecorder {
    pub calls: Vec<Vec<RecordedBarrier>>,
    fail: bool,
}

impl RecordingRecorder {
    pub fn failing() -> Self {
        Self {
            calls: Vec::new(),
            fail: true,
        }
    }
}

impl BarrierRecorder for RecordingRecorder {
    fn record_barriers(&mut self, barriers: &[PendingBarrier]) -> Result<(), RhiError> {
        if self.fail {
            return Err(RhiError::CommandRecording("command list is closed".to_owned()));
        }
        self.calls.push(barriers.iter().map(RecordedBarrier::from).collect());
        Ok(())
    }
}

const E_INVALIDARG: HResult = HResult(0x8007_0057u32 as i32);

#[derive(Default)]
pub struct MockDx12Driver {
    next_handle: AtomicU64,
    fail_create: bool,
    serialized: Mutex<Vec<VersionedRootSignatureDesc>>,
    released: Mutex<Vec<NativeHandle>>,
}

impl MockDx12Driver {
    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Default::default()
        }
    }

    pub fn serialized(&self) -> Vec<VersionedRootSignatureDesc> {
        self.serialized.lock().clone()
    }

    pub fn serialized_versions(&self) -> Vec<RootSignatureVersion> {
        self.serialized.lock().iter().map(VersionedRootSignatureDesc::version).collect()
    }

    pub fn released(&self) -> Vec<NativeHandle> {
        self.released.lock().clone()
    }
}

impl Dx12Driver for MockDx12Driver {
    fn serialize_root_signature(&self, desc: &VersionedRootSignatureDesc) -> Result<Vec<u8>, RhiError> {
        self.serialized.lock().push(desc.clone());
        Ok(vec![0u8; 16 + desc.num_parameters() * 8])
    }

    fn create_root_signature(&self, _node_mask: u32, _blob: &[u8]) -> Result<NativeHandle, RhiError> {
        if self.fail_create {
            return Err(E_INVALIDARG.into());
        }
        Ok(NativeHandle(0x1000 + self.next_handle.fetch_add(1, Ordering::Relaxed)))
    }

    fn release_root_signature(&self, handle: NativeHandle) {
        self.released.lock().push(handle);
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CreatedSetLayout {
    pub handle: vk::DescriptorSetLayout,
    pub flags: vk::DescriptorSetLayoutCreateFlags,
    pub binding_count: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct CreatedPipelineLayout {
    pub handle: vk::PipelineLayout,
    pub set_layout_count: u32,
    pub push_constant_range_count: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct RecordedDependency {
    pub command_buffer: vk::CommandBuffer,
    pub memory_count: u32,
    pub buffer_count: u32,
    pub image_count: u32,
}

#[derive(Default, Debug)]
pub struct VulkanCalls {
    pub samplers_created: Vec<vk::Sampler>,
    pub samplers_destroyed: Vec<vk::Sampler>,
    pub set_layouts_created: Vec<CreatedSetLayout>,
    pub set_layouts_destroyed: Vec<vk::DescriptorSetLayout>,
    pub pipeline_layouts_created: Vec<CreatedPipelineLayout>,
    pub pipeline_layouts_destroyed: Vec<vk::PipelineLayout>,
    pub barriers: Vec<RecordedDependency>,
}

#[derive(Default)]
pub struct MockVulkanDriver {
    next_handle: AtomicU64,
    fail_pipeline_layout: bool,
    calls: Mutex<VulkanCalls>,
}

impl MockVulkanDriver {
    pub fn failing_pipeline_layout() -> Self {
        Self {
            fail_pipeline_layout: true,
            ..Default::default()
        }
    }

    /// Do not hold the guard across a call into the driver.
    pub fn calls(&self) -> MutexGuard<'_, VulkanCalls> {
        self.calls.lock()
    }

    fn next(&self) -> u64 {
        0x100 + self.next_handle.fetch_add(1, Ordering::Relaxed)
    }
}

impl VulkanDriver for MockVulkanDriver {
    fn create_sampler(&self, _info: &vk::SamplerCreateInfo<'_>) -> Result<vk::Sampler, RhiError> {
        let sampler = vk::Sampler::from_raw(self.next());
        self.calls.lock().samplers_created.push(sampler);
        Ok(sampler)
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        self.calls.lock().samplers_destroyed.push(sampler);
    }

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> Result<vk::DescriptorSetLayout, RhiError> {
        let handle = vk::DescriptorSetLayout::from_raw(self.next());
        self.calls.lock().set_layouts_created.push(CreatedSetLayout {
            handle,
            flags: info.flags,
            binding_count: info.binding_count,
        });
        Ok(handle)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.calls.lock().set_layouts_destroyed.push(layout);
    }

    fn create_pipeline_layout(&self, info: &vk::PipelineLayoutCreateInfo<'_>) -> Result<vk::PipelineLayout, RhiError> {
        if self.fail_pipeline_layout {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY.into());
        }
        let handle = vk::PipelineLayout::from_raw(self.next());
        self.calls.lock().pipeline_layouts_created.push(CreatedPipelineLayout {
            handle,
            set_layout_count: info.set_layout_count,
            push_constant_range_count: info.push_constant_range_count,
        });
        Ok(handle)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.calls.lock().pipeline_layouts_destroyed.push(layout);
    }

    fn cmd_pipeline_barrier2(&self, cmd: vk::CommandBuffer, dependency: &vk::DependencyInfo<'_>) {
        self.calls.lock().barriers.push(RecordedDependency {
            command_buffer: cmd,
            memory_count: dependency.memory_barrier_count,
            buffer_count: dependency.buffer_memory_barrier_count,
            image_count: dependency.image_memory_barrier_count,
        });
    }
}

pub fn dx12_device(tier: ResourceBindingTier, version: RootSignatureVersion, driver: Arc<MockDx12Driver>) -> RenderDevice {
    let capabilities = DeviceCapabilities {
        binding_tier: tier,
        max_root_signature_version: version,
        ..Default::default()
    };
    RenderDevice::new("mock-dx12", GraphicsBackend::Dx12(Dx12Device::new(driver)), capabilities, RhiConfig::default())
}

pub fn vulkan_device(tier: ResourceBindingTier, driver: Arc<MockVulkanDriver>) -> RenderDevice {
    let capabilities = DeviceCapabilities {
        binding_tier: tier,
        ..Default::default()
    };
    RenderDevice::new("mock-vulkan", GraphicsBackend::Vulkan(VulkanDevice::new(driver)), capabilities, RhiConfig::default())
}

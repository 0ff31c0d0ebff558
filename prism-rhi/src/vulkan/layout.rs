//! Descriptor set layouts and the pipeline layout built from a [`LayoutPlan`].

use ash::vk;
use prism_core::log;
use prism_rhi_derive::DeviceObject;
use crate::binding::{DescriptorKind, LayoutKind, ResourceShape, ShaderStage, ShaderVisibility};
use crate::config::VulkanBindingShifts;
use crate::device::DeviceObject;
use crate::error::RhiError;
use crate::layout::{LayoutPlan, Volatility};
use super::{sampler_create_info, VulkanDevice};

/// One `VkDescriptorSetLayoutBinding` before native handles exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SetBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub count: u32,
    pub stage_flags: vk::ShaderStageFlags,
    pub flags: vk::DescriptorBindingFlags,
    /// Index into the plan's static samplers.
    pub immutable_sampler: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub(crate) struct SetLayoutDesc {
    pub bindings: Vec<SetBinding>,
    pub flags: vk::DescriptorSetLayoutCreateFlags,
}

fn descriptor_type(kind: DescriptorKind, shape: ResourceShape) -> vk::DescriptorType {
    match (kind, shape) {
        (DescriptorKind::ConstantBuffer, _) => vk::DescriptorType::UNIFORM_BUFFER,
        (DescriptorKind::ShaderResource, ResourceShape::Texture) => vk::DescriptorType::SAMPLED_IMAGE,
        (DescriptorKind::UnorderedAccess, ResourceShape::Texture) => vk::DescriptorType::STORAGE_IMAGE,
        // Structured and byte-address buffers, as DXC emits them.
        (DescriptorKind::ShaderResource | DescriptorKind::UnorderedAccess, ResourceShape::Buffer) => {
            vk::DescriptorType::STORAGE_BUFFER
        }
        (DescriptorKind::Sampler, _) => vk::DescriptorType::SAMPLER,
    }
}

fn stage_flag(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Hull => vk::ShaderStageFlags::TESSELLATION_CONTROL,
        ShaderStage::Domain => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
        ShaderStage::Geometry => vk::ShaderStageFlags::GEOMETRY,
        ShaderStage::Pixel => vk::ShaderStageFlags::FRAGMENT,
        ShaderStage::Amplification => vk::ShaderStageFlags::TASK_EXT,
        ShaderStage::Mesh => vk::ShaderStageFlags::MESH_EXT,
    }
}

/// Vulkan takes stage masks, so graphics bindings keep every stage they were declared for.
fn shader_stage_flags(kind: LayoutKind, visibility: ShaderVisibility) -> vk::ShaderStageFlags {
    if kind.is_ray_tracing() {
        return vk::ShaderStageFlags::ALL;
    }
    match kind {
        LayoutKind::Compute => vk::ShaderStageFlags::COMPUTE,
        _ if visibility.is_empty() => vk::ShaderStageFlags::ALL_GRAPHICS,
        _ => visibility
            .stages()
            .fold(vk::ShaderStageFlags::empty(), |flags, stage| flags | stage_flag(stage)),
    }
}

/// One set per register space, `set = space`. Spaces nothing binds to get empty sets.
pub(crate) fn set_layout_descs(plan: &LayoutPlan, shifts: &VulkanBindingShifts) -> Vec<SetLayoutDesc> {
    let set_count = plan
        .slots
        .iter()
        .map(|planned| planned.slot.space)
        .chain(plan.static_samplers.iter().map(|sampler| sampler.space))
        .max()
        .map_or(0, |space| space as usize + 1);
    let mut sets = vec![SetLayoutDesc::default(); set_count];

    for planned in &plan.slots {
        let slot = &planned.slot;
        let flags = if planned.volatility.contains(Volatility::DescriptorsVolatile) {
            vk::DescriptorBindingFlags::UPDATE_AFTER_BIND | vk::DescriptorBindingFlags::UPDATE_UNUSED_WHILE_PENDING
        } else {
            vk::DescriptorBindingFlags::empty()
        };

        let set = &mut sets[slot.space as usize];
        if !flags.is_empty() {
            set.flags |= vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL;
        }
        set.bindings.push(SetBinding {
            binding: slot.binding + shifts.shift(slot.kind),
            descriptor_type: descriptor_type(slot.kind, slot.shape),
            count: slot.count,
            stage_flags: shader_stage_flags(plan.kind, slot.visibility),
            flags,
            immutable_sampler: None,
        });
    }

    for (index, sampler) in plan.static_samplers.iter().enumerate() {
        sets[sampler.space as usize].bindings.push(SetBinding {
            binding: sampler.binding + shifts.sampler,
            descriptor_type: vk::DescriptorType::SAMPLER,
            count: 1,
            stage_flags: shader_stage_flags(plan.kind, sampler.visibility),
            flags: vk::DescriptorBindingFlags::empty(),
            immutable_sampler: Some(index),
        });
    }

    sets
}

pub(crate) fn push_constant_range(plan: &LayoutPlan) -> Option<vk::PushConstantRange> {
    plan.constants
        .filter(|(constants, _)| constants.count > 0)
        .map(|(constants, _)| vk::PushConstantRange {
            stage_flags: shader_stage_flags(plan.kind, constants.visibility),
            offset: 0,
            size: constants.size_in_bytes(),
        })
}

/// Descriptor set layouts, immutable samplers and the pipeline layout tying them together.
///
/// Everything is destroyed on drop, including after a failed [`VulkanResourceLayout::new`].
#[DeviceObject(vulkan)]
pub struct VulkanResourceLayout {
    set_layouts: Vec<vk::DescriptorSetLayout>,
    pipeline_layout: vk::PipelineLayout,
    immutable_samplers: Vec<vk::Sampler>,
    push_constant_range: Option<vk::PushConstantRange>,
}

impl VulkanResourceLayout {
    pub(crate) fn new(plan: &LayoutPlan, device: &VulkanDevice, shifts: &VulkanBindingShifts) -> Result<Self, RhiError> {
        let sets = set_layout_descs(plan, shifts);
        let mut layout = Self {
            set_layouts: Vec::with_capacity(sets.len()),
            pipeline_layout: vk::PipelineLayout::null(),
            immutable_samplers: Vec::with_capacity(plan.static_samplers.len()),
            push_constant_range: push_constant_range(plan),
            driver: device.driver().clone(),
        };

        for sampler in &plan.static_samplers {
            let handle = layout.driver.create_sampler(&sampler_create_info(sampler))?;
            layout.immutable_samplers.push(handle);
        }

        for set in &sets {
            let bindings: Vec<vk::DescriptorSetLayoutBinding> = set
                .bindings
                .iter()
                .map(|b| {
                    let binding = vk::DescriptorSetLayoutBinding::default()
                        .binding(b.binding)
                        .descriptor_type(b.descriptor_type)
                        .stage_flags(b.stage_flags);
                    match b.immutable_sampler {
                        Some(index) => binding.immutable_samplers(std::slice::from_ref(&layout.immutable_samplers[index])),
                        None => binding.descriptor_count(b.count),
                    }
                })
                .collect();
            let binding_flags: Vec<vk::DescriptorBindingFlags> = set.bindings.iter().map(|b| b.flags).collect();

            let mut flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);
            let mut info = vk::DescriptorSetLayoutCreateInfo::default()
                .flags(set.flags)
                .bindings(&bindings);
            if !set.flags.is_empty() {
                info = info.push_next(&mut flags_info);
            }

            let handle = layout.driver.create_descriptor_set_layout(&info)?;
            layout.set_layouts.push(handle);
        }

        let ranges = layout.push_constant_range.as_slice();
        let info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&layout.set_layouts)
            .push_constant_ranges(ranges);
        layout.pipeline_layout = layout.driver.create_pipeline_layout(&info)?;

        log::trace!(
            "pipeline layout '{}': {} set(s), {} immutable sampler(s), push constants {:?}",
            plan.name,
            layout.set_layouts.len(),
            layout.immutable_samplers.len(),
            layout.push_constant_range.map(|r| r.size)
        );
        Ok(layout)
    }

    #[inline]
    pub fn pipeline_layout(&self) -> vk::PipelineLayout { self.pipeline_layout }

    /// Indexed by set number.
    #[inline]
    pub fn set_layouts(&self) -> &[vk::DescriptorSetLayout] { &self.set_layouts }

    #[inline]
    pub fn immutable_samplers(&self) -> &[vk::Sampler] { &self.immutable_samplers }

    #[inline]
    pub fn push_constant_range(&self) -> Option<vk::PushConstantRange> { self.push_constant_range }
}

impl Drop for VulkanResourceLayout {
    fn drop(&mut self) {
        let driver = self.driver();
        if self.pipeline_layout != vk::PipelineLayout::null() {
            driver.destroy_pipeline_layout(self.pipeline_layout);
        }
        for &set_layout in &self.set_layouts {
            driver.destroy_descriptor_set_layout(set_layout);
        }
        for &sampler in &self.immutable_samplers {
            driver.destroy_sampler(sampler);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use super::*;
    use crate::binding::{BindingLayoutDesc, BindingSlot, Constants32Block, ShaderVisibility, StaticSamplerDesc};
    use crate::device::ResourceBindingTier;
    use crate::testing::MockVulkanDriver;

    fn descs(desc: &BindingLayoutDesc, tier: ResourceBindingTier) -> Vec<SetLayoutDesc> {
        set_layout_descs(&LayoutPlan::new(desc, tier), &VulkanBindingShifts::default())
    }

    #[test]
    fn register_spaces_become_sets_with_shifted_bindings() {
        let desc = BindingLayoutDesc::graphics("material")
            .with_slot(BindingSlot::cbv(0, 0, ShaderStage::Vertex))
            .with_slot(BindingSlot::srv(3, 2, ShaderStage::Pixel).with_count(16))
            .with_slot(BindingSlot::uav(1, 2, ShaderStage::Pixel).with_shape(ResourceShape::Buffer));
        let sets = descs(&desc, ResourceBindingTier::Tier1);

        assert_eq!(sets.len(), 3);
        assert!(sets[1].bindings.is_empty());
        assert_eq!(sets[0].bindings[0].binding, 0);
        assert_eq!(sets[0].bindings[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sets[0].bindings[0].stage_flags, vk::ShaderStageFlags::VERTEX);
        assert_eq!(sets[2].bindings[0].binding, 1003);
        assert_eq!(sets[2].bindings[0].count, 16);
        assert_eq!(sets[2].bindings[0].descriptor_type, vk::DescriptorType::SAMPLED_IMAGE);
        assert_eq!(sets[2].bindings[1].binding, 2001);
        assert_eq!(sets[2].bindings[1].descriptor_type, vk::DescriptorType::STORAGE_BUFFER);
    }

    #[test]
    fn only_volatile_bindings_are_update_after_bind() {
        let desc = BindingLayoutDesc::graphics("scene")
            .with_slot(BindingSlot::cbv(0, 0, ShaderStage::Vertex))
            .with_slot(BindingSlot::srv(0, 0, ShaderStage::Pixel))
            .with_slot(BindingSlot::cbv(0, 1, ShaderStage::Vertex));
        let sets = descs(&desc, ResourceBindingTier::Tier2);

        assert!(sets[0].bindings[0].flags.is_empty());
        assert!(sets[0].bindings[1].flags.contains(vk::DescriptorBindingFlags::UPDATE_AFTER_BIND));
        assert!(sets[0].bindings[1].flags.contains(vk::DescriptorBindingFlags::UPDATE_UNUSED_WHILE_PENDING));
        assert_eq!(sets[0].flags, vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL);
        assert!(sets[1].flags.is_empty());

        let tier1 = descs(&desc, ResourceBindingTier::Tier1);
        assert!(tier1.iter().all(|set| set.flags.is_empty()));
    }

    #[test]
    fn compute_layouts_use_the_compute_stage() {
        let desc = BindingLayoutDesc::compute("skinning")
            .with_slot(BindingSlot::uav(0, 0, ShaderStage::Vertex))
            .with_constants(Constants32Block::new(3, 0, 0, ShaderVisibility::all()));
        let plan = LayoutPlan::new(&desc, ResourceBindingTier::Tier1);

        let sets = set_layout_descs(&plan, &VulkanBindingShifts::default());
        assert_eq!(sets[0].bindings[0].stage_flags, vk::ShaderStageFlags::COMPUTE);
        let range = push_constant_range(&plan).unwrap();
        assert_eq!(range.size, 12);
        assert_eq!(range.stage_flags, vk::ShaderStageFlags::COMPUTE);
    }

    #[test]
    fn graphics_bindings_keep_every_declared_stage() {
        let desc = BindingLayoutDesc::graphics("meshlets")
            .with_slot(BindingSlot::cbv(0, 0, ShaderStage::Mesh | ShaderStage::Amplification))
            .with_slot(BindingSlot::srv(0, 0, ShaderVisibility::all()))
            .with_slot(BindingSlot::srv(1, 0, ShaderVisibility::default()))
            .with_constants(Constants32Block::new(2, 1, 0, ShaderStage::Mesh));
        let plan = LayoutPlan::new(&desc, ResourceBindingTier::Tier1);
        let sets = set_layout_descs(&plan, &VulkanBindingShifts::default());

        assert_eq!(sets[0].bindings[0].stage_flags, vk::ShaderStageFlags::MESH_EXT | vk::ShaderStageFlags::TASK_EXT);
        let all = sets[0].bindings[1].stage_flags;
        assert!(all.contains(vk::ShaderStageFlags::ALL_GRAPHICS));
        assert!(all.contains(vk::ShaderStageFlags::MESH_EXT | vk::ShaderStageFlags::TASK_EXT));
        assert_eq!(sets[0].bindings[2].stage_flags, vk::ShaderStageFlags::ALL_GRAPHICS);
        assert_eq!(push_constant_range(&plan).unwrap().stage_flags, vk::ShaderStageFlags::MESH_EXT);
    }

    #[test]
    fn static_samplers_become_immutable_sampler_bindings() {
        let desc = BindingLayoutDesc::graphics("sky").with_static_sampler(StaticSamplerDesc {
            space: 1,
            visibility: ShaderStage::Pixel.into(),
            ..StaticSamplerDesc::linear_wrap(2)
        });
        let sets = descs(&desc, ResourceBindingTier::Tier3);

        assert_eq!(sets.len(), 2);
        let binding = sets[1].bindings[0];
        assert_eq!(binding.binding, 3002);
        assert_eq!(binding.immutable_sampler, Some(0));
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::FRAGMENT);
        assert!(binding.flags.is_empty());
    }

    #[test]
    fn every_created_object_is_destroyed() {
        let driver = Arc::new(MockVulkanDriver::default());
        let device = VulkanDevice::new(driver.clone());
        let desc = BindingLayoutDesc::graphics("full")
            .with_slot(BindingSlot::srv(0, 1, ShaderStage::Pixel))
            .with_static_sampler(StaticSamplerDesc::point_clamp(0))
            .with_constants(Constants32Block::new(4, 0, 0, ShaderStage::Vertex));

        let layout = VulkanResourceLayout::new(
            &LayoutPlan::new(&desc, ResourceBindingTier::Tier2),
            &device,
            &VulkanBindingShifts::default(),
        )
        .unwrap();
        assert_eq!(layout.set_layouts().len(), 2);
        assert_eq!(layout.immutable_samplers().len(), 1);
        assert_ne!(layout.pipeline_layout(), vk::PipelineLayout::null());
        {
            let calls = driver.calls();
            assert_eq!(calls.pipeline_layouts_created[0].set_layout_count, 2);
            assert_eq!(calls.pipeline_layouts_created[0].push_constant_range_count, 1);
            assert_eq!(calls.set_layouts_created[1].flags, vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL);
        }
        drop(layout);

        let calls = driver.calls();
        assert_eq!(calls.set_layouts_destroyed.len(), 2);
        assert_eq!(calls.samplers_destroyed.len(), 1);
        assert_eq!(calls.pipeline_layouts_destroyed.len(), 1);
    }

    #[test]
    fn failed_pipeline_layout_releases_the_sets() {
        let driver = Arc::new(MockVulkanDriver::failing_pipeline_layout());
        let device = VulkanDevice::new(driver.clone());
        let desc = BindingLayoutDesc::graphics("doomed")
            .with_slot(BindingSlot::cbv(0, 0, ShaderStage::Vertex))
            .with_static_sampler(StaticSamplerDesc::linear_wrap(0));

        let result = VulkanResourceLayout::new(
            &LayoutPlan::new(&desc, ResourceBindingTier::Tier1),
            &device,
            &VulkanBindingShifts::default(),
        );
        assert!(matches!(result, Err(RhiError::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY))));

        let calls = driver.calls();
        assert_eq!(calls.set_layouts_created.len(), 1);
        assert_eq!(calls.set_layouts_destroyed.len(), 1);
        assert_eq!(calls.samplers_destroyed.len(), 1);
        assert!(calls.pipeline_layouts_destroyed.is_empty());
    }
}

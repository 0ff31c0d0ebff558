//! Resource layout building: one API-neutral plan, then a backend-specific object.
//!
//! The plan decides everything that does not depend on the API's object model: descriptor
//! volatility per binding tier, single-stage visibility, which stages can be denied, and the
//! summary flags pipelines query later. The DirectX12 and Vulkan modules turn the plan into a
//! root signature or a set of descriptor set layouts.

use std::sync::Arc;
use enumflags2::{make_bitflags, BitFlags};
use prism_core::log;
use crate::binding::{BindingLayoutDesc, BindingSlot, Constants32Block, DescriptorKind, LayoutKind, ShaderStage, ShaderVisibility, StaticSamplerDesc};
use crate::device::{GraphicsBackend, RenderDevice, ResourceBindingTier};
use crate::dx12::{self, Dx12RootSignature};
use crate::error::RhiError;
use crate::vulkan::{self, VulkanResourceLayout};

/// When descriptors and the data behind them may change relative to command recording.
///
/// Bit values match `D3D12_DESCRIPTOR_RANGE_FLAGS`.
#[enumflags2::bitflags]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Volatility {
    DescriptorsVolatile = 0x1,
    DataVolatile = 0x2,
    DataStaticWhileSetAtExecute = 0x4,
    DataStatic = 0x8,
}

pub type VolatilityFlags = BitFlags<Volatility>;

// Indexed by [tier][kind]. Descriptors may only be volatile where the tier allows
// changing them after recording.
const VOLATILITY_TABLE: [[VolatilityFlags; 4]; 3] = [
    // Tier1
    [
        make_bitflags!(Volatility::{DataStaticWhileSetAtExecute}),
        make_bitflags!(Volatility::{DataStaticWhileSetAtExecute}),
        make_bitflags!(Volatility::{DataVolatile}),
        VolatilityFlags::EMPTY,
    ],
    // Tier2
    [
        make_bitflags!(Volatility::{DataStaticWhileSetAtExecute}),
        make_bitflags!(Volatility::{DataStaticWhileSetAtExecute | DescriptorsVolatile}),
        make_bitflags!(Volatility::{DataVolatile}),
        make_bitflags!(Volatility::{DescriptorsVolatile}),
    ],
    // Tier3
    [
        make_bitflags!(Volatility::{DataStaticWhileSetAtExecute | DescriptorsVolatile}),
        make_bitflags!(Volatility::{DataStaticWhileSetAtExecute | DescriptorsVolatile}),
        make_bitflags!(Volatility::{DataVolatile | DescriptorsVolatile}),
        make_bitflags!(Volatility::{DescriptorsVolatile}),
    ],
];

/// Descriptor-range flags for a binding of `kind` on a device of binding `tier`.
#[inline]
pub fn range_volatility(tier: ResourceBindingTier, kind: DescriptorKind) -> VolatilityFlags {
    VOLATILITY_TABLE[tier.index()][kind.index()]
}

/// Layout-wide flags. Bit values match `D3D12_ROOT_SIGNATURE_FLAGS`.
#[enumflags2::bitflags]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayoutFlag {
    AllowInputAssemblerInputLayout = 0x1,
    DenyVertexShaderRootAccess = 0x2,
    DenyHullShaderRootAccess = 0x4,
    DenyDomainShaderRootAccess = 0x8,
    DenyGeometryShaderRootAccess = 0x10,
    DenyPixelShaderRootAccess = 0x20,
    AllowStreamOutput = 0x40,
    LocalRootSignature = 0x80,
    DenyAmplificationShaderRootAccess = 0x100,
    DenyMeshShaderRootAccess = 0x200,
    CbvSrvUavHeapDirectlyIndexed = 0x400,
    SamplerHeapDirectlyIndexed = 0x800,
}

pub type LayoutFlags = BitFlags<LayoutFlag>;

impl LayoutFlag {
    pub fn deny(stage: ShaderStage) -> LayoutFlag {
        match stage {
            ShaderStage::Vertex => LayoutFlag::DenyVertexShaderRootAccess,
            ShaderStage::Hull => LayoutFlag::DenyHullShaderRootAccess,
            ShaderStage::Domain => LayoutFlag::DenyDomainShaderRootAccess,
            ShaderStage::Geometry => LayoutFlag::DenyGeometryShaderRootAccess,
            ShaderStage::Pixel => LayoutFlag::DenyPixelShaderRootAccess,
            ShaderStage::Amplification => LayoutFlag::DenyAmplificationShaderRootAccess,
            ShaderStage::Mesh => LayoutFlag::DenyMeshShaderRootAccess,
        }
    }
}

/// Summary of a built layout, cached for O(1) queries by the pipeline assembler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LayoutSummary {
    pub has_cbv: bool,
    pub has_srv: bool,
    pub has_uav: bool,
    pub has_static_sampler: bool,
    pub has_dynamic_sampler: bool,
    /// Number of root parameters created for binding slots.
    pub elements_count: u32,
    /// Root parameter index of the 32-bit constants block (the slots come first).
    pub constant_32bits_count: u32,
    /// Number of 32-bit values in the constants block, if there is one.
    pub num_32bit_values: Option<u32>,
    pub denied_stages: ShaderVisibility,
    pub flags: LayoutFlags,
}

/// The one stage a parameter is restricted to, `None` for all stages.
///
/// Compute and ray-tracing parameters must be visible to all stages to reach their shader.
fn restricted_stage(kind: LayoutKind, visibility: ShaderVisibility) -> Option<ShaderStage> {
    match kind {
        LayoutKind::Graphics => visibility.single_stage(),
        LayoutKind::Compute | LayoutKind::RayTracingGlobal | LayoutKind::RayTracingLocal => None,
    }
}

/// A slot with its backend-independent decisions applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PlannedSlot {
    pub slot: BindingSlot,
    pub volatility: VolatilityFlags,
    /// `None` means visible to all stages.
    pub stage: Option<ShaderStage>,
}

/// Backend-independent decisions for one layout.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LayoutPlan {
    pub name: String,
    pub kind: LayoutKind,
    pub slots: Vec<PlannedSlot>,
    pub constants: Option<(Constants32Block, Option<ShaderStage>)>,
    pub static_samplers: Vec<StaticSamplerDesc>,
    pub summary: LayoutSummary,
}

impl LayoutPlan {
    pub fn stage_of(&self, visibility: ShaderVisibility) -> Option<ShaderStage> {
        restricted_stage(self.kind, visibility)
    }

    pub fn new(desc: &BindingLayoutDesc, tier: ResourceBindingTier) -> Self {
        let stage_of = |visibility: ShaderVisibility| restricted_stage(desc.kind, visibility);

        let slots: Vec<PlannedSlot> = desc
            .slots
            .iter()
            .map(|slot| PlannedSlot {
                slot: *slot,
                volatility: range_volatility(tier, slot.kind),
                stage: stage_of(slot.visibility),
            })
            .collect();

        let static_samplers = if desc.kind == LayoutKind::RayTracingLocal {
            if !desc.static_samplers.is_empty() {
                log::warn!(
                    "layout '{}': dropping {} static sampler(s), local root signatures cannot own samplers",
                    desc.name,
                    desc.static_samplers.len()
                );
            }
            Vec::new()
        } else {
            desc.static_samplers.clone()
        };

        let mut stage_usage = [0u32; ShaderStage::ALL.len()];
        let visibilities = desc
            .slots
            .iter()
            .map(|s| s.visibility)
            .chain(desc.constants.iter().map(|c| c.visibility))
            .chain(static_samplers.iter().map(|s| s.visibility));
        for visibility in visibilities {
            for stage in visibility.stages() {
                stage_usage[stage.index()] += 1;
            }
        }

        let mut flags = LayoutFlags::empty();
        let mut denied_stages = ShaderVisibility::none();
        let has_parameters = !desc.slots.is_empty() || desc.constants.is_some() || !static_samplers.is_empty();
        match desc.kind {
            LayoutKind::Graphics => {
                if has_parameters {
                    for stage in ShaderStage::ALL {
                        if stage_usage[stage.index()] == 0 {
                            flags |= LayoutFlag::deny(stage);
                            denied_stages.insert(stage);
                        }
                    }
                }
                if desc.use_ia_input_layout {
                    flags |= LayoutFlag::AllowInputAssemblerInputLayout;
                }
            }
            LayoutKind::RayTracingLocal => flags |= LayoutFlag::LocalRootSignature,
            LayoutKind::Compute | LayoutKind::RayTracingGlobal => {}
        }
        if desc.cbv_srv_uav_heap_directly_indexed {
            flags |= LayoutFlag::CbvSrvUavHeapDirectlyIndexed;
        }
        if desc.sampler_heap_directly_indexed {
            flags |= LayoutFlag::SamplerHeapDirectlyIndexed;
        }

        let has_kind = |kind: DescriptorKind| desc.slots.iter().any(|s| s.kind == kind);
        let elements_count = slots.len() as u32;
        let summary = LayoutSummary {
            has_cbv: has_kind(DescriptorKind::ConstantBuffer),
            has_srv: has_kind(DescriptorKind::ShaderResource),
            has_uav: has_kind(DescriptorKind::UnorderedAccess),
            has_static_sampler: !static_samplers.is_empty(),
            has_dynamic_sampler: has_kind(DescriptorKind::Sampler),
            elements_count,
            constant_32bits_count: elements_count,
            num_32bit_values: desc.constants.map(|c| c.count),
            denied_stages,
            flags,
        };

        Self {
            name: desc.name.clone(),
            kind: desc.kind,
            slots,
            constants: desc.constants.map(|c| (c, stage_of(c.visibility))),
            static_samplers,
            summary,
        }
    }
}

/// The API object behind a [`BuiltResourceLayout`].
pub enum BackendLayout {
    Dx12(Dx12RootSignature),
    Vulkan(VulkanResourceLayout),
}

/// A root signature or descriptor-set/pipeline layout, plus its cached summary.
///
/// Shared by the pipelines that use it; the native objects are released with the last `Arc`.
pub struct BuiltResourceLayout {
    name: String,
    kind: LayoutKind,
    summary: LayoutSummary,
    object: BackendLayout,
}

impl BuiltResourceLayout {
    #[inline]
    pub fn name(&self) -> &str { &self.name }

    #[inline]
    pub fn kind(&self) -> LayoutKind { self.kind }

    #[inline]
    pub fn summary(&self) -> &LayoutSummary { &self.summary }

    #[inline]
    pub fn object(&self) -> &BackendLayout { &self.object }

    pub fn as_dx12(&self) -> Option<&Dx12RootSignature> {
        match &self.object {
            BackendLayout::Dx12(root_signature) => Some(root_signature),
            BackendLayout::Vulkan(_) => None,
        }
    }

    pub fn as_vulkan(&self) -> Option<&VulkanResourceLayout> {
        match &self.object {
            BackendLayout::Vulkan(layout) => Some(layout),
            BackendLayout::Dx12(_) => None,
        }
    }

    #[inline]
    pub fn has_cbv(&self) -> bool { self.summary.has_cbv }

    #[inline]
    pub fn has_srv(&self) -> bool { self.summary.has_srv }

    #[inline]
    pub fn has_uav(&self) -> bool { self.summary.has_uav }

    #[inline]
    pub fn has_static_sampler(&self) -> bool { self.summary.has_static_sampler }

    #[inline]
    pub fn has_dynamic_sampler(&self) -> bool { self.summary.has_dynamic_sampler }

    #[inline]
    pub fn elements_count(&self) -> u32 { self.summary.elements_count }

    #[inline]
    pub fn constant_32bits_count(&self) -> u32 { self.summary.constant_32bits_count }

    #[inline]
    pub fn flags(&self) -> LayoutFlags { self.summary.flags }
}

/// Builds [`BuiltResourceLayout`]s for the device's active backend.
pub struct ResourceLayoutBuilder;

impl ResourceLayoutBuilder {
    /// Build the binding object for `desc`.
    ///
    /// Fails with [`RhiError::LayoutCreation`] if the backend rejects the layout; nothing
    /// partially built is returned.
    #[profiling::function]
    pub fn build(desc: &BindingLayoutDesc, device: &RenderDevice) -> Result<Arc<BuiltResourceLayout>, RhiError> {
        if device.config().validation {
            for (kind, binding, space) in desc.duplicate_bindings() {
                log::warn!(
                    "layout '{}': {:?} binding {} in space {} is declared more than once",
                    desc.name, kind, binding, space
                );
            }
        }

        if desc.kind.is_ray_tracing() && !device.is_supported_ray_tracing() {
            let e = RhiError::Unsupported("ray tracing");
            log::error!("cannot build ray-tracing layout '{}': {}", desc.name, e);
            return Err(RhiError::layout_creation(&desc.name, e));
        }

        let plan = LayoutPlan::new(desc, device.resource_binding_tier());

        let object = match device.backend() {
            GraphicsBackend::Dx12(dx12_device) => {
                dx12::create_root_signature(&plan, dx12_device, device.capabilities())
                    .map(BackendLayout::Dx12)
            }
            GraphicsBackend::Vulkan(vulkan_device) => {
                vulkan::create_resource_layout(&plan, vulkan_device, &device.config().vulkan_binding_shifts)
                    .map(BackendLayout::Vulkan)
            }
        }
        .map_err(|e| {
            log::error!("failed to build resource layout '{}' on {}: {}", desc.name, device.api(), e);
            RhiError::layout_creation(&desc.name, e)
        })?;

        log::debug!(
            "built {} layout '{}': {} element(s), flags {:?}",
            device.api(),
            desc.name,
            plan.summary.elements_count,
            plan.summary.flags
        );

        Ok(Arc::new(BuiltResourceLayout {
            name: plan.name,
            kind: plan.kind,
            summary: plan.summary,
            object,
        }))
    }
}

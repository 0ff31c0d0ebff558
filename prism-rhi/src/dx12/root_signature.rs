//! Root signature description in D3D12's own terms, and the `ID3D12RootSignature` wrapper.
//!
//! Enum and flag values match the D3D12 headers, so a driver only has to copy fields into the
//! native structures.

use prism_core::log;
use prism_rhi_derive::DeviceObject;
use crate::binding::{AddressMode, BorderColor, CompareOp, DescriptorKind, SamplerFilter, ShaderStage, StaticSamplerDesc};
use crate::device::{DeviceCapabilities, DeviceObject, RootSignatureVersion};
use crate::error::RhiError;
use crate::layout::{LayoutFlag, LayoutFlags, LayoutPlan, PlannedSlot, Volatility, VolatilityFlags};
use crate::resource::NativeHandle;
use super::Dx12Device;

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum D3d12DescriptorRangeType {
    Srv = 0,
    Uav = 1,
    Cbv = 2,
    Sampler = 3,
}

impl From<DescriptorKind> for D3d12DescriptorRangeType {
    fn from(kind: DescriptorKind) -> Self {
        match kind {
            DescriptorKind::ConstantBuffer => D3d12DescriptorRangeType::Cbv,
            DescriptorKind::ShaderResource => D3d12DescriptorRangeType::Srv,
            DescriptorKind::UnorderedAccess => D3d12DescriptorRangeType::Uav,
            DescriptorKind::Sampler => D3d12DescriptorRangeType::Sampler,
        }
    }
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum D3d12ShaderVisibility {
    All = 0,
    Vertex = 1,
    Hull = 2,
    Domain = 3,
    Geometry = 4,
    Pixel = 5,
    Amplification = 6,
    Mesh = 7,
}

impl From<Option<ShaderStage>> for D3d12ShaderVisibility {
    fn from(stage: Option<ShaderStage>) -> Self {
        match stage {
            None => D3d12ShaderVisibility::All,
            Some(ShaderStage::Vertex) => D3d12ShaderVisibility::Vertex,
            Some(ShaderStage::Hull) => D3d12ShaderVisibility::Hull,
            Some(ShaderStage::Domain) => D3d12ShaderVisibility::Domain,
            Some(ShaderStage::Geometry) => D3d12ShaderVisibility::Geometry,
            Some(ShaderStage::Pixel) => D3d12ShaderVisibility::Pixel,
            Some(ShaderStage::Amplification) => D3d12ShaderVisibility::Amplification,
            Some(ShaderStage::Mesh) => D3d12ShaderVisibility::Mesh,
        }
    }
}

/// `D3D12_DESCRIPTOR_RANGE1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorRange1 {
    pub range_type: D3d12DescriptorRangeType,
    pub num_descriptors: u32,
    pub base_shader_register: u32,
    pub register_space: u32,
    pub flags: VolatilityFlags,
    pub offset_in_descriptors_from_table_start: u32,
}

/// `D3D12_DESCRIPTOR_RANGE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorRange {
    pub range_type: D3d12DescriptorRangeType,
    pub num_descriptors: u32,
    pub base_shader_register: u32,
    pub register_space: u32,
    pub offset_in_descriptors_from_table_start: u32,
}

impl From<&DescriptorRange1> for DescriptorRange {
    fn from(range: &DescriptorRange1) -> Self {
        Self {
            range_type: range.range_type,
            num_descriptors: range.num_descriptors,
            base_shader_register: range.base_shader_register,
            register_space: range.register_space,
            offset_in_descriptors_from_table_start: range.offset_in_descriptors_from_table_start,
        }
    }
}

/// `D3D12_ROOT_CONSTANTS`. Identical in both versions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RootConstants {
    pub shader_register: u32,
    pub register_space: u32,
    pub num_32bit_values: u32,
}

/// `D3D12_ROOT_DESCRIPTOR1`. The flags never contain `DescriptorsVolatile`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RootDescriptor1 {
    pub shader_register: u32,
    pub register_space: u32,
    pub flags: VolatilityFlags,
}

/// `D3D12_ROOT_DESCRIPTOR`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RootDescriptor {
    pub shader_register: u32,
    pub register_space: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RootParameterKind<R, D> {
    DescriptorTable(Vec<R>),
    Constants(RootConstants),
    Cbv(D),
    Srv(D),
    Uav(D),
}

/// `D3D12_ROOT_PARAMETER` (or `D3D12_ROOT_PARAMETER1` through [`RootParameter1`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootParameter<R = DescriptorRange, D = RootDescriptor> {
    pub kind: RootParameterKind<R, D>,
    pub visibility: D3d12ShaderVisibility,
}

pub type RootParameter1 = RootParameter<DescriptorRange1, RootDescriptor1>;

impl From<&RootParameter1> for RootParameter {
    fn from(parameter: &RootParameter1) -> Self {
        let descriptor = |d: &RootDescriptor1| RootDescriptor {
            shader_register: d.shader_register,
            register_space: d.register_space,
        };
        let kind = match &parameter.kind {
            RootParameterKind::DescriptorTable(ranges) => {
                RootParameterKind::DescriptorTable(ranges.iter().map(DescriptorRange::from).collect())
            }
            RootParameterKind::Constants(constants) => RootParameterKind::Constants(*constants),
            RootParameterKind::Cbv(d) => RootParameterKind::Cbv(descriptor(d)),
            RootParameterKind::Srv(d) => RootParameterKind::Srv(descriptor(d)),
            RootParameterKind::Uav(d) => RootParameterKind::Uav(descriptor(d)),
        };
        Self {
            kind,
            visibility: parameter.visibility,
        }
    }
}

/// `D3D12_FILTER` values a static sampler can end up with.
pub mod d3d12_filter {
    pub const MIN_MAG_MIP_POINT: u32 = 0x00;
    pub const MIN_MAG_MIP_LINEAR: u32 = 0x15;
    pub const ANISOTROPIC: u32 = 0x55;
    /// `D3D12_FILTER_REDUCTION_TYPE_COMPARISON` in the reduction bits.
    pub const REDUCTION_COMPARISON: u32 = 0x80;
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum D3d12AddressMode {
    Wrap = 1,
    Mirror = 2,
    Clamp = 3,
    Border = 4,
    MirrorOnce = 5,
}

impl From<AddressMode> for D3d12AddressMode {
    fn from(mode: AddressMode) -> Self {
        match mode {
            AddressMode::Wrap => D3d12AddressMode::Wrap,
            AddressMode::Mirror => D3d12AddressMode::Mirror,
            AddressMode::Clamp => D3d12AddressMode::Clamp,
            AddressMode::Border => D3d12AddressMode::Border,
            AddressMode::MirrorOnce => D3d12AddressMode::MirrorOnce,
        }
    }
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum D3d12ComparisonFunc {
    Never = 1,
    Less = 2,
    Equal = 3,
    LessEqual = 4,
    Greater = 5,
    NotEqual = 6,
    GreaterEqual = 7,
    Always = 8,
}

impl From<CompareOp> for D3d12ComparisonFunc {
    fn from(op: CompareOp) -> Self {
        match op {
            CompareOp::Never => D3d12ComparisonFunc::Never,
            CompareOp::Less => D3d12ComparisonFunc::Less,
            CompareOp::Equal => D3d12ComparisonFunc::Equal,
            CompareOp::LessEqual => D3d12ComparisonFunc::LessEqual,
            CompareOp::Greater => D3d12ComparisonFunc::Greater,
            CompareOp::NotEqual => D3d12ComparisonFunc::NotEqual,
            CompareOp::GreaterEqual => D3d12ComparisonFunc::GreaterEqual,
            CompareOp::Always => D3d12ComparisonFunc::Always,
        }
    }
}

/// `D3D12_STATIC_BORDER_COLOR`.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum D3d12BorderColor {
    TransparentBlack = 0,
    OpaqueBlack = 1,
    OpaqueWhite = 2,
}

impl From<BorderColor> for D3d12BorderColor {
    fn from(color: BorderColor) -> Self {
        match color {
            BorderColor::TransparentBlack => D3d12BorderColor::TransparentBlack,
            BorderColor::OpaqueBlack => D3d12BorderColor::OpaqueBlack,
            BorderColor::OpaqueWhite => D3d12BorderColor::OpaqueWhite,
        }
    }
}

/// `D3D12_STATIC_SAMPLER_DESC`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct D3d12StaticSampler {
    pub filter: u32,
    pub address_u: D3d12AddressMode,
    pub address_v: D3d12AddressMode,
    pub address_w: D3d12AddressMode,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
    pub comparison_func: D3d12ComparisonFunc,
    pub border_color: D3d12BorderColor,
    pub min_lod: f32,
    pub max_lod: f32,
    pub shader_register: u32,
    pub register_space: u32,
    pub shader_visibility: D3d12ShaderVisibility,
}

impl D3d12StaticSampler {
    pub fn new(desc: &StaticSamplerDesc, visibility: D3d12ShaderVisibility) -> Self {
        let filter = match desc.filter {
            SamplerFilter::Point => d3d12_filter::MIN_MAG_MIP_POINT,
            SamplerFilter::Linear => d3d12_filter::MIN_MAG_MIP_LINEAR,
            SamplerFilter::Anisotropic => d3d12_filter::ANISOTROPIC,
        };
        let filter = if desc.comparison.is_some() {
            filter | d3d12_filter::REDUCTION_COMPARISON
        } else {
            filter
        };

        Self {
            filter,
            address_u: desc.address_u.into(),
            address_v: desc.address_v.into(),
            address_w: desc.address_w.into(),
            mip_lod_bias: desc.mip_lod_bias,
            max_anisotropy: desc.max_anisotropy,
            comparison_func: desc.comparison.unwrap_or(CompareOp::Never).into(),
            border_color: desc.border_color.into(),
            min_lod: desc.min_lod,
            max_lod: desc.max_lod,
            shader_register: desc.binding,
            register_space: desc.space,
            shader_visibility: visibility,
        }
    }
}

/// `D3D12_ROOT_SIGNATURE_DESC` (or `D3D12_ROOT_SIGNATURE_DESC1` through [`RootSignatureDesc1`]).
#[derive(Clone, Debug, PartialEq)]
pub struct RootSignatureDesc<P = RootParameter> {
    pub parameters: Vec<P>,
    pub static_samplers: Vec<D3d12StaticSampler>,
    pub flags: LayoutFlags,
}

pub type RootSignatureDesc1 = RootSignatureDesc<RootParameter1>;

impl RootSignatureDesc1 {
    /// Lower to the 1.0 format. Keeps every field except the 1.1-only range and descriptor flags.
    ///
    /// Direct heap indexing needs root signature 1.1, so those flags are dropped too.
    pub fn downgrade(&self) -> RootSignatureDesc {
        let heap_indexing = LayoutFlag::CbvSrvUavHeapDirectlyIndexed | LayoutFlag::SamplerHeapDirectlyIndexed;
        if self.flags.intersects(heap_indexing) {
            log::warn!(
                "dropping {:?}: direct heap indexing needs root signature 1.1",
                self.flags & heap_indexing
            );
        }
        RootSignatureDesc {
            parameters: self.parameters.iter().map(RootParameter::from).collect(),
            static_samplers: self.static_samplers.clone(),
            flags: self.flags & !heap_indexing,
        }
    }
}

/// `D3D12_VERSIONED_ROOT_SIGNATURE_DESC`.
#[derive(Clone, Debug, PartialEq)]
pub enum VersionedRootSignatureDesc {
    V1_0(RootSignatureDesc),
    V1_1(RootSignatureDesc1),
}

impl VersionedRootSignatureDesc {
    pub fn version(&self) -> RootSignatureVersion {
        match self {
            VersionedRootSignatureDesc::V1_0(_) => RootSignatureVersion::V1_0,
            VersionedRootSignatureDesc::V1_1(_) => RootSignatureVersion::V1_1,
        }
    }

    pub fn num_parameters(&self) -> usize {
        match self {
            VersionedRootSignatureDesc::V1_0(desc) => desc.parameters.len(),
            VersionedRootSignatureDesc::V1_1(desc) => desc.parameters.len(),
        }
    }

    pub fn static_samplers(&self) -> &[D3d12StaticSampler] {
        match self {
            VersionedRootSignatureDesc::V1_0(desc) => &desc.static_samplers,
            VersionedRootSignatureDesc::V1_1(desc) => &desc.static_samplers,
        }
    }

    pub fn flags(&self) -> LayoutFlags {
        match self {
            VersionedRootSignatureDesc::V1_0(desc) => desc.flags,
            VersionedRootSignatureDesc::V1_1(desc) => desc.flags,
        }
    }
}

fn slot_parameter(planned: &PlannedSlot) -> RootParameter1 {
    let slot = &planned.slot;
    let visibility = D3d12ShaderVisibility::from(planned.stage);

    // Root descriptors are single, non-sampler views.
    if slot.root_descriptor && slot.kind != DescriptorKind::Sampler && slot.count == 1 {
        let mut flags = planned.volatility;
        flags.remove(Volatility::DescriptorsVolatile);
        let descriptor = RootDescriptor1 {
            shader_register: slot.binding,
            register_space: slot.space,
            flags,
        };
        let kind = match slot.kind {
            DescriptorKind::ConstantBuffer => RootParameterKind::Cbv(descriptor),
            DescriptorKind::ShaderResource => RootParameterKind::Srv(descriptor),
            _ => RootParameterKind::Uav(descriptor),
        };
        return RootParameter { kind, visibility };
    }

    RootParameter {
        kind: RootParameterKind::DescriptorTable(vec![DescriptorRange1 {
            range_type: slot.kind.into(),
            num_descriptors: slot.count,
            base_shader_register: slot.binding,
            register_space: slot.space,
            flags: planned.volatility,
            offset_in_descriptors_from_table_start: 0,
        }]),
        visibility,
    }
}

/// The 1.1 description of `plan`: one parameter per slot in order, then the constants.
pub(crate) fn root_signature_desc(plan: &LayoutPlan) -> RootSignatureDesc1 {
    let mut parameters: Vec<RootParameter1> = plan.slots.iter().map(slot_parameter).collect();

    if let Some((constants, stage)) = &plan.constants {
        parameters.push(RootParameter {
            kind: RootParameterKind::Constants(RootConstants {
                shader_register: constants.binding,
                register_space: constants.space,
                num_32bit_values: constants.count,
            }),
            visibility: D3d12ShaderVisibility::from(*stage),
        });
    }

    let static_samplers = plan
        .static_samplers
        .iter()
        .map(|sampler| D3d12StaticSampler::new(sampler, plan.stage_of(sampler.visibility).into()))
        .collect();

    RootSignatureDesc {
        parameters,
        static_samplers,
        flags: plan.summary.flags,
    }
}

/// A created `ID3D12RootSignature`. Released when dropped.
#[DeviceObject(dx12)]
pub struct Dx12RootSignature {
    handle: NativeHandle,
    desc: VersionedRootSignatureDesc,
}

impl Dx12RootSignature {
    pub(crate) fn new(plan: &LayoutPlan, device: &Dx12Device, capabilities: &DeviceCapabilities) -> Result<Self, RhiError> {
        let desc = root_signature_desc(plan);
        let desc = if capabilities.max_root_signature_version >= RootSignatureVersion::V1_1 {
            VersionedRootSignatureDesc::V1_1(desc)
        } else {
            VersionedRootSignatureDesc::V1_0(desc.downgrade())
        };

        let driver = device.driver();
        let blob = driver.serialize_root_signature(&desc)?;
        if blob.is_empty() {
            return Err(RhiError::Serialization(format!("empty blob for '{}'", plan.name)));
        }
        let handle = driver.create_root_signature(capabilities.gpu_mask, &blob)?;
        log::trace!(
            "root signature '{}': version {}, {} parameter(s), {} byte blob",
            plan.name,
            desc.version(),
            desc.num_parameters(),
            blob.len()
        );

        Ok(Self {
            handle,
            desc,
            driver: driver.clone(),
        })
    }

    #[inline]
    pub fn handle(&self) -> NativeHandle { self.handle }

    #[inline]
    pub fn version(&self) -> RootSignatureVersion { self.desc.version() }

    #[inline]
    pub fn desc(&self) -> &VersionedRootSignatureDesc { &self.desc }
}

impl Drop for Dx12RootSignature {
    fn drop(&mut self) {
        self.driver().release_root_signature(self.handle);
    }
}

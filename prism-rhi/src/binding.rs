//! API-neutral description of what a pipeline binds.

use derive_builder::Builder;
use enumflags2::BitFlags;

/// Rasterization shader stages a binding can be visible to.
#[enumflags2::bitflags]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex = 1 << 0,
    Hull = 1 << 1,
    Domain = 1 << 2,
    Geometry = 1 << 3,
    Pixel = 1 << 4,
    Amplification = 1 << 5,
    Mesh = 1 << 6,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 7] = [
        ShaderStage::Vertex,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Geometry,
        ShaderStage::Pixel,
        ShaderStage::Amplification,
        ShaderStage::Mesh,
    ];

    /// Position in [`ShaderStage::ALL`].
    pub fn index(self) -> usize {
        (self as u8).trailing_zeros() as usize
    }
}

/// Set of stages that read a binding. Every bit set means "all stages".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct ShaderVisibility(BitFlags<ShaderStage>);

impl ShaderVisibility {
    pub fn none() -> Self {
        Self(BitFlags::empty())
    }

    pub fn all() -> Self {
        Self(BitFlags::all())
    }

    pub fn insert(&mut self, stage: ShaderStage) {
        self.0.insert(stage);
    }

    #[inline]
    pub fn contains(self, stage: ShaderStage) -> bool {
        self.0.contains(stage)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn is_all(self) -> bool {
        self.0.is_all()
    }

    /// The stage, if exactly one is set.
    #[inline]
    pub fn single_stage(self) -> Option<ShaderStage> {
        self.0.exactly_one()
    }

    pub fn stages(self) -> impl Iterator<Item = ShaderStage> {
        self.0.iter()
    }

    pub fn bits(self) -> BitFlags<ShaderStage> {
        self.0
    }
}

impl From<ShaderStage> for ShaderVisibility {
    fn from(value: ShaderStage) -> Self {
        Self(BitFlags::from_flag(value))
    }
}

impl From<BitFlags<ShaderStage>> for ShaderVisibility {
    fn from(value: BitFlags<ShaderStage>) -> Self {
        Self(value)
    }
}

impl core::ops::BitOr for ShaderVisibility {
    type Output = ShaderVisibility;
    fn bitor(self, rhs: ShaderVisibility) -> Self::Output {
        ShaderVisibility(self.0 | rhs.0)
    }
}

impl core::ops::BitOr<ShaderStage> for ShaderVisibility {
    type Output = ShaderVisibility;
    fn bitor(self, rhs: ShaderStage) -> Self::Output {
        ShaderVisibility(self.0 | rhs)
    }
}

impl core::ops::BitOrAssign for ShaderVisibility {
    fn bitor_assign(&mut self, rhs: ShaderVisibility) {
        self.0 |= rhs.0;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    ConstantBuffer,
    ShaderResource,
    UnorderedAccess,
    Sampler,
}

impl DescriptorKind {
    pub const ALL: [DescriptorKind; 4] = [
        DescriptorKind::ConstantBuffer,
        DescriptorKind::ShaderResource,
        DescriptorKind::UnorderedAccess,
        DescriptorKind::Sampler,
    ];

    pub fn index(self) -> usize {
        match self {
            DescriptorKind::ConstantBuffer => 0,
            DescriptorKind::ShaderResource => 1,
            DescriptorKind::UnorderedAccess => 2,
            DescriptorKind::Sampler => 3,
        }
    }
}

/// Whether an SRV/UAV slot views a texture or a buffer. Only Vulkan distinguishes the two.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ResourceShape {
    #[default]
    Texture,
    Buffer,
}

/// One descriptor binding (`b`/`t`/`u`/`s` register range in HLSL terms).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BindingSlot {
    pub kind: DescriptorKind,
    pub binding: u32,
    pub space: u32,
    pub visibility: ShaderVisibility,
    pub count: u32,
    pub shape: ResourceShape,
    /// Bind directly in the root signature instead of through a descriptor table.
    /// Ignored for samplers and on Vulkan.
    pub root_descriptor: bool,
}

impl BindingSlot {
    pub fn new(kind: DescriptorKind, binding: u32, space: u32, visibility: impl Into<ShaderVisibility>) -> Self {
        Self {
            kind,
            binding,
            space,
            visibility: visibility.into(),
            count: 1,
            shape: ResourceShape::default(),
            root_descriptor: false,
        }
    }

    pub fn cbv(binding: u32, space: u32, visibility: impl Into<ShaderVisibility>) -> Self {
        Self::new(DescriptorKind::ConstantBuffer, binding, space, visibility)
    }

    pub fn srv(binding: u32, space: u32, visibility: impl Into<ShaderVisibility>) -> Self {
        Self::new(DescriptorKind::ShaderResource, binding, space, visibility)
    }

    pub fn uav(binding: u32, space: u32, visibility: impl Into<ShaderVisibility>) -> Self {
        Self::new(DescriptorKind::UnorderedAccess, binding, space, visibility)
    }

    pub fn sampler(binding: u32, space: u32, visibility: impl Into<ShaderVisibility>) -> Self {
        Self::new(DescriptorKind::Sampler, binding, space, visibility)
    }

    #[inline]
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    #[inline]
    pub fn with_shape(mut self, shape: ResourceShape) -> Self {
        self.shape = shape;
        self
    }

    #[inline]
    pub fn as_root_descriptor(mut self) -> Self {
        self.root_descriptor = true;
        self
    }
}

/// Inline 32-bit constants (root constants / push constants).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Constants32Block {
    /// Number of 32-bit values.
    pub count: u32,
    pub binding: u32,
    pub space: u32,
    pub visibility: ShaderVisibility,
}

impl Constants32Block {
    pub fn new(count: u32, binding: u32, space: u32, visibility: impl Into<ShaderVisibility>) -> Self {
        Self {
            count,
            binding,
            space,
            visibility: visibility.into(),
        }
    }

    pub fn size_in_bytes(&self) -> u32 {
        self.count * 4
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SamplerFilter {
    Point,
    Linear,
    Anisotropic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Wrap,
    Mirror,
    Clamp,
    Border,
    MirrorOnce,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BorderColor {
    TransparentBlack,
    OpaqueBlack,
    OpaqueWhite,
}

/// A sampler baked into the layout at build time.
#[derive(Clone, Debug, PartialEq, Builder)]
#[builder(setter(into))]
pub struct StaticSamplerDesc {
    pub binding: u32,
    #[builder(default)]
    pub space: u32,
    #[builder(default = "ShaderVisibility::all()")]
    pub visibility: ShaderVisibility,
    #[builder(default = "SamplerFilter::Linear")]
    pub filter: SamplerFilter,
    #[builder(default = "AddressMode::Wrap")]
    pub address_u: AddressMode,
    #[builder(default = "AddressMode::Wrap")]
    pub address_v: AddressMode,
    #[builder(default = "AddressMode::Wrap")]
    pub address_w: AddressMode,
    #[builder(default)]
    pub mip_lod_bias: f32,
    #[builder(default = "16")]
    pub max_anisotropy: u32,
    /// Makes this a comparison sampler.
    #[builder(default)]
    pub comparison: Option<CompareOp>,
    #[builder(default = "BorderColor::OpaqueBlack")]
    pub border_color: BorderColor,
    #[builder(default)]
    pub min_lod: f32,
    #[builder(default = "f32::MAX")]
    pub max_lod: f32,
}

impl StaticSamplerDesc {
    pub fn linear_wrap(binding: u32) -> Self {
        Self::with_filter(binding, SamplerFilter::Linear, AddressMode::Wrap)
    }

    pub fn point_clamp(binding: u32) -> Self {
        Self::with_filter(binding, SamplerFilter::Point, AddressMode::Clamp)
    }

    fn with_filter(binding: u32, filter: SamplerFilter, address: AddressMode) -> Self {
        Self {
            binding,
            space: 0,
            visibility: ShaderVisibility::all(),
            filter,
            address_u: address,
            address_v: address,
            address_w: address,
            mip_lod_bias: 0.0,
            max_anisotropy: 16,
            comparison: None,
            border_color: BorderColor::OpaqueBlack,
            min_lod: 0.0,
            max_lod: f32::MAX,
        }
    }
}

/// Which kind of pipeline a layout is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LayoutKind {
    #[default]
    Graphics,
    Compute,
    RayTracingGlobal,
    /// Per-shader-record layout. Cannot own static samplers.
    RayTracingLocal,
}

impl LayoutKind {
    pub fn is_ray_tracing(self) -> bool {
        matches!(self, LayoutKind::RayTracingGlobal | LayoutKind::RayTracingLocal)
    }
}

/// Everything a pipeline binds, independent of the graphics API.
///
/// Passed through to the backend as-is; binding-index uniqueness is the API's to enforce.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BindingLayoutDesc {
    pub name: String,
    pub kind: LayoutKind,
    pub slots: Vec<BindingSlot>,
    pub static_samplers: Vec<StaticSamplerDesc>,
    pub constants: Option<Constants32Block>,
    pub use_ia_input_layout: bool,
    pub cbv_srv_uav_heap_directly_indexed: bool,
    pub sampler_heap_directly_indexed: bool,
}

impl BindingLayoutDesc {
    pub fn new(name: &str, kind: LayoutKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            ..Default::default()
        }
    }

    pub fn graphics(name: &str) -> Self {
        Self::new(name, LayoutKind::Graphics)
    }

    pub fn compute(name: &str) -> Self {
        Self::new(name, LayoutKind::Compute)
    }

    pub fn with_slot(mut self, slot: BindingSlot) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn with_slots(mut self, slots: impl IntoIterator<Item = BindingSlot>) -> Self {
        self.slots.extend(slots);
        self
    }

    pub fn with_static_sampler(mut self, sampler: StaticSamplerDesc) -> Self {
        self.static_samplers.push(sampler);
        self
    }

    pub fn with_constants(mut self, constants: Constants32Block) -> Self {
        self.constants = Some(constants);
        self
    }

    pub fn with_input_layout(mut self) -> Self {
        self.use_ia_input_layout = true;
        self
    }

    /// Allow shaders to index the descriptor heaps directly (SM 6.6 `ResourceDescriptorHeap`).
    pub fn with_heap_indexing(mut self, resources: bool, samplers: bool) -> Self {
        self.cbv_srv_uav_heap_directly_indexed = resources;
        self.sampler_heap_directly_indexed = samplers;
        self
    }

    /// No slots, no constants and no static samplers.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty() && self.constants.is_none() && self.static_samplers.is_empty()
    }

    /// Bindings that share kind, register and space. The API rejects these at build time;
    /// this is only used to report them early.
    pub fn duplicate_bindings(&self) -> Vec<(DescriptorKind, u32, u32)> {
        let mut seen = prism_core::collections::hashset::HashSet::default();
        let mut duplicates = Vec::new();
        for slot in &self.slots {
            let key = (slot.kind, slot.binding, slot.space);
            if !seen.insert(key) {
                duplicates.push(key);
            }
        }
        duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_stage_is_only_reported_for_one_bit() {
        assert_eq!(ShaderVisibility::from(ShaderStage::Pixel).single_stage(), Some(ShaderStage::Pixel));
        assert_eq!(ShaderVisibility::none().single_stage(), None);
        assert_eq!((ShaderVisibility::from(ShaderStage::Vertex) | ShaderStage::Pixel).single_stage(), None);
        assert_eq!(ShaderVisibility::all().single_stage(), None);
    }

    #[test]
    fn stage_index_matches_table_position() {
        for (i, stage) in ShaderStage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
        for (i, kind) in DescriptorKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn sampler_builder_fills_defaults() {
        let sampler = StaticSamplerDescBuilder::default()
            .binding(3u32)
            .filter(SamplerFilter::Point)
            .comparison(Some(CompareOp::LessEqual))
            .build()
            .unwrap();
        assert_eq!(sampler.space, 0);
        assert!(sampler.visibility.is_all());
        assert_eq!(sampler.address_u, AddressMode::Wrap);
        assert_eq!(sampler.max_lod, f32::MAX);
        assert_eq!(sampler.comparison, Some(CompareOp::LessEqual));
    }

    #[test]
    fn sampler_builder_requires_binding() {
        assert!(StaticSamplerDescBuilder::default().build().is_err());
    }

    #[test]
    fn empty_descriptor_reports_empty() {
        assert!(BindingLayoutDesc::graphics("bindless").with_heap_indexing(true, true).is_empty());
        assert!(!BindingLayoutDesc::compute("cs")
            .with_constants(Constants32Block::new(4, 0, 0, ShaderVisibility::all()))
            .is_empty());
    }

    #[test]
    fn duplicate_bindings_are_detected_per_kind_and_space() {
        let desc = BindingLayoutDesc::graphics("dups")
            .with_slot(BindingSlot::srv(0, 0, ShaderStage::Pixel))
            .with_slot(BindingSlot::srv(0, 1, ShaderStage::Pixel))
            .with_slot(BindingSlot::cbv(0, 0, ShaderStage::Pixel))
            .with_slot(BindingSlot::srv(0, 0, ShaderStage::Vertex));
        assert_eq!(desc.duplicate_bindings(), vec![(DescriptorKind::ShaderResource, 0, 0)]);
    }
}

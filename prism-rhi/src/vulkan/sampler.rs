//! Static sampler descriptions lowered to `VkSamplerCreateInfo`.

use ash::vk;
use crate::binding::{AddressMode, BorderColor, CompareOp, SamplerFilter, StaticSamplerDesc};

fn address_mode(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Wrap => vk::SamplerAddressMode::REPEAT,
        AddressMode::Mirror => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::Clamp => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::Border => vk::SamplerAddressMode::CLAMP_TO_BORDER,
        AddressMode::MirrorOnce => vk::SamplerAddressMode::MIRROR_CLAMP_TO_EDGE,
    }
}

fn compare_op(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

fn border_color(color: BorderColor) -> vk::BorderColor {
    match color {
        BorderColor::TransparentBlack => vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
        BorderColor::OpaqueBlack => vk::BorderColor::FLOAT_OPAQUE_BLACK,
        BorderColor::OpaqueWhite => vk::BorderColor::FLOAT_OPAQUE_WHITE,
    }
}

/// Create info for the immutable sampler backing a static sampler.
pub fn sampler_create_info(desc: &StaticSamplerDesc) -> vk::SamplerCreateInfo<'static> {
    let (filter, mipmap_mode) = match desc.filter {
        SamplerFilter::Point => (vk::Filter::NEAREST, vk::SamplerMipmapMode::NEAREST),
        SamplerFilter::Linear | SamplerFilter::Anisotropic => (vk::Filter::LINEAR, vk::SamplerMipmapMode::LINEAR),
    };
    let anisotropy = desc.filter == SamplerFilter::Anisotropic;

    vk::SamplerCreateInfo::default()
        .mag_filter(filter)
        .min_filter(filter)
        .mipmap_mode(mipmap_mode)
        .address_mode_u(address_mode(desc.address_u))
        .address_mode_v(address_mode(desc.address_v))
        .address_mode_w(address_mode(desc.address_w))
        .mip_lod_bias(desc.mip_lod_bias)
        .anisotropy_enable(anisotropy)
        .max_anisotropy(if anisotropy { desc.max_anisotropy as f32 } else { 1.0 })
        .compare_enable(desc.comparison.is_some())
        .compare_op(desc.comparison.map_or(vk::CompareOp::ALWAYS, compare_op))
        .min_lod(desc.min_lod)
        .max_lod(desc.max_lod.min(vk::LOD_CLAMP_NONE))
        .border_color(border_color(desc.border_color))
        .unnormalized_coordinates(false)
}

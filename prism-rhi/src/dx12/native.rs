//! The driver seams implemented on a real `ID3D12Device` and `ID3D12GraphicsCommandList`.

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use prism_core::collections::SmallVec;
use prism_core::log;
use windows::core::Interface;
use windows::Win32::Graphics::Direct3D::ID3DBlob;
use windows::Win32::Graphics::Direct3D12::*;
use crate::error::RhiError;
use crate::resource::NativeHandle;
use super::barrier::{D3d12ResourceBarrier, Dx12CommandSink};
use super::root_signature::{
    D3d12StaticSampler, DescriptorRange, DescriptorRange1, RootDescriptor, RootDescriptor1, RootParameter,
    RootParameter1, RootParameterKind, RootSignatureDesc, RootSignatureDesc1, VersionedRootSignatureDesc,
};
use super::HResult;

impl From<windows::core::Error> for RhiError {
    fn from(e: windows::core::Error) -> Self {
        RhiError::Dx12(HResult(e.code().0))
    }
}

/// [`super::Dx12Driver`] over an `ID3D12Device`.
pub struct D3d12DeviceDriver {
    device: ID3D12Device,
}

// SAFETY: ID3D12Device is free-threaded; root-signature creation may be called from any thread.
unsafe impl Send for D3d12DeviceDriver {}
unsafe impl Sync for D3d12DeviceDriver {}

impl D3d12DeviceDriver {
    pub fn new(device: ID3D12Device) -> Self {
        Self { device }
    }

    #[inline]
    pub fn device(&self) -> &ID3D12Device {
        &self.device
    }
}

impl super::Dx12Driver for D3d12DeviceDriver {
    fn serialize_root_signature(&self, desc: &VersionedRootSignatureDesc) -> Result<Vec<u8>, RhiError> {
        match desc {
            VersionedRootSignatureDesc::V1_0(desc) => serialize_1_0(desc),
            VersionedRootSignatureDesc::V1_1(desc) => serialize_1_1(desc),
        }
    }

    fn create_root_signature(&self, node_mask: u32, blob: &[u8]) -> Result<NativeHandle, RhiError> {
        let root_signature: ID3D12RootSignature = unsafe { self.device.CreateRootSignature(node_mask, blob) }?;
        Ok(NativeHandle(root_signature.into_raw() as u64))
    }

    fn release_root_signature(&self, handle: NativeHandle) {
        // SAFETY: the handle is the owned reference handed out by `create_root_signature`, and
        // `Dx12RootSignature` releases it exactly once.
        drop(unsafe { ID3D12RootSignature::from_raw(handle.0 as usize as *mut c_void) });
    }
}

fn blob_bytes(blob: &ID3DBlob) -> Vec<u8> {
    // SAFETY: the pointer and size describe the blob's own buffer, alive as long as `blob`.
    unsafe { std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()).to_vec() }
}

fn serialize(desc: &D3D12_VERSIONED_ROOT_SIGNATURE_DESC) -> Result<Vec<u8>, RhiError> {
    let mut blob: Option<ID3DBlob> = None;
    let mut errors: Option<ID3DBlob> = None;
    let result = unsafe { D3D12SerializeVersionedRootSignature(desc, &mut blob, Some(&mut errors as *mut _)) };

    if let Err(e) = result {
        let message = match &errors {
            Some(errors) => String::from_utf8_lossy(&blob_bytes(errors)).trim_end_matches('\0').to_owned(),
            None => e.to_string(),
        };
        log::error!("D3D12SerializeVersionedRootSignature: {}", message);
        return Err(RhiError::Serialization(message));
    }
    blob.map(|blob| blob_bytes(&blob))
        .ok_or_else(|| RhiError::Serialization("no blob returned".to_owned()))
}

fn slice_ptr<T>(items: &[T]) -> *const T {
    if items.is_empty() { std::ptr::null() } else { items.as_ptr() }
}

fn shader_visibility<R, D>(parameter: &RootParameter<R, D>) -> D3D12_SHADER_VISIBILITY {
    D3D12_SHADER_VISIBILITY(parameter.visibility as i32)
}

fn parameter_type<R, D>(kind: &RootParameterKind<R, D>) -> D3D12_ROOT_PARAMETER_TYPE {
    match kind {
        RootParameterKind::DescriptorTable(_) => D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
        RootParameterKind::Constants(_) => D3D12_ROOT_PARAMETER_TYPE_32BIT_CONSTANTS,
        RootParameterKind::Cbv(_) => D3D12_ROOT_PARAMETER_TYPE_CBV,
        RootParameterKind::Srv(_) => D3D12_ROOT_PARAMETER_TYPE_SRV,
        RootParameterKind::Uav(_) => D3D12_ROOT_PARAMETER_TYPE_UAV,
    }
}

fn static_sampler(sampler: &D3d12StaticSampler) -> D3D12_STATIC_SAMPLER_DESC {
    D3D12_STATIC_SAMPLER_DESC {
        Filter: D3D12_FILTER(sampler.filter as i32),
        AddressU: D3D12_TEXTURE_ADDRESS_MODE(sampler.address_u as i32),
        AddressV: D3D12_TEXTURE_ADDRESS_MODE(sampler.address_v as i32),
        AddressW: D3D12_TEXTURE_ADDRESS_MODE(sampler.address_w as i32),
        MipLODBias: sampler.mip_lod_bias,
        MaxAnisotropy: sampler.max_anisotropy,
        ComparisonFunc: D3D12_COMPARISON_FUNC(sampler.comparison_func as i32),
        BorderColor: D3D12_STATIC_BORDER_COLOR(sampler.border_color as i32),
        MinLOD: sampler.min_lod,
        MaxLOD: sampler.max_lod,
        ShaderRegister: sampler.shader_register,
        RegisterSpace: sampler.register_space,
        ShaderVisibility: D3D12_SHADER_VISIBILITY(sampler.shader_visibility as i32),
    }
}

fn range_1_0(range: &DescriptorRange) -> D3D12_DESCRIPTOR_RANGE {
    D3D12_DESCRIPTOR_RANGE {
        RangeType: D3D12_DESCRIPTOR_RANGE_TYPE(range.range_type as i32),
        NumDescriptors: range.num_descriptors,
        BaseShaderRegister: range.base_shader_register,
        RegisterSpace: range.register_space,
        OffsetInDescriptorsFromTableStart: range.offset_in_descriptors_from_table_start,
    }
}

fn range_1_1(range: &DescriptorRange1) -> D3D12_DESCRIPTOR_RANGE1 {
    D3D12_DESCRIPTOR_RANGE1 {
        RangeType: D3D12_DESCRIPTOR_RANGE_TYPE(range.range_type as i32),
        NumDescriptors: range.num_descriptors,
        BaseShaderRegister: range.base_shader_register,
        RegisterSpace: range.register_space,
        Flags: D3D12_DESCRIPTOR_RANGE_FLAGS(range.flags.bits() as i32),
        OffsetInDescriptorsFromTableStart: range.offset_in_descriptors_from_table_start,
    }
}

/// `ranges` backs the descriptor table, if `parameter` is one.
fn parameter_1_0(parameter: &RootParameter, ranges: &[D3D12_DESCRIPTOR_RANGE]) -> D3D12_ROOT_PARAMETER {
    let descriptor = |d: &RootDescriptor| D3D12_ROOT_PARAMETER_0 {
        Descriptor: D3D12_ROOT_DESCRIPTOR {
            ShaderRegister: d.shader_register,
            RegisterSpace: d.register_space,
        },
    };
    let anonymous = match &parameter.kind {
        RootParameterKind::DescriptorTable(_) => D3D12_ROOT_PARAMETER_0 {
            DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE {
                NumDescriptorRanges: ranges.len() as u32,
                pDescriptorRanges: slice_ptr(ranges),
            },
        },
        RootParameterKind::Constants(c) => D3D12_ROOT_PARAMETER_0 {
            Constants: D3D12_ROOT_CONSTANTS {
                ShaderRegister: c.shader_register,
                RegisterSpace: c.register_space,
                Num32BitValues: c.num_32bit_values,
            },
        },
        RootParameterKind::Cbv(d) | RootParameterKind::Srv(d) | RootParameterKind::Uav(d) => descriptor(d),
    };
    D3D12_ROOT_PARAMETER {
        ParameterType: parameter_type(&parameter.kind),
        Anonymous: anonymous,
        ShaderVisibility: shader_visibility(parameter),
    }
}

fn parameter_1_1(parameter: &RootParameter1, ranges: &[D3D12_DESCRIPTOR_RANGE1]) -> D3D12_ROOT_PARAMETER1 {
    let descriptor = |d: &RootDescriptor1| D3D12_ROOT_PARAMETER1_0 {
        Descriptor: D3D12_ROOT_DESCRIPTOR1 {
            ShaderRegister: d.shader_register,
            RegisterSpace: d.register_space,
            Flags: D3D12_ROOT_DESCRIPTOR_FLAGS(d.flags.bits() as i32),
        },
    };
    let anonymous = match &parameter.kind {
        RootParameterKind::DescriptorTable(_) => D3D12_ROOT_PARAMETER1_0 {
            DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE1 {
                NumDescriptorRanges: ranges.len() as u32,
                pDescriptorRanges: slice_ptr(ranges),
            },
        },
        RootParameterKind::Constants(c) => D3D12_ROOT_PARAMETER1_0 {
            Constants: D3D12_ROOT_CONSTANTS {
                ShaderRegister: c.shader_register,
                RegisterSpace: c.register_space,
                Num32BitValues: c.num_32bit_values,
            },
        },
        RootParameterKind::Cbv(d) | RootParameterKind::Srv(d) | RootParameterKind::Uav(d) => descriptor(d),
    };
    D3D12_ROOT_PARAMETER1 {
        ParameterType: parameter_type(&parameter.kind),
        Anonymous: anonymous,
        ShaderVisibility: shader_visibility(parameter),
    }
}

fn table_ranges<R, D, N>(parameter: &RootParameter<R, D>, lower: impl Fn(&R) -> N) -> Vec<N> {
    match &parameter.kind {
        RootParameterKind::DescriptorTable(ranges) => ranges.iter().map(lower).collect(),
        _ => Vec::new(),
    }
}

fn serialize_1_0(desc: &RootSignatureDesc) -> Result<Vec<u8>, RhiError> {
    let ranges: Vec<Vec<D3D12_DESCRIPTOR_RANGE>> =
        desc.parameters.iter().map(|p| table_ranges(p, range_1_0)).collect();
    let parameters: Vec<D3D12_ROOT_PARAMETER> =
        desc.parameters.iter().zip(&ranges).map(|(p, r)| parameter_1_0(p, r)).collect();
    let samplers: Vec<D3D12_STATIC_SAMPLER_DESC> = desc.static_samplers.iter().map(static_sampler).collect();

    serialize(&D3D12_VERSIONED_ROOT_SIGNATURE_DESC {
        Version: D3D_ROOT_SIGNATURE_VERSION_1_0,
        Anonymous: D3D12_VERSIONED_ROOT_SIGNATURE_DESC_0 {
            Desc_1_0: D3D12_ROOT_SIGNATURE_DESC {
                NumParameters: parameters.len() as u32,
                pParameters: slice_ptr(&parameters),
                NumStaticSamplers: samplers.len() as u32,
                pStaticSamplers: slice_ptr(&samplers),
                Flags: D3D12_ROOT_SIGNATURE_FLAGS(desc.flags.bits() as i32),
            },
        },
    })
}

fn serialize_1_1(desc: &RootSignatureDesc1) -> Result<Vec<u8>, RhiError> {
    let ranges: Vec<Vec<D3D12_DESCRIPTOR_RANGE1>> =
        desc.parameters.iter().map(|p| table_ranges(p, range_1_1)).collect();
    let parameters: Vec<D3D12_ROOT_PARAMETER1> =
        desc.parameters.iter().zip(&ranges).map(|(p, r)| parameter_1_1(p, r)).collect();
    let samplers: Vec<D3D12_STATIC_SAMPLER_DESC> = desc.static_samplers.iter().map(static_sampler).collect();

    serialize(&D3D12_VERSIONED_ROOT_SIGNATURE_DESC {
        Version: D3D_ROOT_SIGNATURE_VERSION_1_1,
        Anonymous: D3D12_VERSIONED_ROOT_SIGNATURE_DESC_0 {
            Desc_1_1: D3D12_ROOT_SIGNATURE_DESC1 {
                NumParameters: parameters.len() as u32,
                pParameters: slice_ptr(&parameters),
                NumStaticSamplers: samplers.len() as u32,
                pStaticSamplers: slice_ptr(&samplers),
                Flags: D3D12_ROOT_SIGNATURE_FLAGS(desc.flags.bits() as i32),
            },
        },
    })
}

/// A non-owning `ID3D12Resource` reference: no AddRef, and no Release when the barrier drops.
fn borrowed_resource(handle: NativeHandle) -> ManuallyDrop<Option<ID3D12Resource>> {
    let raw = handle.0 as usize as *mut c_void;
    // SAFETY: `Option<ID3D12Resource>` is a nullable COM pointer, and `ManuallyDrop` keeps the
    // caller's reference count untouched.
    unsafe { std::mem::transmute_copy(&raw) }
}

fn resource_barrier(barrier: &D3d12ResourceBarrier) -> D3D12_RESOURCE_BARRIER {
    match *barrier {
        D3d12ResourceBarrier::Transition { resource, subresource, before, after } => D3D12_RESOURCE_BARRIER {
            Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
            Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
            Anonymous: D3D12_RESOURCE_BARRIER_0 {
                Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                    pResource: borrowed_resource(resource),
                    Subresource: subresource,
                    StateBefore: D3D12_RESOURCE_STATES(before.0 as i32),
                    StateAfter: D3D12_RESOURCE_STATES(after.0 as i32),
                }),
            },
        },
        D3d12ResourceBarrier::Aliasing { before, after } => D3D12_RESOURCE_BARRIER {
            Type: D3D12_RESOURCE_BARRIER_TYPE_ALIASING,
            Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
            Anonymous: D3D12_RESOURCE_BARRIER_0 {
                Aliasing: ManuallyDrop::new(D3D12_RESOURCE_ALIASING_BARRIER {
                    pResourceBefore: borrowed_resource(before),
                    pResourceAfter: borrowed_resource(after),
                }),
            },
        },
        D3d12ResourceBarrier::Uav { resource } => D3D12_RESOURCE_BARRIER {
            Type: D3D12_RESOURCE_BARRIER_TYPE_UAV,
            Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
            Anonymous: D3D12_RESOURCE_BARRIER_0 {
                UAV: ManuallyDrop::new(D3D12_RESOURCE_UAV_BARRIER {
                    pResource: borrowed_resource(resource),
                }),
            },
        },
    }
}

impl Dx12CommandSink for ID3D12GraphicsCommandList {
    fn resource_barrier(&mut self, barriers: &[D3d12ResourceBarrier]) -> Result<(), RhiError> {
        let native: SmallVec<[D3D12_RESOURCE_BARRIER; 16]> = barriers.iter().map(resource_barrier).collect();
        unsafe { self.ResourceBarrier(&native) };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{AddressMode, BorderColor, CompareOp, StaticSamplerDesc};
    use crate::dx12::barrier::{ALL_SUBRESOURCES, D3d12ResourceStates};
    use crate::dx12::root_signature::{
        d3d12_filter, D3d12BorderColor, D3d12ComparisonFunc, D3d12DescriptorRangeType, D3d12ShaderVisibility,
    };
    use crate::layout::{LayoutFlag, Volatility};

    #[test]
    fn resource_states_match_the_headers() {
        let pairs = [
            (D3d12ResourceStates::COMMON, D3D12_RESOURCE_STATE_COMMON),
            (D3d12ResourceStates::VERTEX_AND_CONSTANT_BUFFER, D3D12_RESOURCE_STATE_VERTEX_AND_CONSTANT_BUFFER),
            (D3d12ResourceStates::INDEX_BUFFER, D3D12_RESOURCE_STATE_INDEX_BUFFER),
            (D3d12ResourceStates::RENDER_TARGET, D3D12_RESOURCE_STATE_RENDER_TARGET),
            (D3d12ResourceStates::UNORDERED_ACCESS, D3D12_RESOURCE_STATE_UNORDERED_ACCESS),
            (D3d12ResourceStates::DEPTH_WRITE, D3D12_RESOURCE_STATE_DEPTH_WRITE),
            (D3d12ResourceStates::DEPTH_READ, D3D12_RESOURCE_STATE_DEPTH_READ),
            (D3d12ResourceStates::NON_PIXEL_SHADER_RESOURCE, D3D12_RESOURCE_STATE_NON_PIXEL_SHADER_RESOURCE),
            (D3d12ResourceStates::PIXEL_SHADER_RESOURCE, D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE),
            (D3d12ResourceStates::INDIRECT_ARGUMENT, D3D12_RESOURCE_STATE_INDIRECT_ARGUMENT),
            (D3d12ResourceStates::COPY_DEST, D3D12_RESOURCE_STATE_COPY_DEST),
            (D3d12ResourceStates::COPY_SOURCE, D3D12_RESOURCE_STATE_COPY_SOURCE),
            (D3d12ResourceStates::RESOLVE_DEST, D3D12_RESOURCE_STATE_RESOLVE_DEST),
            (D3d12ResourceStates::RESOLVE_SOURCE, D3D12_RESOURCE_STATE_RESOLVE_SOURCE),
            (
                D3d12ResourceStates::RAYTRACING_ACCELERATION_STRUCTURE,
                D3D12_RESOURCE_STATE_RAYTRACING_ACCELERATION_STRUCTURE,
            ),
            (D3d12ResourceStates::SHADING_RATE_SOURCE, D3D12_RESOURCE_STATE_SHADING_RATE_SOURCE),
            (D3d12ResourceStates::GENERIC_READ, D3D12_RESOURCE_STATE_GENERIC_READ),
            (D3d12ResourceStates::PRESENT, D3D12_RESOURCE_STATE_PRESENT),
            (D3d12ResourceStates::PREDICATION, D3D12_RESOURCE_STATE_PREDICATION),
        ];
        for (ours, native) in pairs {
            assert_eq!(ours.0 as i32, native.0, "{ours:?}");
        }
        assert_eq!(ALL_SUBRESOURCES, D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES);
    }

    #[test]
    fn sampler_values_match_the_headers() {
        assert_eq!(d3d12_filter::MIN_MAG_MIP_POINT as i32, D3D12_FILTER_MIN_MAG_MIP_POINT.0);
        assert_eq!(d3d12_filter::MIN_MAG_MIP_LINEAR as i32, D3D12_FILTER_MIN_MAG_MIP_LINEAR.0);
        assert_eq!(d3d12_filter::ANISOTROPIC as i32, D3D12_FILTER_ANISOTROPIC.0);
        assert_eq!(
            (d3d12_filter::MIN_MAG_MIP_LINEAR | d3d12_filter::REDUCTION_COMPARISON) as i32,
            D3D12_FILTER_COMPARISON_MIN_MAG_MIP_LINEAR.0
        );

        let shadow = StaticSamplerDesc {
            comparison: Some(CompareOp::GreaterEqual),
            border_color: BorderColor::OpaqueWhite,
            address_u: AddressMode::MirrorOnce,
            ..StaticSamplerDesc::linear_wrap(0)
        };
        let native = static_sampler(&D3d12StaticSampler::new(&shadow, D3d12ShaderVisibility::Pixel));
        assert_eq!(native.Filter, D3D12_FILTER_COMPARISON_MIN_MAG_MIP_LINEAR);
        assert_eq!(native.AddressU, D3D12_TEXTURE_ADDRESS_MODE_MIRROR_ONCE);
        assert_eq!(native.AddressV, D3D12_TEXTURE_ADDRESS_MODE_WRAP);
        assert_eq!(native.ComparisonFunc, D3D12_COMPARISON_FUNC_GREATER_EQUAL);
        assert_eq!(native.BorderColor, D3D12_STATIC_BORDER_COLOR_OPAQUE_WHITE);
        assert_eq!(native.ShaderVisibility, D3D12_SHADER_VISIBILITY_PIXEL);

        assert_eq!(D3d12ComparisonFunc::Never as i32, D3D12_COMPARISON_FUNC_NEVER.0);
        assert_eq!(D3d12ComparisonFunc::Always as i32, D3D12_COMPARISON_FUNC_ALWAYS.0);
        assert_eq!(D3d12BorderColor::TransparentBlack as i32, D3D12_STATIC_BORDER_COLOR_TRANSPARENT_BLACK.0);
    }

    #[test]
    fn layout_enums_match_the_headers() {
        assert_eq!(D3d12DescriptorRangeType::Srv as i32, D3D12_DESCRIPTOR_RANGE_TYPE_SRV.0);
        assert_eq!(D3d12DescriptorRangeType::Uav as i32, D3D12_DESCRIPTOR_RANGE_TYPE_UAV.0);
        assert_eq!(D3d12DescriptorRangeType::Cbv as i32, D3D12_DESCRIPTOR_RANGE_TYPE_CBV.0);
        assert_eq!(D3d12DescriptorRangeType::Sampler as i32, D3D12_DESCRIPTOR_RANGE_TYPE_SAMPLER.0);
        assert_eq!(D3d12ShaderVisibility::All as i32, D3D12_SHADER_VISIBILITY_ALL.0);
        assert_eq!(D3d12ShaderVisibility::Mesh as i32, D3D12_SHADER_VISIBILITY_MESH.0);

        assert_eq!(
            Volatility::DescriptorsVolatile as i32,
            D3D12_DESCRIPTOR_RANGE_FLAG_DESCRIPTORS_VOLATILE.0
        );
        assert_eq!(Volatility::DataVolatile as i32, D3D12_DESCRIPTOR_RANGE_FLAG_DATA_VOLATILE.0);
        assert_eq!(
            Volatility::DataStaticWhileSetAtExecute as i32,
            D3D12_ROOT_DESCRIPTOR_FLAG_DATA_STATIC_WHILE_SET_AT_EXECUTE.0
        );
        assert_eq!(
            LayoutFlag::AllowInputAssemblerInputLayout as i32,
            D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT.0
        );
        assert_eq!(LayoutFlag::LocalRootSignature as i32, D3D12_ROOT_SIGNATURE_FLAG_LOCAL_ROOT_SIGNATURE.0);
        assert_eq!(
            LayoutFlag::DenyMeshShaderRootAccess as i32,
            D3D12_ROOT_SIGNATURE_FLAG_DENY_MESH_SHADER_ROOT_ACCESS.0
        );
        assert_eq!(
            LayoutFlag::SamplerHeapDirectlyIndexed as i32,
            D3D12_ROOT_SIGNATURE_FLAG_SAMPLER_HEAP_DIRECTLY_INDEXED.0
        );
    }

    #[test]
    fn transition_lowers_to_a_borrowed_native_barrier() {
        let barrier = resource_barrier(&D3d12ResourceBarrier::Transition {
            resource: NativeHandle(0),
            subresource: 3,
            before: D3d12ResourceStates::RENDER_TARGET,
            after: D3d12ResourceStates::PIXEL_SHADER_RESOURCE,
        });
        assert_eq!(barrier.Type, D3D12_RESOURCE_BARRIER_TYPE_TRANSITION);
        // SAFETY: the union was written through its `Transition` arm above.
        let transition = unsafe { &barrier.Anonymous.Transition };
        assert!(transition.pResource.is_none());
        assert_eq!(transition.Subresource, 3);
        assert_eq!(transition.StateBefore, D3D12_RESOURCE_STATE_RENDER_TARGET);
        assert_eq!(transition.StateAfter, D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE);
    }
}

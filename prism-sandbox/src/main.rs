mod headless;

use std::sync::Arc;
use clap::{Parser, ValueEnum};
use prism_core::cli::EngineArgs;
use prism_core::log;
use prism_rhi::dx12::{Dx12CommandList, Dx12Device};
use prism_rhi::vk::{self, Handle};
use prism_rhi::vulkan::{CommandEncoder, VulkanDevice};
use prism_rhi::{
    BarrierBatcher, BindingLayoutDesc, BindingSlot, Constants32Block, DeviceCapabilities, GpuResource, GraphicsBackend,
    LayoutKind, NativeHandle, RenderDevice, ResourceBindingTier, ResourceLayoutBuilder, ResourceShape, ResourceState,
    RhiConfig, RootSignatureVersion, ShaderStage, ShaderVisibility, StaticSamplerDesc, Subresource, TextureInfo,
};
use headless::{HeadlessCommandList, HeadlessDriver};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    Dx12,
    Vulkan,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Tier {
    #[value(name = "1")]
    Tier1,
    #[value(name = "2")]
    Tier2,
    #[value(name = "3")]
    Tier3,
}

impl From<Tier> for ResourceBindingTier {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Tier1 => ResourceBindingTier::Tier1,
            Tier::Tier2 => ResourceBindingTier::Tier2,
            Tier::Tier3 => ResourceBindingTier::Tier3,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RootSignature {
    #[value(name = "1.0")]
    V1_0,
    #[value(name = "1.1")]
    V1_1,
}

/// Build a few binding layouts and record a frame's worth of barriers on a headless device.
#[derive(Parser, Debug)]
#[command(name = "prism-sandbox", version)]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[arg(long, value_enum, default_value_t = Backend::Vulkan)]
    backend: Backend,

    /// Resource binding tier the headless device reports
    #[arg(long, value_enum, default_value_t = Tier::Tier3)]
    tier: Tier,

    /// Highest root signature version the headless device supports (DirectX12 only)
    #[arg(long = "root-signature-version", value_enum, default_value_t = RootSignature::V1_1)]
    root_signature_version: RootSignature,
}

fn create_device(cli: &Cli) -> RenderDevice {
    let driver = Arc::new(HeadlessDriver::default());
    let backend = match cli.backend {
        Backend::Dx12 => GraphicsBackend::Dx12(Dx12Device::new(driver)),
        Backend::Vulkan => GraphicsBackend::Vulkan(VulkanDevice::new(driver)),
    };
    let capabilities = DeviceCapabilities {
        binding_tier: cli.tier.into(),
        max_root_signature_version: match cli.root_signature_version {
            RootSignature::V1_0 => RootSignatureVersion::V1_0,
            RootSignature::V1_1 => RootSignatureVersion::V1_1,
        },
        ray_tracing: true,
        gpu_mask: 1,
    };
    RenderDevice::new("headless", backend, capabilities, RhiConfig::default())
}

fn demo_layouts() -> Vec<BindingLayoutDesc> {
    vec![
        BindingLayoutDesc::graphics("forward")
            .with_slot(BindingSlot::cbv(0, 0, ShaderStage::Vertex))
            .with_slot(BindingSlot::cbv(1, 0, ShaderStage::Pixel).as_root_descriptor())
            .with_slot(BindingSlot::srv(0, 1, ShaderStage::Pixel).with_count(8))
            .with_static_sampler(StaticSamplerDesc {
                visibility: ShaderStage::Pixel.into(),
                ..StaticSamplerDesc::linear_wrap(0)
            })
            .with_input_layout(),
        BindingLayoutDesc::compute("cull")
            .with_slot(BindingSlot::srv(0, 0, ShaderVisibility::all()).with_shape(ResourceShape::Buffer))
            .with_slot(BindingSlot::uav(0, 0, ShaderVisibility::all()).with_shape(ResourceShape::Buffer))
            .with_constants(Constants32Block::new(4, 0, 0, ShaderVisibility::all())),
        BindingLayoutDesc::new("hit_group", LayoutKind::RayTracingLocal)
            .with_slot(BindingSlot::srv(0, 2, ShaderVisibility::all())),
        BindingLayoutDesc::graphics("bindless").with_heap_indexing(true, true),
    ]
}

fn build_layouts(device: &RenderDevice) -> anyhow::Result<()> {
    profiling::scope!("build_layouts");

    for desc in demo_layouts() {
        let layout = ResourceLayoutBuilder::build(&desc, device)?;
        log::info!(
            "{}: {} element(s), constants at {}, cbv {} srv {} uav {} static sampler {} flags {:?}",
            layout.name(),
            layout.elements_count(),
            layout.constant_32bits_count(),
            layout.has_cbv(),
            layout.has_srv(),
            layout.has_uav(),
            layout.has_static_sampler(),
            layout.flags()
        );
    }
    Ok(())
}

fn record_frame(device: &RenderDevice) -> anyhow::Result<()> {
    profiling::scope!("record_frame");

    let gbuffer = GpuResource::new_texture("gbuffer.albedo", NativeHandle(0x10), TextureInfo::color(1, 1), ResourceState::ShaderResource);
    let depth = GpuResource::new_texture("depth", NativeHandle(0x20), TextureInfo::depth_stencil(), ResourceState::DepthRead);
    let bloom = GpuResource::new_texture("bloom", NativeHandle(0x30), TextureInfo::color(5, 1), ResourceState::ShaderResource);
    let particles = GpuResource::new_buffer("particles", NativeHandle(0x40), 1 << 20, ResourceState::UnorderedAccess);

    let mut batcher = BarrierBatcher::new();
    batcher.request_transition(&gbuffer, ResourceState::RenderTarget);
    batcher.request_transition(&depth, ResourceState::DepthWrite);
    // Cancelled by the next request, so it never reaches the command list.
    batcher.request_subresource_transition(&bloom, ResourceState::RenderTarget, Subresource::Index(0));
    batcher.request_subresource_transition(&bloom, ResourceState::ShaderResource, Subresource::Index(0));
    batcher.request_uav(&particles);
    log::info!("{} barrier(s) pending", batcher.count());

    match device.backend() {
        GraphicsBackend::Dx12(_) => {
            let mut sink = HeadlessCommandList::default();
            batcher.flush(&mut Dx12CommandList::new(&mut sink))?;
            log::info!("{} native barrier(s) recorded", sink.recorded);
        }
        GraphicsBackend::Vulkan(vulkan) => {
            let mut encoder = CommandEncoder::new("cmd.frame", vulkan, vk::CommandBuffer::from_raw(0xC0));
            batcher.flush(&mut encoder)?;
        }
    }

    log::info!(
        "after flush: {} is {}, {} is {}",
        gbuffer.name(),
        gbuffer.current_state(),
        depth.name(),
        depth.current_state()
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    prism_core::log::initialize(cli.engine.log_level.into())?;
    let _puffin_server = if cli.engine.profile {
        Some(prism_core::profile::initialize(prism_core::profile::DEFAULT_SERVER_ADDR)?)
    } else {
        None
    };

    let device = create_device(&cli);
    build_layouts(&device)?;
    record_frame(&device)?;

    profiling::finish_frame!();
    Ok(())
}

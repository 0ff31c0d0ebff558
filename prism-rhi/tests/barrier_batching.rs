use std::sync::Arc;
use prism_rhi::{
    BarrierBatcher, BarrierRecorder, GpuResource, NativeHandle, PendingBarrier, ResourceState, RhiError, Subresource,
    TextureInfo,
};

/// Captures the resource names of every recorded batch.
#[derive(Default)]
struct CommandListLog {
    batches: Vec<Vec<String>>,
}

impl BarrierRecorder for CommandListLog {
    fn record_barriers(&mut self, barriers: &[PendingBarrier]) -> Result<(), RhiError> {
        self.batches.push(barriers.iter().map(|b| b.resource().name().to_owned()).collect());
        Ok(())
    }
}

fn buffer(name: &str, state: ResourceState) -> Arc<GpuResource> {
    GpuResource::new_buffer(name, NativeHandle(0xB000), 65536, state)
}

fn texture(name: &str, state: ResourceState) -> Arc<GpuResource> {
    GpuResource::new_texture(name, NativeHandle(0x7000), TextureInfo::color(1, 1), state)
}

#[test]
fn buffer_upload_transition() {
    let b = buffer("staging", ResourceState::GenericRead);
    let mut batcher = BarrierBatcher::new();

    batcher.request_transition(&b, ResourceState::CopyDestination);
    assert_eq!(batcher.count(), 1);
    assert_eq!(b.current_state(), ResourceState::GenericRead);

    let mut list = CommandListLog::default();
    batcher.flush(&mut list).unwrap();
    assert_eq!(b.current_state(), ResourceState::CopyDestination);
    assert_eq!(batcher.count(), 0);
    assert_eq!(list.batches, vec![vec!["staging".to_owned()]]);
}

#[test]
fn exact_undo_cancels_for_every_state_pair() {
    let mut list = CommandListLog::default();
    for s1 in ResourceState::ALL {
        for s2 in ResourceState::ALL {
            if s1 == s2 {
                continue;
            }
            let r = texture("pair", s1);
            let mut batcher = BarrierBatcher::new();
            batcher.request_transition(&r, s2);
            batcher.request_transition(&r, s1);
            assert_eq!(batcher.count(), 0, "{s1} -> {s2} -> {s1} should cancel");

            batcher.flush(&mut list).unwrap();
            assert_eq!(r.current_state(), s1);
        }
    }
    assert!(list.batches.is_empty());
}

#[test]
fn texture_round_trip_leaves_state_untouched() {
    let t = texture("gbuffer.normal", ResourceState::ShaderResource);
    let mut batcher = BarrierBatcher::new();

    batcher.request_transition(&t, ResourceState::RenderTarget);
    batcher.request_transition(&t, ResourceState::ShaderResource);
    assert_eq!(batcher.count(), 0);

    let mut list = CommandListLog::default();
    batcher.flush(&mut list).unwrap();
    assert_eq!(t.current_state(), ResourceState::ShaderResource);
    assert!(list.batches.is_empty());
}

#[test]
fn requests_are_submitted_in_order() {
    let resources = [
        buffer("vertices", ResourceState::CopyDestination),
        texture("shadow_map", ResourceState::DepthWrite),
        buffer("indirect", ResourceState::UnorderedAccess),
    ];
    let targets = [
        ResourceState::VertexOrConstantBuffer,
        ResourceState::PixelShaderResource,
        ResourceState::IndirectArgument,
    ];

    let mut batcher = BarrierBatcher::with_capacity(3);
    for (resource, target) in resources.iter().zip(targets) {
        assert!(batcher.request_transition(resource, target));
    }

    let mut list = CommandListLog::default();
    batcher.flush(&mut list).unwrap();
    assert_eq!(list.batches, vec![vec!["vertices".to_owned(), "shadow_map".to_owned(), "indirect".to_owned()]]);
    for (resource, target) in resources.iter().zip(targets) {
        assert_eq!(resource.current_state(), target);
    }
}

#[test]
fn resources_are_shared_across_threads() {
    let shared = buffer("shared", ResourceState::Common);
    let worker = {
        let shared = Arc::clone(&shared);
        std::thread::spawn(move || {
            let mut batcher = BarrierBatcher::new();
            batcher.request_transition(&shared, ResourceState::CopySource);
            batcher.flush(&mut CommandListLog::default()).unwrap();
        })
    };
    worker.join().unwrap();
    assert_eq!(shared.current_state(), ResourceState::CopySource);
}

#[test]
fn mip_chain_generation_tracks_each_level() {
    let chain = GpuResource::new_texture("bloom_chain", NativeHandle(0x7100), TextureInfo::color(4, 1), ResourceState::RenderTarget);
    let mut batcher = BarrierBatcher::new();
    let mut list = CommandListLog::default();

    for mip in 1..4 {
        assert!(batcher.request_subresource_transition(&chain, ResourceState::ShaderResource, Subresource::Index(mip - 1)));
        batcher.flush(&mut list).unwrap();
        assert_eq!(chain.subresource_state(mip - 1), ResourceState::ShaderResource);
        assert_eq!(chain.subresource_state(mip), ResourceState::RenderTarget);
    }
    assert_eq!(chain.uniform_state(), None);

    // Only the last mip still needs to move.
    assert!(batcher.request_transition(&chain, ResourceState::ShaderResource));
    assert_eq!(batcher.count(), 1);
    batcher.flush(&mut list).unwrap();

    assert_eq!(list.batches.len(), 4);
    assert_eq!(chain.uniform_state(), Some(ResourceState::ShaderResource));
}

//! GPU resources as seen by the barrier layer.

use parking_lot::Mutex;
use std::sync::Arc;
use prism_core::collections::{smallvec, SmallVec};
use crate::state::{ResourceState, Subresource};

/// Per-subresource states of one resource, in flat subresource order.
pub type SubresourceStates = SmallVec<[ResourceState; 16]>;

/// Raw value of the backend object (`ID3D12Resource*`, `VkBuffer` or `VkImage`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureAspect {
    Color,
    Depth,
    Stencil,
    DepthStencil,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureInfo {
    pub aspect: TextureAspect,
    pub mip_levels: u32,
    pub array_layers: u32,
}

impl TextureInfo {
    pub fn color(mip_levels: u32, array_layers: u32) -> Self {
        Self {
            aspect: TextureAspect::Color,
            mip_levels,
            array_layers,
        }
    }

    pub fn depth_stencil() -> Self {
        Self {
            aspect: TextureAspect::DepthStencil,
            mip_levels: 1,
            array_layers: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer { size: u64 },
    Texture(TextureInfo),
}

/// Tracked state: one state for the whole resource until a single subresource is moved.
#[derive(Debug)]
struct TrackedState {
    uniform: ResourceState,
    /// Set once subresources diverge; dropped again when they agree.
    subresources: Option<SubresourceStates>,
}

impl TrackedState {
    fn set(&mut self, subresource: Subresource, state: ResourceState, count: u32) {
        match subresource {
            Subresource::All => {
                self.uniform = state;
                self.subresources = None;
            }
            Subresource::Index(index) => {
                let uniform = self.uniform;
                let states = self
                    .subresources
                    .get_or_insert_with(|| smallvec![uniform; count as usize]);
                if let Some(slot) = states.get_mut(index as usize) {
                    *slot = state;
                }
                if states.iter().all(|s| *s == state) {
                    self.uniform = state;
                    self.subresources = None;
                }
            }
        }
    }
}

/// A buffer or texture owned by the graphics device, with its tracked state.
///
/// Shared through `Arc`; two barriers refer to the same resource iff their `Arc`s are
/// pointer-equal. The state is written only when a [`crate::BarrierBatcher`] flushes.
#[derive(Debug)]
pub struct GpuResource {
    name: String,
    handle: NativeHandle,
    kind: ResourceKind,
    state: Mutex<TrackedState>,
}

impl GpuResource {
    pub fn new(name: &str, handle: NativeHandle, kind: ResourceKind, initial_state: ResourceState) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            handle,
            kind,
            state: Mutex::new(TrackedState {
                uniform: initial_state,
                subresources: None,
            }),
        })
    }

    pub fn new_buffer(name: &str, handle: NativeHandle, size: u64, initial_state: ResourceState) -> Arc<Self> {
        Self::new(name, handle, ResourceKind::Buffer { size }, initial_state)
    }

    pub fn new_texture(name: &str, handle: NativeHandle, info: TextureInfo, initial_state: ResourceState) -> Arc<Self> {
        Self::new(name, handle, ResourceKind::Texture(info), initial_state)
    }

    #[inline]
    pub fn name(&self) -> &str { &self.name }

    #[inline]
    pub fn handle(&self) -> NativeHandle { self.handle }

    #[inline]
    pub fn kind(&self) -> ResourceKind { self.kind }

    #[inline]
    pub fn is_texture(&self) -> bool {
        matches!(self.kind, ResourceKind::Texture(_))
    }

    pub fn texture_info(&self) -> Option<TextureInfo> {
        match self.kind {
            ResourceKind::Texture(info) => Some(info),
            ResourceKind::Buffer { .. } => None,
        }
    }

    /// Number of addressable subresources. Buffers have exactly one.
    pub fn subresource_count(&self) -> u32 {
        match self.kind {
            ResourceKind::Buffer { .. } => 1,
            ResourceKind::Texture(info) => info.mip_levels.max(1) * info.array_layers.max(1),
        }
    }

    pub fn contains_subresource(&self, subresource: Subresource) -> bool {
        match subresource {
            Subresource::All => true,
            Subresource::Index(index) => index < self.subresource_count(),
        }
    }

    /// Whole-resource state after every flushed barrier that touched this resource.
    ///
    /// Once subresources are in different states this is the state of subresource 0; use
    /// [`GpuResource::subresource_state`] or [`GpuResource::uniform_state`] instead.
    #[inline]
    pub fn current_state(&self) -> ResourceState {
        let state = self.state.lock();
        match &state.subresources {
            Some(states) => states.first().copied().unwrap_or(state.uniform),
            None => state.uniform,
        }
    }

    /// The whole-resource state, or `None` while subresources disagree.
    pub fn uniform_state(&self) -> Option<ResourceState> {
        let state = self.state.lock();
        match state.subresources {
            Some(_) => None,
            None => Some(state.uniform),
        }
    }

    /// Committed state of one subresource. Out-of-range indices report the whole-resource state.
    pub fn subresource_state(&self, index: u32) -> ResourceState {
        let state = self.state.lock();
        state
            .subresources
            .as_ref()
            .and_then(|states| states.get(index as usize).copied())
            .unwrap_or(state.uniform)
    }

    /// Committed state of every subresource.
    pub fn subresource_states(&self) -> SubresourceStates {
        let state = self.state.lock();
        match &state.subresources {
            Some(states) => states.clone(),
            None => smallvec![state.uniform; self.subresource_count() as usize],
        }
    }

    pub(crate) fn set_state(&self, subresource: Subresource, state: ResourceState) {
        self.state.lock().set(subresource, state, self.subresource_count());
    }
}

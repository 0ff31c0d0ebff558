//! Barrier batching: collect state transitions, drop the ones that cancel out, and flush the
//! rest to a command list in one call.

use std::sync::Arc;
use prism_core::log;
use crate::error::RhiError;
use crate::resource::{GpuResource, SubresourceStates};
use crate::state::{ResourceState, Subresource};

/// One barrier waiting in a [`BarrierBatcher`].
#[derive(Clone, Debug)]
pub enum PendingBarrier {
    Transition {
        resource: Arc<GpuResource>,
        before: ResourceState,
        after: ResourceState,
        subresource: Subresource,
    },
    /// `after` starts using memory previously used by `before`.
    Aliasing {
        before: Arc<GpuResource>,
        after: Arc<GpuResource>,
    },
    /// Orders unordered-access reads and writes on the same resource.
    Uav {
        resource: Arc<GpuResource>,
    },
}

impl PendingBarrier {
    /// The resource whose state or memory this barrier is about.
    pub fn resource(&self) -> &Arc<GpuResource> {
        match self {
            PendingBarrier::Transition { resource, .. } => resource,
            PendingBarrier::Aliasing { after, .. } => after,
            PendingBarrier::Uav { resource } => resource,
        }
    }

    pub fn is_transition(&self) -> bool {
        matches!(self, PendingBarrier::Transition { .. })
    }
}

/// The command-list side of a flush.
///
/// Implementations translate the whole batch into the backend's barrier structures and record
/// them with a single native call, in the order given.
pub trait BarrierRecorder {
    fn record_barriers(&mut self, barriers: &[PendingBarrier]) -> Result<(), RhiError>;
}

/// Accumulates barriers for one command list.
///
/// Not synchronized: a resource's state must only be advanced by one recording thread at a
/// time. Requests are flushed in call order.
#[derive(Debug, Default)]
pub struct BarrierBatcher {
    pending: Vec<PendingBarrier>,
}

impl BarrierBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: Vec::with_capacity(capacity),
        }
    }

    /// Request a whole-resource transition to `after`.
    ///
    /// Returns `false` when no barrier was added, because the request exactly undid the last
    /// pending barrier and both were dropped.
    pub fn request_transition(&mut self, resource: &Arc<GpuResource>, after: ResourceState) -> bool {
        self.request_subresource_transition(resource, after, Subresource::All)
    }

    /// Request a transition of one subresource, or of the whole resource.
    ///
    /// A whole-resource request on a resource whose subresources are in different states is
    /// split into one barrier per subresource that is not already in `after`.
    pub fn request_subresource_transition(
        &mut self,
        resource: &Arc<GpuResource>,
        after: ResourceState,
        subresource: Subresource,
    ) -> bool {
        rhi_assert!(
            resource.contains_subresource(subresource),
            "subresource {:?} is out of range for '{}'",
            subresource,
            resource.name()
        );

        let states = self.projected_states(resource);
        let before = match subresource {
            Subresource::Index(index) => match states.get(index as usize) {
                Some(state) => *state,
                None => return false,
            },
            Subresource::All => match uniform(&states) {
                Some(state) => state,
                None => {
                    let mut added = false;
                    for (index, before) in states.iter().enumerate() {
                        if *before != after {
                            added |= self.push_transition(resource, *before, after, Subresource::Index(index as u32));
                        }
                    }
                    return added;
                }
            },
        };

        rhi_assert!(
            before != after,
            "redundant transition of '{}' to {} (tracked state drifted?)",
            resource.name(),
            after
        );
        if before == after {
            return false;
        }
        self.push_transition(resource, before, after, subresource)
    }

    fn push_transition(
        &mut self,
        resource: &Arc<GpuResource>,
        before: ResourceState,
        after: ResourceState,
        subresource: Subresource,
    ) -> bool {
        // Only the most recent barrier is checked; a cancelling pair separated by any other
        // barrier is kept so the recorded order never changes.
        if let Some(PendingBarrier::Transition {
            resource: last_resource,
            before: last_before,
            after: last_after,
            subresource: last_subresource,
        }) = self.pending.last()
        {
            if Arc::ptr_eq(last_resource, resource)
                && *last_subresource == subresource
                && *last_after == before
                && *last_before == after
            {
                self.pending.pop();
                return false;
            }
        }

        self.pending.push(PendingBarrier::Transition {
            resource: resource.clone(),
            before,
            after,
            subresource,
        });
        true
    }

    pub fn request_aliasing(&mut self, before: &Arc<GpuResource>, after: &Arc<GpuResource>) {
        self.pending.push(PendingBarrier::Aliasing {
            before: before.clone(),
            after: after.clone(),
        });
    }

    pub fn request_uav(&mut self, resource: &Arc<GpuResource>) {
        if let Some(state) = self.projected_state(resource, Subresource::All) {
            if !state.is_writable() {
                log::warn!("UAV barrier on '{}' while it is in read-only state {}", resource.name(), state);
            }
        }
        self.pending.push(PendingBarrier::Uav {
            resource: resource.clone(),
        });
    }

    /// Record every pending barrier with one call and commit the new states.
    ///
    /// An empty batch is a no-op and never reaches the recorder. If recording fails nothing is
    /// committed and the batch is kept, so the caller can discard the command list or `clear`.
    #[profiling::function]
    pub fn flush<R: BarrierRecorder + ?Sized>(&mut self, recorder: &mut R) -> Result<(), RhiError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        recorder.record_barriers(&self.pending)?;

        for barrier in &self.pending {
            if let PendingBarrier::Transition { resource, after, subresource, .. } = barrier {
                resource.set_state(*subresource, *after);
            }
        }

        log::trace!(
            "flushed {} barrier(s), {} transition(s)",
            self.pending.len(),
            self.pending.iter().filter(|barrier| barrier.is_transition()).count()
        );
        self.pending.clear();
        Ok(())
    }

    /// Drop all pending barriers without recording them.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[inline]
    pub fn pending(&self) -> &[PendingBarrier] {
        &self.pending
    }

    /// The state `resource` will be in once this batch executes.
    ///
    /// `None` for [`Subresource::All`] while its subresources will be in different states, and
    /// for out-of-range indices.
    pub fn projected_state(&self, resource: &Arc<GpuResource>, subresource: Subresource) -> Option<ResourceState> {
        let states = self.projected_states(resource);
        match subresource {
            Subresource::All => uniform(&states),
            Subresource::Index(index) => states.get(index as usize).copied(),
        }
    }

    /// Per-subresource states of `resource` once this batch executes.
    pub fn projected_states(&self, resource: &Arc<GpuResource>) -> SubresourceStates {
        project_states(resource, &self.pending)
    }
}

/// Committed states of `resource` with the transitions in `barriers` applied in order.
pub(crate) fn project_states(resource: &Arc<GpuResource>, barriers: &[PendingBarrier]) -> SubresourceStates {
    let mut states = resource.subresource_states();
    for barrier in barriers {
        if let PendingBarrier::Transition { resource: pending, after, subresource, .. } = barrier {
            if !Arc::ptr_eq(pending, resource) {
                continue;
            }
            match subresource {
                Subresource::All => states.iter_mut().for_each(|state| *state = *after),
                Subresource::Index(index) => {
                    if let Some(state) = states.get_mut(*index as usize) {
                        *state = *after;
                    }
                }
            }
        }
    }
    states
}

/// The state every subresource shares, if they do.
pub(crate) fn uniform(states: &[ResourceState]) -> Option<ResourceState> {
    let (first, rest) = states.split_first()?;
    rest.iter().all(|state| state == first).then_some(*first)
}

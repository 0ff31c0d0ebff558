//! Command buffer recording for barrier batches.

use ash::vk;
use prism_core::log;
use crate::barrier::{BarrierRecorder, PendingBarrier};
use crate::error::RhiError;
use super::{VulkanBarriers, VulkanDevice};

/// Command encoder wrapping a command buffer in the recording state.
pub struct CommandEncoder<'a> {
    name: String,
    device: &'a VulkanDevice,
    cmd: vk::CommandBuffer,
}

impl<'a> CommandEncoder<'a> {
    pub fn new(name: &str, device: &'a VulkanDevice, cmd: vk::CommandBuffer) -> Self {
        Self {
            name: name.to_owned(),
            device,
            cmd,
        }
    }

    #[inline]
    pub fn name(&self) -> &str { &self.name }

    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.cmd
    }

    /// Record `barriers` with a single `vkCmdPipelineBarrier2`.
    pub fn pipeline_barrier(&self, barriers: &VulkanBarriers) {
        if barriers.is_empty() {
            return;
        }
        let dependency = barriers.dependency_info();
        self.device.driver().cmd_pipeline_barrier2(self.cmd, &dependency);
    }
}

impl BarrierRecorder for CommandEncoder<'_> {
    fn record_barriers(&mut self, barriers: &[PendingBarrier]) -> Result<(), RhiError> {
        if self.cmd == vk::CommandBuffer::null() {
            return Err(RhiError::CommandRecording(format!("'{}' has no command buffer", self.name)));
        }
        let native = VulkanBarriers::from_pending(barriers);
        log::trace!("'{}': recording {} vulkan barrier(s)", self.name, native.len());
        self.pipeline_barrier(&native);
        Ok(())
    }
}

//! Error type shared by the barrier and layout layers.

use ash::vk;
use crate::dx12::HResult;

#[derive(Debug)]
pub enum RhiError {
    /// The backend refused to create a binding layout. Fatal for the pipeline being built.
    LayoutCreation { name: String, source: Box<RhiError> },
    /// A root signature could not be serialized.
    Serialization(String),
    Vulkan(vk::Result),
    Dx12(HResult),
    /// The command list rejected a barrier batch.
    CommandRecording(String),
    Unsupported(&'static str),
}

impl RhiError {
    pub(crate) fn layout_creation(name: &str, source: RhiError) -> Self {
        RhiError::LayoutCreation {
            name: name.to_owned(),
            source: Box::new(source),
        }
    }
}

impl From<vk::Result> for RhiError {
    fn from(e: vk::Result) -> Self {
        RhiError::Vulkan(e)
    }
}

impl From<HResult> for RhiError {
    fn from(e: HResult) -> Self {
        RhiError::Dx12(e)
    }
}

impl std::fmt::Display for RhiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RhiError::LayoutCreation { name, source } => {
                write!(f, "Failed to create resource layout '{}': {}", name, source)
            }
            RhiError::Serialization(msg) => write!(f, "Root signature serialization failed: {}", msg),
            RhiError::Vulkan(e) => write!(f, "Vulkan error: {:?}", e),
            RhiError::Dx12(hr) => write!(f, "DirectX12 error: {}", hr),
            RhiError::CommandRecording(msg) => write!(f, "Command recording failed: {}", msg),
            RhiError::Unsupported(what) => write!(f, "Unsupported: {}", what),
        }
    }
}

impl std::error::Error for RhiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RhiError::LayoutCreation { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn layout_creation_chains_source() {
        let err = RhiError::layout_creation("gbuffer", RhiError::Vulkan(vk::Result::ERROR_OUT_OF_HOST_MEMORY));
        assert!(err.to_string().contains("gbuffer"));
        let source = err.source().expect("layout errors carry their cause");
        assert!(source.to_string().contains("ERROR_OUT_OF_HOST_MEMORY"));
    }

    #[test]
    fn hresult_displays_as_hex() {
        let err = RhiError::from(HResult(0x887A0005u32 as i32));
        assert_eq!(err.to_string(), "DirectX12 error: HRESULT 0x887A0005");
    }
}

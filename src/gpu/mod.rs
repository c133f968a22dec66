//! Headless GPU context and the wgpu rendering backend
//!
//! `GpuContext` owns the device and queue; no window or surface is needed
//! because effect passes render into offscreen textures.

mod backend;

pub use backend::{padded_bytes_per_row, unpad_rows, WgpuBackend, FRAMEBUFFER_FORMAT};

use crate::effects::EffectError;

/// GPU setup and readback errors
#[derive(Debug)]
pub enum GpuError {
    /// No adapter matched the request
    NoAdapter,
    /// The adapter refused to create a device
    RequestDevice(wgpu::RequestDeviceError),
    /// Mapping a readback buffer failed
    BufferMap(wgpu::BufferAsyncError),
}

impl std::fmt::Display for GpuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuError::NoAdapter => write!(f, "No suitable GPU adapter found"),
            GpuError::RequestDevice(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::BufferMap(e) => write!(f, "Failed to map readback buffer: {}", e),
        }
    }
}

impl std::error::Error for GpuError {}

impl From<GpuError> for EffectError {
    fn from(err: GpuError) -> Self {
        EffectError::Backend(err.to_string())
    }
}

/// Device and queue for offscreen rendering
pub struct GpuContext {
    /// The wgpu instance
    pub instance: wgpu::Instance,
    /// The selected GPU adapter
    pub adapter: wgpu::Adapter,
    /// The GPU device for creating resources
    pub device: wgpu::Device,
    /// The command queue for submitting GPU work
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Create a context without a surface
    ///
    /// With `force_fallback_adapter` a software adapter is requested, which
    /// is what CI machines without a GPU usually provide.
    pub async fn new_headless(force_fallback_adapter: bool) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let info = adapter.get_info();
        log::info!("Using GPU: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Effect Compositor Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(GpuError::RequestDevice)?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    /// Blocking variant of `new_headless`
    pub fn new_blocking(force_fallback_adapter: bool) -> Result<Self, GpuError> {
        pollster::block_on(Self::new_headless(force_fallback_adapter))
    }

    /// Adapter name for logs
    pub fn adapter_name(&self) -> String {
        self.adapter.get_info().name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_error_into_effect_error() {
        let err: EffectError = GpuError::NoAdapter.into();
        assert_eq!(err, EffectError::Backend("No suitable GPU adapter found".to_string()));
    }
}

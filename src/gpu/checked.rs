//! Error scopes around resource creation.
//!
//! wgpu reports invalid shaders and failed allocations asynchronously,
//! through the device's uncaptured-error handler. Wrapping creation in an
//! error scope turns those reports into a `Result` the caller can log and
//! skip.

use crate::error::GpuError;

/// Run `build` inside a validation scope. Shader and pipeline creation.
pub(crate) fn validated<T>(
    device: &wgpu::Device,
    label: &str,
    build: impl FnOnce() -> T,
) -> Result<T, GpuError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(GpuError::PipelineBuild(format!("{}: {}", label, error))),
        None => Ok(value),
    }
}

/// Run `build` inside out-of-memory and validation scopes. Buffer and
/// texture creation, where an oversized request is a validation error and
/// an exhausted device is an out-of-memory error.
pub(crate) fn allocated<T>(
    device: &wgpu::Device,
    label: &str,
    build: impl FnOnce() -> T,
) -> Result<T, GpuError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let value = build();
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    let invalid = pollster::block_on(device.pop_error_scope());
    match out_of_memory.or(invalid) {
        Some(error) => Err(GpuError::Allocation(format!("{}: {}", label, error))),
        None => Ok(value),
    }
}

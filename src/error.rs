//! Error types for particle-flow.
//!
//! Setup failures (surface, adapter, device, settings file) are returned as
//! errors. Failures inside a running frame (kernel build, buffer allocation)
//! are logged by the GPU stages and the affected work is skipped, so those
//! variants mostly travel between the stages rather than up to the caller.

use std::fmt;

/// Errors raised while creating or using GPU resources.
#[derive(Debug)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    NoAdapter(wgpu::RequestAdapterError),
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// A buffer or texture could not be allocated.
    Allocation(String),
    /// A shader module or pipeline failed validation.
    PipelineBuild(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            GpuError::NoAdapter(e) => write!(f, "No compatible GPU adapter found: {}", e),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::Allocation(msg) => write!(f, "GPU allocation failed: {}", msg),
            GpuError::PipelineBuild(msg) => write!(f, "GPU pipeline build failed: {}", msg),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::NoAdapter(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestAdapterError> for GpuError {
    fn from(e: wgpu::RequestAdapterError) -> Self {
        GpuError::NoAdapter(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors raised while loading or watching the settings file.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the settings file.
    Io(std::io::Error),
    /// The settings file is not valid JSON for the recognized keys.
    Parse(serde_json::Error),
    /// Failed to start watching the settings file.
    Watch(notify::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read settings: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse settings: {}", e),
            ConfigError::Watch(e) => write!(f, "Failed to watch settings file: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Watch(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<notify::Error> for ConfigError {
    fn from(e: notify::Error) -> Self {
        ConfigError::Watch(e)
    }
}

/// Errors that can occur when running the particle flow.
#[derive(Debug)]
pub enum FlowError {
    /// Failed to create event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create window.
    Window(winit::error::OsError),
    /// GPU initialization failed.
    Gpu(GpuError),
    /// Settings could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            FlowError::Window(e) => write!(f, "Failed to create window: {}", e),
            FlowError::Gpu(e) => write!(f, "GPU error: {}", e),
            FlowError::Config(e) => write!(f, "Settings error: {}", e),
        }
    }
}

impl std::error::Error for FlowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlowError::EventLoop(e) => Some(e),
            FlowError::Window(e) => Some(e),
            FlowError::Gpu(e) => Some(e),
            FlowError::Config(e) => Some(e),
        }
    }
}

impl From<winit::error::EventLoopError> for FlowError {
    fn from(e: winit::error::EventLoopError) -> Self {
        FlowError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for FlowError {
    fn from(e: winit::error::OsError) -> Self {
        FlowError::Window(e)
    }
}

impl From<GpuError> for FlowError {
    fn from(e: GpuError) -> Self {
        FlowError::Gpu(e)
    }
}

impl From<ConfigError> for FlowError {
    fn from(e: ConfigError) -> Self {
        FlowError::Config(e)
    }
}

// gpu/device.rs — wgpu adapter selection and the GPU compute device.
//
// Responsibilities:
//   - Enumerate adapters on the primary backends and pick the best one that
//     meets a `MinCapability` threshold.
//   - Report the version triple and capability line for the chosen adapter.
//   - Implement `ComputeDevice` on top of gpu::image (staging) and
//     gpu::blur (the compute pipeline).
//
// ADAPTER SELECTION:
// Adapters are ranked by device type, real hardware first:
//
//   DiscreteGpu / IntegratedGpu   <- preferred
//   VirtualGpu / Other            <- acceptable (VM pass-through, dzn on WSL2)
//   Cpu                           <- last resort (llvmpipe, WARP)
//
// Within the ranking, the first adapter that passes `MinCapability::check`
// wins. An adapter that fails the check is logged with the reason and
// skipped. When nothing qualifies `GpuDevice::select` returns `Ok(None)`:
// the caller treats that as a clean no-op, not an error.
//
// ERROR SCOPES:
// wgpu reports validation and out-of-memory errors asynchronously through
// the device's uncaptured-error handler, which panics by default. Every
// operation that can hit a device error is wrapped in error scopes and the
// result is turned into a `DeviceError` or `FilterStatus` instead.

use std::fmt;

use crate::device::{ComputeDevice, DeviceError, DeviceInfo, DeviceKind};
use crate::filter::{FilterConfig, FilterStatus};
use crate::gpu::blur::GpuBlurPipeline;
use crate::gpu::image::GpuImage;
use crate::image::Image;

/// A workgroup size for 2D compute dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    /// 16×8 = 128 invocations: four 32-wide warps on NVIDIA, two 64-wide
    /// wavefronts on AMD, and well inside the downlevel limit of 256.
    pub const DEFAULT: WorkgroupSize = WorkgroupSize { x: 16, y: 8 };

    /// Total invocations per workgroup (x * y).
    pub fn total(&self) -> u32 {
        self.x * self.y
    }

    /// Number of workgroups covering a `width × height` grid (ceiling
    /// division; the shader guards the overhang).
    pub fn dispatch_size(&self, width: u32, height: u32) -> (u32, u32) {
        (width.div_ceil(self.x), height.div_ceil(self.y))
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{} ({} invocations)", self.x, self.y, self.total())
    }
}

// ============================================================
// Capability threshold
// ============================================================

/// Minimum adapter capability required to run the blur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinCapability {
    /// Largest storage buffer binding, in bytes. One device image of
    /// `pitch * height` words must fit in a single binding.
    pub max_storage_buffer_binding_size: u32,
    /// Workgroup invocation limit; must cover the dispatch workgroup.
    pub max_compute_invocations_per_workgroup: u32,
}

impl Default for MinCapability {
    /// 16 MiB bindings (a 2048×2048 image at one word per pixel) and the
    /// default workgroup.
    fn default() -> Self {
        MinCapability {
            max_storage_buffer_binding_size: 16 << 20,
            max_compute_invocations_per_workgroup: WorkgroupSize::DEFAULT.total(),
        }
    }
}

impl MinCapability {
    /// Check an adapter against the threshold, returning the reason it
    /// falls short.
    pub fn check(
        &self,
        downlevel: &wgpu::DownlevelCapabilities,
        limits: &wgpu::Limits,
    ) -> Result<(), String> {
        if !downlevel.flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
            return Err("no compute shader support".to_string());
        }
        if limits.max_storage_buffer_binding_size < self.max_storage_buffer_binding_size {
            return Err(format!(
                "storage binding limit {} < required {}",
                limits.max_storage_buffer_binding_size, self.max_storage_buffer_binding_size
            ));
        }
        if limits.max_compute_invocations_per_workgroup < self.max_compute_invocations_per_workgroup {
            return Err(format!(
                "workgroup invocation limit {} < required {}",
                limits.max_compute_invocations_per_workgroup,
                self.max_compute_invocations_per_workgroup
            ));
        }
        Ok(())
    }
}

/// Rank used to order adapters; lower is preferred.
fn device_type_rank(device_type: wgpu::DeviceType) -> u8 {
    match device_type {
        wgpu::DeviceType::DiscreteGpu | wgpu::DeviceType::IntegratedGpu => 0,
        wgpu::DeviceType::VirtualGpu | wgpu::DeviceType::Other => 1,
        wgpu::DeviceType::Cpu => 2,
    }
}

/// Limits requested from the adapter: downlevel defaults, raised to the
/// adapter's own buffer limits so large images fit.
fn requested_limits(adapter_limits: &wgpu::Limits) -> wgpu::Limits {
    wgpu::Limits {
        max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
        max_buffer_size: adapter_limits.max_buffer_size,
        ..wgpu::Limits::downlevel_defaults()
    }
}

// ============================================================
// GpuDevice
// ============================================================

/// The GPU compute device: wgpu device + queue, the compiled blur pipeline
/// and the information reported at startup.
///
/// # Field drop order
/// Fields drop top to bottom. `_instance` is last so the `wgpu::Instance`
/// outlives `device` and `queue`; some Vulkan layers (dzn on WSL2) crash
/// when the instance goes first.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub workgroup_size: WorkgroupSize,
    pub(crate) blur: GpuBlurPipeline,
    pub(crate) limits: wgpu::Limits,
    info: DeviceInfo,
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// Select the best adapter meeting `min` and open a device on it.
    ///
    /// Returns `Ok(None)` when no adapter qualifies.
    ///
    /// # Errors
    /// Returns `Err` if a qualifying adapter is found but the device
    /// request fails.
    pub fn select(min: &MinCapability) -> Result<Option<Self>, DeviceError> {
        pollster::block_on(Self::select_async(min))
    }

    async fn select_async(min: &MinCapability) -> Result<Option<Self>, DeviceError> {
        let flags = if cfg!(debug_assertions) {
            wgpu::InstanceFlags::VALIDATION
                | wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        } else {
            wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        };

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags,
            ..Default::default()
        });

        let mut adapters = instance.enumerate_adapters(wgpu::Backends::PRIMARY);
        if adapters.is_empty() {
            log::warn!("no wgpu adapters found on the primary backends");
            return Ok(None);
        }
        adapters.sort_by_key(|a| device_type_rank(a.get_info().device_type));

        let mut chosen = None;
        for adapter in adapters {
            let info = adapter.get_info();
            match min.check(&adapter.get_downlevel_capabilities(), &adapter.limits()) {
                Ok(()) => {
                    log::info!(
                        "adapter {} ({:?}, {:?}) qualifies",
                        info.name, info.backend, info.device_type
                    );
                    chosen = Some(adapter);
                    break;
                }
                Err(reason) => log::info!(
                    "adapter {} ({:?}, {:?}) rejected: {reason}",
                    info.name, info.backend, info.device_type
                ),
            }
        }
        let Some(adapter) = chosen else {
            return Ok(None);
        };

        let raw_info = adapter.get_info();
        let limits = requested_limits(&adapter.limits());

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("gauss-blur"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let workgroup_size = WorkgroupSize::DEFAULT;
        let blur = GpuBlurPipeline::new(&device, workgroup_size);

        let driver_version = match (raw_info.driver.trim(), raw_info.driver_info.trim()) {
            ("", "") => "unknown".to_string(),
            (d, "") | ("", d) => d.to_string(),
            (d, i) => format!("{d} {i}"),
        };
        let info = DeviceInfo {
            kind: DeviceKind::Gpu,
            name: raw_info.name.clone(),
            driver_version,
            runtime_version: format!("{:?}", raw_info.backend),
            capability: format!(
                "{:?}, storage binding {} MiB, workgroup {}",
                raw_info.device_type,
                limits.max_storage_buffer_binding_size >> 20,
                workgroup_size,
            ),
        };

        Ok(Some(GpuDevice {
            device,
            queue,
            workgroup_size,
            blur,
            limits,
            info,
            _instance: instance,
        }))
    }

    /// Run `f` inside validation and out-of-memory error scopes, returning
    /// the first captured error as a message.
    pub(crate) fn scoped<R>(&self, f: impl FnOnce() -> R) -> (R, Option<String>) {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let out = f();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        let err = validation.or(oom).map(|e| e.to_string());
        (out, err)
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GpuDevice {{ {} }}", self.info)
    }
}

impl ComputeDevice for GpuDevice {
    type Image = GpuImage;

    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn allocate(&self, width: usize, height: usize) -> Result<GpuImage, DeviceError> {
        GpuImage::allocate(self, width, height)
    }

    fn upload(&self, src: &Image<u8>) -> Result<GpuImage, DeviceError> {
        GpuImage::upload(self, src)
    }

    fn gauss_blur(&self, src: &GpuImage, dst: &mut GpuImage, config: &FilterConfig) -> FilterStatus {
        self.blur.run(self, src, dst, config)
    }

    fn download(&self, src: &GpuImage) -> Result<Image<u8>, DeviceError> {
        src.download(self)
    }
}

// ============================================================
// Tests
// ============================================================

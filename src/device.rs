// device.rs — The compute-device seam and the host reference device.
//
// The blur pipeline never touches device memory directly. It drives a
// `ComputeDevice` through four calls:
//
//   upload(host image)            → device image      (host → device copy)
//   allocate(width, height)       → device image      (destination buffer)
//   gauss_blur(src, &mut dst, …)  → FilterStatus      (the primitive)
//   download(device image)        → host image        (device → host copy)
//
// Device images are owned values; dropping one releases its memory, so a
// failure at any stage frees everything allocated before it.
//
// Two devices implement the seam:
//   - `HostDevice` (this file): "device" memory is a separate heap buffer
//     with its own aligned pitch, and the primitive is the CPU reference in
//     convolution.rs. Always available.
//   - `gpu::GpuDevice`: wgpu storage buffers and a WGSL compute kernel.

use std::fmt;

use crate::convert::{align_to, repitch};
use crate::convolution::filter_gauss_border;
use crate::filter::{FilterConfig, FilterStatus};
use crate::image::Image;

/// Library version reported in the version triple.
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Which device family to run the blur on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DeviceKind {
    /// First capable wgpu adapter.
    #[default]
    Gpu,
    /// CPU reference implementation.
    Host,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Gpu => write!(f, "gpu"),
            DeviceKind::Host => write!(f, "host"),
        }
    }
}

/// Identity and version information of a selected device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub kind: DeviceKind,
    pub name: String,
    pub driver_version: String,
    pub runtime_version: String,
    /// Human-readable summary of the limits the device was accepted on.
    pub capability: String,
}

impl DeviceInfo {
    /// The three-line version report printed before the run.
    pub fn version_report(&self) -> String {
        format!(
            "gauss-blur Library Version {LIBRARY_VERSION}\n  Driver  Version: {}\n  Runtime Version: {}",
            self.driver_version, self.runtime_version,
        )
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.name, self.kind, self.capability)
    }
}

/// Errors from device selection, allocation and host/device transfers.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("cannot allocate {width}×{height} device image: {reason}")]
    Allocation {
        width: usize,
        height: usize,
        reason: String,
    },

    #[error("device transfer failed: {0}")]
    Transfer(String),
}

impl DeviceError {
    pub(crate) fn allocation(width: usize, height: usize, reason: impl Into<String>) -> Self {
        DeviceError::Allocation { width, height, reason: reason.into() }
    }
}

/// Shape of an image resident on a device.
pub trait DeviceImage {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    /// Device row pitch in pixels; `pitch >= width`.
    fn pitch(&self) -> usize;

    fn dimensions(&self) -> (usize, usize) {
        (self.width(), self.height())
    }
}

/// A device able to hold 8-bit images and run the Gaussian blur primitive.
pub trait ComputeDevice {
    type Image: DeviceImage;

    fn info(&self) -> &DeviceInfo;

    /// Allocate a zero-filled device image.
    fn allocate(&self, width: usize, height: usize) -> Result<Self::Image, DeviceError>;

    /// Allocate a device image matching `src` and copy its pixels across.
    fn upload(&self, src: &Image<u8>) -> Result<Self::Image, DeviceError>;

    /// Run the blur. `dst` must already have `src`'s dimensions.
    fn gauss_blur(
        &self,
        src: &Self::Image,
        dst: &mut Self::Image,
        config: &FilterConfig,
    ) -> FilterStatus;

    /// Copy a device image back into a packed host image.
    fn download(&self, src: &Self::Image) -> Result<Image<u8>, DeviceError>;
}

// ---------------------------------------------------------------------------
// HostDevice
// ---------------------------------------------------------------------------

/// Host device pitch alignment in pixels, matching the GPU's 256-byte rows
/// for one-word pixels.
pub const HOST_PITCH_ALIGNMENT: usize = 64;

/// Upper bound on a host device image, in bytes.
const HOST_MAX_BYTES: u64 = 1 << 32;

/// An image in host-device memory: an `Image<u8>` with an aligned pitch.
#[derive(Debug, Clone)]
pub struct HostImage {
    image: Image<u8>,
}

impl HostImage {
    pub fn as_image(&self) -> &Image<u8> {
        &self.image
    }
}

impl DeviceImage for HostImage {
    fn width(&self) -> usize {
        self.image.width()
    }

    fn height(&self) -> usize {
        self.image.height()
    }

    fn pitch(&self) -> usize {
        self.image.stride()
    }
}

/// CPU reference device.
#[derive(Debug, Clone)]
pub struct HostDevice {
    info: DeviceInfo,
}

impl HostDevice {
    pub fn new() -> Self {
        HostDevice {
            info: DeviceInfo {
                kind: DeviceKind::Host,
                name: "host reference".to_string(),
                driver_version: "host".to_string(),
                runtime_version: "cpu reference".to_string(),
                capability: format!("pitch alignment {HOST_PITCH_ALIGNMENT} px"),
            },
        }
    }
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeDevice for HostDevice {
    type Image = HostImage;

    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn allocate(&self, width: usize, height: usize) -> Result<HostImage, DeviceError> {
        let pitch = host_pitch(width, height)?;
        let len = pitch * height;

        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|e| DeviceError::allocation(width, height, e.to_string()))?;
        data.resize(len, 0u8);

        log::debug!("host device: allocated {width}×{height}, pitch {pitch}");
        Ok(HostImage {
            image: Image::from_vec_with_stride(width, height, pitch, data),
        })
    }

    fn upload(&self, src: &Image<u8>) -> Result<HostImage, DeviceError> {
        let pitch = host_pitch(src.width(), src.height())?;
        Ok(HostImage { image: repitch(src, pitch) })
    }

    fn gauss_blur(
        &self,
        src: &HostImage,
        dst: &mut HostImage,
        config: &FilterConfig,
    ) -> FilterStatus {
        filter_gauss_border(&src.image, &mut dst.image, config)
    }

    fn download(&self, src: &HostImage) -> Result<Image<u8>, DeviceError> {
        Ok(repitch(&src.image, src.width()))
    }
}

/// Pitch of a host device image, after the size checks every allocation
/// goes through.
fn host_pitch(width: usize, height: usize) -> Result<usize, DeviceError> {
    if width == 0 || height == 0 {
        return Err(DeviceError::allocation(width, height, "zero-sized image"));
    }
    let pitch = align_to(width, HOST_PITCH_ALIGNMENT);
    if pitch as u64 * height as u64 > HOST_MAX_BYTES {
        return Err(DeviceError::allocation(width, height, "exceeds host device limit"));
    }
    Ok(pitch)
}

// gpu/mod.rs — wgpu compute device.
//
// The CPU reference in convolution.rs stays authoritative; the WGSL kernel
// here is validated against it byte for byte (see the ignored GPU tests).
//
//   device  adapter selection, capability check, `ComputeDevice` impl
//   image   word-per-pixel storage buffers and host↔device staging
//   blur    the `gauss_blur` compute pipeline

pub mod blur;
pub mod device;
pub mod image;

pub use device::{GpuDevice, MinCapability, WorkgroupSize};
pub use image::GpuImage;

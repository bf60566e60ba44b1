// gauss-blur: Gaussian blur of grayscale images on a compute device
//
// The blur runs behind a device seam (`device::ComputeDevice`): a wgpu
// compute device, or the CPU reference that the GPU kernel is validated
// against.

pub mod image;
pub mod convert;
pub mod filter;
pub mod convolution;
pub mod device;
pub mod gpu;
pub mod io;
pub mod pipeline;
pub mod cli;

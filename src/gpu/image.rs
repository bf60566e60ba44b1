// gpu/image.rs — Device-resident images and host↔device staging.
//
// LAYOUT
// ──────
// WGSL has no 8-bit storage type and `r8uint` is not a storage-texture
// format in core WebGPU, so a device image is a storage buffer holding one
// u32 word per pixel. Rows start on a 256-byte boundary:
//
//   pitch = align_to(width, 64) words       (64 words = 256 bytes)
//
//   row0: [p00 p01 ... p0w _pad_ ... ]  ← pitch words
//   row1: [p10 p11 ... p1w _pad_ ... ]
//
// Padding words are zero on upload and never read by the kernel.
//
// TRANSFERS
// ─────────
// upload:   Image<u8> ─widen_rows→ Image<u32> ─create_buffer_init→ storage
// download: storage ─copy_buffer_to_buffer→ MAP_READ buffer ─map_async,
//           poll(Wait)→ &[u32] ─narrow_rows→ packed Image<u8>
//
// Download is synchronous: it submits the copy and blocks on
// `device.poll(Maintain::Wait)` until the map callback fires.

use wgpu::util::DeviceExt;

use crate::convert::{align_to, narrow_rows, widen_rows};
use crate::device::{DeviceError, DeviceImage};
use crate::gpu::device::GpuDevice;
use crate::image::Image;

/// Row pitch alignment in words: 256 bytes / 4.
pub const PITCH_ALIGNMENT_WORDS: usize =
    wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize / std::mem::size_of::<u32>();

const WORD: u64 = std::mem::size_of::<u32>() as u64;

/// A grayscale image resident on the GPU as a word-per-pixel storage buffer.
///
/// Dropping it releases the buffer.
pub struct GpuImage {
    pub buffer: wgpu::Buffer,
    width: usize,
    height: usize,
    pitch: usize,
}

impl DeviceImage for GpuImage {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn pitch(&self) -> usize {
        self.pitch
    }
}

impl GpuImage {
    /// Size of the backing buffer in bytes.
    pub fn byte_size(&self) -> u64 {
        self.pitch as u64 * self.height as u64 * WORD
    }

    /// Validate dimensions against the device limits and return
    /// `(pitch, byte_size)`.
    fn layout(gpu: &GpuDevice, width: usize, height: usize) -> Result<(usize, u64), DeviceError> {
        if width == 0 || height == 0 {
            return Err(DeviceError::allocation(width, height, "zero-sized image"));
        }
        if width > u32::MAX as usize || height > u32::MAX as usize {
            return Err(DeviceError::allocation(width, height, "dimension exceeds u32"));
        }
        let pitch = align_to(width, PITCH_ALIGNMENT_WORDS);
        let bytes = pitch as u64 * height as u64 * WORD;
        let max_binding = gpu.limits.max_storage_buffer_binding_size as u64;
        if bytes > max_binding || bytes > gpu.limits.max_buffer_size {
            return Err(DeviceError::allocation(
                width,
                height,
                format!("{bytes} bytes exceeds the storage binding limit of {max_binding}"),
            ));
        }
        Ok((pitch, bytes))
    }

    /// Allocate a zero-filled device image.
    pub fn allocate(gpu: &GpuDevice, width: usize, height: usize) -> Result<Self, DeviceError> {
        let (pitch, bytes) = Self::layout(gpu, width, height)?;

        let (buffer, err) = gpu.scoped(|| {
            gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("GpuImage"),
                size: bytes,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        if let Some(reason) = err {
            return Err(DeviceError::allocation(width, height, reason));
        }

        log::debug!("gpu: allocated {width}×{height}, pitch {pitch} words");
        Ok(GpuImage { buffer, width, height, pitch })
    }

    /// Copy a host image of any stride to the GPU.
    pub fn upload(gpu: &GpuDevice, src: &Image<u8>) -> Result<Self, DeviceError> {
        let (width, height) = src.dimensions();
        let (pitch, _) = Self::layout(gpu, width, height)?;
        let staging = widen_rows(src, pitch);

        let (buffer, err) = gpu.scoped(|| {
            gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("GpuImage::upload"),
                contents: bytemuck::cast_slice(staging.as_slice()),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
            })
        });
        if let Some(reason) = err {
            return Err(DeviceError::allocation(width, height, reason));
        }

        log::debug!("gpu: uploaded {width}×{height}, pitch {pitch} words");
        Ok(GpuImage { buffer, width, height, pitch })
    }

    /// Copy the image back into a packed host image.
    ///
    /// Blocks until the GPU has finished all submitted work.
    pub fn download(&self, gpu: &GpuDevice) -> Result<Image<u8>, DeviceError> {
        let size = self.byte_size();

        let (readback, err) = gpu.scoped(|| {
            let readback = gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("GpuImage::readback"),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let mut encoder = gpu
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("GpuImage::download"),
                });
            encoder.copy_buffer_to_buffer(&self.buffer, 0, &readback, 0, size);
            gpu.queue.submit(std::iter::once(encoder.finish()));
            readback
        });
        if let Some(reason) = err {
            return Err(DeviceError::Transfer(reason));
        }

        let slice = readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver outlives the poll below; a failed send means it
            // was already dropped and nobody is waiting.
            let _ = sender.send(result);
        });
        gpu.device.poll(wgpu::Maintain::Wait);

        receiver
            .recv()
            .map_err(|_| DeviceError::Transfer("map callback never fired".to_string()))?
            .map_err(|e| DeviceError::Transfer(e.to_string()))?;

        let image = {
            let mapped = slice.get_mapped_range();
            let words: &[u32] = bytemuck::try_cast_slice(&mapped)
                .map_err(|e| DeviceError::Transfer(format!("misaligned readback: {e}")))?;
            narrow_rows(words, self.width, self.height, self.pitch)
        };
        readback.unmap();

        Ok(image)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

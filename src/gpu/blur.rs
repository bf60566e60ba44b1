// gpu/blur.rs — GPU Gaussian blur compute pipeline.
//
// The pipeline is compiled once per device. Each call uploads a small
// uniform block and the integer weights of the requested mask, binds the
// source and destination images, and dispatches one invocation per pixel.
//
// Errors raised by wgpu during the call (validation, out-of-memory) are
// captured through error scopes and surface as
// `FilterStatus::ExecutionFailed`; nothing panics on the device path.

use wgpu::util::DeviceExt;

use crate::device::DeviceImage;
use crate::filter::{BorderPolicy, FilterConfig, FilterStatus};
use crate::gpu::device::{GpuDevice, WorkgroupSize};
use crate::gpu::image::GpuImage;

// ---------------------------------------------------------------------------
// Uniform params (must match WGSL struct BlurParams exactly)
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
struct BlurParams {
    width:          u32,
    height:         u32,
    src_pitch:      u32,
    dst_pitch:      u32,
    radius:         u32,
    border:         u32,
    constant_value: u32,
    weight_sum:     u32,
}

impl BlurParams {
    fn new(src: &GpuImage, dst: &GpuImage, config: &FilterConfig, weight_sum: u32) -> Self {
        let constant_value = match config.border {
            BorderPolicy::Constant(v) => v as u32,
            _ => 0,
        };
        BlurParams {
            width:          src.width() as u32,
            height:         src.height() as u32,
            src_pitch:      src.pitch() as u32,
            dst_pitch:      dst.pitch() as u32,
            radius:         config.mask.radius() as u32,
            border:         config.border.shader_id(),
            constant_value,
            weight_sum,
        }
    }
}

/// Check that `src` and `dst` can be filtered into each other.
fn validate(src: &impl DeviceImage, dst: &impl DeviceImage) -> FilterStatus {
    if src.width() == 0 || src.height() == 0 || src.dimensions() != dst.dimensions() {
        return FilterStatus::SizeMismatch;
    }
    if src.pitch() < src.width() || dst.pitch() < dst.width() {
        return FilterStatus::StrideError;
    }
    FilterStatus::Success
}

// ---------------------------------------------------------------------------
// GpuBlurPipeline
// ---------------------------------------------------------------------------

/// Compiled `gauss_blur` compute pipeline and its bind group layout.
pub struct GpuBlurPipeline {
    pipeline: wgpu::ComputePipeline,
    bgl:      wgpu::BindGroupLayout,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// WGSL source with the workgroup size substituted into the template.
fn shader_source(workgroup_size: WorkgroupSize) -> String {
    include_str!("../shaders/gauss_blur.wgsl")
        .replace("{{WG_X}}", &workgroup_size.x.to_string())
        .replace("{{WG_Y}}", &workgroup_size.y.to_string())
}

impl GpuBlurPipeline {
    pub fn new(device: &wgpu::Device, workgroup_size: WorkgroupSize) -> Self {
        let shader_src = shader_source(workgroup_size);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label:  Some("gauss_blur.wgsl"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });

        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("GpuBlur BGL"),
            entries: &[
                // 0 — source image
                storage_entry(0, true),
                // 1 — destination image
                storage_entry(1, false),
                // 2 — params uniform
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<BlurParams>() as u64,
                        ),
                    },
                    count: None,
                },
                // 3 — mask weights
                storage_entry(3, true),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("GpuBlur pipeline layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label:               Some("gauss_blur"),
            layout:              Some(&pipeline_layout),
            module:              &shader,
            entry_point:         "gauss_blur",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache:               None,
        });

        GpuBlurPipeline { pipeline, bgl }
    }

    /// Blur `src` into `dst` on the GPU and wait for completion.
    pub fn run(
        &self,
        gpu: &GpuDevice,
        src: &GpuImage,
        dst: &mut GpuImage,
        config: &FilterConfig,
    ) -> FilterStatus {
        let status = validate(src, &*dst);
        if !status.is_success() {
            return status;
        }

        let kernel = config.kernel();
        let params = BlurParams::new(src, dst, config, kernel.sum());

        let ((), err) = gpu.scoped(|| {
            let params_buf = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label:    Some("GpuBlur params"),
                contents: bytemuck::bytes_of(&params),
                usage:    wgpu::BufferUsages::UNIFORM,
            });
            let weights_buf = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label:    Some("GpuBlur weights"),
                contents: bytemuck::cast_slice(kernel.weights()),
                usage:    wgpu::BufferUsages::STORAGE,
            });

            let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label:  Some("GpuBlur BG"),
                layout: &self.bgl,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: src.buffer.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 1, resource: dst.buffer.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 2, resource: params_buf.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 3, resource: weights_buf.as_entire_binding() },
                ],
            });

            let (wg_x, wg_y) = gpu
                .workgroup_size
                .dispatch_size(params.width, params.height);
            let mut encoder = gpu.device.create_command_encoder(
                &wgpu::CommandEncoderDescriptor { label: Some("GpuBlur dispatch") },
            );
            {
                let mut pass = encoder.begin_compute_pass(
                    &wgpu::ComputePassDescriptor { label: Some("gauss_blur"), timestamp_writes: None },
                );
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(wg_x, wg_y, 1);
            }
            gpu.queue.submit(std::iter::once(encoder.finish()));
            gpu.device.poll(wgpu::Maintain::Wait);
        });

        match err {
            Some(reason) => {
                log::error!("gpu blur ({config}) failed: {reason}");
                FilterStatus::ExecutionFailed
            }
            None => FilterStatus::Success,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

// tests/test_pipeline.rs — End-to-end runs on the host device.
//
// A fault-injecting device wraps the host device to drive the failure paths
// without a GPU.

use std::cell::Cell;
use std::path::{Path, PathBuf};

use gauss_blur::convolution::gauss_blur;
use gauss_blur::device::{ComputeDevice, DeviceError, DeviceInfo, DeviceKind, HostDevice, HostImage};
use gauss_blur::filter::{BorderPolicy, FilterConfig, FilterStatus, MaskSize};
use gauss_blur::image::Image;
use gauss_blur::io::{encode_pgm, encode_png, load_image};
use gauss_blur::pipeline::{blur_on_device, run, OutputPaths, PipelineError, RunConfig};

fn ramp(w: usize, h: usize) -> Image<u8> {
    let mut img = Image::new(w, h);
    for y in 0..h {
        for x in 0..w {
            img.set(x, y, ((x * 255) / w.max(1) ^ (y * 3)) as u8);
        }
    }
    img
}

fn write_input(dir: &Path, name: &str, img: &Image<u8>) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, encode_pgm(img).unwrap()).unwrap();
    path
}

fn host_config(input: PathBuf) -> RunConfig {
    RunConfig {
        input: Some(input),
        device: DeviceKind::Host,
        ..RunConfig::default()
    }
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ===== Fault injection =====

/// Host device whose filter call or download can be made to fail.
struct FaultyDevice {
    inner: HostDevice,
    status: FilterStatus,
    fail_download: bool,
    blur_calls: Cell<usize>,
}

impl FaultyDevice {
    fn failing_filter(status: FilterStatus) -> Self {
        FaultyDevice {
            inner: HostDevice::new(),
            status,
            fail_download: false,
            blur_calls: Cell::new(0),
        }
    }

    fn failing_download() -> Self {
        FaultyDevice {
            fail_download: true,
            ..Self::failing_filter(FilterStatus::Success)
        }
    }
}

impl ComputeDevice for FaultyDevice {
    type Image = HostImage;

    fn info(&self) -> &DeviceInfo {
        self.inner.info()
    }

    fn allocate(&self, width: usize, height: usize) -> Result<HostImage, DeviceError> {
        self.inner.allocate(width, height)
    }

    fn upload(&self, src: &Image<u8>) -> Result<HostImage, DeviceError> {
        self.inner.upload(src)
    }

    fn gauss_blur(&self, src: &HostImage, dst: &mut HostImage, config: &FilterConfig) -> FilterStatus {
        self.blur_calls.set(self.blur_calls.get() + 1);
        if self.status.is_success() {
            self.inner.gauss_blur(src, dst, config)
        } else {
            self.status
        }
    }

    fn download(&self, src: &HostImage) -> Result<Image<u8>, DeviceError> {
        if self.fail_download {
            return Err(DeviceError::Transfer("injected".to_string()));
        }
        self.inner.download(src)
    }
}

// ===== Successful runs =====

#[test]
fn run_writes_both_outputs_next_to_input() {
    let dir = tempfile::tempdir().unwrap();
    let src = ramp(40, 30);
    let input = write_input(dir.path(), "foo.pgm", &src);

    let paths = run(&HostDevice::new(), &host_config(input)).unwrap();
    assert_eq!(paths.pgm, dir.path().join("foo_gaussianBlur.pgm"));
    assert_eq!(paths.png, dir.path().join("foo_gaussianBlur.png"));

    let expected = gauss_blur(&src, &FilterConfig::default()).unwrap();
    assert_eq!(load_image(&paths.pgm).unwrap(), expected);
    assert_eq!(load_image(&paths.png).unwrap(), expected);
}

#[test]
fn explicit_output_moves_png_with_it() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "foo.pgm", &ramp(8, 8));
    let out_dir = dir.path().join("out");
    std::fs::create_dir(&out_dir).unwrap();

    let config = RunConfig {
        output: Some(out_dir.join("result.pgm")),
        ..host_config(input)
    };
    let paths = run(&HostDevice::new(), &config).unwrap();
    assert_eq!(paths, OutputPaths {
        pgm: out_dir.join("result.pgm"),
        png: out_dir.join("result.png"),
    });
    assert_eq!(files_in(&out_dir), ["result.pgm", "result.png"]);
    assert_eq!(files_in(dir.path()), ["foo.pgm", "out"]);
}

#[test]
fn filter_config_reaches_the_device() {
    let dir = tempfile::tempdir().unwrap();
    let src = ramp(21, 13);
    let input = write_input(dir.path(), "foo.pgm", &src);
    let filter = FilterConfig::new(MaskSize::Size11x11, BorderPolicy::Constant(255));

    let paths = run(&HostDevice::new(), &RunConfig { filter, ..host_config(input) }).unwrap();
    assert_eq!(load_image(&paths.pgm).unwrap(), gauss_blur(&src, &filter).unwrap());
}

#[test]
fn png_input_produces_pgm_primary() {
    let dir = tempfile::tempdir().unwrap();
    let src = ramp(5, 5);
    let input = dir.path().join("shot.png");
    std::fs::write(&input, encode_png(&src).unwrap()).unwrap();

    let paths = run(&HostDevice::new(), &host_config(input)).unwrap();
    assert_eq!(paths.pgm, dir.path().join("shot_gaussianBlur.pgm"));
    assert_eq!(paths.png, dir.path().join("shot_gaussianBlur.png"));
}

// ===== Failure paths =====

#[test]
fn missing_input_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = host_config(dir.path().join("missing.pgm"));

    let err = run(&HostDevice::new(), &config).unwrap_err();
    assert!(matches!(err, PipelineError::Input(_)), "{err}");
    assert!(err.to_string().starts_with("Unable to open:"), "{err}");
    assert_ne!(err.exit_code(), 0);
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn filter_failure_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "foo.pgm", &ramp(16, 16));
    let device = FaultyDevice::failing_filter(FilterStatus::ExecutionFailed);

    let err = run(&device, &host_config(input)).unwrap_err();
    match err {
        PipelineError::Filter { status } => assert_eq!(status, FilterStatus::ExecutionFailed),
        other => panic!("expected filter error, got {other}"),
    }
    assert_eq!(device.blur_calls.get(), 1);
    assert_eq!(files_in(dir.path()), ["foo.pgm"]);
}

#[test]
fn download_failure_is_a_resource_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "foo.pgm", &ramp(16, 16));

    let err = run(&FaultyDevice::failing_download(), &host_config(input)).unwrap_err();
    assert!(matches!(err, PipelineError::Resource(DeviceError::Transfer(_))), "{err}");
    assert_eq!(err.exit_code(), 3);
    assert_eq!(files_in(dir.path()), ["foo.pgm"]);
}

#[test]
fn undecodable_input_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.pgm");
    std::fs::write(&input, b"P5\n4 4\n255\n").unwrap();

    let err = run(&HostDevice::new(), &host_config(input)).unwrap_err();
    assert!(matches!(err, PipelineError::Input(_)), "{err}");
    assert_eq!(files_in(dir.path()), ["broken.pgm"]);
}

#[test]
fn output_that_would_overwrite_input_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("shot.png");
    std::fs::write(&input, encode_png(&ramp(6, 6)).unwrap()).unwrap();
    let before = std::fs::read(&input).unwrap();

    let config = RunConfig {
        output: Some(dir.path().join("shot")),
        ..host_config(input.clone())
    };
    let err = run(&HostDevice::new(), &config).unwrap_err();
    assert!(matches!(err, PipelineError::PathCollision(_)), "{err}");
    assert_eq!(err.exit_code(), 2);
    assert_eq!(std::fs::read(&input).unwrap(), before);
    assert_eq!(files_in(dir.path()), ["shot.png"]);
}

#[test]
fn blocked_png_target_leaves_no_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "foo.pgm", &ramp(12, 12));
    let blocker = dir.path().join("foo_gaussianBlur.png");
    std::fs::create_dir(&blocker).unwrap();
    std::fs::write(blocker.join("occupied"), b"x").unwrap();

    let err = run(&HostDevice::new(), &host_config(input)).unwrap_err();
    assert!(matches!(err, PipelineError::Output(_)), "{err}");
    assert_eq!(err.exit_code(), 5);
    assert_eq!(files_in(dir.path()), ["foo.pgm", "foo_gaussianBlur.png"]);
    assert!(blocker.is_dir());
}

// ===== Device layout =====

#[test]
fn host_device_result_is_independent_of_pitch() {
    let packed = ramp(70, 9);
    let mut padded: Image<u8> = Image::new_with_stride(70, 9, 100);
    for y in 0..9 {
        padded.row_mut(y).copy_from_slice(packed.row(y));
    }
    let device = HostDevice::new();
    let cfg = FilterConfig::new(MaskSize::Size7x7, BorderPolicy::Mirror);
    let a = blur_on_device(&device, &packed, &cfg).unwrap();
    let b = blur_on_device(&device, &padded, &cfg).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, gauss_blur(&packed, &cfg).unwrap());
    assert_eq!(a.stride(), 70);
}

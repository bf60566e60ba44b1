// pipeline.rs — The end-to-end blur run.
//
//   select device ─► load ─► upload ─► allocate dst ─► gauss_blur ─► download
//                                                                      │
//                     Saved image: <pgm>, <png>  ◄── write both ◄── encode both
//
// Every stage returns a `Result` and the first failure ends the run. Device
// images are owned locals, so whatever was allocated before a failure is
// released on the way out. Both outputs are encoded and staged as temporary
// files before either is renamed into place, so a run leaves either both
// files or neither.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::device::{ComputeDevice, DeviceError, DeviceImage, DeviceInfo, DeviceKind, HostDevice};
use crate::filter::{FilterConfig, FilterStatus};
use crate::gpu::{GpuDevice, MinCapability};
use crate::image::Image;
use crate::io::{self, ImageIoError, OutputFormat};

/// Suffix appended to the input stem to name the outputs.
pub const OUTPUT_SUFFIX: &str = "_gaussianBlur";

/// Bundled sample image, relative to the crate root.
pub const SAMPLE_RELATIVE: &str = "data/sample.pgm";

/// Name used when the bundled sample cannot be found anywhere.
pub const SAMPLE_FALLBACK: &str = "sample.pgm";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Everything one run needs, as parsed from the command line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunConfig {
    /// Source image; `None` means the bundled sample.
    pub input: Option<PathBuf>,
    /// Primary (PGM) output; `None` derives it from the input name.
    pub output: Option<PathBuf>,
    pub filter: FilterConfig,
    pub device: DeviceKind,
}

impl RunConfig {
    /// The input path, falling back to the bundled sample.
    pub fn input_path(&self) -> PathBuf {
        self.input.clone().unwrap_or_else(default_input)
    }
}

/// Locate the bundled sample image.
///
/// Looks for `data/sample.pgm` under the working directory, the executable's
/// directory and its two parents, then the crate manifest directory. Falls
/// back to the bare name `sample.pgm`, which the loader will then fail to
/// open with a clear message.
pub fn default_input() -> PathBuf {
    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Ok(exe) = std::env::current_exe() {
        roots.extend(exe.ancestors().skip(1).take(3).map(Path::to_path_buf));
    }
    roots.push(PathBuf::from(env!("CARGO_MANIFEST_DIR")));

    roots
        .into_iter()
        .map(|root| root.join(SAMPLE_RELATIVE))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| PathBuf::from(SAMPLE_FALLBACK))
}

// ---------------------------------------------------------------------------
// Output paths
// ---------------------------------------------------------------------------

/// Where a run writes its two outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub pgm: PathBuf,
    pub png: PathBuf,
}

impl OutputPaths {
    /// Derive both output paths.
    ///
    /// The PGM path is `output` when given, otherwise
    /// `<input-stem>_gaussianBlur.<input-ext>` next to the input (`pgm` when
    /// the input has no extension or is itself a PNG). The PNG path is
    /// always the final PGM path with its extension replaced by `png`, so an
    /// explicit `--output` moves both files.
    pub fn derive(input: &Path, output: Option<&Path>) -> Result<Self, PipelineError> {
        let pgm = match output {
            Some(path) => path.to_path_buf(),
            None => {
                let stem = input
                    .file_stem()
                    .ok_or_else(|| PipelineError::Other(format!(
                        "cannot derive an output name from {}",
                        input.display()
                    )))?
                    .to_string_lossy();
                let ext = match input.extension().map(|e| e.to_string_lossy()) {
                    Some(ext) if !ext.eq_ignore_ascii_case(OutputFormat::Png.extension()) => ext,
                    _ => OutputFormat::Pgm.extension().into(),
                };
                input.with_file_name(format!("{stem}{OUTPUT_SUFFIX}.{ext}"))
            }
        };
        let png = pgm.with_extension(OutputFormat::Png.extension());
        if png == pgm {
            return Err(PipelineError::PathCollision(pgm));
        }
        let source = resolve_path(input);
        for out in [&pgm, &png] {
            if resolve_path(out) == source {
                return Err(PipelineError::PathCollision(out.clone()));
            }
        }
        Ok(OutputPaths { pgm, png })
    }
}

/// Absolute form of `path` for identity checks. Resolves symlinks when the
/// file exists, otherwise resolves its directory and keeps the file name.
/// Falls back to `path` unchanged when neither can be resolved.
fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(full) = path.canonicalize() {
        return full;
    }
    let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
        return path.to_path_buf();
    };
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
    dir.canonicalize()
        .map(|dir| dir.join(name))
        .unwrap_or_else(|_| path.to_path_buf())
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A failed run, classified by the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The input could not be opened or decoded.
    #[error(transparent)]
    Input(ImageIoError),

    /// An output would overwrite the input or the other output.
    #[error("output {} collides with the input or the PNG output; choose another name", .0.display())]
    PathCollision(PathBuf),

    /// Device selection, allocation or transfer failed.
    #[error(transparent)]
    Resource(#[from] DeviceError),

    /// The blur primitive returned a non-success status.
    #[error("Gaussian blur failed with error code: {}", .status.code())]
    Filter { status: FilterStatus },

    /// Encoding or writing an output failed.
    #[error(transparent)]
    Output(ImageIoError),

    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Other(_) => 1,
            PipelineError::Input(_) | PipelineError::PathCollision(_) => 2,
            PipelineError::Resource(_) => 3,
            PipelineError::Filter { .. } => 4,
            PipelineError::Output(_) => 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Stage `src` onto `device`, blur it and copy the result back.
pub fn blur_on_device<D: ComputeDevice>(
    device: &D,
    src: &Image<u8>,
    filter: &FilterConfig,
) -> Result<Image<u8>, PipelineError> {
    let t = Instant::now();
    let dev_src = device.upload(src)?;
    let mut dev_dst = device.allocate(src.width(), src.height())?;
    log::debug!(
        "staged {}×{} (src pitch {}, dst pitch {}) in {:?}",
        dev_src.width(),
        dev_src.height(),
        dev_src.pitch(),
        dev_dst.pitch(),
        t.elapsed()
    );

    let t = Instant::now();
    let status = device.gauss_blur(&dev_src, &mut dev_dst, filter);
    if !status.is_success() {
        return Err(PipelineError::Filter { status });
    }
    log::debug!("gauss_blur ({filter}) in {:?}", t.elapsed());

    let t = Instant::now();
    let out = device.download(&dev_dst)?;
    log::debug!("downloaded in {:?}", t.elapsed());
    Ok(out)
}

/// Encode `img` as PGM and PNG, then write both.
///
/// Both files are staged next to their targets and only renamed into place
/// once both writes succeeded, so a failed or truncated write never leaves
/// a partial output behind. If the PNG rename fails the PGM already moved
/// into place is removed.
pub fn write_outputs(img: &Image<u8>, paths: &OutputPaths) -> Result<(), PipelineError> {
    let pgm = io::encode(img, OutputFormat::Pgm).map_err(PipelineError::Output)?;
    let png = io::encode(img, OutputFormat::Png).map_err(PipelineError::Output)?;

    let staged_pgm = io::stage_file(&paths.pgm, &pgm).map_err(PipelineError::Output)?;
    let staged_png = io::stage_file(&paths.png, &png).map_err(PipelineError::Output)?;

    io::persist(staged_pgm, &paths.pgm).map_err(PipelineError::Output)?;
    if let Err(err) = io::persist(staged_png, &paths.png) {
        if let Err(rm) = std::fs::remove_file(&paths.pgm) {
            log::warn!("could not remove {} after failed write: {rm}", paths.pgm.display());
        }
        return Err(PipelineError::Output(err));
    }
    Ok(())
}

/// Run the whole pipeline on an already selected device.
pub fn run<D: ComputeDevice>(device: &D, config: &RunConfig) -> Result<OutputPaths, PipelineError> {
    let input = config.input_path();
    let paths = OutputPaths::derive(&input, config.output.as_deref())?;

    let t = Instant::now();
    let src = io::load_image(&input).map_err(PipelineError::Input)?;
    log::info!(
        "loaded {} ({}×{}) in {:?}",
        input.display(),
        src.width(),
        src.height(),
        t.elapsed()
    );

    let blurred = blur_on_device(device, &src, &config.filter)?;
    write_outputs(&blurred, &paths)?;
    Ok(paths)
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed(OutputPaths),
    /// No adapter met the minimum capability; nothing was done.
    NoDevice,
}

/// Select the device named in `config` and run the pipeline on it.
///
/// `on_device` is called once the device is open, before any image work,
/// so the caller can report it.
pub fn execute(
    config: &RunConfig,
    on_device: impl FnOnce(&DeviceInfo),
) -> Result<Outcome, PipelineError> {
    match config.device {
        DeviceKind::Host => {
            let device = HostDevice::new();
            on_device(device.info());
            run(&device, config).map(Outcome::Completed)
        }
        DeviceKind::Gpu => {
            let Some(device) = GpuDevice::select(&MinCapability::default())? else {
                log::warn!("no GPU adapter meets the minimum capability; nothing to do");
                return Ok(Outcome::NoDevice);
            };
            log::info!("selected {device}");
            on_device(device.info());
            run(&device, config).map(Outcome::Completed)
        }
    }
}

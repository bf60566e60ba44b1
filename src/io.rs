// io.rs — Loading and encoding 8-bit grayscale images.
//
// Decoding and encoding are delegated to the `image` crate. This module only
// moves pixels between its `GrayImage` and our strided `Image<u8>`, and
// attaches the path to every failure.
//
//   load_image   path → Image<u8>    (open-and-check, guess format, to luma8)
//   encode_pgm   Image<u8> → bytes   (binary P5, maxval 255)
//   encode_png   Image<u8> → bytes   (8-bit grayscale)
//   stage_file   bytes → temp file next to the target (nothing at the target yet)
//   persist      temp file → target, by rename

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{ExtendedColorType, ImageEncoder, ImageReader};
use tempfile::NamedTempFile;

use crate::convert::pack_rows;
use crate::image::Image;

/// Output container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pgm,
    Png,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pgm => "pgm",
            OutputFormat::Png => "png",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OutputFormat::Pgm => "PGM",
            OutputFormat::Png => "PNG",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageIoError {
    #[error("Unable to open: {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot encode {format}: {source}")]
    Encode {
        format: OutputFormat,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Load an image from `path` as 8-bit grayscale.
///
/// The file is opened first so a missing or unreadable path is reported as
/// `Open` before any decoding is attempted. The format is guessed from the
/// content; colour images are converted to luma.
pub fn load_image(path: &Path) -> Result<Image<u8>, ImageIoError> {
    let file = File::open(path).map_err(|source| ImageIoError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let decode_err = |source: image::ImageError| ImageIoError::Decode { path: path.to_path_buf(), source };
    let decoded = ImageReader::new(BufReader::new(file))
        .with_guessed_format()
        .map_err(|e| decode_err(image::ImageError::IoError(e)))?
        .decode()
        .map_err(decode_err)?;

    let gray = decoded.into_luma8();
    let (width, height) = gray.dimensions();
    log::debug!("loaded {}: {width}×{height}", path.display());
    Ok(Image::from_vec(width as usize, height as usize, gray.into_raw()))
}

/// Encode as binary PGM (P5, maxval 255).
pub fn encode_pgm(img: &Image<u8>) -> Result<Vec<u8>, ImageIoError> {
    let mut out = Vec::new();
    PnmEncoder::new(&mut out)
        .with_subtype(PnmSubtype::Graymap(SampleEncoding::Binary))
        .write_image(
            &pack_rows(img),
            img.width() as u32,
            img.height() as u32,
            ExtendedColorType::L8,
        )
        .map_err(|source| ImageIoError::Encode { format: OutputFormat::Pgm, source })?;
    Ok(out)
}

/// Encode as 8-bit grayscale PNG.
pub fn encode_png(img: &Image<u8>) -> Result<Vec<u8>, ImageIoError> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            &pack_rows(img),
            img.width() as u32,
            img.height() as u32,
            ExtendedColorType::L8,
        )
        .map_err(|source| ImageIoError::Encode { format: OutputFormat::Png, source })?;
    Ok(out)
}

/// Encode in the given format.
pub fn encode(img: &Image<u8>, format: OutputFormat) -> Result<Vec<u8>, ImageIoError> {
    match format {
        OutputFormat::Pgm => encode_pgm(img),
        OutputFormat::Png => encode_png(img),
    }
}

/// Write `bytes` to a temporary file in the directory of `path`.
///
/// Nothing exists at `path` until the returned file is passed to
/// [`persist`]. Dropping it instead deletes the partial data.
pub fn stage_file(path: &Path, bytes: &[u8]) -> Result<NamedTempFile, ImageIoError> {
    stage_with(path, |file| file.write_all(bytes))
}

fn stage_with(
    path: &Path,
    write: impl FnOnce(&mut File) -> std::io::Result<()>,
) -> Result<NamedTempFile, ImageIoError> {
    let write_err = |source| ImageIoError::Write { path: path.to_path_buf(), source };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut staged = tempfile::Builder::new()
        .prefix(".gauss-blur-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;
    write(staged.as_file_mut())
        .and_then(|()| staged.as_file().sync_all())
        .map_err(write_err)?;
    Ok(staged)
}

/// Move a staged file to `path`, replacing whatever is there.
pub fn persist(staged: NamedTempFile, path: &Path) -> Result<(), ImageIoError> {
    staged.persist(path).map(drop).map_err(|err| ImageIoError::Write {
        path: path.to_path_buf(),
        source: err.error,
    })
}

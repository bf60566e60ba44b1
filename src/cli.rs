// cli.rs — Command-line surface.
//
// Parsing is a pure step: `RunConfig::from_args` turns an argument list
// into a validated `RunConfig` or a clap error, and nothing else happens
// until it returns. `main` decides what to do with the error (clap prints
// usage and exits with status 2).

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::device::DeviceKind;
use crate::filter::{BorderPolicy, FilterConfig, MaskSize};
use crate::pipeline::RunConfig;

#[derive(Parser, Debug)]
#[command(
    name = "gauss-blur",
    version,
    about = "Gaussian blur of a grayscale image on a compute device",
    after_help = "Examples:\n  gauss-blur --input lena.pgm\n  gauss-blur --input lena.pgm --mask-size 7 --border mirror\n  gauss-blur --input lena.pgm --output out/blurred.pgm --device host"
)]
struct Cli {
    /// Source image (PGM or PNG). Defaults to the bundled data/sample.pgm.
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Primary PGM output. The PNG is written next to it with a .png extension.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Square mask size: 3, 5, 7, 9, 11 or 13 ("5x5" also accepted).
    #[arg(short = 'm', long = "mask-size", default_value = "5")]
    mask_size: MaskSize,

    /// How samples beyond the image edge are produced.
    #[arg(short = 'b', long = "border", value_enum, default_value_t = BorderArg::Replicate)]
    border: BorderArg,

    /// Sample value used by the constant border.
    #[arg(long = "border-value", default_value_t = 0)]
    border_value: u8,

    /// Compute device to run the blur on.
    #[arg(
        short = 'd',
        long = "device",
        value_enum,
        env = "GAUSS_BLUR_DEVICE",
        default_value_t = DeviceKind::Gpu
    )]
    device: DeviceKind,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum BorderArg {
    Replicate,
    Constant,
    Mirror,
    Wrap,
}

impl BorderArg {
    fn policy(self, value: u8) -> BorderPolicy {
        match self {
            BorderArg::Replicate => BorderPolicy::Replicate,
            BorderArg::Constant => BorderPolicy::Constant(value),
            BorderArg::Mirror => BorderPolicy::Mirror,
            BorderArg::Wrap => BorderPolicy::Wrap,
        }
    }
}

impl std::fmt::Display for BorderArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = self.to_possible_value().ok_or(std::fmt::Error)?;
        f.write_str(value.get_name())
    }
}

impl From<Cli> for RunConfig {
    fn from(cli: Cli) -> Self {
        RunConfig {
            input: cli.input,
            output: cli.output,
            filter: FilterConfig::new(cli.mask_size, cli.border.policy(cli.border_value)),
            device: cli.device,
        }
    }
}

impl RunConfig {
    /// Parse a full argument list, program name first.
    pub fn from_args<I, T>(args: I) -> Result<RunConfig, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Cli::try_parse_from(args).map(RunConfig::from)
    }
}

//! Run configuration.
//!
//! Built once from an ordered list of long flags and read-only afterwards.

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::context::{Context, Value};
use crate::FloatNum;

/// Lattice speed of sound, 1/sqrt(3).
const C_S: FloatNum = 0.577_350_269_189_625_8;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Unknown flag, malformed value or conflicting flags.
    #[error(transparent)]
    Cli(#[from] clap::Error),
    #[error("invalid value for `{name}`: {reason}")]
    InvalidValue { name: &'static str, reason: String },
    #[error("unknown option `{0}`")]
    UnknownOption(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Portable CPU kernel.
    Native,
    /// ArrayFire kernel (requires the `accel` feature).
    Arrayfire,
}

impl Backend {
    fn name(self) -> &'static str {
        match self {
            Backend::Native => "native",
            Backend::Arrayfire => "arrayfire",
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(name = "lbsim", version, about = "Lattice Boltzmann simulation runner")]
struct Options {
    /// Physical setup: channel, cylinder or cavity.
    #[arg(long, default_value = "channel")]
    geometry: String,

    /// Lattice size along x.
    #[arg(long, default_value_t = 64, allow_negative_numbers = true)]
    lat_nx: i64,

    /// Lattice size along y.
    #[arg(long, default_value_t = 64, allow_negative_numbers = true)]
    lat_ny: i64,

    /// Kinematic viscosity in lattice units.
    #[arg(long, default_value_t = 0.1, allow_negative_numbers = true)]
    visc: FloatNum,

    /// Number of iterations to run, 0 runs until a hook stops the simulation.
    #[arg(long, default_value_t = 10_000)]
    max_iters: u64,

    /// Report progress every N iterations, 0 disables it.
    #[arg(long, default_value_t = 1000)]
    every: u64,

    /// Reference velocity: channel centreline or lid speed.
    #[arg(long, default_value_t = 0.02, allow_negative_numbers = true)]
    max_v: FloatNum,

    /// Make the channel flow along x instead of y.
    #[arg(long)]
    horizontal: bool,

    /// Seed for the initial velocity perturbation.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Amplitude of the seeded initial velocity perturbation.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    perturbation: FloatNum,

    /// Kernel backend.
    #[arg(long, value_enum, default_value_t = Backend::Native)]
    backend: Backend,

    /// Kernel template the backend materializes.
    #[arg(long, default_value = "single_fluid")]
    template: String,

    /// Suppress progress output.
    #[arg(long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log the kernel context and per-step details.
    #[arg(long)]
    verbose: bool,

    /// Regression-test mode: no framework hooks, non-interactive output.
    #[arg(long, conflicts_with = "verbose")]
    test: bool,
}

/// Immutable run parameters.
#[derive(Clone, Debug)]
pub struct Configuration {
    opts: Options,
}

impl Configuration {
    /// Parses `args` (without the program name).
    pub fn build<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let argv = std::iter::once("lbsim".to_owned()).chain(args.into_iter().map(Into::into));
        let opts = Options::try_parse_from(argv)?;
        let config = Configuration { opts };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let o = &self.opts;
        if !(o.visc.is_finite() && o.visc > 0.0) {
            return Err(ConfigError::InvalidValue {
                name: "visc",
                reason: format!("{} is not a positive viscosity", o.visc),
            });
        }
        if !(o.max_v > 0.0 && o.max_v < C_S) {
            return Err(ConfigError::InvalidValue {
                name: "max_v",
                reason: format!("{} is outside (0, {:.3})", o.max_v, C_S),
            });
        }
        if !(o.perturbation.is_finite() && o.perturbation >= 0.0) {
            return Err(ConfigError::InvalidValue {
                name: "perturbation",
                reason: format!("{} is not a non-negative amplitude", o.perturbation),
            });
        }
        if o.backend == Backend::Arrayfire && !cfg!(feature = "accel") {
            return Err(ConfigError::InvalidValue {
                name: "backend",
                reason: "built without the `accel` feature".to_owned(),
            });
        }
        Ok(())
    }

    /// Looks up an option by its name (dashes or underscores).
    pub fn get(&self, name: &str) -> Result<Value, ConfigError> {
        let o = &self.opts;
        let value = match name.replace('-', "_").as_str() {
            "geometry" => Value::Str(o.geometry.clone()),
            "lat_nx" => Value::Int(o.lat_nx),
            "lat_ny" => Value::Int(o.lat_ny),
            "visc" => Value::Float(o.visc),
            "max_iters" => Value::Int(o.max_iters as i64),
            "every" => Value::Int(o.every as i64),
            "max_v" => Value::Float(o.max_v),
            "horizontal" => Value::Bool(o.horizontal),
            "seed" => Value::Int(o.seed as i64),
            "perturbation" => Value::Float(o.perturbation),
            "backend" => Value::Str(o.backend.name().to_owned()),
            "template" => Value::Str(o.template.clone()),
            "quiet" => Value::Bool(o.quiet),
            "verbose" => Value::Bool(o.verbose),
            "test" => Value::Bool(o.test),
            _ => return Err(ConfigError::UnknownOption(name.to_owned())),
        };
        Ok(value)
    }

    pub fn geometry_kind(&self) -> &str {
        &self.opts.geometry
    }

    pub fn lat_nx(&self) -> i64 {
        self.opts.lat_nx
    }

    pub fn lat_ny(&self) -> i64 {
        self.opts.lat_ny
    }

    pub fn visc(&self) -> FloatNum {
        self.opts.visc
    }

    /// Relaxation time of the symmetric populations matching the viscosity.
    pub fn tau(&self) -> FloatNum {
        3.0 * self.opts.visc + 0.5
    }

    /// `None` when the run is open-ended.
    pub fn max_iters(&self) -> Option<u64> {
        match self.opts.max_iters {
            0 => None,
            n => Some(n),
        }
    }

    pub fn every(&self) -> u64 {
        self.opts.every
    }

    pub fn max_v(&self) -> FloatNum {
        self.opts.max_v
    }

    pub fn horizontal(&self) -> bool {
        self.opts.horizontal
    }

    pub fn seed(&self) -> u64 {
        self.opts.seed
    }

    pub fn perturbation(&self) -> FloatNum {
        self.opts.perturbation
    }

    pub fn backend(&self) -> Backend {
        self.opts.backend
    }

    pub fn template_name(&self) -> &str {
        &self.opts.template
    }

    pub fn quiet(&self) -> bool {
        self.opts.quiet
    }

    pub fn verbose(&self) -> bool {
        self.opts.verbose
    }

    pub fn test_mode(&self) -> bool {
        self.opts.test
    }

    /// Highest-precedence layer of the kernel context.
    pub(crate) fn kernel_overrides(&self) -> Context {
        let mut ctx = Context::new();
        ctx.set("visc", self.visc());
        ctx.set("tau", self.tau());
        ctx.set("seed", self.seed() as i64);
        ctx
    }
}

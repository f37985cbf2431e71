//! Poiseuille convergence sweep: prints `visc ratio` for log-spaced
//! viscosities at a fixed iteration count.

use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use lbsim::sweep::{deviation_is_monotone, logspace, PoiseuilleSweep};

#[derive(Parser)]
#[command(name = "poiseuille")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Poiseuille channel convergence sweep", long_about = None)]
struct Cli {
    /// Steps per case
    #[arg(long, default_value_t = PoiseuilleSweep::MAX_ITERS)]
    max_iters: u64,

    /// log10 of the smallest viscosity
    #[arg(long, default_value_t = -3.0, allow_negative_numbers = true)]
    from: f64,

    /// log10 of the largest viscosity
    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    to: f64,

    /// Number of cases
    #[arg(long, default_value_t = 10)]
    num: usize,

    /// Tolerance of the monotonicity check
    #[arg(long, default_value_t = 0.01)]
    tolerance: f64,

    /// Extra flags handed to every case, e.g. `-- --lat-nx=32`
    #[arg(last = true)]
    args: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let sweep = PoiseuilleSweep::new(cli.max_iters)
        .with_viscosities(logspace(cli.from, cli.to, cli.num))
        .with_args(cli.args);
    let points = sweep.run()?;
    for p in &points {
        println!("{} {}", p.visc, p.ratio);
    }

    if !deviation_is_monotone(&points, cli.tolerance) {
        anyhow::bail!(
            "convergence at {} iters is not monotone in viscosity (tolerance {})",
            cli.max_iters,
            cli.tolerance
        );
    }
    Ok(())
}

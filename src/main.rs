use anyhow::Context as _;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use lbsim::config::{ConfigError, Configuration};
use lbsim::sweep::max_velocity_ratio;
use lbsim::Sim;

fn main() -> anyhow::Result<()> {
    let config = match Configuration::build(std::env::args().skip(1)) {
        Ok(config) => config,
        // --help, --version and usage errors print themselves
        Err(ConfigError::Cli(e)) => e.exit(),
        Err(e) => return Err(e.into()),
    };

    let level = if config.quiet() {
        "warn"
    } else if config.verbose() {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut sim = Sim::build(config).context("building simulation")?;
    let summary = sim.run(None).context("running simulation")?;
    let ratio = max_velocity_ratio(sim.geo(), sim.fields())?;

    info!(
        kind = sim.kind().name(),
        iterations = summary.iterations,
        ratio,
        "done"
    );
    println!("{} {} {:.6}", sim.kind().name(), summary.iterations, ratio);
    Ok(())
}

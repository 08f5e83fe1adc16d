//! CLI command handlers.

pub mod properties;
pub mod run;

use clap::Args;
use wafer_scout_core::{AgentConfig, AxisRange};

/// Agent configuration flags shared by the commands.
#[derive(Args, Debug)]
pub struct AgentArgs {
    /// Scan dimensionality: 1 (line) or 2 (wafer plane)
    #[arg(long, default_value_t = 2)]
    pub dim: u8,

    /// Lower bound of each axis (agent-relative)
    #[arg(long, default_value_t = -5.0, allow_hyphen_values = true)]
    pub lo: f64,

    /// Upper bound of each axis (agent-relative)
    #[arg(long, default_value_t = 5.0, allow_hyphen_values = true)]
    pub hi: f64,

    /// Motor resolution (grid step and knowledge-cell size)
    #[arg(long, default_value_t = 0.25)]
    pub resolution: f64,

    /// Cluster count of the observable model
    #[arg(short = 'k', long, default_value_t = 3)]
    pub clusters: usize,

    /// RNG seed for reproducible runs
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl AgentArgs {
    /// Build and validate the agent configuration.
    pub fn to_config(&self) -> anyhow::Result<AgentConfig> {
        let range = AxisRange::new(self.lo, self.hi);
        let config = match self.dim {
            1 => AgentConfig::line("motor_x", range, self.clusters),
            2 => AgentConfig::plane(["wafer_x", "wafer_y"], range, range, self.clusters),
            other => anyhow::bail!("dim must be 1 or 2, got {other}"),
        };
        let config = config
            .with_resolution(self.resolution)
            .with_seed(self.seed);
        config.validate()?;
        Ok(config)
    }
}

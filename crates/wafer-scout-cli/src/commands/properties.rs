//! Print the remote-control property table of a configured agent.

use std::sync::Arc;

use clap::Args;
use serde_json::json;

use wafer_scout_core::properties::PropertyRegistry;
use wafer_scout_core::ClusterAgent;

use super::AgentArgs;

/// Arguments for `wafer-scout properties`.
#[derive(Args, Debug)]
pub struct PropertiesArgs {
    #[command(flatten)]
    pub agent: AgentArgs,
}

/// Enumerate the table and print one JSON object per property.
pub fn handle(args: PropertiesArgs) -> anyhow::Result<()> {
    let config = args.agent.to_config()?;
    let agent = Arc::new(ClusterAgent::new(config)?);
    let registry = PropertyRegistry::new(agent);

    let mut rows = Vec::new();
    for entry in registry.entries() {
        let value = registry.get(entry.name())?;
        rows.push(json!({
            "name": entry.name(),
            "kind": format!("{:?}", entry.kind()),
            "read_only": entry.is_read_only(),
            "value": value,
        }));
    }
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

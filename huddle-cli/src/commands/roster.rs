//! Roster command - validate a roster and show who speaks after whom

use std::path::PathBuf;

use clap::Args;
use huddle_core::chat::TransitionGraph;
use huddle_core::{Config, Roster, Topology};

use super::parse_topology;

/// Arguments for the roster command
#[derive(Args, Debug)]
pub struct RosterArgs {
    /// Roster file (JSON array of agent profiles)
    #[arg(required = true)]
    pub path: PathBuf,

    /// Speaking topology to preview (hub-and-spoke, round-robin)
    #[arg(short, long, value_parser = parse_topology)]
    pub topology: Option<Topology>,
}

impl RosterArgs {
    /// Execute the roster command
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let roster = Roster::load(&self.path)?;
        let topology = self.topology.unwrap_or(config.chat.topology);

        println!("Roster: {}", self.path.display());
        println!();

        for profile in roster.chat_order() {
            let role = if profile.name == roster.admin().name {
                "admin"
            } else if profile.is_user_proxy {
                "human proxy"
            } else {
                "agent"
            };
            let model = config
                .model
                .model_for(profile.model)
                .unwrap_or("(default)");

            println!("  {} [{}]", profile.name, role);
            if !profile.description.is_empty() {
                println!("    {}", profile.description);
            }
            if !profile.is_user_proxy {
                println!("    model: {} ({})", profile.model, model);
                if !profile.plugins.is_empty() {
                    println!("    plugins: {}", profile.plugins.join(", "));
                }
            }
        }

        let names: Vec<String> = roster.chat_order().iter().map(|p| p.name.clone()).collect();
        let graph = TransitionGraph::from_topology(topology, &names, &roster.admin().name)?;

        println!();
        println!("Topology: {}", topology);
        println!("  first speaker(s): {}", graph.next_candidates(None).join(", "));
        for edge in graph.edges() {
            println!("  {}", edge);
        }

        Ok(())
    }
}

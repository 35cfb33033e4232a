//! Transition graph: which agent may speak after which
//!
//! Graphs only hold agent names. They are built once when a chat is configured
//! and never change afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Built-in speaking orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    /// Every spoke alternates with the admin
    #[default]
    HubAndSpoke,
    /// Fixed cyclic order over the roster
    RoundRobin,
}

impl Topology {
    pub fn all() -> &'static [Topology] {
        &[Topology::HubAndSpoke, Topology::RoundRobin]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Topology::HubAndSpoke => "hub-and-spoke",
            Topology::RoundRobin => "round-robin",
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hub-and-spoke" | "hub" | "hubandspoke" => Ok(Topology::HubAndSpoke),
            "round-robin" | "roundrobin" | "rr" => Ok(Topology::RoundRobin),
            _ => Err(format!("Unknown topology: {}", s)),
        }
    }
}

/// How a graph was built; decides who speaks first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphKind {
    HubAndSpoke,
    RoundRobin,
    Custom,
}

/// A directed edge: `to` may speak right after `from`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Adjacency over agent names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionGraph {
    kind: GraphKind,
    agents: Vec<String>,
    start: String,
    edges: Vec<Edge>,
}

impl TransitionGraph {
    /// Build a graph for a built-in topology
    ///
    /// `agents` is the roster in order; `admin` must be one of them.
    pub fn from_topology(topology: Topology, agents: &[String], admin: &str) -> Result<Self> {
        match topology {
            Topology::HubAndSpoke => Self::hub_and_spoke(agents, admin),
            Topology::RoundRobin => Self::round_robin(agents),
        }
    }

    /// Admin talks to every spoke, every spoke answers only to the admin
    pub fn hub_and_spoke(agents: &[String], admin: &str) -> Result<Self> {
        check_roster(agents)?;
        if !agents.iter().any(|a| a == admin) {
            return Err(Error::Config(format!("Admin '{}' is not in the roster", admin)));
        }

        let spokes: Vec<&String> = agents.iter().filter(|a| *a != admin).collect();
        if spokes.is_empty() {
            return Err(Error::Config(
                "Hub-and-spoke needs at least one agent besides the admin".to_string(),
            ));
        }

        let mut edges = Vec::with_capacity(spokes.len() * 2);
        for spoke in spokes {
            edges.push(Edge::new(admin, spoke.as_str()));
            edges.push(Edge::new(spoke.as_str(), admin));
        }

        Ok(Self {
            kind: GraphKind::HubAndSpoke,
            agents: agents.to_vec(),
            start: admin.to_string(),
            edges,
        })
    }

    /// One cycle over the roster, starting with the first agent
    pub fn round_robin(agents: &[String]) -> Result<Self> {
        check_roster(agents)?;

        let edges = agents
            .iter()
            .enumerate()
            .map(|(i, from)| Edge::new(from.as_str(), agents[(i + 1) % agents.len()].as_str()))
            .collect();

        Ok(Self {
            kind: GraphKind::RoundRobin,
            agents: agents.to_vec(),
            start: agents[0].clone(),
            edges,
        })
    }

    /// Explicit edge list; `start` speaks first
    ///
    /// Duplicate edges are kept once, at their first position.
    pub fn custom(agents: &[String], edges: Vec<Edge>, start: &str) -> Result<Self> {
        check_roster(agents)?;
        if !agents.iter().any(|a| a == start) {
            return Err(Error::Config(format!(
                "Start agent '{}' is not in the roster",
                start
            )));
        }

        let mut unique: Vec<Edge> = Vec::with_capacity(edges.len());
        for edge in edges {
            for name in [&edge.from, &edge.to] {
                if !agents.contains(name) {
                    return Err(Error::Config(format!(
                        "Edge {} names unknown agent '{}'",
                        edge, name
                    )));
                }
            }
            if !unique.contains(&edge) {
                unique.push(edge);
            }
        }

        Ok(Self {
            kind: GraphKind::Custom,
            agents: agents.to_vec(),
            start: start.to_string(),
            edges: unique,
        })
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn agents(&self) -> &[String] {
        &self.agents
    }

    /// The topology's starting point (admin for hub-and-spoke)
    pub fn start(&self) -> &str {
        &self.start
    }

    /// Agents that may speak after `current`, in edge order
    ///
    /// With no current speaker this returns the first speakers of a run:
    /// a hub-and-spoke chat behaves as if the admin relayed the seed message,
    /// other graphs hand the first turn to their start agent.
    pub fn next_candidates(&self, current: Option<&str>) -> Vec<&str> {
        match (current, self.kind) {
            (Some(name), _) => self.successors(name),
            (None, GraphKind::HubAndSpoke) => self.successors(&self.start),
            (None, _) => vec![self.start.as_str()],
        }
    }

    fn successors(&self, name: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.from == name)
            .map(|e| e.to.as_str())
            .collect()
    }
}

fn check_roster(agents: &[String]) -> Result<()> {
    if agents.is_empty() {
        return Err(Error::Config("Roster is empty".to_string()));
    }
    for (i, name) in agents.iter().enumerate() {
        if agents[..i].contains(name) {
            return Err(Error::Config(format!("Duplicate agent name '{}'", name)));
        }
    }
    Ok(())
}

//! Matching configuration.
//!
//! A feature chooses which heuristics run, and in which order, through a
//! [`MatchPlan`]. Plans are plain serde values so they can live in a feature's
//! settings file; [`MatchContext`] carries the kernel capabilities some
//! strategies need for one particular regeneration.

use crate::error::Result;
use crate::kernel::{Geometry, ModifiedOracle, Shape};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One matching heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Identical shape values inherit the source id.
    Shape,
    /// Sole entity of a type on both sides.
    UniqueType,
    /// Outer wire of an already matched face. Needs geometry.
    OuterWire,
    /// Kernel "modified" oracle. Needs an oracle.
    Modified,
    /// Identity from the ids of the entities touched.
    Derived,
    /// Edge shared by two matched faces.
    FaceEdge,
    /// Vertex shared by matched edges.
    EdgeVertex,
}

impl Strategy {
    pub const fn name(&self) -> &'static str {
        match self {
            Strategy::Shape => "shape",
            Strategy::UniqueType => "unique_type",
            Strategy::OuterWire => "outer_wire",
            Strategy::Modified => "modified",
            Strategy::Derived => "derived",
            Strategy::FaceEdge => "face_edge",
            Strategy::EdgeVertex => "edge_vertex",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered list of strategies plus the cleanup switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPlan {
    pub strategies: Vec<Strategy>,
    /// Mint ids for leftover nils and duplicates after the strategies ran.
    pub cleanup: bool,
}

impl Default for MatchPlan {
    fn default() -> Self {
        Self {
            strategies: vec![
                Strategy::Shape,
                Strategy::Modified,
                Strategy::UniqueType,
                Strategy::OuterWire,
                Strategy::FaceEdge,
                Strategy::EdgeVertex,
                Strategy::Derived,
            ],
            cleanup: true,
        }
    }
}

impl MatchPlan {
    /// A plan running `strategies` in order, followed by cleanup.
    pub fn new(strategies: impl Into<Vec<Strategy>>) -> Self {
        Self {
            strategies: strategies.into(),
            cleanup: true,
        }
    }

    /// Disables the cleanup pass.
    pub fn without_cleanup(mut self) -> Self {
        self.cleanup = false;
        self
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Kernel capabilities available to one matching pass.
pub struct MatchContext<'a, S: Shape> {
    pub oracle: Option<&'a dyn ModifiedOracle<S>>,
    pub geometry: Option<&'a dyn Geometry<S>>,
}

impl<'a, S: Shape> MatchContext<'a, S> {
    /// A context with neither oracle nor geometry.
    pub fn new() -> Self {
        Self {
            oracle: None,
            geometry: None,
        }
    }

    pub fn with_oracle(mut self, oracle: &'a dyn ModifiedOracle<S>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_geometry(mut self, geometry: &'a dyn Geometry<S>) -> Self {
        self.geometry = Some(geometry);
        self
    }
}

impl<S: Shape> Default for MatchContext<'_, S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a matching pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Records resolved by each strategy run, in run order.
    pub resolved: Vec<(Strategy, usize)>,
    /// Strategies that could not run for lack of a capability.
    pub skipped: Vec<Strategy>,
    /// Fresh ids minted for leftover nils.
    pub nils_minted: usize,
    /// Fresh ids minted to break duplicates.
    pub duplicates_minted: usize,
}

impl MatchReport {
    /// Records resolved by `strategy` (summed over repeated runs).
    pub fn resolved_by(&self, strategy: Strategy) -> usize {
        self.resolved
            .iter()
            .filter(|(s, _)| *s == strategy)
            .map(|(_, n)| n)
            .sum()
    }

    /// Records resolved by all strategies, cleanup excluded.
    pub fn total_resolved(&self) -> usize {
        self.resolved.iter().map(|(_, n)| n).sum()
    }
}

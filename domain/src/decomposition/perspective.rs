//! Analytical perspectives and debate pairings.
//!
//! Map sub-queries in a debate plan are each assigned a [`Perspective`]. The
//! debate phase then pairs opposing perspectives according to a configurable
//! [`DebatePairing`] table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A labeled analytical stance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perspective {
    Analyst,
    Advocate,
    Critic,
    Synthesizer,
    Pragmatist,
}

impl Perspective {
    /// Assignment order for map sub-queries.
    pub const ROTATION: [Perspective; 5] = [
        Perspective::Analyst,
        Perspective::Advocate,
        Perspective::Critic,
        Perspective::Synthesizer,
        Perspective::Pragmatist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Perspective::Analyst => "analyst",
            Perspective::Advocate => "advocate",
            Perspective::Critic => "critic",
            Perspective::Synthesizer => "synthesizer",
            Perspective::Pragmatist => "pragmatist",
        }
    }

    /// Instruction appended to the system prompt of a sub-query taking this stance.
    pub fn instruction(&self) -> &'static str {
        match self {
            Perspective::Analyst => {
                "Take the perspective of a neutral analyst: focus on facts, evidence and patterns."
            }
            Perspective::Advocate => {
                "Take the perspective of an advocate: highlight strengths, opportunities and what is working."
            }
            Perspective::Critic => {
                "Take the perspective of a critic: highlight weaknesses, risks, gaps and unresolved problems."
            }
            Perspective::Synthesizer => {
                "Take the perspective of a synthesizer: connect themes and look for the bigger picture."
            }
            Perspective::Pragmatist => {
                "Take the perspective of a pragmatist: focus on feasibility, cost, owners and next steps."
            }
        }
    }

    /// Perspective for the `index`-th map sub-query.
    pub fn for_index(index: usize) -> Perspective {
        Self::ROTATION[index % Self::ROTATION.len()]
    }
}

impl fmt::Display for Perspective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Perspective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "analyst" => Ok(Perspective::Analyst),
            "advocate" => Ok(Perspective::Advocate),
            "critic" => Ok(Perspective::Critic),
            "synthesizer" => Ok(Perspective::Synthesizer),
            "pragmatist" => Ok(Perspective::Pragmatist),
            other => Err(format!("unknown perspective: {}", other)),
        }
    }
}

/// Two opposing perspectives asked to debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebatePairing {
    pub first: Perspective,
    pub second: Perspective,
}

impl DebatePairing {
    pub fn new(first: Perspective, second: Perspective) -> Self {
        Self { first, second }
    }

    /// The default pairing table: advocate↔critic, analyst↔synthesizer, pragmatist↔critic.
    pub fn default_table() -> Vec<DebatePairing> {
        vec![
            DebatePairing::new(Perspective::Advocate, Perspective::Critic),
            DebatePairing::new(Perspective::Analyst, Perspective::Synthesizer),
            DebatePairing::new(Perspective::Pragmatist, Perspective::Critic),
        ]
    }
}

impl fmt::Display for DebatePairing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vs {}", self.first, self.second)
    }
}

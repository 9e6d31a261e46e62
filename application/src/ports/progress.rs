//! Progress notification port
//!
//! Defines the interface for reporting progress during a pipeline run.

use std::fmt;

/// Phases reported through [`PipelineProgress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelinePhase {
    Decompose,
    /// Direct, parallel, map and exploratory sub-queries
    Execute,
    Debate,
    Reduce,
    Followup,
    Aggregate,
    Sandbox,
}

impl PipelinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePhase::Decompose => "decompose",
            PipelinePhase::Execute => "execute",
            PipelinePhase::Debate => "debate",
            PipelinePhase::Reduce => "reduce",
            PipelinePhase::Followup => "followup",
            PipelinePhase::Aggregate => "aggregate",
            PipelinePhase::Sandbox => "sandbox",
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Callback for progress updates during a pipeline run
///
/// Implementations live in the presentation layer.
pub trait PipelineProgress: Send + Sync {
    /// Called when a phase starts
    fn on_phase_start(&self, phase: PipelinePhase, total_tasks: usize);

    /// Called when a sub-query reaches a terminal status
    fn on_sub_query_complete(&self, phase: PipelinePhase, query_id: &str, success: bool);

    /// Called when a phase completes
    fn on_phase_complete(&self, phase: PipelinePhase);
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl PipelineProgress for NoProgress {
    fn on_phase_start(&self, _phase: PipelinePhase, _total_tasks: usize) {}
    fn on_sub_query_complete(&self, _phase: PipelinePhase, _query_id: &str, _success: bool) {}
    fn on_phase_complete(&self, _phase: PipelinePhase) {}
}

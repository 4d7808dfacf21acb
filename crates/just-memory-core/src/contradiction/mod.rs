//! Contradiction detection and resolution.
//!
//! Detection ([`detect`]) is a pipeline of independent pure-function stages
//! over a candidate pair of memories; resolution ([`resolve`]) tracks and
//! applies outcomes against stored contradiction edges.

mod detect;
mod resolve;

pub use detect::{
    detect, ContradictionKind, ContradictionSignal, SuggestedAction, NLI_CONFIDENCE_THRESHOLD,
    NLI_SIM_THRESHOLD, SEMANTIC_SIM_THRESHOLD,
};
pub use resolve::{ContradictionResolution, ResolutionKind, ResolutionStatus};

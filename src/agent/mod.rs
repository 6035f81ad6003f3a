//! The three-stage answer pipeline: classify the query's intent, dispatch to
//! the matching tool, then synthesize the tool output into a final answer.

pub mod classifier;
pub mod router;
pub mod synthesize;

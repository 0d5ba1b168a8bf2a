//! covnavi core library: branch coverage aggregation and triage.
//!
//! [`aggregate::Aggregator`] joins a control-flow graph ([`graph::GraphClient`])
//! with line coverage ([`coverage::CoverageLookup`]) into a
//! [`catalogue::Catalogue`]; [`review::ReviewSession`] walks that catalogue
//! with an operator, using [`filter::is_of_interest`] to pick what to show.

pub mod aggregate;
pub mod branches;
pub mod catalogue;
pub mod config;
pub mod coverage;
pub mod error;
pub mod filter;
pub mod graph;
pub mod progress;
pub mod render;
pub mod review;
pub mod types;

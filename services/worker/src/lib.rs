//! Weather tiles worker.
//!
//! - [`oracle`] finds the newest completely published upstream run
//! - [`download`] fetches package files into `tmp/`
//! - [`pipeline`] derives and renders every layer x hour of a run
//! - [`rollout`] publishes finished runs locally or to a tile server
//! - [`scheduler`] polls every package until cancelled

pub mod download;
pub mod oracle;
pub mod pipeline;
pub mod rollout;
pub mod scheduler;

pub use download::{DirectoryFetcher, Fetcher, HttpFetcher};
pub use oracle::{AvailabilityProbe, HttpProbe, PredicateProbe, RunOracle};
pub use pipeline::{IterationOutcome, Pipeline, RunReport};
pub use rollout::Rollout;

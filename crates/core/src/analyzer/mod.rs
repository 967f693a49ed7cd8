//! Remote analysis service integration.
//!
//! The sequential lane submits staged artifacts to an external HTTP service
//! and tracks each submission to completion via the [`RemotePoller`].

mod http;
mod poller;
mod types;

pub use http::HttpAnalyzerClient;
pub use poller::{PollOutcome, RemotePoller};
pub use types::{AnalyzerClient, AnalyzerError, RemoteStatus, RemoteTask};

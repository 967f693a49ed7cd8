//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external service traits,
//! allowing dispatch and polling behavior to be tested without a broker or a
//! running analysis service.

mod mock_analyzer;
mod mock_processor;

pub use mock_analyzer::MockAnalyzerClient;
pub use mock_processor::MockProcessor;

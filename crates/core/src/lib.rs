pub mod analyzer;
pub mod artifacts;
pub mod broker;
pub mod config;
pub mod dispatch;
pub mod metrics;
pub mod processor;
pub mod registry;
pub mod testing;

pub use analyzer::{
    AnalyzerClient, AnalyzerError, HttpAnalyzerClient, PollOutcome, RemotePoller, RemoteStatus,
    RemoteTask,
};
pub use broker::{
    AckCommand, AckOutcome, AckSender, BrokerConsumer, BrokerError, Dispatcher, InboundMessage,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AnalyzerConfig, BrokerConfig, Config,
    ConfigError, PathsConfig, SanitizedConfig, ServerConfig, StageConfig, StageMode,
};
pub use dispatch::{LaneError, LaneWorker, SequentialLane, WorkerPool};
pub use processor::{MergeProcessor, ProcessOutcome, Processor, ProcessorError};
pub use registry::{RegistryError, Task, TaskRegistry, TaskStatus};

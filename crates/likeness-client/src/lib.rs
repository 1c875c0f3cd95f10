//! likeness-client — Talks to the classification service and runs the
//! upload pipeline as an event-driven task.

pub mod config;
pub mod driver;
pub mod transport;

pub use config::{Config, ConfigError};
pub use driver::{spawn_pipeline, DriverError, PendingOutcome, PipelineHandle, Settled};
pub use transport::{ClassifierTransport, HttpTransport};

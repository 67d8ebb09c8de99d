//! Core of the federated training client: job documents, the configuration store,
//! and the model state checker that gates incoming training payloads.
//!
//! Services build on this crate for settings (`config`), logging (`telemetry`) and
//! Prometheus counters (`metrics`).

pub mod checker;
pub mod config;
pub mod documents;
pub mod error;
pub mod metrics;
pub mod store;
pub mod telemetry;
pub mod tensor;

pub use checker::{values_match, ModelStateChecker};
pub use config::{load_config, AppConfig, ConfigError};
pub use documents::{DocumentKind, FederatedConfig, JobConfiguration, JobId, LocalConfig, ModelSnapshot};
pub use error::{ConsistencyError, MalformedConfigError, StoreError, TensorError};
pub use metrics::render_metrics;
pub use store::{ConfigStore, FsConfigStore, MemoryConfigStore};
pub use telemetry::init_tracing;
pub use tensor::{infer_spec, ElementType, ParameterSpec};

//! Chain instance lifecycle and the multi-chain manager.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod errors;
pub use errors::NodeError;

pub mod metrics;
pub use metrics::{InstanceMetrics, MetricsSnapshot};

pub mod health;
pub use health::HealthSample;

pub mod instance;
pub use instance::{ChainInstance, InstanceConfig, InstanceStatus};

pub mod manager;
pub use manager::{ChainManager, ManagerConfig};

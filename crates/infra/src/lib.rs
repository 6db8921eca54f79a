//! Infrastructure layer: stores, slot allocation, provisioning, notifications, config.

pub mod config;
pub mod notify;
pub mod provisioning;
pub mod sequencer;
pub mod slots;
pub mod store;


pub use config::{ConfigError, ProvisioningSettings, StudioConfig};
pub use provisioning::{ProvisioningError, ProvisioningResult, ProvisioningService};
pub use store::{InMemoryStudioStore, PostgresStudioStore, StoreError, StudioStore};

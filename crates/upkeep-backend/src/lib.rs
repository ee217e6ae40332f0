//! Shared contracts for upkeep.
//!
//! Engine identities, the persisted client configuration, the update error
//! type, and the traits the scheduler uses to reach the network and storage.

mod config;
mod engine;
mod error;
mod traits;

pub use config::{Config, GeoSource, GuiItem, SubscriptionItem};
pub use engine::{EngineSpec, EngineType};
pub use error::{NetworkStage, UpdateError};
pub use traits::{ConfigStore, UpdateService};

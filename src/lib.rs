//! Worker-side runtime core: bus adapter, object model, and the per-worker
//! task state machine that ties them together.

pub mod bus;
pub mod config;
pub mod datastore;
pub mod enum_bridge;
pub mod error;
pub mod object;
pub mod objectstore;
pub mod task_processor;
pub mod wire;

pub use bus::{Bus, Delivery, Destination};
pub use config::{bus_from_config, Config};
pub use datastore::DataStoreAdapter;
pub use error::{BusError, ConfigError, DataStoreError, ObjectModelError, ObjectStoreError, TaskProcessError};
pub use object::{AttributeValue, BoolLike, Object};
pub use objectstore::{ObjectStoreAdapter, QueryStructure};
pub use task_processor::{param_to_bool, TaskApi, TaskContext, TaskHandler, TaskProcessor};

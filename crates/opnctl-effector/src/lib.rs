pub mod effector;
pub mod error;
pub mod event_bus;
pub mod local;
pub mod retry;

pub use effector::{Effector, EffectorResult, ObservedResource};
pub use error::EffectorError;
pub use event_bus::{BroadcastEventBus, EngineEvent, EventBus};
pub use local::LocalEffector;
pub use retry::{with_retry, RetryConfig};

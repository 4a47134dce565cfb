//! gramdeck agent API: status store, lifecycle controller, background
//! automation loop and the HTTP boundary in front of them.

pub mod api;
pub mod auth;
pub mod automation;
pub mod background;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod store;
pub mod telemetry;

pub use api::{AppState, router};
pub use automation::{AutomationClient, CommandAutomationClient};
pub use background::{IterationLoop, LoopState};
pub use config::Config;
pub use error::{ApiError, LifecycleError};
pub use lifecycle::{AgentController, ControllerSettings};
pub use store::StatusStore;

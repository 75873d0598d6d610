//! Dependency injection providers for service management.

pub mod app_state;
pub mod control;
pub mod status_server;
pub mod traits;

pub use app_state::AppStateProvider;
pub use control::ControlLoopServiceProvider;
pub use status_server::StatusServerProvider;
pub use traits::{AsyncProvider, ServiceProvider};

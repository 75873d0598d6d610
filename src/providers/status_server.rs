use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    app_context::AppState, providers::traits::ServiceProvider, status_server::StatusServer,
    task_manager::TaskManager,
};

/// Serves the latest status snapshot over TCP.
///
/// Non-critical: the controller keeps running when the port cannot be bound,
/// and the server keeps retrying the bind in the background.
pub struct StatusServerProvider {
    state: Arc<AppState>,
}

impl StatusServerProvider {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl ServiceProvider for StatusServerProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let server = StatusServer::on_port(
            self.state.config().status_port,
            self.state.status_board.clone(),
        );

        task_manager
            .spawn_task(self.name().to_string(), move |cancel_token| async move {
                server.run(cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "StatusServer"
    }

    fn priority(&self) -> i32 {
        5
    }
}

use anyhow::Result;
use async_trait::async_trait;

use crate::task_manager::TaskManager;

/// Builds a component that needs async initialization.
///
/// # Example
///
/// ```no_run
/// use brewd::providers::traits::AsyncProvider;
///
/// struct PortProvider;
///
/// #[async_trait::async_trait]
/// impl AsyncProvider<u16> for PortProvider {
///     async fn provide(&self) -> anyhow::Result<u16> {
///         Ok(4111)
///     }
/// }
/// ```
#[async_trait]
pub trait AsyncProvider<T> {
    async fn provide(&self) -> Result<T>;
}

/// Trait for services that can be started through TaskManager.
///
/// Services start in descending priority order; a critical service that
/// fails to start aborts startup, any other failure is only logged.
///
/// # Example
///
/// ```no_run
/// use brewd::providers::traits::ServiceProvider;
/// use brewd::task_manager::TaskManager;
/// use anyhow::Result;
///
/// struct HeartbeatService;
///
/// #[async_trait::async_trait]
/// impl ServiceProvider for HeartbeatService {
///     async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
///         task_manager.spawn_task("heartbeat".to_string(), |token| async move {
///             token.cancelled().await;
///             Ok(())
///         }).await
///     }
///
///     fn name(&self) -> &'static str { "HeartbeatService" }
/// }
/// ```
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    /// Starts the service in TaskManager.
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()>;

    /// Returns service name for logging and management.
    fn name(&self) -> &'static str;

    /// Returns startup priority (higher numbers start first).
    fn priority(&self) -> i32 {
        0
    }

    /// Indicates if service is critical for system operation.
    fn is_critical(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};
    use tokio::time::{Duration, sleep};
    use tokio_util::sync::CancellationToken;

    struct FixedProvider(u16);

    #[async_trait]
    impl AsyncProvider<u16> for FixedProvider {
        async fn provide(&self) -> Result<u16> {
            Ok(self.0)
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl AsyncProvider<u16> for FailingProvider {
        async fn provide(&self) -> Result<u16> {
            Err(anyhow!("no port"))
        }
    }

    struct RecordingService {
        name: &'static str,
        priority: i32,
        is_critical: bool,
        ran: Arc<Mutex<bool>>,
    }

    impl RecordingService {
        fn new(name: &'static str, priority: i32, is_critical: bool) -> Self {
            Self {
                name,
                priority,
                is_critical,
                ran: Arc::new(Mutex::new(false)),
            }
        }
    }

    #[async_trait]
    impl ServiceProvider for RecordingService {
        async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
            let ran = self.ran.clone();
            task_manager
                .spawn_task(format!("{}_task", self.name), move |_token: CancellationToken| async move {
                    *ran.lock().unwrap() = true;
                    Ok(())
                })
                .await
        }

        fn name(&self) -> &'static str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn is_critical(&self) -> bool {
            self.is_critical
        }
    }

    struct FailingService;

    #[async_trait]
    impl ServiceProvider for FailingService {
        async fn start(&self, _task_manager: &mut TaskManager) -> Result<()> {
            Err(anyhow!("bind refused"))
        }

        fn name(&self) -> &'static str {
            "FailingService"
        }
    }

    #[tokio::test]
    async fn async_provider_returns_value() {
        assert_eq!(FixedProvider(4111).provide().await.unwrap(), 4111);
    }

    #[tokio::test]
    async fn async_provider_propagates_error() {
        let err = FailingProvider.provide().await.unwrap_err();
        assert_eq!(err.to_string(), "no port");
    }

    #[tokio::test]
    async fn service_provider_spawns_task() {
        let mut task_manager = TaskManager::new();
        let service = RecordingService::new("recorder", 5, false);

        service.start(&mut task_manager).await.unwrap();
        sleep(Duration::from_millis(10)).await;

        assert!(*service.ran.lock().unwrap());
        assert_eq!(task_manager.active_count(), 1);
    }

    #[test]
    fn service_provider_default_metadata() {
        let service = FailingService;

        assert_eq!(service.priority(), 0);
        assert!(!service.is_critical());
    }

    #[tokio::test]
    async fn failing_service_reports_error() {
        let mut task_manager = TaskManager::new();

        let err = FailingService.start(&mut task_manager).await.unwrap_err();

        assert!(err.to_string().contains("bind refused"));
        assert_eq!(task_manager.active_count(), 0);
    }

    #[test]
    fn services_sort_by_descending_priority() {
        let mut services: Vec<Box<dyn ServiceProvider>> = vec![
            Box::new(RecordingService::new("status", 5, false)),
            Box::new(FailingService),
            Box::new(RecordingService::new("control", 10, true)),
        ];

        services.sort_by_key(|s| std::cmp::Reverse(s.priority()));

        let names: Vec<_> = services.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["control", "status", "FailingService"]);
    }
}

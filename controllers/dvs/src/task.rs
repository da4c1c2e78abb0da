//! Waiting for remote tasks
//!
//! Every mutating vSphere call returns a task. [`TaskAwaiter::wait`] polls the
//! task until it is terminal and turns the outcome into a [`DvsError`]:
//! - success: `Ok` with the final task info
//! - error (including cancelled tasks): `TaskFailed` wrapping the remote fault
//! - a failed poll or an expired timeout: `Transport`, never retried here
//! - the cancellation token firing: `Cancelled`

use crate::backoff::PollBackoff;
use crate::error::DvsError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vsphere_client::{ManagedObjectReference, TaskInfo, TaskState, VSphereClientTrait, VSphereError};

/// Polls remote tasks until they finish
#[derive(Debug, Clone)]
pub struct TaskAwaiter {
    min_poll: Duration,
    max_poll: Duration,
    timeout: Option<Duration>,
}

impl Default for TaskAwaiter {
    fn default() -> Self {
        Self {
            min_poll: Duration::from_millis(250),
            max_poll: Duration::from_secs(5),
            timeout: None,
        }
    }
}

impl TaskAwaiter {
    /// Give up on a task after `timeout`; `None` waits indefinitely
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the poll interval bounds
    #[must_use]
    pub fn with_poll_interval(mut self, min: Duration, max: Duration) -> Self {
        self.min_poll = min;
        self.max_poll = max;
        self
    }

    /// Wait for `task` to reach a terminal state.
    ///
    /// `context` describes the operation and prefixes the error of a failed task.
    pub async fn wait(
        &self,
        client: &dyn VSphereClientTrait,
        task: &ManagedObjectReference,
        context: &str,
        cancel: &CancellationToken,
    ) -> Result<TaskInfo, DvsError> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut backoff = PollBackoff::new(self.min_poll, self.max_poll);

        loop {
            let info = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(DvsError::Cancelled(format!("{}: stopped waiting for {}", context, task)));
                }
                _ = until(deadline) => return Err(timed_out(context, task, self.timeout)),
                result = client.task_info(task) => result.map_err(DvsError::Transport)?,
            };

            match info.state {
                TaskState::Success => {
                    debug!("{} completed ({})", task, context);
                    return Ok(info);
                }
                TaskState::Error => {
                    let cause = info
                        .error
                        .as_ref()
                        .map(|e| e.message())
                        .unwrap_or_else(|| "task ended in error without a fault".to_string());
                    warn!("{} failed: {}", task, cause);
                    return Err(DvsError::TaskFailed {
                        context: context.to_string(),
                        cause,
                        cancelled: info.cancelled,
                    });
                }
                TaskState::Queued | TaskState::Running => {
                    debug!("{} is {:?}, polling again", task, info.state);
                }
            }

            let delay = backoff.next_delay();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(DvsError::Cancelled(format!("{}: stopped waiting for {}", context, task)));
                }
                _ = until(deadline) => return Err(timed_out(context, task, self.timeout)),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn timed_out(context: &str, task: &ManagedObjectReference, timeout: Option<Duration>) -> DvsError {
    DvsError::Transport(VSphereError::Timeout(format!(
        "{}: {} did not finish within {:?}",
        context,
        task,
        timeout.unwrap_or_default()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsphere_client::{DvsConfigSpec, DvsCreateSpec, MockVSphereClient, TaskScript};

    fn fast() -> TaskAwaiter {
        TaskAwaiter::default().with_poll_interval(Duration::from_millis(1), Duration::from_millis(2))
    }

    async fn submit(mock: &MockVSphereClient, script: TaskScript) -> ManagedObjectReference {
        let dc = mock.add_datacenter("dc1");
        let folders = mock.datacenter_folders(&dc).await.unwrap();
        mock.push_task_script(script);
        let spec = DvsCreateSpec {
            config_spec: DvsConfigSpec {
                name: Some("dvs1".to_string()),
                ..Default::default()
            },
        };
        mock.create_dvs(&folders.network_folder, &spec).await.unwrap()
    }

    #[tokio::test]
    async fn test_success_after_running() {
        let mock = MockVSphereClient::new("https://vcenter.test");
        let task = submit(&mock, TaskScript::success().after(3)).await;

        let info = fast()
            .wait(&mock, &task, "create switch", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(info.state, TaskState::Success);
    }

    #[tokio::test]
    async fn test_failed_task_wraps_remote_cause() {
        let mock = MockVSphereClient::new("https://vcenter.test");
        let task = submit(&mock, TaskScript::fault("DvsFault", "host is in maintenance").after(1)).await;

        let err = fast()
            .wait(&mock, &task, "create switch dvs1", &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            DvsError::TaskFailed { context, cause, cancelled } => {
                assert_eq!(context, "create switch dvs1");
                assert!(cause.contains("host is in maintenance"));
                assert!(cause.contains("DvsFault"));
                assert!(!cancelled);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_task_is_task_failure() {
        let mock = MockVSphereClient::new("https://vcenter.test");
        let task = submit(&mock, TaskScript::cancelled()).await;

        let err = fast()
            .wait(&mock, &task, "create switch", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DvsError::TaskFailed { cancelled: true, .. }));
    }

    #[tokio::test]
    async fn test_poll_transport_error_is_not_success() {
        let mock = MockVSphereClient::new("https://vcenter.test");
        let task = submit(&mock, TaskScript::connection_lost().after(2)).await;

        let err = fast()
            .wait(&mock, &task, "create switch", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DvsError::Transport(VSphereError::Connection(_))));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let mock = MockVSphereClient::new("https://vcenter.test");
        let task = submit(&mock, TaskScript::never_finishes()).await;

        let err = fast()
            .with_timeout(Some(Duration::from_millis(30)))
            .wait(&mock, &task, "create switch", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DvsError::Transport(VSphereError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_cancellation_stops_waiting() {
        let mock = MockVSphereClient::new("https://vcenter.test");
        let task = submit(&mock, TaskScript::never_finishes()).await;
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = fast().wait(&mock, &task, "create switch", &cancel).await.unwrap_err();
        assert!(matches!(err, DvsError::Cancelled(_)));
    }
}

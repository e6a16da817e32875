//! Image analysis tasks.
//!
//! An uploaded item photo is forwarded to the analysis backend, which
//! answers with a task id and processes the image asynchronously. This
//! service keeps a registry of known tasks, drives one poll loop per task
//! through [`crate::poller`], and exposes the latest observed state.
//!
//! Each owner (a user or a form session) has at most one live analysis.
//! Starting a new upload cancels the previous loop and bumps a generation
//! counter; a superseded loop that finishes late finds the stale
//! generation and its result is discarded.
//!
//! Registry entries are ephemeral. A task that reaches a terminal state
//! stays readable for a short retention window so the client can collect
//! the result, then its record and owner slot are dropped.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::ItemAnalysis;
use crate::poller::{
    run_poll_loop, PollOutcome, PollPolicy, PollState, TaskSnapshot, TaskStatusProbe,
};

/// How long a finished task stays readable before its record is dropped.
const DEFAULT_TASK_RETENTION: Duration = Duration::from_secs(60);

/// Wire shape of the backend's task-status endpoint.
#[derive(Debug, Deserialize)]
struct TaskStatusResponse {
    status: crate::models::TaskStatus,
    result: Option<ItemAnalysis>,
}

/// Wire shape of the backend's dispatch response.
#[derive(Debug, Deserialize)]
struct DispatchResponse {
    task_id: String,
}

/// Status probe over the analysis backend's HTTP API.
pub struct HttpStatusProbe {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStatusProbe {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait::async_trait]
impl TaskStatusProbe for HttpStatusProbe {
    async fn probe(&self, task_id: &str) -> Result<TaskSnapshot, ServiceError> {
        let url = format!("{}/tasks/{}", self.base_url, task_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "Status endpoint answered {}",
                response.status()
            )));
        }
        let body: TaskStatusResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;
        Ok(TaskSnapshot {
            status: body.status,
            result: body.result,
        })
    }
}

/// Client-facing view of a task, read from the registry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaskView {
    pub task_id: String,
    pub state: String,
    pub attempt: Option<u32>,
    pub result: Option<ItemAnalysis>,
    pub error: Option<String>,
}

impl TaskView {
    fn from_state(task_id: &str, state: &PollState) -> Self {
        let (label, attempt, result, error) = match state {
            PollState::Idle => ("idle", None, None, None),
            PollState::Polling { attempt } => ("polling", Some(*attempt), None, None),
            PollState::Succeeded(analysis) => ("succeeded", None, Some(analysis.clone()), None),
            PollState::Failed { message } => ("failed", None, None, Some(message.clone())),
            PollState::TimedOut => ("timed_out", None, None, None),
        };
        Self {
            task_id: task_id.to_string(),
            state: label.to_string(),
            attempt,
            result,
            error,
        }
    }
}

struct TaskRecord {
    owner: String,
    state_rx: watch::Receiver<PollState>,
    cancel_tx: watch::Sender<bool>,
}

struct OwnerSlot {
    generation: u64,
    task_id: String,
}

pub struct AnalysisService {
    client: reqwest::Client,
    base_url: String,
    policy: PollPolicy,
    max_upload_bytes: usize,
    task_retention: Duration,
    tasks: DashMap<String, TaskRecord>,
    owners: DashMap<String, OwnerSlot>,
    event_sender: Option<EventSender>,
}

impl AnalysisService {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        policy: PollPolicy,
        max_upload_bytes: usize,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            client,
            base_url,
            policy,
            max_upload_bytes,
            task_retention: DEFAULT_TASK_RETENTION,
            tasks: DashMap::new(),
            owners: DashMap::new(),
            event_sender,
        }
    }

    /// Override how long finished tasks stay readable.
    pub fn with_task_retention(mut self, retention: Duration) -> Self {
        self.task_retention = retention;
        self
    }

    async fn send_event(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to publish analysis event");
            }
        }
    }

    /// Forward an image to the backend and return the task id.
    async fn dispatch(
        &self,
        filename: String,
        content_type: String,
        bytes: Vec<u8>,
    ) -> Result<String, ServiceError> {
        let part = multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str(&content_type)
            .map_err(|e| ServiceError::InvalidInput(format!("Invalid content type: {}", e)))?;
        let form = multipart::Form::new().part("image", part);

        let url = format!("{}/items/analyse", self.base_url);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "Analysis backend answered {}",
                response.status()
            )));
        }
        let body: DispatchResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;
        Ok(body.task_id)
    }

    /// Take over the owner's slot: cancel the previous loop and return the
    /// generation the new loop must present when it finishes.
    fn supersede(&self, owner: &str, task_id: &str) -> u64 {
        let mut slot = self.owners.entry(owner.to_string()).or_insert(OwnerSlot {
            generation: 0,
            task_id: String::new(),
        });
        if !slot.task_id.is_empty() {
            if let Some(previous) = self.tasks.get(&slot.task_id) {
                let _ = previous.cancel_tx.send(true);
            }
            info!(owner, superseded = %slot.task_id, "previous analysis superseded");
        }
        slot.generation += 1;
        slot.task_id = task_id.to_string();
        slot.generation
    }

    fn generation_is_current(&self, owner: &str, generation: u64) -> bool {
        self.owners
            .get(owner)
            .map(|slot| slot.generation == generation)
            .unwrap_or(false)
    }

    /// Upload an image and start polling for its analysis.
    ///
    /// The size cap is checked here before any bytes leave the process.
    #[instrument(skip(self, bytes), fields(owner, size = bytes.len()))]
    pub async fn start_analysis(
        self: &Arc<Self>,
        owner: &str,
        filename: String,
        content_type: String,
        bytes: Vec<u8>,
    ) -> Result<TaskView, ServiceError> {
        if bytes.is_empty() {
            return Err(ServiceError::InvalidInput("Image file is empty".to_string()));
        }
        if bytes.len() > self.max_upload_bytes {
            return Err(ServiceError::InvalidInput(format!(
                "Image exceeds the {} byte upload limit",
                self.max_upload_bytes
            )));
        }

        let task_id = self.dispatch(filename, content_type, bytes).await?;
        let generation = self.supersede(owner, &task_id);

        let (state_tx, state_rx) = watch::channel(PollState::Idle);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.tasks.insert(
            task_id.clone(),
            TaskRecord {
                owner: owner.to_string(),
                state_rx,
                cancel_tx,
            },
        );

        let probe: Arc<dyn TaskStatusProbe> = Arc::new(HttpStatusProbe::new(
            self.client.clone(),
            self.base_url.clone(),
        ));
        let service = Arc::clone(self);
        let owner = owner.to_string();
        let loop_task_id = task_id.clone();
        let policy = self.policy;
        tokio::spawn(async move {
            let outcome =
                run_poll_loop(probe, &loop_task_id, policy, cancel_rx, state_tx).await;
            let retain = service
                .finish_task(&owner, generation, &loop_task_id, outcome)
                .await;
            if retain {
                tokio::time::sleep(service.task_retention).await;
                service.tasks.remove(&loop_task_id);
            }
        });

        self.send_event(Event::AnalysisTaskDispatched {
            task_id: task_id.clone(),
        })
        .await;
        info!(%task_id, "analysis task dispatched");
        Ok(self.get_task(&task_id)?)
    }

    /// Settle a finished loop's registry entries. Returns whether the task
    /// record should linger for the retention window.
    async fn finish_task(
        &self,
        owner: &str,
        generation: u64,
        task_id: &str,
        outcome: PollOutcome,
    ) -> bool {
        if !self.generation_is_current(owner, generation) {
            // A newer upload owns the slot; drop this result on the floor.
            info!(owner, %task_id, "discarding result of superseded analysis");
            self.tasks.remove(task_id);
            return false;
        }
        match &outcome {
            PollOutcome::Cancelled => {
                self.owners.remove(owner);
                self.tasks.remove(task_id);
                false
            }
            PollOutcome::Succeeded(_) => {
                self.owners.remove(owner);
                self.send_event(Event::AnalysisTaskFinished {
                    task_id: task_id.to_string(),
                    succeeded: true,
                })
                .await;
                true
            }
            PollOutcome::Failed { .. } | PollOutcome::TimedOut => {
                self.owners.remove(owner);
                self.send_event(Event::AnalysisTaskFinished {
                    task_id: task_id.to_string(),
                    succeeded: false,
                })
                .await;
                true
            }
        }
    }

    /// Latest observed state of a task.
    pub fn get_task(&self, task_id: &str) -> Result<TaskView, ServiceError> {
        let record = self
            .tasks
            .get(task_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Task {} not found", task_id)))?;
        let state = record.state_rx.borrow().clone();
        Ok(TaskView::from_state(task_id, &state))
    }

    /// Cancel a running task. Local only; the backend job keeps running.
    pub fn cancel_task(&self, task_id: &str) -> Result<(), ServiceError> {
        let record = self
            .tasks
            .get(task_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Task {} not found", task_id)))?;
        let _ = record.cancel_tx.send(true);
        info!(%task_id, owner = %record.owner, "analysis task cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, TaskStatus};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(base_url: String, max_upload_bytes: usize) -> Arc<AnalysisService> {
        Arc::new(AnalysisService::new(
            reqwest::Client::new(),
            base_url,
            PollPolicy {
                max_attempts: 3,
                interval: std::time::Duration::from_millis(10),
            },
            max_upload_bytes,
            None,
        ))
    }

    #[tokio::test]
    async fn rejects_oversized_upload_without_calling_backend() {
        let svc = service("http://127.0.0.1:1".to_string(), 16);
        let err = svc
            .start_analysis("u1", "big.jpg".into(), "image/jpeg".into(), vec![0u8; 17])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn rejects_empty_upload() {
        let svc = service("http://127.0.0.1:1".to_string(), 16);
        let err = svc
            .start_analysis("u1", "empty.jpg".into(), "image/jpeg".into(), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn dispatches_and_polls_to_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/items/analyse"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"task_id": "t-1"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/t-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "SUCCESS",
                "result": {
                    "name": "C-stand",
                    "description": null,
                    "category": "Grip",
                    "level": "staff",
                    "available": 2
                }
            })))
            .mount(&server)
            .await;

        let svc = service(server.uri(), 1024);
        let view = svc
            .start_analysis("u1", "photo.jpg".into(), "image/jpeg".into(), vec![1, 2, 3])
            .await
            .unwrap();
        assert_eq!(view.task_id, "t-1");

        // Give the spawned loop a moment to observe the terminal status.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let view = svc.get_task("t-1").unwrap();
        assert_eq!(view.state, "succeeded");
        let result = view.result.unwrap();
        assert_eq!(result.name, "C-stand");
        assert_eq!(result.level, Role::Staff);
    }

    #[tokio::test]
    async fn backend_failure_status_surfaces_as_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/items/analyse"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"task_id": "t-2"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/t-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "FAILURE",
                "result": null
            })))
            .mount(&server)
            .await;

        let svc = service(server.uri(), 1024);
        svc.start_analysis("u1", "photo.jpg".into(), "image/jpeg".into(), vec![1])
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let view = svc.get_task("t-2").unwrap();
        assert_eq!(view.state, "failed");
        assert!(view.error.is_some());
    }

    #[tokio::test]
    async fn second_upload_supersedes_the_first() {
        let server = MockServer::start().await;
        // Distinct task ids per dispatch.
        Mock::given(method("POST"))
            .and(path("/items/analyse"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"task_id": "t-a"})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/items/analyse"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"task_id": "t-b"})),
            )
            .mount(&server)
            .await;
        // Both tasks report in-progress forever.
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "PENDING",
                "result": null
            })))
            .mount(&server)
            .await;

        let svc = service(server.uri(), 1024);
        svc.start_analysis("u1", "a.jpg".into(), "image/jpeg".into(), vec![1])
            .await
            .unwrap();
        let second = svc
            .start_analysis("u1", "b.jpg".into(), "image/jpeg".into(), vec![2])
            .await
            .unwrap();

        assert_eq!(second.task_id, "t-b");
        // The first loop was cancelled; once it unwinds its record is gone
        // and only the current task answers.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(svc.get_task("t-a").is_err());
        assert!(svc.get_task("t-b").is_ok());
    }

    #[tokio::test]
    async fn finished_tasks_are_evicted_after_the_retention_window() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/items/analyse"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"task_id": "t-done"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/t-done"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "FAILURE",
                "result": null
            })))
            .mount(&server)
            .await;

        let svc = Arc::new(
            AnalysisService::new(
                reqwest::Client::new(),
                server.uri(),
                PollPolicy {
                    max_attempts: 3,
                    interval: std::time::Duration::from_millis(10),
                },
                1024,
                None,
            )
            .with_task_retention(std::time::Duration::from_millis(20)),
        );
        svc.start_analysis("u1", "photo.jpg".into(), "image/jpeg".into(), vec![1])
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert!(svc.get_task("t-done").is_err());
        assert!(svc.owners.is_empty());
        assert!(svc.tasks.is_empty());
    }

    #[test]
    fn task_view_reflects_poll_states() {
        let view = TaskView::from_state("t", &PollState::Polling { attempt: 4 });
        assert_eq!(view.state, "polling");
        assert_eq!(view.attempt, Some(4));

        let view = TaskView::from_state("t", &PollState::TimedOut);
        assert_eq!(view.state, "timed_out");
    }

    #[test]
    fn wire_status_parses_screaming_snake_case() {
        let body: TaskStatusResponse =
            serde_json::from_value(serde_json::json!({"status": "STARTED", "result": null}))
                .unwrap();
        assert_eq!(body.status, TaskStatus::Started);
        assert!(body.status.in_progress());
    }
}

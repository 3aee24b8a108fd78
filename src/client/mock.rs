//! In-memory collaborators for tests
//!
//! `MockBuildStore` behaves like the API server for builds: every write bumps
//! the resource version and stale writes are rejected with a conflict. Phase
//! changes made by the build controller are scripted on a timeline relative
//! to the store's creation, so tests running on a paused tokio clock see them
//! at deterministic points.

use super::{AttachTarget, AttachTransport, BuildGenerator, BuildsClient, ClientError};
use crate::build::{Build, BuildRequest, Phase};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;

const BUILDS_KIND: &str = "builds";

/// Change applied to a stored build by someone other than the flow
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Phase(Phase),
    Failed { reason: String, message: String },
    Delete,
}

#[derive(Debug, Clone)]
struct Scheduled {
    name: String,
    after: Duration,
    transition: Transition,
}

#[derive(Default)]
struct StoreState {
    builds: HashMap<(String, String), Build>,
    next_version: u64,
    timeline: Vec<Scheduled>,
    pending_conflicts: usize,
    get_error: Option<ClientError>,
    update_error: Option<ClientError>,
    get_calls: usize,
    updates: Vec<Build>,
}

impl StoreState {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    fn apply_due(&mut self, elapsed: Duration) {
        let (due, later): (Vec<_>, Vec<_>) = self
            .timeline
            .drain(..)
            .partition(|entry| entry.after <= elapsed);
        self.timeline = later;

        for entry in due {
            let key = self
                .builds
                .keys()
                .find(|(_, name)| *name == entry.name)
                .cloned();
            let Some(key) = key else { continue };

            match entry.transition {
                Transition::Delete => {
                    self.builds.remove(&key);
                }
                Transition::Phase(phase) => {
                    let version = self.bump();
                    if let Some(build) = self.builds.get_mut(&key) {
                        build.status.phase = phase;
                        build.metadata.resource_version = version;
                    }
                }
                Transition::Failed { reason, message } => {
                    let version = self.bump();
                    if let Some(build) = self.builds.get_mut(&key) {
                        build.status.phase = Phase::Failed;
                        build.status.reason = reason;
                        build.status.message = message;
                        build.metadata.resource_version = version;
                    }
                }
            }
        }
    }
}

/// Optimistic-concurrency build store
pub struct MockBuildStore {
    state: Mutex<StoreState>,
    started: Instant,
}

impl MockBuildStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            started: Instant::now(),
        }
    }

    /// Stores a build as if it was just created and returns the stored copy
    pub fn insert(&self, mut build: Build) -> Build {
        let mut state = self.state.lock().unwrap();
        build.metadata.resource_version = state.bump();
        let key = (build.namespace().to_string(), build.name().to_string());
        state.builds.insert(key, build.clone());
        build
    }

    /// Schedules a controller-side change, `after` measured from store creation
    pub fn schedule(&self, name: impl Into<String>, after: Duration, transition: Transition) {
        self.state.lock().unwrap().timeline.push(Scheduled {
            name: name.into(),
            after,
            transition,
        });
    }

    pub fn schedule_phase(&self, name: impl Into<String>, after: Duration, phase: Phase) {
        self.schedule(name, after, Transition::Phase(phase));
    }

    /// Makes the next `count` updates lose a race against another writer
    pub fn conflict_next_updates(&self, count: usize) {
        self.state.lock().unwrap().pending_conflicts = count;
    }

    pub fn fail_gets(&self, error: ClientError) {
        self.state.lock().unwrap().get_error = Some(error);
    }

    pub fn fail_updates(&self, error: ClientError) {
        self.state.lock().unwrap().update_error = Some(error);
    }

    pub fn stored(&self, namespace: &str, name: &str) -> Option<Build> {
        let mut state = self.state.lock().unwrap();
        state.apply_due(self.started.elapsed());
        state
            .builds
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn get_calls(&self) -> usize {
        self.state.lock().unwrap().get_calls
    }

    /// Every update attempt, accepted or not, in call order
    pub fn updates(&self) -> Vec<Build> {
        self.state.lock().unwrap().updates.clone()
    }

    pub fn cancellation_requested(&self, namespace: &str, name: &str) -> bool {
        self.stored(namespace, name)
            .map(|build| build.status.cancelled)
            .unwrap_or(false)
    }
}

impl Default for MockBuildStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuildsClient for MockBuildStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Build, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.get_calls += 1;
        state.apply_due(self.started.elapsed());

        if let Some(err) = state.get_error.clone() {
            return Err(err);
        }

        state
            .builds
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ClientError::not_found(BUILDS_KIND, name))
    }

    async fn update(&self, build: &Build) -> Result<Build, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.apply_due(self.started.elapsed());
        state.updates.push(build.clone());

        if let Some(err) = state.update_error.clone() {
            return Err(err);
        }

        let key = (build.namespace().to_string(), build.name().to_string());
        if !state.builds.contains_key(&key) {
            return Err(ClientError::not_found(BUILDS_KIND, build.name()));
        }

        if state.pending_conflicts > 0 {
            state.pending_conflicts -= 1;
            let version = state.bump();
            if let Some(stored) = state.builds.get_mut(&key) {
                stored.metadata.resource_version = version;
            }
        }

        let stored_version = state
            .builds
            .get(&key)
            .map(|stored| stored.metadata.resource_version.clone())
            .unwrap_or_default();
        if stored_version != build.metadata.resource_version {
            return Err(ClientError::conflict(BUILDS_KIND, build.name()));
        }

        let mut updated = build.clone();
        updated.metadata.resource_version = state.bump();
        state.builds.insert(key, updated.clone());
        Ok(updated)
    }
}

/// Generator that replays scripted results
pub struct MockGenerator {
    responses: Mutex<VecDeque<Result<Build, ClientError>>>,
    requests: Mutex<Vec<BuildRequest>>,
    store: Option<Arc<MockBuildStore>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            store: None,
        }
    }

    /// Successful results are inserted into `store` before being returned
    pub fn backed_by(store: Arc<MockBuildStore>) -> Self {
        Self {
            store: Some(store),
            ..Self::new()
        }
    }

    pub fn add_response(&self, response: Result<Build, ClientError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn add_responses(
        &self,
        responses: impl IntoIterator<Item = Result<Build, ClientError>>,
    ) {
        let mut queue = self.responses.lock().unwrap();
        for response in responses {
            queue.push_back(response);
        }
    }

    /// Requests seen so far, in call order
    pub fn requests(&self) -> Vec<BuildRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuildGenerator for MockGenerator {
    async fn instantiate(&self, request: &BuildRequest) -> Result<Build, ClientError> {
        self.requests.lock().unwrap().push(request.clone());

        let response = self.responses.lock().unwrap().pop_front();
        match response {
            Some(Ok(build)) => match &self.store {
                Some(store) => Ok(store.insert(build)),
                None => Ok(build),
            },
            Some(Err(err)) => Err(err),
            None => Err(ClientError::Api {
                code: 500,
                reason: "InternalError".to_string(),
                message: "no scripted generator response left".to_string(),
            }),
        }
    }
}

/// Attach transport that captures the uploaded bytes
pub struct MockAttachTransport {
    received: Mutex<Vec<u8>>,
    targets: Mutex<Vec<AttachTarget>>,
    failure: Mutex<Option<ClientError>>,
}

impl MockAttachTransport {
    pub fn new() -> Self {
        Self {
            received: Mutex::new(Vec::new()),
            targets: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    pub fn failing(error: ClientError) -> Self {
        let transport = Self::new();
        *transport.failure.lock().unwrap() = Some(error);
        transport
    }

    pub fn received(&self) -> Vec<u8> {
        self.received.lock().unwrap().clone()
    }

    pub fn targets(&self) -> Vec<AttachTarget> {
        self.targets.lock().unwrap().clone()
    }

    pub fn sessions(&self) -> usize {
        self.targets.lock().unwrap().len()
    }
}

impl Default for MockAttachTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttachTransport for MockAttachTransport {
    async fn stream(
        &self,
        target: &AttachTarget,
        stdin: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<(), ClientError> {
        self.targets.lock().unwrap().push(target.clone());

        let failure = self.failure.lock().unwrap().clone();
        if let Some(err) = failure {
            return Err(err);
        }

        let mut buf = Vec::new();
        stdin
            .read_to_end(&mut buf)
            .await
            .map_err(|e| ClientError::Stream(e.to_string()))?;
        self.received.lock().unwrap().extend_from_slice(&buf);
        Ok(())
    }
}

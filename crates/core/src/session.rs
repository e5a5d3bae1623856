use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    client::ConceptAnalysisClient,
    endpoint::GenerativeModel,
    error::AnalysisError,
    state::{AnalysisRequestState, RequestState, RequestToken, StartError},
    types::AnalysisResult,
};

struct Completion {
    token: RequestToken,
    outcome: Result<AnalysisResult, AnalysisError>,
}

/// One presentation session: owns the request state and runs analyses on the
/// tokio runtime, applying each completion only if it is still current.
pub struct AnalysisSession<M> {
    client: Arc<ConceptAnalysisClient<M>>,
    machine: AnalysisRequestState,
    timeout: Option<Duration>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    task: Option<JoinHandle<()>>,
    state_tx: watch::Sender<RequestState>,
}

impl<M: GenerativeModel + 'static> AnalysisSession<M> {
    pub fn new(client: ConceptAnalysisClient<M>) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(RequestState::Idle);

        Self {
            client: Arc::new(client),
            machine: AnalysisRequestState::new(),
            timeout: None,
            completions_tx,
            completions_rx,
            task: None,
            state_tx,
        }
    }

    /// Abandon a request that has not resolved within `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> &RequestState {
        self.machine.state()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<RequestState> {
        self.state_tx.subscribe()
    }

    /// Start analyzing `concept`. Must be called within a tokio runtime.
    pub fn start(&mut self, concept: &str) -> Result<RequestToken, StartError> {
        let (token, concept) = self.machine.start(concept)?;
        self.publish();

        debug!(%token, "analysis started");

        let client = Arc::clone(&self.client);
        let completions_tx = self.completions_tx.clone();
        let timeout = self.timeout;

        self.task = Some(tokio::spawn(async move {
            let analysis = client.analyze_concept(&concept);
            let outcome = match timeout {
                Some(limit) => tokio::time::timeout(limit, analysis)
                    .await
                    .unwrap_or(Err(AnalysisError::Timeout)),
                None => analysis.await,
            };
            let _ = completions_tx.send(Completion { token, outcome });
        }));

        Ok(token)
    }

    /// Dismiss the panel: back to `Idle`, abandoning any in-flight request.
    pub fn reset(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(token) = self.machine.reset() {
            debug!(%token, "in-flight analysis abandoned");
        }
        self.publish();
    }

    /// Wait for the in-flight request to resolve and apply it.
    ///
    /// Returns `None` immediately when nothing is in flight. A task that dies
    /// without reporting (a panicking model) resolves the request as failed.
    pub async fn next_transition(&mut self) -> Option<&RequestState> {
        while self.machine.state().is_in_flight() {
            let Some(task) = self.task.as_mut() else {
                self.resolve_lost_task("analysis task is gone");
                break;
            };

            tokio::select! {
                biased;
                completion = self.completions_rx.recv() => {
                    if self.apply(completion?) {
                        return Some(self.machine.state());
                    }
                }
                joined = task => {
                    self.task = None;
                    // The completion is sent before the task finishes.
                    if !self.poll_transition() {
                        let reason = match joined {
                            Err(e) if e.is_panic() => "analysis task panicked",
                            Err(_) => "analysis task was cancelled",
                            Ok(()) => "analysis task ended without a result",
                        };
                        self.resolve_lost_task(reason);
                    }
                    return Some(self.machine.state());
                }
            }
        }
        None
    }

    /// Apply any completions that have already arrived without waiting.
    /// Returns `true` if the state changed.
    pub fn poll_transition(&mut self) -> bool {
        let mut changed = self.drain();

        let finished = self.task.as_ref().is_some_and(JoinHandle::is_finished);
        if finished && self.machine.state().is_in_flight() {
            changed |= self.drain();
            if self.machine.state().is_in_flight() {
                self.resolve_lost_task("analysis task ended without a result");
                changed = true;
            }
        }

        changed
    }

    fn drain(&mut self) -> bool {
        let mut changed = false;
        while let Ok(completion) = self.completions_rx.try_recv() {
            changed |= self.apply(completion);
        }
        changed
    }

    fn resolve_lost_task(&mut self, reason: &str) {
        let Some(token) = self.machine.in_flight_token() else {
            return;
        };

        warn!(%token, reason, "analysis task ended without reporting");
        self.apply(Completion {
            token,
            outcome: Err(AnalysisError::NetworkError {
                status: None,
                reason: reason.to_string(),
            }),
        });
    }

    fn apply(&mut self, completion: Completion) -> bool {
        let Completion { token, outcome } = completion;
        match self.machine.resolve(token, outcome) {
            Ok(()) => {
                self.task = None;
                self.publish();
                true
            }
            Err(_) => {
                debug!(%token, "discarding stale analysis result");
                false
            }
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.machine.state().clone());
    }
}

impl<M> Drop for AnalysisSession<M> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::sync::Notify;

    use super::*;
    use crate::{
        client::tests::{ScriptedModel, VALID},
        error::{ErrorKind, Result},
    };

    /// Holds every reply until `release` is called.
    #[derive(Clone)]
    struct GatedModel {
        gate: Arc<Notify>,
        calls: Arc<AtomicUsize>,
        inner: ScriptedModel,
    }

    impl GatedModel {
        fn new(inner: ScriptedModel) -> Self {
            Self {
                gate: Arc::new(Notify::new()),
                calls: Arc::new(AtomicUsize::new(0)),
                inner,
            }
        }

        fn release(&self) {
            self.gate.notify_one();
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerativeModel for GatedModel {
        fn model(&self) -> &str {
            "gated"
        }

        async fn generate(&self, prompt: &str, schema: &Value) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            self.inner.generate(prompt, schema).await
        }
    }

    fn titled(title: &str) -> String {
        VALID.replace("\"T\"", &format!("\"{}\"", title))
    }

    struct PanickingModel;

    #[async_trait]
    impl GenerativeModel for PanickingModel {
        fn model(&self) -> &str {
            "panicking"
        }

        async fn generate(&self, _prompt: &str, _schema: &Value) -> Result<Option<String>> {
            panic!("model adapter bug");
        }
    }

    /// Lets every spawned task run until it blocks. The tests run on a paused
    /// clock, which only advances once the runtime has nothing left to do.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_resolves_to_succeeded() {
        let client = ConceptAnalysisClient::new(ScriptedModel::text(VALID));
        let mut session = AnalysisSession::new(client);
        session.start("Cooking in space").unwrap();
        assert!(session.state().is_in_flight());

        let state = session.next_transition().await.unwrap();
        assert_eq!(state.result().map(|r| r.title.as_str()), Some("T"));
        assert!(session.next_transition().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_start_makes_no_call() {
        let model = ScriptedModel::text(VALID);
        let mut session = AnalysisSession::new(ConceptAnalysisClient::new(model.clone()));
        assert_eq!(session.start("   "), Err(StartError::EmptyInput));
        assert_eq!(session.state(), &RequestState::Idle);
        settle().await;
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_in_flight_is_rejected_without_a_call() {
        let model = GatedModel::new(ScriptedModel::replying(vec![
            Ok(Some(VALID.to_string())),
            Ok(Some(VALID.to_string())),
        ]));
        let mut session = AnalysisSession::new(ConceptAnalysisClient::new(model.clone()));

        session.start("first").unwrap();
        settle().await;
        assert_eq!(session.start("second"), Err(StartError::Busy));
        assert_eq!(
            session.state().concept().map(|c| c.as_str()),
            Some("first")
        );

        model.release();
        session.next_transition().await.unwrap();
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_surfaced_as_failed() {
        let model = ScriptedModel::replying(vec![Ok(Some("not json".to_string()))]);
        let mut session = AnalysisSession::new(ConceptAnalysisClient::new(model));
        session.start("concept").unwrap();
        let state = session.next_transition().await.unwrap();
        assert_eq!(state.error().map(|e| e.kind()), Some(ErrorKind::MalformedJson));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_while_in_flight_returns_to_idle() {
        let model = GatedModel::new(ScriptedModel::text(VALID));
        let mut session = AnalysisSession::new(ConceptAnalysisClient::new(model.clone()));

        session.start("concept").unwrap();
        settle().await;
        session.reset();
        assert_eq!(session.state(), &RequestState::Idle);

        model.release();
        settle().await;
        assert!(!session.poll_transition());
        assert_eq!(session.state(), &RequestState::Idle);
        assert!(session.next_transition().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_but_unapplied_response_is_discarded_after_reset() {
        let model = GatedModel::new(ScriptedModel::replying(vec![
            Ok(Some(titled("stale"))),
            Ok(Some(titled("fresh"))),
        ]));
        let mut session = AnalysisSession::new(ConceptAnalysisClient::new(model.clone()));

        session.start("first").unwrap();
        model.release();
        settle().await;

        // The first completion is queued but not yet applied.
        session.reset();
        session.start("second").unwrap();

        model.release();
        let state = session.next_transition().await.unwrap();
        assert_eq!(state.result().map(|r| r.title.as_str()), Some("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_from_succeeded_publishes_in_flight_first() {
        let model = GatedModel::new(ScriptedModel::replying(vec![
            Ok(Some(titled("prior"))),
            Ok(Some(titled("next"))),
        ]));
        let mut session = AnalysisSession::new(ConceptAnalysisClient::new(model.clone()));
        let mut observer = session.subscribe();

        session.start("first").unwrap();
        model.release();
        session.next_transition().await.unwrap();
        assert_eq!(
            observer.borrow_and_update().result().map(|r| r.title.clone()),
            Some("prior".to_string())
        );

        session.start("second").unwrap();
        {
            let seen = observer.borrow_and_update();
            assert!(seen.is_in_flight());
            assert_eq!(seen.result(), None);
        }

        model.release();
        session.next_transition().await.unwrap();
        assert!(observer.has_changed().unwrap());
        assert_eq!(
            observer.borrow_and_update().result().map(|r| r.title.clone()),
            Some("next".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_the_request() {
        let model = GatedModel::new(ScriptedModel::text(VALID));
        let mut session = AnalysisSession::new(ConceptAnalysisClient::new(model))
            .with_timeout(Some(Duration::from_millis(30)));

        session.start("slow concept").unwrap();
        let state = session.next_transition().await.unwrap();
        assert_eq!(state, &RequestState::Failed(AnalysisError::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_restart_clears_previous_result() {
        let model = ScriptedModel::replying(vec![
            Ok(Some(VALID.to_string())),
            Err(AnalysisError::NetworkError {
                status: None,
                reason: "connection reset".to_string(),
            }),
        ]);
        let mut session = AnalysisSession::new(ConceptAnalysisClient::new(model));

        session.start("one").unwrap();
        session.next_transition().await.unwrap();
        session.start("two").unwrap();
        let state = session.next_transition().await.unwrap();
        assert_eq!(state.result(), None);
        assert_eq!(state.error().map(|e| e.kind()), Some(ErrorKind::NetworkError));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_model_fails_the_request() {
        let mut session = AnalysisSession::new(ConceptAnalysisClient::new(PanickingModel));
        session.start("concept").unwrap();

        let state = session.next_transition().await.unwrap();
        assert_eq!(state.error().map(|e| e.kind()), Some(ErrorKind::NetworkError));
        assert!(session.next_transition().await.is_none());
        assert!(session.start("again").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_model_is_seen_by_polling() {
        let mut session = AnalysisSession::new(ConceptAnalysisClient::new(PanickingModel));
        let mut observer = session.subscribe();
        session.start("concept").unwrap();
        settle().await;

        assert!(session.poll_transition());
        assert!(session.state().error().is_some());
        assert!(observer.borrow_and_update().error().is_some());
        assert!(!session.poll_transition());
    }
}

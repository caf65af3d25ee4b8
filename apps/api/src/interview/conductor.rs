//! Interview Conductor: owns one session's state machine and turn loop.
//!
//! Flow: start → (interviewer turn → think → provider call → candidate turn → settle)*
//!       → Scoring → evaluation delay → Evaluator → Complete.
//!
//! The turn loop runs on its own task. Every mutation it makes is tagged with
//! the session generation it was started for; `reset` and `start` bump the
//! generation, so anything the old loop produces afterwards is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::answer_client::{answer_text, AnswerProvider};
use crate::errors::InterviewError;
use crate::interview::evaluator::Evaluator;
use crate::interview::models::{
    EvaluationResult, InterviewEvent, SessionSnapshot, SessionStatus, Turn,
};

const EVENT_CAPACITY: usize = 64;

/// Fixed pauses between steps. They pace the conversation for observers only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub think: Duration,
    pub settle: Duration,
    pub evaluation: Duration,
}

impl Pacing {
    pub fn reference() -> Self {
        Self {
            think: Duration::from_secs(1),
            settle: Duration::from_secs(2),
            evaluation: Duration::from_secs(2),
        }
    }

    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            think: Duration::ZERO,
            settle: Duration::ZERO,
            evaluation: Duration::ZERO,
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::reference()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Session state
// ────────────────────────────────────────────────────────────────────────────

struct SessionState {
    generation: u64,
    questions: Vec<String>,
    turn_index: usize,
    status: SessionStatus,
    transcript: Vec<Turn>,
    result: Option<EvaluationResult>,
    cancel: CancellationToken,
}

impl SessionState {
    fn new() -> Self {
        Self {
            generation: 0,
            questions: Vec::new(),
            turn_index: 0,
            status: SessionStatus::Idle,
            transcript: Vec::new(),
            result: None,
            cancel: CancellationToken::new(),
        }
    }

    fn is_pristine(&self) -> bool {
        self.status == SessionStatus::Idle
            && self.questions.is_empty()
            && self.transcript.is_empty()
            && self.result.is_none()
    }

    fn clear(&mut self) {
        self.cancel.cancel();
        self.generation += 1;
        self.questions.clear();
        self.turn_index = 0;
        self.transcript.clear();
        self.result = None;
        self.status = SessionStatus::Idle;
    }

    fn append(&mut self, turn: Turn, events: &broadcast::Sender<InterviewEvent>) {
        let index = self.transcript.len();
        self.transcript.push(turn.clone());
        let _ = events.send(InterviewEvent::TurnAppended {
            generation: self.generation,
            index,
            turn,
        });
    }

    fn transition(&mut self, status: SessionStatus, events: &broadcast::Sender<InterviewEvent>) {
        self.status = status;
        let _ = events.send(InterviewEvent::StatusChanged {
            generation: self.generation,
            status,
            current_turn_index: self.turn_index,
        });
    }

    fn finish(
        &mut self,
        status: SessionStatus,
        result: EvaluationResult,
        events: &broadcast::Sender<InterviewEvent>,
    ) {
        self.result = Some(result.clone());
        self.transition(status, events);
        let _ = events.send(InterviewEvent::Completed {
            generation: self.generation,
            status,
            result,
        });
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Conductor
// ────────────────────────────────────────────────────────────────────────────

struct Shared {
    session_id: Uuid,
    state: Mutex<SessionState>,
    task: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<InterviewEvent>,
    provider: Arc<dyn AnswerProvider>,
    evaluator: Arc<dyn Evaluator>,
    pacing: Pacing,
}

/// Drives one interview session. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct Conductor {
    shared: Arc<Shared>,
}

impl Conductor {
    pub fn new(
        session_id: Uuid,
        provider: Arc<dyn AnswerProvider>,
        evaluator: Arc<dyn Evaluator>,
        pacing: Pacing,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                session_id,
                state: Mutex::new(SessionState::new()),
                task: Mutex::new(None),
                events,
                provider,
                evaluator,
                pacing,
            }),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.shared.session_id
    }

    /// Starts a new run, discarding any previous transcript and result.
    /// Returns the generation identifying this run.
    pub fn start(&self, questions: Vec<String>) -> Result<u64, InterviewError> {
        if questions.is_empty() {
            return Err(InterviewError::EmptyQuestionList);
        }

        let (generation, cancel, question_count) = {
            let mut state = self.lock_state();
            if !state.status.can_start() {
                return Err(InterviewError::InvalidState {
                    status: state.status,
                });
            }

            state.clear();
            state.questions = questions;
            state.cancel = CancellationToken::new();
            state.transition(SessionStatus::Running, &self.shared.events);
            (state.generation, state.cancel.clone(), state.questions.len())
        };

        info!(
            "Interview {} started (generation {generation}, {question_count} questions)",
            self.shared.session_id
        );

        let conductor = self.clone();
        let handle = tokio::spawn(async move { conductor.run_session(generation, cancel).await });
        *self.lock_task() = Some(handle);

        Ok(generation)
    }

    /// Returns the session to `Idle`. Any in-flight turn loop stops at its
    /// next suspension point and its results are dropped.
    pub fn reset(&self) {
        let mut state = self.lock_state();
        if state.is_pristine() {
            return;
        }

        let previous = state.status;
        state.clear();
        let _ = self.shared.events.send(InterviewEvent::Reset {
            generation: state.generation,
        });
        info!(
            "Interview {} reset from {previous} (generation {})",
            self.shared.session_id, state.generation
        );
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock_state();
        SessionSnapshot {
            session_id: self.shared.session_id,
            generation: state.generation,
            status: state.status,
            current_turn_index: state.turn_index,
            question_count: state.questions.len(),
            transcript: state.transcript.clone(),
            result: state.result.clone(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InterviewEvent> {
        self.shared.events.subscribe()
    }

    /// Subscription that never silently drops events. When the receiver falls
    /// more than the channel capacity behind, the missed events are replaced
    /// by one `Resync` carrying the current snapshot.
    pub fn event_stream(&self) -> impl Stream<Item = InterviewEvent> + Send + 'static {
        let conductor = self.clone();
        BroadcastStream::new(self.subscribe()).map(move |item| match item {
            Ok(event) => event,
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                warn!(
                    "Interview {} subscriber lagged by {missed} event(s), sending snapshot",
                    conductor.shared.session_id
                );
                let snapshot = conductor.snapshot();
                InterviewEvent::Resync {
                    generation: snapshot.generation,
                    missed,
                    snapshot,
                }
            }
        })
    }

    /// Waits for the most recently started turn loop to exit.
    pub async fn wait(&self) {
        let handle = self.lock_task().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(
                    "Interview {} task ended abnormally: {e}",
                    self.shared.session_id
                );
            }
        }
    }

    // ── turn loop ───────────────────────────────────────────────────────────

    async fn run_session(self, generation: u64, cancel: CancellationToken) {
        let Some(questions) = self.with_session(generation, |state, _| state.questions.clone())
        else {
            return;
        };

        for (index, question) in questions.iter().enumerate() {
            let asked = self.with_session(generation, |state, events| {
                state.append(Turn::interviewer(question.as_str()), events)
            });
            if asked.is_none() || !self.pause(self.shared.pacing.think, &cancel).await {
                return;
            }

            debug!(
                "Interview {} asking question {}/{}",
                self.shared.session_id,
                index + 1,
                questions.len()
            );

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Interview {} cancelled while awaiting an answer", self.shared.session_id);
                    return;
                }
                outcome = self.shared.provider.answer(index as u64 + 1, question) => outcome,
            };

            if let Err(e) = &outcome {
                warn!(
                    "Answer provider failed for question {} of interview {}: {e}",
                    index + 1,
                    self.shared.session_id
                );
            }

            let answered = self.with_session(generation, |state, events| {
                state.append(Turn::candidate(answer_text(&outcome)), events)
            });
            if answered.is_none() {
                debug!(
                    "Discarding stale answer for interview {}",
                    self.shared.session_id
                );
                return;
            }

            if !self.pause(self.shared.pacing.settle, &cancel).await {
                return;
            }

            let advanced = self.with_session(generation, |state, events| {
                state.turn_index += 1;
                if state.turn_index == state.questions.len() {
                    state.transition(SessionStatus::Scoring, events);
                }
            });
            if advanced.is_none() {
                return;
            }
        }

        self.score(generation, &cancel).await;
    }

    async fn score(&self, generation: u64, cancel: &CancellationToken) {
        if !self.pause(self.shared.pacing.evaluation, cancel).await {
            return;
        }

        let Some(transcript) = self.with_session(generation, |state, _| state.transcript.clone())
        else {
            return;
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            outcome = self.shared.evaluator.evaluate(&transcript) => outcome,
        };

        let session_id = self.shared.session_id;
        self.with_session(generation, |state, events| match outcome {
            Ok(result) => {
                info!(
                    "Interview {session_id} complete: {:?} ({}/100)",
                    result.decision, result.score
                );
                state.finish(SessionStatus::Complete, result, events);
            }
            Err(e) => {
                warn!("Interview {session_id} failed during evaluation: {e}");
                state.finish(
                    SessionStatus::Failed,
                    EvaluationResult::aborted(&e.to_string()),
                    events,
                );
            }
        });
    }

    /// Sleeps for `delay` unless cancelled first. Returns false on cancellation.
    async fn pause(&self, delay: Duration, cancel: &CancellationToken) -> bool {
        if delay.is_zero() {
            tokio::task::yield_now().await;
            return !cancel.is_cancelled();
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Runs `f` against the session only if it still belongs to `generation`.
    fn with_session<T>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut SessionState, &broadcast::Sender<InterviewEvent>) -> T,
    ) -> Option<T> {
        let mut state = self.lock_state();
        if state.generation != generation {
            return None;
        }
        Some(f(&mut state, &self.shared.events))
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.shared
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::answer_client::{AnswerError, AnswerResponse, SENTINEL_ERROR_MESSAGE};
    use crate::interview::evaluator::{RandomEvaluator, SCORE_RANGE};
    use crate::interview::models::{Decision, Role};

    /// Answers every question with a fixed text, failing on selected question numbers.
    struct ScriptedProvider {
        answer: String,
        fail_on: HashSet<u64>,
        latency: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedProvider {
        fn answering(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                fail_on: HashSet::new(),
                latency: Duration::ZERO,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn failing_on(mut self, questions: &[u64]) -> Self {
            self.fail_on = questions.iter().copied().collect();
            self
        }

        fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }
    }

    #[async_trait]
    impl AnswerProvider for ScriptedProvider {
        async fn answer(
            &self,
            request_id: u64,
            _question: &str,
        ) -> Result<AnswerResponse, AnswerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on.contains(&request_id) {
                Err(AnswerError::Timeout)
            } else {
                Ok(AnswerResponse::from_text(self.answer.clone()))
            }
        }
    }

    /// Blocks each call until released, signalling when a call begins.
    struct GatedProvider {
        started: Notify,
        release: Notify,
        calls: AtomicUsize,
    }

    impl GatedProvider {
        fn new() -> Self {
            Self {
                started: Notify::new(),
                release: Notify::new(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AnswerProvider for GatedProvider {
        async fn answer(
            &self,
            _request_id: u64,
            question: &str,
        ) -> Result<AnswerResponse, AnswerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            self.release.notified().await;
            Ok(AnswerResponse::from_text(format!("answer to {question}")))
        }
    }

    struct BrokenEvaluator;

    #[async_trait]
    impl Evaluator for BrokenEvaluator {
        async fn evaluate(&self, _transcript: &[Turn]) -> Result<EvaluationResult, InterviewError> {
            Err(InterviewError::Evaluation("scoring engine offline".to_string()))
        }
    }

    fn conductor_with(provider: Arc<dyn AnswerProvider>, pacing: Pacing) -> Conductor {
        Conductor::new(
            Uuid::new_v4(),
            provider,
            Arc::new(RandomEvaluator::seeded(1)),
            pacing,
        )
    }

    fn questions(items: &[&str]) -> Vec<String> {
        items.iter().map(|q| q.to_string()).collect()
    }

    fn drain(events: &mut broadcast::Receiver<InterviewEvent>) -> Vec<InterviewEvent> {
        let mut collected = Vec::new();
        while let Ok(event) = events.try_recv() {
            collected.push(event);
        }
        collected
    }

    fn event_generation(event: &InterviewEvent) -> u64 {
        match event {
            InterviewEvent::TurnAppended { generation, .. }
            | InterviewEvent::StatusChanged { generation, .. }
            | InterviewEvent::Completed { generation, .. }
            | InterviewEvent::Reset { generation }
            | InterviewEvent::Resync { generation, .. } => *generation,
        }
    }

    fn contents(snapshot: &SessionSnapshot) -> Vec<(Role, String)> {
        snapshot
            .transcript
            .iter()
            .map(|t| (t.role, t.content.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_two_question_interview_completes() {
        let conductor = conductor_with(
            Arc::new(ScriptedProvider::answering("A")),
            Pacing::immediate(),
        );

        conductor.start(questions(&["Q1", "Q2"])).unwrap();
        conductor.wait().await;

        let snapshot = conductor.snapshot();
        assert_eq!(
            contents(&snapshot),
            vec![
                (Role::Interviewer, "Q1".to_string()),
                (Role::Candidate, "A".to_string()),
                (Role::Interviewer, "Q2".to_string()),
                (Role::Candidate, "A".to_string()),
            ]
        );
        assert_eq!(snapshot.status, SessionStatus::Complete);
        assert_eq!(snapshot.current_turn_index, 2);
        let result = snapshot.result.expect("result present after completion");
        assert!(SCORE_RANGE.contains(&result.score));
    }

    #[tokio::test]
    async fn test_every_answer_failing_still_completes() {
        let provider = ScriptedProvider::answering("A").failing_on(&[1, 2, 3]);
        let conductor = conductor_with(Arc::new(provider), Pacing::immediate());

        conductor.start(questions(&["Q1", "Q2", "Q3"])).unwrap();
        conductor.wait().await;

        let snapshot = conductor.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Complete);
        assert_eq!(snapshot.transcript.len(), 6);
        for turn in snapshot.transcript.iter().filter(|t| t.role == Role::Candidate) {
            assert_eq!(turn.content, SENTINEL_ERROR_MESSAGE);
        }
        assert!(snapshot.result.is_some());
    }

    #[tokio::test]
    async fn test_single_failure_only_affects_its_own_turn() {
        let provider = ScriptedProvider::answering("A").failing_on(&[2]);
        let conductor = conductor_with(Arc::new(provider), Pacing::immediate());

        conductor.start(questions(&["Q1", "Q2", "Q3"])).unwrap();
        conductor.wait().await;

        let answers: Vec<String> = conductor
            .snapshot()
            .transcript
            .into_iter()
            .filter(|t| t.role == Role::Candidate)
            .map(|t| t.content)
            .collect();
        assert_eq!(answers, vec!["A", SENTINEL_ERROR_MESSAGE, "A"]);
    }

    #[tokio::test]
    async fn test_transcript_interleaves_roles() {
        let conductor = conductor_with(
            Arc::new(ScriptedProvider::answering("A")),
            Pacing::immediate(),
        );

        conductor
            .start(questions(&["Q1", "Q2", "Q3", "Q4", "Q5"]))
            .unwrap();
        conductor.wait().await;

        let snapshot = conductor.snapshot();
        assert_eq!(snapshot.transcript.len(), 10);
        for (i, turn) in snapshot.transcript.iter().enumerate() {
            let expected = if i % 2 == 0 {
                Role::Interviewer
            } else {
                Role::Candidate
            };
            assert_eq!(turn.role, expected, "turn {i}");
        }
    }

    #[tokio::test]
    async fn test_events_arrive_in_issue_order() {
        let conductor = conductor_with(
            Arc::new(ScriptedProvider::answering("A")),
            Pacing::immediate(),
        );
        let mut events = conductor.subscribe();

        let generation = conductor.start(questions(&["Q1", "Q2"])).unwrap();
        conductor.wait().await;

        let events = drain(&mut events);
        assert!(events.iter().all(|e| event_generation(e) == generation));

        let appended: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                InterviewEvent::TurnAppended { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(appended, vec![0, 1, 2, 3]);

        let statuses: Vec<SessionStatus> = events
            .iter()
            .filter_map(|e| match e {
                InterviewEvent::StatusChanged { status, .. } => Some(*status),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                SessionStatus::Running,
                SessionStatus::Scoring,
                SessionStatus::Complete
            ]
        );
        assert!(matches!(
            events.last(),
            Some(InterviewEvent::Completed {
                status: SessionStatus::Complete,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_empty_question_list_rejected_without_mutation() {
        let conductor = conductor_with(
            Arc::new(ScriptedProvider::answering("A")),
            Pacing::immediate(),
        );

        let err = conductor.start(vec![]).unwrap_err();
        assert!(matches!(err, InterviewError::EmptyQuestionList));

        let snapshot = conductor.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Idle);
        assert_eq!(snapshot.generation, 0);
        assert!(snapshot.transcript.is_empty());
    }

    #[tokio::test]
    async fn test_start_while_running_is_rejected() {
        let provider = Arc::new(GatedProvider::new());
        let conductor = conductor_with(provider.clone(), Pacing::immediate());

        conductor.start(questions(&["Q1"])).unwrap();
        provider.started.notified().await;

        let err = conductor.start(questions(&["Other"])).unwrap_err();
        assert!(matches!(
            err,
            InterviewError::InvalidState {
                status: SessionStatus::Running
            }
        ));
        assert_eq!(conductor.snapshot().transcript[0].content, "Q1");

        conductor.reset();
        conductor.wait().await;
    }

    #[tokio::test]
    async fn test_result_absent_while_running() {
        let provider = Arc::new(GatedProvider::new());
        let conductor = conductor_with(provider.clone(), Pacing::immediate());

        conductor.start(questions(&["Q1", "Q2"])).unwrap();
        provider.started.notified().await;

        let snapshot = conductor.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Running);
        assert!(snapshot.result.is_none());
        // Question issued, answer pending.
        assert_eq!(snapshot.transcript.len(), 2 * snapshot.current_turn_index + 1);

        provider.release.notify_one();
        provider.started.notified().await;
        provider.release.notify_one();
        conductor.wait().await;

        let snapshot = conductor.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Complete);
        assert!(snapshot.result.is_some());
    }

    #[tokio::test]
    async fn test_reset_while_awaiting_answer_discards_response() {
        let provider = Arc::new(GatedProvider::new());
        let conductor = conductor_with(provider.clone(), Pacing::immediate());
        let mut events = conductor.subscribe();

        conductor.start(questions(&["Q1", "Q2"])).unwrap();
        provider.started.notified().await;

        conductor.reset();
        let after_reset = drain(&mut events);
        assert!(matches!(after_reset.last(), Some(InterviewEvent::Reset { .. })));

        provider.release.notify_one();
        conductor.wait().await;

        assert!(drain(&mut events).is_empty(), "no events after reset");
        let snapshot = conductor.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Idle);
        assert!(snapshot.transcript.is_empty());
        assert!(snapshot.result.is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let conductor = conductor_with(
            Arc::new(ScriptedProvider::answering("A")),
            Pacing::immediate(),
        );
        conductor.start(questions(&["Q1"])).unwrap();
        conductor.wait().await;
        let mut events = conductor.subscribe();

        conductor.reset();
        let once = conductor.snapshot();
        conductor.reset();
        let twice = conductor.snapshot();

        assert_eq!(drain(&mut events).len(), 1);
        assert_eq!(once.generation, twice.generation);
        assert_eq!(twice.status, SessionStatus::Idle);
        assert!(twice.transcript.is_empty());
        assert!(twice.result.is_none());
    }

    #[tokio::test]
    async fn test_stale_generation_cannot_mutate_session() {
        let conductor = conductor_with(
            Arc::new(ScriptedProvider::answering("A")),
            Pacing::immediate(),
        );
        let first = conductor.start(questions(&["Q1"])).unwrap();
        conductor.wait().await;
        let second = conductor.start(questions(&["Q2"])).unwrap();
        conductor.wait().await;
        assert!(second > first);

        let touched = conductor.with_session(first, |state, events| {
            state.append(Turn::candidate("stale"), events)
        });
        assert!(touched.is_none());
        assert!(conductor
            .snapshot()
            .transcript
            .iter()
            .all(|t| t.content != "stale"));
    }

    #[tokio::test]
    async fn test_restart_after_completion_clears_previous_run() {
        let conductor = conductor_with(
            Arc::new(ScriptedProvider::answering("A")),
            Pacing::immediate(),
        );
        conductor.start(questions(&["Q1", "Q2"])).unwrap();
        conductor.wait().await;

        conductor.start(questions(&["Only"])).unwrap();
        conductor.wait().await;

        let snapshot = conductor.snapshot();
        assert_eq!(snapshot.question_count, 1);
        assert_eq!(snapshot.transcript.len(), 2);
        assert_eq!(snapshot.transcript[0].content, "Only");
        assert_eq!(snapshot.status, SessionStatus::Complete);
    }

    #[tokio::test]
    async fn test_evaluator_error_fails_session() {
        let conductor = Conductor::new(
            Uuid::new_v4(),
            Arc::new(ScriptedProvider::answering("A")),
            Arc::new(BrokenEvaluator),
            Pacing::immediate(),
        );

        conductor.start(questions(&["Q1"])).unwrap();
        conductor.wait().await;

        let snapshot = conductor.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Failed);
        let result = snapshot.result.expect("failed sessions carry a result");
        assert!(result.recommendation.contains("scoring engine offline"));
        assert_eq!(result.score, *SCORE_RANGE.start());
        assert_eq!(result.decision, Decision::Fail);
    }

    #[tokio::test]
    async fn test_provider_calls_never_overlap() {
        let provider =
            Arc::new(ScriptedProvider::answering("A").with_latency(Duration::from_millis(5)));
        let conductor = conductor_with(provider.clone(), Pacing::immediate());

        conductor.start(questions(&["Q1", "Q2", "Q3"])).unwrap();
        conductor.wait().await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reference_pacing_timeline() {
        let conductor = conductor_with(
            Arc::new(ScriptedProvider::answering("A")),
            Pacing::reference(),
        );
        let started = tokio::time::Instant::now();

        conductor.start(questions(&["Q1", "Q2"])).unwrap();
        conductor.wait().await;

        // Two turns of think (1s) + settle (2s), then a 2s evaluation delay.
        assert!(started.elapsed() >= Duration::from_secs(8));
        assert_eq!(conductor.snapshot().status, SessionStatus::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_think_delay_stops_before_provider_call() {
        let provider = Arc::new(ScriptedProvider::answering("A"));
        let conductor = conductor_with(provider.clone(), Pacing::reference());

        conductor.start(questions(&["Q1"])).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        conductor.reset();
        conductor.wait().await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(conductor.snapshot().status, SessionStatus::Idle);
    }

    #[tokio::test]
    async fn test_lagging_stream_resyncs_instead_of_dropping_turns() {
        let conductor = conductor_with(
            Arc::new(ScriptedProvider::answering("A")),
            Pacing::immediate(),
        );
        let mut stream = Box::pin(conductor.event_stream());

        // 40 questions produce well over EVENT_CAPACITY events before the
        // stream is polled.
        let asked: Vec<String> = (1..=40).map(|n| format!("Q{n}")).collect();
        conductor.start(asked).unwrap();
        conductor.wait().await;

        let mut covered = HashSet::new();
        let mut resynced = false;
        while let Some(event) = stream.next().await {
            match event {
                InterviewEvent::TurnAppended { index, .. } => {
                    covered.insert(index);
                }
                InterviewEvent::Resync {
                    missed, snapshot, ..
                } => {
                    assert!(missed > 0);
                    assert_eq!(snapshot, conductor.snapshot());
                    covered.extend(0..snapshot.transcript.len());
                    resynced = true;
                }
                InterviewEvent::Completed { .. } => break,
                _ => {}
            }
        }

        assert!(resynced, "subscriber should have lagged");
        assert_eq!(covered.len(), 80);
        assert_eq!(covered, (0..80).collect::<HashSet<_>>());
    }

    #[tokio::test]
    async fn test_event_stream_passes_events_through_when_keeping_up() {
        let conductor = conductor_with(
            Arc::new(ScriptedProvider::answering("A")),
            Pacing::immediate(),
        );
        let mut stream = Box::pin(conductor.event_stream());

        conductor.start(questions(&["Q1"])).unwrap();
        conductor.wait().await;

        let mut seen = Vec::new();
        while let Some(event) = stream.next().await {
            let done = matches!(event, InterviewEvent::Completed { .. });
            seen.push(event);
            if done {
                break;
            }
        }

        assert!(!seen
            .iter()
            .any(|e| matches!(e, InterviewEvent::Resync { .. })));
        let turns = seen
            .iter()
            .filter(|e| matches!(e, InterviewEvent::TurnAppended { .. }))
            .count();
        assert_eq!(turns, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_scoring_discards_pending_result() {
        let conductor = conductor_with(
            Arc::new(ScriptedProvider::answering("A")),
            Pacing::reference(),
        );

        conductor.start(questions(&["Q1"])).unwrap();
        // Think (1s) and settle (2s) are over; the 2s evaluation delay is not.
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(conductor.snapshot().status, SessionStatus::Scoring);

        let mut events = conductor.subscribe();
        conductor.reset();
        let after_reset = drain(&mut events);
        assert_eq!(after_reset.len(), 1);
        assert!(matches!(after_reset[0], InterviewEvent::Reset { .. }));

        tokio::time::sleep(Duration::from_secs(5)).await;
        conductor.wait().await;

        assert!(drain(&mut events).is_empty(), "no result after reset");
        let snapshot = conductor.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Idle);
        assert!(snapshot.result.is_none());
        assert!(snapshot.transcript.is_empty());
    }

    #[tokio::test]
    async fn test_restart_after_reset_ignores_answer_from_previous_run() {
        let provider = Arc::new(GatedProvider::new());
        let conductor = conductor_with(provider.clone(), Pacing::immediate());

        conductor.start(questions(&["Q1"])).unwrap();
        provider.started.notified().await;
        conductor.reset();

        let mut events = conductor.subscribe();
        let second = conductor.start(questions(&["Q2"])).unwrap();
        provider.started.notified().await;
        provider.release.notify_one();
        conductor.wait().await;

        let snapshot = conductor.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Complete);
        assert_eq!(snapshot.generation, second);
        assert_eq!(
            contents(&snapshot),
            vec![
                (Role::Interviewer, "Q2".to_string()),
                (Role::Candidate, "answer to Q2".to_string()),
            ]
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        let events = drain(&mut events);
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| event_generation(e) == second));
    }
}

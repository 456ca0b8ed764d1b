//! Task router: decides which handler owns a turn.
//!
//! Routing is sticky. Once a session is inside a multi-turn task every turn
//! goes back to that task's handler, exit phrases included, so only the
//! handler can leave it. Idle sessions are classified by the completion
//! service with a fixed instruction; any failure falls back to the generic
//! task.

use std::sync::Arc;
use std::time::Duration;

use eureka_core::config::RouterConfig;
use eureka_core::types::{ActiveTask, SessionContext, TaskKind};
use regex::Regex;
use tracing::{debug, warn};

use crate::completion::{complete_bounded, CompletionRequest, CompletionService};
use crate::error::ChatError;

/// Fixed instruction sent to the classifier.
pub const ROUTER_INSTRUCTION: &str = "\
You are the router of an IT support assistant for a banking organisation.
Decide whether the user's message must be handled by the incident analysis agent
or by the generic chat agent.

1. If the message asks for the analysis or explanation of an incident, answer: incident_analysis
   Examples:
   - \"analyse moi l'incident INC2309845\"
   - \"Explique moi l'incident INC2309846\"
   - \"What happened with incident INC2309847?\"

2. For every other question, greeting, request for information or small talk, answer: generic
   Examples:
   - \"Bonjour, comment allez-vous ?\"
   - \"Explique moi le fonctionnement de la voiture électrique\"
   - \"How do I reset my password?\"

Your answer must be exactly one word: incident_analysis or generic.";

// =============================================================================
// ExitDetector
// =============================================================================

/// Matches a closed set of phrases that end a conversation.
#[derive(Clone, Debug)]
pub struct ExitDetector {
    pattern: Option<Regex>,
}

impl ExitDetector {
    /// Compile the phrase set into one case-insensitive, word-bounded regex.
    pub fn new(phrases: &[String]) -> Result<Self, ChatError> {
        let alternatives: Vec<String> = phrases
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| regex::escape(&p.to_lowercase()).replace(' ', r"\s+"))
            .collect();

        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }

        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))
            .map_err(|e| ChatError::Config(format!("invalid exit phrase: {}", e)))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    pub fn matches(&self, utterance: &str) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|re| re.is_match(utterance))
    }
}

// =============================================================================
// IncidentIdExtractor
// =============================================================================

/// Minimum length of a bare number accepted by [`IncidentIdExtractor::extract_loose`].
const MIN_BARE_DIGITS: usize = 5;

/// Recognises incident identifiers: a fixed prefix followed by digits.
///
/// Identifiers are normalised to the upper-cased prefix immediately followed
/// by the digits (`inc-2309845` -> `INC2309845`).
#[derive(Clone, Debug)]
pub struct IncidentIdExtractor {
    prefix: String,
    prefixed: Regex,
    bare: Regex,
}

impl IncidentIdExtractor {
    pub fn new(prefix: &str) -> Result<Self, ChatError> {
        let prefix = prefix.trim().to_uppercase();
        if prefix.is_empty() {
            return Err(ChatError::Config(
                "incident prefix must not be empty".to_string(),
            ));
        }
        let prefixed = Regex::new(&format!(r"(?i)\b{}[\s\-_#]?(\d+)\b", regex::escape(&prefix)))
            .map_err(|e| ChatError::Config(format!("invalid incident prefix: {}", e)))?;
        let bare = Regex::new(&format!(r"\b(\d{{{},}})\b", MIN_BARE_DIGITS))
            .map_err(|e| ChatError::Config(e.to_string()))?;
        Ok(Self {
            prefix,
            prefixed,
            bare,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// First prefixed identifier in `text`.
    pub fn extract(&self, text: &str) -> Option<String> {
        self.prefixed
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|digits| format!("{}{}", self.prefix, digits.as_str()))
    }

    /// Like [`extract`](Self::extract), but also accepts a bare number of at
    /// least five digits and prefixes it.
    pub fn extract_loose(&self, text: &str) -> Option<String> {
        self.extract(text).or_else(|| {
            self.bare
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|digits| format!("{}{}", self.prefix, digits.as_str()))
        })
    }
}

// =============================================================================
// TaskRouter
// =============================================================================

/// Result of routing one utterance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteDecision {
    pub task: TaskKind,
    /// Identifier found in the utterance, only when the context has none bound.
    pub staged_incident_id: Option<String>,
    /// The utterance contains an exit phrase; the handler terminates.
    pub exit_requested: bool,
}

impl RouteDecision {
    fn fallback(exit_requested: bool) -> Self {
        Self {
            task: TaskKind::FALLBACK,
            staged_incident_id: None,
            exit_requested,
        }
    }
}

/// Classifies utterances into a [`TaskKind`].
pub struct TaskRouter {
    classifier: Arc<dyn CompletionService>,
    exit_detector: ExitDetector,
    extractor: IncidentIdExtractor,
    timeout: Duration,
}

impl TaskRouter {
    pub fn new(
        config: &RouterConfig,
        classifier: Arc<dyn CompletionService>,
        timeout: Duration,
    ) -> Result<Self, ChatError> {
        Ok(Self {
            classifier,
            exit_detector: ExitDetector::new(&config.exit_phrases)?,
            extractor: IncidentIdExtractor::new(&config.incident_prefix)?,
            timeout,
        })
    }

    pub fn extractor(&self) -> &IncidentIdExtractor {
        &self.extractor
    }

    /// Decide which task owns `utterance`, without touching the context.
    pub async fn classify(&self, utterance: &str, context: &SessionContext) -> RouteDecision {
        let exit_requested = self.exit_detector.matches(utterance);

        if let Some(task) = sticky_task(context.active_task()) {
            let staged_incident_id = match context.incident_id() {
                Some(_) => None,
                None => self.extractor.extract(utterance),
            };
            debug!(task = %task, exit_requested, "Sticky route");
            return RouteDecision {
                task,
                staged_incident_id,
                exit_requested,
            };
        }

        if utterance.trim().is_empty() {
            debug!("Blank utterance, using fallback task");
            return RouteDecision::fallback(false);
        }

        // Idle turns are always classified. An exit phrase only matters when
        // the turn lands on the generic handler, which then closes.
        let task = self.classify_with_service(utterance).await;
        match task {
            TaskKind::IncidentAnalysis => RouteDecision {
                task,
                staged_incident_id: self.extractor.extract(utterance),
                exit_requested: false,
            },
            TaskKind::Generic => RouteDecision {
                task,
                staged_incident_id: None,
                exit_requested,
            },
        }
    }

    /// Classify, then stage the decision into the context.
    ///
    /// An idle session entering incident analysis starts a new conversation
    /// with the staged identifier. An active conversation only gains an
    /// identifier if it has none bound yet.
    pub async fn route(&self, utterance: &str, context: &mut SessionContext) -> RouteDecision {
        let decision = self.classify(utterance, context).await;

        if decision.task == TaskKind::IncidentAnalysis && !decision.exit_requested {
            match context.active_task() {
                ActiveTask::None => context.begin_incident(decision.staged_incident_id.clone()),
                ActiveTask::IncidentAnalysis => {
                    if let Some(id) = &decision.staged_incident_id {
                        context.bind_incident_id(id);
                    }
                }
            }
        }

        decision
    }

    async fn classify_with_service(&self, utterance: &str) -> TaskKind {
        let request = CompletionRequest::single(ROUTER_INSTRUCTION, utterance);
        match complete_bounded(self.classifier.as_ref(), &request, self.timeout).await {
            Ok(output) => match parse_decision(&output) {
                Some(task) => {
                    debug!(task = %task, "Classified utterance");
                    task
                }
                None => {
                    warn!(output = %output, "Unrecognised classifier output, using fallback task");
                    TaskKind::FALLBACK
                }
            },
            Err(e) => {
                warn!(error = %e, "Classification failed, using fallback task");
                TaskKind::FALLBACK
            }
        }
    }
}

fn sticky_task(active: ActiveTask) -> Option<TaskKind> {
    match active {
        ActiveTask::None => None,
        ActiveTask::IncidentAnalysis => Some(TaskKind::IncidentAnalysis),
    }
}

/// Map the classifier's one-word answer to a task.
///
/// Tolerates quotes, punctuation and casing around the token.
pub fn parse_decision(output: &str) -> Option<TaskKind> {
    let normalized = output
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
        .to_lowercase();

    if normalized.contains("incident") {
        Some(TaskKind::IncidentAnalysis)
    } else if normalized.contains("generic") {
        Some(TaskKind::Generic)
    } else {
        None
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;
    use async_trait::async_trait;
    use eureka_core::types::{SessionToken, Timestamp};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Classifier that always answers the same thing and counts calls.
    struct StubClassifier {
        answer: Result<&'static str, &'static str>,
        calls: AtomicUsize,
    }

    impl StubClassifier {
        fn answering(answer: &'static str) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(answer),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                answer: Err("service down"),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CompletionService for StubClassifier {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
            assert_eq!(request.instruction, ROUTER_INSTRUCTION);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
                .map(str::to_string)
                .map_err(|e| CompletionError::Failed(e.to_string()))
        }
    }

    fn make_router(classifier: Arc<StubClassifier>) -> TaskRouter {
        TaskRouter::new(&RouterConfig::default(), classifier, Duration::from_secs(5)).unwrap()
    }

    fn fresh_context() -> SessionContext {
        SessionContext::new(SessionToken::new("t"), Timestamp(0))
    }

    fn incident_context(id: Option<&str>) -> SessionContext {
        let mut ctx = fresh_context();
        ctx.begin_incident(id.map(str::to_string));
        ctx.incident_mut().unwrap().turn_count = 1;
        ctx
    }

    // ---- ExitDetector ----

    #[test]
    fn test_exit_detector_matches_case_insensitive() {
        let det = ExitDetector::new(&RouterConfig::default().exit_phrases).unwrap();
        assert!(det.matches("STOP"));
        assert!(det.matches("ok thanks a lot"));
        assert!(det.matches("Merci !"));
        assert!(det.matches("thank   you"));
        assert!(det.matches("au revoir"));
        assert!(det.matches("c'est terminé"));
    }

    #[test]
    fn test_exit_detector_respects_word_boundaries() {
        let det = ExitDetector::new(&RouterConfig::default().exit_phrases).unwrap();
        assert!(!det.matches("the backend crashed"));
        assert!(!det.matches("unstoppable errors"));
        assert!(!det.matches("analyse incident INC2309845"));
    }

    #[test]
    fn test_exit_detector_empty_set_never_matches() {
        let det = ExitDetector::new(&[" ".to_string()]).unwrap();
        assert!(!det.matches("stop"));
    }

    // ---- IncidentIdExtractor ----

    #[test]
    fn test_extract_prefixed_identifier() {
        let ex = IncidentIdExtractor::new("INC").unwrap();
        assert_eq!(
            ex.extract("analyse incident INC2309845").as_deref(),
            Some("INC2309845")
        );
        assert_eq!(ex.extract("look at inc-42 please").as_deref(), Some("INC42"));
        assert_eq!(ex.extract("INC 77").as_deref(), Some("INC77"));
    }

    #[test]
    fn test_extract_first_identifier_wins() {
        let ex = IncidentIdExtractor::new("INC").unwrap();
        assert_eq!(ex.extract("INC1 and INC2").as_deref(), Some("INC1"));
    }

    #[test]
    fn test_extract_no_match() {
        let ex = IncidentIdExtractor::new("INC").unwrap();
        assert!(ex.extract("analyse the incident please").is_none());
        assert!(ex.extract("INCIDENT").is_none());
        assert!(ex.extract("2309845").is_none());
    }

    #[test]
    fn test_extract_loose_accepts_bare_number() {
        let ex = IncidentIdExtractor::new("INC").unwrap();
        assert_eq!(ex.extract_loose("ticket 2309845").as_deref(), Some("INC2309845"));
        assert!(ex.extract_loose("room 42").is_none());
    }

    #[test]
    fn test_extractor_custom_prefix() {
        let ex = IncidentIdExtractor::new("chg").unwrap();
        assert_eq!(ex.prefix(), "CHG");
        assert_eq!(ex.extract("change CHG001").as_deref(), Some("CHG001"));
        assert!(IncidentIdExtractor::new("").is_err());
    }

    // ---- parse_decision ----

    #[test]
    fn test_parse_decision_variants() {
        assert_eq!(parse_decision("incident_analysis"), Some(TaskKind::IncidentAnalysis));
        assert_eq!(parse_decision("\"Incident_Analysis\".\n"), Some(TaskKind::IncidentAnalysis));
        assert_eq!(parse_decision("generic"), Some(TaskKind::Generic));
        assert_eq!(parse_decision("generic_chatbot"), Some(TaskKind::Generic));
        assert_eq!(parse_decision("banana"), None);
        assert_eq!(parse_decision(""), None);
    }

    // ---- Idle classification ----

    #[tokio::test]
    async fn test_idle_incident_utterance_is_classified() {
        let classifier = StubClassifier::answering("incident_analysis");
        let router = make_router(Arc::clone(&classifier));
        let decision = router
            .classify("analyse incident INC2309845", &fresh_context())
            .await;
        assert_eq!(decision.task, TaskKind::IncidentAnalysis);
        assert_eq!(decision.staged_incident_id.as_deref(), Some("INC2309845"));
        assert!(!decision.exit_requested);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_idle_generic_utterance_stages_nothing() {
        let router = make_router(StubClassifier::answering("generic"));
        let decision = router.classify("bonjour INC5", &fresh_context()).await;
        assert_eq!(decision.task, TaskKind::Generic);
        assert!(decision.staged_incident_id.is_none());
    }

    #[tokio::test]
    async fn test_classification_failure_falls_back() {
        let router = make_router(StubClassifier::failing());
        let decision = router.classify("analyse INC1", &fresh_context()).await;
        assert_eq!(decision.task, TaskKind::Generic);
    }

    #[tokio::test]
    async fn test_unknown_classifier_output_falls_back() {
        let router = make_router(StubClassifier::answering("maybe?"));
        let decision = router.classify("hmm", &fresh_context()).await;
        assert_eq!(decision.task, TaskKind::Generic);
    }

    #[tokio::test]
    async fn test_blank_utterance_skips_classifier() {
        let classifier = StubClassifier::answering("incident_analysis");
        let router = make_router(Arc::clone(&classifier));
        let decision = router.classify("   ", &fresh_context()).await;
        assert_eq!(decision.task, TaskKind::Generic);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_idle_utterance_with_exit_word_is_still_classified() {
        let classifier = StubClassifier::answering("incident_analysis");
        let router = make_router(Arc::clone(&classifier));
        for utterance in [
            "analyse moi l'incident INC2309845 merci",
            "Explain incident INC2309845, payments stop at midnight",
        ] {
            let decision = router.classify(utterance, &fresh_context()).await;
            assert_eq!(decision.task, TaskKind::IncidentAnalysis, "{:?}", utterance);
            assert_eq!(decision.staged_incident_id.as_deref(), Some("INC2309845"));
            assert!(!decision.exit_requested);
        }
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_idle_generic_exit_phrase_requests_closing() {
        let classifier = StubClassifier::answering("generic");
        let router = make_router(Arc::clone(&classifier));
        let decision = router.classify("merci", &fresh_context()).await;
        assert_eq!(decision.task, TaskKind::Generic);
        assert!(decision.exit_requested);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_idle_exit_phrase_with_failed_classification_closes() {
        let router = make_router(StubClassifier::failing());
        let decision = router.classify("stop", &fresh_context()).await;
        assert_eq!(decision.task, TaskKind::Generic);
        assert!(decision.exit_requested);
    }

    // ---- Sticky routing ----

    #[tokio::test]
    async fn test_sticky_routing_ignores_content() {
        let classifier = StubClassifier::answering("generic");
        let router = make_router(Arc::clone(&classifier));
        let ctx = incident_context(Some("INC1"));
        for utterance in ["tell me a joke", "", "bonjour", "INC999 instead"] {
            let decision = router.classify(utterance, &ctx).await;
            assert_eq!(decision.task, TaskKind::IncidentAnalysis, "{:?}", utterance);
            assert!(!decision.exit_requested);
        }
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sticky_routing_flags_exit() {
        let router = make_router(StubClassifier::answering("generic"));
        let decision = router.classify("ok merci", &incident_context(Some("INC1"))).await;
        assert_eq!(decision.task, TaskKind::IncidentAnalysis);
        assert!(decision.exit_requested);
    }

    // ---- Staging side effect ----

    #[tokio::test]
    async fn test_route_begins_incident_with_staged_id() {
        let router = make_router(StubClassifier::answering("incident_analysis"));
        let mut ctx = fresh_context();
        router.route("analyse incident INC2309845", &mut ctx).await;
        assert_eq!(ctx.active_task(), ActiveTask::IncidentAnalysis);
        assert_eq!(ctx.incident_id(), Some("INC2309845"));
        assert_eq!(ctx.turn_count(), 0);
    }

    #[tokio::test]
    async fn test_route_without_identifier_leaves_field_unset() {
        let router = make_router(StubClassifier::answering("incident_analysis"));
        let mut ctx = fresh_context();
        router.route("analyse an incident please", &mut ctx).await;
        assert_eq!(ctx.active_task(), ActiveTask::IncidentAnalysis);
        assert!(ctx.incident_id().is_none());
    }

    #[tokio::test]
    async fn test_route_never_overwrites_bound_identifier() {
        let router = make_router(StubClassifier::answering("incident_analysis"));
        let mut ctx = incident_context(Some("INC1"));
        let decision = router.route("what about INC2", &mut ctx).await;
        assert!(decision.staged_incident_id.is_none());
        assert_eq!(ctx.incident_id(), Some("INC1"));
    }

    #[tokio::test]
    async fn test_route_binds_identifier_when_unbound() {
        let router = make_router(StubClassifier::answering("incident_analysis"));
        let mut ctx = incident_context(None);
        router.route("it is INC77", &mut ctx).await;
        assert_eq!(ctx.incident_id(), Some("INC77"));
    }

    #[tokio::test]
    async fn test_route_generic_leaves_context_idle() {
        let router = make_router(StubClassifier::answering("generic"));
        let mut ctx = fresh_context();
        router.route("bonjour", &mut ctx).await;
        assert_eq!(ctx.active_task(), ActiveTask::None);
    }

    #[tokio::test]
    async fn test_route_incident_request_ending_with_thanks_begins_incident() {
        let router = make_router(StubClassifier::answering("incident_analysis"));
        let mut ctx = fresh_context();
        let decision = router
            .route("analyse moi l'incident INC2309845 merci", &mut ctx)
            .await;
        assert!(!decision.exit_requested);
        assert_eq!(ctx.active_task(), ActiveTask::IncidentAnalysis);
        assert_eq!(ctx.incident_id(), Some("INC2309845"));
    }
}

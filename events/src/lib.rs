//! Event system infrastructure for the sales call pipeline.
//!
//! The ingestion orchestrator and the status reconciler describe what they did
//! as a sequence of domain events instead of writing logs and audit rows inline.
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum representing every pipeline decision and transition
//! - **EventHandler**: Trait for implementing event handlers (log rendering, audit persistence)
//! - **EventPublisher**: Publishes events to registered handlers
//! - **EventTrail**: Timed record of the events produced while handling one request
//!
//! This crate has no dependencies on internal crates (entity, domain, etc.),
//! avoiding circular dependencies. Statuses and call types are carried as their
//! string labels and request payloads as JSON values.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// A type alias that represents any Entity's internal id field data type.
/// This matches the definition in the entity crate to maintain compatibility.
pub type Id = Uuid;

/// Decisions and transitions made by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A provider event entered the orchestrator.
    CallReceived {
        external_call_id: String,
        /// `webhook` or `sync`
        source: String,
        transcript_chars: usize,
    },
    /// The rep matcher ran against the call's participants.
    MatchAttempted {
        external_call_id: String,
        matched: bool,
        rep_id: Option<Id>,
        /// Number of active reps found among the participants
        candidates: usize,
    },
    /// No active rep attended; the call was stored for manual review.
    CallUnmatched {
        external_call_id: String,
        participant_emails: Vec<String>,
    },
    /// The matched rep does not own the call's team; nothing was imported.
    TeamFiltered {
        external_call_id: String,
        rep_id: Id,
        team: Option<String>,
    },
    /// The transcript is too short to classify; the call waits in `pending`.
    TranscriptDeferred {
        external_call_id: String,
        call_id: Id,
        transcript_chars: usize,
        minimum: usize,
    },
    /// The classification gate produced a verdict.
    ClassificationCompleted {
        external_call_id: String,
        call_id: Id,
        is_sales_call: bool,
        call_type: String,
        confidence: f64,
        /// True when the classifier failed and the default sales verdict was used
        fell_open: bool,
    },
    /// A call's status column changed.
    StatusTransitioned {
        external_call_id: String,
        call_id: Id,
        from: String,
        to: String,
    },
    /// An analysis row was written for a call.
    AnalysisStored {
        call_id: Id,
        analysis_id: Id,
        is_sales_call: bool,
        framework_score: Option<i32>,
    },
    /// Scoring or persisting the analysis failed; the call was moved to `failed`.
    AnalysisFailed {
        external_call_id: String,
        call_id: Id,
        error: String,
    },
    /// A reconciliation or maintenance pass finished.
    ReconciliationCompleted {
        operation: String,
        examined: usize,
        changed: usize,
    },
    /// An inbound webhook or sync request finished. Carries everything the
    /// audit trail needs to persist one log row.
    RequestHandled {
        endpoint: String,
        method: String,
        payload: Value,
        status_code: u16,
        error_message: Option<String>,
        processing_time_ms: u64,
        trail: Value,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::CallReceived { .. } => "call_received",
            DomainEvent::MatchAttempted { .. } => "match_attempted",
            DomainEvent::CallUnmatched { .. } => "call_unmatched",
            DomainEvent::TeamFiltered { .. } => "team_filtered",
            DomainEvent::TranscriptDeferred { .. } => "transcript_deferred",
            DomainEvent::ClassificationCompleted { .. } => "classification_completed",
            DomainEvent::StatusTransitioned { .. } => "status_transitioned",
            DomainEvent::AnalysisStored { .. } => "analysis_stored",
            DomainEvent::AnalysisFailed { .. } => "analysis_failed",
            DomainEvent::ReconciliationCompleted { .. } => "reconciliation_completed",
            DomainEvent::RequestHandled { .. } => "request_handled",
        }
    }
}

/// Trait for handling domain events.
/// Implementations can perform side effects like writing audit rows or log lines.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    /// Handlers must not fail the caller; they log their own errors.
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// One entry of an [`EventTrail`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrailEntry {
    /// Milliseconds since the trail was started
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: DomainEvent,
}

/// Ordered, timed list of the events produced while handling a single request.
#[derive(Debug, Clone)]
pub struct EventTrail {
    started: Instant,
    entries: Vec<TrailEntry>,
}

impl EventTrail {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, event: DomainEvent) {
        self.entries.push(TrailEntry {
            at_ms: self.elapsed_ms(),
            event,
        });
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn entries(&self) -> &[TrailEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<TrailEntry> {
        self.entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.event.name() == name)
    }

    /// JSON array suitable for the `webhook_logs.events` column.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.entries).unwrap_or(Value::Array(Vec::new()))
    }
}

impl Default for EventTrail {
    fn default() -> Self {
        Self::start()
    }
}

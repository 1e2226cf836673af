//! Extraction session state machine.
//!
//! A [`Session`] is an owned value moved through pure transitions:
//!
//! ```text
//! idle ──begin_upload──▶ uploading ──RecognitionStarted──▶ recognizing
//!                            │                                  │
//!                            └──────ExtractionSucceeded/Failed──┴──▶ ready | failed
//! any ──manual_fill──▶ ready
//! ready | failed ──begin_upload──▶ uploading
//! ```
//!
//! Every upload bumps the [`SessionId`]; events tagged with an older id are
//! late answers to a superseded request and are dropped.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{FormFillError, Result};
use crate::fields::{self, FieldSet};
use crate::record::ResultRecord;
use crate::service::ExtractionPayload;
use crate::templates::TemplateId;

/// Document-type marker for records filled by hand instead of from a scan.
pub const MANUAL_ENTRY_MARKER: &str = "VOICE";

/// Monotonic session generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionId(u64);

impl SessionId {
    fn next(self) -> Self {
        SessionId(self.0 + 1)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Uploading,
    Recognizing,
    Ready,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Recognizing => "recognizing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    /// Whether a request for this session is still outstanding.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Uploading | Self::Recognizing)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborator-driven events, each tagged with the session they answer.
#[derive(Debug)]
pub enum SessionEvent {
    /// The service has the upload and started recognition.
    RecognitionStarted(SessionId),
    ExtractionSucceeded(SessionId, ExtractionPayload),
    ExtractionFailed(SessionId, FormFillError),
}

impl SessionEvent {
    fn session_id(&self) -> SessionId {
        match self {
            Self::RecognitionStarted(id)
            | Self::ExtractionSucceeded(id, _)
            | Self::ExtractionFailed(id, _) => *id,
        }
    }
}

/// One upload-to-export lifecycle.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    status: SessionStatus,
    document_type: Option<String>,
    record: Option<ResultRecord>,
    template: TemplateId,
    last_error: Option<Arc<FormFillError>>,
}

impl Session {
    pub fn new(template: TemplateId) -> Self {
        Self {
            id: SessionId::default(),
            status: SessionStatus::Idle,
            document_type: None,
            record: None,
            template,
            last_error: None,
        }
    }

    /// Start a new upload. Clears any previous result and returns the id the
    /// outgoing request must be tagged with.
    pub fn begin_upload(self) -> (Self, SessionId) {
        let id = self.id.next();
        info!("Session {}: uploading", id);
        let session = Self {
            id,
            status: SessionStatus::Uploading,
            document_type: None,
            record: None,
            last_error: None,
            ..self
        };
        (session, id)
    }

    /// Fill by hand: blank record over every known key, straight to `ready`.
    pub fn manual_fill(self) -> Self {
        let id = self.id.next();
        info!("Session {}: manual entry", id);
        Self {
            id,
            status: SessionStatus::Ready,
            document_type: Some(MANUAL_ENTRY_MARKER.to_string()),
            record: Some(ResultRecord::blank(FieldSet::combined())),
            last_error: None,
            ..self
        }
    }

    /// Apply a collaborator event. Stale or out-of-order events leave the
    /// session unchanged.
    pub fn apply(self, event: SessionEvent) -> Self {
        let event_id = event.session_id();
        if event_id != self.id {
            debug!(
                "Session {}: discarding event for superseded session {}",
                self.id, event_id
            );
            return self;
        }

        match (self.status, event) {
            (SessionStatus::Uploading, SessionEvent::RecognitionStarted(_)) => {
                info!("Session {}: recognizing", self.id);
                Self {
                    status: SessionStatus::Recognizing,
                    ..self
                }
            }
            (
                SessionStatus::Uploading | SessionStatus::Recognizing,
                SessionEvent::ExtractionSucceeded(_, payload),
            ) => self.complete(payload),
            (
                SessionStatus::Uploading | SessionStatus::Recognizing,
                SessionEvent::ExtractionFailed(_, err),
            ) => {
                warn!("Session {}: extraction failed: {}", self.id, err);
                self.fail(err)
            }
            (status, event) => {
                debug!(
                    "Session {}: ignoring {:?} while {}",
                    self.id, event, status
                );
                self
            }
        }
    }

    fn complete(self, payload: ExtractionPayload) -> Self {
        // A payload with no card type at all is unclassified, not unsupported.
        let field_set = match payload.card_type.as_deref() {
            None => FieldSet::combined(),
            Some(label) => fields::resolve(Some(label)),
        };
        let document_type = payload.card_type.clone();

        if field_set.is_empty() {
            let err = FormFillError::UnsupportedInput {
                document_type: document_type.clone().unwrap_or_default(),
            };
            warn!("Session {}: {}", self.id, err);
            return Self {
                document_type,
                ..self.fail(err)
            };
        }

        let record = ResultRecord::from_fields(field_set, &payload.fields);
        info!(
            "Session {}: ready ({} fields, document type {:?})",
            self.id,
            record.len(),
            document_type
        );
        Self {
            status: SessionStatus::Ready,
            document_type,
            record: Some(record),
            last_error: None,
            ..self
        }
    }

    fn fail(self, err: FormFillError) -> Self {
        Self {
            status: SessionStatus::Failed,
            record: None,
            last_error: Some(Arc::new(err)),
            ..self
        }
    }

    /// Replace one value in the current record.
    pub fn edit_field(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        let record = self.record.as_mut().ok_or(FormFillError::NoRecord)?;
        record.set(key, value)?;
        debug!("Session {}: edited '{}'", self.id, key);
        Ok(())
    }

    /// Blank every value in the current record, keeping its keys.
    pub fn reset_fields(&mut self) -> Result<()> {
        let record = self.record.as_ref().ok_or(FormFillError::NoRecord)?;
        self.record = Some(record.reset());
        Ok(())
    }

    pub fn select_template(&mut self, template: TemplateId) {
        debug!("Session {}: template -> {}", self.id, template);
        self.template = template;
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn document_type(&self) -> Option<&str> {
        self.document_type.as_deref()
    }

    pub fn record(&self) -> Option<&ResultRecord> {
        self.record.as_ref()
    }

    pub fn template(&self) -> &TemplateId {
        &self.template
    }

    /// The failure that put the session in `failed`.
    pub fn last_error(&self) -> Option<&FormFillError> {
        self.last_error.as_deref()
    }
}

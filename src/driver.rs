//! Async driver binding a [`Session`] to a [`FormService`].
//!
//! Collaborator failures never escape [`SessionDriver::upload`]; they land the
//! session in `failed` and are available through [`Session::last_error`].
//! Status changes are broadcast to [`SessionDriver::subscribe`] receivers.

use tokio::sync::{broadcast, oneshot};
use tracing::{info, warn};

use crate::error::{FormFillError, Result};
use crate::export::{self, Download};
use crate::record::ResultRecord;
use crate::service::{FormService, Upload};
use crate::session::{Session, SessionEvent, SessionStatus};
use crate::templates::TemplateCatalog;

const STATUS_CHANNEL_CAPACITY: usize = 16;

pub struct SessionDriver<S: FormService> {
    service: S,
    catalog: TemplateCatalog,
    session: Session,
    status_tx: broadcast::Sender<SessionStatus>,
}

impl<S: FormService> SessionDriver<S> {
    /// Driver with an idle session on the catalog's default template.
    pub fn new(service: S, catalog: TemplateCatalog) -> Self {
        let session = Session::new(catalog.default_template());
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            service,
            catalog,
            session,
            status_tx,
        }
    }

    /// Receive every status the session moves through from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Pick the template used by [`Self::export_template_pdf`].
    pub fn select_template(&mut self, id: &str) -> Result<()> {
        let template = self.catalog.resolve(id)?;
        self.session.select_template(template);
        Ok(())
    }

    /// Upload an image and run extraction to completion.
    ///
    /// Returns the resulting status: `ready` with a record, or `failed`.
    pub async fn upload(&mut self, upload: &Upload) -> SessionStatus {
        let (session, id) = take(&mut self.session).begin_upload();
        self.session = session;
        // no receivers is fine
        let _ = self.status_tx.send(self.session.status());

        let (received_tx, mut received_rx) = oneshot::channel();
        let call = self.service.extract(upload, received_tx);
        tokio::pin!(call);

        let mut received_done = false;
        let outcome = loop {
            tokio::select! {
                biased;
                received = &mut received_rx, if !received_done => {
                    received_done = true;
                    if received.is_ok() {
                        transition(&mut self.session, &self.status_tx, |s| {
                            s.apply(SessionEvent::RecognitionStarted(id))
                        });
                    }
                }
                result = &mut call => break result,
            }
        };
        // The service may signal receipt and answer within the same poll.
        if !received_done && received_rx.try_recv().is_ok() {
            transition(&mut self.session, &self.status_tx, |s| {
                s.apply(SessionEvent::RecognitionStarted(id))
            });
        }

        let event = match outcome {
            Ok(payload) => SessionEvent::ExtractionSucceeded(id, payload),
            Err(err) => SessionEvent::ExtractionFailed(id, err),
        };
        transition(&mut self.session, &self.status_tx, |s| s.apply(event));

        if let Some(err) = self.session.last_error() {
            warn!("Upload of {} failed: {}", upload.file_name, err);
        }
        self.session.status()
    }

    /// Skip the scan and start from a blank record over every known field.
    pub fn manual_fill(&mut self) -> SessionStatus {
        transition(&mut self.session, &self.status_tx, Session::manual_fill);
        self.session.status()
    }

    pub fn edit_field(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        self.session.edit_field(key, value)
    }

    pub fn reset_fields(&mut self) -> Result<()> {
        self.session.reset_fields()
    }

    /// Template-aware export of the current record.
    pub async fn export_template_pdf(&self) -> Result<Download> {
        let record = self.current_record()?;
        let template = self.session.template();
        let download =
            export::export_template_pdf(&self.service, &self.catalog, template, record).await?;
        info!("Session {}: exported {}", self.session.id(), download.file_name);
        Ok(download)
    }

    /// Default-layout export of the current record.
    pub async fn export_default_pdf(&self) -> Result<Download> {
        let record = self.current_record()?;
        let download = export::export_default_pdf(&self.service, record).await?;
        info!("Session {}: exported {}", self.session.id(), download.file_name);
        Ok(download)
    }

    fn current_record(&self) -> Result<&ResultRecord> {
        self.session.record().ok_or(FormFillError::NoRecord)
    }
}

/// Move the session out of `slot`, leaving an idle placeholder behind.
fn take(slot: &mut Session) -> Session {
    let placeholder = Session::new(slot.template().clone());
    std::mem::replace(slot, placeholder)
}

/// Run one owned transition on the session held in `slot`, broadcasting the
/// new status if it changed.
fn transition(
    slot: &mut Session,
    status_tx: &broadcast::Sender<SessionStatus>,
    f: impl FnOnce(Session) -> Session,
) {
    let before = slot.status();
    *slot = f(take(slot));
    if slot.status() != before {
        let _ = status_tx.send(slot.status());
    }
}

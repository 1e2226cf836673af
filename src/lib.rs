//! formfill - identity-document form filling client.
//!
//! Uploads a scanned identity card to the form service, keeps the extracted
//! fields in an editable session and exports them as a filled PDF.

pub mod config;
pub mod driver;
pub mod error;
pub mod export;
pub mod fields;
pub mod record;
pub mod service;
pub mod session;
pub mod templates;

#[cfg(test)]
mod testing;

pub use config::ClientConfig;
pub use driver::SessionDriver;
pub use error::{FormFillError, Result};
pub use export::Download;
pub use fields::{DocumentCategory, FieldSet};
pub use record::ResultRecord;
pub use service::{ExtractionPayload, FormService, HttpFormService, MappedFields, Upload};
pub use session::{Session, SessionEvent, SessionId, SessionStatus};
pub use templates::{TemplateCatalog, TemplateId, TemplateInfo};

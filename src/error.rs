//! Error types shared by the library.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormFillError {
    /// Network or connection failure talking to the form service.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The form service answered, but not with success.
    #[error("service returned {status}: {body}")]
    Service { status: u16, body: String },

    /// Phase 1 of the template-aware export failed.
    #[error("field mapping failed: {0}")]
    MappingFailure(#[source] Box<FormFillError>),

    /// PDF rendering failed (template-aware phase 2 or default export).
    #[error("PDF generation failed: {0}")]
    RenderFailure(#[source] Box<FormFillError>),

    /// The detected document type resolved to no field keys.
    #[error("unsupported document type: {document_type:?}")]
    UnsupportedInput { document_type: String },

    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    #[error("field '{0}' is not part of the current record")]
    UnknownField(String),

    #[error("no extracted record in the current session")]
    NoRecord,

    #[error("unexpected response from service: {0}")]
    InvalidResponse(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FormFillError {
    pub(crate) fn mapping(cause: FormFillError) -> Self {
        Self::MappingFailure(Box::new(cause))
    }

    pub(crate) fn render(cause: FormFillError) -> Self {
        Self::RenderFailure(Box::new(cause))
    }
}

pub type Result<T> = std::result::Result<T, FormFillError>;

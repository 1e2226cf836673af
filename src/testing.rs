//! In-memory [`FormService`] for unit tests.

use serde_json::{json, Value};
use std::sync::Mutex;
use tokio::sync::oneshot;

use crate::error::{FormFillError, Result};
use crate::record::ResultRecord;
use crate::service::{ExtractionPayload, FormService, MappedFields, Upload};
use crate::templates::TemplateId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    Extract(String),
    Map(String),
    RenderForm(String),
    RenderDefault,
}

#[derive(Default)]
pub struct FakeFormService {
    calls: Mutex<Vec<FakeCall>>,
    extraction: Option<Value>,
    fail_extract: bool,
    fail_map: bool,
    fail_render: bool,
}

impl FakeFormService {
    pub fn with_extraction(mut self, payload: Value) -> Self {
        self.extraction = Some(payload);
        self
    }

    pub fn failing_extract(mut self) -> Self {
        self.fail_extract = true;
        self
    }

    pub fn failing_map(mut self) -> Self {
        self.fail_map = true;
        self
    }

    pub fn failing_render(mut self) -> Self {
        self.fail_render = true;
        self
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: FakeCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn unavailable() -> FormFillError {
        FormFillError::Service {
            status: 500,
            body: "internal error".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl FormService for FakeFormService {
    async fn extract(
        &self,
        upload: &Upload,
        received: oneshot::Sender<()>,
    ) -> Result<ExtractionPayload> {
        self.record(FakeCall::Extract(upload.file_name.clone()));
        if self.fail_extract {
            return Err(Self::unavailable());
        }
        let _ = received.send(());
        let payload = self
            .extraction
            .clone()
            .unwrap_or_else(|| json!({"card_type": "UNKNOWN", "fields": {}}));
        serde_json::from_value(payload)
            .map_err(|e| FormFillError::InvalidResponse(format!("extract: {}", e)))
    }

    async fn map_fields(
        &self,
        template: &TemplateId,
        fields: &ResultRecord,
    ) -> Result<MappedFields> {
        self.record(FakeCall::Map(template.to_string()));
        if self.fail_map {
            return Err(Self::unavailable());
        }
        let mut mapped = MappedFields::new();
        mapped.insert(
            "applicant_name".to_string(),
            Value::String(fields.get("Name").unwrap_or_default().to_string()),
        );
        Ok(mapped)
    }

    async fn render_form_pdf(
        &self,
        template: &TemplateId,
        _fields: &MappedFields,
    ) -> Result<Vec<u8>> {
        self.record(FakeCall::RenderForm(template.to_string()));
        if self.fail_render {
            return Err(Self::unavailable());
        }
        Ok(b"%PDF-1.4 form".to_vec())
    }

    async fn render_default_pdf(&self, _fields: &ResultRecord) -> Result<Vec<u8>> {
        self.record(FakeCall::RenderDefault);
        if self.fail_render {
            return Err(Self::unavailable());
        }
        Ok(b"%PDF-1.4 default".to_vec())
    }
}

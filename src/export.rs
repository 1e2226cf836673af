//! PDF export flows.
//!
//! Two flows exist side by side and are kept separate:
//! - template-aware: map the record onto a form template, then render that template;
//! - default: render the record directly with the generic layout.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{FormFillError, Result};
use crate::record::ResultRecord;
use crate::service::FormService;
use crate::templates::{TemplateCatalog, TemplateId};

/// File name of the default (single-phase) export.
pub const DEFAULT_EXPORT_FILE_NAME: &str = "filled_form.pdf";

/// A rendered document ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Download {
    /// Write the document into `dir` under its file name. Returns the full path.
    pub async fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.bytes).await?;
        info!("Saved {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

/// Map `record` onto `template` and render the filled template.
///
/// Phase 2 is only attempted when phase 1 succeeds. Failures come back as
/// [`FormFillError::MappingFailure`] or [`FormFillError::RenderFailure`].
pub async fn export_template_pdf<S: FormService + ?Sized>(
    service: &S,
    catalog: &TemplateCatalog,
    template: &TemplateId,
    record: &ResultRecord,
) -> Result<Download> {
    if !catalog.contains(template.as_str()) {
        return Err(FormFillError::UnknownTemplate(template.to_string()));
    }

    info!("Exporting {} fields as template {}", record.len(), template);
    let mapped = service.map_fields(template, record).await.map_err(|e| {
        warn!("Mapping to {} failed: {}", template, e);
        FormFillError::mapping(e)
    })?;

    let bytes = service
        .render_form_pdf(template, &mapped)
        .await
        .map_err(|e| {
            warn!("Rendering {} failed: {}", template, e);
            FormFillError::render(e)
        })?;

    Ok(Download {
        file_name: template.export_file_name(),
        bytes,
    })
}

/// Render `record` with the service's generic layout.
pub async fn export_default_pdf<S: FormService + ?Sized>(
    service: &S,
    record: &ResultRecord,
) -> Result<Download> {
    info!("Exporting {} fields with the default layout", record.len());
    let bytes = service.render_default_pdf(record).await.map_err(|e| {
        warn!("Default PDF rendering failed: {}", e);
        FormFillError::render(e)
    })?;

    Ok(Download {
        file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldSet;
    use crate::testing::{FakeCall, FakeFormService};

    fn record() -> ResultRecord {
        let mut record = ResultRecord::blank(FieldSet::combined());
        record.set("Name", "Asha").unwrap();
        record
    }

    #[tokio::test]
    async fn test_template_export_runs_both_phases() {
        let service = FakeFormService::default();
        let catalog = TemplateCatalog::default();
        let template = catalog.resolve("bank_account").unwrap();

        let download = export_template_pdf(&service, &catalog, &template, &record())
            .await
            .unwrap();

        assert_eq!(download.file_name, "bank_account_filled.pdf");
        assert!(download.bytes.starts_with(b"%PDF"));
        assert_eq!(
            service.calls(),
            vec![
                FakeCall::Map("bank_account".to_string()),
                FakeCall::RenderForm("bank_account".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_mapping_failure_skips_render() {
        let service = FakeFormService::default().failing_map();
        let catalog = TemplateCatalog::default();
        let template = catalog.default_template();

        let err = export_template_pdf(&service, &catalog, &template, &record())
            .await
            .unwrap_err();

        assert!(matches!(err, FormFillError::MappingFailure(_)));
        assert_eq!(service.calls(), vec![FakeCall::Map("birth_certificate".to_string())]);
    }

    #[tokio::test]
    async fn test_render_failure_is_distinct() {
        let service = FakeFormService::default().failing_render();
        let catalog = TemplateCatalog::default();
        let template = catalog.default_template();

        let err = export_template_pdf(&service, &catalog, &template, &record())
            .await
            .unwrap_err();
        assert!(matches!(err, FormFillError::RenderFailure(_)));

        let err = export_default_pdf(&service, &record()).await.unwrap_err();
        assert!(matches!(err, FormFillError::RenderFailure(_)));
    }

    #[tokio::test]
    async fn test_template_outside_catalog_is_not_sent() {
        let service = FakeFormService::default();
        let full = TemplateCatalog::default();
        let template = full.resolve("pan_form").unwrap();
        let narrow = TemplateCatalog::from_templates(vec![crate::templates::TemplateInfo {
            id: "generic_kyc".to_string(),
            label: "Generic KYC".to_string(),
        }])
        .unwrap();

        let err = export_template_pdf(&service, &narrow, &template, &record())
            .await
            .unwrap_err();
        assert!(matches!(err, FormFillError::UnknownTemplate(_)));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_default_export() {
        let service = FakeFormService::default();
        let download = export_default_pdf(&service, &record()).await.unwrap();
        assert_eq!(download.file_name, DEFAULT_EXPORT_FILE_NAME);
        assert_eq!(service.calls(), vec![FakeCall::RenderDefault]);
    }

    #[tokio::test]
    async fn test_save_to() {
        let dir = tempfile::tempdir().unwrap();
        let download = Download {
            file_name: "pan_form_filled.pdf".to_string(),
            bytes: b"%PDF-1.4 test".to_vec(),
        };
        let path = download.save_to(&dir.path().join("out")).await.unwrap();
        assert_eq!(path, dir.path().join("out").join("pan_form_filled.pdf"));
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF-1.4 test");
    }
}

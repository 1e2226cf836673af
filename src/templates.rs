//! Government-form templates the service can map fields onto.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{FormFillError, Result};

/// Template used when nothing else is selected.
pub const DEFAULT_TEMPLATE: &str = "birth_certificate";

/// Template identifier sent with the single-phase export.
pub const FALLBACK_RENDER_TEMPLATE: &str = "default";

/// A form template known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateInfo {
    pub id: String,
    pub label: String,
}

/// Identifier of a template that passed catalog validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateId(String);

impl TemplateId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the artifact produced by a template-aware export.
    pub fn export_file_name(&self) -> String {
        format!("{}_filled.pdf", self.0)
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed set of selectable templates.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: Vec<TemplateInfo>,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        let builtin = [
            ("birth_certificate", "Birth Certificate"),
            ("bank_account", "Bank Account"),
            ("pan_form", "PAN Application"),
            ("generic_kyc", "Generic KYC"),
            ("voter_id_application", "Voter ID Application"),
            ("aadhaar_update", "Aadhaar Update"),
            ("scholarship_application", "Scholarship Application"),
        ];
        Self {
            templates: builtin
                .iter()
                .map(|(id, label)| TemplateInfo {
                    id: id.to_string(),
                    label: label.to_string(),
                })
                .collect(),
        }
    }
}

impl TemplateCatalog {
    /// Create a catalog from a list of templates (e.g. loaded from a config file).
    pub fn from_templates(templates: Vec<TemplateInfo>) -> Result<Self> {
        if templates.is_empty() {
            return Err(FormFillError::Config("template catalog is empty".to_string()));
        }
        let mut seen: Vec<&str> = Vec::with_capacity(templates.len());
        for t in &templates {
            if t.id.trim().is_empty() {
                return Err(FormFillError::Config("template with empty id".to_string()));
            }
            if seen.contains(&t.id.as_str()) {
                return Err(FormFillError::Config(format!("duplicate template id: {}", t.id)));
            }
            seen.push(&t.id);
        }
        Ok(Self { templates })
    }

    /// Validate a template identifier against the catalog.
    pub fn resolve(&self, id: &str) -> Result<TemplateId> {
        if self.contains(id) {
            Ok(TemplateId(id.to_string()))
        } else {
            Err(FormFillError::UnknownTemplate(id.to_string()))
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.templates.iter().any(|t| t.id == id)
    }

    pub fn label(&self, id: &TemplateId) -> Option<&str> {
        self.templates
            .iter()
            .find(|t| t.id == id.as_str())
            .map(|t| t.label.as_str())
    }

    /// The catalog's default template: `birth_certificate` if present, else the first entry.
    pub fn default_template(&self) -> TemplateId {
        if self.contains(DEFAULT_TEMPLATE) {
            TemplateId(DEFAULT_TEMPLATE.to_string())
        } else {
            TemplateId(self.templates[0].id.clone())
        }
    }

    pub fn list(&self) -> &[TemplateInfo] {
        &self.templates
    }
}

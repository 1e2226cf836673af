//! Field-key resolution for detected identity documents.
//!
//! Pure functions, no I/O. The extraction service labels each document with a
//! free-form type string ("AADHAAR", "PAN", "VOTER_ID", ...); this module maps
//! that label to the ordered list of field keys the review form shows.

use once_cell::sync::Lazy;

/// Keys shown for Aadhaar and PAN cards. Must match the service's keys exactly.
pub const IDENTITY_CARD_FIELDS: &[&str] = &[
    "Name",
    "Father Name",
    "Mother Name",
    "DOB",
    "Gender",
    "PAN",
    "Aadhaar",
    "Address",
];

/// Keys shown for voter ID (EPIC) cards.
pub const VOTER_CARD_FIELDS: &[&str] = &[
    "Name",
    "EPIC Number",
    "DOB",
    "Gender",
    "Relation Name",
    "Relation Type",
    "Address",
];

static COMBINED_FIELDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    let mut keys: Vec<&'static str> = Vec::new();
    for key in IDENTITY_CARD_FIELDS.iter().chain(VOTER_CARD_FIELDS) {
        if !keys.contains(key) {
            keys.push(*key);
        }
    }
    keys
});

/// Document category a type label resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentCategory {
    /// Aadhaar or PAN card.
    IdentityCard,
    /// Voter ID card.
    VoterCard,
    /// Labelled, but by nothing we recognise.
    Unknown,
}

/// Ordered (category, substrings) table. First match wins, so a label that
/// contains both "pan" and "voter" is an identity card.
const CATEGORY_MATCHERS: &[(DocumentCategory, &[&str])] = &[
    (DocumentCategory::IdentityCard, &["aadhaar", "pan"]),
    (DocumentCategory::VoterCard, &["voter"]),
];

impl DocumentCategory {
    pub fn field_set(self) -> FieldSet {
        match self {
            Self::IdentityCard => FieldSet(IDENTITY_CARD_FIELDS),
            Self::VoterCard => FieldSet(VOTER_CARD_FIELDS),
            Self::Unknown => FieldSet::combined(),
        }
    }
}

/// Canonical ordered list of unique field keys for a document category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSet(&'static [&'static str]);

impl FieldSet {
    pub const EMPTY: FieldSet = FieldSet(&[]);

    /// Deduplicated union of every known category, in first-seen order.
    pub fn combined() -> Self {
        FieldSet(Lazy::force(&COMBINED_FIELDS).as_slice())
    }

    pub fn keys(&self) -> &'static [&'static str] {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|k| *k == key)
    }
}

/// Classify a document-type label. Returns `None` for a missing or empty label.
pub fn classify(document_type: &str) -> Option<DocumentCategory> {
    if document_type.is_empty() {
        return None;
    }
    let label = document_type.to_lowercase();
    let category = CATEGORY_MATCHERS
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| label.contains(n)))
        .map(|(category, _)| *category)
        .unwrap_or(DocumentCategory::Unknown);
    Some(category)
}

/// Resolve the field keys expected for a detected document type.
pub fn resolve(document_type: Option<&str>) -> FieldSet {
    document_type
        .and_then(classify)
        .map(DocumentCategory::field_set)
        .unwrap_or(FieldSet::EMPTY)
}

/// Human-facing label for a field key: first character upper-cased.
pub fn display_label(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

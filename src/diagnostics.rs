//! Diagnostics
//!
//! Collects non-fatal events raised while normalizing: merge conflicts,
//! entities without an id, values no polymorphic schema claims.
//! Traversal never fails on these; callers decide what to surface.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::store::{FieldConflict, Resolution};

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// Two representations of one entity disagree on a field; incoming won
    MergeConflict,
    /// The id rule produced no id for an entity
    MissingId,
    /// A discriminator named no schema in the schema map
    UnmatchedDiscriminator,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MergeConflict => "W001",
            Self::MissingId => "W002",
            Self::UnmatchedDiscriminator => "I001",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::MergeConflict | Self::MissingId => Severity::Warning,
            Self::UnmatchedDiscriminator => Severity::Info,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Entity type (or schema position) that raised this diagnostic
    pub schema_key: String,
    /// Diagnostic code
    pub code: DiagnosticCode,
    /// Human-readable message
    pub message: String,
    /// Additional context (ids, field names)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(
        schema_key: impl Into<String>,
        code: DiagnosticCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            schema_key: schema_key.into(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            self.code.severity(),
            self.message,
            self.schema_key
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Collection of diagnostics from one or more normalize calls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic item
    pub fn push(&mut self, item: DiagnosticItem) {
        self.items.push(item);
    }

    /// Record fields of entity `id` whose representations disagreed
    pub fn merge_conflict(&mut self, schema_key: &str, id: &str, conflicts: &[FieldConflict]) {
        let mut item = DiagnosticItem::new(
            schema_key,
            DiagnosticCode::MergeConflict,
            format!("Entity '{}' merged with conflicting values", id),
        );
        for (resolution, label) in [
            (Resolution::Incoming, "Incoming kept"),
            (Resolution::Existing, "Existing kept"),
            (Resolution::Combined, "Combined by merge rule"),
        ] {
            let fields: Vec<&str> = conflicts
                .iter()
                .filter(|c| c.resolution == resolution)
                .map(|c| c.field.as_str())
                .collect();
            if !fields.is_empty() {
                item = item.with_context(format!("{}: {}", label, fields.join(", ")));
            }
        }
        self.push(item);
    }

    /// Record an entity whose id rule produced nothing
    pub fn missing_id(&mut self, schema_key: &str, field_key: Option<&str>) {
        let mut item = DiagnosticItem::new(
            schema_key,
            DiagnosticCode::MissingId,
            "Entity has no id; stored under the key 'null'",
        );
        if let Some(field) = field_key {
            item = item.with_context(format!("Found at field '{}'", field));
        }
        self.push(item);
    }

    /// Record a discriminator value with no matching schema
    pub fn unmatched_discriminator(&mut self, position: &str, attribute: Option<&str>) {
        self.push(DiagnosticItem::new(
            position,
            DiagnosticCode::UnmatchedDiscriminator,
            match attribute {
                Some(attr) => format!("No schema registered for '{}'; value left unchanged", attr),
                None => "Discriminator produced no schema key; value left unchanged".to_string(),
            },
        ));
    }

    /// Get all warnings
    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Warning)
    }

    /// Get all items with the given code
    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |i| i.code == code)
    }

    /// Get total count
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Count warnings
    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Format all diagnostics for display
    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if !self.is_empty() {
            output.push_str(&format!(
                "\n{} warning(s), {} note(s)\n",
                self.warning_count(),
                self.len() - self.warning_count()
            ));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

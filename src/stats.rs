use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::fields::FieldId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// No value for the field and no default applied.
    UnresolvedField,
    /// Two rules of the same priority matched the same span.
    AmbiguousMatch,
    /// A known label is still followed by an unfilled placeholder.
    Residue,
    /// The runs to rewrite include a field or other anchor.
    FormattingAnomaly,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WarningKind::UnresolvedField => "unresolved field",
            WarningKind::AmbiguousMatch => "ambiguous match",
            WarningKind::Residue => "residue",
            WarningKind::FormattingAnomaly => "formatting anomaly",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Warning {
    /// Paragraph index, counted across body, headers and footers.
    pub paragraph: usize,
    pub part: String,
    pub rule: Option<String>,
    pub field: Option<FieldId>,
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (paragraph {}): {}", self.part, self.paragraph, self.kind)?;
        if let Some(field) = self.field {
            write!(f, " [{field}]")?;
        }
        if let Some(rule) = &self.rule {
            write!(f, " via {rule}")?;
        }
        write!(f, ": {}", self.message)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Stats {
    pub total_substitutions: usize,
    pub per_field: BTreeMap<FieldId, usize>,
    pub paragraphs_changed: usize,
    pub tables_changed: usize,
    pub headers_changed: usize,
    pub footers_changed: usize,
    pub warnings: Vec<Warning>,
}

impl Stats {
    pub(crate) fn record(&mut self, field: FieldId) {
        self.total_substitutions += 1;
        *self.per_field.entry(field).or_default() += 1;
    }

    pub fn warnings_of(&self, kind: WarningKind) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }

    pub fn residue_count(&self) -> usize {
        self.warnings_of(WarningKind::Residue).count()
    }
}

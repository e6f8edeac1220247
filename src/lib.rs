mod docx;
mod error;
mod fields;
mod layout;
mod matcher;
mod model;
mod options;
mod postprocess;
mod rewrite;
mod rules;
mod stats;
mod walker;

pub use docx::Docx;
pub use error::Error;
pub use fields::{
    FieldDef, FieldId, Record, Registry, ValueFormat, ValueMap, format_chinese_date, load_record,
};
pub use matcher::{Decision, Matcher};
pub use model::{Block, Cell, Fingerprint, Paragraph, Row, Run, Story, StoryKind, Table};
pub use options::{FillOptions, MISSING_LITERAL, OnMissing, RuleSpec};
pub use rules::{Catalog, Rule, RuleMatch, Slot, Strategy, Target};
pub use stats::{Stats, Warning, WarningKind};
pub use walker::Engine;

use std::path::Path;

/// Fill the template at `input` with `values` and write the result to
/// `output`. In strict mode nothing is written when unfilled labels remain.
pub fn fill(
    input: &Path,
    output: &Path,
    values: &ValueMap,
    options: &FillOptions,
) -> Result<Stats, Error> {
    let engine = Engine::new(options)?;
    let mut docx = Docx::open(input)?;
    let stats = engine.fill_docx(&mut docx, values);
    if options.strict && stats.residue_count() > 0 {
        return Err(Error::Residue(stats.residue_count()));
    }
    docx.save(output)?;
    Ok(stats)
}

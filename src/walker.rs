//! Document walk: visits every paragraph of the body, then headers, then
//! footers, and drives matching, rewriting and clean-up for each one.

use std::collections::BTreeSet;

use crate::docx::Docx;
use crate::error::Error;
use crate::fields::{FieldId, Registry, ValueMap};
use crate::layout;
use crate::matcher::{Decision, Matcher};
use crate::model::{Block, Paragraph, StoryKind};
use crate::options::{FillOptions, MISSING_LITERAL, OnMissing};
use crate::postprocess;
use crate::rewrite::{self, Planned};
use crate::rules::{Catalog, Rule, Strategy};
use crate::stats::{Stats, Warning, WarningKind};

/// Upper bound on rule applications per paragraph.
const MAX_PASSES: usize = 8;

/// Compiled rules plus the options they were built from. Holds no
/// per-document state, so one engine can fill any number of documents.
pub struct Engine {
    registry: Registry,
    catalog: Catalog,
    options: FillOptions,
}

/// Per-document state threaded through the walk.
struct Context<'v> {
    values: &'v ValueMap,
    stats: Stats,
    part: String,
    paragraph: usize,
}

impl Context<'_> {
    fn warn(
        &mut self,
        kind: WarningKind,
        rule: Option<&Rule>,
        field: Option<FieldId>,
        message: String,
    ) {
        let warning = Warning {
            paragraph: self.paragraph,
            part: self.part.clone(),
            rule: rule.map(|r| r.name.clone()),
            field,
            kind,
            message,
        };
        log::warn!("{warning}");
        self.stats.warnings.push(warning);
    }
}

/// Text decided for one slot. `resolved` is false for policy defaults.
struct Fill {
    text: String,
    resolved: bool,
}

impl Engine {
    pub fn new(options: &FillOptions) -> Result<Engine, Error> {
        options.validate()?;
        let registry = Registry::standard().with_extra_aliases(&options.extra_aliases);
        let catalog = Catalog::build(&registry, &options.extra_rules)?;
        Ok(Engine { registry, catalog, options: options.clone() })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn options(&self) -> &FillOptions {
        &self.options
    }

    /// Describe what the engine would do with a paragraph of this text.
    pub fn explain(&self, text: &str) -> Option<String> {
        let matcher = Matcher::new(&self.catalog, &self.registry, &self.options);
        match matcher.decide(text, &BTreeSet::new(), &ValueMap::new()) {
            Decision::Nothing => None,
            Decision::Bypass { rule, keyword } => {
                Some(format!("{} (bypassed: {keyword})", rule.name))
            }
            Decision::Fill { found, .. } => {
                let fields: Vec<&str> = found.slots.iter().map(|s| s.field.as_str()).collect();
                Some(format!("{} [{}]", found.rule.name, fields.join(", ")))
            }
        }
    }

    /// Fill every paragraph of the document in place.
    pub fn fill_docx(&self, docx: &mut Docx, values: &ValueMap) -> Stats {
        let mut ctx = Context {
            values,
            stats: Stats::default(),
            part: String::new(),
            paragraph: 0,
        };

        for story in &mut docx.stories {
            ctx.part = story.part.clone();
            let before = ctx.stats.total_substitutions;
            let changed = self.walk_blocks(&mut ctx, &mut story.blocks, 0);
            if changed {
                match story.kind {
                    StoryKind::Body => {}
                    StoryKind::Header => ctx.stats.headers_changed += 1,
                    StoryKind::Footer => ctx.stats.footers_changed += 1,
                }
            }
            log::info!(
                "{}: {} substitution(s)",
                story.part,
                ctx.stats.total_substitutions - before
            );
        }
        ctx.stats
    }

    fn walk_blocks(&self, ctx: &mut Context<'_>, blocks: &mut [Block], depth: usize) -> bool {
        let mut changed = false;
        for block in blocks {
            match block {
                Block::Paragraph(p) => changed |= self.visit_paragraph(ctx, p),
                Block::Table(table) => {
                    let mut table_changed = false;
                    for cell in table.rows.iter_mut().flat_map(|r| r.cells.iter_mut()) {
                        table_changed |= self.walk_blocks(ctx, &mut cell.blocks, depth + 1);
                    }
                    if table_changed && depth == 0 {
                        ctx.stats.tables_changed += 1;
                    }
                    changed |= table_changed;
                }
            }
        }
        changed
    }

    fn visit_paragraph(&self, ctx: &mut Context<'_>, paragraph: &mut Paragraph) -> bool {
        let layout = self.fill_paragraph(ctx, paragraph);
        if paragraph.is_changed() {
            if !layout {
                postprocess::collapse_spacing(
                    paragraph,
                    self.options.collapse_spacing_width,
                    &self.catalog,
                );
            }
            postprocess::compact(paragraph);
        }
        for field in postprocess::residue(paragraph, &self.catalog, &self.registry) {
            ctx.warn(
                WarningKind::Residue,
                None,
                Some(field),
                "label still followed by an unfilled placeholder".into(),
            );
        }

        let changed = paragraph.is_changed();
        if changed {
            ctx.stats.paragraphs_changed += 1;
        }
        ctx.paragraph += 1;
        changed
    }

    /// Apply rules until none is left. Returns true when a layout rule
    /// shaped the line.
    fn fill_paragraph(&self, ctx: &mut Context<'_>, paragraph: &mut Paragraph) -> bool {
        let matcher = Matcher::new(&self.catalog, &self.registry, &self.options);
        let mut done = BTreeSet::new();
        let mut layout = false;

        for _ in 0..MAX_PASSES {
            let text = paragraph.text();
            let (found, rivals) = match matcher.decide(&text, &done, ctx.values) {
                Decision::Nothing => break,
                Decision::Bypass { rule, keyword } => {
                    log::debug!(
                        "{} paragraph {}: {} bypassed, clause contains {keyword}",
                        ctx.part,
                        ctx.paragraph,
                        rule.name
                    );
                    break;
                }
                Decision::Fill { found, rivals } => (found, rivals),
            };
            let rule = found.rule;
            for rival in rivals {
                ctx.warn(
                    WarningKind::AmbiguousMatch,
                    Some(rule),
                    found.slots.first().map(|s| s.field),
                    format!("`{}` matches the same span", rival.name),
                );
            }
            let mut planned = Vec::new();
            let mut skipped = false;
            for slot in &found.slots {
                match self.fill_for(ctx, rule, slot.field) {
                    Some(fill) => {
                        // A cleared placeholder can still look like one.
                        if fill.text.is_empty() {
                            done.insert(slot.field);
                        }
                        let keep_underline = self.options.preserve_underline
                            || rewrite::underlined_share(paragraph, &slot.label) >= 0.5;
                        planned.push((
                            Planned { slot: slot.clone(), text: fill.text, keep_underline },
                            fill.resolved,
                        ));
                    }
                    None => {
                        done.insert(slot.field);
                        skipped = true;
                    }
                }
            }
            if skipped && rule.strategy == Strategy::DualFieldGap {
                break;
            }
            if planned.is_empty() {
                continue;
            }

            let slots: Vec<Planned> = planned.iter().map(|(p, _)| p.clone()).collect();
            let splices = if rule.strategy.is_layout() {
                layout::splices(
                    rule.strategy,
                    &text,
                    &slots,
                    self.options.collapse_spacing_width,
                )
            } else {
                slots
                    .iter()
                    .map(|p| rewrite::slot_splice(rule.strategy, p))
                    .collect()
            };

            if let Err(anomaly) = rewrite::apply(paragraph, splices) {
                ctx.warn(
                    WarningKind::FormattingAnomaly,
                    Some(rule),
                    slots.first().map(|p| p.slot.field),
                    format!("run {} holds a field or other anchor; paragraph skipped", anomaly.run),
                );
                break;
            }
            layout |= rule.strategy.is_layout();
            for (p, resolved) in &planned {
                if *resolved {
                    ctx.stats.record(p.slot.field);
                }
                log::debug!(
                    "{} paragraph {}: {} <- {:?} via {}",
                    ctx.part,
                    ctx.paragraph,
                    p.slot.field,
                    p.text,
                    rule.name
                );
            }
        }
        layout
    }

    /// Text to write for `field`, or None when the paragraph is to keep its
    /// placeholder.
    fn fill_for(&self, ctx: &mut Context<'_>, rule: &Rule, field: FieldId) -> Option<Fill> {
        if let Some(value) = ctx.values.get(field) {
            return Some(Fill { text: value.to_string(), resolved: true });
        }
        let mut policy = self
            .registry
            .get(field)
            .and_then(|f| f.on_missing)
            .unwrap_or(self.options.on_missing);
        // An emptied bracket reads worse than the label it held.
        if policy == OnMissing::Blank && rule.strategy == Strategy::ReplaceBracketed {
            policy = OnMissing::Skip;
        }
        let (fill, outcome) = match policy {
            OnMissing::Skip => (None, "placeholder left in place"),
            OnMissing::Blank => {
                (Some(Fill { text: String::new(), resolved: false }), "placeholder cleared")
            }
            OnMissing::Literal => (
                Some(Fill { text: MISSING_LITERAL.to_string(), resolved: false }),
                "wrote 未填写",
            ),
        };
        ctx.warn(
            WarningKind::UnresolvedField,
            Some(rule),
            Some(field),
            format!("no value; {outcome}"),
        );
        fill
    }
}

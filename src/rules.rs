//! The pattern catalog: regex recognition rules generated by crossing each
//! field's aliases with a fixed set of templates.
//!
//! Rules are ordered by priority (lower first). Templates that can involve
//! more than one field (`Target::Labels`) are compiled once over the aliases
//! of every field and resolve the field from the captured label text.
//!
//! Capture groups understood by the rule runtime:
//!
//! - `label`: the label text of the (first) field.
//! - `sep`: the `:`/`：` separator after the label, if any.
//! - `seal`: a seal annotation such as `（加盖公章）`.
//! - `ph`: the span that receives the value. Multi-field rules take it
//!   from the text between each separator and the next label instead.
//! - `gap`, `label_b`, `sep_b`: second field of a dual-field line.

use std::ops::Range;

use regex::{Captures, Regex, RegexSet};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::fields::{FieldId, Registry, sort_longest_first};
use crate::options::RuleSpec;

pub(crate) const SEAL: &str = r"[（(]\s*(?:加盖)?(?:单位|公司)?(?:公章|盖章|印章)\s*[）)]";
const PH: &str = r"[_＿—–\-\s]";
const MARK: &str = r"[_＿—–]";
const MARK_CHARS: [char; 4] = ['_', '＿', '—', '–'];

/// The part of `region` a value replaces: all of it when it holds only
/// blanks and marks, otherwise the marks in front of a blank and other
/// text. None when the region already holds a value.
fn placeholder_span(text: &str, region: Range<usize>) -> Option<Range<usize>> {
    let body = &text[region.clone()];
    let Some(stop) = body.find(|c: char| !c.is_whitespace() && !MARK_CHARS.contains(&c)) else {
        return Some(region);
    };
    let head = &body[..stop];
    let marks = head.trim_end();
    if marks.len() == head.len() || !marks.contains(MARK_CHARS.as_slice()) {
        return None;
    }
    Some(region.start..region.start + marks.len())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    FillPlaceholder,
    FillPlaceholderPreserveSeal,
    ReplaceBracketed,
    AppendAfterLabel,
    DualFieldGap,
    FillTrailingSpace,
    MultiField,
}

impl Strategy {
    fn required_groups(self) -> &'static [&'static str] {
        match self {
            Strategy::FillPlaceholder
            | Strategy::ReplaceBracketed
            | Strategy::AppendAfterLabel
            | Strategy::FillTrailingSpace => &["label", "ph"],
            Strategy::FillPlaceholderPreserveSeal => &["label", "seal", "ph"],
            Strategy::DualFieldGap => &["label", "gap", "label_b", "ph"],
            Strategy::MultiField => &["label", "sep"],
        }
    }

    /// Strategies whose substitutions the layout coordinator orchestrates.
    pub fn is_layout(self) -> bool {
        matches!(self, Strategy::DualFieldGap | Strategy::MultiField)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Field(FieldId),
    Labels,
}

struct Template {
    name: &'static str,
    priority: u16,
    strategy: Strategy,
    per_field: bool,
    pattern: &'static str,
    description: &'static str,
}

const TEMPLATES: &[Template] = &[
    Template {
        name: "label-seal-separator",
        priority: 10,
        strategy: Strategy::FillPlaceholderPreserveSeal,
        per_field: true,
        pattern: r"^\s*(?P<label>{L})\s*(?P<seal>{SEAL})\s*(?P<sep>[:：])(?P<ph>{PH}*)$",
        description: "seal annotation between label and separator",
    },
    Template {
        name: "label-placeholder-seal",
        priority: 15,
        strategy: Strategy::FillPlaceholderPreserveSeal,
        per_field: true,
        pattern: r"^\s*(?P<label>{L})\s*(?P<sep>[:：])(?P<ph>{PH}*)(?P<seal>{SEAL})\s*$",
        description: "seal annotation after the placeholder",
    },
    Template {
        name: "label-colon-placeholder",
        priority: 20,
        strategy: Strategy::FillPlaceholder,
        per_field: true,
        pattern: r"^\s*(?P<label>{L})\s*(?P<sep>[:：])(?P<ph>{PH}{2,}|{MARK}+)$",
        description: "label, separator, then underscores, dashes or spaces",
    },
    Template {
        name: "bracketed-inline-label",
        priority: 30,
        strategy: Strategy::ReplaceBracketed,
        per_field: true,
        pattern: r"[（(](?P<ph>\s*(?P<label>{L})\s*)[）)]",
        description: "label wrapped in brackets inside prose",
    },
    Template {
        name: "multi-field-line",
        priority: 35,
        strategy: Strategy::MultiField,
        per_field: false,
        pattern: r"(?:^\s*|\s{2,})(?P<label>{L})\s*(?P<sep>[:：])",
        description: "several label-separator placeholders separated by gaps",
    },
    Template {
        name: "label-only-no-placeholder",
        priority: 40,
        strategy: Strategy::AppendAfterLabel,
        per_field: true,
        pattern: r"^\s*(?P<label>{L})\s*(?P<sep>[:：])(?P<ph>\s*)$",
        description: "label and separator with nothing after",
    },
    Template {
        name: "label-then-wide-gap-then-label",
        priority: 50,
        strategy: Strategy::DualFieldGap,
        per_field: false,
        pattern: r"^\s*(?P<label>{L})(?P<sep>[:：])?(?P<gap>\s{6,})(?P<label_b>{L})(?P<sep_b>[:：])?(?P<ph>\s*)$",
        description: "two labels on one line separated by a wide gap",
    },
    Template {
        name: "label-long-space-only",
        priority: 60,
        strategy: Strategy::FillTrailingSpace,
        per_field: true,
        pattern: r"^\s*(?P<label>{L})(?P<ph>\s{20,})$",
        description: "label followed only by a long run of spaces",
    },
    Template {
        name: "label-placeholder-trailing-text",
        priority: 70,
        strategy: Strategy::FillPlaceholder,
        per_field: true,
        pattern: r"^\s*(?P<label>{L})\s*(?P<sep>[:：])(?P<ph>{MARK}{2,})",
        description: "underscore placeholder followed by other text",
    },
];

fn expand(pattern: &str, labels: &str) -> String {
    pattern
        .replace("{L}", labels)
        .replace("{SEAL}", SEAL)
        .replace("{PH}", PH)
        .replace("{MARK}", MARK)
}

fn alternation(aliases: &[&str]) -> String {
    let mut sorted = aliases.to_vec();
    sort_longest_first(&mut sorted);
    sorted
        .iter()
        .map(|a| regex::escape(a))
        .collect::<Vec<_>>()
        .join("|")
}

/// One labelled placeholder found in a paragraph. Ranges are byte offsets
/// into the paragraph's concatenated text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slot {
    pub field: FieldId,
    pub label: Range<usize>,
    pub sep: Option<Range<usize>>,
    pub seal: Option<Range<usize>>,
    pub span: Range<usize>,
}

impl Slot {
    /// The seal annotation sits after the value rather than before the
    /// separator.
    pub fn seal_follows(&self) -> bool {
        self.seal.as_ref().is_some_and(|s| s.start >= self.span.end)
    }
}

#[derive(Debug)]
pub struct Rule {
    pub name: String,
    pub priority: u16,
    pub strategy: Strategy,
    pub target: Target,
    pub description: String,
    regex: Regex,
}

#[derive(Debug)]
pub struct RuleMatch<'c> {
    pub rule: &'c Rule,
    pub slots: Vec<Slot>,
}

impl RuleMatch<'_> {
    /// From the first label to the end of the last value span.
    pub fn span(&self) -> Range<usize> {
        let start = self.slots.iter().map(|s| s.label.start.min(s.span.start)).min();
        let end = self.slots.iter().map(|s| s.span.end.max(s.label.end)).max();
        start.unwrap_or(0)..end.unwrap_or(0)
    }

    pub fn fields(&self) -> Vec<FieldId> {
        self.slots.iter().map(|s| s.field).collect()
    }
}

impl Rule {
    fn compile(
        name: String,
        priority: u16,
        strategy: Strategy,
        target: Target,
        description: String,
        pattern: &str,
    ) -> Result<Rule, Error> {
        let regex = Regex::new(pattern).map_err(|e| Error::MalformedRule {
            rule: name.clone(),
            reason: e.to_string(),
        })?;
        for group in strategy.required_groups() {
            if !regex.capture_names().flatten().any(|n| n == *group) {
                return Err(Error::MalformedRule {
                    rule: name,
                    reason: format!("strategy {strategy:?} needs a `{group}` capture group"),
                });
            }
        }
        Ok(Rule { name, priority, strategy, target, description, regex })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Try the rule against a paragraph's text. Bracketed labels yield a
    /// slot for every occurrence.
    pub fn find<'c>(&'c self, text: &str, registry: &Registry) -> Option<RuleMatch<'c>> {
        let slots = match self.strategy {
            Strategy::MultiField => self.line_slots(text, registry)?,
            Strategy::DualFieldGap => self.dual_slots(&self.regex.captures(text)?, registry)?,
            Strategy::ReplaceBracketed => {
                let slots: Vec<Slot> = self
                    .regex
                    .captures_iter(text)
                    .filter_map(|caps| self.single_slot(&caps, registry))
                    .collect();
                if slots.is_empty() {
                    return None;
                }
                slots
            }
            _ => vec![self.single_slot(&self.regex.captures(text)?, registry)?],
        };
        Some(RuleMatch { rule: self, slots })
    }

    fn field_of(&self, label: &str, registry: &Registry) -> Option<FieldId> {
        match self.target {
            Target::Field(id) => Some(id),
            Target::Labels => registry.field_for_label(label),
        }
    }

    fn single_slot(&self, caps: &Captures, registry: &Registry) -> Option<Slot> {
        let label = caps.name("label")?;
        let field = self.field_of(label.as_str(), registry)?;
        let sep = caps.name("sep").map(|m| m.range());
        let seal = caps.name("seal").map(|m| m.range());
        let span = match caps.name("ph") {
            Some(ph) => ph.range(),
            None => {
                let at = [sep.as_ref(), seal.as_ref()]
                    .into_iter()
                    .flatten()
                    .map(|r| r.end)
                    .max()
                    .unwrap_or(label.end())
                    .max(label.end());
                at..at
            }
        };
        Some(Slot { field, label: label.range(), sep, seal, span })
    }

    fn dual_slots(&self, caps: &Captures, registry: &Registry) -> Option<Vec<Slot>> {
        let label_a = caps.name("label")?;
        let label_b = caps.name("label_b")?;
        let field_a = self.field_of(label_a.as_str(), registry)?;
        let field_b = registry.field_for_label(label_b.as_str())?;
        let sep_a = caps.name("sep").map(|m| m.range());
        let sep_b = caps.name("sep_b").map(|m| m.range());

        let a_start = sep_a.as_ref().map_or(label_a.end(), |s| s.end);
        let b_start = sep_b.as_ref().map_or(label_b.end(), |s| s.end);
        let b_end = caps.name("ph").map_or(b_start, |m| m.end()).max(b_start);

        Some(vec![
            Slot {
                field: field_a,
                label: label_a.range(),
                sep: sep_a,
                seal: None,
                span: a_start..label_b.start(),
            },
            Slot {
                field: field_b,
                label: label_b.range(),
                sep: sep_b,
                seal: None,
                span: b_start..b_end,
            },
        ])
    }

    /// Every label on the line whose separator is followed by a
    /// placeholder: blanks and marks up to the gap before the next label,
    /// or to the end of the line for the last one. Needs at least two
    /// labels on the line; labels whose separator is followed by other
    /// text count toward that but produce no slot.
    fn line_slots(&self, text: &str, registry: &Registry) -> Option<Vec<Slot>> {
        let found: Vec<Captures> = self.regex.captures_iter(text).collect();
        let mut labels = 0;
        let mut slots = Vec::new();
        for (i, caps) in found.iter().enumerate() {
            let (Some(label), Some(sep)) = (caps.name("label"), caps.name("sep")) else {
                continue;
            };
            labels += 1;
            let end = found
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(text.len(), |m| m.start());
            let Some(span) = placeholder_span(text, sep.end()..end) else {
                continue;
            };
            let Some(field) = self.field_of(label.as_str(), registry) else {
                continue;
            };
            slots.push(Slot {
                field,
                label: label.range(),
                sep: Some(sep.range()),
                seal: None,
                span,
            });
        }
        (labels >= 2 && !slots.is_empty()).then_some(slots)
    }
}

/// The ordered rule set for one document.
#[derive(Debug)]
pub struct Catalog {
    rules: Vec<Rule>,
    set: RegexSet,
    residue: Regex,
    seal: Regex,
}

impl Catalog {
    pub fn build(registry: &Registry, extra: &[RuleSpec]) -> Result<Catalog, Error> {
        let all_labels = alternation(&registry.all_aliases());
        let mut rules = Vec::new();

        for template in TEMPLATES {
            if !template.per_field {
                rules.push(Rule::compile(
                    template.name.to_string(),
                    template.priority,
                    template.strategy,
                    Target::Labels,
                    template.description.to_string(),
                    &expand(template.pattern, &all_labels),
                )?);
                continue;
            }
            for field in registry.fields() {
                if field.aliases.is_empty() {
                    continue;
                }
                let aliases: Vec<&str> = field.aliases.iter().map(String::as_str).collect();
                rules.push(Rule::compile(
                    format!("{}/{}", template.name, field.id),
                    template.priority,
                    template.strategy,
                    Target::Field(field.id),
                    template.description.to_string(),
                    &expand(template.pattern, &alternation(&aliases)),
                )?);
            }
        }

        for spec in extra {
            let target = spec.field.map_or(Target::Labels, Target::Field);
            rules.push(Rule::compile(
                spec.name.clone(),
                spec.priority,
                spec.strategy,
                target,
                spec.description.clone(),
                &expand(&spec.pattern, &all_labels),
            )?);
        }

        // Stable: generated rules keep template then field order within a
        // priority, configured rules follow them.
        rules.sort_by_key(|r| r.priority);

        let set = RegexSet::new(rules.iter().map(|r| r.regex.as_str())).map_err(|e| {
            Error::MalformedRule { rule: "<catalog>".into(), reason: e.to_string() }
        })?;
        let residue = Regex::new(&expand(
            r"(?:^\s*|\s{2,})(?P<label>{L})(?:\s*{SEAL})?\s*[:：]\s*(?:[_＿]{5,}|\s{8,})",
            &all_labels,
        ))
        .map_err(|e| Error::MalformedRule { rule: "<residue>".into(), reason: e.to_string() })?;
        let seal = Regex::new(&format!(r"^\s*{SEAL}"))
            .map_err(|e| Error::MalformedRule { rule: "<seal>".into(), reason: e.to_string() })?;

        log::debug!("compiled {} recognition rules", rules.len());
        Ok(Catalog { rules, set, residue, seal })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rules whose pattern matches somewhere in `text`, in priority order.
    pub fn candidates<'c>(&'c self, text: &str) -> impl Iterator<Item = &'c Rule> + use<'c> {
        let matched = self.set.matches(text);
        self.rules
            .iter()
            .enumerate()
            .filter(move |(i, _)| matched.matched(*i))
            .map(|(_, r)| r)
    }

    /// Known labels still followed by an unfilled placeholder.
    pub fn residue(&self, text: &str, registry: &Registry) -> Vec<FieldId> {
        self.residue
            .captures_iter(text)
            .filter_map(|caps| registry.field_for_label(caps.name("label")?.as_str()))
            .collect()
    }

    /// `text` starts (after optional whitespace) with a seal annotation.
    pub(crate) fn starts_with_seal(&self, text: &str) -> bool {
        self.seal.is_match(text)
    }
}

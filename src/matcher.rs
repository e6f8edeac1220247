//! Picks the rule that handles a paragraph.

use std::collections::BTreeSet;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::fields::{FieldId, Registry, ValueMap};
use crate::options::FillOptions;
use crate::rules::{Catalog, Rule, RuleMatch, Slot, Strategy};

/// Clause boundaries used when looking for skip keywords around a label.
static CLAUSE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[，。；,;]|\s{2,}").expect("Invalid clause break regex"));

#[derive(Debug)]
pub enum Decision<'c> {
    /// First applicable rule, plus any rule of the same priority that
    /// matched the identical span.
    Fill {
        found: RuleMatch<'c>,
        rivals: Vec<&'c Rule>,
    },
    /// A label sits in a clause with a skip keyword; the paragraph is left
    /// alone.
    Bypass { rule: &'c Rule, keyword: String },
    Nothing,
}

pub struct Matcher<'e> {
    catalog: &'e Catalog,
    registry: &'e Registry,
    keywords: &'e [String],
    whitelist: &'e [String],
}

impl<'e> Matcher<'e> {
    pub fn new(catalog: &'e Catalog, registry: &'e Registry, options: &'e FillOptions) -> Self {
        Matcher {
            catalog,
            registry,
            keywords: &options.skip_keywords,
            whitelist: &options.skip_whitelist,
        }
    }

    /// `done` holds fields given up on in this paragraph. A slot whose
    /// field is done, or whose clause already holds the field's value, is
    /// dropped; a rule left without slots is treated as not matching.
    pub fn decide(&self, text: &str, done: &BTreeSet<FieldId>, values: &ValueMap) -> Decision<'e> {
        let mut candidates = self.catalog.candidates(text);
        let mut chosen = None;
        for rule in candidates.by_ref() {
            if let Some(found) = rule.find(text, self.registry)
                && let Some(found) = pending(found, text, done, values)
            {
                chosen = Some(found);
                break;
            }
        }
        let Some(found) = chosen else {
            return Decision::Nothing;
        };

        for slot in &found.slots {
            if let Some(keyword) = self.skip_keyword(text, &slot.label) {
                return Decision::Bypass { rule: found.rule, keyword };
            }
        }

        let span = found.span();
        let priority = found.rule.priority;
        let rivals = candidates
            .take_while(|r| r.priority == priority)
            .filter(|r| r.find(text, self.registry).is_some_and(|m| m.span() == span))
            .collect();
        Decision::Fill { found, rivals }
    }

    fn skip_keyword(&self, text: &str, label: &Range<usize>) -> Option<String> {
        let mut clause = clause_around(text, label).to_string();
        for phrase in self.whitelist.iter().filter(|p| !p.is_empty()) {
            clause = clause.replace(phrase.as_str(), "");
        }
        self.keywords
            .iter()
            .find(|k| !k.is_empty() && clause.contains(k.as_str()))
            .cloned()
    }
}

fn pending<'c>(
    mut found: RuleMatch<'c>,
    text: &str,
    done: &BTreeSet<FieldId>,
    values: &ValueMap,
) -> Option<RuleMatch<'c>> {
    let filled = |slot: &Slot| {
        let extent = slot.label.start.min(slot.span.start)..slot.label.end.max(slot.span.end);
        done.contains(&slot.field)
            || values
                .get(slot.field)
                .is_some_and(|v| clause_around(text, &extent).contains(v))
    };
    match found.rule.strategy {
        Strategy::MultiField | Strategy::ReplaceBracketed => {
            found.slots.retain(|s| !filled(s));
            (!found.slots.is_empty()).then_some(found)
        }
        _ => (!found.slots.iter().any(filled)).then_some(found),
    }
}

/// The stretch of `text` around `range` between clause breaks.
fn clause_around<'t>(text: &'t str, range: &Range<usize>) -> &'t str {
    let mut start = 0;
    let mut end = text.len();
    for cut in CLAUSE_BREAK.find_iter(text) {
        if cut.end() <= range.start {
            start = cut.end();
        } else if cut.start() >= range.end {
            end = cut.start();
            break;
        }
    }
    &text[start..end]
}

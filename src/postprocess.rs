//! Clean-up after a paragraph has been filled.

use std::collections::BTreeSet;

use crate::fields::{FieldId, Registry};
use crate::model::{Paragraph, Run};
use crate::rewrite::{self, Splice};
use crate::rules::Catalog;

fn is_space(c: char) -> bool {
    c == ' ' || c == '\u{3000}'
}

/// Shorten runs of more than `width` spaces to `width`. Leading indentation
/// and spacing in front of a seal annotation are kept. Returns the number
/// of runs shortened.
pub(crate) fn collapse_spacing(paragraph: &mut Paragraph, width: usize, catalog: &Catalog) -> usize {
    let text = paragraph.text();
    let mut splices = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if !is_space(c) {
            continue;
        }
        let mut count = 1;
        let mut cut = None;
        let mut end = start + c.len_utf8();
        while let Some(&(i, next)) = chars.peek() {
            if !is_space(next) {
                break;
            }
            if count == width {
                cut = Some(i);
            }
            count += 1;
            end = i + next.len_utf8();
            chars.next();
        }
        let Some(cut) = cut else {
            continue;
        };
        if text[..start].trim().is_empty() || catalog.starts_with_seal(&text[end..]) {
            continue;
        }
        splices.push(Splice {
            span: cut..end,
            text: String::new(),
            format: cut..end,
            keep_underline: true,
        });
    }

    let count = splices.len();
    if count == 0 {
        return 0;
    }
    match rewrite::apply(paragraph, splices) {
        Ok(()) => count,
        Err(anomaly) => {
            log::debug!("spacing left alone next to anchored run {}", anomaly.run);
            0
        }
    }
}

/// Drop runs the rewrite emptied. Runs that held anything besides text are
/// never dropped, and an element that carried a page-break marker keeps one
/// (empty) run for it.
pub(crate) fn compact(paragraph: &mut Paragraph) -> usize {
    let removable = |r: &Run| r.dirty && r.text.is_empty() && !r.anchored;
    let surviving: BTreeSet<usize> = paragraph
        .runs
        .iter()
        .filter(|r| !removable(r))
        .map(|r| r.origin)
        .collect();
    let mut carriers = BTreeSet::new();

    let before = paragraph.runs.len();
    paragraph.runs.retain(|r| {
        !removable(r)
            || (r.page_hint && !surviving.contains(&r.origin) && carriers.insert(r.origin))
    });
    before - paragraph.runs.len()
}

/// Known labels still followed by an unfilled placeholder.
pub(crate) fn residue(paragraph: &Paragraph, catalog: &Catalog, registry: &Registry) -> Vec<FieldId> {
    catalog.residue(&paragraph.text(), registry)
}

//! Run-level rewriting.
//!
//! A substitution is described as a [`Splice`] over the paragraph's
//! concatenated text. Applying it touches only the runs whose text
//! intersects the span: a single affected run is split into
//! prefix / value / suffix pieces, several affected runs keep the prefix
//! of the first and the suffix of the last, with the value placed in the
//! first and the ones in between emptied. Pieces reuse the original run
//! element and property markup; nothing is formatted that was not read.

use std::ops::Range;
use std::sync::Arc;

use crate::model::{Paragraph, Run, RunProps, same_format};
use crate::rules::{Slot, Strategy};

/// Spacing between an inserted value and a seal annotation that follows it.
pub(crate) const SEAL_GAP: &str = "    ";

/// Replace `span` with `text`. The inserted text takes the properties of
/// the run that overlaps `format` the most.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Splice {
    pub span: Range<usize>,
    pub text: String,
    pub format: Range<usize>,
    pub keep_underline: bool,
}

/// An affected run holds a field, drawing or other anchor.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Anomaly {
    pub run: usize,
}

/// A slot with the text decided for it.
#[derive(Clone, Debug)]
pub(crate) struct Planned {
    pub slot: Slot,
    pub text: String,
    pub keep_underline: bool,
}

/// Splice for a single-field strategy.
pub(crate) fn slot_splice(strategy: Strategy, planned: &Planned) -> Splice {
    let slot = &planned.slot;
    let format = match strategy {
        Strategy::FillPlaceholder | Strategy::FillPlaceholderPreserveSeal
            if !slot.span.is_empty() =>
        {
            slot.span.clone()
        }
        _ => slot.label.clone(),
    };
    let mut text = String::new();
    if slot.sep.is_none() && strategy != Strategy::ReplaceBracketed {
        text.push('：');
    }
    text.push_str(&planned.text);
    if strategy == Strategy::FillPlaceholderPreserveSeal && slot.seal_follows() {
        text.push_str(SEAL_GAP);
    }
    Splice {
        span: slot.span.clone(),
        text,
        format,
        keep_underline: planned.keep_underline,
    }
}

/// Share of the characters in `span` that sit in underlined runs.
pub(crate) fn underlined_share(paragraph: &Paragraph, span: &Range<usize>) -> f32 {
    let map = TextMap::new(&paragraph.runs);
    let total = map.text[span.clone()].chars().count();
    if total == 0 {
        return 0.0;
    }
    let underlined: usize = (0..paragraph.runs.len())
        .filter(|i| paragraph.runs[*i].is_underlined())
        .map(|i| map.overlap(i, span))
        .sum();
    underlined as f32 / total as f32
}

struct TextMap {
    text: String,
    bounds: Vec<Range<usize>>,
}

impl TextMap {
    fn new(runs: &[Run]) -> TextMap {
        let mut text = String::new();
        let bounds = runs
            .iter()
            .map(|r| {
                let start = text.len();
                text.push_str(&r.text);
                start..text.len()
            })
            .collect();
        TextMap { text, bounds }
    }

    /// Contiguous run indices touched by replacing `span`. Empty runs count
    /// when they sit strictly inside the span.
    fn affected(&self, span: &Range<usize>) -> Option<Range<usize>> {
        if span.is_empty() {
            return self.insertion_point(span.start).map(|i| i..i + 1);
        }
        let mut hits = self.bounds.iter().enumerate().filter(|(_, b)| {
            if b.is_empty() {
                b.start > span.start && b.start < span.end
            } else {
                b.start < span.end && b.end > span.start
            }
        });
        let first = hits.next()?.0;
        let last = hits.last().map_or(first, |(i, _)| i);
        Some(first..last + 1)
    }

    /// Run receiving text inserted at `pos`: the one holding the byte
    /// before it.
    fn insertion_point(&self, pos: usize) -> Option<usize> {
        if pos == 0 {
            return self.bounds.iter().position(|b| !b.is_empty());
        }
        self.bounds.iter().position(|b| b.start < pos && pos <= b.end)
    }

    /// Characters of `span` inside run `i`.
    fn overlap(&self, i: usize, span: &Range<usize>) -> usize {
        let b = &self.bounds[i];
        let lo = b.start.max(span.start);
        let hi = b.end.min(span.end);
        if lo >= hi { 0 } else { self.text[lo..hi].chars().count() }
    }

    /// Run overlapping `span` the most; the first wins ties.
    fn dominant(&self, span: &Range<usize>) -> Option<usize> {
        if span.is_empty() {
            return self.insertion_point(span.start);
        }
        let mut best: Option<(usize, usize)> = None;
        for i in 0..self.bounds.len() {
            let n = self.overlap(i, span);
            if n > 0 && best.is_none_or(|(_, m)| n > m) {
                best = Some((i, n));
            }
        }
        best.map(|(i, _)| i)
    }
}

/// Apply splices to a paragraph. Every splice is checked against anchored
/// runs before anything changes; then they are applied right to left so
/// earlier offsets stay valid. Splices must not overlap.
pub(crate) fn apply(paragraph: &mut Paragraph, mut splices: Vec<Splice>) -> Result<(), Anomaly> {
    let map = TextMap::new(&paragraph.runs);
    for splice in &splices {
        let Some(affected) = map.affected(&splice.span) else {
            continue;
        };
        if let Some(run) = affected.clone().find(|i| paragraph.runs[*i].anchored) {
            return Err(Anomaly { run });
        }
    }

    splices.sort_by(|a, b| {
        b.span
            .start
            .cmp(&a.span.start)
            .then(b.span.end.cmp(&a.span.end))
    });
    for splice in &splices {
        apply_one(paragraph, splice);
    }
    Ok(())
}

fn apply_one(paragraph: &mut Paragraph, splice: &Splice) {
    let map = TextMap::new(&paragraph.runs);
    if map.text[splice.span.clone()] == *splice.text {
        return;
    }
    let Some(affected) = map.affected(&splice.span) else {
        return;
    };
    let first = affected.start;
    let last = affected.end - 1;

    let source = map.dominant(&splice.format).unwrap_or(first);
    let props = match &paragraph.runs[source].props {
        Some(p) if !splice.keep_underline && p.fingerprint.is_underlined() => {
            Some(Arc::new(p.without_underline()))
        }
        other => other.clone(),
    };

    let lo = splice.span.start.saturating_sub(map.bounds[first].start);
    let hi = (splice.span.end.saturating_sub(map.bounds[last].start))
        .min(paragraph.runs[last].text.len());

    if first == last {
        let run = &paragraph.runs[first];
        let pieces = vec![
            (run.text[..lo].to_string(), run.props.clone()),
            (splice.text.clone(), props),
            (run.text[hi..].to_string(), run.props.clone()),
        ];
        replace_run(paragraph, first, pieces);
        return;
    }

    let tail = paragraph.runs[last].text[hi..].to_string();
    set_text(&mut paragraph.runs[last], tail);
    for run in &mut paragraph.runs[first + 1..last] {
        set_text(run, String::new());
    }
    let run = &paragraph.runs[first];
    let pieces = vec![
        (run.text[..lo].to_string(), run.props.clone()),
        (splice.text.clone(), props),
    ];
    replace_run(paragraph, first, pieces);
}

fn set_text(run: &mut Run, text: String) {
    if run.text != text {
        run.text = text;
        run.dirty = true;
    }
}

/// Replace run `index` by pieces of text, merging neighbours with equal
/// properties. A single piece formatted like the run edits it in place.
fn replace_run(
    paragraph: &mut Paragraph,
    index: usize,
    pieces: Vec<(String, Option<Arc<RunProps>>)>,
) {
    let mut merged: Vec<(String, Option<Arc<RunProps>>)> = Vec::new();
    for (text, props) in pieces.into_iter().filter(|(t, _)| !t.is_empty()) {
        match merged.last_mut() {
            Some((prev, prev_props)) if same_format(prev_props, &props) => prev.push_str(&text),
            _ => merged.push((text, props)),
        }
    }

    let original = &paragraph.runs[index];
    if merged.is_empty() {
        merged.push((String::new(), original.props.clone()));
    }
    if let [(text, props)] = merged.as_slice()
        && same_format(props, &original.props)
    {
        let text = text.clone();
        set_text(&mut paragraph.runs[index], text);
        return;
    }

    let runs: Vec<Run> = merged
        .into_iter()
        .map(|(text, props)| original.piece(text, props))
        .collect();
    paragraph.runs.splice(index..index + 1, runs);
}

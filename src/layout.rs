//! Lines carrying several fields.
//!
//! Dual-field lines (`电话          电子邮件`) and multi-field lines
//! (`电话：____    传真：____`) are filled slot by slot, then the whitespace
//! between consecutive filled values is set to exactly `width` spaces so the
//! line keeps its shape whatever the placeholder widths were.

use crate::rewrite::{Planned, Splice};
use crate::rules::Strategy;

/// Splices for a layout strategy. `planned` holds the slots that receive a
/// value, in line order.
pub(crate) fn splices(
    strategy: Strategy,
    text: &str,
    planned: &[Planned],
    width: usize,
) -> Vec<Splice> {
    match strategy {
        Strategy::DualFieldGap => dual(planned, width),
        _ => line(text, planned, width),
    }
}

fn separator(p: &Planned) -> &'static str {
    if p.slot.sep.is_some() { "" } else { "：" }
}

/// The first slot's span runs up to the second label, so its replacement
/// carries the gap.
fn dual(planned: &[Planned], width: usize) -> Vec<Splice> {
    let [a, b] = planned else {
        return planned
            .iter()
            .map(|p| Splice {
                span: p.slot.span.clone(),
                text: format!("{}{}", separator(p), p.text),
                format: p.slot.label.clone(),
                keep_underline: p.keep_underline,
            })
            .collect();
    };
    vec![
        Splice {
            span: a.slot.span.clone(),
            text: format!("{}{}{}", separator(a), a.text, " ".repeat(width)),
            format: a.slot.label.clone(),
            keep_underline: a.keep_underline,
        },
        Splice {
            span: b.slot.span.clone(),
            text: format!("{}{}", separator(b), b.text),
            format: b.slot.label.clone(),
            keep_underline: b.keep_underline,
        },
    ]
}

fn line(text: &str, planned: &[Planned], width: usize) -> Vec<Splice> {
    let mut out: Vec<Splice> = planned
        .iter()
        .map(|p| Splice {
            span: p.slot.span.clone(),
            text: p.text.clone(),
            format: if p.slot.span.is_empty() {
                p.slot.label.clone()
            } else {
                p.slot.span.clone()
            },
            keep_underline: p.keep_underline,
        })
        .collect();

    for pair in planned.windows(2) {
        let gap = pair[0].slot.span.end..pair[1].slot.label.start;
        let Some(between) = text.get(gap.clone()) else {
            continue;
        };
        if between.chars().count() < 2 || !between.chars().all(char::is_whitespace) {
            continue;
        }
        let first = between.chars().next().map_or(0, char::len_utf8);
        out.push(Splice {
            format: gap.start..gap.start + first,
            span: gap,
            text: " ".repeat(width),
            keep_underline: true,
        });
    }
    out
}

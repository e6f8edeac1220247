use std::ops::Range;
use std::sync::Arc;

/// Character formatting of a run, read from its direct `w:rPr` children.
/// Text content is not part of the fingerprint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub style: Option<String>,
    pub fonts: Option<String>,
    pub size: Option<String>,
    pub bold: bool,
    pub italic: bool,
    pub underline: Option<String>, // w:u/@w:val, None when absent or "none"
    pub strike: bool,
    pub color: Option<String>,
    pub highlight: Option<String>,
    pub vert_align: Option<String>,
}

impl Fingerprint {
    pub fn is_underlined(&self) -> bool {
        self.underline.is_some()
    }
}

/// A run property element exactly as it appeared in the part, plus the
/// fingerprint decoded from it.
#[derive(Clone, Debug, PartialEq)]
pub struct RunProps {
    pub(crate) markup: String,
    pub(crate) underline: Option<Range<usize>>, // byte range of w:u inside `markup`
    pub fingerprint: Fingerprint,
}

impl RunProps {
    /// Same properties with the `w:u` element removed. Nothing else in the
    /// markup is touched.
    pub(crate) fn without_underline(&self) -> RunProps {
        let Some(span) = self.underline.clone() else {
            return self.clone();
        };
        let mut markup = String::with_capacity(self.markup.len());
        markup.push_str(&self.markup[..span.start]);
        markup.push_str(&self.markup[span.end..]);
        let mut fingerprint = self.fingerprint.clone();
        fingerprint.underline = None;
        RunProps { markup, underline: None, fingerprint }
    }
}

pub(crate) fn same_format(a: &Option<Arc<RunProps>>, b: &Option<Arc<RunProps>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => Arc::ptr_eq(x, y) || x.markup == y.markup,
        _ => false,
    }
}

#[derive(Clone, Debug)]
pub struct Run {
    pub(crate) origin: usize,      // index into Paragraph::sources
    pub(crate) open_tag: Arc<str>, // e.g. `<w:r w:rsidR="00A1">`
    pub(crate) name: Arc<str>,     // qualified element name, e.g. `w:r`
    pub(crate) props: Option<Arc<RunProps>>,
    pub(crate) text: String,
    pub(crate) anchored: bool,
    pub(crate) page_hint: bool, // held a w:lastRenderedPageBreak
    pub(crate) dirty: bool,
}

impl Run {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.props
            .as_ref()
            .map(|p| p.fingerprint.clone())
            .unwrap_or_default()
    }

    pub fn is_underlined(&self) -> bool {
        self.props
            .as_ref()
            .is_some_and(|p| p.fingerprint.is_underlined())
    }

    /// True when the run holds something other than text (field characters,
    /// drawings, note references, ...). Such runs are never rewritten.
    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    /// A new piece split off this run: same element, same origin, given
    /// text and properties.
    pub(crate) fn piece(&self, text: String, props: Option<Arc<RunProps>>) -> Run {
        Run {
            origin: self.origin,
            open_tag: Arc::clone(&self.open_tag),
            name: Arc::clone(&self.name),
            props,
            text,
            anchored: false,
            page_hint: self.page_hint,
            dirty: true,
        }
    }

    /// Namespace prefix of the run element including the colon, or "".
    pub(crate) fn prefix(&self) -> &str {
        match self.name.find(':') {
            Some(i) => &self.name[..=i],
            None => "",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Paragraph {
    pub(crate) sources: Vec<Range<usize>>, // byte ranges of the original w:r elements
    pub(crate) runs: Vec<Run>,
}

impl Paragraph {
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn is_changed(&self) -> bool {
        self.runs.iter().any(|r| r.dirty) || self.runs.len() != self.sources.len()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Table {
    pub rows: Vec<Row>,
}

#[derive(Clone, Debug, Default)]
pub struct Row {
    pub cells: Vec<Cell>,
}

#[derive(Clone, Debug, Default)]
pub struct Cell {
    pub blocks: Vec<Block>,
}

#[derive(Clone, Debug)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoryKind {
    Body,
    Header,
    Footer,
}

/// The block content of one XML part: the document body, or one header or
/// footer.
#[derive(Clone, Debug)]
pub struct Story {
    pub kind: StoryKind,
    pub part: String,
    pub blocks: Vec<Block>,
}

impl Story {
    /// Paragraphs in document order, descending into tables.
    pub fn paragraphs(&self) -> Vec<&Paragraph> {
        let mut out = Vec::new();
        collect_paragraphs(&self.blocks, &mut out);
        out
    }

    pub fn is_changed(&self) -> bool {
        self.paragraphs().iter().any(|p| p.is_changed())
    }
}

fn collect_paragraphs<'a>(blocks: &'a [Block], out: &mut Vec<&'a Paragraph>) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => out.push(p),
            Block::Table(t) => {
                for cell in t.rows.iter().flat_map(|r| &r.cells) {
                    collect_paragraphs(&cell.blocks, out);
                }
            }
        }
    }
}

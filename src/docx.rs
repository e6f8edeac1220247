use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, Write};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::Error;
use crate::model::{
    Block, Cell, Fingerprint, Paragraph, Row, Run, RunProps, Story, StoryKind, Table,
};

const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const DOCUMENT_PART: &str = "word/document.xml";
const DOCUMENT_RELS: &str = "word/_rels/document.xml.rels";

fn is_wml(node: roxmltree::Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(WML_NS)
}

fn wml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children().find(|n| is_wml(*n, name))
}

fn wml_attr<'a>(node: roxmltree::Node<'a, 'a>, child: &str) -> Option<&'a str> {
    wml(node, child).and_then(|n| n.attribute((WML_NS, "val")))
}

/// Toggle property such as `<w:b/>` or `<w:b w:val="0"/>`.
fn wml_bool(parent: roxmltree::Node, name: &str) -> Option<bool> {
    wml(parent, name).map(|n| {
        !matches!(n.attribute((WML_NS, "val")), Some("0" | "false" | "off"))
    })
}

/// An opened word-processing package. The original archive bytes are kept so
/// that untouched entries can be copied verbatim on save.
pub struct Docx {
    source: Vec<u8>,
    parts: HashMap<String, String>,
    pub stories: Vec<Story>,
}

impl Docx {
    pub fn open(path: &Path) -> Result<Docx, Error> {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::Io(std::io::Error::new(e.kind(), format!("{}: {}", e, path.display())))
        })?;
        Docx::from_bytes(bytes)
    }

    pub fn from_bytes(source: Vec<u8>) -> Result<Docx, Error> {
        let mut zip = ZipArchive::new(Cursor::new(source.as_slice()))
            .map_err(|_| Error::InvalidDocx("file is not a ZIP archive".into()))?;

        let document = read_zip_text(&mut zip, DOCUMENT_PART)?.ok_or_else(|| {
            Error::InvalidDocx("missing word/document.xml (is this a DOCX file?)".into())
        })?;
        let rels = match read_zip_text(&mut zip, DOCUMENT_RELS)? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };

        let mut stories = vec![parse_story(DOCUMENT_PART, StoryKind::Body, &document)?];
        let references = section_references(&document, &rels)?;
        let mut parts = HashMap::new();
        parts.insert(DOCUMENT_PART.to_string(), document);

        // Section by section: its headers, then its footers.
        for (kind, name) in references {
            if parts.contains_key(&name) {
                continue;
            }
            let Some(xml) = read_zip_text(&mut zip, &name)? else {
                log::warn!("{name} is referenced by a section but missing from the package");
                continue;
            };
            stories.push(parse_story(&name, kind, &xml)?);
            parts.insert(name, xml);
        }
        drop(zip);

        Ok(Docx { source, parts, stories })
    }

    /// Serialise the package. Entries whose story did not change are copied
    /// raw (compressed bytes and order preserved); changed parts are
    /// re-encoded with their original compression method.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let updated = self.updated_parts();
        let mut zip = ZipArchive::new(Cursor::new(self.source.as_slice()))?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(self.source.len())));

        for i in 0..zip.len() {
            let file = zip.by_index_raw(i)?;
            match updated.get(file.name()) {
                Some(xml) => {
                    let name = file.name().to_string();
                    let options =
                        SimpleFileOptions::default().compression_method(file.compression());
                    drop(file);
                    log::debug!("rewriting {name}");
                    writer.start_file(name, options)?;
                    writer.write_all(xml.as_bytes())?;
                }
                None => writer.raw_copy_file(file)?,
            }
        }

        Ok(writer.finish()?.into_inner())
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|e| {
            Error::Write(std::io::Error::new(e.kind(), format!("{}: {}", e, path.display())))
        })
    }

    fn updated_parts(&self) -> HashMap<String, String> {
        let mut updated = HashMap::new();
        for story in &self.stories {
            let mut edits = Vec::new();
            block_edits(&story.blocks, &mut edits);
            if edits.is_empty() {
                continue;
            }
            let Some(xml) = self.parts.get(&story.part) else {
                continue;
            };
            updated.insert(story.part.clone(), splice(xml, edits));
        }
        updated
    }
}

fn read_zip_text<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, Error> {
    let mut file = match zip.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|_| Error::InvalidDocx(format!("{name} is not UTF-8 encoded")))
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, Error> {
    let doc = roxmltree::Document::parse(xml)?;
    let mut rels = HashMap::new();
    for node in doc.root_element().children() {
        if node.tag_name().name() == "Relationship"
            && let (Some(id), Some(target)) = (node.attribute("Id"), node.attribute("Target"))
        {
            rels.insert(id.to_string(), target.to_string());
        }
    }
    Ok(rels)
}

/// Header and footer parts referenced from every `w:sectPr`, as package
/// entry names. Sections come in document order; within a section headers
/// precede footers. A part shared by several sections is listed once.
fn section_references(
    document: &str,
    rels: &HashMap<String, String>,
) -> Result<Vec<(StoryKind, String)>, Error> {
    let doc = roxmltree::Document::parse(document)?;
    let mut refs: Vec<(StoryKind, String)> = Vec::new();

    for sect in doc.descendants().filter(|n| is_wml(*n, "sectPr")) {
        let headers = sect.children().filter(|n| is_wml(*n, "headerReference"));
        let footers = sect.children().filter(|n| is_wml(*n, "footerReference"));
        for child in headers.chain(footers) {
            let kind = if is_wml(child, "headerReference") {
                StoryKind::Header
            } else if is_wml(child, "footerReference") {
                StoryKind::Footer
            } else {
                continue;
            };
            let Some(target) = child.attribute((REL_NS, "id")).and_then(|id| rels.get(id)) else {
                continue;
            };
            let name = match target.strip_prefix('/') {
                Some(absolute) => absolute.to_string(),
                None => format!("word/{target}"),
            };
            if !refs.iter().any(|(_, n)| *n == name) {
                refs.push((kind, name));
            }
        }
    }
    Ok(refs)
}

pub(crate) fn parse_story(part: &str, kind: StoryKind, xml: &str) -> Result<Story, Error> {
    let doc = roxmltree::Document::parse(xml)?;
    let root = doc.root_element();
    let container = match kind {
        StoryKind::Body => {
            wml(root, "body").ok_or_else(|| Error::InvalidDocx("missing w:body".into()))?
        }
        StoryKind::Header | StoryKind::Footer => root,
    };
    Ok(Story {
        kind,
        part: part.to_string(),
        blocks: parse_blocks(container, xml),
    })
}

fn parse_blocks(container: roxmltree::Node, xml: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    for node in container.children() {
        if node.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        match node.tag_name().name() {
            "p" => blocks.push(Block::Paragraph(parse_paragraph(node, xml))),
            "tbl" => blocks.push(Block::Table(parse_table(node, xml))),
            "sdt" => {
                if let Some(content) = wml(node, "sdtContent") {
                    blocks.extend(parse_blocks(content, xml));
                }
            }
            "customXml" => blocks.extend(parse_blocks(node, xml)),
            _ => {}
        }
    }
    blocks
}

fn parse_table(node: roxmltree::Node, xml: &str) -> Table {
    let rows = node
        .children()
        .filter(|n| is_wml(*n, "tr"))
        .map(|tr| Row { cells: parse_cells(tr, xml) })
        .collect();
    Table { rows }
}

fn parse_cells(row: roxmltree::Node, xml: &str) -> Vec<Cell> {
    let mut cells = Vec::new();
    for child in row.children() {
        if is_wml(child, "tc") {
            cells.push(Cell { blocks: parse_blocks(child, xml) });
        } else if is_wml(child, "sdt")
            && let Some(content) = wml(child, "sdtContent")
        {
            cells.extend(parse_cells(content, xml));
        }
    }
    cells
}

fn parse_paragraph(node: roxmltree::Node, xml: &str) -> Paragraph {
    let mut paragraph = Paragraph::default();
    let mut field_depth = 0usize;
    collect_runs(node, xml, false, &mut field_depth, &mut paragraph);
    paragraph
}

fn collect_runs(
    parent: roxmltree::Node,
    xml: &str,
    in_simple_field: bool,
    field_depth: &mut usize,
    paragraph: &mut Paragraph,
) {
    for child in parent.children() {
        if child.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        match child.tag_name().name() {
            "r" => {
                let origin = paragraph.sources.len();
                let run = parse_run(child, xml, origin, in_simple_field, field_depth);
                paragraph.sources.push(child.range());
                paragraph.runs.push(run);
            }
            "hyperlink" | "smartTag" | "ins" | "moveTo" | "customXml" | "bdo" | "dir" => {
                collect_runs(child, xml, in_simple_field, field_depth, paragraph);
            }
            "sdt" => {
                if let Some(content) = wml(child, "sdtContent") {
                    collect_runs(content, xml, in_simple_field, field_depth, paragraph);
                }
            }
            "fldSimple" => collect_runs(child, xml, true, field_depth, paragraph),
            // w:del / w:moveFrom hold deleted text; it is not part of the visible line.
            _ => {}
        }
    }
}

fn parse_run(
    node: roxmltree::Node,
    xml: &str,
    origin: usize,
    in_simple_field: bool,
    field_depth: &mut usize,
) -> Run {
    let range = node.range();
    let open_tag = match node.first_child() {
        Some(first) => xml[range.start..first.range().start].to_string(),
        None => {
            let raw = xml[range.clone()].trim_end_matches("/>").trim_end();
            format!("{raw}>")
        }
    };
    let name = open_tag[1..]
        .split(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .next()
        .unwrap_or("w:r")
        .to_string();

    let mut anchored = in_simple_field || *field_depth > 0;
    let mut page_hint = false;
    let mut props = None;
    let mut text = String::new();

    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().namespace() != Some(WML_NS) {
            anchored = true;
            continue;
        }
        match child.tag_name().name() {
            "rPr" => props = Some(Arc::new(parse_run_props(child, xml))),
            "t" => text.push_str(child.text().unwrap_or("")),
            "tab" => text.push('\t'),
            "cr" => text.push('\n'),
            "br" => match child.attribute((WML_NS, "type")) {
                None | Some("textWrapping") => text.push('\n'),
                Some(_) => anchored = true,
            },
            "lastRenderedPageBreak" => page_hint = true,
            "fldChar" => {
                anchored = true;
                match child.attribute((WML_NS, "fldCharType")) {
                    Some("begin") => *field_depth += 1,
                    Some("end") => *field_depth = field_depth.saturating_sub(1),
                    _ => {}
                }
            }
            _ => anchored = true,
        }
    }

    Run {
        origin,
        open_tag: Arc::from(open_tag),
        name: Arc::from(name),
        props,
        text,
        anchored,
        page_hint,
        dirty: false,
    }
}

fn parse_run_props(rpr: roxmltree::Node, xml: &str) -> RunProps {
    let range = rpr.range();
    let markup = xml[range.clone()].to_string();

    let u = wml(rpr, "u");
    let underline = u
        .and_then(|n| n.attribute((WML_NS, "val")).or(Some("single")))
        .filter(|v| *v != "none")
        .map(str::to_string);
    let underline_span = u
        .filter(|_| underline.is_some())
        .map(|n| n.range().start - range.start..n.range().end - range.start);

    let fonts = wml(rpr, "rFonts").map(|n| {
        ["ascii", "eastAsia", "hAnsi", "cs", "asciiTheme", "eastAsiaTheme"]
            .iter()
            .map(|attr| n.attribute((WML_NS, *attr)).unwrap_or(""))
            .collect::<Vec<_>>()
            .join("|")
    });

    let fingerprint = Fingerprint {
        style: wml_attr(rpr, "rStyle").map(str::to_string),
        fonts,
        size: wml_attr(rpr, "sz").map(str::to_string),
        bold: wml_bool(rpr, "b").unwrap_or(false),
        italic: wml_bool(rpr, "i").unwrap_or(false),
        underline,
        strike: wml_bool(rpr, "strike").unwrap_or(false),
        color: wml_attr(rpr, "color").map(str::to_string),
        highlight: wml_attr(rpr, "highlight").map(str::to_string),
        vert_align: wml_attr(rpr, "vertAlign").map(str::to_string),
    };

    RunProps { markup, underline: underline_span, fingerprint }
}

pub(crate) struct Edit {
    range: Range<usize>,
    markup: String,
}

fn block_edits(blocks: &[Block], out: &mut Vec<Edit>) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => paragraph_edits(p, out),
            Block::Table(t) => {
                for cell in t.rows.iter().flat_map(|r| &r.cells) {
                    block_edits(&cell.blocks, out);
                }
            }
        }
    }
}

/// One edit per original `w:r` whose derived runs differ from it. A run that
/// was split becomes several sibling elements; a run that was compacted away
/// becomes an empty replacement.
fn paragraph_edits(paragraph: &Paragraph, out: &mut Vec<Edit>) {
    let mut groups: Vec<Vec<&Run>> = vec![Vec::new(); paragraph.sources.len()];
    for run in &paragraph.runs {
        groups[run.origin].push(run);
    }
    for (origin, group) in groups.iter().enumerate() {
        if group.len() == 1 && !group[0].dirty {
            continue;
        }
        // The page-break marker goes back once, into the first piece.
        let hint = group.iter().position(|r| r.page_hint);
        out.push(Edit {
            range: paragraph.sources[origin].clone(),
            markup: group
                .iter()
                .enumerate()
                .map(|(i, r)| run_markup(r, hint == Some(i)))
                .collect(),
        });
    }
}

pub(crate) fn splice(xml: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| std::cmp::Reverse(e.range.start));
    let mut out = xml.to_string();
    for edit in edits {
        out.replace_range(edit.range, &edit.markup);
    }
    out
}

fn run_markup(run: &Run, page_hint: bool) -> String {
    let prefix = run.prefix();
    let mut out = String::with_capacity(run.open_tag.len() + run.text.len() + 64);
    out.push_str(&run.open_tag);
    if let Some(props) = &run.props {
        out.push_str(&props.markup);
    }
    if page_hint {
        out.push_str(&format!("<{prefix}lastRenderedPageBreak/>"));
    }

    let mut pending = String::new();
    for ch in run.text.chars() {
        match ch {
            '\t' | '\n' => {
                push_text(&mut out, prefix, &pending);
                pending.clear();
                let element = if ch == '\t' { "tab" } else { "br" };
                out.push_str(&format!("<{prefix}{element}/>"));
            }
            _ => pending.push(ch),
        }
    }
    push_text(&mut out, prefix, &pending);

    out.push_str("</");
    out.push_str(&run.name);
    out.push('>');
    out
}

fn push_text(out: &mut String, prefix: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    out.push_str(&format!("<{prefix}t xml:space=\"preserve\">"));
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out.push_str(&format!("</{prefix}t>"));
}

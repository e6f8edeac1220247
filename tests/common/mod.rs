//! In-memory DOCX fixtures and output inspection shared by the integration
//! tests.
#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

use bidfill::{Error, FieldId, FillOptions, Stats, ValueMap};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NAMESPACES: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;

pub const DOCUMENT: &str = "word/document.xml";
pub const STYLES: &str = "word/styles.xml";
pub const HEADER: &str = "word/header1.xml";
pub const FOOTER: &str = "word/footer1.xml";

pub const ITALIC_UNDERLINE: &str = r#"<w:i/><w:u w:val="single"/>"#;
pub const UNDERLINE: &str = r#"<w:u w:val="single"/>"#;

pub fn run(text: &str) -> String {
    format!(r#"<w:r><w:t xml:space="preserve">{text}</w:t></w:r>"#)
}

pub fn styled(rpr: &str, text: &str) -> String {
    format!(r#"<w:r><w:rPr>{rpr}</w:rPr><w:t xml:space="preserve">{text}</w:t></w:r>"#)
}

pub fn para(runs: &[String]) -> String {
    format!(r#"<w:p><w:pPr><w:jc w:val="left"/></w:pPr>{}</w:p>"#, runs.concat())
}

pub fn text_para(text: &str) -> String {
    para(&[run(text)])
}

/// One-row table, one cell per entry.
pub fn table(cells: &[String]) -> String {
    let cells: String = cells
        .iter()
        .map(|c| format!(r#"<w:tc><w:tcPr><w:tcW w:w="4000" w:type="dxa"/></w:tcPr>{c}</w:tc>"#))
        .collect();
    format!("<w:tbl><w:tblPr/><w:tr>{cells}</w:tr></w:tbl>")
}

#[derive(Default)]
pub struct Template {
    body: Vec<String>,
    header: Option<String>,
    footer: Option<String>,
}

impl Template {
    pub fn new() -> Template {
        Template::default()
    }

    pub fn block(mut self, xml: impl Into<String>) -> Template {
        self.body.push(xml.into());
        self
    }

    pub fn text(self, text: &str) -> Template {
        self.block(text_para(text))
    }

    pub fn header(mut self, xml: impl Into<String>) -> Template {
        self.header = Some(xml.into());
        self
    }

    pub fn footer(mut self, xml: impl Into<String>) -> Template {
        self.footer = Some(xml.into());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut rels = vec![(
            "rIdS",
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles",
            "styles.xml",
        )];
        let mut refs = String::new();
        if self.header.is_some() {
            rels.push((
                "rIdH",
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header",
                "header1.xml",
            ));
            refs.push_str(r#"<w:headerReference w:type="default" r:id="rIdH"/>"#);
        }
        if self.footer.is_some() {
            rels.push((
                "rIdF",
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer",
                "footer1.xml",
            ));
            refs.push_str(r#"<w:footerReference w:type="default" r:id="rIdF"/>"#);
        }

        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document {NAMESPACES}><w:body>{}<w:sectPr>{refs}<w:pgSz w:w="11906" w:h="16838"/></w:sectPr></w:body></w:document>"#,
            self.body.concat()
        );
        let relationships: String = rels
            .iter()
            .map(|(id, kind, target)| {
                format!(r#"<Relationship Id="{id}" Type="{kind}" Target="{target}"/>"#)
            })
            .collect();
        let document_rels = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{relationships}</Relationships>"#
        );

        let mut entries: Vec<(&str, String, CompressionMethod)> = vec![
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#.to_string(),
                CompressionMethod::Deflated,
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#.to_string(),
                CompressionMethod::Deflated,
            ),
            (DOCUMENT, document, CompressionMethod::Deflated),
            ("word/_rels/document.xml.rels", document_rels, CompressionMethod::Deflated),
            (
                STYLES,
                format!(r#"<w:styles {NAMESPACES}><w:docDefaults/></w:styles>"#),
                CompressionMethod::Stored,
            ),
        ];
        if let Some(header) = &self.header {
            entries.push((HEADER, format!("<w:hdr {NAMESPACES}>{header}</w:hdr>"), CompressionMethod::Deflated));
        }
        if let Some(footer) = &self.footer {
            entries.push((FOOTER, format!("<w:ftr {NAMESPACES}>{footer}</w:ftr>"), CompressionMethod::Deflated));
        }

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content, method) in entries {
            zip.start_file(name, SimpleFileOptions::default().compression_method(method))
                .unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }
}

pub fn values(pairs: &[(FieldId, &str)]) -> ValueMap {
    pairs.iter().map(|(f, v)| (*f, *v)).collect()
}

/// Run the public `fill` entry point through files in a temporary directory.
/// The output bytes are `None` when no output file was written.
pub fn fill_bytes(
    input: &[u8],
    values: &ValueMap,
    options: &FillOptions,
) -> (Result<Stats, Error>, Option<Vec<u8>>) {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("template.docx");
    let output_path = dir.path().join("filled.docx");
    std::fs::write(&input_path, input).unwrap();
    let result = bidfill::fill(&input_path, &output_path, values, options);
    let output = std::fs::read(&output_path).ok();
    (result, output)
}

/// `fill_bytes` for tests that expect success.
pub fn fill_ok(input: &[u8], values: &ValueMap, options: &FillOptions) -> (Stats, Vec<u8>) {
    let (result, output) = fill_bytes(input, values, options);
    (result.unwrap(), output.unwrap())
}

pub fn entry(bytes: &[u8], name: &str) -> Option<String> {
    let mut zip = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = zip.by_name(name).ok()?;
    let mut out = String::new();
    file.read_to_string(&mut out).unwrap();
    Some(out)
}

pub fn entry_names(bytes: &[u8]) -> Vec<String> {
    let zip = ZipArchive::new(Cursor::new(bytes)).unwrap();
    zip.file_names().map(str::to_string).collect::<Vec<_>>()
}

/// Raw (still compressed) bytes and compression method of an entry.
pub fn raw_entry(bytes: &[u8], name: &str) -> (Vec<u8>, CompressionMethod) {
    let mut zip = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let index = zip.index_for_name(name).unwrap();
    let mut file = zip.by_index_raw(index).unwrap();
    let method = file.compression();
    let mut raw = Vec::new();
    file.read_to_end(&mut raw).unwrap();
    (raw, method)
}

fn is_w(node: roxmltree::Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(W_NS)
}

/// Visible text of every paragraph in a part.
pub fn paragraphs(xml: &str) -> Vec<String> {
    let doc = roxmltree::Document::parse(xml).unwrap();
    doc.descendants()
        .filter(|n| is_w(*n, "p"))
        .map(|p| {
            p.descendants()
                .filter_map(|n| {
                    if is_w(n, "t") {
                        Some(n.text().unwrap_or("").to_string())
                    } else if is_w(n, "tab") {
                        Some("\t".to_string())
                    } else {
                        None
                    }
                })
                .collect()
        })
        .collect()
}

#[derive(Debug, PartialEq)]
pub struct RunInfo {
    pub text: String,
    pub italic: bool,
    pub underline: bool,
}

/// Runs of the `index`-th paragraph of a part.
pub fn runs(xml: &str, index: usize) -> Vec<RunInfo> {
    let doc = roxmltree::Document::parse(xml).unwrap();
    let p = doc.descendants().filter(|n| is_w(*n, "p")).nth(index).unwrap();
    p.descendants()
        .filter(|n| is_w(*n, "r"))
        .map(|r| {
            let rpr = r.children().find(|n| is_w(*n, "rPr"));
            let has = |name: &str| rpr.is_some_and(|rpr| rpr.children().any(|n| is_w(n, name)));
            RunInfo {
                text: r
                    .children()
                    .filter(|n| is_w(*n, "t"))
                    .map(|t| t.text().unwrap_or(""))
                    .collect(),
                italic: has("i"),
                underline: has("u"),
            }
        })
        .collect()
}

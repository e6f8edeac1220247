//! Show how a DOCX template is split into runs and which rule would fill
//! each paragraph.
//!
//! Usage:
//!   docx-runs <file.docx>              every paragraph with a rule or label
//!   docx-runs <file.docx> --all        every non-empty paragraph
//!   docx-runs <file.docx> --grep <s>   paragraphs containing <s>

use std::path::Path;

use bidfill::{Docx, Engine, FillOptions, Run};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage:");
        eprintln!("  docx-runs <file.docx>              paragraphs a rule would fill");
        eprintln!("  docx-runs <file.docx> --all        every non-empty paragraph");
        eprintln!("  docx-runs <file.docx> --grep <s>   paragraphs containing <s>");
        std::process::exit(1);
    }

    let docx = Docx::open(Path::new(&args[1])).unwrap_or_else(|e| {
        eprintln!("Cannot open '{}': {e}", args[1]);
        std::process::exit(1);
    });
    let engine = Engine::new(&FillOptions::default()).unwrap_or_else(|e| {
        eprintln!("{e}");
        std::process::exit(1);
    });

    let filter = match args.get(2).map(String::as_str) {
        None => Filter::Matched,
        Some("--all") => Filter::All,
        Some("--grep") => Filter::Grep(args.get(3).cloned().unwrap_or_else(|| {
            eprintln!("--grep requires a pattern");
            std::process::exit(1);
        })),
        Some(other) => {
            eprintln!("unknown option '{other}'");
            std::process::exit(1);
        }
    };

    let mut index = 0;
    for story in &docx.stories {
        for paragraph in story.paragraphs() {
            let text = paragraph.text();
            let rule = engine.explain(&text);
            let show = match &filter {
                Filter::Matched => rule.is_some(),
                Filter::All => !text.trim().is_empty(),
                Filter::Grep(s) => text.contains(s.as_str()),
            };
            if show {
                println!("{} #{index}  {}", story.part, rule.as_deref().unwrap_or("-"));
                for run in paragraph.runs() {
                    println!("    {}", describe(run));
                }
            }
            index += 1;
        }
    }
}

enum Filter {
    Matched,
    All,
    Grep(String),
}

fn describe(run: &Run) -> String {
    let fp = run.fingerprint();
    let mut flags = Vec::new();
    if let Some(style) = &fp.style {
        flags.push(format!("style={style}"));
    }
    if let Some(size) = &fp.size {
        flags.push(format!("sz={size}"));
    }
    if fp.bold {
        flags.push("b".to_string());
    }
    if fp.italic {
        flags.push("i".to_string());
    }
    if let Some(u) = &fp.underline {
        flags.push(format!("u={u}"));
    }
    if fp.strike {
        flags.push("strike".to_string());
    }
    if let Some(color) = &fp.color {
        flags.push(format!("color={color}"));
    }
    if run.is_anchored() {
        flags.push("anchored".to_string());
    }
    format!("{:?}  [{}]", run.text(), flags.join(" "))
}

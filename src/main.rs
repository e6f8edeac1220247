use bidfill::{FillOptions, OnMissing, Registry, ValueMap, load_record};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bidfill", about = "Fill company and project details into a DOCX bid template")]
struct Args {
    /// Template DOCX file
    input: PathBuf,
    /// Output DOCX file
    output: PathBuf,
    /// Company record (JSON object)
    company: PathBuf,
    /// Project record (JSON object)
    project: PathBuf,
    /// Options file (JSON); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// What to write when a field has no value: skip, literal or blank
    #[arg(long)]
    on_missing: Option<OnMissing>,
    /// Spaces between fields sharing a line
    #[arg(long)]
    spacing: Option<usize>,
    /// Keep placeholder underline on inserted values
    #[arg(long)]
    preserve_underline: bool,
    /// Fail, writing nothing, when unfilled labels remain
    #[arg(long)]
    strict: bool,
    /// Print statistics as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn run(args: &Args) -> Result<(), bidfill::Error> {
    let mut options = match &args.config {
        Some(path) => FillOptions::load(path)?,
        None => FillOptions::default(),
    };
    if let Some(policy) = args.on_missing {
        options.on_missing = policy;
    }
    if let Some(width) = args.spacing {
        options.collapse_spacing_width = width;
    }
    options.preserve_underline |= args.preserve_underline;
    options.strict |= args.strict;

    let company = load_record(&args.company)?;
    let project = load_record(&args.project)?;
    let registry = Registry::standard().with_extra_aliases(&options.extra_aliases);
    let values = ValueMap::from_records(&registry, &company, &project);

    let stats = bidfill::fill(&args.input, &args.output, &values, &options)?;

    for warning in &stats.warnings {
        eprintln!("warning: {warning}");
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        eprintln!(
            "{} substitution(s) in {} paragraph(s); {} table(s), {} header(s), {} footer(s) changed",
            stats.total_substitutions,
            stats.paragraphs_changed,
            stats.tables_changed,
            stats.headers_changed,
            stats.footers_changed
        );
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if !args.input.is_file() {
        eprintln!("Error: file not found: {}", args.input.display());
        std::process::exit(1);
    }

    if let Err(e) = run(&args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

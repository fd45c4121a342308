//! pdf-analyzer - Extract tables and page text from PDF files
//!
//! Tables go to `<name>_tables.xlsx`, one sheet per table; page text goes
//! to `<name>_text.txt`.

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use pdf_analyzer::{
    ActionReport, ExtractionOptions, FileDetails, LayoutDetector, PageRange, Session, SourceInput,
    TableDetector, TabulaConfig, TabulaDetector,
};
use serde::Serialize;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit status when the action ran but produced nothing to write
const EXIT_NOTHING_FOUND: u8 = 2;

/// Which engine finds tables
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum Engine {
    /// Built-in detector reading ruling lines and text positions
    #[default]
    Native,
    /// tabula-java, run through the Java runtime
    Tabula,
}

#[derive(Parser, Debug)]
#[command(name = "pdf-analyzer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Use debug logging level
    #[arg(short = 'd', long, global = true, action = ArgAction::SetTrue)]
    debug: bool,

    /// Print a JSON summary instead of plain text
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract tables into a spreadsheet, retrying pages with other options
    Tables {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        output: OutputArgs,

        /// Do not assume ruled (bordered) tables
        #[arg(long = "no-lattice", action = ArgAction::SetTrue)]
        no_lattice: bool,

        /// Assume borderless, whitespace-separated tables
        #[arg(long, action = ArgAction::SetTrue)]
        stream: bool,

        /// Do not auto-detect table areas
        #[arg(long = "no-guess", action = ArgAction::SetTrue)]
        no_guess: bool,
    },
    /// Extract page text and tables (site information)
    SiteInfo {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Show file details after the validity check
    Info {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// PDF file, or "-" to read it from stdin
    pdf: String,

    /// File name to use for a PDF read from stdin
    #[arg(long, default_value = "stdin.pdf")]
    name: String,
}

#[derive(Args, Debug)]
struct RangeArgs {
    /// First page (1-indexed)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    start: u32,

    /// Last page (inclusive)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    end: u32,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Directory the artifacts are written to
    #[arg(short = 'o', long = "out-dir", default_value = ".")]
    out_dir: PathBuf,

    /// Table detection engine
    #[arg(long, value_enum, default_value = "native")]
    engine: Engine,

    /// Path to the tabula-java standalone jar
    #[arg(long = "tabula-jar", default_value = "tabula.jar")]
    tabula_jar: PathBuf,

    /// Java executable used by the tabula engine
    #[arg(long, default_value = "java")]
    java: PathBuf,
}

/// One sheet in the JSON summary
#[derive(Serialize)]
struct SheetSummary<'a> {
    label: &'a str,
    page: u32,
    rows: usize,
    columns: usize,
}

#[derive(Serialize)]
struct Summary<'a> {
    file: &'a FileDetails,
    pages: String,
    text_pages: Vec<u32>,
    sheets: Vec<SheetSummary<'a>>,
    written: &'a [PathBuf],
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// An extraction the session runs
enum Action {
    Tables(ExtractionOptions),
    SiteInfo,
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let (input, range, output, action) = match &cli.command {
        Command::Info { input } => {
            let mut session = Session::new().context("failed to create session")?;
            let details = session.inspect(&read_input(input)?)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&details)?);
            } else {
                println!("{}", details);
            }
            return Ok(ExitCode::SUCCESS);
        }
        Command::Tables {
            input,
            range,
            output,
            no_lattice,
            stream,
            no_guess,
        } => {
            let options = ExtractionOptions::new(!no_lattice, *stream, !no_guess);
            (input, range, output, Action::Tables(options))
        }
        Command::SiteInfo {
            input,
            range,
            output,
        } => (input, range, output, Action::SiteInfo),
    };

    let source = read_input(input)?;
    let range = PageRange::new(range.start, range.end).context("invalid page range")?;
    let report = match output.engine {
        Engine::Native => execute(LayoutDetector::default(), &source, range, action)?,
        Engine::Tabula => {
            let config = TabulaConfig {
                java: output.java.clone(),
                jar: output.tabula_jar.clone(),
                ..TabulaConfig::default()
            };
            execute(TabulaDetector::new(config), &source, range, action)?
        }
    };

    let mut written = Vec::new();
    for artifact in report.artifacts() {
        let path = artifact
            .save_to(&output.out_dir)
            .with_context(|| format!("failed to write {}", artifact.file_name))?;
        written.push(path);
    }

    if cli.json {
        print_json(&report, &written)?;
    } else {
        print_report(&report, &written);
    }

    if written.is_empty() {
        eprintln!("No tables or text found in pages {}", report.range);
        return Ok(ExitCode::from(EXIT_NOTHING_FOUND));
    }
    Ok(ExitCode::SUCCESS)
}

fn execute<D: TableDetector>(
    detector: D,
    input: &SourceInput,
    range: PageRange,
    action: Action,
) -> Result<ActionReport> {
    let mut session = Session::with_detector(detector).context("failed to create session")?;
    let report = match action {
        Action::Tables(options) => session
            .extract_tables(input, range, options)
            .context("table extraction failed")?,
        Action::SiteInfo => session
            .extract_site_info(input, range)
            .context("site information extraction failed")?,
    };
    Ok(report)
}

fn read_input(input: &InputArgs) -> Result<SourceInput> {
    if input.pdf == "-" {
        let mut bytes = Vec::new();
        io::stdin()
            .read_to_end(&mut bytes)
            .context("failed to read PDF from stdin")?;
        return Ok(SourceInput::Upload {
            name: input.name.clone(),
            bytes,
        });
    }
    Ok(SourceInput::Path(PathBuf::from(&input.pdf)))
}

fn print_report(report: &ActionReport, written: &[PathBuf]) {
    println!("{}", report.details);
    println!("Page range: {}", report.range);
    println!();

    if !report.pages.is_empty() {
        println!("Text extracted from {} page(s)", report.pages.len());
    }
    for (label, table) in &report.tables {
        println!(
            "{:<20} page {:>3}  {} rows x {} columns",
            label,
            table.page,
            table.height(),
            table.width()
        );
    }

    if !written.is_empty() {
        println!();
        for path in written {
            println!("Wrote {}", path.display());
        }
    }
}

fn print_json(report: &ActionReport, written: &[PathBuf]) -> Result<()> {
    let summary = Summary {
        file: &report.details,
        pages: report.range.to_string(),
        text_pages: report.pages.iter().map(|p| p.page).collect(),
        sheets: report
            .tables
            .iter()
            .map(|(label, table)| SheetSummary {
                label,
                page: table.page,
                rows: table.height(),
                columns: table.width(),
            })
            .collect(),
        written,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

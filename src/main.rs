use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use ocr_corpus_clean::config::builtin_names;
use ocr_corpus_clean::logging::init_logging;
use ocr_corpus_clean::{
    resolve_profile, run_clean, run_grade, run_heal, run_reclean, ChapterStore, PipelineError, ProfileError,
    RecordError, RunOptions, RunReport, StoreError,
};

const EXIT_APPROVED: i32 = 0;
const EXIT_NOT_APPROVED: i32 = 1;
const EXIT_PROFILE: i32 = 2;
const EXIT_INPUT: i32 = 3;
const EXIT_WRITE: i32 = 6;

#[derive(Parser, Debug)]
#[command(name = "ocrclean", version, about = "Clean OCR contamination from historical corpora")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean a raw OCR dump into chapter records.
    Clean {
        /// Built-in profile name or path to a profile YAML.
        #[arg(long)]
        profile: String,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// Re-run paragraph cleaning over stored chapter records.
    Reclean {
        #[arg(long)]
        profile: String,
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// Merge paragraphs split at page boundaries.
    Heal {
        #[arg(long)]
        profile: String,
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// Grade stored chapters without modifying them.
    Grade {
        #[arg(long)]
        profile: String,
        #[arg(long)]
        dir: PathBuf,
    },
    /// List built-in profiles.
    Profiles,
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ProfileError>().is_some() {
        return EXIT_PROFILE;
    }
    if err.downcast_ref::<RecordError>().is_some() || err.downcast_ref::<std::io::Error>().is_some() {
        return EXIT_INPUT;
    }
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::Store(StoreError::Record(_)))
        | Some(PipelineError::Store(StoreError::Enumerate(_))) => EXIT_INPUT,
        Some(PipelineError::Store(_)) => EXIT_WRITE,
        None => EXIT_INPUT,
    }
}

fn summarize(report: &RunReport) -> i32 {
    eprintln!(
        "{}",
        serde_json::json!({
            "tool": report.mode,
            "profile": report.profile,
            "status": report.status,
            "chapters": report.chapters.len(),
            "failed": report.stats.chapters_failed,
            "paragraphs": report.stats.paragraphs_emitted,
            "dropped": report.stats.paragraphs_dropped,
            "output_sha256": report.output_sha256,
        })
    );
    if report.approved {
        EXIT_APPROVED
    } else {
        EXIT_NOT_APPROVED
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let report = match cli.command {
        Command::Profiles => {
            for name in builtin_names() {
                println!("{}", name);
            }
            return Ok(EXIT_APPROVED);
        }
        Command::Clean { profile, input, out, dry_run } => {
            let profile = resolve_profile(&profile)?;
            let bytes = std::fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
            run_clean(&bytes, &ChapterStore::new(out), &profile, &RunOptions { dry_run })?
        }
        Command::Reclean { profile, dir, dry_run } => {
            let profile = resolve_profile(&profile)?;
            run_reclean(&ChapterStore::new(dir), &profile, &RunOptions { dry_run })?
        }
        Command::Heal { profile, dir, dry_run } => {
            let profile = resolve_profile(&profile)?;
            run_heal(&ChapterStore::new(dir), &profile, &RunOptions { dry_run })?
        }
        Command::Grade { profile, dir } => {
            let profile = resolve_profile(&profile)?;
            let report = run_grade(&ChapterStore::new(&dir), &profile)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            report
        }
    };
    Ok(summarize(&report))
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("{}", serde_json::json!({ "tool": "ocrclean", "error": format!("{:#}", e), "error_code": code }));
            code
        }
    };
    std::process::exit(code);
}

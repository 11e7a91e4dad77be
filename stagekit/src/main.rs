//! `stagekit`: inspect a research project's layout and resolve stage contexts.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;

use stagekit::core::context::RuleContext;
use stagekit::error::{ResolveError, find_resolve_error};
use stagekit::exit_codes;
use stagekit::io::export::write_stata_paths;
use stagekit::io::layout::output_files;
use stagekit::io::root::{default_markers, find_project_root};
use stagekit::io::stats::run_stats;
use stagekit::logging;
use stagekit::project::Project;
use stagekit::rule::{RuleRequest, list_rules, resolve_rule_context};
use stagekit::stage::{StageOptions, setup_stage};

#[derive(Parser)]
#[command(
    name = "stagekit",
    version,
    about = "Resolve project paths and rule contexts for pipeline stages"
)]
struct Cli {
    /// Start the project root search here (default: working directory).
    #[arg(long, global = true)]
    start: Option<PathBuf>,

    /// Root marker file or folder; repeat to give several (default: .git,
    /// pyproject.toml, setup.py, .project_root, requirements.txt, manage.py).
    #[arg(long = "marker", global = true)]
    markers: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the project root.
    Root,
    /// Print the path namespace (one `key<TAB>path` per line).
    Paths {
        #[arg(long)]
        json: bool,
    },
    /// Print the file registry (one `key<TAB>path` per line).
    Files {
        #[arg(long)]
        json: bool,
    },
    /// List rule names declared in the workflow file.
    Rules,
    /// Resolve a rule context and print it as JSON.
    Context {
        /// Rule name (default: stem of --caller).
        rule: Option<String>,
        /// Path of the calling script.
        #[arg(long)]
        caller: Option<PathBuf>,
        /// JSON file holding a context injected by the workflow engine.
        #[arg(long = "context")]
        context_file: Option<PathBuf>,
        /// Attach the stage log file, as a stage does at startup.
        #[arg(long)]
        log: bool,
    },
    /// List files in a stage folder's `output` directory.
    Outputs { folder: String },
    /// Write `create_paths.do` with one Stata global per path.
    ExportStata,
    /// Run a do-file through the statistical runtime.
    Stats {
        script: PathBuf,
        args: Vec<String>,
        /// Log file name without extension (default: script stem).
        #[arg(long)]
        log_name: Option<String>,
    },
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match find_resolve_error(err) {
        Some(ResolveError::RootNotFound { .. }) => exit_codes::ROOT_NOT_FOUND,
        Some(ResolveError::RuleNotFound { .. }) => exit_codes::RULE_NOT_FOUND,
        _ => exit_codes::INVALID,
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let markers = if cli.markers.is_empty() {
        default_markers()
    } else {
        cli.markers.clone()
    };
    let start = match &cli.start {
        Some(start) => start.clone(),
        None => std::env::current_dir().context("read working directory")?,
    };

    match cli.command {
        Command::Root => {
            logging::init("warn");
            let root = find_project_root(&start, &markers)?;
            println!("{}", root.display());
        }
        Command::Paths { json } => {
            let project = open_project(&start, &markers)?;
            print_entries(project.namespace.entries(), json)?;
        }
        Command::Files { json } => {
            let project = open_project(&start, &markers)?;
            let entries = project
                .files
                .iter()
                .map(|(key, path)| (key.to_string(), path.to_path_buf()))
                .collect();
            print_entries(entries, json)?;
        }
        Command::Rules => {
            let project = open_project(&start, &markers)?;
            for rule in list_rules(&project)? {
                println!("{rule}");
            }
        }
        Command::Context {
            rule,
            caller,
            context_file,
            log,
        } => {
            let injected = context_file.as_deref().map(read_context).transpose()?;
            let request = RuleRequest { rule, caller };
            let resolved = if log {
                let options = StageOptions {
                    start: cli.start.clone(),
                    markers: Some(markers),
                    request,
                    injected,
                    log: true,
                };
                setup_stage(options)?.context
            } else {
                let project = open_project(&start, &markers)?;
                resolve_rule_context(injected, &request, &project)?
            };
            println!("{}", to_json(&resolved)?);
        }
        Command::Outputs { folder } => {
            let project = open_project(&start, &markers)?;
            let Some(dirs) = project.namespace.stage(&folder) else {
                bail!("'{folder}' is not a stage folder in the path namespace");
            };
            for file in output_files(&dirs.base)? {
                println!("{file}");
            }
        }
        Command::ExportStata => {
            let project = open_project(&start, &markers)?;
            let path = write_stata_paths(&project.root, &project.namespace)?;
            println!("{}", path.display());
        }
        Command::Stats {
            script,
            args,
            log_name,
        } => {
            let project = open_project(&start, &markers)?;
            let run = run_stats(&script, &args, log_name.as_deref(), &project.config.stats)?;
            std::io::stdout()
                .write_all(&run.output.stdout.bytes)
                .context("write stdout")?;
            std::io::stderr()
                .write_all(&run.output.stderr.bytes)
                .context("write stderr")?;
            if !run.output.success() {
                eprintln!(
                    "statistical runtime failed (exit {:?}, timed out: {}); log: {}",
                    run.output.status.code(),
                    run.output.timed_out,
                    run.invocation.log_file.display()
                );
                return Ok(exit_codes::RUNTIME_FAILED);
            }
        }
    }
    Ok(exit_codes::OK)
}

fn open_project(start: &Path, markers: &[String]) -> Result<Project> {
    let project = Project::discover(start, Some(markers))?;
    logging::init(&project.config.log.level);
    Ok(project)
}

fn read_context(path: &Path) -> Result<RuleContext> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse rule context {}", path.display()))
}

fn print_entries(entries: Vec<(String, PathBuf)>, json: bool) -> Result<()> {
    if json {
        let map: BTreeMap<String, PathBuf> = entries.into_iter().collect();
        println!("{}", to_json(&map)?);
        return Ok(());
    }
    for (key, path) in entries {
        println!("{key}\t{}", path.display());
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("serialize json")
}

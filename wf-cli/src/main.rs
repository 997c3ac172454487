//! `wf` CLI: start, resume, and list workflow sessions from the command line.
//!
//! Subcommands: `run` (start a spec against fresh inputs), `resume`
//! (continue a paused session, optionally supplying a HITL response),
//! `sessions` (list known sessions, optionally filtered by status),
//! `cleanup` (delete sessions past a configurable age, spec.md §3 Lifecycle).

mod log_format;
mod logging;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use uuid::Uuid;
use wf_core::agent_runner::AgentRunner;
use wf_core::dispatcher::{Dispatcher, RunResult};
use wf_core::pattern::HitlResponse;
use wf_core::session::{FileSessionStore, SessionFilter, SessionStatus};
use wf_core::spec::Spec;
use wf_providers::RuntimeClientFactory;

#[derive(Parser, Debug)]
#[command(name = "wf")]
#[command(about = "wf — run declarative multi-agent workflow specs from the CLI")]
struct Args {
    #[command(subcommand)]
    cmd: Command,

    /// Verbose: log session create/load/dispatch at info level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output the run result as JSON instead of a human-readable summary
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new run from a spec file
    Run(RunArgs),
    /// Resume a paused session
    Resume(ResumeArgs),
    /// List known sessions
    Sessions(SessionsArgs),
    /// Delete sessions older than a configurable age
    Cleanup(CleanupArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Path to the workflow spec (YAML)
    spec: PathBuf,

    /// Input values as `key=value` (repeatable); values are parsed as JSON,
    /// falling back to a plain string when not valid JSON
    #[arg(short = 'i', long = "input", value_name = "KEY=VALUE")]
    inputs: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct ResumeArgs {
    /// Path to the same spec file the session was started with
    spec: PathBuf,

    /// Session id to resume
    session_id: Uuid,

    /// HITL task id being responded to (required when supplying --response)
    #[arg(long, value_name = "TASK_ID", requires = "response")]
    task_id: Option<String>,

    /// The human response value for the paused HITL gate
    #[arg(long, value_name = "VALUE", requires = "task_id")]
    response: Option<String>,
}

#[derive(clap::Args, Debug)]
struct SessionsArgs {
    /// Only list sessions in this status
    #[arg(long, value_enum)]
    status: Option<StatusArg>,

    /// Only list sessions for this workflow name
    #[arg(long)]
    workflow: Option<String>,
}

#[derive(clap::Args, Debug)]
struct CleanupArgs {
    /// Delete sessions last updated more than this many days ago
    #[arg(long, value_name = "DAYS")]
    max_age_days: Option<i64>,

    /// Delete completed sessions too, instead of preserving them
    /// regardless of age
    #[arg(long)]
    delete_completed: bool,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum StatusArg {
    Running,
    Paused,
    Completed,
    Failed,
}

impl From<StatusArg> for SessionStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Running => SessionStatus::Running,
            StatusArg::Paused => SessionStatus::Paused,
            StatusArg::Completed => SessionStatus::Completed,
            StatusArg::Failed => SessionStatus::Failed,
        }
    }
}

fn parse_input(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid --input '{raw}', expected KEY=VALUE"))?;
    let parsed = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), parsed))
}

fn load_spec(path: &std::path::Path) -> Result<(Spec, String), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let spec: Spec = serde_yaml::from_str(&text)?;
    Ok((spec, text))
}

fn dispatcher() -> Dispatcher {
    let runner = AgentRunner::new(Arc::new(RuntimeClientFactory::new()));
    Dispatcher::new(runner)
}

fn print_result(result: &RunResult, as_json: bool) {
    if as_json {
        let value = serde_json::json!({
            "success": result.success,
            "exit_code": result.exit_code,
            "pattern": result.pattern_tag,
            "session_id": result.session_id,
            "last_response": result.last_response,
            "error": result.error,
            "tokens": {
                "input": result.tokens.input_tokens,
                "output": result.tokens.output_tokens,
            },
            "duration_seconds": result.duration_seconds,
            "artifacts_written": result.artifacts_written,
        });
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
        return;
    }

    if result.success {
        println!("ok ({}s, {} pattern)", result.duration_seconds, result.pattern_tag);
        if let Some(session_id) = result.session_id {
            println!("session: {session_id}");
        }
        if let Some(reply) = &result.last_response {
            println!("{reply}");
        }
        for path in &result.artifacts_written {
            println!("artifact written: {path}");
        }
    } else if result.exit_code == wf_core::error::exit_code::EX_HITL_PAUSE {
        println!(
            "paused for human input (session {})",
            result.session_id.map(|id| id.to_string()).unwrap_or_default()
        );
    } else {
        eprintln!("error: {}", result.error.as_deref().unwrap_or("unknown error"));
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init(args.verbose)?;
    wf_config::load_and_apply("wf", None::<&std::path::Path>).ok();
    let settings = wf_config::settings::load_settings("wf").unwrap_or_default();
    let store = FileSessionStore::new(&settings.session_root);
    let dispatcher = dispatcher();
    let cleanup_defaults = (
        settings.default_cleanup_max_age_days,
        settings.default_cleanup_keep_completed,
    );

    match args.cmd {
        Command::Run(run_args) => {
            let (spec, spec_text) = load_spec(&run_args.spec)?;
            let mut inputs = HashMap::new();
            for raw in &run_args.inputs {
                let (key, value) = parse_input(raw).map_err(|e| -> Box<dyn std::error::Error> { e.into() })?;
                inputs.insert(key, value);
            }

            let result = dispatcher.start(&spec, &spec_text, inputs, Some(&store)).await;
            print_result(&result, args.json);
            std::process::exit(result.exit_code);
        }
        Command::Resume(resume_args) => {
            let (spec, spec_text) = load_spec(&resume_args.spec)?;
            let hitl_response = match (resume_args.task_id, resume_args.response) {
                (Some(task_id), Some(value)) => Some(HitlResponse { task_id, value }),
                _ => None,
            };

            let result = dispatcher
                .resume(&spec, &spec_text, resume_args.session_id, hitl_response, &store)
                .await;
            print_result(&result, args.json);
            std::process::exit(result.exit_code);
        }
        Command::Sessions(sessions_args) => {
            let filter = SessionFilter {
                status: sessions_args.status.map(SessionStatus::from),
                workflow_name: sessions_args.workflow,
            };
            let sessions = store.list(filter).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else if sessions.is_empty() {
                println!("no sessions");
            } else {
                for meta in &sessions {
                    println!(
                        "{}  {:<10} {:<9} {}",
                        meta.session_id,
                        meta.workflow_name,
                        format!("{:?}", meta.status).to_lowercase(),
                        meta.updated_at.to_rfc3339(),
                    );
                }
            }
        }
        Command::Cleanup(cleanup_args) => {
            let (default_max_age_days, default_keep_completed) = cleanup_defaults;
            let max_age_days = cleanup_args.max_age_days.unwrap_or(default_max_age_days);
            let keep_completed = default_keep_completed && !cleanup_args.delete_completed;
            let deleted = store
                .cleanup_expired(chrono::Duration::days(max_age_days), keep_completed)
                .await?;
            if args.json {
                println!("{}", serde_json::json!({ "deleted": deleted }));
            } else {
                println!("deleted {deleted} expired session(s)");
            }
        }
    }

    Ok(())
}

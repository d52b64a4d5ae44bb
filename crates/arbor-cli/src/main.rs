#![forbid(unsafe_code)]

mod cmd;
mod output;

use anyhow::{Context as _, bail};
use arbor_core::config::{load_config, resolve_config_path};
use arbor_core::{Actor, ConfigHandle, timing};
use clap::{CommandFactory, Parser, Subcommand};
use output::OutputMode;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "arbor: sub-issue hierarchies with cycle, depth and fan-out limits",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit a timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Issue database path.
    #[arg(long, global = true, default_value = ".arbor/arbor.db")]
    db: PathBuf,

    /// Hierarchy config file (default: `.arbor/config.toml`, then the user
    /// config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Repository that issue indexes refer to.
    #[arg(long, global = true, default_value_t = 1)]
    repo: i64,

    /// Name recorded on timeline entries.
    #[arg(long, global = true, env = "ARBOR_ACTOR")]
    actor: Option<String>,

    /// User ID recorded on timeline entries.
    #[arg(long, global = true, default_value_t = 0)]
    actor_id: i64,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    const fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }

    fn actor(&self) -> Option<Actor> {
        self.actor
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| Actor::new(self.actor_id, name))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Create or upgrade the issue database",
        after_help = "EXAMPLES:\n    arbor init\n    arbor --db /tmp/issues.db init"
    )]
    Init,

    #[command(
        about = "Create a root issue",
        after_help = "EXAMPLES:\n    arbor create \"Ship v2\""
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        about = "Attach an issue under a parent",
        long_about = "Attach the issue with the given index under the parent issue ID. \
                      Fails when the link would create a cycle or exceed the depth or \
                      sub-issue limits.",
        after_help = "EXAMPLES:\n    arbor --actor alice link 4 --parent 1\n    arbor link 4 --parent 1 --json"
    )]
    Link(cmd::link::LinkArgs),

    #[command(
        about = "Detach an issue from its parent",
        after_help = "EXAMPLES:\n    arbor --actor alice unlink 4"
    )]
    Unlink(cmd::link::UnlinkArgs),

    #[command(
        about = "Show an issue's place in its tree",
        after_help = "EXAMPLES:\n    arbor show 4\n    arbor show 4 --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        about = "List sub-issue events on an issue",
        after_help = "EXAMPLES:\n    arbor timeline 4"
    )]
    Timeline(cmd::timeline::TimelineArgs),

    #[command(
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    arbor completions bash\n    arbor completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ARBOR_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "arbor=debug,arbor_core=debug,info"
        } else {
            "arbor=info,arbor_core=info,warn"
        })
    });

    let format = env::var("ARBOR_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());
    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
            .init(),
        _ => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
    }
}

fn load_hierarchy_config(explicit: Option<&Path>, project_root: &Path) -> anyhow::Result<ConfigHandle> {
    if let Some(path) = explicit.filter(|p| !p.exists()) {
        bail!("config file {} does not exist", path.display());
    }

    let Some(path) = resolve_config_path(explicit, project_root) else {
        debug!("no config file found; using default hierarchy limits");
        return Ok(ConfigHandle::default());
    };

    let config = load_config(&path)
        .with_context(|| format!("load hierarchy config from {}", path.display()))?;
    debug!(path = %path.display(), hierarchy = ?config.hierarchy, "hierarchy config loaded");
    Ok(ConfigHandle::new(config.hierarchy))
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let timing_enabled = cli.timing || timing::timing_enabled_from_env();
    timing::set_timing_enabled(timing_enabled);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let ctx = cmd::Context {
        db_path: cli.db.clone(),
        repo_id: cli.repo,
        output: cli.output_mode(),
        config: load_hierarchy_config(cli.config.as_deref(), &project_root)?,
        actor: cli.actor(),
    };

    let command_result = match &cli.command {
        Commands::Init => timing::timed("cmd.init", || cmd::init::run_init(&ctx)),
        Commands::Create(args) => timing::timed("cmd.create", || cmd::create::run_create(args, &ctx)),
        Commands::Link(args) => timing::timed("cmd.link", || cmd::link::run_link(args, &ctx)),
        Commands::Unlink(args) => timing::timed("cmd.unlink", || cmd::link::run_unlink(args, &ctx)),
        Commands::Show(args) => timing::timed("cmd.show", || cmd::show::run_show(args, &ctx)),
        Commands::Timeline(args) => {
            timing::timed("cmd.timeline", || cmd::timeline::run_timeline(args, &ctx))
        }
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    };

    if timing_enabled {
        let report = timing::collect_report();
        eprintln!("timing report:");
        eprintln!("{}", report.display_table());
        if ctx.output.is_json() {
            eprintln!("{}", serde_json::to_string_pretty(&report.to_json())?);
        }
    }

    command_result
}

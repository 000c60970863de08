#![forbid(unsafe_code)]

mod cmd;
mod output;

use std::env;
use std::path::Path;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use cmd::Project;
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use scholar_core::config::{load_project_config, load_user_config};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "scholar: hybrid search and recommendations over an academic paper corpus",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Output format: pretty, text or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Project",
        about = "Initialize a scholar project",
        long_about = "Create .scholar/ with a default config.toml and an empty store.",
        after_help = "EXAMPLES:\n    scholar init\n\n    # Recreate config.toml\n    scholar init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(next_help_heading = "Project")]
    Import(cmd::import::ImportArgs),

    #[command(next_help_heading = "Project")]
    Reindex(cmd::reindex::ReindexArgs),

    #[command(next_help_heading = "Search")]
    Search(cmd::search::SearchArgs),

    #[command(next_help_heading = "Search")]
    Show(cmd::show::ShowArgs),

    #[command(next_help_heading = "Search")]
    Similar(cmd::similar::SimilarArgs),

    #[command(next_help_heading = "Recommend")]
    Recommend(cmd::recommend::RecommendArgs),

    #[command(next_help_heading = "Recommend")]
    Trending(cmd::trending::TrendingArgs),

    #[command(
        next_help_heading = "Users",
        about = "Create and inspect users",
        after_help = "EXAMPLES:\n    scholar user add ada --email ada@example.org --interest \"graph learning\"\n    scholar user show ada"
    )]
    User {
        #[command(subcommand)]
        command: cmd::user::UserCommand,
    },

    #[command(next_help_heading = "Users")]
    View(cmd::feedback::ViewArgs),

    #[command(next_help_heading = "Users")]
    Save(cmd::feedback::SaveArgs),

    #[command(next_help_heading = "Users")]
    Feedback(cmd::feedback::FeedbackArgs),

    #[command(
        next_help_heading = "Project",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    scholar completions bash > ~/.local/share/bash-completion/completions/scholar\n    scholar completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("SCHOLAR_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "scholar=debug,info"
        } else {
            "scholar=info,warn"
        })
    });

    let format = env::var("SCHOLAR_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let user_config = load_user_config().unwrap_or_else(|e| {
        warn!("ignoring user config: {e:#}");
        scholar_core::config::UserConfig::default()
    });
    let output = resolve_output_mode(cli.format, cli.json, user_config.output.as_deref());
    debug!(?output, "resolved output mode");

    match run(cli.command, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Err(render) = render_error(output, &CliError::from(&e)) {
                eprintln!("error: {e:#} (and failed to render it: {render})");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, output: OutputMode) -> anyhow::Result<()> {
    let project_root = env::current_dir()?;

    match command {
        Commands::Init(ref args) => return cmd::init::run_init(args, output, &project_root),
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            return cmd::completions::run_completions(args.shell, &mut command);
        }
        _ => {}
    }

    let project = open_project(&project_root)?;
    match command {
        Commands::Import(ref args) => cmd::import::run_import(args, output, &project),
        Commands::Reindex(ref args) => cmd::reindex::run_reindex(args, output, &project),
        Commands::Search(ref args) => cmd::search::run_search(args, output, &project),
        Commands::Show(ref args) => cmd::show::run_show(args, output, &project),
        Commands::Similar(ref args) => cmd::similar::run_similar(args, output, &project),
        Commands::Recommend(ref args) => cmd::recommend::run_recommend(args, output, &project),
        Commands::Trending(ref args) => cmd::trending::run_trending(args, output, &project),
        Commands::User { ref command } => cmd::user::run_user(command, output, &project),
        Commands::View(ref args) => cmd::feedback::run_view(args, output, &project),
        Commands::Save(ref args) => cmd::feedback::run_save(args, output, &project),
        Commands::Feedback(ref args) => cmd::feedback::run_feedback(args, output, &project),
        Commands::Init(_) | Commands::Completions(_) => Ok(()),
    }
}

fn open_project(root: &Path) -> anyhow::Result<Project> {
    let config = load_project_config(root)?;
    info!(root = %root.display(), fusion = %config.search.fusion, "project loaded");
    Ok(Project::new(root.to_path_buf(), config))
}

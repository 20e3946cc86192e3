use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use gitbuddy::config::Config;
use gitbuddy::display::render_changes;
use gitbuddy::errors::{to_exit_code, ErrorKind, Failure};
use gitbuddy::git::{ensure_executable, normalize, CommandRunner, GitCli, SystemRunner};
use gitbuddy::logging;
use gitbuddy::prompt::Prompter;
use gitbuddy::session::{push_once, PushFlags, Session};
use gitbuddy::workflow::{PushRequest, StageMode};

#[derive(Parser)]
#[command(name = "gitbuddy")]
#[command(about = "Guided add, commit and push to GitHub")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Repository directory (default: current directory)
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    /// Log git commands instead of running them
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage, commit and push to a GitHub repository in one go
    Push {
        /// Repository: https://github.com/owner/repo, git@github.com:owner/repo.git or owner/repo
        url: String,

        /// What to stage: changed or all (default from config)
        #[arg(short, long, conflicts_with = "files")]
        mode: Option<StageMode>,

        /// Stage only these paths
        #[arg(long, num_args = 1..)]
        files: Vec<String>,

        /// Commit message
        #[arg(short = 'M', long)]
        message: Option<String>,

        /// Skip confirmation prompts (never force pushes unless --allow-force).
        /// Without it, declining the summary exits with code 11
        #[arg(short = 'y', long)]
        yes: bool,

        /// Allow an unconditional force push if safer strategies fail
        #[arg(long)]
        allow_force: bool,
    },

    /// Show the classified working tree status
    Status,

    /// Validate a repository reference and print its canonical URL
    CheckUrl {
        /// Repository reference to check
        url: String,
    },

    /// Print the effective configuration
    Config {
        /// Write it to the user config file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            to_exit_code(&err)
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let cwd = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    if !cwd.is_dir() {
        bail!("Working directory {} does not exist", cwd.display());
    }

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref(), &cwd)?;
    let logging_handle = logging::init_logging(&config, cli.debug)?;

    let code = match cli.command {
        Some(Commands::CheckUrl { url }) => cmd_check_url(&url)?,
        Some(Commands::Config { save }) => cmd_config(&config, save)?,
        Some(Commands::Status) => {
            let git = git_cli(&config, cwd, cli.dry_run)?;
            cmd_status(&git).await?
        }
        Some(Commands::Push {
            url,
            mode,
            files,
            message,
            yes,
            allow_force,
        }) => {
            let git = git_cli(&config, cwd, cli.dry_run)?;
            let mode = if files.is_empty() {
                mode.unwrap_or_else(|| config.session.stage_mode())
            } else {
                StageMode::Selected(files)
            };
            let flags = PushFlags { yes, allow_force };
            cmd_push(&config, git, &url, mode, message, flags).await?
        }
        None => {
            let git = git_cli(&config, cwd, cli.dry_run)?;
            let session = Session::new(Prompter::stdio(), config, git);
            session.run().await?
        }
    };

    if let Some(log_path) = logging_handle.log_file_path {
        if log_path.metadata().map(|m| m.len() > 0).unwrap_or(false) {
            eprintln!("Session log: {}", log_path.display());
        }
    }

    Ok(code)
}

/// Build the git wrapper, failing early when git is not installed
fn git_cli(config: &Config, cwd: PathBuf, dry_run: bool) -> Result<GitCli> {
    let runner: Arc<dyn CommandRunner> = if dry_run {
        Arc::new(SystemRunner::dry_run())
    } else {
        ensure_executable(&config.git.program)?;
        Arc::new(SystemRunner::new())
    };
    Ok(GitCli::new(runner, cwd).with_program(config.git.program.clone()))
}

fn cmd_check_url(url: &str) -> Result<i32> {
    let reference = normalize(url)?;
    println!("{}", reference.canonical_url);
    Ok(0)
}

fn cmd_config(config: &Config, save: bool) -> Result<i32> {
    if save {
        let path = config.save()?;
        println!("Saved configuration to {}", path.display());
    } else {
        let toml_str =
            toml::to_string_pretty(config).context("Failed to serialize config to TOML")?;
        print!("{toml_str}");
    }
    Ok(0)
}

async fn cmd_status(git: &GitCli) -> Result<i32> {
    if !git.is_repository() {
        println!("{} is not a git repository", git.cwd().display());
        return Ok(0);
    }

    let changes = match git.changes().await? {
        Ok(changes) => changes,
        Err(result) => {
            return Err(Failure::new(ErrorKind::UnknownGitError, result.output()).into());
        }
    };

    let mut stdout = io::stdout().lock();
    render_changes(&mut stdout, &changes)?;
    Ok(0)
}

async fn cmd_push(
    config: &Config,
    git: GitCli,
    url: &str,
    mode: StageMode,
    message: Option<String>,
    flags: PushFlags,
) -> Result<i32> {
    let request = PushRequest {
        reference: normalize(url)?,
        mode,
        message,
    };
    push_once(Prompter::stdio(), config, git, request, flags).await
}

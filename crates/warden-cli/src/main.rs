//! Warden CLI - permission policy engine.
//!
//! Operator front end over the permission controller: validate commands and
//! paths, evaluate tools and permissions (optionally answering the approval
//! prompt on the terminal), and inspect or edit stored grants, policy,
//! configuration, and the audit log.
//!
//! Commands that only judge (`validate`, `check-path`, `check`, `tool`,
//! `authorize`) exit with status 1 when the operation is not allowed.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use warden_config::{LoadOptions, ResolvedConfig};
use warden_core::SessionId;

mod commands;
mod config_bridge;
mod theme;

use commands::{OutputFormat, audit, check, config, grants, policy, prompt};

/// Warden - permission policy engine
#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format: pretty (default) or json
    #[arg(long, global = true, default_value = "pretty")]
    format: String,

    /// Explicit config file, layered above user and workspace config
    #[arg(short, long, global = true, env = "WARDEN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a shell command against the safety rules
    Validate {
        /// The command line (quote it, or pass after `--`)
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Check a path against the blocked-path rules
    CheckPath {
        /// Path to check
        path: PathBuf,
        /// Also check this working directory
        #[arg(long)]
        cwd: Option<PathBuf>,
    },

    /// Evaluate a scope + action permission
    Check {
        /// Scope (file, network, terminal, ...)
        scope: String,
        /// Action (read, write, execute, ...)
        action: String,
        /// Resource the operation targets
        #[arg(short, long)]
        resource: Option<String>,
        /// Tool name to record
        #[arg(short, long)]
        tool: Option<String>,
        /// Caller context for contextual grants
        #[arg(long)]
        context: Option<String>,
    },

    /// Evaluate a tool call
    Tool {
        /// Tool name (e.g. `file_delete`)
        name: String,
        /// Resource the tool targets
        #[arg(short, long)]
        resource: Option<String>,
        /// Caller context for contextual grants
        #[arg(long)]
        context: Option<String>,
        /// Refuse tools missing from the catalog instead of using the default decision
        #[arg(long)]
        known: bool,
        /// Answer an approval prompt on the terminal if one is needed
        #[arg(short, long)]
        interactive: bool,
    },

    /// Run the full command pipeline: validate, rate limit, and authorize
    Authorize {
        /// The command line (quote it, or pass after `--`)
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
        /// Session the command runs in
        #[arg(long, default_value = "cli")]
        session: String,
        /// Working directory the command would run in
        #[arg(long)]
        cwd: Option<PathBuf>,
        /// Answer an approval prompt on the terminal if one is needed
        #[arg(short, long)]
        interactive: bool,
    },

    /// Manage stored grants
    Grants {
        #[command(subcommand)]
        command: GrantCommands,
    },

    /// Inspect the policy
    Policy {
        #[command(subcommand)]
        command: PolicyCommands,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// View the audit log
    Audit {
        #[command(subcommand)]
        command: AuditCommands,
    },
}

#[derive(Subcommand)]
enum GrantCommands {
    /// List stored grants
    List,
    /// Record a grant (or a denial with --deny)
    Add {
        /// Scope
        scope: String,
        /// Action
        action: String,
        /// Exact resource
        #[arg(short, long)]
        resource: Option<String>,
        /// Resource regex, e.g. `^/home/me/projects/`
        #[arg(short, long, conflicts_with = "resource")]
        pattern: Option<String>,
        /// Tool name to record
        #[arg(short, long)]
        tool: Option<String>,
        /// once, session, hour, day, week, or permanent
        #[arg(short, long, default_value = "permanent")]
        duration: String,
        /// Record a denial instead of a grant
        #[arg(long)]
        deny: bool,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Revoke one grant by id
    Revoke {
        /// Grant id
        id: String,
    },
    /// Revoke every grant for a scope
    RevokeScope {
        /// Scope
        scope: String,
    },
    /// Revoke every grant recorded for a tool
    RevokeTool {
        /// Tool name
        tool: String,
    },
    /// Clear session grants
    Clear {
        /// Clear every grant, persistent ones included
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
enum PolicyCommands {
    /// Show the effective policy
    Show,
    /// List the tool catalog
    Tools,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the merged configuration (TOML, or JSON with --format json)
    Show {
        /// List fields set by a config file or the environment
        #[arg(long)]
        sources: bool,
    },
    /// Show config files and storage paths
    Paths,
}

#[derive(Subcommand)]
enum AuditCommands {
    /// Show recent decisions
    Tail {
        /// How many entries
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
        /// Only this outcome: granted, denied, revoked, expired
        #[arg(long)]
        outcome: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let options = LoadOptions {
        workspace_root: std::env::current_dir().ok(),
        explicit: cli.config,
        home_override: None,
    };
    let loaded = warden_config::Config::load(&options);

    // Set up logging from config, with --verbose override.
    let log_config = if let Ok(resolved) = &loaded {
        let mut lc = config_bridge::to_log_config(&resolved.config);
        if cli.verbose {
            "debug".clone_into(&mut lc.level);
        }
        lc
    } else {
        // Fallback if config loading fails.
        let level = if cli.verbose { "debug" } else { "warn" };
        warden_telemetry::LogConfig::new(level).with_format(warden_telemetry::LogFormat::Compact)
    };
    if let Err(e) = warden_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let resolved = loaded.context("failed to load configuration")?;
    let format = OutputFormat::parse(&cli.format);

    let allowed = match cli.command {
        Commands::Config { command } => {
            handle_config(&resolved, command, format)?;
            true
        },
        Commands::Audit { command } => {
            handle_audit(&resolved, command, format)?;
            true
        },
        command => run_with_controller(&resolved, command, format).await?,
    };

    Ok(if allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_with_controller(
    resolved: &ResolvedConfig,
    command: Commands,
    format: OutputFormat,
) -> Result<bool> {
    let controller = commands::open_controller(resolved)?;

    let interactive = matches!(
        command,
        Commands::Tool { interactive: true, .. } | Commands::Authorize { interactive: true, .. }
    );
    let prompter = interactive.then(|| prompt::spawn_prompter(&controller));

    let outcome = match command {
        Commands::Validate { command } => check::validate(&controller, &command.join(" "), format),
        Commands::CheckPath { path, cwd } => check::check_path(&controller, &path, cwd.as_deref(), format),
        Commands::Check {
            scope,
            action,
            resource,
            tool,
            context,
        } => check::query(
            &scope,
            &action,
            resource.as_deref(),
            tool.as_deref(),
            context.as_deref(),
        )
        .and_then(|query| check::check(&controller, &query, format)),
        Commands::Tool {
            name,
            resource,
            context,
            known,
            interactive,
        } => {
            check::tool(
                &controller,
                &name,
                resource.as_deref(),
                context.as_deref(),
                known,
                interactive,
                format,
            )
            .await
        },
        Commands::Authorize {
            command,
            session,
            cwd,
            ..
        } => {
            check::authorize(
                &controller,
                &SessionId::new(session),
                &command.join(" "),
                cwd.as_deref(),
                format,
            )
            .await
        },
        Commands::Grants { command } => handle_grants(&controller, command, format).map(|()| true),
        Commands::Policy { command } => match command {
            PolicyCommands::Show => policy::show(&controller, format),
            PolicyCommands::Tools => policy::tools(&controller, format),
        }
        .map(|()| true),
        Commands::Config { .. } | Commands::Audit { .. } => Ok(true),
    };

    if let Some(task) = prompter {
        task.abort();
    }
    commands::close_controller(&controller);
    outcome
}

fn handle_grants(
    controller: &warden_approval::PermissionController,
    command: GrantCommands,
    format: OutputFormat,
) -> Result<()> {
    match command {
        GrantCommands::List => grants::list(controller, format),
        GrantCommands::Add {
            scope,
            action,
            resource,
            pattern,
            tool,
            duration,
            deny,
            notes,
        } => grants::add(
            controller,
            grants::AddGrant {
                scope: &scope,
                action: &action,
                resource: resource.as_deref(),
                pattern: pattern.as_deref(),
                tool: tool.as_deref(),
                duration: &duration,
                deny,
                notes,
            },
            format,
        ),
        GrantCommands::Revoke { id } => grants::revoke(controller, &id),
        GrantCommands::RevokeScope { scope } => grants::revoke_scope(controller, &scope),
        GrantCommands::RevokeTool { tool } => grants::revoke_tool(controller, &tool),
        GrantCommands::Clear { all } => grants::clear(controller, all),
    }
}

fn handle_config(resolved: &ResolvedConfig, command: ConfigCommands, format: OutputFormat) -> Result<()> {
    match command {
        ConfigCommands::Show { sources } => config::show(resolved, format, sources),
        ConfigCommands::Paths => {
            config::paths(resolved);
            Ok(())
        },
    }
}

fn handle_audit(resolved: &ResolvedConfig, command: AuditCommands, format: OutputFormat) -> Result<()> {
    match command {
        AuditCommands::Tail { limit, outcome } => {
            let outcome = outcome.as_deref().map(audit::parse_outcome).transpose()?;
            audit::tail(&config_bridge::audit_path(resolved), limit, outcome, format)
        },
    }
}

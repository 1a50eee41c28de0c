pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
mod test_support;

use application::bootstrap::default_workspace_root;
use application::commands::{
    AppState, SessionEnd, delete_tree_impl, describe_tree_impl, list_trees_impl, login_impl,
    logout_impl, register_impl, run_session_impl, stats_impl, tree_types_impl, whoami_impl,
};
use application::display::{SessionDisplay, TerminalDisplay};
use application::inventory::StatsSource;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "forest")]
#[command(version, about = "Focus with pomodoros and grow a forest", long_about = None)]
pub struct Cli {
    /// Directory holding config/ and state/ (defaults to the platform data dir)
    #[arg(long, global = true, env = "POMODORO_FOREST_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account
    Register {
        username: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, env = "POMODORO_FOREST_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log in and remember the session token
    Login {
        username: String,
        #[arg(long, env = "POMODORO_FOREST_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the token and cached stats
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Run a pomodoro until it completes; Ctrl-C stops it
    Start {
        #[arg(long, short)]
        minutes: Option<u32>,
        /// Register the session as completed when interrupted
        #[arg(long)]
        complete_on_interrupt: bool,
    },
    /// Show aggregate statistics
    Stats,
    /// List the trees in your forest
    Trees {
        #[arg(long)]
        category: Option<String>,
    },
    /// List the available tree types
    TreeTypes,
    /// Replace a tree's description
    DescribeTree { tree_id: String, description: String },
    /// Remove a tree from your forest
    DeleteTree { tree_id: String },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Login { .. } => "login",
            Self::Logout => "logout",
            Self::Whoami => "whoami",
            Self::Start { .. } => "start",
            Self::Stats => "stats",
            Self::Trees { .. } => "trees",
            Self::TreeTypes => "tree-types",
            Self::DescribeTree { .. } => "describe-tree",
            Self::DeleteTree { .. } => "delete-tree",
        }
    }
}

async fn interrupted() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Runs one CLI command. Command failures are logged and shown here and come
/// back as a failing exit code; only setup failures are returned as errors.
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let workspace_root = match cli.workspace {
        Some(path) => path,
        None => default_workspace_root()?,
    };
    let state = AppState::new(workspace_root)?;
    let terminal = TerminalDisplay::new();
    let command = cli.command.name();

    let result = match cli.command {
        Command::Register {
            username,
            email,
            password,
        } => register_impl(&state, username.clone(), password, email)
            .await
            .map(|()| terminal.print_line(&format!("Account {username} created. You can log in now."))),
        Command::Login { username, password } => login_impl(&state, username, password)
            .await
            .map(|credentials| terminal.print_line(&format!("Welcome, {}!", credentials.username))),
        Command::Logout => logout_impl(&state).map(|()| terminal.print_line("Logged out.")),
        Command::Whoami => whoami_impl(&state).await.map(|profile| {
            match profile.email {
                Some(email) => terminal.print_line(&format!("{} <{email}>", profile.username)),
                None => terminal.print_line(&profile.username),
            }
        }),
        Command::Start {
            minutes,
            complete_on_interrupt,
        } => {
            match run_session_impl(&state, minutes, complete_on_interrupt, interrupted()).await {
                Ok(SessionEnd::Completed(_)) => Ok(()),
                Ok(SessionEnd::Stopped) => {
                    terminal.print_line("Pomodoro stopped. No tree this time.");
                    Ok(())
                }
                // the reconciler already told the user
                Ok(SessionEnd::CompletionFailed(_)) => return Ok(ExitCode::FAILURE),
                Err(error) => Err(error),
            }
        }
        Command::Stats => stats_impl(&state).await.map(|view| {
            terminal.show_stats(&view.stats);
            if view.source == StatsSource::Cache {
                terminal.print_line("(server unreachable, showing cached values)");
            }
        }),
        Command::Trees { category } => list_trees_impl(&state, category)
            .await
            .map(|trees| terminal.print_trees(&trees)),
        Command::TreeTypes => tree_types_impl(&state)
            .await
            .map(|tree_types| terminal.print_tree_types(&tree_types)),
        Command::DescribeTree {
            tree_id,
            description,
        } => describe_tree_impl(&state, tree_id, description)
            .await
            .map(|tree| terminal.print_line(&format!("Updated {}: {}", tree.name, tree.description))),
        Command::DeleteTree { tree_id } => delete_tree_impl(&state, tree_id.clone())
            .await
            .map(|()| terminal.print_line(&format!("Tree {tree_id} deleted."))),
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(error) => {
            state.command_error(command, &error);
            Ok(ExitCode::FAILURE)
        }
    }
}

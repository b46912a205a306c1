//! Autonomous development-loop controller.
//!
//! State lives in `.devloop/` under the current directory: `config.toml`,
//! `state.json` (the current workflow) and `history.json` (one record per
//! request).

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use devloop::core::types::ProjectState;
use devloop::exit_codes;
use devloop::io::completion::CommandCompletion;
use devloop::io::history::load_history;
use devloop::io::init::init_devloop;
use devloop::logging;
use devloop::looping::{LoopOutcome, LoopStop};
use devloop::start::Session;
use devloop::status::{render_history, render_summary};

#[derive(Parser)]
#[command(
    name = "devloop",
    version,
    about = "Autonomous development loop driven by a text-completion service"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.devloop/config.toml` with defaults.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Start a new workflow for a requirement and run it until it stops.
    Run {
        /// Natural-language requirement (words are joined with spaces).
        #[arg(required = true)]
        requirement: Vec<String>,
        /// Step ceiling for this workflow (defaults to the config value).
        #[arg(long)]
        max_steps: Option<u32>,
        /// Answer human questions on stdin instead of exiting.
        #[arg(short, long)]
        interactive: bool,
    },
    /// Answer the pending question and resume the workflow.
    Answer {
        /// Feedback for the pending question (words are joined with spaces).
        #[arg(required = true)]
        feedback: Vec<String>,
        /// Answer further questions on stdin instead of exiting.
        #[arg(short, long)]
        interactive: bool,
    },
    /// Print a summary of the persisted workflow.
    Status {
        /// List request history instead.
        #[arg(long)]
        history: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = std::env::current_dir().context("resolve current directory")?;
    match cli.command {
        Command::Init { force } => cmd_init(&root, force),
        Command::Run {
            requirement,
            max_steps,
            interactive,
        } => cmd_run(&root, &requirement.join(" "), max_steps, interactive),
        Command::Answer {
            feedback,
            interactive,
        } => cmd_answer(&root, &feedback.join(" "), interactive),
        Command::Status { history } => cmd_status(&root, history),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_devloop(root, force)?;
    println!("Wrote {}", paths.config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_run(root: &Path, requirement: &str, max_steps: Option<u32>, interactive: bool) -> Result<i32> {
    let session = Session::open(root)?;
    let completion = CommandCompletion::from_config(&session.config().completion);
    let outcome = session.run_request(&completion, requirement, max_steps, print_step)?;
    finish(&session, &completion, outcome, interactive)
}

fn cmd_answer(root: &Path, feedback: &str, interactive: bool) -> Result<i32> {
    let session = Session::open(root)?;
    let completion = CommandCompletion::from_config(&session.config().completion);
    let outcome = session.answer_request(&completion, feedback, print_step)?;
    finish(&session, &completion, outcome, interactive)
}

fn cmd_status(root: &Path, history: bool) -> Result<i32> {
    let session = Session::open(root)?;
    if history {
        print!("{}", render_history(&load_history(&session.paths().history_path)?));
        return Ok(exit_codes::OK);
    }
    match session.load_state()? {
        Some(state) => {
            print!("{}", render_summary(&state));
            Ok(exit_codes::for_status(state.status))
        }
        None => {
            println!("No workflow yet (run `devloop run <REQUIREMENT>`).");
            Ok(exit_codes::OK)
        }
    }
}

/// Print the outcome; in interactive mode keep answering questions from stdin.
fn finish(
    session: &Session,
    completion: &CommandCompletion,
    mut outcome: LoopOutcome,
    interactive: bool,
) -> Result<i32> {
    let stdin = io::stdin();
    loop {
        print!("{}", render_summary(&outcome.state));
        let LoopStop::NeedsHumanInput { query } = &outcome.stop else {
            return Ok(exit_codes::for_status(outcome.state.status));
        };
        if !interactive {
            println!("\nAnswer with: devloop answer <FEEDBACK>");
            return Ok(exit_codes::NEEDS_INPUT);
        }

        print!("\n{query}\n> ");
        io::stdout().flush().context("flush stdout")?;
        let mut answer = String::new();
        stdin.lock().read_line(&mut answer).context("read answer")?;
        if answer.trim().is_empty() {
            return Ok(exit_codes::NEEDS_INPUT);
        }
        outcome = session.answer_request(completion, &answer, print_step)?;
    }
}

fn print_step(state: &ProjectState) {
    let action = state
        .current_action
        .as_ref()
        .map_or_else(|| "-".to_string(), ToString::to_string);
    println!("[step {}] {action} -> {}", state.step_count, state.status);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::parse_from(["devloop", "init"]);
        assert!(matches!(cli.command, Command::Init { force: false }));
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["devloop", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn parse_run_joins_words() {
        let cli = Cli::parse_from(["devloop", "run", "--max-steps", "4", "build", "a", "cli"]);
        let Command::Run {
            requirement,
            max_steps,
            interactive,
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(requirement.join(" "), "build a cli");
        assert_eq!(max_steps, Some(4));
        assert!(!interactive);
    }

    #[test]
    fn parse_answer_interactive() {
        let cli = Cli::parse_from(["devloop", "answer", "-i", "use", "flask"]);
        assert!(matches!(
            cli.command,
            Command::Answer { interactive: true, ref feedback } if feedback == &["use", "flask"]
        ));
    }

    #[test]
    fn run_requires_requirement() {
        assert!(Cli::try_parse_from(["devloop", "run"]).is_err());
    }

    #[test]
    fn parse_status_history() {
        let cli = Cli::parse_from(["devloop", "status", "--history"]);
        assert!(matches!(cli.command, Command::Status { history: true }));
    }
}

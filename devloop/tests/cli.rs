//! CLI tests: spawn the devloop binary and check exit codes and persisted files.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use devloop::core::types::ProjectStatus;
use devloop::exit_codes;
use devloop::io::config::{CompletionConfig, DevloopConfig, write_config};
use devloop::io::history::load_history;
use devloop::io::init::{DevloopPaths, init_devloop};
use devloop::io::state_store::load_state;
use devloop::test_support::needs_human_reply;

fn devloop(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_devloop"))
        .current_dir(root)
        .args(args)
        .output()
        .expect("spawn devloop")
}

/// Point the completion command at a shell script that always prints `reply`.
fn script_completion(root: &Path, reply: &str) {
    let script = root.join("reply.sh");
    fs::write(&script, format!("cat > /dev/null\nprintf '%s\\n' '{reply}'\n")).expect("script");
    let paths = DevloopPaths::new(root);
    write_config(
        &paths.config_path,
        &DevloopConfig {
            completion: CompletionConfig {
                command: vec!["sh".into(), script.display().to_string()],
                ..CompletionConfig::default()
            },
            ..DevloopConfig::default()
        },
    )
    .expect("config");
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let temp = tempfile::tempdir().expect("tempdir");

    let first = devloop(temp.path(), &["init"]);
    assert_eq!(first.status.code(), Some(exit_codes::OK));
    assert!(DevloopPaths::new(temp.path()).config_path.exists());

    let second = devloop(temp.path(), &["init"]);
    assert_eq!(second.status.code(), Some(exit_codes::INVALID));

    let forced = devloop(temp.path(), &["init", "--force"]);
    assert_eq!(forced.status.code(), Some(exit_codes::OK));
}

#[test]
fn status_without_workflow_is_ok() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = devloop(temp.path(), &["status"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&output.stdout).contains("No workflow yet"));
}

#[test]
fn answer_without_workflow_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    init_devloop(temp.path(), false).expect("init");

    let output = devloop(temp.path(), &["answer", "use", "rust"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no workflow"));

    let history = load_history(&DevloopPaths::new(temp.path()).history_path).expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, "error");
}

#[cfg(unix)]
#[test]
fn run_stops_for_human_input_with_exit_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    init_devloop(temp.path(), false).expect("init");
    script_completion(temp.path(), &needs_human_reply("Which framework?"));

    let output = devloop(temp.path(), &["run", "build", "a", "web", "app"]);
    assert_eq!(output.status.code(), Some(exit_codes::NEEDS_INPUT));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Which framework?"), "stdout: {stdout}");

    let paths = DevloopPaths::new(temp.path());
    let state = load_state(&paths.state_path).expect("state");
    assert_eq!(state.status, ProjectStatus::NeedsHumanInput);
    assert_eq!(state.original_requirements, "build a web app");
    assert_eq!(state.step_count, 1);

    let status = devloop(temp.path(), &["status"]);
    assert_eq!(status.status.code(), Some(exit_codes::NEEDS_INPUT));

    let answer = devloop(temp.path(), &["answer", "flask"]);
    assert_eq!(answer.status.code(), Some(exit_codes::NEEDS_INPUT));
    let state = load_state(&paths.state_path).expect("state");
    assert_eq!(state.step_count, 2);
    assert_eq!(state.current_context["human_feedback"], "flask");

    let actions: Vec<String> = load_history(&paths.history_path)
        .expect("history")
        .into_iter()
        .map(|r| r.action)
        .collect();
    assert_eq!(actions, vec!["run", "answer"]);
}

#[cfg(unix)]
#[test]
fn failing_completion_command_escalates_instead_of_crashing() {
    let temp = tempfile::tempdir().expect("tempdir");
    init_devloop(temp.path(), false).expect("init");
    let paths = DevloopPaths::new(temp.path());
    write_config(
        &paths.config_path,
        &DevloopConfig {
            completion: CompletionConfig {
                command: vec!["sh".into(), "-c".into(), "exit 7".into()],
                ..CompletionConfig::default()
            },
            ..DevloopConfig::default()
        },
    )
    .expect("config");

    let output = devloop(temp.path(), &["run", "anything"]);
    assert_eq!(output.status.code(), Some(exit_codes::NEEDS_INPUT));
    let state = load_state(&paths.state_path).expect("state");
    assert!(state.needs_human_input);
}

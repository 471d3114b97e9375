use colored::ColoredString;
use std::env;
use std::process::{Command, Stdio};
use std::str;
use tokio::io::{self, AsyncBufReadExt, AsyncRead};
use tokio::process::{ChildStderr, ChildStdout, Command as TokioCommand};
use tokio::sync::mpsc::{self, UnboundedSender};

pub fn which(tool: &str) -> Option<String> {
    let which_output = Command::new("which").args([tool]).output().ok()?;
    let which = str::from_utf8(&which_output.stdout).ok()?.trim().to_string();

    if !which_output.status.success() || which.is_empty() {
        None
    } else {
        Some(which)
    }
}

pub fn first_which(candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|candidate| which(candidate))
}

pub async fn handle_stream<R: AsyncRead + Unpin>(reader: R, sender: UnboundedSender<String>) {
    let mut reader = io::BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await.unwrap_or(0) > 0 {
        if !line.trim().is_empty() {
            // Progress output redraws with `\r`; keep the final frame only.
            let last = line.split('\r').last().unwrap_or(&line);
            if sender.send(last.to_string()).is_err() {
                break;
            }
        }
        line.clear();
    }
}

/// Prints child output under `label` as it arrives and returns every line
/// once both streams are closed.
pub async fn pipe_output(
    label: &ColoredString,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
) -> Vec<String> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut tasks = Vec::new();
    if let Some(stdout) = stdout {
        tasks.push(tokio::spawn(handle_stream(stdout, tx.clone())));
    }
    if let Some(stderr) = stderr {
        tasks.push(tokio::spawn(handle_stream(stderr, tx.clone())));
    }
    drop(tx);

    let mut lines = Vec::new();
    while let Some(line) = rx.recv().await {
        let clean_line = line.trim_end().replace('\x1B', "");
        println!("       {}  |   {}", label, clean_line);
        lines.push(clean_line);
    }

    futures::future::join_all(tasks).await;
    lines
}

/// Runs `command` to completion, streaming its output. A spawn failure or a
/// non-zero exit is an error carrying the working directory, the command
/// line and everything the command printed.
pub async fn run_command(label: ColoredString, command: &str, args: Vec<&str>) -> Result<(), String> {
    let debug_args = args.join(" ");
    log::debug!("Running {} {}", command, debug_args);

    let mut child = TokioCommand::new(command)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to execute {}: {}", command, e))?;

    let mut lines = pipe_output(&label, child.stdout.take(), child.stderr.take()).await;
    let status = child
        .wait()
        .await
        .map_err(|e| format!("Failed waiting for {}: {}", command, e))?;

    if status.success() {
        return Ok(());
    }

    let working_directory = env::current_dir()
        .map(|d| d.display().to_string())
        .unwrap_or_default();
    let exit = match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    };

    lines.insert(0, "---".to_string());
    lines.insert(0, format!("Command: {} {} ({})", command, debug_args, exit));
    lines.insert(0, format!("Working directory: {}", working_directory));
    Err(lines.join("\n"))
}

//! Terminal stand-in for the coding surface: a watched source file and an
//! optional run command triggered from stdin.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tutor_core::session_state::CallCommand;
use tutor_core::variants::EditorSnapshot;

/// Sends the file's content whenever it changes on disk.
pub async fn watch_file(path: PathBuf, interval: Duration, commands: mpsc::Sender<CallCommand>) {
    let mut last: Option<String> = None;
    let mut tick = tokio::time::interval(interval);
    loop {
        tick.tick().await;
        let code = match tokio::fs::read_to_string(&path).await {
            Ok(code) => code,
            Err(e) => {
                tracing::debug!("Cannot read {}: {}", path.display(), e);
                continue;
            }
        };
        if last.as_deref() == Some(code.as_str()) {
            continue;
        }
        last = Some(code.clone());
        if commands
            .send(CallCommand::UpdateEditor(EditorSnapshot::new(&code)))
            .await
            .is_err()
        {
            return;
        }
    }
}

/// Runs `command` through the shell. Output on success, `Error: ...` otherwise.
pub async fn run_code(command: &str) -> Result<String, String> {
    let output = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .await
        .map_err(|e| format!("Error: {}", e))?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    if output.status.success() {
        Ok(stdout)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
        let detail = if stderr.is_empty() { stdout } else { stderr };
        Err(format!("Error: {}", detail))
    }
}

/// Every line read from `input` runs the command once and reports the result.
/// Returns at end of input or once the controller stops listening.
pub async fn run_on_enter<R>(
    input: R,
    path: PathBuf,
    command: String,
    commands: mpsc::Sender<CallCommand>,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Ok(Some(_)) = lines.next_line().await {
        let code = read_or_empty(&path).await;
        tracing::info!("Running `{}`", command);
        let outcome = run_code(&command).await;
        match &outcome {
            Ok(output) => println!("{}", output),
            Err(error) => eprintln!("{}", error),
        }
        if commands
            .send(CallCommand::RunOutput { code, outcome })
            .await
            .is_err()
        {
            return;
        }
    }
}

async fn read_or_empty(path: &Path) -> String {
    tokio::fs::read_to_string(path).await.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_watch_file_sends_changes_once() {
        // --- Arrange ---
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "print('hi')").unwrap();
        let (tx, mut rx) = mpsc::channel(4);

        // --- Act ---
        let watcher = tokio::spawn(watch_file(
            file.path().to_path_buf(),
            Duration::from_millis(10),
            tx,
        ));
        let first = rx.recv().await;
        let second = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        watcher.abort();

        // --- Assert ---
        assert_eq!(
            first,
            Some(CallCommand::UpdateEditor(EditorSnapshot::new("print('hi')")))
        );
        assert!(second.is_err(), "unchanged file must not be resent");
    }

    #[tokio::test]
    async fn test_run_code_reports_success_and_failure() {
        assert_eq!(run_code("echo hi").await, Ok("hi".to_string()));
        assert_eq!(
            run_code("echo boom >&2; exit 3").await,
            Err("Error: boom".to_string())
        );
    }

    #[tokio::test]
    async fn test_each_line_runs_the_command_once() {
        // --- Arrange ---
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "print(1)").unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let input: &[u8] = b"\n";

        // --- Act ---
        run_on_enter(
            input,
            file.path().to_path_buf(),
            "echo 1".to_string(),
            tx,
        )
        .await;

        // --- Assert ---
        assert_eq!(
            rx.recv().await,
            Some(CallCommand::RunOutput {
                code: "print(1)".to_string(),
                outcome: Ok("1".to_string()),
            })
        );
        assert_eq!(rx.recv().await, None, "end of input ends the reader");
    }
}

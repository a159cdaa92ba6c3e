//! Importer subprocess lifecycle
//!
//! The importer is launched through the shell with piped stdin, stdout,
//! and stderr. Standard output and diagnostics become pollable line
//! channels immediately; the feedback channel is attached separately
//! because opening the FIFO read end blocks until the importer opens the
//! write end (the startup barrier).

use crate::channel::LineChannel;
use crate::command::{shell_quote, ImporterCommand};
use crate::fifo::FeedbackPipe;
use crate::session::{DrainReport, ImporterSession};
use anyhow::{Context, Result};
use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};

/// A running importer process with its three output channels.
pub struct ImporterProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    output: LineChannel,
    diagnostics: LineChannel,
    feedback: Option<LineChannel>,
    command: ImporterCommand,
}

impl ImporterProcess {
    /// Launch the importer with `import '<fifo>'` and verify it came up.
    ///
    /// The feedback channel is not attached yet; call
    /// [`ImporterProcess::connect_feedback`] once the process is running.
    pub fn spawn(command: ImporterCommand, pipe: &FeedbackPipe) -> Result<Self> {
        let suffix = format!("import {}", shell_quote(&pipe.path().to_string_lossy()));
        let shell_line = command.shell_line(&suffix);
        tracing::debug!("launching importer: {}", command.masked_line(&suffix));

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&shell_line)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("failed to launch the importer process")?;

        if child
            .try_wait()
            .context("failed to check importer status")?
            .is_some()
        {
            anyhow::bail!("importer process exited immediately after launch");
        }

        let stdin = child.stdin.take().context("importer stdin was not piped")?;
        let stdout = child
            .stdout
            .take()
            .context("importer stdout was not piped")?;
        let stderr = child
            .stderr
            .take()
            .context("importer stderr was not piped")?;

        Ok(Self {
            child,
            stdin: Some(stdin),
            output: LineChannel::spawn("importer-output", stdout)?,
            diagnostics: LineChannel::spawn("importer-diagnostics", stderr)?,
            feedback: None,
            command,
        })
    }

    /// Open the feedback FIFO for reading. Blocks until the importer
    /// opens its write end.
    pub fn connect_feedback(&mut self, pipe: &FeedbackPipe) -> Result<()> {
        let file = pipe.open_read()?;
        self.feedback = Some(LineChannel::spawn("importer-feedback", file)?);
        Ok(())
    }
}

impl ImporterSession for ImporterProcess {
    fn send_line(&mut self, line: &str) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .context("importer input channel already closed")?;
        writeln!(stdin, "{}", line).context("failed to write to the importer")?;
        stdin.flush().context("failed to flush the importer input")?;
        Ok(())
    }

    fn try_feedback(&mut self) -> Option<String> {
        self.feedback.as_ref().and_then(LineChannel::try_line)
    }

    fn try_output(&mut self) -> Option<String> {
        self.output.try_line()
    }

    fn try_diagnostic(&mut self) -> Option<String> {
        self.diagnostics.try_line()
    }

    fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn lookup_legacy_id(&mut self, pointer: i64) -> Result<String> {
        let shell_line = self.command.shell_line(&format!("n2h {}", pointer));
        let output = Command::new("sh")
            .arg("-c")
            .arg(&shell_line)
            .output()
            .context("failed to invoke the legacy identifier lookup")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("legacy identifier lookup failed: {}", stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn finish(&mut self) -> Result<DrainReport> {
        // Closing input tells the importer there is nothing more to come.
        self.stdin.take();

        let diagnostics = self.diagnostics.drain();
        let output = self.output.drain();
        let feedback = self
            .feedback
            .as_mut()
            .map(LineChannel::drain)
            .unwrap_or_default();

        self.child
            .wait()
            .context("failed to reap the importer process")?;

        Ok(DrainReport {
            diagnostics,
            output,
            feedback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn write_script(dir: &Path, body: &str) -> Result<std::path::PathBuf> {
        let path = dir.join("importer.sh");
        std::fs::write(&path, body)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        Ok(path)
    }

    fn command_for(bin: &Path) -> ImporterCommand {
        ImporterCommand {
            bin: bin.to_string_lossy().into_owned(),
            autoload: "autoload".to_string(),
            portal_class: "Portal".to_string(),
            store_home: "/tmp/out".to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
            env: BTreeMap::new(),
        }
    }

    #[test]
    fn test_spawn_echo_and_drain() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let pipe = FeedbackPipe::create()?;

        // Echoes each input line back out, then exits at end of input.
        let script = write_script(
            dir.path(),
            "#!/bin/sh\nwhile IFS= read -r line; do echo \"got $line\"; done\n",
        )?;

        let mut process = ImporterProcess::spawn(command_for(&script), &pipe)?;
        assert!(process.is_running());

        process.send_line("hello")?;
        let report = process.finish()?;

        assert_eq!(report.output, vec!["got hello".to_string()]);
        assert!(report.diagnostics.is_empty());
        assert!(report.feedback.is_empty());
        Ok(())
    }

    #[test]
    fn test_diagnostics_channel_is_separate() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let pipe = FeedbackPipe::create()?;

        let script = write_script(
            dir.path(),
            "#!/bin/sh\necho out-line\necho err-line >&2\ncat >/dev/null\n",
        )?;

        let mut process = ImporterProcess::spawn(command_for(&script), &pipe)?;
        let report = process.finish()?;

        assert_eq!(report.output, vec!["out-line".to_string()]);
        assert_eq!(report.diagnostics, vec!["err-line".to_string()]);
        assert!(!process.is_running());
        Ok(())
    }
}

//! Subprocess command templates.
//!
//! Engine commands come from `intake.toml` as argv vectors with `{input}`
//! and `{output}` placeholders, substituted at invocation time. The child's
//! stdout/stderr are captured; a nonzero exit becomes an engine error
//! carrying the stderr tail.

use std::process::{Command, Output};

use intake_shared::{IntakeError, Result};

/// Longest stderr tail carried into an error message.
const STDERR_TAIL: usize = 500;

/// A configurable argv template for one external tool.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    argv: Vec<String>,
}

impl CommandSpec {
    /// Build a spec from a configured argv vector.
    pub fn new(argv: &[String]) -> Result<Self> {
        if argv.is_empty() {
            return Err(IntakeError::config("engine command template is empty"));
        }
        Ok(Self {
            argv: argv.to_vec(),
        })
    }

    /// The program this spec invokes.
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// Substitute placeholders and return `(program, args)`.
    pub fn render(&self, input: &str, output: &str) -> (String, Vec<String>) {
        let mut rendered = self
            .argv
            .iter()
            .map(|a| a.replace("{input}", input).replace("{output}", output));
        let program = rendered.next().expect("argv is non-empty");
        (program, rendered.collect())
    }

    /// Run the command to completion, capturing output.
    /// Nonzero exit is an engine error.
    pub fn run(&self, input: &str, output: &str) -> Result<Output> {
        let (program, args) = self.render(input, output);

        tracing::debug!(%program, ?args, "running engine command");

        let out = Command::new(&program)
            .args(&args)
            .output()
            .map_err(|e| IntakeError::engine(format!("cannot spawn {program}: {e}")))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let tail: String = stderr
                .chars()
                .rev()
                .take(STDERR_TAIL)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            return Err(IntakeError::engine(format!(
                "{program} exited with {}: {}",
                out.status,
                tail.trim()
            )));
        }

        Ok(out)
    }

    /// Run the command and return its stdout as UTF-8 text.
    pub fn run_capture_stdout(&self, input: &str, output: &str) -> Result<String> {
        let out = self.run(input, output)?;
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_template_is_rejected() {
        let err = CommandSpec::new(&[]).unwrap_err();
        assert!(matches!(err, IntakeError::Config { .. }));
    }

    #[test]
    fn placeholders_are_substituted() {
        let spec = CommandSpec::new(&[
            "tool".into(),
            "{input}".into(),
            "--out={output}".into(),
            "-q".into(),
        ])
        .unwrap();

        let (program, args) = spec.render("/in/a.pdf", "/out/a.txt");
        assert_eq!(program, "tool");
        assert_eq!(args, vec!["/in/a.pdf", "--out=/out/a.txt", "-q"]);
    }

    #[test]
    fn successful_command_captures_stdout() {
        let spec = CommandSpec::new(&["echo".into(), "{input}".into()]).unwrap();
        let text = spec.run_capture_stdout("hello", "").unwrap();
        assert_eq!(text.trim(), "hello");
    }

    #[test]
    fn missing_program_is_an_engine_error() {
        let spec =
            CommandSpec::new(&["definitely-not-a-real-binary-xyz".into()]).unwrap();
        let err = spec.run("", "").unwrap_err();
        assert!(matches!(err, IntakeError::Engine { .. }));
    }

    #[test]
    fn nonzero_exit_is_an_engine_error_with_stderr() {
        let spec = CommandSpec::new(&[
            "sh".into(),
            "-c".into(),
            "echo boom >&2; exit 3".into(),
        ])
        .unwrap();
        let err = spec.run("", "").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("boom"), "stderr tail missing: {msg}");
    }
}

//! Subprocess utilities.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use anyhow::{bail, Result};

/// Builder for long-running subprocesses driven over stdin/stdout.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    /// Create a process builder from an argv vector.
    ///
    /// Returns `None` when `argv` is empty.
    pub fn from_argv<I, S>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut argv = argv.into_iter();
        let program = argv.next()?;
        Some(ProcessBuilder::new(program.as_ref()).args(argv))
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    /// Spawn the process with piped stdin and stdout.
    ///
    /// Stderr is inherited so diagnostics from the child reach the user.
    pub fn spawn_piped(&self) -> io::Result<Child> {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());

        cmd.spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound && find_executable(&self.program).is_none() {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("executable `{}` not found", self.program.display()),
                )
            } else {
                e
            }
        })
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Find an executable in PATH, or check that an explicit path is runnable.
pub fn find_executable(name: impl AsRef<OsStr>) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Split a command line into arguments.
///
/// Arguments are separated by whitespace. Double quotes group text
/// containing whitespace and are removed from the result.
pub fn split_quoted(cmdline: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in cmdline.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }

    if in_quotes {
        bail!("unterminated quote in `{}`", cmdline);
    }
    if has_token {
        args.push(current);
    }

    Ok(args)
}

//! Discoveries implemented as external processes.
//!
//! The process is driven with line commands on its stdin and answers with
//! JSON documents on its stdout:
//!
//! ```text
//! > LIST
//! < {"ports": [{"address": "/dev/ttyACM0", "protocol": "serial", ...}]}
//! > QUIT
//! ```
//!
//! A reply of the form `{"error": "message"}` reports a failure of the
//! discovery itself. Replies are decoded on a dedicated reader thread so a
//! listing can be abandoned after its timeout without blocking.

use std::io::{self, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;

use crate::core::Port;
use crate::discovery::{Discovery, DiscoveryError, DiscoveryState};
use crate::util::process::{split_quoted, ProcessBuilder};

/// How long a discovery gets to exit on its own after `QUIT`.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One decoded JSON document from stdout, or the decoding error.
type Reply = Result<Value, String>;

#[derive(Debug, Deserialize)]
struct ListReply {
    #[serde(default)]
    ports: Option<Vec<Port>>,
    #[serde(default)]
    error: Option<String>,
}

struct RunningProcess {
    child: Child,
    stdin: ChildStdin,
    replies: Receiver<Reply>,
    reader: JoinHandle<()>,
    /// `LIST` commands written whose reply has not been received yet.
    outstanding: usize,
}

/// A discovery backed by a child process.
pub struct PluggableDiscovery {
    name: String,
    command: ProcessBuilder,
    state: DiscoveryState,
    process: Option<RunningProcess>,
}

impl PluggableDiscovery {
    /// Create a discovery running `argv`.
    pub fn new<S: AsRef<str>>(name: impl Into<String>, argv: &[S]) -> Result<Self, DiscoveryError> {
        let name = name.into();
        let command = ProcessBuilder::from_argv(argv.iter().map(|a| a.as_ref())).ok_or_else(|| {
            DiscoveryError::InvalidCommand {
                name: name.clone(),
                message: "empty command line".to_string(),
            }
        })?;

        Ok(PluggableDiscovery {
            name,
            command,
            state: DiscoveryState::Created,
            process: None,
        })
    }

    /// Create a discovery from a single command line with optional quoting.
    pub fn from_command_line(name: impl Into<String>, cmdline: &str) -> Result<Self, DiscoveryError> {
        let name = name.into();
        let argv = split_quoted(cmdline).map_err(|e| DiscoveryError::InvalidCommand {
            name: name.clone(),
            message: e.to_string(),
        })?;
        Self::new(name, &argv)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    /// The command the discovery runs.
    pub fn command(&self) -> &ProcessBuilder {
        &self.command
    }

    fn io_error(&self, source: io::Error) -> DiscoveryError {
        if source.kind() == io::ErrorKind::BrokenPipe {
            DiscoveryError::Exited {
                name: self.name.clone(),
            }
        } else {
            DiscoveryError::Io {
                name: self.name.clone(),
                source,
            }
        }
    }

    fn parse_list_reply(&self, value: Value) -> Result<Vec<Port>, DiscoveryError> {
        let reply: ListReply =
            serde_json::from_value(value).map_err(|e| DiscoveryError::Protocol {
                name: self.name.clone(),
                message: e.to_string(),
            })?;

        if let Some(message) = reply.error {
            return Err(DiscoveryError::Backend {
                name: self.name.clone(),
                message,
            });
        }

        reply.ports.ok_or_else(|| DiscoveryError::Protocol {
            name: self.name.clone(),
            message: "reply has no `ports` field".to_string(),
        })
    }
}

impl Discovery for PluggableDiscovery {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<(), DiscoveryError> {
        match self.state {
            DiscoveryState::Created => {}
            DiscoveryState::Started => {
                return Err(DiscoveryError::AlreadyStarted {
                    name: self.name.clone(),
                })
            }
            DiscoveryState::Closed => {
                return Err(DiscoveryError::Closed {
                    name: self.name.clone(),
                })
            }
        }

        let mut child = self
            .command
            .spawn_piped()
            .map_err(|source| DiscoveryError::Spawn {
                name: self.name.clone(),
                source,
            })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(self.io_error(io::Error::other("discovery pipes were not captured")));
            }
        };

        let (tx, replies) = mpsc::channel();
        let reader = match spawn_reader(&self.name, stdout, tx) {
            Ok(reader) => reader,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(self.io_error(e));
            }
        };

        tracing::debug!(
            "Started discovery `{}`: {}",
            self.name,
            self.command.display_command()
        );

        self.process = Some(RunningProcess {
            child,
            stdin,
            replies,
            reader,
            outstanding: 0,
        });
        self.state = DiscoveryState::Started;
        Ok(())
    }

    fn list(&mut self, timeout: Duration) -> Result<Vec<Port>, DiscoveryError> {
        let process = match (self.state, self.process.as_mut()) {
            (DiscoveryState::Started, Some(process)) => process,
            (DiscoveryState::Closed, _) => {
                return Err(DiscoveryError::Closed {
                    name: self.name.clone(),
                })
            }
            _ => {
                return Err(DiscoveryError::NotStarted {
                    name: self.name.clone(),
                })
            }
        };

        if let Err(e) = process
            .stdin
            .write_all(b"LIST\n")
            .and_then(|_| process.stdin.flush())
        {
            return Err(self.io_error(e));
        }
        process.outstanding += 1;

        // Replies arrive in request order; only the last one answers this call.
        let deadline = Instant::now() + timeout;
        let received = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match process.replies.recv_timeout(remaining) {
                Ok(reply) => {
                    process.outstanding -= 1;
                    if process.outstanding == 0 {
                        break Ok(reply);
                    }
                    tracing::debug!("Discarding stale reply from `{}`: {:?}", self.name, reply);
                }
                Err(e) => break Err(e),
            }
        };

        match received {
            Ok(Ok(value)) => {
                tracing::debug!("Discovery `{}` replied: {}", self.name, value);
                self.parse_list_reply(value)
            }
            Ok(Err(message)) => Err(DiscoveryError::Protocol {
                name: self.name.clone(),
                message,
            }),
            Err(RecvTimeoutError::Timeout) => Err(DiscoveryError::Timeout {
                name: self.name.clone(),
                timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(DiscoveryError::Exited {
                name: self.name.clone(),
            }),
        }
    }

    fn close(&mut self) -> Result<(), DiscoveryError> {
        self.state = DiscoveryState::Closed;
        let Some(process) = self.process.take() else {
            return Ok(());
        };

        tracing::debug!("Closing discovery `{}`", self.name);

        let RunningProcess {
            mut child,
            mut stdin,
            replies,
            reader,
            ..
        } = process;

        // The discovery may already be gone; killing it below covers that.
        let _ = stdin.write_all(b"QUIT\n").and_then(|_| stdin.flush());
        drop(stdin);

        let deadline = Instant::now() + CLOSE_GRACE;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    tracing::debug!("Discovery `{}` exited with {}", self.name, status);
                    break;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
                Ok(None) => {
                    tracing::debug!("Killing discovery `{}`", self.name);
                    let _ = child.kill();
                    child.wait().map_err(|e| self.io_error(e))?;
                    break;
                }
                Err(e) => return Err(self.io_error(e)),
            }
        }

        drop(replies);

        // A grandchild may still hold stdout open; don't wait on it forever.
        let deadline = Instant::now() + CLOSE_GRACE;
        while !reader.is_finished() && Instant::now() < deadline {
            thread::sleep(POLL_INTERVAL);
        }
        if reader.is_finished() {
            let _ = reader.join();
        } else {
            tracing::debug!("Detaching output reader of discovery `{}`", self.name);
        }

        Ok(())
    }
}

impl Drop for PluggableDiscovery {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("{}", e);
        }
    }
}

fn spawn_reader(name: &str, stdout: ChildStdout, tx: Sender<Reply>) -> io::Result<JoinHandle<()>> {
    let name = name.to_string();
    thread::Builder::new()
        .name(format!("discovery-{}", name))
        .spawn(move || {
            let stream =
                serde_json::Deserializer::from_reader(BufReader::new(stdout)).into_iter::<Value>();
            for item in stream {
                let reply = item.map_err(|e| e.to_string());
                // A syntax error leaves the stream in an unknown position.
                let fatal = reply.is_err();
                if tx.send(reply).is_err() || fatal {
                    break;
                }
            }
            tracing::debug!("Output of discovery `{}` closed", name);
        })
}

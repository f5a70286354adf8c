//! Test utilities and mocks for Porthole unit tests.
//!
//! Mock implementations of the seams the board listing runs through:
//! discoveries, the hardware catalog and the tool installer.
//!
//! # Example
//!
//! ```rust,ignore
//! use porthole::test_support::{MockDiscovery, MockReply};
//!
//! #[test]
//! fn test_example() {
//!     let serial = MockDiscovery::new("serial").reply(MockReply::Timeout);
//!     let probe = serial.probe();
//!     // Register and run...
//!     assert_eq!(probe.closes(), 1);
//! }
//! ```

pub mod fixtures;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::catalog::{identify, BoardDefinition, Catalog};
use crate::core::{BoardCandidate, Port, Properties, ToolRef, ToolRelease};
use crate::discovery::{Discovery, DiscoveryError, DiscoveryState};
use crate::install::{InstallError, Installer};
use crate::util::shell::Shell;

// Re-export fixtures for convenience
pub use fixtures::*;

/// One scripted answer to `list`.
#[derive(Debug, Clone)]
pub enum MockReply {
    Ports(Vec<Port>),
    Timeout,
    Error(String),
}

/// Counters shared between a [`MockDiscovery`] and the test that owns it.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryProbe {
    starts: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    timeouts: Arc<Mutex<Vec<Duration>>>,
}

impl DiscoveryProbe {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Timeouts passed to every `list` call, in order.
    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

/// A discovery answering from a script instead of a process.
#[derive(Debug)]
pub struct MockDiscovery {
    name: String,
    start_error: Option<String>,
    replies: VecDeque<MockReply>,
    delay: Option<Duration>,
    state: DiscoveryState,
    probe: DiscoveryProbe,
}

impl MockDiscovery {
    /// A discovery that starts fine and lists no ports.
    pub fn new(name: impl Into<String>) -> Self {
        MockDiscovery {
            name: name.into(),
            start_error: None,
            replies: VecDeque::new(),
            delay: None,
            state: DiscoveryState::Created,
            probe: DiscoveryProbe::default(),
        }
    }

    /// Queue a reply. Once the queue is empty, `list` returns no ports.
    pub fn reply(mut self, reply: MockReply) -> Self {
        self.replies.push_back(reply);
        self
    }

    /// Queue a reply with the given ports.
    pub fn with_ports(self, ports: Vec<Port>) -> Self {
        self.reply(MockReply::Ports(ports))
    }

    /// Make `start` fail.
    pub fn failing_start(mut self, message: impl Into<String>) -> Self {
        self.start_error = Some(message.into());
        self
    }

    /// Sleep this long inside every `list` call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Handle to the discovery's counters.
    pub fn probe(&self) -> DiscoveryProbe {
        self.probe.clone()
    }
}

impl Discovery for MockDiscovery {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<(), DiscoveryError> {
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
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

        if let Some(message) = &self.start_error {
            return Err(DiscoveryError::Spawn {
                name: self.name.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, message.clone()),
            });
        }

        self.state = DiscoveryState::Started;
        Ok(())
    }

    fn list(&mut self, timeout: Duration) -> Result<Vec<Port>, DiscoveryError> {
        if let Ok(mut timeouts) = self.probe.timeouts.lock() {
            timeouts.push(timeout);
        }
        if self.state != DiscoveryState::Started {
            return Err(DiscoveryError::NotStarted {
                name: self.name.clone(),
            });
        }
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        match self.replies.pop_front() {
            None => Ok(Vec::new()),
            Some(MockReply::Ports(ports)) => Ok(ports),
            Some(MockReply::Timeout) => Err(DiscoveryError::Timeout {
                name: self.name.clone(),
                timeout,
            }),
            Some(MockReply::Error(message)) => Err(DiscoveryError::Backend {
                name: self.name.clone(),
                message,
            }),
        }
    }

    fn close(&mut self) -> Result<(), DiscoveryError> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        self.state = DiscoveryState::Closed;
        Ok(())
    }
}

/// An in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct MockCatalog {
    discoveries: BTreeMap<String, Vec<String>>,
    boards: Vec<BoardDefinition>,
    tools: HashMap<ToolRef, ToolRelease>,
    reload_error: Option<String>,
    reloads: usize,
    identify_calls: Arc<AtomicUsize>,
}

impl MockCatalog {
    pub fn new() -> Self {
        MockCatalog::default()
    }

    /// Declare a discovery with the given command line.
    pub fn with_discovery(mut self, name: &str, argv: &[&str]) -> Self {
        self.discoveries.insert(
            name.to_string(),
            argv.iter().map(|a| a.to_string()).collect(),
        );
        self
    }

    /// Add a board with identification properties.
    pub fn with_board(mut self, name: &str, fqbn: &str, props: &[(&str, &str)]) -> Self {
        let properties: Properties = props
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.boards
            .push(BoardDefinition::new(name, fqbn, properties));
        self
    }

    /// Make a tool release resolvable.
    pub fn with_tool(mut self, release: ToolRelease) -> Self {
        self.tools.insert(release.tool.clone(), release);
        self
    }

    /// Make `reload` fail.
    pub fn failing_reload(mut self, message: impl Into<String>) -> Self {
        self.reload_error = Some(message.into());
        self
    }

    pub fn reloads(&self) -> usize {
        self.reloads
    }

    pub fn identify_calls(&self) -> usize {
        self.identify_calls.load(Ordering::SeqCst)
    }
}

impl Catalog for MockCatalog {
    fn declared_discoveries(&self) -> BTreeMap<String, Vec<String>> {
        self.discoveries.clone()
    }

    fn identify_board(&self, attrs: &Properties) -> Vec<BoardCandidate> {
        self.identify_calls.fetch_add(1, Ordering::SeqCst);
        identify(&self.boards, attrs)
    }

    fn reload(&mut self) -> Result<()> {
        self.reloads += 1;
        if let Some(message) = &self.reload_error {
            bail!("{}", message);
        }
        Ok(())
    }

    fn tool_release(&self, tool: &ToolRef) -> Option<ToolRelease> {
        self.tools.get(tool).cloned()
    }
}

/// An installer that records calls instead of touching the network.
#[derive(Debug, Clone, Default)]
pub struct MockInstaller {
    installed: Arc<AtomicBool>,
    installs_tool: bool,
    download_error: Option<String>,
    install_error: Option<String>,
    downloads: Arc<AtomicUsize>,
    installs: Arc<AtomicUsize>,
}

impl MockInstaller {
    /// An installer whose `install` does nothing observable.
    pub fn new() -> Self {
        MockInstaller::default()
    }

    /// Report every tool as already installed.
    pub fn already_installed(self) -> Self {
        self.installed.store(true, Ordering::SeqCst);
        self
    }

    /// Make `install` mark the tool installed.
    pub fn installing(mut self) -> Self {
        self.installs_tool = true;
        self
    }

    pub fn failing_download(mut self, message: impl Into<String>) -> Self {
        self.download_error = Some(message.into());
        self
    }

    pub fn failing_install(mut self, message: impl Into<String>) -> Self {
        self.install_error = Some(message.into());
        self
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn installs(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }
}

impl Installer for MockInstaller {
    fn is_installed(&self, _release: &ToolRelease) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    fn download(&self, release: &ToolRelease, _shell: &Arc<Shell>) -> Result<(), InstallError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        match &self.download_error {
            Some(message) => Err(InstallError::Download {
                tool: release.tool.clone(),
                url: url::Url::parse("https://downloads.invalid/tool.tar.gz")
                    .expect("static URL is valid"),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn install(&self, release: &ToolRelease, _shell: &Arc<Shell>) -> Result<(), InstallError> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.install_error {
            return Err(InstallError::Extract {
                tool: release.tool.clone(),
                cause: anyhow::anyhow!("{}", message),
            });
        }
        if self.installs_tool {
            self.installed.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_discovery_script() {
        let mut disc = MockDiscovery::new("serial")
            .with_ports(vec![uno_port()])
            .reply(MockReply::Timeout);
        let probe = disc.probe();

        disc.start().unwrap();
        assert_eq!(disc.list(Duration::from_secs(1)).unwrap().len(), 1);
        assert!(disc.list(Duration::from_secs(2)).unwrap_err().is_timeout());
        assert!(disc.list(Duration::from_secs(3)).unwrap().is_empty());
        disc.close().unwrap();

        assert_eq!(probe.starts(), 1);
        assert_eq!(probe.closes(), 1);
        assert_eq!(
            probe.timeouts(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3)
            ]
        );
    }

    #[test]
    fn test_mock_installer_counts() {
        let installer = MockInstaller::new().installing();
        let release = ToolRelease::new("builtin:serial-discovery@1.0.0".parse().unwrap(), "/x");
        let shell = Arc::new(Shell::default());

        assert!(!installer.is_installed(&release));
        installer.download(&release, &shell).unwrap();
        installer.install(&release, &shell).unwrap();
        assert!(installer.is_installed(&release));
        assert_eq!((installer.downloads(), installer.installs()), (1, 1));
    }
}

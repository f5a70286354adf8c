//! Implementation of `porthole board list`.
//!
//! Every registered discovery is started and asked for its ports
//! concurrently, each with the same timeout. A discovery that fails only
//! loses its own contribution; the others are still reported.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use miette::Diagnostic as MietteDiagnostic;
use rayon::prelude::*;
use thiserror::Error;

use crate::catalog::builtin::SERIAL_DISCOVERY_NAME;
use crate::catalog::Catalog;
use crate::core::{DetectedPort, DetectedPorts, Port};
use crate::discovery::{Discovery, DiscoveryError, DiscoveryRegistry};
use crate::install::Installer;
use crate::ops::bootstrap::{ensure_builtin_discovery, BootstrapError};
use crate::util::duration::{parse_duration, DurationError};
use crate::util::exit_code;
use crate::util::shell::Shell;

/// Errors that prevent `board list` from producing any result.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum BoardListError {
    #[error("invalid timeout `{input}`")]
    #[diagnostic(
        code(porthole::board_list::invalid_timeout),
        help("Use a duration such as `1s`, `500ms` or `1m30s`")
    )]
    InvalidTimeout {
        input: String,
        #[source]
        source: DurationError,
    },

    #[error(transparent)]
    #[diagnostic(
        code(porthole::board_list::bootstrap),
        help(
            "Builtin tools are only downloaded from a mirror: set `network.tools_mirror` in config.toml to a server hosting them, or install the tool under packages/builtin/tools"
        )
    )]
    Bootstrap(#[from] BootstrapError),

    #[error("could not load hardware packages")]
    #[diagnostic(
        code(porthole::board_list::catalog),
        help("Fix or remove the offending platform.toml")
    )]
    CatalogLoad {
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },
}

impl BoardListError {
    /// Wrap a catalog loading failure.
    pub fn catalog_load(err: anyhow::Error) -> Self {
        BoardListError::CatalogLoad { source: err.into() }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            BoardListError::InvalidTimeout { .. } => exit_code::BAD_ARGUMENT,
            BoardListError::Bootstrap(_) | BoardListError::CatalogLoad { .. } => {
                exit_code::CORE_CONFIG
            }
        }
    }
}

/// Options for `board list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// Timeout applied to every discovery's listing
    pub timeout: Duration,
}

impl ListOptions {
    pub fn new(timeout: Duration) -> Self {
        ListOptions { timeout }
    }

    /// Options from a timeout string such as `"1s"` or `"1m30s"`.
    pub fn parse(timeout: &str) -> Result<Self, BoardListError> {
        let timeout = parse_duration(timeout).map_err(|source| BoardListError::InvalidTimeout {
            input: timeout.to_string(),
            source,
        })?;
        Ok(ListOptions::new(timeout))
    }
}

/// A discovery that could not deliver its ports.
#[derive(Debug)]
pub struct BackendFailure {
    pub name: String,
    pub error: DiscoveryError,
}

/// Outcome of one listing round.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub ports: DetectedPorts,
    pub failures: Vec<BackendFailure>,
}

/// Closes a discovery when dropped; created right after a successful start.
struct StartedDiscovery<'a> {
    discovery: &'a mut dyn Discovery,
}

impl Drop for StartedDiscovery<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.discovery.close() {
            tracing::warn!("Failed to close discovery `{}`: {}", self.discovery.name(), e);
        }
    }
}

fn start_and_list(
    discovery: &mut dyn Discovery,
    timeout: Duration,
) -> Result<Vec<Port>, DiscoveryError> {
    discovery.start()?;
    let mut started = StartedDiscovery { discovery };
    started.discovery.list(timeout)
}

/// Start every discovery, list its ports and identify their boards.
///
/// Discoveries run in parallel, one thread each. The result holds the
/// ports of every discovery that answered, in registry order, and one
/// failure per discovery that did not.
pub fn discover_all(
    registry: &mut DiscoveryRegistry,
    catalog: &dyn Catalog,
    options: &ListOptions,
) -> DiscoveryReport {
    let timeout = options.timeout;
    let count = registry.len();
    let tasks: Vec<_> = registry.iter_mut().collect();

    let run = move || {
        tasks
            .into_par_iter()
            .map(|(name, discovery)| (name.clone(), start_and_list(discovery.as_mut(), timeout)))
            .collect::<Vec<_>>()
    };

    // Listing blocks, so every discovery needs a thread of its own.
    let results = match rayon::ThreadPoolBuilder::new()
        .num_threads(count.max(1))
        .thread_name(|i| format!("porthole-discovery-{}", i))
        .build()
    {
        Ok(pool) => pool.install(run),
        Err(e) => {
            tracing::debug!("Falling back to the global thread pool: {}", e);
            run()
        }
    };

    let mut report = DiscoveryReport::default();
    for (name, result) in results {
        match result {
            Ok(ports) => {
                tracing::debug!("Discovery `{}` found {} port(s)", name, ports.len());
                for port in &ports {
                    let boards = catalog.identify_board(&port.identification_prefs);
                    report.ports.push(DetectedPort::new(port, boards));
                }
            }
            Err(error) => {
                tracing::warn!("Error getting port list from discovery {}: {}", name, error);
                report.failures.push(BackendFailure { name, error });
            }
        }
    }

    report
}

/// List every port visible to the builtin and catalog-declared discoveries.
///
/// The builtin serial discovery is installed first if it is missing; that
/// is the only step whose failure aborts the command.
pub fn board_list(
    catalog: &mut dyn Catalog,
    installer: &dyn Installer,
    shell: &Arc<Shell>,
    options: &ListOptions,
) -> Result<DiscoveryReport, BoardListError> {
    let serial = ensure_builtin_discovery(catalog, installer, shell)?;

    let mut builtin = DiscoveryRegistry::new();
    builtin.register_builtin(SERIAL_DISCOVERY_NAME, Box::new(serial));

    let mut registry = DiscoveryRegistry::merge(DiscoveryRegistry::from_catalog(catalog), builtin);
    tracing::debug!(
        "Listing ports from {} discoveries ({}) with timeout {:?}",
        registry.len(),
        registry.names().join(", "),
        options.timeout
    );

    Ok(discover_all(&mut registry, catalog, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use crate::core::{BoardCandidate, ToolRelease};
    use crate::catalog::builtin::serial_discovery_ref;
    use crate::test_support::{
        network_port, uno_port, unknown_port, MockCatalog, MockDiscovery, MockInstaller,
        MockReply,
    };

    fn quiet() -> Arc<Shell> {
        Arc::new(Shell::from_flags(true, false, Default::default(), false))
    }

    fn uno_catalog() -> MockCatalog {
        MockCatalog::new().with_board(
            "Arduino Uno",
            "arduino:avr:uno",
            &[("vid.0", "0x2341"), ("pid.0", "0x0043")],
        )
    }

    fn registry(discoveries: Vec<MockDiscovery>) -> DiscoveryRegistry {
        let mut registry = DiscoveryRegistry::new();
        for discovery in discoveries {
            registry.register(Box::new(discovery));
        }
        registry
    }

    #[test]
    fn test_parse_options() {
        assert_eq!(
            ListOptions::parse("10s").unwrap().timeout,
            Duration::from_secs(10)
        );
        assert_eq!(
            ListOptions::parse("1m30s").unwrap().timeout,
            Duration::from_secs(90)
        );

        let err = ListOptions::parse("ten seconds").unwrap_err();
        assert!(matches!(err, BoardListError::InvalidTimeout { .. }));
        assert_eq!(err.exit_code(), exit_code::BAD_ARGUMENT);
        assert_eq!(err.to_string(), "invalid timeout `ten seconds`");
        assert!(MietteDiagnostic::help(&err).is_some());
    }

    #[test]
    fn test_every_discovery_gets_the_same_timeout() {
        let discoveries: Vec<_> = ["serial", "network", "mdns"]
            .iter()
            .map(|name| MockDiscovery::new(*name))
            .collect();
        let probes: Vec<_> = discoveries.iter().map(|d| d.probe()).collect();
        let mut registry = registry(discoveries);

        let options = ListOptions::parse("2500ms").unwrap();
        discover_all(&mut registry, &uno_catalog(), &options);

        for probe in probes {
            assert_eq!(probe.timeouts(), vec![Duration::from_millis(2500)]);
        }
    }

    #[test]
    fn test_failing_discovery_does_not_hide_others() {
        let serial = MockDiscovery::new("serial").with_ports(vec![uno_port()]);
        let network = MockDiscovery::new("network").reply(MockReply::Error("no route".into()));
        let mdns = MockDiscovery::new("mdns").with_ports(vec![network_port("192.168.1.20")]);
        let mut registry = registry(vec![serial, network, mdns]);

        let report = discover_all(&mut registry, &uno_catalog(), &ListOptions::parse("1s").unwrap());

        let addresses: Vec<_> = report.ports.iter().map(|p| p.address.as_str()).collect();
        assert_eq!(addresses, vec!["192.168.1.20", "/dev/ttyACM0"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "network");
        assert!(report.failures[0].error.to_string().contains("no route"));
    }

    #[test]
    fn test_uno_is_identified() {
        let serial = MockDiscovery::new("serial").with_ports(vec![Port::new("/dev/ttyACM0", "serial")
            .with_identification("vid", "0x2341")
            .with_identification("pid", "0x0043")]);
        let mut registry = registry(vec![serial]);

        let report = discover_all(&mut registry, &uno_catalog(), &ListOptions::parse("1s").unwrap());

        assert_eq!(report.ports.len(), 1);
        let port = &report.ports.ports[0];
        assert_eq!(port.address, "/dev/ttyACM0");
        assert_eq!(port.protocol, "serial");
        assert_eq!(
            port.boards,
            vec![BoardCandidate::new("Arduino Uno", "arduino:avr:uno")]
        );
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_unknown_board_is_kept() {
        let serial = MockDiscovery::new("serial").with_ports(vec![unknown_port("/dev/ttyUSB0")]);
        let mut registry = registry(vec![serial]);

        let report = discover_all(&mut registry, &uno_catalog(), &ListOptions::parse("1s").unwrap());
        assert_eq!(report.ports.len(), 1);
        assert!(report.ports.ports[0].boards.is_empty());
    }

    #[test]
    fn test_timeout_yields_empty_result() {
        let serial = MockDiscovery::new("serial");
        let network = MockDiscovery::new("network");
        let mdns = MockDiscovery::new("mdns").reply(MockReply::Timeout);
        let mut registry = registry(vec![serial, network, mdns]);

        let report = discover_all(&mut registry, &uno_catalog(), &ListOptions::parse("1s").unwrap());

        assert!(report.ports.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "mdns");
        assert!(report.failures[0].error.is_timeout());
    }

    #[test]
    fn test_started_discoveries_are_closed_once() {
        let ok = MockDiscovery::new("serial").with_ports(vec![uno_port()]);
        let timed_out = MockDiscovery::new("network").reply(MockReply::Timeout);
        let broken = MockDiscovery::new("mdns").failing_start("executable not found");
        let probes = [ok.probe(), timed_out.probe(), broken.probe()];
        let mut registry = registry(vec![ok, timed_out, broken]);

        let report = discover_all(&mut registry, &uno_catalog(), &ListOptions::parse("1s").unwrap());
        assert_eq!(report.failures.len(), 2);

        assert_eq!(probes[0].closes(), 1);
        assert_eq!(probes[1].closes(), 1);
        // Never started, so nothing to close.
        assert_eq!(probes[2].starts(), 1);
        assert_eq!(probes[2].closes(), 0);
    }

    #[test]
    fn test_discoveries_are_listed_concurrently() {
        let delay = Duration::from_millis(400);
        let mut registry = registry(
            ["a", "b", "c", "d"]
                .iter()
                .map(|name| MockDiscovery::new(*name).with_delay(delay))
                .collect(),
        );

        let start = Instant::now();
        discover_all(&mut registry, &uno_catalog(), &ListOptions::parse("1s").unwrap());
        assert!(start.elapsed() < delay * 3, "took {:?}", start.elapsed());
    }

    #[test]
    fn test_empty_registry() {
        let mut registry = DiscoveryRegistry::new();
        let report = discover_all(&mut registry, &uno_catalog(), &ListOptions::parse("1s").unwrap());
        assert!(report.ports.is_empty());
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_bootstrap_failure_aborts_before_discovery() {
        let mut catalog = uno_catalog()
            .with_tool(ToolRelease::new(serial_discovery_ref(), "/nonexistent/serial-discovery"))
            .with_discovery("mdns", &["/nonexistent/mdns-discovery"]);
        let installer = MockInstaller::new();

        let err = board_list(&mut catalog, &installer, &quiet(), &ListOptions::parse("1s").unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            BoardListError::Bootstrap(BootstrapError::Missing { .. })
        ));
        assert_eq!(err.exit_code(), exit_code::CORE_CONFIG);
        assert_eq!(installer.downloads(), 1);
        assert_eq!(installer.installs(), 1);
        assert_eq!(catalog.reloads(), 1);
        assert_eq!(catalog.identify_calls(), 0);
    }

    #[test]
    fn test_board_list_reports_unstartable_builtin() {
        let mut catalog = uno_catalog()
            .with_tool(ToolRelease::new(serial_discovery_ref(), "/nonexistent/serial-discovery"));
        let installer = MockInstaller::new().already_installed();

        let report =
            board_list(&mut catalog, &installer, &quiet(), &ListOptions::parse("1s").unwrap())
                .unwrap();
        assert!(report.ports.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "serial");
        assert!(matches!(
            report.failures[0].error,
            DiscoveryError::Spawn { .. }
        ));
    }

    #[test]
    fn test_bootstrap_help_points_at_tools_mirror() {
        let err = BoardListError::from(BootstrapError::Missing {
            tool: serial_discovery_ref(),
        });
        let help = MietteDiagnostic::help(&err).unwrap().to_string();
        assert!(help.contains("network.tools_mirror"));
        assert!(help.contains("mirror"));
    }

    #[test]
    fn test_catalog_load_error_code() {
        let err = BoardListError::catalog_load(anyhow::anyhow!("bad platform.toml"));
        assert_eq!(err.exit_code(), exit_code::CORE_CONFIG);
    }
}

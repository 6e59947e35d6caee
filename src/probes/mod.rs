//! The fixed battery of posture checks
//!
//! Each probe separates host access (async I/O in `invoke`) from
//! interpretation (a pure `classify_*` function), so the status rules can be
//! tested without touching the real host.

pub mod command;
pub mod network;
pub mod privacy;
pub mod system;
pub mod tools;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{Config, Probe};
pub use tools::{PathLocator, StaticToolLocator, ToolLocator};

/// Ids of every probe this crate ships, in registry declaration order
pub const PROBE_IDS: [&str; 14] = [
    "vpn",
    "tor",
    "dns",
    "open_ports",
    "firewall",
    "public_ip",
    "mac_address",
    "hostname",
    "ssh_config",
    "aslr",
    "file_perms",
    "browser_data",
    "shell_history",
    "clipboard",
];

/// A sensitive file and the permission bits it must not carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensitiveFile {
    pub path: PathBuf,
    pub forbidden_bits: u32,
    pub issue: String,
}

impl SensitiveFile {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(path: P, forbidden_bits: u32, issue: S) -> Self {
        Self {
            path: path.into(),
            forbidden_bits,
            issue: issue.into(),
        }
    }
}

/// Where the probes find host state
#[derive(Debug, Clone)]
pub struct HostLayout {
    pub net_dir: PathBuf,
    pub resolv_conf: PathBuf,
    pub sshd_config: PathBuf,
    pub aslr_sysctl: PathBuf,
    pub hostname_file: PathBuf,
    pub home_dir: Option<PathBuf>,
    pub sensitive_files: Vec<SensitiveFile>,
}

impl Default for HostLayout {
    fn default() -> Self {
        Self {
            net_dir: PathBuf::from("/sys/class/net"),
            resolv_conf: PathBuf::from("/etc/resolv.conf"),
            sshd_config: PathBuf::from("/etc/ssh/sshd_config"),
            aslr_sysctl: PathBuf::from("/proc/sys/kernel/randomize_va_space"),
            hostname_file: PathBuf::from("/proc/sys/kernel/hostname"),
            home_dir: std::env::var_os("HOME").map(PathBuf::from),
            sensitive_files: vec![
                SensitiveFile::new("/etc/shadow", 0o004, "shadow world-read"),
                SensitiveFile::new("/etc/gshadow", 0o004, "gshadow world-read"),
                SensitiveFile::new("/etc/passwd", 0o002, "passwd world-write"),
            ],
        }
    }
}

/// Everything needed to build the probe battery
#[derive(Clone)]
pub struct ProbeSettings {
    pub layout: HostLayout,
    pub public_ip_url: String,
    pub tor_socks_addr: String,
    pub tools: Arc<dyn ToolLocator>,
    pub default_timeout: Duration,
    pub timeouts: HashMap<String, Duration>,
    pub disabled: Vec<String>,
}

impl ProbeSettings {
    pub fn from_config(config: &Config, tools: Arc<dyn ToolLocator>) -> Self {
        let mut layout = HostLayout::default();
        if let Some(home) = &config.probes.home_dir {
            layout.home_dir = Some(home.clone());
        }

        Self {
            layout,
            public_ip_url: config.probes.public_ip_url.clone(),
            tor_socks_addr: config.probes.tor_socks_addr.clone(),
            tools,
            default_timeout: Duration::from_millis(config.executor.default_timeout_ms),
            timeouts: config
                .probes
                .timeouts_ms
                .iter()
                .map(|(id, ms)| (id.clone(), Duration::from_millis(*ms)))
                .collect(),
            disabled: config.probes.disabled.clone(),
        }
    }

    /// Effective timeout for `probe`: configured override, then the probe's
    /// own declaration when it differs from the crate default, then the
    /// configured default.
    pub fn timeout_for(&self, probe: &dyn Probe) -> Duration {
        if let Some(timeout) = self.timeouts.get(probe.id()) {
            return *timeout;
        }
        if probe.timeout() != crate::core::DEFAULT_PROBE_TIMEOUT {
            return probe.timeout();
        }
        self.default_timeout
    }
}

impl std::fmt::Debug for ProbeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeSettings")
            .field("layout", &self.layout)
            .field("public_ip_url", &self.public_ip_url)
            .field("tor_socks_addr", &self.tor_socks_addr)
            .field("default_timeout", &self.default_timeout)
            .field("timeouts", &self.timeouts)
            .field("disabled", &self.disabled)
            .finish()
    }
}

/// Build the full probe battery in declaration order, minus disabled probes
pub fn default_probes(settings: &ProbeSettings) -> Vec<Arc<dyn Probe>> {
    let layout = &settings.layout;
    let tools = &settings.tools;

    let all: Vec<Arc<dyn Probe>> = vec![
        Arc::new(network::VpnProbe::new(layout.net_dir.clone())),
        Arc::new(network::TorProbe::new(
            settings.tor_socks_addr.clone(),
            Arc::clone(tools),
        )),
        Arc::new(network::DnsProbe::new(layout.resolv_conf.clone())),
        Arc::new(network::OpenPortsProbe),
        Arc::new(network::FirewallProbe),
        Arc::new(network::PublicIpProbe::new(settings.public_ip_url.clone())),
        Arc::new(system::MacAddressProbe::new(layout.net_dir.clone())),
        Arc::new(system::HostnameProbe::new(layout.hostname_file.clone())),
        Arc::new(system::SshConfigProbe::new(layout.sshd_config.clone())),
        Arc::new(system::AslrProbe::new(layout.aslr_sysctl.clone())),
        Arc::new(system::FilePermsProbe::new(layout.sensitive_files.clone())),
        Arc::new(privacy::BrowserDataProbe::new(layout.home_dir.clone())),
        Arc::new(privacy::ShellHistoryProbe::new(layout.home_dir.clone())),
        Arc::new(privacy::ClipboardProbe),
    ];

    all.into_iter()
        .filter(|probe| !settings.disabled.iter().any(|id| id == probe.id()))
        .collect()
}

use async_trait::async_trait;
use regex::Regex;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::OnceLock;

use super::command;
use super::SensitiveFile;
use crate::core::{Probe, ProbeError, ProbeOutcome, ProbeResult, Section};

/// Hostnames shipped by distributions or picked by installers
const DEFAULT_HOSTNAMES: [&str; 11] = [
    "localhost",
    "kali",
    "parrot",
    "ubuntu",
    "debian",
    "raspberrypi",
    "tracelabs",
    "pc",
    "desktop",
    "laptop",
    "user",
];

/// `addr_assign_type` values for random and user-set addresses
const RANDOMIZED_ASSIGN_TYPES: [&str; 2] = ["1", "3"];

/// A personal name such as "John-Doe"
fn identifiable_hostname() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[A-Z][a-z]+[-_ ][A-Z][a-z]+").expect("hostname regex should compile")
    })
}

fn password_authentication() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?mi)^\s*PasswordAuthentication\s+(yes|no)\b")
            .expect("PasswordAuthentication regex should compile")
    })
}

pub struct MacAddressProbe {
    net_dir: PathBuf,
}

impl MacAddressProbe {
    pub fn new(net_dir: PathBuf) -> Self {
        Self { net_dir }
    }
}

#[async_trait]
impl Probe for MacAddressProbe {
    fn id(&self) -> &'static str {
        "mac_address"
    }

    fn label(&self) -> &'static str {
        "MAC Address"
    }

    fn section(&self) -> Section {
        Section::System
    }

    async fn invoke(&self) -> ProbeResult {
        let mut assignments = Vec::new();
        for iface in command::list_dir(&self.net_dir).await? {
            if iface == "lo" {
                continue;
            }
            let assign_type =
                command::read_text_optional(&self.net_dir.join(&iface).join("addr_assign_type")).await?;
            assignments.push((iface, assign_type));
        }
        Ok(classify_mac(&assignments))
    }
}

/// `assignments` holds non-loopback interfaces in sorted order
pub fn classify_mac(assignments: &[(String, Option<String>)]) -> ProbeOutcome {
    assignments
        .iter()
        .find(|(_, assign_type)| {
            assign_type
                .as_deref()
                .map(|value| RANDOMIZED_ASSIGN_TYPES.contains(&value.trim()))
                .unwrap_or(false)
        })
        .map(|(iface, _)| ProbeOutcome::ok(format!("{} randomized", iface)))
        .unwrap_or_else(|| ProbeOutcome::critical("Hardware MAC"))
}

pub struct HostnameProbe {
    hostname_file: PathBuf,
}

impl HostnameProbe {
    pub fn new(hostname_file: PathBuf) -> Self {
        Self { hostname_file }
    }
}

#[async_trait]
impl Probe for HostnameProbe {
    fn id(&self) -> &'static str {
        "hostname"
    }

    fn label(&self) -> &'static str {
        "Hostname"
    }

    fn section(&self) -> Section {
        Section::System
    }

    async fn invoke(&self) -> ProbeResult {
        let raw = command::read_text(&self.hostname_file).await?;
        classify_hostname(&raw)
    }
}

pub fn classify_hostname(raw: &str) -> ProbeResult {
    let hostname = raw.trim();
    if hostname.is_empty() {
        return Err(ProbeError::parse("empty hostname", raw));
    }

    if identifiable_hostname().is_match(hostname) {
        return Ok(ProbeOutcome::critical(hostname));
    }

    if DEFAULT_HOSTNAMES
        .iter()
        .any(|default| default.eq_ignore_ascii_case(hostname))
    {
        return Ok(ProbeOutcome::warn(format!("{} (default)", hostname)));
    }

    Ok(ProbeOutcome::ok(hostname))
}

pub struct SshConfigProbe {
    sshd_config: PathBuf,
}

impl SshConfigProbe {
    pub fn new(sshd_config: PathBuf) -> Self {
        Self { sshd_config }
    }

    /// `None` when systemd is not there to ask
    async fn unit_active(unit: &str) -> Result<Option<bool>, ProbeError> {
        Ok(command::run_optional("systemctl", &["is-active", unit])
            .await?
            .map(|output| output.stdout == "active"))
    }
}

#[async_trait]
impl Probe for SshConfigProbe {
    fn id(&self) -> &'static str {
        "ssh_config"
    }

    fn label(&self) -> &'static str {
        "SSH Config"
    }

    fn section(&self) -> Section {
        Section::System
    }

    async fn invoke(&self) -> ProbeResult {
        let sshd = Self::unit_active("sshd").await?;
        let ssh = Self::unit_active("ssh").await?;
        if sshd == Some(false) && ssh == Some(false) {
            return Ok(ProbeOutcome::ok("sshd not running"));
        }

        match command::read_text_optional(&self.sshd_config).await? {
            Some(config) => Ok(classify_sshd_config(&config)),
            None => Ok(ProbeOutcome::ok("sshd not installed")),
        }
    }
}

pub fn classify_sshd_config(config: &str) -> ProbeOutcome {
    // sshd honours the first occurrence of a keyword
    match password_authentication()
        .captures(config)
        .and_then(|caps| caps.get(1))
        .map(|value| value.as_str().to_lowercase())
    {
        Some(value) if value == "no" => ProbeOutcome::ok("PwdAuth off"),
        Some(_) => ProbeOutcome::critical("PwdAuth on"),
        None => ProbeOutcome::warn("Default config"),
    }
}

pub struct AslrProbe {
    sysctl: PathBuf,
}

impl AslrProbe {
    pub fn new(sysctl: PathBuf) -> Self {
        Self { sysctl }
    }
}

#[async_trait]
impl Probe for AslrProbe {
    fn id(&self) -> &'static str {
        "aslr"
    }

    fn label(&self) -> &'static str {
        "Kernel ASLR"
    }

    fn section(&self) -> Section {
        Section::System
    }

    async fn invoke(&self) -> ProbeResult {
        let raw = command::read_text(&self.sysctl).await?;
        classify_aslr(&raw)
    }
}

pub fn classify_aslr(raw: &str) -> ProbeResult {
    match raw.trim() {
        "2" => Ok(ProbeOutcome::ok("Full (2)")),
        "1" => Ok(ProbeOutcome::warn("Partial (1)")),
        "0" => Ok(ProbeOutcome::critical("Disabled (0)")),
        _ => Err(ProbeError::parse("unexpected randomize_va_space value", raw)),
    }
}

pub struct FilePermsProbe {
    files: Vec<SensitiveFile>,
}

impl FilePermsProbe {
    pub fn new(files: Vec<SensitiveFile>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl Probe for FilePermsProbe {
    fn id(&self) -> &'static str {
        "file_perms"
    }

    fn label(&self) -> &'static str {
        "File Perms"
    }

    fn section(&self) -> Section {
        Section::System
    }

    async fn invoke(&self) -> ProbeResult {
        let mut modes = Vec::new();
        for file in &self.files {
            match tokio::fs::metadata(&file.path).await {
                Ok(meta) => modes.push((file, meta.permissions().mode() & 0o777)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(ProbeError::from_io(&file.path.display().to_string(), &e)),
            }
        }
        Ok(classify_file_perms(&modes))
    }
}

pub fn classify_file_perms(modes: &[(&SensitiveFile, u32)]) -> ProbeOutcome {
    let issues: Vec<&str> = modes
        .iter()
        .filter(|(file, mode)| mode & file.forbidden_bits != 0)
        .map(|(file, _)| file.issue.as_str())
        .collect();

    if issues.is_empty() {
        ProbeOutcome::ok("Correct")
    } else {
        ProbeOutcome::critical(issues.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FailureKind, Status};
    use std::fs;

    #[test]
    fn test_classify_mac() {
        let hardware = vec![
            ("eth0".to_string(), Some("0\n".to_string())),
            ("wlan0".to_string(), None),
        ];
        assert_eq!(classify_mac(&hardware), ProbeOutcome::critical("Hardware MAC"));

        let randomized = vec![
            ("eth0".to_string(), Some("0\n".to_string())),
            ("wlan0".to_string(), Some("3\n".to_string())),
        ];
        assert_eq!(classify_mac(&randomized), ProbeOutcome::ok("wlan0 randomized"));
    }

    #[tokio::test]
    async fn test_mac_probe_skips_loopback() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("lo")).unwrap();
        fs::write(dir.path().join("lo").join("addr_assign_type"), "1\n").unwrap();
        fs::create_dir(dir.path().join("enp3s0")).unwrap();
        fs::write(dir.path().join("enp3s0").join("addr_assign_type"), "0\n").unwrap();

        let probe = MacAddressProbe::new(dir.path().to_path_buf());
        assert_eq!(probe.invoke().await.unwrap().status, Status::Critical);
    }

    #[test]
    fn test_classify_hostname() {
        assert_eq!(classify_hostname("John-Doe\n").unwrap().status, Status::Critical);
        assert_eq!(
            classify_hostname("kali").unwrap(),
            ProbeOutcome::warn("kali (default)")
        );
        assert_eq!(classify_hostname("Ubuntu").unwrap().status, Status::Warn);
        assert_eq!(classify_hostname("nx-7731").unwrap(), ProbeOutcome::ok("nx-7731"));
        assert_eq!(classify_hostname("  \n").unwrap_err().kind(), FailureKind::ParseError);
    }

    #[test]
    fn test_classify_sshd_config() {
        let off = "# PasswordAuthentication yes\nPasswordAuthentication no\n";
        assert_eq!(classify_sshd_config(off), ProbeOutcome::ok("PwdAuth off"));

        let on = "Port 22\n  passwordauthentication YES\n";
        assert_eq!(classify_sshd_config(on), ProbeOutcome::critical("PwdAuth on"));

        let first_wins = "PasswordAuthentication yes\nPasswordAuthentication no\n";
        assert_eq!(classify_sshd_config(first_wins).status, Status::Critical);

        assert_eq!(
            classify_sshd_config("Port 22\n"),
            ProbeOutcome::warn("Default config")
        );
    }

    #[test]
    fn test_patterns_are_compiled_once() {
        assert!(std::ptr::eq(identifiable_hostname(), identifiable_hostname()));
        assert!(std::ptr::eq(password_authentication(), password_authentication()));
        assert_eq!(classify_hostname("Jane_Roe-laptop").unwrap().status, Status::Critical);
    }

    #[test]
    fn test_classify_aslr() {
        assert_eq!(classify_aslr("2\n").unwrap(), ProbeOutcome::ok("Full (2)"));
        assert_eq!(classify_aslr("1").unwrap().status, Status::Warn);
        assert_eq!(classify_aslr("0").unwrap(), ProbeOutcome::critical("Disabled (0)"));

        match classify_aslr("banana").unwrap_err() {
            ProbeError::Parse { excerpt, .. } => assert_eq!(excerpt, "banana"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_file_perms_probe() {
        let dir = tempfile::tempdir().unwrap();
        let shadow = dir.path().join("shadow");
        let passwd = dir.path().join("passwd");
        fs::write(&shadow, "root:*:19000::::::\n").unwrap();
        fs::write(&passwd, "root:x:0:0::/root:/bin/sh\n").unwrap();
        fs::set_permissions(&shadow, fs::Permissions::from_mode(0o640)).unwrap();
        fs::set_permissions(&passwd, fs::Permissions::from_mode(0o644)).unwrap();

        let files = vec![
            SensitiveFile::new(&shadow, 0o004, "shadow world-read"),
            SensitiveFile::new(dir.path().join("gshadow"), 0o004, "gshadow world-read"),
            SensitiveFile::new(&passwd, 0o002, "passwd world-write"),
        ];
        let probe = FilePermsProbe::new(files.clone());
        assert_eq!(probe.invoke().await.unwrap(), ProbeOutcome::ok("Correct"));

        fs::set_permissions(&shadow, fs::Permissions::from_mode(0o644)).unwrap();
        fs::set_permissions(&passwd, fs::Permissions::from_mode(0o666)).unwrap();
        let probe = FilePermsProbe::new(files);
        assert_eq!(
            probe.invoke().await.unwrap(),
            ProbeOutcome::critical("shadow world-read, passwd world-write")
        );
    }
}

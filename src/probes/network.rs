use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

use super::command::{self, CommandOutput};
use super::tools::ToolLocator;
use crate::core::{Probe, ProbeError, ProbeOutcome, ProbeResult, Section};

/// Resolvers operated by privacy-respecting or at least non-ISP providers
pub const PRIVACY_DNS: [&str; 15] = [
    // Quad9
    "9.9.9.9",
    "9.9.9.10",
    "9.9.9.11",
    "9.9.9.12",
    "149.112.112.112",
    // Cloudflare
    "1.1.1.1",
    "1.0.0.1",
    // OpenDNS
    "208.67.222.222",
    "208.67.220.220",
    // Google
    "8.8.8.8",
    "8.8.4.4",
    // NextDNS
    "45.90.28.0",
    "45.90.30.0",
    // AdGuard
    "94.140.14.14",
    "94.140.15.15",
];

const VPN_PREFIXES: [&str; 3] = ["tun", "wg", "tap"];
const TOR_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct VpnProbe {
    net_dir: PathBuf,
}

impl VpnProbe {
    pub fn new(net_dir: PathBuf) -> Self {
        Self { net_dir }
    }
}

#[async_trait]
impl Probe for VpnProbe {
    fn id(&self) -> &'static str {
        "vpn"
    }

    fn label(&self) -> &'static str {
        "VPN Status"
    }

    fn section(&self) -> Section {
        Section::Network
    }

    async fn invoke(&self) -> ProbeResult {
        let interfaces = command::list_dir(&self.net_dir).await?;

        let mut tunnels = Vec::new();
        for name in interfaces
            .into_iter()
            .filter(|name| VPN_PREFIXES.iter().any(|prefix| name.starts_with(prefix)))
        {
            let operstate = command::read_text_optional(&self.net_dir.join(&name).join("operstate")).await?;
            tunnels.push((name, operstate));
        }

        Ok(classify_vpn(&tunnels))
    }
}

/// `tunnels` holds tunnel-like interfaces with their operstate, if readable
pub fn classify_vpn(tunnels: &[(String, Option<String>)]) -> ProbeOutcome {
    if tunnels.is_empty() {
        return ProbeOutcome::critical("No VPN found");
    }

    if let Some((name, _)) = tunnels
        .iter()
        .find(|(_, state)| state.as_deref().map(str::trim) == Some("up"))
    {
        return ProbeOutcome::ok(format!("{} UP", name));
    }

    let names: Vec<&str> = tunnels.iter().map(|(name, _)| name.as_str()).collect();
    ProbeOutcome::warn(format!("{} down", names.join(", ")))
}

pub struct TorProbe {
    socks_addr: String,
    tools: Arc<dyn ToolLocator>,
}

impl TorProbe {
    pub fn new(socks_addr: String, tools: Arc<dyn ToolLocator>) -> Self {
        Self { socks_addr, tools }
    }

    async fn service_active(&self) -> Result<bool, ProbeError> {
        match command::run_optional("systemctl", &["is-active", "tor"]).await? {
            Some(output) => Ok(output.stdout == "active"),
            None => Ok(false),
        }
    }

    async fn socks_reachable(&self) -> bool {
        matches!(
            tokio::time::timeout(TOR_CONNECT_TIMEOUT, TcpStream::connect(&self.socks_addr)).await,
            Ok(Ok(_))
        )
    }
}

#[async_trait]
impl Probe for TorProbe {
    fn id(&self) -> &'static str {
        "tor"
    }

    fn label(&self) -> &'static str {
        "Tor Status"
    }

    fn section(&self) -> Section {
        Section::Network
    }

    async fn invoke(&self) -> ProbeResult {
        let active = self.service_active().await?;
        let reachable = active && self.socks_reachable().await;
        let installed = self.tools.is_available("tor");

        let port = self.socks_addr.rsplit(':').next().unwrap_or_default();
        Ok(classify_tor(active, reachable, installed, port))
    }
}

pub fn classify_tor(active: bool, reachable: bool, installed: bool, port: &str) -> ProbeOutcome {
    match (active, reachable, installed) {
        (true, true, _) => ProbeOutcome::ok(format!("Running :{}", port)),
        (true, false, _) => ProbeOutcome::ok("Active (port N/A)"),
        (false, _, true) => ProbeOutcome::warn("Installed, stopped"),
        (false, _, false) => ProbeOutcome::critical("Not found"),
    }
}

pub struct DnsProbe {
    resolv_conf: PathBuf,
}

impl DnsProbe {
    pub fn new(resolv_conf: PathBuf) -> Self {
        Self { resolv_conf }
    }
}

#[async_trait]
impl Probe for DnsProbe {
    fn id(&self) -> &'static str {
        "dns"
    }

    fn label(&self) -> &'static str {
        "DNS Leak"
    }

    fn section(&self) -> Section {
        Section::Network
    }

    async fn invoke(&self) -> ProbeResult {
        let resolv = command::read_text(&self.resolv_conf).await?;
        classify_dns(&resolv)
    }
}

/// Nameserver addresses declared in a resolv.conf body, comments ignored
pub fn parse_nameservers(resolv: &str) -> Vec<String> {
    resolv
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            match (tokens.next(), tokens.next()) {
                (Some("nameserver"), Some(address)) => Some(address.to_string()),
                _ => None,
            }
        })
        .collect()
}

pub fn classify_dns(resolv: &str) -> ProbeResult {
    let nameservers = parse_nameservers(resolv);
    if nameservers.is_empty() {
        return Err(ProbeError::parse("no nameserver entries", resolv));
    }

    let mut display = nameservers
        .iter()
        .take(2)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if nameservers.len() > 2 {
        display.push_str("...");
    }

    if nameservers.iter().any(|ns| PRIVACY_DNS.contains(&ns.as_str())) {
        return Ok(ProbeOutcome::ok(display));
    }

    let is_private = |ns: &String| ns.parse::<Ipv4Addr>().map(|ip| ip.is_private()).unwrap_or(false);
    if nameservers.iter().any(is_private) {
        return Ok(ProbeOutcome::warn(format!("Proxy resolver {}", display)));
    }

    Ok(ProbeOutcome::critical(format!("ISP DNS {}", display)))
}

pub struct OpenPortsProbe;

#[async_trait]
impl Probe for OpenPortsProbe {
    fn id(&self) -> &'static str {
        "open_ports"
    }

    fn label(&self) -> &'static str {
        "Open Ports"
    }

    fn section(&self) -> Section {
        Section::Network
    }

    fn required_tools(&self) -> &[&'static str] {
        &["ss"]
    }

    async fn invoke(&self) -> ProbeResult {
        let output = command::run("ss", &["-tln"]).await?;
        if !output.success {
            return Err(ProbeError::unexpected(format!("ss failed: {}", output.stderr)));
        }
        Ok(classify_open_ports(&output.stdout))
    }
}

pub fn count_listening(ss_output: &str) -> usize {
    ss_output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.starts_with("State") && !line.starts_with("Netid"))
        .count()
}

pub fn classify_open_ports(ss_output: &str) -> ProbeOutcome {
    let listening = count_listening(ss_output);
    let detail = format!("{} listening", listening);
    match listening {
        0..=3 => ProbeOutcome::ok(detail),
        4..=5 => ProbeOutcome::warn(detail),
        _ => ProbeOutcome::critical(detail),
    }
}

pub struct FirewallProbe;

#[async_trait]
impl Probe for FirewallProbe {
    fn id(&self) -> &'static str {
        "firewall"
    }

    fn label(&self) -> &'static str {
        "Firewall"
    }

    fn section(&self) -> Section {
        Section::Network
    }

    fn required_tools(&self) -> &[&'static str] {
        &["ufw", "iptables", "nft"]
    }

    async fn invoke(&self) -> ProbeResult {
        let ufw = command::run_optional("ufw", &["status"]).await?;
        let iptables = command::run_optional("iptables", &["-L", "-n"]).await?;
        let nft = command::run_optional("nft", &["list", "ruleset"]).await?;

        classify_firewall(ufw.as_ref(), iptables.as_ref(), nft.as_ref())
    }
}

pub fn classify_firewall(
    ufw: Option<&CommandOutput>,
    iptables: Option<&CommandOutput>,
    nft: Option<&CommandOutput>,
) -> ProbeResult {
    if let Some(out) = ufw.filter(|o| o.success) {
        let status = out.stdout.to_lowercase();
        if status.contains("active") && !status.contains("inactive") {
            return Ok(ProbeOutcome::ok("ufw active"));
        }
    }

    if let Some(out) = iptables.filter(|o| o.success) {
        let rules = out
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter(|line| !line.starts_with("Chain") && !line.starts_with("target"))
            .count();
        if rules > 0 {
            return Ok(ProbeOutcome::ok(format!("iptables {} rules", rules)));
        }
    }

    if let Some(out) = nft.filter(|o| o.success) {
        if out.stdout.lines().count() > 2 {
            return Ok(ProbeOutcome::ok("nftables active"));
        }
    }

    let present: Vec<&CommandOutput> = [ufw, iptables, nft].into_iter().flatten().collect();
    if !present.is_empty() && present.iter().all(|out| out.denied()) {
        return Err(ProbeError::permission_denied("firewall rules unreadable"));
    }

    Ok(ProbeOutcome::critical("No firewall"))
}

pub struct PublicIpProbe {
    url: String,
}

impl PublicIpProbe {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

#[async_trait]
impl Probe for PublicIpProbe {
    fn id(&self) -> &'static str {
        "public_ip"
    }

    fn label(&self) -> &'static str {
        "Public IP"
    }

    fn section(&self) -> Section {
        Section::Network
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn invoke(&self) -> ProbeResult {
        let client = reqwest::Client::builder()
            .user_agent(concat!("postureguard/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ProbeError::unexpected(format!("HTTP client unavailable: {}", e)))?;

        let response = client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ProbeError::unexpected(format!("Unavailable: {}", e)))?;

        if !response.status().is_success() {
            return Err(ProbeError::unexpected(format!(
                "Unavailable: HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProbeError::unexpected(format!("Unavailable: {}", e)))?;
        classify_public_ip(&body)
    }
}

/// The address is informational: it carries no posture judgement
pub fn classify_public_ip(body: &str) -> ProbeResult {
    body.trim()
        .parse::<IpAddr>()
        .map(|ip| ProbeOutcome::unknown(ip.to_string()))
        .map_err(|_| ProbeError::parse("response is not an IP address", body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FailureKind, Status};
    use std::fs;

    fn output(success: bool, stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            success,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_classify_vpn() {
        assert_eq!(classify_vpn(&[]).status, Status::Critical);

        let up = vec![
            ("tun0".to_string(), Some("down\n".to_string())),
            ("wg0".to_string(), Some("up\n".to_string())),
        ];
        assert_eq!(classify_vpn(&up), ProbeOutcome::ok("wg0 UP"));

        let down = vec![
            ("tun0".to_string(), Some("down".to_string())),
            ("tap1".to_string(), None),
        ];
        assert_eq!(classify_vpn(&down), ProbeOutcome::warn("tun0, tap1 down"));
    }

    #[tokio::test]
    async fn test_vpn_probe_reads_sysfs_layout() {
        let dir = tempfile::tempdir().unwrap();
        for (iface, state) in [("lo", "unknown"), ("eth0", "up"), ("wg0", "up")] {
            fs::create_dir(dir.path().join(iface)).unwrap();
            fs::write(dir.path().join(iface).join("operstate"), format!("{}\n", state)).unwrap();
        }

        let probe = VpnProbe::new(dir.path().to_path_buf());
        assert_eq!(probe.invoke().await.unwrap(), ProbeOutcome::ok("wg0 UP"));
    }

    #[tokio::test]
    async fn test_vpn_probe_missing_net_dir_is_fault() {
        let probe = VpnProbe::new(PathBuf::from("/nonexistent/sys/class/net"));
        let err = probe.invoke().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::UnexpectedFault);
    }

    #[test]
    fn test_classify_tor() {
        assert_eq!(classify_tor(true, true, true, "9050"), ProbeOutcome::ok("Running :9050"));
        assert_eq!(classify_tor(true, false, true, "9050").detail, "Active (port N/A)");
        assert_eq!(classify_tor(false, false, true, "9050").status, Status::Warn);
        assert_eq!(classify_tor(false, false, false, "9050").status, Status::Critical);
    }

    #[test]
    fn test_classify_dns() {
        let privacy = "# generated\nnameserver 9.9.9.9\nnameserver 192.168.1.1\n";
        assert_eq!(classify_dns(privacy).unwrap(), ProbeOutcome::ok("9.9.9.9, 192.168.1.1"));

        let proxy = "nameserver 172.20.0.1\n";
        assert_eq!(
            classify_dns(proxy).unwrap(),
            ProbeOutcome::warn("Proxy resolver 172.20.0.1")
        );

        let isp = "nameserver 81.2.69.142\nnameserver 81.2.69.143\nnameserver 81.2.69.144\n";
        assert_eq!(
            classify_dns(isp).unwrap(),
            ProbeOutcome::critical("ISP DNS 81.2.69.142, 81.2.69.143...")
        );

        let commented = "# nameserver 1.1.1.1\nsearch lan\n";
        assert_eq!(
            classify_dns(commented).unwrap_err().kind(),
            FailureKind::ParseError
        );
    }

    #[test]
    fn test_classify_open_ports() {
        let header = "State  Recv-Q Send-Q Local Address:Port Peer Address:Port Process\n";
        let line = "LISTEN 0      128    0.0.0.0:22         0.0.0.0:*\n";

        assert_eq!(classify_open_ports(header), ProbeOutcome::ok("0 listening"));
        assert_eq!(
            classify_open_ports(&format!("{}{}", header, line.repeat(3))).status,
            Status::Ok
        );
        assert_eq!(
            classify_open_ports(&format!("{}{}", header, line.repeat(5))),
            ProbeOutcome::warn("5 listening")
        );
        assert_eq!(
            classify_open_ports(&format!("{}{}", header, line.repeat(6))).status,
            Status::Critical
        );
    }

    #[test]
    fn test_classify_firewall() {
        let ufw_active = output(true, "Status: active\n\nTo Action From", "");
        assert_eq!(
            classify_firewall(Some(&ufw_active), None, None).unwrap(),
            ProbeOutcome::ok("ufw active")
        );

        let ufw_inactive = output(true, "Status: inactive", "");
        let iptables = output(
            true,
            "Chain INPUT (policy DROP)\ntarget prot opt source destination\nACCEPT all -- 0.0.0.0/0 0.0.0.0/0\n",
            "",
        );
        assert_eq!(
            classify_firewall(Some(&ufw_inactive), Some(&iptables), None).unwrap(),
            ProbeOutcome::ok("iptables 1 rules")
        );

        let empty_nft = output(true, "", "");
        assert_eq!(
            classify_firewall(Some(&ufw_inactive), None, Some(&empty_nft))
                .unwrap()
                .status,
            Status::Critical
        );
    }

    #[test]
    fn test_firewall_without_privileges() {
        let ufw = output(false, "", "ERROR: You need to be root to run this script");
        let iptables = output(false, "", "iptables: Permission denied (you must be root)");
        let err = classify_firewall(Some(&ufw), Some(&iptables), None).unwrap_err();
        assert_eq!(err.kind(), FailureKind::PermissionDenied);
    }

    #[test]
    fn test_classify_public_ip() {
        assert_eq!(
            classify_public_ip("203.0.113.7\n").unwrap(),
            ProbeOutcome::unknown("203.0.113.7")
        );
        let err = classify_public_ip("<html>rate limited</html>").unwrap_err();
        assert_eq!(err.kind(), FailureKind::ParseError);
    }
}

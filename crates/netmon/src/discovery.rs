//! Network environment discovery abstraction.
//!
//! The [`NetworkDiscovery`] trait abstracts the OS queries the sampler and the
//! change watcher depend on, so production code uses [`SystemDiscovery`] while
//! tests use `MockDiscovery`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────┐   ┌───────────────┐
//! │ Sampler │   │ ChangeWatcher │
//! └────┬────┘   └───────┬───────┘
//!      └───────┬────────┘
//!              ▼
//!     ┌──────────────────┐
//!     │ NetworkDiscovery │ (trait)
//!     └──────────────────┘
//!          │        │
//!          ▼        ▼
//!     ┌────────┐ ┌──────┐
//!     │ System │ │ Mock │
//!     └───┬────┘ └──────┘
//!         │
//!         ▼
//!   /proc/net/route, getifaddrs(3), iwgetid
//! ```
//!
//! # Degradation
//!
//! Trait methods return `Result` so implementations can report what went wrong,
//! but [`discover_environment`] never fails: every error is logged and the
//! corresponding field becomes `None`. Monitoring then continues in a
//! disconnected state instead of failing startup.

use std::future::Future;
use std::net::Ipv4Addr;
use std::time::Duration;

use tracing::{debug, warn};

use gotchi_core::types::{NetworkInfo, UNKNOWN_SSID};

use crate::error::NetmonError;

/// Path of the kernel IPv4 routing table.
const ROUTE_TABLE_PATH: &str = "/proc/net/route";

/// Upper bound for the SSID helper process.
const SSID_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Address used to pick the outbound interface for the local IPv4 lookup.
/// No packet is sent; connecting a UDP socket only selects a route.
const ROUTE_PROBE_ADDR: &str = "8.8.8.8:80";

/// Interface name prefixes that indicate a wireless link.
const WIRELESS_PREFIXES: [&str; 3] = ["wl", "wlan", "wifi"];

/// Trait abstracting network environment queries.
///
/// All methods must complete in bounded time.
///
/// # Implementations
///
/// - [`SystemDiscovery`]: Linux implementation
/// - `MockDiscovery`: scripted responses (available in tests only)
pub trait NetworkDiscovery: Send + Sync + 'static {
    /// Default IPv4 next hop.
    fn default_gateway(
        &self,
    ) -> impl Future<Output = Result<Option<Ipv4Addr>, NetmonError>> + Send;

    /// Name of the interface carrying traffic, preferring wireless links.
    fn active_interface(&self) -> impl Future<Output = Result<Option<String>, NetmonError>> + Send;

    /// SSID of the associated wireless network.
    fn ssid(&self) -> impl Future<Output = Result<Option<String>, NetmonError>> + Send;

    /// IPv4 address used for outbound traffic.
    fn local_ipv4(&self) -> impl Future<Output = Result<Option<Ipv4Addr>, NetmonError>> + Send;

    /// Every interface with an IPv4 address, loopback included.
    fn interfaces_with_ipv4(
        &self,
    ) -> impl Future<Output = Result<Vec<(String, Ipv4Addr)>, NetmonError>> + Send;
}

/// Runs every discovery query and folds the results into a [`NetworkInfo`].
///
/// Errors degrade to `None`. `connected` is set from gateway presence; the
/// sampler refines it with a reachability probe every cycle.
pub async fn discover_environment<D: NetworkDiscovery>(discovery: &D) -> NetworkInfo {
    let gateway = discovery.default_gateway().await.unwrap_or_else(|e| {
        warn!(error = %e, "default gateway discovery failed");
        None
    });
    let interface = discovery.active_interface().await.unwrap_or_else(|e| {
        warn!(error = %e, "active interface discovery failed");
        None
    });
    let local_ip = discovery.local_ipv4().await.unwrap_or_else(|e| {
        warn!(error = %e, "local address discovery failed");
        None
    });
    let ssid = discovery.ssid().await.unwrap_or_else(|e| {
        debug!(error = %e, "ssid lookup failed");
        None
    });

    let network_prefix = local_ip.map(network_prefix);
    let ssid = ssid
        .or_else(|| network_prefix.clone())
        .unwrap_or_else(|| UNKNOWN_SSID.to_owned());

    let info = NetworkInfo {
        gateway,
        interface,
        ssid,
        local_ip,
        network_prefix,
        connected: gateway.is_some(),
    };

    debug!(
        gateway = ?info.gateway,
        interface = ?info.interface,
        ssid = %info.ssid,
        local_ip = ?info.local_ip,
        "network environment discovered"
    );

    info
}

/// First three octets of an IPv4 address, e.g. `192.168.1`.
pub fn network_prefix(ip: Ipv4Addr) -> String {
    let [a, b, c, _] = ip.octets();
    format!("{a}.{b}.{c}")
}

/// Parses the default gateway out of `/proc/net/route` content.
///
/// The default route has destination `00000000` and the gateway flag set.
/// Addresses are printed in host byte order.
pub fn parse_default_gateway(content: &str) -> Option<Ipv4Addr> {
    const RTF_UP: u32 = 0x1;
    const RTF_GATEWAY: u32 = 0x2;

    for line in content.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 || fields[1] != "00000000" {
            continue;
        }
        let Ok(flags) = u32::from_str_radix(fields[3], 16) else {
            continue;
        };
        if flags & (RTF_UP | RTF_GATEWAY) != (RTF_UP | RTF_GATEWAY) {
            continue;
        }
        if let Ok(raw) = u32::from_str_radix(fields[2], 16) {
            let gateway = Ipv4Addr::from(raw.to_ne_bytes());
            if !gateway.is_unspecified() {
                return Some(gateway);
            }
        }
    }

    None
}

/// Parses the default-route interface name out of `/proc/net/route` content.
pub fn parse_default_route_interface(content: &str) -> Option<String> {
    content
        .lines()
        .skip(1)
        .map(|line| line.split_whitespace().collect::<Vec<_>>())
        .find(|fields| fields.len() >= 2 && fields[1] == "00000000")
        .map(|fields| fields[0].to_owned())
}

/// Picks the active interface: wireless first, then the default-route
/// interface, then any non-loopback interface with an IPv4 address.
pub fn choose_active_interface(
    interfaces: &[(String, Ipv4Addr)],
    default_route_iface: Option<&str>,
) -> Option<String> {
    let candidates: Vec<&String> = interfaces
        .iter()
        .filter(|(name, ip)| name != "lo" && !ip.is_loopback())
        .map(|(name, _)| name)
        .collect();

    if let Some(wireless) = candidates
        .iter()
        .find(|name| WIRELESS_PREFIXES.iter().any(|p| name.starts_with(p)))
    {
        return Some((*wireless).clone());
    }

    if let Some(route_iface) = default_route_iface {
        if candidates.iter().any(|name| name.as_str() == route_iface) {
            return Some(route_iface.to_owned());
        }
    }

    candidates.first().map(|name| (*name).clone())
}

/// Linux discovery backed by procfs, `getifaddrs(3)` and `iwgetid`.
#[derive(Debug, Clone, Default)]
pub struct SystemDiscovery;

impl SystemDiscovery {
    /// Creates a new system discovery provider.
    pub fn new() -> Self {
        Self
    }

    async fn read_route_table(&self) -> Result<String, NetmonError> {
        tokio::fs::read_to_string(ROUTE_TABLE_PATH)
            .await
            .map_err(|e| NetmonError::Discovery(format!("failed to read {ROUTE_TABLE_PATH}: {e}")))
    }
}

impl NetworkDiscovery for SystemDiscovery {
    async fn default_gateway(&self) -> Result<Option<Ipv4Addr>, NetmonError> {
        let content = self.read_route_table().await?;
        Ok(parse_default_gateway(&content))
    }

    async fn active_interface(&self) -> Result<Option<String>, NetmonError> {
        let interfaces = self.interfaces_with_ipv4().await?;
        let route_iface = match self.read_route_table().await {
            Ok(content) => parse_default_route_interface(&content),
            Err(e) => {
                debug!(error = %e, "route table unavailable, choosing interface by name");
                None
            }
        };
        Ok(choose_active_interface(&interfaces, route_iface.as_deref()))
    }

    async fn ssid(&self) -> Result<Option<String>, NetmonError> {
        let mut command = tokio::process::Command::new("iwgetid");
        command.arg("-r").kill_on_drop(true);

        let output = tokio::time::timeout(SSID_COMMAND_TIMEOUT, command.output())
            .await
            .map_err(|_| NetmonError::Discovery("iwgetid timed out".to_owned()))?
            .map_err(|e| NetmonError::Discovery(format!("iwgetid failed to run: {e}")))?;

        if !output.status.success() {
            return Ok(None);
        }

        let ssid = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        Ok((!ssid.is_empty()).then_some(ssid))
    }

    async fn local_ipv4(&self) -> Result<Option<Ipv4Addr>, NetmonError> {
        let socket = tokio::net::UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| NetmonError::Discovery(format!("udp bind failed: {e}")))?;
        if let Err(e) = socket.connect(ROUTE_PROBE_ADDR).await {
            // 라우트가 없으면 오프라인
            debug!(error = %e, "no outbound route for local address lookup");
            return Ok(None);
        }
        let addr = socket
            .local_addr()
            .map_err(|e| NetmonError::Discovery(format!("local_addr failed: {e}")))?;
        Ok(match addr.ip() {
            std::net::IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
            _ => None,
        })
    }

    async fn interfaces_with_ipv4(&self) -> Result<Vec<(String, Ipv4Addr)>, NetmonError> {
        list_ipv4_interfaces()
    }
}

#[cfg(unix)]
fn list_ipv4_interfaces() -> Result<Vec<(String, Ipv4Addr)>, NetmonError> {
    let addrs = nix::ifaddrs::getifaddrs()
        .map_err(|e| NetmonError::Discovery(format!("getifaddrs failed: {e}")))?;

    let mut interfaces = Vec::new();
    for ifaddr in addrs {
        let Some(sin) = ifaddr.address.as_ref().and_then(|a| a.as_sockaddr_in()) else {
            continue;
        };
        interfaces.push((ifaddr.interface_name, sin.ip()));
    }
    Ok(interfaces)
}

#[cfg(not(unix))]
fn list_ipv4_interfaces() -> Result<Vec<(String, Ipv4Addr)>, NetmonError> {
    Err(NetmonError::Discovery(
        "interface enumeration is not supported on this platform".to_owned(),
    ))
}

/// 테스트용 Mock 탐색기
///
/// 응답을 런타임에 바꿀 수 있어 네트워크 변경 시나리오를 재현할 수 있습니다.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockDiscovery {
    state: std::sync::Mutex<MockDiscoveryState>,
}

#[cfg(test)]
#[derive(Debug, Default, Clone)]
struct MockDiscoveryState {
    gateway: Option<Ipv4Addr>,
    interface: Option<String>,
    ssid: Option<String>,
    local_ip: Option<Ipv4Addr>,
    interfaces: Vec<(String, Ipv4Addr)>,
    failing: bool,
    calls: usize,
}

#[cfg(test)]
impl MockDiscovery {
    /// 아무것도 탐색되지 않는 mock을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 일반적인 무선 홈 네트워크 환경을 가진 mock을 생성합니다.
    pub fn home_network() -> Self {
        let mock = Self::new();
        mock.set_network(
            Some(Ipv4Addr::new(192, 168, 1, 1)),
            vec![
                ("lo".to_owned(), Ipv4Addr::LOCALHOST),
                ("wlan0".to_owned(), Ipv4Addr::new(192, 168, 1, 20)),
            ],
        );
        mock.state.lock().unwrap().ssid = Some("home".to_owned());
        mock
    }

    /// 게이트웨이와 인터페이스 목록을 바꿉니다.
    pub fn set_network(&self, gateway: Option<Ipv4Addr>, interfaces: Vec<(String, Ipv4Addr)>) {
        let mut state = self.state.lock().unwrap();
        state.gateway = gateway;
        state.interface = choose_active_interface(&interfaces, None);
        state.local_ip = interfaces
            .iter()
            .find(|(_, ip)| !ip.is_loopback())
            .map(|(_, ip)| *ip);
        state.interfaces = interfaces;
    }

    /// SSID를 바꿉니다.
    pub fn set_ssid(&self, ssid: Option<&str>) {
        self.state.lock().unwrap().ssid = ssid.map(str::to_owned);
    }

    /// 모든 조회가 실패하도록 설정합니다.
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    /// `default_gateway` 호출 횟수
    pub fn gateway_calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    fn snapshot(&self) -> Result<MockDiscoveryState, NetmonError> {
        let state = self.state.lock().unwrap();
        if state.failing {
            return Err(NetmonError::Discovery("mock failure".to_owned()));
        }
        Ok(state.clone())
    }
}

#[cfg(test)]
impl NetworkDiscovery for MockDiscovery {
    async fn default_gateway(&self) -> Result<Option<Ipv4Addr>, NetmonError> {
        self.state.lock().unwrap().calls += 1;
        Ok(self.snapshot()?.gateway)
    }

    async fn active_interface(&self) -> Result<Option<String>, NetmonError> {
        Ok(self.snapshot()?.interface)
    }

    async fn ssid(&self) -> Result<Option<String>, NetmonError> {
        Ok(self.snapshot()?.ssid)
    }

    async fn local_ipv4(&self) -> Result<Option<Ipv4Addr>, NetmonError> {
        Ok(self.snapshot()?.local_ip)
    }

    async fn interfaces_with_ipv4(&self) -> Result<Vec<(String, Ipv4Addr)>, NetmonError> {
        Ok(self.snapshot()?.interfaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTE_TABLE: &str = "\
Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT
wlan0\t00000000\t0101A8C0\t0003\t0\t0\t600\t00000000\t0\t0\t0
wlan0\t0001A8C0\t00000000\t0001\t0\t0\t600\t00FFFFFF\t0\t0\t0
";

    #[test]
    fn parses_default_gateway() {
        // 0101A8C0는 호스트 바이트 순서(little-endian)의 192.168.1.1
        if cfg!(target_endian = "little") {
            assert_eq!(
                parse_default_gateway(ROUTE_TABLE),
                Some(Ipv4Addr::new(192, 168, 1, 1))
            );
        }
    }

    #[test]
    fn ignores_routes_without_gateway_flag() {
        let table = "\
Iface\tDestination\tGateway \tFlags
eth0\t00000000\t0101A8C0\t0001
";
        assert_eq!(parse_default_gateway(table), None);
    }

    #[test]
    fn empty_route_table_has_no_gateway() {
        assert_eq!(parse_default_gateway("Iface\tDestination\tGateway\tFlags\n"), None);
        assert_eq!(parse_default_gateway(""), None);
    }

    #[test]
    fn parses_default_route_interface() {
        assert_eq!(
            parse_default_route_interface(ROUTE_TABLE).as_deref(),
            Some("wlan0")
        );
    }

    #[test]
    fn prefers_wireless_interface() {
        let interfaces = vec![
            ("lo".to_owned(), Ipv4Addr::LOCALHOST),
            ("eth0".to_owned(), Ipv4Addr::new(10, 0, 0, 5)),
            ("wlp2s0".to_owned(), Ipv4Addr::new(192, 168, 1, 20)),
        ];
        assert_eq!(
            choose_active_interface(&interfaces, Some("eth0")).as_deref(),
            Some("wlp2s0")
        );
    }

    #[test]
    fn falls_back_to_default_route_interface() {
        let interfaces = vec![
            ("docker0".to_owned(), Ipv4Addr::new(172, 17, 0, 1)),
            ("eth0".to_owned(), Ipv4Addr::new(10, 0, 0, 5)),
        ];
        assert_eq!(
            choose_active_interface(&interfaces, Some("eth0")).as_deref(),
            Some("eth0")
        );
        assert_eq!(
            choose_active_interface(&interfaces, None).as_deref(),
            Some("docker0")
        );
    }

    #[test]
    fn loopback_only_has_no_active_interface() {
        let interfaces = vec![("lo".to_owned(), Ipv4Addr::LOCALHOST)];
        assert_eq!(choose_active_interface(&interfaces, Some("lo")), None);
    }

    #[test]
    fn network_prefix_keeps_three_octets() {
        assert_eq!(network_prefix(Ipv4Addr::new(10, 20, 30, 40)), "10.20.30");
    }

    #[tokio::test]
    async fn discover_environment_collects_fields() {
        let mock = MockDiscovery::home_network();
        let info = discover_environment(&mock).await;

        assert_eq!(info.gateway, Some(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(info.interface.as_deref(), Some("wlan0"));
        assert_eq!(info.ssid, "home");
        assert_eq!(info.network_prefix.as_deref(), Some("192.168.1"));
        assert!(info.connected);
    }

    #[tokio::test]
    async fn missing_ssid_falls_back_to_prefix_then_unknown() {
        let mock = MockDiscovery::home_network();
        mock.set_ssid(None);
        assert_eq!(discover_environment(&mock).await.ssid, "192.168.1");

        let empty = MockDiscovery::new();
        assert_eq!(discover_environment(&empty).await.ssid, UNKNOWN_SSID);
    }

    #[tokio::test]
    async fn discovery_failure_degrades_to_disconnected() {
        let mock = MockDiscovery::home_network();
        mock.set_failing(true);

        let info = discover_environment(&mock).await;

        assert_eq!(info.gateway, None);
        assert_eq!(info.interface, None);
        assert_eq!(info.ssid, UNKNOWN_SSID);
        assert!(!info.connected);
    }
}

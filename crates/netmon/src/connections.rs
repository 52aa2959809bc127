//! 활성 연결 목록 수집
//!
//! [`ConnectionLister`]는 원격 주소가 있는 연결을 나열합니다.
//! Linux 구현인 [`ProcNetLister`]는 `/proc/net/{tcp,tcp6,udp,udp6}`를 파싱합니다.
//!
//! - TCP: `ESTABLISHED`(상태 코드 `01`) 항목만
//! - UDP: 원격 주소가 지정된(connected) 소켓만

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

use tracing::debug;

use gotchi_core::types::{Connection, Protocol};

use crate::error::NetmonError;

/// TCP ESTABLISHED 상태 코드
const TCP_ESTABLISHED: &str = "01";

/// 활성 연결 목록 조회 trait
pub trait ConnectionLister: Send + Sync + 'static {
    /// 원격 주소가 있는 연결을 나열합니다.
    fn list_established(&self) -> impl Future<Output = Result<Vec<Connection>, NetmonError>> + Send;
}

/// procfs 기반 연결 목록 조회기
#[derive(Debug, Clone)]
pub struct ProcNetLister {
    root: PathBuf,
}

impl ProcNetLister {
    /// `/proc/net`을 읽는 조회기를 생성합니다.
    pub fn new() -> Self {
        Self::with_root("/proc/net")
    }

    /// 지정한 디렉토리를 읽는 조회기를 생성합니다.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for ProcNetLister {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionLister for ProcNetLister {
    async fn list_established(&self) -> Result<Vec<Connection>, NetmonError> {
        let tables = [
            ("tcp", Protocol::Tcp),
            ("tcp6", Protocol::Tcp),
            ("udp", Protocol::Udp),
            ("udp6", Protocol::Udp),
        ];

        let mut connections = Vec::new();
        let mut readable = 0usize;
        let mut last_error = None;

        for (file, protocol) in tables {
            let path = self.root.join(file);
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    readable += 1;
                    connections.extend(parse_proc_net(&content, protocol));
                }
                Err(e) => {
                    // IPv6가 꺼진 시스템에서는 tcp6/udp6가 없을 수 있음
                    debug!(path = %path.display(), error = %e, "connection table unavailable");
                    last_error = Some((path, e));
                }
            }
        }

        if readable == 0 {
            if let Some((path, e)) = last_error {
                return Err(NetmonError::ConnectionList {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        }

        Ok(connections)
    }
}

/// `/proc/net/{tcp,udp}[6]` 내용을 파싱합니다.
///
/// 파싱할 수 없는 줄은 건너뜁니다.
pub fn parse_proc_net(content: &str, protocol: Protocol) -> Vec<Connection> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| parse_line(line, protocol))
        .collect()
}

fn parse_line(line: &str, protocol: Protocol) -> Option<Connection> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return None;
    }

    let local_addr = parse_socket_addr(fields[1])?;
    let remote_addr = parse_socket_addr(fields[2])?;
    let state = fields[3];

    let status = match protocol {
        Protocol::Tcp if state == TCP_ESTABLISHED => "ESTABLISHED",
        Protocol::Tcp => return None,
        _ if remote_addr.port() == 0 || remote_addr.ip().is_unspecified() => return None,
        _ => "CONNECTED",
    };

    Some(Connection {
        local_addr,
        remote_addr,
        protocol,
        status: status.to_owned(),
    })
}

/// `0100007F:0050` 형식의 주소를 파싱합니다.
///
/// 주소는 32비트 워드 단위 호스트 바이트 순서로, 포트는 빅엔디언 16진수로 기록됩니다.
fn parse_socket_addr(field: &str) -> Option<SocketAddr> {
    let (addr_hex, port_hex) = field.split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;

    let ip = match addr_hex.len() {
        8 => {
            let raw = u32::from_str_radix(addr_hex, 16).ok()?;
            IpAddr::V4(Ipv4Addr::from(raw.to_ne_bytes()))
        }
        32 => {
            let mut octets = [0u8; 16];
            for (i, chunk) in octets.chunks_exact_mut(4).enumerate() {
                let word = u32::from_str_radix(addr_hex.get(i * 8..i * 8 + 8)?, 16).ok()?;
                chunk.copy_from_slice(&word.to_ne_bytes());
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => return None,
    };

    Some(SocketAddr::new(ip, port))
}

//! 네트워크 지문 -- 게이트웨이와 인터페이스 주소 조합의 해시
//!
//! 변경 감시자는 주기적으로 지문을 계산해 이전 값과 비교합니다.
//! 루프백 인터페이스는 제외하며, 인터페이스 순서에 관계없이 같은 지문이 나오도록 정렬합니다.

use std::fmt;
use std::net::Ipv4Addr;

use sha2::{Digest, Sha256};

use crate::discovery::NetworkDiscovery;
use crate::error::NetmonError;

/// 네트워크 환경을 식별하는 불투명 해시
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkFingerprint(String);

impl NetworkFingerprint {
    /// 게이트웨이와 인터페이스 목록으로 지문을 계산합니다.
    pub fn compute(gateway: Option<Ipv4Addr>, interfaces: &[(String, Ipv4Addr)]) -> Self {
        let mut entries: Vec<String> = interfaces
            .iter()
            .filter(|(name, ip)| name != "lo" && !ip.is_loopback())
            .map(|(name, ip)| format!("{name}:{ip}"))
            .collect();
        entries.sort();

        let gateway = gateway.map(|g| g.to_string()).unwrap_or_default();
        let material = format!("{gateway}|{}", entries.join(","));

        Self(hex::encode(Sha256::digest(material.as_bytes())))
    }

    /// 16진수 해시 문자열
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 로그에는 앞 12자만
        write!(f, "{}", &self.0[..self.0.len().min(12)])
    }
}

/// 탐색기를 통해 현재 네트워크 지문을 계산합니다.
///
/// 탐색이 실패하면 에러를 반환합니다. 호출자는 해당 주기를 건너뜁니다.
pub async fn current_fingerprint<D: NetworkDiscovery>(
    discovery: &D,
) -> Result<NetworkFingerprint, NetmonError> {
    let gateway = discovery.default_gateway().await?;
    let interfaces = discovery.interfaces_with_ipv4().await?;
    Ok(NetworkFingerprint::compute(gateway, &interfaces))
}

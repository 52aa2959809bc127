//! GreyNoise 커뮤니티 API 소스
//!
//! `GET {base}/v3/community/{ip}`. 인증이 필요 없는 대신 호출 간격을 2초로 제한합니다.
//! 200 이외의 상태(관측된 적 없는 IP의 404 포함)는 실패로 처리되어 응답 소스 수에 들어가지 않습니다.

use std::net::IpAddr;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use gotchi_core::pipeline::BoxFuture;

use crate::error::ThreatIntelError;
use crate::source::{ReputationSource, SourceVerdict, build_client, trim_base_url};

/// 소스 이름
pub const GREYNOISE: &str = "greynoise";

/// malicious 판정 시 가중치
const MALICIOUS_WEIGHT: u32 = 75;

const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct CommunityResponse {
    #[serde(default)]
    noise: bool,
    #[serde(default)]
    classification: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// GreyNoise 커뮤니티 API 소스
pub struct GreyNoiseSource {
    client: reqwest::Client,
    base_url: String,
    min_interval: Duration,
    timeout: Duration,
}

impl GreyNoiseSource {
    /// 기본 호출 간격과 타임아웃으로 소스를 생성합니다.
    pub fn new(base_url: &str) -> Result<Self, ThreatIntelError> {
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            base_url: trim_base_url(base_url),
            min_interval: DEFAULT_MIN_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// 조회 URL
    pub fn url_for(&self, ip: IpAddr) -> String {
        format!("{}/v3/community/{ip}", self.base_url)
    }
}

impl ReputationSource for GreyNoiseSource {
    fn name(&self) -> &str {
        GREYNOISE
    }

    fn min_interval(&self) -> Duration {
        self.min_interval
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn lookup(&self, ip: IpAddr) -> BoxFuture<'_, Result<SourceVerdict, ThreatIntelError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.url_for(ip))
                .header("Accept", "application/json")
                .send()
                .await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            debug!(ip = %ip, status, "greynoise response");
            parse_response(status, &body)
        })
    }
}

/// 상태 코드와 응답 본문을 판정으로 변환합니다.
pub fn parse_response(status: u16, body: &str) -> Result<SourceVerdict, ThreatIntelError> {
    if status != 200 {
        return Err(ThreatIntelError::Status(status));
    }

    let data: CommunityResponse =
        serde_json::from_str(body).map_err(|e| ThreatIntelError::Decode(e.to_string()))?;
    let classification = data.classification.unwrap_or_default();

    let mut verdict = SourceVerdict::clean(GREYNOISE);
    if classification == "malicious" {
        verdict.is_threat = true;
        verdict.weight = MALICIOUS_WEIGHT;
        verdict.tags.push(format!("Malicious ({classification})"));
    } else if data.noise {
        let name = data.name.unwrap_or_else(|| "unknown".to_owned());
        verdict.tags.push(format!("Scanner: {name}"));
    }
    Ok(verdict)
}

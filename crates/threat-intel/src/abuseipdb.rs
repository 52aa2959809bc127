//! AbuseIPDB 소스
//!
//! `GET {base}/api/v2/check?ipAddress={ip}&maxAgeInDays=90`, `Key` 헤더로 인증합니다.
//! 신고 점수가 25를 넘고 화이트리스트가 아니면 위협이며, 점수가 그대로 가중치가 됩니다.

use std::net::IpAddr;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use gotchi_core::pipeline::BoxFuture;

use crate::error::ThreatIntelError;
use crate::source::{ReputationSource, SourceVerdict, build_client, trim_base_url};

/// 소스 이름
pub const ABUSEIPDB: &str = "abuseipdb";

/// 이 점수를 넘으면 위협
const THREAT_SCORE_THRESHOLD: u32 = 25;
const MAX_AGE_IN_DAYS: &str = "90";

const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct CheckResponse {
    data: CheckData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckData {
    #[serde(default)]
    abuse_confidence_score: u32,
    #[serde(default)]
    total_reports: u32,
    #[serde(default)]
    is_whitelisted: Option<bool>,
}

/// AbuseIPDB v2 check API 소스
pub struct AbuseIpDbSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    min_interval: Duration,
    timeout: Duration,
}

impl AbuseIpDbSource {
    /// 기본 호출 간격과 타임아웃으로 소스를 생성합니다.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ThreatIntelError> {
        if api_key.trim().is_empty() {
            return Err(ThreatIntelError::Config {
                field: "abuseipdb_api_key".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            base_url: trim_base_url(base_url),
            api_key: api_key.trim().to_owned(),
            min_interval: DEFAULT_MIN_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        })
    }
}

impl std::fmt::Debug for AbuseIpDbSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbuseIpDbSource")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ReputationSource for AbuseIpDbSource {
    fn name(&self) -> &str {
        ABUSEIPDB
    }

    fn min_interval(&self) -> Duration {
        self.min_interval
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn lookup(&self, ip: IpAddr) -> BoxFuture<'_, Result<SourceVerdict, ThreatIntelError>> {
        Box::pin(async move {
            let url = format!("{}/api/v2/check", self.base_url);
            let ip_param = ip.to_string();
            let response = self
                .client
                .get(&url)
                .header("Key", &self.api_key)
                .header("Accept", "application/json")
                .query(&[
                    ("ipAddress", ip_param.as_str()),
                    ("maxAgeInDays", MAX_AGE_IN_DAYS),
                ])
                .send()
                .await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            debug!(ip = %ip, status, "abuseipdb response");
            parse_response(status, &body)
        })
    }
}

/// 상태 코드와 응답 본문을 판정으로 변환합니다.
pub fn parse_response(status: u16, body: &str) -> Result<SourceVerdict, ThreatIntelError> {
    if status != 200 {
        return Err(ThreatIntelError::Status(status));
    }

    let CheckResponse { data } =
        serde_json::from_str(body).map_err(|e| ThreatIntelError::Decode(e.to_string()))?;
    let score = data.abuse_confidence_score.min(100);
    let whitelisted = data.is_whitelisted.unwrap_or(false);

    let mut verdict = SourceVerdict::clean(ABUSEIPDB);
    if score > THREAT_SCORE_THRESHOLD && !whitelisted {
        verdict.is_threat = true;
        verdict.weight = score;
        verdict.tags.push(format!("Abuse Score: {score}%"));
    }
    if data.total_reports > 0 {
        verdict.tags.push(format!("{} reports", data.total_reports));
    }
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(score: u32, reports: u32, whitelisted: &str) -> String {
        format!(
            r#"{{"data":{{"ipAddress":"198.51.100.7","isPublic":true,"ipVersion":4,
            "isWhitelisted":{whitelisted},"abuseConfidenceScore":{score},"countryCode":"NL",
            "usageType":"Data Center/Web Hosting/Transit","isp":"Example Hosting",
            "totalReports":{reports},"numDistinctUsers":3}}}}"#
        )
    }

    #[test]
    fn high_score_is_threat_weighted_by_score() {
        let verdict = parse_response(200, &body(90, 12, "false")).unwrap();
        assert!(verdict.is_threat);
        assert_eq!(verdict.weight, 90);
        assert_eq!(verdict.tags, vec!["Abuse Score: 90%", "12 reports"]);
    }

    #[test]
    fn score_at_threshold_is_not_threat() {
        let verdict = parse_response(200, &body(25, 2, "false")).unwrap();
        assert!(!verdict.is_threat);
        assert_eq!(verdict.weight, 0);
        assert_eq!(verdict.tags, vec!["2 reports"]);
    }

    #[test]
    fn whitelisted_is_never_threat() {
        let verdict = parse_response(200, &body(100, 40, "true")).unwrap();
        assert!(!verdict.is_threat);
        assert_eq!(verdict.tags, vec!["40 reports"]);
    }

    #[test]
    fn null_whitelist_is_treated_as_false() {
        let verdict = parse_response(200, &body(60, 0, "null")).unwrap();
        assert!(verdict.is_threat);
        assert_eq!(verdict.tags, vec!["Abuse Score: 60%"]);
    }

    #[test]
    fn unauthorized_is_status_error() {
        let err = parse_response(401, r#"{"errors":[]}"#).unwrap_err();
        assert!(matches!(err, ThreatIntelError::Status(401)));
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(AbuseIpDbSource::new("https://api.abuseipdb.com", " ").is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let source = AbuseIpDbSource::new("https://api.abuseipdb.com", "secret-key").unwrap();
        let printed = format!("{source:?}");
        assert!(!printed.contains("secret-key"));
        assert_eq!(source.min_interval(), Duration::from_secs(1));
        assert_eq!(source.timeout(), Duration::from_secs(10));
    }
}

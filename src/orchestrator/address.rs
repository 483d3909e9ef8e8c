//! Resolution of the Nomad API base URL from the `NOMAD_API` argument.

use std::net::Ipv6Addr;

use reqwest::Url;

use crate::error::OrchestratorError;

/// Host used when no `NOMAD_API` argument is supplied.
pub const DEFAULT_NOMAD_HOST: &str = "127.0.0.1";

/// Port of the Nomad HTTP API.
pub const NOMAD_PORT: u16 = 4646;

/// Builds the API base URL.
///
/// A value with a scheme is used as given. A bare host becomes
/// `http://<host>:<port>`; a bare `host:port` keeps its port. A bare IPv6
/// literal such as `::1` is bracketed before the port is added. An absent or
/// blank value falls back to `default_host`.
pub fn resolve_api_address(
    value: Option<&str>,
    default_host: &str,
    port: u16,
) -> Result<Url, OrchestratorError> {
    let raw = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default_host);

    let candidate = if raw.contains("://") {
        raw.to_string()
    } else if raw.parse::<Ipv6Addr>().is_ok() {
        format!("http://[{raw}]:{port}")
    } else if has_explicit_port(raw) {
        format!("http://{raw}")
    } else {
        format!("http://{raw}:{port}")
    };

    let url = Url::parse(&candidate).map_err(|e| OrchestratorError::InvalidAddress {
        address: raw.to_string(),
        reason: e.to_string(),
    })?;

    if url.host_str().map_or(true, str::is_empty) {
        return Err(OrchestratorError::InvalidAddress {
            address: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

fn has_explicit_port(raw: &str) -> bool {
    // Bracketed IPv6 literal, e.g. [::1]:4646
    if let Some(rest) = raw.strip_prefix('[') {
        return rest
            .split_once("]:")
            .is_some_and(|(_, port)| port.parse::<u16>().is_ok());
    }
    match raw.rsplit_once(':') {
        Some((host, port)) => !host.contains(':') && port.parse::<u16>().is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(value: Option<&str>) -> Result<Url, OrchestratorError> {
        resolve_api_address(value, DEFAULT_NOMAD_HOST, NOMAD_PORT)
    }

    #[test]
    fn test_bare_host_gets_scheme_and_port() {
        let url = resolve(Some("10.0.0.5")).unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.5:4646/");

        let url = resolve(Some("nomad.service.consul")).unwrap();
        assert_eq!(url.as_str(), "http://nomad.service.consul:4646/");
    }

    #[test]
    fn test_missing_value_uses_default_host() {
        assert_eq!(resolve(None).unwrap().as_str(), "http://127.0.0.1:4646/");
        assert_eq!(resolve(Some("  ")).unwrap().as_str(), "http://127.0.0.1:4646/");
    }

    #[test]
    fn test_explicit_port_is_kept() {
        let url = resolve(Some("nomad:14646")).unwrap();
        assert_eq!(url.port(), Some(14646));
        let url = resolve(Some("[::1]:4647")).unwrap();
        assert_eq!(url.port(), Some(4647));
    }

    #[test]
    fn test_bare_ipv6_literal_is_bracketed() {
        let url = resolve(Some("::1")).unwrap();
        assert_eq!(url.as_str(), "http://[::1]:4646/");

        let url = resolve(Some("fd00::5")).unwrap();
        assert_eq!(url.host_str(), Some("[fd00::5]"));
        assert_eq!(url.port(), Some(4646));

        let url = resolve(Some("[::1]")).unwrap();
        assert_eq!(url.as_str(), "http://[::1]:4646/");
    }

    #[test]
    fn test_url_with_scheme_is_used_verbatim() {
        let url = resolve(Some("https://nomad.example.com")).unwrap();
        assert_eq!(url.as_str(), "https://nomad.example.com/");
    }

    #[test]
    fn test_invalid_address_rejected() {
        assert!(matches!(
            resolve(Some("http://")),
            Err(OrchestratorError::InvalidAddress { .. })
        ));
        assert!(matches!(
            resolve(Some("bad host name")),
            Err(OrchestratorError::InvalidAddress { .. })
        ));
    }
}

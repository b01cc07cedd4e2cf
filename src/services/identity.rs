use serde::Deserialize;
use std::time::Duration;

/// Profile returned by the optional identity directory.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub display_name: String,
}

/// Client for the external identity directory used to decorate API responses
/// with human-readable party names. Lookups are best-effort: any failure is
/// logged and the caller falls back to the raw address.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
}

impl IdentityClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn resolve(&self, address: &str) -> Option<Identity> {
        let url = format!("{}/profiles/{}", self.base_url, address);

        match self.http.get(&url).send().await {
            Ok(resp) if resp.status() == reqwest::StatusCode::NOT_FOUND => None,
            Ok(resp) => match resp.error_for_status() {
                Ok(resp) => match resp.json::<Identity>().await {
                    Ok(identity) => Some(identity),
                    Err(e) => {
                        tracing::warn!(address, error = %e, "Unparseable identity response");
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!(address, error = %e, "Identity lookup failed");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(address, error = %e, "Identity directory unreachable");
                None
            }
        }
    }
}

/// Compact form of an address for display fallbacks: 0x1234...abcd.
pub fn short_address(address: &str) -> String {
    if address.len() > 12 {
        format!("{}...{}", &address[..6], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}

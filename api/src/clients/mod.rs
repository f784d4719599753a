//! Vendor clients.
//!
//! Every public operation returns a [`pixelpeak_core::provenance::CapabilityResult`]:
//! a live payload when the vendor answered, a synthetic one otherwise.
//! [`CapabilityError`] stays inside this module tree.

pub mod avatar;
pub mod completion;
pub mod error;
pub mod speech;
pub mod vector;

use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

pub use error::CapabilityError;

/// Shared HTTP client. Timeouts are applied per request.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("pixelpeak/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Send `request` bounded by `timeout`. Non-2xx statuses become errors.
pub(crate) async fn send(
    request: reqwest::RequestBuilder,
    timeout: Duration,
    resource: &str,
) -> Result<reqwest::Response, CapabilityError> {
    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| CapabilityError::from_reqwest(err, timeout))?;

    let status = response.status();
    if !status.is_success() {
        return Err(CapabilityError::from_status(status, resource));
    }
    Ok(response)
}

pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    timeout: Duration,
) -> Result<T, CapabilityError> {
    let body = response
        .bytes()
        .await
        .map_err(|err| CapabilityError::from_reqwest(err, timeout))?;
    serde_json::from_slice(&body)
        .map_err(|err| CapabilityError::MalformedResponse(err.to_string()))
}

fn require_key(key: &Option<String>) -> Result<&str, CapabilityError> {
    key.as_deref().ok_or(CapabilityError::NotConfigured)
}

/// Whether `id` can be used as one vendor path segment or a local file-name
/// component: ASCII letters, digits, `_` and `-` only.
pub fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// `base_url` with `segments` appended, each percent-encoded as a single
/// path segment.
pub(crate) fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url, CapabilityError> {
    let mut url = Url::parse(base_url)
        .map_err(|err| CapabilityError::Transport(format!("invalid base url: {err}")))?;
    url.path_segments_mut()
        .map_err(|()| CapabilityError::Transport(format!("base url {base_url} has no path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_with_separators_are_unsafe() {
        assert!(is_safe_id("64bfa15f0e72c63d7c3934a6"));
        assert!(is_safe_id("fallback_female_casual_1a2b3c4d"));
        for id in ["", "..", "../applications/app1", "a/b", "a b", "a%2Fb", "a.glb"] {
            assert!(!is_safe_id(id), "{id:?} should be rejected");
        }
    }

    #[test]
    fn endpoint_encodes_each_segment() {
        let url = endpoint("https://api.readyplayer.me/v1", &["avatars", "../applications/app1"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.readyplayer.me/v1/avatars/..%2Fapplications%2Fapp1"
        );

        let url = endpoint("http://127.0.0.1:8080/", &["voices"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/voices");
    }
}

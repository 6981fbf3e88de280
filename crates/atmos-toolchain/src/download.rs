//! Asset and registry downloads
//!
//! Blocking HTTP with `GITHUB_TOKEN` auth for github.com URLs and
//! exponential-backoff retry for network-class failures. HTTP 4xx is not
//! retried - a missing asset stays missing.

use crate::{Error, Result};
use atmos_config::RetryConfig;
use backoff::ExponentialBackoff;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

fn client() -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .user_agent("atmos-toolchain")
        .timeout(Duration::from_secs(300))
        .build()
        .map_err(|e| Error::DownloadFailed {
            url: String::new(),
            message: e.to_string(),
        })
}

fn backoff_policy(retry: &RetryConfig) -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(retry.initial_interval_ms),
        // max_attempts expressed as an elapsed-time budget: each retry at
        // least doubles, so attempts ~= log2(budget / initial)
        max_elapsed_time: Some(
            Duration::from_millis(retry.initial_interval_ms)
                * 2u32.saturating_pow(retry.max_attempts),
        ),
        ..ExponentialBackoff::default()
    }
}

fn apply_auth(request: reqwest::blocking::RequestBuilder, url: &str) -> reqwest::blocking::RequestBuilder {
    if url.starts_with("https://github.com") || url.starts_with("https://api.github.com") {
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            return request.bearer_auth(token);
        }
    }
    request
}

/// Fetch a small text resource (registry indexes).
pub fn fetch_text(url: &str, retry: &RetryConfig) -> Result<String> {
    let client = client()?;
    let op = || -> std::result::Result<String, backoff::Error<Error>> {
        let response = apply_auth(client.get(url), url)
            .send()
            .map_err(|e| {
                backoff::Error::transient(Error::DownloadFailed {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            })?;
        let status = response.status();
        if status.is_client_error() {
            return Err(backoff::Error::permanent(Error::AssetUnavailable {
                url: url.to_string(),
                status: status.as_u16(),
            }));
        }
        if !status.is_success() {
            return Err(backoff::Error::transient(Error::AssetUnavailable {
                url: url.to_string(),
                status: status.as_u16(),
            }));
        }
        response.text().map_err(|e| {
            backoff::Error::transient(Error::DownloadFailed {
                url: url.to_string(),
                message: e.to_string(),
            })
        })
    };
    backoff::retry(backoff_policy(retry), op).map_err(unwrap_backoff)
}

/// Download a binary asset to `dest`.
pub fn fetch_file(url: &str, dest: &Path, retry: &RetryConfig) -> Result<()> {
    let client = client()?;
    let op = || -> std::result::Result<(), backoff::Error<Error>> {
        let response = apply_auth(client.get(url), url)
            .send()
            .map_err(|e| {
                backoff::Error::transient(Error::DownloadFailed {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            })?;
        let status = response.status();
        if status.is_client_error() {
            return Err(backoff::Error::permanent(Error::AssetUnavailable {
                url: url.to_string(),
                status: status.as_u16(),
            }));
        }
        if !status.is_success() {
            return Err(backoff::Error::transient(Error::AssetUnavailable {
                url: url.to_string(),
                status: status.as_u16(),
            }));
        }
        let bytes = response.bytes().map_err(|e| {
            backoff::Error::transient(Error::DownloadFailed {
                url: url.to_string(),
                message: e.to_string(),
            })
        })?;
        let mut file = std::fs::File::create(dest)
            .map_err(|e| backoff::Error::permanent(Error::io(dest, e)))?;
        file.write_all(&bytes)
            .map_err(|e| backoff::Error::permanent(Error::io(dest, e)))?;
        Ok(())
    };
    tracing::info!(url, "downloading");
    backoff::retry(backoff_policy(retry), op).map_err(unwrap_backoff)
}

fn unwrap_backoff(e: backoff::Error<Error>) -> Error {
    match e {
        backoff::Error::Permanent(err) | backoff::Error::Transient { err, .. } => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_budget_grows_with_attempts() {
        let short = backoff_policy(&RetryConfig {
            max_attempts: 1,
            initial_interval_ms: 100,
        });
        let long = backoff_policy(&RetryConfig {
            max_attempts: 5,
            initial_interval_ms: 100,
        });
        assert!(short.max_elapsed_time.unwrap() < long.max_elapsed_time.unwrap());
    }

    #[test]
    fn unreachable_host_is_a_download_error() {
        let retry = RetryConfig {
            max_attempts: 0,
            initial_interval_ms: 1,
        };
        let err = fetch_text("http://127.0.0.1:1/registry.yaml", &retry).unwrap_err();
        assert!(matches!(err, Error::DownloadFailed { .. }));
    }
}

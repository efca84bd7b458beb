//! Shared HTTP client construction and the existence probe.

use reqwest::blocking::Client;
use reqwest::redirect;
use url::Url;

use httpfs_core::error::{HttpFsError, Result};
use httpfs_core::settings::{HttpSettings, RedirectPolicy};

use crate::cause::CauseChain;
use crate::retry::RetryHandler;

const MAX_REDIRECTS: usize = 10;

/// Builds a blocking client applying the timeout and redirect policy from
/// `settings`. The client is a lightweight handle meant to be reused across
/// channels and existence checks of the same filesystem.
pub fn build_client(settings: &HttpSettings) -> Result<Client> {
    let policy = match settings.redirect {
        RedirectPolicy::Never => redirect::Policy::none(),
        RedirectPolicy::Always => redirect::Policy::limited(MAX_REDIRECTS),
        RedirectPolicy::Normal => redirect::Policy::custom(|attempt| {
            let downgraded = attempt.url().scheme() == "http"
                && attempt.previous().last().map(Url::scheme) == Some("https");
            if downgraded {
                attempt.stop()
            } else if attempt.previous().len() > MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else {
                attempt.follow()
            }
        }),
    };
    Client::builder()
        .connect_timeout(settings.timeout)
        .redirect(policy)
        .build()
        .map_err(|e| transport("failed to build the http client".to_string(), e))
}

pub(crate) fn transport(
    message: String,
    source: impl std::error::Error + Send + Sync + 'static,
) -> HttpFsError {
    HttpFsError::Transport {
        message,
        source: Box::new(source),
    }
}

/// Checks whether `uri` exists by sending a HEAD request under retry.
///
/// A resource exists on a 200 or 206 response and does not exist on a 404 or
/// when the host cannot be resolved. A 401, 403 or 407 response fails with
/// an access-denied error rather than reporting absence.
pub fn exists(uri: &Url, settings: &HttpSettings) -> Result<bool> {
    let client = build_client(settings)?;
    let retry = RetryHandler::new(settings.retry.clone(), uri.clone());
    retry.run_with_retries(|| {
        let response = match client.head(uri.clone()).send() {
            Ok(response) => response,
            Err(err) if is_unresolved_address(&err) => return Ok(false),
            Err(err) => return Err(transport(format!("failed HEAD request for {uri}"), err)),
        };
        match response.status().as_u16() {
            200 | 206 => Ok(true),
            404 => Ok(false),
            code @ (401 | 403 | 407) => Err(HttpFsError::AccessDenied {
                uri: uri.to_string(),
                code,
            }),
            code => Err(HttpFsError::UnexpectedStatus {
                code,
                message: format!("unexpected response from {uri}: http status {code}"),
            }),
        }
    })
}

/// A connect failure whose cause chain carries a DNS lookup failure means
/// the resource does not exist rather than that the wire is unhealthy.
fn is_unresolved_address(err: &reqwest::Error) -> bool {
    err.is_connect()
        && CauseChain::new(err).any(|cause| {
            let message = cause.to_string();
            message.contains("dns error") || message.contains("failed to lookup address")
        })
}

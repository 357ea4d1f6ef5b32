// Carrot cloud HTTP client
//
// Wraps `reqwest::Client` with servlet URL construction, status mapping,
// and the shared session cell. Endpoint groups (auth, lights) are
// implemented as inherent methods in their own files to keep this module
// focused on transport mechanics.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use reqwest::cookie::{CookieStore, Jar};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::auth::Session;
use crate::error::Error;
use crate::transport::TransportConfig;

const SERVLET_ROOT: &str = "cloud/servlet/";

/// HTTP client for the Carrot Home cloud servlets.
///
/// Safe to share across tasks: the session cookie lives in a
/// thread-safe jar and the [`Session`] record in a lock-free cell, so the
/// renewal loop can log in again while polls and commands are in flight.
pub struct CarrotClient {
    http: reqwest::Client,
    base_url: Url,
    /// Current session, replaced wholesale on every login attempt.
    session: ArcSwapOption<Session>,
    /// Cookie jar reference for inspecting the session cookie.
    cookie_jar: Option<Arc<Jar>>,
}

impl CarrotClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// If the config doesn't already include a cookie jar, one is created
    /// automatically (the servlets track sessions by cookie).
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let cookie_jar = config.cookie_jar.clone();
        let http = config.build_client()?;
        Ok(Self {
            http,
            base_url: normalize_base(base_url),
            session: ArcSwapOption::empty(),
            cookie_jar,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// The caller is responsible for enabling cookie storage on `http`
    /// if sessions should survive between requests.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
            session: ArcSwapOption::empty(),
            cookie_jar: None,
        }
    }

    /// The session established by the most recent successful login, if any.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.load_full()
    }

    pub(crate) fn store_session(&self, session: Option<Session>) {
        self.session.store(session.map(Arc::new));
    }

    /// Whether the cookie jar currently holds a cookie for the cloud host.
    pub fn has_session_cookie(&self) -> bool {
        self.cookie_jar
            .as_ref()
            .and_then(|jar| jar.cookies(&self.base_url))
            .is_some()
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}cloud/servlet/{servlet}?{query}`.
    pub(crate) fn servlet_url(&self, servlet: &str, query: &[(&str, &str)]) -> Result<Url, Error> {
        let mut url = self.base_url.join(SERVLET_ROOT)?.join(servlet)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!(path = url.path(), "GET");

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let resp = check_status(resp).await?;
        let body = resp.text().await.map_err(Error::Transport)?;

        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }

    /// Send a GET request whose body carries nothing of interest.
    pub(crate) async fn get_empty(&self, url: Url) -> Result<(), Error> {
        debug!(path = url.path(), "GET");

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        check_status(resp).await?;
        Ok(())
    }
}

/// `Url::join` drops the last path segment unless the base ends with `/`.
fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::SessionExpired);
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let preview: String = body.chars().take(200).collect();
        return Err(Error::Api {
            message: preview,
            status: Some(status.as_u16()),
        });
    }

    Ok(resp)
}

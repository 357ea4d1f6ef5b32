// Carrot cloud authentication
//
// Cookie-based session login. The login servlet sets a session cookie in
// the client's jar; subsequent requests use it automatically. The client
// also records a `Session` so callers can see when the credential was
// last refreshed.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::client::CarrotClient;
use crate::error::Error;
use crate::models::LoginResponse;

/// Application identity the login servlet expects.
const APP_TYPE: &str = "androidfree";
const APP_VERSION: &str = "14";

/// A successfully established cloud session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Account the session belongs to.
    pub user: String,
    /// When the login that produced this session completed.
    pub established_at: DateTime<Utc>,
}

impl CarrotClient {
    /// Authenticate with the cloud using email/password.
    ///
    /// `GET cloud/servlet/LoginServlet?action=login&apptype=androidfree&appversion=14&email=..&key=..`
    ///
    /// On success the session cookie is stored in the client's jar and a
    /// fresh [`Session`] replaces the previous one. On failure the session
    /// record is cleared; the jar keeps whatever cookie it had, so requests
    /// continue on the stale session until a later login succeeds.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<(), Error> {
        let url = self.servlet_url(
            "LoginServlet",
            &[
                ("action", "login"),
                ("apptype", APP_TYPE),
                ("appversion", APP_VERSION),
                ("email", email),
                ("key", password.expose_secret()),
            ],
        )?;

        debug!("logging in as {email}");

        let resp: LoginResponse = match self.get_json(url).await {
            Ok(resp) => resp,
            Err(Error::Api { message, status }) => {
                self.store_session(None);
                return Err(Error::Authentication {
                    message: match status {
                        Some(s) => format!("login failed (HTTP {s}): {message}"),
                        None => format!("login failed: {message}"),
                    },
                });
            }
            Err(Error::SessionExpired) => {
                self.store_session(None);
                return Err(Error::Authentication {
                    message: "login failed (HTTP 401)".into(),
                });
            }
            Err(e) => {
                self.store_session(None);
                return Err(e);
            }
        };

        if !resp.result.is_success() {
            self.store_session(None);
            return Err(Error::Authentication {
                message: resp
                    .message
                    .unwrap_or_else(|| "login servlet returned result=fail".into()),
            });
        }

        self.store_session(Some(Session {
            user: email.to_owned(),
            established_at: Utc::now(),
        }));
        debug!("login successful");
        Ok(())
    }
}

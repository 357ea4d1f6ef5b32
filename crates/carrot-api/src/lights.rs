// Light servlet endpoints
//
// Status polling and on/off control via `CarrotControlServlet`, plus the
// numeric value convention the servlet speaks.

use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::client::CarrotClient;
use crate::error::Error;
use crate::models::{LightStatus, LightStatusResponse};

/// Control value the servlet uses for "on".
pub const LIGHT_ON: u32 = 64;
/// Control value the servlet uses for "off".
pub const LIGHT_OFF: u32 = 0;

// ── LightCode ────────────────────────────────────────────────────────

/// A light value as reported by `getlightstatus`.
///
/// The servlet reports values as hexadecimal strings (`"40"` is 64), but
/// plain JSON numbers are accepted too. Anything that does not parse is
/// kept as `None`; callers treat every non-zero or unknown value as "on".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightCode(Option<u32>);

impl LightCode {
    /// The decoded numeric value, if the servlet sent something parseable.
    pub fn raw(self) -> Option<u32> {
        self.0
    }

    /// `false` only for an explicit zero.
    pub fn is_on(self) -> bool {
        self.0 != Some(LIGHT_OFF)
    }
}

/// A missing value decodes as off.
impl Default for LightCode {
    fn default() -> Self {
        Self(Some(LIGHT_OFF))
    }
}

impl<'de> Deserialize<'de> for LightCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
            Other(serde_json::Value),
        }

        let code = match Raw::deserialize(deserializer)? {
            Raw::Text(hex) => u32::from_str_radix(hex.trim(), 16).ok(),
            Raw::Number(n) => u32::try_from(n).ok(),
            Raw::Other(_) => None,
        };
        Ok(Self(code))
    }
}

// ── Endpoints ────────────────────────────────────────────────────────

impl CarrotClient {
    /// Fetch the current value of every light on the account.
    ///
    /// `GET cloud/servlet/CarrotControlServlet?action=getlightstatus`
    pub async fn light_status(&self) -> Result<Vec<LightStatus>, Error> {
        let url = self.servlet_url("CarrotControlServlet", &[("action", "getlightstatus")])?;
        debug!("fetching light status");

        let resp: LightStatusResponse = self.get_json(url).await?;
        if !resp.result.is_success() {
            return Err(Error::Api {
                message: "light status request returned result=fail".into(),
                status: None,
            });
        }
        Ok(resp.into_statuses())
    }

    /// Set a light to the given control value.
    ///
    /// `GET cloud/servlet/CarrotControlServlet?action=control&deviceid={id}&value={value}`
    pub async fn set_light(&self, device_id: u32, value: u32) -> Result<(), Error> {
        debug!(device_id, value, "setting light");
        let url = self.servlet_url(
            "CarrotControlServlet",
            &[
                ("action", "control"),
                ("deviceid", &device_id.to_string()),
                ("value", &value.to_string()),
            ],
        )?;

        self.get_empty(url).await
    }
}

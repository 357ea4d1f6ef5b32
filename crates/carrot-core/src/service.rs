// ── Remote light service seam ──
//
// The cache engine and the protocol bridge talk to the cloud through
// `LightService`. `CarrotAccount` is the production implementation on
// top of `carrot_api::CarrotClient`; tests substitute scripted fakes.

use std::future::Future;

use carrot_api::CarrotClient;
use tracing::debug;

use crate::config::AccountCredentials;
use crate::error::CoreError;
use crate::model::{DeviceId, Light, LightState};

/// Remote control operations the core consumes.
///
/// Implementations must tolerate concurrent calls: the renewal loop logs
/// in again while polls and commands are in flight.
pub trait LightService: Send + Sync + 'static {
    /// Establish or renew the shared session.
    fn login(&self) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Current state of every light on the account.
    fn light_status(&self) -> impl Future<Output = Result<Vec<Light>, CoreError>> + Send;

    /// Switch one light.
    fn set_light(
        &self,
        id: DeviceId,
        state: LightState,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// A Carrot cloud account: one client, one set of credentials.
pub struct CarrotAccount {
    client: CarrotClient,
    credentials: AccountCredentials,
}

impl CarrotAccount {
    pub fn new(client: CarrotClient, credentials: AccountCredentials) -> Self {
        Self {
            client,
            credentials,
        }
    }
}

impl LightService for CarrotAccount {
    async fn login(&self) -> Result<(), CoreError> {
        self.client
            .login(&self.credentials.email, &self.credentials.password)
            .await?;
        Ok(())
    }

    async fn light_status(&self) -> Result<Vec<Light>, CoreError> {
        let raw = self.client.light_status().await?;
        debug!(count = raw.len(), "light status received");
        Ok(raw.into_iter().map(Light::from).collect())
    }

    async fn set_light(&self, id: DeviceId, state: LightState) -> Result<(), CoreError> {
        self.client.set_light(id.get(), state.code()).await?;
        Ok(())
    }
}

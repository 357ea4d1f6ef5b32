// carrot-api: Async Rust client for the Carrot Home cloud lighting API

pub mod auth;
pub mod client;
pub mod error;
pub mod lights;
pub mod models;
pub mod transport;

pub use auth::Session;
pub use client::CarrotClient;
pub use error::Error;
pub use lights::{LIGHT_OFF, LIGHT_ON, LightCode};
pub use models::{LightStatus, LightStatusResponse, LoginResponse, OperationResult};
pub use transport::{TlsMode, TransportConfig};

//! Recording of completed tasks in the tracking service.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ats::Credential;

/// Something went wrong with the tracking service
#[derive(Debug)]
pub enum TrackingError {
    CredentialData(serde_json::Error),
    CannotCreateClient(reqwest::Error),
    TrackTask(reqwest::Error),
}
impl core::fmt::Display for TrackingError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::CredentialData(e) => {
                write!(
                    f,
                    "The tracking credential does not carry the expected data fields: {e}"
                )
            }
            Self::CannotCreateClient(e) => {
                write!(
                    f,
                    "Unable to create a reqwest client for use with the tracking service: {e}."
                )
            }
            Self::TrackTask(e) => {
                write!(f, "Cannot record the completed task. reqwest Error: {e}")
            }
        }
    }
}
impl core::error::Error for TrackingError {}

/// The extra fields the tracking credential carries in its data object
#[derive(Debug, Deserialize)]
struct TrackingCredentialData {
    base_url: String,
}

#[derive(Debug, Serialize)]
struct TrackTaskRequest<'a> {
    process_name: &'a str,
}

/// The tracking operations the processing phase needs.
pub trait Tracker {
    /// Record one completed run of the named process.
    async fn track_task(&self, process_name: &str) -> Result<(), TrackingError>;
}

/// Client for the tracking service
pub struct TrackingClient {
    base_url: String,
    username: String,
    password: String,
    client: reqwest::Client,
}
impl TrackingClient {
    pub fn new(credential: Credential) -> Result<Self, TrackingError> {
        let Credential {
            username,
            password,
            data,
        } = credential;
        let data: TrackingCredentialData =
            serde_json::from_value(data).map_err(TrackingError::CredentialData)?;
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(TrackingError::CannotCreateClient)?;
        Ok(Self {
            base_url: data.base_url,
            username,
            password,
            client,
        })
    }
}

impl Tracker for TrackingClient {
    async fn track_task(&self, process_name: &str) -> Result<(), TrackingError> {
        match self
            .client
            .post(format!("{}/api/tasks", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .json(&TrackTaskRequest { process_name })
            .send()
            .await
        {
            Ok(response) => {
                if let Err(e) = response.error_for_status() {
                    warn!("The tracking service rejected the completed task: {e}");
                    return Err(TrackingError::TrackTask(e));
                }
                Ok(())
            }
            Err(e) => {
                warn!("There was a problem getting a response from the tracking service");
                Err(TrackingError::TrackTask(e))
            }
        }
    }
}

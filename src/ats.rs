//! Everything directly interfacing with the automation server: the workqueue
//! this script runs against and the named credential store.

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::Config;

/// Create a Client that sends the correct auth header each time
pub fn create_client(token: &str) -> Result<reqwest::Client, reqwest::Error> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("application/json"),
    );
    let mut auth_value = header::HeaderValue::from_str(&format!("Bearer {}", token))
        .expect("statically good header");
    auth_value.set_sensitive(true);
    headers.insert(header::AUTHORIZATION, auth_value);
    reqwest::Client::builder()
        .default_headers(headers)
        .use_rustls_tls()
        .build()
}

/// Something went wrong with the automation server
#[derive(Debug)]
pub enum AtsError {
    ClearWorkqueue(reqwest::Error),
    AddItem(reqwest::Error),
    NextItem(reqwest::Error),
    SetItemStatus(reqwest::Error),
    GetCredential(reqwest::Error),
    Deserialize,
    Utf8Decode,
}
impl core::fmt::Display for AtsError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::ClearWorkqueue(e) => {
                write!(f, "Cannot clear the workqueue. reqwest Error: {e}")
            }
            Self::AddItem(e) => {
                write!(f, "Cannot add an item to the workqueue. reqwest Error: {e}")
            }
            Self::NextItem(e) => {
                write!(
                    f,
                    "Cannot get the next item from the workqueue. reqwest Error: {e}"
                )
            }
            Self::SetItemStatus(e) => {
                write!(f, "Cannot set the status of a work item. reqwest Error: {e}")
            }
            Self::GetCredential(e) => {
                write!(
                    f,
                    "Cannot get a credential from the credential store. reqwest Error: {e}"
                )
            }
            Self::Deserialize => {
                write!(f, "Cannot deserialize the response.")
            }
            Self::Utf8Decode => {
                write!(f, "Cannot decode the message bytes as utf-8.")
            }
        }
    }
}
impl core::error::Error for AtsError {}

/// The payload stored in each work item.
///
/// The field names are the queue contract; the processing phase reads items
/// back with exactly these keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItemData {
    /// Display name of the contact person, if Momentum has one
    #[serde(rename = "Navn")]
    pub name: Option<String>,
    /// Momentum ID of the contact person
    #[serde(rename = "Id")]
    pub id: String,
}

/// A single item claimed from the workqueue
#[derive(Debug, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub data: WorkItemData,
}

#[derive(Debug, Serialize)]
struct ClearWorkqueueRequest<'a> {
    workitem_status: &'a str,
}

#[derive(Debug, Serialize)]
struct AddItemRequest<'a> {
    data: &'a WorkItemData,
    reference: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SetItemStatusRequest<'a> {
    status: &'a str,
    message: Option<&'a str>,
}

/// The workqueue operations the two phases need.
pub trait Workqueue {
    /// Remove all items currently in the given status from the queue.
    async fn clear(&self, status: &str) -> Result<(), AtsError>;
    /// Append one item, with an optional human-readable reference.
    async fn add_item(&self, data: &WorkItemData, reference: Option<&str>) -> Result<(), AtsError>;
    /// Claim the next item, or None once the queue is drained.
    async fn next_item(&self) -> Result<Option<WorkItem>, AtsError>;
    async fn complete_item(&self, item_id: &str) -> Result<(), AtsError>;
    async fn fail_item(&self, item_id: &str, message: &str) -> Result<(), AtsError>;
}

/// The workqueue hosted on the automation server
pub struct AtsWorkqueue {
    base_url: String,
    workqueue_id: String,
    client: reqwest::Client,
}
impl AtsWorkqueue {
    pub fn new(config: &Config) -> Self {
        Self {
            base_url: config.automation_server.url.clone(),
            workqueue_id: config.automation_server.workqueue_id.clone(),
            client: config.ats_client.clone(),
        }
    }

    async fn set_item_status(
        &self,
        item_id: &str,
        status: &str,
        message: Option<&str>,
    ) -> Result<(), AtsError> {
        match self
            .client
            .put(format!("{}/api/workitems/{}/status", self.base_url, item_id))
            .json(&SetItemStatusRequest { status, message })
            .send()
            .await
        {
            Ok(response) => {
                if let Err(e) = response.error_for_status() {
                    warn!("The automation server rejected the status change for item {item_id}: {e}");
                    return Err(AtsError::SetItemStatus(e));
                }
                Ok(())
            }
            Err(e) => {
                warn!("There was a problem getting a response from the automation server");
                Err(AtsError::SetItemStatus(e))
            }
        }
    }
}

impl Workqueue for AtsWorkqueue {
    async fn clear(&self, status: &str) -> Result<(), AtsError> {
        match self
            .client
            .post(format!(
                "{}/api/workqueues/{}/clear",
                self.base_url, self.workqueue_id
            ))
            .json(&ClearWorkqueueRequest {
                workitem_status: status,
            })
            .send()
            .await
        {
            Ok(response) => {
                if let Err(e) = response.error_for_status() {
                    warn!("The automation server rejected the clear request: {e}");
                    return Err(AtsError::ClearWorkqueue(e));
                }
                Ok(())
            }
            Err(e) => {
                warn!("There was a problem getting a response from the automation server");
                Err(AtsError::ClearWorkqueue(e))
            }
        }
    }

    async fn add_item(&self, data: &WorkItemData, reference: Option<&str>) -> Result<(), AtsError> {
        match self
            .client
            .post(format!(
                "{}/api/workqueues/{}/add",
                self.base_url, self.workqueue_id
            ))
            .json(&AddItemRequest { data, reference })
            .send()
            .await
        {
            Ok(response) => {
                if let Err(e) = response.error_for_status() {
                    warn!("The automation server rejected the new work item: {e}");
                    return Err(AtsError::AddItem(e));
                }
                Ok(())
            }
            Err(e) => {
                warn!("There was a problem getting a response from the automation server");
                Err(AtsError::AddItem(e))
            }
        }
    }

    async fn next_item(&self) -> Result<Option<WorkItem>, AtsError> {
        let response = match self
            .client
            .get(format!(
                "{}/api/workqueues/{}/next_item",
                self.base_url, self.workqueue_id
            ))
            .send()
            .await
        {
            Ok(x) => x,
            Err(e) => {
                warn!("There was a problem getting a response from the automation server");
                return Err(AtsError::NextItem(e));
            }
        };
        // a drained queue is signalled with 204
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let text = match response.text().await {
            Ok(x) => x,
            Err(e) => {
                warn!(
                    "There was an error reading the response from the automation server as utf-8: {e}"
                );
                return Err(AtsError::Utf8Decode);
            }
        };
        match serde_json::from_str::<WorkItem>(&text) {
            Ok(item) => Ok(Some(item)),
            Err(_) => {
                warn!("There was an error parsing the return value from the automation server.");
                warn!("The complete text received was: {text}");
                Err(AtsError::Deserialize)
            }
        }
    }

    async fn complete_item(&self, item_id: &str) -> Result<(), AtsError> {
        self.set_item_status(item_id, "completed", None).await
    }

    async fn fail_item(&self, item_id: &str, message: &str) -> Result<(), AtsError> {
        self.set_item_status(item_id, "failed", Some(message)).await
    }
}

/// A named credential from the automation servers credential store
#[derive(Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
    /// Extra per-credential fields. Which keys are present depends on the credential.
    #[serde(default)]
    pub data: serde_json::Value,
}
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("data", &"[redacted]")
            .finish()
    }
}

/// Fetch a credential from the automation servers credential store by its name
pub async fn get_credential(config: &Config, name: &str) -> Result<Credential, AtsError> {
    let response = match config
        .ats_client
        .get(format!("{}/api/credentials", config.automation_server.url))
        .query(&[("name", name)])
        .send()
        .await
    {
        Ok(x) => x,
        Err(e) => {
            warn!("There was a problem getting a response from the automation server");
            return Err(AtsError::GetCredential(e));
        }
    };
    let text = match response.text().await {
        Ok(x) => x,
        Err(e) => {
            warn!(
                "There was an error reading the response from the automation server as utf-8: {e}"
            );
            return Err(AtsError::Utf8Decode);
        }
    };
    match serde_json::from_str::<Credential>(&text) {
        Ok(credential) => Ok(credential),
        Err(_) => {
            // the body holds the secret, so it is not logged here
            warn!("There was an error parsing the credential {name} from the automation server.");
            Err(AtsError::Deserialize)
        }
    }
}

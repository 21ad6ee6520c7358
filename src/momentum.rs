//! Everything directly interfacing with Momentum.
//!
//! Momentum authenticates with an Oauth client-credentials token plus a
//! static API key; both are sent as default headers on every request.

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{CaseHandler, ContactPerson, ats::Credential};

/// Something went wrong with Momentum
#[derive(Debug)]
pub enum MomentumError {
    CredentialData(serde_json::Error),
    Login(reqwest::Error),
    CannotCreateClient(reqwest::Error),
    GetCaseHandlers(reqwest::Error),
    GetContactPersons(reqwest::Error),
    ChangeContactStatus(reqwest::Error),
    Deserialize,
    Utf8Decode,
    /// Momentum rejected the operation for a business reason.
    ///
    /// This is the soft failure kind: the affected work item is failed with
    /// the message and processing continues with the next item.
    Business(String),
}
impl core::fmt::Display for MomentumError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::CredentialData(e) => {
                write!(
                    f,
                    "The Momentum credential does not carry the expected data fields: {e}"
                )
            }
            Self::Login(e) => {
                write!(f, "Cannot get a token from the login endpoint. reqwest Error: {e}")
            }
            Self::CannotCreateClient(e) => {
                write!(
                    f,
                    "Unable to create a reqwest client for use with Momentum bearer auth: {e}."
                )
            }
            Self::GetCaseHandlers(e) => {
                write!(f, "Cannot get case handlers. reqwest Error: {e}")
            }
            Self::GetContactPersons(e) => {
                write!(f, "Cannot get contact persons. reqwest Error: {e}")
            }
            Self::ChangeContactStatus(e) => {
                write!(
                    f,
                    "Cannot change the status of a contact person. reqwest Error: {e}"
                )
            }
            Self::Deserialize => {
                write!(f, "Cannot deserialize the response.")
            }
            Self::Utf8Decode => {
                write!(f, "Cannot decode the message bytes as utf-8.")
            }
            Self::Business(message) => {
                write!(f, "Momentum rejected the operation: {message}")
            }
        }
    }
}
impl core::error::Error for MomentumError {}

/// The extra fields the Momentum credential carries in its data object
#[derive(Debug, Deserialize)]
struct MomentumCredentialData {
    base_url: String,
    api_key: String,
    resource: String,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

/// Log in and return the access token from the Oauth endpoint.
///
/// Momentum sits behind Microsofts identity platform, so the token comes from
/// the common login endpoint with the credentials resource as the audience.
async fn momentum_login(
    client_id: &str,
    client_secret: &str,
    resource: &str,
) -> Result<String, MomentumError> {
    let form_data = [
        ("grant_type", "client_credentials"),
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("resource", resource),
    ];
    match reqwest::Client::new()
        .post("https://login.microsoftonline.com/common/oauth2/token")
        .form(&form_data)
        .send()
        .await
    {
        Ok(x) => {
            let text_res = x.text().await;
            match text_res {
                Ok(text) => {
                    let deser_res: Result<AccessTokenResponse, _> = serde_json::from_str(&text);
                    if let Ok(y) = deser_res {
                        Ok(y.access_token)
                    } else {
                        warn!("There was an error parsing the token response from the login endpoint.");
                        warn!("The complete text received was: {text}");
                        Err(MomentumError::Deserialize)
                    }
                }
                Err(e) => {
                    warn!("There was an error reading the response from the login endpoint as utf-8: {e}");
                    Err(MomentumError::Utf8Decode)
                }
            }
        }
        Err(e) => {
            warn!("There was a problem getting a response from the login endpoint");
            Err(MomentumError::Login(e))
        }
    }
}

/// Log in to Momentum and create a Client that sends the correct auth headers each time
pub async fn create_client(credential: Credential) -> Result<MomentumClient, MomentumError> {
    let Credential {
        username,
        password,
        data,
    } = credential;
    let data: MomentumCredentialData =
        serde_json::from_value(data).map_err(MomentumError::CredentialData)?;
    let access_token = momentum_login(&username, &password, &data.resource).await?;

    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("application/json"),
    );
    let mut auth_value = header::HeaderValue::from_str(&format!("Bearer {}", access_token))
        .expect("statically good header");
    auth_value.set_sensitive(true);
    headers.insert(header::AUTHORIZATION, auth_value);
    let mut api_key_value =
        header::HeaderValue::from_str(&data.api_key).expect("statically good header");
    api_key_value.set_sensitive(true);
    headers.insert(header::HeaderName::from_static("x-api-key"), api_key_value);

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .use_rustls_tls()
        .build()
        .map_err(MomentumError::CannotCreateClient)?;
    Ok(MomentumClient {
        base_url: data.base_url,
        client,
    })
}

#[derive(Debug, Deserialize)]
struct CaseHandlersResponse {
    data: Vec<CaseHandlerData>,
}

#[derive(Debug, Deserialize)]
struct CaseHandlerData {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

/// The contact list comes in the same envelope, but the data key is missing
/// entirely for companies without contact persons.
#[derive(Debug, Deserialize)]
struct ContactPersonsResponse {
    #[serde(default)]
    data: Vec<ContactPersonData>,
}

#[derive(Debug, Deserialize)]
struct ContactPersonData {
    id: String,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    #[serde(rename = "contactRoleCode")]
    contact_role_code: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChangeStatusRequest {
    active: bool,
}

/// The body Momentum sends along with a 4xx on the status endpoint
#[derive(Debug, Deserialize)]
struct MomentumFault {
    message: String,
}

/// The Momentum operations the two phases need.
pub trait CompanyDirectory {
    /// All case handlers assigned to the given company.
    async fn case_handlers(&self, company_id: &str) -> Result<Vec<CaseHandler>, MomentumError>;
    /// All contact persons listed on the given company.
    async fn contact_persons(
        &self,
        company_id: &str,
    ) -> Result<Vec<ContactPerson>, MomentumError>;
    /// Change a contact persons active flag. Returns whether Momentum applied the change.
    async fn set_contact_person_active(
        &self,
        contact_person_id: &str,
        active: bool,
    ) -> Result<bool, MomentumError>;
}

/// A logged-in connection to Momentum
pub struct MomentumClient {
    base_url: String,
    client: reqwest::Client,
}

impl CompanyDirectory for MomentumClient {
    async fn case_handlers(&self, company_id: &str) -> Result<Vec<CaseHandler>, MomentumError> {
        let response = match self
            .client
            .get(format!(
                "{}/api/companies/{}/case-handlers",
                self.base_url, company_id
            ))
            .send()
            .await
        {
            Ok(x) => {
                let text_res = x.text().await;
                match text_res {
                    Ok(text) => {
                        let deser_res: Result<CaseHandlersResponse, _> =
                            serde_json::from_str(&text);
                        if let Ok(y) = deser_res {
                            y
                        } else {
                            warn!("There was an error parsing the return value from Momentum.");
                            warn!("The complete text received was: {text}");
                            return Err(MomentumError::Deserialize);
                        }
                    }
                    Err(e) => {
                        warn!(
                            "There was an error reading the response from Momentum as utf-8: {e}"
                        );
                        return Err(MomentumError::Utf8Decode);
                    }
                }
            }
            Err(e) => {
                warn!("There was a problem getting a response from Momentum");
                return Err(MomentumError::GetCaseHandlers(e));
            }
        };
        Ok(response
            .data
            .into_iter()
            .map(|x| CaseHandler {
                display_name: x.display_name,
            })
            .collect())
    }

    async fn contact_persons(
        &self,
        company_id: &str,
    ) -> Result<Vec<ContactPerson>, MomentumError> {
        let response = match self
            .client
            .get(format!(
                "{}/api/companies/{}/contact-persons",
                self.base_url, company_id
            ))
            .send()
            .await
        {
            Ok(x) => {
                let text_res = x.text().await;
                match text_res {
                    Ok(text) => {
                        let deser_res: Result<ContactPersonsResponse, _> =
                            serde_json::from_str(&text);
                        if let Ok(y) = deser_res {
                            y
                        } else {
                            warn!("There was an error parsing the return value from Momentum.");
                            warn!("The complete text received was: {text}");
                            return Err(MomentumError::Deserialize);
                        }
                    }
                    Err(e) => {
                        warn!(
                            "There was an error reading the response from Momentum as utf-8: {e}"
                        );
                        return Err(MomentumError::Utf8Decode);
                    }
                }
            }
            Err(e) => {
                warn!("There was a problem getting a response from Momentum");
                return Err(MomentumError::GetContactPersons(e));
            }
        };
        Ok(response
            .data
            .into_iter()
            .map(|x| ContactPerson {
                id: x.id,
                display_name: x.display_name,
                contact_role_code: x.contact_role_code,
            })
            .collect())
    }

    async fn set_contact_person_active(
        &self,
        contact_person_id: &str,
        active: bool,
    ) -> Result<bool, MomentumError> {
        let response = match self
            .client
            .put(format!(
                "{}/api/contact-persons/{}/status",
                self.base_url, contact_person_id
            ))
            .json(&ChangeStatusRequest { active })
            .send()
            .await
        {
            Ok(x) => x,
            Err(e) => {
                warn!("There was a problem getting a response from Momentum");
                return Err(MomentumError::ChangeContactStatus(e));
            }
        };
        let status = response.status();
        let text = match response.text().await {
            Ok(x) => x,
            Err(e) => {
                warn!("There was an error reading the response from Momentum as utf-8: {e}");
                return Err(MomentumError::Utf8Decode);
            }
        };
        // a 4xx with a fault body is a business rejection, not an API failure
        if status.is_client_error() {
            return match serde_json::from_str::<MomentumFault>(&text) {
                Ok(fault) => Err(MomentumError::Business(fault.message)),
                Err(_) => {
                    warn!("There was an error parsing the fault returned from Momentum.");
                    warn!("The complete text received was: {text}");
                    Err(MomentumError::Deserialize)
                }
            };
        }
        match serde_json::from_str::<bool>(&text) {
            Ok(applied) => Ok(applied),
            Err(_) => {
                warn!("There was an error parsing the return value from Momentum.");
                warn!("The complete text received was: {text}");
                Err(MomentumError::Deserialize)
            }
        }
    }
}

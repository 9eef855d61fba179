// Three-round-trip device login
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::application::ports::{AuthError, Authenticator};
use crate::infrastructure::scram::{self, HandshakeKeys};

const AUTH_START: &str = "auth/start";
const AUTH_FINISH: &str = "auth/finish";
const AUTH_CREATE_SESSION: &str = "auth/create_session";
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the challenge-response exchange against the inverter's local API.
/// One call is one complete attempt; nothing is retried or kept on failure.
pub struct DeviceAuthenticator {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    rounds: u32,
    salt: String,
    nonce: String,
    #[serde(rename = "transactionId")]
    transaction_id: String,
}

#[derive(Debug, Deserialize)]
struct FinishResponse {
    signature: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    #[serde(rename = "sessionId")]
    session_id: String,
}

impl DeviceAuthenticator {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(CALL_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &'static str,
        body: &serde_json::Value,
    ) -> Result<T, AuthError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| AuthError::Network { endpoint, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|err| AuthError::Protocol {
            endpoint,
            detail: err.to_string(),
        })
    }
}

#[async_trait]
impl Authenticator for DeviceAuthenticator {
    async fn authenticate(&self, password: &str) -> Result<String, AuthError> {
        let client_nonce = scram::client_nonce();
        let start: StartResponse = self
            .post_json(
                AUTH_START,
                &json!({ "username": scram::USER_TYPE, "nonce": client_nonce }),
            )
            .await?;

        let salt = BASE64.decode(&start.salt).map_err(|_| AuthError::Protocol {
            endpoint: AUTH_START,
            detail: "salt is not valid base64".to_string(),
        })?;
        let keys = HandshakeKeys::derive(password, &salt, start.rounds)?;
        let auth_message =
            scram::auth_message(&client_nonce, &start.nonce, &start.salt, start.rounds);
        let proof = keys.client_proof(&auth_message)?;

        let finish: FinishResponse = self
            .post_json(
                AUTH_FINISH,
                &json!({ "transactionId": start.transaction_id, "proof": proof }),
            )
            .await?;

        let signature = BASE64
            .decode(&finish.signature)
            .map_err(|_| AuthError::Protocol {
                endpoint: AUTH_FINISH,
                detail: "signature is not valid base64".to_string(),
            })?;
        keys.verify_server_signature(&auth_message, &signature)?;

        let protocol_key = keys.protocol_key(&auth_message)?;
        let sealed = scram::seal_token(&protocol_key, &finish.token)?;

        let created: CreateSessionResponse = self
            .post_json(
                AUTH_CREATE_SESSION,
                &json!({
                    "transactionId": start.transaction_id,
                    "iv": sealed.iv,
                    "tag": sealed.tag,
                    "payload": sealed.payload,
                }),
            )
            .await?;

        info!("inverter session created");
        Ok(created.session_id)
    }
}

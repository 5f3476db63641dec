use std::sync::RwLock;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::mail::{MailError, MailSender, OutgoingMail, SendFuture};

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMailRequest<'a> {
    message: GraphMessage<'a>,
    save_to_sent_items: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage<'a> {
    subject: &'a str,
    body: GraphBody<'a>,
    to_recipients: Vec<Recipient<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc_recipients: Vec<Recipient<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<FileAttachment<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphBody<'a> {
    content_type: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Recipient<'a> {
    email_address: Address<'a>,
}

#[derive(Serialize)]
struct Address<'a> {
    address: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileAttachment<'a> {
    #[serde(rename = "@odata.type")]
    odata_type: &'static str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<&'a str>,
    content_bytes: String,
}

fn recipients(addresses: &[String]) -> Vec<Recipient<'_>> {
    addresses
        .iter()
        .map(|a| Recipient {
            email_address: Address { address: a },
        })
        .collect()
}

impl<'a> From<&'a OutgoingMail> for SendMailRequest<'a> {
    fn from(mail: &'a OutgoingMail) -> Self {
        SendMailRequest {
            message: GraphMessage {
                subject: &mail.subject,
                body: GraphBody {
                    content_type: "HTML",
                    content: &mail.html_body,
                },
                to_recipients: recipients(&mail.to),
                cc_recipients: recipients(&mail.cc),
                attachments: mail
                    .attachments
                    .iter()
                    .map(|a| FileAttachment {
                        odata_type: "#microsoft.graph.fileAttachment",
                        name: &a.name,
                        content_type: a.content_type.as_deref(),
                        content_bytes: STANDARD.encode(&a.bytes),
                    })
                    .collect(),
            },
            save_to_sent_items: mail.save_to_sent_items,
        }
    }
}

/// Microsoft Graph `sendMail` client using the OAuth2 client-credential flow.
pub struct GraphMailer {
    http: reqwest::Client,
    token_url: String,
    send_url: String,
    client_id: String,
    client_secret: String,
    cached: RwLock<Option<CachedToken>>,
}

impl GraphMailer {
    pub fn new(
        authority_base_url: &str,
        tenant_id: &str,
        graph_base_url: &str,
        sender: &str,
        client_id: String,
        client_secret: String,
    ) -> Result<Self, MailError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            token_url: format!(
                "{}/{tenant_id}/oauth2/v2.0/token",
                authority_base_url.trim_end_matches('/')
            ),
            send_url: format!(
                "{}/users/{sender}/sendMail",
                graph_base_url.trim_end_matches('/')
            ),
            client_id,
            client_secret,
            cached: RwLock::new(None),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, MailError> {
        Self::new(
            &config.authority_base_url,
            &config.azure_tenant_id,
            &config.graph_base_url,
            &config.sender_email,
            config.azure_client_id.clone(),
            config.azure_client_secret.clone(),
        )
    }

    fn cached_token(&self) -> Option<String> {
        let cache = self.cached.read().ok()?;
        let token = cache.as_ref()?;
        if Instant::now() + TOKEN_REFRESH_MARGIN >= token.expires_at {
            return None;
        }
        Some(token.value.clone())
    }

    async fn access_token(&self) -> Result<String, MailError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        debug!("Requesting Graph access token");
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", GRAPH_SCOPE),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| MailError::Token(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Token(format!("HTTP {status}: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| MailError::Token(format!("token response parse failed: {e}")))?;

        let mut cache = self
            .cached
            .write()
            .map_err(|e| MailError::Token(e.to_string()))?;
        *cache = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });

        Ok(token.access_token)
    }

    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let token = self.access_token().await?;

        let response = self
            .http
            .post(&self.send_url)
            .bearer_auth(token)
            .json(&SendMailRequest::from(mail))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MailError::Rejected {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        info!(
            subject = %mail.subject,
            recipients = mail.to.len() + mail.cc.len(),
            attachments = mail.attachments.len(),
            "Mail sent"
        );
        Ok(())
    }
}

impl MailSender for GraphMailer {
    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> SendFuture<'a> {
        Box::pin(self.deliver(mail))
    }
}

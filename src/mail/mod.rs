//! Outbound email.
//!
//! Everything the service sends (OTP codes, late notices, reports) goes
//! through [`MailSender`]. Production uses [`graph::GraphMailer`]; tests swap
//! in a recording fake.

pub mod graph;
pub mod templates;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("token request failed: {0}")]
    Token(String),

    #[error("mail request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail API rejected the message (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A single HTML message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMail {
    pub subject: String,
    pub html_body: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub save_to_sent_items: bool,
}

pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<(), MailError>> + Send + 'a>>;

pub trait MailSender: Send + Sync {
    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> SendFuture<'a>;
}

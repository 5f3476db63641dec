//! Batched delivery of clock-in rows.
//!
//! Rows (and any uploaded images) pile up in memory and go out as a single
//! email with a CSV attachment, either when `batch_size` rows are waiting or
//! when `flush_delay` has passed since the first row of a batch. A failed send
//! keeps everything for the next trigger. Nothing here survives a restart.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::mail::templates::batch_report_email;
use crate::mail::{Attachment, MailSender, OutgoingMail};
use crate::utils::csv_ledger::time_in_header_line;

pub const REPORT_SUBJECT: &str = "WFH Time-In Report";
const BATCH_FILE: &str = "batch-time-in.csv";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Email queue full")]
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub row: String,
    pub images: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub batch_size: usize,
    pub max_size: usize,
    pub flush_delay: Duration,
    pub data_dir: PathBuf,
    /// Removed together with the batch file once a report is delivered.
    pub ledger_path: PathBuf,
    pub to: Vec<String>,
    pub cc: Vec<String>,
}

impl QueueSettings {
    pub fn from_config(config: &Config, ledger_path: PathBuf) -> Self {
        Self {
            batch_size: config.queue_batch_size,
            max_size: config.queue_max_size,
            flush_delay: config.queue_flush_delay,
            data_dir: config.data_dir.clone(),
            ledger_path,
            to: vec![config.admin_email.clone()],
            cc: config.report_cc(),
        }
    }
}

#[derive(Default)]
struct QueueState {
    items: Vec<QueueItem>,
    timer: Option<JoinHandle<()>>,
}

struct Inner {
    settings: QueueSettings,
    mailer: Arc<dyn MailSender>,
    state: Mutex<QueueState>,
    /// Serializes flushes so a batch is never sent twice.
    flushing: tokio::sync::Mutex<()>,
}

#[derive(Clone)]
pub struct EmailQueue {
    inner: Arc<Inner>,
}

impl EmailQueue {
    pub fn new(settings: QueueSettings, mailer: Arc<dyn MailSender>) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                mailer,
                state: Mutex::new(QueueState::default()),
                flushing: tokio::sync::Mutex::new(()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.inner.settings.max_size
    }

    /// Queues one row. Starts a flush when the batch is complete, otherwise
    /// arms the delay timer if it is not already running.
    pub fn enqueue(&self, row: String, images: Vec<PathBuf>) -> Result<usize, QueueError> {
        let settings = &self.inner.settings;
        let mut state = self.state();

        if state.items.len() >= settings.max_size {
            return Err(QueueError::Full);
        }

        state.items.push(QueueItem { row, images });
        let pending = state.items.len();
        debug!(pending, batch_size = settings.batch_size, "Queued time-in");

        if pending >= settings.batch_size {
            drop(state);
            let queue = self.clone();
            actix_web::rt::spawn(async move {
                let _ = queue.flush().await;
            });
        } else if state.timer.is_none() {
            let queue = self.clone();
            let delay = settings.flush_delay;
            state.timer = Some(actix_web::rt::spawn(async move {
                tokio::time::sleep(delay).await;
                // Detach first so the flush does not abort this task.
                queue.state().timer = None;
                let _ = queue.flush().await;
            }));
        }

        Ok(pending)
    }

    /// Sends everything pending as one report. Returns how many rows went out.
    pub async fn flush(&self) -> anyhow::Result<usize> {
        let _flushing = self.inner.flushing.lock().await;

        let batch: Vec<QueueItem> = {
            let mut state = self.state();
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.items.clone()
        };

        if batch.is_empty() {
            return Ok(0);
        }

        match self.send_batch(&batch).await {
            Ok(()) => {
                // Only this function removes items and it holds `flushing`,
                // so the first `batch.len()` items are exactly what was sent.
                self.state().items.drain(..batch.len());
                self.cleanup(&batch).await;
                info!(rows = batch.len(), "Time-in batch delivered");
                Ok(batch.len())
            }
            Err(e) => {
                error!(error = ?e, rows = batch.len(), "Batch email send failed, keeping queue");
                Err(e)
            }
        }
    }

    fn batch_path(&self) -> PathBuf {
        self.inner.settings.data_dir.join(BATCH_FILE)
    }

    async fn send_batch(&self, batch: &[QueueItem]) -> anyhow::Result<()> {
        let settings = &self.inner.settings;
        tokio::fs::create_dir_all(&settings.data_dir)
            .await
            .context("creating data dir")?;

        let mut csv = time_in_header_line()?;
        for item in batch {
            csv.push_str(&item.row);
        }
        let batch_path = self.batch_path();
        tokio::fs::write(&batch_path, &csv)
            .await
            .with_context(|| format!("writing {}", batch_path.display()))?;

        let mut attachments = vec![Attachment {
            name: BATCH_FILE.to_string(),
            content_type: Some("text/csv".to_string()),
            bytes: csv.into_bytes(),
        }];

        for path in batch.iter().flat_map(|i| &i.images) {
            match tokio::fs::read(path).await {
                Ok(bytes) => attachments.push(Attachment {
                    name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "image".to_string()),
                    content_type: None,
                    bytes,
                }),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable image"),
            }
        }

        let image_count = attachments.len() - 1;
        let mail = OutgoingMail {
            subject: REPORT_SUBJECT.to_string(),
            html_body: batch_report_email(batch.len(), image_count),
            to: settings.to.clone(),
            cc: settings.cc.clone(),
            attachments,
            save_to_sent_items: true,
        };

        self.inner.mailer.send(&mail).await?;
        Ok(())
    }

    async fn cleanup(&self, batch: &[QueueItem]) {
        let settings = &self.inner.settings;
        let files = [self.batch_path(), settings.ledger_path.clone()]
            .into_iter()
            .chain(batch.iter().flat_map(|i| i.images.iter().cloned()));

        for path in files {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to remove flushed file");
                }
            }
        }
    }
}

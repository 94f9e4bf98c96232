/// Alert composition and hand-off.
///
/// A completed run becomes one message per recipient: a subject naming the
/// area and the alert category, a short text summary, the recipient's own
/// point series and any rendered artifacts. Delivery goes through the
/// `Notifier` trait. `OutboxNotifier` drops one JSON file per message into
/// a directory that an external mail relay picks up; `StdoutNotifier`
/// prints the same documents for dry runs.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;

use crate::analysis::accumulate::Run;
use crate::analysis::severity::{AlertCategory, Classification};
use crate::logging::{self, DataSource};
use crate::model::{AlerterError, HourlyReading};
use crate::render::{Artifact, total_filename};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub area: String,
    /// Cycle identifier, e.g. `20190803t12z`.
    pub cycle: String,
    pub recipient: String,
    pub category: AlertCategory,
    pub subject: String,
    pub body: String,
    /// Point label -> readings, only for the points this recipient follows.
    pub hourly: BTreeMap<String, Vec<HourlyReading>>,
    pub attachments: Vec<Artifact>,
}

/// Summary paragraph shared by every recipient of a run.
pub fn summary_text(init_label: &str, end_label: &str, horizon: u32, classification: &Classification) -> String {
    format!(
        "From {} to {}:\n{} hours of light precipitation, \n{} hours of moderate precip, and\n{} hours of heavy precip can be expected. \nA max total of {} inches of precip can be expected over the next {} hours.",
        init_label,
        end_label,
        classification.light,
        classification.moderate,
        classification.heavy,
        classification.total,
        horizon
    )
}

/// Builds one message per recipient of the run.
pub fn compose_messages(run: &Run, classification: &Classification) -> Vec<Message> {
    let init_label = run.cycle.init_label();
    let end_label = run.cycle.label(run.horizon);
    let subject = format!("{} Area: {}", run.area, classification.category.subject(run.horizon));
    let body = summary_text(&init_label, &end_label, run.horizon, classification);
    let cycle = format!("{}t{:02}z", run.cycle.date_stamp(), run.cycle.init_hour());

    let mut attachments = Vec::new();
    if let Some(total) = &run.total_artifact {
        attachments.push(Artifact {
            filename: total_filename(&init_label, &end_label),
            ..total.clone()
        });
    }
    attachments.extend(run.hourly_artifacts.iter().cloned());

    run.hourly
        .iter()
        .map(|(recipient, series)| Message {
            area: run.area.clone(),
            cycle: cycle.clone(),
            recipient: recipient.clone(),
            category: classification.category,
            subject: subject.clone(),
            body: body.clone(),
            hourly: series.clone(),
            attachments: attachments.clone(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Hands composed messages to a delivery channel. Returns how many were
/// accepted.
pub trait Notifier {
    fn deliver(&mut self, messages: &[Message]) -> Result<usize, AlerterError>;
}

/// Serialized form of a message, attachments inlined as base64.
#[derive(Debug, Serialize)]
struct OutboxDocument<'a> {
    #[serde(flatten)]
    message: &'a Message,
    attachment_data: Vec<EncodedAttachment<'a>>,
}

#[derive(Debug, Serialize)]
struct EncodedAttachment<'a> {
    filename: &'a str,
    content_type: &'a str,
    base64: String,
}

fn outbox_document(message: &Message) -> OutboxDocument<'_> {
    OutboxDocument {
        message,
        attachment_data: message
            .attachments
            .iter()
            .map(|a| EncodedAttachment {
                filename: &a.filename,
                content_type: &a.content_type,
                base64: BASE64.encode(&a.bytes),
            })
            .collect(),
    }
}

/// Writes each message as a pretty-printed JSON file into a directory.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    dir: PathBuf,
}

impl OutboxNotifier {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// File name for a message, e.g. `20190803t12z_Peoria_alerts_at_example.com.json`.
    pub fn file_name(message: &Message) -> String {
        let recipient: String = message
            .recipient
            .chars()
            .map(|c| match c {
                '@' => "_at_".to_string(),
                c if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' => c.to_string(),
                _ => "_".to_string(),
            })
            .collect();
        format!("{}_{}_{}.json", message.cycle, message.area.replace(' ', "_"), recipient)
    }

    fn write_one(&self, message: &Message) -> Result<PathBuf, AlerterError> {
        let path = self.dir.join(Self::file_name(message));
        let json = serde_json::to_string_pretty(&outbox_document(message))
            .map_err(|e| AlerterError::Notification(format!("failed to serialize message: {}", e)))?;

        let mut file = fs::File::create(&path).map_err(|e| {
            AlerterError::Notification(format!("failed to create {}: {}", path.display(), e))
        })?;
        file.write_all(json.as_bytes()).map_err(|e| {
            AlerterError::Notification(format!("failed to write {}: {}", path.display(), e))
        })?;

        Ok(path)
    }
}

impl Notifier for OutboxNotifier {
    fn deliver(&mut self, messages: &[Message]) -> Result<usize, AlerterError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            AlerterError::Notification(format!("failed to create outbox {}: {}", self.dir.display(), e))
        })?;

        for message in messages {
            let path = self.write_one(message)?;
            logging::info(
                DataSource::Notify,
                Some(&message.area),
                &format!("queued message for {} at {}", message.recipient, path.display()),
            );
        }

        Ok(messages.len())
    }
}

/// Prints messages as JSON instead of delivering them.
#[derive(Debug, Default)]
pub struct StdoutNotifier;

impl Notifier for StdoutNotifier {
    fn deliver(&mut self, messages: &[Message]) -> Result<usize, AlerterError> {
        let json = serde_json::to_string_pretty(messages)
            .map_err(|e| AlerterError::Notification(format!("failed to serialize messages: {}", e)))?;
        println!("{}", json);
        Ok(messages.len())
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Notifies for a completed run. Takes the run by value so it cannot be
/// notified twice. `NONE` runs return 0 without touching the notifier.
pub fn dispatch(run: Run, classification: &Classification, notifier: &mut dyn Notifier) -> Result<usize, AlerterError> {
    if !classification.category.should_notify() {
        logging::info(
            DataSource::Notify,
            Some(&run.area),
            &format!("no measurable rain (max total {:.2} in); nothing sent", classification.total),
        );
        return Ok(0);
    }

    let messages = compose_messages(&run, classification);
    notifier.deliver(&messages)
}

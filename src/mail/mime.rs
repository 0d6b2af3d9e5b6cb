//! RFC 822 / MIME construction for outgoing mail.
//!
//! Messages are rendered as CRLF-joined text and shipped to Gmail as
//! unpadded base64url in the `raw` field.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use chrono::{DateTime, Utc};

use super::{AttachmentInput, BodyType, CreateDraftInput, SendMessageInput};

/// URL-safe alphabet, no padding on encode, padding optional on decode.
pub const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const CRLF: &str = "\r\n";

/// Everything needed to render one message.
#[derive(Debug, Clone, Default)]
pub struct MessageFields {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub content_type: BodyType,
    pub attachments: Vec<AttachmentInput>,
    pub thread_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
}

impl From<&SendMessageInput> for MessageFields {
    fn from(input: &SendMessageInput) -> Self {
        Self {
            to: input.to.clone(),
            cc: input.cc.clone(),
            bcc: input.bcc.clone(),
            subject: input.subject.clone(),
            body: input.body.clone(),
            content_type: input.content_type,
            attachments: input.attachments.clone(),
            thread_id: input.thread_id.clone(),
            in_reply_to: input.in_reply_to.clone(),
            references: input.references.clone(),
        }
    }
}

impl From<&CreateDraftInput> for MessageFields {
    fn from(input: &CreateDraftInput) -> Self {
        Self {
            to: input.to.clone(),
            cc: input.cc.clone(),
            bcc: input.bcc.clone(),
            subject: input.subject.clone(),
            body: input.body.clone(),
            content_type: input.content_type,
            attachments: input.attachments.clone(),
            ..Default::default()
        }
    }
}

/// Multipart boundary derived from the send time.
pub fn boundary_at(now: DateTime<Utc>) -> String {
    format!("----=_Part_{}", now.timestamp_millis())
}

/// Header values never carry line breaks.
fn header_value(raw: &str) -> String {
    raw.replace(['\r', '\n'], " ")
}

/// Render the message text.
pub fn render(fields: &MessageFields, now: DateTime<Utc>) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!("To: {}", header_value(&fields.to.join(", "))));
    if !fields.cc.is_empty() {
        lines.push(format!("Cc: {}", header_value(&fields.cc.join(", "))));
    }
    if !fields.bcc.is_empty() {
        lines.push(format!("Bcc: {}", header_value(&fields.bcc.join(", "))));
    }
    lines.push(format!("Subject: {}", header_value(&fields.subject)));
    if let Some(id) = &fields.thread_id {
        lines.push(format!("Thread-Id: {}", header_value(id)));
    }
    if let Some(id) = &fields.in_reply_to {
        lines.push(format!("In-Reply-To: {}", header_value(id)));
    }
    if let Some(refs) = &fields.references {
        lines.push(format!("References: {}", header_value(refs)));
    }

    let boundary = boundary_at(now);
    let multipart = !fields.attachments.is_empty();
    if multipart {
        lines.push(format!(
            "Content-Type: multipart/mixed; boundary=\"{boundary}\""
        ));
        lines.push(String::new());
        lines.push(format!("--{boundary}"));
    }

    lines.push(format!(
        "Content-Type: {}; charset=utf-8",
        fields.content_type.as_str()
    ));
    lines.push(String::new());
    lines.push(fields.body.clone());

    if multipart {
        for attachment in &fields.attachments {
            let filename = header_value(&attachment.filename);
            lines.push(String::new());
            lines.push(format!("--{boundary}"));
            lines.push(format!(
                "Content-Type: {}; name=\"{filename}\"",
                header_value(&attachment.mime_type)
            ));
            lines.push("Content-Transfer-Encoding: base64".to_string());
            lines.push(format!(
                "Content-Disposition: attachment; filename=\"{filename}\""
            ));
            lines.push(String::new());
            lines.push(attachment.content.clone());
        }
        lines.push(format!("--{boundary}--"));
    }

    lines.join(CRLF)
}

/// Render and transport-encode the message for Gmail's `raw` field.
pub fn encode(fields: &MessageFields, now: DateTime<Utc>) -> String {
    URL_SAFE_LENIENT.encode(render(fields, now))
}

/// Reverse [`encode`]: base64url (padding optional) back to message text.
pub fn decode_raw(raw: &str) -> anyhow::Result<String> {
    let bytes = URL_SAFE_LENIENT.decode(raw.trim())?;
    Ok(String::from_utf8(bytes)?)
}

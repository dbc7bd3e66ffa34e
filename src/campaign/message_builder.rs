use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use mail_send::mail_builder::MessageBuilder;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::domain::{Recipient, Template};

/// Replace {key} with values from `vars`; leave unknown {key} intact.
static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([\p{L}\p{N}_]+?)\}").unwrap());

/// Any opening, closing or self-closing tag marks the body as rich text.
static HTML_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?[a-z][a-z0-9]*(\s[^<>]*)?/?>").unwrap());

/// Reasons a message could not be composed for one recipient.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("cannot read attachment {path}: {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("attachment path has no file name: {0}")]
    AttachmentName(PathBuf),

    #[error("cannot render MIME document: {0}")]
    Render(#[from] io::Error),
}

/// Raw subject/body/attachments before per-recipient substitution.
#[derive(Debug, Clone, Copy)]
pub struct Draft<'a> {
    pub subject: &'a str,
    pub body: &'a str,
    pub attachments: &'a [PathBuf],
}

impl<'a> From<&'a Template> for Draft<'a> {
    fn from(template: &'a Template) -> Self {
        Self {
            subject: template.subject_pattern.as_str(),
            body: template.body_pattern.as_str(),
            attachments: &[],
        }
    }
}

/// The `From:` identity of the owner.
#[derive(Debug, Clone, Copy)]
pub struct Sender<'a> {
    pub name: &'a str,
    pub address: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// A fully rendered message addressed to a single recipient.
#[derive(Debug, Clone)]
pub struct ComposedMessage {
    pub from_name: String,
    pub from_address: String,
    pub to_address: String,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<Attachment>,
}

impl ComposedMessage {
    /// Returns a [`MessageBuilder`] borrowing this message's parts.
    pub fn builder(&self) -> MessageBuilder<'_> {
        let mut message = MessageBuilder::new()
            .from((self.from_name.as_str(), self.from_address.as_str()))
            .to(self.to_address.as_str())
            .subject(self.subject.as_str())
            .html_body(self.html_body.as_str());

        for attachment in &self.attachments {
            message = message.attachment(
                attachment.content_type.as_str(),
                attachment.file_name.as_str(),
                attachment.content.as_slice(),
            );
        }

        message
    }

    /// Serialises the MIME document sent after `DATA`.
    pub fn to_mime(&self) -> Result<Vec<u8>, ComposeError> {
        let mut out = Vec::new();
        self.builder().write_to(&mut out)?;
        Ok(out)
    }
}

fn fill_template(template: &str, vars: &HashMap<String, String>) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures| {
            let key = &caps[1];
            vars.get(key)
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Plain text gets `<br>` line breaks; bodies that already carry markup
/// are left untouched.
pub fn render_html_body(body: &str) -> String {
    if HTML_TAG_RE.is_match(body) {
        body.to_owned()
    } else {
        body.replace("\r\n", "\n").replace('\n', "<br>")
    }
}

/// Substitution values for a campaign message.
pub fn recipient_fields(recipient: &Recipient, owner_name: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    fields.insert("name".into(), recipient.display_name.clone());
    fields.insert("company".into(), recipient.organization_name.clone());
    fields.insert("company_name".into(), recipient.organization_name.clone());
    fields.insert("email".into(), recipient.email_address.clone());
    fields.insert("hr_name".into(), owner_name.to_owned());
    fields
}

fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}

fn load_attachment(path: &Path) -> Result<Attachment, ComposeError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ComposeError::AttachmentName(path.to_path_buf()))?
        .to_owned();
    let content = std::fs::read(path).map_err(|source| ComposeError::Attachment {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Attachment {
        file_name,
        content_type: content_type_for(path),
        content,
    })
}

/// Renders `draft` for one addressee.
///
/// Unknown placeholders stay verbatim. A missing attachment aborts this
/// message only.
pub fn compose_draft(
    draft: &Draft<'_>,
    to_address: &str,
    fields: &HashMap<String, String>,
    sender: &Sender<'_>,
) -> Result<ComposedMessage, ComposeError> {
    let attachments = draft
        .attachments
        .iter()
        .map(|path| load_attachment(path))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ComposedMessage {
        from_name: sender.name.to_owned(),
        from_address: sender.address.to_owned(),
        to_address: to_address.to_owned(),
        subject: fill_template(draft.subject, fields),
        html_body: render_html_body(&fill_template(draft.body, fields)),
        attachments,
    })
}

/// Builds the campaign message for `recipient` from the owner's template.
pub fn compose(
    template: &Template,
    recipient: &Recipient,
    sender: &Sender<'_>,
) -> Result<ComposedMessage, ComposeError> {
    let fields = recipient_fields(recipient, sender.name);
    compose_draft(
        &Draft::from(template),
        &recipient.email_address,
        &fields,
        sender,
    )
}

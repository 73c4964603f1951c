#![forbid(unsafe_code)]

//! Contact form model and the message-relay wire format.
//!
//! The form validates its three fields, strips markup from them, and posts a
//! GraphQL `sendMessage` mutation carrying a CAPTCHA token. The relay answers
//! with one of three outcomes: sent, verification required (the page must
//! show an interactive challenge and resubmit with its token), or failed.
//!
//! Transport is the host's job; this module only builds request bodies and
//! interprets responses, so the whole flow is testable without a network.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FolioError;

/// Mutation document posted to the relay.
pub const SEND_MESSAGE_MUTATION: &str = "mutation SendMessage($email: String!, $name: String!, \
$message: String!, $recaptchaToken: String!, $recaptchaVersion: String!) { \
sendMessage(email: $email, name: $name, message: $message, \
recaptchaToken: $recaptchaToken, recaptchaVersion: $recaptchaVersion) \
{ isBot needVerify success type message } }";

const MIN_NAME: usize = 5;
const MIN_EMAIL: usize = 8;
const MIN_MESSAGE: usize = 8;

const SENT: &str = "Message sent successfully!";
const SEND_FAILED: &str = "Failed to send message";
const VERIFY_FAILED: &str = "Verification failed";
const VERIFY_PROMPT: &str = "Please complete the verification below";

/// A form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Email,
    Message,
}

impl Field {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Message => "message",
        }
    }

    /// Field for a form input name, case-insensitive.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Name, Self::Email, Self::Message]
            .into_iter()
            .find(|field| name.trim().eq_ignore_ascii_case(field.name()))
    }
}

/// Validation failure attached to one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field.name(), self.message)
    }
}

/// Raw field values as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactDraft {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// Validated, sanitized field values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactDraft {
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let slot = match field {
            Field::Name => &mut self.name,
            Field::Email => &mut self.email,
            Field::Message => &mut self.message,
        };
        *slot = value.into();
    }

    /// Check every field, then strip markup from the accepted values.
    pub fn validate(&self) -> Result<ValidMessage, Vec<FieldError>> {
        let mut errors = Vec::new();
        if let Err(message) = min_chars(&self.name, MIN_NAME) {
            errors.push(FieldError {
                field: Field::Name,
                message,
            });
        }
        let email = if is_valid_email(&self.email) {
            min_chars(&self.email, MIN_EMAIL)
        } else {
            Err("Invalid email".to_owned())
        };
        if let Err(message) = email {
            errors.push(FieldError {
                field: Field::Email,
                message,
            });
        }
        if let Err(message) = min_chars(&self.message, MIN_MESSAGE) {
            errors.push(FieldError {
                field: Field::Message,
                message,
            });
        }
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(ValidMessage {
            name: sanitize(&self.name),
            email: sanitize(&self.email),
            message: sanitize(&self.message),
        })
    }
}

fn min_chars(value: &str, min: usize) -> Result<(), String> {
    if value.chars().count() >= min {
        Ok(())
    } else {
        Err(format!("String must contain at least {min} character(s)"))
    }
}

/// Loose structural email check: `local@domain.tld`, no whitespace.
#[must_use]
pub fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        })
}

/// Strip markup from user input.
///
/// Tags are removed, the bodies of `script` and `style` elements are dropped
/// entirely, and the result is trimmed. A `<` that does not open a tag is
/// kept as text.
#[must_use]
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let opens_tag = after
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!');
        if !opens_tag {
            out.push('<');
            rest = after;
            continue;
        }
        let Some(end) = after.find('>') else {
            // Unterminated tag swallows the remainder.
            rest = "";
            break;
        };
        let tag = &after[..end];
        rest = &after[end + 1..];
        if let Some(element) = raw_text_element(tag) {
            rest = skip_past_close(rest, element);
        }
    }
    out.push_str(rest);
    out.trim().to_owned()
}

fn raw_text_element(tag: &str) -> Option<&'static str> {
    let name = tag
        .chars()
        .take_while(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    ["script", "style"].into_iter().find(|element| *element == name)
}

fn skip_past_close<'a>(rest: &'a str, element: &str) -> &'a str {
    let close = format!("</{element}");
    // ASCII lowercasing keeps byte offsets intact.
    let Some(at) = rest.to_ascii_lowercase().find(&close) else {
        return "";
    };
    let tail = &rest[at..];
    tail.find('>').map_or("", |gt| &tail[gt + 1..])
}

/// Which CAPTCHA produced the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptchaVersion {
    /// Invisible score-based check, tried first.
    V3,
    /// Interactive challenge, required when the relay asks for it.
    V2,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayVariables {
    email: String,
    name: String,
    message: String,
    recaptcha_token: String,
    recaptcha_version: CaptchaVersion,
}

/// Body of a relay POST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayRequest {
    query: &'static str,
    variables: RelayVariables,
}

impl RelayRequest {
    #[must_use]
    pub fn new(message: &ValidMessage, token: impl Into<String>, version: CaptchaVersion) -> Self {
        Self {
            query: SEND_MESSAGE_MUTATION,
            variables: RelayVariables {
                email: message.email.clone(),
                name: message.name.clone(),
                message: message.message.clone(),
                recaptcha_token: token.into(),
                recaptcha_version: version,
            },
        }
    }

    #[must_use]
    pub const fn version(&self) -> CaptchaVersion {
        self.variables.recaptcha_version
    }

    pub fn to_json(&self) -> Result<String, FolioError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// `sendMessage` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SendMessageResult {
    pub is_bot: bool,
    pub need_verify: bool,
    pub success: bool,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RelayData {
    pub send_message: Option<SendMessageResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GraphQlError {
    pub message: String,
}

/// Relay response envelope.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RelayResponse {
    pub data: Option<RelayData>,
    pub errors: Vec<GraphQlError>,
    pub error: Option<serde_json::Value>,
}

/// What the form should do with a relay answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Sent { message: String },
    NeedsVerification,
    Failed { message: String },
}

impl RelayResponse {
    pub fn parse(body: &str) -> Result<Self, FolioError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Interpret the response to a request made with `version`.
    #[must_use]
    pub fn outcome(&self, version: CaptchaVersion) -> RelayOutcome {
        let result = self.data.as_ref().and_then(|d| d.send_message.as_ref());
        let reported = result.and_then(|r| r.message.clone()).filter(|m| !m.is_empty());

        let transport_error = self.error.as_ref().is_some_and(|e| !e.is_null());
        if transport_error || !self.errors.is_empty() {
            let message = reported
                .or_else(|| self.errors.first().map(|e| e.message.clone()))
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| SEND_FAILED.to_owned());
            return RelayOutcome::Failed { message };
        }
        let Some(result) = result else {
            return RelayOutcome::Failed {
                message: SEND_FAILED.to_owned(),
            };
        };
        if result.kind.as_deref() == Some("error") {
            return RelayOutcome::Failed {
                message: reported.unwrap_or_else(|| SEND_FAILED.to_owned()),
            };
        }
        if version == CaptchaVersion::V3 && result.need_verify {
            return RelayOutcome::NeedsVerification;
        }
        if result.success {
            return RelayOutcome::Sent {
                message: reported.unwrap_or_else(|| SENT.to_owned()),
            };
        }
        let fallback = match version {
            CaptchaVersion::V3 => SEND_FAILED,
            CaptchaVersion::V2 => VERIFY_FAILED,
        };
        RelayOutcome::Failed {
            message: reported.unwrap_or_else(|| fallback.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// Dismissible toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub text: String,
}

/// Where the form is in its submit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    Editing,
    Submitting(CaptchaVersion),
    AwaitingVerification,
}

/// Contact form state: draft, validation errors, submit phase, notices.
#[derive(Debug, Clone)]
pub struct ContactForm {
    draft: ContactDraft,
    errors: Vec<FieldError>,
    phase: FormPhase,
    pending: Option<ValidMessage>,
    notices: Vec<Notice>,
    next_notice: u64,
}

impl Default for ContactForm {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactForm {
    #[must_use]
    pub fn new() -> Self {
        Self {
            draft: ContactDraft::default(),
            errors: Vec::new(),
            phase: FormPhase::Editing,
            pending: None,
            notices: Vec::new(),
            next_notice: 1,
        }
    }

    #[must_use]
    pub const fn draft(&self) -> &ContactDraft {
        &self.draft
    }

    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        self.draft.set(field, value);
        self.errors.retain(|e| e.field != field);
    }

    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        &self.errors
    }

    #[must_use]
    pub const fn phase(&self) -> FormPhase {
        self.phase
    }

    #[must_use]
    pub const fn is_submitting(&self) -> bool {
        matches!(self.phase, FormPhase::Submitting(_))
    }

    /// Whether the interactive challenge should be shown.
    #[must_use]
    pub const fn needs_verification(&self) -> bool {
        matches!(
            self.phase,
            FormPhase::AwaitingVerification | FormPhase::Submitting(CaptchaVersion::V2)
        )
    }

    /// Validate and build the first (score-based) submission.
    ///
    /// Returns `None` while a request is in flight or when validation fails;
    /// in the latter case [`Self::field_errors`] lists the problems.
    pub fn submit(&mut self, token: &str) -> Option<RelayRequest> {
        if self.is_submitting() {
            return None;
        }
        match self.draft.validate() {
            Ok(valid) => {
                self.errors.clear();
                let request = RelayRequest::new(&valid, token, CaptchaVersion::V3);
                self.pending = Some(valid);
                self.phase = FormPhase::Submitting(CaptchaVersion::V3);
                Some(request)
            }
            Err(errors) => {
                self.errors = errors;
                None
            }
        }
    }

    /// Resubmit with an interactive challenge token.
    pub fn verify(&mut self, token: &str) -> Option<RelayRequest> {
        if self.phase != FormPhase::AwaitingVerification || token.is_empty() {
            return None;
        }
        let valid = self.pending.as_ref()?;
        let request = RelayRequest::new(valid, token, CaptchaVersion::V2);
        self.phase = FormPhase::Submitting(CaptchaVersion::V2);
        Some(request)
    }

    /// Apply the relay's answer to the in-flight request.
    pub fn complete(&mut self, outcome: RelayOutcome) {
        let FormPhase::Submitting(version) = self.phase else {
            return;
        };
        match outcome {
            RelayOutcome::Sent { message } => {
                self.draft = ContactDraft::default();
                self.pending = None;
                self.phase = FormPhase::Editing;
                self.notify(NoticeLevel::Success, message);
            }
            RelayOutcome::NeedsVerification => {
                self.phase = FormPhase::AwaitingVerification;
                self.notify(NoticeLevel::Warning, VERIFY_PROMPT.to_owned());
            }
            RelayOutcome::Failed { message } => {
                self.phase = match version {
                    CaptchaVersion::V3 => FormPhase::Editing,
                    CaptchaVersion::V2 => FormPhase::AwaitingVerification,
                };
                self.notify(NoticeLevel::Error, message);
            }
        }
    }

    /// The request never produced a response (network error, bad body).
    pub fn transport_failed(&mut self, message: Option<&str>) {
        let message = message
            .filter(|m| !m.is_empty())
            .unwrap_or(SEND_FAILED)
            .to_owned();
        self.complete(RelayOutcome::Failed { message });
    }

    #[must_use]
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    fn notify(&mut self, level: NoticeLevel, text: String) {
        let id = self.next_notice;
        self.next_notice += 1;
        self.notices.push(Notice { id, level, text });
    }
}

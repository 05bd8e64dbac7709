//! Wire types of the mocked API.
//!
//! Entities (threads, messages, assistants, files, API keys) use the JSON shape of the
//! OpenAI-compatible API the front-end talks to, so fixtures can be written as JSON and
//! responses can be decoded by test code with plain `serde`.

use serde::{Deserialize, Serialize};

/// Message role indicating who sent the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Message typed by the user
    User,
    /// Message generated by the assistant
    Assistant,
}

/// Text payload of a content part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<serde_json::Value>,
}

/// One part of a message's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: TextContent },
    ImageFile { image_file: ImageFile },
}

/// Reference to an uploaded image used inside a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFile {
    pub file_id: String,
}

impl ContentPart {
    /// Create a text part
    pub fn text(value: impl Into<String>) -> Self {
        ContentPart::Text {
            text: TextContent {
                value: value.into(),
                annotations: Vec::new(),
            },
        }
    }

    /// Text of the part, if it is a text part
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(&text.value),
            ContentPart::ImageFile { .. } => None,
        }
    }
}

/// Metadata stored on a thread
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadMetadata {
    /// Label shown in the sidebar; user-editable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    #[serde(default = "Thread::object")]
    pub object: String,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub metadata: ThreadMetadata,
}

impl Thread {
    fn object() -> String {
        "thread".to_string()
    }

    /// Create a thread with the given id and label
    pub fn new(id: impl Into<String>, label: impl Into<String>, created_at: u64) -> Self {
        Self {
            id: id.into(),
            object: Self::object(),
            created_at,
            metadata: ThreadMetadata {
                label: Some(label.into()),
            },
        }
    }

    /// The sidebar label, if any
    pub fn label(&self) -> Option<&str> {
        self.metadata.label.as_deref()
    }
}

/// A message in a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default = "Message::object")]
    pub object: String,
    #[serde(default)]
    pub created_at: u64,
    pub thread_id: String,
    pub role: Role,
    pub content: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
}

impl Message {
    fn object() -> String {
        "thread.message".to_string()
    }

    /// Create a single-part text message
    pub fn new(
        id: impl Into<String>,
        thread_id: impl Into<String>,
        role: Role,
        text: impl Into<String>,
        created_at: u64,
    ) -> Self {
        Self {
            id: id.into(),
            object: Self::object(),
            created_at,
            thread_id: thread_id.into(),
            role,
            content: vec![ContentPart::text(text)],
            assistant_id: None,
        }
    }

    /// Concatenated text of every text part
    pub fn text(&self) -> String {
        self.content.iter().filter_map(ContentPart::as_text).collect()
    }
}

/// An assistant definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assistant {
    pub id: String,
    #[serde(default = "Assistant::object")]
    pub object: String,
    #[serde(default)]
    pub created_at: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Files attached to the assistant; references only
    #[serde(default)]
    pub file_ids: Vec<String>,
}

impl Assistant {
    fn object() -> String {
        "assistant".to_string()
    }
}

/// An uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileObject {
    pub id: String,
    #[serde(default = "FileObject::object")]
    pub object: String,
    pub bytes: u64,
    #[serde(default)]
    pub created_at: u64,
    pub filename: String,
    pub purpose: String,
    #[serde(default = "FileObject::processed")]
    pub status: String,
}

impl FileObject {
    fn object() -> String {
        "file".to_string()
    }

    fn processed() -> String {
        "processed".to_string()
    }

    /// Create a processed file with the `assistants` purpose
    pub fn new(id: impl Into<String>, filename: impl Into<String>, bytes: u64, created_at: u64) -> Self {
        Self {
            id: id.into(),
            object: Self::object(),
            bytes,
            created_at,
            filename: filename.into(),
            purpose: "assistants".to_string(),
            status: Self::processed(),
        }
    }
}

/// An API key.
///
/// `api_key` holds the full secret only in the response to the create call; every other
/// read carries the redacted form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub name: String,
    pub api_key: String,
    pub created_at: u64,
    pub expires_at: u64,
}

/// Paginated list envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub object: String,
    pub data: Vec<T>,
    #[serde(default)]
    pub first_id: Option<String>,
    #[serde(default)]
    pub last_id: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

impl<T> ListResponse<T> {
    /// Wrap a full, single-page list
    pub fn new(data: Vec<T>, id_of: impl Fn(&T) -> &str) -> Self {
        let first_id = data.first().map(|item| id_of(item).to_string());
        let last_id = data.last().map(|item| id_of(item).to_string());
        Self {
            object: "list".to_string(),
            data,
            first_id,
            last_id,
            has_more: false,
        }
    }
}

/// Result of deleting one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionStatus {
    pub id: String,
    pub object: String,
    pub deleted: bool,
}

impl DeletionStatus {
    pub fn new(id: impl Into<String>, object: &str, deleted: bool) -> Self {
        Self {
            id: id.into(),
            object: format!("{object}.deleted"),
            deleted,
        }
    }
}

/// Result of a batch file deletion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDeletionStatus {
    pub object: String,
    pub data: Vec<DeletionStatus>,
    /// Number of files actually removed
    pub deleted: usize,
}

/// Message content as sent by a client: either a plain string or a list of parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContentInput {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContentInput {
    pub fn into_parts(self) -> Vec<ContentPart> {
        match self {
            MessageContentInput::Text(text) => vec![ContentPart::text(text)],
            MessageContentInput::Parts(parts) => parts,
        }
    }

    /// True when there is no text and no other part
    pub fn is_blank(&self) -> bool {
        match self {
            MessageContentInput::Text(text) => text.trim().is_empty(),
            MessageContentInput::Parts(parts) => parts
                .iter()
                .all(|part| part.as_text().is_some_and(|text| text.trim().is_empty())),
        }
    }
}

/// Body of `POST /threads/{id}/messages` and of each initial message of a new thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: Role,
    pub content: MessageContentInput,
}

/// Body of `POST /threads`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewThread {
    #[serde(default)]
    pub messages: Vec<NewMessage>,
    #[serde(default)]
    pub metadata: ThreadMetadata,
}

/// Body of `POST /threads/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModifyThread {
    #[serde(default)]
    pub metadata: ThreadMetadata,
}

/// Body of `POST /threads/{id}/runs`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub assistant_id: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

/// One message of a stateless chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Body of `POST /chat/completions`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
}

/// Body of `POST /files`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadFile {
    pub filename: String,
    #[serde(default)]
    pub purpose: Option<String>,
    /// Base64-encoded file content
    #[serde(default)]
    pub content: Option<String>,
    /// Declared size, used when no content is sent
    #[serde(default)]
    pub bytes: Option<u64>,
}

/// Body of `DELETE /files`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteFiles {
    pub ids: Vec<String>,
}

/// Body of `POST /files/affected-assistants`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AffectedAssistantsRequest {
    pub file_ids: Vec<String>,
}

/// Body of `POST /assistants`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAssistant {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub file_ids: Vec<String>,
}

/// Body of `POST /assistants/{id}`; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModifyAssistant {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub file_ids: Option<Vec<String>>,
}

/// Body of `POST /api-keys`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateApiKeyRequest {
    #[serde(default)]
    pub name: Option<String>,
    /// Unix seconds; defaults to thirty days from now
    #[serde(default)]
    pub expires_at: Option<u64>,
}

/// Body of `POST /api-keys/{id}`; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModifyApiKeyRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub expires_at: Option<u64>,
}

//! In-memory fixture store.
//!
//! Holds the threads, messages, files, assistants and API keys that the mock API serves.
//! Setters replace a whole collection; there is no merging, so a test always sees exactly
//! the state it programmed. Write methods are what the store-backed routes use to emulate
//! the real service.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::types::{
    ApiKey, Assistant, ContentPart, FileObject, Message, ModifyApiKeyRequest, ModifyAssistant,
    NewAssistant, Role, Thread, ThreadMetadata,
};

/// Seconds since the Unix epoch
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Generate a fresh id such as `thread_5f0c…`
pub fn new_id(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4().simple())
}

/// Redact a key secret to its prefix and last four characters
pub fn redact_secret(secret: &str) -> String {
    let prefix_len = secret.find('_').map(|i| i + 1).unwrap_or(0);
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{}...{}", &secret[..prefix_len], tail)
}

/// Fixture state for one test
#[derive(Debug, Default)]
pub struct FixtureStore {
    threads: Vec<Thread>,
    messages: Vec<Message>,
    files: Vec<FileObject>,
    assistants: Vec<Assistant>,
    api_keys: Vec<ApiKey>,
    issued_secrets: HashSet<String>,
}

impl FixtureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every thread
    pub fn set_threads(&mut self, threads: impl IntoIterator<Item = Thread>) {
        self.threads = threads.into_iter().collect();
    }

    /// Replace every message
    pub fn set_messages(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages = messages.into_iter().collect();
    }

    /// Replace every file
    pub fn set_files(&mut self, files: impl IntoIterator<Item = FileObject>) {
        self.files = files.into_iter().collect();
    }

    /// Replace every assistant
    pub fn set_assistants(&mut self, assistants: impl IntoIterator<Item = Assistant>) {
        self.assistants = assistants.into_iter().collect();
    }

    /// Replace every API key. Secrets are redacted on the way in.
    pub fn set_api_keys(&mut self, keys: impl IntoIterator<Item = ApiKey>) {
        self.api_keys = keys
            .into_iter()
            .map(|mut key| {
                if !key.api_key.contains("...") {
                    self.issued_secrets.insert(key.api_key.clone());
                    key.api_key = redact_secret(&key.api_key);
                }
                key
            })
            .collect();
    }

    /// Empty every collection
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn thread(&self, id: &str) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id == id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages of one thread, in creation order
    pub fn messages_for(&self, thread_id: &str) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .collect()
    }

    pub fn files(&self) -> &[FileObject] {
        &self.files
    }

    pub fn file(&self, id: &str) -> Option<&FileObject> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn assistants(&self) -> &[Assistant] {
        &self.assistants
    }

    pub fn assistant(&self, id: &str) -> Option<&Assistant> {
        self.assistants.iter().find(|a| a.id == id)
    }

    /// API keys, redacted
    pub fn api_keys(&self) -> &[ApiKey] {
        &self.api_keys
    }

    pub fn api_key(&self, id: &str) -> Option<&ApiKey> {
        self.api_keys.iter().find(|k| k.id == id)
    }

    /// Create a thread together with its initial messages.
    ///
    /// Without an explicit label the thread is labelled with the first message's text.
    pub fn create_thread(
        &mut self,
        label: Option<String>,
        initial: Vec<(Role, Vec<ContentPart>)>,
    ) -> Thread {
        let now = unix_now();
        let id = new_id("thread_");

        let messages: Vec<Message> = initial
            .into_iter()
            .map(|(role, content)| Message {
                id: new_id("msg_"),
                object: "thread.message".to_string(),
                created_at: now,
                thread_id: id.clone(),
                role,
                content,
                assistant_id: None,
            })
            .collect();

        let label = label
            .filter(|l| !l.trim().is_empty())
            .or_else(|| messages.first().map(Message::text))
            .unwrap_or_else(|| "New Chat".to_string());

        let thread = Thread {
            id,
            object: "thread".to_string(),
            created_at: now,
            metadata: ThreadMetadata { label: Some(label) },
        };

        self.threads.push(thread.clone());
        self.messages.extend(messages);
        thread
    }

    /// Change a thread's label
    pub fn relabel_thread(&mut self, id: &str, label: String) -> Option<Thread> {
        let thread = self.threads.iter_mut().find(|t| t.id == id)?;
        thread.metadata.label = Some(label);
        Some(thread.clone())
    }

    /// Delete a thread and all of its messages. Returns `false` if the id was unknown.
    pub fn delete_thread(&mut self, id: &str) -> bool {
        let before = self.threads.len();
        self.threads.retain(|t| t.id != id);
        if self.threads.len() == before {
            return false;
        }
        self.messages.retain(|m| m.thread_id != id);
        true
    }

    /// Append a message to an existing thread
    pub fn append_message(
        &mut self,
        thread_id: &str,
        role: Role,
        content: Vec<ContentPart>,
        assistant_id: Option<String>,
    ) -> Option<Message> {
        self.thread(thread_id)?;
        let message = Message {
            id: new_id("msg_"),
            object: "thread.message".to_string(),
            created_at: unix_now(),
            thread_id: thread_id.to_string(),
            role,
            content,
            assistant_id,
        };
        self.messages.push(message.clone());
        Some(message)
    }

    /// Record an uploaded file
    pub fn insert_file(&mut self, filename: String, purpose: String, bytes: u64) -> FileObject {
        let file = FileObject {
            id: new_id("file-"),
            object: "file".to_string(),
            bytes,
            created_at: unix_now(),
            filename,
            purpose,
            status: "processed".to_string(),
        };
        self.files.push(file.clone());
        file
    }

    /// Delete a file. Assistants referencing it are left untouched.
    pub fn delete_file(&mut self, id: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f.id != id);
        self.files.len() != before
    }

    /// Delete several files; one `(id, deleted)` pair per requested id
    pub fn delete_files(&mut self, ids: &[String]) -> Vec<(String, bool)> {
        ids.iter()
            .map(|id| (id.clone(), self.delete_file(id)))
            .collect()
    }

    /// Assistants that reference any of `file_ids`
    pub fn affected_assistants(&self, file_ids: &[String]) -> Vec<Assistant> {
        self.assistants
            .iter()
            .filter(|a| a.file_ids.iter().any(|f| file_ids.contains(f)))
            .cloned()
            .collect()
    }

    /// Assistants whose name, description or instructions contain `query`, ignoring case
    pub fn search_assistants(&self, query: &str) -> Vec<&Assistant> {
        let query = query.to_lowercase();
        self.assistants
            .iter()
            .filter(|a| {
                [Some(&a.name), a.description.as_ref(), a.instructions.as_ref()]
                    .into_iter()
                    .flatten()
                    .any(|field| field.to_lowercase().contains(&query))
            })
            .collect()
    }

    /// Store a new assistant
    pub fn insert_assistant(&mut self, input: NewAssistant, default_model: &str) -> Assistant {
        let assistant = Assistant {
            id: new_id("asst_"),
            object: "assistant".to_string(),
            created_at: unix_now(),
            name: input.name,
            description: input.description,
            instructions: input.instructions,
            model: input.model.unwrap_or_else(|| default_model.to_string()),
            avatar: input.avatar,
            file_ids: input.file_ids,
        };
        self.assistants.push(assistant.clone());
        assistant
    }

    /// Apply the present fields of `changes` to an assistant
    pub fn update_assistant(&mut self, id: &str, changes: ModifyAssistant) -> Option<Assistant> {
        let assistant = self.assistants.iter_mut().find(|a| a.id == id)?;
        if let Some(name) = changes.name {
            assistant.name = name;
        }
        if let Some(description) = changes.description {
            assistant.description = Some(description);
        }
        if let Some(instructions) = changes.instructions {
            assistant.instructions = Some(instructions);
        }
        if let Some(avatar) = changes.avatar {
            assistant.avatar = Some(avatar);
        }
        if let Some(file_ids) = changes.file_ids {
            assistant.file_ids = file_ids;
        }
        Some(assistant.clone())
    }

    pub fn delete_assistant(&mut self, id: &str) -> bool {
        let before = self.assistants.len();
        self.assistants.retain(|a| a.id != id);
        self.assistants.len() != before
    }

    /// Issue a new key. The returned value carries the full secret; the stored copy does not.
    pub fn issue_api_key(&mut self, name: String, expires_at: u64, prefix: &str) -> ApiKey {
        let secret = loop {
            let candidate = format!("{}{}", prefix, Uuid::new_v4().simple());
            if self.issued_secrets.insert(candidate.clone()) {
                break candidate;
            }
        };

        let key = ApiKey {
            id: Uuid::new_v4().to_string(),
            name,
            api_key: secret,
            created_at: unix_now(),
            expires_at,
        };
        self.api_keys.push(ApiKey {
            api_key: redact_secret(&key.api_key),
            ..key.clone()
        });
        key
    }

    /// Rename or re-date a key
    pub fn update_api_key(&mut self, id: &str, changes: ModifyApiKeyRequest) -> Option<ApiKey> {
        let key = self.api_keys.iter_mut().find(|k| k.id == id)?;
        if let Some(name) = changes.name.filter(|n| !n.is_empty()) {
            key.name = name;
        }
        if let Some(expires_at) = changes.expires_at {
            key.expires_at = expires_at;
        }
        Some(key.clone())
    }

    pub fn revoke_api_key(&mut self, id: &str) -> bool {
        let before = self.api_keys.len();
        self.api_keys.retain(|k| k.id != id);
        self.api_keys.len() != before
    }
}

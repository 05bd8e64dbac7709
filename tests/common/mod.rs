//! Small stand-ins for the front-end pages that the mock API is meant to drive.
//!
//! Each driver talks to a [`MockApi`] exactly the way the page talks to the real service
//! and records what the user would see: toasts, the transcript, loaded lists.

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine as _};
use leapfrog_mock::{
    types::{ApiKey, Assistant, FileObject, ListResponse, Message, NewAssistant, Thread},
    CompletionAccumulator, InterceptedRequest, MockApi, MockResponse,
};
use serde_json::json;

pub async fn send(api: &MockApi, request: InterceptedRequest) -> MockResponse {
    api.send(request).await.expect("mock dispatch failed")
}

/// Read a streamed reply to the end, as the chat page does
pub async fn read_stream(response: &MockResponse) -> leapfrog_mock::Result<String> {
    match response.event_stream_events() {
        Some(stream) => CompletionAccumulator::accumulate(stream.into_async()).await,
        None => response.error_for_status().and_then(|_| {
            Err(leapfrog_mock::Error::InvalidResponse("expected a stream".to_string()))
        }),
    }
}

/// Chat page: sidebar, message input and transcript
pub struct ChatPage {
    api: MockApi,
    pub active_thread: Option<String>,
    pub threads: Vec<Thread>,
    pub transcript: Vec<Message>,
    pub streamed: Vec<String>,
    pub toasts: Vec<String>,
}

impl ChatPage {
    pub async fn open(api: &MockApi) -> Self {
        let mut page = Self {
            api: api.clone(),
            active_thread: None,
            threads: api.threads(),
            transcript: Vec::new(),
            streamed: Vec::new(),
            toasts: Vec::new(),
        };
        page.threads.sort_by_key(|t| std::cmp::Reverse(t.created_at));
        page
    }

    /// Type `text` and press send
    pub async fn submit(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }

        let thread_id = match self.active_thread.clone() {
            Some(id) => {
                let request = InterceptedRequest::post(&format!("/threads/{id}/messages"))
                    .with_json(json!({"role": "user", "content": text}));
                if send(&self.api, request).await.json_body::<Message>().is_err() {
                    self.toasts.push("Error saving message.".to_string());
                    return;
                }
                id
            }
            None => {
                let request = InterceptedRequest::post("/threads").with_json(json!({
                    "messages": [{"role": "user", "content": text}]
                }));
                match send(&self.api, request).await.json_body::<Thread>() {
                    Ok(thread) => {
                        self.threads.insert(0, thread.clone());
                        self.active_thread = Some(thread.id.clone());
                        thread.id
                    }
                    Err(_) => {
                        self.toasts.push("Error saving thread.".to_string());
                        return;
                    }
                }
            }
        };

        let run = InterceptedRequest::post(&format!("/threads/{thread_id}/runs"))
            .with_json(json!({"stream": true}));
        let response = send(&self.api, run).await;
        match read_stream(&response).await {
            Ok(text) => self.streamed.push(text),
            Err(_) => self.toasts.push("Error getting assistant response.".to_string()),
        }

        self.switch_to(&thread_id).await;
    }

    /// Click a thread in the sidebar
    pub async fn switch_to(&mut self, thread_id: &str) {
        let request = InterceptedRequest::get(&format!("/threads/{thread_id}/messages"));
        match send(&self.api, request).await.json_body::<ListResponse<Message>>() {
            Ok(list) => {
                self.active_thread = Some(thread_id.to_string());
                self.transcript = list.data;
            }
            Err(_) => self.toasts.push("Error loading thread.".to_string()),
        }
    }

    /// Rename a thread from the sidebar menu
    pub async fn rename(&mut self, thread_id: &str, label: &str) {
        let request = InterceptedRequest::post(&format!("/threads/{thread_id}"))
            .with_json(json!({"metadata": {"label": label}}));
        match send(&self.api, request).await.json_body::<Thread>() {
            Ok(updated) => {
                if let Some(thread) = self.threads.iter_mut().find(|t| t.id == updated.id) {
                    *thread = updated;
                }
            }
            Err(_) => self.toasts.push("Error renaming thread.".to_string()),
        }
    }

    /// Delete a thread from the sidebar menu
    pub async fn delete(&mut self, thread_id: &str) {
        let request = InterceptedRequest::delete(&format!("/threads/{thread_id}"));
        if send(&self.api, request).await.error_for_status().is_err() {
            self.toasts.push("Error deleting conversation.".to_string());
            return;
        }
        self.threads.retain(|t| t.id != thread_id);
        if self.active_thread.as_deref() == Some(thread_id) {
            self.active_thread = None;
            self.transcript.clear();
        }
        self.toasts.push("Conversation Deleted".to_string());
    }

    pub fn labels(&self) -> Vec<&str> {
        self.threads.iter().filter_map(Thread::label).collect()
    }

    pub fn count_toasts(&self, text: &str) -> usize {
        self.toasts.iter().filter(|t| t.as_str() == text).count()
    }
}

/// File management page
pub struct FileManagementPage {
    api: MockApi,
    pub files: Vec<FileObject>,
    pub toasts: Vec<String>,
    pub affected: Vec<String>,
}

impl FileManagementPage {
    pub async fn open(api: &MockApi) -> Self {
        let mut page = Self {
            api: api.clone(),
            files: Vec::new(),
            toasts: Vec::new(),
            affected: Vec::new(),
        };
        page.reload().await;
        page
    }

    pub async fn reload(&mut self) {
        let response = send(&self.api, InterceptedRequest::get("/files")).await;
        if let Ok(list) = response.json_body::<ListResponse<FileObject>>() {
            self.files = list.data;
        }
    }

    pub async fn upload(&mut self, filename: &str, content: &[u8]) {
        let request = InterceptedRequest::post("/files").with_json(json!({
            "filename": filename,
            "purpose": "assistants",
            "content": STANDARD.encode(content),
        }));
        match send(&self.api, request).await.json_body::<FileObject>() {
            Ok(file) => {
                self.files.push(file);
                self.toasts.push("Imported File".to_string());
            }
            Err(_) => self.toasts.push("Import Failed".to_string()),
        }
    }

    /// Select files by name and confirm deletion
    pub async fn delete(&mut self, filenames: &[&str]) {
        let ids: Vec<String> = self
            .files
            .iter()
            .filter(|f| filenames.contains(&f.filename.as_str()))
            .map(|f| f.id.clone())
            .collect();

        let check = InterceptedRequest::post("/files/affected-assistants")
            .with_json(json!({"file_ids": ids}));
        if let Ok(list) = send(&self.api, check).await.json_body::<ListResponse<Assistant>>() {
            self.affected = list.data.into_iter().map(|a| a.name).collect();
        }

        let plural = ids.len() > 1;
        let request = InterceptedRequest::delete("/files").with_json(json!({"ids": ids}));
        match send(&self.api, request).await.error_for_status() {
            Ok(()) => {
                self.files.retain(|f| !ids.contains(&f.id));
                self.toasts
                    .push(if plural { "Files Deleted" } else { "File Deleted" }.to_string());
            }
            Err(_) => self.toasts.push(
                if plural { "Error Deleting Files" } else { "Error Deleting File" }.to_string(),
            ),
        }
    }

    pub fn filenames(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.filename.as_str()).collect()
    }

    pub fn count_toasts(&self, text: &str) -> usize {
        self.toasts.iter().filter(|t| t.as_str() == text).count()
    }
}

/// Assistants page with its create and edit forms
pub struct AssistantsPage {
    api: MockApi,
    pub toasts: Vec<String>,
}

impl AssistantsPage {
    pub fn open(api: &MockApi) -> Self {
        Self {
            api: api.clone(),
            toasts: Vec::new(),
        }
    }

    pub async fn create(&mut self, input: &NewAssistant) -> Option<Assistant> {
        let request = InterceptedRequest::post("/assistants").with_body(input).ok()?;
        let response = send(&self.api, request).await;
        match response.json_body::<Assistant>() {
            Ok(assistant) => {
                self.toasts.push("Assistant Created.".to_string());
                Some(assistant)
            }
            Err(e) if e.status_code().is_some_and(|s| s.as_u16() == 400) => {
                self.toasts.push(e.to_string());
                None
            }
            Err(_) => {
                self.toasts.push("Error Creating Assistant".to_string());
                None
            }
        }
    }

    pub async fn edit(&mut self, id: &str, changes: serde_json::Value) -> Option<Assistant> {
        let request = InterceptedRequest::post(&format!("/assistants/{id}")).with_json(changes);
        match send(&self.api, request).await.json_body::<Assistant>() {
            Ok(assistant) => {
                self.toasts.push("Assistant Updated.".to_string());
                Some(assistant)
            }
            Err(_) => {
                self.toasts.push("Error Updating Assistant".to_string());
                None
            }
        }
    }

    pub async fn delete(&mut self, id: &str) {
        let request = InterceptedRequest::delete(&format!("/assistants/{id}"));
        if send(&self.api, request).await.error_for_status().is_ok() {
            self.toasts.push("Assistant Deleted.".to_string());
        }
    }

    pub async fn search(&self, query: &str) -> Vec<String> {
        let query: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let request = InterceptedRequest::get(&format!("/assistants?search={query}"));
        send(&self.api, request)
            .await
            .json_body::<ListResponse<Assistant>>()
            .map(|list| list.data.into_iter().map(|a| a.name).collect())
            .unwrap_or_default()
    }
}

/// Outcome of submitting the new API key form
#[derive(Debug)]
pub enum ApiKeyFormResult {
    Created(ApiKey),
    Failed(u16),
}

/// Submit the new API key form, optionally with a logged-in session
pub async fn submit_api_key_form(
    api: &MockApi,
    session: Option<&str>,
    body: serde_json::Value,
) -> ApiKeyFormResult {
    let mut request = InterceptedRequest::post("/api-keys").with_json(body);
    if let Some(token) = session {
        request = request.with_bearer(token).expect("valid token");
    }
    let response = send(api, request).await;
    match response.json_body::<ApiKey>() {
        Ok(key) => ApiKeyFormResult::Created(key),
        Err(_) => ApiKeyFormResult::Failed(response.status.as_u16()),
    }
}

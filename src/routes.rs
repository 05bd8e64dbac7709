//! Store-backed routes.
//!
//! The default responder of the mock API: recognises the emulated REST surface and answers
//! it from the [`FixtureStore`], validating bodies the way the real service does.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use mime::Mime;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::{
    config::HarnessConfig,
    interceptor::InterceptedRequest,
    response::MockResponse,
    store::{new_id, unix_now, FixtureStore},
    streaming::{CompletionAccumulator, CompletionScript},
    types::{
        AffectedAssistantsRequest, BatchDeletionStatus, ChatCompletionRequest,
        CreateApiKeyRequest, DeleteFiles, DeletionStatus, ListResponse, ModifyApiKeyRequest,
        ModifyAssistant, ModifyThread, NewAssistant, NewMessage, NewThread, Role, RunRequest,
        UploadFile,
    },
};

/// A recognised route of the emulated API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    CreateThread,
    GetThread(String),
    ModifyThread(String),
    DeleteThread(String),
    ListMessages(String),
    CreateMessage(String),
    CreateRun(String),
    ChatCompletion,
    ListFiles,
    UploadFile,
    DeleteFiles,
    AffectedAssistants,
    GetFile(String),
    DeleteFile(String),
    ListAssistants,
    CreateAssistant,
    GetAssistant(String),
    ModifyAssistant(String),
    DeleteAssistant(String),
    CreateApiKey,
    ListApiKeys,
    ModifyApiKey(String),
    RevokeApiKey(String),
}

impl Route {
    /// Recognise `method path`, where `path` is relative to the API base path
    pub fn recognize(method: &Method, path: &str) -> Option<Route> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let route = match (method.as_str(), segments.as_slice()) {
            ("POST", ["threads"]) => Route::CreateThread,
            ("GET", ["threads", t]) => Route::GetThread(t.to_string()),
            ("POST", ["threads", t]) => Route::ModifyThread(t.to_string()),
            ("DELETE", ["threads", t]) => Route::DeleteThread(t.to_string()),
            ("GET", ["threads", t, "messages"]) => Route::ListMessages(t.to_string()),
            ("POST", ["threads", t, "messages"]) => Route::CreateMessage(t.to_string()),
            ("POST", ["threads", t, "runs"]) => Route::CreateRun(t.to_string()),
            ("POST", ["chat", "completions"]) => Route::ChatCompletion,
            ("GET", ["files"]) => Route::ListFiles,
            ("POST", ["files"]) => Route::UploadFile,
            ("DELETE", ["files"]) => Route::DeleteFiles,
            ("POST", ["files", "affected-assistants"]) => Route::AffectedAssistants,
            ("GET", ["files", f]) => Route::GetFile(f.to_string()),
            ("DELETE", ["files", f]) => Route::DeleteFile(f.to_string()),
            ("GET", ["assistants"]) => Route::ListAssistants,
            ("POST", ["assistants"]) => Route::CreateAssistant,
            ("GET", ["assistants", a]) => Route::GetAssistant(a.to_string()),
            ("POST", ["assistants", a]) => Route::ModifyAssistant(a.to_string()),
            ("DELETE", ["assistants", a]) => Route::DeleteAssistant(a.to_string()),
            ("POST", ["api-keys"]) => Route::CreateApiKey,
            ("GET", ["api-keys"]) => Route::ListApiKeys,
            ("POST", ["api-keys", k]) => Route::ModifyApiKey(k.to_string()),
            ("DELETE", ["api-keys", k]) => Route::RevokeApiKey(k.to_string()),
            _ => return None,
        };
        Some(route)
    }
}

/// Everything a store-backed route may read or write
pub(crate) struct RouteContext<'a> {
    pub store: &'a mut FixtureStore,
    pub config: &'a HarnessConfig,
    /// Reply scripted by a scenario, if any
    pub completion: Option<&'a CompletionScript>,
    /// Set by a streamed run; the reply is stored once the client finishes reading
    pub pending_reply: Option<PendingReply>,
}

/// Where a streamed run's reply goes once its stream ends
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingReply {
    pub thread_id: String,
    pub assistant_id: Option<String>,
}

impl RouteContext<'_> {
    fn completion_script(&self, model: Option<&str>) -> CompletionScript {
        let script = match self.completion {
            Some(script) => script.clone(),
            None => CompletionScript::new(self.config.default_completion.clone())
                .chunking(self.config.chunking.clone())
                .with_model(self.config.default_model.clone()),
        };
        let script = script.with_id(new_id("chatcmpl-")).with_created(unix_now());
        match model {
            Some(model) => script.with_model(model),
            None => script,
        }
    }

    /// Answer a recognised route
    pub fn handle(&mut self, route: Route, request: &InterceptedRequest) -> MockResponse {
        match route {
            Route::CreateThread => self.create_thread(request),
            Route::GetThread(id) => match self.store.thread(&id) {
                Some(thread) => ok(thread),
                None => not_found("thread", &id),
            },
            Route::ModifyThread(id) => self.modify_thread(&id, request),
            Route::DeleteThread(id) => {
                let deleted = self.store.delete_thread(&id);
                ok(&DeletionStatus::new(id, "thread", deleted))
            }
            Route::ListMessages(id) => {
                if self.store.thread(&id).is_none() {
                    return not_found("thread", &id);
                }
                let messages: Vec<_> = self.store.messages_for(&id).into_iter().cloned().collect();
                ok(&ListResponse::new(messages, |m| m.id.as_str()))
            }
            Route::CreateMessage(id) => self.create_message(&id, request),
            Route::CreateRun(id) => self.create_run(&id, request),
            Route::ChatCompletion => self.chat_completion(request),
            Route::ListFiles => ok(&ListResponse::new(self.store.files().to_vec(), |f| f.id.as_str())),
            Route::UploadFile => self.upload_file(request),
            Route::DeleteFiles => self.delete_files(request),
            Route::AffectedAssistants => {
                let body: AffectedAssistantsRequest = match decode(request) {
                    Ok(body) => body,
                    Err(response) => return response,
                };
                let affected = self.store.affected_assistants(&body.file_ids);
                ok(&ListResponse::new(affected, |a| a.id.as_str()))
            }
            Route::GetFile(id) => match self.store.file(&id) {
                Some(file) => ok(file),
                None => not_found("file", &id),
            },
            Route::DeleteFile(id) => {
                let deleted = self.store.delete_file(&id);
                ok(&DeletionStatus::new(id, "file", deleted))
            }
            Route::ListAssistants => {
                let assistants: Vec<_> = match request.query_param("search") {
                    Some(query) => self.store.search_assistants(query).into_iter().cloned().collect(),
                    None => self.store.assistants().to_vec(),
                };
                ok(&ListResponse::new(assistants, |a| a.id.as_str()))
            }
            Route::CreateAssistant => self.create_assistant(request),
            Route::GetAssistant(id) => match self.store.assistant(&id) {
                Some(assistant) => ok(assistant),
                None => not_found("assistant", &id),
            },
            Route::ModifyAssistant(id) => self.modify_assistant(&id, request),
            Route::DeleteAssistant(id) => {
                let deleted = self.store.delete_assistant(&id);
                ok(&DeletionStatus::new(id, "assistant", deleted))
            }
            Route::CreateApiKey => self.create_api_key(request),
            Route::ListApiKeys => ok(&self.store.api_keys()),
            Route::ModifyApiKey(id) => self.modify_api_key(&id, request),
            Route::RevokeApiKey(id) => {
                if !self.store.revoke_api_key(&id) {
                    return MockResponse::not_found("API key not found.");
                }
                MockResponse::no_content()
            }
        }
    }

    fn create_thread(&mut self, request: &InterceptedRequest) -> MockResponse {
        let body: NewThread = match decode(request) {
            Ok(body) => body,
            Err(response) => return response,
        };
        if body.messages.iter().any(|m| m.content.is_blank()) {
            return MockResponse::bad_request("Message content cannot be empty.");
        }

        let initial = body
            .messages
            .into_iter()
            .map(|m| (m.role, m.content.into_parts()))
            .collect();
        ok(&self.store.create_thread(body.metadata.label, initial))
    }

    fn modify_thread(&mut self, id: &str, request: &InterceptedRequest) -> MockResponse {
        let body: ModifyThread = match decode(request) {
            Ok(body) => body,
            Err(response) => return response,
        };
        let Some(label) = body.metadata.label.filter(|l| !l.trim().is_empty()) else {
            return MockResponse::bad_request("Thread label cannot be empty.");
        };
        match self.store.relabel_thread(id, label) {
            Some(thread) => ok(&thread),
            None => not_found("thread", id),
        }
    }

    fn create_message(&mut self, thread_id: &str, request: &InterceptedRequest) -> MockResponse {
        let body: NewMessage = match decode(request) {
            Ok(body) => body,
            Err(response) => return response,
        };
        if body.content.is_blank() {
            return MockResponse::bad_request("Message content cannot be empty.");
        }
        match self
            .store
            .append_message(thread_id, body.role, body.content.into_parts(), None)
        {
            Some(message) => ok(&message),
            None => not_found("thread", thread_id),
        }
    }

    fn create_run(&mut self, thread_id: &str, request: &InterceptedRequest) -> MockResponse {
        let body: RunRequest = match decode(request) {
            Ok(body) => body,
            Err(response) => return response,
        };
        if self.store.thread(thread_id).is_none() {
            return not_found("thread", thread_id);
        }
        if let Some(assistant_id) = &body.assistant_id {
            if self.store.assistant(assistant_id).is_none() {
                return not_found("assistant", assistant_id);
            }
        }

        let script = self.completion_script(None);
        if body.stream {
            self.pending_reply = Some(PendingReply {
                thread_id: thread_id.to_string(),
                assistant_id: body.assistant_id,
            });
            return MockResponse::event_stream(script);
        }

        let reply = match collect(&script) {
            Ok(text) => text,
            Err(message) => return MockResponse::internal_server_error(&message),
        };
        let message = self.store.append_message(
            thread_id,
            Role::Assistant,
            vec![crate::types::ContentPart::text(reply)],
            body.assistant_id.clone(),
        );

        ok(&json!({
            "id": new_id("run_"),
            "object": "thread.run",
            "created_at": unix_now(),
            "thread_id": thread_id,
            "assistant_id": body.assistant_id,
            "model": script.model(),
            "status": "completed",
            "message_id": message.map(|m| m.id),
        }))
    }

    fn chat_completion(&mut self, request: &InterceptedRequest) -> MockResponse {
        let body: ChatCompletionRequest = match decode(request) {
            Ok(body) => body,
            Err(response) => return response,
        };
        if body.messages.is_empty() {
            return MockResponse::bad_request("messages is required.");
        }

        let script = self.completion_script(body.model.as_deref());
        if body.stream {
            return MockResponse::event_stream(script);
        }

        let text = match collect(&script) {
            Ok(text) => text,
            Err(message) => return MockResponse::internal_server_error(&message),
        };
        let prompt_tokens: usize = body
            .messages
            .iter()
            .map(|m| m.content.split_whitespace().count())
            .sum();
        let completion_tokens = script.chunks().len();

        ok(&json!({
            "id": script.id(),
            "object": "chat.completion",
            "created": unix_now(),
            "model": script.model(),
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": text },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": prompt_tokens,
                "completion_tokens": completion_tokens,
                "total_tokens": prompt_tokens + completion_tokens
            }
        }))
    }

    fn upload_file(&mut self, request: &InterceptedRequest) -> MockResponse {
        let body: UploadFile = match decode(request) {
            Ok(body) => body,
            Err(response) => return response,
        };
        if body.filename.trim().is_empty() {
            return MockResponse::bad_request("filename is required.");
        }
        if mime_for_filename(&body.filename).is_none() {
            return MockResponse::bad_request(&format!(
                "Unsupported file type: {}",
                body.filename
            ));
        }

        let bytes = match &body.content {
            Some(content) => match STANDARD.decode(content) {
                Ok(decoded) => decoded.len() as u64,
                Err(e) => {
                    return MockResponse::bad_request(&format!("File content is not base64: {e}"))
                }
            },
            None => body.bytes.unwrap_or_default(),
        };
        let purpose = body.purpose.unwrap_or_else(|| "assistants".to_string());

        ok(&self.store.insert_file(body.filename, purpose, bytes))
    }

    fn delete_files(&mut self, request: &InterceptedRequest) -> MockResponse {
        let body: DeleteFiles = match decode(request) {
            Ok(body) => body,
            Err(response) => return response,
        };
        if body.ids.is_empty() {
            return MockResponse::bad_request("ids is required.");
        }

        let data: Vec<DeletionStatus> = self
            .store
            .delete_files(&body.ids)
            .into_iter()
            .map(|(id, deleted)| DeletionStatus::new(id, "file", deleted))
            .collect();
        let deleted = data.iter().filter(|d| d.deleted).count();
        ok(&BatchDeletionStatus {
            object: "list".to_string(),
            data,
            deleted,
        })
    }

    fn create_assistant(&mut self, request: &InterceptedRequest) -> MockResponse {
        let body: NewAssistant = match decode(request) {
            Ok(body) => body,
            Err(response) => return response,
        };

        let mut problems = Vec::new();
        if body.name.trim().is_empty() {
            problems.push("This field is required. Please enter a name.");
        }
        if body.description.as_deref().is_none_or(|d| d.trim().is_empty()) {
            problems.push("This field is required. Please enter a tagline.");
        }
        if body.instructions.as_deref().is_none_or(|i| i.trim().is_empty()) {
            problems.push("This field is required. Please enter instructions.");
        }
        if !problems.is_empty() {
            return MockResponse::bad_request(&problems.join(" "));
        }

        let default_model = self.config.default_model.clone();
        ok(&self.store.insert_assistant(body, &default_model))
    }

    fn modify_assistant(&mut self, id: &str, request: &InterceptedRequest) -> MockResponse {
        let body: ModifyAssistant = match decode(request) {
            Ok(body) => body,
            Err(response) => return response,
        };
        let blank = |field: &Option<String>| field.as_deref().is_some_and(|v| v.trim().is_empty());
        if blank(&body.name) || blank(&body.description) || blank(&body.instructions) {
            return MockResponse::bad_request("Assistant fields cannot be set to empty values.");
        }
        match self.store.update_assistant(id, body) {
            Some(assistant) => ok(&assistant),
            None => not_found("assistant", id),
        }
    }

    fn create_api_key(&mut self, request: &InterceptedRequest) -> MockResponse {
        let body: CreateApiKeyRequest = match decode(request) {
            Ok(body) => body,
            Err(response) => return response,
        };
        let Some(name) = body.name.filter(|n| !n.trim().is_empty()) else {
            return MockResponse::bad_request("name is required.");
        };

        let now = unix_now();
        let expires_at = body
            .expires_at
            .unwrap_or(now + self.config.api_key_lifetime.as_secs());
        if expires_at <= now {
            return MockResponse::bad_request("Invalid expiration time.");
        }

        let prefix = self.config.api_key_prefix.clone();
        ok(&self.store.issue_api_key(name, expires_at, &prefix))
    }

    fn modify_api_key(&mut self, id: &str, request: &InterceptedRequest) -> MockResponse {
        let body: ModifyApiKeyRequest = match decode(request) {
            Ok(body) => body,
            Err(response) => return response,
        };
        if body.expires_at.is_some_and(|at| at <= unix_now()) {
            return MockResponse::bad_request("Invalid expiration time.");
        }
        match self.store.update_api_key(id, body) {
            Some(key) => ok(&key),
            None => MockResponse::not_found("API key not found."),
        }
    }
}

/// MIME type of a supported upload, judged by extension
pub fn mime_for_filename(filename: &str) -> Option<Mime> {
    let (_, extension) = filename.rsplit_once('.')?;
    let essence = match extension.to_ascii_lowercase().as_str() {
        "pdf" => return Some(mime::APPLICATION_PDF),
        "txt" | "text" => return Some(mime::TEXT_PLAIN),
        "md" => "text/markdown",
        "csv" => return Some(mime::TEXT_CSV),
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => return None,
    };
    essence.parse().ok()
}

/// Run a script to the end, returning its text or its error message
fn collect(script: &CompletionScript) -> std::result::Result<String, String> {
    let mut accumulator = CompletionAccumulator::new();
    for event in script.start() {
        accumulator
            .apply_event(event)
            .map_err(|e| match e {
                crate::Error::Stream(message) => message,
                other => other.to_string(),
            })?;
    }
    accumulator.finish().map_err(|e| e.to_string())
}

fn decode<T: DeserializeOwned>(request: &InterceptedRequest) -> Result<T, MockResponse> {
    request
        .body_as()
        .map_err(|e| MockResponse::bad_request(&format!("Invalid request body: {e}")))
}

fn ok<T: serde::Serialize + ?Sized>(value: &T) -> MockResponse {
    match serde_json::to_value(value) {
        Ok(body) => MockResponse::ok(body),
        Err(e) => MockResponse::internal_server_error(&format!("Failed to encode response: {e}")),
    }
}

fn not_found(kind: &str, id: &str) -> MockResponse {
    MockResponse::not_found(&format!("No {kind} found with id {id}."))
}

//! Named setups for common test situations.
//!
//! Each function installs one or more rules on the [`MockApi`] it was obtained from.
//! Calling a setup again for the same route replaces the earlier rule, and nothing outlives
//! the `MockApi`:
//!
//! ```
//! use leapfrog_mock::MockApi;
//!
//! let api = MockApi::new();
//! api.scenario()
//!     .chat_completion("Hello from the mock")
//!     .new_thread_error();
//! ```

use reqwest::{Method, StatusCode};

use crate::{
    harness::MockApi,
    interceptor::{Responder, Rule},
    response::MockResponse,
    streaming::CompletionScript,
    types::{Assistant, FileObject, ListResponse},
    Result,
};

/// Scenario setups bound to one [`MockApi`]
#[derive(Debug, Clone, Copy)]
pub struct Scenarios<'a> {
    api: &'a MockApi,
}

impl<'a> Scenarios<'a> {
    pub(crate) fn new(api: &'a MockApi) -> Self {
        Self { api }
    }

    fn install(self, rule: Rule) -> Self {
        self.api.install(rule);
        self
    }

    /// `GET /assistants` answers with exactly `assistants`
    pub fn get_assistants(self, assistants: Vec<Assistant>) -> Self {
        let list = ListResponse::new(assistants, |a| a.id.as_str());
        self.install(Rule::canned(Method::GET, "/assistants", list_response(&list)))
    }

    /// `GET /files` answers with exactly `files`
    pub fn get_files(self, files: Vec<FileObject>) -> Self {
        let list = ListResponse::new(files, |f| f.id.as_str());
        self.install(Rule::canned(Method::GET, "/files", list_response(&list)))
    }

    /// The next thread creation fails with a 500
    pub fn new_thread_error(self) -> Self {
        self.install(
            Rule::canned(
                Method::POST,
                "/threads",
                MockResponse::internal_server_error("Error creating thread"),
            )
            .once(),
        )
    }

    /// Messages are saved to the store, replacing any injected message failure
    pub fn new_message(self) -> Self {
        self.install(Rule::new(
            Some(Method::POST),
            "/threads/{thread_id}/messages",
            Responder::FromStore,
        ))
    }

    /// The next message fails to save with a 500
    pub fn new_message_error(self) -> Self {
        self.install(
            Rule::canned(
                Method::POST,
                "/threads/{thread_id}/messages",
                MockResponse::internal_server_error("Error saving message"),
            )
            .once(),
        )
    }

    /// Runs and chat completions reply with `text`
    pub fn chat_completion(self, text: impl Into<String>) -> Self {
        self.chat_completion_script(CompletionScript::new(text))
    }

    /// Runs and chat completions replay `script`
    pub fn chat_completion_script(self, script: CompletionScript) -> Self {
        self.api.set_completion(script);
        self
    }

    /// Replies stream `chunks` chunks of `text` and then fail
    pub fn chat_completion_error_after(self, text: impl Into<String>, chunks: usize) -> Self {
        self.chat_completion_script(
            CompletionScript::new(text).fail_after(chunks, "Error generating response."),
        )
    }

    /// API keys are issued by the store, replacing any injected failure
    pub fn create_api_key(self) -> Self {
        self.install(Rule::new(
            Some(Method::POST),
            "/api-keys",
            Responder::FromStore,
        ))
    }

    /// The next API key creation fails with a 500
    pub fn create_api_key_error(self) -> Self {
        self.install(
            Rule::canned(
                Method::POST,
                "/api-keys",
                MockResponse::internal_server_error("Error creating API key"),
            )
            .once(),
        )
    }

    /// The next file deletion, single or batch, fails with a bare 500
    pub fn delete_file_error_once(self) -> Self {
        self.install(
            Rule::canned(
                Method::DELETE,
                "/files/**",
                MockResponse::status_only(StatusCode::INTERNAL_SERVER_ERROR),
            )
            .once(),
        )
    }

    /// The next assistant creation fails with a 500
    pub fn create_assistant_error(self) -> Self {
        self.install(
            Rule::canned(
                Method::POST,
                "/assistants",
                MockResponse::internal_server_error("Error creating assistant"),
            )
            .once(),
        )
    }

    /// The next assistant update fails with a 500
    pub fn update_assistant_error(self) -> Self {
        self.install(
            Rule::canned(
                Method::POST,
                "/assistants/{assistant_id}",
                MockResponse::internal_server_error("Error updating assistant"),
            )
            .once(),
        )
    }

    /// The next upload succeeds with a body that is not a file object
    pub fn upload_error(self) -> Self {
        self.install(
            Rule::canned(Method::POST, "/files", MockResponse::ok(serde_json::json!({}))).once(),
        )
    }

    /// Every `method pattern` request answers 401
    pub fn unauthenticated(self, method: Method, pattern: &str) -> Self {
        self.install(Rule::canned(
            method,
            pattern,
            MockResponse::unauthorized("Not authenticated."),
        ))
    }

    /// Forward the next `method pattern` request to the real upstream
    pub fn pass_through(self, method: Method, pattern: &str) -> Result<Self> {
        self.api
            .register(Rule::new(Some(method), pattern, Responder::PassThrough).once())?;
        Ok(self)
    }
}

fn list_response<T: serde::Serialize>(list: &ListResponse<T>) -> MockResponse {
    match serde_json::to_value(list) {
        Ok(body) => MockResponse::ok(body),
        Err(e) => MockResponse::internal_server_error(&format!("Unserializable fixture: {e}")),
    }
}

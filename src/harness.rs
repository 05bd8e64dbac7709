//! The per-test mock API.
//!
//! A [`MockApi`] owns one fixture store, one interceptor and the request log for a single
//! test. Clones share the same state, so a test can hand copies to the code under test
//! while keeping one for assertions; separate tests create separate `MockApi`s.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::Method;

use crate::{
    config::HarnessConfig,
    interceptor::{InterceptedRequest, Interceptor, Responder, RoutePattern, Rule},
    response::{MockBody, MockResponse},
    routes::{PendingReply, Route, RouteContext},
    scenarios::Scenarios,
    store::FixtureStore,
    streaming::{pause, CompletionScript, GenerationState},
    types::{ApiKey, Assistant, ContentPart, FileObject, Message, Role, Thread},
    Result,
};

/// What the interceptor decided for one request
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// Answer with this response
    Respond(MockResponse),
    /// Send the request to the real upstream
    PassThrough(InterceptedRequest),
}

#[derive(Debug)]
struct HarnessState {
    config: HarnessConfig,
    store: FixtureStore,
    interceptor: Interceptor,
    /// Reply scripted by a scenario; `None` uses the configured default
    completion: Option<CompletionScript>,
    requests: Vec<InterceptedRequest>,
}

/// In-process stand-in for the chat API, scoped to one test
#[derive(Debug, Clone)]
pub struct MockApi {
    state: Arc<Mutex<HarnessState>>,
}

impl Default for MockApi {
    fn default() -> Self {
        Self::from_valid_config(HarnessConfig::default())
    }
}

impl MockApi {
    /// Create a mock API with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock API with a custom configuration
    pub fn with_config(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: HarnessConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(HarnessState {
                config,
                store: FixtureStore::new(),
                interceptor: Interceptor::new(),
                completion: None,
                requests: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HarnessState> {
        // A panicking test must not poison assertions made afterwards.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the active configuration
    pub fn config(&self) -> HarnessConfig {
        self.lock().config.clone()
    }

    /// Named setup functions for common scenarios
    pub fn scenario(&self) -> Scenarios<'_> {
        Scenarios::new(self)
    }

    /// Run `f` with mutable access to the fixture store
    pub fn with_store<R>(&self, f: impl FnOnce(&mut FixtureStore) -> R) -> R {
        f(&mut self.lock().store)
    }

    pub fn set_threads(&self, threads: impl IntoIterator<Item = Thread>) {
        self.with_store(|s| s.set_threads(threads));
    }

    pub fn set_messages(&self, messages: impl IntoIterator<Item = Message>) {
        self.with_store(|s| s.set_messages(messages));
    }

    pub fn set_files(&self, files: impl IntoIterator<Item = FileObject>) {
        self.with_store(|s| s.set_files(files));
    }

    pub fn set_assistants(&self, assistants: impl IntoIterator<Item = Assistant>) {
        self.with_store(|s| s.set_assistants(assistants));
    }

    pub fn set_api_keys(&self, keys: impl IntoIterator<Item = ApiKey>) {
        self.with_store(|s| s.set_api_keys(keys));
    }

    /// Snapshot of the stored threads
    pub fn threads(&self) -> Vec<Thread> {
        self.with_store(|s| s.threads().to_vec())
    }

    /// Snapshot of one thread's messages, in order
    pub fn messages_for(&self, thread_id: &str) -> Vec<Message> {
        self.with_store(|s| s.messages_for(thread_id).into_iter().cloned().collect())
    }

    /// Snapshot of the stored files
    pub fn files(&self) -> Vec<FileObject> {
        self.with_store(|s| s.files().to_vec())
    }

    /// Snapshot of the stored assistants
    pub fn assistants(&self) -> Vec<Assistant> {
        self.with_store(|s| s.assistants().to_vec())
    }

    /// Snapshot of the stored API keys, redacted
    pub fn api_keys(&self) -> Vec<ApiKey> {
        self.with_store(|s| s.api_keys().to_vec())
    }

    /// Validate and add an interception rule
    pub fn register(&self, rule: Rule) -> Result<()> {
        let mut state = self.lock();
        let can_pass_through = state.config.upstream_url.is_some();
        state.interceptor.register(rule, can_pass_through)
    }

    pub(crate) fn install(&self, rule: Rule) {
        self.lock().interceptor.install(rule);
    }

    /// Remove a previously registered rule
    pub fn unregister(&self, method: Option<&Method>, pattern: &str) -> bool {
        self.lock().interceptor.unregister(method, pattern)
    }

    /// Number of rules still active
    pub fn active_rules(&self) -> usize {
        self.lock().interceptor.rules().len()
    }

    /// Script the reply used by runs and chat completions
    pub fn set_completion(&self, script: CompletionScript) {
        self.lock().completion = Some(script);
    }

    /// Every request seen so far, in order
    pub fn requests(&self) -> Vec<InterceptedRequest> {
        self.lock().requests.clone()
    }

    /// Requests whose method and path match
    pub fn requests_matching(&self, method: &Method, pattern: &str) -> Vec<InterceptedRequest> {
        let pattern = RoutePattern::new(pattern);
        self.lock()
            .requests
            .iter()
            .filter(|r| &r.method == method && pattern.matches(&r.path).is_some())
            .cloned()
            .collect()
    }

    /// Clear all recorded requests
    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    /// Drop all fixtures, rules, scripted replies and recorded requests
    pub fn reset(&self) {
        let mut state = self.lock();
        state.store.reset();
        state.interceptor.clear();
        state.completion = None;
        state.requests.clear();
    }

    /// Decide how to answer a request. Never fails: every outcome is a response or a
    /// pass-through.
    pub fn dispatch(&self, request: InterceptedRequest) -> Dispatch {
        let mut state = self.lock();
        state.requests.push(request.clone());
        tracing::debug!(method = %request.method, path = %request.path, "intercepted request");

        let HarnessState {
            config,
            store,
            interceptor,
            completion,
            ..
        } = &mut *state;

        let Some(path) = config.relative_path(&request.path) else {
            return Dispatch::PassThrough(request);
        };

        let explicit_store = match interceptor.resolve(&request.method, path) {
            Some(Responder::Canned(response)) => return Dispatch::Respond(response),
            Some(Responder::PassThrough) => return Dispatch::PassThrough(request),
            Some(Responder::FromStore) => true,
            None => false,
        };

        let Some(route) = Route::recognize(&request.method, path) else {
            if explicit_store {
                return Dispatch::Respond(MockResponse::not_found(&format!(
                    "No fixture route for {} {}",
                    request.method, request.path
                )));
            }
            return Dispatch::PassThrough(request);
        };

        if config.require_auth && request.bearer_token().is_none() {
            return Dispatch::Respond(MockResponse::unauthorized("Not authenticated."));
        }

        let mut context = RouteContext {
            store,
            config,
            completion: completion.as_ref(),
            pending_reply: None,
        };
        let mut response = context.handle(route, &request);
        if let Some(reply) = context.pending_reply.take() {
            self.save_reply_on_finish(&mut response, reply);
        }
        Dispatch::Respond(response)
    }

    /// Store a streamed run's reply once the client has read the stream: the whole text when
    /// it completes, the received prefix when it is cancelled, nothing when it fails.
    fn save_reply_on_finish(&self, response: &mut MockResponse, reply: PendingReply) {
        let MockBody::EventStream(script) = &mut response.body else {
            return;
        };
        let state = Arc::downgrade(&self.state);
        *script = script.clone().on_finish(move |text, outcome| {
            let keep = match outcome {
                GenerationState::Completed => true,
                GenerationState::Cancelled => !text.is_empty(),
                _ => false,
            };
            if !keep {
                tracing::debug!(
                    thread_id = %reply.thread_id,
                    ?outcome,
                    "streamed run left no reply"
                );
                return;
            }
            let Some(state) = state.upgrade() else {
                return;
            };
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            state.store.append_message(
                &reply.thread_id,
                Role::Assistant,
                vec![ContentPart::text(text)],
                reply.assistant_id,
            );
            tracing::debug!(thread_id = %reply.thread_id, ?outcome, "stored streamed reply");
        });
    }

    /// Dispatch a request and await its response.
    ///
    /// Only a pass-through can fail, and only with a transport error from the upstream.
    pub async fn send(&self, request: InterceptedRequest) -> Result<MockResponse> {
        match self.dispatch(request) {
            Dispatch::Respond(response) => {
                if let Some(delay) = response.delay {
                    pause(delay).await;
                }
                Ok(response)
            }
            Dispatch::PassThrough(request) => self.pass_through(request).await,
        }
    }

    async fn pass_through(&self, request: InterceptedRequest) -> Result<MockResponse> {
        let (upstream, timeout) = {
            let state = self.lock();
            (state.config.upstream_url.clone(), state.config.timeout)
        };

        let Some(mut url) = upstream else {
            tracing::warn!(
                method = %request.method,
                path = %request.path,
                "request passed through but no upstream is configured"
            );
            return Ok(MockResponse::not_found(&format!(
                "No route for {} {}",
                request.method, request.path
            )));
        };

        // The upstream may itself live under a path, e.g. `http://host/api`
        let path = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            request.path.trim_start_matches('/')
        );
        url.set_path(&path);
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        tracing::debug!(method = %request.method, %url, "passing request through");

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let mut builder = client
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        MockResponse::from_reqwest(response).await
    }
}

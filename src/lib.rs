//! # leapfrog_mock
//!
//! An in-process mock of an OpenAI-compatible chat API, for driving chat front-end flows
//! deterministically in tests: threads, messages, runs and completions, files, assistants
//! and API keys, with error injection and scripted streaming replies.
//!
//! ## Quick Start
//!
//! ```rust
//! use leapfrog_mock::{fixtures, InterceptedRequest, MockApi};
//! use serde_json::json;
//!
//! let api = MockApi::new();
//! fixtures::seed(&api);
//! api.scenario().new_thread_error();
//!
//! let request = InterceptedRequest::post("/threads")
//!     .with_json(json!({"messages": [{"role": "user", "content": "What is AI?"}]}));
//! match api.dispatch(request) {
//!     leapfrog_mock::Dispatch::Respond(response) => assert_eq!(response.status.as_u16(), 500),
//!     leapfrog_mock::Dispatch::PassThrough(_) => unreachable!(),
//! }
//! assert_eq!(api.threads().len(), 3);
//! ```

pub mod config;
pub mod error;
pub mod fixtures;
pub mod harness;
pub mod interceptor;
pub mod response;
pub mod routes;
pub mod scenarios;
pub mod store;
pub mod streaming;
pub mod types;


// Re-export commonly used types for convenience
pub use config::{HarnessConfig, HarnessConfigBuilder};
pub use error::{ApiErrorKind, Error};
pub use harness::{Dispatch, MockApi};
pub use interceptor::{InterceptedRequest, Responder, RoutePattern, Rule, Shots};
pub use response::{MockBody, MockResponse};
pub use scenarios::Scenarios;
pub use store::FixtureStore;
pub use streaming::{
    CancelHandle, ChunkStrategy, CompletionAccumulator, CompletionScript, CompletionStream,
    GenerationState, StreamEvent,
};

/// Result type alias for the mock harness
pub type Result<T> = std::result::Result<T, Error>;

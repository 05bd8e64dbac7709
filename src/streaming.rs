//! Scripted streaming completions.
//!
//! A [`CompletionScript`] describes one reply: its text, how it is split into chunks,
//! whether it fails part-way, and how long to pause between chunks. Each call to
//! [`CompletionScript::start`] produces a fresh [`CompletionStream`], a finite iterator of
//! [`StreamEvent`]s that walks the generation state machine
//! `Idle -> Streaming -> {Completed | Cancelled | Errored}`.

use std::collections::VecDeque;
use std::pin::Pin;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{error::Error, Result};

/// How a completion text is split into chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStrategy {
    /// One chunk per word, trailing whitespace included
    Words,
    /// Fixed number of characters per chunk
    Chars(usize),
    /// The whole text as a single chunk
    Whole,
}

/// Split `text` into chunks whose concatenation is exactly `text`
pub fn split_chunks(text: &str, strategy: &ChunkStrategy) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    match strategy {
        ChunkStrategy::Whole => vec![text.to_string()],
        ChunkStrategy::Chars(size) => {
            let size = (*size).max(1);
            let chars: Vec<char> = text.chars().collect();
            chars.chunks(size).map(|c| c.iter().collect()).collect()
        }
        ChunkStrategy::Words => {
            let mut chunks = Vec::new();
            let mut current = String::new();
            let mut seen_space = false;
            for ch in text.chars() {
                if ch.is_whitespace() {
                    seen_space = true;
                } else {
                    if seen_space && current.chars().any(|c| !c.is_whitespace()) {
                        chunks.push(std::mem::take(&mut current));
                    }
                    seen_space = false;
                }
                current.push(ch);
            }
            if !current.is_empty() {
                chunks.push(current);
            }
            chunks
        }
    }
}

/// State of one simulated generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Streaming,
    Completed,
    Cancelled,
    Errored,
}

impl GenerationState {
    /// Whether no further events can be produced
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GenerationState::Completed | GenerationState::Cancelled | GenerationState::Errored
        )
    }
}

/// Events produced by a completion stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The next fragment of text
    Delta { index: usize, text: String },
    /// Generation finished normally
    Done { finish_reason: String },
    /// Generation failed; no further events follow
    Error { message: String },
}

/// Shared cancellation flag for a running stream
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Signal "stop generating"
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

type FinishFn = Box<dyn FnOnce(&str, GenerationState) + Send>;

/// Callback run once when a generation reaches a terminal state.
///
/// Shared by every clone of a script, so it fires for the first generation to finish only.
#[derive(Clone)]
pub struct FinishHook(Arc<Mutex<Option<FinishFn>>>);

impl FinishHook {
    pub fn new(f: impl FnOnce(&str, GenerationState) + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(Some(Box::new(f)))))
    }

    fn fire(&self, text: &str, state: GenerationState) {
        let f = self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // Called with the lock released
        if let Some(f) = f {
            f(text, state);
        }
    }
}

impl fmt::Debug for FinishHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FinishHook")
    }
}

impl PartialEq for FinishHook {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A reusable description of one scripted reply
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionScript {
    text: String,
    chunking: ChunkStrategy,
    fail_after: Option<(usize, String)>,
    pacing: Option<Duration>,
    id: String,
    model: String,
    created: u64,
    on_finish: Option<FinishHook>,
}

impl CompletionScript {
    /// Script a reply of `text`, chunked by words
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            chunking: ChunkStrategy::Words,
            fail_after: None,
            pacing: None,
            id: "chatcmpl-mock".to_string(),
            model: "vllm".to_string(),
            created: 0,
            on_finish: None,
        }
    }

    /// Set the chunking strategy
    pub fn chunking(mut self, chunking: ChunkStrategy) -> Self {
        self.chunking = chunking;
        self
    }

    /// Fail with `message` once `chunks` chunks have been emitted
    pub fn fail_after(mut self, chunks: usize, message: impl Into<String>) -> Self {
        self.fail_after = Some((chunks, message.into()));
        self
    }

    /// Pause between events when consumed through [`CompletionStream::into_async`]
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = Some(pacing);
        self
    }

    /// Set the completion id reported on the wire
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the model reported on the wire
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the `created` timestamp reported on the wire
    pub fn with_created(mut self, created: u64) -> Self {
        self.created = created;
        self
    }

    /// Run `f` with the emitted text and final state when a generation ends.
    ///
    /// Fires at most once, even if the script is started several times.
    pub fn on_finish(mut self, f: impl FnOnce(&str, GenerationState) + Send + 'static) -> Self {
        self.on_finish = Some(FinishHook::new(f));
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether the script ends in an error
    pub fn fails(&self) -> bool {
        self.fail_after.is_some()
    }

    /// The chunks a started stream will emit
    pub fn chunks(&self) -> Vec<String> {
        split_chunks(&self.text, &self.chunking)
    }

    /// Begin a new generation
    pub fn start(&self) -> CompletionStream {
        CompletionStream {
            chunks: self.chunks().into(),
            state: GenerationState::Idle,
            emitted: 0,
            fail_after: self.fail_after.clone(),
            cancel: CancelHandle::default(),
            pacing: self.pacing,
            id: self.id.clone(),
            model: self.model.clone(),
            created: self.created,
            text: String::new(),
            on_finish: self.on_finish.clone(),
        }
    }

    /// Render a whole generation as a server-sent-event body
    pub fn to_sse(&self) -> String {
        self.start().into_sse()
    }
}

/// One running generation; an iterator of [`StreamEvent`]s that cannot be restarted
#[derive(Debug)]
pub struct CompletionStream {
    chunks: VecDeque<String>,
    state: GenerationState,
    emitted: usize,
    fail_after: Option<(usize, String)>,
    cancel: CancelHandle,
    pacing: Option<Duration>,
    id: String,
    model: String,
    created: u64,
    text: String,
    on_finish: Option<FinishHook>,
}

impl CompletionStream {
    pub fn state(&self) -> GenerationState {
        self.state
    }

    /// Number of text chunks emitted so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Text of the deltas emitted so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// A handle that can stop this stream from elsewhere
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Stop generating; no further events are produced
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        if !self.state.is_terminal() {
            self.finish(GenerationState::Cancelled);
        }
    }

    fn finish(&mut self, state: GenerationState) {
        self.state = state;
        if let Some(hook) = self.on_finish.take() {
            hook.fire(&self.text, state);
        }
    }

    /// Consume the events asynchronously, pausing the scripted pacing between them
    pub fn into_async(self) -> Pin<Box<dyn Stream<Item = StreamEvent> + Send>> {
        let pacing = self.pacing;
        futures::stream::unfold((self, false), move |(mut stream, started)| async move {
            if started {
                if let Some(pacing) = pacing {
                    pause(pacing).await;
                }
            }
            let event = Iterator::next(&mut stream)?;
            Some((event, (stream, true)))
        })
        .boxed()
    }

    /// Drain the stream into a server-sent-event body
    pub fn into_sse(mut self) -> String {
        let id = self.id.clone();
        let model = self.model.clone();
        let created = self.created;
        let mut body = String::new();
        for event in self.by_ref() {
            body.push_str(&render_sse_event(&event, &id, &model, created));
        }
        if self.state == GenerationState::Completed {
            body.push_str("data: [DONE]\n\n");
        }
        body
    }
}

impl Iterator for CompletionStream {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        if self.state.is_terminal() {
            return None;
        }
        if self.cancel.is_cancelled() {
            self.finish(GenerationState::Cancelled);
            return None;
        }
        self.state = GenerationState::Streaming;

        // A failing script never completes, even with fewer chunks than the failure point
        let failure = match &self.fail_after {
            Some((after, message)) if self.emitted >= *after || self.chunks.is_empty() => {
                Some(message.clone())
            }
            _ => None,
        };
        if let Some(message) = failure {
            self.finish(GenerationState::Errored);
            return Some(StreamEvent::Error { message });
        }

        match self.chunks.pop_front() {
            Some(text) => {
                let index = self.emitted;
                self.emitted += 1;
                self.text.push_str(&text);
                Some(StreamEvent::Delta { index, text })
            }
            None => {
                self.finish(GenerationState::Completed);
                Some(StreamEvent::Done {
                    finish_reason: "stop".to_string(),
                })
            }
        }
    }
}

#[cfg(feature = "tokio")]
pub(crate) async fn pause(duration: Duration) {
    tokio::time::sleep(duration).await;
}

#[cfg(not(feature = "tokio"))]
pub(crate) async fn pause(duration: Duration) {
    tracing::debug!(?duration, "no timer available, skipping pause");
}

/// Render one event as an OpenAI `chat.completion.chunk` SSE frame
pub fn render_sse_event(event: &StreamEvent, id: &str, model: &str, created: u64) -> String {
    let payload = match event {
        StreamEvent::Delta { text, .. } => json!({
            "id": id,
            "object": "chat.completion.chunk",
            "created": created,
            "model": model,
            "choices": [{
                "index": 0,
                "delta": { "role": "assistant", "content": text },
                "finish_reason": null
            }]
        }),
        StreamEvent::Done { finish_reason } => json!({
            "id": id,
            "object": "chat.completion.chunk",
            "created": created,
            "model": model,
            "choices": [{
                "index": 0,
                "delta": {},
                "finish_reason": finish_reason
            }]
        }),
        StreamEvent::Error { message } => json!({
            "error": { "message": message, "type": "server_error" }
        }),
    };
    format!("data: {}\n\n", payload)
}

/// Parse a server-sent-event body back into events
pub fn parse_sse(body: &str) -> Result<Vec<StreamEvent>> {
    let mut events = Vec::new();
    let mut index = 0;

    for line in body.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data == "[DONE]" {
            break;
        }

        let frame: Value = serde_json::from_str(data)?;
        if let Some(error) = frame.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            events.push(StreamEvent::Error { message });
            continue;
        }

        let choice = frame
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| Error::InvalidResponse(format!("Chunk without choices: {}", data)))?;

        if let Some(text) = choice
            .get("delta")
            .and_then(|d| d.get("content"))
            .and_then(Value::as_str)
        {
            events.push(StreamEvent::Delta {
                index,
                text: text.to_string(),
            });
            index += 1;
        }
        if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
            events.push(StreamEvent::Done {
                finish_reason: reason.to_string(),
            });
        }
    }

    Ok(events)
}

/// Rebuilds the reply text from stream events, the way a chat UI renders it
#[derive(Debug)]
pub struct CompletionAccumulator {
    text: String,
    chunks: usize,
    state: GenerationState,
}

impl Default for CompletionAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionAccumulator {
    pub fn new() -> Self {
        Self {
            text: String::new(),
            chunks: 0,
            state: GenerationState::Idle,
        }
    }

    /// Apply one event; an error event is returned as [`Error::Stream`]
    pub fn apply_event(&mut self, event: StreamEvent) -> Result<()> {
        if self.state.is_terminal() {
            return Err(Error::Stream(format!(
                "Event received after stream finished: {:?}",
                event
            )));
        }

        match event {
            StreamEvent::Delta { text, .. } => {
                self.state = GenerationState::Streaming;
                self.text.push_str(&text);
                self.chunks += 1;
            }
            StreamEvent::Done { .. } => {
                self.state = GenerationState::Completed;
            }
            StreamEvent::Error { message } => {
                self.state = GenerationState::Errored;
                return Err(Error::Stream(message));
            }
        }

        Ok(())
    }

    /// Text rendered so far
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    /// Final text; errors if the stream never reached `Done`
    pub fn finish(self) -> Result<String> {
        match self.state {
            GenerationState::Completed => Ok(self.text),
            _ => Err(Error::Stream(
                "Stream ended without producing a complete message".to_string(),
            )),
        }
    }

    /// Drain an async event stream and return the full text
    pub async fn accumulate<S>(mut stream: S) -> Result<String>
    where
        S: Stream<Item = StreamEvent> + Unpin,
    {
        let mut accumulator = Self::new();
        while let Some(event) = stream.next().await {
            accumulator.apply_event(event)?;
        }
        accumulator.finish()
    }
}

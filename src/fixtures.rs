//! Ready-made fixture data.
//!
//! Every builder returns freshly constructed values, so each test seeds its own store with
//! its own copies and nothing written during one test leaks into another.

use crate::{
    harness::MockApi,
    store::new_id,
    types::{Assistant, FileObject, Message, NewAssistant, Role, Thread},
};

/// A thread together with its conversation
#[derive(Debug, Clone, PartialEq)]
pub struct FakeThread {
    pub thread: Thread,
    pub messages: Vec<Message>,
}

const QUESTIONS: [(&str, &str); 3] = [
    ("What is AI?", "AI is the field of building systems that perform tasks that usually need human intelligence."),
    ("How do frogs jump?", "Frogs jump by extending their long hind legs very quickly."),
    ("Summarize my notes", "Your notes cover project timelines, open risks and next steps."),
];

const BASE_TIME: u64 = 1_700_000_000;

/// Three threads of one question and one answer each
pub fn fake_threads() -> Vec<FakeThread> {
    QUESTIONS
        .iter()
        .enumerate()
        .map(|(i, (question, answer))| {
            let created_at = BASE_TIME + (i as u64) * 60;
            let thread = Thread::new(new_id("thread_"), *question, created_at);
            let messages = vec![
                Message::new(new_id("msg_"), &thread.id, Role::User, *question, created_at),
                Message::new(
                    new_id("msg_"),
                    &thread.id,
                    Role::Assistant,
                    *answer,
                    created_at + 1,
                ),
            ];
            FakeThread { thread, messages }
        })
        .collect()
}

/// Every message of `threads`, thread by thread
pub fn all_messages(threads: &[FakeThread]) -> Vec<Message> {
    threads.iter().flat_map(|t| t.messages.clone()).collect()
}

/// `count` processed PDF files named `test-1.pdf`, `test-2.pdf`, ...
pub fn fake_files(count: usize) -> Vec<FileObject> {
    (1..=count)
        .map(|n| {
            FileObject::new(
                new_id("file-"),
                format!("test-{n}.pdf"),
                1024 * n as u64,
                BASE_TIME + n as u64,
            )
        })
        .collect()
}

/// Valid input for creating an assistant called `name`
pub fn fake_assistant_input(name: &str) -> NewAssistant {
    NewAssistant {
        name: name.to_string(),
        description: Some(format!("{name} answers questions")),
        instructions: Some("You are a helpful assistant.".to_string()),
        ..Default::default()
    }
}

/// A stored assistant called `name`
pub fn fake_assistant(name: &str) -> Assistant {
    let input = fake_assistant_input(name);
    Assistant {
        id: new_id("asst_"),
        object: "assistant".to_string(),
        created_at: BASE_TIME,
        name: input.name,
        description: input.description,
        instructions: input.instructions,
        model: "vllm".to_string(),
        avatar: None,
        file_ids: Vec::new(),
    }
}

/// Seed `api` with fake threads, their messages, two files and one assistant.
///
/// Returns the threads so tests can refer to their ids.
pub fn seed(api: &MockApi) -> Vec<FakeThread> {
    let threads = fake_threads();
    api.set_threads(threads.iter().map(|t| t.thread.clone()));
    api.set_messages(all_messages(&threads));
    api.set_files(fake_files(2));
    api.set_assistants(vec![fake_assistant("Frog Helper")]);
    threads
}

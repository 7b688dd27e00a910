//! In-memory `ChatBackend` for tests: answers through a closure and records every request.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChatBackend, ChatCompletion, ChatRequest, LlmError};

type Responder = dyn Fn(&ChatRequest) -> Result<ChatCompletion, LlmError> + Send + Sync;

pub struct ScriptedBackend {
    responder: Box<Responder>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ChatRequest) -> Result<ChatCompletion, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with the same text.
    pub fn constant(text: &'static str) -> Self {
        Self::new(move |_| Ok(ChatCompletion::text(text)))
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.responder)(request)
    }
}

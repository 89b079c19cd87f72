//! Scripted port fakes shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::Stage;
use crate::ports::{
    CallbackClient, CallbackError, EventSink, GenerationError, GenerationRequest,
    GenerationService,
};

enum Script<T> {
    Always(T),
    Sequence(VecDeque<T>),
}

/// GenerationService that replays canned answers and records what it was asked.
pub struct ScriptedGenerator {
    script: Mutex<Script<Result<Option<String>, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn always(content: &str) -> Self {
        Self::from_script(Script::Always(Ok(Some(content.to_string()))))
    }

    pub fn sequence(answers: Vec<Result<Option<String>, GenerationError>>) -> Self {
        Self::from_script(Script::Sequence(answers.into()))
    }

    fn from_script(script: Script<Result<Option<String>, GenerationError>>) -> Self {
        Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn complete(
        &self,
        request: &GenerationRequest,
    ) -> Result<Option<String>, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        match &mut *self.script.lock().unwrap() {
            Script::Always(Ok(content)) => Ok(content.clone()),
            Script::Always(Err(e)) => Err(GenerationError::Transport(e.to_string())),
            Script::Sequence(answers) => answers
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::Transport("script exhausted".into()))),
        }
    }
}

/// CallbackClient that answers with canned statuses and records every POST.
pub struct RecordingCallback {
    script: Mutex<Script<Result<u16, CallbackError>>>,
    calls: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingCallback {
    pub fn always(status: u16) -> Self {
        Self::from_script(Script::Always(Ok(status)))
    }

    pub fn sequence(answers: Vec<Result<u16, CallbackError>>) -> Self {
        Self::from_script(Script::Sequence(answers.into()))
    }

    fn from_script(script: Script<Result<u16, CallbackError>>) -> Self {
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CallbackClient for RecordingCallback {
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<u16, CallbackError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        match &mut *self.script.lock().unwrap() {
            Script::Always(Ok(status)) => Ok(*status),
            Script::Always(Err(e)) => Err(CallbackError::Transport(e.to_string())),
            Script::Sequence(answers) => answers
                .pop_front()
                .unwrap_or_else(|| Err(CallbackError::Transport("script exhausted".into()))),
        }
    }
}

/// EventSink that remembers every stage in order.
#[derive(Default)]
pub struct RecordingSink {
    stages: Mutex<Vec<Stage>>,
}

impl RecordingSink {
    pub fn stages(&self) -> Vec<Stage> {
        self.stages.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn stage_entered(&self, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }
}

/// Serve `app` on an ephemeral local port; returns its base URL.
pub async fn serve(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

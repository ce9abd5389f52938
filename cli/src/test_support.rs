//! Test-only fakes: a scripted backend, captured terminal output, scripted log
//! streams and an exit capability that unwinds instead of ending the process.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::io::{self, Write};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{Map, Value};

use crate::actions::context::ActionContext;
use crate::core::definition::ActionDefinition;
use crate::io::backend::BackendClient;
use crate::io::console::{Console, ProcessExit};
use crate::io::log_stream::{LogStream, LogStreamConnector};

/// In-memory writer shared between a [`Console`] and the test.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock().expect("buffer lock")).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().expect("buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Remove ANSI color sequences.
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::new();
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
            continue;
        }
        out.push(ch);
    }
    out
}

/// A console whose output the test can read back.
#[derive(Debug, Clone, Default)]
pub struct CapturedConsole {
    buffer: SharedBuffer,
}

impl CapturedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn console(&self) -> Console {
        Console::from_writer(self.buffer.clone())
    }

    /// Raw output, colors included.
    pub fn text(&self) -> String {
        self.buffer.text()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }

    /// Output lines with colors removed.
    pub fn plain_lines(&self) -> Vec<String> {
        strip_ansi(&self.text()).lines().map(str::to_string).collect()
    }

    /// Percentages printed by progress bar frames, in order.
    pub fn progress_percentages(&self) -> Vec<u32> {
        self.plain_lines()
            .iter()
            .filter(|line| line.starts_with('['))
            .filter_map(|line| line.rsplit(' ').next())
            .filter_map(|last| last.strip_suffix('%'))
            .filter_map(|pct| pct.parse().ok())
            .collect()
    }
}

/// Panic payload raised by [`RecordingExit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminated {
    pub code: i32,
}

/// Exit capability that records the code and unwinds with [`Terminated`]
/// so tests survive it.
#[derive(Debug, Clone, Default)]
pub struct RecordingExit {
    codes: Arc<Mutex<Vec<i32>>>,
}

impl RecordingExit {
    /// Codes passed to `exit`, oldest first.
    pub fn codes(&self) -> Vec<i32> {
        self.codes.lock().expect("exit lock").clone()
    }
}

impl ProcessExit for RecordingExit {
    fn exit(&self, code: i32) -> ! {
        self.codes.lock().expect("exit lock").push(code);
        std::panic::panic_any(Terminated { code })
    }
}

/// How a future driven by [`run_until_exit`] ended.
#[derive(Debug)]
pub enum RunEnd {
    Completed(Result<()>),
    Terminated(i32),
}

impl RunEnd {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunEnd::Terminated(code) => Some(*code),
            RunEnd::Completed(_) => None,
        }
    }
}

/// Drive `fut`, turning a [`RecordingExit`] into [`RunEnd::Terminated`].
/// Any other panic is resumed.
pub async fn run_until_exit<F>(fut: F) -> RunEnd
where
    F: Future<Output = Result<()>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => RunEnd::Completed(result),
        Err(payload) => match payload.downcast::<Terminated>() {
            Ok(terminated) => RunEnd::Terminated(terminated.code),
            Err(other) => std::panic::resume_unwind(other),
        },
    }
}

type Reply<T> = std::result::Result<T, String>;

/// Backend fake that answers from per-endpoint scripts and counts calls.
///
/// An exhausted script answers with an error.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    build: Mutex<VecDeque<Reply<String>>>,
    submission: Mutex<VecDeque<Reply<String>>>,
    autofix: Mutex<VecDeque<Reply<String>>>,
    dynamic: Mutex<VecDeque<Reply<Vec<ActionDefinition>>>>,
    build_calls: AtomicUsize,
    submission_calls: AtomicUsize,
    autofix_calls: AtomicUsize,
    dynamic_requests: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_build_statuses<I, S>(self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        push_statuses(&self.build, statuses);
        self
    }

    pub fn with_submission_statuses<I, S>(self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        push_statuses(&self.submission, statuses);
        self
    }

    pub fn with_autofix_statuses<I, S>(self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        push_statuses(&self.autofix, statuses);
        self
    }

    pub fn with_build_error(self, message: &str) -> Self {
        self.build
            .lock()
            .expect("script lock")
            .push_back(Err(message.to_string()));
        self
    }

    /// Queue one `fetch_dynamic_actions` reply.
    pub fn with_dynamic_actions(self, definitions: Vec<ActionDefinition>) -> Self {
        self.dynamic
            .lock()
            .expect("script lock")
            .push_back(Ok(definitions));
        self
    }

    pub fn build_calls(&self) -> usize {
        self.build_calls.load(Ordering::SeqCst)
    }

    pub fn submission_calls(&self) -> usize {
        self.submission_calls.load(Ordering::SeqCst)
    }

    pub fn autofix_calls(&self) -> usize {
        self.autofix_calls.load(Ordering::SeqCst)
    }

    /// `(event_name, event_params)` of every dynamic actions request.
    pub fn dynamic_requests(&self) -> Vec<(String, Map<String, Value>)> {
        self.dynamic_requests.lock().expect("script lock").clone()
    }
}

fn push_statuses<I, S>(queue: &Mutex<VecDeque<Reply<String>>>, statuses: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    queue
        .lock()
        .expect("script lock")
        .extend(statuses.into_iter().map(|status| Ok(status.into())));
}

fn next_reply<T>(queue: &Mutex<VecDeque<Reply<T>>>, endpoint: &str) -> Result<T> {
    match queue.lock().expect("script lock").pop_front() {
        Some(Ok(value)) => Ok(value),
        Some(Err(message)) => Err(anyhow!(message)),
        None => Err(anyhow!("no scripted {endpoint} reply left")),
    }
}

#[async_trait]
impl BackendClient for ScriptedClient {
    async fn fetch_build_status(&self, _build_id: &str) -> Result<String> {
        self.build_calls.fetch_add(1, Ordering::SeqCst);
        next_reply(&self.build, "build")
    }

    async fn fetch_submission_status(&self, _submission_id: &str) -> Result<String> {
        self.submission_calls.fetch_add(1, Ordering::SeqCst);
        next_reply(&self.submission, "submission")
    }

    async fn fetch_autofix_status(&self, _submission_id: &str) -> Result<String> {
        self.autofix_calls.fetch_add(1, Ordering::SeqCst);
        next_reply(&self.autofix, "autofix")
    }

    async fn fetch_dynamic_actions(
        &self,
        event_name: &str,
        event_params: &Map<String, Value>,
    ) -> Result<Vec<ActionDefinition>> {
        self.dynamic_requests
            .lock()
            .expect("script lock")
            .push((event_name.to_string(), event_params.clone()));
        next_reply(&self.dynamic, "dynamic actions")
    }
}

/// Log streams served from memory, keyed by URL. Unknown URLs fail to connect.
#[derive(Debug, Default)]
pub struct ScriptedLogStreams {
    streams: Mutex<HashMap<String, Vec<Reply<Vec<u8>>>>>,
}

impl ScriptedLogStreams {
    /// Chunks for `url`; the stream disconnects after the last one.
    pub fn script(&self, url: &str, chunks: Vec<Reply<Vec<u8>>>) {
        self.streams
            .lock()
            .expect("streams lock")
            .insert(url.to_string(), chunks);
    }
}

#[async_trait]
impl LogStreamConnector for ScriptedLogStreams {
    async fn connect(&self, url: &str) -> Result<Box<dyn LogStream>> {
        let chunks = self
            .streams
            .lock()
            .expect("streams lock")
            .remove(url)
            .ok_or_else(|| anyhow!("no scripted log stream at {url}"))?;
        Ok(Box::new(ScriptedLogStream {
            chunks: chunks.into(),
        }))
    }
}

struct ScriptedLogStream {
    chunks: VecDeque<Reply<Vec<u8>>>,
}

#[async_trait]
impl LogStream for ScriptedLogStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self.chunks.pop_front() {
            Some(Ok(bytes)) => Ok(Some(bytes)),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(None),
        }
    }
}

/// Context wired to fakes, plus handles to inspect them.
pub struct TestHarness {
    pub client: Arc<ScriptedClient>,
    pub console: CapturedConsole,
    pub log_streams: Arc<ScriptedLogStreams>,
    pub exit: RecordingExit,
    pub ctx: ActionContext,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_client(ScriptedClient::new())
    }

    pub fn with_client(client: ScriptedClient) -> Self {
        let console = CapturedConsole::new();
        let log_streams = Arc::new(ScriptedLogStreams::default());
        let exit = RecordingExit::default();
        let ctx = ActionContext::new(
            console.console(),
            Arc::new(exit.clone()),
            log_streams.clone(),
        );
        Self {
            client: Arc::new(client),
            console,
            log_streams,
            exit,
            ctx,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

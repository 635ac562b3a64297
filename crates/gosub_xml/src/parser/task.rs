use crate::document::DocumentHandle;
use crate::errors::{Error, ParseError, Result};
use crate::parser::errors::{ErrorLogger, ErrorSubscriber};
use crate::parser::{XmlParser, XmlParserOptions};
use crate::tokenizer::{TokenSource, Tokenizer};
use gosub_shared::async_executor;
use gosub_shared::byte_stream::{ByteStream, Encoding, Location, Stream};
use log::{debug, error};
use parking_lot::{Condvar, Mutex};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// Name of the worker thread that runs spawned parse tasks
const WORKER_NAME: &str = "gosub-xml-parser";

/// The way a parse task was started. The first caller decides.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecutionMode {
    Sync,
    Async,
}

/// Lifecycle of a parse task
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TaskStatus {
    NotStarted,
    Running,
    Completed,
    Failed,
}

enum TaskState<T: TokenSource> {
    NotStarted(Box<XmlParser<T>>),
    Started(ExecutionMode),
}

#[derive(Default)]
struct CompletionState {
    result: Option<Result<DocumentHandle>>,
    wakers: Vec<Waker>,
}

/// Single join point of a run. Filled exactly once, by whoever executed the parser.
#[derive(Default)]
struct Completion {
    state: Mutex<CompletionState>,
    ready: Condvar,
}

impl Completion {
    fn complete(&self, result: Result<DocumentHandle>) {
        let wakers = {
            let mut state = self.state.lock();
            state.result = Some(result);
            std::mem::take(&mut state.wakers)
        };

        self.ready.notify_all();
        for waker in wakers {
            waker.wake();
        }
    }

    /// Blocks until the run has finished
    fn wait(&self) -> Result<DocumentHandle> {
        let mut state = self.state.lock();
        loop {
            if let Some(result) = &state.result {
                return result.clone();
            }
            self.ready.wait(&mut state);
        }
    }

    fn poll_result(&self, cx: &mut Context<'_>) -> Poll<Result<DocumentHandle>> {
        let mut state = self.state.lock();
        match &state.result {
            Some(result) => Poll::Ready(result.clone()),
            None => {
                if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    state.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }

    fn status(&self) -> Option<TaskStatus> {
        match &self.state.lock().result {
            Some(Ok(_)) => Some(TaskStatus::Completed),
            Some(Err(_)) => Some(TaskStatus::Failed),
            None => None,
        }
    }
}

/// A single parse run over a token source. The run can be driven synchronously with `run()` or
/// moved to a worker thread with `spawn()`, but it executes only once: repeated calls in the same
/// mode return the outcome of that one run.
pub struct ParseTask<T: TokenSource = Tokenizer> {
    state: Mutex<TaskState<T>>,
    completion: Arc<Completion>,
    error_logger: Arc<Mutex<ErrorLogger>>,
}

impl ParseTask<Tokenizer> {
    /// Creates a parse task over a string. Strings are always decoded as UTF-8, an encoding in the
    /// xml declaration is only recorded on the document.
    pub fn from_str(input: &str, options: Option<XmlParserOptions>) -> Self {
        let options = options.unwrap_or_default();

        let mut stream = ByteStream::new(Encoding::UTF8, None);
        stream.read_from_str(input, Some(Encoding::UTF8));
        stream.close();
        stream.skip_bom();

        let error_logger = options.error_logger();
        let tokenizer = Tokenizer::new(stream, Location::default(), error_logger.clone()).with_fixed_encoding();

        Self::new(XmlParser::new(tokenizer, DocumentHandle::default(), error_logger))
    }

    /// Creates a parse task over raw bytes. The starting encoding is detected or taken from the options.
    pub fn from_bytes(bytes: &[u8], options: Option<XmlParserOptions>) -> Result<Self> {
        let options = options.unwrap_or_default();

        let mut stream = ByteStream::new(options.default_encoding, None);
        stream
            .read_from_bytes(bytes)
            .map_err(|e| Error::Tokenizer(e.to_string()))?;
        options.prepare_stream(&mut stream);

        Ok(Self::from_stream(stream, &options))
    }

    fn from_stream(stream: ByteStream, options: &XmlParserOptions) -> Self {
        let error_logger = options.error_logger();
        let tokenizer = Tokenizer::new(stream, Location::default(), error_logger.clone());

        Self::new(XmlParser::new(tokenizer, DocumentHandle::default(), error_logger))
    }
}

impl<T: TokenSource + Send + 'static> ParseTask<T> {
    pub fn new(parser: XmlParser<T>) -> Self {
        Self {
            error_logger: parser.error_logger(),
            state: Mutex::new(TaskState::NotStarted(Box::new(parser))),
            completion: Arc::new(Completion::default()),
        }
    }

    /// Registers a callback that receives every diagnostic of the run. Subscribe before starting
    /// the task to see all of them.
    pub fn subscribe(&self, subscriber: ErrorSubscriber) {
        self.error_logger.lock().subscribe(subscriber);
    }

    /// All diagnostics reported so far
    pub fn errors(&self) -> Vec<ParseError> {
        self.error_logger.lock().get_errors()
    }

    pub fn status(&self) -> TaskStatus {
        match &*self.state.lock() {
            TaskState::NotStarted(_) => TaskStatus::NotStarted,
            TaskState::Started(_) => self.completion.status().unwrap_or(TaskStatus::Running),
        }
    }

    /// Runs the parser on the calling thread and returns the document. A task that already ran
    /// returns the same outcome again. Fails when the task was spawned.
    pub fn run(&self) -> Result<DocumentHandle> {
        let mut state = self.state.lock();
        if let Some(parser) = take_parser(&mut state, ExecutionMode::Sync) {
            drop(state);
            return self.execute(parser);
        }

        match &*state {
            TaskState::Started(ExecutionMode::Async) => Err(Error::InvalidOperation(
                "parse task was spawned, use its handle to get the result".to_string(),
            )),
            _ => {
                drop(state);
                self.completion.wait()
            }
        }
    }

    /// Moves the run to a worker thread and returns a handle to join it. Spawning again returns
    /// another handle on the same run. Fails when the task already ran synchronously.
    pub fn spawn(&self) -> Result<ParseHandle> {
        let mut state = self.state.lock();
        if let Some(mut parser) = take_parser(&mut state, ExecutionMode::Async) {
            drop(state);

            let completion = self.completion.clone();
            let worker_completion = self.completion.clone();
            let spawned = async_executor::spawn(WORKER_NAME, async move {
                let result = parser.parse().map(|_| parser.document().clone());
                worker_completion.complete(result);
            });

            if let Err(e) = spawned {
                error!("could not start parse worker: {e}");
                completion.complete(Err(Error::Task(e.to_string())));
            }

            return Ok(ParseHandle { completion });
        }

        match &*state {
            TaskState::Started(ExecutionMode::Sync) => Err(Error::InvalidOperation(
                "parse task already ran synchronously".to_string(),
            )),
            _ => Ok(ParseHandle {
                completion: self.completion.clone(),
            }),
        }
    }

    /// Returns the outcome of the run, whichever way it was started. A task that was not started
    /// yet is run on the calling thread.
    pub fn result(&self) -> Result<DocumentHandle> {
        let mut state = self.state.lock();
        if let Some(parser) = take_parser(&mut state, ExecutionMode::Sync) {
            drop(state);
            return self.execute(parser);
        }
        drop(state);

        self.completion.wait()
    }

    fn execute(&self, mut parser: Box<XmlParser<T>>) -> Result<DocumentHandle> {
        debug!("running parse task on the calling thread");
        let result = parser.parse().map(|_| parser.document().clone());
        self.completion.complete(result.clone());
        result
    }
}

/// Takes the parser out of a task that has not started yet, marking it as started in the given mode
fn take_parser<T: TokenSource>(state: &mut TaskState<T>, mode: ExecutionMode) -> Option<Box<XmlParser<T>>> {
    match std::mem::replace(state, TaskState::Started(mode)) {
        TaskState::NotStarted(parser) => Some(parser),
        started => {
            *state = started;
            None
        }
    }
}

/// Join handle of a spawned parse task. It can be joined from a blocking context or awaited.
#[derive(Clone)]
pub struct ParseHandle {
    completion: Arc<Completion>,
}

impl ParseHandle {
    /// Blocks until the run has finished and returns its outcome
    pub fn join(&self) -> Result<DocumentHandle> {
        self.completion.wait()
    }

    /// Returns true when the run has finished
    pub fn is_finished(&self) -> bool {
        self.completion.status().is_some()
    }
}

impl Future for ParseHandle {
    type Output = Result<DocumentHandle>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.completion.poll_result(cx)
    }
}

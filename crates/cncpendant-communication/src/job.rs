//! Job feeder
//!
//! Streams one program, line by line, into a [`CommandSink`] under
//! backpressure. The job never blocks: each [`Job::tick`] feeds as many lines
//! as the sink accepts and returns.
//!
//! State machine: unbound → bound → running ⇄ paused → cancelled | completed.

use crate::device::CommandSink;
use crate::flow::MAX_COMMAND_LEN;
use cncpendant_core::{
    AppEvent, DeviceStatusEvent, EventBus, EventCategory, EventFilter, FileSource, JobError,
    JobStatusEvent, ProgramSource, SenderToken, SubscriptionId,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Sender token attached to every program line
pub const JOB_SENDER: SenderToken = SenderToken(0);

/// Job settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    /// Longest program line, comments excluded
    pub max_line_len: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_line_len: MAX_COMMAND_LEN,
        }
    }
}

enum ReadOutcome {
    Line(String),
    Eof,
    TooLong,
    Failed(cncpendant_core::Error),
}

#[derive(Default)]
struct JobState {
    source: Option<Box<dyn ProgramSource>>,
    name: String,
    file_size: u64,
    file_pos: u64,
    line: Vec<u8>,
    in_comment: bool,
    pending: Option<String>,
    running: bool,
    paused: bool,
    cancelled: bool,
    completed: bool,
    start_time: Option<Instant>,
    end_time: Option<Instant>,
}

impl JobState {
    fn close(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
        }
    }

    fn bind(&mut self, source: Box<dyn ProgramSource>) {
        self.close();
        *self = JobState {
            name: source.name(),
            file_size: source.size(),
            source: Some(source),
            ..Default::default()
        };
    }

    fn available(&self) -> u64 {
        self.source.as_ref().map_or(0, |s| s.available())
    }

    fn finish_line(&mut self, max: usize) -> ReadOutcome {
        let raw = std::mem::take(&mut self.line);
        self.in_comment = false;
        let line = String::from_utf8_lossy(&raw).trim().to_string();
        if line.len() > max {
            ReadOutcome::TooLong
        } else {
            ReadOutcome::Line(line)
        }
    }

    fn read_line(&mut self, max: usize) -> ReadOutcome {
        loop {
            let Some(source) = self.source.as_mut() else {
                return ReadOutcome::Eof;
            };
            let byte = match source.read_byte() {
                Ok(byte) => byte,
                Err(e) => return ReadOutcome::Failed(e),
            };
            match byte {
                None if self.line.is_empty() && !self.in_comment => return ReadOutcome::Eof,
                None | Some(b'\n') | Some(b'\r') => {
                    if byte.is_some() {
                        self.file_pos = (self.file_pos + 1).min(self.file_size);
                    }
                    return self.finish_line(max);
                }
                Some(b) => {
                    self.file_pos = (self.file_pos + 1).min(self.file_size);
                    if b == b';' {
                        self.in_comment = true;
                    } else if !self.in_comment {
                        self.line.push(b);
                        // leading/trailing blanks are trimmed later; cap the raw buffer
                        if self.line.len() > max * 2 {
                            self.line.clear();
                            return ReadOutcome::TooLong;
                        }
                    }
                }
            }
        }
    }

    fn cancel(&mut self) -> bool {
        if self.source.is_none() && !self.running {
            return false;
        }
        self.running = false;
        self.paused = false;
        self.cancelled = true;
        self.pending = None;
        self.end_time = Some(Instant::now());
        self.close();
        true
    }

    fn complete(&mut self) {
        self.running = false;
        self.paused = false;
        self.completed = true;
        self.end_time = Some(Instant::now());
    }
}

/// Clonable handle to the pendant's job
#[derive(Clone)]
pub struct Job {
    state: Arc<Mutex<JobState>>,
    bus: Arc<EventBus>,
    config: JobConfig,
}

impl Job {
    /// Create an unbound job publishing to `bus`
    pub fn new(config: JobConfig, bus: Arc<EventBus>) -> Self {
        Self {
            state: Arc::new(Mutex::new(JobState::default())),
            bus,
            config,
        }
    }

    fn publish(&self, events: impl IntoIterator<Item = JobStatusEvent>) {
        for event in events {
            let _ = self.bus.publish(AppEvent::Job(event));
        }
    }

    /// Cancel the job whenever the device reports a failure
    pub fn watch_device_failures(&self) -> SubscriptionId {
        let state: Weak<Mutex<JobState>> = Arc::downgrade(&self.state);
        let bus: Weak<EventBus> = Arc::downgrade(&self.bus);

        self.bus.subscribe(
            EventFilter::Categories(vec![EventCategory::Device]),
            move |event| {
                if event != AppEvent::Device(DeviceStatusEvent::Failure) {
                    return;
                }
                let (Some(state), Some(bus)) = (state.upgrade(), bus.upgrade()) else {
                    return;
                };
                let cancelled = {
                    let mut state = state.lock();
                    state.running && state.cancel()
                };
                if cancelled {
                    tracing::warn!("Job cancelled after device failure");
                    let _ = bus.publish(AppEvent::Job(JobStatusEvent::Cancelled));
                }
            },
        )
    }

    /// Bind a program file, replacing any previous one
    ///
    /// On failure the job is left unbound.
    pub fn set_file(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match FileSource::open(path) {
            Ok(source) => self.set_source(Box::new(source)),
            Err(e) => {
                tracing::warn!("{}", e);
                let mut state = self.state.lock();
                state.close();
                *state = JobState::default();
                false
            }
        }
    }

    /// Bind an arbitrary program source
    pub fn set_source(&self, source: Box<dyn ProgramSource>) -> bool {
        {
            let mut state = self.state.lock();
            state.bind(source);
            tracing::info!("Job file {} ({} bytes)", state.name, state.file_size);
        }
        self.publish([JobStatusEvent::FileSelected]);
        true
    }

    /// Start feeding; requires a bound, idle job
    pub fn start(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.source.is_none() || state.running {
                return false;
            }
            state.running = true;
            state.paused = false;
            state.cancelled = false;
            state.completed = false;
            state.start_time = Some(Instant::now());
            state.end_time = None;
            tracing::info!("Job {} started", state.name);
        }
        self.publish([JobStatusEvent::Started]);
        true
    }

    /// Gate feeding; false if nothing changed
    pub fn set_paused(&self, paused: bool) -> bool {
        {
            let mut state = self.state.lock();
            if !state.running || state.paused == paused {
                return false;
            }
            state.paused = paused;
        }
        self.publish([if paused {
            JobStatusEvent::Paused
        } else {
            JobStatusEvent::Resumed
        }]);
        true
    }

    /// Stop feeding until resumed
    pub fn pause(&self) -> bool {
        self.set_paused(true)
    }

    /// Continue feeding
    pub fn resume(&self) -> bool {
        self.set_paused(false)
    }

    /// Stop the job and close its file
    pub fn cancel(&self) -> bool {
        let cancelled = self.state.lock().cancel();
        if cancelled {
            tracing::info!("Job cancelled");
            self.publish([JobStatusEvent::Cancelled]);
        }
        cancelled
    }

    /// Feed as many lines as `sink` accepts
    pub fn tick(&self, sink: &dyn CommandSink) {
        let max = self.config.max_line_len;
        let mut events = Vec::new();
        {
            let mut state = self.state.lock();
            if !state.running || state.paused {
                return;
            }

            loop {
                if state.pending.is_none() {
                    if !sink.can_schedule(1) {
                        break;
                    }
                    match state.read_line(max) {
                        ReadOutcome::Line(line) if line.is_empty() => continue,
                        ReadOutcome::Line(line) => state.pending = Some(line),
                        ReadOutcome::Eof => {
                            state.complete();
                            events.push(JobStatusEvent::Completed);
                            break;
                        }
                        ReadOutcome::TooLong => {
                            let e = JobError::LineTooLong {
                                file_pos: state.file_pos,
                                max,
                            };
                            tracing::error!("{}", e);
                            state.cancel();
                            events.push(JobStatusEvent::Cancelled);
                            break;
                        }
                        ReadOutcome::Failed(e) => {
                            tracing::error!("Job read failed: {}", e);
                            state.cancel();
                            events.push(JobStatusEvent::Cancelled);
                            break;
                        }
                    }
                }

                let Some(line) = state.pending.clone() else {
                    break;
                };
                if !sink.can_schedule(line.len()) {
                    break;
                }
                if !sink.schedule_command(&line, Some(JOB_SENDER)) {
                    tracing::error!("{}: {}", JobError::Rejected, line);
                    state.cancel();
                    events.push(JobStatusEvent::Cancelled);
                    break;
                }
                state.pending = None;

                if state.available() == 0 {
                    state.complete();
                    events.push(JobStatusEvent::Completed);
                    break;
                }
            }
        }

        for event in &events {
            match event {
                JobStatusEvent::Completed => tracing::info!("Job completed"),
                _ => tracing::debug!("Job {}", event),
            }
        }
        self.publish(events);
    }

    /// Whether a file is bound and open
    pub fn is_valid(&self) -> bool {
        self.state.lock().source.is_some()
    }

    /// Whether lines are being fed (paused jobs are still running)
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Whether feeding is gated
    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Whether the job was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    /// Whether the job ran to the end of its file
    pub fn is_completed(&self) -> bool {
        self.state.lock().completed
    }

    /// Display name of the bound program
    pub fn file_name(&self) -> String {
        self.state.lock().name.clone()
    }

    /// Size of the bound program, 0 when unbound
    pub fn file_size(&self) -> u64 {
        self.state.lock().file_size
    }

    /// Bytes consumed so far
    pub fn file_pos(&self) -> u64 {
        self.state.lock().file_pos
    }

    /// Fraction of the file consumed, 0.0 when unbound
    pub fn percentage(&self) -> f32 {
        let state = self.state.lock();
        if state.file_size == 0 {
            return 0.0;
        }
        state.file_pos as f32 / state.file_size as f32
    }

    /// Time since start, frozen once the job ends
    pub fn print_duration(&self) -> Option<Duration> {
        let state = self.state.lock();
        let start = state.start_time?;
        Some(state.end_time.unwrap_or_else(Instant::now).duration_since(start))
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Job")
            .field("name", &state.name)
            .field("file_pos", &state.file_pos)
            .field("file_size", &state.file_size)
            .field("running", &state.running)
            .field("paused", &state.paused)
            .field("cancelled", &state.cancelled)
            .finish()
    }
}

//! Pipeline Event Recorder
//!
//! Append-only JSONL writer. One line per event, tagged with the run's
//! session id. Rotates to a new file past `MAX_FILE_SIZE`.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::logic::events::{EmittedEvent, EventBus, PipelineEvent};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Maximum file size before rotation (16 MB)
const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

const LOG_PREFIX: &str = "pipeline";

const LOG_EXT: &str = "jsonl";

static SESSION_ID: OnceLock<String> = OnceLock::new();

/// Session id, generated once per process
pub fn session_id() -> String {
    SESSION_ID
        .get_or_init(|| Uuid::new_v4().to_string())
        .clone()
}

// ============================================================================
// RECORD FORMAT
// ============================================================================

/// One JSONL line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub session_id: String,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: PipelineEvent,
}

impl From<EmittedEvent> for RecordedEvent {
    fn from(emitted: EmittedEvent) -> Self {
        Self {
            session_id: session_id(),
            at: emitted.at,
            event: emitted.event,
        }
    }
}

// ============================================================================
// RECORDER
// ============================================================================

pub struct Recorder {
    writer: BufWriter<File>,
    current_file: PathBuf,
    current_size: u64,
    max_file_size: u64,
    base_dir: PathBuf,
    events_recorded: u64,
}

impl Recorder {
    /// Create a new recorder in the given directory
    pub fn new(base_dir: PathBuf) -> std::io::Result<Self> {
        Self::with_max_file_size(base_dir, MAX_FILE_SIZE)
    }

    pub fn with_max_file_size(base_dir: PathBuf, max_file_size: u64) -> std::io::Result<Self> {
        std::fs::create_dir_all(&base_dir)?;
        let (file_path, file) = Self::open_new_file(&base_dir, 0)?;

        Ok(Self {
            writer: BufWriter::new(file),
            current_file: file_path,
            current_size: 0,
            max_file_size,
            base_dir,
            events_recorded: 0,
        })
    }

    /// Timestamped file name; `seq` keeps rotations within one second apart
    fn open_new_file(base_dir: &Path, seq: u32) -> std::io::Result<(PathBuf, File)> {
        let now = Utc::now();
        let filename = format!(
            "{}_{}_{:02}_{:02}_{:02}{:02}{:02}_{:03}.{}",
            LOG_PREFIX,
            now.year(),
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            seq,
            LOG_EXT
        );
        let file_path = base_dir.join(filename);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)?;

        log::info!("Opened pipeline log: {:?}", file_path);
        Ok((file_path, file))
    }

    pub fn record(&mut self, event: &RecordedEvent) -> std::io::Result<()> {
        let line = serde_json::to_string(event)?;
        let bytes = line.as_bytes();

        if self.current_size > 0 && self.current_size + bytes.len() as u64 + 1 > self.max_file_size {
            self.rotate()?;
        }

        self.writer.write_all(bytes)?;
        self.writer.write_all(b"\n")?;
        self.current_size += bytes.len() as u64 + 1;
        self.writer.flush()?;

        self.events_recorded += 1;
        Ok(())
    }

    fn rotate(&mut self) -> std::io::Result<()> {
        self.writer.flush()?;

        let seq = list_log_files(&self.base_dir)?.len() as u32;
        let (new_path, new_file) = Self::open_new_file(&self.base_dir, seq)?;
        self.writer = BufWriter::new(new_file);

        log::info!("Rotated from {:?} to {:?}", self.current_file, new_path);
        self.current_file = new_path;
        self.current_size = 0;

        Ok(())
    }

    pub fn current_file(&self) -> &Path {
        &self.current_file
    }

    pub fn events_recorded(&self) -> u64 {
        self.events_recorded
    }
}

/// Drain the event bus into a recorder until the bus closes.
pub fn spawn(bus: &EventBus, mut recorder: Recorder) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(emitted) => {
                    if let Err(e) = recorder.record(&RecordedEvent::from(emitted)) {
                        log::error!("Failed to record pipeline event: {}", e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Telemetry recorder lagged, {} events dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        log::info!("Telemetry recorder stopped. Total events: {}", recorder.events_recorded());
    })
}

// ============================================================================
// QUERY API
// ============================================================================

/// Read all events from a log file, skipping malformed lines
pub fn read_events(file_path: &Path) -> std::io::Result<Vec<RecordedEvent>> {
    let file = File::open(file_path)?;
    let reader = BufReader::new(file);
    let mut events = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<RecordedEvent>(&line) {
            Ok(event) => events.push(event),
            Err(e) => log::debug!("Skipping malformed telemetry line: {}", e),
        }
    }

    Ok(events)
}

/// All log files in `dir`, sorted by name (which includes the timestamp)
pub fn list_log_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if dir.is_dir() {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == LOG_EXT) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::stats::PerformanceSnapshot;
    use crate::logic::watermark::AllocationDelta;
    use tempfile::TempDir;

    fn delta_event(cycle: u64) -> RecordedEvent {
        RecordedEvent {
            session_id: session_id(),
            at: Utc::now(),
            event: PipelineEvent::allocation_delta(
                cycle,
                AllocationDelta { previous: 12, current: 15, delta: 3 },
            ),
        }
    }

    #[test]
    fn test_recorder_creation() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::new(temp_dir.path().to_path_buf()).unwrap();
        assert!(recorder.current_file().exists());
    }

    #[test]
    fn test_jsonl_format() {
        let temp_dir = TempDir::new().unwrap();
        let mut recorder = Recorder::new(temp_dir.path().to_path_buf()).unwrap();

        for i in 0..3 {
            recorder.record(&delta_event(i)).unwrap();
        }

        let content = std::fs::read_to_string(recorder.current_file()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);

        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["type"], "allocation_delta");
            assert_eq!(value["session_id"], session_id());
        }
    }

    #[test]
    fn test_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let mut recorder = Recorder::new(temp_dir.path().to_path_buf()).unwrap();

        recorder.record(&delta_event(1)).unwrap();
        recorder
            .record(&RecordedEvent {
                session_id: session_id(),
                at: Utc::now(),
                event: PipelineEvent::PerformanceSnapshot(PerformanceSnapshot {
                    detect_fps: 30.303,
                    draw_fps: 33.333,
                    frames: 100,
                    average_ms: 33.0,
                    live_buffers: Some(12),
                }),
            })
            .unwrap();

        let events = read_events(recorder.current_file()).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[1].event,
            PipelineEvent::PerformanceSnapshot(PerformanceSnapshot { frames: 100, .. })
        ));
    }

    #[test]
    fn test_rotation() {
        let temp_dir = TempDir::new().unwrap();
        let mut recorder =
            Recorder::with_max_file_size(temp_dir.path().to_path_buf(), 64).unwrap();

        recorder.record(&delta_event(1)).unwrap();
        recorder.record(&delta_event(2)).unwrap();

        let files = list_log_files(temp_dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(recorder.events_recorded(), 2);
    }

    #[test]
    fn test_spawned_recorder_drains_bus() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::new(temp_dir.path().to_path_buf()).unwrap();
        let file = recorder.current_file().to_path_buf();

        tokio_test::block_on(async {
            let bus = EventBus::new(8);
            let handle = spawn(&bus, recorder);
            bus.emit(PipelineEvent::StaleResult { generation: 4, age_ms: 1200.0 });
            drop(bus);
            handle.await.unwrap();
        });

        let events = read_events(&file).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.name(), crate::logic::events::names::STALE_RESULT);
    }
}

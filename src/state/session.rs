/// The session controller
///
/// Owns the option store, the upload registry, and the two task slots, and
/// turns UI commands into engine requests. All mutation entry points are
/// synchronous methods called from the single UI thread; the only
/// suspension points are byte materialization and the gateway calls, which
/// happen inside the async drivers at the bottom of this file.

use std::sync::Arc;

use log::debug;

use crate::engine::{ConvertSummary, EngineGateway, FilePayload};
use crate::state::options::{ConvertOptions, OptionStore};
use crate::state::tasks::{TaskSlot, TaskState};
use crate::state::uploads::{FileHandle, UploadRegistry};

/// The renderable outcome of a preview call
///
/// Wraps the PNG bytes the engine returned together with an iced image
/// handle built from them. Exactly one frame is alive at a time: committing
/// a new one (or an error) drops the previous frame and releases its bytes.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    bytes: Vec<u8>,
    handle: iced::widget::image::Handle,
}

impl PartialEq for PreviewFrame {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl PreviewFrame {
    fn new(bytes: Vec<u8>) -> Self {
        let handle = iced::widget::image::Handle::from_bytes(bytes.clone());
        Self { bytes, handle }
    }

    /// Handle for the image widget (cheap clone, shares the bytes)
    pub fn widget_handle(&self) -> iced::widget::image::Handle {
        self.handle.clone()
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Everything a preview invocation needs, snapshotted at trigger time
///
/// The options are copied and the file handle cloned when the ticket is
/// issued, so editing options or removing the item afterwards cannot alter
/// the in-flight request.
#[derive(Debug, Clone)]
pub struct PreviewTicket {
    pub seq: u64,
    pub file: FileHandle,
    pub options: ConvertOptions,
}

/// Everything a batch conversion needs, snapshotted at trigger time
#[derive(Debug, Clone)]
pub struct ConvertTicket {
    pub seq: u64,
    pub files: Vec<FileHandle>,
    pub options: ConvertOptions,
    pub output_root: String,
    pub saturation: Option<f32>,
}

/// Per-window session state, constructed once at startup
///
/// Nothing here is global: the shell owns the session and passes it by
/// reference to whatever renders it, and it is dropped with the window.
#[derive(Debug)]
pub struct Session {
    pub options: OptionStore,
    pub uploads: UploadRegistry,
    /// Where converted batches land; empty means unset (requests use ".")
    pub output_root: String,
    /// Optional global saturation override, independent of the option record
    pub saturation: Option<f32>,
    preview: TaskSlot<PreviewFrame>,
    convert: TaskSlot<ConvertSummary>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            options: OptionStore::new(),
            uploads: UploadRegistry::new(),
            output_root: String::new(),
            saturation: None,
            preview: TaskSlot::new(),
            convert: TaskSlot::new(),
        }
    }

    pub fn preview_state(&self) -> &TaskState<PreviewFrame> {
        self.preview.state()
    }

    pub fn convert_state(&self) -> &TaskState<ConvertSummary> {
        self.convert.state()
    }

    pub fn preview_pending(&self) -> bool {
        self.preview.is_pending()
    }

    pub fn convert_pending(&self) -> bool {
        self.convert.is_pending()
    }

    /// Start a preview for one queued item
    ///
    /// Returns `None` for an unknown id (the item may have been removed
    /// between render and click — not an error). Otherwise the preview slot
    /// goes pending, any previous frame or error is cleared immediately,
    /// and the caller gets a ticket to hand to `run_preview`.
    pub fn begin_preview(&mut self, id: &str) -> Option<PreviewTicket> {
        let item = self.uploads.get(id)?;
        let file = item.file.clone();
        let seq = self.preview.begin();
        debug!("preview #{} for {}", seq, file.name());
        Some(PreviewTicket {
            seq,
            file,
            options: self.options.get(),
        })
    }

    /// Commit a preview outcome; stale sequence numbers are dropped
    pub fn finish_preview(&mut self, seq: u64, outcome: Result<Vec<u8>, String>) -> bool {
        let committed = self
            .preview
            .resolve(seq, outcome.map(PreviewFrame::new));
        if !committed {
            debug!("discarding stale preview #{}", seq);
        }
        committed
    }

    /// Start a conversion of the whole queue
    ///
    /// Gated on a non-empty registry: with nothing queued this returns
    /// `None` and the engine is never invoked. The ticket snapshots every
    /// file handle in insertion order, the current options, the effective
    /// output root, and the saturation override.
    pub fn begin_convert(&mut self) -> Option<ConvertTicket> {
        if self.uploads.is_empty() {
            return None;
        }
        let files: Vec<FileHandle> = self.uploads.iter().map(|item| item.file.clone()).collect();
        let seq = self.convert.begin();
        debug!("convert #{} with {} file(s)", seq, files.len());
        Some(ConvertTicket {
            seq,
            files,
            options: self.options.get(),
            output_root: self.effective_output_root(),
            saturation: self.saturation,
        })
    }

    /// Commit a conversion outcome; stale sequence numbers are dropped
    ///
    /// The upload registry is left untouched either way, so a failed batch
    /// can be retried without re-selecting files.
    pub fn finish_convert(&mut self, seq: u64, outcome: Result<ConvertSummary, String>) -> bool {
        let committed = self.convert.resolve(seq, outcome);
        if !committed {
            debug!("discarding stale convert #{}", seq);
        }
        committed
    }

    /// Empty the queue and release the preview frame
    ///
    /// Used by the UI's reset action. The convert slot is left alone so a
    /// just-finished batch summary stays readable; the preview frame is a
    /// scarce resource and is dropped here.
    pub fn reset(&mut self) {
        self.uploads.clear();
        self.preview.reset();
    }

    /// Output root with the default applied
    pub fn effective_output_root(&self) -> String {
        let trimmed = self.output_root.trim();
        if trimmed.is_empty() {
            ".".to_string()
        } else {
            trimmed.to_string()
        }
    }

    /// Apply the result of a preset load
    ///
    /// A successful load replaces the whole option record at once; a failed
    /// load leaves the store exactly at its prior snapshot.
    pub fn finish_preset_load(
        &mut self,
        outcome: Result<ConvertOptions, String>,
    ) -> Result<(), String> {
        let options = outcome?;
        self.options.replace(options);
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive one preview invocation to completion
///
/// Materializes the item's bytes, crosses the gateway, and returns the
/// outcome tagged with the ticket's sequence number for `finish_preview`.
pub async fn run_preview(
    gateway: Arc<dyn EngineGateway>,
    ticket: PreviewTicket,
) -> (u64, Result<Vec<u8>, String>) {
    let bytes = match ticket.file.read_bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            return (
                ticket.seq,
                Err(format!("Failed to read {}: {}", ticket.file.name(), e)),
            );
        }
    };

    let outcome = gateway
        .preview(ticket.options, bytes)
        .await
        .map_err(|e| e.to_string());
    (ticket.seq, outcome)
}

/// Drive one batch conversion to completion
///
/// Every file's bytes are materialized before anything is dispatched — the
/// batch is sent whole or not at all.
pub async fn run_convert(
    gateway: Arc<dyn EngineGateway>,
    ticket: ConvertTicket,
) -> (u64, Result<ConvertSummary, String>) {
    let mut payloads = Vec::with_capacity(ticket.files.len());
    for file in &ticket.files {
        match file.read_bytes().await {
            Ok(bytes) => payloads.push(FilePayload {
                name: file.name().to_string(),
                bytes,
            }),
            Err(e) => {
                return (
                    ticket.seq,
                    Err(format!("Failed to read {}: {}", file.name(), e)),
                );
            }
        }
    }

    let outcome = gateway
        .convert_batch(
            ticket.options,
            payloads,
            ticket.output_root,
            ticket.saturation,
        )
        .await
        .map_err(|e| e.to_string());
    (ticket.seq, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use crate::state::options::OptionUpdate;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted engine double: replies are queued per operation, calls are
    /// counted, and the last batch request is captured for inspection
    #[derive(Default)]
    struct MockEngine {
        preview_replies: Mutex<VecDeque<Result<Vec<u8>, EngineError>>>,
        convert_reply: Mutex<Option<Result<ConvertSummary, EngineError>>>,
        load_reply: Mutex<Option<Result<ConvertOptions, EngineError>>>,
        preview_calls: AtomicUsize,
        convert_calls: AtomicUsize,
        last_batch: Mutex<Option<(Vec<String>, String, Option<f32>)>>,
    }

    #[async_trait]
    impl EngineGateway for MockEngine {
        async fn preview(
            &self,
            _options: ConvertOptions,
            _image_bytes: Vec<u8>,
        ) -> Result<Vec<u8>, EngineError> {
            self.preview_calls.fetch_add(1, Ordering::SeqCst);
            self.preview_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(EngineError::Rejected("no scripted reply".to_string())))
        }

        async fn convert_batch(
            &self,
            _options: ConvertOptions,
            files: Vec<FilePayload>,
            output_root: String,
            saturation: Option<f32>,
        ) -> Result<ConvertSummary, EngineError> {
            self.convert_calls.fetch_add(1, Ordering::SeqCst);
            let names = files.iter().map(|f| f.name.clone()).collect();
            *self.last_batch.lock().unwrap() = Some((names, output_root, saturation));
            self.convert_reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(EngineError::Rejected("no scripted reply".to_string())))
        }

        async fn save_preset(
            &self,
            _name: String,
            _options: ConvertOptions,
        ) -> Result<(), EngineError> {
            Ok(())
        }

        async fn load_preset(&self, name: String) -> Result<ConvertOptions, EngineError> {
            self.load_reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(EngineError::NotFound(name)))
        }
    }

    fn session_with_files(files: &[(&str, &[u8])]) -> Session {
        let mut session = Session::new();
        session.uploads.add_files(
            files
                .iter()
                .map(|(name, bytes)| FileHandle::from_bytes(*name, bytes.to_vec()))
                .collect(),
        );
        session
    }

    fn first_id(session: &Session) -> String {
        session.uploads.iter().next().unwrap().id.clone()
    }

    #[tokio::test]
    async fn test_preview_happy_path() {
        // Scenario: one 10-byte file, the engine hands back 20 bytes
        let mut session = session_with_files(&[("a.png", &[7u8; 10])]);
        let engine = Arc::new(MockEngine::default());
        engine
            .preview_replies
            .lock()
            .unwrap()
            .push_back(Ok(vec![1u8; 20]));

        assert_eq!(*session.preview_state(), TaskState::Idle);

        let id = first_id(&session);
        let ticket = session.begin_preview(&id).unwrap();
        assert!(session.preview_pending());

        let (seq, outcome) = run_preview(engine, ticket).await;
        assert!(session.finish_preview(seq, outcome));

        match session.preview_state() {
            TaskState::Success(frame) => assert_eq!(frame.byte_len(), 20),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_preview_failure_surfaces_description_and_touches_nothing_else() {
        let mut session = session_with_files(&[("a.png", b"0123456789")]);
        let engine = Arc::new(MockEngine::default());
        engine
            .preview_replies
            .lock()
            .unwrap()
            .push_back(Err(EngineError::Rejected("decode error".to_string())));

        let options_before = session.options.get();
        let id = first_id(&session);
        let ticket = session.begin_preview(&id).unwrap();
        let (seq, outcome) = run_preview(engine, ticket).await;
        session.finish_preview(seq, outcome);

        let message = session.preview_state();
        match message {
            TaskState::Error(text) => assert!(text.contains("decode error")),
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(session.uploads.len(), 1);
        assert_eq!(session.options.get(), options_before);
    }

    #[tokio::test]
    async fn test_second_preview_supersedes_first_regardless_of_timing() {
        let mut session = session_with_files(&[("a.png", b"bytes")]);
        let engine = Arc::new(MockEngine::default());
        {
            let mut replies = engine.preview_replies.lock().unwrap();
            replies.push_back(Ok(vec![1u8; 5]));
            replies.push_back(Ok(vec![2u8; 6]));
        }

        let id = first_id(&session);
        let first = session.begin_preview(&id).unwrap();
        let second = session.begin_preview(&id).unwrap();

        let (first_seq, first_outcome) = run_preview(engine.clone(), first).await;
        let (second_seq, second_outcome) = run_preview(engine, second).await;

        // The newer call resolves first and commits
        assert!(session.finish_preview(second_seq, second_outcome));
        // The older call arrives late and is discarded
        assert!(!session.finish_preview(first_seq, first_outcome));

        match session.preview_state() {
            TaskState::Success(frame) => assert_eq!(frame.bytes(), &[2u8; 6][..]),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_convert_happy_path_commits_exact_summary() {
        let mut session = session_with_files(&[
            ("a.png", b"aa"),
            ("b.jpg", b"bb"),
            ("c.webp", b"cc"),
        ]);
        session.output_root = "/out".to_string();

        let engine = Arc::new(MockEngine::default());
        let summary = ConvertSummary {
            output_dir: "/out".to_string(),
            succeeded: 3,
            failed: 0,
        };
        *engine.convert_reply.lock().unwrap() = Some(Ok(summary.clone()));

        let ticket = session.begin_convert().unwrap();
        assert_eq!(ticket.files.len(), 3);
        assert!(session.convert_pending());

        let (seq, outcome) = run_convert(engine.clone(), ticket).await;
        assert!(session.finish_convert(seq, outcome));

        assert_eq!(*session.convert_state(), TaskState::Success(summary));
        let (names, root, saturation) = engine.last_batch.lock().unwrap().clone().unwrap();
        assert_eq!(names, vec!["a.png", "b.jpg", "c.webp"]);
        assert_eq!(root, "/out");
        assert_eq!(saturation, None);
    }

    #[tokio::test]
    async fn test_convert_failure_leaves_registry_for_retry() {
        let mut session = session_with_files(&[("a.png", b"aa")]);
        let engine = Arc::new(MockEngine::default());
        *engine.convert_reply.lock().unwrap() =
            Some(Err(EngineError::Unreachable("engine missing".to_string())));

        let ticket = session.begin_convert().unwrap();
        let (seq, outcome) = run_convert(engine, ticket).await;
        session.finish_convert(seq, outcome);

        assert!(matches!(session.convert_state(), TaskState::Error(_)));
        assert_eq!(session.uploads.len(), 1);
    }

    #[test]
    fn test_convert_is_gated_on_a_non_empty_queue() {
        let mut session = Session::new();
        assert!(session.begin_convert().is_none());
        assert_eq!(*session.convert_state(), TaskState::Idle);
    }

    #[test]
    fn test_output_root_defaults_to_current_dir() {
        let mut session = Session::new();
        assert_eq!(session.effective_output_root(), ".");
        session.output_root = "  ".to_string();
        assert_eq!(session.effective_output_root(), ".");
        session.output_root = "/tmp/out".to_string();
        assert_eq!(session.effective_output_root(), "/tmp/out");
    }

    #[test]
    fn test_preview_ticket_options_are_a_detached_snapshot() {
        let mut session = session_with_files(&[("a.png", b"aa")]);
        let id = first_id(&session);
        let ticket = session.begin_preview(&id).unwrap();

        // Mutating the store after the ticket was issued must not reach the
        // in-flight request
        session.options.set(OptionUpdate::JpegQuality(55));
        assert_eq!(ticket.options.jpeg_quality, 90);
    }

    #[tokio::test]
    async fn test_missing_preset_leaves_options_untouched() {
        let mut session = Session::new();
        let engine = Arc::new(MockEngine::default());
        let before = session.options.get();

        let outcome = engine
            .load_preset("missing".to_string())
            .await
            .map_err(|e| e.to_string());
        let result = session.finish_preset_load(outcome);

        assert!(result.is_err());
        assert!(result.unwrap_err().contains("missing"));
        assert_eq!(session.options.get(), before);
    }

    #[tokio::test]
    async fn test_loaded_preset_replaces_whole_record() {
        let mut session = Session::new();
        let engine = Arc::new(MockEngine::default());
        let preset = ConvertOptions {
            rotate_max_deg: 9.0,
            jpeg_quality: 60,
            ..ConvertOptions::default()
        };
        *engine.load_reply.lock().unwrap() = Some(Ok(preset));

        let outcome = engine
            .load_preset("harsh".to_string())
            .await
            .map_err(|e| e.to_string());
        assert!(session.finish_preset_load(outcome).is_ok());
        assert_eq!(session.options.get(), preset);
    }
}

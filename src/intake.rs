//! Intake service: the four client commands.
//!
//! `start` opens (or restarts) a session, `upload_photo` stores a photo
//! under the current step, `skip` moves on and on the last step produces
//! the conclusion, `cancel` drops the session. Commands for one client are
//! serialized on the session lock; commands for different clients run
//! concurrently.
//!
//! Report generation runs without the session lock. While it runs the
//! session is `Finalizing` and every command except `start` and `cancel`
//! is answered with `Busy`.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::OwnedMutexGuard;

use crate::models::{DocType, ExtractedDocument, SessionPhase};
use crate::pipeline::client::VisionClient;
use crate::pipeline::error::ExtractionError;
use crate::pipeline::field_extraction::FieldExtractor;
use crate::pipeline::report::{ReportAssembler, ReportError, ReportPayload};
use crate::render::{RenderError, RenderedReport, ReportRenderer};
use crate::session::{
    ClientId, PhotoSlot, Session, SessionError, SessionHandle, SessionStore, StepSequencer,
    StepView,
};
use crate::storage::{PhotoKey, PhotoStore, StorageError};

// ──────────────────────────────────────────────
// Reply texts
// ──────────────────────────────────────────────

pub const GREETING: &str = "Hello! Let's start the technical inspection. Please upload photos of the documents first.";
pub const MORE_PHOTOS_HINT: &str = "If you have more photos of this element, send them. Otherwise send /skip to move on.";
pub const EXTRACTION_UNAVAILABLE: &str = "Could not read the document automatically. The photo is saved, you can continue.";
pub const COMPLETION_MESSAGE: &str = "All steps completed. Generating the conclusion...";
pub const CANCELLED_MESSAGE: &str = "Operation cancelled.";
pub const PROCESSING_ERROR: &str = "Error processing the photo. Try again or send /cancel.";
pub const NO_SESSION_MESSAGE: &str = "No active inspection. Send /start to begin.";
pub const BUSY_MESSAGE: &str = "The conclusion is being generated, please wait.";
pub const NO_IMAGE_MESSAGE: &str = "Please send a photo.";

// ──────────────────────────────────────────────
// Types
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct CompletedReport {
    pub file: RenderedReport,
    pub payload: ReportPayload,
}

/// What the client is told after a command.
#[derive(Debug, Clone, Serialize)]
pub struct IntakeReply {
    pub messages: Vec<String>,
    pub finished: bool,
    pub report: Option<CompletedReport>,
}

impl IntakeReply {
    fn say<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
            finished: false,
            report: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("The upload did not contain an image")]
    NoImage,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Photo storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Report assembly failed: {0}")]
    Report(#[from] ReportError),

    #[error("Report rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntakeError {
    /// Text shown to the client for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            IntakeError::NoImage => NO_IMAGE_MESSAGE,
            IntakeError::Session(SessionError::NotFound(_)) => NO_SESSION_MESSAGE,
            IntakeError::Session(SessionError::Busy) => BUSY_MESSAGE,
            IntakeError::Session(SessionError::AllStepsCompleted) => COMPLETION_MESSAGE,
            _ => PROCESSING_ERROR,
        }
    }
}

// ──────────────────────────────────────────────
// Service
// ──────────────────────────────────────────────

pub struct IntakeService {
    sessions: SessionStore,
    sequencer: StepSequencer,
    extractor: Arc<FieldExtractor>,
    assembler: Arc<ReportAssembler>,
    photos: Arc<dyn PhotoStore>,
    renderer: Arc<dyn ReportRenderer>,
    call_timeout: Duration,
}

impl IntakeService {
    pub fn new(
        client: Arc<dyn VisionClient>,
        photos: Arc<dyn PhotoStore>,
        renderer: Arc<dyn ReportRenderer>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            sessions: SessionStore::new(),
            sequencer: StepSequencer::new(),
            extractor: Arc::new(FieldExtractor::new(Arc::clone(&client))),
            assembler: Arc::new(ReportAssembler::new(client, Arc::clone(&photos))),
            photos,
            renderer,
            call_timeout,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Open a fresh session for `id`, discarding any previous one.
    pub fn start(&self, id: &ClientId) -> IntakeReply {
        let (handle, previous) = self.sessions.create(id);
        if let Some(previous) = previous {
            self.release(previous.scope());
        }
        tracing::info!(client = %id, scope = handle.scope(), "Session started");

        let mut messages = vec![GREETING.to_string()];
        if let StepView::Active { prompt, .. } = self.sequencer.first_step() {
            messages.push(prompt.to_string());
        }
        IntakeReply::say(messages)
    }

    /// Store a photo under the current step. The first photo of a document
    /// step is also read for fields.
    pub async fn upload_photo(
        &self,
        id: &ClientId,
        bytes: Vec<u8>,
    ) -> Result<IntakeReply, IntakeError> {
        if bytes.is_empty() {
            return Err(IntakeError::NoImage);
        }
        let (handle, mut session) = self.acquire(id).await?;
        session.touch();

        let slot = self.sequencer.next_photo_slot(&session)?;
        let (storage_key, bytes) = self.store_photo(handle.scope(), slot, bytes).await?;
        let count = self
            .sequencer
            .append_photo(&mut session, storage_key.clone())?;
        tracing::info!(client = %id, category = %slot.category, count, "Photo received");

        let mut messages = Vec::new();
        if let (1, Some(doc_type)) = (count, slot.category.doc_type()) {
            match self.extract_with_timeout(bytes, doc_type).await {
                Ok(document) => {
                    messages.push(format!("Recognized: {}", document.summary()));
                    session.fields_mut().apply(&document);
                }
                Err(e) => {
                    tracing::warn!(
                        client = %id,
                        doc_type = %doc_type,
                        error = %e,
                        raw = e.raw_reply().unwrap_or_default(),
                        "Field extraction failed"
                    );
                    messages.push(EXTRACTION_UNAVAILABLE.to_string());
                }
            }
        }

        if !self.sessions.is_current(id, &handle) {
            tracing::info!(client = %id, "Session ended during upload, dropping photo");
            if let Err(e) = self.photos.remove(&storage_key) {
                tracing::warn!(error = %e, "Failed to remove orphaned photo");
            }
            return Err(SessionError::NotFound(id.clone()).into());
        }

        messages.push(MORE_PHOTOS_HINT.to_string());
        Ok(IntakeReply::say(messages))
    }

    /// Move to the next step. On the last step, generate the conclusion.
    pub async fn skip(&self, id: &ClientId) -> Result<IntakeReply, IntakeError> {
        let (handle, mut session) = self.acquire(id).await?;
        session.touch();

        if !self.sequencer.is_last_step(&session) {
            return match self.sequencer.advance(&mut session) {
                StepView::Active { prompt, .. } => Ok(IntakeReply::say([prompt])),
                StepView::Complete => Err(SessionError::AllStepsCompleted.into()),
            };
        }

        session.set_phase(SessionPhase::Finalizing);
        let snapshot = session.clone();
        drop(session);
        self.finalize(id, handle, snapshot).await
    }

    /// Drop the session and its photos. Does not wait for in-flight commands.
    pub fn cancel(&self, id: &ClientId) -> Result<IntakeReply, IntakeError> {
        let handle = self
            .sessions
            .remove(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;
        self.release(handle.scope());
        tracing::info!(client = %id, "Session cancelled");
        Ok(IntakeReply::say([CANCELLED_MESSAGE]))
    }

    /// Drop sessions idle for longer than `ttl`. Returns how many were dropped.
    pub fn expire_idle(&self, ttl: Duration) -> usize {
        let evicted = self.sessions.evict_idle(ttl);
        for handle in &evicted {
            self.release(handle.scope());
        }
        evicted.len()
    }

    // ── internals ──

    /// Lock the live session for `id` and reject commands it cannot take now.
    async fn acquire(
        &self,
        id: &ClientId,
    ) -> Result<(SessionHandle, OwnedMutexGuard<Session>), IntakeError> {
        let handle = self.sessions.get(id)?;
        let session = handle.lock_owned().await;
        // Cancelled or restarted while this command waited for the lock.
        if !self.sessions.is_current(id, &handle) {
            return Err(SessionError::NotFound(id.clone()).into());
        }
        if session.phase() == SessionPhase::Finalizing {
            return Err(SessionError::Busy.into());
        }
        Ok((handle, session))
    }

    /// Write the photo off the async runtime. The bytes come back for extraction.
    async fn store_photo(
        &self,
        scope: &str,
        slot: PhotoSlot,
        bytes: Vec<u8>,
    ) -> Result<(String, Vec<u8>), IntakeError> {
        let photos = Arc::clone(&self.photos);
        let scope = scope.to_string();
        let (stored, bytes) = tokio::task::spawn_blocking(move || {
            let key = PhotoKey {
                scope: &scope,
                category: slot.category,
                sequence: slot.sequence,
            };
            (photos.store(&key, &bytes), bytes)
        })
        .await
        .map_err(|e| IntakeError::Internal(format!("photo store task failed: {e}")))?;
        Ok((stored?, bytes))
    }

    async fn extract_with_timeout(
        &self,
        bytes: Vec<u8>,
        doc_type: DocType,
    ) -> Result<ExtractedDocument, ExtractionError> {
        let extractor = Arc::clone(&self.extractor);
        let task = tokio::task::spawn_blocking(move || extractor.extract_fields(&bytes, doc_type));
        match tokio::time::timeout(self.call_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ExtractionError::Task(join_err.to_string())),
            Err(_) => Err(ExtractionError::Timeout(self.call_timeout.as_secs())),
        }
    }

    async fn finalize(
        &self,
        id: &ClientId,
        handle: SessionHandle,
        snapshot: Session,
    ) -> Result<IntakeReply, IntakeError> {
        tracing::info!(
            client = %id,
            photos = snapshot.total_photos(),
            "All steps completed, generating conclusion"
        );

        let assembler = Arc::clone(&self.assembler);
        let renderer = Arc::clone(&self.renderer);
        let outcome = tokio::task::spawn_blocking(move || -> Result<CompletedReport, IntakeError> {
            let payload = assembler.assemble(&snapshot)?;
            let file = renderer.render(&payload)?;
            Ok(CompletedReport { file, payload })
        })
        .await
        .map_err(|e| IntakeError::Internal(format!("report task failed: {e}")))
        .and_then(|result| result);

        match outcome {
            Ok(report) => {
                if !self.sessions.remove_if_current(id, &handle) {
                    tracing::info!(client = %id, "Session ended during report generation, discarding report");
                    if let Err(e) = self.renderer.discard(&report.file) {
                        tracing::warn!(error = %e, "Failed to discard report");
                    }
                    return Err(SessionError::NotFound(id.clone()).into());
                }
                self.release(handle.scope());
                tracing::info!(client = %id, file = %report.file.file_name, "Conclusion delivered");

                let ready = format!("Conclusion is ready: {}", report.file.file_name);
                Ok(IntakeReply {
                    messages: vec![COMPLETION_MESSAGE.to_string(), ready],
                    finished: true,
                    report: Some(report),
                })
            }
            Err(e) => {
                if !self.sessions.is_current(id, &handle) {
                    return Err(SessionError::NotFound(id.clone()).into());
                }
                tracing::error!(client = %id, error = %e, "Conclusion generation failed");
                // Back to the last step so the client can retry with /skip.
                handle.lock().await.set_phase(SessionPhase::Collecting);
                Err(e)
            }
        }
    }

    fn release(&self, scope: &str) {
        if let Err(e) = self.photos.release_session(scope) {
            tracing::warn!(scope, error = %e, "Failed to release session photos");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, STEPS};
    use crate::pipeline::client::{MockVisionClient, RecordedCall};
    use crate::pipeline::report::SectionStatus;
    use crate::render::JsonReportRenderer;
    use crate::storage::MemoryPhotoStore;
    use crate::pipeline::client::ClientError;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x01];
    const IDENTITY_REPLY: &str = r#"```json
{ "full_name": "Иванов Иван Иванович", "id_number": "123456789", "id_date": "12.03.2020" }
```"#;

    struct Harness {
        service: Arc<IntakeService>,
        mock: Arc<MockVisionClient>,
        photos: Arc<MemoryPhotoStore>,
        _reports: tempfile::TempDir,
    }

    fn harness_with(mock: MockVisionClient, timeout: Duration) -> Harness {
        let mock = Arc::new(mock);
        let photos = Arc::new(MemoryPhotoStore::new());
        let reports = tempfile::tempdir().unwrap();
        let renderer = Arc::new(JsonReportRenderer::new(reports.path()).unwrap());
        let service = Arc::new(IntakeService::new(
            mock.clone(),
            photos.clone(),
            renderer,
            timeout,
        ));
        Harness {
            service,
            mock,
            photos,
            _reports: reports,
        }
    }

    /// Identity prompts get the identity reply; everything else a conclusion.
    fn default_responder(call: &RecordedCall) -> Result<String, ClientError> {
        if call.prompt.contains("identity card") {
            Ok(IDENTITY_REPLY.into())
        } else if call.images.is_empty() {
            Ok(r#"{"overall_state":"good","defects":"","recommendations":"none"}"#.into())
        } else {
            Ok(r#"[{"index":0,"description":"photo","defects":"","overall_state":"good"}]"#.into())
        }
    }

    fn harness() -> Harness {
        harness_with(
            MockVisionClient::from_fn(default_responder),
            Duration::from_secs(5),
        )
    }

    fn id() -> ClientId {
        ClientId::new("chat-42")
    }

    #[tokio::test]
    async fn start_greets_and_asks_for_first_document() {
        let h = harness();
        let reply = h.service.start(&id());
        assert_eq!(reply.messages[0], GREETING);
        assert_eq!(reply.messages[1], STEPS[0].prompt);
        assert!(!reply.finished);
    }

    #[tokio::test]
    async fn identity_extraction_fires_once_per_document_step() {
        let h = harness();
        h.service.start(&id());

        let first = h.service.upload_photo(&id(), JPEG.to_vec()).await.unwrap();
        assert!(first.messages[0].contains("Иванов Иван Иванович"));
        assert_eq!(first.messages.last().unwrap(), MORE_PHOTOS_HINT);

        let second = h.service.upload_photo(&id(), JPEG.to_vec()).await.unwrap();
        assert_eq!(second.messages, vec![MORE_PHOTOS_HINT.to_string()]);

        assert_eq!(h.mock.call_count(), 1);
        let handle = h.service.sessions().get(&id()).unwrap();
        let session = handle.lock().await;
        assert_eq!(session.photo_count(Category::IdCard), 2);
        assert_eq!(
            session.fields().identity.full_name.as_deref(),
            Some("Иванов Иван Иванович")
        );
    }

    #[tokio::test]
    async fn property_title_extraction_fires_once() {
        let h = harness_with(
            MockVisionClient::scripted(vec![
                Ok(r#"{"address": "г. Алматы, ул. Ключевая, дом 14", "cadastral_number": "03-046-140-1757"}"#.into()),
                Ok(r#"{"address": "somewhere else", "cadastral_number": "00-000-000-0000"}"#.into()),
            ]),
            Duration::from_secs(5),
        );
        h.service.start(&id());
        h.service.skip(&id()).await.unwrap();

        let first = h.service.upload_photo(&id(), JPEG.to_vec()).await.unwrap();
        assert!(first.messages[0].contains("03-046-140-1757"));
        let second = h.service.upload_photo(&id(), JPEG.to_vec()).await.unwrap();
        assert_eq!(second.messages, vec![MORE_PHOTOS_HINT.to_string()]);

        assert_eq!(h.mock.call_count(), 1);
        assert!(h.mock.calls()[0].prompt.contains("technical passport"));
        let handle = h.service.sessions().get(&id()).unwrap();
        let session = handle.lock().await;
        assert_eq!(session.photo_count(Category::TechPassport), 2);
        assert_eq!(
            session.fields().property.address.as_deref(),
            Some("г. Алматы, ул. Ключевая, дом 14")
        );
        assert_eq!(
            session.fields().property.cadastral_number.as_deref(),
            Some("03-046-140-1757")
        );
        assert!(session.fields().identity.full_name.is_none());
    }

    #[tokio::test]
    async fn reply_always_carries_report_key() {
        let h = harness();
        let reply = serde_json::to_value(h.service.start(&id())).unwrap();
        assert!(reply.as_object().unwrap().contains_key("report"));
        assert!(reply["report"].is_null());
    }

    #[tokio::test]
    async fn failed_extraction_still_keeps_photo() {
        let h = harness_with(
            MockVisionClient::new("I cannot read this."),
            Duration::from_secs(5),
        );
        h.service.start(&id());

        let reply = h.service.upload_photo(&id(), JPEG.to_vec()).await.unwrap();

        assert_eq!(reply.messages[0], EXTRACTION_UNAVAILABLE);
        assert_eq!(h.photos.len(), 1);
        let handle = h.service.sessions().get(&id()).unwrap();
        assert_eq!(handle.lock().await.photo_count(Category::IdCard), 1);
    }

    #[tokio::test]
    async fn slow_extraction_times_out_without_losing_photo() {
        let h = harness_with(
            MockVisionClient::new(IDENTITY_REPLY).with_delay(Duration::from_millis(500)),
            Duration::from_millis(50),
        );
        h.service.start(&id());

        let reply = h.service.upload_photo(&id(), JPEG.to_vec()).await.unwrap();

        assert_eq!(reply.messages[0], EXTRACTION_UNAVAILABLE);
        let handle = h.service.sessions().get(&id()).unwrap();
        let session = handle.lock().await;
        assert_eq!(session.photo_count(Category::IdCard), 1);
        assert!(session.fields().identity.full_name.is_none());
    }

    #[tokio::test]
    async fn structural_photos_do_not_trigger_extraction() {
        let h = harness();
        h.service.start(&id());
        h.service.skip(&id()).await.unwrap();
        h.service.skip(&id()).await.unwrap();

        for _ in 0..3 {
            h.service.upload_photo(&id(), JPEG.to_vec()).await.unwrap();
        }

        assert_eq!(h.mock.call_count(), 0);
        let handle = h.service.sessions().get(&id()).unwrap();
        let session = handle.lock().await;
        let keys: Vec<&str> = session
            .photos(Category::Facade)
            .iter()
            .map(|p| p.storage_key.as_str())
            .collect();
        assert_eq!(keys.len(), 3);
        assert!(keys[0].ends_with("facade_1.jpg"));
        assert!(keys[2].ends_with("facade_3.jpg"));
    }

    #[tokio::test]
    async fn empty_upload_rejected() {
        let h = harness();
        h.service.start(&id());
        assert!(matches!(
            h.service.upload_photo(&id(), Vec::new()).await,
            Err(IntakeError::NoImage)
        ));
    }

    #[tokio::test]
    async fn skip_walks_every_step_then_finishes() {
        let h = harness();
        h.service.start(&id());

        for step in &STEPS[1..] {
            let reply = h.service.skip(&id()).await.unwrap();
            assert_eq!(reply.messages, vec![step.prompt.to_string()]);
            assert!(!reply.finished);
        }

        let last = h.service.skip(&id()).await.unwrap();
        assert!(last.finished);
        assert_eq!(last.messages[0], COMPLETION_MESSAGE);
        let report = last.report.unwrap();
        assert!(report.file.path.exists());
        assert!(h.service.sessions().is_empty());
    }

    #[tokio::test]
    async fn end_to_end_identity_then_skips() {
        let h = harness_with(
            MockVisionClient::new(
                r#"{"fio":"Иванов Иван Иванович","id_number":"123456789","id_date":"12.03.2020"}"#,
            ),
            Duration::from_secs(5),
        );
        h.service.start(&id());
        h.service.upload_photo(&id(), JPEG.to_vec()).await.unwrap();

        let mut reply = h.service.skip(&id()).await.unwrap();
        while !reply.finished {
            reply = h.service.skip(&id()).await.unwrap();
        }

        let report = reply.report.unwrap();
        assert_eq!(report.payload.object.full_name, "Иванов Иван Иванович");
        assert!(report
            .payload
            .sections
            .iter()
            .all(|s| s.status == SectionStatus::NoPhotosProvided));
        // Only the identity extraction reached the model.
        assert_eq!(h.mock.call_count(), 1);
        assert!(h.photos.is_empty(), "photos released after completion");
        assert!(matches!(
            h.service.skip(&id()).await,
            Err(IntakeError::Session(SessionError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn cancel_then_commands_fail_with_not_found() {
        let h = harness();
        h.service.start(&id());
        h.service.upload_photo(&id(), JPEG.to_vec()).await.unwrap();

        let reply = h.service.cancel(&id()).unwrap();
        assert_eq!(reply.messages, vec![CANCELLED_MESSAGE.to_string()]);
        assert!(h.photos.is_empty());

        assert!(matches!(
            h.service.upload_photo(&id(), JPEG.to_vec()).await,
            Err(IntakeError::Session(SessionError::NotFound(_)))
        ));
        assert!(matches!(
            h.service.skip(&id()).await,
            Err(IntakeError::Session(SessionError::NotFound(_)))
        ));
        assert!(matches!(
            h.service.cancel(&id()),
            Err(IntakeError::Session(SessionError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn commands_without_start_fail_with_not_found() {
        let h = harness();
        let err = h.service.skip(&id()).await.unwrap_err();
        assert_eq!(err.user_message(), NO_SESSION_MESSAGE);
    }

    #[tokio::test]
    async fn restart_discards_previous_session() {
        let h = harness();
        h.service.start(&id());
        h.service.upload_photo(&id(), JPEG.to_vec()).await.unwrap();
        h.service.skip(&id()).await.unwrap();

        h.service.start(&id());

        assert!(h.photos.is_empty());
        let handle = h.service.sessions().get(&id()).unwrap();
        let session = handle.lock().await;
        assert_eq!(session.step_index(), 0);
        assert_eq!(session.total_photos(), 0);
    }

    #[tokio::test]
    async fn cancel_during_extraction_discards_upload() {
        let h = harness_with(
            MockVisionClient::new(IDENTITY_REPLY).with_delay(Duration::from_millis(200)),
            Duration::from_secs(5),
        );
        h.service.start(&id());

        let service = Arc::clone(&h.service);
        let upload = tokio::spawn(async move { service.upload_photo(&id(), JPEG.to_vec()).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.service.cancel(&id()).unwrap();

        let result = upload.await.unwrap();
        assert!(matches!(
            result,
            Err(IntakeError::Session(SessionError::NotFound(_)))
        ));
        assert!(h.photos.is_empty());
    }

    #[tokio::test]
    async fn commands_during_finalization_are_busy() {
        let h = harness_with(
            MockVisionClient::from_fn(default_responder).with_delay(Duration::from_millis(300)),
            Duration::from_secs(5),
        );
        h.service.start(&id());
        for _ in 0..STEPS.len() - 1 {
            h.service.skip(&id()).await.unwrap();
        }
        // A photo on the last step forces a real model call during finalization.
        h.service.upload_photo(&id(), JPEG.to_vec()).await.unwrap();

        let service = Arc::clone(&h.service);
        let finishing = tokio::spawn(async move { service.skip(&id()).await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let busy = h.service.upload_photo(&id(), JPEG.to_vec()).await;
        assert!(matches!(
            busy,
            Err(IntakeError::Session(SessionError::Busy))
        ));

        let done = finishing.await.unwrap().unwrap();
        assert!(done.finished);
        let report = done.report.unwrap();
        let windows = report
            .payload
            .sections
            .iter()
            .find(|s| s.category == Category::Windows)
            .unwrap();
        assert_eq!(windows.status, SectionStatus::Analyzed);
    }

    #[tokio::test]
    async fn failed_assembly_returns_session_to_last_step() {
        let h = harness();
        h.service.start(&id());
        for _ in 0..STEPS.len() - 1 {
            h.service.skip(&id()).await.unwrap();
        }
        h.service.upload_photo(&id(), JPEG.to_vec()).await.unwrap();
        // Lose the stored bytes so the report cannot load them.
        let scope = h.service.sessions().get(&id()).unwrap().scope().to_string();
        h.photos.release_session(&scope).unwrap();

        let err = h.service.skip(&id()).await.unwrap_err();
        assert!(matches!(err, IntakeError::Report(_)));
        assert_eq!(err.user_message(), PROCESSING_ERROR);

        let handle = h.service.sessions().get(&id()).unwrap();
        let session = handle.lock().await;
        assert_eq!(session.phase(), SessionPhase::Collecting);
        assert_eq!(session.step_index(), STEPS.len() - 1);
    }

    #[tokio::test]
    async fn sessions_for_different_clients_are_independent() {
        let h = harness();
        let a = ClientId::new("a");
        let b = ClientId::new("b");
        h.service.start(&a);
        h.service.start(&b);

        h.service.skip(&a).await.unwrap();
        h.service.skip(&a).await.unwrap();
        h.service.upload_photo(&b, JPEG.to_vec()).await.unwrap();

        let a_step = h.service.sessions().get(&a).unwrap().lock().await.step_index();
        let b_step = h.service.sessions().get(&b).unwrap().lock().await.step_index();
        assert_eq!(a_step, 2);
        assert_eq!(b_step, 0);
    }

    #[tokio::test]
    async fn expire_idle_releases_photos() {
        let h = harness();
        h.service.start(&id());
        h.service.skip(&id()).await.unwrap();
        h.service.skip(&id()).await.unwrap();
        h.service.upload_photo(&id(), JPEG.to_vec()).await.unwrap();
        h.service
            .sessions()
            .get(&id())
            .unwrap()
            .lock()
            .await
            .backdate(Duration::from_secs(3600));

        assert_eq!(h.service.expire_idle(Duration::from_secs(60)), 1);
        assert!(h.photos.is_empty());
        assert!(h.service.sessions().is_empty());
    }
}

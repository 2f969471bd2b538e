//! Workflow controller.
//!
//! Owns the state machine and the per-run [`WorkflowData`]. Phases run as
//! spawned tasks; every mutation they make is checked against the run
//! generation so work belonging to a reset run can never touch a newer one.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc::UnboundedReceiver, oneshot, watch};
use uuid::Uuid;

use super::calls::{CallKind, CallTracker};
use super::clipboard::{Clipboard, LogClipboard};
use super::data::{Phase1Data, ResumeInput, WorkflowData};
use super::error::{WorkflowError, WorkflowResult};
use super::events::{EventBus, WorkflowEvent};
use super::state::WorkflowState;
use crate::core::{process_chunked, retry_async, Clock, Config, SystemClock};
use crate::document::{
    apply_rewrites, decode_blob, encode_blob, DocxProcessor, SuggestionDetector, SuggestionKind,
    TrackedChangeDetector, VisibleMarkupTransformer, XmlTransformer, ZipDocxProcessor,
};
use crate::gateway::{normalize_counter, DocumentGateway};
use crate::version::{
    sanitize_comments, validate, VersionHistoryEntry, VersionIdentifier, VersionType,
};

/// Drives one document through export, transformation and versioning.
///
/// Cloning yields another handle to the same controller. Methods that start
/// work must be called from within a tokio runtime.
#[derive(Clone)]
pub struct WorkflowController {
    shared: Arc<Shared>,
}

/// Builder for [`WorkflowController`].
pub struct WorkflowControllerBuilder {
    gateway: Arc<dyn DocumentGateway>,
    detector: Arc<dyn SuggestionDetector>,
    transformer: Arc<dyn XmlTransformer>,
    docx: Arc<dyn DocxProcessor>,
    clipboard: Arc<dyn Clipboard>,
    clock: Arc<dyn Clock>,
    config: Config,
}

struct Shared {
    gateway: Arc<dyn DocumentGateway>,
    detector: Arc<dyn SuggestionDetector>,
    transformer: Arc<dyn XmlTransformer>,
    docx: Arc<dyn DocxProcessor>,
    clipboard: Arc<dyn Clipboard>,
    clock: Arc<dyn Clock>,
    config: Config,
    inner: Mutex<Inner>,
}

struct Inner {
    state: WorkflowState,
    data: WorkflowData,
    /// Bumped by every start and reset
    generation: u64,
    calls: CallTracker,
    events: EventBus,
    state_tx: watch::Sender<WorkflowState>,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    ExportAndAnalyze,
    TransformAndReplace,
    Finalize,
}

enum Next {
    Spawn(u64, Phase),
    Fail(u64, WorkflowError),
    Nothing,
}

fn kb(bytes: usize) -> String {
    format!("{:.1} KB", bytes as f64 / 1024.0)
}

impl WorkflowControllerBuilder {
    pub fn detector(mut self, detector: Arc<dyn SuggestionDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn transformer(mut self, transformer: Arc<dyn XmlTransformer>) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn docx_processor(mut self, docx: Arc<dyn DocxProcessor>) -> Self {
        self.docx = docx;
        self
    }

    pub fn clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = clipboard;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> WorkflowController {
        let (state_tx, _) = watch::channel(WorkflowState::Idle);
        WorkflowController {
            shared: Arc::new(Shared {
                gateway: self.gateway,
                detector: self.detector,
                transformer: self.transformer,
                docx: self.docx,
                clipboard: self.clipboard,
                clock: self.clock,
                config: self.config,
                inner: Mutex::new(Inner {
                    state: WorkflowState::Idle,
                    data: WorkflowData::default(),
                    generation: 0,
                    calls: CallTracker::default(),
                    events: EventBus::default(),
                    state_tx,
                }),
            }),
        }
    }
}

impl WorkflowController {
    /// Controller with the default collaborators and configuration.
    pub fn new(gateway: Arc<dyn DocumentGateway>) -> Self {
        Self::builder(gateway).build()
    }

    pub fn builder(gateway: Arc<dyn DocumentGateway>) -> WorkflowControllerBuilder {
        WorkflowControllerBuilder {
            gateway,
            detector: Arc::new(TrackedChangeDetector),
            transformer: Arc::new(VisibleMarkupTransformer::default()),
            docx: Arc::new(ZipDocxProcessor),
            clipboard: Arc::new(LogClipboard),
            clock: Arc::new(SystemClock),
            config: Config::default(),
        }
    }

    /// Begin a new run. Ignored unless the controller is idle.
    pub fn start_workflow(&self) {
        let generation = {
            let mut inner = self.shared.inner.lock();
            if inner.state != WorkflowState::Idle {
                tracing::warn!(state = %inner.state, "start ignored: a workflow is already in progress");
                return;
            }

            inner.generation += 1;
            let run_id = Uuid::new_v4();
            inner.data = WorkflowData::for_run(run_id);
            tracing::info!(%run_id, "starting workflow");
            inner.set_state(WorkflowState::P1Exporting);
            inner.generation
        };

        self.shared.spawn_phase(generation, Phase::ExportAndAnalyze);
    }

    /// Continue from a pause. Ignored unless the controller is paused.
    ///
    /// At the first pause `input` is ignored. At the second pause it decides
    /// whether the run is official; an official run without a committee and
    /// comments fails before anything is written.
    pub fn resume_workflow(&self, input: ResumeInput) {
        let next = {
            let mut inner = self.shared.inner.lock();
            let generation = inner.generation;

            match inner.state {
                WorkflowState::Version1Pause => match inner.enter(WorkflowState::P2Transforming) {
                    Ok(()) => Next::Spawn(generation, Phase::TransformAndReplace),
                    Err(e) => Next::Fail(generation, e),
                },
                WorkflowState::Version2Pause if input.is_official => {
                    let errors = input.official_errors();
                    if errors.is_empty() {
                        inner.data.phase2.is_official = true;
                        inner.data.phase3.committee = input.committee;
                        inner.data.phase3.comments = input.comments;
                        match inner.enter(WorkflowState::P3Finalizing) {
                            Ok(()) => Next::Spawn(generation, Phase::Finalize),
                            Err(e) => Next::Fail(generation, e),
                        }
                    } else {
                        Next::Fail(generation, WorkflowError::Validation(errors))
                    }
                }
                WorkflowState::Version2Pause => {
                    inner.data.phase2.is_official = false;
                    match inner.complete() {
                        Ok(()) => Next::Nothing,
                        Err(e) => Next::Fail(generation, e),
                    }
                }
                other => {
                    tracing::warn!(state = %other, "resume ignored: workflow is not paused");
                    Next::Nothing
                }
            }
        };

        match next {
            Next::Spawn(generation, phase) => self.shared.spawn_phase(generation, phase),
            Next::Fail(generation, error) => self.shared.fail(generation, error),
            Next::Nothing => {}
        }
    }

    /// Abandon the current run and return to `Idle`.
    ///
    /// In-flight gateway calls are not aborted; their results are discarded.
    pub fn reset(&self) {
        let mut inner = self.shared.inner.lock();
        inner.generation += 1;
        if let Some(kind) = inner.calls.invalidate() {
            tracing::info!(operation = kind.label(), "reset abandoned an in-flight gateway call");
        }
        inner.data = WorkflowData::default();
        inner.set_state(WorkflowState::Idle);
    }

    pub fn state(&self) -> WorkflowState {
        self.shared.inner.lock().state
    }

    pub fn is_paused(&self) -> bool {
        self.state().is_paused()
    }

    pub fn is_complete(&self) -> bool {
        self.state() == WorkflowState::Complete
    }

    /// Copy of the current run's data.
    pub fn workflow_data(&self) -> WorkflowData {
        self.shared.inner.lock().data.clone()
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> UnboundedReceiver<WorkflowEvent> {
        self.shared.inner.lock().events.subscribe()
    }

    /// Watch the current state.
    pub fn watch_state(&self) -> watch::Receiver<WorkflowState> {
        self.shared.inner.lock().state_tx.subscribe()
    }

    /// Wait until no phase is executing and return the state reached.
    ///
    /// Every event belonging to that state change has been emitted by the
    /// time this returns.
    pub async fn settled(&self) -> WorkflowState {
        let mut rx = self.watch_state();
        let _ = rx.wait_for(|state| !state.is_busy()).await;
        // The lock is held until the publishing section has emitted everything.
        self.state()
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }
}

impl fmt::Debug for WorkflowController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("WorkflowController")
            .field("state", &inner.state)
            .field("run_id", &inner.data.run_id)
            .field("active_call", &inner.calls.active())
            .finish()
    }
}

impl Inner {
    /// Checked transition.
    fn enter(&mut self, to: WorkflowState) -> WorkflowResult<()> {
        if !self.state.can_transition_to(to) {
            return Err(WorkflowError::IllegalTransition { from: self.state, to });
        }
        self.set_state(to);
        Ok(())
    }

    fn set_state(&mut self, to: WorkflowState) {
        let old = self.state;
        if old == to {
            return;
        }

        self.state = to;
        self.state_tx.send_replace(to);
        tracing::info!(from = %old, to = %to, "workflow state changed");
        self.events.emit(&WorkflowEvent::StateChanged { old, new: to, data: self.data.clone() });
    }

    fn status(&mut self, message: String) {
        tracing::debug!(state = %self.state, "{}", message);
        self.events.emit(&WorkflowEvent::Status { state: self.state, message });
    }

    fn complete(&mut self) -> WorkflowResult<()> {
        let summary = self.data.summarize();
        self.data.summary = Some(summary.clone());
        self.enter(WorkflowState::Complete)?;
        tracing::info!(
            suggestions = summary.suggestions_count,
            official = summary.is_official,
            "workflow complete"
        );
        self.events.emit(&WorkflowEvent::Completed { summary });
        Ok(())
    }
}

impl Shared {
    /// Run `f` against the record if `generation` is still the live run.
    fn run<R>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut Inner) -> WorkflowResult<R>,
    ) -> WorkflowResult<R> {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return Err(WorkflowError::Superseded);
        }
        f(&mut inner)
    }

    fn status(&self, generation: u64, message: impl Into<String>) {
        let message = message.into();
        let _ = self.run(generation, |inner| {
            inner.status(message);
            Ok(())
        });
    }

    fn fail(&self, generation: u64, error: WorkflowError) {
        if matches!(error, WorkflowError::Superseded) {
            tracing::debug!("phase stopped: run was reset");
            return;
        }

        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.state == WorkflowState::Error {
            tracing::debug!(error = %error, "ignoring failure from a finished run");
            return;
        }

        let failed_in = inner.state;
        inner.calls.invalidate();
        tracing::error!(state = %failed_in, cause = ?error.cause(), "workflow failed: {}", error);

        inner.set_state(WorkflowState::Error);
        let event = WorkflowEvent::Failed {
            message: error.to_string(),
            cause: error.cause(),
            detail: error.detail(),
            state: failed_in,
            data: inner.data.clone(),
        };
        inner.events.emit(&event);
    }

    fn spawn_phase(self: &Arc<Self>, generation: u64, phase: Phase) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.fail(generation, WorkflowError::NoRuntime);
            return;
        };

        let shared = Arc::clone(self);
        runtime.spawn(async move {
            tracing::debug!(?phase, "phase started");
            let result = match phase {
                Phase::ExportAndAnalyze => shared.export_and_analyze(generation).await,
                Phase::TransformAndReplace => shared.transform_and_replace(generation).await,
                Phase::Finalize => shared.finalize(generation).await,
            };
            if let Err(error) = result {
                shared.fail(generation, error);
            }
        });
    }

    /// Gateway call with timeout, stale-result guard and the configured retry policy.
    async fn call<T, F, Fut>(self: &Arc<Self>, generation: u64, kind: CallKind, op: F) -> WorkflowResult<T>
    where
        F: Fn(Arc<dyn DocumentGateway>) -> Fut,
        Fut: Future<Output = WorkflowResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let retry = self.config.gateway.retry.to_retry_config();
        retry_async(
            &retry,
            |attempt| {
                if attempt > 1 {
                    self.status(generation, format!("{} failed, retrying (attempt {})", kind.label(), attempt));
                }
                self.tracked_call(generation, kind, op(Arc::clone(&self.gateway)))
            },
            WorkflowError::is_retryable,
        )
        .await
        .into_result()
    }

    async fn tracked_call<T, Fut>(
        self: &Arc<Self>,
        generation: u64,
        kind: CallKind,
        request: Fut,
    ) -> WorkflowResult<T>
    where
        Fut: Future<Output = WorkflowResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let id = self.run(generation, |inner| Ok(inner.calls.begin(kind)))?;
        let timeout = kind.timeout(&self.config.gateway);
        let (tx, mut rx) = oneshot::channel();

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let result = request.await;
            let current = shared.inner.lock().calls.settle(id);
            if current {
                let _ = tx.send(result);
            } else {
                tracing::debug!(call = %id, operation = kind.label(), "dropping late gateway result");
            }
        });

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                // The request task ended without reporting.
                let still_waiting = self.inner.lock().calls.settle(id);
                if still_waiting {
                    Err(WorkflowError::rejected(kind, Some("call ended without a result".into())))
                } else {
                    Err(WorkflowError::Superseded)
                }
            }
            Err(_) => {
                let expired = self.inner.lock().calls.settle(id);
                if expired {
                    tracing::warn!(call = %id, operation = kind.label(), ?timeout, "gateway call timed out");
                    Err(WorkflowError::Timeout { operation: kind.label(), after: timeout })
                } else {
                    // Settled right at the deadline, or invalidated by reset.
                    rx.try_recv().unwrap_or(Err(WorkflowError::Superseded))
                }
            }
        }
    }

    async fn version_counter(self: &Arc<Self>, generation: u64) -> WorkflowResult<u64> {
        let raw = self
            .call(generation, CallKind::VersionCounter, |gateway| async move {
                Ok(gateway.version_counter(true).await)
            })
            .await;

        match raw {
            Ok(value) => Ok(normalize_counter(&value)),
            Err(WorkflowError::Superseded) => Err(WorkflowError::Superseded),
            Err(e) => {
                tracing::warn!(error = %e, "version counter unavailable, defaulting to 1");
                self.status(generation, "Version counter unavailable, using 1");
                Ok(1)
            }
        }
    }

    /// Best effort; a failed copy only produces a status message.
    fn copy_to_clipboard(&self, inner: &mut Inner, version: &VersionIdentifier) {
        if !self.config.clipboard.enabled {
            return;
        }
        match self.clipboard.copy(version.as_str()) {
            Ok(()) => inner.status(format!("Version number {} copied to clipboard", version)),
            Err(e) => {
                tracing::warn!(error = %e, "clipboard copy failed");
                inner.status(format!("Copy version number {} manually ({})", version, e));
            }
        }
    }

    /// Phase 1: export, unpack, detect suggestions, generate the Before identifier.
    async fn export_and_analyze(self: &Arc<Self>, generation: u64) -> WorkflowResult<()> {
        self.status(generation, "Exporting document...");
        let export = self
            .call(generation, CallKind::Export, |gateway| async move {
                let response = gateway
                    .export_document()
                    .await
                    .map_err(|e| WorkflowError::transport(CallKind::Export, e))?;
                if !response.success {
                    return Err(WorkflowError::rejected(CallKind::Export, response.error));
                }
                Ok(response)
            })
            .await?;

        let encoded = export.data.ok_or_else(|| {
            WorkflowError::rejected(CallKind::Export, Some("export returned no document data".into()))
        })?;
        let docx = decode_blob(&encoded)?;
        let name = export.metadata.map(|m| m.doc_name).filter(|n| !n.is_empty());
        self.status(
            generation,
            format!("Exported {} ({})", name.as_deref().unwrap_or("document"), kb(docx.len())),
        );

        self.run(generation, |inner| inner.enter(WorkflowState::P1Analyzing))?;
        let package = self.docx.unpack(&docx)?;
        let xml = package.document_xml()?;
        self.status(
            generation,
            format!("Unpacked {} parts, document.xml is {}", package.entries().len(), kb(xml.len())),
        );

        let suggestions = self.detector.extract_suggestions(&xml)?;
        self.status(generation, format!("Found {} suggestions, analyzing...", suggestions.len()));

        let analysis = process_chunked(
            &suggestions,
            &self.config.chunking,
            |_, suggestion| suggestion.kind,
            |progress| {
                self.status(
                    generation,
                    format!(
                        "Analyzed {}/{} suggestions ({}%)",
                        progress.processed,
                        progress.total,
                        progress.percent()
                    ),
                );
            },
        )
        .await;
        let insertions =
            analysis.results.iter().filter(|kind| **kind == SuggestionKind::Insertion).count();
        let deletions = analysis.results.len() - insertions;
        self.status(generation, format!("Found {} insertions and {} deletions", insertions, deletions));

        let counter = self.version_counter(generation).await?;
        let version = VersionIdentifier::generate(counter, VersionType::Before, self.clock.now())?;

        self.run(generation, |inner| {
            inner.data.version_counter = Some(counter);
            inner.data.phase1 = Phase1Data {
                exported_docx_base64: Some(encoded),
                document_xml: Some(xml),
                suggestions,
                version_number: Some(version.clone()),
                package: Some(Arc::new(package)),
            };
            inner.enter(WorkflowState::Version1Pause)?;
            self.copy_to_clipboard(inner, &version);
            Ok(())
        })
    }

    /// Phase 2: transform, rebuild, replace, generate the After identifier.
    async fn transform_and_replace(self: &Arc<Self>, generation: u64) -> WorkflowResult<()> {
        let (xml, suggestions, package, counter) = self.run(generation, |inner| {
            let data = &inner.data;
            Ok((
                data.phase1.document_xml.clone().ok_or(WorkflowError::MissingData("document XML"))?,
                data.phase1.suggestions.clone(),
                data.phase1.package.clone().ok_or(WorkflowError::MissingData("DOCX package"))?,
                data.version_counter.ok_or(WorkflowError::MissingData("version counter"))?,
            ))
        })?;

        self.status(generation, format!("Transforming {} suggestions...", suggestions.len()));
        let transformer = Arc::clone(&self.transformer);
        let rewrites = process_chunked(
            &suggestions,
            &self.config.chunking,
            |_, suggestion| transformer.rewrite(suggestion),
            |progress| {
                self.status(
                    generation,
                    format!("Transformed {}/{} suggestions", progress.processed, progress.total),
                );
            },
        )
        .await;
        let modified = apply_rewrites(&xml, &suggestions, &rewrites.results)?;
        self.status(generation, format!("Transformed XML ({})", kb(modified.len())));

        self.run(generation, |inner| {
            inner.data.phase2.modified_xml = Some(modified.clone());
            inner.enter(WorkflowState::P2Rebuilding)
        })?;

        let rebuilt = self.docx.repack(&package, &modified)?;
        let encoded = encode_blob(&rebuilt);
        self.status(
            generation,
            format!("Rebuilt DOCX ({}), encoded payload is {}", kb(rebuilt.len()), kb(encoded.len())),
        );

        self.run(generation, |inner| {
            inner.data.phase2.rebuilt_docx_base64 = Some(encoded.clone());
            inner.enter(WorkflowState::P2Replacing)
        })?;

        self.status(generation, "Replacing document...");
        let replaced = self
            .call(generation, CallKind::Replace, move |gateway| {
                let payload = encoded.clone();
                async move {
                    let response = gateway
                        .replace_document(payload)
                        .await
                        .map_err(|e| WorkflowError::transport(CallKind::Replace, e))?;
                    if !response.success {
                        return Err(WorkflowError::rejected(CallKind::Replace, response.error));
                    }
                    Ok(response)
                }
            })
            .await?;
        if let Some(details) = replaced.replacement_details {
            self.status(generation, format!("Document replaced at {}", details.replaced_at));
        }

        let version = VersionIdentifier::generate(counter, VersionType::After, self.clock.now())?;
        self.run(generation, |inner| {
            inner.data.phase2.version_number = Some(version.clone());
            inner.enter(WorkflowState::Version2Pause)?;
            self.copy_to_clipboard(inner, &version);
            Ok(())
        })
    }

    /// Phase 3: generate the Official identifier and write the history entry.
    async fn finalize(self: &Arc<Self>, generation: u64) -> WorkflowResult<()> {
        let (counter, committee, comments) = self.run(generation, |inner| {
            let data = &inner.data;
            Ok((
                data.version_counter.ok_or(WorkflowError::MissingData("version counter"))?,
                data.phase3.committee.clone().unwrap_or_default(),
                data.phase3.comments.clone().unwrap_or_default(),
            ))
        })?;

        let version = VersionIdentifier::generate(counter, VersionType::Official, self.clock.now())?;
        let timestamp = version.parse()?.format_for_display();
        let entry = VersionHistoryEntry {
            version_number: version.to_string(),
            committee: self.config.committee_display_name(&committee),
            timestamp: timestamp.clone(),
            comments: sanitize_comments(&comments),
        };

        self.run(generation, |inner| {
            let phase3 = &mut inner.data.phase3;
            phase3.version_number = Some(version.clone());
            phase3.timestamp = Some(timestamp);
            phase3.committee = Some(entry.committee.clone());
            phase3.comments = Some(entry.comments.clone());
            Ok(())
        })?;

        let report = validate(&entry);
        if !report.valid {
            return Err(WorkflowError::Validation(report.errors));
        }

        self.status(generation, format!("Writing version history entry {}...", version));
        self.call(generation, CallKind::WriteHistory, move |gateway| {
            let entry = entry.clone();
            async move {
                let response = gateway
                    .write_version_history(entry)
                    .await
                    .map_err(|e| WorkflowError::transport(CallKind::WriteHistory, e))?;
                if !response.success {
                    return Err(WorkflowError::rejected(CallKind::WriteHistory, response.error));
                }
                Ok(())
            }
        })
        .await?;

        self.status(generation, "Version history updated");
        self.run(generation, |inner| inner.complete())
    }
}

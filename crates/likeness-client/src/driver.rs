use crate::transport::ClassifierTransport;
use likeness_core::{
    present, ClassifyError, Completion, Outcome, PipelineState, Presenter, RequestTag, Response,
    UploadPipeline, UploadedFile,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("{0}")]
    Rejected(#[from] ClassifyError),
    #[error("pipeline task exited")]
    ChannelClosed,
}

/// How a submission ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled {
    /// The service answered (or failed) and the pipeline settled on this outcome.
    Completed(Outcome),
    /// The file was replaced or removed before the response arrived.
    Superseded,
}

/// A submission accepted by the pipeline, awaiting its response.
pub struct PendingOutcome {
    tag: RequestTag,
    rx: oneshot::Receiver<Settled>,
}

impl PendingOutcome {
    pub fn tag(&self) -> RequestTag {
        self.tag
    }

    /// Wait until the submission settles.
    pub async fn wait(self) -> Result<Settled, DriverError> {
        self.rx.await.map_err(|_| DriverError::ChannelClosed)
    }
}

/// Messages sent from handles to the pipeline task.
enum PipelineEvent {
    FileAdded(UploadedFile),
    FileRemoved,
    Submit {
        reply: oneshot::Sender<Result<PendingOutcome, ClassifyError>>,
    },
    Snapshot {
        reply: oneshot::Sender<PipelineState>,
    },
}

/// Network completion posted back to the pipeline task.
struct Completed {
    tag: RequestTag,
    response: Response,
}

/// Clone-safe handle to the pipeline task.
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<PipelineEvent>,
}

impl PipelineHandle {
    /// Hand a newly picked file to the pipeline, replacing any held file.
    pub async fn add_file(&self, file: UploadedFile) -> Result<(), DriverError> {
        self.send(PipelineEvent::FileAdded(file)).await
    }

    /// Drop the held file.
    pub async fn remove_file(&self) -> Result<(), DriverError> {
        self.send(PipelineEvent::FileRemoved).await
    }

    /// Submit the held file. Returns immediately; the network call runs in
    /// the background and settles the returned [`PendingOutcome`].
    pub async fn submit(&self) -> Result<PendingOutcome, DriverError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(PipelineEvent::Submit { reply: reply_tx }).await?;
        let pending = reply_rx.await.map_err(|_| DriverError::ChannelClosed)??;
        Ok(pending)
    }

    /// Pick `file`, submit it, and wait for the outcome.
    pub async fn classify(&self, file: UploadedFile) -> Result<Settled, DriverError> {
        self.add_file(file).await?;
        self.submit().await?.wait().await
    }

    /// Current pipeline state.
    pub async fn state(&self) -> Result<PipelineState, DriverError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(PipelineEvent::Snapshot { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| DriverError::ChannelClosed)
    }

    async fn send(&self, event: PipelineEvent) -> Result<(), DriverError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| DriverError::ChannelClosed)
    }
}

/// Spawn the pipeline task on the current tokio runtime.
///
/// The task owns the pipeline and the presenter and handles one event at a
/// time. Network calls run as separate tasks and post their completion back
/// to it. The task exits once every [`PipelineHandle`] is dropped.
pub fn spawn_pipeline(
    transport: Arc<dyn ClassifierTransport>,
    presenter: Box<dyn Presenter + Send>,
) -> PipelineHandle {
    let (tx, mut events) = mpsc::channel::<PipelineEvent>(16);
    let (done_tx, mut completions) = mpsc::unbounded_channel::<Completed>();

    let mut driver = Driver {
        pipeline: UploadPipeline::new(),
        presenter,
        transport,
        done_tx,
        waiter: None,
    };

    tokio::spawn(async move {
        tracing::debug!("pipeline task started");
        driver.render();
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => driver.handle(event),
                    None => break,
                },
                Some(done) = completions.recv() => driver.complete(done),
            }
        }
        tracing::debug!("pipeline task exiting");
    });

    PipelineHandle { tx }
}

struct Driver {
    pipeline: UploadPipeline,
    presenter: Box<dyn Presenter + Send>,
    transport: Arc<dyn ClassifierTransport>,
    done_tx: mpsc::UnboundedSender<Completed>,
    /// Notified when the live request settles or is superseded.
    waiter: Option<(RequestTag, oneshot::Sender<Settled>)>,
}

impl Driver {
    fn handle(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::FileAdded(file) => {
                tracing::info!(name = %file.name(), mime = %file.mime(), "file added");
                let superseded = self.pipeline.file_added(file);
                self.supersede(superseded);
                self.render();
            }
            PipelineEvent::FileRemoved => {
                tracing::info!("file removed");
                let superseded = self.pipeline.file_removed();
                self.supersede(superseded);
                self.render();
            }
            PipelineEvent::Submit { reply } => {
                let result = self.start_submission();
                match &result {
                    // Transient notice; the pipeline state is unchanged.
                    Err(err @ ClassifyError::NoFileSelected) => {
                        tracing::info!(error = %err, "submission rejected");
                        self.presenter.show_error(&err.to_string());
                    }
                    // The loading panel stays up while the live request runs.
                    Err(err) => tracing::info!(error = %err, "submission rejected"),
                    Ok(_) => {}
                }
                let _ = reply.send(result);
            }
            PipelineEvent::Snapshot { reply } => {
                let _ = reply.send(self.pipeline.state().clone());
            }
        }
    }

    fn start_submission(&mut self) -> Result<PendingOutcome, ClassifyError> {
        let submission = self.pipeline.submit()?;
        let tag = submission.tag;
        tracing::info!(file = %tag.file, seq = tag.seq, "submitting");
        self.render();

        let transport = Arc::clone(&self.transport);
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let response = transport.classify(&submission.image_data).await;
            let _ = done_tx.send(Completed { tag, response });
        });

        let (settle_tx, settle_rx) = oneshot::channel();
        self.waiter = Some((tag, settle_tx));
        Ok(PendingOutcome { tag, rx: settle_rx })
    }

    fn complete(&mut self, done: Completed) {
        match self.pipeline.complete(done.tag, &done.response) {
            Completion::Settled(outcome) => {
                match &outcome {
                    Ok(result) => tracing::info!(
                        label = %result.label(),
                        confidence = result.confidence,
                        "classified"
                    ),
                    Err(err) => tracing::info!(kind = ?err.kind(), error = %err, "classification failed"),
                }
                self.render();
                if let Some((tag, settle_tx)) = self.waiter.take() {
                    if tag == done.tag {
                        let _ = settle_tx.send(Settled::Completed(outcome));
                    } else {
                        self.waiter = Some((tag, settle_tx));
                    }
                }
            }
            Completion::Stale => {
                tracing::debug!(file = %done.tag.file, seq = done.tag.seq, "late response discarded");
            }
        }
    }

    fn supersede(&mut self, superseded: Option<RequestTag>) {
        let Some(stale) = superseded else {
            return;
        };
        tracing::info!(file = %stale.file, seq = stale.seq, "in-flight request superseded");
        if let Some((tag, settle_tx)) = self.waiter.take() {
            if tag == stale {
                let _ = settle_tx.send(Settled::Superseded);
            } else {
                self.waiter = Some((tag, settle_tx));
            }
        }
    }

    fn render(&mut self) {
        present(self.pipeline.state(), self.presenter.as_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use likeness_core::{
        ClassificationCandidate, ClassificationResponse, ErrorKind, Phase, SelectionResult,
        TransportFailure,
    };
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    const PNG_A: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRa";
    const PNG_B: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRb";

    fn file(name: &str, bytes: &[u8]) -> UploadedFile {
        UploadedFile::from_bytes(name, bytes.to_vec()).unwrap()
    }

    fn candidates(list: &[(&str, &[f32])]) -> Response {
        Ok(Some(ClassificationResponse::Candidates(
            list.iter()
                .map(|(label, scores)| ClassificationCandidate::new(*label, scores.to_vec()))
                .collect(),
        )))
    }

    /// Transport that answers every request with the same canned response.
    struct CannedTransport {
        response: Response,
        calls: AtomicU32,
    }

    impl CannedTransport {
        fn new(response: Response) -> Arc<Self> {
            Arc::new(Self {
                response,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl ClassifierTransport for CannedTransport {
        async fn classify(&self, _image_data: &str) -> Response {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.response.clone()
        }
    }

    /// Transport whose responses are released by the test, keyed by payload.
    struct GatedTransport {
        gates: Mutex<HashMap<String, oneshot::Receiver<Response>>>,
        calls: AtomicU32,
    }

    impl GatedTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gates: Mutex::new(HashMap::new()),
                calls: AtomicU32::new(0),
            })
        }

        fn gate(&self, file: &UploadedFile) -> oneshot::Sender<Response> {
            let (tx, rx) = oneshot::channel();
            self.gates
                .lock()
                .unwrap()
                .insert(file.data_url().to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl ClassifierTransport for GatedTransport {
        async fn classify(&self, image_data: &str) -> Response {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let gate = self.gates.lock().unwrap().remove(image_data);
            match gate {
                Some(rx) => rx.await.unwrap_or(Err(TransportFailure::Timeout)),
                None => Err(TransportFailure::Connect("no gate".into())),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Shown {
        Idle,
        Loading,
        Error(String),
        Result(String),
    }

    #[derive(Clone, Default)]
    struct Recorder {
        shown: Arc<Mutex<Vec<Shown>>>,
    }

    impl Recorder {
        fn last(&self) -> Option<Shown> {
            self.shown.lock().unwrap().last().cloned()
        }

        fn all(&self) -> Vec<Shown> {
            self.shown.lock().unwrap().clone()
        }
    }

    impl Presenter for Recorder {
        fn show_idle(&mut self) {
            self.shown.lock().unwrap().push(Shown::Idle);
        }
        fn show_loading(&mut self) {
            self.shown.lock().unwrap().push(Shown::Loading);
        }
        fn show_error(&mut self, message: &str) {
            self.shown.lock().unwrap().push(Shown::Error(message.to_string()));
        }
        fn show_result(&mut self, result: &SelectionResult) {
            self.shown
                .lock()
                .unwrap()
                .push(Shown::Result(result.label().to_string()));
        }
    }

    #[tokio::test]
    async fn test_classify_success() {
        let transport = CannedTransport::new(candidates(&[
            ("lionel_messi", &[0.9, 0.05, 0.05]),
            ("roger_federer", &[0.3, 0.3, 0.4]),
        ]));
        let recorder = Recorder::default();
        let handle = spawn_pipeline(transport.clone(), Box::new(recorder.clone()));

        let settled = handle.classify(file("a.png", PNG_A)).await.unwrap();
        let Settled::Completed(Ok(result)) = settled else {
            panic!("expected success");
        };
        assert_eq!(result.label(), "lionel_messi");
        assert!((result.confidence - 0.9).abs() < 1e-6);
        assert_eq!(transport.calls(), 1);

        assert_eq!(handle.state().await.unwrap().phase(), Phase::Succeeded);
        assert_eq!(
            recorder.all(),
            vec![
                Shown::Idle,
                Shown::Idle,
                Shown::Loading,
                Shown::Result("lionel_messi".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_classify_no_subject() {
        let transport = CannedTransport::new(candidates(&[]));
        let recorder = Recorder::default();
        let handle = spawn_pipeline(transport, Box::new(recorder.clone()));

        let settled = handle.classify(file("a.png", PNG_A)).await.unwrap();
        assert_eq!(settled, Settled::Completed(Err(ClassifyError::NoSubjectDetected)));
        assert_eq!(
            recorder.last(),
            Some(Shown::Error(ClassifyError::NoSubjectDetected.to_string()))
        );
    }

    #[tokio::test]
    async fn test_classify_service_error_verbatim() {
        let transport = CannedTransport::new(Ok(Some(ClassificationResponse::Error {
            error: "low image quality".into(),
        })));
        let recorder = Recorder::default();
        let handle = spawn_pipeline(transport, Box::new(recorder.clone()));

        handle.classify(file("a.png", PNG_A)).await.unwrap();
        assert_eq!(recorder.last(), Some(Shown::Error("low image quality".into())));
        assert_eq!(
            handle.state().await.unwrap(),
            PipelineState::Failed(ClassifyError::Service("low image quality".into()))
        );
    }

    #[tokio::test]
    async fn test_classify_transport_failure() {
        let transport = CannedTransport::new(Err(TransportFailure::Connect("refused".into())));
        let recorder = Recorder::default();
        let handle = spawn_pipeline(transport, Box::new(recorder.clone()));

        let settled = handle.classify(file("a.png", PNG_A)).await.unwrap();
        let Settled::Completed(Err(err)) = settled else {
            panic!("expected failure");
        };
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(
            recorder.last(),
            Some(Shown::Error("Server error occurred. Please try again later.".into()))
        );
    }

    #[tokio::test]
    async fn test_submit_without_file() {
        let transport = CannedTransport::new(candidates(&[("a", &[0.5])]));
        let recorder = Recorder::default();
        let handle = spawn_pipeline(transport.clone(), Box::new(recorder.clone()));

        let err = handle.submit().await.err().unwrap();
        assert_eq!(err, DriverError::Rejected(ClassifyError::NoFileSelected));
        assert_eq!(handle.state().await.unwrap(), PipelineState::Idle);
        assert_eq!(transport.calls(), 0);
        assert_eq!(
            recorder.last(),
            Some(Shown::Error("Please upload an image first.".into()))
        );
    }

    #[tokio::test]
    async fn test_duplicate_submit_rejected_while_in_flight() {
        let transport = GatedTransport::new();
        let a = file("a.png", PNG_A);
        let a_id = a.id();
        let release = transport.gate(&a);
        let recorder = Recorder::default();
        let handle = spawn_pipeline(transport.clone(), Box::new(recorder.clone()));

        handle.add_file(a).await.unwrap();
        let pending = handle.submit().await.unwrap();
        assert_eq!(pending.tag().file, a_id);
        let err = handle.submit().await.err().unwrap();
        assert_eq!(err, DriverError::Rejected(ClassifyError::Busy));
        assert_eq!(handle.state().await.unwrap().phase(), Phase::Submitting);
        assert_eq!(recorder.last(), Some(Shown::Loading));
        assert_eq!(
            recorder.all(),
            vec![Shown::Idle, Shown::Idle, Shown::Loading]
        );

        release.send(candidates(&[("a", &[0.7])])).unwrap();
        assert!(matches!(pending.wait().await.unwrap(), Settled::Completed(Ok(_))));
        assert_eq!(transport.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_late_response_for_replaced_file_discarded() {
        let transport = GatedTransport::new();
        let a = file("a.png", PNG_A);
        let b = file("b.png", PNG_B);
        let release_a = transport.gate(&a);
        let release_b = transport.gate(&b);
        let recorder = Recorder::default();
        let handle = spawn_pipeline(transport.clone(), Box::new(recorder.clone()));

        handle.add_file(a).await.unwrap();
        let pending_a = handle.submit().await.unwrap();

        handle.add_file(b).await.unwrap();
        assert_eq!(pending_a.wait().await.unwrap(), Settled::Superseded);
        assert_eq!(handle.state().await.unwrap(), PipelineState::FileReady);

        let pending_b = handle.submit().await.unwrap();
        release_b.send(candidates(&[("new", &[0.6])])).unwrap();
        let Settled::Completed(Ok(result)) = pending_b.wait().await.unwrap() else {
            panic!("expected success for the current file");
        };
        assert_eq!(result.label(), "new");

        release_a.send(candidates(&[("old", &[0.99])])).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let state = handle.state().await.unwrap();
        assert!(matches!(state, PipelineState::Succeeded(ref r) if r.label() == "new"));
        assert_eq!(recorder.last(), Some(Shown::Result("new".into())));
        assert_eq!(transport.calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_remove_file_returns_idle() {
        let transport = CannedTransport::new(candidates(&[("a", &[0.5])]));
        let recorder = Recorder::default();
        let handle = spawn_pipeline(transport, Box::new(recorder.clone()));

        handle.add_file(file("a.png", PNG_A)).await.unwrap();
        handle.remove_file().await.unwrap();
        assert_eq!(handle.state().await.unwrap(), PipelineState::Idle);
        assert_eq!(recorder.last(), Some(Shown::Idle));
    }

    #[tokio::test]
    async fn test_handle_after_task_exit() {
        let (tx, _) = mpsc::channel(1);
        let dead = PipelineHandle { tx };
        assert_eq!(dead.state().await.unwrap_err(), DriverError::ChannelClosed);
        assert_eq!(dead.remove_file().await.unwrap_err(), DriverError::ChannelClosed);
    }
}

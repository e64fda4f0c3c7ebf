// Background task channel
//
// One worker task owns the receiving end of the request queue and handles
// requests one at a time. Format work runs on the blocking pool so the async
// runtime keeps servicing the editor while a large PDF is parsed. Responses
// stream back over an unbounded queue in the order they are produced.
//
// A channel belongs to the registry generation it was spawned in. After a
// reset the worker can no longer register resources and stops at its next
// thumbnail or artifact.

use crate::ids::{FileId, ResourceHandle};
use crate::intake::MimeType;
use crate::models::{Rotation, TaskKind};
use crate::resources::ResourceRegistry;
use crate::worker::processor::{AssemblyJob, AssemblyPage, DocumentProcessor, ProcessingError};
use crate::worker::protocol::{ErrorOrigin, WorkerRequest, WorkerResponse};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum ChannelError {
    /// The worker is gone; `origin` identifies the request that was lost
    #[error("Task channel is closed")]
    Closed { origin: ErrorOrigin },
}

/// Main-context end of the request queue
#[derive(Debug)]
pub struct TaskChannel {
    requests: UnboundedSender<WorkerRequest>,
    worker: JoinHandle<()>,
    generation: u64,
}

impl TaskChannel {
    /// Start a worker on `runtime` and return the channel plus the stream of
    /// responses it will produce
    pub fn spawn(
        processor: Arc<dyn DocumentProcessor>,
        resources: ResourceRegistry,
        runtime: &Handle,
    ) -> (Self, UnboundedReceiver<WorkerResponse>) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();

        let generation = resources.generation();
        let sink = ResponseSink {
            tx: response_tx,
            resources,
            generation,
        };
        let worker = runtime.spawn(run_worker(processor, sink, request_rx));

        (
            Self {
                requests: request_tx,
                worker,
                generation,
            },
            response_rx,
        )
    }

    pub fn send(&self, request: WorkerRequest) -> Result<(), ChannelError> {
        tracing::debug!("Posting {} to worker", request.tag());
        self.requests
            .send(request)
            .map_err(|mpsc::error::SendError(request)| ChannelError::Closed {
                origin: request.origin(),
            })
    }

    /// Registry generation this channel's responses belong to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_closed(&self) -> bool {
        self.requests.is_closed() || self.worker.is_finished()
    }

    /// Stop the worker immediately, dropping any queued requests
    pub fn abort(&self) {
        self.worker.abort();
    }

    /// Let the worker drain its queue, then wait for it to stop
    pub async fn close(self) {
        drop(self.requests);
        match self.worker.await {
            Err(e) if !e.is_cancelled() => {
                tracing::warn!("Worker task ended abnormally: {}", e);
            }
            _ => {}
        }
    }
}

/// Worker-side end of the response queue
#[derive(Clone)]
struct ResponseSink {
    tx: UnboundedSender<WorkerResponse>,
    resources: ResourceRegistry,
    generation: u64,
}

/// The main context stopped listening, or was reset since this worker started
#[derive(Debug)]
struct Disconnected;

impl ResponseSink {
    /// Store a produced resource, unless the session has been reset
    fn register(&self, mime: MimeType, bytes: Vec<u8>) -> Result<ResourceHandle, Disconnected> {
        self.resources
            .register_in(self.generation, mime, bytes)
            .ok_or(Disconnected)
    }

    /// Post a response. If nobody is listening, the resource it carries is
    /// released here since no one else ever will.
    fn send(&self, response: WorkerResponse) -> Result<(), Disconnected> {
        self.tx
            .send(response)
            .map_err(|mpsc::error::SendError(response)| {
                if let Some(handle) = response.carried_handle() {
                    self.resources.release(handle);
                }
                Disconnected
            })
    }
}

enum Failure {
    Processing(ProcessingError),
    Disconnected,
}

impl From<ProcessingError> for Failure {
    fn from(e: ProcessingError) -> Self {
        Failure::Processing(e)
    }
}

impl From<Disconnected> for Failure {
    fn from(_: Disconnected) -> Self {
        Failure::Disconnected
    }
}

async fn run_worker(
    processor: Arc<dyn DocumentProcessor>,
    sink: ResponseSink,
    mut requests: UnboundedReceiver<WorkerRequest>,
) {
    tracing::debug!("Worker started");

    while let Some(request) = requests.recv().await {
        let tag = request.tag();
        let origin = request.origin();

        let task_processor = Arc::clone(&processor);
        let task_sink = sink.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            handle_request(task_processor.as_ref(), &task_sink, request)
        })
        .await;

        let reason = match outcome {
            Ok(Ok(())) => continue,
            Ok(Err(Failure::Disconnected)) => break,
            Ok(Err(Failure::Processing(e))) => e.to_string(),
            Err(e) => format!("Worker task failed: {}", e),
        };

        tracing::warn!("{} failed: {}", tag, reason);
        if sink.send(WorkerResponse::Error { reason, origin }).is_err() {
            break;
        }
    }

    tracing::debug!("Worker stopped");
}

fn handle_request(
    processor: &dyn DocumentProcessor,
    sink: &ResponseSink,
    request: WorkerRequest,
) -> Result<(), Failure> {
    match request {
        WorkerRequest::ParseFile { file, file_id } => {
            let page_count = processor.page_count(&file)?;
            sink.send(WorkerResponse::FileParsed {
                file_id: file_id.clone(),
                page_count,
            })?;

            for page_index in 0..page_count {
                let thumbnail = processor.render_thumbnail(&file, page_index)?;
                let image = sink.register(thumbnail.mime, thumbnail.bytes)?;
                sink.send(WorkerResponse::ThumbnailGenerated {
                    file_id: file_id.clone(),
                    page_index,
                    image,
                })?;
            }
            Ok(())
        }

        WorkerRequest::MergePdfs { files, task_kind } => {
            let mut job = AssemblyJob::default();
            for file in files {
                let input = job.inputs.len();
                let page_count = processor.page_count(&file)?;
                job.pages.extend((0..page_count).map(|page_index| AssemblyPage {
                    input,
                    page_index,
                    rotation: Rotation::ZERO,
                }));
                job.inputs.push(file);
            }
            complete(processor, sink, &job, task_kind)
        }

        WorkerRequest::MergePages {
            files,
            pages,
            task_kind,
        } => {
            let mut job = AssemblyJob::default();
            let mut inputs: HashMap<FileId, usize> = HashMap::with_capacity(files.len());
            for source in files {
                inputs.insert(source.id, job.inputs.len());
                job.inputs.push(source.file);
            }

            for spec in pages {
                match inputs.get(&spec.file_id) {
                    Some(&input) => job.pages.push(AssemblyPage {
                        input,
                        page_index: spec.page_index,
                        rotation: spec.rotation,
                    }),
                    None => tracing::warn!(
                        "Skipping page {} of unknown file {}",
                        spec.page_index,
                        spec.file_id
                    ),
                }
            }
            complete(processor, sink, &job, task_kind)
        }
    }
}

fn complete(
    processor: &dyn DocumentProcessor,
    sink: &ResponseSink,
    job: &AssemblyJob,
    task_kind: TaskKind,
) -> Result<(), Failure> {
    let bytes = processor.assemble(job)?;
    tracing::info!(
        "Assembled {} document: {} pages, {} bytes",
        task_kind,
        job.pages.len(),
        bytes.len()
    );

    let artifact = sink.register(MimeType::Pdf, bytes)?;
    sink.send(WorkerResponse::MergeComplete {
        artifact,
        task_kind,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::FileBlob;
    use crate::worker::processor::{MockDocumentProcessor, Thumbnail};
    use crate::worker::protocol::{PageSpec, SourceFile};

    fn blob(name: &str) -> FileBlob {
        FileBlob::new(name, MimeType::Pdf, vec![0u8; 4])
    }

    async fn collect(mut rx: UnboundedReceiver<WorkerResponse>) -> Vec<WorkerResponse> {
        let mut out = Vec::new();
        while let Some(response) = rx.recv().await {
            out.push(response);
        }
        out
    }

    #[tokio::test]
    async fn test_parse_streams_count_then_thumbnails() {
        let mut processor = MockDocumentProcessor::new();
        processor.expect_page_count().returning(|_| Ok(2));
        processor
            .expect_render_thumbnail()
            .times(2)
            .returning(|_, page_index| {
                Ok(Thumbnail {
                    mime: MimeType::Jpeg,
                    bytes: vec![page_index as u8],
                })
            });

        let resources = ResourceRegistry::new();
        let (channel, rx) =
            TaskChannel::spawn(Arc::new(processor), resources.clone(), &Handle::current());
        channel
            .send(WorkerRequest::ParseFile {
                file: blob("a.pdf"),
                file_id: FileId::from("a"),
            })
            .unwrap();
        channel.close().await;

        let responses = collect(rx).await;
        let tags: Vec<&str> = responses.iter().map(|r| r.tag()).collect();
        assert_eq!(
            tags,
            vec!["FILE_PARSED", "THUMBNAIL_GENERATED", "THUMBNAIL_GENERATED"]
        );

        for (expected_index, response) in responses[1..].iter().enumerate() {
            let WorkerResponse::ThumbnailGenerated {
                page_index, image, ..
            } = response
            else {
                panic!("expected a thumbnail, got {:?}", response);
            };
            assert_eq!(*page_index, expected_index);
            let resource = resources.get(image).unwrap();
            assert_eq!(&*resource.bytes, &[expected_index as u8]);
        }
    }

    #[tokio::test]
    async fn test_parse_failure_is_routed_to_file() {
        let mut processor = MockDocumentProcessor::new();
        processor
            .expect_page_count()
            .returning(|_| Err(ProcessingError::Malformed("truncated".to_string())));

        let (channel, rx) = TaskChannel::spawn(
            Arc::new(processor),
            ResourceRegistry::new(),
            &Handle::current(),
        );
        channel
            .send(WorkerRequest::ParseFile {
                file: blob("bad.pdf"),
                file_id: FileId::from("bad"),
            })
            .unwrap();
        channel.close().await;

        let responses = collect(rx).await;
        assert_eq!(responses.len(), 1);
        match &responses[0] {
            WorkerResponse::Error { reason, origin } => {
                assert!(reason.contains("truncated"));
                assert_eq!(
                    *origin,
                    ErrorOrigin::Parse {
                        file_id: FileId::from("bad")
                    }
                );
            }
            other => panic!("expected an error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_merge_pages_skips_unknown_files() {
        let mut processor = MockDocumentProcessor::new();
        processor
            .expect_assemble()
            .withf(|job: &AssemblyJob| {
                job.inputs.len() == 1
                    && job.pages
                        == vec![AssemblyPage {
                            input: 0,
                            page_index: 3,
                            rotation: Rotation::from_degrees(90).unwrap(),
                        }]
            })
            .returning(|_| Ok(b"%PDF".to_vec()));

        let resources = ResourceRegistry::new();
        let (channel, rx) =
            TaskChannel::spawn(Arc::new(processor), resources.clone(), &Handle::current());
        channel
            .send(WorkerRequest::MergePages {
                files: vec![SourceFile {
                    id: FileId::from("a"),
                    file: blob("a.pdf"),
                }],
                pages: vec![
                    PageSpec {
                        file_id: FileId::from("gone"),
                        page_index: 0,
                        rotation: Rotation::ZERO,
                    },
                    PageSpec {
                        file_id: FileId::from("a"),
                        page_index: 3,
                        rotation: Rotation::from_degrees(90).unwrap(),
                    },
                ],
                task_kind: TaskKind::Extract,
            })
            .unwrap();
        channel.close().await;

        let responses = collect(rx).await;
        match &responses[..] {
            [WorkerResponse::MergeComplete {
                artifact,
                task_kind,
            }] => {
                assert_eq!(*task_kind, TaskKind::Extract);
                assert_eq!(resources.get(artifact).unwrap().mime, MimeType::Pdf);
            }
            other => panic!("unexpected responses {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_merge_pdfs_uses_every_page_in_file_order() {
        let mut processor = MockDocumentProcessor::new();
        processor
            .expect_page_count()
            .returning(|file| Ok(if file.name == "a.pdf" { 2 } else { 1 }));
        processor
            .expect_assemble()
            .withf(|job: &AssemblyJob| {
                let order: Vec<(usize, usize)> =
                    job.pages.iter().map(|p| (p.input, p.page_index)).collect();
                order == vec![(0, 0), (0, 1), (1, 0)]
            })
            .returning(|_| Ok(vec![1, 2, 3]));

        let (channel, rx) = TaskChannel::spawn(
            Arc::new(processor),
            ResourceRegistry::new(),
            &Handle::current(),
        );
        channel
            .send(WorkerRequest::MergePdfs {
                files: vec![blob("a.pdf"), blob("b.pdf")],
                task_kind: TaskKind::Save,
            })
            .unwrap();
        channel.close().await;

        let responses = collect(rx).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].tag(), "MERGE_COMPLETE");
    }

    #[tokio::test]
    async fn test_panicking_processor_becomes_error_response() {
        let mut processor = MockDocumentProcessor::new();
        processor
            .expect_assemble()
            .returning(|_| panic!("assembler crashed"));

        let (channel, rx) = TaskChannel::spawn(
            Arc::new(processor),
            ResourceRegistry::new(),
            &Handle::current(),
        );
        channel
            .send(WorkerRequest::MergePages {
                files: vec![],
                pages: vec![],
                task_kind: TaskKind::Save,
            })
            .unwrap();
        channel.close().await;

        let responses = collect(rx).await;
        assert!(matches!(
            &responses[..],
            [WorkerResponse::Error {
                origin: ErrorOrigin::Assembly {
                    task_kind: TaskKind::Save
                },
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn test_send_after_abort_reports_origin() {
        let (channel, rx) = TaskChannel::spawn(
            Arc::new(MockDocumentProcessor::new()),
            ResourceRegistry::new(),
            &Handle::current(),
        );
        drop(rx);
        channel.abort();
        while !channel.requests.is_closed() {
            tokio::task::yield_now().await;
        }

        let err = channel
            .send(WorkerRequest::MergePdfs {
                files: vec![],
                task_kind: TaskKind::Save,
            })
            .unwrap_err();
        let ChannelError::Closed { origin } = err;
        assert_eq!(
            origin,
            ErrorOrigin::Assembly {
                task_kind: TaskKind::Save
            }
        );
    }

    #[test]
    fn test_unheard_response_releases_its_handle() {
        let resources = ResourceRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let sink = ResponseSink {
            tx,
            resources: resources.clone(),
            generation: resources.generation(),
        };

        let image = resources.register(MimeType::Jpeg, vec![1]);
        let result = sink.send(WorkerResponse::ThumbnailGenerated {
            file_id: FileId::from("a"),
            page_index: 0,
            image: image.clone(),
        });

        assert!(result.is_err());
        assert!(!resources.contains(&image));
        assert_eq!(resources.live_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_mid_parse_stops_worker_without_registering() {
        let resources = ResourceRegistry::new();
        let reset_view = resources.clone();

        let mut processor = MockDocumentProcessor::new();
        processor.expect_page_count().returning(|_| Ok(3));
        processor
            .expect_render_thumbnail()
            .times(2)
            .returning(move |_, page_index| {
                // The session resets while the second page renders
                if page_index == 1 {
                    reset_view.release_all();
                }
                Ok(Thumbnail {
                    mime: MimeType::Jpeg,
                    bytes: vec![page_index as u8],
                })
            });

        let (channel, rx) =
            TaskChannel::spawn(Arc::new(processor), resources.clone(), &Handle::current());
        assert_eq!(channel.generation(), 0);
        channel
            .send(WorkerRequest::ParseFile {
                file: blob("a.pdf"),
                file_id: FileId::from("a"),
            })
            .unwrap();
        channel.close().await;

        let tags: Vec<&str> = collect(rx).await.iter().map(|r| r.tag()).collect();
        assert_eq!(tags, vec!["FILE_PARSED", "THUMBNAIL_GENERATED"]);
        assert_eq!(resources.live_count(), 0);
    }
}

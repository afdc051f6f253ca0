use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::FetchError;
use crate::networking::{AssetFetcher, RepositoryRef};
use crate::util::{cancel_requested, format_megabytes, progress_percent};

pub const BUSY_MESSAGE: &str = "A download is already in progress.";

/// Anything that can fetch one release asset into a directory.
pub trait AssetSource: Send + Sync + 'static {
    fn fetch(
        &self,
        repo: &RepositoryRef,
        tag: &str,
        filename: &str,
        dest_dir: &Path,
        on_progress: &mut (dyn FnMut(u64, u64) + Send),
    ) -> impl Future<Output = Result<PathBuf, FetchError>> + Send;
}

impl AssetSource for AssetFetcher {
    fn fetch(
        &self,
        repo: &RepositoryRef,
        tag: &str,
        filename: &str,
        dest_dir: &Path,
        on_progress: &mut (dyn FnMut(u64, u64) + Send),
    ) -> impl Future<Output = Result<PathBuf, FetchError>> + Send {
        self.download(repo, tag, filename, dest_dir, on_progress)
    }
}

/// One batch of files to pull from a single release.
#[derive(Clone, Debug)]
pub struct DownloadTask<C> {
    pub repo: RepositoryRef,
    pub tag: String,
    pub filenames: Vec<String>,
    pub dest_dir: PathBuf,
    /// Handed back untouched in `Completed`.
    pub continuation: C,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadProgress {
    pub filename: String,
    pub file_index: usize,
    pub total_files: usize,
    pub total_bytes: u64,
    pub downloaded_bytes: u64,
}

impl DownloadProgress {
    pub fn percent(&self) -> u32 {
        progress_percent(self.downloaded_bytes, Some(self.total_bytes))
    }

    /// e.g. `Downloading (1/2): ja_jp_data.dat (1.00 MB / 4.00 MB - 25%)`
    pub fn describe(&self) -> String {
        format!(
            "Downloading ({}/{}): {} ({} / {} - {}%)",
            self.file_index,
            self.total_files,
            self.filename,
            format_megabytes(self.downloaded_bytes),
            format_megabytes(self.total_bytes),
            self.percent()
        )
    }
}

#[derive(Debug)]
pub enum DownloadEvent<C> {
    Progress(DownloadProgress),
    Completed { paths: Vec<PathBuf>, continuation: C },
    Failed { kind: &'static str, message: String },
    Cancelled,
}

impl<C> DownloadEvent<C> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DownloadEvent::Progress(_))
    }
}

/// Runs at most one download batch at a time on a tokio runtime and reports
/// back over an unbounded channel.
pub struct DownloadRunner<S> {
    source: Arc<S>,
    handle: Handle,
    cancel: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl<S: AssetSource> DownloadRunner<S> {
    pub fn new(source: Arc<S>, handle: Handle, cancel: Arc<AtomicBool>) -> Self {
        Self {
            source,
            handle,
            cancel,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn a batch. Fails with a user-facing message if one is already running.
    pub fn start<C: Send + 'static>(
        &self,
        task: DownloadTask<C>,
    ) -> Result<UnboundedReceiver<DownloadEvent<C>>, String> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("download: rejected, another download is in progress");
            return Err(BUSY_MESSAGE.to_owned());
        }
        self.cancel.store(false, Ordering::SeqCst);

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            source: self.source.clone(),
            cancel: Some(self.cancel.clone()),
            guard: RunningGuard(self.running.clone()),
            tx,
        };
        self.handle.spawn(worker.run(task));
        Ok(rx)
    }
}

struct RunningGuard(Arc<AtomicBool>);

impl RunningGuard {
    fn release(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.release();
    }
}

struct Worker<S, C> {
    source: Arc<S>,
    cancel: Option<Arc<AtomicBool>>,
    guard: RunningGuard,
    tx: UnboundedSender<DownloadEvent<C>>,
}

impl<S: AssetSource, C: Send + 'static> Worker<S, C> {
    async fn run(self, task: DownloadTask<C>) {
        let total_files = task.filenames.len();
        let mut paths = Vec::with_capacity(total_files);

        for (index, filename) in task.filenames.iter().enumerate() {
            if cancel_requested(&self.cancel) {
                info!("download: cancelled before {filename}");
                self.finish(DownloadEvent::Cancelled);
                return;
            }

            let tx = self.tx.clone();
            let file_index = index + 1;
            let mut report = |total: u64, downloaded: u64| {
                let _ = tx.send(DownloadEvent::Progress(DownloadProgress {
                    filename: filename.clone(),
                    file_index,
                    total_files,
                    total_bytes: total,
                    downloaded_bytes: downloaded,
                }));
            };

            let fetched = self
                .source
                .fetch(&task.repo, &task.tag, filename, &task.dest_dir, &mut report)
                .await;
            match fetched {
                Ok(path) => paths.push(path),
                Err(err) => {
                    warn!("download: {filename} failed ({}): {err}", err.kind());
                    self.finish(DownloadEvent::Failed {
                        kind: err.kind(),
                        message: format!("Failed to download {filename}: {err}"),
                    });
                    return;
                }
            }
        }

        if cancel_requested(&self.cancel) {
            info!("download: cancelled during the last file");
            self.finish(DownloadEvent::Cancelled);
            return;
        }

        info!("download: {total_files} file(s) from {} {} complete", task.repo, task.tag);
        self.finish(DownloadEvent::Completed {
            paths,
            continuation: task.continuation,
        });
    }

    /// Clear the in-progress flag, then deliver the terminal event.
    fn finish(&self, event: DownloadEvent<C>) {
        self.guard.release();
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Writes nothing; records requested files and optionally misbehaves.
    #[derive(Default)]
    struct FakeSource {
        requested: Mutex<Vec<String>>,
        cancel_after: Mutex<Option<(String, Arc<AtomicBool>)>>,
        fail_on: Option<String>,
        gate: Option<Arc<Notify>>,
    }

    impl AssetSource for FakeSource {
        fn fetch(
            &self,
            _repo: &RepositoryRef,
            _tag: &str,
            filename: &str,
            dest_dir: &Path,
            on_progress: &mut (dyn FnMut(u64, u64) + Send),
        ) -> impl Future<Output = Result<PathBuf, FetchError>> + Send {
            self.requested.lock().unwrap().push(filename.to_owned());
            let fail = self.fail_on.as_deref() == Some(filename);
            let cancel = self
                .cancel_after
                .lock()
                .unwrap()
                .as_ref()
                .filter(|(name, _)| name == filename)
                .map(|(_, flag)| flag.clone());
            let gate = self.gate.clone();
            let path = dest_dir.join(filename);
            async move {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                if fail {
                    return Err(FetchError::AssetNotFound {
                        url: format!("https://example.test/{}", path.display()),
                    });
                }
                on_progress(200, 100);
                on_progress(200, 200);
                if let Some(flag) = cancel {
                    flag.store(true, Ordering::SeqCst);
                }
                Ok(path)
            }
        }
    }

    fn task(files: &[&str]) -> DownloadTask<&'static str> {
        DownloadTask {
            repo: RepositoryRef::parse("owner/repo").unwrap(),
            tag: "v1.0.0".into(),
            filenames: files.iter().map(|f| f.to_string()).collect(),
            dest_dir: PathBuf::from("data"),
            continuation: "next",
        }
    }

    async fn collect<C>(mut rx: UnboundedReceiver<DownloadEvent<C>>) -> Vec<DownloadEvent<C>> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = event.is_terminal();
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    fn runner(source: FakeSource, cancel: Arc<AtomicBool>) -> (Arc<FakeSource>, DownloadRunner<FakeSource>) {
        let source = Arc::new(source);
        let runner = DownloadRunner::new(source.clone(), Handle::current(), cancel);
        (source, runner)
    }

    #[tokio::test]
    async fn completes_all_files_in_order() {
        let (source, runner) = runner(FakeSource::default(), Arc::new(AtomicBool::new(false)));
        let events = collect(runner.start(task(&["a", "b"])).unwrap()).await;

        let progress: Vec<(usize, u64)> = events
            .iter()
            .filter_map(|event| match event {
                DownloadEvent::Progress(p) => Some((p.file_index, p.downloaded_bytes)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, [(1, 100), (1, 200), (2, 100), (2, 200)]);

        match events.last() {
            Some(DownloadEvent::Completed { paths, continuation }) => {
                assert_eq!(paths, &[PathBuf::from("data/a"), PathBuf::from("data/b")]);
                assert_eq!(*continuation, "next");
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(*source.requested.lock().unwrap(), ["a", "b"]);
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn cancel_after_first_file_stops_the_batch() {
        let cancel = Arc::new(AtomicBool::new(false));
        let source = FakeSource {
            cancel_after: Mutex::new(Some(("a".into(), cancel.clone()))),
            ..FakeSource::default()
        };
        let (source, runner) = runner(source, cancel);
        let events = collect(runner.start(task(&["a", "b", "c"])).unwrap()).await;

        let mut progress_files = Vec::new();
        let mut cancelled = 0;
        for event in &events {
            match event {
                DownloadEvent::Progress(p) => progress_files.push(p.filename.clone()),
                DownloadEvent::Cancelled => cancelled += 1,
                DownloadEvent::Completed { .. } => panic!("cancelled batch must not complete"),
                DownloadEvent::Failed { .. } => panic!("unexpected failure"),
            }
        }
        assert_eq!(progress_files, ["a", "a"]);
        assert_eq!(cancelled, 1);
        assert_eq!(*source.requested.lock().unwrap(), ["a"]);
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn cancel_during_last_file_does_not_complete() {
        let cancel = Arc::new(AtomicBool::new(false));
        let source = FakeSource {
            cancel_after: Mutex::new(Some(("c".into(), cancel.clone()))),
            ..FakeSource::default()
        };
        let (source, runner) = runner(source, cancel);
        let events = collect(runner.start(task(&["a", "b", "c"])).unwrap()).await;

        assert!(matches!(events.last(), Some(DownloadEvent::Cancelled)), "{events:?}");
        assert!(!events.iter().any(|e| matches!(e, DownloadEvent::Completed { .. })));
        assert_eq!(*source.requested.lock().unwrap(), ["a", "b", "c"]);
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn failure_is_reported_once_and_stops() {
        let source = FakeSource {
            fail_on: Some("b".into()),
            ..FakeSource::default()
        };
        let (source, runner) = runner(source, Arc::new(AtomicBool::new(false)));
        let events = collect(runner.start(task(&["a", "b", "c"])).unwrap()).await;

        match events.last() {
            Some(DownloadEvent::Failed { kind, message }) => {
                assert_eq!(*kind, "asset-not-found");
                assert!(message.contains("b"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert_eq!(*source.requested.lock().unwrap(), ["a", "b"]);
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_busy() {
        let gate = Arc::new(Notify::new());
        let source = FakeSource {
            gate: Some(gate.clone()),
            ..FakeSource::default()
        };
        let (_source, runner) = runner(source, Arc::new(AtomicBool::new(false)));

        let rx = runner.start(task(&["a"])).unwrap();
        assert!(runner.is_running());
        let rejected = runner.start(task(&["b"]));
        assert_eq!(rejected.err().as_deref(), Some(BUSY_MESSAGE));

        gate.notify_one();
        let events = collect(rx).await;
        assert!(matches!(events.last(), Some(DownloadEvent::Completed { .. })));
        assert!(!runner.is_running());

        // Free again once the first batch is over.
        gate.notify_one();
        let events = tokio::time::timeout(Duration::from_secs(5), collect(runner.start(task(&["c"])).unwrap()))
            .await
            .unwrap();
        assert!(matches!(events.last(), Some(DownloadEvent::Completed { .. })));
    }

    #[test]
    fn describes_progress_for_humans() {
        let progress = DownloadProgress {
            filename: "ja_jp_data.dat".into(),
            file_index: 1,
            total_files: 2,
            total_bytes: 4 * 1024 * 1024,
            downloaded_bytes: 1024 * 1024,
        };
        assert_eq!(
            progress.describe(),
            "Downloading (1/2): ja_jp_data.dat (1.00 MB / 4.00 MB - 25%)"
        );
    }
}

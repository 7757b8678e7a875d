//! Background thread for off-UI-thread preview rendering.
//!
//! [`PreviewWorker`] owns one thread that runs the pipeline. The UI
//! side [`submit`](PreviewWorker::submit)s a source and config every
//! time a parameter changes; each submission gets a new generation
//! number. Only the newest generation matters:
//!
//! - queued requests are collapsed to the newest one before work starts,
//! - a request that is already superseded is skipped,
//! - a result that finished after a newer submission is dropped,
//! - [`latest`](PreviewWorker::latest) and
//!   [`wait_latest`](PreviewWorker::wait_latest) never hand back a
//!   result whose generation is not the newest.
//!
//! Dropping the worker closes the request channel and joins the thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use imgnode_pipeline::{PipelineConfig, Raster};

use crate::IoError;

/// A finished preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewResult {
    /// Generation of the request that produced this preview.
    pub generation: u64,
    /// The processed buffer.
    pub raster: Raster,
}

struct Request {
    generation: u64,
    source: Arc<Raster>,
    config: PipelineConfig,
}

/// Runs the pipeline on a background thread, latest request wins.
pub struct PreviewWorker {
    requests: Option<Sender<Request>>,
    results: Receiver<PreviewResult>,
    generation: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl PreviewWorker {
    /// Start the background thread.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Spawn`] if the OS refuses to create the thread.
    pub fn spawn() -> Result<Self, IoError> {
        let (request_tx, request_rx) = mpsc::channel();
        let (result_tx, result_rx) = mpsc::channel();
        let generation = Arc::new(AtomicU64::new(0));

        let shared = Arc::clone(&generation);
        let handle = std::thread::Builder::new()
            .name("imgnode-preview".to_owned())
            .spawn(move || serve(&request_rx, &result_tx, &shared))
            .map_err(IoError::Spawn)?;

        Ok(Self {
            requests: Some(request_tx),
            results: result_rx,
            generation,
            handle: Some(handle),
        })
    }

    /// Queue a preview of `source` under `config`, superseding every
    /// earlier submission. Returns the new generation.
    pub fn submit(&self, source: Arc<Raster>, config: PipelineConfig) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let request = Request {
            generation,
            source,
            config,
        };
        if self
            .requests
            .as_ref()
            .is_none_or(|tx| tx.send(request).is_err())
        {
            log::warn!("preview worker has stopped; request {generation} ignored");
        }
        generation
    }

    /// Generation of the newest submission (0 before the first).
    #[must_use]
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The newest-generation result, if it has arrived.
    ///
    /// Never blocks. Stale results waiting in the queue are discarded.
    /// Each result is handed out at most once.
    #[must_use]
    pub fn latest(&self) -> Option<PreviewResult> {
        let mut found = None;
        while let Ok(result) = self.results.try_recv() {
            if self.is_current(&result) {
                found = Some(result);
            } else {
                log::debug!("discarding stale preview {}", result.generation);
            }
        }
        found
    }

    /// Block until the newest-generation result arrives or `timeout`
    /// elapses.
    #[must_use]
    pub fn wait_latest(&self, timeout: Duration) -> Option<PreviewResult> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.results.recv_timeout(remaining) {
                Ok(result) if self.is_current(&result) => return Some(result),
                Ok(result) => log::debug!("discarding stale preview {}", result.generation),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn is_current(&self, result: &PreviewResult) -> bool {
        result.generation == self.current_generation()
    }
}

impl Drop for PreviewWorker {
    fn drop(&mut self) {
        // Closing the channel ends the serve loop.
        self.requests.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::warn!("preview worker thread panicked");
        }
    }
}

fn serve(requests: &Receiver<Request>, results: &Sender<PreviewResult>, generation: &AtomicU64) {
    while let Ok(mut request) = requests.recv() {
        while let Ok(newer) = requests.try_recv() {
            request = newer;
        }
        if request.generation != generation.load(Ordering::SeqCst) {
            log::debug!("skipping superseded preview request {}", request.generation);
            continue;
        }

        let raster = imgnode_pipeline::process(&request.source, &request.config);

        if request.generation != generation.load(Ordering::SeqCst) {
            log::warn!("dropping stale preview result {}", request.generation);
            continue;
        }
        let result = PreviewResult {
            generation: request.generation,
            raster,
        };
        if results.send(result).is_err() {
            break;
        }
    }
    log::debug!("preview worker exiting");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use imgnode_pipeline::types::RgbImage;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn source() -> Arc<Raster> {
        Arc::new(Raster::Rgb(RgbImage::from_fn(32, 32, |x, y| {
            let v = u8::try_from((x * 8 + y * 3) % 256).unwrap();
            image::Rgb([v, v / 2, 255 - v])
        })))
    }

    #[test]
    fn single_request_is_delivered() {
        let worker = PreviewWorker::spawn().unwrap();
        let mut config = PipelineConfig::default();
        config.grayscale = true;
        let generation = worker.submit(source(), config.clone());
        assert_eq!(generation, 1);

        let result = worker.wait_latest(TIMEOUT).unwrap();
        assert_eq!(result.generation, 1);
        assert_eq!(result.raster, imgnode_pipeline::process(&source(), &config));
    }

    #[test]
    fn newest_submission_wins() {
        let worker = PreviewWorker::spawn().unwrap();
        let src = source();
        let mut config = PipelineConfig::default();
        config.blur.enabled = true;
        for radius in 1..=10 {
            config.blur.radius = radius;
            worker.submit(Arc::clone(&src), config.clone());
        }
        assert_eq!(worker.current_generation(), 10);

        let result = worker.wait_latest(TIMEOUT).unwrap();
        assert_eq!(result.generation, 10);
        assert_eq!(result.raster, imgnode_pipeline::process(&src, &config));
    }

    #[test]
    fn nothing_before_first_submission() {
        let worker = PreviewWorker::spawn().unwrap();
        assert_eq!(worker.current_generation(), 0);
        assert!(worker.latest().is_none());
        assert!(worker.wait_latest(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn results_are_handed_out_once() {
        let worker = PreviewWorker::spawn().unwrap();
        worker.submit(source(), PipelineConfig::default());
        assert!(worker.wait_latest(TIMEOUT).is_some());
        assert!(worker.latest().is_none());
    }

    #[test]
    fn drop_joins_cleanly_with_pending_work() {
        let worker = PreviewWorker::spawn().unwrap();
        let mut config = PipelineConfig::default();
        config.edges.enabled = true;
        worker.submit(source(), config);
        drop(worker);
    }
}

//! Transcriber pool (C7, spec §4.7).

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::engine::TranscriptionEngine;
use crate::error::Error;

/// `{ pcm, reply }` — created on submission, consumed exactly once by a
/// worker, which sends exactly one reply (possibly empty) before dropping
/// (spec §3 "Caption job").
pub struct CaptionJob {
    pub pcm: Vec<f32>,
    pub reply: oneshot::Sender<String>,
}

/// The producer side of the pool's single bounded queue (capacity 1).
#[derive(Clone)]
pub struct PoolHandle {
    sender: mpsc::Sender<CaptionJob>,
}

impl PoolHandle {
    /// Non-blocking submit. Returns the job back on failure so the caller
    /// can close its reply channel and emit `LiveCaptionsTranscriberBufFull`.
    pub fn try_submit(&self, job: CaptionJob) -> Result<(), CaptionJob> {
        self.sender.try_send(job).map_err(|err| match err {
            mpsc::error::TrySendError::Full(job) => job,
            mpsc::error::TrySendError::Closed(job) => job,
        })
    }
}

/// A pool of `N` long-lived worker tasks sharing the single bounded queue.
/// Each worker owns a dedicated engine instance for its whole lifetime.
pub struct TranscriberPool {
    handles: Vec<JoinHandle<()>>,
    stop_tx: watch::Sender<bool>,
}

impl TranscriberPool {
    pub fn spawn<F>(num_workers: usize, make_engine: F) -> (Self, PoolHandle)
    where
        F: Fn() -> Result<Box<dyn TranscriptionEngine>, Error> + Send + Sync + 'static,
    {
        let make_engine = Arc::new(make_engine);
        let (job_tx, job_rx) = mpsc::channel::<CaptionJob>(1);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (stop_tx, _) = watch::channel(false);

        let mut handles = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let job_rx = job_rx.clone();
            let make_engine = make_engine.clone();
            let mut stop_rx = stop_tx.subscribe();

            handles.push(tokio::task::spawn(async move {
                let mut engine = match make_engine() {
                    Ok(engine) => engine,
                    Err(err) => {
                        error!(worker_id, error = %err, "failed to construct transcriber engine");
                        return;
                    }
                };

                loop {
                    let job = {
                        let mut rx = job_rx.lock().await;
                        tokio::select! {
                            biased;
                            _ = stop_rx.changed() => None,
                            job = rx.recv() => job,
                        }
                    };
                    let Some(job) = job else { break };

                    // Inference is CPU-bound; run it on the blocking pool so
                    // it doesn't stall the async reactor the way the teacher
                    // crate keeps decode off the reactor via a dedicated thread.
                    let reply = job.reply;
                    let outcome = tokio::task::spawn_blocking(move || {
                        let text = match engine.transcribe(&job.pcm) {
                            Ok((segments, _language)) => segments.into_iter().next().map(|s| s.text).unwrap_or_default(),
                            Err(err) => {
                                warn!(worker_id, error = %err, "transcription failed for caption job");
                                String::new()
                            }
                        };
                        (text, engine)
                    })
                    .await;

                    engine = match outcome {
                        Ok((text, engine)) => {
                            let _ = reply.send(text);
                            engine
                        }
                        Err(err) => {
                            error!(worker_id, error = %err, "transcriber worker's blocking task panicked");
                            break;
                        }
                    };
                }

                if let Err(err) = engine.destroy() {
                    warn!(worker_id, error = %err, "failed to destroy transcriber engine");
                }
            }));
        }

        (Self { handles, stop_tx }, PoolHandle { sender: job_tx })
    }

    /// Signals every worker to stop after its current job and joins them all.
    pub async fn stop(self) -> Result<(), Error> {
        let _ = self.stop_tx.send(true);
        for handle in self.handles {
            handle
                .await
                .map_err(|err| Error::msg(format!("transcriber worker task panicked: {err}")))?;
        }
        Ok(())
    }
}

//! Bounded worker pool for page fetches. Jobs go out over a crossbeam channel to scoped threads;
//! results come back in completion order and are resequenced by index before returning.

use crate::adapter::error::RetrievalError;
use crate::adapter::FetchContext;
use crossbeam_channel as channel;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

pub const DEFAULT_MAX_CONCURRENT: usize = 4;
pub const MAX_CONCURRENT_LIMIT: usize = 8;

/// Run `job` for every index on at most `ctx.max_concurrent` threads.
///
/// Output is ascending by index. All-or-nothing: the first failure stops dispatch, in-flight jobs
/// drain, and the failure with the lowest index is returned. Cancellation wins over any failure.
pub(crate) fn fetch_ordered<T, F>(
    indices: impl IntoIterator<Item = u32>,
    ctx: &FetchContext<'_>,
    job: F,
) -> Result<Vec<T>, RetrievalError>
where
    T: Send,
    F: Fn(u32) -> Result<T, RetrievalError> + Sync,
{
    let indices: Vec<u32> = indices.into_iter().collect();
    ctx.check_cancelled()?;
    if indices.is_empty() {
        return Ok(Vec::new());
    }

    let workers = ctx
        .max_concurrent
        .clamp(1, MAX_CONCURRENT_LIMIT)
        .min(indices.len());
    let (job_tx, job_rx) = channel::unbounded::<u32>();
    for index in &indices {
        // Receiver is alive in this scope; send cannot fail.
        let _ = job_tx.send(*index);
    }
    drop(job_tx);

    let failed = AtomicBool::new(false);
    let (done, first_err) = std::thread::scope(|s| {
        let (out_tx, out_rx) = channel::unbounded::<(u32, Result<T, RetrievalError>)>();
        for worker in 0..workers {
            let job_rx = job_rx.clone();
            let out_tx = out_tx.clone();
            let job = &job;
            let failed = &failed;
            s.spawn(move || {
                for index in job_rx.iter() {
                    if failed.load(Ordering::Relaxed) || ctx.cancel.is_cancelled() {
                        break;
                    }
                    tracing::trace!(worker, index, "job start");
                    let result = job(index).map_err(|e| e.at_index(index));
                    if result.is_err() {
                        failed.store(true, Ordering::Relaxed);
                    }
                    if out_tx.send((index, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(out_tx);

        let mut done: BTreeMap<u32, T> = BTreeMap::new();
        let mut first_err: Option<(u32, RetrievalError)> = None;
        for (index, result) in out_rx.iter() {
            match result {
                Ok(value) => {
                    done.insert(index, value);
                }
                Err(e) => {
                    tracing::warn!(index, error = %e, "fetch failed; abandoning remaining pages");
                    if first_err.as_ref().map_or(true, |(i, _)| index < *i) {
                        first_err = Some((index, e));
                    }
                }
            }
        }
        (done, first_err)
    });

    ctx.check_cancelled()?;
    if let Some((_, e)) = first_err {
        return Err(e);
    }
    Ok(done.into_values().collect())
}

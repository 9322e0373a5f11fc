//! Asynchronous file fetches.
//!
//! `fetch_file` only records a `PendingFetch` and hands the guest a request
//! id. The driver resolves the queue at the next frame boundary and reports
//! each request through the guest's `file_loaded` / `file_failed` exports.
//! Requests issued while a batch is being delivered wait for the following
//! boundary.

use std::collections::VecDeque;

use wasmtime::Func;

use kiln_hostapi::{ResourceSource, FETCH_ALLOCATION_FAILED};

use crate::error::BridgeError;
use crate::marshal::{self, MarshalError, DEFAULT_ARENA};
use crate::memory::GuestAddress;
use crate::runtime::Bridge;

/// A guest request waiting for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFetch {
    pub id: i32,
    pub url: String,
}

/// Result of resolving a `PendingFetch` against the resource source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Completed(Vec<u8>),
    Failed { code: i32, reason: String },
}

impl PendingFetch {
    pub fn resolve(&self, source: &dyn ResourceSource) -> FetchOutcome {
        match source.fetch(&self.url) {
            Ok(data) => {
                log::debug!("fetch {} '{}' loaded {} bytes", self.id, self.url, data.len());
                FetchOutcome::Completed(data)
            }
            Err(e) => {
                log::warn!("fetch {} '{}' failed: {}", self.id, self.url, e);
                FetchOutcome::Failed {
                    code: e.code(),
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// FIFO of pending fetches. Request ids start at 1.
#[derive(Debug)]
pub struct FetchQueue {
    next_id: i32,
    pending: VecDeque<PendingFetch>,
}

impl Default for FetchQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchQueue {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            pending: VecDeque::new(),
        }
    }

    /// Queue a request and return its id.
    pub fn enqueue(&mut self, url: String) -> i32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.pending.push_back(PendingFetch { id, url });
        id
    }

    /// Remove and return every request queued so far.
    pub fn take(&mut self) -> Vec<PendingFetch> {
        self.pending.drain(..).collect()
    }

    /// Put undelivered requests back ahead of anything queued since.
    pub fn requeue_front(&mut self, fetches: impl IntoIterator<Item = PendingFetch>) {
        let mut fetches: VecDeque<PendingFetch> = fetches.into_iter().collect();
        fetches.append(&mut self.pending);
        self.pending = fetches;
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Bridge {
    /// Resolve and deliver every queued fetch. Returns the number delivered.
    ///
    /// The url and payload are copied into guest allocations for the
    /// duration of the callback and freed afterwards. If a delivery fails,
    /// the requests after it stay queued for the next call.
    pub fn deliver_fetches(&mut self) -> Result<usize, BridgeError> {
        let batch = self.context_mut().fetches.take();
        if batch.is_empty() {
            return Ok(0);
        }
        let source = self.context().source().clone();
        let abi = self.config().abi.clone();
        let loaded = self.primary_export(&abi.file_loaded);
        let failed = self.primary_export(&abi.file_failed);

        for (i, fetch) in batch.iter().enumerate() {
            let outcome = fetch.resolve(source.as_ref());
            if let Err(e) = self.deliver_fetch(fetch, outcome, loaded, failed) {
                let rest = batch[i + 1..].to_vec();
                if !rest.is_empty() {
                    log::warn!(
                        "fetch {} delivery failed; {} request(s) held for the next frame",
                        fetch.id,
                        rest.len()
                    );
                }
                self.context_mut().fetches.requeue_front(rest);
                return Err(e);
            }
        }
        Ok(batch.len())
    }

    fn deliver_fetch(
        &mut self,
        fetch: &PendingFetch,
        outcome: FetchOutcome,
        loaded: Option<Func>,
        failed: Option<Func>,
    ) -> Result<(), BridgeError> {
        // The allocator runs on the same budget as the callback.
        self.refuel()?;
        let url_ptr = match marshal::write_string(self.store_mut(), &fetch.url, DEFAULT_ARENA) {
            Ok(ptr) => ptr,
            Err(MarshalError::AllocationFailed { .. }) => {
                log::error!("no guest memory for the url of fetch {}", fetch.id);
                0
            }
            Err(e) => return Err(e.into()),
        };

        let result = match outcome {
            FetchOutcome::Completed(data) => match loaded {
                Some(loaded) => self.deliver_payload(fetch.id, url_ptr, &data, loaded, failed),
                None => {
                    log::warn!(
                        "guest has no file_loaded export; dropping fetch {} '{}'",
                        fetch.id,
                        fetch.url
                    );
                    Ok(())
                }
            },
            FetchOutcome::Failed { code, .. } => {
                self.report_fetch_failure(fetch.id, url_ptr, code, failed)
            }
        };

        if url_ptr != 0 {
            let url_len = fetch.url.chars().count() + 1;
            let freed = marshal::free(self.store_mut(), url_ptr, url_len, DEFAULT_ARENA);
            return keep_callback_error(result, freed, fetch.id);
        }
        result
    }

    fn deliver_payload(
        &mut self,
        id: i32,
        url_ptr: GuestAddress,
        data: &[u8],
        loaded: Func,
        failed: Option<Func>,
    ) -> Result<(), BridgeError> {
        let data_ptr = match marshal::write_buffer(self.store_mut(), data, DEFAULT_ARENA) {
            Ok(ptr) => ptr,
            Err(MarshalError::AllocationFailed { size }) => {
                log::error!("no guest memory for {} bytes of fetch {}", size, id);
                return self.report_fetch_failure(id, url_ptr, FETCH_ALLOCATION_FAILED, failed);
            }
            Err(e) => return Err(e.into()),
        };
        let len = i32::try_from(data.len()).unwrap_or(i32::MAX);
        let called = self.invoke::<(i32, i32, i32, i32), ()>(
            loaded,
            (id, url_ptr as i32, data_ptr as i32, len),
        );
        let freed = marshal::free(self.store_mut(), data_ptr, data.len(), DEFAULT_ARENA);
        keep_callback_error(called, freed, id)
    }

    fn report_fetch_failure(
        &mut self,
        id: i32,
        url_ptr: GuestAddress,
        code: i32,
        failed: Option<Func>,
    ) -> Result<(), BridgeError> {
        match failed {
            Some(failed) => {
                self.invoke::<(i32, i32, i32), ()>(failed, (id, url_ptr as i32, code))
            }
            None => {
                log::info!("fetch {} failed with code {}; guest has no failure callback", id, code);
                Ok(())
            }
        }
    }
}

/// A failed callback outranks a failed free of its arguments.
fn keep_callback_error(
    called: Result<(), BridgeError>,
    freed: Result<(), MarshalError>,
    id: i32,
) -> Result<(), BridgeError> {
    match (called, freed) {
        (Err(e), Err(free_err)) => {
            log::warn!("fetch {}: free after failed callback also failed: {}", id, free_err);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), freed) => freed.map_err(BridgeError::from),
    }
}

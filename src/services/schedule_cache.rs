// Whole-schedule cache with a single-flight guard
//
// States, driven only by `get()`:
//   Fresh        cached schedule younger than the TTL, served as is
//   Idle         stale or empty and nothing building; the caller starts a build
//   Building     a build is in flight; callers join it and share its outcome
//
// The build runs in its own task so it finishes (and fills the cache) even if
// every waiting request goes away. The in-flight marker is cleared by a drop
// guard inside that task, so it is released on success, failure and panic alike.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::cache::CacheEntry;
use super::schedule::{BuildSchedule, ScheduleError};
use crate::models::Schedule;

type SharedBuild = Shared<BoxFuture<'static, Result<Arc<Schedule>, ScheduleError>>>;

#[derive(Default)]
struct CacheState {
    cached: Option<CacheEntry<Arc<Schedule>>>,
    in_flight: Option<SharedBuild>,
}

struct Inner {
    builder: Arc<dyn BuildSchedule>,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl Inner {
    // Never held across an await point
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Clears the in-flight marker however the build task ends
struct InFlightGuard(Arc<Inner>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.lock().in_flight = None;
    }
}

#[derive(Clone)]
pub struct ScheduleCache {
    inner: Arc<Inner>,
}

impl ScheduleCache {
    pub fn new(builder: Arc<dyn BuildSchedule>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                builder,
                ttl,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    /// Serve the cached schedule if fresh, otherwise join or start the one
    /// build allowed in flight. Every joiner gets the same result or error.
    pub async fn get(&self) -> Result<Arc<Schedule>, ScheduleError> {
        let build = {
            let mut state = self.inner.lock();

            if let Some(entry) = state.cached.as_ref().filter(|e| e.is_fresh(self.inner.ttl)) {
                tracing::debug!("Serving cached schedule");
                return Ok(entry.value.clone());
            }

            if let Some(build) = state.in_flight.clone() {
                tracing::debug!("Schedule build already in flight, waiting on it");
                build
            } else {
                let build = self.start_build();
                state.in_flight = Some(build.clone());
                build
            }
        };

        build.await
    }

    // Called with the state lock held, so the spawned task cannot clear the
    // marker before it has been recorded
    fn start_build(&self) -> SharedBuild {
        tracing::info!("Rebuilding schedule...");

        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            let _guard = InFlightGuard(inner.clone());

            let result = inner.builder.build().await.map(Arc::new);
            match result {
                Ok(ref schedule) => {
                    inner.lock().cached = Some(CacheEntry::new(schedule.clone()));
                    tracing::info!("Schedule cached ({} titles)", schedule.len());
                }
                Err(ref e) => tracing::error!("Schedule build failed: {}", e),
            }
            result
        });

        async move {
            task.await.unwrap_or_else(|e| {
                tracing::error!("Schedule build task died: {}", e);
                Err(ScheduleError::Aborted)
            })
        }
        .boxed()
        .shared()
    }
}

//! Shared, async access to a single slide.
//!
//! The decoder is synchronous, CPU-bound and cannot be cancelled. When a
//! slide has to be used from async code, or by several tasks, wrap it in a
//! [`SharedSlide`]: every call takes a mutex and runs on tokio's blocking
//! pool, and region reads can be given a timeout.
//!
//! A timed-out read is abandoned, not cancelled. The native call keeps
//! running on its blocking thread and holds the lock until it returns, so
//! later calls queue behind it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use image::RgbImage;
use tracing::warn;

use crate::error::ReadError;

use super::reader::SlideReader;

/// A slide behind a mutex, cloneable across tasks.
pub struct SharedSlide<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedSlide<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: SlideReader + Send + 'static> SharedSlide<S> {
    /// Take ownership of a slide.
    pub fn new(slide: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(slide)),
        }
    }

    fn lock(inner: &Mutex<S>) -> Result<MutexGuard<'_, S>, ReadError> {
        inner.lock().map_err(|_| ReadError::Unavailable {
            reason: "a previous call panicked while holding the slide".to_string(),
        })
    }

    /// Run a closure against the slide on the current thread.
    ///
    /// Blocks while another call holds the slide.
    pub fn with<T>(&self, f: impl FnOnce(&S) -> T) -> Result<T, ReadError> {
        let slide = Self::lock(&self.inner)?;
        Ok(f(&slide))
    }

    /// Read a region on the blocking pool, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::TimedOut`] if the read did not finish in time,
    /// or any error from the underlying read.
    pub async fn read_region(
        &self,
        location: (u32, u32),
        level: usize,
        size: (u32, u32),
        timeout: Duration,
    ) -> Result<RgbImage, ReadError> {
        let inner = Arc::clone(&self.inner);
        let task = tokio::task::spawn_blocking(move || {
            let slide = Self::lock(&inner)?;
            slide.read_region(location, level, size)
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ReadError::Unavailable {
                reason: e.to_string(),
            }),
            Err(_) => {
                warn!(
                    x = location.0,
                    y = location.1,
                    level,
                    timeout_ms = timeout.as_millis() as u64,
                    "region read timed out; abandoning native call"
                );
                Err(ReadError::TimedOut {
                    x: location.0,
                    y: location.1,
                    level,
                    millis: timeout.as_millis(),
                })
            }
        }
    }

    /// Close the slide once any in-flight call has finished.
    pub fn close(&self) {
        match self.inner.lock() {
            Ok(mut slide) => slide.close(),
            Err(poisoned) => poisoned.into_inner().close(),
        }
    }
}

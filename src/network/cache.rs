//! Pending-frame cache between the caller and the network task
//!
//! Absorbs short network stalls. When full, new frames are refused and the
//! caller counts them as dropped.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::CacheError;
use crate::network::frame::MediaFrame;

struct CacheInner {
    frames: VecDeque<MediaFrame>,
    capacity: usize,
}

/// Bounded, resizable FIFO of frames awaiting transmission
pub struct FrameCache {
    inner: Mutex<CacheInner>,
    available: Notify,
}

impl FrameCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                frames: VecDeque::with_capacity(capacity),
                capacity,
            }),
            available: Notify::new(),
        }
    }

    /// Queue a frame; hands it back if the cache is full
    pub fn push(&self, frame: MediaFrame) -> Result<(), MediaFrame> {
        {
            let mut inner = self.inner.lock();
            if inner.frames.len() >= inner.capacity {
                return Err(frame);
            }
            inner.frames.push_back(frame);
        }
        self.available.notify_one();
        Ok(())
    }

    pub fn pop(&self) -> Option<MediaFrame> {
        self.inner.lock().frames.pop_front()
    }

    /// Wait for the next frame
    pub async fn next(&self) -> MediaFrame {
        loop {
            if let Some(frame) = self.pop() {
                return frame;
            }
            self.available.notified().await;
        }
    }

    /// Change the capacity.
    ///
    /// Shrinking below the number of queued frames is a configuration error.
    pub fn resize(&self, capacity: usize) -> Result<(), CacheError> {
        let mut inner = self.inner.lock();
        if inner.frames.len() > capacity {
            return Err(CacheError::WouldTruncate {
                len: inner.frames.len(),
                requested: capacity,
            });
        }
        inner.capacity = capacity;
        let len = inner.frames.len();
        inner.frames.shrink_to(capacity.max(len));
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::frame::FrameKind;
    use bytes::Bytes;
    use std::sync::Arc;
    use std::time::Duration;

    fn frame(pts: i64) -> MediaFrame {
        MediaFrame {
            kind: FrameKind::Audio,
            presentation_time_us: pts,
            flags: Default::default(),
            payload: Bytes::new(),
        }
    }

    #[test]
    fn test_refuses_when_full() {
        let cache = FrameCache::new(2);
        assert!(cache.push(frame(0)).is_ok());
        assert!(cache.push(frame(1)).is_ok());
        let refused = cache.push(frame(2)).unwrap_err();
        assert_eq!(refused.presentation_time_us, 2);

        assert_eq!(cache.pop().unwrap().presentation_time_us, 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_resize() {
        let cache = FrameCache::new(4);
        cache.push(frame(0)).unwrap();
        cache.push(frame(1)).unwrap();
        cache.push(frame(2)).unwrap();

        assert_eq!(
            cache.resize(2),
            Err(CacheError::WouldTruncate { len: 3, requested: 2 })
        );
        assert_eq!(cache.capacity(), 4);

        assert!(cache.resize(3).is_ok());
        assert_eq!(cache.capacity(), 3);
        assert!(cache.push(frame(3)).is_err());

        cache.clear();
        assert!(cache.resize(1).is_ok());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_next_waits_for_push() {
        let cache = Arc::new(FrameCache::new(4));
        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.next().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.push(frame(42)).unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.presentation_time_us, 42);
    }
}

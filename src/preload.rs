use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use log::{debug, info, warn};

use crate::textures::{MaterialSource, TextureCache};

/// Loads every material a source knows about on a pool of worker threads.
///
/// Workers only decode pixels into the [`TextureCache`]; uploading happens
/// later on the render thread. Each finished material is reported on a
/// bounded channel that the frame loop drains with [`Preloader::drain`].
pub struct Preloader {
    expected: usize,
    loaded: usize,
    completions: Receiver<()>,
    workers: Vec<JoinHandle<()>>,
}

impl Preloader {
    pub fn start(
        source: Arc<dyn MaterialSource>,
        cache: Arc<TextureCache>,
        worker_count: usize,
        channel_capacity: usize,
    ) -> Preloader {
        let keys = source.keys();
        let expected = keys.len();
        let (sender, completions) = crossbeam_channel::bounded(channel_capacity.max(1));
        let chunk_size = expected.div_ceil(worker_count.max(1)).max(1);

        let workers = keys
            .chunks(chunk_size)
            .map(|chunk| {
                let chunk = chunk.to_vec();
                let source = Arc::clone(&source);
                let cache = Arc::clone(&cache);
                let sender = sender.clone();
                thread::spawn(move || {
                    for key in chunk {
                        if cache.begin_load(&key) {
                            cache.finish_load(&key, source.load(&key));
                        }
                        if sender.send(()).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect::<Vec<_>>();

        info!(
            "Preloading {expected} textures on {} threads...",
            workers.len()
        );
        Preloader {
            expected,
            loaded: 0,
            completions,
            workers,
        }
    }

    /// Counts up to `limit` finished materials without blocking. Returns how
    /// many were counted.
    pub fn drain(&mut self, limit: usize) -> usize {
        let was_complete = self.is_complete();
        let mut drained = 0;
        while drained < limit {
            if self.completions.try_recv().is_err() {
                break;
            }
            drained += 1;
        }
        self.loaded += drained;
        if drained > 0 {
            debug!("Preloaded {}/{} textures", self.loaded, self.expected);
        }
        if !was_complete && self.is_complete() {
            info!("Preloaded {} textures", self.expected);
        }
        drained
    }

    /// `(loaded, expected)`.
    pub fn progress(&self) -> (usize, usize) {
        (self.loaded, self.expected)
    }

    pub fn is_complete(&self) -> bool {
        self.loaded >= self.expected
    }
}

impl Drop for Preloader {
    fn drop(&mut self) {
        // Disconnect first so workers blocked on a full channel give up.
        self.completions = crossbeam_channel::never();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("A texture preloading thread panicked");
            }
        }
    }
}

//! Fire-and-forget task spawning for the single-threaded event loop

use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;

/// Runs a detached future on the current thread's event loop
pub trait TaskSpawner {
    fn spawn_detached(&self, task: LocalBoxFuture<'static, ()>);
}

impl TaskSpawner for futures::executor::LocalSpawner {
    fn spawn_detached(&self, task: LocalBoxFuture<'static, ()>) {
        if let Err(err) = self.spawn_local(task) {
            tracing::warn!(error = %err, "Failed to spawn background task");
        }
    }
}

/// Spawns onto the browser's microtask queue
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserSpawner;

#[cfg(target_arch = "wasm32")]
impl TaskSpawner for BrowserSpawner {
    fn spawn_detached(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }
}

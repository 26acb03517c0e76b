use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A cancellable, re-armable one-shot task.
///
/// Arming always cancels the previous instance first, so at most one
/// scheduled task can ever fire. Must be armed from within a
/// `tokio::task::LocalSet`.
#[derive(Default)]
pub struct Deferred {
    generation: Rc<Cell<u64>>,
    armed: Rc<Cell<bool>>,
    task: RefCell<Option<JoinHandle<()>>>,
}

impl Deferred {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm<F>(&self, delay: Duration, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.cancel();

        let generation = self.generation.get();
        let current = self.generation.clone();
        let armed = self.armed.clone();
        armed.set(true);

        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            // an abort may race with an already-elapsed sleep
            if current.get() != generation {
                return;
            }
            armed.set(false);
            task();
        });
        *self.task.borrow_mut() = Some(handle);
    }

    pub fn cancel(&self) {
        self.generation.set(self.generation.get().wrapping_add(1));
        self.armed.set(false);
        if let Some(handle) = self.task.borrow_mut().take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.get()
    }
}

impl Drop for Deferred {
    fn drop(&mut self) {
        self.cancel();
    }
}

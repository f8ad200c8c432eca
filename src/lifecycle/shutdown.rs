//! Shutdown coordination: the event loop stop signal and process exit hooks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that the server and its long-running tasks
/// subscribe to. Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Later triggers are no-ops.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

type Hook = Box<dyn FnOnce() + Send>;

/// Exit hooks owned by libraries the server links against.
///
/// Run once, in registration order, after the logger has been released.
#[derive(Default)]
pub struct ShutdownHooks {
    hooks: Vec<(&'static str, Hook)>,
}

impl ShutdownHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &'static str, hook: impl FnOnce() + Send + 'static) {
        self.hooks.push((name, Box::new(hook)));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook, consuming the list.
    pub fn run_all(self) {
        for (name, hook) in self.hooks {
            tracing::debug!(hook = name, "Running shutdown hook");
            hook();
        }
    }
}

impl std::fmt::Debug for ShutdownHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.hooks.iter().map(|(name, _)| *name).collect();
        f.debug_struct("ShutdownHooks").field("hooks", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn hooks_run_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = ShutdownHooks::new();
        for name in ["first", "second"] {
            let order = order.clone();
            hooks.register(name, move || order.lock().push(name));
        }
        assert_eq!(hooks.len(), 2);

        hooks.run_all();
        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn subscribers_observe_trigger() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        let other = shutdown.clone();

        other.trigger();
        other.trigger();

        assert!(rx.recv().await.is_ok());
        assert!(shutdown.is_triggered());
    }
}

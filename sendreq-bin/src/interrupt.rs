use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Install the Ctrl+C handler. The first press stops the run and reports,
/// the second aborts the process.
pub fn register() -> Result<Interrupted, ctrlc::Error> {
    let interrupted = Interrupted::new();
    let handle = interrupted.clone();
    ctrlc::set_handler(move || {
        if handle.interrupted() {
            eprintln!("User requested abort (Ctrl+C twice)");
            std::process::exit(1);
        }
        eprintln!("Stopping and reporting (Ctrl+C again to abort)...");
        handle.interrupt();
    })?;
    Ok(interrupted)
}

#[derive(Default)]
struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

#[derive(Clone, Default)]
pub struct Interrupted {
    inner: Arc<Inner>,
}

impl Interrupted {
    pub fn new() -> Interrupted {
        Interrupted::default()
    }

    pub fn interrupt(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn interrupted(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolves once `interrupt` has been called, immediately if it already was.
    pub async fn wait(&self) {
        // the `Notified` future must exist before the flag check to not miss a wakeup
        let notified = self.inner.notify.notified();
        if self.interrupted() {
            return;
        }
        notified.await;
    }
}

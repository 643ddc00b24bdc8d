use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation token threaded through every [`FileSystem`](crate::FileSystem)
/// call.
///
/// The bundled backends complete synchronously and never consult it; it is
/// carried so callers and custom backends share one calling convention.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
}

impl Context {
    /// A context that is never cancelled unless [`cancel`](Self::cancel) is called.
    pub fn background() -> Self {
        Self::default()
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_reaches_clones() {
        let ctx = Context::background();
        let child = ctx.clone();
        assert!(!child.is_cancelled());
        ctx.cancel();
        assert!(child.is_cancelled());
    }
}

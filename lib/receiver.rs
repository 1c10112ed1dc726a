// Receiver capability: consumes bytes delivered by the receive task
use std::sync::Arc;

/// Target of every chunk the receive task reads.
///
/// Invocations for one connection are strictly sequential and run on the
/// receive task's thread; further reads wait until `on_receive` returns, so
/// implementations should return promptly. The receiver is dropped on that
/// thread; a disconnect issued from another thread returns only after that
/// drop, one issued from inside `on_receive` returns before it.
pub trait Receiver: Send + 'static {
    fn on_receive(&mut self, data: &[u8]);
}

impl<F> Receiver for F
where
    F: FnMut(&[u8]) + Send + 'static,
{
    fn on_receive(&mut self, data: &[u8]) {
        self(data)
    }
}

/// Plain callback paired with caller-owned context.
pub type ReceptionCallback<C> = fn(data: &[u8], len: usize, context: &C);

/// Receiver built from a function pointer and a shared context value,
/// for callers that keep their state outside the closure.
pub struct ContextReceiver<C> {
    callback: ReceptionCallback<C>,
    context: Arc<C>,
}

impl<C> ContextReceiver<C> {
    pub fn new(callback: ReceptionCallback<C>, context: Arc<C>) -> Self {
        ContextReceiver { callback, context }
    }
}

impl<C: Send + Sync + 'static> Receiver for ContextReceiver<C> {
    fn on_receive(&mut self, data: &[u8]) {
        (self.callback)(data, data.len(), &self.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn closures_are_receivers() {
        let (tx, rx) = crossbeam::channel::unbounded();
        let mut receiver = move |data: &[u8]| {
            let _ = tx.send(data.to_vec());
        };
        receiver.on_receive(b"ab");
        receiver.on_receive(b"c");
        drop(receiver);
        let seen: Vec<u8> = rx.iter().flatten().collect();
        assert_eq!(seen, b"abc");
    }

    #[test]
    fn context_receiver_passes_length_and_context() {
        fn count(_: &[u8], len: usize, total: &AtomicUsize) {
            total.fetch_add(len, Ordering::Relaxed);
        }

        let total = Arc::new(AtomicUsize::new(0));
        let mut receiver = ContextReceiver::new(count, Arc::clone(&total));
        receiver.on_receive(&[1, 2, 3]);
        receiver.on_receive(&[4]);
        assert_eq!(total.load(Ordering::Relaxed), 4);
    }
}

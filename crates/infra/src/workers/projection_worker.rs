use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use aura_events::Subscription;

/// Handle to stop and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Drains a bus subscription on a dedicated thread.
///
/// The handler must be idempotent: the bus delivers at least once and the
/// request path may already have applied the same envelope.
#[derive(Debug)]
pub struct ProjectionWorker;

impl ProjectionWorker {
    pub fn spawn<M, H, E>(name: &'static str, subscription: Subscription<M>, mut handler: H) -> std::io::Result<WorkerHandle>
    where
        M: Send + 'static,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, subscription, shutdown_rx, &mut handler))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<M, H, E>(name: &'static str, sub: Subscription<M>, shutdown_rx: mpsc::Receiver<()>, handler: &mut H)
where
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Debug,
{
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => {
                if let Err(err) = handler(msg) {
                    warn!(worker = name, error = ?err, "worker handler failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!(worker = name, "worker stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use aura_events::{EventBus, InMemoryEventBus};

    use super::*;

    #[test]
    fn worker_drains_until_shutdown() {
        let bus: InMemoryEventBus<u32> = InMemoryEventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handle = ProjectionWorker::spawn("test-worker", bus.subscribe(), move |m| {
            sink.lock().unwrap().push(m);
            Ok::<(), ()>(())
        })
        .unwrap();

        bus.publish(1).unwrap();
        bus.publish(2).unwrap();
        for _ in 0..40 {
            if seen.lock().unwrap().len() == 2 {
                break;
            }
            thread::sleep(Duration::from_millis(25));
        }
        handle.shutdown();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }
}

//! Network reachability tracking. Observes online/offline transitions; never gates a submission.

use std::{fmt, sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn is_online(self) -> bool {
        self == Connectivity::Online
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Online => f.write_str("online"),
            Connectivity::Offline => f.write_str("offline"),
        }
    }
}

/// Holds the current connectivity flag. Clones share the same flag.
#[derive(Clone)]
pub struct ConnectivityWatcher {
    tx: Arc<watch::Sender<Connectivity>>,
}

impl ConnectivityWatcher {
    pub fn new(initial: Connectivity) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Connectivity {
        *self.tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.current().is_online()
    }

    /// Applies a transition; returns whether the flag actually changed.
    pub fn transition(&self, next: Connectivity) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            info!(connectivity = %next, "connectivity changed");
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityWatcher {
    fn default() -> Self {
        Self::new(Connectivity::Online)
    }
}

/// Something that can tell whether the backend is reachable right now.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn probe(&self) -> Result<()>;
}

/// Polls `probe` every `interval` and feeds the outcome into `watcher` as transitions.
pub fn spawn_status_probe(
    watcher: ConnectivityWatcher,
    probe: Arc<dyn StatusProbe>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let next = match probe.probe().await {
                Ok(()) => Connectivity::Online,
                Err(err) => {
                    if watcher.is_online() {
                        warn!(error = %err, "status probe failed");
                    } else {
                        debug!(error = %err, "status probe still failing");
                    }
                    Connectivity::Offline
                }
            };
            watcher.transition(next);
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use anyhow::anyhow;

    use super::*;

    #[test]
    fn transition_updates_flag_synchronously() {
        let watcher = ConnectivityWatcher::default();
        assert!(watcher.is_online());

        assert!(watcher.transition(Connectivity::Offline));
        assert_eq!(watcher.current(), Connectivity::Offline);

        assert!(!watcher.transition(Connectivity::Offline));
        assert!(watcher.transition(Connectivity::Online));
        assert!(watcher.is_online());
    }

    #[test]
    fn clones_share_the_flag() {
        let watcher = ConnectivityWatcher::new(Connectivity::Online);
        let other = watcher.clone();
        other.transition(Connectivity::Offline);
        assert!(!watcher.is_online());
    }

    struct ToggleProbe {
        up: AtomicBool,
    }

    #[async_trait]
    impl StatusProbe for ToggleProbe {
        async fn probe(&self) -> Result<()> {
            if self.up.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(anyhow!("connection refused"))
            }
        }
    }

    #[tokio::test]
    async fn probe_task_reports_transitions() {
        let watcher = ConnectivityWatcher::new(Connectivity::Online);
        let mut changes = watcher.subscribe();
        let probe = Arc::new(ToggleProbe {
            up: AtomicBool::new(false),
        });
        let task = spawn_status_probe(watcher.clone(), probe.clone(), Duration::from_millis(10));

        tokio::time::timeout(Duration::from_secs(2), changes.changed())
            .await
            .expect("offline transition")
            .expect("watch open");
        assert_eq!(*changes.borrow_and_update(), Connectivity::Offline);

        probe.up.store(true, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(2), changes.changed())
            .await
            .expect("online transition")
            .expect("watch open");
        assert_eq!(*changes.borrow_and_update(), Connectivity::Online);

        task.abort();
    }
}

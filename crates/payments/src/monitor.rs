//! Payment monitor: one polling task per watched payment.
//!
//! A watch resolves at most once, when the ledger first reports
//! [`CONFIRMED_STATE`]. The binding stays registered after it fired and is
//! removed only by [`PaymentMonitor::stop`], so `is_active` reflects the
//! owner's view of the job rather than the task's. With a watch limit, an
//! unconfirmed watch gives up once the limit elapses and removes its own
//! binding; the watch then resolves to `None`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use docmint_core::PaymentId;

use crate::ledger::PaymentLedger;
use crate::types::CONFIRMED_STATE;

/// Delivered once when a watched payment is confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub payment_id: PaymentId,
    /// Ledger state observed at confirmation time
    pub state: String,
}

/// Receiving side of a payment watch.
#[derive(Debug)]
pub struct PaymentWatch {
    payment_id: PaymentId,
    rx: oneshot::Receiver<PaymentConfirmation>,
}

impl PaymentWatch {
    pub fn payment_id(&self) -> &PaymentId {
        &self.payment_id
    }

    /// Wait for the confirmation.
    ///
    /// Returns `None` if the watch was stopped before the payment was confirmed.
    pub async fn confirmed(self) -> Option<PaymentConfirmation> {
        self.rx.await.ok()
    }
}

struct Binding {
    generation: u64,
    task: JoinHandle<()>,
}

type Bindings = Arc<Mutex<HashMap<PaymentId, Binding>>>;

fn lock(bindings: &Bindings) -> MutexGuard<'_, HashMap<PaymentId, Binding>> {
    bindings.lock().unwrap_or_else(|e| e.into_inner())
}

/// Polls the ledger for each watched payment.
pub struct PaymentMonitor {
    ledger: Arc<dyn PaymentLedger>,
    poll_interval: Duration,
    /// How long an unconfirmed payment is watched; `None` watches forever
    watch_limit: Option<Duration>,
    bindings: Bindings,
    generations: AtomicU64,
}

impl std::fmt::Debug for PaymentMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentMonitor")
            .field("poll_interval", &self.poll_interval)
            .field("watch_limit", &self.watch_limit)
            .field("active", &self.active_count())
            .finish()
    }
}

impl PaymentMonitor {
    pub fn new(ledger: Arc<dyn PaymentLedger>, poll_interval: Duration) -> Self {
        Self {
            ledger,
            poll_interval,
            watch_limit: None,
            bindings: Arc::new(Mutex::new(HashMap::new())),
            generations: AtomicU64::new(0),
        }
    }

    pub fn with_watch_limit(mut self, limit: Duration) -> Self {
        self.watch_limit = Some(limit);
        self
    }

    fn bindings(&self) -> MutexGuard<'_, HashMap<PaymentId, Binding>> {
        lock(&self.bindings)
    }

    /// Start watching a payment.
    ///
    /// Watching an already-watched payment replaces the previous binding; the
    /// old watch then resolves to `None`.
    pub fn watch(&self, payment_id: PaymentId) -> PaymentWatch {
        let (tx, rx) = oneshot::channel();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);

        // Held across the spawn so an expiring task cannot look for its binding before it exists.
        let mut bindings = self.bindings();
        let task = tokio::spawn(watch_payment(
            self.ledger.clone(),
            payment_id.clone(),
            self.poll_interval,
            self.watch_limit,
            tx,
            Arc::clone(&self.bindings),
            generation,
        ));
        let previous = bindings.insert(payment_id.clone(), Binding { generation, task });
        drop(bindings);

        if let Some(previous) = previous {
            warn!(payment_id = %payment_id, "replacing existing payment watch");
            previous.task.abort();
        }
        debug!(payment_id = %payment_id, "payment watch started");

        PaymentWatch { payment_id, rx }
    }

    /// Remove a binding. Returns `false` if there was nothing to stop.
    pub fn stop(&self, payment_id: &PaymentId) -> bool {
        match self.bindings().remove(payment_id) {
            Some(binding) => {
                binding.task.abort();
                debug!(payment_id = %payment_id, "payment watch stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, payment_id: &PaymentId) -> bool {
        self.bindings().contains_key(payment_id)
    }

    pub fn active_count(&self) -> usize {
        self.bindings().len()
    }
}

impl Drop for PaymentMonitor {
    fn drop(&mut self) {
        for (_, binding) in self.bindings().drain() {
            binding.task.abort();
        }
    }
}

enum WatchEnd {
    Confirmed,
    ReceiverGone,
    Expired,
}

async fn watch_payment(
    ledger: Arc<dyn PaymentLedger>,
    payment_id: PaymentId,
    poll_interval: Duration,
    watch_limit: Option<Duration>,
    tx: oneshot::Sender<PaymentConfirmation>,
    bindings: Bindings,
    generation: u64,
) {
    let end =
        poll_until_confirmed(ledger, payment_id.clone(), poll_interval, watch_limit, tx).await;
    if let WatchEnd::Expired = end {
        let mut bindings = lock(&bindings);
        if bindings.get(&payment_id).is_some_and(|b| b.generation == generation) {
            bindings.remove(&payment_id);
        }
        info!(payment_id = %payment_id, "payment not confirmed within the watch limit");
    }
}

async fn poll_until_confirmed(
    ledger: Arc<dyn PaymentLedger>,
    payment_id: PaymentId,
    poll_interval: Duration,
    watch_limit: Option<Duration>,
    tx: oneshot::Sender<PaymentConfirmation>,
) -> WatchEnd {
    let deadline = watch_limit.map(|limit| tokio::time::Instant::now() + limit);
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if tx.is_closed() {
            debug!(payment_id = %payment_id, "watch receiver dropped, stopping poll");
            return WatchEnd::ReceiverGone;
        }
        if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
            return WatchEnd::Expired;
        }

        match ledger.payment_status(&payment_id).await {
            Ok(state) if state == CONFIRMED_STATE => {
                info!(payment_id = %payment_id, %state, "payment confirmed");
                let _ = tx.send(PaymentConfirmation { payment_id, state });
                return WatchEnd::Confirmed;
            }
            Ok(state) => {
                debug!(payment_id = %payment_id, %state, "payment not confirmed yet");
            }
            Err(e) => {
                warn!(payment_id = %payment_id, error = %e, "payment status poll failed");
            }
        }
    }
}

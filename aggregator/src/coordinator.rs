use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::models::{CurrencyPair, Exchange, PriceQuote};
use connectors::{ConnectorEvent, ExchangeConnector, UpdateMode};
use futures::future::join_all;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::PriceTable;

const COMMAND_BUFFER: usize = 8;

/// Tuning for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Pairs the display should track.
    pub pairs: Vec<CurrencyPair>,
    /// Poll cadence for REST backed exchanges.
    pub poll_interval: Duration,
    /// Quiet window used to coalesce streamed updates into one redraw.
    pub stream_debounce: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            pairs: Vec::new(),
            poll_interval: Duration::from_secs(15),
            stream_debounce: Duration::from_millis(250),
        }
    }
}

enum Command {
    SetSelection(Vec<CurrencyPair>),
}

/// Service owning the connectors and the merged price table.
///
/// Every mutation funnels through one event loop task: connectors report
/// into an mpsc channel, the loop merges updates into the table and bumps a
/// generation counter whenever the display should redraw. Each polling
/// exchange gets its own pacing task, so a slow round delays only that
/// exchange's next round and never the others.
pub struct PriceCoordinator {
    /// Connectors in priority order, highest first
    connectors: Vec<Arc<dyn ExchangeConnector>>,
    /// Merged quotes, written only by the event loop
    table: Arc<RwLock<PriceTable>>,
    config: CoordinatorConfig,
    events: Option<mpsc::Receiver<ConnectorEvent>>,
    commands: mpsc::Sender<Command>,
    command_queue: Option<mpsc::Receiver<Command>>,
    updates: Arc<watch::Sender<u64>>,
    tasks: Vec<JoinHandle<()>>,
}

impl PriceCoordinator {
    /// `events` must be the receiving half of the channel the connectors
    /// were built with. Registration order sets exchange priority.
    pub fn new(
        connectors: Vec<Arc<dyn ExchangeConnector>>,
        events: mpsc::Receiver<ConnectorEvent>,
        config: CoordinatorConfig,
    ) -> Self {
        let priorities: Vec<Exchange> = connectors.iter().map(|c| c.exchange()).collect();
        let (commands, command_queue) = mpsc::channel(COMMAND_BUFFER);
        let (updates, _) = watch::channel(0);

        Self {
            connectors,
            table: Arc::new(RwLock::new(PriceTable::new(priorities))),
            config,
            events: Some(events),
            commands,
            command_queue: Some(command_queue),
            updates: Arc::new(updates),
            tasks: Vec::new(),
        }
    }

    /// Receiver observing the redraw generation counter. Each published
    /// value covers a whole batch of price changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    /// Snapshot of the merged table in display order.
    pub async fn quotes(&self) -> Vec<PriceQuote> {
        self.table.read().await.quotes()
    }

    /// Displayed price for one pair, if any exchange has reported it.
    pub async fn price(&self, pair: &CurrencyPair) -> Option<f64> {
        self.table.read().await.price(pair)
    }

    /// Discovers each exchange's pairs, applies the configured selection and
    /// spawns the pacing and event loop tasks. Calling it again is a no-op.
    pub async fn start(&mut self) {
        let events = match self.events.take() {
            Some(receiver) => receiver,
            None => return,
        };
        let commands = match self.command_queue.take() {
            Some(receiver) => receiver,
            None => return,
        };

        let loads = join_all(self.connectors.iter().map(|connector| async {
            (connector.exchange(), connector.load_pairs().await)
        }))
        .await;

        let mut available = HashMap::new();
        for (exchange, result) in loads {
            match result {
                Ok(pairs) => {
                    info!("{} lists {} usable pairs", exchange, pairs.len());
                    available.insert(exchange, pairs);
                }
                Err(e) => {
                    // The exchange contributes nothing until the next start.
                    error!("Failed to load pairs from {}: {}", exchange, e);
                    available.insert(exchange, Vec::new());
                }
            }
        }

        let selection = normalize_selection(self.config.pairs.clone());
        apply_selection(&self.connectors, &available, &self.table, &selection).await;

        for connector in &self.connectors {
            if connector.update_mode() != UpdateMode::Polling {
                continue;
            }
            let connector = Arc::clone(connector);
            let poll_interval = self.config.poll_interval;
            self.tasks.push(tokio::spawn(async move {
                // First tick fires immediately; Delay keeps rounds from
                // bunching up when one overruns the interval.
                let mut ticker = time::interval(poll_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    connector.fetch().await;
                }
            }));
        }

        let event_loop = EventLoop {
            connectors: self.connectors.clone(),
            available,
            modes: self
                .connectors
                .iter()
                .map(|c| (c.exchange(), c.update_mode()))
                .collect(),
            selection,
            table: Arc::clone(&self.table),
            updates: Arc::clone(&self.updates),
            debounce: self.config.stream_debounce,
        };
        self.tasks.push(tokio::spawn(event_loop.run(events, commands)));

        info!(
            "Price coordinator started with {} exchanges",
            self.connectors.len()
        );
    }

    /// Replaces the tracked pairs. Applied by the event loop, so a burst of
    /// calls takes effect in order.
    pub async fn set_selection(&self, pairs: Vec<CurrencyPair>) {
        let _ = self.commands.send(Command::SetSelection(pairs)).await;
    }

    /// Aborts the spawned tasks and tears down every connector.
    pub async fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        for connector in &self.connectors {
            connector.stop().await;
            self.table
                .write()
                .await
                .remove_exchange(connector.exchange());
        }
        info!("Price coordinator stopped");
    }
}

struct EventLoop {
    connectors: Vec<Arc<dyn ExchangeConnector>>,
    available: HashMap<Exchange, Vec<CurrencyPair>>,
    modes: HashMap<Exchange, UpdateMode>,
    selection: Vec<CurrencyPair>,
    table: Arc<RwLock<PriceTable>>,
    updates: Arc<watch::Sender<u64>>,
    debounce: Duration,
}

impl EventLoop {
    async fn run(
        mut self,
        mut events: mpsc::Receiver<ConnectorEvent>,
        mut commands: mpsc::Receiver<Command>,
    ) {
        let mut generation: u64 = 0;
        let mut dirty = false;
        let mut pending_flush: Option<Instant> = None;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(ConnectorEvent::PriceUpdated { exchange, pair, price }) => {
                        // A task may have queued this before a selection
                        // change was processed; a deselected pair must not
                        // re-enter the table.
                        if self.selection.contains(&pair) {
                            let accepted =
                                self.table.write().await.apply(exchange, pair, price);
                            let mode = self
                                .modes
                                .get(&exchange)
                                .copied()
                                .unwrap_or(UpdateMode::RealTime);
                            if accepted {
                                dirty = true;
                                if mode == UpdateMode::RealTime && pending_flush.is_none() {
                                    pending_flush = Some(Instant::now() + self.debounce);
                                }
                            }
                        } else {
                            debug!("Dropping {} update for deselected pair {}", exchange, pair);
                        }
                    }
                    Some(ConnectorEvent::FetchCompleted { exchange }) => {
                        debug!("{} finished a polling round", exchange);
                        // A round that changed nothing publishes nothing.
                        if dirty {
                            generation += 1;
                            self.updates.send_replace(generation);
                            dirty = false;
                            pending_flush = None;
                        }
                    }
                    None => break,
                },
                command = commands.recv() => match command {
                    Some(Command::SetSelection(pairs)) => {
                        self.selection = normalize_selection(pairs);
                        apply_selection(
                            &self.connectors,
                            &self.available,
                            &self.table,
                            &self.selection,
                        )
                        .await;
                        generation += 1;
                        self.updates.send_replace(generation);
                        dirty = false;
                        pending_flush = None;
                    }
                    None => break,
                },
                _ = flush_deadline(pending_flush) => {
                    generation += 1;
                    self.updates.send_replace(generation);
                    dirty = false;
                    pending_flush = None;
                }
            }
        }

        debug!("Coordinator event loop ended");
    }
}

async fn flush_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Selection Sets are kept sorted in display order and deduplicated by
/// logical pair.
fn normalize_selection(mut pairs: Vec<CurrencyPair>) -> Vec<CurrencyPair> {
    pairs.sort();
    pairs.dedup();
    pairs
}

/// Pushes a selection down to every connector and prunes table entries the
/// selection no longer covers. Each exchange keeps its own pair objects so
/// custom symbols survive the intersection. Real-time connectors refetch so
/// their socket subscriptions match the new set; polling connectors pick it
/// up on their next round.
async fn apply_selection(
    connectors: &[Arc<dyn ExchangeConnector>],
    available: &HashMap<Exchange, Vec<CurrencyPair>>,
    table: &Arc<RwLock<PriceTable>>,
    selection: &[CurrencyPair],
) {
    for connector in connectors {
        let exchange = connector.exchange();
        let pairs: Vec<CurrencyPair> = available
            .get(&exchange)
            .map(|listed| {
                listed
                    .iter()
                    .filter(|pair| selection.contains(*pair))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            "{} covers {} of {} selected pairs",
            exchange,
            pairs.len(),
            selection.len()
        );
        connector.set_selected_pairs(pairs).await;

        if connector.update_mode() == UpdateMode::RealTime {
            connector.fetch().await;
        }
    }

    table.write().await.retain_pairs(selection);
}

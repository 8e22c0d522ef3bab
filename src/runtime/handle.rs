use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot, watch},
    time::{Duration, Instant},
};

use crate::{
    contest::{ContestEntry, NewContest},
    core::store::{ContestStore, StoreError, StoreSnapshotV1},
    op::StoredOp,
    persist::{DocumentSink, PersistError},
    repository::{ContestRepository, Snapshot},
    types::{EntryId, OpSeq},
};

use super::events::ContestEvent;

/// Failures surfaced to callers of [`ContestLogHandle`].
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The store refused the contest.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The journal could not accept or write the contest.
    #[error("persistence failed: {0}")]
    Persist(#[from] PersistError),
    /// The runtime task is gone.
    #[error("contest log runtime is not running")]
    ChannelClosed,
}

/// When an append is acknowledged to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AckMode {
    /// Once the record is visible and queued for the journal. A journal
    /// write failing later is only reported by the next `flush`.
    InMemory,
    /// Once the journal confirmed the write; the record only becomes
    /// visible after that.
    #[default]
    Durable,
}

/// Runtime tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Acknowledgement policy for appends.
    pub ack_mode: AckMode,
    /// Write each append to the journal immediately instead of batching.
    pub flush_on_append: bool,
    /// Largest batch handed to the sink at once.
    pub batch_max_ops: usize,
    /// Longest time an op waits in the batch buffer.
    pub batch_max_latency_ms: u64,
    /// Capacity of the queue feeding the persistence worker.
    pub persist_queue_bound: usize,
    /// Checkpoint after this many appends; 0 disables.
    pub snapshot_every_ops: usize,
    /// Drop journal rows covered by a checkpoint.
    pub compact_after_snapshot: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ack_mode: AckMode::Durable,
            flush_on_append: true,
            batch_max_ops: 32,
            batch_max_latency_ms: 75,
            persist_queue_bound: 64,
            snapshot_every_ops: 2000,
            compact_after_snapshot: false,
        }
    }
}

/// Cloneable handle to a running contest log.
#[derive(Clone)]
pub struct ContestLogHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<ContestEvent>,
    entries_rx: watch::Receiver<Snapshot>,
}

type AckTx = oneshot::Sender<Result<OpSeq, PersistError>>;

enum Command {
    Append {
        contest: NewContest,
        resp: oneshot::Sender<Result<EntryId, RuntimeError>>,
    },
    Get {
        id: EntryId,
        resp: oneshot::Sender<Option<ContestEntry>>,
    },
    Snapshot {
        resp: oneshot::Sender<Snapshot>,
    },
    Flush {
        resp: oneshot::Sender<Result<OpSeq, RuntimeError>>,
    },
    Checkpoint {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

enum PersistMsg {
    Op {
        stored: StoredOp,
        ack: Option<AckTx>,
    },
    Flush {
        resp: oneshot::Sender<Result<OpSeq, PersistError>>,
    },
    Checkpoint {
        snapshot: StoreSnapshotV1,
        last_seq: OpSeq,
        compact: bool,
        resp: oneshot::Sender<Result<(), PersistError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

struct LoopState {
    store: ContestStore,
    events_tx: broadcast::Sender<ContestEvent>,
    entries_tx: watch::Sender<Snapshot>,
    persist_tx: Option<mpsc::Sender<PersistMsg>>,
    config: RuntimeConfig,
    ops_since_snapshot: usize,
}

/// Starts the single-writer loop owning `store`, journaling to `sink` when
/// one is given.
pub fn spawn_contest_log(
    store: ContestStore,
    sink: Option<Box<dyn DocumentSink>>,
    config: RuntimeConfig,
) -> ContestLogHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(256);
    let (events_tx, _) = broadcast::channel::<ContestEvent>(1024);
    let (entries_tx, entries_rx) = watch::channel::<Snapshot>(Arc::new(store.snapshot()));

    let (persist_tx, mut durable_rx) = if let Some(sink) = sink {
        let (persist_tx, persist_rx) =
            mpsc::channel::<PersistMsg>(config.persist_queue_bound.max(1));
        let (durable_tx, durable_rx) = mpsc::unbounded_channel::<Result<OpSeq, PersistError>>();
        spawn_persistence_worker(sink, persist_rx, durable_tx, config.clone());
        (Some(persist_tx), Some(durable_rx))
    } else {
        (None, None)
    };

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        let mut state = LoopState {
            store,
            events_tx: events_tx_loop,
            entries_tx,
            persist_tx,
            config,
            ops_since_snapshot: 0,
        };
        tracing::debug!(entries = state.store.len(), "Contest log runtime started");

        loop {
            if let Some(rx) = durable_rx.as_mut() {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        let Some(cmd) = cmd else { break; };
                        if handle_command(cmd, &mut state).await {
                            break;
                        }
                    }
                    durable = rx.recv() => {
                        match durable {
                            Some(Ok(op_seq)) => {
                                let _ = state.events_tx.send(ContestEvent::DurableUpTo { op_seq });
                            }
                            Some(Err(err)) => {
                                tracing::warn!(error = %err, "Journal write failed");
                            }
                            None => {}
                        }
                    }
                }
            } else {
                let Some(cmd) = cmd_rx.recv().await else { break; };
                if handle_command(cmd, &mut state).await {
                    break;
                }
            }
        }
        tracing::debug!("Contest log runtime stopped");
    });

    ContestLogHandle {
        cmd_tx,
        events_tx,
        entries_rx,
    }
}

impl ContestLogHandle {
    /// Subscribes to append and durability events.
    pub fn subscribe(&self) -> broadcast::Receiver<ContestEvent> {
        self.events_tx.subscribe()
    }

    /// Live view of all entries, replaced after every append.
    pub fn watch_entries(&self) -> watch::Receiver<Snapshot> {
        self.entries_rx.clone()
    }

    /// Appends a contest and returns its id once acknowledged.
    pub async fn append(&self, contest: NewContest) -> Result<EntryId, RuntimeError> {
        self.request(|resp| Command::Append { contest, resp }).await?
    }

    /// Fetches one entry.
    pub async fn get(&self, id: EntryId) -> Result<Option<ContestEntry>, RuntimeError> {
        self.request(|resp| Command::Get { id, resp }).await
    }

    /// Current full list of entries.
    pub async fn snapshot(&self) -> Result<Snapshot, RuntimeError> {
        self.request(|resp| Command::Snapshot { resp }).await
    }

    /// Writes everything queued and returns the durable sequence.
    pub async fn flush(&self) -> Result<OpSeq, RuntimeError> {
        self.request(|resp| Command::Flush { resp }).await?
    }

    /// Writes a checkpoint of the current store.
    pub async fn checkpoint(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Checkpoint { resp }).await?
    }

    /// Flushes the journal and stops the runtime.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Shutdown { resp }).await?
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(command(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }
}

impl ContestRepository for ContestLogHandle {
    type Error = RuntimeError;

    fn append(
        &self,
        contest: NewContest,
    ) -> impl Future<Output = Result<EntryId, Self::Error>> + Send {
        ContestLogHandle::append(self, contest)
    }

    fn watch_entries(&self) -> watch::Receiver<Snapshot> {
        ContestLogHandle::watch_entries(self)
    }
}

async fn handle_command(cmd: Command, state: &mut LoopState) -> bool {
    match cmd {
        Command::Append { contest, resp } => {
            let res = append_contest(state, contest).await;
            if let Ok(id) = &res {
                let _ = state
                    .entries_tx
                    .send_replace(Arc::new(state.store.snapshot()));
                let _ = state.events_tx.send(ContestEvent::Appended { id: *id });
                state.ops_since_snapshot += 1;
                maybe_auto_checkpoint(state).await;
            }
            let _ = resp.send(res);
        }
        Command::Get { id, resp } => {
            let _ = resp.send(state.store.get_cloned(id));
        }
        Command::Snapshot { resp } => {
            let _ = resp.send(state.entries_tx.borrow().clone());
        }
        Command::Flush { resp } => {
            let out = if let Some(tx) = state.persist_tx.as_ref() {
                let (flush_tx, flush_rx) = oneshot::channel();
                if tx.send(PersistMsg::Flush { resp: flush_tx }).await.is_err() {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    flush_rx
                        .await
                        .map_err(|_| RuntimeError::ChannelClosed)
                        .and_then(|r| r.map_err(RuntimeError::from))
                }
            } else {
                Ok(state.store.latest_op_seq())
            };
            let _ = resp.send(out);
        }
        Command::Checkpoint { resp } => {
            let out = checkpoint(state).await;
            let _ = resp.send(out);
        }
        Command::Shutdown { resp } => {
            let out = if let Some(tx) = state.persist_tx.as_ref() {
                let (done_tx, done_rx) = oneshot::channel();
                if tx.send(PersistMsg::Shutdown { resp: done_tx }).await.is_err() {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    done_rx.await.map_err(|_| RuntimeError::ChannelClosed)
                }
            } else {
                Ok(())
            };
            let _ = resp.send(out);
            return true;
        }
    }

    false
}

async fn append_contest(
    state: &mut LoopState,
    contest: NewContest,
) -> Result<EntryId, RuntimeError> {
    let stored = state.store.stage(contest)?;
    let seq = stored.seq;

    let Some(tx) = state.persist_tx.as_ref() else {
        let id = state.store.commit(stored)?;
        let _ = state.events_tx.send(ContestEvent::DurableUpTo {
            op_seq: state.store.latest_op_seq(),
        });
        tracing::debug!(id, seq, "Appended contest");
        return Ok(id);
    };

    match state.config.ack_mode {
        AckMode::InMemory => {
            enqueue_persist(tx, stored.clone(), None)?;
            let id = state.store.commit(stored)?;
            tracing::debug!(id, seq, "Appended contest");
            Ok(id)
        }
        AckMode::Durable => {
            let (ack_tx, ack_rx) = oneshot::channel();
            enqueue_persist(tx, stored.clone(), Some(ack_tx))?;
            ack_rx.await.map_err(|_| RuntimeError::ChannelClosed)??;
            let id = state.store.commit(stored)?;
            tracing::debug!(id, seq, "Appended contest durably");
            Ok(id)
        }
    }
}

async fn checkpoint(state: &mut LoopState) -> Result<(), RuntimeError> {
    let Some(tx) = state.persist_tx.as_ref() else {
        return Ok(());
    };

    let snapshot = state.store.export_snapshot();
    let last_seq = state.store.latest_op_seq();
    let (cp_tx, cp_rx) = oneshot::channel();
    tx.send(PersistMsg::Checkpoint {
        snapshot,
        last_seq,
        compact: state.config.compact_after_snapshot,
        resp: cp_tx,
    })
    .await
    .map_err(|_| RuntimeError::ChannelClosed)?;
    cp_rx.await.map_err(|_| RuntimeError::ChannelClosed)??;
    state.ops_since_snapshot = 0;
    tracing::debug!(last_seq, "Checkpoint written");
    Ok(())
}

async fn maybe_auto_checkpoint(state: &mut LoopState) {
    let every = state.config.snapshot_every_ops;
    if every == 0 || state.ops_since_snapshot < every {
        return;
    }

    if let Err(err) = checkpoint(state).await {
        tracing::warn!(error = %err, "Automatic checkpoint failed");
    }
}

type SharedSink = Arc<Mutex<Box<dyn DocumentSink>>>;

// Owns the batch buffer between the command loop and the sink. Sink calls
// run on the blocking pool, one at a time.
struct PersistWorker {
    sink: SharedSink,
    durable_tx: mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    pending: Vec<StoredOp>,
    waiting: Vec<AckTx>,
    durable_seq: OpSeq,
    // Set when a batch fails; reported by the next flush, then cleared.
    failed: Option<String>,
}

fn spawn_persistence_worker(
    sink: Box<dyn DocumentSink>,
    rx: mpsc::Receiver<PersistMsg>,
    durable_tx: mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    config: RuntimeConfig,
) {
    let worker = PersistWorker {
        sink: Arc::new(Mutex::new(sink)),
        durable_tx,
        pending: Vec::new(),
        waiting: Vec::new(),
        durable_seq: 0,
        failed: None,
    };
    tokio::spawn(worker.run(rx, config));
}

impl PersistWorker {
    async fn run(mut self, mut rx: mpsc::Receiver<PersistMsg>, config: RuntimeConfig) {
        let latency = Duration::from_millis(config.batch_max_latency_ms);
        let mut deadline = Instant::now() + latency;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        let _ = self.write_pending(true).await;
                        break;
                    };
                    match msg {
                        PersistMsg::Op { stored, ack } => {
                            let urgent = ack.is_some() || config.flush_on_append;
                            self.pending.push(stored);
                            self.waiting.extend(ack);
                            if urgent || self.pending.len() >= config.batch_max_ops {
                                let _ = self.write_pending(true).await;
                                deadline = Instant::now() + latency;
                            }
                        }
                        PersistMsg::Flush { resp } => {
                            let result = match self.write_pending(true).await {
                                Ok(()) => match self.failed.take() {
                                    Some(reason) => Err(PersistError::Message(reason)),
                                    None => Ok(self.durable_seq),
                                },
                                Err(err) => {
                                    self.failed = None;
                                    Err(err)
                                }
                            };
                            let _ = resp.send(result);
                            deadline = Instant::now() + latency;
                        }
                        PersistMsg::Checkpoint { snapshot, last_seq, compact, resp } => {
                            let result = match self.write_pending(true).await {
                                Ok(()) => self.checkpoint(snapshot, last_seq, compact).await,
                                Err(err) => Err(err),
                            };
                            let _ = resp.send(result);
                            deadline = Instant::now() + latency;
                        }
                        PersistMsg::Shutdown { resp } => {
                            let _ = self.write_pending(true).await;
                            let _ = resp.send(());
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline), if !self.pending.is_empty() => {
                    let _ = self.write_pending(false).await;
                    deadline = Instant::now() + latency;
                }
            }
        }
    }

    async fn on_sink<T, F>(&self, f: F) -> Result<T, PersistError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn DocumentSink) -> Result<T, PersistError> + Send + 'static,
    {
        let sink = Arc::clone(&self.sink);
        tokio::task::spawn_blocking(move || {
            let mut guard = sink.blocking_lock();
            f(&mut **guard)
        })
        .await
        .map_err(|e| PersistError::Message(format!("join error: {e}")))?
    }

    async fn checkpoint(
        &self,
        snapshot: StoreSnapshotV1,
        last_seq: OpSeq,
        compact: bool,
    ) -> Result<(), PersistError> {
        self.on_sink(move |sink| {
            sink.write_snapshot(&snapshot, last_seq)?;
            if compact {
                let removed = sink.compact_through(last_seq)?;
                tracing::debug!(removed, last_seq, "Compacted journal");
            }
            Ok(())
        })
        .await
    }

    // Every waiting ack is answered, whether the write succeeded or not.
    async fn write_pending(&mut self, sync: bool) -> Result<(), PersistError> {
        if self.pending.is_empty() {
            if !sync {
                return Ok(());
            }
            return self.on_sink(|sink| sink.flush()).await;
        }

        let batch = std::mem::take(&mut self.pending);
        let waiting = std::mem::take(&mut self.waiting);
        let unacked = batch.len() > waiting.len();
        let written = self
            .on_sink(move |sink| {
                let seq = sink.append_ops(&batch)?;
                if sync {
                    sink.flush()?;
                }
                Ok(seq)
            })
            .await;

        match written {
            Ok(seq) => {
                self.durable_seq = self.durable_seq.max(seq);
                for ack in waiting {
                    let _ = ack.send(Ok(self.durable_seq));
                }
                let _ = self.durable_tx.send(Ok(self.durable_seq));
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "Journal batch write failed");
                let reason = format!("append failed: {err}");
                for ack in waiting {
                    let _ = ack.send(Err(PersistError::Message(reason.clone())));
                }
                let _ = self.durable_tx.send(Err(PersistError::Message(reason.clone())));
                if unacked {
                    self.failed = Some(reason);
                }
                Err(err)
            }
        }
    }
}

fn enqueue_persist(
    tx: &mpsc::Sender<PersistMsg>,
    stored: StoredOp,
    ack: Option<AckTx>,
) -> Result<(), RuntimeError> {
    tx.try_send(PersistMsg::Op { stored, ack }).map_err(|err| {
        RuntimeError::Persist(PersistError::Message(format!("persist queue error: {err}")))
    })
}

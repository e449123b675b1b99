//! Background persistence of optimistic mutations.
//!
//! One worker per open board drains a FIFO queue, so requests reach the
//! server in the order the mutations were applied locally. When a persist
//! fails the board is fetched again and a [`SyncEvent::Reloaded`] carries the
//! authoritative snapshot back to the session.
//!
//! Every persist is tagged with the reload epoch the session had applied when
//! it was submitted. A failure bumps the worker's epoch, and from then on
//! persists tagged with an older epoch are discarded: they were computed
//! against state the server never reached. The session moves its epoch
//! forward with [`SyncReconciler::acknowledge`] once it has swapped in the
//! reloaded board. Creations and flushes are never discarded.

use crate::{
    client::transport::{BoardTransport, CreateRequest, Created, PersistRequest},
    domain::{BoardId, BoardSnapshot},
    error::{BoardhubError, Result},
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Outcome reports sent from the worker to the session
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Confirmed { kind: &'static str },
    /// A persist failed and the board was refetched
    Reloaded {
        snapshot: BoardSnapshot,
        error: String,
        epoch: u64,
    },
    /// A persist failed and so did the refetch; local state is stale
    ReloadFailed { error: String, epoch: u64 },
}

enum Command {
    Persist { request: PersistRequest, epoch: u64 },
    Create {
        request: CreateRequest,
        reply: oneshot::Sender<Result<Created>>,
    },
    Flush(oneshot::Sender<()>),
}

pub struct SyncReconciler {
    board_id: BoardId,
    commands: mpsc::UnboundedSender<Command>,
    worker: JoinHandle<()>,
    epoch: u64,
}

impl SyncReconciler {
    /// Starts the worker for `board_id`. Must be called inside a tokio runtime.
    pub fn spawn<T>(
        board_id: BoardId,
        transport: Arc<T>,
    ) -> (Self, mpsc::UnboundedReceiver<SyncEvent>)
    where
        T: BoardTransport + ?Sized + 'static,
    {
        let (commands, queue) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();

        let worker = Worker {
            board_id,
            transport,
            queue,
            events,
            epoch: 0,
        };
        let worker = tokio::spawn(worker.run());

        (
            Self {
                board_id,
                commands,
                worker,
                epoch: 0,
            },
            event_rx,
        )
    }

    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    /// Queues a persist without waiting for it.
    pub fn submit(&self, request: PersistRequest) -> Result<()> {
        self.send(Command::Persist {
            request,
            epoch: self.epoch,
        })
    }

    /// Records that the session has applied the reload of `epoch`.
    pub fn acknowledge(&mut self, epoch: u64) {
        self.epoch = self.epoch.max(epoch);
    }

    /// Reload epoch that new persists are tagged with
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Queues a creation and waits for the server's reply.
    pub async fn create(&self, request: CreateRequest) -> Result<Created> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Create { request, reply })?;
        response.await.map_err(|_| stopped())?
    }

    /// Resolves once everything queued before the call has been handled.
    pub async fn flush(&self) -> Result<()> {
        let (done, finished) = oneshot::channel();
        self.send(Command::Flush(done))?;
        finished.await.map_err(|_| stopped())
    }

    /// Closes the queue, lets the worker drain it and waits for it to exit.
    pub async fn shutdown(self) -> Result<()> {
        let Self {
            board_id,
            commands,
            worker,
            ..
        } = self;
        drop(commands);
        worker
            .await
            .map_err(|err| BoardhubError::SyncStopped(err.to_string()))?;
        debug!(%board_id, "reconciler stopped");
        Ok(())
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| stopped())
    }
}

fn stopped() -> BoardhubError {
    BoardhubError::SyncStopped("reconciler worker is no longer running".to_string())
}

struct Worker<T: ?Sized> {
    board_id: BoardId,
    transport: Arc<T>,
    queue: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<SyncEvent>,
    /// Bumped on every failed persist
    epoch: u64,
}

impl<T: BoardTransport + ?Sized> Worker<T> {
    #[instrument(skip_all, fields(board_id = %self.board_id))]
    async fn run(mut self) {
        while let Some(command) = self.queue.recv().await {
            match command {
                Command::Persist { request, epoch } if epoch < self.epoch => {
                    debug!(kind = request.kind(), epoch, "discarding stale persist");
                }
                Command::Persist { request, .. } => self.persist(request).await,
                Command::Create { request, reply } => {
                    let result = request.send(self.transport.as_ref()).await;
                    if let Err(err) = &result {
                        warn!(%err, "create failed");
                    }
                    // The caller may have given up waiting
                    let _ = reply.send(result);
                }
                Command::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
    }

    async fn persist(&mut self, request: PersistRequest) {
        let kind = request.kind();
        match request.send(self.transport.as_ref()).await {
            Ok(()) => {
                debug!(kind, "persist confirmed");
                self.emit(SyncEvent::Confirmed { kind });
            }
            Err(err) => {
                warn!(kind, %err, "persist failed, reloading board");
                self.recover(err).await;
            }
        }
    }

    async fn recover(&mut self, cause: BoardhubError) {
        self.epoch += 1;
        let epoch = self.epoch;

        let error = cause.to_string();
        match self.transport.fetch_board(&self.board_id).await {
            Ok(snapshot) => {
                info!(epoch, "board reloaded after failed persist");
                self.emit(SyncEvent::Reloaded {
                    snapshot,
                    error,
                    epoch,
                });
            }
            Err(err) => {
                warn!(epoch, %err, "reload failed");
                self.emit(SyncEvent::ReloadFailed {
                    error: format!("{error}; reload failed: {err}"),
                    epoch,
                });
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        if self.events.send(event).is_err() {
            debug!("session gone, dropping sync event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::seeded_board;
    use crate::client::transport::{MoveCardRequest, NewEntity};
    use crate::domain::{CardId, ListId};

    fn drain(events: &mut mpsc::UnboundedReceiver<SyncEvent>) -> Vec<SyncEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn test_persists_run_in_order() {
        let (transport, board) = seeded_board().await;
        let (reconciler, mut events) = SyncReconciler::spawn(board.id, Arc::clone(&transport));
        let (l1, l2) = (board.lists[0].id, board.lists[1].id);

        reconciler
            .submit(PersistRequest::ReorderLists {
                board_id: board.id,
                list_ids: vec![l2, l1],
            })
            .unwrap();
        reconciler
            .submit(PersistRequest::ReorderLists {
                board_id: board.id,
                list_ids: vec![l1, l2],
            })
            .unwrap();
        reconciler.flush().await.unwrap();

        let kinds: Vec<SyncEvent> = drain(&mut events);
        assert_eq!(kinds.len(), 2);
        assert!(kinds
            .iter()
            .all(|e| matches!(e, SyncEvent::Confirmed { kind: "reorder_lists" })));

        let stored = transport.fetch_board(&board.id).await.unwrap();
        assert_eq!(stored.list_ids(), vec![l1, l2]);
        reconciler.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_discards_queue_and_reloads() {
        let (transport, board) = seeded_board().await;
        let (l1, l2) = (board.lists[0].id, board.lists[1].id);
        transport.fail_next(1);

        let (reconciler, mut events) = SyncReconciler::spawn(board.id, Arc::clone(&transport));
        reconciler
            .submit(PersistRequest::ReorderLists {
                board_id: board.id,
                list_ids: vec![l2, l1],
            })
            .unwrap();
        reconciler
            .submit(PersistRequest::DeleteList { list_id: l1 })
            .unwrap();
        reconciler.flush().await.unwrap();

        let events = drain(&mut events);
        assert_eq!(events.len(), 1);
        let SyncEvent::Reloaded {
            snapshot,
            error,
            epoch,
        } = &events[0]
        else {
            panic!("expected a reload, got {:?}", events[0]);
        };
        assert!(error.contains("injected"));
        assert_eq!(*epoch, 1);
        assert_eq!(snapshot.list_ids(), vec![l1, l2]);
        reconciler.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_persists_from_before_reload_are_discarded_until_acknowledged() {
        let (transport, board) = seeded_board().await;
        let (l1, l2) = (board.lists[0].id, board.lists[1].id);
        transport.fail_next(1);

        let (mut reconciler, mut events) =
            SyncReconciler::spawn(board.id, Arc::clone(&transport));
        reconciler
            .submit(PersistRequest::ReorderLists {
                board_id: board.id,
                list_ids: vec![l2, l1],
            })
            .unwrap();
        reconciler.flush().await.unwrap();

        // Submitted after the reload happened but before it was applied
        reconciler
            .submit(PersistRequest::DeleteList { list_id: l1 })
            .unwrap();
        reconciler.flush().await.unwrap();
        assert_eq!(
            transport.fetch_board(&board.id).await.unwrap().list_ids(),
            vec![l1, l2]
        );

        let epoch = match drain(&mut events).as_slice() {
            [SyncEvent::Reloaded { epoch, .. }] => *epoch,
            other => panic!("expected a single reload, got {other:?}"),
        };
        reconciler.acknowledge(epoch);
        assert_eq!(reconciler.epoch(), 1);

        reconciler
            .submit(PersistRequest::DeleteList { list_id: l1 })
            .unwrap();
        reconciler.flush().await.unwrap();
        assert_eq!(
            transport.fetch_board(&board.id).await.unwrap().list_ids(),
            vec![l2]
        );
        assert!(matches!(
            drain(&mut events).as_slice(),
            [SyncEvent::Confirmed {
                kind: "delete_list"
            }]
        ));
        reconciler.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reload_failure_is_reported() {
        let (transport, board) = seeded_board().await;
        transport.fail_next(2);

        let (reconciler, mut events) = SyncReconciler::spawn(board.id, Arc::clone(&transport));
        reconciler
            .submit(PersistRequest::DeleteCard {
                card_id: CardId::new(),
            })
            .unwrap();
        reconciler.flush().await.unwrap();

        let events = drain(&mut events);
        assert!(matches!(events.as_slice(), [SyncEvent::ReloadFailed { .. }]));
        reconciler.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_server_rejection_triggers_reload() {
        let (transport, board) = seeded_board().await;
        let (reconciler, mut events) = SyncReconciler::spawn(board.id, Arc::clone(&transport));
        let card = board.lists[0].cards[0].clone();

        reconciler
            .submit(PersistRequest::MoveCard {
                card_id: card.id,
                request: MoveCardRequest {
                    list_id: ListId::new(),
                    index: 0,
                    title: card.title.clone(),
                    description: None,
                },
            })
            .unwrap();
        reconciler.flush().await.unwrap();

        let events = drain(&mut events);
        let [SyncEvent::Reloaded { snapshot, .. }] = events.as_slice() else {
            panic!("expected a reload, got {events:?}");
        };
        assert_eq!(snapshot, &board);
        reconciler.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_returns_server_entity() {
        let (transport, board) = seeded_board().await;
        let (reconciler, _events) = SyncReconciler::spawn(board.id, Arc::clone(&transport));

        let created = reconciler
            .create(CreateRequest::List {
                board_id: board.id,
                body: NewEntity {
                    title: "  Later  ".to_string(),
                    description: None,
                },
            })
            .await
            .unwrap();
        let Created::List(list) = created else {
            panic!("expected a list");
        };
        assert_eq!(list.title, "Later");
        assert_eq!(list.position, 2);

        let err = reconciler
            .create(CreateRequest::List {
                board_id: board.id,
                body: NewEntity {
                    title: "   ".to_string(),
                    description: None,
                },
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        reconciler.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_after_worker_exit() {
        let (transport, board) = seeded_board().await;
        let (reconciler, _events) = SyncReconciler::spawn(board.id, transport);
        reconciler.worker.abort();

        tokio::task::yield_now().await;
        let err = reconciler.flush().await.unwrap_err();
        assert!(matches!(err, BoardhubError::SyncStopped(_)));
    }
}

//! A client's live view of one board.
//!
//! The session owns the container store and the board's reconciler. Local
//! gestures apply immediately; their persistence happens in the background
//! and only surfaces again through [`BoardSession::process_events`].

use crate::{
    client::{
        mutation::{DropTarget, Mutation},
        reconciler::{SyncEvent, SyncReconciler},
        store::ContainerStore,
        transport::{BoardTransport, CreateRequest, Created, NewEntity},
    },
    domain::{BoardId, BoardSnapshot, CardId, ListId},
    error::{BoardhubError, Result},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

pub struct BoardSession {
    store: ContainerStore,
    reconciler: SyncReconciler,
    events: mpsc::UnboundedReceiver<SyncEvent>,
    last_failure: Option<String>,
}

impl BoardSession {
    /// Fetches the board and starts its reconciler.
    #[instrument(skip_all, fields(board_id = %board_id))]
    pub async fn open<T>(transport: Arc<T>, board_id: BoardId) -> Result<Self>
    where
        T: BoardTransport + ?Sized + 'static,
    {
        let snapshot = transport.fetch_board(&board_id).await?;
        let store = ContainerStore::with_board(snapshot)?;
        let (reconciler, events) = SyncReconciler::spawn(board_id, transport);

        info!(lists = store.board().map_or(0, |b| b.lists.len()), "board opened");
        Ok(Self {
            store,
            reconciler,
            events,
            last_failure: None,
        })
    }

    pub fn board_id(&self) -> BoardId {
        self.reconciler.board_id()
    }

    pub fn board(&self) -> Option<&BoardSnapshot> {
        self.store.board()
    }

    pub fn store(&self) -> &ContainerStore {
        &self.store
    }

    /// Applies a gesture locally and queues its persistence.
    ///
    /// Pending sync events are applied first, so a gesture never builds on
    /// state that a reload has already superseded. Returns `false` when the
    /// gesture changed nothing and no request was sent.
    pub fn apply(&mut self, mutation: Mutation) -> Result<bool> {
        self.process_events();
        match mutation.apply(&mut self.store)? {
            Some(request) => {
                self.reconciler.submit(request)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn drop_card(&mut self, card_id: CardId, target: DropTarget) -> Result<bool> {
        self.process_events();
        let mutation = Mutation::move_card_onto(&self.store, card_id, target)?;
        self.apply(mutation)
    }

    pub fn drop_list(&mut self, list_id: ListId, over: ListId) -> Result<bool> {
        self.process_events();
        let mutation = Mutation::reorder_list_onto(&self.store, list_id, over)?;
        self.apply(mutation)
    }

    /// Creates a list on the server and appends it once confirmed.
    pub async fn create_list(&mut self, title: &str) -> Result<ListId> {
        let request = CreateRequest::List {
            board_id: self.board_id(),
            body: NewEntity {
                title: title.to_string(),
                description: None,
            },
        };
        match self.create(request).await? {
            Created::List(list) => {
                let id = list.id;
                self.store.append_list(list)?;
                Ok(id)
            }
            Created::Card(_) => Err(unexpected_reply()),
        }
    }

    /// Creates a card on the server and appends it to its list once confirmed.
    pub async fn create_card(
        &mut self,
        list_id: ListId,
        title: &str,
        description: Option<String>,
    ) -> Result<CardId> {
        let request = CreateRequest::Card {
            list_id,
            body: NewEntity {
                title: title.to_string(),
                description,
            },
        };
        match self.create(request).await? {
            Created::Card(card) => {
                let id = card.id;
                self.store.append_card(card)?;
                Ok(id)
            }
            Created::List(_) => Err(unexpected_reply()),
        }
    }

    async fn create(&mut self, request: CreateRequest) -> Result<Created> {
        let created = self.reconciler.create(request).await;
        // A reload queued ahead of the creation predates it
        self.process_events();
        created
    }

    /// Applies every pending sync event and returns how many were handled.
    pub fn process_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            handled += 1;
            match event {
                SyncEvent::Confirmed { .. } => {}
                SyncEvent::Reloaded {
                    snapshot,
                    error,
                    epoch,
                } => {
                    if let Err(err) = self.store.replace(snapshot) {
                        warn!(%err, "reloaded board failed integrity check");
                    }
                    self.reconciler.acknowledge(epoch);
                    self.last_failure = Some(error);
                }
                SyncEvent::ReloadFailed { error, epoch } => {
                    self.reconciler.acknowledge(epoch);
                    self.last_failure = Some(error);
                }
            }
        }
        handled
    }

    /// Waits for queued persistence to settle, then applies its outcome.
    pub async fn sync(&mut self) -> Result<()> {
        self.reconciler.flush().await?;
        self.process_events();
        Ok(())
    }

    /// Returns and clears the last sync failure, for a generic error notice.
    pub fn take_failure(&mut self) -> Option<String> {
        self.last_failure.take()
    }

    /// Lets queued persistence finish and stops the reconciler.
    pub async fn close(mut self) -> Result<()> {
        self.reconciler.flush().await?;
        self.process_events();
        self.reconciler.shutdown().await
    }
}

fn unexpected_reply() -> BoardhubError {
    BoardhubError::TransportError("creation reply has the wrong entity type".to_string())
}

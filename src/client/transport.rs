//! Request/response contract between a client session and the server.

use crate::{
    domain::{BoardId, BoardSnapshot, CardId, CardSnapshot, ListId, ListSnapshot},
    error::Result,
    service::{CardMove, CardUpdate, Caller, OrderingService},
    storage::Storage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Body of a card move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCardRequest {
    pub list_id: ListId,
    pub index: usize,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of a list or card creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntity {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Write that mirrors an optimistic mutation already applied locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistRequest {
    ReorderLists {
        board_id: BoardId,
        list_ids: Vec<ListId>,
    },
    MoveCard {
        card_id: CardId,
        request: MoveCardRequest,
    },
    DeleteList {
        list_id: ListId,
    },
    DeleteCard {
        card_id: CardId,
    },
}

impl PersistRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReorderLists { .. } => "reorder_lists",
            Self::MoveCard { .. } => "move_card",
            Self::DeleteList { .. } => "delete_list",
            Self::DeleteCard { .. } => "delete_card",
        }
    }

    pub async fn send<T: BoardTransport + ?Sized>(&self, transport: &T) -> Result<()> {
        match self {
            Self::ReorderLists { board_id, list_ids } => {
                transport.reorder_lists(board_id, list_ids).await?;
            }
            Self::MoveCard { card_id, request } => {
                transport.move_card(card_id, request).await?;
            }
            Self::DeleteList { list_id } => transport.delete_list(list_id).await?,
            Self::DeleteCard { card_id } => transport.delete_card(card_id).await?,
        }
        Ok(())
    }
}

/// Creation; not optimistic, the store only learns of the entity from the reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateRequest {
    List { board_id: BoardId, body: NewEntity },
    Card { list_id: ListId, body: NewEntity },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Created {
    List(ListSnapshot),
    Card(CardSnapshot),
}

impl CreateRequest {
    pub async fn send<T: BoardTransport + ?Sized>(&self, transport: &T) -> Result<Created> {
        match self {
            Self::List { board_id, body } => {
                Ok(Created::List(transport.create_list(board_id, body).await?))
            }
            Self::Card { list_id, body } => {
                Ok(Created::Card(transport.create_card(list_id, body).await?))
            }
        }
    }
}

/// One request/response pair per operation
#[async_trait]
pub trait BoardTransport: Send + Sync {
    /// Full read of a board, used on open and on recovery
    async fn fetch_board(&self, board_id: &BoardId) -> Result<BoardSnapshot>;

    async fn reorder_lists(&self, board_id: &BoardId, list_ids: &[ListId]) -> Result<Vec<ListId>>;

    async fn move_card(&self, card_id: &CardId, request: &MoveCardRequest) -> Result<CardSnapshot>;

    async fn create_list(&self, board_id: &BoardId, body: &NewEntity) -> Result<ListSnapshot>;

    async fn create_card(&self, list_id: &ListId, body: &NewEntity) -> Result<CardSnapshot>;

    async fn delete_list(&self, list_id: &ListId) -> Result<()>;

    async fn delete_card(&self, card_id: &CardId) -> Result<()>;
}

/// In-process transport calling the ordering service directly as `caller`
pub struct LocalTransport<S: Storage> {
    service: OrderingService<S>,
    caller: Caller,
}

impl<S: Storage> LocalTransport<S> {
    pub fn new(service: OrderingService<S>, caller: Caller) -> Self {
        Self { service, caller }
    }

    pub fn service(&self) -> &OrderingService<S> {
        &self.service
    }
}

#[async_trait]
impl<S: Storage> BoardTransport for LocalTransport<S> {
    async fn fetch_board(&self, board_id: &BoardId) -> Result<BoardSnapshot> {
        self.service.load_board(&self.caller, board_id).await
    }

    async fn reorder_lists(&self, board_id: &BoardId, list_ids: &[ListId]) -> Result<Vec<ListId>> {
        self.service
            .reorder_lists(&self.caller, board_id, list_ids)
            .await
    }

    async fn move_card(&self, card_id: &CardId, request: &MoveCardRequest) -> Result<CardSnapshot> {
        let target = CardMove {
            list_id: request.list_id,
            index: request.index,
            update: CardUpdate {
                title: Some(request.title.clone()),
                description: request.description.clone(),
            },
        };
        let card = self
            .service
            .move_or_reorder_card(&self.caller, card_id, target)
            .await?;
        Ok(CardSnapshot::from(&card))
    }

    async fn create_list(&self, board_id: &BoardId, body: &NewEntity) -> Result<ListSnapshot> {
        let list = self
            .service
            .create_list(&self.caller, board_id, &body.title)
            .await?;
        Ok(ListSnapshot::empty(&list))
    }

    async fn create_card(&self, list_id: &ListId, body: &NewEntity) -> Result<CardSnapshot> {
        let card = self
            .service
            .create_card(&self.caller, list_id, &body.title, body.description.clone())
            .await?;
        Ok(CardSnapshot::from(&card))
    }

    async fn delete_list(&self, list_id: &ListId) -> Result<()> {
        self.service.delete_list(&self.caller, list_id).await
    }

    async fn delete_card(&self, card_id: &CardId) -> Result<()> {
        self.service.delete_card(&self.caller, card_id).await
    }
}

use crate::{
    domain::{Board, BoardId, Card, CardId, List, ListId, ShareSlug, UserId},
    error::Result,
};
use async_trait::async_trait;

#[cfg(feature = "file-storage")]
pub mod file_storage;
pub mod memory_storage;

#[cfg(feature = "file-storage")]
pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;

/// A single document-level write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    PutBoard(Board),
    PutList(List),
    PutCard(Card),
    DeleteBoard(BoardId),
    DeleteList(ListId),
    DeleteCard(CardId),
    /// Appends a list reference to the board's array if not already present
    PushListRef { board_id: BoardId, list_id: ListId },
    PullListRef { board_id: BoardId, list_id: ListId },
    /// Appends a card reference to the list's array if not already present
    PushCardRef { list_id: ListId, card_id: CardId },
    PullCardRef { list_id: ListId, card_id: CardId },
}

/// All writes belonging to one logical operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn put_board(&mut self, board: Board) {
        self.push(WriteOp::PutBoard(board));
    }

    pub fn put_list(&mut self, list: List) {
        self.push(WriteOp::PutList(list));
    }

    pub fn put_card(&mut self, card: Card) {
        self.push(WriteOp::PutCard(card));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Storage trait for persisting boards, lists and cards
///
/// Lookups of a missing record fail with `BoardhubError::NotFound`.
/// Collection queries return records in no particular order; callers sort
/// by position themselves.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initializes the storage backend
    async fn initialize(&self) -> Result<()>;

    /// Checks if the storage is initialized
    async fn is_initialized(&self) -> bool;

    async fn save_board(&self, board: &Board) -> Result<()>;

    async fn load_board(&self, id: &BoardId) -> Result<Board>;

    async fn delete_board(&self, id: &BoardId) -> Result<()>;

    /// Lists every board owned by `owner`
    async fn boards_for_owner(&self, owner: &UserId) -> Result<Vec<Board>>;

    /// Finds the board carrying `slug`, public or not
    async fn find_board_by_slug(&self, slug: &ShareSlug) -> Result<Option<Board>>;

    async fn save_list(&self, list: &List) -> Result<()>;

    async fn load_list(&self, id: &ListId) -> Result<List>;

    async fn delete_list(&self, id: &ListId) -> Result<()>;

    /// Lists every list whose `board_id` is `board_id`
    async fn lists_for_board(&self, board_id: &BoardId) -> Result<Vec<List>>;

    async fn save_card(&self, card: &Card) -> Result<()>;

    async fn load_card(&self, id: &CardId) -> Result<Card>;

    async fn delete_card(&self, id: &CardId) -> Result<()>;

    /// Lists every card whose `list_id` is `list_id`
    async fn cards_for_list(&self, list_id: &ListId) -> Result<Vec<Card>>;

    async fn push_list_ref(&self, board_id: &BoardId, list_id: &ListId) -> Result<()> {
        let mut board = self.load_board(board_id).await?;
        if !board.list_ids.contains(list_id) {
            board.list_ids.push(*list_id);
            self.save_board(&board).await?;
        }
        Ok(())
    }

    async fn pull_list_ref(&self, board_id: &BoardId, list_id: &ListId) -> Result<()> {
        let mut board = self.load_board(board_id).await?;
        let before = board.list_ids.len();
        board.list_ids.retain(|id| id != list_id);
        if board.list_ids.len() != before {
            self.save_board(&board).await?;
        }
        Ok(())
    }

    async fn push_card_ref(&self, list_id: &ListId, card_id: &CardId) -> Result<()> {
        let mut list = self.load_list(list_id).await?;
        if !list.card_ids.contains(card_id) {
            list.card_ids.push(*card_id);
            self.save_list(&list).await?;
        }
        Ok(())
    }

    async fn pull_card_ref(&self, list_id: &ListId, card_id: &CardId) -> Result<()> {
        let mut list = self.load_list(list_id).await?;
        let before = list.card_ids.len();
        list.card_ids.retain(|id| id != card_id);
        if list.card_ids.len() != before {
            self.save_list(&list).await?;
        }
        Ok(())
    }

    /// Applies one write
    async fn apply(&self, op: &WriteOp) -> Result<()> {
        match op {
            WriteOp::PutBoard(board) => self.save_board(board).await,
            WriteOp::PutList(list) => self.save_list(list).await,
            WriteOp::PutCard(card) => self.save_card(card).await,
            WriteOp::DeleteBoard(id) => self.delete_board(id).await,
            WriteOp::DeleteList(id) => self.delete_list(id).await,
            WriteOp::DeleteCard(id) => self.delete_card(id).await,
            WriteOp::PushListRef { board_id, list_id } => {
                self.push_list_ref(board_id, list_id).await
            }
            WriteOp::PullListRef { board_id, list_id } => {
                self.pull_list_ref(board_id, list_id).await
            }
            WriteOp::PushCardRef { list_id, card_id } => {
                self.push_card_ref(list_id, card_id).await
            }
            WriteOp::PullCardRef { list_id, card_id } => {
                self.pull_card_ref(list_id, card_id).await
            }
        }
    }

    /// Commits all writes of one logical operation.
    ///
    /// The default applies writes in order and stops at the first failure,
    /// leaving earlier writes in place. Backends that can do better override
    /// this with an all-or-nothing commit.
    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        for op in batch.ops() {
            self.apply(op).await?;
        }
        Ok(())
    }
}

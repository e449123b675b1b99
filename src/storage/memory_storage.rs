use crate::{
    domain::{Board, BoardId, Card, CardId, List, ListId, ShareSlug, UserId},
    error::{BoardhubError, Result},
    storage::{Storage, WriteBatch, WriteOp},
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    boards: HashMap<BoardId, Board>,
    lists: HashMap<ListId, List>,
    cards: HashMap<CardId, Card>,
}

impl MemoryState {
    fn apply(&mut self, op: &WriteOp) -> Result<()> {
        match op {
            WriteOp::PutBoard(board) => {
                self.boards.insert(board.id, board.clone());
            }
            WriteOp::PutList(list) => {
                self.lists.insert(list.id, list.clone());
            }
            WriteOp::PutCard(card) => {
                self.cards.insert(card.id, card.clone());
            }
            WriteOp::DeleteBoard(id) => {
                self.boards
                    .remove(id)
                    .ok_or_else(|| BoardhubError::not_found("Board", id))?;
            }
            WriteOp::DeleteList(id) => {
                self.lists
                    .remove(id)
                    .ok_or_else(|| BoardhubError::not_found("List", id))?;
            }
            WriteOp::DeleteCard(id) => {
                self.cards
                    .remove(id)
                    .ok_or_else(|| BoardhubError::not_found("Card", id))?;
            }
            WriteOp::PushListRef { board_id, list_id } => {
                let board = self.board_mut(board_id)?;
                if !board.list_ids.contains(list_id) {
                    board.list_ids.push(*list_id);
                }
            }
            WriteOp::PullListRef { board_id, list_id } => {
                self.board_mut(board_id)?.list_ids.retain(|id| id != list_id);
            }
            WriteOp::PushCardRef { list_id, card_id } => {
                let list = self.list_mut(list_id)?;
                if !list.card_ids.contains(card_id) {
                    list.card_ids.push(*card_id);
                }
            }
            WriteOp::PullCardRef { list_id, card_id } => {
                self.list_mut(list_id)?.card_ids.retain(|id| id != card_id);
            }
        }
        Ok(())
    }

    fn board_mut(&mut self, id: &BoardId) -> Result<&mut Board> {
        self.boards
            .get_mut(id)
            .ok_or_else(|| BoardhubError::not_found("Board", id))
    }

    fn list_mut(&mut self, id: &ListId) -> Result<&mut List> {
        self.lists
            .get_mut(id)
            .ok_or_else(|| BoardhubError::not_found("List", id))
    }
}

/// In-process storage backend with all-or-nothing batch commits
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    async fn write(&self, op: WriteOp) -> Result<()> {
        self.state.write().await.apply(&op)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        true
    }

    async fn save_board(&self, board: &Board) -> Result<()> {
        self.write(WriteOp::PutBoard(board.clone())).await
    }

    async fn load_board(&self, id: &BoardId) -> Result<Board> {
        self.state
            .read()
            .await
            .boards
            .get(id)
            .cloned()
            .ok_or_else(|| BoardhubError::not_found("Board", id))
    }

    async fn delete_board(&self, id: &BoardId) -> Result<()> {
        self.write(WriteOp::DeleteBoard(*id)).await
    }

    async fn boards_for_owner(&self, owner: &UserId) -> Result<Vec<Board>> {
        let state = self.state.read().await;
        Ok(state
            .boards
            .values()
            .filter(|b| &b.owner_id == owner)
            .cloned()
            .collect())
    }

    async fn find_board_by_slug(&self, slug: &ShareSlug) -> Result<Option<Board>> {
        let state = self.state.read().await;
        Ok(state
            .boards
            .values()
            .find(|b| b.share_slug.as_ref() == Some(slug))
            .cloned())
    }

    async fn save_list(&self, list: &List) -> Result<()> {
        self.write(WriteOp::PutList(list.clone())).await
    }

    async fn load_list(&self, id: &ListId) -> Result<List> {
        self.state
            .read()
            .await
            .lists
            .get(id)
            .cloned()
            .ok_or_else(|| BoardhubError::not_found("List", id))
    }

    async fn delete_list(&self, id: &ListId) -> Result<()> {
        self.write(WriteOp::DeleteList(*id)).await
    }

    async fn lists_for_board(&self, board_id: &BoardId) -> Result<Vec<List>> {
        let state = self.state.read().await;
        Ok(state
            .lists
            .values()
            .filter(|l| &l.board_id == board_id)
            .cloned()
            .collect())
    }

    async fn save_card(&self, card: &Card) -> Result<()> {
        self.write(WriteOp::PutCard(card.clone())).await
    }

    async fn load_card(&self, id: &CardId) -> Result<Card> {
        self.state
            .read()
            .await
            .cards
            .get(id)
            .cloned()
            .ok_or_else(|| BoardhubError::not_found("Card", id))
    }

    async fn delete_card(&self, id: &CardId) -> Result<()> {
        self.write(WriteOp::DeleteCard(*id)).await
    }

    async fn cards_for_list(&self, list_id: &ListId) -> Result<Vec<Card>> {
        let state = self.state.read().await;
        Ok(state
            .cards
            .values()
            .filter(|c| &c.list_id == list_id)
            .cloned()
            .collect())
    }

    async fn push_list_ref(&self, board_id: &BoardId, list_id: &ListId) -> Result<()> {
        self.write(WriteOp::PushListRef {
            board_id: *board_id,
            list_id: *list_id,
        })
        .await
    }

    async fn pull_list_ref(&self, board_id: &BoardId, list_id: &ListId) -> Result<()> {
        self.write(WriteOp::PullListRef {
            board_id: *board_id,
            list_id: *list_id,
        })
        .await
    }

    async fn push_card_ref(&self, list_id: &ListId, card_id: &CardId) -> Result<()> {
        self.write(WriteOp::PushCardRef {
            list_id: *list_id,
            card_id: *card_id,
        })
        .await
    }

    async fn pull_card_ref(&self, list_id: &ListId, card_id: &CardId) -> Result<()> {
        self.write(WriteOp::PullCardRef {
            list_id: *list_id,
            card_id: *card_id,
        })
        .await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut state = self.state.write().await;
        let mut staged = state.clone();
        for op in batch.ops() {
            staged.apply(op)?;
        }
        *state = staged;
        Ok(())
    }
}

//! Persistence ordering service.
//!
//! Accepts reorder/move/create/delete requests, checks that the caller owns
//! the board the target transitively belongs to, and writes the affected
//! records as one [`WriteBatch`].
//!
//! # Invariants
//! - `List::position` and `Card::position` are authoritative and are
//!   renumbered contiguously from 0 for every container a write touches.
//! - `Board::list_ids` and `List::card_ids` are caches rewritten from those
//!   positions in the same batch.
//! - Ownership failures and missing records both surface as `NotFound`.

use crate::{
    domain::{
        normalize_description, normalize_title, position, Board, BoardId, BoardSnapshot, Card,
        CardId, List, ListId, ListSnapshot, UserId,
    },
    error::{BoardhubError, Result},
    service::{collapse_not_found, Caller},
    storage::{Storage, WriteBatch, WriteOp},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Optional field edits applied to a card
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Destination of a card move, plus edits carried along with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardMove {
    pub list_id: ListId,
    /// Index in the destination list; past the end appends
    pub index: usize,
    pub update: CardUpdate,
}

impl CardMove {
    pub fn to(list_id: ListId, index: usize) -> Self {
        Self {
            list_id,
            index,
            update: CardUpdate::default(),
        }
    }
}

/// What a repair pass had to fix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub lists_renumbered: usize,
    pub cards_renumbered: usize,
    /// Reference arrays (board list ids, list card ids) that were rewritten
    pub refs_rewritten: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.lists_renumbered == 0 && self.cards_renumbered == 0 && self.refs_rewritten == 0
    }
}

pub struct OrderingService<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> Clone for OrderingService<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: Storage> OrderingService<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    // ----- boards -------------------------------------------------------

    #[instrument(skip_all)]
    pub async fn create_board(
        &self,
        caller: &Caller,
        title: &str,
        description: Option<String>,
    ) -> Result<Board> {
        let user = caller.require()?;
        let mut board = Board::new(*user, normalize_title(title)?);
        board.description = normalize_description(description);

        self.storage.save_board(&board).await?;
        info!(board_id = %board.id, "board created");
        Ok(board)
    }

    /// The caller's boards, newest first
    pub async fn list_boards(&self, caller: &Caller) -> Result<Vec<Board>> {
        let user = caller.require()?;
        let mut boards = self.storage.boards_for_owner(user).await?;
        boards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(boards)
    }

    /// Read path: the full board with lists and cards in display order
    #[instrument(skip_all, fields(board_id = %board_id))]
    pub async fn load_board(&self, caller: &Caller, board_id: &BoardId) -> Result<BoardSnapshot> {
        let user = caller.require()?;
        let board = self.owned_board(user, board_id).await?;
        let lists = self.board_lists(&board).await?;
        Ok(BoardSnapshot::new(&board, lists))
    }

    #[instrument(skip_all, fields(board_id = %board_id))]
    pub async fn update_board(
        &self,
        caller: &Caller,
        board_id: &BoardId,
        title: &str,
        description: Option<String>,
    ) -> Result<Board> {
        let user = caller.require()?;
        let title = normalize_title(title)?;
        let mut board = self.owned_board(user, board_id).await?;

        board.title = title;
        board.set_description(normalize_description(description));
        self.storage.save_board(&board).await?;
        Ok(board)
    }

    /// Deletes the board together with its lists and their cards
    #[instrument(skip_all, fields(board_id = %board_id))]
    pub async fn delete_board(&self, caller: &Caller, board_id: &BoardId) -> Result<()> {
        let user = caller.require()?;
        let board = self.owned_board(user, board_id).await?;

        let mut batch = WriteBatch::new();
        for list in self.storage.lists_for_board(&board.id).await? {
            for card in self.storage.cards_for_list(&list.id).await? {
                batch.push(WriteOp::DeleteCard(card.id));
            }
            batch.push(WriteOp::DeleteList(list.id));
        }
        batch.push(WriteOp::DeleteBoard(board.id));

        let writes = batch.len();
        self.storage.commit(batch).await?;
        info!(writes, "board deleted");
        Ok(())
    }

    // ----- lists --------------------------------------------------------

    /// Replaces the board's list order.
    ///
    /// `list_ids` must be a permutation of the board's current lists.
    #[instrument(skip_all, fields(board_id = %board_id, lists = list_ids.len()))]
    pub async fn reorder_lists(
        &self,
        caller: &Caller,
        board_id: &BoardId,
        list_ids: &[ListId],
    ) -> Result<Vec<ListId>> {
        let user = caller.require()?;
        let mut board = self.owned_board(user, board_id).await?;
        let lists = self.ordered_lists(&board.id).await?;

        let current: Vec<ListId> = lists.iter().map(|l| l.id).collect();
        position::check_permutation(&current, list_ids)?;

        let mut by_id: HashMap<ListId, List> = lists.into_iter().map(|l| (l.id, l)).collect();
        let mut reordered: Vec<List> = list_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect();
        position::renumber(&mut reordered)?;

        let mut batch = WriteBatch::new();
        for list in &reordered {
            batch.put_list(list.clone());
        }
        board.list_ids = list_ids.to_vec();
        board.touch();
        batch.put_board(board.clone());

        self.commit_or_repair(&board.id, batch).await?;
        debug!("lists reordered");
        Ok(board.list_ids)
    }

    /// Appends a new list at the end of the board
    #[instrument(skip_all, fields(board_id = %board_id))]
    pub async fn create_list(
        &self,
        caller: &Caller,
        board_id: &BoardId,
        title: &str,
    ) -> Result<List> {
        let user = caller.require()?;
        let title = normalize_title(title)?;
        let board = self.owned_board(user, board_id).await?;

        let siblings = self.storage.lists_for_board(&board.id).await?.len();
        let list = List::new(board.id, title, position::position_at(siblings)?);

        let mut batch = WriteBatch::new();
        batch.put_list(list.clone());
        batch.push(WriteOp::PushListRef {
            board_id: board.id,
            list_id: list.id,
        });
        self.commit_or_repair(&board.id, batch).await?;

        info!(list_id = %list.id, position = list.position, "list created");
        Ok(list)
    }

    #[instrument(skip_all, fields(list_id = %list_id))]
    pub async fn rename_list(
        &self,
        caller: &Caller,
        list_id: &ListId,
        title: &str,
    ) -> Result<List> {
        let user = caller.require()?;
        let title = normalize_title(title)?;
        let (_, mut list) = self.owned_list(user, list_id).await?;

        list.title = title;
        list.touch();
        self.storage.save_list(&list).await?;
        Ok(list)
    }

    /// Deletes a list and its cards; the remaining lists close the gap.
    #[instrument(skip_all, fields(list_id = %list_id))]
    pub async fn delete_list(&self, caller: &Caller, list_id: &ListId) -> Result<()> {
        let user = caller.require()?;
        let (board, list) = self.owned_list(user, list_id).await?;

        let mut batch = WriteBatch::new();
        for card in self.storage.cards_for_list(&list.id).await? {
            batch.push(WriteOp::DeleteCard(card.id));
        }
        batch.push(WriteOp::DeleteList(list.id));
        batch.push(WriteOp::PullListRef {
            board_id: board.id,
            list_id: list.id,
        });

        let mut remaining = self.ordered_lists(&board.id).await?;
        remaining.retain(|l| l.id != list.id);
        for index in position::renumber_changed(&mut remaining)? {
            batch.put_list(remaining[index].clone());
        }

        self.commit_or_repair(&board.id, batch).await?;
        info!(board_id = %board.id, "list deleted");
        Ok(())
    }

    // ----- cards --------------------------------------------------------

    /// Appends a new card at the end of the list
    #[instrument(skip_all, fields(list_id = %list_id))]
    pub async fn create_card(
        &self,
        caller: &Caller,
        list_id: &ListId,
        title: &str,
        description: Option<String>,
    ) -> Result<Card> {
        let user = caller.require()?;
        let title = normalize_title(title)?;
        let (board, list) = self.owned_list(user, list_id).await?;

        let siblings = self.storage.cards_for_list(&list.id).await?.len();
        let card = Card::new(list.id, title, position::position_at(siblings)?)
            .with_description(normalize_description(description));

        let mut batch = WriteBatch::new();
        batch.put_card(card.clone());
        batch.push(WriteOp::PushCardRef {
            list_id: list.id,
            card_id: card.id,
        });
        self.commit_or_repair(&board.id, batch).await?;

        info!(card_id = %card.id, position = card.position, "card created");
        Ok(card)
    }

    /// Edits title and/or description without moving the card
    #[instrument(skip_all, fields(card_id = %card_id))]
    pub async fn update_card(
        &self,
        caller: &Caller,
        card_id: &CardId,
        update: CardUpdate,
    ) -> Result<Card> {
        let user = caller.require()?;
        let (_, _, mut card) = self.owned_card(user, card_id).await?;

        apply_update(&mut card, update)?;
        self.storage.save_card(&card).await?;
        Ok(card)
    }

    /// Moves a card to `index` in `target.list_id`, which may be its current
    /// list. Both source and destination lists are renumbered.
    #[instrument(
        skip_all,
        fields(card_id = %card_id, target = %target.list_id, index = target.index)
    )]
    pub async fn move_or_reorder_card(
        &self,
        caller: &Caller,
        card_id: &CardId,
        target: CardMove,
    ) -> Result<Card> {
        let user = caller.require()?;
        let (board, mut source, mut card) = self.owned_card(user, card_id).await?;
        apply_update(&mut card, target.update)?;

        let mut batch = WriteBatch::new();

        if target.list_id == source.id {
            let mut cards = self.ordered_cards(&source.id).await?;
            let from = cards
                .iter()
                .position(|c| c.id == card.id)
                .ok_or_else(|| BoardhubError::not_found("Card", card_id))?;
            cards[from] = card;
            let to = position::move_to(&mut cards, from, target.index).unwrap_or(from);
            position::renumber(&mut cards)?;

            source.card_ids = cards.iter().map(|c| c.id).collect();
            source.touch();
            card = cards[to].clone();
            for c in cards {
                batch.put_card(c);
            }
            batch.put_list(source);
        } else {
            let (target_board, mut destination) = self
                .owned_list(user, &target.list_id)
                .await?;
            if target_board.id != board.id {
                return Err(BoardhubError::Validation(format!(
                    "list {} belongs to another board",
                    destination.id
                )));
            }

            let mut remaining = self.ordered_cards(&source.id).await?;
            remaining.retain(|c| c.id != card.id);
            position::renumber(&mut remaining)?;

            let mut arriving = self.ordered_cards(&destination.id).await?;
            arriving.retain(|c| c.id != card.id);
            card.list_id = destination.id;
            card.touch();
            let to = position::insert_at(&mut arriving, target.index, card);
            position::renumber(&mut arriving)?;

            source.card_ids = remaining.iter().map(|c| c.id).collect();
            source.touch();
            destination.card_ids = arriving.iter().map(|c| c.id).collect();
            destination.touch();
            card = arriving[to].clone();

            for c in remaining.into_iter().chain(arriving) {
                batch.put_card(c);
            }
            batch.put_list(source);
            batch.put_list(destination);
        }

        self.commit_or_repair(&board.id, batch).await?;
        debug!(position = card.position, "card moved");
        Ok(card)
    }

    /// Deletes a card; the remaining cards in its list close the gap.
    #[instrument(skip_all, fields(card_id = %card_id))]
    pub async fn delete_card(&self, caller: &Caller, card_id: &CardId) -> Result<()> {
        let user = caller.require()?;
        let (board, list, card) = self.owned_card(user, card_id).await?;

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::DeleteCard(card.id));
        batch.push(WriteOp::PullCardRef {
            list_id: list.id,
            card_id: card.id,
        });

        let mut remaining = self.ordered_cards(&list.id).await?;
        remaining.retain(|c| c.id != card.id);
        for index in position::renumber_changed(&mut remaining)? {
            batch.put_card(remaining[index].clone());
        }

        self.commit_or_repair(&board.id, batch).await?;
        info!(list_id = %list.id, "card deleted");
        Ok(())
    }

    // ----- repair -------------------------------------------------------

    /// Deterministically renumbers every container of the board and
    /// rewrites the reference caches from the resulting order.
    #[instrument(skip_all, fields(board_id = %board_id))]
    pub async fn repair_board(&self, caller: &Caller, board_id: &BoardId) -> Result<RepairReport> {
        let user = caller.require()?;
        let board = self.owned_board(user, board_id).await?;
        self.repair(board).await
    }

    async fn repair(&self, mut board: Board) -> Result<RepairReport> {
        let mut report = RepairReport::default();
        let mut batch = WriteBatch::new();

        let mut lists = self.ordered_lists(&board.id).await?;
        let mut dirty: Vec<bool> = vec![false; lists.len()];
        for index in position::renumber_changed(&mut lists)? {
            dirty[index] = true;
            report.lists_renumbered += 1;
        }

        let order: Vec<ListId> = lists.iter().map(|l| l.id).collect();
        if board.list_ids != order {
            board.list_ids = order;
            board.touch();
            batch.put_board(board.clone());
            report.refs_rewritten += 1;
        }

        for (index, list) in lists.iter_mut().enumerate() {
            let mut cards = self.ordered_cards(&list.id).await?;
            for changed in position::renumber_changed(&mut cards)? {
                batch.put_card(cards[changed].clone());
                report.cards_renumbered += 1;
            }

            let card_ids: Vec<CardId> = cards.iter().map(|c| c.id).collect();
            if list.card_ids != card_ids {
                list.card_ids = card_ids;
                list.touch();
                dirty[index] = true;
                report.refs_rewritten += 1;
            }
        }

        for (list, dirty) in lists.into_iter().zip(dirty) {
            if dirty {
                batch.put_list(list);
            }
        }

        if !batch.is_empty() {
            self.storage.commit(batch).await?;
        }

        if report.is_clean() {
            debug!("board already consistent");
        } else {
            info!(
                lists = report.lists_renumbered,
                cards = report.cards_renumbered,
                refs = report.refs_rewritten,
                "board repaired"
            );
        }
        Ok(report)
    }

    /// Commits `batch`; on failure runs a best-effort repair of the board so
    /// that whatever landed is at least self-consistent, then returns the
    /// commit error.
    async fn commit_or_repair(&self, board_id: &BoardId, batch: WriteBatch) -> Result<()> {
        let Err(err) = self.storage.commit(batch).await else {
            return Ok(());
        };

        warn!(%board_id, error = %err, "commit failed, repairing board");
        let repaired = match self.storage.load_board(board_id).await {
            Ok(board) => self.repair(board).await.map(|_| ()),
            Err(load_err) => Err(load_err),
        };
        if let Err(repair_err) = repaired {
            warn!(%board_id, error = %repair_err, "repair after failed commit did not complete");
        }
        Err(err)
    }

    // ----- lookups ------------------------------------------------------

    pub(crate) async fn owned_board(&self, user: &UserId, board_id: &BoardId) -> Result<Board> {
        let board = self
            .storage
            .load_board(board_id)
            .await
            .map_err(|err| collapse_not_found(err, "Board", board_id))?;
        if !board.is_owned_by(user) {
            return Err(BoardhubError::not_found("Board", board_id));
        }
        Ok(board)
    }

    async fn owned_list(&self, user: &UserId, list_id: &ListId) -> Result<(Board, List)> {
        let list = self
            .storage
            .load_list(list_id)
            .await
            .map_err(|err| collapse_not_found(err, "List", list_id))?;
        let board = self
            .owned_board(user, &list.board_id)
            .await
            .map_err(|err| collapse_not_found(err, "List", list_id))?;
        Ok((board, list))
    }

    async fn owned_card(&self, user: &UserId, card_id: &CardId) -> Result<(Board, List, Card)> {
        let card = self
            .storage
            .load_card(card_id)
            .await
            .map_err(|err| collapse_not_found(err, "Card", card_id))?;
        let (board, list) = self
            .owned_list(user, &card.list_id)
            .await
            .map_err(|err| collapse_not_found(err, "Card", card_id))?;
        Ok((board, list, card))
    }

    /// Lists of a board in authoritative order
    async fn ordered_lists(&self, board_id: &BoardId) -> Result<Vec<List>> {
        let mut lists = self.storage.lists_for_board(board_id).await?;
        lists.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(lists)
    }

    /// Cards of a list in authoritative order
    async fn ordered_cards(&self, list_id: &ListId) -> Result<Vec<Card>> {
        let mut cards = self.storage.cards_for_list(list_id).await?;
        cards.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(cards)
    }

    /// Lists with their cards, both in display order
    pub(crate) async fn board_lists(&self, board: &Board) -> Result<Vec<ListSnapshot>> {
        let lists = self.ordered_lists(&board.id).await?;
        let mut snapshots = Vec::with_capacity(lists.len());
        for list in &lists {
            let cards = self.ordered_cards(&list.id).await?;
            snapshots.push(ListSnapshot::new(list, &cards));
        }
        Ok(snapshots)
    }
}

fn apply_update(card: &mut Card, update: CardUpdate) -> Result<()> {
    let CardUpdate { title, description } = update;
    if title.is_none() && description.is_none() {
        return Ok(());
    }
    if let Some(title) = title {
        card.title = normalize_title(&title)?;
    }
    if description.is_some() {
        card.description = normalize_description(description);
    }
    card.touch();
    Ok(())
}

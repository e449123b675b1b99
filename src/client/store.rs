//! Client-side copy of one board.
//!
//! The store holds at most one [`BoardSnapshot`] and a revision counter that
//! bumps on every successful change. Updates are staged on a copy and swapped
//! in whole, so a failing update leaves the previous state untouched.
//!
//! # Invariants
//!
//! - a card appears in exactly one list, and its `list_id` names that list
//! - list and card ids are unique within the board

use crate::{
    domain::{BoardId, BoardSnapshot, CardId, CardSnapshot, ListId, ListSnapshot},
    error::{BoardhubError, Result},
};
use std::collections::HashSet;

/// Anything that can hold ordered members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerId {
    Board(BoardId),
    List(ListId),
}

/// Anything that can be ordered inside a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberId {
    List(ListId),
    Card(CardId),
}

/// Where a member currently sits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberLocation {
    pub container: ContainerId,
    pub index: usize,
}

#[derive(Debug, Default)]
pub struct ContainerStore {
    board: Option<BoardSnapshot>,
    revision: u64,
}

impl ContainerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_board(snapshot: BoardSnapshot) -> Result<Self> {
        let mut store = Self::new();
        store.replace(snapshot)?;
        Ok(store)
    }

    pub fn board(&self) -> Option<&BoardSnapshot> {
        self.board.as_ref()
    }

    pub fn board_id(&self) -> Option<BoardId> {
        self.board.as_ref().map(|b| b.id)
    }

    /// Bumped on every successful change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Id of the list currently holding `card_id`
    pub fn find_container(&self, card_id: &CardId) -> Option<ListId> {
        let (list_index, _) = self.find_card(card_id)?;
        self.board.as_ref().map(|b| b.lists[list_index].id)
    }

    pub fn find_member(&self, member: MemberId) -> Option<MemberLocation> {
        let board = self.board.as_ref()?;
        match member {
            MemberId::List(list_id) => self.find_list(&list_id).map(|index| MemberLocation {
                container: ContainerId::Board(board.id),
                index,
            }),
            MemberId::Card(card_id) => {
                self.find_card(&card_id)
                    .map(|(list_index, index)| MemberLocation {
                        container: ContainerId::List(board.lists[list_index].id),
                        index,
                    })
            }
        }
    }

    /// Index of the list on the board
    pub fn find_list(&self, list_id: &ListId) -> Option<usize> {
        self.board
            .as_ref()?
            .lists
            .iter()
            .position(|l| l.id == *list_id)
    }

    /// `(list index, card index)` of the card
    pub fn find_card(&self, card_id: &CardId) -> Option<(usize, usize)> {
        self.board
            .as_ref()?
            .lists
            .iter()
            .enumerate()
            .find_map(|(list_index, list)| {
                list.cards
                    .iter()
                    .position(|c| c.id == *card_id)
                    .map(|card_index| (list_index, card_index))
            })
    }

    pub fn list(&self, list_id: &ListId) -> Option<&ListSnapshot> {
        let index = self.find_list(list_id)?;
        self.board.as_ref().map(|b| &b.lists[index])
    }

    pub fn card(&self, card_id: &CardId) -> Option<&CardSnapshot> {
        let (list_index, card_index) = self.find_card(card_id)?;
        self.board
            .as_ref()
            .map(|b| &b.lists[list_index].cards[card_index])
    }

    /// Swaps in a server snapshot wholesale, discarding local state.
    pub fn replace(&mut self, snapshot: BoardSnapshot) -> Result<()> {
        check_integrity(&snapshot)?;
        self.board = Some(snapshot);
        self.revision += 1;
        Ok(())
    }

    /// Appends a list confirmed by the server. Already-known ids are ignored.
    pub fn append_list(&mut self, list: ListSnapshot) -> Result<bool> {
        if self.find_list(&list.id).is_some() {
            return Ok(false);
        }
        self.update(|board| {
            board.lists.push(list);
            Ok(true)
        })
    }

    /// Appends a card confirmed by the server to the end of its list.
    pub fn append_card(&mut self, card: CardSnapshot) -> Result<bool> {
        if self.find_card(&card.id).is_some() {
            return Ok(false);
        }
        let list_index = self
            .find_list(&card.list_id)
            .ok_or_else(|| BoardhubError::not_found("List", card.list_id))?;
        self.update(|board| {
            board.lists[list_index].cards.push(card);
            Ok(true)
        })
    }

    /// Runs `change` against a staged copy and commits it only on success.
    pub(crate) fn update<T, F>(&mut self, change: F) -> Result<T>
    where
        F: FnOnce(&mut BoardSnapshot) -> Result<T>,
    {
        let mut staged = self
            .board
            .clone()
            .ok_or(BoardhubError::BoardNotLoaded)?;
        let value = change(&mut staged)?;
        check_integrity(&staged)?;
        self.board = Some(staged);
        self.revision += 1;
        Ok(value)
    }
}

fn check_integrity(board: &BoardSnapshot) -> Result<()> {
    let mut lists = HashSet::with_capacity(board.lists.len());
    let mut cards = HashSet::with_capacity(board.card_count());

    for list in &board.lists {
        if !lists.insert(list.id) {
            return Err(BoardhubError::Validation(format!(
                "list {} appears twice on the board",
                list.id
            )));
        }
        for card in &list.cards {
            if card.list_id != list.id {
                return Err(BoardhubError::Validation(format!(
                    "card {} is held by list {} but claims list {}",
                    card.id, list.id, card.list_id
                )));
            }
            if !cards.insert(card.id) {
                return Err(BoardhubError::Validation(format!(
                    "card {} appears twice on the board",
                    card.id
                )));
            }
        }
    }
    Ok(())
}

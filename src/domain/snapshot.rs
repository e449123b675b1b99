//! Denormalized, read-side views of a board.
//!
//! The server's read path produces a [`BoardSnapshot`] with lists and cards
//! already in display order; the client keeps one in its container store.

use crate::domain::board::{Board, Card, List};
use crate::domain::ids::{BoardId, CardId, ListId};
use crate::domain::position::{Position, Positioned};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSnapshot {
    pub id: CardId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub position: Position,
    pub list_id: ListId,
}

impl From<&Card> for CardSnapshot {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id,
            title: card.title.clone(),
            description: card.description.clone(),
            position: card.position,
            list_id: card.list_id,
        }
    }
}

impl Positioned for CardSnapshot {
    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSnapshot {
    pub id: ListId,
    pub title: String,
    pub position: Position,
    pub cards: Vec<CardSnapshot>,
}

impl ListSnapshot {
    /// Builds a list view; `cards` must already be in display order.
    pub fn new(list: &List, cards: &[Card]) -> Self {
        Self {
            id: list.id,
            title: list.title.clone(),
            position: list.position,
            cards: cards.iter().map(CardSnapshot::from).collect(),
        }
    }

    pub fn empty(list: &List) -> Self {
        Self::new(list, &[])
    }
}

impl Positioned for ListSnapshot {
    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub id: BoardId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub lists: Vec<ListSnapshot>,
}

impl BoardSnapshot {
    pub fn new(board: &Board, lists: Vec<ListSnapshot>) -> Self {
        Self {
            id: board.id,
            title: board.title.clone(),
            description: board.description.clone(),
            lists,
        }
    }

    pub fn list_ids(&self) -> Vec<ListId> {
        self.lists.iter().map(|l| l.id).collect()
    }

    pub fn card_count(&self) -> usize {
        self.lists.iter().map(|l| l.cards.len()).sum()
    }
}

/// Read-only projection served to anonymous viewers of a public board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedBoard {
    pub id: BoardId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub read_only: bool,
    pub lists: Vec<ListSnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SharedBoard {
    pub fn new(board: &Board, lists: Vec<ListSnapshot>) -> Self {
        Self {
            id: board.id,
            title: board.title.clone(),
            description: board.description.clone(),
            read_only: true,
            lists,
            created_at: board.created_at,
            updated_at: board.updated_at,
        }
    }
}

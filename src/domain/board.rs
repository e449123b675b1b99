use crate::domain::ids::{BoardId, CardId, ListId, ShareSlug, UserId};
use crate::domain::position::{Position, Positioned};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level container owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub owner_id: UserId,
    /// Cache of list order. `List::position` is the source of truth and this
    /// is rewritten from it on every write touching the board's lists.
    #[serde(default)]
    pub list_ids: Vec<ListId>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_slug: Option<ShareSlug>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Board {
    /// Creates a new, private, empty board
    pub fn new(owner_id: UserId, title: String) -> Self {
        let now = Utc::now();
        Self {
            id: BoardId::new(),
            title,
            description: None,
            owner_id,
            list_ids: Vec::new(),
            is_public: false,
            share_slug: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner_id == user
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Named container within a board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List {
    pub id: ListId,
    pub title: String,
    pub position: Position,
    pub board_id: BoardId,
    /// Cache of card order, rewritten from `Card::position`.
    #[serde(default)]
    pub card_ids: Vec<CardId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl List {
    pub fn new(board_id: BoardId, title: String, position: Position) -> Self {
        let now = Utc::now();
        Self {
            id: ListId::new(),
            title,
            position,
            board_id,
            card_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Positioned for List {
    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
        self.touch();
    }
}

/// Leaf work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub position: Position,
    pub list_id: ListId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn new(list_id: ListId, title: String, position: Position) -> Self {
        let now = Utc::now();
        Self {
            id: CardId::new(),
            title,
            description: None,
            position,
            list_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Positioned for Card {
    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
        self.touch();
    }
}

/// Trims a user supplied title, rejecting blank ones
pub fn normalize_title(title: &str) -> crate::error::Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(crate::error::BoardhubError::Validation(
            "Title is required".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Trims an optional description; blank becomes `None`
pub fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_creation() {
        let owner = UserId::new();
        let board = Board::new(owner, "Roadmap".to_string());

        assert!(board.is_owned_by(&owner));
        assert!(!board.is_public);
        assert!(board.share_slug.is_none());
        assert!(board.list_ids.is_empty());
    }

    #[test]
    fn test_set_position_touches_card() {
        let mut card = Card::new(ListId::new(), "Task".to_string(), 3);
        let before = card.updated_at;

        std::thread::sleep(std::time::Duration::from_millis(5));
        card.set_position(0);

        assert_eq!(card.position, 0);
        assert!(card.updated_at > before);
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Backlog ").unwrap(), "Backlog");
        assert!(normalize_title("   ").is_err());
        assert!(normalize_title("").is_err());
    }

    #[test]
    fn test_normalize_description() {
        assert_eq!(normalize_description(Some("  ".into())), None);
        assert_eq!(
            normalize_description(Some(" notes ".into())),
            Some("notes".to_string())
        );
        assert_eq!(normalize_description(None), None);
    }

    #[test]
    fn test_board_deserializes_without_optional_fields() {
        let json = format!(
            r#"{{
            "id": "{}",
            "title": "Old Board",
            "owner_id": "{}",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        }}"#,
            BoardId::new(),
            UserId::new()
        );

        let board: Board = serde_json::from_str(&json).unwrap();
        assert_eq!(board.title, "Old Board");
        assert!(board.list_ids.is_empty());
        assert!(!board.is_public);
        assert!(board.share_slug.is_none());
    }
}

pub mod board;
pub mod ids;
pub mod position;
pub mod snapshot;

pub use board::{normalize_description, normalize_title, Board, Card, List};
pub use ids::{BoardId, CardId, ListId, ShareSlug, UserId};
pub use position::{Position, Positioned};
pub use snapshot::{BoardSnapshot, CardSnapshot, ListSnapshot, SharedBoard};

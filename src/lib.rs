//! # BoardHub Core
//!
//! Ordering and synchronization engine for BoardHub kanban boards.
//!
//! This crate keeps the order of lists on a board and cards in a list
//! consistent between an optimistic client and the server that persists it.
//! The server half ([`service`]) owns integer positions and the public share
//! projection; the client half ([`client`]) applies gestures locally, queues
//! their persistence per board and rolls back to the server's view when a
//! write is rejected. Storage is pluggable behind [`Storage`].

pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod service;
pub mod storage;

// Re-export commonly used types
pub use client::{
    BoardSession, BoardTransport, ContainerStore, DropTarget, LocalTransport, Mutation,
};
pub use config::BoardhubConfig;
pub use domain::{
    Board, BoardId, BoardSnapshot, Card, CardId, List, ListId, ShareSlug, SharedBoard, UserId,
};
pub use error::{BoardhubError, ErrorKind, Result};
pub use service::{Caller, OrderingService, ShareService};
#[cfg(feature = "file-storage")]
pub use storage::FileStorage;
pub use storage::{MemoryStorage, Storage};

//! Optimistic mutations applied to the container store.
//!
//! A mutation validates against the current store, applies itself in one
//! step and hands back the request that mirrors it on the server. A gesture
//! that would not change anything yields no request.
//!
//! Same-list card moves renumber the list locally. Cross-list moves only
//! change membership and order; the server's reply (or the next reload)
//! brings positions back in line.

use crate::{
    client::{
        store::ContainerStore,
        transport::{MoveCardRequest, PersistRequest},
    },
    domain::{position, CardId, ListId},
    error::{BoardhubError, Result},
};
use tracing::debug;

/// What a dragged card was released over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    /// The list body; the card goes to the end
    List(ListId),
    /// Another card; the dragged card takes its index
    Card(CardId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    ReorderList { list_id: ListId, to_index: usize },
    MoveCard {
        card_id: CardId,
        list_id: ListId,
        to_index: usize,
    },
    RemoveList { list_id: ListId },
    RemoveCard { card_id: CardId },
}

impl Mutation {
    /// Resolves a list dropped over another list
    pub fn reorder_list_onto(
        store: &ContainerStore,
        list_id: ListId,
        over: ListId,
    ) -> Result<Self> {
        let to_index = store
            .find_list(&over)
            .ok_or_else(|| BoardhubError::not_found("List", over))?;
        Ok(Self::ReorderList { list_id, to_index })
    }

    /// Resolves a card dropped over `target`
    pub fn move_card_onto(
        store: &ContainerStore,
        card_id: CardId,
        target: DropTarget,
    ) -> Result<Self> {
        let (list_id, to_index) = match target {
            DropTarget::List(list_id) => {
                let list = store
                    .list(&list_id)
                    .ok_or_else(|| BoardhubError::not_found("List", list_id))?;
                (list_id, list.cards.len())
            }
            DropTarget::Card(over) => {
                let location = store
                    .find_card(&over)
                    .ok_or_else(|| BoardhubError::not_found("Card", over))?;
                let list_id = store
                    .find_container(&over)
                    .ok_or_else(|| BoardhubError::not_found("Card", over))?;
                (list_id, location.1)
            }
        };
        Ok(Self::MoveCard {
            card_id,
            list_id,
            to_index,
        })
    }

    /// Applies the mutation and returns the request to persist it, or
    /// `None` when the store already looked that way.
    pub fn apply(&self, store: &mut ContainerStore) -> Result<Option<PersistRequest>> {
        let board_id = store.board_id().ok_or(BoardhubError::BoardNotLoaded)?;

        match *self {
            Self::ReorderList { list_id, to_index } => {
                let from = store
                    .find_list(&list_id)
                    .ok_or_else(|| BoardhubError::not_found("List", list_id))?;
                let len = store.board().map_or(0, |b| b.lists.len());
                if from == to_index.min(len.saturating_sub(1)) {
                    return Ok(None);
                }

                let list_ids = store.update(|board| {
                    position::move_to(&mut board.lists, from, to_index);
                    position::renumber(&mut board.lists)?;
                    Ok(board.list_ids())
                })?;
                debug!(%list_id, from, to = to_index, "list reordered locally");
                Ok(Some(PersistRequest::ReorderLists { board_id, list_ids }))
            }

            Self::MoveCard {
                card_id,
                list_id,
                to_index,
            } => {
                let (source, from) = store
                    .find_card(&card_id)
                    .ok_or_else(|| BoardhubError::not_found("Card", card_id))?;
                let target = store
                    .find_list(&list_id)
                    .ok_or_else(|| BoardhubError::not_found("List", list_id))?;

                let request = if source == target {
                    let len = store.board().map_or(0, |b| b.lists[source].cards.len());
                    if from == to_index.min(len.saturating_sub(1)) {
                        return Ok(None);
                    }
                    store.update(|board| {
                        let cards = &mut board.lists[source].cards;
                        let index = position::move_to(cards, from, to_index)
                            .ok_or_else(|| BoardhubError::not_found("Card", card_id))?;
                        position::renumber(cards)?;
                        Ok(move_request(&cards[index], index))
                    })?
                } else {
                    store.update(|board| {
                        let mut card = board.lists[source].cards.remove(from);
                        card.list_id = list_id;
                        let cards = &mut board.lists[target].cards;
                        let index = position::insert_at(cards, to_index, card);
                        Ok(move_request(&cards[index], index))
                    })?
                };

                debug!(%card_id, %list_id, index = request.index, "card moved locally");
                Ok(Some(PersistRequest::MoveCard { card_id, request }))
            }

            Self::RemoveList { list_id } => {
                let index = store
                    .find_list(&list_id)
                    .ok_or_else(|| BoardhubError::not_found("List", list_id))?;
                store.update(|board| {
                    board.lists.remove(index);
                    position::renumber(&mut board.lists)?;
                    Ok(())
                })?;
                Ok(Some(PersistRequest::DeleteList { list_id }))
            }

            Self::RemoveCard { card_id } => {
                let (list_index, index) = store
                    .find_card(&card_id)
                    .ok_or_else(|| BoardhubError::not_found("Card", card_id))?;
                store.update(|board| {
                    let cards = &mut board.lists[list_index].cards;
                    cards.remove(index);
                    position::renumber(cards)?;
                    Ok(())
                })?;
                Ok(Some(PersistRequest::DeleteCard { card_id }))
            }
        }
    }
}

fn move_request(card: &crate::domain::CardSnapshot, index: usize) -> MoveCardRequest {
    MoveCardRequest {
        list_id: card.list_id,
        index,
        title: card.title.clone(),
        description: card.description.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::store::tests::{card_id, sample_board};
    use crate::domain::position::is_contiguous;
    use crate::error::ErrorKind;

    fn titles(store: &ContainerStore, list: usize) -> Vec<String> {
        store.board().unwrap().lists[list]
            .cards
            .iter()
            .map(|c| c.title.clone())
            .collect()
    }

    fn lists(store: &ContainerStore) -> (ListId, ListId) {
        let board = store.board().unwrap();
        (board.lists[0].id, board.lists[1].id)
    }

    #[test]
    fn test_reorder_list_yields_full_order() {
        let mut store = ContainerStore::with_board(sample_board()).unwrap();
        let (l1, l2) = lists(&store);

        let request = Mutation::ReorderList {
            list_id: l2,
            to_index: 0,
        }
        .apply(&mut store)
        .unwrap();

        assert_eq!(
            request,
            Some(PersistRequest::ReorderLists {
                board_id: store.board_id().unwrap(),
                list_ids: vec![l2, l1],
            })
        );
        assert!(is_contiguous(&store.board().unwrap().lists));
    }

    #[test]
    fn test_same_list_move_renumbers() {
        let mut store = ContainerStore::with_board(sample_board()).unwrap();
        let (l1, _) = lists(&store);
        let c3 = card_id(&store, "C3");

        let request = Mutation::MoveCard {
            card_id: c3,
            list_id: l1,
            to_index: 0,
        }
        .apply(&mut store)
        .unwrap()
        .unwrap();

        assert_eq!(titles(&store, 0), vec!["C3", "C1", "C2"]);
        assert!(is_contiguous(&store.board().unwrap().lists[0].cards));
        let PersistRequest::MoveCard { request, .. } = request else {
            panic!("expected a card move");
        };
        assert_eq!(request.index, 0);
        assert_eq!(request.list_id, l1);
    }

    #[test]
    fn test_cross_list_move_updates_membership() {
        let mut store = ContainerStore::with_board(sample_board()).unwrap();
        let (_, l2) = lists(&store);
        let c1 = card_id(&store, "C1");
        let c4 = card_id(&store, "C4");

        let mutation = Mutation::move_card_onto(&store, c1, DropTarget::Card(c4)).unwrap();
        assert_eq!(
            mutation,
            Mutation::MoveCard {
                card_id: c1,
                list_id: l2,
                to_index: 0
            }
        );
        mutation.apply(&mut store).unwrap().unwrap();

        assert_eq!(titles(&store, 0), vec!["C2", "C3"]);
        assert_eq!(titles(&store, 1), vec!["C1", "C4"]);
        assert_eq!(store.find_container(&c1), Some(l2));
        assert_eq!(store.card(&c1).unwrap().list_id, l2);
    }

    #[test]
    fn test_drop_on_list_appends() {
        let mut store = ContainerStore::with_board(sample_board()).unwrap();
        let (_, l2) = lists(&store);
        let c2 = card_id(&store, "C2");

        Mutation::move_card_onto(&store, c2, DropTarget::List(l2))
            .unwrap()
            .apply(&mut store)
            .unwrap();
        assert_eq!(titles(&store, 1), vec!["C4", "C2"]);
    }

    #[test]
    fn test_no_op_gestures_produce_no_request() {
        let mut store = ContainerStore::with_board(sample_board()).unwrap();
        let (l1, _) = lists(&store);
        let c3 = card_id(&store, "C3");

        let same = Mutation::MoveCard {
            card_id: c3,
            list_id: l1,
            to_index: 2,
        };
        assert_eq!(same.apply(&mut store).unwrap(), None);

        let past_end = Mutation::ReorderList {
            list_id: store.board().unwrap().lists[1].id,
            to_index: 9,
        };
        assert_eq!(past_end.apply(&mut store).unwrap(), None);
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn test_unknown_ids_leave_store_untouched() {
        let mut store = ContainerStore::with_board(sample_board()).unwrap();
        let before = store.board().cloned();
        let c1 = card_id(&store, "C1");

        let err = Mutation::MoveCard {
            card_id: c1,
            list_id: ListId::new(),
            to_index: 0,
        }
        .apply(&mut store)
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(store.board().cloned(), before);
    }

    #[test]
    fn test_removals_close_gaps() {
        let mut store = ContainerStore::with_board(sample_board()).unwrap();
        let (l1, _) = lists(&store);
        let c2 = card_id(&store, "C2");

        let request = Mutation::RemoveCard { card_id: c2 }.apply(&mut store).unwrap();
        assert_eq!(request, Some(PersistRequest::DeleteCard { card_id: c2 }));
        assert!(is_contiguous(&store.board().unwrap().lists[0].cards));

        Mutation::RemoveList { list_id: l1 }.apply(&mut store).unwrap();
        let board = store.board().unwrap();
        assert_eq!(board.lists.len(), 1);
        assert!(is_contiguous(&board.lists));
    }

    #[test]
    fn test_mutation_without_board() {
        let mut store = ContainerStore::new();
        let err = Mutation::RemoveCard {
            card_id: CardId::new(),
        }
        .apply(&mut store)
        .unwrap_err();
        assert!(matches!(err, BoardhubError::BoardNotLoaded));
    }
}

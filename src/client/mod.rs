//! Client side: local board state, optimistic mutations and their
//! reconciliation with the server.

pub mod mutation;
pub mod reconciler;
pub mod session;
pub mod store;
pub mod transport;

pub use mutation::{DropTarget, Mutation};
pub use reconciler::{SyncEvent, SyncReconciler};
pub use session::BoardSession;
pub use store::{ContainerId, ContainerStore, MemberId, MemberLocation};
pub use transport::{
    BoardTransport, CreateRequest, Created, LocalTransport, MoveCardRequest, NewEntity,
    PersistRequest,
};

#[cfg(test)]
pub(crate) mod testing {
    use super::transport::*;
    use crate::{
        domain::{BoardId, BoardSnapshot, CardId, CardSnapshot, ListId, ListSnapshot, UserId},
        error::{BoardhubError, Result},
        service::{Caller, OrderingService},
        storage::MemoryStorage,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Local transport that fails the next `n` calls of any kind
    pub(crate) struct FlakyTransport {
        inner: LocalTransport<MemoryStorage>,
        failures: AtomicUsize,
    }

    impl FlakyTransport {
        pub(crate) fn fail_next(&self, n: usize) {
            self.failures.store(n, Ordering::SeqCst);
        }

        fn check(&self) -> Result<()> {
            let injected = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if injected {
                Err(BoardhubError::TransportError("injected failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl BoardTransport for FlakyTransport {
        async fn fetch_board(&self, board_id: &BoardId) -> Result<BoardSnapshot> {
            self.check()?;
            self.inner.fetch_board(board_id).await
        }

        async fn reorder_lists(
            &self,
            board_id: &BoardId,
            list_ids: &[ListId],
        ) -> Result<Vec<ListId>> {
            self.check()?;
            self.inner.reorder_lists(board_id, list_ids).await
        }

        async fn move_card(
            &self,
            card_id: &CardId,
            request: &MoveCardRequest,
        ) -> Result<CardSnapshot> {
            self.check()?;
            self.inner.move_card(card_id, request).await
        }

        async fn create_list(&self, board_id: &BoardId, body: &NewEntity) -> Result<ListSnapshot> {
            self.check()?;
            self.inner.create_list(board_id, body).await
        }

        async fn create_card(&self, list_id: &ListId, body: &NewEntity) -> Result<CardSnapshot> {
            self.check()?;
            self.inner.create_card(list_id, body).await
        }

        async fn delete_list(&self, list_id: &ListId) -> Result<()> {
            self.check()?;
            self.inner.delete_list(list_id).await
        }

        async fn delete_card(&self, card_id: &CardId) -> Result<()> {
            self.check()?;
            self.inner.delete_card(card_id).await
        }
    }

    /// Board with L1 = [C1, C2, C3] and L2 = [C4], as the server sees it
    pub(crate) async fn seeded_board() -> (Arc<FlakyTransport>, BoardSnapshot) {
        let service = OrderingService::new(Arc::new(MemoryStorage::new()));
        let caller = Caller::User(UserId::new());

        let board = service.create_board(&caller, "Board", None).await.unwrap();
        let l1 = service.create_list(&caller, &board.id, "L1").await.unwrap();
        let l2 = service.create_list(&caller, &board.id, "L2").await.unwrap();
        for title in ["C1", "C2", "C3"] {
            service.create_card(&caller, &l1.id, title, None).await.unwrap();
        }
        service.create_card(&caller, &l2.id, "C4", None).await.unwrap();

        let snapshot = service.load_board(&caller, &board.id).await.unwrap();
        let transport = FlakyTransport {
            inner: LocalTransport::new(service, caller),
            failures: AtomicUsize::new(0),
        };
        (Arc::new(transport), snapshot)
    }
}

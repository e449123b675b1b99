//! Public share links and the read-only board projection.

use crate::{
    config::ShareConfig,
    domain::{Board, BoardId, ShareSlug, SharedBoard},
    error::{BoardhubError, Result},
    service::{ordering::OrderingService, Caller},
    storage::Storage,
};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Source of candidate share slugs
pub trait SlugGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random alphanumeric slugs of a fixed length
#[derive(Debug, Clone)]
pub struct RandomSlugGenerator {
    length: usize,
}

impl RandomSlugGenerator {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl SlugGenerator for RandomSlugGenerator {
    fn generate(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect()
    }
}

/// Sharing state of a board as shown to its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareInfo {
    pub is_public: bool,
    pub share_slug: Option<ShareSlug>,
    pub share_url: Option<String>,
}

pub struct ShareService<S: Storage, G: SlugGenerator = RandomSlugGenerator> {
    ordering: OrderingService<S>,
    config: ShareConfig,
    slugs: G,
}

impl<S: Storage> ShareService<S> {
    pub fn new(storage: Arc<S>, config: ShareConfig) -> Self {
        let slugs = RandomSlugGenerator::new(config.slug_length);
        Self::with_generator(storage, config, slugs)
    }
}

impl<S: Storage, G: SlugGenerator> ShareService<S, G> {
    pub fn with_generator(storage: Arc<S>, config: ShareConfig, slugs: G) -> Self {
        Self {
            ordering: OrderingService::new(storage),
            config,
            slugs,
        }
    }

    #[instrument(skip_all, fields(board_id = %board_id))]
    pub async fn share_info(&self, caller: &Caller, board_id: &BoardId) -> Result<ShareInfo> {
        let user = caller.require()?;
        let board = self.ordering.owned_board(user, board_id).await?;
        Ok(self.info(&board))
    }

    /// Makes the board public, minting a slug the first time.
    ///
    /// An existing slug is reused so links survive disable/enable cycles.
    #[instrument(skip_all, fields(board_id = %board_id))]
    pub async fn enable_sharing(&self, caller: &Caller, board_id: &BoardId) -> Result<ShareInfo> {
        let user = caller.require()?;
        let mut board = self.ordering.owned_board(user, board_id).await?;

        if board.share_slug.is_none() {
            board.share_slug = Some(self.unused_slug().await?);
        }
        board.is_public = true;
        board.touch();
        self.ordering.storage().save_board(&board).await?;

        info!("sharing enabled");
        Ok(self.info(&board))
    }

    /// Hides the board again; the slug is kept for a later re-enable.
    #[instrument(skip_all, fields(board_id = %board_id))]
    pub async fn disable_sharing(&self, caller: &Caller, board_id: &BoardId) -> Result<ShareInfo> {
        let user = caller.require()?;
        let mut board = self.ordering.owned_board(user, board_id).await?;

        board.is_public = false;
        board.touch();
        self.ordering.storage().save_board(&board).await?;

        info!("sharing disabled");
        Ok(self.info(&board))
    }

    /// Read-only projection of the public board carrying `slug`
    #[instrument(skip_all)]
    pub async fn shared_board(&self, slug: &str) -> Result<SharedBoard> {
        let not_found = || BoardhubError::not_found("Shared board", slug);

        let slug = ShareSlug::from_str(slug).map_err(|_| not_found())?;
        let board = self
            .ordering
            .storage()
            .find_board_by_slug(&slug)
            .await?
            .filter(|b| b.is_public)
            .ok_or_else(not_found)?;

        let lists = self.ordering.board_lists(&board).await?;
        debug!(board_id = %board.id, lists = lists.len(), "serving shared board");
        Ok(SharedBoard::new(&board, lists))
    }

    async fn unused_slug(&self) -> Result<ShareSlug> {
        let storage = self.ordering.storage();
        for attempt in 1..=self.config.max_slug_attempts {
            let candidate = ShareSlug::from_str(&self.slugs.generate())?;
            if storage.find_board_by_slug(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            warn!(attempt, "share slug collision");
        }
        Err(BoardhubError::Conflict(
            "Failed to generate unique share link".to_string(),
        ))
    }

    fn info(&self, board: &Board) -> ShareInfo {
        ShareInfo {
            is_public: board.is_public,
            share_url: board
                .share_slug
                .as_ref()
                .map(|slug| self.config.share_url(slug.as_str())),
            share_slug: board.share_slug.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use crate::error::ErrorKind;
    use crate::storage::MemoryStorage;
    use std::sync::Mutex;

    /// Hands out a fixed sequence of slugs, repeating the last one
    struct ScriptedSlugs(Mutex<Vec<&'static str>>);

    impl ScriptedSlugs {
        fn new(slugs: &[&'static str]) -> Self {
            let mut slugs = slugs.to_vec();
            slugs.reverse();
            Self(Mutex::new(slugs))
        }
    }

    impl SlugGenerator for ScriptedSlugs {
        fn generate(&self) -> String {
            let mut slugs = self.0.lock().unwrap();
            if slugs.len() > 1 {
                slugs.pop().unwrap().to_string()
            } else {
                slugs[0].to_string()
            }
        }
    }

    async fn setup<G: SlugGenerator>(
        slugs: G,
    ) -> (ShareService<MemoryStorage, G>, OrderingService<MemoryStorage>, Caller, Board) {
        let storage = Arc::new(MemoryStorage::new());
        let ordering = OrderingService::new(Arc::clone(&storage));
        let caller = Caller::User(UserId::new());
        let board = ordering.create_board(&caller, "Shared", None).await.unwrap();
        let config = ShareConfig {
            max_slug_attempts: 3,
            ..ShareConfig::default()
        };
        let share = ShareService::with_generator(storage, config, slugs);
        (share, ordering, caller, board)
    }

    #[test]
    fn test_random_slugs_are_url_safe() {
        let slug = RandomSlugGenerator::new(10).generate();
        assert_eq!(slug.len(), 10);
        assert!(ShareSlug::from_str(&slug).is_ok());
    }

    #[tokio::test]
    async fn test_enable_disable_reenable_keeps_slug() {
        let (share, _, caller, board) = setup(RandomSlugGenerator::new(10)).await;

        let before = share.share_info(&caller, &board.id).await.unwrap();
        assert!(!before.is_public);
        assert!(before.share_url.is_none());

        let enabled = share.enable_sharing(&caller, &board.id).await.unwrap();
        let slug = enabled.share_slug.clone().unwrap();
        assert!(enabled.is_public);
        assert_eq!(
            enabled.share_url.as_deref(),
            Some(format!("http://localhost:3000/share/{}", slug).as_str())
        );

        let disabled = share.disable_sharing(&caller, &board.id).await.unwrap();
        assert!(!disabled.is_public);
        assert_eq!(disabled.share_slug.as_ref(), Some(&slug));

        let again = share.enable_sharing(&caller, &board.id).await.unwrap();
        assert_eq!(again.share_slug, Some(slug));
    }

    #[tokio::test]
    async fn test_slug_collision_retries() {
        let (share, ordering, caller, board) = setup(ScriptedSlugs::new(&["taken", "fresh"])).await;

        let mut other = ordering.create_board(&caller, "Other", None).await.unwrap();
        other.share_slug = Some(ShareSlug::from_str("taken").unwrap());
        ordering.storage().save_board(&other).await.unwrap();

        let info = share.enable_sharing(&caller, &board.id).await.unwrap();
        assert_eq!(info.share_slug.unwrap().as_str(), "fresh");
    }

    #[tokio::test]
    async fn test_slug_generation_gives_up_with_conflict() {
        let (share, ordering, caller, board) = setup(ScriptedSlugs::new(&["taken"])).await;

        let mut other = ordering.create_board(&caller, "Other", None).await.unwrap();
        other.share_slug = Some(ShareSlug::from_str("taken").unwrap());
        ordering.storage().save_board(&other).await.unwrap();

        let err = share.enable_sharing(&caller, &board.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let stored = ordering.storage().load_board(&board.id).await.unwrap();
        assert!(!stored.is_public);
    }

    #[tokio::test]
    async fn test_shared_board_is_ordered_and_read_only() {
        let (share, ordering, caller, board) = setup(RandomSlugGenerator::new(10)).await;
        let l1 = ordering.create_list(&caller, &board.id, "L1").await.unwrap();
        let l2 = ordering.create_list(&caller, &board.id, "L2").await.unwrap();
        ordering
            .reorder_lists(&caller, &board.id, &[l2.id, l1.id])
            .await
            .unwrap();
        let c1 = ordering.create_card(&caller, &l1.id, "C1", None).await.unwrap();
        ordering.create_card(&caller, &l1.id, "C2", None).await.unwrap();
        ordering
            .move_or_reorder_card(&caller, &c1.id, crate::service::CardMove::to(l1.id, 1))
            .await
            .unwrap();

        let slug = share
            .enable_sharing(&caller, &board.id)
            .await
            .unwrap()
            .share_slug
            .unwrap();
        let shared = share.shared_board(slug.as_str()).await.unwrap();

        assert!(shared.read_only);
        let titles: Vec<&str> = shared.lists.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["L2", "L1"]);
        let cards: Vec<&str> = shared.lists[1].cards.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(cards, vec!["C2", "C1"]);
    }

    #[tokio::test]
    async fn test_shared_board_hidden_when_private_or_unknown() {
        let (share, _, caller, board) = setup(RandomSlugGenerator::new(10)).await;
        let slug = share
            .enable_sharing(&caller, &board.id)
            .await
            .unwrap()
            .share_slug
            .unwrap();
        share.disable_sharing(&caller, &board.id).await.unwrap();

        let err = share.shared_board(slug.as_str()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = share.shared_board("nope").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = share.shared_board("bad slug!").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_only_owner_can_toggle_sharing() {
        let (share, _, _, board) = setup(RandomSlugGenerator::new(10)).await;

        let err = share
            .enable_sharing(&Caller::Anonymous, &board.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);

        let err = share
            .enable_sharing(&Caller::User(UserId::new()), &board.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

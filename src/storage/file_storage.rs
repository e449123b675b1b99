use crate::{
    config::BoardhubConfig,
    domain::{Board, BoardId, Card, CardId, List, ListId, ShareSlug, UserId},
    error::{BoardhubError, Result},
    storage::Storage,
};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// File-based storage implementation
///
/// Each record is one pretty-printed JSON file. Batches are committed with
/// the trait's sequential default, so a failing write can leave earlier
/// writes of the same batch on disk.
pub struct FileStorage {
    root_path: PathBuf,
}

impl FileStorage {
    const DATA_DIR: &'static str = ".boardhub";
    const BOARDS_DIR: &'static str = "boards";
    const LISTS_DIR: &'static str = "lists";
    const CARDS_DIR: &'static str = "cards";
    const CONFIG_FILE: &'static str = "config.json";

    /// Creates a new FileStorage instance rooted at `data_root`
    pub fn new(data_root: impl AsRef<Path>) -> Self {
        Self {
            root_path: data_root.as_ref().join(Self::DATA_DIR),
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.root_path.join(Self::CONFIG_FILE)
    }

    fn boards_dir(&self) -> PathBuf {
        self.root_path.join(Self::BOARDS_DIR)
    }

    fn lists_dir(&self) -> PathBuf {
        self.root_path.join(Self::LISTS_DIR)
    }

    fn cards_dir(&self) -> PathBuf {
        self.root_path.join(Self::CARDS_DIR)
    }

    fn record_file(dir: PathBuf, id: impl std::fmt::Display) -> PathBuf {
        dir.join(format!("{}.json", id))
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    async fn write_record<T: Serialize>(
        &self,
        dir: PathBuf,
        file: PathBuf,
        record: &T,
    ) -> Result<()> {
        self.ensure_directory_exists(&dir).await?;
        let json = serde_json::to_string_pretty(record)?;
        fs::write(file, json).await?;
        Ok(())
    }

    async fn read_record<T: DeserializeOwned>(
        &self,
        file: PathBuf,
        entity: &'static str,
        id: impl std::fmt::Display,
    ) -> Result<T> {
        if !file.exists() {
            return Err(BoardhubError::not_found(entity, id));
        }
        let contents = fs::read_to_string(&file).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    async fn remove_record(
        &self,
        file: PathBuf,
        entity: &'static str,
        id: impl std::fmt::Display,
    ) -> Result<()> {
        if !file.exists() {
            return Err(BoardhubError::not_found(entity, id));
        }
        fs::remove_file(file).await?;
        Ok(())
    }

    async fn read_all<T: DeserializeOwned>(&self, dir: PathBuf) -> Result<Vec<T>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&dir).await?;
        let mut records = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                let contents = fs::read_to_string(&path).await?;
                records.push(serde_json::from_str(&contents)?);
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn initialize(&self) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;
        self.ensure_directory_exists(&self.boards_dir()).await?;
        self.ensure_directory_exists(&self.lists_dir()).await?;
        self.ensure_directory_exists(&self.cards_dir()).await?;

        let config_file = self.config_file();
        if !config_file.exists() {
            let json = serde_json::to_string_pretty(&BoardhubConfig::default())?;
            fs::write(config_file, json).await?;
        }

        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        self.root_path.exists() && self.boards_dir().exists()
    }

    async fn save_board(&self, board: &Board) -> Result<()> {
        let file = Self::record_file(self.boards_dir(), board.id);
        self.write_record(self.boards_dir(), file, board).await
    }

    async fn load_board(&self, id: &BoardId) -> Result<Board> {
        let file = Self::record_file(self.boards_dir(), id);
        self.read_record(file, "Board", id).await
    }

    async fn delete_board(&self, id: &BoardId) -> Result<()> {
        let file = Self::record_file(self.boards_dir(), id);
        self.remove_record(file, "Board", id).await
    }

    async fn boards_for_owner(&self, owner: &UserId) -> Result<Vec<Board>> {
        let boards: Vec<Board> = self.read_all(self.boards_dir()).await?;
        Ok(boards.into_iter().filter(|b| &b.owner_id == owner).collect())
    }

    async fn find_board_by_slug(&self, slug: &ShareSlug) -> Result<Option<Board>> {
        let boards: Vec<Board> = self.read_all(self.boards_dir()).await?;
        Ok(boards
            .into_iter()
            .find(|b| b.share_slug.as_ref() == Some(slug)))
    }

    async fn save_list(&self, list: &List) -> Result<()> {
        let file = Self::record_file(self.lists_dir(), list.id);
        self.write_record(self.lists_dir(), file, list).await
    }

    async fn load_list(&self, id: &ListId) -> Result<List> {
        let file = Self::record_file(self.lists_dir(), id);
        self.read_record(file, "List", id).await
    }

    async fn delete_list(&self, id: &ListId) -> Result<()> {
        let file = Self::record_file(self.lists_dir(), id);
        self.remove_record(file, "List", id).await
    }

    async fn lists_for_board(&self, board_id: &BoardId) -> Result<Vec<List>> {
        let lists: Vec<List> = self.read_all(self.lists_dir()).await?;
        Ok(lists
            .into_iter()
            .filter(|l| &l.board_id == board_id)
            .collect())
    }

    async fn save_card(&self, card: &Card) -> Result<()> {
        let file = Self::record_file(self.cards_dir(), card.id);
        self.write_record(self.cards_dir(), file, card).await
    }

    async fn load_card(&self, id: &CardId) -> Result<Card> {
        let file = Self::record_file(self.cards_dir(), id);
        self.read_record(file, "Card", id).await
    }

    async fn delete_card(&self, id: &CardId) -> Result<()> {
        let file = Self::record_file(self.cards_dir(), id);
        self.remove_record(file, "Card", id).await
    }

    async fn cards_for_list(&self, list_id: &ListId) -> Result<Vec<Card>> {
        let cards: Vec<Card> = self.read_all(self.cards_dir()).await?;
        Ok(cards.into_iter().filter(|c| &c.list_id == list_id).collect())
    }
}

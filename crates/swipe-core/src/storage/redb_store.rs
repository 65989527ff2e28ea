//! Redb-backed store for persistent deployments.
//!
//! Uses [redb](https://github.com/cberner/redb), a pure Rust, ACID-compliant
//! embedded B-tree database. Every repository trait is implemented on one
//! [`RedbStore`] so a single database file holds all engine state.
//!
//! # Tables
//!
//! - `embeddings`: "kind:id" -> embedding header (JSON, vector omitted)
//! - `vectors`: "kind:id" -> `Vec<f32>` (raw bytes, little-endian)
//! - `interactions`: interaction id -> UserInteraction (JSON)
//! - `user_interactions`: user id -> interaction ids in append order (JSON)
//! - `clusters`: cluster id -> ClusterInfo (JSON)
//! - `cluster_ranks`: "user\x1fcluster" -> UserClusterRank (JSON)
//! - `content`: post id -> ContentItem (JSON)
//! - `profiles`: user id -> UserProfile (JSON)

use super::{
    embedding_key, ClusterRepository, ContentRepository, EmbeddingRepository,
    InteractionRepository, ProfileRepository, StoreError,
};
use crate::types::{
    ClusterInfo, ContentItem, Embedding, EmbeddingVector, EntityKind, Metadata, UserClusterRank,
    UserInteraction, UserProfile,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

const EMBEDDINGS_TABLE: JsonTable = TableDefinition::new("embeddings");
const VECTORS_TABLE: JsonTable = TableDefinition::new("vectors");
const INTERACTIONS_TABLE: JsonTable = TableDefinition::new("interactions");
const USER_INTERACTIONS_TABLE: JsonTable = TableDefinition::new("user_interactions");
const CLUSTERS_TABLE: JsonTable = TableDefinition::new("clusters");
const RANKS_TABLE: JsonTable = TableDefinition::new("cluster_ranks");
const CONTENT_TABLE: JsonTable = TableDefinition::new("content");
const PROFILES_TABLE: JsonTable = TableDefinition::new("profiles");

const ALL_TABLES: [(JsonTable, &str); 8] = [
    (EMBEDDINGS_TABLE, "embeddings"),
    (VECTORS_TABLE, "vectors"),
    (INTERACTIONS_TABLE, "interactions"),
    (USER_INTERACTIONS_TABLE, "user_interactions"),
    (CLUSTERS_TABLE, "clusters"),
    (RANKS_TABLE, "cluster_ranks"),
    (CONTENT_TABLE, "content"),
    (PROFILES_TABLE, "profiles"),
];

/// Separator between user and cluster id in rank keys.
const RANK_KEY_SEPARATOR: char = '\u{1f}';

/// Embedding without its vector; the vector lives in `vectors` as raw bytes.
#[derive(Serialize, Deserialize)]
struct EmbeddingHeader {
    entity_id: String,
    kind: EntityKind,
    dimension: usize,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    metadata: Metadata,
    version: u64,
}

fn db_err<E: Display>(context: &'static str) -> impl FnOnce(E) -> StoreError {
    move |e| StoreError::DatabaseError(format!("Failed to {}: {}", context, e))
}

fn rank_key(user_id: &str, cluster_id: &str) -> String {
    format!("{}{}{}", user_id, RANK_KEY_SEPARATOR, cluster_id)
}

/// Redb-backed implementation of every repository trait.
///
/// # Example
///
/// ```ignore
/// use swipe_core::storage::RedbStore;
///
/// let store = RedbStore::open("./data/swipe.redb")?;
/// store.put_content(&post)?;
/// ```
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Opens or creates a redb database at the given path.
    ///
    /// Creates the database file and all required tables if they don't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(db_err("open database"))?;

        {
            let write_txn = db.begin_write().map_err(db_err("begin write transaction"))?;
            for (table, name) in ALL_TABLES {
                write_txn.open_table(table).map_err(|e| {
                    StoreError::DatabaseError(format!("Failed to create {} table: {}", name, e))
                })?;
            }
            write_txn.commit().map_err(db_err("commit table creation"))?;
        }

        Ok(Self { db: Arc::new(db) })
    }

    fn to_json<T: Serialize>(value: &T, what: &str) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(value).map_err(|e| {
            StoreError::SerializationError(format!("Failed to serialize {}: {}", what, e))
        })
    }

    fn from_json<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| {
            StoreError::SerializationError(format!("Failed to deserialize {}: {}", what, e))
        })
    }

    /// Serializes an embedding to raw bytes.
    ///
    /// Format: little-endian f32 values packed sequentially (4 bytes per value).
    /// Endianness MUST match `deserialize_vector()`.
    fn serialize_vector(values: &[f32]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(values.len() * 4);
        for &val in values {
            bytes.extend_from_slice(&val.to_le_bytes());
        }
        bytes
    }

    fn deserialize_vector(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn get_raw(&self, table: JsonTable, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("begin read transaction"))?;
        let table = read_txn.open_table(table).map_err(db_err("open table"))?;
        let value = table
            .get(key)
            .map_err(db_err("read entry"))?
            .map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        table: JsonTable,
        key: &str,
        what: &str,
    ) -> Result<Option<T>, StoreError> {
        match self.get_raw(table, key)? {
            Some(bytes) => Ok(Some(Self::from_json(&bytes, what)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(
        &self,
        table: JsonTable,
        key: &str,
        value: &T,
        what: &str,
    ) -> Result<(), StoreError> {
        let bytes = Self::to_json(value, what)?;
        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("begin write transaction"))?;
        {
            let mut table = write_txn.open_table(table).map_err(db_err("open table"))?;
            table
                .insert(key, bytes.as_slice())
                .map_err(db_err("insert entry"))?;
        }
        write_txn.commit().map_err(db_err("commit write"))?;
        Ok(())
    }

    /// Returns every value of a table, in key order.
    fn scan_json<T: DeserializeOwned>(
        &self,
        table: JsonTable,
        what: &str,
    ) -> Result<Vec<T>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("begin read transaction"))?;
        let table = read_txn.open_table(table).map_err(db_err("open table"))?;

        let mut out = Vec::new();
        for result in table.iter().map_err(db_err("iterate table"))? {
            let (_, value) = result.map_err(db_err("read entry"))?;
            out.push(Self::from_json(value.value(), what)?);
        }
        Ok(out)
    }

    fn assemble_embedding(header: EmbeddingHeader, values: Vec<f32>) -> Result<Embedding, StoreError> {
        if values.len() != header.dimension {
            return Err(StoreError::SerializationError(format!(
                "Embedding {} has {} values but dimension {}",
                header.entity_id,
                values.len(),
                header.dimension
            )));
        }
        Ok(Embedding {
            entity_id: header.entity_id,
            kind: header.kind,
            vector: EmbeddingVector {
                dimension: header.dimension,
                values,
                created_at: header.created_at,
                updated_at: header.updated_at,
            },
            metadata: header.metadata,
            version: header.version,
        })
    }

    /// Adds or replaces a post. Used by ingestion tooling.
    pub fn put_content(&self, item: &ContentItem) -> Result<(), StoreError> {
        self.put_json(CONTENT_TABLE, &item.id, item, "content")
    }

    /// Adds or replaces a user profile.
    pub fn put_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        self.put_json(PROFILES_TABLE, &profile.user_id, profile, "profile")
    }

    /// Number of logged interactions.
    pub fn interaction_count(&self) -> Result<usize, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("begin read transaction"))?;
        let table = read_txn
            .open_table(INTERACTIONS_TABLE)
            .map_err(db_err("open interactions table"))?;
        let count = table.len().map_err(db_err("count interactions"))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl EmbeddingRepository for RedbStore {
    async fn get_embedding(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Option<Embedding>, StoreError> {
        let key = embedding_key(kind, entity_id);
        let header: Option<EmbeddingHeader> =
            self.get_json(EMBEDDINGS_TABLE, &key, "embedding header")?;
        let Some(header) = header else {
            return Ok(None);
        };
        let values = self
            .get_raw(VECTORS_TABLE, &key)?
            .map(|bytes| Self::deserialize_vector(&bytes))
            .ok_or_else(|| StoreError::NotFound(format!("vector for {}", key)))?;
        Ok(Some(Self::assemble_embedding(header, values)?))
    }

    async fn put_embedding(&self, embedding: &Embedding) -> Result<(), StoreError> {
        let key = embedding_key(embedding.kind, &embedding.entity_id);
        let header = EmbeddingHeader {
            entity_id: embedding.entity_id.clone(),
            kind: embedding.kind,
            dimension: embedding.vector.dimension,
            created_at: embedding.vector.created_at,
            updated_at: embedding.vector.updated_at,
            metadata: embedding.metadata.clone(),
            version: embedding.version,
        };
        let header_bytes = Self::to_json(&header, "embedding header")?;
        let vector_bytes = Self::serialize_vector(&embedding.vector.values);

        // Header and vector commit together so readers never see one without the other
        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("begin write transaction"))?;
        {
            let mut headers = write_txn
                .open_table(EMBEDDINGS_TABLE)
                .map_err(db_err("open embeddings table"))?;
            headers
                .insert(key.as_str(), header_bytes.as_slice())
                .map_err(db_err("insert embedding header"))?;

            let mut vectors = write_txn
                .open_table(VECTORS_TABLE)
                .map_err(db_err("open vectors table"))?;
            vectors
                .insert(key.as_str(), vector_bytes.as_slice())
                .map_err(db_err("insert vector"))?;
        }
        write_txn.commit().map_err(db_err("commit embedding"))?;
        Ok(())
    }

    async fn list_embeddings(&self, kind: EntityKind) -> Result<Vec<Embedding>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("begin read transaction"))?;
        let headers = read_txn
            .open_table(EMBEDDINGS_TABLE)
            .map_err(db_err("open embeddings table"))?;
        let vectors = read_txn
            .open_table(VECTORS_TABLE)
            .map_err(db_err("open vectors table"))?;

        let prefix = format!("{}:", kind.as_str());
        let mut out = Vec::new();
        for result in headers.iter().map_err(db_err("iterate embeddings"))? {
            let (key, value) = result.map_err(db_err("read embedding entry"))?;
            if !key.value().starts_with(&prefix) {
                continue;
            }
            let header: EmbeddingHeader = Self::from_json(value.value(), "embedding header")?;
            match vectors.get(key.value()).map_err(db_err("read vector"))? {
                Some(bytes) => {
                    let values = Self::deserialize_vector(bytes.value());
                    out.push(Self::assemble_embedding(header, values)?);
                }
                None => warn!("Embedding {} has no stored vector, skipping", key.value()),
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl InteractionRepository for RedbStore {
    async fn append_interaction(&self, interaction: &UserInteraction) -> Result<(), StoreError> {
        let bytes = Self::to_json(interaction, "interaction")?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("begin write transaction"))?;
        {
            let mut events = write_txn
                .open_table(INTERACTIONS_TABLE)
                .map_err(db_err("open interactions table"))?;
            events
                .insert(interaction.id.as_str(), bytes.as_slice())
                .map_err(db_err("insert interaction"))?;

            let mut index = write_txn
                .open_table(USER_INTERACTIONS_TABLE)
                .map_err(db_err("open user_interactions table"))?;
            let mut ids: Vec<String> = match index
                .get(interaction.user_id.as_str())
                .map_err(db_err("read interaction index"))?
            {
                Some(guard) => Self::from_json(guard.value(), "interaction index")?,
                None => Vec::new(),
            };
            ids.push(interaction.id.clone());
            let index_bytes = Self::to_json(&ids, "interaction index")?;
            index
                .insert(interaction.user_id.as_str(), index_bytes.as_slice())
                .map_err(db_err("update interaction index"))?;
        }
        write_txn.commit().map_err(db_err("commit interaction"))?;
        Ok(())
    }

    async fn interactions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserInteraction>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("begin read transaction"))?;
        let index = read_txn
            .open_table(USER_INTERACTIONS_TABLE)
            .map_err(db_err("open user_interactions table"))?;
        let events = read_txn
            .open_table(INTERACTIONS_TABLE)
            .map_err(db_err("open interactions table"))?;

        let ids: Vec<String> = match index.get(user_id).map_err(db_err("read interaction index"))? {
            Some(guard) => Self::from_json(guard.value(), "interaction index")?,
            None => return Ok(Vec::new()),
        };

        let mut out = Vec::with_capacity(ids.len());
        for id in &ids {
            match events.get(id.as_str()).map_err(db_err("read interaction"))? {
                Some(guard) => out.push(Self::from_json(guard.value(), "interaction")?),
                None => warn!("Interaction index references missing event {}", id),
            }
        }
        Ok(out)
    }

    async fn interactions_for_entity(
        &self,
        entity_id: &str,
    ) -> Result<Vec<UserInteraction>, StoreError> {
        let mut out: Vec<UserInteraction> = self
            .scan_json::<UserInteraction>(INTERACTIONS_TABLE, "interaction")?
            .into_iter()
            .filter(|i| i.entity_id == entity_id)
            .collect();
        out.sort_by_key(|i| i.timestamp);
        Ok(out)
    }
}

#[async_trait]
impl ClusterRepository for RedbStore {
    async fn get_cluster(&self, cluster_id: &str) -> Result<Option<ClusterInfo>, StoreError> {
        self.get_json(CLUSTERS_TABLE, cluster_id, "cluster")
    }

    async fn put_cluster(&self, cluster: &ClusterInfo) -> Result<(), StoreError> {
        self.put_json(CLUSTERS_TABLE, &cluster.id, cluster, "cluster")
    }

    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>, StoreError> {
        self.scan_json(CLUSTERS_TABLE, "cluster")
    }

    async fn replace_clusters(&self, clusters: &[ClusterInfo]) -> Result<(), StoreError> {
        let encoded = clusters
            .iter()
            .map(|c| Ok((c.id.as_str(), Self::to_json(c, "cluster")?)))
            .collect::<Result<Vec<_>, StoreError>>()?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("begin write transaction"))?;
        {
            let mut table = write_txn
                .open_table(CLUSTERS_TABLE)
                .map_err(db_err("open clusters table"))?;
            let keys: Vec<String> = table
                .iter()
                .map_err(db_err("iterate clusters"))?
                .filter_map(|r| r.ok().map(|(k, _)| k.value().to_string()))
                .collect();
            for key in &keys {
                table
                    .remove(key.as_str())
                    .map_err(db_err("remove cluster"))?;
            }
            for (id, bytes) in &encoded {
                table
                    .insert(*id, bytes.as_slice())
                    .map_err(db_err("insert cluster"))?;
            }
        }
        write_txn.commit().map_err(db_err("commit cluster replacement"))?;
        Ok(())
    }

    async fn get_user_rank(
        &self,
        user_id: &str,
        cluster_id: &str,
    ) -> Result<Option<UserClusterRank>, StoreError> {
        self.get_json(RANKS_TABLE, &rank_key(user_id, cluster_id), "cluster rank")
    }

    async fn put_user_rank(&self, rank: &UserClusterRank) -> Result<(), StoreError> {
        self.put_json(
            RANKS_TABLE,
            &rank_key(&rank.user_id, &rank.cluster_id),
            rank,
            "cluster rank",
        )
    }

    async fn user_ranks(&self, user_id: &str) -> Result<Vec<UserClusterRank>, StoreError> {
        Ok(self
            .scan_json::<UserClusterRank>(RANKS_TABLE, "cluster rank")?
            .into_iter()
            .filter(|r| r.user_id == user_id)
            .collect())
    }
}

#[async_trait]
impl ContentRepository for RedbStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<ContentItem>, StoreError> {
        self.get_json(CONTENT_TABLE, id, "content")
    }

    async fn find_recent_ids(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        let mut items: Vec<ContentItem> = self.scan_json(CONTENT_TABLE, "content")?;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(items.into_iter().take(limit).map(|i| i.id).collect())
    }

    async fn find_tags_for(&self, id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .find_by_id(id)
            .await?
            .map(|item| item.tags)
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProfileRepository for RedbStore {
    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        self.get_json(PROFILES_TABLE, user_id, "profile")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EngagementStats, InteractionType};
    use chrono::Duration;
    use tempfile::TempDir;

    fn create_test_store() -> (RedbStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.redb");
        let store = RedbStore::open(&db_path).unwrap();
        (store, temp_dir)
    }

    fn make_embedding(id: &str, values: Vec<f32>, version: u64) -> Embedding {
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), "test".into());
        Embedding {
            entity_id: id.to_string(),
            kind: EntityKind::Post,
            vector: EmbeddingVector::new(values),
            metadata,
            version,
        }
    }

    fn make_interaction(id: &str, user: &str, entity: &str, hours_ago: i64) -> UserInteraction {
        UserInteraction {
            id: id.to_string(),
            user_id: user.to_string(),
            entity_id: entity.to_string(),
            entity_type: EntityKind::Post,
            interaction_type: InteractionType::Like,
            timestamp: Utc::now() - Duration::hours(hours_ago),
            metadata: Metadata::new(),
        }
    }

    fn make_cluster(id: &str) -> ClusterInfo {
        ClusterInfo {
            id: id.to_string(),
            name: id.to_string(),
            centroid: EmbeddingVector::new(vec![0.6, 0.8]),
            topics: vec!["tech".to_string()],
            member_ids: vec!["p1".to_string()],
            size: 1,
            density: 3.5,
            metadata: Metadata::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_embedding_round_trip() {
        let (store, _temp) = create_test_store();
        assert!(store
            .get_embedding(EntityKind::Post, "p1")
            .await
            .unwrap()
            .is_none());

        let embedding = make_embedding("p1", vec![0.6, 0.8, 0.0], 3);
        store.put_embedding(&embedding).await.unwrap();

        let loaded = store
            .get_embedding(EntityKind::Post, "p1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, embedding);
        assert!(store
            .get_embedding(EntityKind::User, "p1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_embeddings_by_kind() {
        let (store, _temp) = create_test_store();
        store
            .put_embedding(&make_embedding("p1", vec![1.0, 0.0], 1))
            .await
            .unwrap();
        store
            .put_embedding(&make_embedding("p2", vec![0.0, 1.0], 1))
            .await
            .unwrap();

        assert_eq!(store.list_embeddings(EntityKind::Post).await.unwrap().len(), 2);
        assert!(store.list_embeddings(EntityKind::User).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_interactions_keep_append_order() {
        let (store, _temp) = create_test_store();
        store
            .append_interaction(&make_interaction("b", "u1", "p1", 5))
            .await
            .unwrap();
        store
            .append_interaction(&make_interaction("a", "u1", "p2", 1))
            .await
            .unwrap();
        store
            .append_interaction(&make_interaction("c", "u2", "p1", 3))
            .await
            .unwrap();

        let ids: Vec<String> = store
            .interactions_for_user("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);

        let on_p1 = store.interactions_for_entity("p1").await.unwrap();
        assert_eq!(on_p1.len(), 2);
        assert_eq!(on_p1[0].id, "b");
        assert_eq!(store.interaction_count().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_replace_clusters_keeps_ranks() {
        let (store, _temp) = create_test_store();
        store.put_cluster(&make_cluster("old")).await.unwrap();
        store
            .put_user_rank(&UserClusterRank {
                user_id: "u1".into(),
                cluster_id: "old".into(),
                score: 0.3,
                similarity: 0.3,
                interaction_score: 0.3,
                match_score: 0.3,
                is_active: true,
                last_interaction_date: Utc::now(),
            })
            .await
            .unwrap();

        store
            .replace_clusters(&[make_cluster("c1"), make_cluster("c2")])
            .await
            .unwrap();

        let ids: Vec<String> = store
            .list_clusters()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["c1".to_string(), "c2".to_string()]);
        assert_eq!(store.user_ranks("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_content_lookups() {
        let (store, _temp) = create_test_store();
        let now = Utc::now();
        for (id, age) in [("p1", 10), ("p2", 1)] {
            store
                .put_content(&ContentItem {
                    id: id.to_string(),
                    author_id: "a1".to_string(),
                    text: "hello".to_string(),
                    tags: vec!["rust".to_string()],
                    engagement: EngagementStats::default(),
                    created_at: now - Duration::hours(age),
                    metadata: Metadata::new(),
                })
                .unwrap();
        }

        assert_eq!(store.find_recent_ids(1).await.unwrap(), vec!["p2".to_string()]);
        assert_eq!(store.find_tags_for("p1").await.unwrap(), vec!["rust".to_string()]);
        assert!(store.find_tags_for("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_across_reopens() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("persist.redb");

        {
            let store = RedbStore::open(&db_path).unwrap();
            store
                .append_interaction(&make_interaction("i1", "u1", "p1", 0))
                .await
                .unwrap();
            store
                .put_embedding(&make_embedding("p1", vec![1.0, 0.0], 2))
                .await
                .unwrap();
        }

        let store = RedbStore::open(&db_path).unwrap();
        assert_eq!(store.interactions_for_user("u1").await.unwrap().len(), 1);
        let embedding = store
            .get_embedding(EntityKind::Post, "p1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(embedding.version, 2);
    }
}

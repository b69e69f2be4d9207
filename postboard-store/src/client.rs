use crate::record::SeedRecord;
use postboard_common::model::post::{CreatePost, Post, PostId, UpdatePost};
use std::{collections::HashSet, path::Path};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Reading seed file failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Seed file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Seed file contains post id {0} more than once")]
    DuplicateId(PostId),
    #[error("No post ids are left to assign")]
    IdsExhausted,
}

#[derive(Debug, Default)]
struct StoreState {
    posts: Vec<Post>,
    /// [`None`] once the largest possible id has been handed out.
    next_id: Option<PostId>,
}

/// In-memory post collection.
///
/// Posts are kept in insertion order. Ids are handed out sequentially, starting
/// one past the largest id already present, and are never reused.
#[derive(Debug)]
pub struct StoreClient {
    state: RwLock<StoreState>,
}

impl Default for StoreClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                posts: Vec::new(),
                next_id: Some(PostId::new(1)),
            }),
        }
    }

    pub fn with_posts(posts: Vec<Post>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(posts.len());
        for post in &posts {
            if !seen.insert(post.id) {
                return Err(StoreError::DuplicateId(post.id));
            }
        }

        let next_id = posts
            .iter()
            .map(|post| post.id)
            .max()
            .map_or(Some(PostId::new(1)), PostId::next);

        Ok(Self {
            state: RwLock::new(StoreState { posts, next_id }),
        })
    }

    pub async fn from_seed_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read(path).await?;
        let posts = serde_json::from_slice::<SeedRecord>(&contents)?.into_posts();

        debug!(path = %path.display(), count = posts.len(), "Loaded seed posts");

        Self::with_posts(posts)
    }

    pub async fn fetch_posts(&self) -> Vec<Post> {
        self.state.read().await.posts.clone()
    }

    pub async fn fetch_post(&self, post_id: PostId) -> Option<Post> {
        self.state
            .read()
            .await
            .posts
            .iter()
            .find(|post| post.id == post_id)
            .cloned()
    }

    pub async fn create_post(&self, post: CreatePost) -> Result<Post> {
        let mut state = self.state.write().await;

        let id = state.next_id.ok_or(StoreError::IdsExhausted)?;
        state.next_id = id.next();

        let post = Post::new(id, post);
        state.posts.push(post.clone());

        Ok(post)
    }

    pub async fn update_post(&self, post_id: PostId, update: UpdatePost) -> Option<Post> {
        let mut state = self.state.write().await;

        let post = state.posts.iter_mut().find(|post| post.id == post_id)?;
        post.apply(update);

        Some(post.clone())
    }

    pub async fn delete_post(&self, post_id: PostId) -> Option<Post> {
        let mut state = self.state.write().await;

        let index = state.posts.iter().position(|post| post.id == post_id)?;
        Some(state.posts.remove(index))
    }
}

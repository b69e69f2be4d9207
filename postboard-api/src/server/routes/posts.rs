use crate::server::{
    Result, ServerError, ServerRouter,
    json::{Created, Json},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use postboard_common::model::post::{CreatePost, Post, PostId, UpdatePost};
use postboard_store::client::StoreClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_patch(update_post)
        .typed_delete(delete_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: PostId,
}

/// Body of a successful delete.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
struct Deleted {}

async fn list_posts(
    PostsPath(): PostsPath,
    State(store): State<Arc<StoreClient>>,
) -> Json<Vec<Post>> {
    Json(store.fetch_posts().await)
}

async fn create_post(
    PostsPath(): PostsPath,
    State(store): State<Arc<StoreClient>>,
    Json(post): Json<CreatePost>,
) -> Result<Created<Post>> {
    let post = store.create_post(post).await?;
    debug!(id = %post.id, "Created post");

    Ok(Created(post))
}

async fn get_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<StoreClient>>,
) -> Result<Json<Post>> {
    let post = store
        .fetch_post(id)
        .await
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

async fn update_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<StoreClient>>,
    Json(update): Json<UpdatePost>,
) -> Result<Json<Post>> {
    let post = store
        .update_post(id, update)
        .await
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<StoreClient>>,
) -> Result<Json<Deleted>> {
    store
        .delete_post(id)
        .await
        .ok_or(ServerError::PostByIdNotFound(id))?;
    debug!(%id, "Deleted post");

    Ok(Json(Deleted {}))
}

//! Talking to the remote post collection.

use postboard_common::model::post::{CreatePost, Post, PostId, UpdatePost};
use reqwest::{
    RequestBuilder, Response, StatusCode,
    header::{ACCEPT, CONTENT_TYPE},
};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::trace;

pub const DEFAULT_POSTS_URL: &str = "http://localhost:3000/posts";

const APPLICATION_JSON: &str = "application/json";

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request could not be completed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Request body could not be encoded as JSON: {0}")]
    Encode(serde_json::Error),
    #[error("Response body is not the expected JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Server rejected the request with status {0}")]
    ServerRejection(StatusCode),
}

/// The remote post collection.
///
/// Every call is exactly one round trip. Nothing is retried and calls are not
/// ordered relative to each other.
pub trait PostsApi: Send + Sync {
    fn list(&self) -> impl Future<Output = Result<Vec<Post>>> + Send;

    fn get(&self, id: PostId) -> impl Future<Output = Result<Post>> + Send;

    fn create(&self, post: &CreatePost) -> impl Future<Output = Result<Post>> + Send;

    fn update(
        &self,
        id: PostId,
        update: &UpdatePost,
    ) -> impl Future<Output = Result<Post>> + Send;

    /// Deletes a post. The response body is not inspected.
    fn delete(&self, id: PostId) -> impl Future<Output = Result<()>> + Send;
}

/// [`PostsApi`] over HTTP, rooted at the collection url (e.g. `.../posts`).
#[derive(Clone, Debug)]
pub struct HttpPostsClient {
    http: reqwest::Client,
    posts_url: String,
}

impl HttpPostsClient {
    #[must_use]
    pub fn new(posts_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), posts_url)
    }

    #[must_use]
    pub fn with_client(http: reqwest::Client, posts_url: impl Into<String>) -> Self {
        let mut posts_url = posts_url.into();
        while posts_url.ends_with('/') {
            posts_url.pop();
        }

        Self { http, posts_url }
    }

    #[must_use]
    pub fn posts_url(&self) -> &str {
        &self.posts_url
    }

    fn post_url(&self, id: PostId) -> String {
        format!("{}/{id}", self.posts_url)
    }
}

fn with_json_body<T: Serialize>(request: RequestBuilder, body: &T) -> Result<RequestBuilder> {
    let body = serde_json::to_vec(body).map_err(ClientError::Encode)?;

    Ok(request
        .header(CONTENT_TYPE, APPLICATION_JSON)
        .header(ACCEPT, APPLICATION_JSON)
        .body(body))
}

async fn send(request: RequestBuilder) -> Result<Response> {
    let response = request.send().await?;
    let status = response.status();
    trace!(url = %response.url(), %status, "Received response");

    if status.is_success() {
        Ok(response)
    } else {
        Err(ClientError::ServerRejection(status))
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

impl PostsApi for HttpPostsClient {
    async fn list(&self) -> Result<Vec<Post>> {
        decode(send(self.http.get(&self.posts_url)).await?).await
    }

    async fn get(&self, id: PostId) -> Result<Post> {
        decode(send(self.http.get(self.post_url(id))).await?).await
    }

    async fn create(&self, post: &CreatePost) -> Result<Post> {
        let request = with_json_body(self.http.post(&self.posts_url), post)?;
        decode(send(request).await?).await
    }

    async fn update(&self, id: PostId, update: &UpdatePost) -> Result<Post> {
        let request = with_json_body(self.http.patch(self.post_url(id)), update)?;
        decode(send(request).await?).await
    }

    async fn delete(&self, id: PostId) -> Result<()> {
        send(self.http.delete(self.post_url(id))).await?;
        Ok(())
    }
}

use postboard_common::model::post::Post;
use serde::Deserialize;

/// Layout of a seed file: `{"posts": [{"id": 1, "title": "...", "text": "..."}]}`.
///
/// A bare array of posts is accepted as well.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SeedRecord {
    Collection { posts: Vec<Post> },
    Posts(Vec<Post>),
}

impl SeedRecord {
    pub fn into_posts(self) -> Vec<Post> {
        match self {
            SeedRecord::Collection { posts } | SeedRecord::Posts(posts) => posts,
        }
    }
}

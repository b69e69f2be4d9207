//! The on-screen side: a container of rendered post elements.

use postboard_common::model::post::{Post, PostId};
use std::fmt::Display;

/// Identifies one rendered element for as long as it is in its container.
///
/// Handles are never reused, so a stale handle cannot address a newer element.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct ElementHandle(u64);

impl Display for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "element-{}", self.0)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub enum DeleteState {
    #[default]
    Idle,
    Requested,
}

/// One rendered post: a heading, a paragraph and a delete control bound to the
/// post's id.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PostElement {
    handle: ElementHandle,
    post_id: PostId,
    heading: String,
    paragraph: String,
    delete: DeleteState,
}

impl PostElement {
    #[must_use]
    pub fn handle(&self) -> ElementHandle {
        self.handle
    }

    #[must_use]
    pub fn post_id(&self) -> PostId {
        self.post_id
    }

    #[must_use]
    pub fn heading(&self) -> &str {
        &self.heading
    }

    #[must_use]
    pub fn paragraph(&self) -> &str {
        &self.paragraph
    }

    #[must_use]
    pub fn delete_state(&self) -> DeleteState {
        self.delete
    }

    pub fn set_delete_state(&mut self, state: DeleteState) {
        self.delete = state;
    }

    fn show(&mut self, post: &Post) {
        self.heading.clone_from(&post.title);
        self.paragraph.clone_from(&post.text);
    }
}

/// Ordered container of post elements, the `.posts` section of the page.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Container {
    elements: Vec<PostElement>,
    next_handle: u64,
}

impl Container {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, post: &Post) -> ElementHandle {
        let handle = ElementHandle(self.next_handle);
        self.next_handle += 1;

        self.elements.push(PostElement {
            handle,
            post_id: post.id,
            heading: post.title.clone(),
            paragraph: post.text.clone(),
            delete: DeleteState::Idle,
        });

        handle
    }

    /// Returns `false` if `handle` is not in this container.
    pub fn replace(&mut self, handle: ElementHandle, post: &Post) -> bool {
        match self.get_mut(handle) {
            Some(element) => {
                element.show(post);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, handle: ElementHandle) -> Option<PostElement> {
        let index = self
            .elements
            .iter()
            .position(|element| element.handle == handle)?;
        Some(self.elements.remove(index))
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    #[must_use]
    pub fn get(&self, handle: ElementHandle) -> Option<&PostElement> {
        self.elements.iter().find(|element| element.handle == handle)
    }

    pub fn get_mut(&mut self, handle: ElementHandle) -> Option<&mut PostElement> {
        self.elements
            .iter_mut()
            .find(|element| element.handle == handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PostElement> {
        self.elements.iter()
    }
}

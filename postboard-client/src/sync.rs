//! Keeping the rendered board consistent with the server.
//!
//! Rendering is pessimistic: an element appears only once the server has
//! returned the created post, and disappears only once the server has confirmed
//! the delete. A failed request leaves the board (and the form) as it was.
//!
//! Operations are independent futures. The view state is locked only between
//! awaits, so a delete issued after a create may complete first.

use crate::{
    api::{ClientError, PostsApi},
    form::{self, PostForm, SubmitEvent, UnknownFieldError},
    markup,
    view::{Container, DeleteState, ElementHandle},
};
use postboard_common::model::post::{CreatePost, Post, PostId};
use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};
use thiserror::Error;
use tracing::{debug, warn};

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("Post {0} is not on screen")]
    NotRendered(PostId),
    #[error("Post {0} is already being deleted")]
    DeletePending(PostId),
}

/// Deletes and creates the server confirmed while a listing was in flight.
///
/// The listing may have been taken before any of them, so they are applied on
/// top of it.
#[derive(Debug, Default)]
struct Confirmed {
    deleted: HashSet<PostId>,
    created: Vec<Post>,
}

#[derive(Debug, Default)]
struct ViewState {
    container: Container,
    registry: HashMap<PostId, ElementHandle>,
    form: PostForm,
    next_load: u64,
    loads: HashMap<u64, Confirmed>,
}

impl ViewState {
    fn render(&mut self, post: &Post) -> ElementHandle {
        if let Some(&handle) = self.registry.get(&post.id)
            && self.container.replace(handle, post)
        {
            return handle;
        }

        let handle = self.container.append(post);
        self.registry.insert(post.id, handle);
        handle
    }

    fn element_state(&self, id: PostId) -> Option<(ElementHandle, DeleteState)> {
        let handle = *self.registry.get(&id)?;
        let element = self.container.get(handle)?;
        Some((handle, element.delete_state()))
    }

    fn set_delete_state(&mut self, id: PostId, delete: DeleteState) {
        if let Some(&handle) = self.registry.get(&id)
            && let Some(element) = self.container.get_mut(handle)
        {
            element.set_delete_state(delete);
        }
    }

    fn confirm_deleted(&mut self, id: PostId) {
        for confirmed in self.loads.values_mut() {
            confirmed.deleted.insert(id);
        }
    }

    fn confirm_created(&mut self, post: &Post) {
        for confirmed in self.loads.values_mut() {
            confirmed.created.push(post.clone());
        }
    }
}

/// Keeps a load's [`Confirmed`] record registered until the load ends, also
/// when its future is dropped midway.
struct LoadTracker<'a> {
    state: &'a Mutex<ViewState>,
    load: u64,
}

impl<'a> LoadTracker<'a> {
    fn start(state: &'a Mutex<ViewState>) -> Self {
        let mut guard = lock(state);
        let load = guard.next_load;
        guard.next_load = load.wrapping_add(1);
        guard.loads.insert(load, Confirmed::default());

        Self { state, load }
    }
}

impl Drop for LoadTracker<'_> {
    fn drop(&mut self) {
        lock(self.state).loads.remove(&self.load);
    }
}

fn lock(state: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the board: the post container, the `id -> element` registry and the
/// posting form.
#[derive(Debug)]
pub struct ViewSynchronizer<A> {
    api: A,
    state: Mutex<ViewState>,
}

impl<A: PostsApi> ViewSynchronizer<A> {
    #[must_use]
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: Mutex::default(),
        }
    }

    #[must_use]
    pub fn api(&self) -> &A {
        &self.api
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        lock(&self.state)
    }

    /// Puts an element for `post` into the container and registers it. A post
    /// that is already on screen is refreshed in place.
    pub fn render(&self, post: &Post) -> ElementHandle {
        self.state().render(post)
    }

    /// Lists all posts and replaces the board with them, in server order.
    ///
    /// The container is cleared first, so loading twice never duplicates
    /// elements. Deletes still in flight keep their pending state, and deletes
    /// or creates confirmed while the listing was in flight are not undone.
    pub async fn load(&self) -> Result<usize> {
        let tracker = LoadTracker::start(&self.state);
        let posts = self.api.list().await.inspect_err(|err| {
            warn!(error = %err, "Listing posts failed, leaving board unchanged");
        })?;

        let mut state = self.state();
        let confirmed = state.loads.remove(&tracker.load).unwrap_or_default();
        let pending: HashSet<PostId> = state
            .container
            .iter()
            .filter(|element| element.delete_state() == DeleteState::Requested)
            .map(|element| element.post_id())
            .collect();

        state.container.clear();
        state.registry.clear();
        for post in posts.iter().chain(&confirmed.created) {
            if !confirmed.deleted.contains(&post.id) {
                state.render(post);
            }
        }
        for id in pending {
            state.set_delete_state(id, DeleteState::Requested);
        }

        let count = state.container.len();
        debug!(
            count,
            deleted = confirmed.deleted.len(),
            created = confirmed.created.len(),
            "Rendered posts"
        );
        // The tracker locks the state when it is dropped.
        drop(state);

        Ok(count)
    }

    /// Activates the delete control of post `id`.
    ///
    /// The element is removed only after the server confirms the delete. On
    /// failure it stays on screen and its control becomes usable again. While
    /// a delete is in flight, further activations are refused.
    pub async fn remove_on_confirmed_delete(&self, id: PostId) -> Result<()> {
        let handle = self.request_delete(id)?;

        match self.api.delete(id).await {
            Ok(()) => {
                self.confirm_delete(id, handle);
                debug!(%id, %handle, "Removed deleted post");
                Ok(())
            }
            Err(err) => {
                warn!(%id, error = %err, "Deleting post failed, keeping it on screen");
                self.state().set_delete_state(id, DeleteState::Idle);
                Err(err.into())
            }
        }
    }

    fn request_delete(&self, id: PostId) -> Result<ElementHandle> {
        let mut state = self.state();
        match state.element_state(id) {
            None => Err(SyncError::NotRendered(id)),
            Some((_, DeleteState::Requested)) => Err(SyncError::DeletePending(id)),
            Some((handle, DeleteState::Idle)) => {
                state.set_delete_state(id, DeleteState::Requested);
                Ok(handle)
            }
        }
    }

    fn confirm_delete(&self, id: PostId, handle: ElementHandle) {
        let mut state = self.state();
        state.confirm_deleted(id);
        state.container.remove(handle);
        // A reload while the delete was in flight may have rendered it anew.
        if let Some(current) = state.registry.remove(&id) {
            state.container.remove(current);
        }
    }

    /// Creates a post and shows it once the server has answered with it.
    ///
    /// The form is reset only on success; on failure the user's input stays.
    pub async fn append_on_confirmed_create(&self, payload: CreatePost) -> Result<ElementHandle> {
        match self.api.create(&payload).await {
            Ok(post) => {
                let mut state = self.state();
                state.form.reset();
                state.confirm_created(&post);
                let handle = state.render(&post);
                debug!(id = %post.id, %handle, "Rendered created post");
                Ok(handle)
            }
            Err(err) => {
                warn!(error = %err, "Creating post failed, keeping form input");
                Err(err.into())
            }
        }
    }

    pub async fn submit(&self, event: &mut SubmitEvent) -> Result<ElementHandle> {
        let payload = form::capture(&self.state().form, event);
        self.append_on_confirmed_create(payload).await
    }

    pub fn set_field(
        &self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), UnknownFieldError> {
        self.state().form.set_field(name, value)
    }

    #[must_use]
    pub fn form(&self) -> PostForm {
        self.state().form.clone()
    }

    #[must_use]
    pub fn container(&self) -> Container {
        self.state().container.clone()
    }

    #[must_use]
    pub fn handle_of(&self, id: PostId) -> Option<ElementHandle> {
        self.state().registry.get(&id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state().container.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state().container.is_empty()
    }

    #[must_use]
    pub fn markup(&self) -> String {
        let state = self.state();
        markup::render_form(&state.form) + &markup::render_container(&state.container)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::{ClientError, PostsApi, Result},
        form::{SubmitEvent, TEXT_FIELD, TITLE_FIELD},
        sync::{SyncError, ViewSynchronizer},
        view::DeleteState,
    };
    use postboard_common::model::post::{CreatePost, Post, PostId, UpdatePost};
    use reqwest::StatusCode;
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    };
    use tokio::sync::Semaphore;

    /// In-process stand-in for the server. Each operation can be told to fail,
    /// and lists, creates and deletes can be held back until released. A held
    /// back list answers with the posts as they were when it was called.
    struct FakeApi {
        posts: Mutex<Vec<Post>>,
        next_id: AtomicU64,
        reject_list: AtomicBool,
        reject_create: AtomicBool,
        reject_delete: AtomicBool,
        list_gate: Semaphore,
        create_gate: Semaphore,
        delete_gate: Semaphore,
    }

    impl FakeApi {
        fn new(posts: Vec<Post>) -> Self {
            let next_id = posts.iter().map(|post| post.id.get()).max().unwrap_or(0) + 1;
            Self {
                posts: Mutex::new(posts),
                next_id: AtomicU64::new(next_id),
                reject_list: AtomicBool::new(false),
                reject_create: AtomicBool::new(false),
                reject_delete: AtomicBool::new(false),
                list_gate: Semaphore::new(Semaphore::MAX_PERMITS),
                create_gate: Semaphore::new(Semaphore::MAX_PERMITS),
                delete_gate: Semaphore::new(Semaphore::MAX_PERMITS),
            }
        }

        fn rejection() -> ClientError {
            ClientError::ServerRejection(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }

    impl PostsApi for FakeApi {
        async fn list(&self) -> Result<Vec<Post>> {
            let posts = self.posts.lock().unwrap().clone();
            self.list_gate.acquire().await.unwrap().forget();
            if self.reject_list.load(Ordering::SeqCst) {
                return Err(Self::rejection());
            }
            Ok(posts)
        }

        async fn get(&self, id: PostId) -> Result<Post> {
            let posts = self.posts.lock().unwrap();
            posts
                .iter()
                .find(|post| post.id == id)
                .cloned()
                .ok_or(ClientError::ServerRejection(StatusCode::NOT_FOUND))
        }

        async fn create(&self, post: &CreatePost) -> Result<Post> {
            self.create_gate.acquire().await.unwrap().forget();
            if self.reject_create.load(Ordering::SeqCst) {
                return Err(Self::rejection());
            }

            let id = PostId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
            let post = Post::new(id, post.clone());
            self.posts.lock().unwrap().push(post.clone());
            Ok(post)
        }

        async fn update(&self, id: PostId, update: &UpdatePost) -> Result<Post> {
            let mut posts = self.posts.lock().unwrap();
            let post = posts
                .iter_mut()
                .find(|post| post.id == id)
                .ok_or(ClientError::ServerRejection(StatusCode::NOT_FOUND))?;
            post.apply(update.clone());
            Ok(post.clone())
        }

        async fn delete(&self, id: PostId) -> Result<()> {
            self.delete_gate.acquire().await.unwrap().forget();
            if self.reject_delete.load(Ordering::SeqCst) {
                return Err(Self::rejection());
            }
            self.posts.lock().unwrap().retain(|post| post.id != id);
            Ok(())
        }
    }

    fn post(id: u64, title: &str, text: &str) -> Post {
        Post {
            id: id.into(),
            title: title.to_owned(),
            text: text.to_owned(),
        }
    }

    fn board() -> ViewSynchronizer<FakeApi> {
        ViewSynchronizer::new(FakeApi::new(vec![post(1, "A", "a"), post(2, "B", "b")]))
    }

    fn headings(sync: &ViewSynchronizer<FakeApi>) -> Vec<String> {
        sync.container()
            .iter()
            .map(|element| element.heading().to_owned())
            .collect()
    }

    fn snapshot(sync: &ViewSynchronizer<FakeApi>) -> Vec<(PostId, String, String)> {
        sync.container()
            .iter()
            .map(|element| {
                (
                    element.post_id(),
                    element.heading().to_owned(),
                    element.paragraph().to_owned(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn load_renders_every_post_in_order() {
        let sync = board();

        assert_eq!(sync.load().await.unwrap(), 2);

        assert_eq!(headings(&sync), ["A", "B"]);
        for element in sync.container().iter() {
            assert_eq!(sync.handle_of(element.post_id()), Some(element.handle()));
        }
    }

    #[tokio::test]
    async fn loading_twice_does_not_duplicate() {
        let sync = board();
        sync.load().await.unwrap();
        let first = snapshot(&sync);

        sync.load().await.unwrap();

        assert_eq!(snapshot(&sync), first);
        assert_eq!(sync.len(), 2);
    }

    #[tokio::test]
    async fn failed_load_leaves_board_unchanged() {
        let sync = board();
        sync.load().await.unwrap();
        sync.api().reject_list.store(true, Ordering::SeqCst);

        assert!(matches!(sync.load().await, Err(SyncError::Client(_))));
        assert_eq!(headings(&sync), ["A", "B"]);
        assert!(sync.state().loads.is_empty());
    }

    #[tokio::test]
    async fn confirmed_delete_removes_element() {
        let sync = board();
        sync.load().await.unwrap();

        sync.remove_on_confirmed_delete(PostId::new(2)).await.unwrap();

        assert_eq!(headings(&sync), ["A"]);
        assert_eq!(sync.handle_of(PostId::new(2)), None);
    }

    #[tokio::test]
    async fn rejected_delete_keeps_element() {
        let sync = board();
        sync.load().await.unwrap();
        sync.api().reject_delete.store(true, Ordering::SeqCst);
        let handle = sync.handle_of(PostId::new(2)).unwrap();

        let result = sync.remove_on_confirmed_delete(PostId::new(2)).await;

        assert!(matches!(
            result,
            Err(SyncError::Client(ClientError::ServerRejection(_)))
        ));
        assert_eq!(sync.len(), 2);
        let container = sync.container();
        let element = container.get(handle).unwrap();
        assert_eq!(element.heading(), "B");
        assert_eq!(element.delete_state(), DeleteState::Idle);

        sync.api().reject_delete.store(false, Ordering::SeqCst);
        sync.remove_on_confirmed_delete(PostId::new(2)).await.unwrap();
        assert_eq!(sync.len(), 1);
    }

    #[tokio::test]
    async fn deleting_unknown_post() {
        let sync = board();
        sync.load().await.unwrap();

        assert!(matches!(
            sync.remove_on_confirmed_delete(PostId::new(9)).await,
            Err(SyncError::NotRendered(id)) if id == PostId::new(9)
        ));
        assert_eq!(sync.len(), 2);
    }

    #[tokio::test]
    async fn confirmed_create_appends_and_clears_form() {
        let sync = board();
        sync.load().await.unwrap();
        sync.set_field(TITLE_FIELD, "New").unwrap();
        sync.set_field(TEXT_FIELD, "body").unwrap();
        let mut event = SubmitEvent::new();

        let handle = sync.submit(&mut event).await.unwrap();

        assert!(event.default_prevented());
        assert_eq!(sync.len(), 3);
        let container = sync.container();
        let element = container.get(handle).unwrap();
        assert_eq!(element.post_id(), PostId::new(3));
        assert_eq!(element.heading(), "New");
        assert_eq!(element.paragraph(), "body");
        assert!(sync.form().is_empty());
    }

    #[tokio::test]
    async fn rejected_create_keeps_form_input() {
        let sync = board();
        sync.load().await.unwrap();
        sync.api().reject_create.store(true, Ordering::SeqCst);
        sync.set_field(TITLE_FIELD, "New").unwrap();
        sync.set_field(TEXT_FIELD, "body").unwrap();

        assert!(sync.submit(&mut SubmitEvent::new()).await.is_err());

        assert_eq!(sync.len(), 2);
        let form = sync.form();
        assert_eq!(form.field(TITLE_FIELD), Some("New"));
        assert_eq!(form.field(TEXT_FIELD), Some("body"));
    }

    #[tokio::test]
    async fn empty_form_is_submitted_as_is() {
        let sync = board();

        let handle = sync.submit(&mut SubmitEvent::new()).await.unwrap();

        let container = sync.container();
        assert_eq!(container.get(handle).unwrap().heading(), "");
    }

    async fn until_delete_requested(sync: &ViewSynchronizer<FakeApi>, id: PostId) {
        loop {
            let requested = sync.handle_of(id).is_some_and(|handle| {
                sync.container().get(handle).map(|element| element.delete_state())
                    == Some(DeleteState::Requested)
            });
            if requested {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn second_activation_while_deleting_is_refused() {
        let sync = board();
        sync.load().await.unwrap();
        sync.api().delete_gate.forget_permits(Semaphore::MAX_PERMITS);
        let id = PostId::new(1);

        let (first, second) = tokio::join!(sync.remove_on_confirmed_delete(id), async {
            until_delete_requested(&sync, id).await;
            let second = sync.remove_on_confirmed_delete(id).await;
            assert_eq!(sync.len(), 2);
            sync.api().delete_gate.add_permits(1);
            second
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(SyncError::DeletePending(_))));
        assert_eq!(headings(&sync), ["B"]);
    }

    #[tokio::test]
    async fn operations_complete_out_of_order() {
        let sync = board();
        sync.load().await.unwrap();
        sync.api().create_gate.forget_permits(Semaphore::MAX_PERMITS);

        let created = sync.append_on_confirmed_create(CreatePost {
            title: "Slow".to_owned(),
            text: "create".to_owned(),
        });
        let deleted_first = async {
            sync.remove_on_confirmed_delete(PostId::new(1)).await.unwrap();
            assert_eq!(headings(&sync), ["B"]);
            sync.api().create_gate.add_permits(1);
        };

        let (created, ()) = tokio::join!(created, deleted_first);

        assert!(created.is_ok());
        assert_eq!(headings(&sync), ["B", "Slow"]);
    }

    #[tokio::test]
    async fn delete_confirmed_after_reload_removes_rerendered_element() {
        let sync = board();
        sync.load().await.unwrap();
        sync.api().delete_gate.forget_permits(Semaphore::MAX_PERMITS);
        let id = PostId::new(2);
        let old_handle = sync.handle_of(id).unwrap();

        let (deleted, ()) = tokio::join!(sync.remove_on_confirmed_delete(id), async {
            until_delete_requested(&sync, id).await;
            sync.load().await.unwrap();
            let new_handle = sync.handle_of(id).unwrap();
            assert_ne!(new_handle, old_handle);
            assert_eq!(
                sync.container().get(new_handle).unwrap().delete_state(),
                DeleteState::Requested
            );
            sync.api().delete_gate.add_permits(1);
        });

        deleted.unwrap();
        assert_eq!(headings(&sync), ["A"]);
        assert_eq!(sync.handle_of(id), None);
    }

    #[tokio::test]
    async fn stale_listing_keeps_changes_confirmed_meanwhile() {
        let sync = board();
        sync.load().await.unwrap();
        sync.api().list_gate.forget_permits(Semaphore::MAX_PERMITS);

        // The listing is taken while the server still has posts 1 and 2.
        let (loaded, ()) = tokio::join!(sync.load(), async {
            sync.remove_on_confirmed_delete(PostId::new(2)).await.unwrap();
            sync.append_on_confirmed_create(CreatePost {
                title: "C".to_owned(),
                text: "c".to_owned(),
            })
            .await
            .unwrap();
            assert_eq!(headings(&sync), ["A", "C"]);
            sync.api().list_gate.add_permits(1);
        });

        assert_eq!(loaded.unwrap(), 2);
        let ids: Vec<_> = snapshot(&sync).into_iter().map(|(id, ..)| id.get()).collect();
        assert_eq!(ids, [1, 3]);
        assert_eq!(sync.handle_of(PostId::new(2)), None);
        assert!(sync.state().loads.is_empty());

        // The next listing agrees with what is on screen.
        sync.load().await.unwrap();
        assert_eq!(headings(&sync), ["A", "C"]);
    }

    #[tokio::test]
    async fn post_created_and_deleted_during_listing_stays_gone() {
        let sync = board();
        sync.load().await.unwrap();
        sync.api().list_gate.forget_permits(Semaphore::MAX_PERMITS);

        let (loaded, ()) = tokio::join!(sync.load(), async {
            sync.append_on_confirmed_create(CreatePost {
                title: "C".to_owned(),
                text: "c".to_owned(),
            })
            .await
            .unwrap();
            sync.remove_on_confirmed_delete(PostId::new(3)).await.unwrap();
            sync.api().list_gate.add_permits(1);
        });

        loaded.unwrap();
        assert_eq!(headings(&sync), ["A", "B"]);
        assert_eq!(sync.handle_of(PostId::new(3)), None);
    }

    #[tokio::test]
    async fn render_keeps_one_element_per_post() {
        let sync = board();
        sync.load().await.unwrap();

        let handle = sync.render(&post(1, "A2", "a2"));

        assert_eq!(sync.len(), 2);
        assert_eq!(sync.handle_of(PostId::new(1)), Some(handle));
        assert_eq!(headings(&sync), ["A2", "B"]);
    }

    #[tokio::test]
    async fn markup_shows_form_and_posts() {
        let sync = board();
        sync.load().await.unwrap();

        let html = sync.markup();

        assert!(html.starts_with(r#"<form id="posting">"#));
        assert!(html.contains(r#"<section class="posts"><div class="post" data-id="1"><h2>A</h2>"#));
    }
}

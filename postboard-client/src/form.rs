//! The posting form and what happens when it is submitted.

use postboard_common::model::post::CreatePost;
use thiserror::Error;

pub const TITLE_FIELD: &str = "title";
pub const TEXT_FIELD: &str = "text";

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
#[error("The posting form has no field named {0:?}")]
pub struct UnknownFieldError(pub String);

/// The `#posting` form with its `title` and `text` inputs.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostForm {
    title: String,
    text: String,
}

impl PostForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            TITLE_FIELD => Some(&self.title),
            TEXT_FIELD => Some(&self.text),
            _ => None,
        }
    }

    pub fn set_field(
        &mut self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), UnknownFieldError> {
        let field = match name {
            TITLE_FIELD => &mut self.title,
            TEXT_FIELD => &mut self.text,
            _ => return Err(UnknownFieldError(name.to_owned())),
        };
        *field = value.into();

        Ok(())
    }

    /// Empties every field.
    pub fn reset(&mut self) {
        self.title.clear();
        self.text.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.text.is_empty()
    }
}

/// A submit event. Left alone, the host would navigate away.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SubmitEvent {
    default_prevented: bool,
}

impl SubmitEvent {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    #[must_use]
    pub fn default_prevented(self) -> bool {
        self.default_prevented
    }
}

/// Handles a submit of `form`: suppresses navigation and reads the named fields
/// into a creation payload.
///
/// Nothing is validated here. Empty fields are submitted as empty strings and
/// the server decides whether to accept them.
pub fn capture(form: &PostForm, event: &mut SubmitEvent) -> CreatePost {
    event.prevent_default();

    CreatePost {
        title: form.field(TITLE_FIELD).unwrap_or_default().to_owned(),
        text: form.field(TEXT_FIELD).unwrap_or_default().to_owned(),
    }
}

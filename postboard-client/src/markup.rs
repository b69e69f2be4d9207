//! HTML for the board. Post content is always escaped.

use crate::{
    form::{PostForm, TEXT_FIELD, TITLE_FIELD},
    view::{Container, DeleteState, PostElement},
};
use v_htmlescape::escape;

pub const DELETE_LABEL: &str = "Delete Post";

#[must_use]
pub fn render_post(element: &PostElement) -> String {
    let disabled = match element.delete_state() {
        DeleteState::Idle => "",
        DeleteState::Requested => " disabled",
    };

    format!(
        r#"<div class="post" data-id="{id}"><h2>{title}</h2><p>{text}</p><button{disabled}>{DELETE_LABEL}</button></div>"#,
        id = element.post_id(),
        title = escape(element.heading()),
        text = escape(element.paragraph()),
    )
}

#[must_use]
pub fn render_container(container: &Container) -> String {
    let mut html = String::from(r#"<section class="posts">"#);
    for element in container.iter() {
        html.push_str(&render_post(element));
    }
    html.push_str("</section>");

    html
}

#[must_use]
pub fn render_form(form: &PostForm) -> String {
    let mut html = String::from(r#"<form id="posting">"#);
    for name in [TITLE_FIELD, TEXT_FIELD] {
        let value = form.field(name).unwrap_or_default();
        html.push_str(&format!(
            r#"<input id="{name}" name="{name}" value="{value}">"#,
            value = escape(value),
        ));
    }
    html.push_str(r#"<input type="submit" value="Post"></form>"#);

    html
}

//! Client side of the post board.
//!
//! [`api`] talks to the post collection, [`sync`] keeps the rendered
//! [`view`] in step with it, and [`form`] turns a submitted form into a
//! creation request.

pub mod api;
pub mod form;
pub mod markup;
pub mod sync;
pub mod view;

//! egui widgets of the viewer. Rendering only; all state lives in
//! [`crate::state::ViewerState`].

pub mod panels;
pub mod plot;
pub mod table;

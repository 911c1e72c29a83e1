pub mod board_layout;
pub mod display;
pub mod view_models;

pub use board_layout::BoardLayout;
pub use display::{eval_display, move_list_display, render_frame};

//! Output of the final answer.

pub mod generator;

pub use generator::{render_answer, save_answer, write_answer};

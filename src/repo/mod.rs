//! Version-control inspection of the local checkout.

pub mod history;

pub use history::{current_branch, current_commit, open, recent_commits};

pub mod history;

pub use history::{HistoryEntry, ModelRole};

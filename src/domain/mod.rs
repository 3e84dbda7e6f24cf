pub mod content;
pub mod score;

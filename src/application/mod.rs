pub mod clock;
pub mod error;
pub mod repos;
pub mod snippets;

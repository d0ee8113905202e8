pub mod cooldown;
pub mod directory;
pub mod evaluator;
pub mod fanout;

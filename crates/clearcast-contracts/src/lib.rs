pub mod assets;
pub mod events;
pub mod history;
pub mod keys;
pub mod repl;

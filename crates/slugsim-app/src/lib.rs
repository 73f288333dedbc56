//! Shared application plumbing for the slugsim terminal front end.

pub mod terminal;

pub use terminal::TerminalRenderer;

pub mod actions;
pub mod cancel;
pub mod config;
pub mod dom;
pub mod extension;
pub mod feed;
pub mod help;
pub mod keys;
pub mod page;
pub mod replay;
pub mod shortcuts;
pub mod terminal;
pub mod waiter;

pub use extension::Extension;

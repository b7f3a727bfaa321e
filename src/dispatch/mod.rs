pub mod dispatcher;
pub use dispatcher::{Block, Dispatcher};

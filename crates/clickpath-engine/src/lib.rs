pub mod config;
pub mod dom;
pub mod provider;
pub mod reporter;
pub mod selector;
pub mod session;
pub mod sink;

pub use clickpath_common::error;
pub use clickpath_common::formatter;
pub use clickpath_common::protocol;

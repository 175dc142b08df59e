//! Read-only serializers of finished graphs

pub mod dot;
pub mod dump;

pub use dot::{to_dot, DotWriter};
pub use dump::{dump, write_dump};

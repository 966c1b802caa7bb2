//! One module per subcommand, matching the teacher's `mockforge-cli` layout.

pub mod replay;
pub mod session;
pub mod tag;

//! The lifecycle verbs, each a clap argument struct with an `exec` taking
//! the state root. Each invocation owns its data end to end; there is no
//! shared mutable state between verbs.

pub mod create;
pub mod delete;
pub mod list;
pub mod start;

pub use create::Create;
pub use delete::Delete;
pub use list::List;
pub use start::Start;

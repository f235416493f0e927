//! Records of what was rendered.
//!
//! A [`Page`] is created when the first protected link or form of a
//! response is composed. Each link or form becomes a [`State`], holding the
//! target action, the allowed method and the ordered [`Parameter`]s that
//! were offered to the client.

mod page;
mod parameter;
mod state;

pub use page::Page;
pub use parameter::Parameter;
pub use state::{State, StateId};

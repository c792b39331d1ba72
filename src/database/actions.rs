pub mod recipes;
pub mod reference;

pub use recipes::*;
pub use reference::{find_by_name, get_or_create, list_reference, resolve_all, ReferenceEntity};

pub mod align;
pub mod domain;
pub mod returns;
pub mod schema;

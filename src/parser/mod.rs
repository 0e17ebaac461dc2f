pub mod csv;
pub mod links;

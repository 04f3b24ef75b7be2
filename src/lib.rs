pub mod cli;
pub mod entity;
pub mod error;
pub mod issuer;
pub mod orm;
pub mod sequence;
pub mod settings;
pub mod store;

pub use entity::{EntityKind, NumberedRecord, YearPrefix};
pub use error::NumberingError;
pub use issuer::{Issuer, IssuerConfig};
pub use orm::Db;
pub use sequence::next_number;

inventory::collect!(crate::orm::Migration);

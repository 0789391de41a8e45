//! Core module containing the schema, storage trait and shared types

pub mod auth;
pub mod error;
pub mod field;
pub mod model;
pub mod query;
pub mod smart_code;
pub mod store;
pub mod table;

pub use auth::{AuthContext, AuthVerifier, StaticTokenVerifier};
pub use error::{HeraError, HeraResult, ProcedureError, ValidationError};
pub use field::{DynamicValue, FieldType};
pub use model::{
    CoreEntity, DynamicField, Organization, Relationship, TableRecord, Transaction,
    TransactionLine,
};
pub use query::{ApiResponse, PageParams};
pub use store::{SelectQuery, TableStore};
pub use table::{Row, Table, TableDescriptor};

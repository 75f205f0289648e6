//! Result, row and schema types shared by every engine.
//!
//! - **Row/Value** (`row`): engine-agnostic cell representation
//! - **Schema** (`schema`): declared column types of a handle
//! - **Result** (`result`): forward-only SQL result cursors
//! - **Delimited** (`delimited`): CSV/TSV reading and writing

pub mod delimited;
pub mod result;
pub mod row;
pub mod schema;

pub use result::{SqlResult, SqlTypedResult};
pub use row::{ColumnInfo, Row, Value};
pub use schema::{Column, ColumnType, Schema};

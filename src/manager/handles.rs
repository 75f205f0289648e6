//! Handle constructor helpers.
//!
//! Each helper spells out one constructor signature and funnels into
//! `Manager::construct_handle`.

use std::sync::Arc;

use super::Manager;
use crate::content::Schema;
use crate::error::DdfResult;
use crate::handle::{DataHandle, HandleArgs, RawData};

/// A handle with nothing behind it yet, owned by `manager`.
pub fn new_handle<M: Manager + ?Sized>(manager: &M) -> DdfResult<Arc<DataHandle>> {
    manager.construct_handle(HandleArgs::new().manager(manager.identity()))
}

/// A handle over backend-native data.
pub fn new_handle_with_data<M: Manager + ?Sized>(
    manager: &M,
    data: RawData,
    type_specs: Vec<String>,
    name: Option<String>,
    schema: Option<Schema>,
) -> DdfResult<Arc<DataHandle>> {
    manager.construct_handle(
        HandleArgs::new()
            .manager(manager.identity())
            .data(data)
            .type_specs(type_specs)
            .name(name)
            .schema(schema),
    )
}

/// A handle over a table that already exists in the engine.
pub fn new_table_handle<M: Manager + ?Sized>(
    manager: &M,
    table: &str,
    name: Option<String>,
    schema: Option<Schema>,
) -> DdfResult<Arc<DataHandle>> {
    let schema = schema.map(|s| s.with_table_name(table));
    manager.construct_handle(
        HandleArgs::new()
            .manager(manager.identity())
            .table(table)
            .name(name)
            .schema(schema),
    )
}

/// Fresh backing table name for a handle without one.
pub fn generated_table_name() -> String {
    format!("ddf_{}", uuid::Uuid::new_v4().simple())
}

//! Explicit constructor argument lists for handle creation.
//!
//! Handle kinds need different constructor shapes. Rather than resolving
//! constructors by reflection, a caller spells out the argument list and
//! the handle factory matches its shape against the signatures each
//! constructor accepts.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::content::Schema;
use crate::datasource::EngineType;

/// Backend-native data carried by a handle (a dataframe, a pool, rows...).
pub type RawData = Arc<dyn Any + Send + Sync>;

/// Kind of a constructor argument, used to match signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    Manager,
    Data,
    TypeSpecs,
    Name,
    Schema,
    Table,
    Options,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ArgKind::Manager => "Manager",
            ArgKind::Data => "Data",
            ArgKind::TypeSpecs => "TypeSpecs",
            ArgKind::Name => "Name",
            ArgKind::Schema => "Schema",
            ArgKind::Table => "Table",
            ArgKind::Options => "Options",
        };
        f.write_str(label)
    }
}

/// The Manager a handle is created for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerIdentity {
    pub engine_name: String,
    pub engine_type: EngineType,
}

#[derive(Clone)]
pub enum HandleArg {
    Manager(ManagerIdentity),
    Data(RawData),
    /// Backend type descriptors of the raw data
    TypeSpecs(Vec<String>),
    Name(Option<String>),
    Schema(Option<Schema>),
    /// Backing table in the owning engine
    Table(String),
    Options(HashMap<String, String>),
}

impl HandleArg {
    pub fn kind(&self) -> ArgKind {
        match self {
            HandleArg::Manager(_) => ArgKind::Manager,
            HandleArg::Data(_) => ArgKind::Data,
            HandleArg::TypeSpecs(_) => ArgKind::TypeSpecs,
            HandleArg::Name(_) => ArgKind::Name,
            HandleArg::Schema(_) => ArgKind::Schema,
            HandleArg::Table(_) => ArgKind::Table,
            HandleArg::Options(_) => ArgKind::Options,
        }
    }
}

impl fmt::Debug for HandleArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleArg::Manager(m) => f.debug_tuple("Manager").field(m).finish(),
            HandleArg::Data(_) => f.write_str("Data(<raw>)"),
            HandleArg::TypeSpecs(t) => f.debug_tuple("TypeSpecs").field(t).finish(),
            HandleArg::Name(n) => f.debug_tuple("Name").field(n).finish(),
            HandleArg::Schema(s) => f.debug_tuple("Schema").field(s).finish(),
            HandleArg::Table(t) => f.debug_tuple("Table").field(t).finish(),
            HandleArg::Options(o) => f.debug_tuple("Options").field(o).finish(),
        }
    }
}

/// Ordered argument list passed to a handle constructor.
#[derive(Debug, Clone, Default)]
pub struct HandleArgs {
    args: Vec<HandleArg>,
}

impl HandleArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, arg: HandleArg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn manager(self, identity: ManagerIdentity) -> Self {
        self.push(HandleArg::Manager(identity))
    }

    pub fn data(self, data: RawData) -> Self {
        self.push(HandleArg::Data(data))
    }

    pub fn type_specs(self, specs: Vec<String>) -> Self {
        self.push(HandleArg::TypeSpecs(specs))
    }

    pub fn name(self, name: Option<String>) -> Self {
        self.push(HandleArg::Name(name))
    }

    pub fn schema(self, schema: Option<Schema>) -> Self {
        self.push(HandleArg::Schema(schema))
    }

    pub fn table(self, table: impl Into<String>) -> Self {
        self.push(HandleArg::Table(table.into()))
    }

    pub fn options(self, options: HashMap<String, String>) -> Self {
        self.push(HandleArg::Options(options))
    }

    pub fn shape(&self) -> Vec<ArgKind> {
        self.args.iter().map(HandleArg::kind).collect()
    }

    /// `[Manager, Table, Name, Schema]`, as shown in construction errors.
    pub fn describe(&self) -> String {
        describe_shape(&self.shape())
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HandleArg> {
        self.args.iter()
    }

    pub fn manager_identity(&self) -> Option<&ManagerIdentity> {
        self.args.iter().find_map(|a| match a {
            HandleArg::Manager(m) => Some(m),
            _ => None,
        })
    }

    pub fn raw_data(&self) -> Option<&RawData> {
        self.args.iter().find_map(|a| match a {
            HandleArg::Data(d) => Some(d),
            _ => None,
        })
    }

    pub fn type_spec_list(&self) -> Option<&[String]> {
        self.args.iter().find_map(|a| match a {
            HandleArg::TypeSpecs(t) => Some(t.as_slice()),
            _ => None,
        })
    }

    pub fn handle_name(&self) -> Option<&str> {
        self.args.iter().find_map(|a| match a {
            HandleArg::Name(n) => n.as_deref(),
            _ => None,
        })
    }

    pub fn handle_schema(&self) -> Option<&Schema> {
        self.args.iter().find_map(|a| match a {
            HandleArg::Schema(s) => s.as_ref(),
            _ => None,
        })
    }

    pub fn table_name(&self) -> Option<&str> {
        self.args.iter().find_map(|a| match a {
            HandleArg::Table(t) => Some(t.as_str()),
            _ => None,
        })
    }

    pub fn option_map(&self) -> Option<&HashMap<String, String>> {
        self.args.iter().find_map(|a| match a {
            HandleArg::Options(o) => Some(o),
            _ => None,
        })
    }
}

pub fn describe_shape(shape: &[ArgKind]) -> String {
    let kinds: Vec<String> = shape.iter().map(ArgKind::to_string).collect();
    format!("[{}]", kinds.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ManagerIdentity {
        ManagerIdentity {
            engine_name: "e1".to_string(),
            engine_type: EngineType::Spark,
        }
    }

    #[test]
    fn test_shape_and_describe() {
        let args = HandleArgs::new()
            .manager(identity())
            .table("t_backing")
            .name(Some("t1".to_string()))
            .schema(None);

        assert_eq!(
            args.shape(),
            vec![ArgKind::Manager, ArgKind::Table, ArgKind::Name, ArgKind::Schema]
        );
        assert_eq!(args.describe(), "[Manager, Table, Name, Schema]");
    }

    #[test]
    fn test_accessors() {
        let data: RawData = Arc::new(vec![1u8, 2, 3]);
        let args = HandleArgs::new()
            .manager(identity())
            .data(data)
            .type_specs(vec!["int".to_string()])
            .name(None)
            .schema(Some(Schema::parse("v int")));

        assert_eq!(args.manager_identity().unwrap().engine_name, "e1");
        assert_eq!(args.handle_name(), None);
        assert_eq!(args.type_spec_list(), Some(&["int".to_string()][..]));
        assert_eq!(args.handle_schema().unwrap().column_count(), 1);
        let raw = args.raw_data().unwrap();
        assert_eq!(raw.downcast_ref::<Vec<u8>>(), Some(&vec![1u8, 2, 3]));
        assert!(args.table_name().is_none());
    }
}

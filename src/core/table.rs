//! The six universal tables and their static descriptors
//!
//! Every business vertical stores its data in the same six tables. A
//! [`TableDescriptor`] tells the dispatcher which columns a row must carry,
//! which it may carry, and whether access is scoped by organization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// A row as stored in any of the six tables
pub type Row = Map<String, Value>;

/// Columns managed by the service itself
pub const SYSTEM_COLUMNS: &[&str] = &["id", "created_at", "updated_at"];

/// Columns a caller may never overwrite through an update
pub const IMMUTABLE_COLUMNS: &[&str] = &["id", "organization_id", "created_at"];

/// Status written by a soft delete
pub const ARCHIVED_STATUS: &str = "archived";

/// Numeric columns, across all six tables
const NUMBER_COLUMNS: &[&str] = &[
    "field_value_number",
    "total_amount",
    "line_number",
    "quantity",
    "unit_amount",
    "line_amount",
];

/// Boolean columns, across all six tables
const BOOLEAN_COLUMNS: &[&str] = &["field_value_boolean", "is_bidirectional", "is_active"];

/// How values of a column compare in equality filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Number,
    Boolean,
}

impl ColumnKind {
    pub fn of(column: &str) -> Self {
        if NUMBER_COLUMNS.contains(&column) {
            ColumnKind::Number
        } else if BOOLEAN_COLUMNS.contains(&column) {
            ColumnKind::Boolean
        } else {
            ColumnKind::Text
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Number => "number",
            ColumnKind::Boolean => "boolean",
        }
    }

    /// Parse a query-string value into this kind
    ///
    /// `None` when the text is not a valid number or boolean.
    pub fn parse(&self, raw: &str) -> Option<Value> {
        match self {
            ColumnKind::Text => Some(Value::String(raw.to_string())),
            ColumnKind::Number => raw.parse::<i64>().ok().map(Value::from).or_else(|| {
                raw.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            }),
            ColumnKind::Boolean => raw.parse::<bool>().ok().map(Value::Bool),
        }
    }
}

/// Give string values of number and boolean columns their column's type
///
/// Values that do not parse are kept as they are and match nothing.
pub fn typed_filter(filter: &Row) -> Row {
    filter
        .iter()
        .map(|(column, value)| {
            let typed = match value {
                Value::String(raw) => ColumnKind::of(column).parse(raw),
                _ => None,
            };
            (column.clone(), typed.unwrap_or_else(|| value.clone()))
        })
        .collect()
}

/// The six tables of the universal schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    CoreOrganizations,
    CoreEntities,
    CoreDynamicData,
    CoreRelationships,
    UniversalTransactions,
    UniversalTransactionLines,
}

impl Table {
    /// Table name as it appears in the database and in requests
    pub fn name(&self) -> &'static str {
        match self {
            Table::CoreOrganizations => "core_organizations",
            Table::CoreEntities => "core_entities",
            Table::CoreDynamicData => "core_dynamic_data",
            Table::CoreRelationships => "core_relationships",
            Table::UniversalTransactions => "universal_transactions",
            Table::UniversalTransactionLines => "universal_transaction_lines",
        }
    }

    /// Parse a table name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.name() == name)
    }

    /// All tables, in dependency order
    pub fn all() -> &'static [Table] {
        &[
            Table::CoreOrganizations,
            Table::CoreEntities,
            Table::CoreDynamicData,
            Table::CoreRelationships,
            Table::UniversalTransactions,
            Table::UniversalTransactionLines,
        ]
    }

    /// Static descriptor for this table
    pub fn descriptor(&self) -> &'static TableDescriptor {
        describe(*self)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of one table
#[derive(Debug, Clone, Serialize)]
pub struct TableDescriptor {
    pub table: Table,
    pub required_fields: &'static [&'static str],
    pub optional_fields: &'static [&'static str],
    pub has_org_filter: bool,
    /// Status written on insert when the caller gives none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_status: Option<&'static str>,
}

static CATALOG: [TableDescriptor; 6] = [
    TableDescriptor {
        table: Table::CoreOrganizations,
        required_fields: &["organization_name", "organization_code"],
        optional_fields: &[
            "organization_type",
            "industry_classification",
            "settings",
            "status",
        ],
        has_org_filter: false,
        default_status: Some("active"),
    },
    TableDescriptor {
        table: Table::CoreEntities,
        required_fields: &["organization_id", "entity_type", "entity_name", "smart_code"],
        optional_fields: &[
            "entity_code",
            "entity_description",
            "parent_entity_id",
            "status",
            "metadata",
        ],
        has_org_filter: true,
        default_status: Some("active"),
    },
    TableDescriptor {
        table: Table::CoreDynamicData,
        required_fields: &["organization_id", "entity_id", "field_name", "smart_code"],
        optional_fields: &[
            "field_type",
            "field_value_text",
            "field_value_number",
            "field_value_boolean",
            "field_value_date",
            "field_value_json",
        ],
        has_org_filter: true,
        default_status: None,
    },
    TableDescriptor {
        table: Table::CoreRelationships,
        required_fields: &[
            "organization_id",
            "from_entity_id",
            "to_entity_id",
            "relationship_type",
            "smart_code",
        ],
        optional_fields: &[
            "is_bidirectional",
            "relationship_data",
            "workflow_state",
            "is_active",
        ],
        has_org_filter: true,
        default_status: None,
    },
    TableDescriptor {
        table: Table::UniversalTransactions,
        required_fields: &["organization_id", "transaction_type", "smart_code"],
        optional_fields: &[
            "transaction_code",
            "transaction_date",
            "source_entity_id",
            "target_entity_id",
            "total_amount",
            "transaction_currency_code",
            "transaction_status",
            "metadata",
        ],
        has_org_filter: true,
        default_status: None,
    },
    TableDescriptor {
        table: Table::UniversalTransactionLines,
        required_fields: &["organization_id", "transaction_id", "line_number", "smart_code"],
        optional_fields: &[
            "entity_id",
            "line_type",
            "description",
            "quantity",
            "unit_amount",
            "line_amount",
            "line_data",
        ],
        has_org_filter: true,
        default_status: None,
    },
];

/// Get the descriptor of a table
pub fn describe(table: Table) -> &'static TableDescriptor {
    // CATALOG is declared in the same order as Table::all()
    match table {
        Table::CoreOrganizations => &CATALOG[0],
        Table::CoreEntities => &CATALOG[1],
        Table::CoreDynamicData => &CATALOG[2],
        Table::CoreRelationships => &CATALOG[3],
        Table::UniversalTransactions => &CATALOG[4],
        Table::UniversalTransactionLines => &CATALOG[5],
    }
}

/// All descriptors
pub fn catalog() -> &'static [TableDescriptor] {
    &CATALOG
}

impl TableDescriptor {
    /// Required fields that are absent or null, in declaration order
    pub fn missing_fields(&self, row: &Row) -> Vec<String> {
        self.required_fields
            .iter()
            .filter(|field| row.get(**field).is_none_or(Value::is_null))
            .map(|field| field.to_string())
            .collect()
    }

    /// Fields the table does not know about
    pub fn unknown_fields(&self, row: &Row) -> Vec<String> {
        row.keys()
            .filter(|key| !self.is_column(key))
            .cloned()
            .collect()
    }

    /// Whether `name` is a column of this table
    pub fn is_column(&self, name: &str) -> bool {
        SYSTEM_COLUMNS.contains(&name)
            || self.required_fields.contains(&name)
            || self.optional_fields.contains(&name)
    }

    /// Fill the system columns and default status of a row about to be inserted
    pub fn prepare_insert(&self, mut row: Row, now: DateTime<Utc>) -> Row {
        if row.get("id").is_none_or(Value::is_null) {
            row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        let stamp = Value::String(now.to_rfc3339());
        row.entry("created_at").or_insert_with(|| stamp.clone());
        row.insert("updated_at".into(), stamp);
        if let Some(status) = self.default_status {
            if row.get("status").is_none_or(Value::is_null) {
                row.insert("status".into(), Value::String(status.to_string()));
            }
        }
        row
    }

    /// Strip immutable columns from an update payload and stamp `updated_at`
    pub fn prepare_update(&self, mut changes: Row, now: DateTime<Utc>) -> Row {
        for column in IMMUTABLE_COLUMNS {
            changes.remove(*column);
        }
        changes.insert("updated_at".into(), Value::String(now.to_rfc3339()));
        changes
    }
}

/// Read the `id` column of a row as a UUID
pub fn row_id(row: &Row) -> Option<Uuid> {
    row.get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// Build the organization scope filter for a table
///
/// Tables without the org filter get an empty scope.
pub fn org_scope(table: Table, organization_id: Option<Uuid>) -> Row {
    let mut scope = Row::new();
    if table.descriptor().has_org_filter {
        if let Some(org) = organization_id {
            scope.insert("organization_id".into(), Value::String(org.to_string()));
        }
    }
    scope
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_table_names_round_trip() {
        for table in Table::all() {
            assert_eq!(Table::from_name(table.name()), Some(*table));
            assert_eq!(table.descriptor().table, *table);
        }
        assert_eq!(Table::from_name("users"), None);
    }

    #[test]
    fn test_only_organizations_skip_org_filter() {
        let unfiltered: Vec<_> = catalog()
            .iter()
            .filter(|d| !d.has_org_filter)
            .map(|d| d.table)
            .collect();
        assert_eq!(unfiltered, vec![Table::CoreOrganizations]);
    }

    #[test]
    fn test_missing_fields_in_declaration_order() {
        let descriptor = describe(Table::CoreEntities);
        let missing = descriptor.missing_fields(&row(json!({
            "entity_type": "customer",
            "smart_code": null
        })));
        assert_eq!(missing, vec!["organization_id", "entity_name", "smart_code"]);
    }

    #[test]
    fn test_unknown_fields() {
        let descriptor = describe(Table::CoreRelationships);
        let unknown = descriptor.unknown_fields(&row(json!({
            "from_entity_id": "a",
            "colour": "blue",
            "id": "x"
        })));
        assert_eq!(unknown, vec!["colour"]);
    }

    #[test]
    fn test_prepare_insert_fills_system_columns() {
        let now = Utc::now();
        let prepared = describe(Table::CoreEntities).prepare_insert(
            row(json!({ "entity_name": "Acme" })),
            now,
        );
        assert!(row_id(&prepared).is_some());
        assert_eq!(prepared["status"], "active");
        assert_eq!(prepared["created_at"], prepared["updated_at"]);

        let line = describe(Table::UniversalTransactionLines).prepare_insert(Row::new(), now);
        assert!(line.get("status").is_none());
    }

    #[test]
    fn test_prepare_update_strips_immutable_columns() {
        let changes = describe(Table::CoreEntities).prepare_update(
            row(json!({
                "id": "other",
                "organization_id": "other-org",
                "entity_name": "Renamed"
            })),
            Utc::now(),
        );
        assert!(changes.get("id").is_none());
        assert!(changes.get("organization_id").is_none());
        assert_eq!(changes["entity_name"], "Renamed");
        assert!(changes.contains_key("updated_at"));
    }

    #[test]
    fn test_typed_filter_follows_column_kind() {
        let typed = typed_filter(&row(json!({
            "line_number": "2",
            "line_amount": "19.5",
            "is_active": "true",
            "entity_code": "007",
            "quantity": "several"
        })));
        assert_eq!(typed["line_number"], json!(2));
        assert_eq!(typed["line_amount"], json!(19.5));
        assert_eq!(typed["is_active"], json!(true));
        assert_eq!(typed["entity_code"], json!("007"));
        assert_eq!(typed["quantity"], json!("several"));
    }

    #[test]
    fn test_org_scope() {
        let org = Uuid::new_v4();
        assert!(org_scope(Table::CoreOrganizations, Some(org)).is_empty());
        assert_eq!(
            org_scope(Table::CoreEntities, Some(org))["organization_id"],
            org.to_string()
        );
    }
}

//! Request parsing for the universal endpoint
//!
//! `GET` and `DELETE` carry everything in the query string. `POST` and `PUT`
//! carry a JSON body; query parameters fill whatever the body leaves out.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::core::error::{HeraError, HeraResult, ValidationError};
use crate::core::query::PageParams;
use crate::core::table::{ColumnKind, Row, Table};

/// Query parameters consumed by the dispatcher itself rather than used as filters
const RESERVED_PARAMS: &[&str] = &["action", "table", "organization_id", "limit", "offset", "mode"];

/// Operation requested from the universal endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Schema,
    Read,
    Create,
    BatchCreate,
    Validate,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Schema => "schema",
            Action::Read => "read",
            Action::Create => "create",
            Action::BatchCreate => "batch_create",
            Action::Validate => "validate",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl FromStr for Action {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "schema" => Ok(Action::Schema),
            "read" => Ok(Action::Read),
            "create" => Ok(Action::Create),
            "batch_create" => Ok(Action::BatchCreate),
            "validate" => Ok(Action::Validate),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            other => Err(ValidationError::UnknownAction(other.to_string())),
        }
    }
}

/// How a delete removes the row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    #[default]
    Hard,
    /// Set `status = archived`
    Soft,
}

impl FromStr for DeleteMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hard" => Ok(DeleteMode::Hard),
            "soft" => Ok(DeleteMode::Soft),
            other => Err(ValidationError::InvalidPayload(format!(
                "mode must be 'hard' or 'soft', got '{}'",
                other
            ))),
        }
    }
}

/// JSON body of `POST` and `PUT`
#[derive(Debug, Default, Deserialize)]
pub struct UniversalBody {
    pub action: Option<String>,
    pub table: Option<String>,
    pub organization_id: Option<String>,
    pub id: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// A parsed universal request
#[derive(Debug, Clone)]
pub struct UniversalRequest {
    pub action: Action,
    pub table: Option<Table>,
    pub organization_id: Option<Uuid>,
    pub id: Option<Uuid>,
    pub mode: DeleteMode,
    pub page: PageParams,
    /// Equality filters for reads
    pub filters: Row,
    pub data: Value,
}

impl UniversalRequest {
    /// Parse a query-string request, using `default_action` when none is given
    pub fn from_query(params: &HashMap<String, String>, default_action: Action) -> HeraResult<Self> {
        let action = match params.get("action") {
            Some(action) => action.parse::<Action>()?,
            None => default_action,
        };
        let table = params.get("table").map(|t| parse_table(t)).transpose()?;

        let mut filters = Row::new();
        if let Some(table) = table {
            let descriptor = table.descriptor();
            for (key, value) in params {
                if !RESERVED_PARAMS.contains(&key.as_str()) && descriptor.is_column(key) {
                    let kind = ColumnKind::of(key);
                    let typed = kind.parse(value).ok_or_else(|| {
                        ValidationError::InvalidPayload(format!(
                            "{} expects a {} value, got '{}'",
                            key,
                            kind.as_str(),
                            value
                        ))
                    })?;
                    filters.insert(key.clone(), typed);
                }
            }
        }

        Ok(Self {
            action,
            table,
            organization_id: params
                .get("organization_id")
                .map(|id| parse_uuid(id))
                .transpose()?,
            id: params.get("id").map(|id| parse_uuid(id)).transpose()?,
            mode: params
                .get("mode")
                .map(|m| m.parse::<DeleteMode>())
                .transpose()?
                .unwrap_or_default(),
            page: PageParams {
                limit: params.get("limit").map(|l| parse_number("limit", l)).transpose()?,
                offset: params
                    .get("offset")
                    .map(|o| parse_number("offset", o))
                    .transpose()?
                    .unwrap_or(0),
            },
            filters,
            data: Value::Null,
        })
    }

    /// Parse a body request; query parameters fill fields the body omits
    pub fn from_body(
        params: &HashMap<String, String>,
        body: UniversalBody,
        default_action: Action,
    ) -> HeraResult<Self> {
        let mut params = params.clone();
        for (key, value) in [
            ("action", body.action),
            ("table", body.table),
            ("organization_id", body.organization_id),
            ("id", body.id),
        ] {
            if let Some(value) = value {
                params.insert(key.to_string(), value);
            }
        }

        let mut request = Self::from_query(&params, default_action)?;
        request.data = body.data;
        Ok(request)
    }

    pub fn require_table(&self) -> HeraResult<Table> {
        self.table
            .ok_or_else(|| ValidationError::MissingArgument("table".to_string()).into())
    }

    pub fn require_id(&self) -> HeraResult<Uuid> {
        self.id
            .ok_or_else(|| ValidationError::MissingArgument("id".to_string()).into())
    }

    /// Organization scope for an org-filtered table; 400 when absent
    pub fn require_org_for(&self, table: Table) -> HeraResult<Option<Uuid>> {
        if table.descriptor().has_org_filter && self.organization_id.is_none() {
            return Err(HeraError::MissingOrganization {
                table: table.name().to_string(),
            });
        }
        Ok(self.organization_id)
    }

    /// `data` as a single row; the request's organization fills a missing `organization_id`
    pub fn data_row(&self, table: Table) -> HeraResult<Row> {
        match &self.data {
            Value::Object(row) => Ok(self.with_org(table, row.clone())),
            _ => Err(ValidationError::InvalidPayload("data must be a JSON object".to_string()).into()),
        }
    }

    /// `data` as an array of rows
    pub fn data_rows(&self, table: Table) -> HeraResult<Vec<Row>> {
        let Value::Array(items) = &self.data else {
            return Err(
                ValidationError::InvalidPayload("data must be a JSON array".to_string()).into(),
            );
        };
        items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(row) => Ok(self.with_org(table, row.clone())),
                _ => Err(HeraError::from(ValidationError::InvalidPayload(format!(
                    "data[{}] must be a JSON object",
                    index
                )))),
            })
            .collect()
    }

    fn with_org(&self, table: Table, mut row: Row) -> Row {
        if let Some(org) = self.organization_id {
            if table.descriptor().has_org_filter && row.get("organization_id").is_none_or(Value::is_null) {
                row.insert("organization_id".into(), Value::String(org.to_string()));
            }
        }
        row
    }
}

fn parse_table(name: &str) -> HeraResult<Table> {
    Table::from_name(name).ok_or_else(|| ValidationError::UnknownTable(name.to_string()).into())
}

fn parse_uuid(value: &str) -> HeraResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| ValidationError::InvalidUuid(value.to_string()).into())
}

fn parse_number(name: &str, value: &str) -> HeraResult<usize> {
    value.parse().map_err(|_| {
        ValidationError::InvalidPayload(format!("{} must be a non-negative integer", name)).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_read_filters_keep_known_columns_only() {
        let org = Uuid::new_v4().to_string();
        let request = UniversalRequest::from_query(
            &params(&[
                ("table", "core_entities"),
                ("organization_id", &org),
                ("entity_type", "customer"),
                ("sort", "name"),
                ("limit", "10"),
            ]),
            Action::Read,
        )
        .unwrap();

        assert_eq!(request.action, Action::Read);
        assert_eq!(request.table, Some(Table::CoreEntities));
        assert_eq!(request.page.limit, Some(10));
        assert_eq!(request.filters.len(), 1);
        assert_eq!(request.filters["entity_type"], "customer");
    }

    #[test]
    fn test_filters_take_column_types() {
        let request = UniversalRequest::from_query(
            &params(&[
                ("table", "universal_transaction_lines"),
                ("line_number", "1"),
                ("line_amount", "100.5"),
            ]),
            Action::Read,
        )
        .unwrap();
        assert_eq!(request.filters["line_number"], json!(1));
        assert_eq!(request.filters["line_amount"], json!(100.5));

        let err = UniversalRequest::from_query(
            &params(&[("table", "core_relationships"), ("is_active", "yes")]),
            Action::Read,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PAYLOAD");
        assert!(err.to_string().contains("is_active expects a boolean value"));
    }

    #[test]
    fn test_unknown_action_and_table() {
        let err = UniversalRequest::from_query(&params(&[("action", "drop")]), Action::Read)
            .unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_ACTION");

        let err = UniversalRequest::from_query(&params(&[("table", "users")]), Action::Read)
            .unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_TABLE");
    }

    #[test]
    fn test_body_overrides_query() {
        let org = Uuid::new_v4();
        let body = UniversalBody {
            action: Some("validate".to_string()),
            table: Some("core_entities".to_string()),
            organization_id: Some(org.to_string()),
            id: None,
            data: json!({ "entity_name": "Acme" }),
        };
        let request =
            UniversalRequest::from_body(&params(&[("action", "create")]), body, Action::Create)
                .unwrap();

        assert_eq!(request.action, Action::Validate);
        let row = request.data_row(Table::CoreEntities).unwrap();
        assert_eq!(row["organization_id"], org.to_string());
    }

    #[test]
    fn test_org_not_injected_into_organizations() {
        let body = UniversalBody {
            table: Some("core_organizations".to_string()),
            organization_id: Some(Uuid::new_v4().to_string()),
            data: json!({ "organization_name": "Acme", "organization_code": "ACME" }),
            ..Default::default()
        };
        let request = UniversalRequest::from_body(&HashMap::new(), body, Action::Create).unwrap();
        let row = request.data_row(Table::CoreOrganizations).unwrap();
        assert!(!row.contains_key("organization_id"));
    }

    #[test]
    fn test_require_org_for_filtered_tables() {
        let request = UniversalRequest::from_query(&HashMap::new(), Action::Read).unwrap();
        assert!(request.require_org_for(Table::CoreOrganizations).is_ok());
        let err = request.require_org_for(Table::CoreDynamicData).unwrap_err();
        assert_eq!(err.error_code(), "MISSING_ORGANIZATION");
    }

    #[test]
    fn test_invalid_mode() {
        let err = UniversalRequest::from_query(&params(&[("mode", "purge")]), Action::Delete)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PAYLOAD");
    }
}

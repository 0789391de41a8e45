//! Request bodies of the entity API

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{FieldValidationError, HeraError, HeraResult, ValidationError};
use crate::core::field::{DynamicValue, FieldType};
use crate::procedures::{EntityReadQuery, UpsertEntity};

/// Body of `POST /api/v2/entities` and `PUT /api/v2/entities/{id}`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EntityRequest {
    #[validate(length(min = 1, max = 100, message = "entity_type must be 1-100 characters"))]
    pub entity_type: String,

    #[validate(length(min = 1, max = 255, message = "entity_name must be 1-255 characters"))]
    pub entity_name: String,

    #[validate(custom(function = "crate::core::smart_code::validate"))]
    pub smart_code: String,

    #[validate(length(max = 100))]
    pub entity_code: Option<String>,

    pub entity_description: Option<String>,
    pub parent_entity_id: Option<Uuid>,
    pub status: Option<String>,
    pub metadata: Option<Value>,

    #[serde(default)]
    #[validate(nested)]
    pub dynamic_fields: Vec<DynamicFieldInput>,
}

/// One dynamic field to write alongside the entity
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DynamicFieldInput {
    #[validate(length(min = 1, max = 100, message = "field_name must be 1-100 characters"))]
    pub field_name: String,

    #[serde(default)]
    pub value: Value,

    /// `text | number | boolean | date | json`; inferred from `value` when absent
    pub field_type: Option<String>,

    /// Defaults to the entity's smart code
    #[validate(custom(function = "crate::core::smart_code::validate"))]
    pub smart_code: Option<String>,
}

/// A dynamic field ready for `hera_dynamic_data_set_v1`
#[derive(Debug, Clone, PartialEq)]
pub struct TypedField {
    pub field_name: String,
    pub value: DynamicValue,
    pub smart_code: String,
}

impl EntityRequest {
    /// Validate the body and type every dynamic field
    ///
    /// All problems are reported together, before anything is written.
    pub fn typed_fields(&self) -> HeraResult<Vec<TypedField>> {
        self.validate()?;

        let mut errors = Vec::new();
        let mut fields = Vec::with_capacity(self.dynamic_fields.len());
        for (index, input) in self.dynamic_fields.iter().enumerate() {
            match input.typed(&self.smart_code) {
                Ok(field) => fields.push(field),
                Err(message) => errors.push(FieldValidationError {
                    field: format!("dynamic_fields[{}].value", index),
                    message,
                }),
            }
        }

        if errors.is_empty() {
            Ok(fields)
        } else {
            Err(HeraError::from(ValidationError::FieldErrors(errors)))
        }
    }

    /// Procedure input, updating `entity_id` when given
    pub fn to_upsert(&self, entity_id: Option<Uuid>) -> UpsertEntity {
        UpsertEntity {
            entity_id,
            entity_type: self.entity_type.clone(),
            entity_name: self.entity_name.clone(),
            smart_code: self.smart_code.clone(),
            entity_code: self.entity_code.clone(),
            entity_description: self.entity_description.clone(),
            parent_entity_id: self.parent_entity_id,
            status: self.status.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

impl DynamicFieldInput {
    fn typed(&self, entity_smart_code: &str) -> Result<TypedField, String> {
        let value = match self.field_type.as_deref() {
            Some(declared) => {
                let field_type = FieldType::parse(declared)
                    .ok_or_else(|| format!("unknown field_type '{}'", declared))?;
                DynamicValue::coerce(&self.value, field_type)?
            }
            None => DynamicValue::infer(&self.value)
                .ok_or_else(|| format!("{} has no value", self.field_name))?,
        };

        Ok(TypedField {
            field_name: self.field_name.clone(),
            value,
            smart_code: self
                .smart_code
                .clone()
                .unwrap_or_else(|| entity_smart_code.to_string()),
        })
    }
}

/// Query of `GET /api/v2/entities`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListEntitiesParams {
    pub entity_type: Option<String>,
    /// `active` when absent; `all` for every status
    pub status: Option<String>,
    #[serde(default)]
    pub include_dynamic_data: bool,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl ListEntitiesParams {
    pub fn to_query(&self, max_rows: usize) -> EntityReadQuery {
        let max_rows = max_rows.max(1);
        EntityReadQuery {
            entity_id: None,
            entity_type: self.entity_type.clone(),
            status: self.status.clone(),
            include_dynamic_data: self.include_dynamic_data,
            limit: self.limit.unwrap_or(max_rows).clamp(1, max_rows),
            offset: self.offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: Value) -> EntityRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_typed_fields_coerce_and_infer() {
        let req = request(json!({
            "entity_type": "customer",
            "entity_name": "Acme",
            "smart_code": "HERA.CRM.CUSTOMER.STANDARD.v1",
            "dynamic_fields": [
                { "field_name": "credit_limit", "value": "5000", "field_type": "number" },
                { "field_name": "onboarded", "value": "2024-03-01" },
                { "field_name": "tier", "value": "gold",
                  "smart_code": "HERA.CRM.CUSTOMER.FIELD.TIER.v1" }
            ]
        }));

        let fields = req.typed_fields().unwrap();
        assert_eq!(fields[0].value, DynamicValue::Number(5000.0));
        assert_eq!(fields[0].smart_code, "HERA.CRM.CUSTOMER.STANDARD.v1");
        assert_eq!(fields[1].value.field_type(), FieldType::Date);
        assert_eq!(fields[2].smart_code, "HERA.CRM.CUSTOMER.FIELD.TIER.v1");
    }

    #[test]
    fn test_bad_smart_code_is_rejected() {
        let req = request(json!({
            "entity_type": "customer",
            "entity_name": "Acme",
            "smart_code": "crm-customer"
        }));

        let err = req.typed_fields().unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("smart_code"));
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let req = request(json!({
            "entity_type": "customer",
            "entity_name": "",
            "smart_code": "HERA.CRM.CUSTOMER.STANDARD.v1"
        }));
        assert!(req.typed_fields().is_err());
    }

    #[test]
    fn test_uncoercible_value_names_the_field() {
        let req = request(json!({
            "entity_type": "customer",
            "entity_name": "Acme",
            "smart_code": "HERA.CRM.CUSTOMER.STANDARD.v1",
            "dynamic_fields": [
                { "field_name": "vip", "value": "perhaps", "field_type": "boolean" }
            ]
        }));

        let err = req.typed_fields().unwrap_err();
        let details = err.details().unwrap();
        assert_eq!(details["fields"][0]["field"], "dynamic_fields[0].value");
    }

    #[test]
    fn test_list_params_cap_limit() {
        let params = ListEntitiesParams {
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(params.to_query(100).limit, 100);
        assert_eq!(params.to_query(100).status, None);
    }
}

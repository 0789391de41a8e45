//! Tool definitions advertised by `tools/list`

use serde_json::{Value, json};

use super::protocol::Tool;

fn schema(properties: Value, required: &[&str]) -> Value {
    let mut properties = properties;
    if let Some(map) = properties.as_object_mut() {
        map.insert(
            "organization_id".to_string(),
            json!({ "type": "string", "format": "uuid", "description": "Owning organization" }),
        );
    }
    let mut required: Vec<&str> = required.to_vec();
    required.insert(0, "organization_id");
    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

/// Every P2P tool
pub fn p2p_tools() -> Vec<Tool> {
    vec![
        Tool {
            name: "p2p.create_supplier",
            description: "Create a supplier entity with optional payment terms, email and tax id",
            input_schema: schema(
                json!({
                    "supplier_name": { "type": "string" },
                    "supplier_code": { "type": "string" },
                    "payment_terms": { "type": "string", "description": "e.g. NET30" },
                    "email": { "type": "string" },
                    "tax_id": { "type": "string" }
                }),
                &["supplier_name"],
            ),
        },
        Tool {
            name: "p2p.create_po",
            description: "Create a purchase order with lines for a supplier",
            input_schema: schema(
                json!({
                    "supplier_id": { "type": "string", "format": "uuid" },
                    "currency": { "type": "string", "default": "USD" },
                    "lines": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "properties": {
                                "description": { "type": "string" },
                                "quantity": { "type": "number", "exclusiveMinimum": 0 },
                                "unit_price": { "type": "number", "minimum": 0 },
                                "product_id": { "type": "string", "format": "uuid" }
                            },
                            "required": ["description", "quantity", "unit_price"]
                        }
                    }
                }),
                &["supplier_id", "lines"],
            ),
        },
        Tool {
            name: "p2p.post_grn",
            description: "Post a goods receipt against purchase order lines",
            input_schema: schema(
                json!({
                    "po_id": { "type": "string", "format": "uuid" },
                    "lines": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "properties": {
                                "line_number": { "type": "integer", "minimum": 1 },
                                "quantity_received": { "type": "number", "exclusiveMinimum": 0 }
                            },
                            "required": ["line_number", "quantity_received"]
                        }
                    }
                }),
                &["po_id", "lines"],
            ),
        },
        Tool {
            name: "p2p.match_invoice",
            description: "Record a supplier invoice and three-way match it against the purchase order and receipts",
            input_schema: schema(
                json!({
                    "po_id": { "type": "string", "format": "uuid" },
                    "invoice_number": { "type": "string" },
                    "invoice_amount": { "type": "number", "minimum": 0 },
                    "tolerance_pct": { "type": "number", "minimum": 0 }
                }),
                &["po_id", "invoice_number", "invoice_amount"],
            ),
        },
        Tool {
            name: "p2p.execute_payment",
            description: "Pay a matched invoice",
            input_schema: schema(
                json!({
                    "invoice_id": { "type": "string", "format": "uuid" },
                    "payment_method": { "type": "string", "default": "bank_transfer" }
                }),
                &["invoice_id"],
            ),
        },
        Tool {
            name: "p2p.get_supplier_status",
            description: "Purchase order, invoice and payment totals for a supplier",
            input_schema: schema(
                json!({ "supplier_id": { "type": "string", "format": "uuid" } }),
                &["supplier_id"],
            ),
        },
        Tool {
            name: "p2p.detect_anomalies",
            description: "Find duplicate invoices, overbilling, unmatched payments and invoices without receipts",
            input_schema: schema(
                json!({ "supplier_id": { "type": "string", "format": "uuid" } }),
                &[],
            ),
        },
        Tool {
            name: "p2p.run_payment_batch",
            description: "Pay matched invoices oldest first, up to an optional total",
            input_schema: schema(
                json!({
                    "max_total": { "type": "number", "exclusiveMinimum": 0 },
                    "dry_run": { "type": "boolean", "default": false }
                }),
                &[],
            ),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tool_requires_organization() {
        let tools = p2p_tools();
        assert_eq!(tools.len(), 8);
        for tool in tools {
            assert_eq!(tool.input_schema["required"][0], "organization_id");
            assert!(tool.input_schema["properties"]["organization_id"].is_object());
        }
    }
}

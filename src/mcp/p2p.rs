//! Procure-to-pay tools over the universal tables
//!
//! | Record | Table | Type |
//! |---|---|---|
//! | supplier | `core_entities` | `supplier` |
//! | purchase order | `universal_transactions` (+ lines) | `purchase_order` |
//! | goods receipt | `universal_transactions` (+ lines) | `goods_receipt` |
//! | invoice | `universal_transactions` | `supplier_invoice` |
//! | payment | `universal_transactions` | `payment` |
//! | payment batch | `universal_transactions` (+ lines) | `payment_batch` |
//!
//! Receipts, invoices and payments point back at their purchase order or
//! invoice through `metadata`; the supplier is always `source_entity_id`.

use anyhow::Result;
use chrono::Utc;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use super::ToolError;
use super::engine::{
    AnomalyInput, BatchInput, InvoiceSummary, MatchInput, P2pEngine, PaymentSummary,
    PurchaseOrderSummary,
};
use crate::core::field::DynamicValue;
use crate::core::model::{TableRecord, Transaction, TransactionLine};
use crate::core::store::{SelectQuery, TableStore};
use crate::core::table::{Row, Table, org_scope};
use crate::procedures::{EntityProcedures, StoreProcedures, UpsertEntity, lifecycle};

pub const PURCHASE_ORDER: &str = "purchase_order";
pub const GOODS_RECEIPT: &str = "goods_receipt";
pub const SUPPLIER_INVOICE: &str = "supplier_invoice";
pub const PAYMENT: &str = "payment";
pub const PAYMENT_BATCH: &str = "payment_batch";

const QUANTITY_EPSILON: f64 = 1e-9;

#[derive(Debug, Deserialize)]
struct CreateSupplierArgs {
    organization_id: Uuid,
    supplier_name: String,
    supplier_code: Option<String>,
    payment_terms: Option<String>,
    email: Option<String>,
    tax_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PoLineArgs {
    description: String,
    quantity: f64,
    unit_price: f64,
    product_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct CreatePoArgs {
    organization_id: Uuid,
    supplier_id: Uuid,
    lines: Vec<PoLineArgs>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GrnLineArgs {
    line_number: u32,
    quantity_received: f64,
}

#[derive(Debug, Deserialize)]
struct PostGrnArgs {
    organization_id: Uuid,
    po_id: Uuid,
    lines: Vec<GrnLineArgs>,
}

#[derive(Debug, Deserialize)]
struct MatchInvoiceArgs {
    organization_id: Uuid,
    po_id: Uuid,
    invoice_number: String,
    invoice_amount: f64,
    tolerance_pct: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ExecutePaymentArgs {
    organization_id: Uuid,
    invoice_id: Uuid,
    payment_method: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SupplierStatusArgs {
    organization_id: Uuid,
    supplier_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct DetectAnomaliesArgs {
    organization_id: Uuid,
    supplier_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct PaymentBatchArgs {
    organization_id: Uuid,
    max_total: Option<f64>,
    #[serde(default)]
    dry_run: bool,
}

fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidParams(e.to_string()))
}

fn require(condition: bool, message: impl FnOnce() -> String) -> Result<(), ToolError> {
    if condition {
        Ok(())
    } else {
        Err(ToolError::InvalidParams(message()))
    }
}

fn short_code(prefix: &str, id: Uuid) -> String {
    let simple = id.simple().to_string();
    format!("{}-{}", prefix, simple[..8].to_uppercase())
}

fn invoice_summary(invoice: &Transaction) -> InvoiceSummary {
    InvoiceSummary {
        id: invoice.id,
        supplier_id: invoice.source_entity_id,
        po_id: invoice.metadata_uuid("po_id"),
        invoice_number: invoice.transaction_code.clone().unwrap_or_default(),
        amount: invoice.total_amount,
        status: invoice.transaction_status.clone().unwrap_or_default(),
        created_at: invoice.created_at.or(invoice.transaction_date),
    }
}

/// The P2P tool set
pub struct P2pTools {
    store: Arc<dyn TableStore>,
    procedures: StoreProcedures,
    engine: Arc<dyn P2pEngine>,
    default_tolerance_pct: f64,
}

impl P2pTools {
    pub fn new(
        store: Arc<dyn TableStore>,
        engine: Arc<dyn P2pEngine>,
        default_tolerance_pct: f64,
    ) -> Self {
        Self {
            procedures: StoreProcedures::new(store.clone()),
            store,
            engine,
            default_tolerance_pct,
        }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Run a tool by name
    pub async fn call(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        tracing::debug!(tool = name, "tool call");
        match name {
            "p2p.create_supplier" => self.create_supplier(parse_args(arguments)?).await,
            "p2p.create_po" => self.create_po(parse_args(arguments)?).await,
            "p2p.post_grn" => self.post_grn(parse_args(arguments)?).await,
            "p2p.match_invoice" => self.match_invoice(parse_args(arguments)?).await,
            "p2p.execute_payment" => self.execute_payment(parse_args(arguments)?).await,
            "p2p.get_supplier_status" => self.get_supplier_status(parse_args(arguments)?).await,
            "p2p.detect_anomalies" => self.detect_anomalies(parse_args(arguments)?).await,
            "p2p.run_payment_batch" => self.run_payment_batch(parse_args(arguments)?).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    async fn insert<R: TableRecord>(&self, record: &R) -> Result<Row> {
        let row = R::TABLE.descriptor().prepare_insert(record.to_row()?, Utc::now());
        self.store.insert(R::TABLE, row).await
    }

    async fn transactions(
        &self,
        organization_id: Uuid,
        transaction_type: &str,
        supplier_id: Option<Uuid>,
    ) -> Result<Vec<Transaction>> {
        let mut query = SelectQuery::default()
            .eq("organization_id", organization_id.to_string())
            .eq("transaction_type", transaction_type);
        if let Some(supplier_id) = supplier_id {
            query = query.eq("source_entity_id", supplier_id.to_string());
        }
        self.store
            .select(Table::UniversalTransactions, &query)
            .await?
            .into_iter()
            .map(Transaction::from_row)
            .collect()
    }

    async fn transaction(
        &self,
        organization_id: Uuid,
        id: Uuid,
        transaction_type: &str,
    ) -> Result<Transaction, ToolError> {
        let query = SelectQuery::default()
            .eq("organization_id", organization_id.to_string())
            .eq("id", id.to_string())
            .eq("transaction_type", transaction_type)
            .with_limit(1);
        let row = self
            .store
            .select(Table::UniversalTransactions, &query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ToolError::Rejected(format!("{} '{}' not found", transaction_type, id))
            })?;
        Ok(Transaction::from_row(row)?)
    }

    async fn lines(&self, organization_id: Uuid, transaction_id: Uuid) -> Result<Vec<TransactionLine>> {
        let query = SelectQuery::default()
            .eq("organization_id", organization_id.to_string())
            .eq("transaction_id", transaction_id.to_string());
        let mut lines = self
            .store
            .select(Table::UniversalTransactionLines, &query)
            .await?
            .into_iter()
            .map(TransactionLine::from_row)
            .collect::<Result<Vec<_>>>()?;
        lines.sort_by_key(|line| line.line_number);
        Ok(lines)
    }

    async fn set_status(&self, organization_id: Uuid, id: Uuid, status: &str) -> Result<()> {
        let table = Table::UniversalTransactions;
        let mut changes = Row::new();
        changes.insert("transaction_status".into(), Value::String(status.to_string()));
        self.store
            .update(
                table,
                &id,
                &org_scope(table, Some(organization_id)),
                table.descriptor().prepare_update(changes, Utc::now()),
            )
            .await?;
        Ok(())
    }

    /// Quantity received so far per PO line number
    async fn received_quantities(
        &self,
        organization_id: Uuid,
        po_id: Uuid,
    ) -> Result<HashMap<u32, f64>> {
        let mut received = HashMap::new();
        for grn in self.transactions(organization_id, GOODS_RECEIPT, None).await? {
            if grn.metadata_uuid("po_id") != Some(po_id) {
                continue;
            }
            for line in self.lines(organization_id, grn.id).await? {
                *received.entry(line.line_number).or_insert(0.0) += line.quantity;
            }
        }
        Ok(received)
    }

    async fn create_supplier(&self, args: CreateSupplierArgs) -> Result<Value, ToolError> {
        require(!args.supplier_name.trim().is_empty(), || {
            "supplier_name must not be empty".to_string()
        })?;
        let org = args.organization_id;

        let supplier_id = self
            .procedures
            .entity_upsert(
                org,
                UpsertEntity {
                    entity_type: "supplier".to_string(),
                    entity_name: args.supplier_name.clone(),
                    smart_code: "HERA.P2P.SUPPLIER.MASTER.v1".to_string(),
                    entity_code: args.supplier_code.clone(),
                    ..Default::default()
                },
            )
            .await?;

        let mut fields = Vec::new();
        for (name, value) in [
            ("payment_terms", args.payment_terms),
            ("email", args.email),
            ("tax_id", args.tax_id),
        ] {
            let Some(value) = value else { continue };
            self.procedures
                .dynamic_data_set(
                    org,
                    supplier_id,
                    name,
                    &DynamicValue::Text(value),
                    &format!("HERA.P2P.SUPPLIER.FIELD.{}.v1", name.to_uppercase()),
                )
                .await?;
            fields.push(name);
        }

        tracing::info!(organization_id = %org, %supplier_id, "supplier created");
        Ok(json!({
            "supplier_id": supplier_id,
            "supplier_name": args.supplier_name,
            "supplier_code": args.supplier_code,
            "dynamic_fields": fields,
        }))
    }

    async fn create_po(&self, args: CreatePoArgs) -> Result<Value, ToolError> {
        let org = args.organization_id;
        require(!args.lines.is_empty(), || "lines must not be empty".to_string())?;
        for (index, line) in args.lines.iter().enumerate() {
            require(line.quantity > 0.0, || format!("lines[{}].quantity must be positive", index))?;
            require(line.unit_price >= 0.0, || {
                format!("lines[{}].unit_price must not be negative", index)
            })?;
        }

        let supplier = lifecycle::find_entity(self.store.as_ref(), org, args.supplier_id)
            .await?
            .filter(|row| row.get("entity_type").and_then(Value::as_str) == Some("supplier"))
            .ok_or_else(|| {
                ToolError::Rejected(format!("supplier '{}' not found", args.supplier_id))
            })?;

        let total: f64 = args.lines.iter().map(|l| l.quantity * l.unit_price).sum();
        let mut po = Transaction::new(org, PURCHASE_ORDER, "HERA.P2P.PO.CREATE.v1");
        po.transaction_code = Some(short_code("PO", po.id));
        po.source_entity_id = Some(args.supplier_id);
        po.total_amount = total;
        po.transaction_currency_code = Some(args.currency.unwrap_or_else(|| "USD".to_string()));
        po.transaction_status = Some("open".to_string());
        self.insert(&po).await?;

        for (index, line) in args.lines.iter().enumerate() {
            self.insert(&TransactionLine {
                id: Uuid::new_v4(),
                organization_id: org,
                transaction_id: po.id,
                line_number: index as u32 + 1,
                smart_code: "HERA.P2P.PO.LINE.v1".to_string(),
                entity_id: line.product_id,
                line_type: Some("item".to_string()),
                description: Some(line.description.clone()),
                quantity: line.quantity,
                unit_amount: line.unit_price,
                line_amount: line.quantity * line.unit_price,
                line_data: None,
            })
            .await?;
        }

        tracing::info!(organization_id = %org, po_id = %po.id, total, "purchase order created");
        Ok(json!({
            "po_id": po.id,
            "po_number": po.transaction_code,
            "supplier_name": supplier.get("entity_name"),
            "total_amount": total,
            "currency": po.transaction_currency_code,
            "line_count": args.lines.len(),
            "status": "open",
        }))
    }

    async fn post_grn(&self, args: PostGrnArgs) -> Result<Value, ToolError> {
        let org = args.organization_id;
        require(!args.lines.is_empty(), || "lines must not be empty".to_string())?;
        for (index, line) in args.lines.iter().enumerate() {
            require(line.quantity_received > 0.0, || {
                format!("lines[{}].quantity_received must be positive", index)
            })?;
        }

        let po = self.transaction(org, args.po_id, PURCHASE_ORDER).await?;
        let po_lines: HashMap<u32, TransactionLine> = self
            .lines(org, po.id)
            .await?
            .into_iter()
            .map(|line| (line.line_number, line))
            .collect();
        let mut received = self.received_quantities(org, po.id).await?;

        let mut receiving: HashMap<u32, f64> = HashMap::new();
        for line in &args.lines {
            let Some(ordered) = po_lines.get(&line.line_number) else {
                return Err(ToolError::Rejected(format!(
                    "line {} is not on purchase order {}",
                    line.line_number, po.id
                )));
            };
            let already = received.get(&line.line_number).copied().unwrap_or(0.0);
            let pending = receiving.entry(line.line_number).or_insert(0.0);
            *pending += line.quantity_received;
            if already + *pending > ordered.quantity + QUANTITY_EPSILON {
                return Err(ToolError::Rejected(format!(
                    "over-receipt on line {}: ordered {}, already received {}, receiving {}",
                    line.line_number, ordered.quantity, already, *pending
                )));
            }
        }

        let mut grn = Transaction::new(org, GOODS_RECEIPT, "HERA.P2P.GRN.POST.v1");
        grn.transaction_code = Some(short_code("GRN", grn.id));
        grn.source_entity_id = po.source_entity_id;
        grn.transaction_currency_code = po.transaction_currency_code.clone();
        grn.transaction_status = Some("posted".to_string());
        grn.metadata = Some(json!({ "po_id": po.id }));
        grn.total_amount = args
            .lines
            .iter()
            .map(|l| l.quantity_received * po_lines[&l.line_number].unit_amount)
            .sum();
        self.insert(&grn).await?;

        for line in &args.lines {
            let ordered = &po_lines[&line.line_number];
            self.insert(&TransactionLine {
                id: Uuid::new_v4(),
                organization_id: org,
                transaction_id: grn.id,
                line_number: line.line_number,
                smart_code: "HERA.P2P.GRN.LINE.v1".to_string(),
                entity_id: ordered.entity_id,
                line_type: Some("receipt".to_string()),
                description: ordered.description.clone(),
                quantity: line.quantity_received,
                unit_amount: ordered.unit_amount,
                line_amount: line.quantity_received * ordered.unit_amount,
                line_data: Some(json!({ "po_line_id": ordered.id })),
            })
            .await?;
            *received.entry(line.line_number).or_insert(0.0) += line.quantity_received;
        }

        let complete = po_lines.values().all(|line| {
            received.get(&line.line_number).copied().unwrap_or(0.0) + QUANTITY_EPSILON
                >= line.quantity
        });
        let po_status = if complete { "received" } else { "partially_received" };
        self.set_status(org, po.id, po_status).await?;

        tracing::info!(organization_id = %org, grn_id = %grn.id, po_id = %po.id, "goods receipt posted");
        Ok(json!({
            "grn_id": grn.id,
            "grn_number": grn.transaction_code,
            "po_id": po.id,
            "received_amount": grn.total_amount,
            "po_status": po_status,
        }))
    }

    async fn match_invoice(&self, args: MatchInvoiceArgs) -> Result<Value, ToolError> {
        let org = args.organization_id;
        require(!args.invoice_number.trim().is_empty(), || {
            "invoice_number must not be empty".to_string()
        })?;
        require(args.invoice_amount >= 0.0, || {
            "invoice_amount must not be negative".to_string()
        })?;
        let tolerance_pct = args.tolerance_pct.unwrap_or(self.default_tolerance_pct);
        require(tolerance_pct >= 0.0, || "tolerance_pct must not be negative".to_string())?;

        let po = self.transaction(org, args.po_id, PURCHASE_ORDER).await?;
        let unit_prices: HashMap<u32, f64> = self
            .lines(org, po.id)
            .await?
            .into_iter()
            .map(|line| (line.line_number, line.unit_amount))
            .collect();
        let received = self.received_quantities(org, po.id).await?;
        let received_quantity: f64 = received.values().sum();
        let received_amount: f64 = received
            .into_iter()
            .map(|(line_number, qty)| qty * unit_prices.get(&line_number).copied().unwrap_or(0.0))
            .sum();

        let input = MatchInput {
            po_id: po.id,
            invoice_number: args.invoice_number.clone(),
            ordered_amount: po.total_amount,
            received_quantity,
            received_amount,
            invoice_amount: args.invoice_amount,
            tolerance_pct,
        };
        let outcome = self.engine.match_invoice(&input).await?;

        let mut invoice = Transaction::new(org, SUPPLIER_INVOICE, "HERA.P2P.INVOICE.MATCH.v1");
        invoice.transaction_code = Some(args.invoice_number.clone());
        invoice.source_entity_id = po.source_entity_id;
        invoice.total_amount = args.invoice_amount;
        invoice.transaction_currency_code = po.transaction_currency_code.clone();
        invoice.transaction_status = Some(outcome.status.as_str().to_string());
        invoice.metadata = Some(json!({
            "po_id": po.id,
            "match": outcome,
            "engine": self.engine.name(),
        }));
        self.insert(&invoice).await?;

        tracing::info!(
            organization_id = %org,
            invoice_id = %invoice.id,
            status = outcome.status.as_str(),
            "invoice matched"
        );
        Ok(json!({
            "invoice_id": invoice.id,
            "invoice_number": args.invoice_number,
            "po_id": po.id,
            "status": outcome.status,
            "ordered_amount": input.ordered_amount,
            "received_quantity": input.received_quantity,
            "received_amount": input.received_amount,
            "invoice_amount": input.invoice_amount,
            "variance_pct": outcome.variance_pct,
            "reasons": outcome.reasons,
        }))
    }

    /// Record a payment for a matched invoice and mark it paid
    async fn pay_invoice(
        &self,
        organization_id: Uuid,
        invoice: &Transaction,
        payment_method: &str,
    ) -> Result<Transaction> {
        let mut payment = Transaction::new(organization_id, PAYMENT, "HERA.P2P.PAYMENT.EXECUTE.v1");
        payment.transaction_code = Some(short_code("PAY", payment.id));
        payment.source_entity_id = invoice.source_entity_id;
        payment.total_amount = invoice.total_amount;
        payment.transaction_currency_code = invoice.transaction_currency_code.clone();
        payment.transaction_status = Some("completed".to_string());
        payment.metadata = Some(json!({
            "invoice_id": invoice.id,
            "invoice_number": invoice.transaction_code,
            "po_id": invoice.metadata_uuid("po_id"),
            "payment_method": payment_method,
        }));
        self.insert(&payment).await?;
        self.set_status(organization_id, invoice.id, "paid").await?;
        Ok(payment)
    }

    async fn execute_payment(&self, args: ExecutePaymentArgs) -> Result<Value, ToolError> {
        let org = args.organization_id;
        let invoice = self.transaction(org, args.invoice_id, SUPPLIER_INVOICE).await?;
        let status = invoice.transaction_status.as_deref().unwrap_or_default();
        if status != "matched" {
            return Err(ToolError::Rejected(format!(
                "invoice {} is {}; only matched invoices can be paid",
                invoice.id, status
            )));
        }

        let method = args
            .payment_method
            .unwrap_or_else(|| "bank_transfer".to_string());
        let payment = self.pay_invoice(org, &invoice, &method).await?;

        tracing::info!(organization_id = %org, payment_id = %payment.id, invoice_id = %invoice.id, "payment executed");
        Ok(json!({
            "payment_id": payment.id,
            "payment_number": payment.transaction_code,
            "invoice_id": invoice.id,
            "amount": payment.total_amount,
            "payment_method": method,
            "invoice_status": "paid",
        }))
    }

    async fn get_supplier_status(&self, args: SupplierStatusArgs) -> Result<Value, ToolError> {
        let org = args.organization_id;
        let supplier = lifecycle::find_entity(self.store.as_ref(), org, args.supplier_id)
            .await?
            .ok_or_else(|| {
                ToolError::Rejected(format!("supplier '{}' not found", args.supplier_id))
            })?;

        let supplier_id = Some(args.supplier_id);
        let orders = self.transactions(org, PURCHASE_ORDER, supplier_id).await?;
        let invoices = self.transactions(org, SUPPLIER_INVOICE, supplier_id).await?;
        let payments = self.transactions(org, PAYMENT, supplier_id).await?;

        let count_status = |status: &str| {
            invoices
                .iter()
                .filter(|i| i.transaction_status.as_deref() == Some(status))
                .count()
        };
        let outstanding: f64 = invoices
            .iter()
            .filter(|i| i.transaction_status.as_deref() != Some("paid"))
            .map(|i| i.total_amount)
            .sum();
        let paid: f64 = payments.iter().map(|p| p.total_amount).sum();

        Ok(json!({
            "supplier_id": args.supplier_id,
            "supplier_name": supplier.get("entity_name"),
            "status": supplier.get("status"),
            "purchase_orders": orders.len(),
            "ordered_amount": orders.iter().map(|o| o.total_amount).sum::<f64>(),
            "invoices": {
                "total": invoices.len(),
                "matched": count_status("matched"),
                "exception": count_status("exception"),
                "paid": count_status("paid"),
            },
            "payments": payments.len(),
            "outstanding_amount": outstanding,
            "paid_amount": paid,
        }))
    }

    async fn detect_anomalies(&self, args: DetectAnomaliesArgs) -> Result<Value, ToolError> {
        let org = args.organization_id;
        let invoices = self
            .transactions(org, SUPPLIER_INVOICE, args.supplier_id)
            .await?;
        let payments = self.transactions(org, PAYMENT, args.supplier_id).await?;
        let orders = self
            .transactions(org, PURCHASE_ORDER, args.supplier_id)
            .await?;
        let received: HashSet<Uuid> = self
            .transactions(org, GOODS_RECEIPT, args.supplier_id)
            .await?
            .iter()
            .filter_map(|grn| grn.metadata_uuid("po_id"))
            .collect();

        let input = AnomalyInput {
            invoices: invoices.iter().map(invoice_summary).collect(),
            payments: payments
                .iter()
                .map(|p| PaymentSummary {
                    id: p.id,
                    invoice_id: p.metadata_uuid("invoice_id"),
                    amount: p.total_amount,
                })
                .collect(),
            purchase_orders: orders
                .iter()
                .map(|po| PurchaseOrderSummary {
                    id: po.id,
                    supplier_id: po.source_entity_id,
                    total: po.total_amount,
                    has_receipt: received.contains(&po.id),
                })
                .collect(),
        };
        let anomalies = self.engine.detect_anomalies(&input).await?;

        if !anomalies.is_empty() {
            tracing::warn!(organization_id = %org, count = anomalies.len(), "p2p anomalies detected");
        }
        Ok(json!({
            "count": anomalies.len(),
            "anomalies": anomalies,
            "engine": self.engine.name(),
        }))
    }

    async fn run_payment_batch(&self, args: PaymentBatchArgs) -> Result<Value, ToolError> {
        let org = args.organization_id;
        if let Some(cap) = args.max_total {
            require(cap > 0.0, || "max_total must be positive".to_string())?;
        }

        let invoices = self.transactions(org, SUPPLIER_INVOICE, None).await?;
        let plan = self
            .engine
            .plan_payment_batch(&BatchInput {
                invoices: invoices
                    .iter()
                    .map(invoice_summary)
                    .filter(|i| i.status == "matched")
                    .collect(),
                max_total: args.max_total,
            })
            .await?;

        if args.dry_run {
            return Ok(json!({ "dry_run": true, "plan": plan }));
        }

        let by_id: HashMap<Uuid, &Transaction> = invoices.iter().map(|i| (i.id, i)).collect();
        let mut payments = Vec::new();
        for invoice_id in plan.invoice_ids() {
            let Some(invoice) = by_id.get(&invoice_id) else {
                return Err(ToolError::Rejected(format!(
                    "planned invoice '{}' does not exist",
                    invoice_id
                )));
            };
            if invoice.transaction_status.as_deref() != Some("matched") {
                return Err(ToolError::Rejected(format!(
                    "planned invoice '{}' is not matched",
                    invoice_id
                )));
            }
            let payment = self.pay_invoice(org, invoice, "batch").await?;
            payments.push((invoice_id, payment));
        }

        if payments.is_empty() {
            return Ok(json!({
                "dry_run": false,
                "batch_id": null,
                "payments": [],
                "total": 0.0,
                "skipped": plan.skipped,
            }));
        }

        let mut batch = Transaction::new(org, PAYMENT_BATCH, "HERA.P2P.PAYMENT.BATCH.v1");
        batch.transaction_code = Some(short_code("BATCH", batch.id));
        batch.total_amount = plan.total;
        batch.transaction_status = Some("completed".to_string());
        batch.metadata = Some(json!({
            "invoice_count": payments.len(),
            "max_total": args.max_total,
            "engine": self.engine.name(),
        }));
        self.insert(&batch).await?;

        for (index, (invoice_id, payment)) in payments.iter().enumerate() {
            self.insert(&TransactionLine {
                id: Uuid::new_v4(),
                organization_id: org,
                transaction_id: batch.id,
                line_number: index as u32 + 1,
                smart_code: "HERA.P2P.PAYMENT.BATCH.LINE.v1".to_string(),
                entity_id: payment.source_entity_id,
                line_type: Some("payment".to_string()),
                description: payment.transaction_code.clone(),
                quantity: 1.0,
                unit_amount: payment.total_amount,
                line_amount: payment.total_amount,
                line_data: Some(json!({ "payment_id": payment.id, "invoice_id": invoice_id })),
            })
            .await?;
        }

        tracing::info!(organization_id = %org, batch_id = %batch.id, count = payments.len(), "payment batch executed");
        Ok(json!({
            "dry_run": false,
            "batch_id": batch.id,
            "payments": payments
                .iter()
                .map(|(invoice_id, p)| json!({
                    "payment_id": p.id,
                    "invoice_id": invoice_id,
                    "amount": p.total_amount,
                }))
                .collect::<Vec<_>>(),
            "total": plan.total,
            "skipped": plan.skipped,
        }))
    }
}

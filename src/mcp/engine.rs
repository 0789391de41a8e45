//! Procure-to-pay decision logic behind the MCP tools
//!
//! The tools gather the records; a [`P2pEngine`] decides. [`LocalP2pEngine`]
//! applies the rules in-process. With the `edge-functions` feature the same
//! inputs can be posted to hosted functions instead.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Three-way match input: what was ordered, received and invoiced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchInput {
    pub po_id: Uuid,
    pub invoice_number: String,
    pub ordered_amount: f64,
    /// Total quantity on goods receipts, whatever its price
    #[serde(default)]
    pub received_quantity: f64,
    pub received_amount: f64,
    pub invoice_amount: f64,
    pub tolerance_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    Exception,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Matched => "matched",
            MatchStatus::Exception => "exception",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub status: MatchStatus,
    /// Invoice amount against the ordered amount, in percent
    pub variance_pct: f64,
    pub reasons: Vec<String>,
}

/// An invoice as seen by the anomaly and batch rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub id: Uuid,
    pub supplier_id: Option<Uuid>,
    pub po_id: Option<Uuid>,
    pub invoice_number: String,
    pub amount: f64,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderSummary {
    pub id: Uuid,
    pub supplier_id: Option<Uuid>,
    pub total: f64,
    pub has_receipt: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnomalyInput {
    pub invoices: Vec<InvoiceSummary>,
    pub payments: Vec<PaymentSummary>,
    pub purchase_orders: Vec<PurchaseOrderSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    DuplicateInvoice,
    InvoiceExceedsPo,
    PaymentWithoutMatch,
    PoWithoutReceipt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severity: String,
    pub message: String,
    pub record_ids: Vec<Uuid>,
}

impl Anomaly {
    fn new(kind: AnomalyKind, severity: &str, message: String, record_ids: Vec<Uuid>) -> Self {
        Self {
            kind,
            severity: severity.to_string(),
            message,
            record_ids,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchInput {
    pub invoices: Vec<InvoiceSummary>,
    pub max_total: Option<f64>,
}

/// Invoices selected for one supplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierBatch {
    pub supplier_id: Option<Uuid>,
    pub invoice_ids: Vec<Uuid>,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentPlan {
    pub groups: Vec<SupplierBatch>,
    pub total: f64,
    /// Matched invoices left out by the total cap
    pub skipped: Vec<Uuid>,
}

impl PaymentPlan {
    pub fn invoice_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.groups.iter().flat_map(|g| g.invoice_ids.iter().copied())
    }
}

/// Decides matches, anomalies and payment batches
#[async_trait]
pub trait P2pEngine: Send + Sync {
    async fn match_invoice(&self, input: &MatchInput) -> Result<MatchOutcome>;

    async fn detect_anomalies(&self, input: &AnomalyInput) -> Result<Vec<Anomaly>>;

    async fn plan_payment_batch(&self, input: &BatchInput) -> Result<PaymentPlan>;

    fn name(&self) -> &'static str;
}

/// In-process rules
#[derive(Debug, Clone)]
pub struct LocalP2pEngine {
    /// Tolerance used by the anomaly rules
    tolerance_pct: f64,
}

impl LocalP2pEngine {
    pub fn new(tolerance_pct: f64) -> Self {
        Self { tolerance_pct }
    }
}

impl Default for LocalP2pEngine {
    fn default() -> Self {
        Self::new(2.0)
    }
}

fn within(amount: f64, reference: f64, tolerance_pct: f64) -> bool {
    (amount - reference).abs() <= reference.abs() * tolerance_pct / 100.0 + f64::EPSILON
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[async_trait]
impl P2pEngine for LocalP2pEngine {
    async fn match_invoice(&self, input: &MatchInput) -> Result<MatchOutcome> {
        let tolerance = input.tolerance_pct;
        let upper = |reference: f64| reference * (1.0 + tolerance / 100.0);
        let lower = |reference: f64| reference * (1.0 - tolerance / 100.0);
        let mut reasons = Vec::new();
        let has_receipt = input.received_quantity > 0.0;

        if !has_receipt {
            reasons.push("no_goods_receipt".to_string());
        }
        if input.invoice_amount > upper(input.ordered_amount) {
            reasons.push("amount_exceeds_po".to_string());
        } else if input.invoice_amount < lower(input.ordered_amount) {
            reasons.push("amount_below_po".to_string());
        }
        if has_receipt && input.invoice_amount > upper(input.received_amount) {
            reasons.push("amount_exceeds_received".to_string());
        }

        let matched = reasons.is_empty()
            && within(input.invoice_amount, input.ordered_amount, tolerance)
            && within(input.invoice_amount, input.received_amount, tolerance);
        if !matched && reasons.is_empty() {
            reasons.push("amount_below_received".to_string());
        }

        let variance_pct = if input.ordered_amount == 0.0 {
            0.0
        } else {
            round2((input.invoice_amount - input.ordered_amount) / input.ordered_amount * 100.0)
        };

        Ok(MatchOutcome {
            status: if matched {
                MatchStatus::Matched
            } else {
                MatchStatus::Exception
            },
            variance_pct,
            reasons,
        })
    }

    async fn detect_anomalies(&self, input: &AnomalyInput) -> Result<Vec<Anomaly>> {
        let mut anomalies = Vec::new();

        let mut by_number: IndexMap<(Option<Uuid>, &str), Vec<Uuid>> = IndexMap::new();
        for invoice in &input.invoices {
            by_number
                .entry((invoice.supplier_id, invoice.invoice_number.as_str()))
                .or_default()
                .push(invoice.id);
        }
        for ((_, number), ids) in by_number.into_iter().filter(|(_, ids)| ids.len() > 1) {
            anomalies.push(Anomaly::new(
                AnomalyKind::DuplicateInvoice,
                "high",
                format!("invoice number {} recorded {} times", number, ids.len()),
                ids,
            ));
        }

        let orders: HashMap<Uuid, &PurchaseOrderSummary> =
            input.purchase_orders.iter().map(|po| (po.id, po)).collect();
        for invoice in &input.invoices {
            let Some(po) = invoice.po_id.and_then(|id| orders.get(&id)) else {
                continue;
            };
            if invoice.amount > po.total * (1.0 + self.tolerance_pct / 100.0) {
                anomalies.push(Anomaly::new(
                    AnomalyKind::InvoiceExceedsPo,
                    "high",
                    format!(
                        "invoice {} for {:.2} exceeds purchase order total {:.2}",
                        invoice.invoice_number, invoice.amount, po.total
                    ),
                    vec![invoice.id, po.id],
                ));
            }
        }

        let paid: HashSet<Uuid> = input
            .invoices
            .iter()
            .filter(|i| i.status == "paid")
            .map(|i| i.id)
            .collect();
        for payment in &input.payments {
            let settled = payment.invoice_id.is_some_and(|id| paid.contains(&id));
            if !settled {
                let mut ids = vec![payment.id];
                ids.extend(payment.invoice_id);
                anomalies.push(Anomaly::new(
                    AnomalyKind::PaymentWithoutMatch,
                    "high",
                    format!("payment of {:.2} has no matched, paid invoice", payment.amount),
                    ids,
                ));
            }
        }

        let invoiced: HashSet<Uuid> = input.invoices.iter().filter_map(|i| i.po_id).collect();
        for po in &input.purchase_orders {
            if invoiced.contains(&po.id) && !po.has_receipt {
                anomalies.push(Anomaly::new(
                    AnomalyKind::PoWithoutReceipt,
                    "medium",
                    "purchase order invoiced before any goods receipt".to_string(),
                    vec![po.id],
                ));
            }
        }

        Ok(anomalies)
    }

    async fn plan_payment_batch(&self, input: &BatchInput) -> Result<PaymentPlan> {
        let mut candidates: Vec<&InvoiceSummary> = input
            .invoices
            .iter()
            .filter(|i| i.status == "matched")
            .collect();
        // Oldest first; undated invoices go last
        candidates.sort_by_key(|i| (i.created_at.is_none(), i.created_at));

        let mut plan = PaymentPlan::default();
        let mut groups: IndexMap<Option<Uuid>, SupplierBatch> = IndexMap::new();
        for invoice in candidates {
            if input
                .max_total
                .is_some_and(|cap| plan.total + invoice.amount > cap + f64::EPSILON)
            {
                plan.skipped.push(invoice.id);
                continue;
            }
            plan.total += invoice.amount;
            let group = groups
                .entry(invoice.supplier_id)
                .or_insert_with(|| SupplierBatch {
                    supplier_id: invoice.supplier_id,
                    invoice_ids: Vec::new(),
                    total: 0.0,
                });
            group.invoice_ids.push(invoice.id);
            group.total += invoice.amount;
        }

        plan.total = round2(plan.total);
        plan.groups = groups.into_values().collect();
        Ok(plan)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

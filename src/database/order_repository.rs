use crate::database::error::LedgerResult;
use crate::payments::types::{CustomerDetails, Money};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Initiated,
    Paid,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Initiated => "initiated",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Initiated)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which path last wrote the status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    Initiation,
    /// Server-to-server IPN, validated against the gateway
    Callback,
    /// Browser redirect; can be forged by the customer
    Redirect,
}

/// Order entity, keyed by transaction id in the repository
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRecord {
    pub status: OrderStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bigdecimal::serde::json_num_option"
    )]
    pub amount: Option<BigDecimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_response: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipn_payload: Option<JsonValue>,
    pub status_source: StatusSource,
    /// Set while the status comes from an unauthenticated redirect
    pub provisional: bool,
    #[serde(
        rename = "createdAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        rename = "updatedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl OrderRecord {
    /// Fresh order right after the gateway handed out a payment page.
    pub fn initiated(
        amount: Money,
        customer: CustomerDetails,
        meta: JsonValue,
        gateway_response: JsonValue,
    ) -> Self {
        Self {
            status: OrderStatus::Initiated,
            amount: Some(amount.amount),
            currency: Some(amount.currency),
            customer: Some(customer),
            meta: Some(meta),
            gateway_response: Some(gateway_response),
            validated: None,
            ipn_payload: None,
            status_source: StatusSource::Initiation,
            provisional: false,
            created_at: Some(Utc::now()),
            updated_at: None,
        }
    }

    /// Bare record for a transaction id this process has never seen.
    pub fn unknown(status: OrderStatus, source: StatusSource) -> Self {
        Self {
            status,
            amount: None,
            currency: None,
            customer: None,
            meta: None,
            gateway_response: None,
            validated: None,
            ipn_payload: None,
            status_source: source,
            provisional: matches!(source, StatusSource::Redirect),
            created_at: None,
            updated_at: Some(Utc::now()),
        }
    }
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn get(&self, tran_id: &str) -> LedgerResult<Option<OrderRecord>>;

    /// Insert or fully replace the record stored under `tran_id`.
    async fn put(&self, tran_id: &str, record: OrderRecord) -> LedgerResult<()>;

    /// All orders, oldest first.
    async fn list(&self) -> LedgerResult<Vec<(String, OrderRecord)>>;
}

/// Process-local ledger. The lock only guards the map itself; callers doing
/// get-then-put for the same id can still interleave, and the last put wins.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, OrderRecord>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn get(&self, tran_id: &str) -> LedgerResult<Option<OrderRecord>> {
        Ok(self.orders.read().await.get(tran_id).cloned())
    }

    async fn put(&self, tran_id: &str, record: OrderRecord) -> LedgerResult<()> {
        self.orders.write().await.insert(tran_id.to_string(), record);
        Ok(())
    }

    async fn list(&self) -> LedgerResult<Vec<(String, OrderRecord)>> {
        let mut orders: Vec<(String, OrderRecord)> = self
            .orders
            .read()
            .await
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect();
        orders.sort_by(|(a_id, a), (b_id, b)| {
            let a_time = a.created_at.or(a.updated_at);
            let b_time = b.created_at.or(b.updated_at);
            a_time.cmp(&b_time).then_with(|| a_id.cmp(b_id))
        });
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initiated() -> OrderRecord {
        OrderRecord::initiated(
            Money {
                amount: BigDecimal::from(100),
                currency: "BDT".to_string(),
            },
            CustomerDetails::default(),
            serde_json::json!({}),
            serde_json::json!({"status": "SUCCESS"}),
        )
    }

    #[tokio::test]
    async fn put_then_get_returns_record() {
        let repo = InMemoryOrderRepository::new();
        assert!(repo.get("ORD_1").await.unwrap().is_none());

        repo.put("ORD_1", initiated()).await.unwrap();
        let stored = repo.get("ORD_1").await.unwrap().expect("order should exist");
        assert_eq!(stored.status, OrderStatus::Initiated);
        assert_eq!(stored.amount, Some(BigDecimal::from(100)));
    }

    #[tokio::test]
    async fn later_put_replaces_earlier_one() {
        let repo = InMemoryOrderRepository::new();
        repo.put("ORD_1", initiated()).await.unwrap();
        repo.put(
            "ORD_1",
            OrderRecord::unknown(OrderStatus::Cancelled, StatusSource::Redirect),
        )
        .await
        .unwrap();

        let stored = repo.get("ORD_1").await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert!(stored.amount.is_none());
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_is_ordered_oldest_first() {
        let repo = InMemoryOrderRepository::new();
        let mut older = initiated();
        older.created_at = Some(Utc::now() - chrono::Duration::seconds(60));
        repo.put("ORD_B", initiated()).await.unwrap();
        repo.put("ORD_A", older).await.unwrap();

        let ids: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["ORD_A".to_string(), "ORD_B".to_string()]);
    }

    #[test]
    fn record_serializes_with_camel_case_timestamps() {
        let record = OrderRecord::unknown(OrderStatus::Cancelled, StatusSource::Redirect);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "cancelled");
        assert_eq!(json["status_source"], "redirect");
        assert_eq!(json["provisional"], true);
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("createdAt").is_none());
        assert!(json.get("amount").is_none());
    }

    #[test]
    fn amount_serializes_as_json_number() {
        let json = serde_json::to_value(initiated()).unwrap();
        assert_eq!(json["amount"], 100);
        assert!(json["amount"].is_number());

        let mut record = initiated();
        record.amount = Some("250.50".parse().unwrap());
        let text = serde_json::to_string(&record).unwrap();
        assert!(text.contains(r#""amount":250.50"#), "{}", text);
        let back: OrderRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back.amount, record.amount);
    }
}

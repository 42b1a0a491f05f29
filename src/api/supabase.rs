use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::BotError;
use crate::models::{AuditEvent, TradeExecution, TradingSignal};
use crate::persistence::{SignalFilter, SignalStore};
use crate::Result;

const REST_PATH: &str = "/rest/v1";

const SIGNALS_TABLE: &str = "trading_signals";
const EXECUTIONS_TABLE: &str = "trade_executions";
const AUDIT_TABLE: &str = "security_audit_log";

/// Client for the Supabase REST (PostgREST) API
///
/// Authenticates with the service role key so row-level security does not
/// hide other users' signals.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

#[derive(Debug, Deserialize)]
struct OrderIdRow {
    order_id: Option<String>,
}

impl SupabaseClient {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        }
    }

    fn table(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!("{}{}/{}", self.base_url, REST_PATH, table);
        self.client
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn check(response: Response, context: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(BotError::Backend(format!("{} failed ({}): {}", context, status, body)))
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl SignalStore for SupabaseClient {
    /// Endpoint: GET /rest/v1/trading_signals?signal_type=in.(BUY,SELL)&confidence_score=gte.{min}&executed=is.null&expires_at=gte.{now}
    async fn fetch_pending_signals(
        &self,
        filter: &SignalFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<TradingSignal>> {
        let response = self
            .table(Method::GET, SIGNALS_TABLE)
            .query(&[
                ("select", "*".to_string()),
                ("signal_type", format!("in.({})", filter.signal_type_list())),
                ("confidence_score", format!("gte.{}", filter.min_confidence)),
                ("executed", "is.null".to_string()),
                ("expires_at", format!("gte.{}", timestamp(now))),
            ])
            .send()
            .await?;

        let signals: Vec<TradingSignal> = Self::check(response, "fetch signals")
            .await?
            .json()
            .await?;

        Ok(signals)
    }

    async fn insert_execution(&self, execution: &TradeExecution) -> Result<()> {
        let response = self
            .table(Method::POST, EXECUTIONS_TABLE)
            .header("Prefer", "return=minimal")
            .json(execution)
            .send()
            .await?;

        Self::check(response, "insert trade execution").await?;
        Ok(())
    }

    async fn mark_signal_executed(
        &self,
        signal_id: Uuid,
        executed_at: DateTime<Utc>,
    ) -> Result<()> {
        let response = self
            .table(Method::PATCH, SIGNALS_TABLE)
            .query(&[
                ("id", format!("eq.{}", signal_id)),
                ("executed", "is.null".to_string()),
            ])
            .header("Prefer", "return=minimal")
            .json(&json!({
                "executed": true,
                "executed_at": timestamp(executed_at),
            }))
            .send()
            .await?;

        Self::check(response, "mark signal executed").await?;
        Ok(())
    }

    async fn executed_order_ids(&self, order_ids: &[String]) -> Result<Vec<String>> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .table(Method::GET, EXECUTIONS_TABLE)
            .query(&[
                ("select", "order_id".to_string()),
                ("status", "eq.executed".to_string()),
                ("order_id", format!("in.({})", order_ids.join(","))),
            ])
            .send()
            .await?;

        let rows: Vec<OrderIdRow> = Self::check(response, "list executed orders")
            .await?
            .json()
            .await?;

        Ok(rows.into_iter().filter_map(|row| row.order_id).collect())
    }

    async fn update_position_pnl(
        &self,
        order_id: &str,
        current_price: f64,
        profit_loss: f64,
    ) -> Result<()> {
        let response = self
            .table(Method::PATCH, EXECUTIONS_TABLE)
            .query(&[("order_id", format!("eq.{}", order_id))])
            .header("Prefer", "return=minimal")
            .json(&json!({
                "current_price": current_price,
                "profit_loss": profit_loss,
                "updated_at": timestamp(Utc::now()),
            }))
            .send()
            .await?;

        Self::check(response, "update position").await?;
        Ok(())
    }

    async fn insert_audit_event(&self, event: &AuditEvent) -> Result<()> {
        let response = self
            .table(Method::POST, AUDIT_TABLE)
            .header("Prefer", "return=minimal")
            .json(event)
            .send()
            .await?;

        Self::check(response, "insert audit event").await?;
        Ok(())
    }
}

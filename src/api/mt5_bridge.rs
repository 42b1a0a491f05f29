use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::error::BotError;
use crate::terminal::{
    AccountInfo, OpenPosition, OrderRequest, OrderResult, Terminal, TerminalCredentials, Tick,
};
use crate::Result;

/// Client for a local MT5 bridge gateway
///
/// The MetaTrader 5 terminal only exposes its API in-process, so a small
/// gateway running next to the terminal relays these JSON endpoints:
///
/// - `POST /login`
/// - `POST /symbols/{symbol}/select`
/// - `GET  /symbols/{symbol}/tick` (404 when the terminal has no tick)
/// - `POST /orders`
/// - `GET  /positions`
/// - `POST /shutdown`
#[derive(Clone)]
pub struct Mt5BridgeClient {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    login: u64,
    password: &'a str,
    server: &'a str,
}

#[derive(Debug, Deserialize)]
struct SelectResponse {
    selected: bool,
}

impl Mt5BridgeClient {
    pub fn new(base_url: &str, api_token: Option<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BotError::Config(format!("invalid bridge url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BotError::Config(format!("invalid bridge url {}", base_url)));
        }

        Ok(Self {
            client: Client::new(),
            base_url,
            api_token,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self.client.request(method, self.endpoint(segments));
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(response: Response, context: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(BotError::Terminal(format!("{} failed ({}): {}", context, status, body)))
    }
}

#[async_trait]
impl Terminal for Mt5BridgeClient {
    async fn connect(&self, credentials: &TerminalCredentials) -> Result<AccountInfo> {
        let response = self
            .request(Method::POST, &["login"])
            .json(&LoginRequest {
                login: credentials.login,
                password: &credentials.password,
                server: &credentials.server,
            })
            .send()
            .await
            .map_err(|e| BotError::Connection(format!("bridge unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Connection(format!(
                "login rejected ({}): {}",
                status, body
            )));
        }

        let account: AccountInfo = response.json().await?;
        Ok(account)
    }

    async fn symbol_select(&self, symbol: &str) -> Result<bool> {
        let response = self
            .request(Method::POST, &["symbols", symbol, "select"])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        let body: SelectResponse = Self::check(response, "symbol_select")
            .await?
            .json()
            .await?;
        Ok(body.selected)
    }

    async fn symbol_tick(&self, symbol: &str) -> Result<Option<Tick>> {
        let response = self
            .request(Method::GET, &["symbols", symbol, "tick"])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let tick: Tick = Self::check(response, "symbol_info_tick")
            .await?
            .json()
            .await?;
        Ok(Some(tick))
    }

    async fn order_send(&self, request: &OrderRequest) -> Result<OrderResult> {
        let response = self
            .request(Method::POST, &["orders"])
            .json(request)
            .send()
            .await?;

        let result: OrderResult = Self::check(response, "order_send").await?.json().await?;
        Ok(result)
    }

    async fn positions(&self) -> Result<Vec<OpenPosition>> {
        let response = self.request(Method::GET, &["positions"]).send().await?;

        let positions: Vec<OpenPosition> = Self::check(response, "positions_get")
            .await?
            .json()
            .await?;
        Ok(positions)
    }

    async fn shutdown(&self) -> Result<()> {
        let response = self.request(Method::POST, &["shutdown"]).send().await?;
        Self::check(response, "shutdown").await?;
        Ok(())
    }
}

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use time::Date;

use crate::backend::{AuthBackend, DiaryBackend, StatsBackend};
use crate::domain::{
    AnalysisResult, DiaryEntryDetail, DiaryEntrySummary, GuestLogin, KeywordStat, LogId, MoodStat,
    NewLogRequest,
};
use crate::envelope::ApiEnvelope;
use crate::error::{ApiError, ApiResult};
use crate::session::SessionContext;

/// HTTP adapter for the Prism backend.
///
/// Every request goes to `<base_url><path>`, carries the bearer token of the
/// shared [`SessionContext`] when there is one, and has its envelope unwrapped.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<SessionContext>,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Arc<SessionContext>) -> ApiResult<Self> {
        let parsed = Url::parse(base_url.trim())
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        let client = Client::builder()
            .build()
            .map_err(|e| ApiError::Network {
                call: "client setup".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        let raw = format!("{}{}", self.base_url, path);
        Url::parse(&raw).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.current_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, call: &str) -> ApiResult<Response> {
        tracing::debug!(call, "calling backend");

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ApiError::Network {
                call: call.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(call, "backend rejected the access token, clearing session");
            if let Err(e) = self.session.logout() {
                tracing::warn!(error = %e, "failed to clear persisted session");
            }
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|envelope| envelope.message().map(str::to_string))
                .unwrap_or_else(|| status.to_string());
            return Err(ApiError::Backend {
                call: call.to_string(),
                status: Some(status.as_u16()),
                message,
            });
        }

        Ok(response)
    }

    async fn get_data<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        call: &str,
    ) -> ApiResult<T> {
        let response = self.send(request, call).await?;
        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|e| ApiError::parse(call, e))?;
        envelope.into_result(call)
    }
}

#[async_trait]
impl DiaryBackend for ApiClient {
    #[tracing::instrument(skip(self, content))]
    async fn analyze(&self, date: Date, content: &str) -> ApiResult<AnalysisResult> {
        self.get_data(
            self.client
                .post(self.endpoint("/logs")?)
                .json(&NewLogRequest { date, content }),
            "POST /logs",
        )
        .await
    }

    async fn generate_image(&self, log_id: LogId) -> ApiResult<LogId> {
        self.get_data(
            self.client
                .post(self.endpoint(&format!("/logs/{}/image", log_id))?),
            "POST /logs/:id/image",
        )
        .await
    }

    async fn list_month(&self, year: i32, month: u8) -> ApiResult<Vec<DiaryEntrySummary>> {
        self.get_data(
            self.client
                .get(self.endpoint("/logs/monthly")?)
                .query(&[("year", year.to_string()), ("month", month.to_string())]),
            "GET /logs/monthly",
        )
        .await
    }

    async fn get_detail(&self, log_id: LogId) -> ApiResult<DiaryEntryDetail> {
        self.get_data(
            self.client
                .get(self.endpoint(&format!("/logs/{}", log_id))?),
            "GET /logs/:id",
        )
        .await
    }

    async fn delete(&self, log_id: LogId) -> ApiResult<()> {
        const CALL: &str = "DELETE /logs/:id";

        let response = self
            .send(
                self.client
                    .delete(self.endpoint(&format!("/logs/{}", log_id))?),
                CALL,
            )
            .await?;

        // 204 No Content, or an envelope carrying only the success flag.
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::parse(CALL, e))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        serde_json::from_slice::<ApiEnvelope<serde_json::Value>>(&body)
            .map_err(|e| ApiError::parse(CALL, e))?
            .into_unit(CALL)
    }

    async fn regenerate(&self, log_id: LogId) -> ApiResult<AnalysisResult> {
        self.get_data(
            self.client
                .post(self.endpoint(&format!("/logs/{}/regenerate", log_id))?),
            "POST /logs/:id/regenerate",
        )
        .await
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn guest_login(&self) -> ApiResult<GuestLogin> {
        const CALL: &str = "GET /auth/guest";

        self.send(self.client.get(self.endpoint("/auth/guest")?), CALL)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::parse(CALL, e))
    }
}

#[async_trait]
impl StatsBackend for ApiClient {
    async fn keyword_stats(
        &self,
        year: Option<i32>,
        month: Option<u8>,
    ) -> ApiResult<Vec<KeywordStat>> {
        let mut params = Vec::new();
        if let Some(year) = year {
            params.push(("year", year.to_string()));
        }
        if let Some(month) = month {
            params.push(("month", month.to_string()));
        }

        self.get_data(
            self.client
                .get(self.endpoint("/admin/stats/keywords")?)
                .query(&params),
            "GET /admin/stats/keywords",
        )
        .await
    }

    async fn mood_stats(&self, year: Option<i32>) -> ApiResult<Vec<MoodStat>> {
        let params: Vec<(&str, String)> = year
            .map(|year| vec![("year", year.to_string())])
            .unwrap_or_default();

        self.get_data(
            self.client
                .get(self.endpoint("/admin/stats/mood")?)
                .query(&params),
            "GET /admin/stats/mood",
        )
        .await
    }
}

//! Fathom external API client used by the provider sync and the team listing.

use super::{backoff_policy, MeetingProvider};
use crate::call_event::{CallEvent, IngestSource, RecordedBy};
use crate::error::{DomainErrorKind, Error, ExternalErrorKind};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use entity_api::json_types::Participant;
use log::*;
use meeting_auth::api_key::{ApiKeyAuth, ApiKeyProvider};
use meeting_auth::http::{AuthenticatedClient, AuthenticatedClientBuilder};
use reqwest::Response;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service::config::Config;
use std::sync::Arc;

/// Retry budget for the team listing, which backs an interactive settings screen.
const TEAMS_MAX_RETRIES: u32 = 2;

/// One page of `GET /meetings`.
#[derive(Debug, Deserialize)]
pub struct MeetingsPage {
    #[serde(default)]
    pub items: Vec<FathomMeeting>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// A meeting as Fathom reports it. Only the fields the pipeline reads are modelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FathomMeeting {
    pub recording_id: Value,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub meeting_title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub share_url: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub scheduled_start_time: Option<String>,
    #[serde(default)]
    pub recording_start_time: Option<String>,
    #[serde(default)]
    pub recording_end_time: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub calendar_invitees: Vec<FathomInvitee>,
    #[serde(default)]
    pub recorded_by: Option<FathomRecorder>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FathomInvitee {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FathomRecorder {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub team: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TeamsPage {
    #[serde(default)]
    items: Vec<FathomTeam>,
}

#[derive(Debug, Deserialize)]
struct FathomTeam {
    name: String,
}

fn parse_time(value: Option<&str>) -> Option<DateTime<FixedOffset>> {
    value.and_then(|value| DateTime::parse_from_rfc3339(value).ok())
}

impl FathomMeeting {
    pub fn external_call_id(&self) -> String {
        match &self.recording_id {
            Value::String(id) => id.clone(),
            other => other.to_string(),
        }
    }

    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        parse_time(Some(&self.created_at))
    }

    /// Converts the meeting into the orchestrator's input, or `None` when it carries no usable start time.
    pub fn into_call_event(self) -> Option<CallEvent> {
        let start_time = parse_time(self.recording_start_time.as_deref())
            .or_else(|| parse_time(self.scheduled_start_time.as_deref()))
            .or_else(|| self.created_at())?;
        let duration_seconds = parse_time(self.recording_end_time.as_deref())
            .map(|end| (end - start_time).num_seconds().clamp(0, i64::from(i32::MAX)) as i32)
            .unwrap_or(0);

        let raw = serde_json::to_value(&self).unwrap_or(Value::Null);
        let title = self
            .meeting_title
            .clone()
            .filter(|title| !title.trim().is_empty())
            .or_else(|| self.title.clone())
            .unwrap_or_default();
        let participants = self
            .calendar_invitees
            .iter()
            .map(|invitee| {
                Participant::new(
                    invitee.name.clone().unwrap_or_default(),
                    invitee.email.trim().to_lowercase(),
                )
            })
            .collect();
        let recorded_by = self.recorded_by.as_ref().map(|recorder| RecordedBy {
            name: recorder.name.clone().unwrap_or_default(),
            email: recorder.email.trim().to_lowercase(),
            team: recorder.team.clone(),
        });

        Some(CallEvent {
            source: IngestSource::Sync,
            external_call_id: self.external_call_id(),
            title,
            start_time,
            duration_seconds,
            transcript: self.transcript.filter(|transcript| !transcript.is_empty()),
            recording_url: self.share_url.or(self.url),
            participants,
            team: recorded_by.as_ref().and_then(|recorder| recorder.team.clone()),
            recorded_by,
            raw,
        })
    }
}

pub struct FathomClient {
    client: AuthenticatedClient,
    base_url: String,
    page_size: usize,
}

impl FathomClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let api_key = config
            .fathom_api_key()
            .ok_or_else(|| Error::config("Fathom API key not configured"))?;
        let auth = ApiKeyAuth::new(ApiKeyProvider::Fathom, SecretString::new(api_key));
        let client = AuthenticatedClientBuilder::new()
            .with_auth(Arc::new(auth))
            .with_backoff(backoff_policy(config))
            .build()?;

        Ok(Self {
            client,
            base_url: config.fathom_base_url().trim_end_matches('/').to_string(),
            page_size: config.sync_page_size,
        })
    }

    pub async fn list_meetings(&self, cursor: Option<&str>) -> Result<MeetingsPage, Error> {
        let url = format!("{}/meetings", self.base_url);
        let mut query = vec![("limit", self.page_size.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        debug!("Listing Fathom meetings (cursor: {cursor:?})");
        let response = self
            .client
            .send(self.client.get(&url).query(&query))
            .await?;
        let response = ensure_success(response).await?;

        Ok(response.json().await?)
    }
}

async fn ensure_success(response: Response) -> Result<Response, Error> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    warn!("Fathom API error ({status}): {error_text}");
    Err(Error {
        source: Some(error_text.into()),
        error_kind: DomainErrorKind::External(ExternalErrorKind::Other(format!(
            "Fathom API error ({status})"
        ))),
    })
}

#[async_trait]
impl MeetingProvider for FathomClient {
    async fn meetings_since(
        &self,
        since: DateTime<Utc>,
        max_calls: usize,
    ) -> Result<Vec<CallEvent>, Error> {
        let mut events = Vec::new();
        let mut cursor: Option<String> = None;

        while events.len() < max_calls {
            let page = self.list_meetings(cursor.as_deref()).await?;
            let page_len = page.items.len();
            let fresh: Vec<FathomMeeting> = page
                .items
                .into_iter()
                .filter(|meeting| meeting.created_at().is_some_and(|created| created > since))
                .collect();
            let reached_older = fresh.len() < page_len;

            for meeting in fresh {
                let external_call_id = meeting.external_call_id();
                match meeting.into_call_event() {
                    Some(event) => events.push(event),
                    None => warn!("Skipping Fathom meeting {external_call_id} without a start time"),
                }
            }

            match page.next_cursor {
                Some(next) if !reached_older => cursor = Some(next),
                _ => break,
            }
        }

        events.truncate(max_calls);
        info!("Fetched {} Fathom meetings created after {since}", events.len());
        Ok(events)
    }

    async fn list_teams(&self) -> Result<Vec<String>, Error> {
        let url = format!("{}/teams", self.base_url);
        let client = self.client.with_max_retries(TEAMS_MAX_RETRIES);
        let response = ensure_success(client.send(client.get(&url)).await?).await?;
        let page: TeamsPage = response.json().await?;

        Ok(page.items.into_iter().map(|team| team.name).collect())
    }
}

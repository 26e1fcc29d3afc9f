use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, StatusCode};
use sandbox_manager::{Credentials, InactiveProject, ProjectStore, StoreError, StoreResult};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::http::HttpClient;

/// Project table behind a PostgREST-style REST endpoint.
///
/// Caller-scoped requests send the caller's access token as the bearer and
/// the anon key as `apikey`, so row-level policies apply. Service requests
/// use the service key for both.
pub struct RestProjectStore {
    http: HttpClient,
    table: String,
    anon_key: String,
    service_key: String,
}

#[derive(Deserialize)]
struct SandboxIdRow {
    sandbox_id: Option<String>,
}

#[derive(Deserialize)]
struct ActivityRow {
    last_activity: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct InactiveRow {
    id: String,
    #[serde(default)]
    name: Option<String>,
    sandbox_id: Option<String>,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl RestProjectStore {
    pub fn new(http: HttpClient, table: String, anon_key: String, service_key: String) -> Self {
        Self {
            http,
            table,
            anon_key,
            service_key,
        }
    }

    fn request(&self, method: Method, credentials: Option<&Credentials>) -> reqwest::RequestBuilder {
        let path = format!("/rest/v1/{}", self.table);
        match credentials {
            Some(creds) => self
                .http
                .request(method, &path, &self.anon_key, creds.access_token()),
            None => self
                .http
                .request(method, &path, &self.service_key, &self.service_key),
        }
    }

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
        project_id: Option<&str>,
        what: &str,
    ) -> StoreResult<reqwest::Response> {
        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("{what}: {e}")))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND
            && let Some(id) = project_id
        {
            return Err(StoreError::NotFound(id.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn patch(
        &self,
        project_id: &str,
        body: Value,
        credentials: Option<&Credentials>,
    ) -> StoreResult<()> {
        let req = self
            .request(Method::PATCH, credentials)
            .query(&[("id", format!("eq.{project_id}"))])
            .header("Prefer", "return=minimal")
            .json(&body);
        self.send(req, Some(project_id), "update project").await?;
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for RestProjectStore {
    async fn read_sandbox_id(
        &self,
        project_id: &str,
        credentials: Option<&Credentials>,
    ) -> StoreResult<Option<String>> {
        let req = self
            .request(Method::GET, credentials)
            .query(&[("id", format!("eq.{project_id}")), ("select", "sandbox_id".into())]);
        let resp = self.send(req, Some(project_id), "read project").await?;

        let rows: Vec<SandboxIdRow> = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("read project: {e}")))?;

        match rows.into_iter().next() {
            Some(row) => Ok(row.sandbox_id),
            None => Err(StoreError::NotFound(project_id.to_string())),
        }
    }

    async fn write_sandbox_id(
        &self,
        project_id: &str,
        sandbox_id: Option<&str>,
        activity: Option<DateTime<Utc>>,
        credentials: Option<&Credentials>,
    ) -> StoreResult<()> {
        let mut body = Map::new();
        body.insert("sandbox_id".into(), json!(sandbox_id));
        if let Some(at) = activity {
            body.insert("last_activity".into(), json!(timestamp(at)));
        }
        debug!(project_id = %project_id, sandbox_id = ?sandbox_id, "writing sandbox id");
        self.patch(project_id, Value::Object(body), credentials).await
    }

    async fn touch(
        &self,
        project_id: &str,
        at: DateTime<Utc>,
        credentials: Option<&Credentials>,
    ) -> StoreResult<()> {
        self.patch(
            project_id,
            json!({ "last_activity": timestamp(at) }),
            credentials,
        )
        .await
    }

    async fn list_inactive(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<InactiveProject>> {
        let req = self.request(Method::GET, None).query(&[
            ("select", "id,name,sandbox_id".to_string()),
            ("last_activity", format!("lt.{}", timestamp(cutoff))),
            ("sandbox_id", "not.is.null".to_string()),
            ("order", "last_activity.asc".to_string()),
        ]);
        let resp = self.send(req, None, "list inactive projects").await?;

        let rows: Vec<InactiveRow> = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("list inactive projects: {e}")))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let sandbox_id = row.sandbox_id?;
                Some(InactiveProject {
                    name: row.name.unwrap_or_default(),
                    id: row.id,
                    sandbox_id,
                })
            })
            .collect())
    }

    async fn last_activity(&self, project_id: &str) -> StoreResult<Option<DateTime<Utc>>> {
        let req = self.request(Method::GET, None).query(&[
            ("id", format!("eq.{project_id}")),
            ("select", "last_activity".into()),
        ]);
        let resp = self.send(req, None, "read project activity").await?;

        let rows: Vec<ActivityRow> = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("read project activity: {e}")))?;

        Ok(rows.into_iter().next().and_then(|row| row.last_activity))
    }
}

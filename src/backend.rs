//! Client for the fleet backend: authentication, equipment discovery,
//! recent incident snapshots and incident creation.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    Resource,
    config::BackendConfig,
    targets::{MonitoredTarget, TargetRecord},
    thresholds::{BreachEvent, Severity},
    util,
};

/// Status the backend assigns to freshly created incidents.
pub const STATUS_NEW: &str = "New";
/// Status an operator sets when closing an incident.
pub const STATUS_RESOLVED: &str = "Resolved";

#[derive(Debug, Serialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// List endpoints answer either `{ "data": [...] }`, the legacy
/// `{ "equipements": [...] }` envelope, or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Wrapped {
        #[serde(default, alias = "equipements")]
        data: Vec<T>,
    },
    Bare(Vec<T>),
}

impl<T> ListResponse<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            ListResponse::Wrapped { data } => data,
            ListResponse::Bare(items) => items,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EquipmentRef {
    #[serde(alias = "_id")]
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentIncident {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    pub resolved_at: Option<String>,
    pub equipment: Option<EquipmentRef>,
}

impl RecentIncident {
    /// True when this entry is a closed incident for the given target and
    /// resource. The title keyword is what ties an incident back to its
    /// resource; every title this agent writes carries one.
    pub fn is_resolved_for(&self, target_id: &str, resource: Resource) -> bool {
        self.status == STATUS_RESOLVED
            && self.resolved_at.is_some()
            && self
                .equipment
                .as_ref()
                .is_some_and(|equipment| equipment.id == target_id)
            && self.title.to_lowercase().contains(resource.keyword())
    }
}

/// Payload for creating an incident on the backend.
#[derive(Debug, Clone, Serialize)]
pub struct IncidentDraft {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub equipment: String,
}

impl IncidentDraft {
    pub fn normal(target: &MonitoredTarget, breach: &BreachEvent) -> Self {
        let resource = breach.resource.label();
        Self {
            title: format!("⚠️ High {resource} usage - {}", target.name),
            description: format!(
                "{resource}={:.1}% (threshold {}%) on {} ({})",
                breach.value, breach.threshold, target.name, target.address
            ),
            priority: breach.severity.label().to_string(),
            status: STATUS_NEW.to_string(),
            equipment: target.id.clone(),
        }
    }

    /// Draft for a breach that survived the whole verification window after
    /// its incident was closed. Always filed as elevated.
    pub fn relapse(target: &MonitoredTarget, breach: &BreachEvent) -> Self {
        let resource = breach.resource.label();
        Self {
            title: format!("🚨 {resource} still above threshold - {}", target.name),
            description: format!(
                "{resource}={:.1}% (threshold {}%) on {} ({}), still breaching after the incident was marked resolved",
                breach.value, breach.threshold, target.name, target.address
            ),
            priority: Severity::Elevated.label().to_string(),
            status: STATUS_NEW.to_string(),
            equipment: target.id.clone(),
        }
    }
}

pub struct BackendClient {
    base_url: String,
    email: String,
    password: Option<String>,
    client: reqwest::Client,
    token: Option<String>,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            password: config.password.clone().or_else(util::get_backend_password),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            token: None,
        }
    }

    #[instrument(skip(self))]
    pub async fn authenticate(&mut self) -> Result<()> {
        let password = self
            .password
            .clone()
            .context("no backend password configured")?;

        let response = self
            .client
            .post(format!("{}/api/users/login", self.base_url))
            .json(&LoginRequest {
                email: self.email.clone(),
                password,
            })
            .send()
            .await
            .context("Failed to reach the backend for login")?;

        if !response.status().is_success() {
            bail!("login rejected with status {}", response.status());
        }

        let login: LoginResponse = response
            .json()
            .await
            .context("Failed to parse the login response")?;

        self.token = Some(login.token);
        debug!("authenticated against {}", self.base_url);

        Ok(())
    }

    fn bearer_token(&self) -> Result<&str> {
        self.token.as_deref().context("not authenticated yet")
    }

    #[instrument(skip(self))]
    pub async fn fetch_targets(&self) -> Result<Vec<TargetRecord>> {
        let token = self.bearer_token()?;

        let response = self
            .client
            .get(format!("{}/api/equipment", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to fetch the equipment list")?;

        // older backends only expose the French route
        let response = if response.status() == StatusCode::NOT_FOUND {
            self.client
                .get(format!("{}/api/equipements", self.base_url))
                .bearer_auth(token)
                .send()
                .await
                .context("Failed to fetch the equipment list")?
        } else {
            response
        };

        if !response.status().is_success() {
            bail!(
                "equipment list request failed with status {}",
                response.status()
            );
        }

        let list: ListResponse<TargetRecord> = response
            .json()
            .await
            .context("Failed to parse the equipment list")?;

        Ok(list.into_items())
    }

    #[instrument(skip(self))]
    pub async fn recent_incidents(&self) -> Result<Vec<RecentIncident>> {
        let token = self.bearer_token()?;

        let response = self
            .client
            .get(format!("{}/api/incidents/recent", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to fetch recent incidents")?;

        if !response.status().is_success() {
            bail!(
                "recent incident request failed with status {}",
                response.status()
            );
        }

        let list: ListResponse<RecentIncident> = response
            .json()
            .await
            .context("Failed to parse recent incidents")?;

        Ok(list.into_items())
    }

    #[instrument(skip(self, draft), fields(title = %draft.title))]
    pub async fn create_incident(&self, draft: &IncidentDraft) -> Result<()> {
        let token = self.bearer_token()?;

        let response = self
            .client
            .post(format!("{}/api/incidents", self.base_url))
            .bearer_auth(token)
            .json(draft)
            .send()
            .await
            .context("Failed to send the incident")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("incident creation failed with status {status}: {body}");
        }

        Ok(())
    }
}

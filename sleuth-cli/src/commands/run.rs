//! `sleuth run`: replay a scripted labeling session
//!
//! The session file declares a dataset, a workspace, categories and label
//! writes. They are applied through the orchestrator with the built-in
//! collaborators, status is polled until every category settles, and the
//! outcome is printed as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use sleuth_core::{
    Category, CategoryId, Collaborators, DatasetId, Document, ElementId, InMemoryDatasetProvider,
    IterationSummary, LabelValue, Orchestrator, PrototypeTrainer, StatusSnapshot,
    UncertaintySelector, WorkspaceId, WorkspaceInfo,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigLoader, SleuthConfig};

#[derive(Args)]
pub struct RunArgs {
    /// Session file (TOML)
    pub session: PathBuf,

    /// Extra config file layered on top of user and project config
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Stop waiting for training after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to read session {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid session: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Session declares no documents")]
    NoDocuments,
}

/// A scripted labeling session
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub dataset: DatasetSpec,
    #[serde(default)]
    pub workspace: WorkspaceSpec,
    #[serde(default)]
    pub categories: Vec<CategorySpec>,
    #[serde(default)]
    pub labels: Vec<LabelSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetSpec {
    pub id: String,
    pub documents: Vec<DocumentSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentSpec {
    pub name: String,
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceSpec {
    pub id: String,
}

impl Default for WorkspaceSpec {
    fn default() -> Self {
        Self {
            id: "session".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelSpec {
    pub element: String,
    pub category: String,
    /// "true", "false" or "unset"
    pub value: String,
}

impl Session {
    pub fn parse(contents: &str) -> Result<Self, SessionError> {
        let session: Session = toml::from_str(contents)?;
        if session.dataset.documents.is_empty() {
            return Err(SessionError::NoDocuments);
        }
        Ok(session)
    }

    pub fn from_path(path: &Path) -> Result<Self, SessionError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SessionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }
}

/// What `sleuth run` prints
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub workspace: WorkspaceInfo,
    /// False when the timeout elapsed with an iteration still in flight
    pub settled: bool,
    pub categories: Vec<CategoryReport>,
}

#[derive(Debug, Serialize)]
pub struct CategoryReport {
    pub category: Category,
    pub status: StatusSnapshot,
    pub iterations: Vec<IterationSummary>,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Serialize)]
pub struct Candidate {
    pub id: ElementId,
    pub text: String,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let config = ConfigLoader::load(args.config.as_deref())?;
    let session = Session::from_path(&args.session)?;
    let timeout = Duration::from_secs(args.timeout_secs.unwrap_or(config.run.timeout_secs));

    let report = execute(session, &config, timeout).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Apply a session and wait for its categories to settle
pub async fn execute(session: Session, config: &SleuthConfig, timeout: Duration) -> Result<RunReport> {
    let provider = InMemoryDatasetProvider::new();
    let dataset_id = DatasetId::new(session.dataset.id.as_str());
    let documents = session
        .dataset
        .documents
        .iter()
        .map(|doc| Document::from_texts(&dataset_id, &doc.name, &doc.texts))
        .collect();
    let ingested = provider.add_documents(&dataset_id, documents).await?;
    info!(
        dataset = %dataset_id,
        docs = ingested.num_docs,
        elements = ingested.num_elements,
        "Dataset loaded"
    );

    let orchestrator = Orchestrator::new(
        Arc::new(provider),
        Collaborators::new(Arc::new(PrototypeTrainer::new()), Arc::new(UncertaintySelector::new())),
        config.orchestrator(),
    );
    let workspace = orchestrator
        .create_workspace(session.workspace.id.as_str(), &dataset_id)
        .await?;

    let mut categories = Vec::with_capacity(session.categories.len());
    for spec in &session.categories {
        categories.push(
            orchestrator
                .create_category(&workspace.id, &spec.name, &spec.description)
                .await?,
        );
    }

    for label in &session.labels {
        let value = LabelValue::parse(&label.value)
            .with_context(|| format!("Label for element {}", label.element))?;
        orchestrator
            .set_label(
                &workspace.id,
                &ElementId::new(label.element.as_str()),
                &CategoryId::new(label.category.as_str()),
                value,
            )
            .await
            .with_context(|| format!("Label for element {}", label.element))?;
    }
    info!(labels = session.labels.len(), "Labels applied");

    let poll_interval = Duration::from_millis(config.run.poll_interval_ms);
    let waited = tokio::time::timeout(
        timeout,
        wait_until_settled(&orchestrator, &workspace.id, &categories, poll_interval),
    )
    .await;
    let settled = match waited {
        Ok(result) => {
            result?;
            true
        }
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "Timed out waiting for iterations");
            false
        }
    };

    let mut reports = Vec::with_capacity(categories.len());
    for category in categories {
        reports.push(
            category_report(&orchestrator, &workspace.id, category, config.run.top_candidates)
                .await?,
        );
    }

    Ok(RunReport {
        workspace,
        settled,
        categories: reports,
    })
}

async fn wait_until_settled(
    orchestrator: &Orchestrator,
    workspace_id: &WorkspaceId,
    categories: &[Category],
    poll_interval: Duration,
) -> Result<()> {
    loop {
        let mut settled = true;
        for category in categories {
            let status = orchestrator.get_status(workspace_id, &category.id).await?;
            settled &= status.is_settled();
        }
        if settled {
            return Ok(());
        }
        tokio::time::sleep(poll_interval).await;
    }
}

async fn category_report(
    orchestrator: &Orchestrator,
    workspace_id: &WorkspaceId,
    category: Category,
    top_candidates: usize,
) -> Result<CategoryReport> {
    let status = orchestrator.get_status(workspace_id, &category.id).await?;
    let iterations = orchestrator.list_iterations(workspace_id, &category.id).await?;

    let mut candidates = Vec::new();
    for id in orchestrator
        .next_candidates(workspace_id, &category.id, top_candidates)
        .await?
    {
        let view = orchestrator.get_element(workspace_id, &id).await?;
        candidates.push(Candidate { id, text: view.text });
    }

    Ok(CategoryReport {
        category,
        status,
        iterations,
        candidates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sleuth_core::IterationStatus;

    const SESSION: &str = r#"
[dataset]
id = "news"

[[dataset.documents]]
name = "sport"
texts = ["the striker scored a late goal", "the keeper saved a penalty"]

[[dataset.documents]]
name = "money"
texts = ["the bank raised interest rates", "shares fell on weak earnings"]

[workspace]
id = "demo"

[[categories]]
name = "sports"
description = "match reports"

[[labels]]
element = "news-sport-0"
category = "sports"
value = "true"

[[labels]]
element = "news-money-0"
category = "sports"
value = "false"
"#;

    #[test]
    fn test_parse_session() {
        let session = Session::parse(SESSION).unwrap();

        assert_eq!(session.dataset.documents.len(), 2);
        assert_eq!(session.workspace.id, "demo");
        assert_eq!(session.categories[0].name, "sports");
        assert_eq!(session.labels.len(), 2);
    }

    #[test]
    fn test_session_without_documents_is_rejected() {
        let result = Session::parse("[dataset]\nid = \"x\"\ndocuments = []\n");
        assert!(matches!(result, Err(SessionError::NoDocuments)));
    }

    #[test]
    fn test_workspace_defaults_when_omitted() {
        let session = Session::parse(
            "[dataset]\nid = \"x\"\n\n[[dataset.documents]]\nname = \"d\"\ntexts = [\"a\"]\n",
        )
        .unwrap();

        assert_eq!(session.workspace.id, "session");
        assert!(session.categories.is_empty());
        assert!(session.labels.is_empty());
    }

    #[tokio::test]
    async fn test_execute_trains_and_reports_candidates() {
        let session = Session::parse(SESSION).unwrap();

        let report = execute(session, &SleuthConfig::default(), Duration::from_secs(10))
            .await
            .unwrap();

        assert!(report.settled);
        assert_eq!(report.workspace.total_elements, 4);
        let sports = &report.categories[0];
        assert_eq!(sports.status.model_status, Some(IterationStatus::Ready));
        assert_eq!(sports.status.progress.overall, 50);
        assert_eq!(sports.iterations.len(), 1);
        let ids: Vec<&str> = sports.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"news-sport-1"));
        assert!(ids.contains(&"news-money-1"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["categories"][0]["status"]["labeling_counts"]["true"], 1);
    }

    #[tokio::test]
    async fn test_execute_rejects_invalid_label_value() {
        let session =
            Session::parse(&SESSION.replace("value = \"false\"", "value = \"maybe\"")).unwrap();

        let result = execute(session, &SleuthConfig::default(), Duration::from_secs(1)).await;

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("news-money-0"));
        assert!(message.contains("maybe"));
    }

    #[tokio::test]
    async fn test_execute_rejects_unknown_category() {
        let session = Session::parse(
            &SESSION.replace("category = \"sports\"", "category = \"politics\""),
        )
        .unwrap();

        let result = execute(session, &SleuthConfig::default(), Duration::from_secs(1)).await;

        assert!(format!("{:#}", result.unwrap_err()).contains("Unknown category: politics"));
    }
}

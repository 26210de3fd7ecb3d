//! Shared fixtures for sleuth-core integration tests

use std::sync::Arc;
use std::time::Duration;

use sleuth_core::training::{ScriptedSelector, ScriptedTrainer};
use sleuth_core::{
    CategoryId, Collaborators, DatasetId, Document, InMemoryDatasetProvider, Orchestrator,
    OrchestratorConfig, StatusSnapshot, WorkspaceId,
};

/// 3 documents, 6 elements: `corpus-doc{1,2,3}-{0,1}`
#[allow(dead_code)]
pub async fn six_element_provider() -> InMemoryDatasetProvider {
    let provider = InMemoryDatasetProvider::new();
    let ds = DatasetId::new("corpus");
    provider
        .add_documents(
            &ds,
            vec![
                Document::from_texts(&ds, "doc1", &["the striker scored twice", "fans cheered"]),
                Document::from_texts(&ds, "doc2", &["bond yields rose", "the central bank met"]),
                Document::from_texts(&ds, "doc3", &["a late penalty won it", "shares slipped"]),
            ],
        )
        .await
        .unwrap();
    provider
}

pub struct Fixture {
    pub orchestrator: Arc<Orchestrator>,
    pub trainer: Arc<ScriptedTrainer>,
    pub selector: Arc<ScriptedSelector>,
    pub ws: WorkspaceId,
    pub cat: CategoryId,
}

/// Workspace `ws` over the six-element corpus with one category `sports`
#[allow(dead_code)]
pub async fn fixture(trainer: ScriptedTrainer) -> Fixture {
    fixture_with_config(trainer, OrchestratorConfig::default()).await
}

#[allow(dead_code)]
pub async fn fixture_with_config(trainer: ScriptedTrainer, config: OrchestratorConfig) -> Fixture {
    let trainer = Arc::new(trainer);
    let selector = Arc::new(ScriptedSelector::new());
    let orchestrator = Orchestrator::new(
        Arc::new(six_element_provider().await),
        Collaborators::new(trainer.clone(), selector.clone()),
        config,
    );
    let ws = WorkspaceId::new("ws");
    orchestrator
        .create_workspace(ws.clone(), &DatasetId::new("corpus"))
        .await
        .unwrap();
    let cat = orchestrator
        .create_category(&ws, "sports", "match reports")
        .await
        .unwrap()
        .id;
    Fixture {
        orchestrator: Arc::new(orchestrator),
        trainer,
        selector,
        ws,
        cat,
    }
}

/// Poll status until no iteration is in flight
#[allow(dead_code)]
pub async fn poll_until_settled(fixture: &Fixture) -> StatusSnapshot {
    for _ in 0..400 {
        let status = fixture
            .orchestrator
            .get_status(&fixture.ws, &fixture.cat)
            .await
            .unwrap();
        if status.is_settled() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("iteration did not settle");
}

//! Wires the pipeline components together once at start-up.

use crate::audit::{AuditWriter, LoggingEventHandler};
use crate::diagnostics::Diagnostics;
use crate::error::Error;
use crate::gateway::fathom::FathomClient;
use crate::gateway::openai::OpenAiClient;
use crate::gateway::MeetingProvider;
use crate::ingestion::IngestionOrchestrator;
use crate::reconciler::StatusReconciler;
use crate::store::Stores;
use crate::sync::ProviderSync;
use events::EventPublisher;
use log::*;
use meeting_ai::traits::{analysis, classification};
use sea_orm::DatabaseConnection;
use service::config::Config;
use std::sync::Arc;

/// The external collaborators the pipeline can run without.
#[derive(Default, Clone)]
pub struct Providers {
    pub meetings: Option<Arc<dyn MeetingProvider>>,
    pub classifier: Option<Arc<dyn classification::Provider>>,
    pub scorer: Option<Arc<dyn analysis::Provider>>,
}

impl Providers {
    /// Builds a client for every provider whose credentials are configured.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let meetings: Option<Arc<dyn MeetingProvider>> = match config.fathom_api_key() {
            Some(_) => {
                let client: Arc<dyn MeetingProvider> = Arc::new(FathomClient::new(config)?);
                Some(client)
            }
            None => {
                warn!("No Fathom API key configured; provider sync and team listing are disabled");
                None
            }
        };

        let (classifier, scorer): (
            Option<Arc<dyn classification::Provider>>,
            Option<Arc<dyn analysis::Provider>>,
        ) = match config.openai_api_key() {
            Some(_) => {
                let client = Arc::new(OpenAiClient::new(config)?);
                let classifier: Arc<dyn classification::Provider> = client.clone();
                let scorer: Arc<dyn analysis::Provider> = client;
                (Some(classifier), Some(scorer))
            }
            None => {
                warn!("No OpenAI API key configured; classification fails open and scoring fails");
                (None, None)
            }
        };

        Ok(Self {
            meetings,
            classifier,
            scorer,
        })
    }
}

pub struct SalesPipeline {
    pub stores: Stores,
    pub publisher: EventPublisher,
    pub orchestrator: Arc<IngestionOrchestrator>,
    pub reconciler: StatusReconciler,
    pub diagnostics: Diagnostics,
    /// Present only when a meeting provider is configured.
    sync: Option<ProviderSync>,
    pending_batch_size: u64,
}

impl SalesPipeline {
    pub fn new(config: &Config, stores: Stores, providers: Providers) -> Self {
        let publisher = EventPublisher::new()
            .with_handler(Arc::new(LoggingEventHandler))
            .with_handler(Arc::new(AuditWriter::new(stores.audit.clone())));

        let orchestrator = Arc::new(IngestionOrchestrator::new(
            config,
            &stores,
            providers.classifier,
            providers.scorer,
            publisher.clone(),
        ));
        let sync = providers.meetings.map(|meetings| {
            ProviderSync::new(config, &stores, meetings, orchestrator.clone())
        });

        Self {
            reconciler: StatusReconciler::new(config, &stores, publisher.clone()),
            diagnostics: Diagnostics::new(&stores),
            orchestrator,
            sync,
            publisher,
            stores,
            pending_batch_size: config.pending_batch_size,
        }
    }

    /// Production wiring: database-backed stores and configured provider clients.
    pub fn from_db(config: &Config, db: Arc<DatabaseConnection>) -> Result<Self, Error> {
        Ok(Self::new(
            config,
            Stores::from_db(db),
            Providers::from_config(config)?,
        ))
    }

    pub fn pending_batch_size(&self) -> u64 {
        self.pending_batch_size
    }

    pub fn provider_sync(&self) -> Result<&ProviderSync, Error> {
        self.sync
            .as_ref()
            .ok_or_else(|| Error::config("Fathom API key not configured"))
    }
}

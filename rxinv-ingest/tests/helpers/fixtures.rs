//! Orchestrator fixtures: in-memory object store plus a seeded database

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use rxinv_ingest::db::medications::upsert_medication;
use rxinv_ingest::db::pharmacies::register_pharmacy;
use rxinv_ingest::db::{SqliteLedger, SqliteMedicationCatalog, SqliteStockSink, SqliteTenantRegistry};
use rxinv_ingest::models::RunSummary;
use rxinv_ingest::services::{Collaborators, IngestionOrchestrator, OrchestratorSettings};
use rxinv_ingest::storage::{BlobInbox, MemoryObjectStore, ObjectStore};

pub const TENANT: &str = "12345678000199";
pub const OTHER_TENANT: &str = "98765432000100";
pub const FILE: &str = "stock_daily_2024-05-01_001.csv";

pub const HEADER: &str = "cnpj;medicine_name;quantity;reference_date";

/// Build a CSV body from `(cnpj, name, quantity, date)` rows
pub fn csv_with_rows(rows: &[(&str, &str, &str, &str)]) -> String {
    let mut body = String::from(HEADER);
    for (cnpj, name, quantity, date) in rows {
        body.push('\n');
        body.push_str(&format!("{};{};{};{}", cnpj, name, quantity, date));
    }
    body.push('\n');
    body
}

/// A valid file for TENANT on 2024-05-01
pub fn csv() -> String {
    csv_with_rows(&[
        (TENANT, "Dipirona", "5", "2024-05-01"),
        (TENANT, "Losartana", "20", "2024-05-01"),
        (TENANT, "Omeprazol", "45", "2024-05-01"),
    ])
}

/// One orchestrator wired to an in-memory store and a seeded database
pub struct TestEnv {
    pub store: MemoryObjectStore,
    pub pool: SqlitePool,
    pub orchestrator: IngestionOrchestrator,
}

impl TestEnv {
    /// In-memory single-connection database
    pub async fn new() -> Self {
        let pool = rxinv_common::db::init_memory_database().await.unwrap();
        Self::with_pool(MemoryObjectStore::new(), pool).await
    }

    /// Share a store and pool (several orchestrators = overlapping runs)
    pub async fn with_pool(store: MemoryObjectStore, pool: SqlitePool) -> Self {
        seed(&pool).await;
        let orchestrator = orchestrator(&store, &pool);
        Self {
            store,
            pool,
            orchestrator,
        }
    }

    /// Drop a file into the inbox, aged past the eligibility cutoff
    pub fn drop_file(&self, path: &str, body: &str) {
        self.drop_file_at(path, body, Utc::now() - Duration::hours(1));
    }

    pub fn drop_file_at(&self, path: &str, body: &str, last_modified: DateTime<Utc>) {
        self.store.insert(path, body.as_bytes(), last_modified).unwrap();
    }

    pub async fn run(&self) -> RunSummary {
        self.orchestrator.run().await
    }

    /// Current version tag of an object
    pub async fn version_of(&self, path: &str) -> String {
        self.store.head(path).await.unwrap().unwrap().version
    }

    pub fn paths(&self) -> Vec<String> {
        self.store.paths().unwrap()
    }
}

pub fn orchestrator(store: &MemoryObjectStore, pool: &SqlitePool) -> IngestionOrchestrator {
    IngestionOrchestrator::new(
        Collaborators {
            inbox: BlobInbox::new(Arc::new(store.clone()), "inbox/", "processed/", "error/"),
            ledger: Arc::new(SqliteLedger::new(pool.clone())),
            tenants: Arc::new(SqliteTenantRegistry::new(pool.clone())),
            catalog: Arc::new(SqliteMedicationCatalog::new(pool.clone())),
            sink: Arc::new(SqliteStockSink::new(pool.clone())),
        },
        OrchestratorSettings::default(),
    )
}

async fn seed(pool: &SqlitePool) {
    register_pharmacy(pool, TENANT, "Farmacia Centro").await.unwrap();
    register_pharmacy(pool, OTHER_TENANT, "Farmacia Norte").await.unwrap();
    for (name, code) in [("Dipirona", "MED-001"), ("Losartana", "MED-002"), ("Omeprazol", "MED-003")] {
        upsert_medication(pool, name, code).await.unwrap();
    }
}

use std::path::Path;

use async_trait::async_trait;

use cn_core::{
    Company, CompanyGraph, CompanyLabel, RegionCount, RelationshipGraph, SectorAggregate,
};

use crate::fallback;
use crate::store::SqliteCompanyGraph;

/// Read gateway over the company graph store.
///
/// The store handle is opened once and held for the process lifetime. When it
/// cannot be opened the gateway permanently serves the fixed fallback
/// dataset; per-query store errors degrade the same way. Callers therefore
/// treat "store down" as degraded-but-available, never as an error.
pub struct GraphGateway {
    store: Option<SqliteCompanyGraph>,
}

impl GraphGateway {
    pub fn open(path: Option<&Path>) -> Self {
        let store = match path {
            Some(path) => match SqliteCompanyGraph::open(path) {
                Ok(store) => {
                    tracing::info!(path = %path.display(), "company graph store opened");
                    Some(store)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "company graph unavailable, serving fallback data");
                    None
                }
            },
            None => {
                tracing::warn!("no company graph configured, serving fallback data");
                None
            }
        };
        Self { store }
    }

    pub fn with_store(store: SqliteCompanyGraph) -> Self {
        Self { store: Some(store) }
    }

    pub fn degraded() -> Self {
        Self { store: None }
    }

    pub fn is_degraded(&self) -> bool {
        self.store.is_none()
    }

    fn degrade<T>(&self, result: cn_core::CnResult<T>, fallback: impl FnOnce() -> T, op: &str) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, op, "graph query failed, serving fallback data");
                fallback()
            }
        }
    }
}

#[async_trait]
impl CompanyGraph for GraphGateway {
    async fn company_count(&self, label: CompanyLabel) -> usize {
        match &self.store {
            Some(store) => self.degrade(
                store.company_count(label),
                || fallback::company_count(label),
                "company_count",
            ),
            None => fallback::company_count(label),
        }
    }

    async fn sector_count(&self, label: CompanyLabel) -> usize {
        match &self.store {
            Some(store) => self.degrade(
                store.sector_count(label),
                || fallback::sector_count(label),
                "sector_count",
            ),
            None => fallback::sector_count(label),
        }
    }

    async fn companies(&self, label: CompanyLabel) -> Vec<Company> {
        match &self.store {
            Some(store) => self.degrade(
                store.companies(label),
                || fallback::companies(label),
                "companies",
            ),
            None => fallback::companies(label),
        }
    }

    async fn company_details(&self, label: CompanyLabel, name: &str) -> Option<Company> {
        match &self.store {
            Some(store) => self.degrade(store.company_details(label, name), || None, "company_details"),
            None => None,
        }
    }

    async fn search(&self, label: CompanyLabel, term: &str) -> Vec<Company> {
        match &self.store {
            Some(store) => self.degrade(store.search(label, term), Vec::new, "search"),
            None => Vec::new(),
        }
    }

    async fn companies_by_sector(&self, label: CompanyLabel, sector: &str) -> Vec<Company> {
        match &self.store {
            Some(store) => self.degrade(
                store.companies_by_sector(label, sector),
                || fallback::companies_by_sector(label, sector),
                "companies_by_sector",
            ),
            None => fallback::companies_by_sector(label, sector),
        }
    }

    async fn sector_aggregations(&self, label: CompanyLabel) -> Vec<SectorAggregate> {
        match &self.store {
            Some(store) => self.degrade(
                store.sector_aggregations(label),
                || fallback::sector_aggregations(label),
                "sector_aggregations",
            ),
            None => fallback::sector_aggregations(label),
        }
    }

    async fn relationships(&self, label: CompanyLabel, name: &str) -> RelationshipGraph {
        match &self.store {
            Some(store) => self.degrade(
                store.relationships(label, name),
                || fallback::relationships(label, name),
                "relationships",
            ),
            None => fallback::relationships(label, name),
        }
    }

    async fn region_counts(&self, label: CompanyLabel) -> Vec<RegionCount> {
        match &self.store {
            Some(store) => self.degrade(
                store.region_counts(label),
                || fallback::region_counts(label),
                "region_counts",
            ),
            None => fallback::region_counts(label),
        }
    }

    async fn province_counts(&self, label: CompanyLabel, region: &str) -> Vec<RegionCount> {
        match &self.store {
            Some(store) => self.degrade(
                store.province_counts(label, region),
                || fallback::province_counts(label, region),
                "province_counts",
            ),
            None => fallback::province_counts(label, region),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn degraded_gateway_serves_fallback_not_errors() {
        let gateway = GraphGateway::degraded();
        assert!(gateway.is_degraded());

        assert_eq!(gateway.company_count(CompanyLabel::Suk).await, 150);
        assert!(!gateway.companies(CompanyLabel::Suk).await.is_empty());
        assert!(gateway.search(CompanyLabel::Suk, "acme").await.is_empty());
        assert!(gateway
            .company_details(CompanyLabel::Suk, "Acme Corporation")
            .await
            .is_none());

        let graph = gateway.relationships(CompanyLabel::Suk, "Acme Corporation").await;
        assert_eq!(graph.nodes[0].node_type, "center");
        assert_eq!(graph.edges.len(), 2);
    }

    #[tokio::test]
    async fn live_gateway_prefers_the_store() {
        let store = SqliteCompanyGraph::open_in_memory().unwrap();
        store.seed_demo().unwrap();
        let gateway = GraphGateway::with_store(store);
        assert!(!gateway.is_degraded());

        let hits = gateway.search(CompanyLabel::Suk, "acme").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(gateway.company_count(CompanyLabel::Suk).await, 5);
    }

    #[tokio::test]
    async fn unopenable_path_degrades_for_process_lifetime() {
        let gateway = GraphGateway::open(Some(Path::new("/nonexistent/dir/graph.db")));
        assert!(gateway.is_degraded());
        assert_eq!(gateway.company_count(CompanyLabel::Startup).await, 150);
    }
}

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use cn_core::{
    CnError, CnResult, Company, CompanyLabel, GraphEdge, GraphNode, RegionCount, RelationshipGraph,
    SectorAggregate,
};

use crate::{MIN_RELATIONSHIP_WEIGHT, SEARCH_LIMIT, SECTOR_AGGREGATION_LIMIT, SECTOR_SAMPLE_SIZE};

/// SQLite-backed company graph: company nodes, multi-valued sector
/// memberships, and weighted relationship edges. Read-only from the core's
/// perspective; the single connection is the process-lifetime handle.
pub struct SqliteCompanyGraph {
    conn: Mutex<Connection>,
}

impl SqliteCompanyGraph {
    pub fn open(path: &Path) -> CnResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| CnError::Graph(format!("open company graph: {e}")))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> CnResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CnError::Graph(format!("open in-memory company graph: {e}")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> CnResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS companies (
                id TEXT PRIMARY KEY NOT NULL,
                label TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                address TEXT,
                website TEXT,
                region TEXT,
                province TEXT,
                trl INTEGER,
                activity_start TEXT
            );
            CREATE TABLE IF NOT EXISTS company_sectors (
                company_id TEXT NOT NULL REFERENCES companies(id),
                sector TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS company_relationships (
                id TEXT PRIMARY KEY NOT NULL,
                label TEXT NOT NULL,
                from_name TEXT NOT NULL,
                to_name TEXT NOT NULL,
                kind TEXT NOT NULL,
                weight REAL NOT NULL DEFAULT 1.0,
                description TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_companies_label_name ON companies(label, name);
            CREATE INDEX IF NOT EXISTS idx_sectors_company ON company_sectors(company_id);
            CREATE INDEX IF NOT EXISTS idx_rel_from ON company_relationships(label, from_name);
            CREATE INDEX IF NOT EXISTS idx_rel_to ON company_relationships(label, to_name);",
        )
        .map_err(|e| CnError::Graph(format!("create graph schema: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> CnResult<T>
    where
        F: FnOnce(&Connection) -> CnResult<T>,
    {
        let conn = self.conn.lock().map_err(|e| CnError::Graph(e.to_string()))?;
        f(&conn)
    }

    fn row_to_company(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, Company)> {
        let id: String = row.get(0)?;
        let company = Company {
            name: row.get(1)?,
            sectors: Vec::new(),
            description: row.get(2)?,
            address: row.get(3)?,
            website: row.get(4)?,
            region: row.get(5)?,
            province: row.get(6)?,
            trl: row.get(7)?,
            activity_start: row.get(8)?,
        };
        Ok((id, company))
    }

    fn load_sectors(conn: &Connection, company_id: &str) -> CnResult<Vec<String>> {
        let mut stmt = conn
            .prepare("SELECT sector FROM company_sectors WHERE company_id = ?1 ORDER BY sector")
            .map_err(|e| CnError::Graph(e.to_string()))?;
        let rows = stmt
            .query_map(params![company_id], |row| row.get(0))
            .map_err(|e| CnError::Graph(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| CnError::Graph(e.to_string()))
    }

    fn select_companies(
        conn: &Connection,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> CnResult<Vec<Company>> {
        let mut stmt = conn.prepare(sql).map_err(|e| CnError::Graph(e.to_string()))?;
        let rows = stmt
            .query_map(args, Self::row_to_company)
            .map_err(|e| CnError::Graph(e.to_string()))?;
        let pairs = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CnError::Graph(e.to_string()))?;

        let mut companies = Vec::with_capacity(pairs.len());
        for (id, mut company) in pairs {
            company.sectors = Self::load_sectors(conn, &id)?;
            companies.push(company);
        }
        Ok(companies)
    }

    pub fn company_count(&self, label: CompanyLabel) -> CnResult<usize> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM companies WHERE label = ?1",
                params![label.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as usize)
            .map_err(|e| CnError::Graph(e.to_string()))
        })
    }

    pub fn sector_count(&self, label: CompanyLabel) -> CnResult<usize> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(DISTINCT s.sector)
                 FROM company_sectors s JOIN companies c ON c.id = s.company_id
                 WHERE c.label = ?1",
                params![label.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as usize)
            .map_err(|e| CnError::Graph(e.to_string()))
        })
    }

    pub fn companies(&self, label: CompanyLabel) -> CnResult<Vec<Company>> {
        self.with_conn(|conn| {
            Self::select_companies(
                conn,
                "SELECT id, name, description, address, website, region, province, trl, activity_start
                 FROM companies WHERE label = ?1 ORDER BY name",
                &[&label.as_str()],
            )
        })
    }

    pub fn company_details(&self, label: CompanyLabel, name: &str) -> CnResult<Option<Company>> {
        self.with_conn(|conn| {
            let found: Option<(String, Company)> = conn
                .query_row(
                    "SELECT id, name, description, address, website, region, province, trl, activity_start
                     FROM companies WHERE label = ?1 AND name = ?2",
                    params![label.as_str(), name],
                    Self::row_to_company,
                )
                .optional()
                .map_err(|e| CnError::Graph(e.to_string()))?;

            match found {
                Some((id, mut company)) => {
                    company.sectors = Self::load_sectors(conn, &id)?;
                    Ok(Some(company))
                }
                None => Ok(None),
            }
        })
    }

    pub fn search(&self, label: CompanyLabel, term: &str) -> CnResult<Vec<Company>> {
        let pattern = format!("%{}%", term.to_lowercase());
        self.with_conn(|conn| {
            Self::select_companies(
                conn,
                "SELECT id, name, description, address, website, region, province, trl, activity_start
                 FROM companies
                 WHERE label = ?1 AND lower(name) LIKE ?2
                 ORDER BY name LIMIT ?3",
                &[&label.as_str(), &pattern, &(SEARCH_LIMIT as i64)],
            )
        })
    }

    pub fn companies_by_sector(&self, label: CompanyLabel, sector: &str) -> CnResult<Vec<Company>> {
        let sector = sector.to_lowercase();
        self.with_conn(|conn| {
            Self::select_companies(
                conn,
                "SELECT DISTINCT c.id, c.name, c.description, c.address, c.website,
                        c.region, c.province, c.trl, c.activity_start
                 FROM companies c JOIN company_sectors s ON s.company_id = c.id
                 WHERE c.label = ?1 AND lower(s.sector) = ?2
                 ORDER BY c.name",
                &[&label.as_str(), &sector],
            )
        })
    }

    /// Unwind the multi-valued sector field: per sector, the distinct member
    /// count and a capped sample of member names, top sectors by count.
    pub fn sector_aggregations(&self, label: CompanyLabel) -> CnResult<Vec<SectorAggregate>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT s.sector, c.name
                     FROM company_sectors s JOIN companies c ON c.id = s.company_id
                     WHERE c.label = ?1
                     ORDER BY s.sector, c.name",
                )
                .map_err(|e| CnError::Graph(e.to_string()))?;
            let rows = stmt
                .query_map(params![label.as_str()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(|e| CnError::Graph(e.to_string()))?;

            let mut by_sector: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for row in rows {
                let (sector, name) = row.map_err(|e| CnError::Graph(e.to_string()))?;
                let members = by_sector.entry(sector).or_default();
                if !members.contains(&name) {
                    members.push(name);
                }
            }

            let mut aggregates: Vec<SectorAggregate> = by_sector
                .into_iter()
                .map(|(sector, members)| SectorAggregate {
                    sector,
                    count: members.len(),
                    sample_companies: members.into_iter().take(SECTOR_SAMPLE_SIZE).collect(),
                })
                .collect();
            aggregates.sort_by(|a, b| b.count.cmp(&a.count));
            aggregates.truncate(SECTOR_AGGREGATION_LIMIT);
            Ok(aggregates)
        })
    }

    /// One-hop neighborhood of relationship edges touching `name`, filtered
    /// to weight >= 3.
    pub fn relationships(&self, label: CompanyLabel, name: &str) -> CnResult<RelationshipGraph> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT from_name, to_name, kind, weight, description
                     FROM company_relationships
                     WHERE label = ?1 AND weight >= ?2
                       AND (from_name = ?3 OR to_name = ?3)
                     ORDER BY weight DESC",
                )
                .map_err(|e| CnError::Graph(e.to_string()))?;
            let rows = stmt
                .query_map(
                    params![label.as_str(), MIN_RELATIONSHIP_WEIGHT, name],
                    |row| {
                        Ok(GraphEdge {
                            source: row.get(0)?,
                            target: row.get(1)?,
                            weight: row.get(3)?,
                            edge_type: row.get(2)?,
                            description: row.get(4)?,
                        })
                    },
                )
                .map_err(|e| CnError::Graph(e.to_string()))?;
            let edges = rows
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| CnError::Graph(e.to_string()))?;

            let mut related: Vec<String> = Vec::new();
            for edge in &edges {
                for company in [&edge.source, &edge.target] {
                    if !related.contains(company) {
                        related.push(company.clone());
                    }
                }
            }

            let nodes = related
                .into_iter()
                .map(|company| GraphNode {
                    node_type: if company == name { "center" } else { "related" }.to_string(),
                    id: company.clone(),
                    name: company,
                })
                .collect();

            Ok(RelationshipGraph { nodes, edges })
        })
    }

    pub fn region_counts(&self, label: CompanyLabel) -> CnResult<Vec<RegionCount>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT region, COUNT(*) FROM companies
                     WHERE label = ?1 AND region IS NOT NULL
                     GROUP BY region ORDER BY region",
                )
                .map_err(|e| CnError::Graph(e.to_string()))?;
            let rows = stmt
                .query_map(params![label.as_str()], |row| {
                    Ok(RegionCount {
                        name: row.get(0)?,
                        count: row.get::<_, i64>(1)? as usize,
                    })
                })
                .map_err(|e| CnError::Graph(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| CnError::Graph(e.to_string()))
        })
    }

    pub fn province_counts(&self, label: CompanyLabel, region: &str) -> CnResult<Vec<RegionCount>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT province, COUNT(*) FROM companies
                     WHERE label = ?1 AND region = ?2 AND province IS NOT NULL
                     GROUP BY province ORDER BY province",
                )
                .map_err(|e| CnError::Graph(e.to_string()))?;
            let rows = stmt
                .query_map(params![label.as_str(), region], |row| {
                    Ok(RegionCount {
                        name: row.get(0)?,
                        count: row.get::<_, i64>(1)? as usize,
                    })
                })
                .map_err(|e| CnError::Graph(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| CnError::Graph(e.to_string()))
        })
    }

    // -----------------------------------------------------------------------
    // Seeding (CLI + tests)
    // -----------------------------------------------------------------------

    pub fn insert_company(&self, label: CompanyLabel, company: &Company) -> CnResult<()> {
        self.with_conn(|conn| {
            let id = Uuid::now_v7().to_string();
            conn.execute(
                "INSERT INTO companies
                     (id, label, name, description, address, website, region, province, trl, activity_start)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id,
                    label.as_str(),
                    company.name,
                    company.description,
                    company.address,
                    company.website,
                    company.region,
                    company.province,
                    company.trl,
                    company.activity_start,
                ],
            )
            .map_err(|e| CnError::Graph(format!("insert company: {e}")))?;

            for sector in &company.sectors {
                conn.execute(
                    "INSERT INTO company_sectors (company_id, sector) VALUES (?1, ?2)",
                    params![id, sector],
                )
                .map_err(|e| CnError::Graph(format!("insert sector: {e}")))?;
            }
            Ok(())
        })
    }

    pub fn insert_relationship(
        &self,
        label: CompanyLabel,
        from: &str,
        to: &str,
        kind: &str,
        weight: f64,
        description: Option<&str>,
    ) -> CnResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO company_relationships
                     (id, label, from_name, to_name, kind, weight, description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    Uuid::now_v7().to_string(),
                    label.as_str(),
                    from,
                    to,
                    kind,
                    weight,
                    description,
                ],
            )
            .map_err(|e| CnError::Graph(format!("insert relationship: {e}")))?;
            Ok(())
        })
    }

    /// Load the demo dataset used by `cn db seed-graph` and the tests.
    pub fn seed_demo(&self) -> CnResult<()> {
        for (label, company) in crate::fallback::demo_companies() {
            self.insert_company(label, &company)?;
        }
        for (label, from, to, kind, weight) in crate::fallback::demo_relationships() {
            self.insert_relationship(label, from, to, kind, weight, None)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SqliteCompanyGraph {
        let store = SqliteCompanyGraph::open_in_memory().unwrap();
        store.seed_demo().unwrap();
        store
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let store = seeded();
        let hits = store.search(CompanyLabel::Suk, "acme").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Acme Corporation");
        assert!(store.search(CompanyLabel::Suk, "zzz").unwrap().is_empty());
    }

    #[test]
    fn aggregations_count_and_cap_samples() {
        let store = seeded();
        let aggregates = store.sector_aggregations(CompanyLabel::Suk).unwrap();
        assert!(!aggregates.is_empty());
        assert!(aggregates.len() <= SECTOR_AGGREGATION_LIMIT);
        // Sorted by member count descending.
        assert!(aggregates.windows(2).all(|w| w[0].count >= w[1].count));
        for aggregate in &aggregates {
            assert!(aggregate.sample_companies.len() <= SECTOR_SAMPLE_SIZE);
            assert!(aggregate.sample_companies.len() <= aggregate.count);
        }
    }

    #[test]
    fn relationships_filter_weak_edges() {
        let store = seeded();
        store
            .insert_relationship(CompanyLabel::Suk, "Acme Corporation", "Weak Link", "client", 1.0, None)
            .unwrap();

        let graph = store
            .relationships(CompanyLabel::Suk, "Acme Corporation")
            .unwrap();
        assert!(graph.edges.iter().all(|e| e.weight >= MIN_RELATIONSHIP_WEIGHT));
        assert!(graph.nodes.iter().any(|n| n.node_type == "center"));
        assert!(!graph.nodes.iter().any(|n| n.name == "Weak Link"));
    }

    #[test]
    fn region_and_province_counts() {
        let store = seeded();
        let regions = store.region_counts(CompanyLabel::Startup).unwrap();
        assert!(regions.iter().any(|r| r.name == "Lombardia"));

        let provinces = store
            .province_counts(CompanyLabel::Startup, "Lombardia")
            .unwrap();
        assert!(!provinces.is_empty());
    }

    #[test]
    fn details_are_label_scoped() {
        let store = seeded();
        assert!(store
            .company_details(CompanyLabel::Suk, "Acme Corporation")
            .unwrap()
            .is_some());
        assert!(store
            .company_details(CompanyLabel::Startup, "Acme Corporation")
            .unwrap()
            .is_none());
    }
}

//! Fixed degraded dataset served when the company graph store is
//! unavailable. Keeps the user-facing chat and dashboards alive instead of
//! failing the request.

use cn_core::{
    Company, CompanyLabel, GraphEdge, GraphNode, RegionCount, RelationshipGraph, SectorAggregate,
};

pub fn company_count(_label: CompanyLabel) -> usize {
    150
}

pub fn sector_count(_label: CompanyLabel) -> usize {
    15
}

pub fn companies(label: CompanyLabel) -> Vec<Company> {
    match label {
        CompanyLabel::Suk => vec![
            company("Acme Corporation", &["Technology", "Artificial Intelligence"], "Software development company", Some(("Lombardia", "MI"))),
            company("Beta Industries", &["Manufacturing"], "Industrial equipment manufacturer", Some(("Lombardia", "BG"))),
            company("Gamma Solutions", &["Consulting", "Data Analysis"], "Business consulting services", Some(("Lazio", "RM"))),
            company("Delta Logistics", &["Transportation"], "Logistics and shipping services", Some(("Veneto", "VE"))),
            company("Epsilon Energy", &["Energy"], "Renewable energy solutions", Some(("Piemonte", "TO"))),
        ],
        CompanyLabel::Startup => vec![
            company("Startup Corp", &["Software Development"], "Custom software products", Some(("Lombardia", "MI"))),
            company("Tech Solutions", &["IoT", "Automation"], "IoT solutions and automation", Some(("Lombardia", "BS"))),
            company("Innovation Hub", &["Digital Consulting"], "Digital consulting", Some(("Lazio", "RM"))),
        ],
        CompanyLabel::Federterziario => vec![
            company("Federterziario Corp", &["Services"], "Service company", None),
            company("Tertiary Solutions", &["Consulting"], "Business consulting", None),
            company("Service Industries", &["Technology"], "Tech services", None),
        ],
    }
}

pub fn companies_by_sector(_label: CompanyLabel, sector: &str) -> Vec<Company> {
    vec![
        Company {
            name: "Mock Company 1".into(),
            sectors: vec![sector.to_string()],
            description: Some("Mock description for testing".into()),
            website: Some("https://example.com".into()),
            ..Default::default()
        },
        Company {
            name: "Mock Company 2".into(),
            sectors: vec![sector.to_string()],
            description: Some("Another mock description".into()),
            website: Some("https://example2.com".into()),
            ..Default::default()
        },
    ]
}

pub fn sector_aggregations(_label: CompanyLabel) -> Vec<SectorAggregate> {
    let entry = |sector: &str, count: usize, samples: &[&str]| SectorAggregate {
        sector: sector.to_string(),
        count,
        sample_companies: samples.iter().map(|s| s.to_string()).collect(),
    };
    vec![
        entry("Artificial Intelligence", 4, &["Company1", "Company2", "Company3"]),
        entry("Data Analysis", 3, &["Company2", "Company4"]),
        entry("Digital Technologies", 1, &["Company1"]),
        entry("Image Recognition", 1, &["Company1"]),
        entry("IoT", 1, &["Company1"]),
    ]
}

pub fn relationships(_label: CompanyLabel, name: &str) -> RelationshipGraph {
    let node = |id: &str, node_type: &str| GraphNode {
        id: id.to_string(),
        name: id.to_string(),
        node_type: node_type.to_string(),
    };
    let edge = |target: &str, weight: f64, kind: &str, description: &str| GraphEdge {
        source: name.to_string(),
        target: target.to_string(),
        weight,
        edge_type: kind.to_string(),
        description: Some(description.to_string()),
    };

    RelationshipGraph {
        nodes: vec![
            node(name, "center"),
            node("Related Company 1", "related"),
            node("Related Company 2", "related"),
        ],
        edges: vec![
            edge("Related Company 1", 5.0, "partnership", "Strategic partnership"),
            edge("Related Company 2", 4.0, "client", "Client relationship"),
        ],
    }
}

pub fn region_counts(_label: CompanyLabel) -> Vec<RegionCount> {
    counts(&[
        ("Lombardia", 45),
        ("Lazio", 32),
        ("Veneto", 28),
        ("Piemonte", 24),
        ("Emilia-Romagna", 21),
    ])
}

pub fn province_counts(_label: CompanyLabel, _region: &str) -> Vec<RegionCount> {
    counts(&[("MI", 25), ("BG", 12), ("BS", 8)])
}

fn counts(pairs: &[(&str, usize)]) -> Vec<RegionCount> {
    pairs
        .iter()
        .map(|(name, count)| RegionCount {
            name: name.to_string(),
            count: *count,
        })
        .collect()
}

fn company(
    name: &str,
    sectors: &[&str],
    description: &str,
    location: Option<(&str, &str)>,
) -> Company {
    Company {
        name: name.to_string(),
        sectors: sectors.iter().map(|s| s.to_string()).collect(),
        description: Some(description.to_string()),
        region: location.map(|(region, _)| region.to_string()),
        province: location.map(|(_, province)| province.to_string()),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Demo dataset (CLI seed + tests)
// ---------------------------------------------------------------------------

pub fn demo_companies() -> Vec<(CompanyLabel, Company)> {
    let mut out = Vec::new();
    for label in [
        CompanyLabel::Suk,
        CompanyLabel::Startup,
        CompanyLabel::Federterziario,
    ] {
        for company in companies(label) {
            out.push((label, company));
        }
    }
    out
}

pub fn demo_relationships() -> Vec<(CompanyLabel, &'static str, &'static str, &'static str, f64)> {
    vec![
        (CompanyLabel::Suk, "Acme Corporation", "Beta Industries", "partnership", 5.0),
        (CompanyLabel::Suk, "Acme Corporation", "Gamma Solutions", "client", 4.0),
        (CompanyLabel::Suk, "Beta Industries", "Delta Logistics", "supplier", 3.0),
        (CompanyLabel::Startup, "Startup Corp", "Tech Solutions", "partnership", 4.0),
    ]
}

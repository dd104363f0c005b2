//! Dependency reach: package changes that touch web frameworks or database
//! drivers correlate with the api and database layers.

use once_cell::sync::Lazy;
use regex::Regex;

use driftgate_core::{DriftType, Evidence, Result, Signal};

use crate::snapshot::Snapshot;

use super::CorrelationStrategy;

const WEB_FRAMEWORKS: &[&str] = &[
    "express", "fastify", "koa", "hapi", "restify", "nest", "next", "flask", "fastapi",
    "django", "gin", "echo", "chi", "spring-web",
];
const DB_LIBRARIES: &[&str] = &[
    "pg", "mysql", "mysql2", "sqlite3", "mongoose", "mongodb", "prisma", "sequelize", "knex",
    "typeorm", "sqlalchemy", "psycopg2", "gorm", "redis",
];

static DEP_CHANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:DEPENDENCY_ADDED|DEPENDENCY_REMOVED|MAJOR_VERSION_BUMP|MINOR_VERSION_BUMP|PATCH):\s*([\w@./-]+?)(?:@[\d^~=v].*)?(?:\s*\(.*)?$",
    )
    .unwrap()
});

/// Package names named by a finding's dependency indicators.
pub fn changed_packages(changes: &[String]) -> Vec<String> {
    changes
        .iter()
        .filter_map(|c| DEP_CHANGE.captures(c))
        .map(|caps| caps[1].to_lowercase())
        .collect()
}

pub struct DependencyStrategy;

impl CorrelationStrategy for DependencyStrategy {
    fn name(&self) -> &'static str {
        "dependency"
    }

    fn default_weight(&self) -> f64 {
        0.6
    }

    fn run(&self, snapshot: &Snapshot) -> Result<Vec<Signal>> {
        let mut signals = Vec::new();
        for config in snapshot.by_type(DriftType::Configuration) {
            let packages = changed_packages(&config.changes);
            if packages.is_empty() {
                continue;
            }
            let source = snapshot.id_of(config);

            let web: Vec<&String> = packages
                .iter()
                .filter(|p| WEB_FRAMEWORKS.contains(&p.as_str()))
                .collect();
            if !web.is_empty() {
                for api in snapshot.by_type(DriftType::Api) {
                    let target = snapshot.id_of(api);
                    if !snapshot.pair_allowed(source, target) {
                        continue;
                    }
                    signals.push(Signal {
                        source: source.to_string(),
                        target: target.to_string(),
                        strategy: self.name().to_string(),
                        relationship: "dependency_affects_api".to_string(),
                        confidence: 0.6,
                        evidence: vec![Evidence::reason(format!(
                            "web framework change: {}",
                            web[0]
                        ))],
                    });
                }
            }

            let db: Vec<&String> = packages
                .iter()
                .filter(|p| DB_LIBRARIES.contains(&p.as_str()))
                .collect();
            if !db.is_empty() {
                for database in snapshot.by_type(DriftType::Database) {
                    let target = snapshot.id_of(database);
                    if !snapshot.pair_allowed(source, target) {
                        continue;
                    }
                    signals.push(Signal {
                        source: source.to_string(),
                        target: target.to_string(),
                        strategy: self.name().to_string(),
                        relationship: "dependency_affects_db".to_string(),
                        confidence: 0.6,
                        evidence: vec![Evidence::reason(format!(
                            "database library change: {}",
                            db[0]
                        ))],
                    });
                }
            }
        }
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use driftgate_core::{expand_findings, DriftFinding};
    use driftgate_parser::CodeIndex;

    fn snapshot(findings: Vec<DriftFinding>) -> Snapshot {
        Snapshot::new(
            expand_findings(findings),
            Arc::new(CodeIndex::default()),
            2,
        )
    }

    #[test]
    fn package_names_parse_from_indicators() {
        let changes = vec![
            "MAJOR_VERSION_BUMP: express (^4.18.0 -> ^5.0.0)".to_string(),
            "DEPENDENCY_ADDED: pg@8.11.0".to_string(),
            "DEPENDENCY_REMOVED: left-pad".to_string(),
            "LICENSE_CHANGE: MIT -> GPL-3.0".to_string(),
        ];
        assert_eq!(changed_packages(&changes), vec!["express", "pg", "left-pad"]);
    }

    #[test]
    fn framework_bump_reaches_api_layer() {
        let mut config = DriftFinding::new(DriftType::Configuration, "package.json");
        config.changes = vec!["MAJOR_VERSION_BUMP: express (^4.18.0 -> ^5.0.0)".into()];
        let mut api = DriftFinding::new(DriftType::Api, "openapi.yaml");
        api.endpoints = vec!["GET:/users".into()];

        let signals = DependencyStrategy.run(&snapshot(vec![config, api])).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].relationship, "dependency_affects_api");
    }

    #[test]
    fn driver_change_reaches_db_layer() {
        let mut config = DriftFinding::new(DriftType::Configuration, "package.json");
        config.changes = vec!["DEPENDENCY_ADDED: prisma@5.0.0".into()];
        let mut db = DriftFinding::new(DriftType::Database, "m.sql");
        db.entities = vec!["users".into()];

        let signals = DependencyStrategy.run(&snapshot(vec![config, db])).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].relationship, "dependency_affects_db");
    }
}

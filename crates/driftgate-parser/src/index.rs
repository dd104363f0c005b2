//! The per-run code index: analyzed files, and the shallow call-graph BFS
//! that connects handlers to database call sites.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use crate::types::{DbRef, FileAnalysis, Handler};

#[derive(Debug, Default, Clone)]
pub struct CodeIndex {
    pub files: BTreeMap<String, Arc<FileAnalysis>>,
}

impl CodeIndex {
    pub fn handlers(&self) -> impl Iterator<Item = &Handler> {
        self.files.values().flat_map(|f| f.handlers.iter())
    }

    pub fn db_refs(&self) -> impl Iterator<Item = &DbRef> {
        self.files.values().flat_map(|f| f.db_refs.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Resolve an import source to an analyzed file by its stem
    /// (`./users-service` -> `src/users-service.js`).
    fn resolve_import(&self, source: &str) -> Option<&str> {
        let stem = source
            .trim_end_matches('/')
            .rsplit(|c| c == '/' || c == '.')
            .find(|s| !s.is_empty())?;
        self.files.keys().map(String::as_str).find(|path| {
            let file_name = path.rsplit('/').next().unwrap_or(path);
            let file_stem = file_name.split('.').next().unwrap_or(file_name);
            file_stem == stem
        })
    }

    /// Shallow BFS over call edges from one symbol, up to `depth` hops.
    /// Returns each reachable `(file, symbol)` with its hop count.
    pub fn reachable(
        &self,
        file: &str,
        symbol: &str,
        depth: usize,
    ) -> HashMap<(String, String), usize> {
        let mut seen: HashMap<(String, String), usize> = HashMap::new();
        let mut queue = VecDeque::new();
        seen.insert((file.to_string(), symbol.to_string()), 0);
        queue.push_back((file.to_string(), symbol.to_string(), 0usize));

        while let Some((current_file, current_symbol, hops)) = queue.pop_front() {
            if hops >= depth {
                continue;
            }
            let Some(analysis) = self.files.get(&current_file) else {
                continue;
            };
            for call in analysis
                .calls
                .iter()
                .filter(|c| c.caller == current_symbol)
            {
                let mut targets: Vec<(String, String)> =
                    vec![(current_file.clone(), call.callee.clone())];
                if let Some(import) = analysis
                    .imports
                    .iter()
                    .find(|i| i.local == call.callee)
                {
                    if let Some(target_file) = self.resolve_import(&import.source) {
                        targets.push((target_file.to_string(), call.callee.clone()));
                    }
                }
                for target in targets {
                    if !seen.contains_key(&target) {
                        seen.insert(target.clone(), hops + 1);
                        queue.push_back((target.0, target.1, hops + 1));
                    }
                }
            }
        }
        seen
    }

    /// Database call sites a handler can reach within `depth` hops, with the
    /// hop count at which each was found.
    pub fn accesses<'a>(&'a self, handler: &Handler, depth: usize) -> Vec<(&'a DbRef, usize)> {
        let reachable = self.reachable(&handler.file, &handler.symbol, depth);
        let mut out = Vec::new();
        for db_ref in self.db_refs() {
            if let Some(hops) = reachable.get(&(db_ref.file.clone(), db_ref.symbol.clone())) {
                out.push((db_ref, *hops));
            }
        }
        out.sort_by_key(|(_, hops)| *hops);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CallEdge, Import};

    fn analysis(
        handlers: Vec<Handler>,
        db_refs: Vec<DbRef>,
        calls: Vec<CallEdge>,
        imports: Vec<Import>,
    ) -> Arc<FileAnalysis> {
        Arc::new(FileAnalysis {
            hash: "h".into(),
            handlers,
            db_refs,
            calls,
            imports,
        })
    }

    fn handler(file: &str, symbol: &str) -> Handler {
        Handler {
            method: "GET".into(),
            path: "/v1/users/:id".into(),
            file: file.into(),
            symbol: symbol.into(),
            line: 1,
        }
    }

    fn db_ref(file: &str, symbol: &str, table: &str) -> DbRef {
        DbRef {
            orm: "prisma".into(),
            table: table.into(),
            op: Some("SELECT".into()),
            file: file.into(),
            symbol: symbol.into(),
            line: 7,
            inferred: true,
        }
    }

    #[test]
    fn same_function_access_is_zero_hops() {
        let mut index = CodeIndex::default();
        index.files.insert(
            "src/routes/users.js".into(),
            analysis(
                vec![handler("src/routes/users.js", "getUserById")],
                vec![db_ref("src/routes/users.js", "getUserById", "users")],
                vec![],
                vec![],
            ),
        );
        let h = handler("src/routes/users.js", "getUserById");
        let accesses = index.accesses(&h, 2);
        assert_eq!(accesses.len(), 1);
        assert_eq!(accesses[0].1, 0);
    }

    #[test]
    fn cross_file_access_through_import_is_one_hop() {
        let mut index = CodeIndex::default();
        index.files.insert(
            "src/routes/users.js".into(),
            analysis(
                vec![handler("src/routes/users.js", "getUserById")],
                vec![],
                vec![CallEdge {
                    caller: "getUserById".into(),
                    callee: "loadUser".into(),
                    line: 3,
                }],
                vec![Import {
                    local: "loadUser".into(),
                    source: "./users-service".into(),
                }],
            ),
        );
        index.files.insert(
            "src/users-service.js".into(),
            analysis(
                vec![],
                vec![db_ref("src/users-service.js", "loadUser", "users")],
                vec![],
                vec![],
            ),
        );
        let h = handler("src/routes/users.js", "getUserById");
        let accesses = index.accesses(&h, 2);
        assert_eq!(accesses.len(), 1);
        assert_eq!(accesses[0].1, 1);
    }

    #[test]
    fn depth_limit_bounds_the_walk() {
        let mut index = CodeIndex::default();
        index.files.insert(
            "a.js".into(),
            analysis(
                vec![handler("a.js", "h")],
                vec![db_ref("a.js", "d", "users")],
                vec![
                    CallEdge { caller: "h".into(), callee: "m1".into(), line: 1 },
                    CallEdge { caller: "m1".into(), callee: "m2".into(), line: 2 },
                    CallEdge { caller: "m2".into(), callee: "d".into(), line: 3 },
                ],
                vec![],
            ),
        );
        let h = handler("a.js", "h");
        assert!(index.accesses(&h, 2).is_empty());
        let accesses = index.accesses(&h, 3);
        assert_eq!(accesses.len(), 1);
        assert_eq!(accesses[0].1, 3);
    }
}

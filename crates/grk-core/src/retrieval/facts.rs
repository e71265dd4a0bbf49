//! Cached loading of per-project stack facts and route index.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use grk_db::{Cache, MemoryCache};

use crate::config::StoreConfig;
use crate::errors::GrkError;
use crate::routes::RouteIndex;
use crate::stack::StackFacts;
use crate::workspace::Workspace;

/// Stack facts and route index of one project.
#[derive(Debug, Clone, Default)]
pub struct ProjectFacts {
    pub stack: Arc<StackFacts>,
    pub routes: Arc<RouteIndex>,
}

/// Loads [`ProjectFacts`] through TTL caches keyed by project root.
pub struct FactsCache {
    stacks: Arc<dyn Cache<Arc<StackFacts>>>,
    routes: Arc<dyn Cache<Arc<RouteIndex>>>,
    ttl: Duration,
}

impl FactsCache {
    pub fn new(
        stacks: Arc<dyn Cache<Arc<StackFacts>>>,
        routes: Arc<dyn Cache<Arc<RouteIndex>>>,
        ttl: Duration,
    ) -> Self {
        Self { stacks, routes, ttl }
    }

    /// In-memory caches sized from the store configuration.
    pub fn in_memory(config: &StoreConfig) -> Self {
        Self::new(
            Arc::new(MemoryCache::new(config.cache_capacity)),
            Arc::new(MemoryCache::new(config.cache_capacity)),
            Duration::from_secs(config.cache_ttl_secs),
        )
    }

    pub fn load(&self, workspace: &Workspace) -> Result<ProjectFacts, GrkError> {
        let key = cache_key(workspace.root());

        let stack = match self.stacks.get(&key) {
            Some(stack) => stack,
            None => {
                let stack = Arc::new(StackFacts::load(&workspace.stack_path())?);
                self.stacks.put(&key, Arc::clone(&stack), self.ttl);
                stack
            }
        };

        let routes = match self.routes.get(&key) {
            Some(routes) => routes,
            None => {
                let routes = Arc::new(RouteIndex::load(&workspace.routes_path())?);
                self.routes.put(&key, Arc::clone(&routes), self.ttl);
                routes
            }
        };

        Ok(ProjectFacts { stack, routes })
    }

    /// Forget cached facts of a project.
    pub fn invalidate(&self, workspace: &Workspace) {
        let key = cache_key(workspace.root());
        self.stacks.invalidate(&key);
        self.routes.invalidate(&key);
    }
}

impl std::fmt::Debug for FactsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactsCache").field("ttl", &self.ttl).finish()
    }
}

fn cache_key(root: &Path) -> String {
    root.to_string_lossy().into_owned()
}

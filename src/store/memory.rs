//! In-memory route store.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;

use crate::store::{Route, RouteStore, StoreError};

/// Route store held entirely in memory, indexed by `(from, to)`.
#[derive(Debug, Default)]
pub struct InMemoryRouteStore {
    routes: HashMap<(String, String), Vec<Route>>,
}

impl InMemoryRouteStore {
    pub fn new(routes: Vec<Route>) -> Self {
        let mut index: HashMap<(String, String), Vec<Route>> = HashMap::new();
        for route in routes {
            let route = Route {
                from: route.from.to_ascii_uppercase(),
                to: route.to.to_ascii_uppercase(),
                airline: route.airline,
            };
            index
                .entry((route.from.clone(), route.to.clone()))
                .or_default()
                .push(route);
        }
        Self { routes: index }
    }

    /// Load routes from a JSON array of `{from, to, airline}` objects.
    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path)
            .map_err(|e| StoreError::Load(format!("{}: {}", path.display(), e)))?;
        let routes: Vec<Route> = serde_json::from_str(&content)
            .map_err(|e| StoreError::Load(format!("{}: {}", path.display(), e)))?;
        tracing::info!(path = %path.display(), routes = routes.len(), "Route data loaded");
        Ok(Self::new(routes))
    }

    /// Small built-in data set used when no route file is configured.
    pub fn with_sample_data() -> Self {
        let sample = [
            ("OPO", "LIS", "TAP Portugal"),
            ("OPO", "LIS", "Ryanair"),
            ("LIS", "OPO", "TAP Portugal"),
            ("LIS", "LHR", "British Airways"),
            ("LIS", "LHR", "TAP Portugal"),
            ("LHR", "JFK", "American Airlines"),
            ("LHR", "JFK", "British Airways"),
            ("OPO", "CDG", "Air France"),
            ("CDG", "OPO", "easyJet"),
        ];
        Self::new(
            sample
                .iter()
                .map(|(from, to, airline)| Route {
                    from: from.to_string(),
                    to: to.to_string(),
                    airline: airline.to_string(),
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[async_trait]
impl RouteStore for InMemoryRouteStore {
    async fn find_routes(&self, from: &str, to: &str) -> Result<Vec<Route>, StoreError> {
        let key = (from.to_ascii_uppercase(), to.to_ascii_uppercase());
        Ok(self.routes.get(&key).cloned().unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

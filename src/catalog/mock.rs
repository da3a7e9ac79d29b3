//! Recording catalog client for tests.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::catalog::client::CatalogClient;
use crate::catalog::error::{CatalogError, Result};

#[derive(Clone, Default)]
pub struct MockCatalog {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub workspaces: Arc<Mutex<Vec<String>>>,
    /// HTTP status every call fails with.
    pub fail_with: Option<u16>,
}

impl MockCatalog {
    pub fn with_workspaces(names: &[&str]) -> Self {
        let mock = Self::default();
        mock.workspaces
            .lock()
            .unwrap()
            .extend(names.iter().map(|n| n.to_string()));
        mock
    }

    pub fn failing(status: u16) -> Self {
        Self {
            fail_with: Some(status),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, method: &'static str, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call.clone());
        match self.fail_with {
            Some(status) => Err(CatalogError::Status {
                method,
                url: call,
                status,
            }),
            None => Ok(()),
        }
    }
}

impl CatalogClient for MockCatalog {
    fn workspace_names(&self) -> Result<Vec<String>> {
        self.record("GET", "workspaces".to_string())?;
        Ok(self.workspaces.lock().unwrap().clone())
    }

    fn create_workspace(&self, name: &str) -> Result<()> {
        self.record("POST", format!("create_workspace {name}"))?;
        self.workspaces.lock().unwrap().push(name.to_string());
        Ok(())
    }

    fn delete_workspace(&self, name: &str) -> Result<()> {
        self.record("DELETE", format!("delete_workspace {name}"))?;
        self.workspaces.lock().unwrap().retain(|n| n != name);
        Ok(())
    }

    fn create_external_geotiff_store(&self, workspace: &str, store: &str, path: &Path) -> Result<()> {
        self.record("PUT", format!("create_store {workspace}:{store} {}", path.display()))
    }

    fn delete_store(&self, workspace: &str, store: &str) -> Result<()> {
        self.record("DELETE", format!("delete_store {workspace}:{store}"))
    }

    fn reload(&self) -> Result<()> {
        self.record("POST", "reload".to_string())
    }
}

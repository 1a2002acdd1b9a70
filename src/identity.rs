//! Tenant identity bootstrap.
//!
//! The installation-unique agent identifier and the tenant/company
//! identifier are read once at startup from local files. A missing or
//! empty file is a fatal startup error, not a per-file error; the
//! identity is owned for the process lifetime and never re-read mid-run.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantIdentity {
    pub agent_id: String,
    pub company_id: String,
}

impl TenantIdentity {
    pub fn load(agent_id_path: &Path, company_id_path: &Path) -> Result<Self> {
        Ok(Self {
            agent_id: read_identity_file(agent_id_path, "agent id")?,
            company_id: read_identity_file(company_id_path, "company id")?,
        })
    }
}

fn read_identity_file(path: &Path, what: &str) -> Result<String> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read {} file {}", what, path.display()))?;
    let value = raw.trim();
    if value.is_empty() {
        return Err(anyhow!("{} file {} is empty", what, path.display()));
    }
    Ok(value.to_string())
}

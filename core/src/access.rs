//! Email allow-list gates for the dashboard.
//!
//! Two gates share one contract (`AccessGate`): the primary gate admits a user
//! to the dashboard, the operator gate admits them to the AGI view and decides
//! their role. Allow-lists are re-read on every attempt and compared
//! case-insensitively.

use crate::{config::MonitorConfig, error::AccessDenied};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One email per non-empty line.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    entries: HashSet<String>,
}

impl AllowList {
    pub fn load(path: &Path) -> Result<Self, AccessDenied> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AccessDenied::AllowListMissing {
                path: path.display().to_string(),
            },
            _ => AccessDenied::AllowListUnreadable {
                path:   path.display().to_string(),
                source: e,
            },
        })?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(normalize_email)
            .collect();
        Self { entries }
    }

    pub fn contains(&self, email: &str) -> bool {
        self.entries.contains(&normalize_email(email))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Upper-cased local part of an address: `jdoe@bank.cm` → `JDOE`.
pub fn operator_code(email: &str) -> String {
    let trimmed = email.trim();
    trimmed
        .split_once('@')
        .map(|(local, _)| local)
        .unwrap_or(trimmed)
        .to_uppercase()
}

/// The contract every gate fulfils.
pub trait AccessGate {
    type Grant;

    fn authorize(&self, email: &str) -> Result<Self::Grant, AccessDenied>;
}

// ── Primary gate ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryGrant {
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct PrimaryGate {
    allow_list: PathBuf,
}

impl PrimaryGate {
    pub fn new(allow_list: impl Into<PathBuf>) -> Self {
        Self { allow_list: allow_list.into() }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(&config.allow_list)
    }
}

impl AccessGate for PrimaryGate {
    type Grant = PrimaryGrant;

    fn authorize(&self, email: &str) -> Result<PrimaryGrant, AccessDenied> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AccessDenied::EmptyEmail);
        }
        let list = AllowList::load(&self.allow_list)?;
        if !list.contains(email) {
            log::warn!("dashboard login refused for {email}");
            return Err(AccessDenied::NotAllowed { email: email.to_string() });
        }
        log::info!("dashboard login granted for {email}");
        Ok(PrimaryGrant { email: email.to_string() })
    }
}

// ── Operator (AGI) gate ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Role {
    /// Sees every operator.
    Supervisor,
    /// Sees only the operator named by `scope`.
    Standard { scope: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryGrant {
    pub email: String,
    pub role:  Role,
}

impl SecondaryGrant {
    /// The operator code a standard user is pinned to.
    pub fn forced_scope(&self) -> Option<&str> {
        match &self.role {
            Role::Supervisor         => None,
            Role::Standard { scope } => Some(scope),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecondaryGate {
    allow_list:  PathBuf,
    supervisors: HashSet<String>,
}

impl SecondaryGate {
    pub fn new<I, S>(allow_list: impl Into<PathBuf>, supervisors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allow_list:  allow_list.into(),
            supervisors: supervisors.into_iter().map(|s| normalize_email(s.as_ref())).collect(),
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        if config.supervisors.is_empty() {
            log::warn!("OPSMON_SUPERVISORS is empty; every AGI user gets a scoped view");
        }
        Self::new(&config.agi_allow_list, &config.supervisors)
    }

    pub fn role_for(&self, email: &str) -> Role {
        if self.supervisors.contains(&normalize_email(email)) {
            Role::Supervisor
        } else {
            Role::Standard { scope: operator_code(email) }
        }
    }
}

impl AccessGate for SecondaryGate {
    type Grant = SecondaryGrant;

    fn authorize(&self, email: &str) -> Result<SecondaryGrant, AccessDenied> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AccessDenied::EmptyEmail);
        }
        let list = AllowList::load(&self.allow_list)?;
        if !list.contains(email) {
            log::warn!("AGI access refused for {email}");
            return Err(AccessDenied::NotAllowedForAgi { email: email.to_string() });
        }
        let role = self.role_for(email);
        log::info!("AGI access granted for {email} as {role:?}");
        Ok(SecondaryGrant { email: email.to_string(), role })
    }
}

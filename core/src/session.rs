//! Per-user dashboard session state.
//!
//! A `SessionContext` is created when a user opens the dashboard, mutated by
//! their actions, and dropped when they leave. Nothing in it is shared
//! between sessions.
//!
//!   unauthenticated --login ok--> authenticated (Agence view)
//!   authenticated --select AGI, no grant--> secondary prompt pending
//!   prompt pending --AGI login ok--> AGI view (grant kept for the session)

use crate::{
    access::{AccessGate, PrimaryGate, PrimaryGrant, Role, SecondaryGate, SecondaryGrant},
    error::AccessDenied,
    types::EntityKind,
};
use serde::Serialize;

/// What happened when the user asked for a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewSwitch {
    Switched,
    SecondaryAuthRequired,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionContext {
    primary:   Option<PrimaryGrant>,
    secondary: Option<SecondaryGrant>,
    view:      Option<EntityKind>,
    secondary_prompt_pending: bool,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.primary.is_some()
    }

    pub fn user_email(&self) -> Option<&str> {
        self.primary.as_ref().map(|g| g.email.as_str())
    }

    pub fn secondary(&self) -> Option<&SecondaryGrant> {
        self.secondary.as_ref()
    }

    pub fn agi_role(&self) -> Option<&Role> {
        self.secondary.as_ref().map(|g| &g.role)
    }

    pub fn secondary_prompt_pending(&self) -> bool {
        self.secondary_prompt_pending
    }

    /// The active view; the branch view until the user picks otherwise.
    pub fn view(&self) -> EntityKind {
        self.view.unwrap_or(EntityKind::Agence)
    }

    /// Submit an email to the primary gate. Every attempt starts from a blank
    /// session: grants from an earlier login never carry over, and a refusal
    /// leaves the session unauthenticated so the user can retry.
    pub fn login(&mut self, gate: &PrimaryGate, email: &str) -> Result<(), AccessDenied> {
        *self = Self::default();
        let grant = gate.authorize(email)?;
        self.primary = Some(grant);
        self.view = Some(EntityKind::Agence);
        Ok(())
    }

    pub fn require_login(&self) -> Result<&PrimaryGrant, AccessDenied> {
        self.primary.as_ref().ok_or(AccessDenied::NotLoggedIn)
    }

    /// Switch views. The AGI view needs a secondary grant, asked for once
    /// per session.
    pub fn select_view(&mut self, kind: EntityKind) -> Result<ViewSwitch, AccessDenied> {
        self.require_login()?;
        match kind {
            EntityKind::Agence => {
                self.view = Some(EntityKind::Agence);
                self.secondary_prompt_pending = false;
                Ok(ViewSwitch::Switched)
            }
            EntityKind::Agi if self.secondary.is_some() => {
                self.view = Some(EntityKind::Agi);
                self.secondary_prompt_pending = false;
                Ok(ViewSwitch::Switched)
            }
            EntityKind::Agi => {
                self.secondary_prompt_pending = true;
                Ok(ViewSwitch::SecondaryAuthRequired)
            }
        }
    }

    /// Submit an email to the AGI gate; on success the AGI view becomes active.
    pub fn authorize_secondary(
        &mut self,
        gate: &SecondaryGate,
        email: &str,
    ) -> Result<&SecondaryGrant, AccessDenied> {
        self.require_login()?;
        let grant = gate.authorize(email)?;
        self.view = Some(EntityKind::Agi);
        self.secondary_prompt_pending = false;
        Ok(self.secondary.insert(grant))
    }

    pub fn logout(&mut self) {
        *self = Self::default();
    }
}

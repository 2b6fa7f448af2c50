//! Lead record stores: sled-backed primary, in-process local fallback, and
//! the adapter that routes between them by persistence mode.
use crate::config::{PersistenceContext, PersistenceMode};
use crate::error::LeadError;
use crate::lead::{Lead, LeadStatus, LeadType, ReviewStatus};
use crate::utils::new_uuid_to_bech32;
use parking_lot::RwLock;
use sled::Batch;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

const LEAD_ID_PREFIX: &str = "lead_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadFilter {
    All,
    AssignedTo(String),
    CloserAssignedTo(String),
    PaidAppraisal,
    Status(LeadStatus),
    LeadType(LeadType),
    LegalStatus(ReviewStatus),
    CommercialStatus(ReviewStatus),
}

impl LeadFilter {
    pub fn matches(&self, lead: &Lead) -> bool {
        match self {
            LeadFilter::All => true,
            LeadFilter::AssignedTo(uid) => lead.assigned_to.as_deref() == Some(uid.as_str()),
            LeadFilter::CloserAssignedTo(uid) => {
                lead.closer_assigned_to.as_deref() == Some(uid.as_str())
            }
            LeadFilter::PaidAppraisal => lead.paid_appraisal(),
            LeadFilter::Status(status) => lead.status == *status,
            LeadFilter::LeadType(lead_type) => lead.lead_type == *lead_type,
            LeadFilter::LegalStatus(status) => lead.legal_status() == Some(*status),
            LeadFilter::CommercialStatus(status) => lead.commercial_status() == Some(*status),
        }
    }
}

pub trait LeadStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Lead, LeadError>;
    fn query(&self, filter: &LeadFilter) -> Result<Vec<Lead>, LeadError>;
    /// Writes the whole record under `lead.id`.
    fn write(&self, lead: &Lead) -> Result<(), LeadError>;
    fn batch_delete(&self, ids: &[String]) -> Result<(), LeadError>;
    /// Assigns a fresh id, stores the lead and returns the id.
    fn create_with_auto_id(&self, lead: Lead) -> Result<String, LeadError>;
}

fn new_lead_id() -> Result<String, LeadError> {
    new_uuid_to_bech32(LEAD_ID_PREFIX).map_err(|e| LeadError::Storage(e.to_string()))
}

pub struct SledLeadStore {
    tree: sled::Tree,
}

impl SledLeadStore {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self, LeadError> {
        let tree = instance.open_tree("leads")?;
        Ok(Self { tree })
    }
}

impl LeadStore for SledLeadStore {
    fn get(&self, id: &str) -> Result<Lead, LeadError> {
        let bytes = self
            .tree
            .get(id.as_bytes())?
            .ok_or_else(|| LeadError::NotFound(id.to_string()))?;
        Ok(minicbor::decode(&bytes)?)
    }

    fn query(&self, filter: &LeadFilter) -> Result<Vec<Lead>, LeadError> {
        let mut leads = vec![];
        for entry in self.tree.iter() {
            let (_, value) = entry?;
            let lead: Lead = minicbor::decode(&value)?;
            if filter.matches(&lead) {
                leads.push(lead);
            }
        }
        Ok(leads)
    }

    fn write(&self, lead: &Lead) -> Result<(), LeadError> {
        self.tree
            .insert(lead.id.as_bytes(), minicbor::to_vec(lead)?)?;
        Ok(())
    }

    fn batch_delete(&self, ids: &[String]) -> Result<(), LeadError> {
        let mut batch = Batch::default();
        for id in ids {
            batch.remove(id.as_bytes());
        }
        self.tree.apply_batch(batch)?;
        Ok(())
    }

    fn create_with_auto_id(&self, mut lead: Lead) -> Result<String, LeadError> {
        lead.id = new_lead_id()?;
        self.write(&lead)?;
        Ok(lead.id)
    }
}

/// Single-process store kept in memory for the rest of the session.
#[derive(Default)]
pub struct LocalLeadStore {
    leads: RwLock<BTreeMap<String, Lead>>,
}

impl LocalLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.leads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.leads.read().is_empty()
    }
}

impl LeadStore for LocalLeadStore {
    fn get(&self, id: &str) -> Result<Lead, LeadError> {
        self.leads
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| LeadError::NotFound(id.to_string()))
    }

    fn query(&self, filter: &LeadFilter) -> Result<Vec<Lead>, LeadError> {
        Ok(self
            .leads
            .read()
            .values()
            .filter(|lead| filter.matches(lead))
            .cloned()
            .collect())
    }

    fn write(&self, lead: &Lead) -> Result<(), LeadError> {
        self.leads.write().insert(lead.id.clone(), lead.clone());
        Ok(())
    }

    fn batch_delete(&self, ids: &[String]) -> Result<(), LeadError> {
        let mut leads = self.leads.write();
        for id in ids {
            leads.remove(id);
        }
        Ok(())
    }

    fn create_with_auto_id(&self, mut lead: Lead) -> Result<String, LeadError> {
        lead.id = new_lead_id()?;
        let id = lead.id.clone();
        self.leads.write().insert(id.clone(), lead);
        Ok(id)
    }
}

/// Routes every call to the store selected by the persistence context. An
/// authorization denial from the primary flips the context to local mode and
/// the same call is retried once against the local store.
pub struct FallbackLeadStore {
    primary: Arc<dyn LeadStore>,
    local: Arc<dyn LeadStore>,
    context: Arc<PersistenceContext>,
}

impl FallbackLeadStore {
    pub fn new(
        primary: Arc<dyn LeadStore>,
        local: Arc<dyn LeadStore>,
        context: Arc<PersistenceContext>,
    ) -> Self {
        Self {
            primary,
            local,
            context,
        }
    }

    pub fn context(&self) -> &Arc<PersistenceContext> {
        &self.context
    }

    fn run<T, F>(&self, op: &str, call: F) -> Result<T, LeadError>
    where
        F: Fn(&dyn LeadStore) -> Result<T, LeadError>,
    {
        if self.context.mode() == PersistenceMode::Local {
            return call(self.local.as_ref());
        }

        match call(self.primary.as_ref()) {
            Err(err) if err.is_authorization() => {
                info!(op, error = %err, "retrying against local store");
                self.context.degrade();
                call(self.local.as_ref())
            }
            other => other,
        }
    }
}

impl LeadStore for FallbackLeadStore {
    fn get(&self, id: &str) -> Result<Lead, LeadError> {
        self.run("get", |store| store.get(id))
    }

    fn query(&self, filter: &LeadFilter) -> Result<Vec<Lead>, LeadError> {
        self.run("query", |store| store.query(filter))
    }

    fn write(&self, lead: &Lead) -> Result<(), LeadError> {
        debug!(lead_id = %lead.id, "writing lead");
        self.run("write", |store| store.write(lead))
    }

    fn batch_delete(&self, ids: &[String]) -> Result<(), LeadError> {
        self.run("batch_delete", |store| store.batch_delete(ids))
    }

    fn create_with_auto_id(&self, lead: Lead) -> Result<String, LeadError> {
        self.run("create", |store| store.create_with_auto_id(lead.clone()))
    }
}

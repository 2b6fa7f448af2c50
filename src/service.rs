//! Service layer API for lead lifecycle operations
use crate::blob::{BlobStore, SledBlobStore, put_or_placeholder};
use crate::config::{EngineConfig, PersistenceContext};
use crate::directory::{Role, SledUserDirectory, UserDirectory, UserRef};
use crate::error::{LeadError, ValidationError};
use crate::lead::{DocumentRef, Lead, LeadSource, LeadStatus, LeadType, TimeStamp};
use crate::lifecycle;
use crate::patch::{AppraisalPatch, LeadPatch};
use crate::selector::{AssigneeSelector, RandomSelector};
use crate::store::{FallbackLeadStore, LeadFilter, LeadStore, LocalLeadStore, SledLeadStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Intake payload for a manually entered or imported lead.
#[derive(Debug, Clone, Default)]
pub struct NewLead {
    pub full_name: String,
    pub lead_type: LeadType,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub city: Option<String>,
    pub requested_amount: Option<u64>,
    pub notes: Option<String>,
    /// Owner on creation; defaults to `created_by`.
    pub assigned_to: Option<String>,
    pub created_by: String,
}

impl NewLead {
    /// Intake requires a name and the creating user.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.full_name.trim().is_empty() {
            return Err(ValidationError::MissingField("full_name"));
        }
        if self.created_by.trim().is_empty() {
            return Err(ValidationError::MissingField("created_by"));
        }
        Ok(())
    }
}

pub struct LeadService {
    store: Arc<dyn LeadStore>,
    directory: Arc<dyn UserDirectory>,
    selector: Arc<dyn AssigneeSelector>,
    blobs: Arc<dyn BlobStore>,
    persistence: Arc<PersistenceContext>,
}

impl LeadService {
    pub fn new(
        store: Arc<dyn LeadStore>,
        directory: Arc<dyn UserDirectory>,
        selector: Arc<dyn AssigneeSelector>,
        blobs: Arc<dyn BlobStore>,
        persistence: Arc<PersistenceContext>,
    ) -> Self {
        Self {
            store,
            directory,
            selector,
            blobs,
            persistence,
        }
    }

    /// Wire the sled-backed stores behind the local fallback adapter.
    pub fn open(instance: Arc<sled::Db>, config: &EngineConfig) -> Result<Self, LeadError> {
        let persistence = Arc::new(config.persistence_context());
        let store = FallbackLeadStore::new(
            Arc::new(SledLeadStore::new(instance.clone())?),
            Arc::new(LocalLeadStore::new()),
            persistence.clone(),
        );

        Ok(Self::new(
            Arc::new(store),
            Arc::new(SledUserDirectory::new(instance.clone())?),
            Arc::new(RandomSelector),
            Arc::new(SledBlobStore::new(instance, &config.blob_url_prefix)?),
            persistence,
        ))
    }

    pub fn persistence(&self) -> &Arc<PersistenceContext> {
        &self.persistence
    }

    pub fn store(&self) -> &Arc<dyn LeadStore> {
        &self.store
    }

    pub fn get_lead(&self, lead_id: &str) -> Result<Lead, LeadError> {
        self.store.get(lead_id)
    }

    fn pick_for_role(&self, role: Role) -> Result<Option<UserRef>, LeadError> {
        let candidates = self.directory.query_by_role(role)?;
        let picked = self.selector.pick_one(&candidates).cloned();
        if picked.is_none() {
            warn!(role = role.as_str(), "no users hold this role, transfer skipped");
        }
        Ok(picked)
    }

    /// Create a lead from intake with `status = nuevo`.
    pub fn create_lead(&self, new_lead: NewLead) -> Result<Lead, LeadError> {
        self.create_from(new_lead, LeadSource::Manual)
    }

    /// Bulk intake. Ids are returned in input order. Nothing is written if
    /// any row fails validation.
    pub fn import_leads(&self, leads: Vec<NewLead>) -> Result<Vec<String>, LeadError> {
        for new_lead in &leads {
            new_lead.validate()?;
        }
        let mut ids = Vec::with_capacity(leads.len());
        for new_lead in leads {
            ids.push(self.create_from(new_lead, LeadSource::Import)?.id);
        }
        info!(count = ids.len(), "imported leads");
        Ok(ids)
    }

    fn create_from(&self, new_lead: NewLead, source: LeadSource) -> Result<Lead, LeadError> {
        new_lead.validate()?;
        let owner = new_lead
            .assigned_to
            .unwrap_or_else(|| new_lead.created_by.clone());

        let mut lead = Lead {
            lead_type: new_lead.lead_type,
            status: LeadStatus::Nuevo,
            full_name: new_lead.full_name,
            phone: new_lead.phone,
            email: new_lead.email,
            city: new_lead.city,
            requested_amount: new_lead.requested_amount,
            notes: new_lead.notes,
            source,
            created_at: TimeStamp::new(),
            created_by: Some(new_lead.created_by),
            assigned_to: Some(owner),
            ..Default::default()
        };

        lead.id = self.store.create_with_auto_id(lead.clone())?;
        debug!(lead_id = %lead.id, "lead created");
        Ok(lead)
    }

    /// Merge `patch` onto the stored lead, run the transfer rules and write
    /// the result as one record.
    pub fn apply_update(&self, lead_id: &str, patch: LeadPatch) -> Result<Lead, LeadError> {
        let before = self.store.get(lead_id)?;
        let now = TimeStamp::new();

        let mut lead = lifecycle::merge_patch(&before, &patch, &now);

        if lifecycle::enters_reschedule(&before, &lead) {
            lifecycle::apply_reschedule(&mut lead);
            info!(lead_id, "appointment unlocked for rescheduling");
        }

        if lifecycle::enters_legal_review(&before, &lead) {
            if let Some(legal) = self.pick_for_role(Role::Legal)? {
                lifecycle::apply_legal_transfer(&mut lead, &legal, &now);
                info!(lead_id, legal = %legal.uid, "lead transferred to legal review");
            }
        }

        if lifecycle::closer_assignment_due(&before, &lead, &patch) {
            let closers = self.directory.query_by_role(Role::Closer)?;
            match lifecycle::choose_closer(&lead, &closers, self.selector.as_ref()) {
                Some(closer) => {
                    let closer = closer.clone();
                    lifecycle::apply_closer_assignment(
                        &mut lead,
                        &closer,
                        patch.updated_by.clone(),
                        &now,
                    );
                    info!(lead_id, closer = %closer.uid, "closer assigned, appointment locked");
                }
                None => warn!(lead_id, "appointment complete but no closers available"),
            }
        }

        lifecycle::finalize(&before, &mut lead, patch.updated_by, &now);
        self.store.write(&lead)?;

        Ok(lead)
    }

    /// Approve legal review and hand the lead to a commercial reviewer.
    pub fn approve_legal(
        &self,
        lead_id: &str,
        comments: &str,
        reviewer_id: &str,
    ) -> Result<Lead, LeadError> {
        let before = self.store.get(lead_id)?;
        let now = TimeStamp::new();
        let commercial = self.pick_for_role(Role::Commercial)?;

        let mut lead = before.clone();
        lifecycle::approve_legal(&mut lead, comments, reviewer_id, commercial.as_ref(), &now);
        lifecycle::finalize(&before, &mut lead, Some(reviewer_id.to_string()), &now);
        self.store.write(&lead)?;

        info!(lead_id, reviewer = reviewer_id, assigned_to = ?lead.assigned_to, "legal review approved");
        Ok(lead)
    }

    pub fn reject_legal(
        &self,
        lead_id: &str,
        comments: &str,
        reviewer_id: &str,
    ) -> Result<Lead, LeadError> {
        self.decide(lead_id, reviewer_id, "legal review rejected", |lead, now| {
            lifecycle::reject_legal(lead, comments, reviewer_id, now)
        })
    }

    /// Approve commercial review; the lead goes back to its executive ready
    /// for appointment scheduling.
    pub fn approve_commercial(
        &self,
        lead_id: &str,
        comments: &str,
        reviewer_id: &str,
    ) -> Result<Lead, LeadError> {
        self.decide(lead_id, reviewer_id, "commercial review approved", |lead, now| {
            lifecycle::approve_commercial(lead, comments, reviewer_id, now)
        })
    }

    pub fn reject_commercial(
        &self,
        lead_id: &str,
        comments: &str,
        reviewer_id: &str,
    ) -> Result<Lead, LeadError> {
        self.decide(lead_id, reviewer_id, "commercial review rejected", |lead, now| {
            lifecycle::reject_commercial(lead, comments, reviewer_id, now)
        })
    }

    fn decide<F>(
        &self,
        lead_id: &str,
        reviewer_id: &str,
        message: &str,
        decision: F,
    ) -> Result<Lead, LeadError>
    where
        F: FnOnce(&mut Lead, &TimeStamp<Utc>),
    {
        let before = self.store.get(lead_id)?;
        let now = TimeStamp::new();

        let mut lead = before.clone();
        decision(&mut lead, &now);
        lifecycle::finalize(&before, &mut lead, Some(reviewer_id.to_string()), &now);
        self.store.write(&lead)?;

        info!(lead_id, reviewer = reviewer_id, assigned_to = ?lead.assigned_to, "{}", message);
        Ok(lead)
    }

    /// Store an uploaded document and link it on the lead.
    pub fn attach_document(
        &self,
        lead_id: &str,
        name: &str,
        bytes: &[u8],
        uploaded_by: &str,
    ) -> Result<Lead, LeadError> {
        let mut lead = self.store.get(lead_id)?;
        let path = format!("leads/{lead_id}/documents/{name}");
        let url = put_or_placeholder(self.blobs.as_ref(), &path, bytes);

        lead.documents.push(DocumentRef {
            name: name.to_string(),
            url,
            uploaded_at: TimeStamp::new(),
            uploaded_by: uploaded_by.to_string(),
        });
        lead.updated_at = Some(TimeStamp::new());
        lead.updated_by = Some(uploaded_by.to_string());
        self.store.write(&lead)?;

        Ok(lead)
    }

    /// Store an appraisal report and record its URL through the normal update path.
    pub fn upload_appraisal_report(
        &self,
        lead_id: &str,
        file_name: &str,
        bytes: &[u8],
        uploaded_by: &str,
    ) -> Result<Lead, LeadError> {
        // fail before uploading if the lead is gone
        self.store.get(lead_id)?;
        let path = format!("leads/{lead_id}/appraisal/{file_name}");
        let url = put_or_placeholder(self.blobs.as_ref(), &path, bytes);

        let patch = LeadPatch::new()
            .set_appraisal(AppraisalPatch {
                report_url: Some(url),
                ..Default::default()
            })
            .by(uploaded_by);
        self.apply_update(lead_id, patch)
    }

    /// Administrative reset: removes every lead. Returns how many were removed.
    pub fn reset_all(&self) -> Result<usize, LeadError> {
        let ids: Vec<String> = self
            .store
            .query(&LeadFilter::All)?
            .into_iter()
            .map(|lead| lead.id)
            .collect();
        self.store.batch_delete(&ids)?;
        warn!(count = ids.len(), "lead collection reset");
        Ok(ids.len())
    }
}

//! Read-side queries behind the per-role dashboards
use crate::directory::Role;
use crate::error::LeadError;
use crate::lead::{Lead, ReviewStatus};
use crate::store::{LeadFilter, LeadStore};
use std::collections::BTreeMap;

pub fn all_leads(store: &dyn LeadStore) -> Result<Vec<Lead>, LeadError> {
    store.query(&LeadFilter::All)
}

pub fn leads_by_executive(store: &dyn LeadStore, uid: &str) -> Result<Vec<Lead>, LeadError> {
    store.query(&LeadFilter::AssignedTo(uid.to_string()))
}

pub fn leads_by_closer(store: &dyn LeadStore, uid: &str) -> Result<Vec<Lead>, LeadError> {
    store.query(&LeadFilter::CloserAssignedTo(uid.to_string()))
}

/// Leads whose client paid the appraisal; the appraisal manager's queue.
pub fn paid_appraisal_leads(store: &dyn LeadStore) -> Result<Vec<Lead>, LeadError> {
    store.query(&LeadFilter::PaidAppraisal)
}

/// Review queue for the legal or commercial desk. Other roles have none.
pub fn pending_review(store: &dyn LeadStore, role: Role) -> Result<Vec<Lead>, LeadError> {
    match role {
        Role::Legal => store.query(&LeadFilter::LegalStatus(ReviewStatus::PendingReview)),
        Role::Commercial => {
            store.query(&LeadFilter::CommercialStatus(ReviewStatus::PendingReview))
        }
        _ => Ok(vec![]),
    }
}

/// Lead count per current owner. Unassigned leads are left out.
pub fn counts_by_assignee(store: &dyn LeadStore) -> Result<BTreeMap<String, usize>, LeadError> {
    let mut counts = BTreeMap::new();
    for lead in store.query(&LeadFilter::All)? {
        if let Some(uid) = lead.assigned_to {
            *counts.entry(uid).or_insert(0) += 1;
        }
    }
    Ok(counts)
}

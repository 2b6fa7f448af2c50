//! Pure decision rules of the lead lifecycle.
//!
//! Nothing in here performs I/O. The service loads the lead, asks these
//! functions whether a transfer is due, fetches candidates from the user
//! directory only when one is, and hands the chosen user back in.
use crate::directory::{Role, UserRef};
use crate::lead::{
    Lead, LeadStatus, LeadType, Review, ReviewStatus, StatusChange, Substatus, TimeStamp,
};
use crate::patch::{AppointmentPatch, AppraisalPatch, CloserFollowUpPatch, LeadPatch};
use crate::selector::AssigneeSelector;
use chrono::Utc;

/// Merge `patch` onto `current`. Nested sub-records are merged key by key.
/// Also stamps `contacted_at` on the first move away from `nuevo` and the
/// audit fields of the follow-up and appraisal records.
pub fn merge_patch(current: &Lead, patch: &LeadPatch, now: &TimeStamp<Utc>) -> Lead {
    let mut lead = current.clone();
    let actor = patch.updated_by.clone();

    if let Some(status) = patch.status {
        if status != LeadStatus::Nuevo
            && current.status == LeadStatus::Nuevo
            && current.contacted_at.is_none()
        {
            lead.contacted_at = Some(now.clone());
        }
        lead.status = status;
    }
    if let Some(substatus) = &patch.substatus {
        lead.substatus = Some(substatus.clone());
    }
    if let Some(name) = &patch.full_name {
        lead.full_name = name.clone();
    }
    if let Some(phone) = &patch.phone {
        lead.phone = Some(phone.clone());
    }
    if let Some(email) = &patch.email {
        lead.email = Some(email.clone());
    }
    if let Some(city) = &patch.city {
        lead.city = Some(city.clone());
    }
    if let Some(amount) = patch.requested_amount {
        lead.requested_amount = Some(amount);
    }
    if let Some(notes) = &patch.notes {
        lead.notes = Some(notes.clone());
    }
    if let Some(uid) = &patch.assigned_to {
        lead.assigned_to = Some(uid.clone());
    }
    if let Some(appointment) = &patch.appointment {
        merge_appointment(&mut lead, appointment);
    }
    if let Some(follow_up) = &patch.closer_follow_up {
        merge_follow_up(&mut lead, follow_up, actor.clone(), now);
    }
    if let Some(appraisal) = &patch.appraisal {
        merge_appraisal(&mut lead, appraisal, actor, now);
    }

    lead
}

fn merge_appointment(lead: &mut Lead, patch: &AppointmentPatch) {
    let appointment = lead.appointment.get_or_insert_default();
    if let Some(date) = &patch.date {
        appointment.date = Some(date.clone());
    }
    if let Some(time) = &patch.time {
        appointment.time = Some(time.clone());
    }
    if let Some(kind) = patch.kind {
        appointment.kind = Some(kind);
    }
    if let Some(cost) = patch.appraisal_cost {
        appointment.appraisal_cost = Some(cost);
    }
}

fn merge_follow_up(
    lead: &mut Lead,
    patch: &CloserFollowUpPatch,
    actor: Option<String>,
    now: &TimeStamp<Utc>,
) {
    let follow_up = lead.closer_follow_up.get_or_insert_default();
    if let Some(attended) = patch.client_attended {
        follow_up.client_attended = Some(attended);
        follow_up.attendance_marked_at = Some(now.clone());
        follow_up.attendance_marked_by = actor;
    }
    if let Some(lost) = patch.marked_as_lost {
        follow_up.marked_as_lost = lost;
        follow_up.lost_at = lost.then(|| now.clone());
    }
    if let Some(reason) = &patch.lost_reason {
        follow_up.lost_reason = Some(reason.clone());
    }
    if let Some(non_payment) = patch.lost_due_to_non_payment {
        follow_up.lost_due_to_non_payment = non_payment;
    }
    if let Some(accepts) = patch.accepts_terms {
        follow_up.accepts_terms = Some(accepts);
    }
    if let Some(income) = patch.client_income {
        follow_up.client_income = Some(income);
    }
    if let Some(reason) = &patch.loan_reason {
        follow_up.loan_reason = Some(reason.clone());
    }
    if let Some(quota) = patch.agreed_quota {
        follow_up.agreed_quota = Some(quota);
    }
    if let Some(plan) = &patch.payment_plan {
        follow_up.payment_plan = Some(plan.clone());
    }
    if let Some(paid) = patch.paid_appraisal {
        follow_up.paid_appraisal = Some(paid);
    }
    if let Some(date) = &patch.payment_commitment_date {
        follow_up.payment_commitment_date = Some(date.clone());
    }
    if let Some(date) = &patch.payment_date {
        follow_up.payment_date = Some(date.clone());
    }
}

// The first save completes the appraisal; later saves snapshot the old values first.
fn merge_appraisal(
    lead: &mut Lead,
    patch: &AppraisalPatch,
    actor: Option<String>,
    now: &TimeStamp<Utc>,
) {
    let appraisal = lead.appraisal.get_or_insert_default();
    if appraisal.completed_at.is_some() {
        let snapshot = appraisal.snapshot(actor.clone());
        appraisal.history.push(snapshot);
    }
    if let Some(price) = patch.price {
        appraisal.price = Some(price);
    }
    if let Some(area) = patch.area {
        appraisal.area = Some(area);
    }
    if let Some(usage) = &patch.usage {
        appraisal.usage = Some(usage.clone());
    }
    if let Some(situation) = &patch.situation {
        appraisal.situation = Some(situation.clone());
    }
    if let Some(url) = &patch.report_url {
        appraisal.report_url = Some(url.clone());
    }
    if let Some(name) = &patch.investor_name {
        appraisal.investor_name = Some(name.clone());
    }
    if let Some(phone) = &patch.investor_phone {
        appraisal.investor_phone = Some(phone.clone());
    }
    if appraisal.completed_at.is_none() {
        appraisal.completed_at = Some(now.clone());
        appraisal.completed_by = actor;
    }
}

fn in_validation(lead: &Lead) -> bool {
    lead.status == LeadStatus::Contactado && lead.has_substatus(&Substatus::EnValidacion)
}

/// `contactado / en_validacion` reached by this update and not before it.
/// Investment leads have no review pipeline and never enter it.
pub fn enters_legal_review(before: &Lead, merged: &Lead) -> bool {
    merged.lead_type != LeadType::Investment && in_validation(merged) && !in_validation(before)
}

pub fn apply_legal_transfer(lead: &mut Lead, legal: &UserRef, now: &TimeStamp<Utc>) {
    lead.transferred_to = Some(Role::Legal);
    lead.transferred_at = Some(now.clone());
    lead.previous_owner = lead.assigned_to.clone();
    lead.assigned_to = Some(legal.uid.clone());
    lead.legal = Some(Review::pending());
}

/// `reprogramar` newly set by this update.
pub fn enters_reschedule(before: &Lead, merged: &Lead) -> bool {
    merged.has_substatus(&Substatus::Reprogramar) && !before.has_substatus(&Substatus::Reprogramar)
}

/// Opens a new appointment cycle: unlock and hand the lead back to the
/// owner who schedules. The closer stays recorded so it is preferred next time.
pub fn apply_reschedule(lead: &mut Lead) {
    lead.appointment_locked = false;
    if let Some(owner) = lead.previous_owner.clone() {
        lead.assigned_to = Some(owner);
    }
}

pub fn closer_assignment_due(before: &Lead, merged: &Lead, patch: &LeadPatch) -> bool {
    if !merged.appointment_complete() || !merged.reviews_cleared() {
        return false;
    }

    merged.closer_assigned_to.is_none()
        || before.has_substatus(&Substatus::Reprogramar)
        || patch.substatus == Some(Substatus::Cita)
}

/// Keep the closer already on the lead if it is still a candidate.
pub fn choose_closer<'a>(
    lead: &Lead,
    candidates: &'a [UserRef],
    selector: &dyn AssigneeSelector,
) -> Option<&'a UserRef> {
    lead.closer_assigned_to
        .as_deref()
        .and_then(|uid| candidates.iter().find(|c| c.uid == uid))
        .or_else(|| selector.pick_one(candidates))
}

pub fn apply_closer_assignment(
    lead: &mut Lead,
    closer: &UserRef,
    scheduled_by: Option<String>,
    now: &TimeStamp<Utc>,
) {
    lead.appointment_locked = true;
    lead.closer_assigned_to = Some(closer.uid.clone());
    lead.closer_assigned_at = Some(now.clone());
    if lead.assigned_to.as_deref() != Some(closer.uid.as_str()) {
        lead.previous_owner = lead.assigned_to.clone();
    }
    lead.assigned_to = Some(closer.uid.clone());
    lead.transferred_to = Some(Role::Closer);
    lead.transferred_at = Some(now.clone());

    let appointment = lead.appointment.get_or_insert_default();
    appointment.scheduled_at = Some(now.clone());
    appointment.scheduled_by = scheduled_by;

    lead.substatus = Some(Substatus::Cita);
    // a new cycle starts, earlier follow-up no longer applies
    lead.closer_follow_up = Some(Default::default());
}

fn decided(status: ReviewStatus, comments: &str, reviewer: &str, now: &TimeStamp<Utc>) -> Review {
    Review {
        status,
        comments: Some(comments.to_string()),
        reviewed_at: Some(now.clone()),
        reviewed_by: Some(reviewer.to_string()),
    }
}

fn return_to_previous_owner(lead: &mut Lead) {
    if let Some(owner) = lead.previous_owner.clone() {
        lead.assigned_to = Some(owner);
    }
}

pub fn approve_legal(
    lead: &mut Lead,
    comments: &str,
    reviewer: &str,
    commercial: Option<&UserRef>,
    now: &TimeStamp<Utc>,
) {
    lead.legal = Some(decided(ReviewStatus::Approved, comments, reviewer, now));

    if let Some(commercial) = commercial {
        lead.transferred_to = Some(Role::Commercial);
        lead.transferred_at = Some(now.clone());
        lead.commercial = Some(Review::pending());
        if lead.previous_owner.is_none() {
            lead.previous_owner = lead.assigned_to.clone();
        }
        lead.assigned_to = Some(commercial.uid.clone());
    }
}

pub fn reject_legal(lead: &mut Lead, comments: &str, reviewer: &str, now: &TimeStamp<Utc>) {
    lead.legal = Some(decided(ReviewStatus::Rejected, comments, reviewer, now));
    reject(lead);
}

pub fn approve_commercial(lead: &mut Lead, comments: &str, reviewer: &str, now: &TimeStamp<Utc>) {
    lead.commercial = Some(decided(ReviewStatus::Approved, comments, reviewer, now));
    return_to_previous_owner(lead);
    lead.status = LeadStatus::Contactado;
    lead.substatus = Some(Substatus::Aprobado);
}

pub fn reject_commercial(lead: &mut Lead, comments: &str, reviewer: &str, now: &TimeStamp<Utc>) {
    lead.commercial = Some(decided(ReviewStatus::Rejected, comments, reviewer, now));
    reject(lead);
}

// `en_validacion` must not survive a rejection, otherwise a later patch back
// to `contactado` would re-enter legal review.
fn reject(lead: &mut Lead) {
    lead.status = LeadStatus::Rechazado;
    lead.substatus = None;
    return_to_previous_owner(lead);
    lead.transferred_to = None;
}

/// Audit stamps shared by every write: status history when status or
/// substatus moved, and `updated_at`/`updated_by`.
pub fn finalize(before: &Lead, lead: &mut Lead, actor: Option<String>, now: &TimeStamp<Utc>) {
    if lead.status != before.status || lead.substatus != before.substatus {
        lead.status_history.push(StatusChange {
            status: lead.status,
            substatus: lead.substatus.clone(),
            changed_at: now.clone(),
            changed_by: actor.clone(),
        });
    }
    lead.updated_at = Some(now.clone());
    lead.updated_by = actor;
}

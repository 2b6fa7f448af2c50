//! Caller-proposed partial updates. Every `None` leaves the stored value alone.
use crate::error::ValidationError;
use crate::lead::{AppointmentType, LeadStatus, Substatus};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentPatch {
    pub date: Option<String>,
    pub time: Option<String>,
    pub kind: Option<AppointmentType>,
    pub appraisal_cost: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloserFollowUpPatch {
    pub client_attended: Option<bool>,
    pub marked_as_lost: Option<bool>,
    pub lost_reason: Option<String>,
    pub lost_due_to_non_payment: Option<bool>,
    pub accepts_terms: Option<bool>,
    pub client_income: Option<u64>,
    pub loan_reason: Option<String>,
    pub agreed_quota: Option<u64>,
    pub payment_plan: Option<String>,
    pub paid_appraisal: Option<bool>,
    pub payment_commitment_date: Option<String>,
    pub payment_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppraisalPatch {
    pub price: Option<u64>,
    pub area: Option<f64>,
    pub usage: Option<String>,
    pub situation: Option<String>,
    pub report_url: Option<String>,
    pub investor_name: Option<String>,
    pub investor_phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadPatch {
    pub status: Option<LeadStatus>,
    pub substatus: Option<Substatus>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub city: Option<String>,
    pub requested_amount: Option<u64>,
    pub notes: Option<String>,
    pub assigned_to: Option<String>,
    pub appointment: Option<AppointmentPatch>,
    pub closer_follow_up: Option<CloserFollowUpPatch>,
    pub appraisal: Option<AppraisalPatch>,
    /// Acting user, recorded in audit fields.
    pub updated_by: Option<String>,
}

impl LeadPatch {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_status(mut self, status: LeadStatus) -> Self {
        self.status = Some(status);
        self
    }
    pub fn set_substatus(mut self, substatus: Substatus) -> Self {
        self.substatus = Some(substatus);
        self
    }
    pub fn set_full_name(mut self, name: &str) -> Self {
        self.full_name = Some(name.to_string());
        self
    }
    pub fn set_phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.to_string());
        self
    }
    pub fn set_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }
    pub fn set_city(mut self, city: &str) -> Self {
        self.city = Some(city.to_string());
        self
    }
    pub fn set_requested_amount(mut self, amount: u64) -> Self {
        self.requested_amount = Some(amount);
        self
    }
    pub fn set_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }
    pub fn set_assigned_to(mut self, uid: &str) -> Self {
        self.assigned_to = Some(uid.to_string());
        self
    }
    pub fn set_appointment(mut self, appointment: AppointmentPatch) -> Self {
        self.appointment = Some(appointment);
        self
    }
    pub fn set_closer_follow_up(mut self, follow_up: CloserFollowUpPatch) -> Self {
        self.closer_follow_up = Some(follow_up);
        self
    }
    pub fn set_appraisal(mut self, appraisal: AppraisalPatch) -> Self {
        self.appraisal = Some(appraisal);
        self
    }
    pub fn by(mut self, uid: &str) -> Self {
        self.updated_by = Some(uid.to_string());
        self
    }
    /// True when the patch touches `status` or `substatus`.
    pub fn touches_status(&self) -> bool {
        self.status.is_some() || self.substatus.is_some()
    }
}

impl AppointmentPatch {
    pub fn new(date: &str, time: &str, kind: AppointmentType) -> Self {
        Self {
            date: Some(date.to_string()),
            time: Some(time.to_string()),
            kind: Some(kind),
            appraisal_cost: None,
        }
    }
    pub fn with_appraisal_cost(mut self, cost: u64) -> Self {
        self.appraisal_cost = Some(cost);
        self
    }
}

/// Form-layer check of a patch's substatus against its status. The engine
/// does not call this; it trusts whatever substatus the patch carries.
pub fn validate_patch(patch: &LeadPatch) -> Result<(), ValidationError> {
    match (&patch.status, &patch.substatus) {
        (None, Some(_)) => Err(ValidationError::SubstatusWithoutStatus),
        (Some(status), Some(substatus)) => {
            let allowed = status.allowed_substatuses();
            let custom = matches!(substatus, Substatus::Other(_)) && !allowed.is_empty();
            if custom || allowed.contains(substatus) {
                Ok(())
            } else {
                Err(ValidationError::SubstatusNotAllowed {
                    status: *status,
                    substatus: substatus.clone(),
                })
            }
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let patch = LeadPatch::new()
            .set_status(LeadStatus::Contactado)
            .set_substatus(Substatus::Interesado)
            .set_phone("+51 999 000 111")
            .by("exec_1");

        assert_eq!(patch.status, Some(LeadStatus::Contactado));
        assert_eq!(patch.updated_by.as_deref(), Some("exec_1"));
        assert!(patch.touches_status());
        assert!(!LeadPatch::new().set_notes("x").touches_status());
    }

    #[test]
    fn validate_accepts_substatus_in_its_status() {
        let patch = LeadPatch::new()
            .set_status(LeadStatus::Contactado)
            .set_substatus(Substatus::EnValidacion);
        assert!(validate_patch(&patch).is_ok());
    }

    #[test]
    fn validate_rejects_substatus_from_another_status() {
        let patch = LeadPatch::new()
            .set_status(LeadStatus::ContactoNoEfectivo)
            .set_substatus(Substatus::Cita);
        assert_eq!(
            validate_patch(&patch),
            Err(ValidationError::SubstatusNotAllowed {
                status: LeadStatus::ContactoNoEfectivo,
                substatus: Substatus::Cita,
            })
        );
    }

    #[test]
    fn validate_rejects_orphan_substatus() {
        let patch = LeadPatch::new().set_substatus(Substatus::Cita);
        assert_eq!(
            validate_patch(&patch),
            Err(ValidationError::SubstatusWithoutStatus)
        );
    }
}

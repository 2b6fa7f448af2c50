//! Core lead record, its sub-records and the status vocabulary
use crate::directory::Role;
use chrono::{DateTime, TimeZone, Utc};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LeadType {
    #[n(0)]
    #[default]
    Loan,
    #[n(1)]
    Investment,
}

#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord,
)]
pub enum LeadStatus {
    #[n(0)]
    #[default]
    Nuevo,
    #[n(1)]
    Contactado,
    #[n(2)]
    ContactoNoEfectivo,
    #[n(3)]
    NoContactado,
    #[n(4)]
    Rechazado,
}

/// Status-dependent refinement. The engine only inspects the privileged
/// values (`EnValidacion`, `Cita`, `Reprogramar`); everything else passes
/// through untouched.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub enum Substatus {
    // contactado
    #[n(0)]
    Interesado,
    #[n(1)]
    Cita,
    #[n(2)]
    EnValidacion,
    #[n(3)]
    Aprobado,
    #[n(4)]
    Reprogramar,
    #[n(5)]
    NoInteresado,
    // contacto_no_efectivo
    #[n(6)]
    NoContesta,
    #[n(7)]
    NumeroEquivocado,
    #[n(8)]
    Buzon,
    // no_contactado
    #[n(9)]
    PendienteLlamada,
    // rechazado
    #[n(10)]
    NoCalifica,
    #[n(11)]
    RechazoCliente,
    #[n(12)]
    Other(#[n(0)] String),
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStatus {
    #[n(0)]
    PendingReview,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentType {
    #[n(0)]
    Presencial,
    #[n(1)]
    Virtual,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LeadSource {
    #[n(0)]
    #[default]
    Manual,
    #[n(1)]
    Import,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    /// `None` when the fields do not name a valid UTC instant.
    pub fn new_with(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        min: u32,
        sec: u32,
    ) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(TimeStamp)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// Legal or commercial review, created lazily when the lead enters the review.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Review {
    #[n(0)]
    pub status: ReviewStatus,
    #[n(1)]
    pub comments: Option<String>,
    #[n(2)]
    pub reviewed_at: Option<TimeStamp<Utc>>,
    #[n(3)]
    pub reviewed_by: Option<String>,
}

impl Review {
    pub fn pending() -> Self {
        Self {
            status: ReviewStatus::PendingReview,
            comments: None,
            reviewed_at: None,
            reviewed_by: None,
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
pub struct Appointment {
    #[n(0)]
    pub date: Option<String>, // YYYY-MM-DD as entered
    #[n(1)]
    pub time: Option<String>, // HH:MM
    #[n(2)]
    pub kind: Option<AppointmentType>,
    #[n(3)]
    pub appraisal_cost: Option<u64>,
    #[n(4)]
    pub scheduled_at: Option<TimeStamp<Utc>>,
    #[n(5)]
    pub scheduled_by: Option<String>,
}

impl Appointment {
    /// Date, time and type all present.
    pub fn is_complete(&self) -> bool {
        self.date.as_deref().is_some_and(|d| !d.is_empty())
            && self.time.as_deref().is_some_and(|t| !t.is_empty())
            && self.kind.is_some()
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
pub struct CloserFollowUp {
    #[n(0)]
    pub client_attended: Option<bool>, // None = not yet recorded
    #[n(1)]
    pub attendance_marked_at: Option<TimeStamp<Utc>>,
    #[n(2)]
    pub attendance_marked_by: Option<String>,
    #[n(3)]
    pub marked_as_lost: bool,
    #[n(4)]
    pub lost_reason: Option<String>,
    #[n(5)]
    pub lost_due_to_non_payment: bool,
    #[n(6)]
    pub lost_at: Option<TimeStamp<Utc>>,
    #[n(7)]
    pub accepts_terms: Option<bool>,
    #[n(8)]
    pub client_income: Option<u64>,
    #[n(9)]
    pub loan_reason: Option<String>,
    #[n(10)]
    pub agreed_quota: Option<u64>,
    #[n(11)]
    pub payment_plan: Option<String>,
    #[n(12)]
    pub paid_appraisal: Option<bool>,
    #[n(13)]
    pub payment_commitment_date: Option<String>,
    #[n(14)]
    pub payment_date: Option<String>,
}

/// Pre-edit values of an appraisal. Appended, never modified.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct AppraisalSnapshot {
    #[n(0)]
    pub price: Option<u64>,
    #[n(1)]
    pub area: Option<f64>,
    #[n(2)]
    pub usage: Option<String>,
    #[n(3)]
    pub situation: Option<String>,
    #[n(4)]
    pub report_url: Option<String>,
    #[n(5)]
    pub investor_name: Option<String>,
    #[n(6)]
    pub investor_phone: Option<String>,
    #[n(7)]
    pub changed_at: TimeStamp<Utc>,
    #[n(8)]
    pub changed_by: Option<String>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
pub struct Appraisal {
    #[n(0)]
    pub price: Option<u64>,
    #[n(1)]
    pub area: Option<f64>, // square metres
    #[n(2)]
    pub usage: Option<String>,
    #[n(3)]
    pub situation: Option<String>,
    #[n(4)]
    pub report_url: Option<String>,
    #[n(5)]
    pub investor_name: Option<String>,
    #[n(6)]
    pub investor_phone: Option<String>,
    #[n(7)]
    pub completed_at: Option<TimeStamp<Utc>>,
    #[n(8)]
    pub completed_by: Option<String>,
    #[n(9)]
    pub history: Vec<AppraisalSnapshot>,
}

impl Appraisal {
    pub fn snapshot(&self, changed_by: Option<String>) -> AppraisalSnapshot {
        AppraisalSnapshot {
            price: self.price,
            area: self.area,
            usage: self.usage.clone(),
            situation: self.situation.clone(),
            report_url: self.report_url.clone(),
            investor_name: self.investor_name.clone(),
            investor_phone: self.investor_phone.clone(),
            changed_at: TimeStamp::new(),
            changed_by,
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct StatusChange {
    #[n(0)]
    pub status: LeadStatus,
    #[n(1)]
    pub substatus: Option<Substatus>,
    #[n(2)]
    pub changed_at: TimeStamp<Utc>,
    #[n(3)]
    pub changed_by: Option<String>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct DocumentRef {
    #[n(0)]
    pub name: String,
    #[n(1)]
    pub url: String,
    #[n(2)]
    pub uploaded_at: TimeStamp<Utc>,
    #[n(3)]
    pub uploaded_by: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
pub struct Lead {
    #[n(0)]
    pub id: String, // store assigned, lead_ bech32
    #[n(1)]
    pub lead_type: LeadType,
    #[n(2)]
    pub status: LeadStatus,
    #[n(3)]
    pub substatus: Option<Substatus>,
    #[n(4)]
    pub full_name: String,
    #[n(5)]
    pub phone: Option<String>,
    #[n(6)]
    pub email: Option<String>,
    #[n(7)]
    pub city: Option<String>,
    #[n(8)]
    pub requested_amount: Option<u64>,
    #[n(9)]
    pub source: LeadSource,
    #[n(10)]
    pub created_at: TimeStamp<Utc>,
    #[n(11)]
    pub created_by: Option<String>,
    #[n(12)]
    pub updated_at: Option<TimeStamp<Utc>>,
    #[n(13)]
    pub updated_by: Option<String>,
    #[n(14)]
    pub contacted_at: Option<TimeStamp<Utc>>,
    #[n(15)]
    pub assigned_to: Option<String>,
    #[n(16)]
    pub previous_owner: Option<String>,
    #[n(17)]
    pub closer_assigned_to: Option<String>,
    #[n(18)]
    pub closer_assigned_at: Option<TimeStamp<Utc>>,
    #[n(19)]
    pub transferred_to: Option<Role>,
    #[n(20)]
    pub transferred_at: Option<TimeStamp<Utc>>,
    #[n(21)]
    pub legal: Option<Review>,
    #[n(22)]
    pub commercial: Option<Review>,
    #[n(23)]
    pub appointment: Option<Appointment>,
    #[n(24)]
    pub appointment_locked: bool,
    #[n(25)]
    pub closer_follow_up: Option<CloserFollowUp>,
    #[n(26)]
    pub appraisal: Option<Appraisal>,
    #[n(27)]
    pub status_history: Vec<StatusChange>,
    #[n(28)]
    pub documents: Vec<DocumentRef>,
    #[n(29)]
    pub notes: Option<String>,
}

impl LeadStatus {
    /// Substatus values the intake forms offer under this status.
    pub fn allowed_substatuses(&self) -> &'static [Substatus] {
        match self {
            LeadStatus::Nuevo => &[],
            LeadStatus::Contactado => &[
                Substatus::Interesado,
                Substatus::Cita,
                Substatus::EnValidacion,
                Substatus::Aprobado,
                Substatus::Reprogramar,
                Substatus::NoInteresado,
            ],
            LeadStatus::ContactoNoEfectivo => &[
                Substatus::NoContesta,
                Substatus::NumeroEquivocado,
                Substatus::Buzon,
            ],
            LeadStatus::NoContactado => &[Substatus::PendienteLlamada],
            LeadStatus::Rechazado => &[Substatus::NoCalifica, Substatus::RechazoCliente],
        }
    }
}

impl Lead {
    pub fn legal_status(&self) -> Option<ReviewStatus> {
        self.legal.as_ref().map(|r| r.status)
    }

    pub fn commercial_status(&self) -> Option<ReviewStatus> {
        self.commercial.as_ref().map(|r| r.status)
    }

    pub fn has_substatus(&self, substatus: &Substatus) -> bool {
        self.substatus.as_ref() == Some(substatus)
    }

    /// Both review gates passed. Investment leads never enter the gates.
    pub fn reviews_cleared(&self) -> bool {
        self.lead_type == LeadType::Investment
            || (self.legal_status() == Some(ReviewStatus::Approved)
                && self.commercial_status() == Some(ReviewStatus::Approved))
    }

    pub fn appointment_complete(&self) -> bool {
        self.appointment.as_ref().is_some_and(Appointment::is_complete)
    }

    /// Whether an ordinary editor may change this lead.
    pub fn is_editable(&self) -> bool {
        if self.appointment_locked {
            return false;
        }
        let pending = self.legal_status() == Some(ReviewStatus::PendingReview)
            || self.commercial_status() == Some(ReviewStatus::PendingReview);
        let both_approved = self.legal_status() == Some(ReviewStatus::Approved)
            && self.commercial_status() == Some(ReviewStatus::Approved);

        !(pending && !both_approved && self.lead_type != LeadType::Investment)
    }

    pub fn paid_appraisal(&self) -> bool {
        self.closer_follow_up
            .as_ref()
            .and_then(|f| f.paid_appraisal)
            .unwrap_or(false)
    }
}

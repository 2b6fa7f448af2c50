//! Property-based tests for the lead lifecycle rules
//!
//! These run the service against the in-process store so that thousands of
//! generated cases stay fast. The properties mirror the ownership and locking
//! guarantees the dashboards rely on: contact stamping, legal handoff,
//! rejection returns, and closer assignment on complete appointments.

use lead_lifecycle::{
    LeadService,
    blob::BlobStore,
    config::{PersistenceContext, PersistenceMode},
    directory::{InMemoryDirectory, Role, UserRef},
    error::LeadError,
    lead::{
        Appointment, AppointmentType, CloserFollowUp, Lead, LeadStatus, LeadType, Review,
        ReviewStatus, Substatus,
    },
    patch::LeadPatch,
    selector::RandomSelector,
    store::{LeadStore, LocalLeadStore},
};
use proptest::prelude::*;
use std::sync::Arc;

struct NoBlobs;

impl BlobStore for NoBlobs {
    fn put(&self, _: &str, _: &[u8]) -> Result<String, LeadError> {
        Err(LeadError::Storage("not configured".into()))
    }
}

fn service_with(users: Vec<UserRef>) -> (LeadService, Arc<LocalLeadStore>) {
    let store = Arc::new(LocalLeadStore::new());
    let service = LeadService::new(
        store.clone(),
        Arc::new(InMemoryDirectory::new(users)),
        Arc::new(RandomSelector),
        Arc::new(NoBlobs),
        Arc::new(PersistenceContext::new(PersistenceMode::Local)),
    );
    (service, store)
}

fn users(role: Role, count: usize) -> Vec<UserRef> {
    (0..count)
        .map(|i| {
            let uid = format!("{}_{}", role.as_str(), i);
            UserRef::new(&uid, &uid, &format!("{uid}@example.com"), role)
        })
        .collect()
}

fn approved() -> Review {
    Review {
        status: ReviewStatus::Approved,
        ..Review::pending()
    }
}

/// Strategy for any status other than `nuevo`
fn contacted_status_strategy() -> impl Strategy<Value = LeadStatus> {
    prop_oneof![
        Just(LeadStatus::Contactado),
        Just(LeadStatus::ContactoNoEfectivo),
        Just(LeadStatus::NoContactado),
        Just(LeadStatus::Rechazado),
    ]
}

/// Strategy for substatus values that trigger no transfer on their own
fn plain_substatus_strategy() -> impl Strategy<Value = Option<Substatus>> {
    prop_oneof![
        Just(None),
        Just(Some(Substatus::Interesado)),
        Just(Some(Substatus::Aprobado)),
        Just(Some(Substatus::NoContesta)),
        "[a-z]{3,12}".prop_map(|s| Some(Substatus::Other(s))),
    ]
}

/// Strategy for patches that only touch fields unrelated to the lifecycle
fn unrelated_patch_strategy() -> impl Strategy<Value = LeadPatch> {
    (
        proptest::option::of("[a-z ]{1,20}"),
        proptest::option::of("\\+51 9[0-9]{8}"),
        proptest::option::of(1_000u64..500_000),
    )
        .prop_map(|(notes, phone, amount)| LeadPatch {
            notes,
            phone,
            requested_amount: amount,
            ..Default::default()
        })
}

fn seed(store: &LocalLeadStore, lead: Lead) -> String {
    let id = lead.id.clone();
    store.write(&lead).unwrap();
    id
}

proptest! {
    /// Property: the first move away from `nuevo` stamps `contacted_at`, and
    /// reapplying the same patch leaves the stamp untouched.
    #[test]
    fn prop_contacted_at_set_exactly_once(
        status in contacted_status_strategy(),
        substatus in plain_substatus_strategy(),
    ) {
        let (service, store) = service_with(vec![]);
        let id = seed(&store, Lead {
            id: "lead_p1".into(),
            assigned_to: Some("exec_1".into()),
            ..Default::default()
        });

        let mut patch = LeadPatch::new().set_status(status);
        patch.substatus = substatus;

        let first = service.apply_update(&id, patch.clone()).unwrap();
        prop_assert!(first.contacted_at.is_some());

        let second = service.apply_update(&id, patch).unwrap();
        prop_assert_eq!(first.contacted_at, second.contacted_at);
    }

    /// Property: entering `contactado / en_validacion` with legal users present
    /// hands the lead to one of them and remembers the prior owner.
    #[test]
    fn prop_validation_transfers_to_legal(
        legal_count in 1usize..6,
        owner in "exec_[0-9]{1,3}",
        prior in plain_substatus_strategy(),
    ) {
        let legal = users(Role::Legal, legal_count);
        let (service, store) = service_with(legal.clone());
        let id = seed(&store, Lead {
            id: "lead_p2".into(),
            status: LeadStatus::Contactado,
            substatus: prior,
            assigned_to: Some(owner.clone()),
            ..Default::default()
        });

        let lead = service.apply_update(
            &id,
            LeadPatch::new()
                .set_status(LeadStatus::Contactado)
                .set_substatus(Substatus::EnValidacion),
        ).unwrap();

        prop_assert_eq!(lead.legal_status(), Some(ReviewStatus::PendingReview));
        prop_assert!(legal.iter().any(|u| Some(&u.uid) == lead.assigned_to.as_ref()));
        prop_assert_eq!(lead.previous_owner, Some(owner));
    }

    /// Property: legal rejection returns the lead to `previous_owner` and marks
    /// it `rechazado` whatever substatus it held.
    #[test]
    fn prop_legal_rejection_restores_owner(
        substatus in plain_substatus_strategy(),
        previous in "exec_[0-9]{1,3}",
    ) {
        let (service, store) = service_with(vec![]);
        let id = seed(&store, Lead {
            id: "lead_p3".into(),
            status: LeadStatus::Contactado,
            substatus,
            assigned_to: Some("legal_0".into()),
            previous_owner: Some(previous.clone()),
            legal: Some(Review::pending()),
            ..Default::default()
        });

        let lead = service.reject_legal(&id, "incomplete file", "legal_0").unwrap();

        prop_assert_eq!(lead.status, LeadStatus::Rechazado);
        prop_assert_eq!(lead.assigned_to, Some(previous));
    }

    /// Property: with a complete appointment and both approvals, any patch
    /// assigns a closer, locks the appointment and clears attendance.
    #[test]
    fn prop_complete_appointment_assigns_closer(
        patch in unrelated_patch_strategy(),
        closer_count in 1usize..4,
        attended in proptest::option::of(any::<bool>()),
        lead_type in prop_oneof![Just(LeadType::Loan), Just(LeadType::Investment)],
    ) {
        let closers = users(Role::Closer, closer_count);
        let (service, store) = service_with(closers.clone());
        let id = seed(&store, Lead {
            id: "lead_p4".into(),
            lead_type,
            status: LeadStatus::Contactado,
            substatus: Some(Substatus::Aprobado),
            assigned_to: Some("exec_1".into()),
            legal: Some(approved()),
            commercial: Some(approved()),
            appointment: Some(Appointment {
                date: Some("2025-09-10".into()),
                time: Some("15:00".into()),
                kind: Some(AppointmentType::Presencial),
                ..Default::default()
            }),
            closer_follow_up: Some(CloserFollowUp {
                client_attended: attended,
                ..Default::default()
            }),
            ..Default::default()
        });

        let lead = service.apply_update(&id, patch).unwrap();

        prop_assert!(lead.appointment_locked);
        prop_assert!(closers.iter().any(|u| Some(&u.uid) == lead.closer_assigned_to.as_ref()));
        prop_assert_eq!(&lead.assigned_to, &lead.closer_assigned_to);
        prop_assert_eq!(lead.previous_owner.as_deref(), Some("exec_1"));
        prop_assert_eq!(lead.substatus, Some(Substatus::Cita));
        prop_assert_eq!(lead.closer_follow_up.and_then(|f| f.client_attended), None);
    }

    /// Property: loan leads without both approvals never get a closer, however
    /// complete the appointment is.
    #[test]
    fn prop_loan_without_approvals_keeps_owner(
        legal in proptest::option::of(prop_oneof![
            Just(ReviewStatus::PendingReview),
            Just(ReviewStatus::Approved),
            Just(ReviewStatus::Rejected),
        ]),
        commercial_pending in any::<bool>(),
    ) {
        let (service, store) = service_with(users(Role::Closer, 2));
        let id = seed(&store, Lead {
            id: "lead_p5".into(),
            status: LeadStatus::Contactado,
            assigned_to: Some("exec_1".into()),
            legal: legal.map(|status| Review { status, ..Review::pending() }),
            commercial: commercial_pending.then(Review::pending),
            appointment: Some(Appointment {
                date: Some("2025-09-10".into()),
                time: Some("15:00".into()),
                kind: Some(AppointmentType::Virtual),
                ..Default::default()
            }),
            ..Default::default()
        });

        let lead = service.apply_update(
            &id,
            LeadPatch::new().set_substatus(Substatus::Cita),
        ).unwrap();

        prop_assert!(lead.closer_assigned_to.is_none());
        prop_assert!(!lead.appointment_locked);
        prop_assert_eq!(lead.assigned_to.as_deref(), Some("exec_1"));
    }

    /// Property: every appraisal edit after completion appends one snapshot of
    /// the pre-edit values and leaves older entries as they were.
    #[test]
    fn prop_appraisal_history_is_append_only(
        prices in prop::collection::vec(10_000u64..900_000, 1..6),
    ) {
        let (service, store) = service_with(vec![]);
        let id = seed(&store, Lead {
            id: "lead_p6".into(),
            ..Default::default()
        });

        let mut previous_history = vec![];
        let mut previous_price = None;
        for (i, price) in prices.iter().enumerate() {
            let patch = LeadPatch::new()
                .set_appraisal(lead_lifecycle::patch::AppraisalPatch {
                    price: Some(*price),
                    ..Default::default()
                })
                .by("appraiser_1");
            let lead = service.apply_update(&id, patch).unwrap();
            let appraisal = lead.appraisal.unwrap();

            prop_assert_eq!(appraisal.history.len(), i);
            prop_assert_eq!(&appraisal.history[..previous_history.len()], &previous_history[..]);
            if i > 0 {
                prop_assert_eq!(appraisal.history[i - 1].price, previous_price);
            }
            previous_history = appraisal.history.clone();
            previous_price = Some(*price);
        }
    }
}

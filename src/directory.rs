//! User directory consulted for automatic assignment
use crate::error::LeadError;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    #[n(0)]
    Admin,
    #[n(1)]
    LoanExecutive,
    #[n(2)]
    InvestmentExecutive,
    #[n(3)]
    Legal,
    #[n(4)]
    Commercial,
    #[n(5)]
    Closer,
    #[n(6)]
    AppraisalManager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::LoanExecutive => "loan_executive",
            Role::InvestmentExecutive => "investment_executive",
            Role::Legal => "legal",
            Role::Commercial => "commercial",
            Role::Closer => "closer",
            Role::AppraisalManager => "appraisal_manager",
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    #[n(0)]
    pub uid: String,
    #[n(1)]
    pub display_name: String,
    #[n(2)]
    pub email: String,
    #[n(3)]
    pub role: Role,
}

impl UserRef {
    pub fn new(uid: &str, display_name: &str, email: &str, role: Role) -> Self {
        Self {
            uid: uid.to_string(),
            display_name: display_name.to_string(),
            email: email.to_string(),
            role,
        }
    }
}

pub trait UserDirectory: Send + Sync {
    fn query_by_role(&self, role: Role) -> Result<Vec<UserRef>, LeadError>;
}

/// Directory held in memory; useful for seeding and for tests.
#[derive(Default)]
pub struct InMemoryDirectory {
    users: RwLock<Vec<UserRef>>,
}

impl InMemoryDirectory {
    pub fn new(users: Vec<UserRef>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }

    pub fn add(&self, user: UserRef) {
        self.users.write().push(user);
    }

    pub fn remove(&self, uid: &str) {
        self.users.write().retain(|u| u.uid != uid);
    }
}

impl UserDirectory for InMemoryDirectory {
    fn query_by_role(&self, role: Role) -> Result<Vec<UserRef>, LeadError> {
        Ok(self
            .users
            .read()
            .iter()
            .filter(|u| u.role == role)
            .cloned()
            .collect())
    }
}

/// Users persisted in the `users` tree of the sled database, keyed by uid.
pub struct SledUserDirectory {
    tree: sled::Tree,
}

impl SledUserDirectory {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self, LeadError> {
        let tree = instance.open_tree("users")?;
        Ok(Self { tree })
    }

    pub fn upsert(&self, user: &UserRef) -> Result<(), LeadError> {
        self.tree.insert(user.uid.as_bytes(), minicbor::to_vec(user)?)?;
        Ok(())
    }

    pub fn remove(&self, uid: &str) -> Result<(), LeadError> {
        self.tree.remove(uid.as_bytes())?;
        Ok(())
    }
}

impl UserDirectory for SledUserDirectory {
    fn query_by_role(&self, role: Role) -> Result<Vec<UserRef>, LeadError> {
        let mut users = vec![];
        for entry in self.tree.iter() {
            let (_, value) = entry?;
            let user: UserRef = minicbor::decode(&value)?;
            if user.role == role {
                users.push(user);
            }
        }
        Ok(users)
    }
}

//! Strategy used to pick one owner out of the users holding a role
use crate::directory::UserRef;
use rand::seq::SliceRandom;

pub trait AssigneeSelector: Send + Sync {
    fn pick_one<'a>(&self, candidates: &'a [UserRef]) -> Option<&'a UserRef>;
}

/// Fresh uniform draw on every call. No cursor is kept between calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSelector;

impl AssigneeSelector for RandomSelector {
    fn pick_one<'a>(&self, candidates: &'a [UserRef]) -> Option<&'a UserRef> {
        candidates.choose(&mut rand::thread_rng())
    }
}

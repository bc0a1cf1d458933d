//! Restriction-based [`AccessPolicy`].

use crate::models::{Family, Individual, Restriction};
use crate::traits::AccessPolicy;

/// Hides records by their `RESN` value.
///
/// `confidential` records are never shown. `privacy` records are shown only
/// when `show_private` is set. A family is hidden when it, or any spouse
/// present on it, is hidden.
#[derive(Debug, Clone, Default)]
pub struct RestrictionPolicy {
    pub show_private: bool,
}

impl RestrictionPolicy {
    pub fn new(show_private: bool) -> Self {
        Self { show_private }
    }

    fn allows(&self, restriction: Restriction) -> bool {
        match restriction {
            Restriction::None | Restriction::Locked => true,
            Restriction::Privacy => self.show_private,
            Restriction::Confidential => false,
        }
    }
}

impl AccessPolicy for RestrictionPolicy {
    fn can_show_individual(&self, individual: &Individual) -> bool {
        self.allows(individual.restriction)
    }

    fn can_show_family(&self, family: &Family) -> bool {
        self.allows(family.restriction) && family.spouses().all(|s| self.can_show_individual(s))
    }
}

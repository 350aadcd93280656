/// Terminal synchronization strategy chosen for one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// No usable candidate: clone to the well-known location.
    Clone,
    /// No revision requested: hand back a candidate untouched.
    PickAny,
    /// At least one candidate can reach the revision without losing work.
    PickAndFastForward,
    /// Every candidate needs a checkout: stash first, then move HEAD.
    PickAndStashCheckout,
}

pub fn select(revision_requested: bool, candidates: usize, forwardable: usize) -> Strategy {
    if candidates == 0 {
        return Strategy::Clone;
    }
    if !revision_requested {
        return Strategy::PickAny;
    }
    if forwardable > 0 {
        Strategy::PickAndFastForward
    } else {
        Strategy::PickAndStashCheckout
    }
}

/// Sub-strategy applied to the chosen candidate inside the
/// stash-and-checkout path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    FastForward,
    Detached,
    Reset,
}

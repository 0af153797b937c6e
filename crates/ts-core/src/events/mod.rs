//! Change notifications for rendering-side collaborators

use crate::range::TimeRange;
use crate::variable::{VariableId, VariableState};

/// Trait for components that need to react to variable changes.
///
/// All methods default to no-ops so observers implement only what they
/// consume. Callbacks run on the controller's notification path; keep them
/// short and never call back into the controller from inside one.
pub trait VariableObserver: Send + Sync {
    /// A new display range was applied to the variable.
    fn range_changed(&self, _variable: VariableId, _range: &TimeRange) {}

    /// The variable is still readable but will be gone when this returns.
    fn variable_about_to_be_deleted(&self, _variable: VariableId) {}

    /// The variable moved to a new lifecycle state.
    fn state_changed(&self, _variable: VariableId, _state: VariableState) {}

    /// Fraction of the current acquisition already delivered, in `[0, 1]`.
    fn load_progress(&self, _variable: VariableId, _fraction: f64) {}
}

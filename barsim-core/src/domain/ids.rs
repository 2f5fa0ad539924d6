//! Identifier newtypes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequential fill identifier, assigned by the simulator.
///
/// Fills are numbered in the order they are produced, so two runs over
/// identical inputs assign identical ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FillId(pub u64);

impl fmt::Display for FillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{:08}", self.0)
    }
}

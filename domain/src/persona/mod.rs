//! Reviewer personas
//!
//! The council is a closed set of personas. Each one carries a weight, a
//! veto capability flag and a reference to its prompt template. Rosters are
//! validated when built: weights must sum to 1.0.
//!
//! | Persona          | Weight | Veto |
//! |------------------|--------|------|
//! | Architect        | 0.25   |      |
//! | Critic           | 0.25   |      |
//! | Optimist         | 0.15   |      |
//! | SecurityGuardian | 0.20   | yes  |
//! | UserAdvocate     | 0.15   |      |

pub mod roster;

pub use roster::{PersonaId, PersonaRoster, PersonaSpec, RosterError};

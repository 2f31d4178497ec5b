use serde::{Deserialize, Serialize};

/// Lifecycle state of a particle.
///
/// ```text
/// Inactive -> Waiting -> { InPipe, OnSurface, InSoil } -> LeftSimulation
///                          (active states move freely among themselves)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ParticleStatus {
    /// Created but not yet scheduled for injection.
    #[default]
    Inactive,
    /// Scheduled; becomes active once its injection time is reached.
    Waiting,
    InPipe,
    OnSurface,
    InSoil,
    /// Terminal: the particle left the domain.
    LeftSimulation,
}

impl ParticleStatus {
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ParticleStatus::InPipe | ParticleStatus::OnSurface | ParticleStatus::InSoil
        )
    }

    pub fn is_terminal(self) -> bool {
        self == ParticleStatus::LeftSimulation
    }

    /// Transition table for direct status changes. Staying in the same
    /// active state is allowed. `Waiting -> active` is absent: it depends on
    /// the injection time and only [`Particle::activate`] performs it.
    ///
    /// [`Particle::activate`]: super::Particle::activate
    pub fn can_transition_to(self, to: ParticleStatus) -> bool {
        use ParticleStatus::*;
        match (self, to) {
            (Inactive, Waiting) => true,
            (InPipe | OnSurface | InSoil, InPipe | OnSurface | InSoil | LeftSimulation) => true,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// TransportError: typed errors for the transport core
// ---------------------------------------------------------------------------

use std::fmt;

use crate::particle::{ParticleId, ParticleStatus};

/// Errors returned by fallible core operations.
///
/// Measurement never returns these: a bad sample is logged and dropped so a
/// long run is not aborted by one particle.
#[derive(Debug)]
pub enum TransportError {
    /// A particle status change that the transition table forbids.
    InvalidTransition {
        particle: ParticleId,
        from: ParticleStatus,
        to: ParticleStatus,
    },
    /// Activation requested before the particle's injection time.
    NotYetInjected {
        particle: ParticleId,
        time: f64,
        injection_time: f64,
    },
    UnknownParticle(ParticleId),
    UnknownNode(usize),
    UnknownPipe(usize),
    UnknownMaterial(usize),
    /// An index beyond the size of the container it addresses.
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    /// Configuration JSON could not be parsed.
    Config(serde_json::Error),
    /// Configuration parsed but holds unusable values.
    InvalidConfig(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::InvalidTransition { particle, from, to } => write!(
                f,
                "Invalid status transition for particle {particle}: {from:?} -> {to:?}"
            ),
            TransportError::NotYetInjected {
                particle,
                time,
                injection_time,
            } => write!(
                f,
                "Particle {particle} cannot be activated at t={time}s, injection is at t={injection_time}s"
            ),
            TransportError::UnknownParticle(id) => write!(f, "Unknown particle: {id}"),
            TransportError::UnknownNode(id) => write!(f, "Unknown network node: {id}"),
            TransportError::UnknownPipe(id) => write!(f, "Unknown pipe: {id}"),
            TransportError::UnknownMaterial(id) => write!(f, "Unknown material index: {id}"),
            TransportError::IndexOutOfRange { what, index, len } => {
                write!(f, "{what} index {index} out of range (len {len})")
            }
            TransportError::Config(e) => write!(f, "Configuration error: {e}"),
            TransportError::InvalidConfig(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Config(e)
    }
}

use std::sync::Arc;

use bevy::math::DVec3;

use super::*;
use crate::error::TransportError;
use crate::network::{NodeId, PipeId};
use crate::surface::CellId;

fn material() -> Arc<Material> {
    let mut set = MaterialSet::new();
    set.add("tracer", 0.01, 0.05, RoutingPolicy::Homogeneous)
}

fn surface_injection(time: f64) -> Injection {
    Injection {
        capacity: Capacity::Surface(CellId(4)),
        offset_1d: 0.0,
        time,
        position: DVec3::new(1.0, 2.0, 0.0),
    }
}

fn pipe_injection(time: f64) -> Injection {
    Injection {
        capacity: Capacity::Pipe(PipeId(2)),
        offset_1d: 3.5,
        time,
        position: DVec3::ZERO,
    }
}

// -------------------------------------------------------------------------
// Status transitions
// -------------------------------------------------------------------------

#[test]
fn test_transition_table() {
    use ParticleStatus::*;
    assert!(Inactive.can_transition_to(Waiting));
    assert!(!Inactive.can_transition_to(InPipe));
    assert!(!Waiting.can_transition_to(OnSurface));
    assert!(!Waiting.can_transition_to(InPipe));
    assert!(!Waiting.can_transition_to(LeftSimulation));
    assert!(InPipe.can_transition_to(OnSurface));
    assert!(OnSurface.can_transition_to(InSoil));
    assert!(InSoil.can_transition_to(LeftSimulation));
    for to in [Inactive, Waiting, InPipe, OnSurface, InSoil, LeftSimulation] {
        assert!(
            !LeftSimulation.can_transition_to(to),
            "LeftSimulation must be terminal, allowed -> {to:?}"
        );
    }
}

#[test]
fn test_activation_waits_for_injection_time() {
    let mut p = Particle::new(ParticleId(0), material(), 1.0, surface_injection(10.0));
    p.schedule().unwrap();
    assert!(!p.is_due(5.0));

    let err = p.activate(5.0).unwrap_err();
    assert!(matches!(err, TransportError::NotYetInjected { .. }), "got: {err}");
    assert_eq!(p.status(), ParticleStatus::Waiting);

    assert!(p.is_due(10.0));
    p.activate(10.0).unwrap();
    assert_eq!(p.status(), ParticleStatus::OnSurface);
    assert_eq!(p.surface_cell(), Some(CellId(4)));
    assert_eq!(p.capacity(), Some(Capacity::Surface(CellId(4))));
}

#[test]
fn test_waiting_particle_only_leaves_through_activate() {
    let mut p = Particle::new(ParticleId(3), material(), 1.0, pipe_injection(100.0));
    p.schedule().unwrap();
    assert!(p.activate(0.0).is_err());

    let err = p.enter_pipe(PipeId(0), 0.0).unwrap_err();
    assert!(
        matches!(
            err,
            TransportError::InvalidTransition {
                from: ParticleStatus::Waiting,
                to: ParticleStatus::InPipe,
                ..
            }
        ),
        "got: {err}"
    );
    assert!(p.enter_manhole(NodeId(0)).is_err());
    assert!(p.enter_surface(CellId(0)).is_err());
    assert_eq!(p.status(), ParticleStatus::Waiting);
    assert_eq!(p.capacity(), None);

    p.activate(100.0).unwrap();
    assert_eq!(p.status(), ParticleStatus::InPipe);
}

#[test]
fn test_active_particle_cannot_be_reactivated() {
    let mut p = Particle::new(ParticleId(0), material(), 1.0, surface_injection(0.0));
    p.schedule().unwrap();
    p.activate(0.0).unwrap();
    p.move_on_surface(DVec3::new(1.0, 0.0, 0.0), CellId(5));
    assert!(p.activate(1.0).is_err());
    assert_eq!(p.surface_cell(), Some(CellId(5)));
}

#[test]
fn test_pipe_injection_activates_in_pipe() {
    let mut p = Particle::new(ParticleId(0), material(), 1.0, pipe_injection(0.0));
    p.schedule().unwrap();
    p.activate(0.0).unwrap();
    assert_eq!(p.status(), ParticleStatus::InPipe);
    assert_eq!(p.position_1d, 3.5);
    assert_eq!(p.surface_cell(), None);
}

#[test]
fn test_left_simulation_is_terminal() {
    let mut p = Particle::new(ParticleId(1), material(), 1.0, pipe_injection(0.0));
    p.schedule().unwrap();
    p.activate(0.0).unwrap();
    p.leave_simulation().unwrap();
    assert!(p.has_left());
    assert_eq!(p.capacity(), None);

    let err = p.enter_pipe(PipeId(0), 0.0).unwrap_err();
    assert!(matches!(err, TransportError::InvalidTransition { .. }));
    assert!(p.enter_surface(CellId(0)).is_err());
    assert!(p.enter_manhole(NodeId(0)).is_err());
    assert_eq!(p.status(), ParticleStatus::LeftSimulation);
}

#[test]
fn test_unscheduled_particle_cannot_activate() {
    let mut p = Particle::new(ParticleId(0), material(), 1.0, pipe_injection(0.0));
    assert!(p.activate(100.0).is_err());
    assert_eq!(p.status(), ParticleStatus::Inactive);
}

// -------------------------------------------------------------------------
// Movement bookkeeping
// -------------------------------------------------------------------------

#[test]
fn test_move_along_tracks_abs_and_signed() {
    let mut p = Particle::new(ParticleId(0), material(), 1.0, pipe_injection(0.0));
    p.move_along(2.0);
    p.move_along(-0.5);
    assert_eq!(p.position_1d, 5.0);
    assert_eq!(p.travelled_abs(), 2.5);
    assert_eq!(p.travelled_signed(), 1.5);
}

#[test]
fn test_move_on_surface_updates_cell() {
    let mut p = Particle::new(ParticleId(0), material(), 1.0, surface_injection(0.0));
    p.schedule().unwrap();
    p.activate(0.0).unwrap();
    p.move_on_surface(DVec3::new(3.0, 4.0, 0.0), CellId(9));
    assert_eq!(p.travelled_abs(), 5.0);
    assert_eq!(p.surface_cell(), Some(CellId(9)));
    assert_eq!(p.position, DVec3::new(4.0, 6.0, 0.0));
}

#[test]
fn test_injection_is_retained() {
    let mut p = Particle::new(ParticleId(0), material(), 1.0, pipe_injection(2.0));
    p.schedule().unwrap();
    p.activate(2.0).unwrap();
    p.move_along(10.0);
    p.enter_surface(CellId(1)).unwrap();
    assert_eq!(p.injection().capacity, Capacity::Pipe(PipeId(2)));
    assert_eq!(p.injection().offset_1d, 3.5);
    assert_eq!(p.injection().time, 2.0);
}

// -------------------------------------------------------------------------
// Arena
// -------------------------------------------------------------------------

#[test]
fn test_arena_ids_are_indices() {
    let mut arena = ParticleArena::new();
    let m = material();
    let a = arena.spawn(Arc::clone(&m), 1.0, pipe_injection(0.0)).unwrap();
    let b = arena.spawn(m, 2.0, pipe_injection(0.0)).unwrap();
    assert_eq!(a, ParticleId(0));
    assert_eq!(b, ParticleId(1));
    assert_eq!(arena.get(b).unwrap().mass(), 2.0);
    assert_eq!(arena.get(a).unwrap().status(), ParticleStatus::Waiting);
    assert!(matches!(
        arena.get(ParticleId(7)),
        Err(TransportError::UnknownParticle(ParticleId(7)))
    ));
}

#[test]
fn test_partitions_are_disjoint_and_deterministic() {
    let mut arena = ParticleArena::new();
    let m = material();
    for _ in 0..10 {
        arena.spawn(Arc::clone(&m), 1.0, pipe_injection(0.0)).unwrap();
    }
    let parts = arena.partitions_mut(3);
    let sizes: Vec<usize> = parts.iter().map(|p| p.len()).collect();
    assert_eq!(sizes, vec![4, 4, 2]);
    let first_ids: Vec<ParticleId> = parts.iter().map(|p| p[0].id()).collect();
    assert_eq!(first_ids, vec![ParticleId(0), ParticleId(4), ParticleId(8)]);

    let parts = arena.partitions_mut(1);
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].len(), 10);
}

#[test]
fn test_partitions_of_empty_arena() {
    let mut arena = ParticleArena::new();
    assert!(arena.partitions_mut(4).is_empty());
    assert!(arena.all_left());
}

#[test]
fn test_arena_counts() {
    let mut arena = ParticleArena::new();
    let m = material();
    let a = arena.spawn(Arc::clone(&m), 1.5, pipe_injection(0.0)).unwrap();
    arena.spawn(m, 2.5, pipe_injection(50.0)).unwrap();
    arena.get_mut(a).unwrap().activate(0.0).unwrap();
    assert_eq!(arena.active_count(), 1);
    assert_eq!(arena.count_with_status(ParticleStatus::Waiting), 1);
    assert_eq!(arena.mass_in_domain(), 1.5);
    assert!(!arena.all_left());
}

#[test]
fn test_material_set_indices() {
    let mut set = MaterialSet::new();
    let a = set.add("a", 0.0, 0.0, RoutingPolicy::Homogeneous);
    let b = set.add("b", 0.0, 0.0, RoutingPolicy::Heterogeneous);
    assert_eq!(a.index, 0);
    assert_eq!(b.index, 1);
    assert_eq!(set.len(), 2);
    assert_eq!(set.get(1).unwrap().name, "b");
    assert!(set.get(2).is_err());
}

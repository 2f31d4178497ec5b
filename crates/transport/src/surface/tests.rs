use bevy::math::DVec3;

use super::*;

/// Unit square split along its diagonal into two triangles.
fn square_mesh() -> TriangleMesh {
    let points = vec![
        DVec3::new(0.0, 0.0, 0.0),
        DVec3::new(1.0, 0.0, 0.0),
        DVec3::new(1.0, 1.0, 0.0),
        DVec3::new(0.0, 1.0, 0.0),
    ];
    TriangleMesh::new(points, vec![[0, 1, 2], [0, 2, 3]]).unwrap()
}

#[test]
fn test_mesh_neighbours_from_shared_edge() {
    let mesh = square_mesh();
    assert_eq!(mesh.cell_count(), 2);
    assert_eq!(mesh.neighbours(CellId(0)), vec![CellId(1)]);
    assert_eq!(mesh.neighbours(CellId(1)), vec![CellId(0)]);
    assert!(mesh.neighbours(CellId(5)).is_empty());
}

#[test]
fn test_mesh_rejects_bad_point_index() {
    let points = vec![DVec3::ZERO, DVec3::X, DVec3::Y];
    assert!(TriangleMesh::new(points, vec![[0, 1, 3]]).is_err());
}

#[test]
fn test_mesh_centroid() {
    let mesh = square_mesh();
    let c = mesh.centroid(CellId(0)).unwrap();
    assert!((c - DVec3::new(2.0 / 3.0, 1.0 / 3.0, 0.0)).length() < 1e-12, "got {c}");
    assert_eq!(mesh.centroid(CellId(2)), None);
}

#[test]
fn test_mesh_locate_with_and_without_hint() {
    let mesh = square_mesh();
    let lower = DVec3::new(0.8, 0.2, 0.0);
    let upper = DVec3::new(0.2, 0.8, 0.0);
    assert_eq!(mesh.locate(lower, None), Some(CellId(0)));
    assert_eq!(mesh.locate(upper, None), Some(CellId(1)));
    assert_eq!(mesh.locate(upper, Some(CellId(0))), Some(CellId(1)));
    assert_eq!(mesh.locate(DVec3::new(2.0, 0.5, 0.0), Some(CellId(0))), None);
    assert_eq!(mesh.locate(DVec3::new(f64::NAN, 0.5, 0.0), None), None);
}

#[test]
fn test_mesh_edge_point_belongs_to_hint() {
    let mesh = square_mesh();
    let on_diagonal = DVec3::new(0.5, 0.5, 0.0);
    assert_eq!(mesh.locate(on_diagonal, Some(CellId(1))), Some(CellId(1)));
    assert_eq!(mesh.locate(on_diagonal, Some(CellId(0))), Some(CellId(0)));
}

#[test]
fn test_mesh_velocity() {
    let mut mesh = square_mesh();
    mesh.set_uniform_velocity(DVec3::new(0.1, 0.0, 0.0));
    mesh.set_velocity(CellId(1), DVec3::new(0.0, 0.2, 0.0)).unwrap();
    assert_eq!(mesh.velocity(CellId(0)), DVec3::new(0.1, 0.0, 0.0));
    assert_eq!(mesh.velocity(CellId(1)), DVec3::new(0.0, 0.2, 0.0));
    assert_eq!(mesh.velocity(CellId(9)), DVec3::ZERO);
    assert!(mesh.set_velocity(CellId(9), DVec3::X).is_err());
}

#[test]
fn test_grid_ids_are_row_major() {
    let grid = RectangularGrid::new(DVec3::ZERO, 2.0, 3, 2);
    assert_eq!(grid.cell_count(), 6);
    assert_eq!(grid.cell_at(2, 1), Some(CellId(5)));
    assert_eq!(grid.coords(CellId(4)), Some((1, 1)));
    assert_eq!(grid.cell_at(3, 0), None);
    assert_eq!(grid.coords(CellId(6)), None);
}

#[test]
fn test_grid_locate_and_centroid() {
    let grid = RectangularGrid::new(DVec3::new(10.0, 20.0, 0.0), 2.0, 3, 2);
    assert_eq!(grid.locate(DVec3::new(13.5, 21.0, 0.0), None), Some(CellId(1)));
    assert_eq!(grid.locate(DVec3::new(9.9, 21.0, 0.0), None), None);
    assert_eq!(grid.locate(DVec3::new(16.0, 21.0, 0.0), None), None);
    assert_eq!(grid.centroid(CellId(1)), Some(DVec3::new(13.0, 21.0, 0.0)));
}

#[test]
fn test_grid_neighbours_at_corner_and_middle() {
    let grid = RectangularGrid::new(DVec3::ZERO, 1.0, 3, 3);
    assert_eq!(grid.neighbours(CellId(0)), vec![CellId(1), CellId(3)]);
    assert_eq!(
        grid.neighbours(CellId(4)),
        vec![CellId(1), CellId(3), CellId(5), CellId(7)]
    );
}

#[test]
fn test_grid_vertices() {
    let grid = RectangularGrid::new(DVec3::ZERO, 1.0, 2, 2);
    let v = grid.vertices(CellId(3));
    assert_eq!(v.len(), 4);
    assert_eq!(v[0], DVec3::new(1.0, 1.0, 0.0));
    assert_eq!(v[2], DVec3::new(2.0, 2.0, 0.0));
}

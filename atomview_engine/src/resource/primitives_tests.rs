use super::*;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;

#[test]
fn test_uv_sphere_counts() {
    let sphere = uv_sphere(8, 12);
    assert_eq!(sphere.vertex_count(), 9 * 13);
    // Two triangles per quad, minus one per quad on each pole row
    assert_eq!(sphere.index_count(), (8 * 12 * 2 - 2 * 12) * 3);
    assert!(sphere.indices.iter().all(|&i| i < sphere.vertex_count()));
}

#[test]
fn test_uv_sphere_vertices_on_unit_sphere() {
    let sphere = uv_sphere(6, 6);
    for [position, normal] in &sphere.vertices {
        assert!((position.length() - 1.0).abs() < 1e-5);
        assert_eq!(position, normal);
    }
}

#[test]
fn test_uv_sphere_clamps_detail() {
    let sphere = uv_sphere(0, 0);
    assert_eq!(sphere.vertex_count(), 3 * 4);
    assert!(sphere.index_count() > 0);
}

#[test]
fn test_box_edges_has_twelve_edges() {
    let edges = box_edges(Vec3::new(2.0, 1.0, 3.0));
    assert_eq!(edges.vertex_count(), 8);
    assert_eq!(edges.index_count(), 24);

    for pair in edges.indices.chunks(2) {
        let a = edges.vertices[pair[0] as usize][0];
        let b = edges.vertices[pair[1] as usize][0];
        let differing = [a.x != b.x, a.y != b.y, a.z != b.z].iter().filter(|d| **d).count();
        assert_eq!(differing, 1);
    }
    assert!(edges.vertices.iter().all(|[p, _]| p.x.abs() == 2.0 && p.y.abs() == 1.0 && p.z.abs() == 3.0));
}

#[test]
fn test_build_collection_concatenates_parts() {
    let device: Arc<Mutex<dyn GraphicsDevice>> = Arc::new(Mutex::new(MockGraphicsDevice::new()));
    let sphere = uv_sphere(4, 6);
    let edges = box_edges(Vec3::ONE);

    let collection = build_collection("primitives", device, &[("sphere", &sphere), ("box", &edges)]).unwrap();

    let box_index = collection.submesh_index("box").unwrap();
    let submesh = collection.submesh(box_index).unwrap();
    assert_eq!(submesh.base_vertex(), sphere.vertex_count() as i32);
    assert_eq!(submesh.first_index(), sphere.index_count());
    assert_eq!(submesh.index_count(), 24);
    assert_eq!(collection.vertex_count(), sphere.vertex_count() + 8);
    assert_eq!(collection.index_type(), IndexType::U32);
}

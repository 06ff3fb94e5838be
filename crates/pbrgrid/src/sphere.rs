use std::f32::consts::{PI, TAU};

use renderer::{GeometryError, GeometryResource};

/// Builds a UV sphere centred on the origin.
///
/// Vertices form a `(width + 1) × (height + 1)` grid so the seam and poles
/// carry their own UVs. Triangles that collapse at the poles are skipped.
pub fn uv_sphere(radius: f32, width_segments: u32, height_segments: u32) -> Result<GeometryResource, GeometryError> {
    let width = width_segments.max(3);
    let height = height_segments.max(2);
    let row = width + 1;
    let vertex_count = (row * (height + 1)) as usize;

    let mut positions = Vec::with_capacity(vertex_count * 3);
    let mut normals = Vec::with_capacity(vertex_count * 3);
    let mut uvs = Vec::with_capacity(vertex_count * 2);

    for iy in 0..=height {
        let v = iy as f32 / height as f32;
        let theta = v * PI;
        for ix in 0..=width {
            let u = ix as f32 / width as f32;
            let phi = u * TAU;
            let normal = [-phi.cos() * theta.sin(), theta.cos(), phi.sin() * theta.sin()];
            positions.extend(normal.map(|component| component * radius));
            normals.extend(normal);
            uvs.extend([u, 1.0 - v]);
        }
    }

    let mut indices = Vec::with_capacity((6 * width * (height - 1)) as usize);
    for iy in 0..height {
        for ix in 0..width {
            let a = iy * row + ix + 1;
            let b = iy * row + ix;
            let c = (iy + 1) * row + ix;
            let d = (iy + 1) * row + ix + 1;
            if iy != 0 {
                indices.extend([a, b, d]);
            }
            if iy != height - 1 {
                indices.extend([b, c, d]);
            }
        }
    }

    GeometryResource::builder("sphere")
        .positions(positions)
        .normals(normals)
        .uvs(uvs)
        .indices(indices)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer::{ATTRIBUTE_NORMAL, ATTRIBUTE_POSITION, ATTRIBUTE_UV};

    #[test]
    fn reference_sphere_counts() {
        let sphere = uv_sphere(0.12, 24, 24).unwrap();
        assert_eq!(sphere.vertex_count(), 25 * 25);
        assert_eq!(sphere.index_count(), 6 * 24 * 23);
        assert_eq!(sphere.primitive_count(), 2 * 24 * 23);
    }

    #[test]
    fn vertices_sit_on_the_radius() {
        let sphere = uv_sphere(0.5, 8, 6).unwrap();
        let positions = sphere.attribute(ATTRIBUTE_POSITION).unwrap().data();
        let normals = sphere.attribute(ATTRIBUTE_NORMAL).unwrap().data();
        for (position, normal) in positions.chunks(3).zip(normals.chunks(3)) {
            let length = position.iter().map(|c| c * c).sum::<f32>().sqrt();
            assert!((length - 0.5).abs() < 1e-5);
            for (p, n) in position.iter().zip(normal) {
                assert!((p - n * 0.5).abs() < 1e-6);
            }
        }
        assert_eq!(sphere.attribute(ATTRIBUTE_UV).unwrap().components(), 2);
    }

    #[test]
    fn indices_stay_in_range() {
        let sphere = uv_sphere(1.0, 3, 2).unwrap();
        assert!(sphere.indices().iter().all(|&index| index < sphere.vertex_count()));
    }
}

//! Wavefront OBJ model loading.
//!
//! Models are flattened into a single vertex/index array pair. Vertices that
//! repeat across faces (same position, color, and texture coordinate) are
//! deduplicated so the index buffer does the sharing.

use std::collections::HashMap;
use std::path::Path;

use glam::{Vec2, Vec3};
use tracing::info;

use ember_rhi::vertex::Vertex;

use crate::error::{AssetError, AssetResult};

/// A loaded model: deduplicated vertices plus a u32 index list.
#[derive(Debug, Default)]
pub struct Model {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Model {
    /// Number of triangles in the model.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Loads a Wavefront OBJ file into a [`Model`].
///
/// All meshes in the file are merged. Texture V coordinates are flipped
/// (OBJ places the origin at the bottom-left, the engine samples from the
/// top-left). Vertex color defaults to white.
///
/// # Errors
///
/// Fails on IO or parse errors, and on an OBJ without position data.
pub fn load_model(path: impl AsRef<Path>) -> AssetResult<Model> {
    let path = path.as_ref();
    let (meshes, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )?;

    let mut model = Model::default();
    // Keyed on the vertex's raw bit patterns; f32 itself is not hashable
    let mut unique: HashMap<[u32; 8], u32> = HashMap::new();

    for mesh in meshes.iter().map(|m| &m.mesh) {
        if mesh.positions.is_empty() {
            return Err(AssetError::Invalid(format!(
                "{}: mesh has no position data",
                path.display()
            )));
        }

        for &index in &mesh.indices {
            let i = index as usize;

            let position = Vec3::new(
                mesh.positions[3 * i],
                mesh.positions[3 * i + 1],
                mesh.positions[3 * i + 2],
            );
            let tex_coord = if mesh.texcoords.is_empty() {
                Vec2::ZERO
            } else {
                Vec2::new(mesh.texcoords[2 * i], 1.0 - mesh.texcoords[2 * i + 1])
            };
            let vertex = Vertex::new(position, Vec3::ONE, tex_coord);

            let key = [
                position.x.to_bits(),
                position.y.to_bits(),
                position.z.to_bits(),
                1.0f32.to_bits(),
                1.0f32.to_bits(),
                1.0f32.to_bits(),
                tex_coord.x.to_bits(),
                tex_coord.y.to_bits(),
            ];

            let next = model.vertices.len() as u32;
            let entry = *unique.entry(key).or_insert_with(|| {
                model.vertices.push(vertex);
                next
            });
            model.indices.push(entry);
        }
    }

    info!(
        "Loaded model {}: {} vertices, {} triangles",
        path.display(),
        model.vertices.len(),
        model.triangle_count()
    );

    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp_obj(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_simple_quad() {
        // Two triangles sharing two corners
        let path = write_temp_obj(
            "ember_test_quad.obj",
            "v 0.0 0.0 0.0\nv 1.0 0.0 0.0\nv 1.0 1.0 0.0\nv 0.0 1.0 0.0\n\
             vt 0.0 0.0\nvt 1.0 0.0\nvt 1.0 1.0\nvt 0.0 1.0\n\
             f 1/1 2/2 3/3\nf 1/1 3/3 4/4\n",
        );

        let model = load_model(&path).unwrap();
        std::fs::remove_file(&path).ok();

        // Shared corners deduplicate: 4 unique vertices, 6 indices
        assert_eq!(model.vertices.len(), 4);
        assert_eq!(model.indices.len(), 6);
        assert_eq!(model.triangle_count(), 2);
    }

    #[test]
    fn test_tex_coord_v_is_flipped() {
        let path = write_temp_obj(
            "ember_test_vflip.obj",
            "v 0.0 0.0 0.0\nv 1.0 0.0 0.0\nv 1.0 1.0 0.0\n\
             vt 0.0 0.25\nvt 1.0 0.25\nvt 1.0 1.0\n\
             f 1/1 2/2 3/3\n",
        );

        let model = load_model(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert!((model.vertices[0].tex_coord.y - 0.75).abs() < 1e-6);
        assert!((model.vertices[2].tex_coord.y - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_vertex_color_defaults_to_white() {
        let path = write_temp_obj(
            "ember_test_white.obj",
            "v 0.0 0.0 0.0\nv 1.0 0.0 0.0\nv 1.0 1.0 0.0\nf 1 2 3\n",
        );

        let model = load_model(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(model.vertices.iter().all(|v| v.color == Vec3::ONE));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_model("/nonexistent/model.obj").is_err());
    }
}

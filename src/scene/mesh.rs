use glam::{Vec3, Vec4};

use crate::scene::bounds::BoundingBox;

/// CPU-side triangle mesh with optional skinning attributes.
///
/// `joints[i]` / `weights[i]` belong to `positions[i]`; both are empty for a
/// rigid mesh. Joint indices address the bones of the skeleton bound to the
/// node carrying the mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub joints: Vec<[u16; 4]>,
    pub weights: Vec<Vec4>,
    pub indices: Vec<u32>,
}

impl Mesh {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    #[must_use]
    pub fn is_skinned(&self) -> bool {
        !self.joints.is_empty() && self.joints.len() == self.positions.len() && self.weights.len() == self.positions.len()
    }

    #[must_use]
    pub fn local_bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.positions.iter().copied())
    }

    /// Appends another primitive, offsetting its indices.
    pub fn append(&mut self, other: Mesh) {
        let base = self.positions.len() as u32;
        self.positions.extend(other.positions);
        self.joints.extend(other.joints);
        self.weights.extend(other.weights);
        self.indices.extend(other.indices.into_iter().map(|i| i + base));
    }

    /// An axis-aligned cube of edge `size` centred on the origin, every vertex
    /// bound to joint 0 with full weight.
    #[must_use]
    pub fn placeholder_box(size: f32) -> Self {
        let h = size * 0.5;
        let positions: Vec<Vec3> = (0..8)
            .map(|i| {
                Vec3::new(
                    if i & 1 == 0 { -h } else { h },
                    if i & 2 == 0 { -h } else { h },
                    if i & 4 == 0 { -h } else { h },
                )
            })
            .collect();

        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1, 1, 2, 3, // -z
            4, 5, 6, 5, 7, 6, // +z
            0, 1, 4, 1, 5, 4, // -y
            2, 6, 3, 3, 6, 7, // +y
            0, 4, 2, 2, 4, 6, // -x
            1, 3, 5, 3, 7, 5, // +x
        ];

        let count = positions.len();
        Self {
            name: "Placeholder".to_string(),
            positions,
            joints: vec![[0; 4]; count],
            weights: vec![Vec4::new(1.0, 0.0, 0.0, 0.0); count],
            indices,
        }
    }
}

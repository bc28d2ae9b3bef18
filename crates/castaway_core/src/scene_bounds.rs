//! Scene and camera bounds queries for the shadow fitter.
//!
//! The fitter consumes two kinds of information:
//! - **Scene bounds** ([`SceneBoundsSource`]): either *tight* (every vertex of
//!   every shadow caster, transformed exactly) or *precomputed* (cached
//!   per-mesh boxes, cheap but possibly loose).
//! - **View bounds** ([`ViewFrustumSource`]): a volume around the active
//!   camera's view frustum.
//!
//! Both are expressed in world space and handed a target frame (usually the
//! light space from [`crate::lens::light_space_from_world`]).
//!
//! [`SceneGeometry`] and [`CameraView`] are plain snapshots, built from the
//! ECS once per frame by [`collect_scene_geometry`] and [`CameraView::from_camera`].

use bevy::mesh::VertexAttributeValues;
use bevy::prelude::*;

use crate::bounds::{BoundingVolume, Bounds, VolumeKind};

/// Marks the root of the shadow-casting scene graph.
///
/// Every mesh below this entity casts shadows and contributes to the fit.
#[derive(Component, Default)]
pub struct ShadowSceneRoot;

/// Cached mesh-local bounds of a mesh entity.
#[derive(Component, Clone, Copy, Debug)]
pub struct LocalBounds(pub Bounds);

/// Scene-graph side of the fitter.
pub trait SceneBoundsSource {
    /// Exact bounds of every caster vertex, in the frame given by `frame`
    /// (a world-to-frame matrix).
    fn tight_bounds(&self, frame: &Mat4) -> Bounds;

    /// Cached scene volume transformed into `frame`.
    fn precomputed_volume(&self, frame: &Mat4, kind: VolumeKind) -> BoundingVolume;
}

/// Camera side of the fitter.
pub trait ViewFrustumSource {
    /// World-space volume around the view frustum.
    fn frustum_volume(&self) -> BoundingVolume;
}

// ============================================================================
// Scene snapshot
// ============================================================================

/// One shadow-casting mesh instance.
#[derive(Clone, Debug)]
pub struct CasterGeometry<'a> {
    pub world_from_local: Mat4,
    pub local_bounds: Bounds,
    pub positions: &'a [[f32; 3]],
}

/// Every shadow caster of the scene for the current frame.
#[derive(Clone, Debug, Default)]
pub struct SceneGeometry<'a> {
    pub casters: Vec<CasterGeometry<'a>>,
}

impl<'a> SceneGeometry<'a> {
    pub fn is_empty(&self) -> bool {
        self.casters.is_empty()
    }

    /// World-space union of the cached per-mesh boxes.
    pub fn world_bounds(&self) -> Bounds {
        self.casters.iter().fold(Bounds::EMPTY, |acc, c| {
            acc.union(c.local_bounds.transform(&c.world_from_local))
        })
    }
}

impl SceneBoundsSource for SceneGeometry<'_> {
    fn tight_bounds(&self, frame: &Mat4) -> Bounds {
        self.casters.iter().fold(Bounds::EMPTY, |acc, caster| {
            let to_frame = *frame * caster.world_from_local;
            caster.positions.iter().fold(acc, |b, p| {
                b.extend(to_frame.transform_point3(Vec3::from_array(*p)))
            })
        })
    }

    fn precomputed_volume(&self, frame: &Mat4, kind: VolumeKind) -> BoundingVolume {
        BoundingVolume::from_bounds(self.world_bounds(), kind).transform(frame)
    }
}

/// Vertex positions of a mesh, when stored as three floats per vertex.
pub fn mesh_positions(mesh: &Mesh) -> Option<&[[f32; 3]]> {
    match mesh.attribute(Mesh::ATTRIBUTE_POSITION)? {
        VertexAttributeValues::Float32x3(positions) => Some(positions.as_slice()),
        _ => None,
    }
}

/// Mesh-local bounds from vertex positions. Empty when the mesh has none.
pub fn mesh_local_bounds(mesh: &Mesh) -> Bounds {
    mesh_positions(mesh)
        .map(|positions| Bounds::from_points(positions.iter().map(|p| Vec3::from_array(*p))))
        .unwrap_or(Bounds::EMPTY)
}

/// Cache [`LocalBounds`] on mesh entities once their mesh asset is loaded.
pub fn compute_local_bounds(
    mut commands: Commands,
    meshes: Res<Assets<Mesh>>,
    query: Query<(Entity, &Mesh3d), Or<(Without<LocalBounds>, Changed<Mesh3d>)>>,
) {
    for (entity, mesh3d) in query.iter() {
        // Not loaded yet; retried next frame.
        let Some(mesh) = meshes.get(&mesh3d.0) else {
            continue;
        };
        commands.entity(entity).insert(LocalBounds(mesh_local_bounds(mesh)));
    }
}

/// Gather every mesh below a [`ShadowSceneRoot`] into a [`SceneGeometry`].
pub fn collect_scene_geometry<'a>(
    roots: &Query<Entity, With<ShadowSceneRoot>>,
    children: &Query<&Children>,
    casters: &Query<(&Mesh3d, &GlobalTransform, &LocalBounds)>,
    meshes: &'a Assets<Mesh>,
) -> SceneGeometry<'a> {
    let mut geometry = SceneGeometry::default();
    for root in roots.iter() {
        for entity in std::iter::once(root).chain(children.iter_descendants(root)) {
            let Ok((mesh3d, transform, local)) = casters.get(entity) else {
                continue;
            };
            let Some(positions) = meshes.get(&mesh3d.0).and_then(mesh_positions) else {
                continue;
            };
            geometry.casters.push(CasterGeometry {
                world_from_local: Mat4::from(transform.affine()),
                local_bounds: local.0,
                positions,
            });
        }
    }
    geometry
}

// ============================================================================
// Camera snapshot
// ============================================================================

/// Camera projection parameters relevant to frustum bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ViewProjection {
    Perspective {
        /// Vertical field of view (radians).
        fov: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        /// View-space rectangle (min = left/bottom, max = right/top).
        area: Rect,
        near: f32,
        far: f32,
    },
}

impl ViewProjection {
    /// The eight frustum corners in view space (camera looks down -Z).
    pub fn view_space_corners(&self) -> [Vec3; 8] {
        match *self {
            ViewProjection::Perspective {
                fov,
                aspect_ratio,
                near,
                far,
            } => {
                let tan = (fov * 0.5).tan();
                let plane = |d: f32| {
                    let hh = d * tan;
                    let hw = hh * aspect_ratio;
                    [
                        Vec3::new(-hw, -hh, -d),
                        Vec3::new(hw, -hh, -d),
                        Vec3::new(-hw, hh, -d),
                        Vec3::new(hw, hh, -d),
                    ]
                };
                let (n, f) = (plane(near), plane(far));
                [n[0], n[1], n[2], n[3], f[0], f[1], f[2], f[3]]
            }
            ViewProjection::Orthographic { area, near, far } => {
                let plane = |d: f32| {
                    [
                        Vec3::new(area.min.x, area.min.y, -d),
                        Vec3::new(area.max.x, area.min.y, -d),
                        Vec3::new(area.min.x, area.max.y, -d),
                        Vec3::new(area.max.x, area.max.y, -d),
                    ]
                };
                let (n, f) = (plane(near), plane(far));
                [n[0], n[1], n[2], n[3], f[0], f[1], f[2], f[3]]
            }
        }
    }
}

/// A camera's world transform and projection, captured for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraView {
    pub world_from_view: Mat4,
    pub projection: ViewProjection,
}

impl CameraView {
    /// Snapshot a Bevy camera. `None` for custom projections.
    pub fn from_camera(transform: &GlobalTransform, projection: &Projection) -> Option<Self> {
        let projection = match projection {
            Projection::Perspective(p) => ViewProjection::Perspective {
                fov: p.fov,
                aspect_ratio: p.aspect_ratio,
                near: p.near,
                far: p.far,
            },
            Projection::Orthographic(o) => ViewProjection::Orthographic {
                area: o.area,
                near: o.near,
                far: o.far,
            },
            _ => return None,
        };
        Some(Self {
            world_from_view: Mat4::from(transform.affine()),
            projection,
        })
    }

    /// World-space frustum corners.
    pub fn world_corners(&self) -> [Vec3; 8] {
        self.projection
            .view_space_corners()
            .map(|c| self.world_from_view.transform_point3(c))
    }
}

impl ViewFrustumSource for CameraView {
    fn frustum_volume(&self) -> BoundingVolume {
        BoundingVolume::Box(Bounds::from_points(self.world_corners()))
    }
}

use std::collections::HashMap;

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

use crate::plugins::chunk_grid::ChunkGrid;
use crate::plugins::forest::PlacedElement;
use crate::plugins::mesh_builder::MeshPayload;
use crate::plugins::terrain_chunk::ChunkEvent;
use crate::plugins::terrain_settings::TerrainSettings;
use crate::plugins::viewer::Viewer;

/// Running totals of what the streamer has done, for logging and tests.
#[derive(Resource, Default, Debug, Clone, PartialEq, Eq)]
pub struct ChunkStats {
    pub created: u64,
    pub evicted: u64,
    pub mesh_swaps: u64,
    pub colliders: u64,
    pub forest_elements: u64,
    pub visible: usize,
    pub loaded: usize,
    pub in_flight: usize,
}

impl ChunkStats {
    fn record(&mut self, events: &[ChunkEvent]) {
        for event in events {
            match event {
                ChunkEvent::Created { .. } => self.created += 1,
                ChunkEvent::Evicted { .. } => self.evicted += 1,
                ChunkEvent::MeshSwapped { .. } => self.mesh_swaps += 1,
                ChunkEvent::ColliderAssigned { .. } => self.colliders += 1,
                ChunkEvent::ForestPlanted { elements, .. } => self.forest_elements += elements.len() as u64,
                ChunkEvent::VisibilityChanged { .. } => {}
            }
        }
    }
}

/// Streaming core: settings, the chunk grid and the per-frame tick. Headless safe.
pub struct TerrainPlugin;
impl Plugin for TerrainPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TerrainSettings>() // respect pre-inserted settings (e.g. loaded from RON)
            .init_resource::<ChunkStats>()
            .add_event::<ChunkEvent>()
            .add_systems(PreStartup, init_chunk_grid)
            .add_systems(Update, stream_terrain);
    }
}

fn init_chunk_grid(mut commands: Commands, settings: Res<TerrainSettings>) {
    match ChunkGrid::new(settings.clone()) {
        Ok(grid) => commands.insert_resource(grid),
        Err(e) => error!("TERRAIN settings_invalid error={e}"),
    }
}

pub fn stream_terrain(
    grid: Option<ResMut<ChunkGrid>>,
    mut stats: ResMut<ChunkStats>,
    q_viewer: Query<&Transform, With<Viewer>>,
    mut writer: EventWriter<ChunkEvent>,
) {
    let Some(mut grid) = grid else { return; };
    let viewer = q_viewer
        .get_single()
        .map(|t| Vec2::new(t.translation.x, t.translation.z))
        .unwrap_or(Vec2::ZERO);
    grid.tick(viewer);

    let events = grid.take_events();
    stats.record(&events);
    stats.visible = grid.visible_chunks().len();
    stats.loaded = grid.chunk_count();
    stats.in_flight = grid.in_flight_jobs();
    if !events.is_empty() {
        writer.send_batch(events);
    }
}

// ----------------------- Rendering -----------------------

/// Marker on the entity that displays one chunk.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainChunkEntity {
    pub coord: IVec2,
}

#[derive(Component)]
pub struct ForestElementEntity;

struct ChunkRender {
    entity: Entity,
    origin: Vec3,
    meshes: HashMap<usize, Handle<Mesh>>,
}

#[derive(Resource, Default)]
pub struct ChunkEntities {
    map: HashMap<IVec2, ChunkRender>,
}

impl ChunkEntities {
    pub fn get(&self, coord: IVec2) -> Option<Entity> {
        self.map.get(&coord).map(|r| r.entity)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[derive(Resource)]
struct TerrainMaterial(Handle<StandardMaterial>);

/// Turns `ChunkEvent`s into entities, meshes, colliders and forest scenes.
pub struct TerrainRenderPlugin;
impl Plugin for TerrainRenderPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ChunkEntities>()
            .add_systems(Startup, setup_terrain_material)
            .add_systems(Update, apply_chunk_events.after(stream_terrain));
    }
}

fn setup_terrain_material(mut commands: Commands, mut materials: ResMut<Assets<StandardMaterial>>) {
    let material = materials.add(StandardMaterial {
        base_color: Color::WHITE,
        perceptual_roughness: 0.9,
        metallic: 0.0,
        ..default()
    });
    commands.insert_resource(TerrainMaterial(material));
}

// Low to high; vertex colours lerp between neighbouring bands.
const HEIGHT_PALETTE: [Vec3; 7] = [
    Vec3::new(0.06, 0.20, 0.18),
    Vec3::new(0.12, 0.32, 0.22),
    Vec3::new(0.32, 0.46, 0.24),
    Vec3::new(0.55, 0.58, 0.34),
    Vec3::new(0.63, 0.55, 0.38),
    Vec3::new(0.52, 0.42, 0.34),
    Vec3::new(0.55, 0.55, 0.55),
];

fn height_colours(payload: &MeshPayload, min_h: f32, max_h: f32) -> Vec<[f32; 4]> {
    let bands = (HEIGHT_PALETTE.len() - 1) as f32;
    payload
        .vertices
        .iter()
        .zip(&payload.normals)
        .map(|(v, n)| {
            let h_norm = if max_h > min_h { ((v.y - min_h) / (max_h - min_h)).clamp(0.0, 1.0) } else { 0.0 };
            let scaled = h_norm * bands;
            let band = scaled.floor().clamp(0.0, bands - 1.0) as usize;
            let t = (scaled - band as f32).clamp(0.0, 1.0);
            let base = HEIGHT_PALETTE[band].lerp(HEIGHT_PALETTE[band + 1], t);
            let slope_dark = 0.85 + 0.15 * n.y.clamp(0.0, 1.0).powf(0.8);
            let c = base * slope_dark;
            [c.x, c.y, c.z, 1.0]
        })
        .collect()
}

fn spawn_forest(
    parent: &mut ChildBuilder,
    origin: Vec3,
    elements: &[PlacedElement],
    assets: &AssetServer,
) {
    for element in elements {
        parent.spawn((
            SceneBundle {
                scene: assets.load(element.model.clone()),
                transform: Transform::from_translation(element.position - origin)
                    .with_rotation(Quat::from_rotation_y(element.yaw))
                    .with_scale(Vec3::splat(element.scale)),
                ..default()
            },
            ForestElementEntity,
            Name::new(element.name.clone()),
        ));
    }
}

fn apply_chunk_events(
    mut commands: Commands,
    mut events: EventReader<ChunkEvent>,
    mut entities: ResMut<ChunkEntities>,
    mut meshes: ResMut<Assets<Mesh>>,
    material: Option<Res<TerrainMaterial>>,
    settings: Res<TerrainSettings>,
    assets: Res<AssetServer>,
) {
    let Some(material) = material else { return; };
    let (min_h, max_h) = (settings.height_map.min_height(), settings.height_map.max_height());

    for event in events.read() {
        match event {
            ChunkEvent::Created { coord, world_position } => {
                let origin = Vec3::new(world_position.x, 0.0, world_position.y);
                let entity = commands
                    .spawn((
                        PbrBundle {
                            material: material.0.clone(),
                            transform: Transform::from_translation(origin),
                            visibility: Visibility::Hidden,
                            ..default()
                        },
                        TerrainChunkEntity { coord: *coord },
                        Name::new(format!("chunk ({},{})", coord.x, coord.y)),
                    ))
                    .id();
                entities.map.insert(*coord, ChunkRender { entity, origin, meshes: HashMap::new() });
            }
            ChunkEvent::Evicted { coord } => {
                if let Some(render) = entities.map.remove(coord) {
                    for handle in render.meshes.values() {
                        meshes.remove(handle);
                    }
                    commands.entity(render.entity).despawn_recursive();
                }
            }
            ChunkEvent::VisibilityChanged { coord, visible } => {
                if let Some(render) = entities.map.get(coord) {
                    let v = if *visible { Visibility::Visible } else { Visibility::Hidden };
                    commands.entity(render.entity).insert(v);
                }
            }
            ChunkEvent::MeshSwapped { coord, lod_index, mesh } => {
                let Some(render) = entities.map.get_mut(coord) else { continue; };
                let handle = render
                    .meshes
                    .entry(*lod_index)
                    .or_insert_with(|| {
                        let mut m = mesh.to_mesh();
                        m.insert_attribute(Mesh::ATTRIBUTE_COLOR, height_colours(mesh, min_h, max_h));
                        meshes.add(m)
                    })
                    .clone();
                commands.entity(render.entity).insert(handle);
            }
            ChunkEvent::ColliderAssigned { coord, mesh, .. } => {
                let Some(render) = entities.map.get(coord) else { continue; };
                commands.entity(render.entity).insert((
                    RigidBody::Fixed,
                    Collider::trimesh(mesh.vertices.clone(), mesh.triangle_list()),
                    Friction {
                        coefficient: 1.0,
                        combine_rule: CoefficientCombineRule::Average,
                    },
                ));
            }
            ChunkEvent::ForestPlanted { coord, elements } => {
                let Some(render) = entities.map.get(coord) else { continue; };
                let origin = render.origin;
                commands
                    .entity(render.entity)
                    .with_children(|parent| spawn_forest(parent, origin, elements, &assets));
            }
        }
    }
}

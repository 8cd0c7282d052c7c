use std::sync::Arc;

use bevy::prelude::*;

use crate::plugins::compute_queue::{ComputeQueue, JobResult};
use crate::plugins::forest::{self, Forest, PlacedElement};
use crate::plugins::height_map::{HeightMap, HeightMapBuilder};
use crate::plugins::mesh_builder::{build_terrain_mesh, MeshPayload};
use crate::plugins::terrain_settings::{LodInfo, TerrainSettings};

/// Total attempts (first try included) for a heightmap or mesh job before a chunk gives up on it.
pub const MAX_JOB_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshJobKey {
    pub coord: IVec2,
    pub lod_index: usize,
}

pub type HeightMapQueue = ComputeQueue<IVec2, HeightMap>;
pub type MeshQueue = ComputeQueue<MeshJobKey, MeshPayload>;

/// Notifications emitted by chunks and the grid. Each state flip is reported once.
#[derive(Event, Debug, Clone)]
pub enum ChunkEvent {
    Created { coord: IVec2, world_position: Vec2 },
    Evicted { coord: IVec2 },
    VisibilityChanged { coord: IVec2, visible: bool },
    MeshSwapped { coord: IVec2, lod_index: usize, mesh: Arc<MeshPayload> },
    ColliderAssigned { coord: IVec2, lod_index: usize, mesh: Arc<MeshPayload> },
    ForestPlanted { coord: IVec2, elements: Vec<PlacedElement> },
}

/// Everything a chunk may touch during one call. Owned by the grid, borrowed per call.
pub struct ChunkContext<'a> {
    pub viewer: Vec2,
    pub tick: u64,
    pub settings: &'a TerrainSettings,
    pub height_builder: &'a Arc<HeightMapBuilder>,
    pub height_jobs: &'a mut HeightMapQueue,
    pub mesh_jobs: &'a mut MeshQueue,
    pub forest: &'a mut Forest,
    pub events: &'a mut Vec<ChunkEvent>,
}

/// Axis-aligned square footprint of a chunk on the XZ plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkBounds {
    pub centre: Vec2,
    pub half_extent: f32,
}

impl ChunkBounds {
    pub fn sqr_distance(&self, point: Vec2) -> f32 {
        let d = ((point - self.centre).abs() - Vec2::splat(self.half_extent)).max(Vec2::ZERO);
        d.length_squared()
    }
}

/// Index of the finest detail level whose threshold covers `distance`; the last level catches the rest.
pub fn select_lod_index(levels: &[LodInfo], distance: f32) -> usize {
    let mut lod_index = 0;
    for (i, level) in levels.iter().enumerate().take(levels.len().saturating_sub(1)) {
        if distance > level.visible_dst_threshold {
            lod_index = i + 1;
        } else {
            break;
        }
    }
    lod_index
}

#[derive(Debug, Default)]
struct LodMesh {
    lod: u32,
    mesh: Option<Arc<MeshPayload>>,
    attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    AwaitingHeightMap,
    Ready,
    Failed,
}

pub struct TerrainChunk {
    pub coord: IVec2,
    sample_centre: Vec2,
    world_position: Vec2,
    bounds: ChunkBounds,
    state: ChunkState,
    height_map: Option<Arc<HeightMap>>,
    height_map_attempts: u32,
    lod_meshes: Vec<LodMesh>,
    current_lod_index: Option<usize>,
    visible: bool,
    collider_lod_index: Option<usize>,
    forest_keys: Vec<IVec2>,
    last_visible_tick: u64,
}

impl TerrainChunk {
    pub fn new(coord: IVec2, settings: &TerrainSettings, tick: u64) -> Self {
        let world_size = settings.mesh.mesh_world_size();
        let world_position = coord.as_vec2() * world_size;
        Self {
            coord,
            sample_centre: world_position / settings.mesh.mesh_scale,
            world_position,
            bounds: ChunkBounds { centre: world_position, half_extent: world_size / 2.0 },
            state: ChunkState::AwaitingHeightMap,
            height_map: None,
            height_map_attempts: 0,
            lod_meshes: settings
                .streaming
                .detail_levels
                .iter()
                .map(|l| LodMesh { lod: l.lod, ..default() })
                .collect(),
            current_lod_index: None,
            visible: false,
            collider_lod_index: None,
            forest_keys: Vec::new(),
            last_visible_tick: tick,
        }
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn bounds(&self) -> ChunkBounds {
        self.bounds
    }

    pub fn world_position(&self) -> Vec2 {
        self.world_position
    }

    pub fn sample_centre(&self) -> Vec2 {
        self.sample_centre
    }

    pub fn height_map(&self) -> Option<&Arc<HeightMap>> {
        self.height_map.as_ref()
    }

    pub fn current_lod_index(&self) -> Option<usize> {
        self.current_lod_index
    }

    pub fn active_mesh(&self) -> Option<&Arc<MeshPayload>> {
        self.current_lod_index
            .and_then(|i| self.lod_meshes.get(i))
            .and_then(|m| m.mesh.as_ref())
    }

    pub fn has_mesh(&self, lod_index: usize) -> bool {
        self.lod_meshes.get(lod_index).is_some_and(|m| m.mesh.is_some())
    }

    pub fn has_set_collider(&self) -> bool {
        self.collider_lod_index.is_some()
    }

    pub fn collider_mesh(&self) -> Option<&Arc<MeshPayload>> {
        self.collider_lod_index
            .and_then(|i| self.lod_meshes.get(i))
            .and_then(|m| m.mesh.as_ref())
    }

    pub fn forest_keys(&self) -> &[IVec2] {
        &self.forest_keys
    }

    pub fn last_visible_tick(&self) -> u64 {
        self.last_visible_tick
    }

    /// Kick off the heightmap job for this chunk.
    pub fn load(&mut self, ctx: &mut ChunkContext) {
        let builder = Arc::clone(ctx.height_builder);
        let verts_per_line = ctx.settings.mesh.verts_per_line();
        let centre = self.sample_centre;
        if ctx
            .height_jobs
            .submit(self.coord, move || builder.build(verts_per_line, centre))
        {
            self.height_map_attempts += 1;
        }
    }

    pub fn on_height_map_received(&mut self, result: JobResult<HeightMap>, ctx: &mut ChunkContext) {
        if self.height_map.is_some() {
            return;
        }
        let height_map = match result {
            Ok(h) => Arc::new(h),
            Err(e) => {
                if self.height_map_attempts < MAX_JOB_ATTEMPTS {
                    warn!("TERRAIN heightmap_failed coord=({},{}) attempt={} error={e}", self.coord.x, self.coord.y, self.height_map_attempts);
                    self.load(ctx);
                } else {
                    error!("TERRAIN heightmap_abandoned coord=({},{}) error={e}", self.coord.x, self.coord.y);
                    self.state = ChunkState::Failed;
                }
                return;
            }
        };
        self.height_map = Some(Arc::clone(&height_map));
        self.state = ChunkState::Ready;
        self.update(ctx);

        let keys = forest::scatter(
            ctx.forest,
            &ctx.settings.forest,
            &ctx.settings.mesh,
            self.coord,
            self.sample_centre,
            &height_map,
        );
        if !keys.is_empty() {
            let elements = keys.iter().filter_map(|k| ctx.forest.get(*k).cloned()).collect();
            debug!("FOREST planted coord=({},{}) count={}", self.coord.x, self.coord.y, keys.len());
            ctx.events.push(ChunkEvent::ForestPlanted { coord: self.coord, elements });
        }
        self.forest_keys = keys;
    }

    pub fn on_mesh_received(
        &mut self,
        lod_index: usize,
        result: JobResult<MeshPayload>,
        ctx: &mut ChunkContext,
    ) {
        let Some(slot) = self.lod_meshes.get_mut(lod_index) else { return; };
        if slot.mesh.is_some() {
            return;
        }
        match result {
            Ok(mesh) => slot.mesh = Some(Arc::new(mesh)),
            Err(e) => {
                let level = if slot.attempts < MAX_JOB_ATTEMPTS { "retry" } else { "abandoned" };
                warn!("TERRAIN mesh_failed coord=({},{}) lod_index={lod_index} attempts={} {level} error={e}", self.coord.x, self.coord.y, slot.attempts);
            }
        }
        self.update(ctx);
        if lod_index == ctx.settings.streaming.collider_lod_index {
            self.update_collision_mesh(ctx);
        }
    }

    /// Re-evaluate visibility and the LOD this chunk should display.
    pub fn update(&mut self, ctx: &mut ChunkContext) {
        if self.height_map.is_none() {
            return;
        }
        let settings = ctx.settings;
        let streaming = &settings.streaming;
        let distance = self.bounds.sqr_distance(ctx.viewer).sqrt();
        let was_visible = self.visible;
        let visible = distance <= streaming.max_view_distance();

        if visible {
            let lod_index = select_lod_index(&streaming.detail_levels, distance);
            if self.current_lod_index != Some(lod_index) {
                if let Some(mesh) = self.lod_meshes[lod_index].mesh.clone() {
                    self.current_lod_index = Some(lod_index);
                    ctx.events.push(ChunkEvent::MeshSwapped { coord: self.coord, lod_index, mesh });
                } else {
                    self.request_mesh(lod_index, ctx);
                }
            }
            self.last_visible_tick = ctx.tick;
        }

        if was_visible != visible {
            self.visible = visible;
            // Eviction grace counts from the tick the chunk left view.
            self.last_visible_tick = ctx.tick;
            ctx.events.push(ChunkEvent::VisibilityChanged { coord: self.coord, visible });
        }
    }

    /// Request and eventually latch the collider mesh. Independent of the displayed LOD.
    pub fn update_collision_mesh(&mut self, ctx: &mut ChunkContext) {
        if self.collider_lod_index.is_some() || self.height_map.is_none() {
            return;
        }
        let settings = ctx.settings;
        let streaming = &settings.streaming;
        let lod_index = streaming.collider_lod_index;
        let sqr_dst = self.bounds.sqr_distance(ctx.viewer);

        if sqr_dst < streaming.detail_levels[lod_index].sqr_visible_dst_threshold() {
            self.request_mesh(lod_index, ctx);
        }

        let threshold = streaming.collider_generation_distance;
        if sqr_dst < threshold * threshold {
            if let Some(mesh) = self.lod_meshes[lod_index].mesh.clone() {
                self.collider_lod_index = Some(lod_index);
                info!("TERRAIN collider_set coord=({},{}) lod_index={lod_index}", self.coord.x, self.coord.y);
                ctx.events.push(ChunkEvent::ColliderAssigned { coord: self.coord, lod_index, mesh });
            }
        }
    }

    fn request_mesh(&mut self, lod_index: usize, ctx: &mut ChunkContext) {
        let Some(height_map) = self.height_map.clone() else { return; };
        let slot = &mut self.lod_meshes[lod_index];
        if slot.mesh.is_some() || slot.attempts >= MAX_JOB_ATTEMPTS {
            return;
        }
        let key = MeshJobKey { coord: self.coord, lod_index };
        let mesh_settings = ctx.settings.mesh.clone();
        let lod = slot.lod;
        if ctx
            .mesh_jobs
            .submit(key, move || build_terrain_mesh(&height_map, &mesh_settings, lod))
        {
            slot.attempts += 1;
        }
    }
}

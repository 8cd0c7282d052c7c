use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bevy::prelude::*;

use crate::plugins::forest::Forest;
use crate::plugins::height_map::HeightMapBuilder;
use crate::plugins::terrain_chunk::{
    ChunkContext, ChunkEvent, HeightMapQueue, MeshQueue, TerrainChunk,
};
use crate::plugins::terrain_settings::{SettingsError, TerrainSettings};

/// Owns every streamed chunk plus the job queues and shared forest they use.
///
/// Call [`ChunkGrid::tick`] once per frame with the viewer's XZ position. All chunk mutation
/// happens inside that call on the caller's thread.
#[derive(Resource)]
pub struct ChunkGrid {
    settings: TerrainSettings,
    height_builder: Arc<HeightMapBuilder>,
    chunks: HashMap<IVec2, TerrainChunk>,
    visible: Vec<IVec2>,
    height_jobs: HeightMapQueue,
    mesh_jobs: MeshQueue,
    forest: Forest,
    pending_events: Vec<ChunkEvent>,
    events: Vec<ChunkEvent>,
    viewer_position: Vec2,
    viewer_position_old: Option<Vec2>,
    mesh_world_size: f32,
    chunks_visible_in_view_dst: i32,
    tick: u64,
}

impl ChunkGrid {
    pub fn new(mut settings: TerrainSettings) -> Result<Self, SettingsError> {
        settings.validate();
        settings.check()?;
        let mesh_world_size = settings.mesh.mesh_world_size();
        let max_view_distance = settings.streaming.max_view_distance();
        let chunks_visible_in_view_dst = (max_view_distance / mesh_world_size).round() as i32;
        let height_builder = Arc::new(HeightMapBuilder::new(
            settings.height_map.clone(),
            settings.mesh.verts_per_line(),
        ));
        info!(
            "TERRAIN grid_ready world_size={mesh_world_size} view_dst={max_view_distance} radius_chunks={chunks_visible_in_view_dst} lods={}",
            settings.streaming.detail_levels.len()
        );
        Ok(Self {
            settings,
            height_builder,
            chunks: HashMap::new(),
            visible: Vec::new(),
            height_jobs: HeightMapQueue::new(),
            mesh_jobs: MeshQueue::new(),
            forest: Forest::default(),
            pending_events: Vec::new(),
            events: Vec::new(),
            viewer_position: Vec2::ZERO,
            viewer_position_old: None,
            mesh_world_size,
            chunks_visible_in_view_dst,
            tick: 0,
        })
    }

    pub fn settings(&self) -> &TerrainSettings {
        &self.settings
    }

    pub fn chunk(&self, coord: IVec2) -> Option<&TerrainChunk> {
        self.chunks.get(&coord)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &TerrainChunk> {
        self.chunks.values()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn visible_chunks(&self) -> &[IVec2] {
        &self.visible
    }

    pub fn chunks_visible_in_view_dst(&self) -> i32 {
        self.chunks_visible_in_view_dst
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn viewer_position(&self) -> Vec2 {
        self.viewer_position
    }

    pub fn in_flight_jobs(&self) -> usize {
        self.height_jobs.in_flight() + self.mesh_jobs.in_flight()
    }

    pub fn viewer_chunk_coord(&self, position: Vec2) -> IVec2 {
        (position / self.mesh_world_size).round().as_ivec2()
    }

    /// Drain finished jobs against this tick's viewer, then react to the move.
    pub fn tick(&mut self, viewer: Vec2) {
        self.tick += 1;
        self.viewer_position = viewer;
        self.drain_results();
        self.update_viewer(viewer);
    }

    /// Hand finished heightmaps, then finished meshes, to their chunks.
    pub fn drain_results(&mut self) -> usize {
        let mut ctx = ChunkContext {
            viewer: self.viewer_position,
            tick: self.tick,
            settings: &self.settings,
            height_builder: &self.height_builder,
            height_jobs: &mut self.height_jobs,
            mesh_jobs: &mut self.mesh_jobs,
            forest: &mut self.forest,
            events: &mut self.pending_events,
        };
        let chunks = &mut self.chunks;

        let mut height_results = Vec::new();
        ctx.height_jobs.drain(|coord, result| height_results.push((coord, result)));
        let heightmaps = height_results.len();
        for (coord, result) in height_results {
            match chunks.get_mut(&coord) {
                Some(chunk) => chunk.on_height_map_received(result, &mut ctx),
                None => debug!("JOBS dropped heightmap for evicted coord=({},{})", coord.x, coord.y),
            }
        }

        let mut mesh_results = Vec::new();
        ctx.mesh_jobs.drain(|key, result| mesh_results.push((key, result)));
        let meshes = mesh_results.len();
        for (key, result) in mesh_results {
            match chunks.get_mut(&key.coord) {
                Some(chunk) => chunk.on_mesh_received(key.lod_index, result, &mut ctx),
                None => debug!("JOBS dropped mesh for evicted coord=({},{}) lod_index={}", key.coord.x, key.coord.y, key.lod_index),
            }
        }

        if heightmaps + meshes > 0 {
            debug!("JOBS drain heightmaps={heightmaps} meshes={meshes} in_flight={}", self.height_jobs.in_flight() + self.mesh_jobs.in_flight());
        }
        self.flush_events();
        heightmaps + meshes
    }

    /// Collider refresh whenever the viewer moved at all; window rebuild once it moved past the threshold.
    pub fn update_viewer(&mut self, viewer: Vec2) {
        self.viewer_position = viewer;

        if self.viewer_position_old != Some(viewer) {
            self.update_collision_meshes();
        }

        let threshold = self.settings.streaming.move_threshold_for_chunk_update;
        let rebuild = match self.viewer_position_old {
            None => true,
            Some(old) => (old - viewer).length_squared() > threshold * threshold,
        };
        if rebuild {
            self.viewer_position_old = Some(viewer);
            self.update_visible_chunks();
        }
    }

    pub fn take_events(&mut self) -> Vec<ChunkEvent> {
        std::mem::take(&mut self.events)
    }

    /// Block until every in-flight job has produced a result. Results still need a `tick`/`drain_results`.
    pub fn wait_for_jobs(&mut self) {
        self.height_jobs.wait_idle();
        self.mesh_jobs.wait_idle();
    }

    fn update_collision_meshes(&mut self) {
        let mut ctx = ChunkContext {
            viewer: self.viewer_position,
            tick: self.tick,
            settings: &self.settings,
            height_builder: &self.height_builder,
            height_jobs: &mut self.height_jobs,
            mesh_jobs: &mut self.mesh_jobs,
            forest: &mut self.forest,
            events: &mut self.pending_events,
        };
        for coord in &self.visible {
            if let Some(chunk) = self.chunks.get_mut(coord) {
                chunk.update_collision_mesh(&mut ctx);
            }
        }
        self.flush_events();
    }

    fn update_visible_chunks(&mut self) {
        let viewer_coord = self.viewer_chunk_coord(self.viewer_position);
        let radius = self.chunks_visible_in_view_dst;
        let mut ctx = ChunkContext {
            viewer: self.viewer_position,
            tick: self.tick,
            settings: &self.settings,
            height_builder: &self.height_builder,
            height_jobs: &mut self.height_jobs,
            mesh_jobs: &mut self.mesh_jobs,
            forest: &mut self.forest,
            events: &mut self.pending_events,
        };

        let mut already_updated: HashSet<IVec2> = HashSet::with_capacity(self.visible.len());
        for coord in self.visible.iter().rev() {
            already_updated.insert(*coord);
            if let Some(chunk) = self.chunks.get_mut(coord) {
                chunk.update(&mut ctx);
            }
        }

        let mut created = 0usize;
        for y_offset in -radius..=radius {
            for x_offset in -radius..=radius {
                let coord = viewer_coord + IVec2::new(x_offset, y_offset);
                if already_updated.contains(&coord) {
                    continue;
                }
                if let Some(chunk) = self.chunks.get_mut(&coord) {
                    chunk.update(&mut ctx);
                } else {
                    let mut chunk = TerrainChunk::new(coord, ctx.settings, ctx.tick);
                    debug!("TERRAIN chunk_created coord=({},{})", coord.x, coord.y);
                    ctx.events.push(ChunkEvent::Created { coord, world_position: chunk.world_position() });
                    chunk.load(&mut ctx);
                    self.chunks.insert(coord, chunk);
                    created += 1;
                }
            }
        }

        debug!(
            "TERRAIN window_rebuild viewer_chunk=({},{}) created={created} total={} visible={}",
            viewer_coord.x, viewer_coord.y, self.chunks.len(), self.visible.len()
        );
        self.flush_events();
        self.evict_stale_chunks(viewer_coord);
    }

    fn evict_stale_chunks(&mut self, viewer_coord: IVec2) {
        let Some(grace) = self.settings.streaming.evict_after_ticks else { return; };
        let radius = self.chunks_visible_in_view_dst;
        let tick = self.tick;
        let stale: Vec<IVec2> = self
            .chunks
            .values()
            .filter(|c| {
                let d = (c.coord - viewer_coord).abs();
                !c.is_visible()
                    && (d.x > radius || d.y > radius)
                    && tick.saturating_sub(c.last_visible_tick()) > grace
            })
            .map(|c| c.coord)
            .collect();
        for coord in stale {
            if let Some(chunk) = self.chunks.remove(&coord) {
                self.forest.remove_all(chunk.forest_keys());
                info!("TERRAIN chunk_evicted coord=({},{}) idle_ticks={}", coord.x, coord.y, tick.saturating_sub(chunk.last_visible_tick()));
                self.events.push(ChunkEvent::Evicted { coord });
            }
        }
    }

    /// Apply visibility flips to the visible set, then publish.
    fn flush_events(&mut self) {
        for event in self.pending_events.drain(..) {
            if let ChunkEvent::VisibilityChanged { coord, visible } = event {
                if visible {
                    if !self.visible.contains(&coord) {
                        self.visible.push(coord);
                    }
                } else {
                    self.visible.retain(|c| *c != coord);
                }
            }
            self.events.push(event);
        }
    }
}

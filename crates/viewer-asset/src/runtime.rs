use std::{collections::BTreeMap, sync::Arc};

use bytes::Bytes;
use log::debug;

use crate::{
    clip::{ClipRegistry, ExpressionClip, ExpressionHandle, MotionClip, MotionHandle, UserData},
    effect::{AmbientEffects, ModelLayout, ParameterIds},
    index::ClipKey,
    texture::TextureEntry,
};

/// Receives loaded resources from the orchestrator.
///
/// Fan-out stages call in arbitrary completion order. Every call is
/// fire-and-forget.
pub trait EntityRuntime {
    fn install_geometry(&mut self, data: Bytes);
    fn install_expression(&mut self, key: ClipKey, clip: ExpressionHandle);
    fn install_physics(&mut self, data: Bytes);
    fn install_pose(&mut self, data: Bytes);
    fn install_auxiliary_metadata(&mut self, data: UserData);
    fn install_ambient_effects(&mut self, _effects: AmbientEffects) {}
    fn install_parameter_ids(&mut self, _ids: ParameterIds, _layout: ModelLayout) {}
    fn install_motion(&mut self, key: ClipKey, clip: MotionHandle);
    fn bind_texture(&mut self, slot: usize, texture: Arc<TextureEntry>);
}

/// The hydrated model a frame loop reads from once loading is done.
#[derive(Debug, Default)]
pub struct ModelRuntime {
    geometry: Option<Bytes>,
    physics: Option<Bytes>,
    pose: Option<Bytes>,
    user_data: Option<UserData>,
    effects: Option<AmbientEffects>,
    parameter_ids: ParameterIds,
    layout: ModelLayout,
    expressions: ClipRegistry<ExpressionClip>,
    motions: ClipRegistry<MotionClip>,
    textures: BTreeMap<usize, Arc<TextureEntry>>,
}

impl ModelRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn geometry(&self) -> Option<&Bytes> {
        self.geometry.as_ref()
    }

    pub fn physics(&self) -> Option<&Bytes> {
        self.physics.as_ref()
    }

    pub fn pose(&self) -> Option<&Bytes> {
        self.pose.as_ref()
    }

    pub fn user_data(&self) -> Option<&UserData> {
        self.user_data.as_ref()
    }

    pub fn effects(&self) -> Option<&AmbientEffects> {
        self.effects.as_ref()
    }

    pub fn parameter_ids(&self) -> &ParameterIds {
        &self.parameter_ids
    }

    pub fn layout(&self) -> &ModelLayout {
        &self.layout
    }

    pub fn expression(&self, name: &str) -> Option<&ExpressionHandle> {
        self.expressions.get(&ClipKey::named(name))
    }

    pub fn expression_count(&self) -> usize {
        self.expressions.len()
    }

    pub fn motion(&self, group: &str, index: usize) -> Option<&MotionHandle> {
        self.motions.get(&ClipKey::grouped(group, index))
    }

    /// Number of motions of `group` that actually loaded.
    pub fn motion_count(&self, group: &str) -> usize {
        self.motions
            .keys()
            .filter(|key| matches!(key, ClipKey::Grouped { group: name, .. } if name == group))
            .count()
    }

    pub fn total_motion_count(&self) -> usize {
        self.motions.len()
    }

    pub fn texture(&self, slot: usize) -> Option<&Arc<TextureEntry>> {
        self.textures.get(&slot)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Drops every installed motion. Returns how many were dropped.
    pub fn release_motions(&mut self) -> usize {
        let count = self.motions.len();
        self.motions.clear();
        debug!("Released {} motions", count);
        count
    }

    pub fn release_expressions(&mut self) -> usize {
        let count = self.expressions.len();
        self.expressions.clear();
        debug!("Released {} expressions", count);
        count
    }

    /// Drops everything the model holds. Shared cache entries stay cached.
    pub fn release(&mut self) {
        *self = Self::default();
    }
}

impl EntityRuntime for ModelRuntime {
    fn install_geometry(&mut self, data: Bytes) {
        self.geometry = Some(data);
    }

    fn install_expression(&mut self, key: ClipKey, clip: ExpressionHandle) {
        if let Some(stale) = self.expressions.insert(key, clip) {
            debug!("Released stale expression {}", stale.name);
        }
    }

    fn install_physics(&mut self, data: Bytes) {
        self.physics = Some(data);
    }

    fn install_pose(&mut self, data: Bytes) {
        self.pose = Some(data);
    }

    fn install_auxiliary_metadata(&mut self, data: UserData) {
        self.user_data = Some(data);
    }

    fn install_ambient_effects(&mut self, effects: AmbientEffects) {
        self.effects = Some(effects);
    }

    fn install_parameter_ids(&mut self, ids: ParameterIds, layout: ModelLayout) {
        self.parameter_ids = ids;
        self.layout = layout;
    }

    fn install_motion(&mut self, key: ClipKey, clip: MotionHandle) {
        if let Some(stale) = self.motions.insert(key, clip) {
            debug!("Released stale motion {}", stale.key);
        }
    }

    fn bind_texture(&mut self, slot: usize, texture: Arc<TextureEntry>) {
        if let Some(previous) = self.textures.insert(slot, texture) {
            debug!("Texture slot {} rebound, dropped {}", slot, previous.path);
        }
    }
}

//! Expression, motion and user data payloads, plus the keyed registry that
//! holds loaded clips for an entity.

use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
};

use serde::Deserialize;

use crate::{effect::ParameterIds, index::ClipKey};

const DEFAULT_FADE_SECONDS: f32 = 1.0;

pub type ExpressionHandle = Arc<ExpressionClip>;
pub type MotionHandle = Arc<MotionClip>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ExpressionBlend {
    #[default]
    Add,
    Multiply,
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpressionParameter {
    pub id: String,
    pub value: f32,
    #[serde(default)]
    pub blend: ExpressionBlend,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExpressionJson {
    fade_in_time: Option<f32>,
    fade_out_time: Option<f32>,
    #[serde(default)]
    parameters: Vec<ExpressionParameter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionClip {
    pub name: String,
    pub fade_in: f32,
    pub fade_out: f32,
    pub parameters: Vec<ExpressionParameter>,
}

impl ExpressionClip {
    pub fn parse(name: &str, buffer: &[u8]) -> Result<Self, serde_json::Error> {
        let json: ExpressionJson = serde_json::from_slice(buffer)?;
        Ok(Self {
            name: name.to_owned(),
            fade_in: json.fade_in_time.unwrap_or(DEFAULT_FADE_SECONDS),
            fade_out: json.fade_out_time.unwrap_or(DEFAULT_FADE_SECONDS),
            parameters: json.parameters,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MotionMetaJson {
    duration: f32,
    #[serde(default)]
    fps: f32,
    #[serde(default)]
    r#loop: bool,
    fade_in_time: Option<f32>,
    fade_out_time: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MotionJson {
    meta: MotionMetaJson,
    #[serde(default)]
    curves: Vec<MotionCurve>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MotionCurve {
    pub target: String,
    pub id: String,
    #[serde(default)]
    pub segments: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionClip {
    pub key: ClipKey,
    pub duration: f32,
    pub fps: f32,
    pub looped: bool,
    pub fade_in: f32,
    pub fade_out: f32,
    pub curves: Vec<MotionCurve>,
    pub eye_blink_ids: Vec<String>,
    pub lip_sync_ids: Vec<String>,
}

impl MotionClip {
    pub fn parse(key: ClipKey, buffer: &[u8]) -> Result<Self, serde_json::Error> {
        let json: MotionJson = serde_json::from_slice(buffer)?;
        let meta = json.meta;
        Ok(Self {
            key,
            duration: meta.duration,
            fps: meta.fps,
            looped: meta.r#loop,
            fade_in: meta.fade_in_time.unwrap_or(DEFAULT_FADE_SECONDS),
            fade_out: meta.fade_out_time.unwrap_or(DEFAULT_FADE_SECONDS),
            curves: json.curves,
            eye_blink_ids: Vec::new(),
            lip_sync_ids: Vec::new(),
        })
    }

    /// Applies descriptor-level fade times; `None` keeps the clip's own.
    pub fn override_fades(&mut self, fade_in: Option<f32>, fade_out: Option<f32>) {
        if let Some(fade_in) = fade_in {
            self.fade_in = fade_in;
        }
        if let Some(fade_out) = fade_out {
            self.fade_out = fade_out;
        }
    }

    pub fn set_effect_ids(&mut self, ids: &ParameterIds) {
        self.eye_blink_ids = ids.eye_blink.clone();
        self.lip_sync_ids = ids.lip_sync.clone();
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserDataEntry {
    pub target: String,
    pub id: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserData {
    #[serde(default)]
    pub user_data: Vec<UserDataEntry>,
}

impl UserData {
    pub fn parse(buffer: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(buffer)
    }

    pub fn entries(&self) -> &[UserDataEntry] {
        &self.user_data
    }
}

/// Loaded clips of one kind, keyed by [`ClipKey`].
#[derive(Debug)]
pub struct ClipRegistry<T> {
    clips: HashMap<ClipKey, Arc<T>>,
}

impl<T> Default for ClipRegistry<T> {
    fn default() -> Self {
        Self {
            clips: HashMap::new(),
        }
    }
}

impl<T> ClipRegistry<T> {
    /// Registers `clip` under `key` and hands back the stale clip it replaced.
    #[must_use]
    pub fn insert(&mut self, key: ClipKey, clip: Arc<T>) -> Option<Arc<T>> {
        match self.clips.entry(key) {
            Entry::Occupied(mut entry) => Some(entry.insert(clip)),
            Entry::Vacant(entry) => {
                entry.insert(clip);
                None
            }
        }
    }

    pub fn get(&self, key: &ClipKey) -> Option<&Arc<T>> {
        self.clips.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ClipKey> {
        self.clips.keys()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn clear(&mut self) {
        self.clips.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn parse_expression() {
        let clip = ExpressionClip::parse("F01", &fixtures::expression(1.0)).unwrap();

        assert_eq!(clip.name, "F01");
        assert_eq!(clip.fade_in, 0.3);
        assert_eq!(clip.fade_out, DEFAULT_FADE_SECONDS);
        assert_eq!(clip.parameters.len(), 2);
        assert_eq!(clip.parameters[1].blend, ExpressionBlend::Multiply);
    }

    #[test]
    fn parse_motion_with_fade_overrides() {
        let mut clip = MotionClip::parse(ClipKey::grouped("Idle", 0), &fixtures::motion(4.5)).unwrap();

        assert_eq!(clip.duration, 4.5);
        assert!(clip.looped);
        assert_eq!(clip.fade_in, 0.75);
        assert_eq!(clip.curves[1].target, "PartOpacity");

        clip.override_fades(None, Some(0.2));
        assert_eq!(clip.fade_in, 0.75);
        assert_eq!(clip.fade_out, 0.2);

        clip.set_effect_ids(&ParameterIds {
            eye_blink: vec!["ParamEyeLOpen".into()],
            lip_sync: vec![],
        });
        assert_eq!(clip.eye_blink_ids, ["ParamEyeLOpen"]);
    }

    #[test]
    fn motion_without_meta_is_rejected() {
        assert!(MotionClip::parse(ClipKey::grouped("Idle", 0), b"{\"Curves\": []}").is_err());
    }

    #[test]
    fn parse_user_data() {
        let data = UserData::parse(&fixtures::user_data()).unwrap();
        assert_eq!(data.entries()[0].value, "ribbon");
    }

    #[test]
    fn registry_replaces_stale_clip() {
        let mut registry = ClipRegistry::default();
        let first = Arc::new(1);
        let stale = Arc::downgrade(&first);

        assert!(registry.insert(ClipKey::grouped("Idle", 0), first).is_none());
        let replaced = registry.insert(ClipKey::grouped("Idle", 0), Arc::new(2));
        assert_eq!(replaced.as_deref(), Some(&1));
        drop(replaced);

        assert!(stale.upgrade().is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&ClipKey::grouped("Idle", 0)).map(|clip| **clip), Some(2));
    }
}

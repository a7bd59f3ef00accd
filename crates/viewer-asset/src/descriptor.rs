//! Model descriptor (`*.model3.json`) parsing and read-only accessors.
//!
//! Every count accessor reports exactly the number of entries reachable through
//! the matching index accessor; the orchestrator uses these counts as barrier
//! bounds.

use std::collections::BTreeMap;

use serde::Deserialize;

const GROUP_EYE_BLINK: &str = "EyeBlink";
const GROUP_LIP_SYNC: &str = "LipSync";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ModelJson {
    #[serde(default)]
    file_references: FileReferencesJson,
    #[serde(default)]
    groups: Vec<GroupJson>,
    #[serde(default)]
    hit_areas: Vec<HitAreaJson>,
    #[serde(default)]
    layout: BTreeMap<String, f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FileReferencesJson {
    #[serde(default)]
    moc: String,
    #[serde(default)]
    textures: Vec<String>,
    #[serde(default)]
    physics: String,
    #[serde(default)]
    pose: String,
    #[serde(default)]
    user_data: String,
    #[serde(default)]
    expressions: Vec<ExpressionJson>,
    #[serde(default)]
    motions: BTreeMap<String, Vec<MotionJson>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExpressionJson {
    name: String,
    file: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MotionJson {
    file: String,
    fade_in_time: Option<f32>,
    fade_out_time: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GroupJson {
    #[serde(default)]
    target: String,
    name: String,
    #[serde(default)]
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HitAreaJson {
    id: String,
    name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionEntry {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionEntry {
    pub path: String,
    pub fade_in: Option<f32>,
    pub fade_out: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionGroup {
    pub name: String,
    pub motions: Vec<MotionEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HitArea {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelDescriptor {
    geometry: Option<String>,
    expressions: Vec<ExpressionEntry>,
    physics: Option<String>,
    pose: Option<String>,
    user_data: Option<String>,
    motion_groups: Vec<MotionGroup>,
    textures: Vec<Option<String>>,
    layout: BTreeMap<String, f32>,
    eye_blink_ids: Vec<String>,
    lip_sync_ids: Vec<String>,
    hit_areas: Vec<HitArea>,
}

fn declared(path: String) -> Option<String> {
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

// Negative fade values mean "not overridden".
fn fade(value: Option<f32>) -> Option<f32> {
    value.filter(|value| *value >= 0.0)
}

impl ModelDescriptor {
    pub fn from_json(buffer: &[u8]) -> Result<Self, serde_json::Error> {
        let model: ModelJson = serde_json::from_slice(buffer)?;
        let references = model.file_references;

        let mut eye_blink_ids = Vec::new();
        let mut lip_sync_ids = Vec::new();
        for group in model.groups {
            if !group.target.is_empty() && group.target != "Parameter" {
                continue;
            }
            match group.name.as_str() {
                GROUP_EYE_BLINK => eye_blink_ids.extend(group.ids),
                GROUP_LIP_SYNC => lip_sync_ids.extend(group.ids),
                _ => {}
            }
        }

        Ok(Self {
            geometry: declared(references.moc),
            expressions: references
                .expressions
                .into_iter()
                .map(|expression| ExpressionEntry {
                    name: expression.name,
                    path: expression.file,
                })
                .collect(),
            physics: declared(references.physics),
            pose: declared(references.pose),
            user_data: declared(references.user_data),
            motion_groups: references
                .motions
                .into_iter()
                .map(|(name, motions)| MotionGroup {
                    name,
                    motions: motions
                        .into_iter()
                        .map(|motion| MotionEntry {
                            path: motion.file,
                            fade_in: fade(motion.fade_in_time),
                            fade_out: fade(motion.fade_out_time),
                        })
                        .collect(),
                })
                .collect(),
            textures: references.textures.into_iter().map(declared).collect(),
            layout: model.layout,
            eye_blink_ids,
            lip_sync_ids,
            hit_areas: model
                .hit_areas
                .into_iter()
                .map(|area| HitArea {
                    id: area.id,
                    name: area.name,
                })
                .collect(),
        })
    }

    pub fn geometry_path(&self) -> Option<&str> {
        self.geometry.as_deref()
    }

    pub fn expression_count(&self) -> usize {
        self.expressions.len()
    }

    pub fn expression(&self, index: usize) -> Option<&ExpressionEntry> {
        self.expressions.get(index)
    }

    pub fn expression_name(&self, index: usize) -> Option<&str> {
        self.expression(index).map(|entry| entry.name.as_str())
    }

    pub fn expression_path(&self, index: usize) -> Option<&str> {
        self.expression(index).map(|entry| entry.path.as_str())
    }

    pub fn expressions(&self) -> &[ExpressionEntry] {
        &self.expressions
    }

    pub fn physics_path(&self) -> Option<&str> {
        self.physics.as_deref()
    }

    pub fn pose_path(&self) -> Option<&str> {
        self.pose.as_deref()
    }

    pub fn user_data_path(&self) -> Option<&str> {
        self.user_data.as_deref()
    }

    pub fn motion_group_count(&self) -> usize {
        self.motion_groups.len()
    }

    pub fn motion_group_name(&self, index: usize) -> Option<&str> {
        self.motion_groups.get(index).map(|group| group.name.as_str())
    }

    pub fn motion_groups(&self) -> &[MotionGroup] {
        &self.motion_groups
    }

    fn motion_group(&self, group: &str) -> Option<&MotionGroup> {
        self.motion_groups.iter().find(|item| item.name == group)
    }

    pub fn motion_count(&self, group: &str) -> usize {
        self.motion_group(group)
            .map_or(0, |group| group.motions.len())
    }

    pub fn total_motion_count(&self) -> usize {
        self.motion_groups
            .iter()
            .map(|group| group.motions.len())
            .sum()
    }

    pub fn motion(&self, group: &str, index: usize) -> Option<&MotionEntry> {
        self.motion_group(group)
            .and_then(|group| group.motions.get(index))
    }

    pub fn motion_path(&self, group: &str, index: usize) -> Option<&str> {
        self.motion(group, index).map(|entry| entry.path.as_str())
    }

    pub fn motion_fade_in(&self, group: &str, index: usize) -> Option<f32> {
        self.motion(group, index).and_then(|entry| entry.fade_in)
    }

    pub fn motion_fade_out(&self, group: &str, index: usize) -> Option<f32> {
        self.motion(group, index).and_then(|entry| entry.fade_out)
    }

    /// Number of texture slots, including slots declared with an empty path.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn texture_path(&self, index: usize) -> Option<&str> {
        self.textures.get(index).and_then(Option::as_deref)
    }

    pub fn layout(&self) -> &BTreeMap<String, f32> {
        &self.layout
    }

    pub fn eye_blink_ids(&self) -> &[String] {
        &self.eye_blink_ids
    }

    pub fn lip_sync_ids(&self) -> &[String] {
        &self.lip_sync_ids
    }

    pub fn hit_area_count(&self) -> usize {
        self.hit_areas.len()
    }

    pub fn hit_area(&self, index: usize) -> Option<&HitArea> {
        self.hit_areas.get(index)
    }

    pub fn hit_area_by_name(&self, name: &str) -> Option<&HitArea> {
        self.hit_areas.iter().find(|area| area.name == name)
    }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::index::VariantFlags;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub resources_path: String,
    pub model_dirs: Vec<String>,
    pub premultiplied_alpha: bool,
    pub debug_log: bool,
    pub frame_interval: Duration,
    /// Host-side limit only. Loaders never time out by themselves.
    pub load_timeout: Duration,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            resources_path: "../../Resources/".to_owned(),
            model_dirs: ["Haru", "Hiyori", "Mark", "Natori", "Rice"]
                .into_iter()
                .map(String::from)
                .collect(),
            premultiplied_alpha: true,
            debug_log: true,
            frame_interval: Duration::from_millis(16),
            load_timeout: Duration::from_secs(30),
        }
    }
}

impl ViewerConfig {
    pub fn scene_count(&self) -> usize {
        self.model_dirs.len()
    }

    pub fn model_home(&self, scene: usize) -> Option<String> {
        let dir = self.model_dirs.get(scene)?;
        Some(format!("{}{}/", self.resources_path, dir))
    }

    pub fn model_file_name(&self, scene: usize) -> Option<String> {
        let dir = self.model_dirs.get(scene)?;
        Some(format!("{}.model3.json", dir))
    }

    pub fn texture_variant(&self) -> VariantFlags {
        if self.premultiplied_alpha {
            VariantFlags::PREMULTIPLIED_ALPHA
        } else {
            VariantFlags::NONE
        }
    }
}

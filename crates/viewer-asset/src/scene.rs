use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use log::info;
use tokio::runtime::Handle;

use crate::{
    config::ViewerConfig,
    fetch::ByteFetcher,
    loader::{LoaderError, ModelLoader},
    runtime::ModelRuntime,
    texture::TextureCache,
};

#[derive(Debug, Clone)]
pub enum SceneError {
    NoScenes,
    OutOfRange { index: usize, count: usize },
    Load(LoaderError),
}

impl Display for SceneError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::NoScenes => write!(f, "No model directories configured"),
            SceneError::OutOfRange { index, count } => {
                write!(f, "Scene {} out of range, {} scenes configured", index, count)
            }
            SceneError::Load(error) => Display::fmt(error, f),
        }
    }
}

impl Error for SceneError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SceneError::Load(error) => Some(error),
            _ => None,
        }
    }
}

impl From<LoaderError> for SceneError {
    fn from(value: LoaderError) -> Self {
        Self::Load(value)
    }
}

/// Owns the current model and switches between configured models.
///
/// The texture cache is shared across scene changes, so textures of a model
/// shown before are not fetched again.
#[derive(Debug)]
pub struct ModelScene<F: ByteFetcher> {
    config: ViewerConfig,
    handle: Handle,
    fetcher: Arc<F>,
    textures: Arc<TextureCache>,
    scene_index: usize,
    loader: Option<ModelLoader<F, ModelRuntime>>,
}

impl<F: ByteFetcher> ModelScene<F> {
    pub fn new(
        config: ViewerConfig,
        handle: Handle,
        fetcher: Arc<F>,
        textures: Arc<TextureCache>,
    ) -> Self {
        Self {
            config,
            handle,
            fetcher,
            textures,
            scene_index: 0,
            loader: None,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn scene_index(&self) -> usize {
        self.scene_index
    }

    pub fn scene_count(&self) -> usize {
        self.config.scene_count()
    }

    /// Drops the current model and starts loading scene `index`.
    pub fn change_scene(&mut self, index: usize) -> Result<(), SceneError> {
        let count = self.scene_count();
        let (Some(home), Some(file_name)) = (
            self.config.model_home(index),
            self.config.model_file_name(index),
        ) else {
            return Err(SceneError::OutOfRange { index, count });
        };

        self.release_all();
        info!("Changing to scene {} ({})", index, file_name);
        let mut loader = ModelLoader::new(
            self.handle.clone(),
            self.fetcher.clone(),
            self.textures.clone(),
            ModelRuntime::new(),
        )
        .with_texture_variant(self.config.texture_variant());
        self.scene_index = index;
        loader.begin(&home, &file_name)?;
        self.loader = Some(loader);
        Ok(())
    }

    /// Moves to the next scene, wrapping around after the last one.
    pub fn next_scene(&mut self) -> Result<(), SceneError> {
        let count = self.scene_count();
        if count == 0 {
            return Err(SceneError::NoScenes);
        }
        let next = if self.loader.is_some() {
            (self.scene_index + 1) % count
        } else {
            0
        };
        self.change_scene(next)
    }

    pub fn tick(&mut self) -> bool {
        self.loader.as_mut().is_some_and(ModelLoader::tick)
    }

    pub fn is_ready(&self) -> bool {
        self.loader.as_ref().is_some_and(ModelLoader::is_ready)
    }

    /// The current model, once it is ready to render.
    pub fn model(&self) -> Option<&ModelRuntime> {
        self.loader
            .as_ref()
            .filter(|loader| loader.is_ready())
            .map(ModelLoader::runtime)
    }

    pub fn loader(&self) -> Option<&ModelLoader<F, ModelRuntime>> {
        self.loader.as_ref()
    }

    pub fn loader_mut(&mut self) -> Option<&mut ModelLoader<F, ModelRuntime>> {
        self.loader.as_mut()
    }

    pub fn textures(&self) -> &Arc<TextureCache> {
        &self.textures
    }

    /// Drops the current model. Cached textures stay in the shared cache.
    pub fn release_all(&mut self) {
        if let Some(loader) = self.loader.take() {
            loader.into_runtime().release();
        }
    }
}

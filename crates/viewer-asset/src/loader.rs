//! Drives a [`LoadOrchestrator`] with real fetches on a tokio runtime.

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use log::{debug, error, info};
use tokio::{runtime::Handle, sync::mpsc};

use crate::{
    clip::{ExpressionHandle, MotionHandle},
    descriptor::ModelDescriptor,
    error::LoadError,
    fetch::{resolve_path, ByteFetcher},
    index::{ClipKey, VariantFlags},
    orchestrator::{
        build_expression, FetchRequest, LoadOrchestrator, LoadStage, Payload, ProtocolError,
        ResourceSlot, Ticket,
    },
    runtime::{EntityRuntime, ModelRuntime},
    texture::{acquire_texture, TextureCache},
};

#[derive(Debug, Clone)]
pub enum LoaderError {
    Descriptor(Arc<LoadError>),
    Protocol(ProtocolError),
    /// Nothing is in flight but the pipeline is not ready.
    Stalled(LoadStage),
}

impl Display for LoaderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LoaderError::Descriptor(error) => write!(f, "Failed to load model descriptor: {}", error),
            LoaderError::Protocol(error) => Display::fmt(error, f),
            LoaderError::Stalled(stage) => write!(f, "Load stalled at stage {}", stage),
        }
    }
}

impl Error for LoaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoaderError::Descriptor(error) => Some(error.as_ref()),
            LoaderError::Protocol(error) => Some(error),
            LoaderError::Stalled(_) => None,
        }
    }
}

impl From<ProtocolError> for LoaderError {
    fn from(value: ProtocolError) -> Self {
        Self::Protocol(value)
    }
}

/// Failure to hand out a single clip after the model finished loading.
#[derive(Debug)]
pub enum ClipError {
    NotReady,
    UnknownMotion { group: String, index: usize },
    UnknownExpression(String),
    Load(LoadError),
}

impl Display for ClipError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ClipError::NotReady => write!(f, "Model is not loaded yet"),
            ClipError::UnknownMotion { group, index } => {
                write!(f, "No motion {} in group {}", index, group)
            }
            ClipError::UnknownExpression(name) => write!(f, "No expression named {}", name),
            ClipError::Load(error) => Display::fmt(error, f),
        }
    }
}

impl Error for ClipError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClipError::Load(error) => Some(error),
            _ => None,
        }
    }
}

impl From<LoadError> for ClipError {
    fn from(value: LoadError) -> Self {
        Self::Load(value)
    }
}

#[derive(Debug)]
enum Completion {
    Descriptor {
        home: String,
        result: Result<ModelDescriptor, LoadError>,
    },
    Resource(Ticket, Result<Payload, LoadError>),
}

/// Loads one model into `R`.
///
/// Fetches run as tasks on the given runtime handle and report back through
/// a channel. Nothing is applied to the runtime until [`ModelLoader::tick`]
/// or [`ModelLoader::finish`] drains that channel, so all hand-offs happen on
/// the caller's thread.
#[derive(Debug)]
pub struct ModelLoader<F: ByteFetcher, R: EntityRuntime> {
    handle: Handle,
    fetcher: Arc<F>,
    textures: Arc<TextureCache>,
    runtime: R,
    orchestrator: LoadOrchestrator,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    started: bool,
    in_flight: usize,
    failure: Option<LoaderError>,
}

impl<F: ByteFetcher, R: EntityRuntime> ModelLoader<F, R> {
    pub fn new(handle: Handle, fetcher: Arc<F>, textures: Arc<TextureCache>, runtime: R) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            handle,
            fetcher,
            textures,
            runtime,
            orchestrator: LoadOrchestrator::new(),
            completion_tx,
            completion_rx,
            started: false,
            in_flight: 0,
            failure: None,
        }
    }

    pub fn with_texture_variant(mut self, variant: VariantFlags) -> Self {
        self.orchestrator = self.orchestrator.with_texture_variant(variant);
        self
    }

    /// Fetches `home/file_name` as the model descriptor, then starts the
    /// pipeline from it.
    pub fn begin(&mut self, home: &str, file_name: &str) -> Result<(), LoaderError> {
        self.start()?;

        let path = resolve_path(home, file_name);
        info!("Loading model descriptor {}", path);
        let fetcher = self.fetcher.clone();
        let completion_tx = self.completion_tx.clone();
        let home = home.to_owned();
        self.in_flight += 1;
        self.handle.spawn(async move {
            let result = match fetcher.fetch(&path).await {
                Ok(data) => {
                    ModelDescriptor::from_json(&data).map_err(|error| LoadError::parse(&path, error))
                }
                Err(error) => Err(error.into()),
            };
            let _ = completion_tx.send(Completion::Descriptor { home, result });
        });
        Ok(())
    }

    /// Starts the pipeline from an already parsed descriptor.
    pub fn begin_with_descriptor(
        &mut self,
        descriptor: Arc<ModelDescriptor>,
        home: &str,
    ) -> Result<(), LoaderError> {
        self.start()?;
        self.run(descriptor, home)
    }

    fn start(&mut self) -> Result<(), LoaderError> {
        if self.started {
            error!("Model loader started twice");
            return Err(ProtocolError::AlreadyStarted.into());
        }
        self.started = true;
        Ok(())
    }

    fn run(&mut self, descriptor: Arc<ModelDescriptor>, home: &str) -> Result<(), LoaderError> {
        let requests = self
            .orchestrator
            .begin(descriptor, home, &mut self.runtime)?;
        self.dispatch(requests);
        Ok(())
    }

    fn dispatch(&mut self, requests: Vec<FetchRequest>) {
        for request in requests {
            let FetchRequest { ticket, slot, path } = request;
            let fetcher = self.fetcher.clone();
            let textures = self.textures.clone();
            let variant = self.orchestrator.texture_variant();
            let completion_tx = self.completion_tx.clone();

            self.in_flight += 1;
            self.handle.spawn(async move {
                let result = if let ResourceSlot::Texture { .. } = slot {
                    acquire_texture(&textures, fetcher.as_ref(), &path, variant)
                        .await
                        .map(Payload::Texture)
                } else {
                    fetcher
                        .fetch(&path)
                        .await
                        .map(Payload::Bytes)
                        .map_err(LoadError::from)
                };
                let _ = completion_tx.send(Completion::Resource(ticket, result));
            });
        }
    }

    fn apply(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let result = match completion {
            Completion::Descriptor {
                home,
                result: Ok(descriptor),
            } => self.run(Arc::new(descriptor), &home),
            Completion::Descriptor {
                result: Err(error), ..
            } => {
                error!("Failed to load model descriptor: {}", error);
                Err(LoaderError::Descriptor(Arc::new(error)))
            }
            Completion::Resource(ticket, result) => self
                .orchestrator
                .complete(ticket, result, &mut self.runtime)
                .map(|requests| self.dispatch(requests))
                .map_err(LoaderError::from),
        };

        if let Err(error) = result {
            self.failure.get_or_insert(error);
        }
    }

    /// Applies every completion that has arrived so far without blocking.
    /// Returns whether the model is ready.
    pub fn tick(&mut self) -> bool {
        while let Ok(completion) = self.completion_rx.try_recv() {
            self.apply(completion);
        }
        self.is_ready()
    }

    /// Waits until the model is ready.
    pub async fn finish(&mut self) -> Result<(), LoaderError> {
        loop {
            if let Some(failure) = &self.failure {
                return Err(failure.clone());
            }
            if self.is_ready() {
                return Ok(());
            }
            if self.in_flight == 0 {
                return Err(LoaderError::Stalled(self.orchestrator.stage()));
            }

            debug!("Waiting for {} fetches", self.in_flight);
            match self.completion_rx.recv().await {
                Some(completion) => self.apply(completion),
                None => return Err(LoaderError::Stalled(self.orchestrator.stage())),
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.orchestrator.is_ready()
    }

    pub fn stage(&self) -> LoadStage {
        self.orchestrator.stage()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn failure(&self) -> Option<&LoaderError> {
        self.failure.as_ref()
    }

    pub fn orchestrator(&self) -> &LoadOrchestrator {
        &self.orchestrator
    }

    pub fn textures(&self) -> &Arc<TextureCache> {
        &self.textures
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn into_runtime(self) -> R {
        self.runtime
    }
}

impl<F: ByteFetcher> ModelLoader<F, ModelRuntime> {
    /// Returns the motion `index` of `group`, fetching it again if it was
    /// released since the model loaded.
    pub async fn acquire_motion(
        &mut self,
        group: &str,
        index: usize,
    ) -> Result<MotionHandle, ClipError> {
        if !self.is_ready() {
            return Err(ClipError::NotReady);
        }
        if let Some(clip) = self.runtime.motion(group, index) {
            return Ok(clip.clone());
        }

        let path = match self.orchestrator.descriptor().motion_path(group, index) {
            Some(path) if !path.is_empty() => resolve_path(self.orchestrator.home(), path),
            _ => {
                return Err(ClipError::UnknownMotion {
                    group: group.to_owned(),
                    index,
                })
            }
        };
        debug!("Fetching released motion {}", path);
        let data = self.fetcher.fetch(&path).await.map_err(LoadError::from)?;
        let clip = Arc::new(self.orchestrator.build_motion(group, index, &path, &data)?);
        self.runtime
            .install_motion(ClipKey::grouped(group, index), clip.clone());
        Ok(clip)
    }

    /// Returns the expression `name`, fetching it again if it was released
    /// since the model loaded.
    pub async fn acquire_expression(&mut self, name: &str) -> Result<ExpressionHandle, ClipError> {
        if !self.is_ready() {
            return Err(ClipError::NotReady);
        }
        if let Some(clip) = self.runtime.expression(name) {
            return Ok(clip.clone());
        }

        let path = match self
            .orchestrator
            .descriptor()
            .expressions()
            .iter()
            .find(|entry| entry.name == name)
        {
            Some(entry) if !entry.path.is_empty() => {
                resolve_path(self.orchestrator.home(), &entry.path)
            }
            _ => return Err(ClipError::UnknownExpression(name.to_owned())),
        };
        debug!("Fetching released expression {}", path);
        let data = self.fetcher.fetch(&path).await.map_err(LoadError::from)?;
        let clip = Arc::new(build_expression(name, &path, &data)?);
        self.runtime
            .install_expression(ClipKey::named(name), clip.clone());
        Ok(clip)
    }
}

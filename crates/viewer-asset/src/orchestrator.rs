//! The load pipeline as an explicit state machine.
//!
//! [`LoadOrchestrator`] does no I/O. It hands out [`FetchRequest`]s, takes
//! their results back through [`LoadOrchestrator::complete`] in any order and
//! moves along the fixed [`LoadStage`] order, installing every loaded payload
//! into an [`EntityRuntime`].

use std::{
    collections::HashMap,
    error::Error,
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use bytes::Bytes;
use log::{debug, error, info, warn};

use crate::{
    clip::{ExpressionClip, MotionClip, UserData},
    descriptor::ModelDescriptor,
    effect::{AmbientEffects, ModelLayout, ParameterIds},
    error::{LoadError, ParseError},
    fetch::resolve_path,
    gate::{CompletionGate, GateState},
    index::{ClipKey, ResourceKind, VariantFlags},
    runtime::EntityRuntime,
    texture::TextureEntry,
};

pub const MOC3_MAGIC: &[u8] = b"MOC3";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadStage {
    Uninitialized,
    LoadGeometry,
    LoadExpressions,
    LoadPhysics,
    LoadPose,
    SetupAmbientEffects,
    LoadAuxiliaryMetadata,
    DeriveParameterIds,
    LoadMotions,
    LoadTextures,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Start,
    /// Zero or one fetch.
    Single,
    FanOut,
    /// Pure computation, advances immediately.
    Derived,
    Terminal,
}

impl LoadStage {
    pub const ORDER: [LoadStage; 11] = [
        LoadStage::Uninitialized,
        LoadStage::LoadGeometry,
        LoadStage::LoadExpressions,
        LoadStage::LoadPhysics,
        LoadStage::LoadPose,
        LoadStage::SetupAmbientEffects,
        LoadStage::LoadAuxiliaryMetadata,
        LoadStage::DeriveParameterIds,
        LoadStage::LoadMotions,
        LoadStage::LoadTextures,
        LoadStage::Ready,
    ];

    pub fn next(self) -> Option<LoadStage> {
        match self {
            LoadStage::Uninitialized => Some(LoadStage::LoadGeometry),
            LoadStage::LoadGeometry => Some(LoadStage::LoadExpressions),
            LoadStage::LoadExpressions => Some(LoadStage::LoadPhysics),
            LoadStage::LoadPhysics => Some(LoadStage::LoadPose),
            LoadStage::LoadPose => Some(LoadStage::SetupAmbientEffects),
            LoadStage::SetupAmbientEffects => Some(LoadStage::LoadAuxiliaryMetadata),
            LoadStage::LoadAuxiliaryMetadata => Some(LoadStage::DeriveParameterIds),
            LoadStage::DeriveParameterIds => Some(LoadStage::LoadMotions),
            LoadStage::LoadMotions => Some(LoadStage::LoadTextures),
            LoadStage::LoadTextures => Some(LoadStage::Ready),
            LoadStage::Ready => None,
        }
    }

    pub fn kind(self) -> StageKind {
        match self {
            LoadStage::Uninitialized => StageKind::Start,
            LoadStage::LoadGeometry
            | LoadStage::LoadPhysics
            | LoadStage::LoadPose
            | LoadStage::LoadAuxiliaryMetadata => StageKind::Single,
            LoadStage::LoadExpressions | LoadStage::LoadMotions | LoadStage::LoadTextures => {
                StageKind::FanOut
            }
            LoadStage::SetupAmbientEffects | LoadStage::DeriveParameterIds => StageKind::Derived,
            LoadStage::Ready => StageKind::Terminal,
        }
    }
}

impl Display for LoadStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(
            match self {
                LoadStage::Uninitialized => "Uninitialized",
                LoadStage::LoadGeometry => "LoadGeometry",
                LoadStage::LoadExpressions => "LoadExpressions",
                LoadStage::LoadPhysics => "LoadPhysics",
                LoadStage::LoadPose => "LoadPose",
                LoadStage::SetupAmbientEffects => "SetupAmbientEffects",
                LoadStage::LoadAuxiliaryMetadata => "LoadAuxiliaryMetadata",
                LoadStage::DeriveParameterIds => "DeriveParameterIds",
                LoadStage::LoadMotions => "LoadMotions",
                LoadStage::LoadTextures => "LoadTextures",
                LoadStage::Ready => "Ready",
            },
            f,
        )
    }
}

/// Identifies one issued fetch and the stage that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    stage: LoadStage,
    serial: u64,
}

impl Ticket {
    pub fn stage(self) -> LoadStage {
        self.stage
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceSlot {
    Geometry,
    Expression { index: usize, name: String },
    Physics,
    Pose,
    AuxiliaryMetadata,
    Motion { group: String, index: usize },
    Texture { index: usize },
}

impl ResourceSlot {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSlot::Geometry => ResourceKind::Geometry,
            ResourceSlot::Expression { .. } => ResourceKind::Expression,
            ResourceSlot::Physics => ResourceKind::Physics,
            ResourceSlot::Pose => ResourceKind::Pose,
            ResourceSlot::AuxiliaryMetadata => ResourceKind::AuxiliaryMetadata,
            ResourceSlot::Motion { .. } => ResourceKind::Motion,
            ResourceSlot::Texture { .. } => ResourceKind::Texture,
        }
    }
}

impl Display for ResourceSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ResourceSlot::Expression { index, name } => write!(f, "Expression #{} {}", index, name),
            ResourceSlot::Motion { group, index } => write!(f, "Motion {}_{}", group, index),
            ResourceSlot::Texture { index } => write!(f, "Texture #{}", index),
            slot => Display::fmt(&slot.kind(), f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub ticket: Ticket,
    pub slot: ResourceSlot,
    pub path: String,
}

/// Successful result of one fetch.
#[derive(Debug, Clone)]
pub enum Payload {
    Bytes(Bytes),
    /// A texture already decoded, usually through the shared cache.
    Texture(Arc<TextureEntry>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    AlreadyStarted,
    NotStarted,
    UnknownTicket(Ticket),
    LateCompletion { issued: LoadStage, current: LoadStage },
    /// The completion gate and the pending fetches disagree.
    Overcount { stage: LoadStage, total: usize },
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::AlreadyStarted => write!(f, "Load already started"),
            ProtocolError::NotStarted => write!(f, "Load not started"),
            ProtocolError::UnknownTicket(ticket) => write!(
                f,
                "Unknown or already completed ticket {} of stage {}",
                ticket.serial, ticket.stage
            ),
            ProtocolError::LateCompletion { issued, current } => write!(
                f,
                "Completion issued by stage {} arrived during stage {}",
                issued, current
            ),
            ProtocolError::Overcount { stage, total } => write!(
                f,
                "Stage {} received more than {} completions",
                stage, total
            ),
        }
    }
}

impl Error for ProtocolError {}

#[derive(Debug)]
pub struct LoadOrchestrator {
    stage: LoadStage,
    descriptor: Arc<ModelDescriptor>,
    home: String,
    texture_variant: VariantFlags,
    gate: CompletionGate,
    pending: HashMap<u64, (ResourceSlot, String)>,
    next_serial: u64,
    issued: usize,
    transitions: usize,
    failed: Vec<ResourceSlot>,
    parameter_ids: ParameterIds,
}

impl Default for LoadOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadOrchestrator {
    pub fn new() -> Self {
        Self {
            stage: LoadStage::Uninitialized,
            descriptor: Arc::default(),
            home: String::new(),
            texture_variant: VariantFlags::NONE,
            gate: CompletionGate::new(0),
            pending: HashMap::new(),
            next_serial: 0,
            issued: 0,
            transitions: 0,
            failed: Vec::new(),
            parameter_ids: ParameterIds::default(),
        }
    }

    /// Decode variant for texture payloads that arrive as raw bytes.
    pub fn with_texture_variant(mut self, variant: VariantFlags) -> Self {
        self.texture_variant = variant;
        self
    }

    pub fn stage(&self) -> LoadStage {
        self.stage
    }

    pub fn is_ready(&self) -> bool {
        self.stage == LoadStage::Ready
    }

    pub fn descriptor(&self) -> &Arc<ModelDescriptor> {
        &self.descriptor
    }

    /// Directory every descriptor-relative path resolves against.
    pub fn home(&self) -> &str {
        &self.home
    }

    pub fn texture_variant(&self) -> VariantFlags {
        self.texture_variant
    }

    /// Fetches issued so far over the whole pipeline.
    pub fn issued_count(&self) -> usize {
        self.issued
    }

    /// Fetches of the current stage that have not completed yet.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions
    }

    /// Slots that failed to fetch or parse and were left empty.
    pub fn failed_slots(&self) -> &[ResourceSlot] {
        &self.failed
    }

    /// Starts the pipeline and returns the first batch of fetches.
    ///
    /// Stages with nothing to fetch are passed through immediately, so the
    /// returned batch may be empty with the orchestrator already ready.
    pub fn begin(
        &mut self,
        descriptor: Arc<ModelDescriptor>,
        home: &str,
        runtime: &mut dyn EntityRuntime,
    ) -> Result<Vec<FetchRequest>, ProtocolError> {
        if self.stage != LoadStage::Uninitialized {
            error!("Load pipeline started twice");
            return Err(ProtocolError::AlreadyStarted);
        }

        self.descriptor = descriptor;
        self.home = home.to_owned();
        Ok(self.advance(runtime))
    }

    /// Feeds back the result of one fetch.
    ///
    /// The payload is installed into `runtime` before the completion counts,
    /// so the stage never advances ahead of its data. Failures count too and
    /// leave their slot empty. Completions that do not belong to the current
    /// stage are rejected without touching `runtime`.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        result: Result<Payload, LoadError>,
        runtime: &mut dyn EntityRuntime,
    ) -> Result<Vec<FetchRequest>, ProtocolError> {
        if self.stage == LoadStage::Uninitialized {
            error!("Completion for ticket {:?} before the load started", ticket);
            return Err(ProtocolError::NotStarted);
        }
        if ticket.stage != self.stage {
            let error = ProtocolError::LateCompletion {
                issued: ticket.stage,
                current: self.stage,
            };
            error!("{}", error);
            return Err(error);
        }
        let Some((slot, path)) = self.pending.remove(&ticket.serial) else {
            let error = ProtocolError::UnknownTicket(ticket);
            error!("{}", error);
            return Err(error);
        };
        debug_assert_eq!(
            self.pending.len() + 1,
            self.gate.total() - self.gate.arrived(),
            "pending fetches and completion gate disagree"
        );

        let result = result.and_then(|payload| self.hand_off(&slot, &path, payload, runtime));
        if let Err(error) = result {
            warn!("{} left empty: {}", slot, error);
            self.failed.push(slot);
        }

        match self.gate.arrive() {
            Ok(GateState::Open) => Ok(self.advance(runtime)),
            Ok(GateState::Waiting { remaining }) => {
                debug!("Stage {} waiting for {} more", self.stage, remaining);
                Ok(Vec::new())
            }
            Err(overcount) => {
                let error = ProtocolError::Overcount {
                    stage: self.stage,
                    total: overcount.total,
                };
                error!("{}", error);
                Err(error)
            }
        }
    }

    fn advance(&mut self, runtime: &mut dyn EntityRuntime) -> Vec<FetchRequest> {
        while let Some(next) = self.stage.next() {
            debug!("Stage {} -> {}", self.stage, next);
            self.stage = next;
            self.transitions += 1;

            match next.kind() {
                StageKind::Start => {}
                StageKind::Derived => self.derive(runtime),
                StageKind::Terminal => {
                    info!(
                        "Model ready, {} fetches issued, {} slots failed",
                        self.issued,
                        self.failed.len()
                    );
                }
                StageKind::Single | StageKind::FanOut => {
                    let requests = self.enter(next);
                    if !self.gate.is_open() {
                        return requests;
                    }
                }
            }
        }
        Vec::new()
    }

    fn derive(&mut self, runtime: &mut dyn EntityRuntime) {
        match self.stage {
            LoadStage::SetupAmbientEffects => {
                runtime.install_ambient_effects(AmbientEffects::from_descriptor(&self.descriptor));
            }
            LoadStage::DeriveParameterIds => {
                self.parameter_ids = ParameterIds::from_descriptor(&self.descriptor);
                let layout = ModelLayout::from_map(self.descriptor.layout());
                runtime.install_parameter_ids(self.parameter_ids.clone(), layout);
            }
            _ => {}
        }
    }

    fn slots(&self, stage: LoadStage) -> Vec<(ResourceSlot, Option<String>)> {
        let descriptor = &self.descriptor;
        let single = |slot: ResourceSlot, path: Option<&str>| {
            path.map(|path| vec![(slot, Some(path.to_owned()))])
                .unwrap_or_default()
        };

        match stage {
            LoadStage::LoadGeometry => single(ResourceSlot::Geometry, descriptor.geometry_path()),
            LoadStage::LoadPhysics => single(ResourceSlot::Physics, descriptor.physics_path()),
            LoadStage::LoadPose => single(ResourceSlot::Pose, descriptor.pose_path()),
            LoadStage::LoadAuxiliaryMetadata => {
                single(ResourceSlot::AuxiliaryMetadata, descriptor.user_data_path())
            }
            LoadStage::LoadExpressions => descriptor
                .expressions()
                .iter()
                .enumerate()
                .map(|(index, entry)| {
                    let slot = ResourceSlot::Expression {
                        index,
                        name: entry.name.clone(),
                    };
                    (slot, Some(entry.path.clone()))
                })
                .collect(),
            LoadStage::LoadMotions => descriptor
                .motion_groups()
                .iter()
                .flat_map(|group| {
                    group.motions.iter().enumerate().map(|(index, entry)| {
                        let slot = ResourceSlot::Motion {
                            group: group.name.clone(),
                            index,
                        };
                        (slot, Some(entry.path.clone()))
                    })
                })
                .collect(),
            LoadStage::LoadTextures => (0..descriptor.texture_count())
                .map(|index| {
                    let path = descriptor.texture_path(index).map(str::to_owned);
                    (ResourceSlot::Texture { index }, path)
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn enter(&mut self, stage: LoadStage) -> Vec<FetchRequest> {
        let slots = self.slots(stage);
        self.gate = CompletionGate::new(slots.len());
        self.pending.clear();

        if slots.is_empty() {
            debug!("Stage {} has nothing to load", stage);
            return Vec::new();
        }

        let mut requests = Vec::with_capacity(slots.len());
        for (slot, path) in slots {
            let Some(path) = path else {
                warn!("{} has no path, counted as loaded", slot);
                let _ = self.gate.arrive();
                continue;
            };

            let ticket = Ticket {
                stage,
                serial: self.next_serial,
            };
            self.next_serial += 1;
            self.issued += 1;

            let path = resolve_path(&self.home, &path);
            debug!("Fetching {} from {}", slot, path);
            self.pending.insert(ticket.serial, (slot.clone(), path.clone()));
            requests.push(FetchRequest { ticket, slot, path });
        }
        requests
    }

    /// Parses a motion of the loaded descriptor, applying its fade
    /// overrides and the derived effect parameter ids.
    pub(crate) fn build_motion(
        &self,
        group: &str,
        index: usize,
        path: &str,
        data: &[u8],
    ) -> Result<MotionClip, LoadError> {
        let mut clip = MotionClip::parse(ClipKey::grouped(group, index), data)
            .map_err(|error| LoadError::parse(path, error))?;
        clip.override_fades(
            self.descriptor.motion_fade_in(group, index),
            self.descriptor.motion_fade_out(group, index),
        );
        clip.set_effect_ids(&self.parameter_ids);
        Ok(clip)
    }

    fn hand_off(
        &self,
        slot: &ResourceSlot,
        path: &str,
        payload: Payload,
        runtime: &mut dyn EntityRuntime,
    ) -> Result<(), LoadError> {
        let data = match (slot, payload) {
            (ResourceSlot::Texture { index }, Payload::Texture(texture)) => {
                runtime.bind_texture(*index, texture);
                return Ok(());
            }
            (_, Payload::Texture(_)) => {
                return Err(LoadError::parse(path, ParseError::UnexpectedPayload(slot.kind())));
            }
            (_, Payload::Bytes(data)) => data,
        };

        match slot {
            ResourceSlot::Geometry => {
                if !data.starts_with(MOC3_MAGIC) {
                    return Err(LoadError::parse(
                        path,
                        ParseError::BadMagic {
                            expected: MOC3_MAGIC,
                        },
                    ));
                }
                runtime.install_geometry(data);
            }
            ResourceSlot::Expression { name, .. } => {
                let clip = build_expression(name, path, &data)?;
                runtime.install_expression(ClipKey::named(name.as_str()), Arc::new(clip));
            }
            ResourceSlot::Physics => {
                validate_json(path, &data)?;
                runtime.install_physics(data);
            }
            ResourceSlot::Pose => {
                validate_json(path, &data)?;
                runtime.install_pose(data);
            }
            ResourceSlot::AuxiliaryMetadata => {
                let user_data =
                    UserData::parse(&data).map_err(|error| LoadError::parse(path, error))?;
                runtime.install_auxiliary_metadata(user_data);
            }
            ResourceSlot::Motion { group, index } => {
                let clip = self.build_motion(group, *index, path, &data)?;
                runtime.install_motion(clip.key.clone(), Arc::new(clip));
            }
            ResourceSlot::Texture { index } => {
                let texture = TextureEntry::decode(path, data, self.texture_variant)
                    .map_err(|error| LoadError::parse(path, error))?;
                runtime.bind_texture(*index, Arc::new(texture));
            }
        }
        Ok(())
    }
}

pub(crate) fn build_expression(
    name: &str,
    path: &str,
    data: &[u8],
) -> Result<ExpressionClip, LoadError> {
    ExpressionClip::parse(name, data).map_err(|error| LoadError::parse(path, error))
}

fn validate_json(path: &str, data: &[u8]) -> Result<(), LoadError> {
    serde_json::from_slice::<serde_json::Value>(data)
        .map(|_| ())
        .map_err(|error| LoadError::parse(path, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::FetchError, fixtures, runtime::ModelRuntime};

    fn descriptor(json: &str) -> Arc<ModelDescriptor> {
        Arc::new(ModelDescriptor::from_json(json.as_bytes()).unwrap())
    }

    fn payload(request: &FetchRequest) -> Result<Payload, LoadError> {
        let data = match request.slot {
            ResourceSlot::Geometry => fixtures::geometry(),
            ResourceSlot::Expression { .. } => fixtures::expression(1.0),
            ResourceSlot::Physics | ResourceSlot::Pose => fixtures::json_object(),
            ResourceSlot::AuxiliaryMetadata => fixtures::user_data(),
            ResourceSlot::Motion { .. } => fixtures::motion(2.0),
            ResourceSlot::Texture { .. } => fixtures::png(2, 2, [255, 255, 255, 128]),
        };
        Ok(Payload::Bytes(data))
    }

    fn fetch_failure(request: &FetchRequest) -> Result<Payload, LoadError> {
        Err(FetchError::NotFound(request.path.clone()).into())
    }

    const THREE_MOTIONS: &str = r#"{
        "FileReferences": {
            "Motions": {"Idle": [{"File": "a.motion3.json"}, {"File": "b.motion3.json"}, {"File": "c.motion3.json"}]}
        }
    }"#;

    #[test]
    fn stage_order_matches_transition_table() {
        for pair in LoadStage::ORDER.windows(2) {
            assert_eq!(pair[0].next(), Some(pair[1]));
        }
        assert_eq!(LoadStage::Ready.next(), None);
        assert_eq!(LoadStage::LoadTextures.kind(), StageKind::FanOut);
        assert_eq!(LoadStage::DeriveParameterIds.kind(), StageKind::Derived);
    }

    #[test]
    fn fan_out_advances_after_last_completion_in_any_order() {
        let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        for order in orders {
            let mut runtime = ModelRuntime::new();
            let mut orchestrator = LoadOrchestrator::new();
            let requests = orchestrator
                .begin(descriptor(THREE_MOTIONS), "Haru/", &mut runtime)
                .unwrap();
            assert_eq!(requests.len(), 3);
            assert_eq!(orchestrator.stage(), LoadStage::LoadMotions);

            for (position, index) in order.into_iter().enumerate() {
                let request = &requests[index];
                let next = orchestrator
                    .complete(request.ticket, payload(request), &mut runtime)
                    .unwrap();
                assert!(next.is_empty());
                if position < 2 {
                    assert_eq!(orchestrator.stage(), LoadStage::LoadMotions);
                    assert!(!orchestrator.is_ready());
                }
            }

            assert!(orchestrator.is_ready());
            assert_eq!(orchestrator.transition_count(), 10);
            assert_eq!(runtime.motion_count("Idle"), 3);
        }
    }

    #[test]
    fn pending_fetches_track_the_gate() {
        let mut runtime = ModelRuntime::new();
        let mut orchestrator = LoadOrchestrator::new();
        let requests = orchestrator
            .begin(
                descriptor(r#"{"FileReferences": {"Textures": ["a.png", "", "c.png"]}}"#),
                "",
                &mut runtime,
            )
            .unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(orchestrator.pending_count(), 2);

        orchestrator
            .complete(requests[1].ticket, payload(&requests[1]), &mut runtime)
            .unwrap();
        assert_eq!(orchestrator.pending_count(), 1);
        assert!(matches!(
            orchestrator.complete(requests[1].ticket, payload(&requests[1]), &mut runtime),
            Err(ProtocolError::UnknownTicket(_))
        ));
        assert_eq!(orchestrator.pending_count(), 1);

        orchestrator
            .complete(requests[0].ticket, payload(&requests[0]), &mut runtime)
            .unwrap();
        assert_eq!(orchestrator.pending_count(), 0);
        assert!(orchestrator.is_ready());
    }

    #[test]
    fn empty_descriptor_is_ready_without_fetching() {
        let mut runtime = ModelRuntime::new();
        let mut orchestrator = LoadOrchestrator::new();
        let requests = orchestrator
            .begin(descriptor("{}"), "", &mut runtime)
            .unwrap();

        assert!(requests.is_empty());
        assert!(orchestrator.is_ready());
        assert_eq!(orchestrator.issued_count(), 0);
        assert!(runtime.effects().is_some());
    }

    #[test]
    fn failed_slot_still_unblocks_the_stage() {
        let mut runtime = ModelRuntime::new();
        let mut orchestrator = LoadOrchestrator::new();
        let requests = orchestrator
            .begin(descriptor(THREE_MOTIONS), "", &mut runtime)
            .unwrap();

        orchestrator
            .complete(requests[0].ticket, payload(&requests[0]), &mut runtime)
            .unwrap();
        orchestrator
            .complete(requests[1].ticket, fetch_failure(&requests[1]), &mut runtime)
            .unwrap();
        assert!(!orchestrator.is_ready());
        orchestrator
            .complete(requests[2].ticket, payload(&requests[2]), &mut runtime)
            .unwrap();

        assert!(orchestrator.is_ready());
        assert!(runtime.motion("Idle", 1).is_none());
        assert!(runtime.motion("Idle", 2).is_some());
        assert_eq!(
            orchestrator.failed_slots(),
            [ResourceSlot::Motion {
                group: "Idle".into(),
                index: 1
            }]
        );
    }

    #[test]
    fn completions_outside_their_stage_are_rejected() {
        let mut runtime = ModelRuntime::new();
        let mut orchestrator = LoadOrchestrator::new();
        let model = r#"{
            "FileReferences": {
                "Textures": ["t.png"],
                "Motions": {"Idle": [{"File": "a.motion3.json"}, {"File": "b.motion3.json"}]}
            }
        }"#;
        let motions = orchestrator
            .begin(descriptor(model), "", &mut runtime)
            .unwrap();

        orchestrator
            .complete(motions[0].ticket, payload(&motions[0]), &mut runtime)
            .unwrap();
        assert_eq!(
            orchestrator.complete(motions[0].ticket, payload(&motions[0]), &mut runtime),
            Err(ProtocolError::UnknownTicket(motions[0].ticket))
        );

        let textures = orchestrator
            .complete(motions[1].ticket, payload(&motions[1]), &mut runtime)
            .unwrap();
        assert_eq!(textures.len(), 1);
        assert_eq!(
            orchestrator.complete(motions[1].ticket, payload(&motions[1]), &mut runtime),
            Err(ProtocolError::LateCompletion {
                issued: LoadStage::LoadMotions,
                current: LoadStage::LoadTextures
            })
        );

        orchestrator
            .complete(textures[0].ticket, payload(&textures[0]), &mut runtime)
            .unwrap();
        assert!(orchestrator.is_ready());
        assert!(matches!(
            orchestrator.complete(textures[0].ticket, payload(&textures[0]), &mut runtime),
            Err(ProtocolError::LateCompletion {
                current: LoadStage::Ready,
                ..
            })
        ));
        assert_eq!(runtime.total_motion_count(), 2);
    }

    #[test]
    fn begin_twice_and_complete_before_begin_are_errors() {
        let mut runtime = ModelRuntime::new();
        let mut orchestrator = LoadOrchestrator::new();
        let ticket = Ticket {
            stage: LoadStage::LoadGeometry,
            serial: 0,
        };
        assert_eq!(
            orchestrator.complete(ticket, Ok(Payload::Bytes(Bytes::new())), &mut runtime),
            Err(ProtocolError::NotStarted)
        );

        orchestrator
            .begin(descriptor("{}"), "", &mut runtime)
            .unwrap();
        assert!(matches!(
            orchestrator.begin(descriptor("{}"), "", &mut runtime),
            Err(ProtocolError::AlreadyStarted)
        ));
    }

    #[test]
    fn geometry_without_magic_is_a_parse_failure() {
        let mut runtime = ModelRuntime::new();
        let mut orchestrator = LoadOrchestrator::new();
        let requests = orchestrator
            .begin(
                descriptor(r#"{"FileReferences": {"Moc": "m.moc3"}}"#),
                "Mark",
                &mut runtime,
            )
            .unwrap();
        assert_eq!(requests[0].path, "Mark/m.moc3");

        let bad = Ok(Payload::Bytes(Bytes::from_static(b"nope")));
        orchestrator
            .complete(requests[0].ticket, bad, &mut runtime)
            .unwrap();

        assert!(orchestrator.is_ready());
        assert!(runtime.geometry().is_none());
        assert_eq!(orchestrator.failed_slots(), [ResourceSlot::Geometry]);
    }

    #[test]
    fn empty_texture_path_counts_as_loaded() {
        let mut runtime = ModelRuntime::new();
        let mut orchestrator =
            LoadOrchestrator::new().with_texture_variant(VariantFlags::PREMULTIPLIED_ALPHA);
        let requests = orchestrator
            .begin(
                descriptor(r#"{"FileReferences": {"Textures": ["", "t.png"]}}"#),
                "",
                &mut runtime,
            )
            .unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].slot, ResourceSlot::Texture { index: 1 });

        orchestrator
            .complete(requests[0].ticket, payload(&requests[0]), &mut runtime)
            .unwrap();
        assert!(orchestrator.is_ready());
        assert!(runtime.texture(0).is_none());
        let texture = runtime.texture(1).unwrap();
        assert!(texture.premultiplied);
        assert_eq!(&texture.pixels[..4], &[128, 128, 128, 128]);
    }

    #[test]
    fn motions_pick_up_descriptor_fades_and_effect_ids() {
        let mut runtime = ModelRuntime::new();
        let mut orchestrator = LoadOrchestrator::new();
        let model = r#"{
            "FileReferences": {
                "Motions": {"Idle": [{"File": "a.motion3.json", "FadeInTime": 0.5, "FadeOutTime": -1}]}
            },
            "Groups": [{"Target": "Parameter", "Name": "LipSync", "Ids": ["ParamMouthOpenY"]}]
        }"#;
        let requests = orchestrator
            .begin(descriptor(model), "", &mut runtime)
            .unwrap();
        orchestrator
            .complete(requests[0].ticket, payload(&requests[0]), &mut runtime)
            .unwrap();

        let motion = runtime.motion("Idle", 0).unwrap();
        assert_eq!(motion.fade_in, 0.5);
        assert_eq!(motion.fade_out, 1.0);
        assert_eq!(motion.lip_sync_ids, ["ParamMouthOpenY"]);
        assert!(runtime.effects().unwrap().eye_blink.is_none());
    }

    #[test]
    fn full_pipeline_issues_one_fetch_per_declared_resource() {
        let mut runtime = ModelRuntime::new();
        let mut orchestrator = LoadOrchestrator::new();
        let model = r#"{
            "FileReferences": {
                "Physics": "p.physics3.json",
                "Motions": {"Idle": [{"File": "a.motion3.json"}, {"File": "b.motion3.json"}]},
                "Textures": ["t0.png", "t1.png", "t2.png"]
            }
        }"#;

        let physics = orchestrator
            .begin(descriptor(model), "Rice/", &mut runtime)
            .unwrap();
        assert_eq!(physics.len(), 1);
        assert_eq!(orchestrator.stage(), LoadStage::LoadPhysics);

        let motions = orchestrator
            .complete(physics[0].ticket, payload(&physics[0]), &mut runtime)
            .unwrap();
        assert_eq!(motions.len(), 2);

        assert!(orchestrator
            .complete(motions[1].ticket, payload(&motions[1]), &mut runtime)
            .unwrap()
            .is_empty());
        let textures = orchestrator
            .complete(motions[0].ticket, payload(&motions[0]), &mut runtime)
            .unwrap();
        assert_eq!(textures.len(), 3);

        for index in [2, 0, 1] {
            assert!(!orchestrator.is_ready());
            let request = &textures[index];
            orchestrator
                .complete(request.ticket, payload(request), &mut runtime)
                .unwrap();
        }

        assert!(orchestrator.is_ready());
        assert_eq!(orchestrator.issued_count(), 6);
        assert_eq!(orchestrator.transition_count(), 10);
        assert!(orchestrator.failed_slots().is_empty());
        assert!(runtime.physics().is_some());
        assert_eq!(runtime.texture_count(), 3);
        assert_eq!(runtime.texture(2).unwrap().path, "Rice/t2.png");
    }
}

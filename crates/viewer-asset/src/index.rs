use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Geometry,
    Expression,
    Physics,
    Pose,
    AuxiliaryMetadata,
    Motion,
    Texture,
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Geometry => write!(f, "Geometry"),
            ResourceKind::Expression => write!(f, "Expression"),
            ResourceKind::Physics => write!(f, "Physics"),
            ResourceKind::Pose => write!(f, "Pose"),
            ResourceKind::AuxiliaryMetadata => write!(f, "UserData"),
            ResourceKind::Motion => write!(f, "Motion"),
            ResourceKind::Texture => write!(f, "Texture"),
        }
    }
}

/// Decode options that make two loads of the same file distinct cache entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariantFlags(u8);

impl VariantFlags {
    pub const NONE: Self = Self(0);
    pub const PREMULTIPLIED_ALPHA: Self = Self(1);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Display for VariantFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.contains(Self::PREMULTIPLIED_ALPHA) {
            write!(f, "premultiplied")
        } else {
            write!(f, "straight")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    pub kind: ResourceKind,
    pub identity: String,
    pub variant: VariantFlags,
}

impl CacheKey {
    pub fn new(kind: ResourceKind, identity: impl Into<String>, variant: VariantFlags) -> Self {
        Self {
            kind,
            identity: identity.into(),
            variant,
        }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.identity, self.variant)
    }
}

/// Registration key of a loaded expression or motion clip.
///
/// Grouped keys compare structurally, so a group named `"a_b"` with index 1
/// never collides with a group named `"a"` holding an entry keyed `"b_1"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClipKey {
    Named(String),
    Grouped { group: String, index: usize },
}

impl ClipKey {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn grouped(group: impl Into<String>, index: usize) -> Self {
        Self::Grouped {
            group: group.into(),
            index,
        }
    }
}

impl Display for ClipKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ClipKey::Named(name) => write!(f, "{}", name),
            ClipKey::Grouped { group, index } => write!(f, "{}_{}", group, index),
        }
    }
}

use std::fmt::{self, Display, Formatter};

/// Kinds of entities that can be resolved from a document by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Buffer,
    BufferView,
    Accessor,
    Texture,
    Material,
    Mesh,
    Skin,
    Animation,
    Camera,
    Light,
    Node,
    Scene,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Buffer => write!(f, "buffer"),
            EntityKind::BufferView => write!(f, "bufferView"),
            EntityKind::Accessor => write!(f, "accessor"),
            EntityKind::Texture => write!(f, "texture"),
            EntityKind::Material => write!(f, "material"),
            EntityKind::Mesh => write!(f, "mesh"),
            EntityKind::Skin => write!(f, "skin"),
            EntityKind::Animation => write!(f, "animation"),
            EntityKind::Camera => write!(f, "camera"),
            EntityKind::Light => write!(f, "light"),
            EntityKind::Node => write!(f, "node"),
            EntityKind::Scene => write!(f, "scene"),
        }
    }
}

/// Identifies one resolvable unit of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DependencyKey {
    pub kind: EntityKind,
    pub index: usize,
}

impl DependencyKey {
    pub const fn new(kind: EntityKind, index: usize) -> Self {
        Self { kind, index }
    }

    pub const fn node(index: usize) -> Self {
        Self::new(EntityKind::Node, index)
    }
}

impl Display for DependencyKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.kind, self.index)
    }
}

/// Identity of an object carrying extension data, used to key side-channel payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectId {
    Document,
    Entity(DependencyKey),
}

impl From<DependencyKey> for ObjectId {
    fn from(key: DependencyKey) -> Self {
        ObjectId::Entity(key)
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Document => write!(f, "document"),
            ObjectId::Entity(key) => Display::fmt(key, f),
        }
    }
}

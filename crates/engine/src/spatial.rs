use crate::Vec3;

/// Identity of a scene object (house, prop, vehicle...) as seen by spatial queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u64);

pub const FLAMMABLE_TAG: &str = "Flammable";

#[derive(Debug, Clone, PartialEq)]
pub struct OverlapHit {
    pub object: ObjectId,
    pub position: Vec3,
    pub tag: String,
    /// Owning structure when the object is part of one.
    pub structure: Option<ObjectId>,
}

impl OverlapHit {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag == tag
    }
}

pub trait SpatialQuery {
    /// Objects whose position lies within `radius` of `center`, in the service's own order.
    fn overlap_sphere(&self, center: Vec3, radius: f32) -> Vec<OverlapHit>;
}

#[derive(Debug, Clone, PartialEq)]
struct SceneObject {
    id: ObjectId,
    position: Vec3,
    tag: String,
    structure: Option<ObjectId>,
}

/// Flat list of scene objects; overlap results keep insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpatialIndex {
    objects: Vec<SceneObject>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the object with the same id.
    pub fn insert(
        &mut self,
        id: ObjectId,
        position: Vec3,
        tag: impl Into<String>,
        structure: Option<ObjectId>,
    ) {
        let object = SceneObject {
            id,
            position,
            tag: tag.into(),
            structure,
        };
        match self.objects.iter_mut().find(|existing| existing.id == id) {
            Some(existing) => *existing = object,
            None => self.objects.push(object),
        }
    }

    pub fn remove(&mut self, id: ObjectId) -> bool {
        let before = self.objects.len();
        self.objects.retain(|object| object.id != id);
        before != self.objects.len()
    }

    pub fn position_of(&self, id: ObjectId) -> Option<Vec3> {
        self.objects
            .iter()
            .find(|object| object.id == id)
            .map(|object| object.position)
    }

    pub fn structure_of(&self, id: ObjectId) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|object| object.id == id)
            .and_then(|object| object.structure)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl SpatialQuery for SpatialIndex {
    fn overlap_sphere(&self, center: Vec3, radius: f32) -> Vec<OverlapHit> {
        if !radius.is_finite() || radius < 0.0 {
            return Vec::new();
        }
        let radius_sq = radius * radius;
        self.objects
            .iter()
            .filter(|object| object.position.distance_squared(center) <= radius_sq)
            .map(|object| OverlapHit {
                object: object.id,
                position: object.position,
                tag: object.tag.clone(),
                structure: object.structure,
            })
            .collect()
    }
}

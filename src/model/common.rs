use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

/// Store-assigned identifier, unique within an entity type.
pub type Id = i64;

/// A record exposed as a REST resource and mirrored into the search index.
pub trait Entity: Debug + Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Name used in log lines, alert headers and error bodies.
    const ENTITY_NAME: &'static str;
    /// Path segment under `/api`.
    const RESOURCE: &'static str;
    /// Search index holding the documents of this type.
    const INDEX_NAME: &'static str;

    fn id(&self) -> Option<Id>;

    fn set_id(&mut self, id: Option<Id>);

    /// Copy every non-null scalar field of `patch` onto `self`.
    /// Associations are left untouched.
    fn merge_from(&mut self, patch: &Self);
}

/// Entity equality: both sides saved and carrying the same id.
/// An unsaved value is not even equal to itself.
pub fn same_identity(left: Option<Id>, right: Option<Id>) -> bool {
    matches!((left, right), (Some(l), Some(r)) if l == r)
}

/// Implements `PartialEq` by identity and a `Hash` that is constant per type,
/// so a value keeps its hash bucket when the store assigns its id.
macro_rules! identity_eq {
    ($ty:ty) => {
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                $crate::model::common::same_identity(self.id, other.id)
            }
        }

        impl std::hash::Hash for $ty {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                std::hash::Hash::hash(std::any::type_name::<$ty>(), state);
            }
        }
    };
}

pub(crate) use identity_eq;

/// Replace `target` with `source` when the latter carries a value.
pub(crate) fn merge_field(target: &mut Option<String>, source: &Option<String>) {
    if let Some(value) = source {
        *target = Some(value.clone());
    }
}

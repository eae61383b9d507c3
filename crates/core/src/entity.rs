//! Entity trait and the explicit reference/hydrated relation type.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Something with identity that persists across state changes.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}

/// A relationship to another entity, either as a bare id or with the full record.
///
/// Endpoints differ in how much of a related record they return: listings
/// carry ids only, detail views carry the record. Call sites say which one
/// they need with [`Related::hydrated`] or [`Related::id`] instead of probing
/// optional nested fields.
///
/// On the wire a reference is the bare id and a hydrated relation is the
/// record object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    untagged,
    bound(
        serialize = "E: Serialize, E::Id: Serialize",
        deserialize = "E: Deserialize<'de>, E::Id: Deserialize<'de>"
    )
)]
pub enum Related<E: Entity> {
    Hydrated(E),
    Reference(E::Id),
}

impl<E: Entity> Related<E> {
    pub fn reference(id: E::Id) -> Self {
        Self::Reference(id)
    }

    pub fn hydrated(record: E) -> Self {
        Self::Hydrated(record)
    }

    /// Identifier of the related entity; available in both forms.
    pub fn id(&self) -> &E::Id {
        match self {
            Related::Hydrated(record) => record.id(),
            Related::Reference(id) => id,
        }
    }

    pub fn is_hydrated(&self) -> bool {
        matches!(self, Related::Hydrated(_))
    }

    /// The full record; an invariant violation when only a reference was loaded.
    pub fn record(&self) -> DomainResult<&E> {
        match self {
            Related::Hydrated(record) => Ok(record),
            Related::Reference(id) => Err(DomainError::invariant(format!(
                "relation {id:?} was loaded as a reference, not hydrated"
            ))),
        }
    }

    /// Drop the record and keep only the id.
    pub fn into_reference(self) -> Self {
        match self {
            Related::Hydrated(record) => Related::Reference(record.id().clone()),
            reference => reference,
        }
    }

    /// Hydrate a reference with `load`; keeps the reference when `load` finds nothing.
    pub fn hydrate_with(self, load: impl FnOnce(&E::Id) -> Option<E>) -> Self {
        match self {
            Related::Reference(id) => match load(&id) {
                Some(record) => Related::Hydrated(record),
                None => Related::Reference(id),
            },
            hydrated => hydrated,
        }
    }
}

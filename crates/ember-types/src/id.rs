//! Typed identifiers.
//!
//! Every entity in the core is named by a 128-bit UUID, but the *kind* of
//! identifier is part of the contract: a `RuleId` must never be accepted
//! where a `DeviceId` is expected, even though both are just a `Uuid`
//! underneath. `Identifier<K>` carries its kind as a zero-sized phantom
//! parameter so the compiler enforces this for us instead of relying on
//! sixteen almost-identical hand-written newtypes.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Marker trait for identifier kinds. Each kind is a distinct unit struct;
/// the trait only exists to give the kind a debug-friendly name.
pub trait IdKind {
    /// Short tag used in error messages and logs.
    const TAG: &'static str;
}

macro_rules! id_kind {
    ($name:ident, $tag:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name;
        impl IdKind for $name {
            const TAG: &'static str = $tag;
        }
    };
}

id_kind!(RuleKind, "rule");
id_kind!(DeviceKind, "device");
id_kind!(EventTypeKind, "event-type");
id_kind!(ActionTypeKind, "action-type");
id_kind!(StateTypeKind, "state-type");
id_kind!(ParamTypeKind, "param-type");
id_kind!(TokenKind, "token");
id_kind!(PairingTransactionKind, "pairing-transaction");

/// A UUID tagged with the kind of entity it identifies.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier<K> {
    uuid: Uuid,
    #[serde(skip)]
    _kind: PhantomData<K>,
}

impl<K> Identifier<K> {
    /// Generate a new random identifier.
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            _kind: PhantomData,
        }
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self {
            uuid,
            _kind: PhantomData,
        }
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.uuid
    }
}

impl<K> FromStr for Identifier<K> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_uuid(Uuid::parse_str(s)?))
    }
}

impl<K: IdKind> fmt::Display for Identifier<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid)
    }
}

impl<K: IdKind> fmt::Debug for Identifier<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", K::TAG, self.uuid)
    }
}

impl<K> Clone for Identifier<K> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<K> Copy for Identifier<K> {}
impl<K> PartialEq for Identifier<K> {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}
impl<K> Eq for Identifier<K> {}
impl<K> std::hash::Hash for Identifier<K> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}
impl<K> Default for Identifier<K> {
    fn default() -> Self {
        Self::new()
    }
}

pub type RuleId = Identifier<RuleKind>;
pub type DeviceId = Identifier<DeviceKind>;
pub type EventTypeId = Identifier<EventTypeKind>;
pub type ActionTypeId = Identifier<ActionTypeKind>;
pub type StateTypeId = Identifier<StateTypeKind>;
pub type ParamTypeId = Identifier<ParamTypeKind>;
pub type TokenId = Identifier<TokenKind>;
pub type PairingTransactionId = Identifier<PairingTransactionKind>;

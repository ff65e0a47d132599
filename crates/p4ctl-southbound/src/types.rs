//! Type-safe P4 object ID wrappers.
//!
//! P4Info assigns every table, action, match field, action parameter and
//! counter a 32-bit numeric id. Field and parameter ids are scoped to their
//! table or action. The wrappers below keep ids of different object kinds
//! from being mixed up (e.g., passing an action id where a table id is
//! expected).

use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Raw P4 object ID type (P4Info `preamble.id`).
pub type RawP4Id = u32;

/// Marker trait for P4 object kinds.
pub trait P4ObjectKind: Send + Sync + 'static {
    /// Returns the object kind name for debugging.
    fn type_name() -> &'static str;
}

/// A type-safe P4 object ID.
///
/// # Examples
///
/// ```
/// use p4ctl_southbound::{ActionId, TableId};
///
/// let table = TableId::from_raw(37375156).unwrap();
/// let action = ActionId::from_raw(28792405).unwrap();
/// assert_eq!(table.as_raw(), 37375156);
///
/// // This would fail to compile:
/// // fn takes_table(t: TableId) {}
/// // takes_table(action);
/// # let _ = action;
/// ```
#[derive(Clone, Copy)]
pub struct P4Id<T: P4ObjectKind> {
    raw: RawP4Id,
    _marker: PhantomData<T>,
}

impl<T: P4ObjectKind> P4Id<T> {
    /// Creates a new ID from a raw value.
    ///
    /// Returns `None` for 0, which P4Runtime reserves as "unset" (and, for
    /// counter reads, as the all-indices wildcard on the index instead).
    pub fn from_raw(raw: RawP4Id) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self {
                raw,
                _marker: PhantomData,
            })
        }
    }

    /// Returns the raw ID value.
    pub const fn as_raw(&self) -> RawP4Id {
        self.raw
    }
}

impl<T: P4ObjectKind> fmt::Debug for P4Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:08x})", T::type_name(), self.raw)
    }
}

impl<T: P4ObjectKind> fmt::Display for P4Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl<T: P4ObjectKind> PartialEq for P4Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: P4ObjectKind> Eq for P4Id<T> {}

impl<T: P4ObjectKind> PartialOrd for P4Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: P4ObjectKind> Ord for P4Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T: P4ObjectKind> Hash for P4Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

macro_rules! define_object_kind {
    ($name:ident, $type_name:literal, $id_alias:ident) => {
        #[doc = concat!("Marker type for P4 ", $type_name, " objects.")]
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl P4ObjectKind for $name {
            fn type_name() -> &'static str {
                $type_name
            }
        }

        #[doc = concat!("Type alias for ", $type_name, " IDs.")]
        pub type $id_alias = P4Id<$name>;
    };
}

define_object_kind!(TableKind, "Table", TableId);
define_object_kind!(ActionKind, "Action", ActionId);
define_object_kind!(MatchFieldKind, "MatchField", FieldId);
define_object_kind!(ActionParamKind, "ActionParam", ParamId);
define_object_kind!(CounterKind, "Counter", CounterId);

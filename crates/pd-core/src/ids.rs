//! Strongly typed identifier wrappers.
//!
//! All IDs are `Copy + Ord + Hash` so they can key maps and sets directly.
//! Vehicle ids double as indices into a snapshot's vehicle list and a
//! schedule's route list, hence the `.index()` helper.

use std::fmt;

/// Generate a typed ID wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(pub $inner);

        impl $name {
            /// Cast to `usize` for direct use as a `Vec` index.
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<$name> for usize {
            #[inline(always)]
            fn from(id: $name) -> usize {
                id.0 as usize
            }
        }

        impl TryFrom<usize> for $name {
            type Error = std::num::TryFromIntError;
            fn try_from(n: usize) -> Result<$name, Self::Error> {
                <$inner>::try_from(n).map($name)
            }
        }
    };
}

typed_id! {
    /// A transportation request: picked up once, delivered once.
    pub struct ParcelId(u32);
}

typed_id! {
    /// Index of a vehicle.  Equals its position in `Snapshot::vehicles` and
    /// in `Schedule::routes`.
    pub struct VehicleId(u32);
}

typed_id! {
    /// Identifies one solver bridge within a coordination manager.
    pub struct BridgeId(u32);
}

typed_id! {
    /// Sequence number stamped on every snapshot handed to a solver.
    ///
    /// Unique per coordination manager and strictly increasing, so a later
    /// submission always carries a larger id.
    pub struct SnapshotId(u64);
}

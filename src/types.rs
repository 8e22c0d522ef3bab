//! Shared primitive IDs and the fixed option lists offered by the entry form.
//!
//! Every enumeration is persisted as its French label (the exact text shown
//! to anglers), so documents written by other clients decode unchanged.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Monotonic contest entry identifier, assigned by the store.
pub type EntryId = u64;
/// Monotonic operation sequence number.
pub type OpSeq = u64;
/// Line setup identifier, unique within one contest.
pub type LineId = String;

/// Returned when a label does not belong to an option list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} label: {label:?}")]
pub struct UnknownLabel {
    /// Option list that rejected the label.
    pub kind: &'static str,
    /// Offending label.
    pub label: String,
}

macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            /// All options, in the order the form offers them.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Persisted label.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    other => Err(UnknownLabel {
                        kind: $kind,
                        label: other.to_string(),
                    }),
                }
            }
        }
    };
}

labelled_enum! {
    /// Water state observed at the peg.
    WaterCharacteristic, "water characteristic" {
        /// Muddy water.
        Boueuse => "Boueuse",
        /// Clear water.
        Claire => "Claire",
        /// Tinted water.
        Teintee => "Teintée",
        /// Flowing water.
        Courante => "Courante",
        /// Still water.
        Calme => "Calme",
    }
}

impl Default for WaterCharacteristic {
    fn default() -> Self {
        Self::Boueuse
    }
}

labelled_enum! {
    /// Weather observed during the contest.
    WeatherCondition, "weather condition" {
        /// Rain.
        Pluie => "Pluie",
        /// Wind.
        Vent => "Vent",
        /// Sunshine.
        Soleil => "Soleil",
        /// Overcast sky.
        Couvert => "Couvert",
        /// Thunderstorm.
        Orage => "Orage",
        /// Fog.
        Brouillard => "Brouillard",
    }
}

labelled_enum! {
    /// Bait put on the hook.
    HookBait, "hook bait" {
        /// Bloodworm.
        Vaseux => "Vaseux",
        /// Jokers.
        Terreaux => "Terreaux",
        /// Dead maggots.
        AsticotsMorts => "Asticots morts",
        /// Paste.
        Pate => "Pâte",
        /// 2 mm pellets.
        Pellets2mm => "Pellets 2mm",
        /// Sweetcorn.
        Mais => "Maïs",
    }
}

labelled_enum! {
    /// Species landed during the contest.
    CatchType, "catch type" {
        /// Tench.
        Tanches => "Tanches",
        /// Crucian carp.
        Carassins => "Carassins",
        /// Carp.
        Carpes => "Carpes",
        /// Roach.
        Gardons => "Gardons",
        /// Bream.
        Bremes => "Brèmes",
        /// Perch.
        Perches => "Perches",
    }
}

/// Deduplicates `values`, keeping the first occurrence of each.
pub fn dedup_preserving_order<T: PartialEq + Copy>(values: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(values.len());
    for v in values {
        if !out.contains(v) {
            out.push(*v);
        }
    }
    out
}

// Core types shared across the interpretation crate.
//
// Defines the arena identifiers (compact `u32` newtypes — candidates and
// relations live in per-system arenas, so ids are indexes, not UUIDs), the
// closed shape vocabulary produced by the classifier, the shape-family
// grouping used for typed partner lists, and the profile level that relaxes
// geometric thresholds on retry.
//
// **Critical constraint: determinism.** Ids are allocation order in the
// owning graph; shape families and value tables are fixed match tables. No
// hashing of floats, no global counters.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Arena IDs — simple integers for compactness and stable ordering.
// ---------------------------------------------------------------------------

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

arena_id!(/// Identifier of a candidate interpretation within its system graph.
    CandidateId);
arena_id!(/// Identifier of a relation edge within its system graph.
    RelationId);
arena_id!(/// Identifier of a staff within its system layout.
    StaffId);
arena_id!(/// Identifier of a system (horizontal band of staves) on the page.
    SystemId);

// ---------------------------------------------------------------------------
// Profile — staged relaxation of geometric thresholds.
// ---------------------------------------------------------------------------

/// Relaxation level for link-search thresholds.
///
/// Level 0 is the strict default used by the automatic pipeline; level 1
/// widens every gap maximum and is used when retrying a failed mandatory
/// search or when committing a user-driven edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Profile(pub u8);

impl Profile {
    pub const STRICT: Profile = Profile(0);
    pub const RELAXED: Profile = Profile(1);

    pub fn is_strict(self) -> bool {
        self.0 == 0
    }
}

// ---------------------------------------------------------------------------
// Shape vocabulary
// ---------------------------------------------------------------------------

/// The closed vocabulary of symbol shapes the classifier can emit, plus the
/// container shapes (chord, sentence, time pair, fermata) the interpretation
/// stage builds itself.
///
/// Grouping for search purposes goes through [`ShapeFamily`]; geometry and
/// linking behavior key off the family, with a handful of per-shape tables
/// below (flag attachment side, time-signature values).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Shape {
    // Note heads
    NoteheadBlack,
    NoteheadVoid,
    NoteheadWhole,
    // Stems and beams
    Stem,
    Beam,
    BeamHook,
    // Flags; Up variants attach at the top end of an up stem,
    // Down variants at the bottom end of a down stem.
    FlagUp1,
    FlagUp2,
    FlagUp3,
    FlagDown1,
    FlagDown2,
    FlagDown3,
    // Accidentals
    Flat,
    Natural,
    Sharp,
    DoubleFlat,
    DoubleSharp,
    // Barlines and dots
    BarlineThin,
    BarlineThick,
    RepeatDot,
    // Chord-attached signs
    Arpeggiato,
    Accent,
    Staccato,
    Tenuto,
    Staccatissimo,
    Marcato,
    Trill,
    Turn,
    Mordent,
    MordentInverted,
    GraceNote,
    GraceNoteSlashed,
    PluckP,
    PluckI,
    PluckM,
    PluckA,
    Tuplet3,
    Tuplet6,
    PedalDown,
    PedalUp,
    DynamicPP,
    DynamicP,
    DynamicMP,
    DynamicMF,
    DynamicF,
    DynamicFF,
    // Route markers, attached to barlines
    Coda,
    Segno,
    // Fermata parts and the assembled fermata
    FermataArc,
    FermataDot,
    Fermata,
    // Time-signature digits and whole symbols
    Time0,
    Time1,
    Time2,
    Time3,
    Time4,
    Time5,
    Time6,
    Time7,
    Time8,
    Time9,
    TimeCommon,
    TimeCutCommon,
    TimePair,
    // Rests
    MultipleRest,
    MeasureNumber,
    // Text
    Word,
    Sentence,
    // Curves
    Slur,
    // Containers
    HeadChord,
}

/// Shape families: the granularity at which the graph maintains typed,
/// abscissa-sorted partner lists for search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShapeFamily {
    Head,
    Stem,
    Beam,
    Flag,
    Accidental,
    Barline,
    Dot,
    Arpeggiato,
    Articulation,
    Ornament,
    Grace,
    Plucking,
    Tuplet,
    Pedal,
    Dynamics,
    Marker,
    Fermata,
    Time,
    Rest,
    Number,
    Text,
    Slur,
    Chord,
}

impl Shape {
    /// The family this shape belongs to. Total over the vocabulary.
    pub fn family(self) -> ShapeFamily {
        use Shape::*;
        match self {
            NoteheadBlack | NoteheadVoid | NoteheadWhole => ShapeFamily::Head,
            Stem => ShapeFamily::Stem,
            Beam | BeamHook => ShapeFamily::Beam,
            FlagUp1 | FlagUp2 | FlagUp3 | FlagDown1 | FlagDown2 | FlagDown3 => ShapeFamily::Flag,
            Flat | Natural | Sharp | DoubleFlat | DoubleSharp => ShapeFamily::Accidental,
            BarlineThin | BarlineThick => ShapeFamily::Barline,
            RepeatDot => ShapeFamily::Dot,
            Arpeggiato => ShapeFamily::Arpeggiato,
            Accent | Staccato | Tenuto | Staccatissimo | Marcato => ShapeFamily::Articulation,
            Trill | Turn | Mordent | MordentInverted => ShapeFamily::Ornament,
            GraceNote | GraceNoteSlashed => ShapeFamily::Grace,
            PluckP | PluckI | PluckM | PluckA => ShapeFamily::Plucking,
            Tuplet3 | Tuplet6 => ShapeFamily::Tuplet,
            PedalDown | PedalUp => ShapeFamily::Pedal,
            DynamicPP | DynamicP | DynamicMP | DynamicMF | DynamicF | DynamicFF => {
                ShapeFamily::Dynamics
            }
            Coda | Segno => ShapeFamily::Marker,
            FermataArc | FermataDot | Fermata => ShapeFamily::Fermata,
            Time0 | Time1 | Time2 | Time3 | Time4 | Time5 | Time6 | Time7 | Time8 | Time9
            | TimeCommon | TimeCutCommon | TimePair => ShapeFamily::Time,
            MultipleRest => ShapeFamily::Rest,
            MeasureNumber => ShapeFamily::Number,
            Word | Sentence => ShapeFamily::Text,
            Slur => ShapeFamily::Slur,
            HeadChord => ShapeFamily::Chord,
        }
    }

    pub fn is_head(self) -> bool {
        self.family() == ShapeFamily::Head
    }

    /// True for ensemble shapes: candidates whose value and grade derive
    /// from contained members.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            Shape::HeadChord | Shape::Sentence | Shape::TimePair | Shape::Fermata
        )
    }

    /// True for the flag shapes drawn for an up stem (attachment at the
    /// stem's top end).
    pub fn is_up_flag(self) -> bool {
        matches!(self, Shape::FlagUp1 | Shape::FlagUp2 | Shape::FlagUp3)
    }

    /// Vertical stem end a flag shape attaches to.
    ///
    /// Panics if called on a non-flag shape; that is a programming error,
    /// not a recognition ambiguity.
    pub fn flag_attachment(self) -> quaver_geom::VerticalSide {
        use Shape::*;
        match self {
            FlagUp1 | FlagUp2 | FlagUp3 => quaver_geom::VerticalSide::Top,
            FlagDown1 | FlagDown2 | FlagDown3 => quaver_geom::VerticalSide::Bottom,
            other => panic!("flag_attachment on non-flag shape {other:?}"),
        }
    }

    /// Numeric value of a time-signature digit shape.
    ///
    /// Panics on any shape outside `Time0`..`Time9`: a missing table entry
    /// is a model-consistency error and must fail fast rather than default.
    pub fn time_digit_value(self) -> u32 {
        use Shape::*;
        match self {
            Time0 => 0,
            Time1 => 1,
            Time2 => 2,
            Time3 => 3,
            Time4 => 4,
            Time5 => 5,
            Time6 => 6,
            Time7 => 7,
            Time8 => 8,
            Time9 => 9,
            other => panic!("no numeric value defined for time shape {other:?}"),
        }
    }

    /// Rational value of a whole time-signature symbol.
    ///
    /// Panics on shapes without a defined rational mapping, same policy as
    /// [`Shape::time_digit_value`].
    pub fn time_rational(self) -> Rational {
        match self {
            Shape::TimeCommon => Rational::new(4, 4),
            Shape::TimeCutCommon => Rational::new(2, 2),
            other => panic!("no rational value defined for time shape {other:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Rational values (time signatures)
// ---------------------------------------------------------------------------

/// An unreduced rational value, numerator over denominator.
///
/// Time signatures keep their written form: 4/4 and 2/2 are distinct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

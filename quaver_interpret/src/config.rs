// Data-driven interpretation configuration.
//
// All tunable thresholds live here in `InterpretConfig` and are passed
// explicitly into grade arithmetic and link search — the engines never read
// magic numbers or global state. Geometric maxima are expressed as
// interline fractions (resolution independence) and carry a strict and a
// relaxed value, indexed by the search `Profile`.
//
// Engine parameters are grouped per relation family: `HeadStemParams`,
// `FlagStemParams`, `AccidentalParams`, etc. Chord-attachment kinds share
// one parameter shape (`AttachmentParams`) keyed by relation kind in the
// `attachments` map. Named preset constructors (`InterpretConfig::default()`,
// `::handwritten()`) produce tuned sets for different engraving quality.
//
// See also: `grade.rs` for the arithmetic that reads `GradeParams`,
// `search.rs` for lookup-box construction from `ProfiledGap`, and the
// linker modules for how each group is consumed.
//
// **Critical constraint: determinism.** Config values feed directly into
// selection tie-breaks; two runs over the same page must use identical
// configs for identical graphs.

use crate::relation::RelationKind;
use crate::types::Profile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Profiled gaps
// ---------------------------------------------------------------------------

/// A maximum gap in interline fractions, with a strict value for the
/// automatic pipeline and a relaxed value for retry/manual profiles.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfiledGap {
    pub strict: f64,
    pub relaxed: f64,
}

impl ProfiledGap {
    pub const fn new(strict: f64, relaxed: f64) -> Self {
        Self { strict, relaxed }
    }

    /// Fraction for the given profile. Every level above 0 uses the
    /// relaxed value.
    pub fn fraction(self, profile: Profile) -> f64 {
        if profile.is_strict() { self.strict } else { self.relaxed }
    }

    /// Fraction converted to pixels for a local interline value.
    pub fn pixels(self, profile: Profile, interline: f64) -> f64 {
        self.fraction(profile) * interline
    }
}

/// Support coefficients of a relation kind: how strongly a committed
/// relation of this kind boosts the contextual grade of each endpoint.
/// The ratio applied is `1 + coeff * relation_grade`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupportCoeffs {
    pub source: f64,
    pub target: f64,
}

impl SupportCoeffs {
    pub const fn new(source: f64, target: f64) -> Self {
        Self { source, target }
    }
}

// ---------------------------------------------------------------------------
// Grade parameters
// ---------------------------------------------------------------------------

/// Confidence thresholds and the intrinsic headroom ratio.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradeParams {
    /// Reduction applied to every raw classifier confidence, reserving
    /// headroom above intrinsic grades for contextual boosts.
    pub intrinsic_ratio: f64,
    /// Floor (before intrinsic scaling) below which a candidate is never
    /// created or kept.
    pub min_grade_floor: f64,
    /// Floor (before intrinsic scaling) at which a candidate counts as
    /// reliable on its own.
    pub good_grade_floor: f64,
    /// Absolute threshold for "contextually good"; also the bar used by the
    /// weak-candidate purge.
    pub min_contextual_grade: f64,
}

impl GradeParams {
    /// Minimum retained grade: `intrinsic_ratio * min_grade_floor`.
    pub fn min_grade(&self) -> f64 {
        self.intrinsic_ratio * self.min_grade_floor
    }

    /// Reliable-on-its-own grade: `intrinsic_ratio * good_grade_floor`.
    pub fn good_grade(&self) -> f64 {
        self.intrinsic_ratio * self.good_grade_floor
    }
}

// ---------------------------------------------------------------------------
// Per-engine parameter groups
// ---------------------------------------------------------------------------

/// Head <-> stem geometry. The tightest relation in the system: heads touch
/// their stem, so in-gaps (overlap past the edge) and out-gaps (daylight)
/// get separate maxima.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeadStemParams {
    /// Maximum horizontal overlap between head edge and stem.
    pub x_in_gap_max: ProfiledGap,
    /// Maximum horizontal daylight between head edge and stem.
    pub x_out_gap_max: ProfiledGap,
    /// Maximum vertical gap between head anchor and stem end.
    pub y_gap_max: ProfiledGap,
    /// Offset of the stem contact point past the head midline, as a ratio
    /// of head height: toward the bottom on the right side (up stems) and
    /// toward the top on the left side (down stems).
    pub anchor_height_ratio: f64,
    pub coeffs: SupportCoeffs,
}

/// Flag <-> stem geometry. Flags hang on the stem end matching their
/// up/down variant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlagStemParams {
    pub x_in_gap_max: ProfiledGap,
    pub x_out_gap_max: ProfiledGap,
    pub y_gap_max: ProfiledGap,
    pub coeffs: SupportCoeffs,
}

/// Beam/hook <-> stem geometry, scored by distance to the stem segment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeamStemParams {
    pub x_gap_max: ProfiledGap,
    pub y_gap_max: ProfiledGap,
    pub coeffs: SupportCoeffs,
}

/// Accidental <-> head geometry. The accidental sits left of the head it
/// alters, roughly at the same height.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccidentalParams {
    pub x_gap_max: ProfiledGap,
    pub y_gap_max: ProfiledGap,
    /// Vertical reference on the accidental as a ratio of its height from
    /// the top; flats carry their visual weight low, so their reference
    /// sits below mid-height.
    pub flat_reference_ratio: f64,
    pub coeffs: SupportCoeffs,
}

/// Arpeggiato <-> head chord geometry: a wavy line left of the chord that
/// must cover a fair share of the chord's vertical extent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArpeggiatoParams {
    pub x_gap_max: ProfiledGap,
    pub y_gap_max: ProfiledGap,
    /// Minimum vertical overlap between sign and chord, as a ratio of the
    /// smaller of the two heights.
    pub min_overlap_ratio: f64,
    pub coeffs: SupportCoeffs,
}

/// Shared parameter shape for chord-attached signs (articulations,
/// ornaments, grace chords, pluckings, tuplets, pedals, dynamics) and the
/// barline-attached route markers. Keyed by relation kind in
/// [`InterpretConfig::attachments`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttachmentParams {
    pub x_gap_max: ProfiledGap,
    pub y_gap_max: ProfiledGap,
    pub coeffs: SupportCoeffs,
}

/// Repeat-dot geometry: dot to barline, and dot to its sibling dot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepeatDotParams {
    /// Dot to barline horizontal gap maximum.
    pub x_gap_max: ProfiledGap,
    /// Dot to barline vertical slack around the expected pitch line.
    pub y_gap_max: ProfiledGap,
    /// Expected pitch positions of the two dots around the middle line.
    /// The pitch sanity check rejects pairs not matching (-pitch, +pitch).
    pub pitch: i32,
    /// Dot to sibling-dot horizontal offset maximum.
    pub pair_x_gap_max: ProfiledGap,
    /// Tolerated deviation of the sibling's vertical offset from the
    /// expected pitch separation.
    pub pair_y_dev_max: ProfiledGap,
    pub barline_coeffs: SupportCoeffs,
    pub pair_coeffs: SupportCoeffs,
}

/// Measure number <-> multiple rest: containment along the abscissa, with a
/// margin, instead of a gap-based score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasureNumberParams {
    /// Horizontal margin added to the rest's x-range before the containment
    /// test on the number's center.
    pub x_margin: ProfiledGap,
    /// Maximum vertical gap between number and rest top.
    pub y_gap_max: ProfiledGap,
    pub coeffs: SupportCoeffs,
}

/// Chord <-> stem coefficients (the containment-adjacent support committed
/// when a chord adopts a stem; geometry is inherited from head-stem links).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChordStemParams {
    pub coeffs: SupportCoeffs,
}

/// Cross-system slur reconciliation: how far apart two slur ends may sit,
/// in interline fractions, to be considered one slur continuing across the
/// system break.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlurParams {
    pub end_gap_max: ProfiledGap,
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// All tunable interpretation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterpretConfig {
    pub grades: GradeParams,
    /// Minimum computed grade for any relation to be committed.
    pub relation_min_grade: f64,
    pub head_stem: HeadStemParams,
    pub flag_stem: FlagStemParams,
    pub beam_stem: BeamStemParams,
    pub accidental: AccidentalParams,
    pub arpeggiato: ArpeggiatoParams,
    /// Per-kind parameters for chord-attached signs and route markers.
    pub attachments: BTreeMap<RelationKind, AttachmentParams>,
    pub repeat_dot: RepeatDotParams,
    pub measure_number: MeasureNumberParams,
    pub chord_stem: ChordStemParams,
    pub slur: SlurParams,
    /// Overlap area over the smaller bounds, above which two same-family
    /// candidates are treated as competing readings of one glyph.
    pub exclusion_overlap_ratio: f64,
}

impl InterpretConfig {
    /// Parameters for a chord-attachment or marker relation kind.
    ///
    /// Panics if the kind has no entry in the attachment table: that is a
    /// missing-table-entry programming error, not a recognition failure.
    pub fn attachment(&self, kind: RelationKind) -> &AttachmentParams {
        self.attachments
            .get(&kind)
            .unwrap_or_else(|| panic!("no attachment parameters for {kind:?}"))
    }

    /// Support coefficients for a support relation kind.
    ///
    /// Panics on containment/exclusion, which carry no support semantics.
    pub fn support_coeffs(&self, kind: RelationKind) -> SupportCoeffs {
        match kind {
            RelationKind::HeadStem => self.head_stem.coeffs,
            RelationKind::FlagStem => self.flag_stem.coeffs,
            RelationKind::BeamStem => self.beam_stem.coeffs,
            RelationKind::AccidHead => self.accidental.coeffs,
            RelationKind::ArpeggiatoChord => self.arpeggiato.coeffs,
            RelationKind::ArticulationChord
            | RelationKind::OrnamentChord
            | RelationKind::GraceChord
            | RelationKind::PluckingChord
            | RelationKind::TupletChord
            | RelationKind::PedalChord
            | RelationKind::DynamicsChord
            | RelationKind::MarkerBarline => self.attachment(kind).coeffs,
            RelationKind::RepeatDotBarline => self.repeat_dot.barline_coeffs,
            RelationKind::RepeatDotPair => self.repeat_dot.pair_coeffs,
            RelationKind::MeasureCountRest => self.measure_number.coeffs,
            RelationKind::ChordStem => self.chord_stem.coeffs,
            RelationKind::Containment | RelationKind::Exclusion => {
                panic!("no support coefficients for {kind:?}")
            }
        }
    }

    /// Preset for handwritten or poorly engraved sources: same thresholds
    /// at profile 0, noticeably wider relaxed values, and a lower bar for
    /// keeping weak candidates (manual review is expected anyway).
    pub fn handwritten() -> Self {
        let mut config = Self::default();
        config.grades.min_contextual_grade = 0.4;
        config.head_stem.y_gap_max.relaxed = 1.6;
        config.flag_stem.y_gap_max.relaxed = 1.2;
        config.accidental.x_gap_max.relaxed = 2.0;
        config.accidental.y_gap_max.relaxed = 1.0;
        for params in config.attachments.values_mut() {
            params.y_gap_max.relaxed *= 1.5;
        }
        config
    }
}

impl Default for InterpretConfig {
    fn default() -> Self {
        let mut attachments = BTreeMap::new();
        attachments.insert(
            RelationKind::ArticulationChord,
            AttachmentParams {
                x_gap_max: ProfiledGap::new(0.5, 0.75),
                y_gap_max: ProfiledGap::new(1.5, 2.0),
                coeffs: SupportCoeffs::new(2.0, 0.3),
            },
        );
        attachments.insert(
            RelationKind::OrnamentChord,
            AttachmentParams {
                x_gap_max: ProfiledGap::new(0.75, 1.0),
                y_gap_max: ProfiledGap::new(2.0, 3.0),
                coeffs: SupportCoeffs::new(2.0, 0.3),
            },
        );
        attachments.insert(
            RelationKind::GraceChord,
            AttachmentParams {
                x_gap_max: ProfiledGap::new(1.5, 2.0),
                y_gap_max: ProfiledGap::new(1.5, 2.0),
                coeffs: SupportCoeffs::new(2.0, 0.3),
            },
        );
        attachments.insert(
            RelationKind::PluckingChord,
            AttachmentParams {
                x_gap_max: ProfiledGap::new(0.5, 0.75),
                y_gap_max: ProfiledGap::new(2.0, 2.5),
                coeffs: SupportCoeffs::new(2.0, 0.3),
            },
        );
        attachments.insert(
            RelationKind::TupletChord,
            AttachmentParams {
                x_gap_max: ProfiledGap::new(2.0, 3.0),
                y_gap_max: ProfiledGap::new(2.5, 3.5),
                coeffs: SupportCoeffs::new(0.75, 0.3),
            },
        );
        attachments.insert(
            RelationKind::PedalChord,
            AttachmentParams {
                x_gap_max: ProfiledGap::new(1.0, 1.5),
                y_gap_max: ProfiledGap::new(4.0, 6.0),
                coeffs: SupportCoeffs::new(1.0, 0.2),
            },
        );
        attachments.insert(
            RelationKind::DynamicsChord,
            AttachmentParams {
                x_gap_max: ProfiledGap::new(1.5, 2.0),
                y_gap_max: ProfiledGap::new(3.0, 4.0),
                coeffs: SupportCoeffs::new(1.0, 0.2),
            },
        );
        attachments.insert(
            RelationKind::MarkerBarline,
            AttachmentParams {
                x_gap_max: ProfiledGap::new(1.0, 1.5),
                y_gap_max: ProfiledGap::new(4.0, 6.0),
                coeffs: SupportCoeffs::new(2.0, 0.5),
            },
        );

        Self {
            grades: GradeParams {
                intrinsic_ratio: 0.8,
                min_grade_floor: 0.1,
                good_grade_floor: 0.5,
                min_contextual_grade: 0.5,
            },
            relation_min_grade: 0.1,
            head_stem: HeadStemParams {
                x_in_gap_max: ProfiledGap::new(0.2, 0.4),
                x_out_gap_max: ProfiledGap::new(0.15, 0.35),
                y_gap_max: ProfiledGap::new(0.8, 1.2),
                anchor_height_ratio: 0.275,
                coeffs: SupportCoeffs::new(4.0, 10.0),
            },
            flag_stem: FlagStemParams {
                x_in_gap_max: ProfiledGap::new(0.3, 0.45),
                x_out_gap_max: ProfiledGap::new(0.2, 0.35),
                y_gap_max: ProfiledGap::new(0.5, 0.8),
                coeffs: SupportCoeffs::new(2.0, 2.0),
            },
            beam_stem: BeamStemParams {
                x_gap_max: ProfiledGap::new(0.2, 0.35),
                y_gap_max: ProfiledGap::new(0.8, 1.2),
                coeffs: SupportCoeffs::new(2.0, 4.0),
            },
            accidental: AccidentalParams {
                x_gap_max: ProfiledGap::new(1.0, 1.5),
                y_gap_max: ProfiledGap::new(0.5, 0.75),
                flat_reference_ratio: 0.75,
                coeffs: SupportCoeffs::new(3.0, 1.0),
            },
            arpeggiato: ArpeggiatoParams {
                x_gap_max: ProfiledGap::new(0.5, 0.8),
                y_gap_max: ProfiledGap::new(1.0, 1.5),
                min_overlap_ratio: 0.3,
                coeffs: SupportCoeffs::new(2.0, 0.5),
            },
            attachments,
            repeat_dot: RepeatDotParams {
                x_gap_max: ProfiledGap::new(1.5, 2.0),
                y_gap_max: ProfiledGap::new(0.5, 0.75),
                pitch: 1,
                pair_x_gap_max: ProfiledGap::new(0.2, 0.3),
                pair_y_dev_max: ProfiledGap::new(0.25, 0.4),
                barline_coeffs: SupportCoeffs::new(2.0, 1.0),
                pair_coeffs: SupportCoeffs::new(2.0, 2.0),
            },
            measure_number: MeasureNumberParams {
                x_margin: ProfiledGap::new(1.0, 2.0),
                y_gap_max: ProfiledGap::new(4.0, 6.0),
                coeffs: SupportCoeffs::new(2.0, 0.5),
            },
            chord_stem: ChordStemParams {
                coeffs: SupportCoeffs::new(4.0, 4.0),
            },
            slur: SlurParams {
                end_gap_max: ProfiledGap::new(2.0, 3.0),
            },
            exclusion_overlap_ratio: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = InterpretConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored: InterpretConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn derived_grade_thresholds() {
        let grades = InterpretConfig::default().grades;
        assert!((grades.min_grade() - 0.08).abs() < 1e-12);
        assert!((grades.good_grade() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn profiled_gap_lookup() {
        let gap = ProfiledGap::new(0.2, 0.4);
        assert_eq!(gap.fraction(crate::types::Profile::STRICT), 0.2);
        assert_eq!(gap.fraction(crate::types::Profile::RELAXED), 0.4);
        assert_eq!(gap.pixels(crate::types::Profile::STRICT, 20.0), 4.0);
    }

    #[test]
    fn attachment_table_covers_all_attachment_kinds() {
        let config = InterpretConfig::default();
        for kind in [
            RelationKind::ArticulationChord,
            RelationKind::OrnamentChord,
            RelationKind::GraceChord,
            RelationKind::PluckingChord,
            RelationKind::TupletChord,
            RelationKind::PedalChord,
            RelationKind::DynamicsChord,
            RelationKind::MarkerBarline,
        ] {
            let params = config.attachment(kind);
            assert!(params.x_gap_max.strict <= params.x_gap_max.relaxed);
        }
    }

    #[test]
    #[should_panic(expected = "no attachment parameters")]
    fn attachment_table_fails_fast_on_missing_kind() {
        let config = InterpretConfig::default();
        let _ = config.attachment(RelationKind::HeadStem);
    }

    #[test]
    #[should_panic(expected = "no support coefficients")]
    fn containment_has_no_support_coeffs() {
        let config = InterpretConfig::default();
        let _ = config.support_coeffs(RelationKind::Containment);
    }

    #[test]
    fn handwritten_preset_is_looser() {
        let default = InterpretConfig::default();
        let loose = InterpretConfig::handwritten();
        assert!(loose.head_stem.y_gap_max.relaxed > default.head_stem.y_gap_max.relaxed);
        assert!(loose.grades.min_contextual_grade < default.grades.min_contextual_grade);
        // Strict thresholds stay untouched.
        assert_eq!(loose.head_stem.y_gap_max.strict, default.head_stem.y_gap_max.strict);
    }
}

//! Music Score Representation (MSR)
//!
//! The format-neutral score model built from MusicXML. It is the single
//! source both output translators read from. Parents own their children;
//! children point back at their owner through value keys (see [`uplinks`]),
//! so clones made for a target tree never alias the canonical score.

pub mod attributes;
pub mod basics;
pub mod chord;
pub mod grace;
pub mod harmony;
pub mod lyrics;
pub mod marks;
pub mod measure;
pub mod note;
pub mod part;
pub mod part_group;
pub mod score;
pub mod staff;
pub mod tuplet;
pub mod uplinks;
pub mod visitor;
pub mod voice;

pub use attributes::{Barline, Clef, Key, KeyMode, Time, TimeSymbol, Transpose};
pub use basics::{NoteType, Pitch, Placement, Position, Rational};
pub use chord::Chord;
pub use grace::{DoubleTremolo, GraceNotesGroup};
pub use harmony::{FiguredBass, Harmony, HarmonyKind};
pub use lyrics::{Stanza, Syllable, SyllableKind};
pub use marks::NoteMark;
pub use measure::{Measure, MeasureElement, MeasureKind};
pub use note::{Note, NoteContent, NoteKind};
pub use part::Part;
pub use part_group::{PartGroup, PartGroupElement, PartGroupSymbol};
pub use score::{Identification, PageGeometry, Score};
pub use staff::{Staff, StaffKind};
pub use tuplet::Tuplet;
pub use uplinks::{MeasureKey, PartGroupKey, PartKey, StaffKey, VoiceKey};
pub use visitor::{MsrNode, MsrVisitor};
pub use voice::{Repeat, RepeatEnding, Voice, VoiceElement, VoiceKind};

//! Owned MusicXML element tree
//!
//! The translators only need a read-only tree exposing the element kind,
//! ordered children, typed attribute lookup and the input line number of
//! each node. [`XmlElement`] is that tree, detached from the parser buffer so
//! it can outlive the source text.

use std::fmt;

// ============================================================================
// ELEMENT KINDS
// ============================================================================

/// Closed set of MusicXML elements the translators dispatch on.
///
/// Anything else is kept as `Other(name)` so it is still browsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKind {
    // score header
    ScorePartwise,
    Work,
    WorkNumber,
    WorkTitle,
    MovementNumber,
    MovementTitle,
    Identification,
    Creator,
    Rights,
    Encoding,
    Software,
    EncodingDate,
    Defaults,
    Scaling,
    Millimeters,
    Tenths,
    PageLayout,
    PageHeight,
    PageWidth,
    PageMargins,
    LeftMargin,
    RightMargin,
    TopMargin,
    BottomMargin,
    StaffLayout,
    StaffDistance,
    Credit,
    CreditWords,

    // part list
    PartList,
    PartGroup,
    GroupName,
    GroupAbbreviation,
    GroupSymbol,
    GroupBarline,
    ScorePart,
    PartName,
    PartAbbreviation,
    ScoreInstrument,
    InstrumentName,
    InstrumentAbbreviation,

    // parts and measures
    Part,
    Measure,
    Print,
    Attributes,
    Divisions,
    Key,
    Cancel,
    Fifths,
    Mode,
    Time,
    Beats,
    BeatType,
    SenzaMisura,
    Staves,
    Clef,
    Sign,
    Line,
    ClefOctaveChange,
    StaffDetails,
    StaffLines,
    StaffTuning,
    TuningStep,
    TuningAlter,
    TuningOctave,
    Transpose,
    Diatonic,
    Chromatic,
    OctaveChange,
    Double,
    MeasureStyle,
    MultipleRest,
    MeasureRepeat,

    // notes
    Note,
    Grace,
    Cue,
    Chord,
    Pitch,
    Step,
    Alter,
    Octave,
    Unpitched,
    DisplayStep,
    DisplayOctave,
    Rest,
    Duration,
    Tie,
    Voice,
    Type,
    Dot,
    Accidental,
    TimeModification,
    ActualNotes,
    NormalNotes,
    Stem,
    Notehead,
    Staff,
    Beam,
    Notations,
    Tied,
    Slur,
    Tuplet,
    Glissando,
    Slide,
    Ornaments,
    TrillMark,
    Turn,
    InvertedTurn,
    Mordent,
    InvertedMordent,
    Tremolo,
    WavyLine,
    Technical,
    UpBow,
    DownBow,
    Harmonic,
    OpenString,
    ThumbPosition,
    Fingering,
    StringNumber,
    Fret,
    Pluck,
    SnapPizzicato,
    Articulations,
    Accent,
    StrongAccent,
    Staccato,
    Tenuto,
    DetachedLegato,
    Staccatissimo,
    Spiccato,
    BreathMark,
    Caesura,
    Fermata,
    Arpeggiate,
    NonArpeggiate,
    Lyric,
    Syllabic,
    Text,
    Elision,
    Extend,

    // voice and position bookkeeping
    Backup,
    Forward,

    // directions
    Direction,
    DirectionType,
    Offset,
    Words,
    Dynamics,
    Wedge,
    Metronome,
    BeatUnit,
    BeatUnitDot,
    PerMinute,
    Rehearsal,
    Segno,
    Coda,
    OctaveShift,
    Dashes,
    Sound,

    // harmonies and figured bass
    Harmony,
    Root,
    RootStep,
    RootAlter,
    Kind,
    Inversion,
    Bass,
    BassStep,
    BassAlter,
    Degree,
    DegreeValue,
    DegreeAlter,
    DegreeType,
    FiguredBass,
    Figure,
    Prefix,
    FigureNumber,
    Suffix,

    // barlines
    Barline,
    BarStyle,
    Repeat,
    Ending,

    /// Any element without a dedicated kind
    Other(String),
}

impl ElementKind {
    /// Map a MusicXML tag name to its kind
    pub fn from_name(name: &str) -> Self {
        use ElementKind::*;

        match name {
            "score-partwise" => ScorePartwise,
            "work" => Work,
            "work-number" => WorkNumber,
            "work-title" => WorkTitle,
            "movement-number" => MovementNumber,
            "movement-title" => MovementTitle,
            "identification" => Identification,
            "creator" => Creator,
            "rights" => Rights,
            "encoding" => Encoding,
            "software" => Software,
            "encoding-date" => EncodingDate,
            "defaults" => Defaults,
            "scaling" => Scaling,
            "millimeters" => Millimeters,
            "tenths" => Tenths,
            "page-layout" => PageLayout,
            "page-height" => PageHeight,
            "page-width" => PageWidth,
            "page-margins" => PageMargins,
            "left-margin" => LeftMargin,
            "right-margin" => RightMargin,
            "top-margin" => TopMargin,
            "bottom-margin" => BottomMargin,
            "staff-layout" => StaffLayout,
            "staff-distance" => StaffDistance,
            "credit" => Credit,
            "credit-words" => CreditWords,

            "part-list" => PartList,
            "part-group" => PartGroup,
            "group-name" => GroupName,
            "group-abbreviation" => GroupAbbreviation,
            "group-symbol" => GroupSymbol,
            "group-barline" => GroupBarline,
            "score-part" => ScorePart,
            "part-name" => PartName,
            "part-abbreviation" => PartAbbreviation,
            "score-instrument" => ScoreInstrument,
            "instrument-name" => InstrumentName,
            "instrument-abbreviation" => InstrumentAbbreviation,

            "part" => Part,
            "measure" => Measure,
            "print" => Print,
            "attributes" => Attributes,
            "divisions" => Divisions,
            "key" => Key,
            "cancel" => Cancel,
            "fifths" => Fifths,
            "mode" => Mode,
            "time" => Time,
            "beats" => Beats,
            "beat-type" => BeatType,
            "senza-misura" => SenzaMisura,
            "staves" => Staves,
            "clef" => Clef,
            "sign" => Sign,
            "line" => Line,
            "clef-octave-change" => ClefOctaveChange,
            "staff-details" => StaffDetails,
            "staff-lines" => StaffLines,
            "staff-tuning" => StaffTuning,
            "tuning-step" => TuningStep,
            "tuning-alter" => TuningAlter,
            "tuning-octave" => TuningOctave,
            "transpose" => Transpose,
            "diatonic" => Diatonic,
            "chromatic" => Chromatic,
            "octave-change" => OctaveChange,
            "double" => Double,
            "measure-style" => MeasureStyle,
            "multiple-rest" => MultipleRest,
            "measure-repeat" => MeasureRepeat,

            "note" => Note,
            "grace" => Grace,
            "cue" => Cue,
            "chord" => Chord,
            "pitch" => Pitch,
            "step" => Step,
            "alter" => Alter,
            "octave" => Octave,
            "unpitched" => Unpitched,
            "display-step" => DisplayStep,
            "display-octave" => DisplayOctave,
            "rest" => Rest,
            "duration" => Duration,
            "tie" => Tie,
            "voice" => Voice,
            "type" => Type,
            "dot" => Dot,
            "accidental" => Accidental,
            "time-modification" => TimeModification,
            "actual-notes" => ActualNotes,
            "normal-notes" => NormalNotes,
            "stem" => Stem,
            "notehead" => Notehead,
            "staff" => Staff,
            "beam" => Beam,
            "notations" => Notations,
            "tied" => Tied,
            "slur" => Slur,
            "tuplet" => Tuplet,
            "glissando" => Glissando,
            "slide" => Slide,
            "ornaments" => Ornaments,
            "trill-mark" => TrillMark,
            "turn" => Turn,
            "inverted-turn" => InvertedTurn,
            "mordent" => Mordent,
            "inverted-mordent" => InvertedMordent,
            "tremolo" => Tremolo,
            "wavy-line" => WavyLine,
            "technical" => Technical,
            "up-bow" => UpBow,
            "down-bow" => DownBow,
            "harmonic" => Harmonic,
            "open-string" => OpenString,
            "thumb-position" => ThumbPosition,
            "fingering" => Fingering,
            "string" => StringNumber,
            "fret" => Fret,
            "pluck" => Pluck,
            "snap-pizzicato" => SnapPizzicato,
            "articulations" => Articulations,
            "accent" => Accent,
            "strong-accent" => StrongAccent,
            "staccato" => Staccato,
            "tenuto" => Tenuto,
            "detached-legato" => DetachedLegato,
            "staccatissimo" => Staccatissimo,
            "spiccato" => Spiccato,
            "breath-mark" => BreathMark,
            "caesura" => Caesura,
            "fermata" => Fermata,
            "arpeggiate" => Arpeggiate,
            "non-arpeggiate" => NonArpeggiate,
            "lyric" => Lyric,
            "syllabic" => Syllabic,
            "text" => Text,
            "elision" => Elision,
            "extend" => Extend,

            "backup" => Backup,
            "forward" => Forward,

            "direction" => Direction,
            "direction-type" => DirectionType,
            "offset" => Offset,
            "words" => Words,
            "dynamics" => Dynamics,
            "wedge" => Wedge,
            "metronome" => Metronome,
            "beat-unit" => BeatUnit,
            "beat-unit-dot" => BeatUnitDot,
            "per-minute" => PerMinute,
            "rehearsal" => Rehearsal,
            "segno" => Segno,
            "coda" => Coda,
            "octave-shift" => OctaveShift,
            "dashes" => Dashes,
            "sound" => Sound,

            "harmony" => Harmony,
            "root" => Root,
            "root-step" => RootStep,
            "root-alter" => RootAlter,
            "kind" => Kind,
            "inversion" => Inversion,
            "bass" => Bass,
            "bass-step" => BassStep,
            "bass-alter" => BassAlter,
            "degree" => Degree,
            "degree-value" => DegreeValue,
            "degree-alter" => DegreeAlter,
            "degree-type" => DegreeType,
            "figured-bass" => FiguredBass,
            "figure" => Figure,
            "prefix" => Prefix,
            "figure-number" => FigureNumber,
            "suffix" => Suffix,

            "barline" => Barline,
            "bar-style" => BarStyle,
            "repeat" => Repeat,
            "ending" => Ending,

            other => Other(other.to_string()),
        }
    }
}

// ============================================================================
// ELEMENT
// ============================================================================

/// One node of the MusicXML element tree
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    name: String,
    kind: ElementKind,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<XmlElement>,
    line: u32,
}

impl XmlElement {
    pub fn new(name: &str, line: u32) -> Self {
        Self {
            name: name.to_string(),
            kind: ElementKind::from_name(name),
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
            line,
        }
    }

    /// Builder-style attribute setter
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    /// Builder-style text setter
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    /// Builder-style child appender
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    pub(crate) fn push_child(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    pub(crate) fn push_attribute(&mut self, name: &str, value: &str) {
        self.attributes.push((name.to_string(), value.to_string()));
    }

    pub(crate) fn append_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn is(&self, kind: &ElementKind) -> bool {
        &self.kind == kind
    }

    /// Input line number of the start tag
    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    /// Trimmed text content
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    // ------------------------------------------------------------------------
    // attributes
    // ------------------------------------------------------------------------

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value, or "" when absent
    pub fn attribute_value(&self, name: &str) -> &str {
        self.attribute(name).unwrap_or("")
    }

    pub fn attribute_int(&self, name: &str, default: i32) -> i32 {
        self.attribute(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn attribute_float(&self, name: &str, default: f32) -> f32 {
        self.attribute(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// `yes`/`no` attribute
    pub fn attribute_yes_no(&self, name: &str, default: bool) -> bool {
        match self.attribute(name) {
            Some("yes") => true,
            Some("no") => false,
            _ => default,
        }
    }

    // ------------------------------------------------------------------------
    // values
    // ------------------------------------------------------------------------

    pub fn int_value(&self, default: i32) -> i32 {
        self.text().parse().unwrap_or(default)
    }

    pub fn float_value(&self, default: f32) -> f32 {
        self.text().parse().unwrap_or(default)
    }

    // ------------------------------------------------------------------------
    // children
    // ------------------------------------------------------------------------

    /// First child of the given kind
    pub fn child(&self, kind: &ElementKind) -> Option<&XmlElement> {
        self.children.iter().find(|c| &c.kind == kind)
    }

    /// All children of the given kind, in document order
    pub fn children_of<'a>(&'a self, kind: &ElementKind) -> impl Iterator<Item = &'a XmlElement> + 'a {
        let kind = kind.clone();
        self.children.iter().filter(move |c| c.kind == kind)
    }

    pub fn has_child(&self, kind: &ElementKind) -> bool {
        self.child(kind).is_some()
    }

    /// Text of the first child of the given kind, or ""
    pub fn child_value(&self, kind: &ElementKind) -> &str {
        self.child(kind).map(|c| c.text()).unwrap_or("")
    }

    /// Text of the first child of the given kind, if present and non-empty
    pub fn child_text(&self, kind: &ElementKind) -> Option<&str> {
        self.child(kind).map(|c| c.text()).filter(|t| !t.is_empty())
    }

    pub fn child_int_value(&self, kind: &ElementKind, default: i32) -> i32 {
        self.child(kind).map(|c| c.int_value(default)).unwrap_or(default)
    }

    pub fn child_float_value(&self, kind: &ElementKind, default: f32) -> f32 {
        self.child(kind).map(|c| c.float_value(default)).unwrap_or(default)
    }

    /// Depth-first search for the first descendant of the given kind
    pub fn find(&self, kind: &ElementKind) -> Option<&XmlElement> {
        for child in &self.children {
            if &child.kind == kind {
                return Some(child);
            }
            if let Some(found) = child.find(kind) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants of the given kind, depth-first
    pub fn find_all<'a>(&'a self, kind: &ElementKind, out: &mut Vec<&'a XmlElement>) {
        for child in &self.children {
            if &child.kind == kind {
                out.push(child);
            }
            child.find_all(kind, out);
        }
    }
}

impl fmt::Display for XmlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> (line {})", self.name, self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_clef() -> XmlElement {
        XmlElement::new("clef", 7)
            .with_attribute("number", "2")
            .with_child(XmlElement::new("sign", 8).with_text(" F "))
            .with_child(XmlElement::new("line", 9).with_text("4"))
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(ElementKind::from_name("clef-octave-change"), ElementKind::ClefOctaveChange);
        assert_eq!(ElementKind::from_name("string"), ElementKind::StringNumber);
        assert_eq!(
            ElementKind::from_name("foo-bar"),
            ElementKind::Other("foo-bar".to_string())
        );
    }

    #[test]
    fn test_typed_lookups() {
        let clef = sample_clef();
        assert_eq!(clef.attribute_int("number", 1), 2);
        assert_eq!(clef.attribute_int("missing", 1), 1);
        assert_eq!(clef.child_value(&ElementKind::Sign), "F", "text should be trimmed");
        assert_eq!(clef.child_int_value(&ElementKind::Line, 0), 4);
        assert_eq!(clef.child_int_value(&ElementKind::ClefOctaveChange, 0), 0);
        assert_eq!(clef.line(), 7);
    }

    #[test]
    fn test_find_descendant() {
        let attributes = XmlElement::new("attributes", 3).with_child(sample_clef());
        let line = attributes.find(&ElementKind::Line).unwrap();
        assert_eq!(line.line(), 9);

        let mut signs = Vec::new();
        attributes.find_all(&ElementKind::Sign, &mut signs);
        assert_eq!(signs.len(), 1);
    }
}

//! The CSSD structural alphabet.
//!
//! Each symbol class is a string of one or more single-byte *instances*;
//! distinct instances of the same class denote independently-nested
//! substructures of that kind. Open/close classes pair their instances 1:1
//! by index (`[` closes with `]`, `{` with `}`).
//!
//! A separate, smaller "neutral" set is used when a compiled model is
//! serialized back to text: helix and multi boundaries collapse onto one
//! open/close pair, and every plain residue collapses onto the unknown
//! residue symbol.

use once_cell::sync::Lazy;

/// Residue outside any substructure.
pub const S_UNSTRUCTURED_RESIDUE: &str = ":";
/// Multibranch junction boundaries.
pub const S_OPEN_MULTI: &str = "(";
pub const S_CLOSE_MULTI: &str = ")";
/// Helix (stem) boundaries.
pub const S_OPEN_HELIX: &str = "<";
pub const S_CLOSE_HELIX: &str = ">";
/// Pseudoknot endpoints; instances pair by index.
pub const S_OPEN_PK: &str = "[{";
pub const S_CLOSE_PK: &str = "]}";
/// Loop residues by context.
pub const S_HAIRPIN_RESIDUE: &str = "_";
pub const S_MULTI_RESIDUE: &str = ",";
pub const S_INTERIOR_RESIDUE: &str = "-";
/// Base triple contacts: two paired positions and one single position.
pub const S_BASE_TRIPLE_SINGLE: &str = ".";
pub const S_BASE_TRIPLE_PAIR: &str = "~";
/// The first byte (space) is what overlays are padded with.
pub const S_WHITE_SPACE: &str = " \t\r\n";

/// Neutral symbols for serialized model output.
pub const NEUTRAL_UNKNOWN: u8 = b'_';
pub const NEUTRAL_OPEN: u8 = b'<';
pub const NEUTRAL_CLOSE: u8 = b'>';
pub const NEUTRAL_OPEN_PK: u8 = b'[';
pub const NEUTRAL_CLOSE_PK: u8 = b']';
pub const NEUTRAL_BT_PAIR: u8 = b'~';
pub const NEUTRAL_BT_SINGLE: u8 = b'.';

/// Overlay padding byte.
pub const PAD: u8 = b' ';

/// Largest value a positional-variable marker can encode.
pub const MAX_POS_VAR: u8 = 35;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolClass {
    Unstructured,
    OpenMulti,
    CloseMulti,
    OpenHelix,
    CloseHelix,
    OpenPk,
    ClosePk,
    HairpinResidue,
    MultiResidue,
    InteriorResidue,
    BaseTripleSingle,
    BaseTriplePair,
    Whitespace,
}

impl SymbolClass {
    pub const ALL: [SymbolClass; 13] = [
        SymbolClass::Unstructured,
        SymbolClass::OpenMulti,
        SymbolClass::CloseMulti,
        SymbolClass::OpenHelix,
        SymbolClass::CloseHelix,
        SymbolClass::OpenPk,
        SymbolClass::ClosePk,
        SymbolClass::HairpinResidue,
        SymbolClass::MultiResidue,
        SymbolClass::InteriorResidue,
        SymbolClass::BaseTripleSingle,
        SymbolClass::BaseTriplePair,
        SymbolClass::Whitespace,
    ];

    /// The instance string of this class.
    pub fn chars(self) -> &'static str {
        match self {
            SymbolClass::Unstructured => S_UNSTRUCTURED_RESIDUE,
            SymbolClass::OpenMulti => S_OPEN_MULTI,
            SymbolClass::CloseMulti => S_CLOSE_MULTI,
            SymbolClass::OpenHelix => S_OPEN_HELIX,
            SymbolClass::CloseHelix => S_CLOSE_HELIX,
            SymbolClass::OpenPk => S_OPEN_PK,
            SymbolClass::ClosePk => S_CLOSE_PK,
            SymbolClass::HairpinResidue => S_HAIRPIN_RESIDUE,
            SymbolClass::MultiResidue => S_MULTI_RESIDUE,
            SymbolClass::InteriorResidue => S_INTERIOR_RESIDUE,
            SymbolClass::BaseTripleSingle => S_BASE_TRIPLE_SINGLE,
            SymbolClass::BaseTriplePair => S_BASE_TRIPLE_PAIR,
            SymbolClass::Whitespace => S_WHITE_SPACE,
        }
    }

    /// Number of instances defined for this class.
    pub fn instance_count(self) -> usize {
        self.chars().len()
    }

    /// Instance byte at index `i`. Panics on an out-of-range instance.
    pub fn instance(self, i: usize) -> u8 {
        self.chars().as_bytes()[i]
    }
}

/// A classified byte: its class and the instance index within the class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub class: SymbolClass,
    pub instance: usize,
}

static SYMBOL_TABLE: Lazy<[Option<Symbol>; 128]> = Lazy::new(|| {
    let mut table = [None; 128];
    for class in SymbolClass::ALL {
        for (instance, b) in class.chars().bytes().enumerate() {
            debug_assert!(table[b as usize].is_none());
            table[b as usize] = Some(Symbol { class, instance });
        }
    }
    table
});

/// Classify a byte against the structural alphabet.
pub fn classify(b: u8) -> Option<Symbol> {
    if b < 128 {
        SYMBOL_TABLE[b as usize]
    } else {
        None
    }
}

/// The class of a byte, if any.
pub fn class_of(b: u8) -> Option<SymbolClass> {
    classify(b).map(|s| s.class)
}

/// Does `b` belong to symbol class `class`?
pub fn is_class(b: u8, class: SymbolClass) -> bool {
    class_of(b) == Some(class)
}

/// Overlay padding / whitespace test.
pub fn is_pad(b: u8) -> bool {
    is_class(b, SymbolClass::Whitespace)
}

/// The two paired-boundary kinds, sharing open/close mechanics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    Multi,
    Helix,
}

impl BoundaryKind {
    pub fn open(self) -> SymbolClass {
        match self {
            BoundaryKind::Multi => SymbolClass::OpenMulti,
            BoundaryKind::Helix => SymbolClass::OpenHelix,
        }
    }

    pub fn close(self) -> SymbolClass {
        match self {
            BoundaryKind::Multi => SymbolClass::CloseMulti,
            BoundaryKind::Helix => SymbolClass::CloseHelix,
        }
    }

    /// Name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            BoundaryKind::Multi => "MULTI",
            BoundaryKind::Helix => "HELIX",
        }
    }
}

/// Decode a positional-variable marker byte. `1`-`9` encode 1-9, `a`-`z`
/// encode 10-35; everything else (including `0`) is not a marker.
pub fn marker_value(b: u8) -> Option<u8> {
    let v = match b {
        b'1'..=b'9' => b - b'0',
        b'a'..=b'z' => b - b'a' + 10,
        _ => return None,
    };
    (v <= MAX_POS_VAR).then_some(v)
}

/// Encode a positional-variable value back into its marker byte. Zero has
/// no marker (absence means zero).
pub fn marker_char(v: u8) -> Option<u8> {
    match v {
        1..=9 => Some(b'0' + v),
        10..=MAX_POS_VAR => Some(b'a' + v - 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_all_instances() {
        for class in SymbolClass::ALL {
            for (i, b) in class.chars().bytes().enumerate() {
                assert_eq!(classify(b), Some(Symbol { class, instance: i }));
            }
        }
        assert_eq!(classify(b'x'), None);
        assert_eq!(classify(b'0'), None);
    }

    #[test]
    fn test_pk_instances_pair_by_index() {
        assert_eq!(SymbolClass::OpenPk.instance_count(), SymbolClass::ClosePk.instance_count());
        assert_eq!(SymbolClass::OpenPk.instance(0), b'[');
        assert_eq!(SymbolClass::ClosePk.instance(0), b']');
        assert_eq!(SymbolClass::OpenPk.instance(1), b'{');
        assert_eq!(SymbolClass::ClosePk.instance(1), b'}');
    }

    #[test]
    fn test_marker_codec() {
        assert_eq!(marker_value(b'1'), Some(1));
        assert_eq!(marker_value(b'9'), Some(9));
        assert_eq!(marker_value(b'a'), Some(10));
        assert_eq!(marker_value(b'z'), Some(35));
        assert_eq!(marker_value(b'0'), None);
        assert_eq!(marker_value(b'A'), None);
        for v in 1..=MAX_POS_VAR {
            assert_eq!(marker_value(marker_char(v).unwrap()), Some(v));
        }
        assert_eq!(marker_char(0), None);
        assert_eq!(marker_char(MAX_POS_VAR + 1), None);
    }

    #[test]
    fn test_pad() {
        assert!(is_pad(b' '));
        assert!(is_pad(b'\t'));
        assert!(!is_pad(b':'));
    }
}

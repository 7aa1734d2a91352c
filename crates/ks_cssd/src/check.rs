//! Round-trip self-verification.
//!
//! After a build, the model can be re-serialized and compared against the
//! original input to catch validator/builder disagreement. The comparison is
//! advisory: it never raises, it answers true or false and logs what went
//! wrong at debug level.
//!
//! Serialized output is neutral, so the comparison runs under symbol-class
//! equivalence: any plain residue matches the unknown symbol, helix and
//! multi boundaries both match the neutral boundary symbols, and pseudoknot
//! and base-triple symbols match only their own classes. Markers are matched
//! position-independently along equivalent symbols, because a multibranch
//! build may shift a marker within its run.

use log::debug;

use ks_structure::Model;
use ks_structure::NEUTRAL_BT_PAIR;
use ks_structure::NEUTRAL_BT_SINGLE;
use ks_structure::NEUTRAL_CLOSE;
use ks_structure::NEUTRAL_CLOSE_PK;
use ks_structure::NEUTRAL_OPEN;
use ks_structure::NEUTRAL_OPEN_PK;
use ks_structure::NEUTRAL_UNKNOWN;
use ks_structure::PAD;
use ks_structure::SymbolClass;
use ks_structure::class_of;
use ks_structure::marker_value;

use crate::serialize::serialize;

/// Does the input symbol fall into the equivalence class of the neutral
/// serialized symbol?
fn symbols_equivalent(input: u8, neutral: u8) -> bool {
    let Some(class) = class_of(input) else {
        return false;
    };
    match neutral {
        NEUTRAL_UNKNOWN => matches!(
            class,
            SymbolClass::Unstructured
                | SymbolClass::HairpinResidue
                | SymbolClass::MultiResidue
                | SymbolClass::InteriorResidue
        ),
        NEUTRAL_OPEN => matches!(class, SymbolClass::OpenHelix | SymbolClass::OpenMulti),
        NEUTRAL_CLOSE => matches!(class, SymbolClass::CloseHelix | SymbolClass::CloseMulti),
        NEUTRAL_OPEN_PK => class == SymbolClass::OpenPk,
        NEUTRAL_CLOSE_PK => class == SymbolClass::ClosePk,
        NEUTRAL_BT_PAIR => class == SymbolClass::BaseTriplePair,
        NEUTRAL_BT_SINGLE => class == SymbolClass::BaseTripleSingle,
        _ => false,
    }
}

/// Compare a model against the input it was built from.
pub fn check(cssd: &str, pos_var: &str, model: &Model) -> bool {
    if cssd.is_empty() {
        debug!("input CSSD string is empty in check");
        return false;
    }

    let (model_string, model_pos_var) = match serialize(model) {
        Ok(strings) => strings,
        Err(err) => {
            debug!("could not stringify model in check: {err}");
            return false;
        }
    };

    let cs = cssd.as_bytes();
    let ms = model_string.as_bytes();
    if cs.len() != ms.len() {
        debug!("input CSSD and stringified model have different lengths");
        return false;
    }

    for (i, (&a, &b)) in cs.iter().zip(ms.iter()).enumerate() {
        if !symbols_equivalent(a, b) {
            debug!(
                "input symbol '{}' and stringified '{}' differ at position {}",
                a as char,
                b as char,
                i + 1
            );
            return false;
        }
    }

    if !pos_var.is_empty() {
        let pv = pos_var.as_bytes();
        let mq = model_pos_var.as_bytes();

        // match markers in order, scanning the serialized overlay forward
        // from the last matched position
        let mut from = 0usize;
        for i in 0..pv.len() {
            if marker_value(pv[i]).is_none() {
                continue;
            }
            if i >= cs.len() {
                debug!("marker beyond the end of the input CSSD");
                return false;
            }
            let mut mismatch = false;
            for j in from..mq.len() {
                if marker_value(mq[j]).is_none() {
                    continue;
                }
                if !symbols_equivalent(cs[i], ms[j]) {
                    debug!(
                        "markers at input position {} and stringified position {} are displaced",
                        i + 1,
                        j + 1
                    );
                    mismatch = true;
                } else if pv[i] != mq[j] {
                    debug!(
                        "markers \"{}\" (input position {}) and \"{}\" (stringified position {}) differ",
                        pv[i] as char,
                        i + 1,
                        mq[j] as char,
                        j + 1
                    );
                    mismatch = true;
                } else {
                    from = j + 1;
                }
                break;
            }
            if mismatch {
                return false;
            }
        }

        // stringified-only marker slots past the input overlay must be blank
        for &b in mq.iter().skip(pv.len()) {
            if b != PAD {
                debug!("extraneous marker in stringified overlay");
                return false;
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::build;

    fn round_trips(cssd: &str, pos_var: &str) -> bool {
        let model = build(cssd, pos_var).unwrap();
        check(cssd, pos_var, &model)
    }

    #[test]
    fn test_round_trip_law() {
        assert!(round_trips("<<<___>>>", ""));
        assert!(round_trips("<<___>->", "a"));
        assert!(round_trips("((,<<___>>,<<<___>>>,))", ""));
        assert!(round_trips("<<<__[[__>>>:::]]", ""));
        assert!(round_trips("[[[:::<<<___>>>:::]]]", "1"));
        assert!(round_trips("~:::.:::~", ""));
        assert!(round_trips("((,<<-<___>->>,[[,<<<___>>>,]],))", ""));
        assert!(round_trips(":::::", "5"));
    }

    #[test]
    fn test_displaced_marker_still_matches() {
        // canonical serialization moves the marker to the run's first column
        let model = build("<<___>>", " 1").unwrap();
        assert!(check("<<___>>", " 1", &model));
    }

    #[test]
    fn test_length_mismatch_fails() {
        let model = build("<<<<___>>>>", "").unwrap();
        assert!(!check("<<<___>>>", "", &model));
    }

    #[test]
    fn test_symbol_mismatch_fails() {
        let model = build("<<<___>>>", "").unwrap();
        assert!(!check("[[[___]]]", "", &model));
    }

    #[test]
    fn test_marker_value_mismatch_fails() {
        let model = build("<<<___>>>", "1").unwrap();
        assert!(!check("<<<___>>>", "2", &model));
    }

    #[test]
    fn test_extraneous_model_marker_fails() {
        // the model carries a marker past the end of the input overlay
        let model = build("<<<___>>>", "   1").unwrap();
        assert!(!check("<<<___>>>", " ", &model));
    }

    #[test]
    fn test_empty_overlay_skips_marker_comparison() {
        let model = build("<<<___>>>", "1").unwrap();
        assert!(check("<<<___>>>", "", &model));
    }

    #[test]
    fn test_equivalence_relation() {
        assert!(symbols_equivalent(b':', NEUTRAL_UNKNOWN));
        assert!(symbols_equivalent(b'-', NEUTRAL_UNKNOWN));
        assert!(symbols_equivalent(b',', NEUTRAL_UNKNOWN));
        assert!(symbols_equivalent(b'_', NEUTRAL_UNKNOWN));
        assert!(symbols_equivalent(b'(', NEUTRAL_OPEN));
        assert!(symbols_equivalent(b'<', NEUTRAL_OPEN));
        assert!(symbols_equivalent(b')', NEUTRAL_CLOSE));
        assert!(!symbols_equivalent(b'[', NEUTRAL_UNKNOWN));
        assert!(symbols_equivalent(b'{', NEUTRAL_OPEN_PK));
        assert!(symbols_equivalent(b'~', NEUTRAL_BT_PAIR));
        assert!(!symbols_equivalent(b'~', NEUTRAL_BT_SINGLE));
    }
}

//! Model serialization back to CSSD text.
//!
//! Serialization emits the *neutral* symbol set: every paired element
//! becomes open/close boundary symbols (the helix/multi distinction is not
//! recorded in the model), every plain residue run becomes the unknown
//! residue symbol, and constraint placeholders emit their pseudoknot or
//! base-triple symbols. A run with `min != max` carries the marker for
//! `max - min` on its first overlay position; the 3' side of a pseudoknot
//! shares its width with the 5' side and stays unmarked, as does the close
//! strand of a helix, so that re-reading the text yields the same bounds.

use ks_structure::Constraint;
use ks_structure::ConstraintSide;
use ks_structure::ECOUNT;
use ks_structure::Element;
use ks_structure::ElementId;
use ks_structure::MAX_MODEL_STRING_LEN;
use ks_structure::Model;
use ks_structure::NEUTRAL_BT_PAIR;
use ks_structure::NEUTRAL_BT_SINGLE;
use ks_structure::NEUTRAL_CLOSE;
use ks_structure::NEUTRAL_CLOSE_PK;
use ks_structure::NEUTRAL_OPEN;
use ks_structure::NEUTRAL_OPEN_PK;
use ks_structure::NEUTRAL_UNKNOWN;
use ks_structure::PAD;
use ks_structure::marker_char;

use crate::error::CssdError;

/// Serialize a model into its neutral CSSD text and overlay.
pub fn serialize(model: &Model) -> Result<(String, String), CssdError> {
    let Some(first) = model.first_element() else {
        return Err(CssdError::Input("cannot stringify a NULL or empty model".into()));
    };

    let mut ss = Vec::new();
    let mut pv = Vec::new();
    write_element(model, first, &mut ss, &mut pv)?;

    if ss.is_empty() {
        return Err(CssdError::Input("model stringified to an empty CSSD".into()));
    }
    if ss.len() > MAX_MODEL_STRING_LEN {
        return Err(CssdError::Capacity(format!(
            "stringified model exceeds {MAX_MODEL_STRING_LEN} characters"
        )));
    }

    let ss = String::from_utf8(ss)
        .map_err(|_| CssdError::Inconsistency("non-ASCII bytes in stringified model".into()))?;
    let pv = String::from_utf8(pv)
        .map_err(|_| CssdError::Inconsistency("non-ASCII bytes in stringified overlay".into()))?;
    Ok((ss, pv))
}

fn write_marker(pv: &mut [u8], at: usize, marker: u8) -> Result<(), CssdError> {
    match pv.get_mut(at) {
        Some(slot) => {
            *slot = marker;
            Ok(())
        }
        None => Err(CssdError::Inconsistency(
            "stretch marker on a zero-width run".into(),
        )),
    }
}

fn run_marker(min: ECOUNT, max: ECOUNT) -> Result<Option<u8>, CssdError> {
    if min == max {
        return Ok(None);
    }
    marker_char(max - min).map(Some).ok_or_else(|| {
        CssdError::Inconsistency(format!(
            "element stretch {} has no marker symbol",
            max - min
        ))
    })
}

fn write_element(
    model: &Model,
    id: ElementId,
    ss: &mut Vec<u8>,
    pv: &mut Vec<u8>,
) -> Result<(), CssdError> {
    match model.element(id) {
        Element::Unpaired(u) => {
            let symbol = match u.constraint {
                None => NEUTRAL_UNKNOWN,
                Some((cid, side)) => match model.constraint(cid) {
                    Constraint::Pseudoknot(_) => match side {
                        ConstraintSide::FivePrime => NEUTRAL_OPEN_PK,
                        _ => NEUTRAL_CLOSE_PK,
                    },
                    Constraint::BaseTriple(_) => match side {
                        ConstraintSide::Single => NEUTRAL_BT_SINGLE,
                        _ => NEUTRAL_BT_PAIR,
                    },
                },
            };

            let start = ss.len();
            for _ in 0..u.min {
                ss.push(symbol);
                pv.push(PAD);
            }
            // the 3' pseudoknot endpoint mirrors the 5' one, so the marker
            // is written on the open side only
            if symbol == NEUTRAL_UNKNOWN || symbol == NEUTRAL_OPEN_PK {
                if let Some(marker) = run_marker(u.min, u.max)? {
                    write_marker(pv, start, marker)?;
                }
            }

            if let Some(next) = u.next {
                write_element(model, next, ss, pv)?;
            }
            Ok(())
        }

        Element::Paired(p) => {
            let start = ss.len();
            for _ in 0..p.min {
                ss.push(NEUTRAL_OPEN);
                pv.push(PAD);
            }
            if let Some(marker) = run_marker(p.min, p.max)? {
                write_marker(pv, start, marker)?;
            }

            let interior = p.fp_next.ok_or_else(|| {
                CssdError::Inconsistency("paired element without a 5' subtree".into())
            })?;
            write_element(model, interior, ss, pv)?;

            for _ in 0..p.min {
                ss.push(NEUTRAL_CLOSE);
                pv.push(PAD);
            }

            if let Some(trailing) = p.tp_next {
                write_element(model, trailing, ss, pv)?;
            }
            Ok(())
        }
    }
}

/// Join a CSSD and its overlay into the newline-separated storage form.
pub fn join_cssd(ss: &str, pos_var: &str) -> String {
    format!("{ss}\n{pos_var}")
}

/// Split the newline-separated storage form back into CSSD and overlay.
/// A blob without a newline has an empty overlay.
pub fn split_cssd(cssd: &str) -> (String, String) {
    match cssd.split_once('\n') {
        Some((ss, pos_var)) => (ss.to_string(), pos_var.to_string()),
        None => (cssd.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::build;
    use crate::validate::validate;

    #[test]
    fn test_serialize_hairpin_is_fixed_point() {
        let model = build("<<<___>>>", "").unwrap();
        let (ss, pv) = serialize(&model).unwrap();
        assert_eq!(ss, "<<<___>>>");
        assert_eq!(pv, " ".repeat(9));
        // already neutral, so the output re-validates
        assert!(validate(&ss, pv.trim_end()).is_ok());
    }

    #[test]
    fn test_serialize_collapses_to_neutral() {
        let model = build("((,<<___>>,))", "").unwrap();
        let (ss, _) = serialize(&model).unwrap();
        assert_eq!(ss, "<<_<<___>>_>>");
    }

    #[test]
    fn test_serialize_marker_on_first_open() {
        let model = build("<<___>->", "a").unwrap();
        let (ss, pv) = serialize(&model).unwrap();
        assert_eq!(ss, "<<___>_>");
        assert_eq!(pv, format!("a{}", " ".repeat(7)));
    }

    #[test]
    fn test_serialize_marker_skips_pk_close() {
        let model = build("[[[:::<<<___>>>:::]]]", "1").unwrap();
        let (ss, pv) = serialize(&model).unwrap();
        assert_eq!(ss, "[[[___<<<___>>>___]]]");
        assert_eq!(pv, format!("1{}", " ".repeat(20)));
    }

    #[test]
    fn test_serialize_base_triple() {
        let model = build("~:::.:::~", "").unwrap();
        let (ss, _) = serialize(&model).unwrap();
        assert_eq!(ss, "~___.___~");
    }

    #[test]
    fn test_serialize_empty_model_fails() {
        let model = ks_structure::Model::new();
        assert!(serialize(&model).is_err());
    }

    #[test]
    fn test_serialized_marker_reparses_to_same_bounds() {
        // the input marks the second open column; the canonical form moves
        // the marker to the first, with identical bounds on re-reading
        let model = build("<<___>>", " 1").unwrap();
        let (ss, pv) = serialize(&model).unwrap();
        assert_eq!(ss, "<<___>>");
        assert_eq!(pv, format!("1{}", " ".repeat(6)));
        let again = build(&ss, &pv).unwrap();
        let root = model.first_element().unwrap();
        let root2 = again.first_element().unwrap();
        assert_eq!(model.element(root), again.element(root2));
    }

    #[test]
    fn test_join_split_cssd() {
        let blob = join_cssd("<<<___>>>", "1");
        assert_eq!(blob, "<<<___>>>\n1");
        assert_eq!(split_cssd(&blob), ("<<<___>>>".into(), "1".into()));
        assert_eq!(split_cssd("<<<___>>>"), ("<<<___>>>".into(), String::new()));
    }
}

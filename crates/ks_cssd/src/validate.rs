//! CSSD grammar validation.
//!
//! Validation runs before any model is built and is the only component that
//! rejects user input. Checks run in a fixed order and stop at the first
//! failure: input bounds, overlay lexicality, per-instance symbol balance
//! (base-triple arity, multi/helix balance, pseudoknot balance/order/
//! contiguity), the full left-to-right structural walk, and finally
//! positional-variable placement.
//!
//! The builder assumes every property established here; anything it still
//! cannot handle afterwards is reported as an internal inconsistency, not as
//! a grammar error.

use log::debug;

use ks_structure::BoundaryKind;
use ks_structure::MAX_MODEL_STRING_LEN;
use ks_structure::SymbolClass;
use ks_structure::class_of;
use ks_structure::classify;
use ks_structure::is_class;
use ks_structure::is_pad;
use ks_structure::marker_value;

use crate::error::CssdError;

/// Validate a CSSD string and its positional-variable overlay.
///
/// The overlay may be empty or shorter than the CSSD; it may only be longer
/// by trailing whitespace.
pub fn validate(cssd: &str, pos_var: &str) -> Result<(), CssdError> {
    let cs = cssd.as_bytes();

    if cs.is_empty() {
        return Err(CssdError::Input("CSSD is empty".into()));
    }

    if cs.len() > MAX_MODEL_STRING_LEN {
        return Err(CssdError::Input(format!(
            "CSSD must be at most {MAX_MODEL_STRING_LEN} characters in length"
        )));
    }

    let pv = pos_var.as_bytes();
    overlay_lexical(cs, pv)?;
    triple_arity(cs)?;
    boundary_balance(cs, BoundaryKind::Multi)?;
    boundary_balance(cs, BoundaryKind::Helix)?;
    pk_symbol_rules(cs)?;
    structural_walk(cs)?;
    marker_placement(cs, pv)?;

    debug!("CSSD validated successfully");
    Ok(())
}

fn overlay_lexical(cs: &[u8], pv: &[u8]) -> Result<(), CssdError> {
    if pv.len() > cs.len() && pv[cs.len()..].iter().any(|&b| !is_pad(b)) {
        return Err(CssdError::Input(
            "pos_var has extra symbols after end of CSSD".into(),
        ));
    }

    for (i, &b) in pv.iter().enumerate() {
        if !is_pad(b) && marker_value(b).is_none() {
            return Err(CssdError::grammar_at(
                format!("invalid pos_var symbol \"{}\" at position {}", b as char, i + 1),
                i + 1,
            ));
        }
    }

    Ok(())
}

fn symbol_count(cs: &[u8], symbol: u8) -> usize {
    cs.iter().filter(|&&b| b == symbol).count()
}

fn paired_balance(cs: &[u8], open: u8, close: u8) -> i32 {
    let mut balance = 0;
    for &b in cs {
        if b == open {
            balance += 1;
        } else if b == close {
            balance -= 1;
        }
    }
    balance
}

/// First 0-based position where a close symbol precedes its open.
fn first_inversion(cs: &[u8], open: u8, close: u8) -> Option<usize> {
    let mut balance = 0i32;
    for (c, &b) in cs.iter().enumerate() {
        if b == open {
            balance += 1;
        } else if b == close {
            balance -= 1;
        }
        if balance < 0 {
            return Some(c);
        }
    }
    None
}

/// First 0-based position where the open (or close) occurrences of one
/// symbol stop being one contiguous run.
fn first_noncontig(cs: &[u8], open: u8, close: u8) -> Option<usize> {
    let mut open_seen = false;
    let mut close_seen = false;
    for (c, &b) in cs.iter().enumerate() {
        if b == open {
            if !open_seen {
                open_seen = true;
            } else if cs[c - 1] != open {
                return Some(c);
            }
        } else if b == close {
            if !close_seen {
                close_seen = true;
            } else if cs[c - 1] != close {
                return Some(c);
            }
        }
    }
    None
}

fn triple_arity(cs: &[u8]) -> Result<(), CssdError> {
    for a in 0..SymbolClass::BaseTriplePair.instance_count() {
        let pair = SymbolClass::BaseTriplePair.instance(a);
        let single = SymbolClass::BaseTripleSingle.instance(a);
        if !cs.contains(&pair) && !cs.contains(&single) {
            continue;
        }
        let pairs = symbol_count(cs, pair);
        if pairs != 2 {
            return Err(CssdError::grammar(format!(
                "BASE TRIPLE requires 2 paired symbols \"{0}{0}\" but found {1}",
                pair as char, pairs
            )));
        }
        let singles = symbol_count(cs, single);
        if singles != 1 {
            return Err(CssdError::grammar(format!(
                "BASE TRIPLE requires a single 'unpaired' symbol \"{}\" but found {}",
                single as char, singles
            )));
        }
    }
    Ok(())
}

fn boundary_balance(cs: &[u8], kind: BoundaryKind) -> Result<(), CssdError> {
    for a in 0..kind.open().instance_count() {
        let open = kind.open().instance(a);
        let close = kind.close().instance(a);
        if !cs.contains(&open) && !cs.contains(&close) {
            continue;
        }
        let balance = paired_balance(cs, open, close);
        if balance > 0 {
            return Err(CssdError::grammar(format!(
                "imbalanced number of {} symbols [{} more \"{}\" than \"{}\"]",
                kind.name(), balance, open as char, close as char
            )));
        } else if balance < 0 {
            return Err(CssdError::grammar(format!(
                "imbalanced number of {} symbols [{} less \"{}\" than \"{}\"]",
                kind.name(), -balance, open as char, close as char
            )));
        }
    }
    Ok(())
}

fn pk_symbol_rules(cs: &[u8]) -> Result<(), CssdError> {
    for a in 0..SymbolClass::OpenPk.instance_count() {
        let open = SymbolClass::OpenPk.instance(a);
        let close = SymbolClass::ClosePk.instance(a);
        if !cs.contains(&open) && !cs.contains(&close) {
            continue;
        }
        let balance = paired_balance(cs, open, close);
        if balance != 0 {
            let (n, rel) = if balance > 0 { (balance, "more") } else { (-balance, "less") };
            return Err(CssdError::grammar(format!(
                "imbalanced number of PK symbols [{n} {rel} \"{}\" than \"{}\"]",
                open as char, close as char
            )));
        }
        if let Some(c) = first_inversion(cs, open, close) {
            return Err(CssdError::grammar_at(
                format!(
                    "inverted order of PK symbols \"{}{}\" at position {}",
                    open as char, close as char, c + 1
                ),
                c + 1,
            ));
        }
        if let Some(c) = first_noncontig(cs, open, close) {
            return Err(CssdError::grammar_at(
                format!(
                    "multiple instances of PK symbol pairs \"{}{}\" at position {}",
                    open as char, close as char, c + 1
                ),
                c + 1,
            ));
        }
    }
    Ok(())
}

/// Bookkeeping for the left-to-right structural walk: per-instance open and
/// close counters, plus whether the cursor currently extends an opening or
/// closing boundary run and which boundary symbol it last saw. Pseudoknot
/// and base-triple symbols are transparent to all of it.
struct Walk {
    open_multi: Vec<usize>,
    close_multi: Vec<usize>,
    open_helix: Vec<usize>,
    close_helix: Vec<usize>,
    doing_multi: bool,
    doing_helix: bool,
    last_multi: Option<u8>,
    last_helix: Option<u8>,
}

impl Walk {
    fn new() -> Self {
        Walk {
            open_multi: vec![0; SymbolClass::OpenMulti.instance_count()],
            close_multi: vec![0; SymbolClass::OpenMulti.instance_count()],
            open_helix: vec![0; SymbolClass::OpenHelix.instance_count()],
            close_helix: vec![0; SymbolClass::OpenHelix.instance_count()],
            doing_multi: false,
            doing_helix: false,
            last_multi: None,
            last_helix: None,
        }
    }

    fn clear_multi(&mut self) {
        self.doing_multi = false;
        self.last_multi = None;
    }

    fn clear_helix(&mut self) {
        self.doing_helix = false;
        self.last_helix = None;
    }

    fn multi_pair(&self, a: usize) -> (char, char) {
        (
            SymbolClass::OpenMulti.instance(a) as char,
            SymbolClass::CloseMulti.instance(a) as char,
        )
    }

    fn helix_pair(&self, a: usize) -> (char, char) {
        (
            SymbolClass::OpenHelix.instance(a) as char,
            SymbolClass::CloseHelix.instance(a) as char,
        )
    }
}

fn structural_walk(cs: &[u8]) -> Result<(), CssdError> {
    let mut w = Walk::new();

    for c in 0..cs.len() {
        let pos = c + 1;
        let Some(sym) = classify(cs[c]) else {
            return Err(CssdError::Input(format!(
                "unrecognized symbol {} at position {pos}",
                cs[c] as char
            )));
        };

        match sym.class {
            SymbolClass::Unstructured => {
                for a in 0..w.open_multi.len() {
                    if w.open_multi[a] > 0 {
                        let (o, x) = w.multi_pair(a);
                        return Err(CssdError::grammar_at(
                            format!(
                                "UNSTRUCTURED RESIDUE '{}' at position {pos} is within a MULTI \"{o}{x}\" substructure",
                                cs[c] as char
                            ),
                            pos,
                        ));
                    }
                }
                for a in 0..w.open_helix.len() {
                    if w.open_helix[a] > 0 {
                        let (o, x) = w.helix_pair(a);
                        return Err(CssdError::grammar_at(
                            format!(
                                "UNSTRUCTURED RESIDUE '{}' at position {pos} is within a HELIX \"{o}{x}\" substructure",
                                cs[c] as char
                            ),
                            pos,
                        ));
                    }
                }
                w.clear_multi();
                w.clear_helix();
            }

            SymbolClass::OpenMulti => {
                if !w.doing_multi {
                    for a in 0..w.open_multi.len() {
                        if w.open_multi[a] > 0 {
                            let (no, nx) = w.multi_pair(sym.instance);
                            let (o, x) = w.multi_pair(a);
                            return Err(CssdError::grammar_at(
                                format!(
                                    "MULTI substructure \"{no}{nx}\" at position {pos} is nested within a MULTI substructure \"{o}{x}\""
                                ),
                                pos,
                            ));
                        }
                    }
                    for a in 0..w.open_helix.len() {
                        if w.open_helix[a] > 0 {
                            let (no, nx) = w.multi_pair(sym.instance);
                            let (o, x) = w.helix_pair(a);
                            return Err(CssdError::grammar_at(
                                format!(
                                    "MULTI substructure \"{no}{nx}\" at position {pos} is nested within a HELIX substructure \"{o}{x}\""
                                ),
                                pos,
                            ));
                        }
                    }
                }
                w.doing_multi = true;
                w.last_multi = Some(cs[c]);
                w.clear_helix();
                w.open_multi[sym.instance] += 1;
            }

            SymbolClass::CloseMulti => {
                if !w.doing_multi && w.open_multi[sym.instance] == 0 {
                    let (o, _) = w.multi_pair(sym.instance);
                    return Err(CssdError::grammar_at(
                        format!(
                            "MULTI substructure \"{}\" at position {pos} has no corresponding opening symbol \"{o}\"",
                            cs[c] as char
                        ),
                        pos,
                    ));
                }
                w.clear_helix();
                w.close_multi[sym.instance] += 1;
                if w.close_multi[sym.instance] == w.open_multi[sym.instance] {
                    w.open_multi[sym.instance] = 0;
                    w.close_multi[sym.instance] = 0;
                    w.clear_multi();
                } else {
                    w.doing_multi = true;
                    w.last_multi = Some(cs[c]);
                }
            }

            SymbolClass::OpenHelix => {
                if !w.doing_helix {
                    for a in 0..w.open_multi.len() {
                        if w.open_multi[a] > 0 && w.close_multi[a] > 0 {
                            let (no, nx) = w.helix_pair(sym.instance);
                            let (o, x) = w.multi_pair(a);
                            return Err(CssdError::grammar_at(
                                format!(
                                    "HELIX substructure \"{no}{nx}\" at position {pos} is not at MULTIJUNCTION of MULTI substructure \"{o}{x}\""
                                ),
                                pos,
                            ));
                        }
                    }
                    for a in 0..w.open_helix.len() {
                        if w.open_helix[a] > 0 {
                            let (no, nx) = w.helix_pair(sym.instance);
                            let (o, x) = w.helix_pair(a);
                            return Err(CssdError::grammar_at(
                                format!(
                                    "HELIX substructure \"{no}{nx}\" at position {pos} is juxtaposed against HELIX substructure \"{o}{x}\""
                                ),
                                pos,
                            ));
                        }
                    }
                }
                w.clear_multi();
                w.doing_helix = true;
                w.last_helix = Some(cs[c]);
                w.open_helix[sym.instance] += 1;
            }

            SymbolClass::CloseHelix => {
                if !w.doing_helix && w.open_helix[sym.instance] == 0 {
                    let (o, _) = w.helix_pair(sym.instance);
                    return Err(CssdError::grammar_at(
                        format!(
                            "HELIX substructure \"{}\" at position {pos} has no corresponding opening symbol \"{o}\"",
                            cs[c] as char
                        ),
                        pos,
                    ));
                }
                w.clear_multi();
                w.close_helix[sym.instance] += 1;
                if w.close_helix[sym.instance] == w.open_helix[sym.instance] {
                    w.open_helix[sym.instance] = 0;
                    w.close_helix[sym.instance] = 0;
                    w.clear_helix();
                } else {
                    w.doing_helix = true;
                    w.last_helix = Some(cs[c]);
                }
            }

            SymbolClass::HairpinResidue => {
                let in_loop = (0..w.open_helix.len())
                    .any(|a| w.open_helix[a] > 0 && w.close_helix[a] == 0);
                if !in_loop {
                    return Err(CssdError::grammar_at(
                        format!(
                            "HAIRPIN RESIDUE '{}' at position {pos} is not within loop of a HELIX substructure",
                            cs[c] as char
                        ),
                        pos,
                    ));
                }
                w.clear_multi();
                w.clear_helix();
            }

            SymbolClass::MultiResidue => {
                let in_junction = (0..w.open_multi.len())
                    .any(|a| w.open_multi[a] > 0 && w.close_multi[a] == 0);
                if !in_junction {
                    return Err(CssdError::grammar_at(
                        format!(
                            "MULTI RESIDUE \"{}\" at position {pos} is not at MULTIJUNCTION of a MULTI substructure",
                            cs[c] as char
                        ),
                        pos,
                    ));
                }
                for a in 0..w.open_helix.len() {
                    if w.open_helix[a] > 0 {
                        let (o, x) = w.helix_pair(a);
                        return Err(CssdError::grammar_at(
                            format!(
                                "MULTI RESIDUE \"{}\" at position {pos} is juxtaposed against HELIX substructure \"{o}{x}\"",
                                cs[c] as char
                            ),
                            pos,
                        ));
                    }
                }
                w.clear_multi();
                w.clear_helix();
            }

            SymbolClass::InteriorResidue => {
                // a base-triple pair just before the residue stands in for
                // the boundary symbol, so adjacency needs no further check
                let after_bt_pair = c > 0 && is_class(cs[c - 1], SymbolClass::BaseTriplePair);
                if !after_bt_pair {
                    let illegal = if !w.doing_helix && !w.doing_multi {
                        true
                    } else if c + 1 >= cs.len() {
                        true
                    } else if is_class(cs[c + 1], SymbolClass::InteriorResidue) {
                        false
                    } else {
                        let next = cs[c + 1];
                        let next_bt = is_class(next, SymbolClass::BaseTriplePair);
                        let breaks = |last: Option<u8>, boundary: SymbolClass| {
                            last.is_some_and(|l| is_class(l, boundary))
                                && !is_class(next, boundary)
                                && !next_bt
                        };
                        breaks(w.last_helix, SymbolClass::OpenHelix)
                            || breaks(w.last_helix, SymbolClass::CloseHelix)
                            || breaks(w.last_multi, SymbolClass::OpenMulti)
                            || breaks(w.last_multi, SymbolClass::CloseMulti)
                    };
                    if illegal {
                        return Err(CssdError::grammar_at(
                            format!(
                                "INTERIOR RESIDUE \"{}\" at position {pos} is not within a MULTI or HELIX substructure",
                                cs[c] as char
                            ),
                            pos,
                        ));
                    }
                }
                // interior residues extend the current boundary run
            }

            // transparent to the open/close bookkeeping
            SymbolClass::BaseTriplePair
            | SymbolClass::BaseTripleSingle
            | SymbolClass::OpenPk
            | SymbolClass::ClosePk => {}

            SymbolClass::Whitespace => {
                return Err(CssdError::Input(format!(
                    "unrecognized symbol {} at position {pos}",
                    cs[c] as char
                )));
            }
        }
    }

    Ok(())
}

/// Symbols a positional-variable marker can annotate: a whole residue or
/// boundary class, or one specific pseudoknot instance.
enum MarkerKind {
    Class(SymbolClass),
    PkInstance(u8),
}

impl MarkerKind {
    fn contains(&self, b: u8) -> bool {
        match self {
            MarkerKind::Class(class) => is_class(b, *class),
            MarkerKind::PkInstance(open) => b == *open,
        }
    }
}

/// Balance-scan for the close position matching the open symbol at
/// `open_pos`. Only defined for open multi/helix symbols.
fn corresponding_close(cs: &[u8], open_pos: usize) -> Option<usize> {
    let kind = match class_of(cs[open_pos]) {
        Some(SymbolClass::OpenHelix) => BoundaryKind::Helix,
        Some(SymbolClass::OpenMulti) => BoundaryKind::Multi,
        _ => return None,
    };
    let mut balance = 1usize;
    for k in open_pos + 1..cs.len() {
        if is_class(cs[k], kind.open()) {
            balance += 1;
        } else if is_class(cs[k], kind.close()) {
            balance -= 1;
        }
        if balance == 0 {
            return Some(k);
        }
    }
    None
}

fn marker_placement(cs: &[u8], pv: &[u8]) -> Result<(), CssdError> {
    let mut last_idx: Option<usize> = None;
    let mut last_kind: Option<MarkerKind> = None;

    for i in 0..pv.len() {
        if is_pad(pv[i]) {
            continue;
        }
        // markers past the end of the CSSD were rejected lexically
        let sym = cs[i];
        let Some(class) = class_of(sym) else {
            continue;
        };

        match class {
            SymbolClass::BaseTripleSingle | SymbolClass::BaseTriplePair => {
                return Err(CssdError::grammar_at(
                    format!(
                        "pos_var symbol for BASE TRIPLE \"{}\" found at position {}",
                        sym as char, i + 1
                    ),
                    i + 1,
                ));
            }
            SymbolClass::CloseMulti => {
                return Err(CssdError::grammar_at(
                    format!(
                        "pos_var symbol for CLOSE MULTI \"{}\" found at position {}",
                        sym as char, i + 1
                    ),
                    i + 1,
                ));
            }
            SymbolClass::CloseHelix => {
                return Err(CssdError::grammar_at(
                    format!(
                        "pos_var symbol for CLOSE HELIX \"{}\" found at position {}",
                        sym as char, i + 1
                    ),
                    i + 1,
                ));
            }
            SymbolClass::ClosePk => {
                return Err(CssdError::grammar_at(
                    format!(
                        "pos_var symbol for CLOSE PK \"{}\" found at position {}",
                        sym as char, i + 1
                    ),
                    i + 1,
                ));
            }
            _ => {}
        }

        if let (Some(li), Some(kind)) = (last_idx, &last_kind) {
            let mut j = li + 1;
            while j <= i && kind.contains(cs[j]) {
                j += 1;
            }
            if j > i {
                // Same symbol kind all the way from the previous marker.
                // Duplicity is still fine when the two annotated open runs
                // belong to discontinuous (nested-but-separated) helices:
                // the span between the two corresponding close positions
                // must then contain something other than close symbols.
                // Only computed for open symbols wrt closes, not vice versa.
                let mut skip = false;
                if let (Some(a_dash), Some(b_dash)) =
                    (corresponding_close(cs, li), corresponding_close(cs, i))
                {
                    if a_dash > b_dash {
                        let close = match class_of(cs[i]) {
                            Some(SymbolClass::OpenMulti) => Some(SymbolClass::CloseMulti),
                            Some(SymbolClass::OpenHelix) => Some(SymbolClass::CloseHelix),
                            _ => None,
                        };
                        if let Some(close) = close {
                            skip = cs[b_dash + 1..a_dash].iter().any(|&b| !is_class(b, close));
                        }
                    }
                }
                if !skip {
                    return Err(CssdError::grammar_at(
                        format!(
                            "second (redundant) pos_var symbol \"{}\" found at position {}",
                            pv[i] as char, i + 1
                        ),
                        i + 1,
                    ));
                }
            }
        }

        last_idx = Some(i);
        last_kind = Some(match classify(sym) {
            Some(s) if s.class == SymbolClass::OpenPk => MarkerKind::PkInstance(sym),
            _ => MarkerKind::Class(class),
        });
    }

    Ok(())
}

//! CSSD model construction.
//!
//! The builder runs only on input the validator accepts (it re-validates as
//! a precondition) and descends over the string span by span, dispatching on
//! the symbol class at the span start. Helix/multi runs produce paired
//! elements and split the span into an interior (5') and a remainder (3');
//! everything else chains unbranched. Pseudoknots and base triples cannot be
//! linked when their first symbol appears, so a bounded scratch table keeps
//! each pending constraint together with the anchor at which its unmatched
//! symbol was seen, until the matching symbol(s) arrive.
//!
//! Nothing here reports grammar problems: a situation the descent cannot
//! handle after successful validation is an internal inconsistency.

use log::debug;

use ks_structure::Anchor;
use ks_structure::BoundaryKind;
use ks_structure::Branch;
use ks_structure::ConstraintId;
use ks_structure::ECOUNT;
use ks_structure::Model;
use ks_structure::PAD;
use ks_structure::Symbol;
use ks_structure::SymbolClass;
use ks_structure::classify;
use ks_structure::is_class;
use ks_structure::is_pad;
use ks_structure::marker_value;

use crate::error::CssdError;
use crate::validate::validate;

/// Most pending (unresolved) constraints a single compile supports.
pub const MAX_CONSTRAINT_MATCHES: usize = 100;

/// Compile a CSSD string and overlay into a model.
///
/// The overlay is right-padded with whitespace to the CSSD length. On any
/// failure the partially built model is dropped; no model escapes.
pub fn build(cssd: &str, pos_var: &str) -> Result<Model, CssdError> {
    validate(cssd, pos_var)?;
    debug!("converting CSSD into a model");

    let cs = cssd.as_bytes();
    let mut pv = pos_var.as_bytes().to_vec();
    if pv.len() < cs.len() {
        pv.resize(cs.len(), PAD);
    }

    let mut compiler = Compiler {
        cs,
        pv: &pv,
        model: Model::new(),
        pending: Vec::new(),
    };
    compiler.compile_span(0, cs.len(), Anchor::ROOT)?;
    compiler.finish()
}

/// Extent of a paired (multi/helix) substructure: the literal open run, the
/// depth that can close contiguously, and the end of the balanced span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PairedSpan {
    open_run: usize,
    depth: usize,
    end: usize,
}

/// Optimistic-then-reduce run matching. The full open run is assumed to
/// close as one contiguous block; whenever a foreign symbol interrupts after
/// closes have begun, the assumed depth drops to the running balance. This
/// is what lets positional variables and base triples split partial
/// open/close runs without breaking the descent. `None` means the span never
/// balances, which validation rules out.
fn paired_span(cs: &[u8], lo: usize, hi: usize, kind: BoundaryKind) -> Option<PairedSpan> {
    let open = kind.open();
    let close = kind.close();

    let mut i = lo;
    while i < hi && is_class(cs[i], open) {
        i += 1;
    }
    let open_run = i - lo;

    let mut balance = open_run;
    let mut depth = open_run;
    while i < hi && balance > 0 {
        if is_class(cs[i], open) {
            balance += 1;
        } else if is_class(cs[i], close) {
            balance -= 1;
        } else if balance < depth {
            depth = balance;
        }
        i += 1;
    }

    if balance > 0 {
        None
    } else {
        Some(PairedSpan { open_run, depth, end: i })
    }
}

/// A scratch-table slot: a constraint waiting for its remaining symbol(s),
/// keyed by the symbol that will resolve it.
enum Pending {
    Pseudoknot {
        close: u8,
        constraint: ConstraintId,
        fp_anchor: Anchor,
        resolved: bool,
    },
    Triple {
        pair: u8,
        constraint: ConstraintId,
        fp_anchor: Option<Anchor>,
        other_anchor: Option<Anchor>,
        resolved: bool,
    },
}

struct Compiler<'a> {
    cs: &'a [u8],
    pv: &'a [u8],
    model: Model,
    pending: Vec<Pending>,
}

impl Compiler<'_> {
    fn compile_span(&mut self, lo: usize, hi: usize, anchor: Anchor) -> Result<(), CssdError> {
        if lo >= hi {
            return Ok(());
        }
        let sym = classify(self.cs[lo]).ok_or_else(|| {
            CssdError::Inconsistency(format!("unclassifiable symbol at position {}", lo + 1))
        })?;
        match sym.class {
            SymbolClass::OpenMulti => self.paired(lo, hi, anchor, BoundaryKind::Multi),
            SymbolClass::OpenHelix => self.paired(lo, hi, anchor, BoundaryKind::Helix),
            SymbolClass::OpenPk => self.pk_open(lo, hi, anchor, sym.instance),
            SymbolClass::ClosePk => self.pk_close(lo, hi, anchor, sym.instance),
            SymbolClass::BaseTriplePair | SymbolClass::BaseTripleSingle => {
                self.triple(lo, hi, anchor, sym)
            }
            SymbolClass::Unstructured
            | SymbolClass::HairpinResidue
            | SymbolClass::MultiResidue
            | SymbolClass::InteriorResidue => self.residue_run(lo, hi, anchor, sym.class),
            SymbolClass::CloseMulti | SymbolClass::CloseHelix | SymbolClass::Whitespace => {
                Err(CssdError::Inconsistency(format!(
                    "unexpected symbol '{}' at position {} while building model",
                    self.cs[lo] as char,
                    lo + 1
                )))
            }
        }
    }

    /// First marker value within `lo..hi` of the overlay, 0 when unmarked.
    fn marker_in(&self, lo: usize, hi: usize) -> u8 {
        self.pv[lo..hi]
            .iter()
            .find(|&&b| !is_pad(b))
            .and_then(|&b| marker_value(b))
            .unwrap_or(0)
    }

    fn paired(
        &mut self,
        lo: usize,
        hi: usize,
        anchor: Anchor,
        kind: BoundaryKind,
    ) -> Result<(), CssdError> {
        let span = paired_span(self.cs, lo, hi, kind).ok_or_else(|| {
            CssdError::Inconsistency(format!(
                "failed to close {} while building model",
                kind.name()
            ))
        })?;
        let v = self.marker_in(lo, lo + span.open_run);

        let el = self
            .model
            .add_paired(span.depth as ECOUNT, (span.depth + v as usize) as ECOUNT)?;
        self.model.attach(anchor, el)?;

        self.compile_span(
            lo + span.depth,
            span.end - span.depth,
            Anchor::at(el, Branch::FivePrime),
        )?;
        self.compile_span(span.end, hi, Anchor::at(el, Branch::ThreePrime))
    }

    fn pk_open(
        &mut self,
        lo: usize,
        hi: usize,
        anchor: Anchor,
        instance: usize,
    ) -> Result<(), CssdError> {
        let open = SymbolClass::OpenPk.instance(instance);
        let mut i = lo;
        while i < hi && self.cs[i] == open {
            i += 1;
        }
        let run = i - lo;
        let v = self.marker_in(lo, i);

        let cid = self
            .model
            .add_pseudoknot(run as ECOUNT, (run + v as usize) as ECOUNT)?;
        let fp_element = self
            .model
            .pseudoknot(cid)
            .map(|pk| pk.fp_element)
            .ok_or_else(|| CssdError::Inconsistency("pseudoknot constraint vanished".into()))?;

        if self.pending.len() >= MAX_CONSTRAINT_MATCHES {
            return Err(CssdError::Capacity(format!(
                "more than {MAX_CONSTRAINT_MATCHES} pending constraint matches"
            )));
        }
        self.pending.push(Pending::Pseudoknot {
            close: SymbolClass::ClosePk.instance(instance),
            constraint: cid,
            fp_anchor: anchor,
            resolved: false,
        });

        self.compile_span(i, hi, Anchor::at(fp_element, Branch::Unbranched))
    }

    fn pk_close(
        &mut self,
        lo: usize,
        hi: usize,
        anchor: Anchor,
        instance: usize,
    ) -> Result<(), CssdError> {
        let close = SymbolClass::ClosePk.instance(instance);
        let mut i = lo;
        while i < hi && self.cs[i] == close {
            i += 1;
        }

        let slot = self.pending.iter_mut().find(|slot| {
            matches!(slot, Pending::Pseudoknot { close: c, resolved, .. }
                if *c == close && !*resolved)
        });
        let Some(Pending::Pseudoknot { constraint, fp_anchor, resolved, .. }) = slot else {
            return Err(CssdError::Inconsistency(
                "failed to match OPEN and CLOSE PK symbols while building model".into(),
            ));
        };
        let cid = *constraint;
        let fp_anchor = *fp_anchor;
        *resolved = true;

        self.model.attach_pseudoknot(cid, fp_anchor, anchor)?;
        let tp_element = self
            .model
            .pseudoknot(cid)
            .map(|pk| pk.tp_element)
            .ok_or_else(|| CssdError::Inconsistency("pseudoknot constraint vanished".into()))?;

        self.compile_span(i, hi, Anchor::at(tp_element, Branch::Unbranched))
    }

    /// One base-triple symbol; unlike runs, exactly one column per dispatch.
    fn triple(
        &mut self,
        lo: usize,
        hi: usize,
        anchor: Anchor,
        sym: Symbol,
    ) -> Result<(), CssdError> {
        let is_pair = sym.class == SymbolClass::BaseTriplePair;
        let key = SymbolClass::BaseTriplePair.instance(sym.instance);

        let found = self.pending.iter().position(|slot| {
            matches!(slot, Pending::Triple { pair, resolved, .. }
                if *pair == key && !*resolved)
        });

        let next_element = match found {
            None => {
                if self.pending.len() >= MAX_CONSTRAINT_MATCHES {
                    return Err(CssdError::Capacity(format!(
                        "more than {MAX_CONSTRAINT_MATCHES} pending constraint matches"
                    )));
                }
                let cid = self.model.add_base_triple()?;
                let bt = *self
                    .model
                    .base_triple(cid)
                    .ok_or_else(|| CssdError::Inconsistency("base triple vanished".into()))?;
                let (fp_anchor, other_anchor, next) = if is_pair {
                    (Some(anchor), None, bt.fp_element)
                } else {
                    (None, Some(anchor), bt.single_element)
                };
                self.pending.push(Pending::Triple {
                    pair: key,
                    constraint: cid,
                    fp_anchor,
                    other_anchor,
                    resolved: false,
                });
                next
            }

            Some(idx) => {
                let Pending::Triple { constraint, fp_anchor, other_anchor, .. } =
                    &self.pending[idx]
                else {
                    return Err(CssdError::Inconsistency(
                        "scratch slot keyed as base triple holds a pseudoknot".into(),
                    ));
                };
                let (cid, fp_a, other_a) = (*constraint, *fp_anchor, *other_anchor);
                let bt = *self
                    .model
                    .base_triple(cid)
                    .ok_or_else(|| CssdError::Inconsistency("base triple vanished".into()))?;

                match (fp_a, other_a) {
                    // all three contacts known: link the triple into the tree
                    (Some(fp), Some(other)) => {
                        let next = if is_pair {
                            self.model.attach_base_triple(cid, fp, anchor, other)?;
                            bt.tp_element
                        } else {
                            self.model.attach_base_triple(cid, fp, other, anchor)?;
                            bt.single_element
                        };
                        if let Pending::Triple { resolved, .. } = &mut self.pending[idx] {
                            *resolved = true;
                        }
                        next
                    }

                    // partial: record this contact's anchor
                    _ => {
                        let next = if is_pair {
                            if fp_a.is_none() {
                                if let Pending::Triple { fp_anchor, .. } = &mut self.pending[idx] {
                                    *fp_anchor = Some(anchor);
                                }
                                bt.fp_element
                            } else {
                                if let Pending::Triple { other_anchor, .. } = &mut self.pending[idx]
                                {
                                    *other_anchor = Some(anchor);
                                }
                                bt.tp_element
                            }
                        } else {
                            if let Pending::Triple { other_anchor, .. } = &mut self.pending[idx] {
                                *other_anchor = Some(anchor);
                            }
                            bt.single_element
                        };
                        next
                    }
                }
            }
        };

        self.compile_span(lo + 1, hi, Anchor::at(next_element, Branch::Unbranched))
    }

    fn residue_run(
        &mut self,
        lo: usize,
        hi: usize,
        anchor: Anchor,
        class: SymbolClass,
    ) -> Result<(), CssdError> {
        let mut i = lo;
        while i < hi && is_class(self.cs[i], class) {
            i += 1;
        }
        let run = i - lo;
        let v = self.marker_in(lo, i);

        let el = self
            .model
            .add_unpaired(run as ECOUNT, (run + v as usize) as ECOUNT)?;
        self.model.attach(anchor, el)?;

        self.compile_span(i, hi, Anchor::at(el, Branch::Unbranched))
    }

    fn finish(self) -> Result<Model, CssdError> {
        for slot in &self.pending {
            let (key, resolved) = match slot {
                Pending::Pseudoknot { close, resolved, .. } => (*close, *resolved),
                Pending::Triple { pair, resolved, .. } => (*pair, *resolved),
            };
            if !resolved {
                return Err(CssdError::Inconsistency(format!(
                    "failed to build constraint \"{}\" when converting CSSD to model",
                    key as char
                )));
            }
        }
        if self.model.first_element().is_none() {
            return Err(CssdError::Inconsistency(
                "no model element was produced".into(),
            ));
        }
        debug!("CSSD successfully converted to model");
        Ok(self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ks_structure::Constraint;
    use ks_structure::Element;

    fn paired_at(model: &Model, id: ks_structure::ElementId) -> &ks_structure::PairedElement {
        match model.element(id) {
            Element::Paired(p) => p,
            Element::Unpaired(_) => panic!("expected paired element"),
        }
    }

    fn unpaired_at(model: &Model, id: ks_structure::ElementId) -> &ks_structure::UnpairedElement {
        match model.element(id) {
            Element::Unpaired(u) => u,
            Element::Paired(_) => panic!("expected unpaired element"),
        }
    }

    #[test]
    fn test_paired_span_contiguous() {
        let cs = b"<<<___>>>";
        let span = paired_span(cs, 0, cs.len(), BoundaryKind::Helix).unwrap();
        assert_eq!(span, PairedSpan { open_run: 3, depth: 3, end: 9 });
    }

    #[test]
    fn test_paired_span_backoff() {
        // the interior residue splits the close run: only depth 1 closes
        // contiguously, the second open belongs to a nested helix
        let cs = b"<<___>->";
        let span = paired_span(cs, 0, cs.len(), BoundaryKind::Helix).unwrap();
        assert_eq!(span, PairedSpan { open_run: 2, depth: 1, end: 8 });
    }

    #[test]
    fn test_paired_span_unclosed() {
        assert!(paired_span(b"<<<___", 0, 6, BoundaryKind::Helix).is_none());
    }

    #[test]
    fn test_build_hairpin() {
        let model = build("<<<___>>>", "").unwrap();
        let root = model.first_element().unwrap();
        let helix = paired_at(&model, root);
        assert_eq!((helix.min, helix.max), (3, 3));
        assert_eq!(helix.tp_next, None);
        let hairpin = unpaired_at(&model, helix.fp_next.unwrap());
        assert_eq!((hairpin.min, hairpin.max), (3, 3));
        assert_eq!(hairpin.constraint, None);
        assert_eq!(hairpin.next, None);
        assert_eq!(model.constraint_count(), 0);
    }

    #[test]
    fn test_build_marker_stretches_outer_pair() {
        let model = build("<<___>->", "a").unwrap();
        let root = model.first_element().unwrap();
        let outer = paired_at(&model, root);
        assert_eq!((outer.min, outer.max), (1, 11));
        let inner = paired_at(&model, outer.fp_next.unwrap());
        assert_eq!((inner.min, inner.max), (1, 1));
        let loop_ = unpaired_at(&model, inner.fp_next.unwrap());
        assert_eq!((loop_.min, loop_.max), (3, 3));
        let interior = unpaired_at(&model, inner.tp_next.unwrap());
        assert_eq!((interior.min, interior.max), (1, 1));
    }

    #[test]
    fn test_build_marker_on_residue_run() {
        let model = build("<<___>>:::", " \t 2    5").unwrap();
        let root = model.first_element().unwrap();
        let helix = paired_at(&model, root);
        assert_eq!((helix.min, helix.max), (2, 2));
        let hairpin = unpaired_at(&model, helix.fp_next.unwrap());
        assert_eq!((hairpin.min, hairpin.max), (3, 5));
        let tail = unpaired_at(&model, helix.tp_next.unwrap());
        assert_eq!((tail.min, tail.max), (3, 8));
    }

    #[test]
    fn test_build_pseudoknot_in_hairpin() {
        let model = build("<<<__[[__>>>:::]]", "").unwrap();
        assert_eq!(model.constraint_count(), 1);
        let (_, constraint) = model.constraints().next().unwrap();
        let pk = match constraint {
            Constraint::Pseudoknot(pk) => *pk,
            Constraint::BaseTriple(_) => panic!("expected pseudoknot"),
        };
        let fp = unpaired_at(&model, pk.fp_element);
        assert_eq!((fp.min, fp.max), (2, 2));
        assert!(fp.constraint.is_some());
        // the 5' endpoint sits inside the loop, followed by more loop
        let after_fp = unpaired_at(&model, fp.next.unwrap());
        assert_eq!((after_fp.min, after_fp.max), (2, 2));
        // the 3' endpoint trails the unstructured stretch
        let root = model.first_element().unwrap();
        let helix = paired_at(&model, root);
        let tail = unpaired_at(&model, helix.tp_next.unwrap());
        assert_eq!((tail.min, tail.max), (3, 3));
        assert_eq!(tail.next, Some(pk.tp_element));
    }

    #[test]
    fn test_build_leading_pseudoknot_wraps_root() {
        let model = build("[[[:::]]]", "").unwrap();
        let root = model.first_element().unwrap();
        let wrapper = paired_at(&model, root);
        assert_eq!((wrapper.min, wrapper.max), (0, 0));
        let fp = unpaired_at(&model, wrapper.fp_next.unwrap());
        assert_eq!((fp.min, fp.max), (3, 3));
        assert!(fp.constraint.is_some());
        assert_eq!(model.constraint_count(), 1);
    }

    #[test]
    fn test_build_base_triple_resolves_on_last_contact() {
        let model = build("~:::.:::~", "").unwrap();
        assert_eq!(model.constraint_count(), 1);
        let (cid, constraint) = model.constraints().next().unwrap();
        let bt = match constraint {
            Constraint::BaseTriple(bt) => *bt,
            Constraint::Pseudoknot(_) => panic!("expected base triple"),
        };
        // elements chain in string order through the placeholders
        let root = model.first_element().unwrap();
        let wrapper = paired_at(&model, root);
        assert_eq!(wrapper.fp_next, Some(bt.fp_element));
        let fp = unpaired_at(&model, bt.fp_element);
        assert_eq!(fp.constraint, Some((cid, ks_structure::ConstraintSide::FivePrime)));
        let u1 = unpaired_at(&model, fp.next.unwrap());
        assert_eq!(u1.next, Some(bt.single_element));
        let single = unpaired_at(&model, bt.single_element);
        let u2 = unpaired_at(&model, single.next.unwrap());
        assert_eq!(u2.next, Some(bt.tp_element));
    }

    #[test]
    fn test_build_multibranch() {
        let model = build("((,<<___>>,<<<___>>>,))", "").unwrap();
        let root = model.first_element().unwrap();
        let multi = paired_at(&model, root);
        assert_eq!((multi.min, multi.max), (2, 2));
        let j1 = unpaired_at(&model, multi.fp_next.unwrap());
        let h1 = paired_at(&model, j1.next.unwrap());
        assert_eq!((h1.min, h1.max), (2, 2));
        let j2 = unpaired_at(&model, h1.tp_next.unwrap());
        let h2 = paired_at(&model, j2.next.unwrap());
        assert_eq!((h2.min, h2.max), (3, 3));
        let j3 = unpaired_at(&model, h2.tp_next.unwrap());
        assert_eq!(j3.next, None);
    }

    #[test]
    fn test_build_rejects_invalid_input() {
        let err = build("<<<___>>", "").unwrap_err();
        assert!(err.to_string().contains("imbalanced"));
        assert!(build("", "").is_err());
    }
}

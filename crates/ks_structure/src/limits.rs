//! Search-window limits derived from a compiled model.
//!
//! The search engine scans a sequence with windows anchored on the widest
//! helix of the model. From a model it therefore needs: which paired element
//! is that anchor, how many columns can precede it (5' lead) and follow it
//! (3' trail), and how wide the loop region inside the anchor can be (the
//! in-between distance). Helices on the lead/trail side count both strands.

use log::warn;

use crate::ECOUNT;
use crate::Element;
use crate::ElementId;
use crate::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelLimits {
    pub fp_lead_min_span: u32,
    pub fp_lead_max_span: u32,
    pub stack_min_size: ECOUNT,
    pub stack_max_size: ECOUNT,
    pub stack_min_idist: u32,
    pub stack_max_idist: u32,
    pub tp_trail_min_span: u32,
    pub tp_trail_max_span: u32,
    pub largest_stack: ElementId,
}

impl Model {
    /// Derive search-window limits, or `None` for a model without a real
    /// (nonzero-width) helix or with a malformed anchor.
    pub fn limits(&self) -> Option<ModelLimits> {
        let first = self.first_element()?;

        let mut best: Option<(ElementId, ECOUNT)> = None;
        self.widest_stack_at(first, &mut best);
        let (largest, stack_min) = best?;
        let widest = match self.element(largest) {
            Element::Paired(p) => p,
            Element::Unpaired(_) => return None,
        };
        let interior = widest.fp_next?;

        let mut lead = (0u32, 0u32);
        let mut trail = (0u32, 0u32);
        let mut seen = false;
        self.span_walk(first, Some(largest), &mut lead, &mut trail, &mut seen);
        if !seen {
            warn!("widest stack not reachable from the model root");
            return None;
        }

        // Rewalk from the anchor's interior only: everything lands in the
        // trailing accumulator, which here measures the in-between distance.
        let mut idist = (0u32, 0u32);
        let mut seen_interior = true;
        self.span_walk(interior, None, &mut lead, &mut idist, &mut seen_interior);

        Some(ModelLimits {
            fp_lead_min_span: lead.0,
            fp_lead_max_span: lead.1,
            stack_min_size: stack_min,
            stack_max_size: widest.max,
            stack_min_idist: idist.0,
            stack_max_idist: idist.1,
            tp_trail_min_span: trail.0,
            tp_trail_max_span: trail.1,
            largest_stack: largest,
        })
    }

    fn widest_stack_at(&self, el: ElementId, best: &mut Option<(ElementId, ECOUNT)>) {
        match self.element(el) {
            Element::Unpaired(u) => {
                if let Some(next) = u.next {
                    self.widest_stack_at(next, best);
                }
            }
            Element::Paired(p) => {
                if p.min > best.map_or(0, |(_, m)| m) {
                    *best = Some((el, p.min));
                }
                match p.fp_next {
                    Some(fp) => self.widest_stack_at(fp, best),
                    None => warn!("paired element without a 5' subtree in widest_stack_at"),
                }
                if let Some(tp) = p.tp_next {
                    self.widest_stack_at(tp, best);
                }
            }
        }
    }

    fn span_walk(
        &self,
        el: ElementId,
        skip: Option<ElementId>,
        lead: &mut (u32, u32),
        trail: &mut (u32, u32),
        seen: &mut bool,
    ) {
        match self.element(el) {
            Element::Unpaired(u) => {
                let acc = if *seen { &mut *trail } else { &mut *lead };
                acc.0 += u.min as u32;
                acc.1 += u.max as u32;
                if let Some(next) = u.next {
                    self.span_walk(next, skip, lead, trail, seen);
                }
            }
            Element::Paired(p) => {
                if skip == Some(el) {
                    *seen = true;
                } else {
                    match p.fp_next {
                        None => warn!("paired element without a 5' subtree in span_walk"),
                        Some(fp) => {
                            // both strands of the helix count
                            {
                                let acc = if *seen { &mut *trail } else { &mut *lead };
                                acc.0 += p.min as u32;
                                acc.1 += p.max as u32;
                            }
                            self.span_walk(fp, skip, lead, trail, seen);
                            let acc = if *seen { &mut *trail } else { &mut *lead };
                            acc.0 += p.min as u32;
                            acc.1 += p.max as u32;
                        }
                    }
                }
                if let Some(tp) = p.tp_next {
                    self.span_walk(tp, skip, lead, trail, seen);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Anchor;
    use crate::Branch;

    // :: <<___>> ::: <<<___>>> :
    fn two_helix_model() -> Model {
        let mut m = Model::new();
        let lead = m.add_unpaired(2, 2).unwrap();
        m.attach(Anchor::ROOT, lead).unwrap();
        let root = m.first_element().unwrap();
        let h1 = m.add_paired(2, 2).unwrap();
        m.attach(Anchor::at(lead, Branch::Unbranched), h1).unwrap();
        let loop1 = m.add_unpaired(3, 3).unwrap();
        m.attach(Anchor::at(h1, Branch::FivePrime), loop1).unwrap();
        let mid = m.add_unpaired(3, 3).unwrap();
        m.attach(Anchor::at(h1, Branch::ThreePrime), mid).unwrap();
        let h2 = m.add_paired(3, 5).unwrap();
        m.attach(Anchor::at(mid, Branch::Unbranched), h2).unwrap();
        let loop2 = m.add_unpaired(3, 3).unwrap();
        m.attach(Anchor::at(h2, Branch::FivePrime), loop2).unwrap();
        let trail = m.add_unpaired(1, 4).unwrap();
        m.attach(Anchor::at(h2, Branch::ThreePrime), trail).unwrap();
        assert_eq!(m.first_element(), Some(root));
        m
    }

    #[test]
    fn test_limits_two_helices() {
        let m = two_helix_model();
        let lim = m.limits().unwrap();
        assert_eq!(lim.stack_min_size, 3);
        assert_eq!(lim.stack_max_size, 5);
        // lead: 2 + both strands of h1 (2+2) + its loop 3 + mid 3
        assert_eq!(lim.fp_lead_min_span, 12);
        assert_eq!(lim.fp_lead_max_span, 12);
        assert_eq!(lim.stack_min_idist, 3);
        assert_eq!(lim.stack_max_idist, 3);
        assert_eq!(lim.tp_trail_min_span, 1);
        assert_eq!(lim.tp_trail_max_span, 4);
    }

    #[test]
    fn test_limits_empty_model() {
        let m = Model::new();
        assert!(m.limits().is_none());
    }

    #[test]
    fn test_limits_ignores_zero_width_root() {
        let mut m = Model::new();
        let u = m.add_unpaired(5, 5).unwrap();
        m.attach(Anchor::ROOT, u).unwrap();
        // only the synthetic zero-width wrapper is paired
        assert!(m.limits().is_none());
    }
}

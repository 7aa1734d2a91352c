//! The compiled search model.
//!
//! A model is an arena of elements (paired helices and unpaired runs) plus a
//! list of non-local constraints (pseudoknots and base triples). Elements
//! reference each other through integer indices into the arena, so dropping
//! the model releases the whole tree at once and no partially-built tree can
//! outlive a failed compile.
//!
//! Linking rules mirror the structure of the notation: a paired element has
//! one 5' (interior) and one 3' (trailing) slot, an unpaired element chains
//! at most one unbranched successor, and a model has exactly one root. When
//! an unpaired element or a constraint endpoint would lead the model, a
//! zero-length paired root is wrapped around it so the root is always paired.

use crate::ECOUNT;
use crate::MAX_MODEL_STRING_LEN;
use crate::error::ModelError;

/// Upper bound on arena elements; a column of input yields at most two.
pub const MAX_MODEL_ELEMENTS: usize = 2 * MAX_MODEL_STRING_LEN + 4;

/// Upper bound on constraints; a pseudoknot spans at least two columns.
pub const MAX_MODEL_CONSTRAINTS: usize = MAX_MODEL_STRING_LEN;

/// Index of an element in its model's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(u16);

/// Index of a constraint in its model's constraint list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintId(u16);

/// Which slot of a predecessor a new element hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    FivePrime,
    ThreePrime,
    Unbranched,
}

/// Which endpoint of a constraint an unpaired placeholder stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintSide {
    FivePrime,
    ThreePrime,
    Single,
}

/// Attachment point for the next element: a predecessor (or the model root
/// when `element` is `None`) and the branch to occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub element: Option<ElementId>,
    pub branch: Branch,
}

impl Anchor {
    /// The (still vacant) model root.
    pub const ROOT: Anchor = Anchor { element: None, branch: Branch::Unbranched };

    pub fn at(element: ElementId, branch: Branch) -> Self {
        Anchor { element: Some(element), branch }
    }
}

/// A helix of `min` columns, extendable to `max`. `fp_next` is the subtree
/// nested inside the pair and is non-`None` in any well-formed model;
/// `tp_next` follows once the pair closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedElement {
    pub min: ECOUNT,
    pub max: ECOUNT,
    pub fp_next: Option<ElementId>,
    pub tp_next: Option<ElementId>,
}

/// A run of unpaired columns, or (when `constraint` is set) a placeholder
/// standing in for one endpoint of a pseudoknot or base triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpairedElement {
    pub min: ECOUNT,
    pub max: ECOUNT,
    pub constraint: Option<(ConstraintId, ConstraintSide)>,
    pub next: Option<ElementId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Paired(PairedElement),
    Unpaired(UnpairedElement),
}

/// A long-range pairing between two non-adjacent unpaired placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pseudoknot {
    pub fp_element: ElementId,
    pub tp_element: ElementId,
}

/// A three-way contact: one pair of positions plus one single position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseTriple {
    pub fp_element: ElementId,
    pub tp_element: ElementId,
    pub single_element: ElementId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    Pseudoknot(Pseudoknot),
    BaseTriple(BaseTriple),
}

/// The compiled model: one element tree, one constraint list, one owner.
#[derive(Debug, Clone, Default)]
pub struct Model {
    elements: Vec<Element>,
    constraints: Vec<Constraint>,
    first_element: Option<ElementId>,
}

impl Model {
    pub fn new() -> Self {
        Model::default()
    }

    /// Root of the element tree.
    pub fn first_element(&self) -> Option<ElementId> {
        self.first_element
    }

    /// Head of the constraint list.
    pub fn first_constraint(&self) -> Option<ConstraintId> {
        if self.constraints.is_empty() {
            None
        } else {
            Some(ConstraintId(0))
        }
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.0 as usize]
    }

    pub fn constraint(&self, id: ConstraintId) -> &Constraint {
        &self.constraints[id.0 as usize]
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Constraints in insertion order.
    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.constraints
            .iter()
            .enumerate()
            .map(|(i, c)| (ConstraintId(i as u16), c))
    }

    /// Allocate a detached paired element.
    pub fn add_paired(&mut self, min: ECOUNT, max: ECOUNT) -> Result<ElementId, ModelError> {
        self.push_element(Element::Paired(PairedElement {
            min,
            max,
            fp_next: None,
            tp_next: None,
        }), min, max)
    }

    /// Allocate a detached unpaired element.
    pub fn add_unpaired(&mut self, min: ECOUNT, max: ECOUNT) -> Result<ElementId, ModelError> {
        self.push_element(Element::Unpaired(UnpairedElement {
            min,
            max,
            constraint: None,
            next: None,
        }), min, max)
    }

    fn push_element(&mut self, el: Element, min: ECOUNT, max: ECOUNT) -> Result<ElementId, ModelError> {
        if min > max {
            return Err(ModelError::Link(format!(
                "cannot initialize element with min ({min}) > max ({max})"
            )));
        }
        if self.elements.len() >= MAX_MODEL_ELEMENTS {
            return Err(ModelError::Arena(format!(
                "more than {MAX_MODEL_ELEMENTS} elements"
            )));
        }
        let id = ElementId(self.elements.len() as u16);
        self.elements.push(el);
        Ok(id)
    }

    /// Allocate a pseudoknot constraint with its two unpaired placeholders.
    /// The placeholders stay detached until [`Model::attach_pseudoknot`].
    pub fn add_pseudoknot(&mut self, min: ECOUNT, max: ECOUNT) -> Result<ConstraintId, ModelError> {
        let id = self.next_constraint_id()?;
        let fp = self.placeholder(min, max, id, ConstraintSide::FivePrime)?;
        let tp = self.placeholder(min, max, id, ConstraintSide::ThreePrime)?;
        self.constraints.push(Constraint::Pseudoknot(Pseudoknot {
            fp_element: fp,
            tp_element: tp,
        }));
        Ok(id)
    }

    /// Allocate a base-triple constraint with its three single-column
    /// placeholders, detached until [`Model::attach_base_triple`].
    pub fn add_base_triple(&mut self) -> Result<ConstraintId, ModelError> {
        let id = self.next_constraint_id()?;
        let fp = self.placeholder(1, 1, id, ConstraintSide::FivePrime)?;
        let tp = self.placeholder(1, 1, id, ConstraintSide::ThreePrime)?;
        let single = self.placeholder(1, 1, id, ConstraintSide::Single)?;
        self.constraints.push(Constraint::BaseTriple(BaseTriple {
            fp_element: fp,
            tp_element: tp,
            single_element: single,
        }));
        Ok(id)
    }

    fn next_constraint_id(&self) -> Result<ConstraintId, ModelError> {
        if self.constraints.len() >= MAX_MODEL_CONSTRAINTS {
            return Err(ModelError::Arena(format!(
                "more than {MAX_MODEL_CONSTRAINTS} constraints"
            )));
        }
        Ok(ConstraintId(self.constraints.len() as u16))
    }

    fn placeholder(
        &mut self,
        min: ECOUNT,
        max: ECOUNT,
        id: ConstraintId,
        side: ConstraintSide,
    ) -> Result<ElementId, ModelError> {
        self.push_element(Element::Unpaired(UnpairedElement {
            min,
            max,
            constraint: Some((id, side)),
            next: None,
        }), min, max)
    }

    /// Convenience view of a pseudoknot constraint.
    pub fn pseudoknot(&self, id: ConstraintId) -> Option<&Pseudoknot> {
        match self.constraint(id) {
            Constraint::Pseudoknot(pk) => Some(pk),
            Constraint::BaseTriple(_) => None,
        }
    }

    /// Convenience view of a base-triple constraint.
    pub fn base_triple(&self, id: ConstraintId) -> Option<&BaseTriple> {
        match self.constraint(id) {
            Constraint::BaseTriple(bt) => Some(bt),
            Constraint::Pseudoknot(_) => None,
        }
    }

    /// Hang `new_el` off `anchor`. Attaching to the vacant root with an
    /// unpaired element wraps a zero-length paired root around it first.
    pub fn attach(&mut self, anchor: Anchor, new_el: ElementId) -> Result<(), ModelError> {
        let (prev, branch) = match anchor.element {
            None => {
                if anchor.branch != Branch::Unbranched || self.first_element.is_some() {
                    return Err(ModelError::Link(
                        "a model has exactly one root element".into(),
                    ));
                }
                if matches!(self.element(new_el), Element::Paired(_)) {
                    self.first_element = Some(new_el);
                    return Ok(());
                }
                let root = self.add_paired(0, 0)?;
                self.first_element = Some(root);
                (root, Branch::FivePrime)
            }
            Some(prev) => (prev, anchor.branch),
        };
        self.link(prev, branch, new_el)
    }

    fn link(&mut self, prev: ElementId, branch: Branch, new_el: ElementId) -> Result<(), ModelError> {
        match &mut self.elements[prev.0 as usize] {
            Element::Paired(p) => match branch {
                Branch::FivePrime if p.fp_next.is_none() => {
                    p.fp_next = Some(new_el);
                    Ok(())
                }
                Branch::ThreePrime if p.tp_next.is_none() => {
                    p.tp_next = Some(new_el);
                    Ok(())
                }
                _ => Err(ModelError::Link(format!(
                    "paired {branch:?} slot is occupied or invalid"
                ))),
            },
            Element::Unpaired(u) => {
                if branch != Branch::Unbranched || u.next.is_some() {
                    Err(ModelError::Link(
                        "unpaired element chains exactly one unbranched successor".into(),
                    ))
                } else {
                    u.next = Some(new_el);
                    Ok(())
                }
            }
        }
    }

    /// Link both endpoints of a pseudoknot into the tree.
    pub fn attach_pseudoknot(
        &mut self,
        id: ConstraintId,
        fp_anchor: Anchor,
        tp_anchor: Anchor,
    ) -> Result<(), ModelError> {
        let pk = *self
            .pseudoknot(id)
            .ok_or_else(|| ModelError::Link("constraint is not a pseudoknot".into()))?;
        if tp_anchor.element.is_none() {
            return Err(ModelError::Link(
                "a pseudoknot 3' endpoint cannot lead the model".into(),
            ));
        }
        self.attach(fp_anchor, pk.fp_element)?;
        self.attach(tp_anchor, pk.tp_element)
    }

    /// Link all three contacts of a base triple into the tree.
    pub fn attach_base_triple(
        &mut self,
        id: ConstraintId,
        fp_anchor: Anchor,
        tp_anchor: Anchor,
        single_anchor: Anchor,
    ) -> Result<(), ModelError> {
        let bt = *self
            .base_triple(id)
            .ok_or_else(|| ModelError::Link("constraint is not a base triple".into()))?;
        if tp_anchor.element.is_none() {
            return Err(ModelError::Link(
                "a base-triple 3' contact cannot lead the model".into(),
            ));
        }
        self.attach(fp_anchor, bt.fp_element)?;
        self.attach(single_anchor, bt.single_element)?;
        self.attach(tp_anchor, bt.tp_element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paired_root() {
        let mut m = Model::new();
        let el = m.add_paired(3, 3).unwrap();
        m.attach(Anchor::ROOT, el).unwrap();
        assert_eq!(m.first_element(), Some(el));
        assert_eq!(m.element_count(), 1);
    }

    #[test]
    fn test_unpaired_root_gets_wrapped() {
        let mut m = Model::new();
        let el = m.add_unpaired(4, 6).unwrap();
        m.attach(Anchor::ROOT, el).unwrap();
        let root = m.first_element().unwrap();
        assert_ne!(root, el);
        match m.element(root) {
            Element::Paired(p) => {
                assert_eq!((p.min, p.max), (0, 0));
                assert_eq!(p.fp_next, Some(el));
                assert_eq!(p.tp_next, None);
            }
            Element::Unpaired(_) => panic!("root must be paired"),
        }
    }

    #[test]
    fn test_second_root_rejected() {
        let mut m = Model::new();
        let a = m.add_paired(1, 1).unwrap();
        let b = m.add_paired(1, 1).unwrap();
        m.attach(Anchor::ROOT, a).unwrap();
        assert!(m.attach(Anchor::ROOT, b).is_err());
    }

    #[test]
    fn test_occupied_slot_rejected() {
        let mut m = Model::new();
        let p = m.add_paired(2, 2).unwrap();
        let a = m.add_unpaired(1, 1).unwrap();
        let b = m.add_unpaired(1, 1).unwrap();
        m.attach(Anchor::ROOT, p).unwrap();
        m.attach(Anchor::at(p, Branch::FivePrime), a).unwrap();
        assert!(m.attach(Anchor::at(p, Branch::FivePrime), b).is_err());
        m.attach(Anchor::at(p, Branch::ThreePrime), b).unwrap();
    }

    #[test]
    fn test_min_above_max_rejected() {
        let mut m = Model::new();
        assert!(m.add_unpaired(5, 2).is_err());
    }

    #[test]
    fn test_pseudoknot_placeholders() {
        let mut m = Model::new();
        let id = m.add_pseudoknot(2, 5).unwrap();
        let pk = *m.pseudoknot(id).unwrap();
        match m.element(pk.fp_element) {
            Element::Unpaired(u) => {
                assert_eq!((u.min, u.max), (2, 5));
                assert_eq!(u.constraint, Some((id, ConstraintSide::FivePrime)));
            }
            Element::Paired(_) => panic!("placeholder must be unpaired"),
        }
        // resolving with a vacant root wraps, like any leading unpaired element
        let anchor_el = pk.fp_element;
        m.attach_pseudoknot(id, Anchor::ROOT, Anchor::at(anchor_el, Branch::Unbranched))
            .unwrap();
        assert!(m.first_element().is_some());
        assert_eq!(m.first_constraint(), Some(id));
    }

    #[test]
    fn test_base_triple_sides() {
        let mut m = Model::new();
        let id = m.add_base_triple().unwrap();
        let bt = *m.base_triple(id).unwrap();
        for (el, side) in [
            (bt.fp_element, ConstraintSide::FivePrime),
            (bt.tp_element, ConstraintSide::ThreePrime),
            (bt.single_element, ConstraintSide::Single),
        ] {
            match m.element(el) {
                Element::Unpaired(u) => {
                    assert_eq!((u.min, u.max), (1, 1));
                    assert_eq!(u.constraint, Some((id, side)));
                }
                Element::Paired(_) => panic!("placeholder must be unpaired"),
            }
        }
    }
}

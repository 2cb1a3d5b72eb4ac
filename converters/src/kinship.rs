// converters/src/kinship.rs
//! Kinship role classifier.
//!
//! Assigns every person a symbolic role token relative to the proband, for
//! FamilyMemberHistory relationship coding. Tokens are structured values
//! (`{status, side, depth, base}`) composed and matched as data; the
//! compact string form ("MGRMTH", "GGRNDDAU", ...) is only rendered at the
//! export boundary via [`RoleToken::code`].

use std::collections::HashMap;

use graph_engine::PedigreeGraph;
use log::debug;
use models::identifiers::VertexId;
use models::properties::Gender;

/// Maternal/paternal marker; `Unknown` renders as no prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    #[default]
    Unknown,
    Maternal,
    Paternal,
}

impl Side {
    fn prefix(self) -> &'static str {
        match self {
            Side::Unknown => "",
            Side::Maternal => "M",
            Side::Paternal => "P",
        }
    }

    /// Two parents may carry conflicting side markers; agreement wins,
    /// one-sided knowledge wins over none, conflict collapses to Unknown.
    fn reconcile(a: Side, b: Side) -> Side {
        match (a, b) {
            (x, y) if x == y => x,
            (Side::Unknown, y) => y,
            (x, Side::Unknown) => x,
            _ => Side::Unknown,
        }
    }
}

/// Relationship status qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Natural,
    Adoptive,
    Step,
    Half,
    Twin,
    FraternalTwin,
}

/// The base relation, gendered where the vocabulary is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base {
    Oneself,
    SigOthr,
    Mother,
    Father,
    Parent,
    Daughter,
    Son,
    Child,
    Sister,
    Brother,
    Sibling,
    Aunt,
    Uncle,
    Pibling,
    Niece,
    Nephew,
    Nieneph,
    Cousin,
}

impl Base {
    fn is_parent(self) -> bool {
        matches!(self, Base::Mother | Base::Father | Base::Parent)
    }

    fn is_child(self) -> bool {
        matches!(self, Base::Daughter | Base::Son | Base::Child)
    }

    fn is_sibling(self) -> bool {
        matches!(self, Base::Sister | Base::Brother | Base::Sibling)
    }

    fn is_pibling(self) -> bool {
        matches!(self, Base::Aunt | Base::Uncle | Base::Pibling)
    }

    fn is_nibling(self) -> bool {
        matches!(self, Base::Niece | Base::Nephew | Base::Nieneph)
    }

    fn parent_for(gender: Gender) -> Base {
        match gender {
            Gender::F => Base::Mother,
            Gender::M => Base::Father,
            Gender::U => Base::Parent,
        }
    }

    fn child_for(gender: Gender) -> Base {
        match gender {
            Gender::F => Base::Daughter,
            Gender::M => Base::Son,
            Gender::U => Base::Child,
        }
    }

    fn sibling_for(gender: Gender) -> Base {
        match gender {
            Gender::F => Base::Sister,
            Gender::M => Base::Brother,
            Gender::U => Base::Sibling,
        }
    }

    fn pibling_for(gender: Gender) -> Base {
        match gender {
            Gender::F => Base::Aunt,
            Gender::M => Base::Uncle,
            Gender::U => Base::Pibling,
        }
    }

    fn nibling_for(gender: Gender) -> Base {
        match gender {
            Gender::F => Base::Niece,
            Gender::M => Base::Nephew,
            Gender::U => Base::Nieneph,
        }
    }
}

/// A parsed kinship role. `depth` counts generations beyond the immediate
/// relation: parents and children are depth 0, grandparents and
/// grandchildren depth 1, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleToken {
    pub base: Base,
    pub side: Side,
    pub depth: u8,
    pub status: Status,
    pub inlaw: bool,
}

impl RoleToken {
    fn new(base: Base) -> Self {
        RoleToken {
            base,
            side: Side::Unknown,
            depth: 0,
            status: Status::Natural,
            inlaw: false,
        }
    }

    pub fn oneself() -> Self {
        RoleToken::new(Base::Oneself)
    }

    pub fn significant_other() -> Self {
        RoleToken::new(Base::SigOthr)
    }

    pub fn parent(gender: Gender, adopted: bool) -> Self {
        RoleToken {
            status: if adopted { Status::Adoptive } else { Status::Natural },
            ..RoleToken::new(Base::parent_for(gender))
        }
    }

    pub fn ancestor(side: Side, depth: u8, gender: Gender) -> Self {
        RoleToken {
            side,
            depth,
            ..RoleToken::new(Base::parent_for(gender))
        }
    }

    pub fn parent_in_law(gender: Gender) -> Self {
        RoleToken {
            inlaw: true,
            ..RoleToken::new(Base::parent_for(gender))
        }
    }

    pub fn step_parent(base: Base) -> Self {
        RoleToken {
            status: Status::Step,
            ..RoleToken::new(base)
        }
    }

    fn child(gender: Gender, status: Status) -> Self {
        RoleToken {
            status,
            ..RoleToken::new(Base::child_for(gender))
        }
    }

    fn child_in_law(gender: Gender) -> Self {
        // The partner of a daughter is a son-in-law.
        RoleToken {
            inlaw: true,
            ..RoleToken::new(Base::child_for(gender.opposite()))
        }
    }

    fn sibling(gender: Gender, status: Status) -> Self {
        RoleToken {
            status,
            ..RoleToken::new(Base::sibling_for(gender))
        }
    }

    fn sibling_in_law(gender: Gender) -> Self {
        RoleToken {
            inlaw: true,
            ..RoleToken::new(Base::sibling_for(gender.opposite()))
        }
    }

    fn grandchild(gender: Gender, depth: u8) -> Self {
        RoleToken {
            depth,
            ..RoleToken::new(Base::child_for(gender))
        }
    }

    fn pibling(side: Side, depth: u8, gender: Gender) -> Self {
        RoleToken {
            side,
            depth,
            ..RoleToken::new(Base::pibling_for(gender))
        }
    }

    fn nibling(gender: Gender, depth: u8) -> Self {
        RoleToken {
            depth,
            ..RoleToken::new(Base::nibling_for(gender))
        }
    }

    fn cousin(side: Side) -> Self {
        RoleToken {
            side,
            ..RoleToken::new(Base::Cousin)
        }
    }

    /// Renders the compact token string used in relationship codings.
    pub fn code(&self) -> String {
        let g = |n: u8| "G".repeat(n as usize);
        match self.base {
            Base::Oneself => "ONESELF".to_string(),
            Base::SigOthr => "SIGOTHR".to_string(),
            Base::Mother | Base::Father | Base::Parent => {
                let noun = match self.base {
                    Base::Mother => "MTH",
                    Base::Father => "FTH",
                    _ => "PRN",
                };
                if self.inlaw {
                    format!("{}INLAW", noun)
                } else if self.depth > 0 {
                    format!("{}{}GR{}", self.side.prefix(), g(self.depth - 1), noun)
                } else {
                    match self.status {
                        Status::Adoptive => format!("ADOPT{}", noun),
                        Status::Step => format!("STP{}", noun),
                        _ => format!("N{}", noun),
                    }
                }
            }
            Base::Daughter | Base::Son | Base::Child => {
                let (noun, neutral) = match self.base {
                    Base::Daughter => ("DAU", false),
                    Base::Son => ("SON", false),
                    _ => ("CHLD", true),
                };
                if self.inlaw {
                    format!("{}INLAW", noun)
                } else if self.depth > 0 {
                    let long = if neutral { "CHILD" } else { noun };
                    format!("{}GRND{}", g(self.depth - 1), long)
                } else {
                    match self.status {
                        Status::Adoptive => format!("{}ADOPT", noun),
                        Status::Step => format!("STP{}", noun),
                        _ if neutral => "NCHILD".to_string(),
                        _ => noun.to_string(),
                    }
                }
            }
            Base::Sister | Base::Brother | Base::Sibling => {
                let noun = match self.base {
                    Base::Sister => "SIS",
                    Base::Brother => "BRO",
                    _ => "SIB",
                };
                if self.inlaw {
                    format!("{}INLAW", noun)
                } else {
                    match self.status {
                        Status::Half => format!("H{}", noun),
                        Status::Step => format!("STP{}", noun),
                        Status::Twin => match self.base {
                            Base::Sister => "TWINSIS".to_string(),
                            Base::Brother => "TWINBRO".to_string(),
                            _ => "TWIN".to_string(),
                        },
                        Status::FraternalTwin => match self.base {
                            Base::Sister => "FTWINSIS".to_string(),
                            Base::Brother => "FTWINBRO".to_string(),
                            _ => "TWIN".to_string(),
                        },
                        _ => format!("N{}", noun),
                    }
                }
            }
            Base::Aunt | Base::Uncle | Base::Pibling => {
                let noun = match self.base {
                    Base::Aunt => "AUNT",
                    Base::Uncle => "UNCLE",
                    _ => "PIBLING",
                };
                format!("{}{}{}", self.side.prefix(), g(self.depth), noun)
            }
            Base::Niece | Base::Nephew | Base::Nieneph => {
                let noun = match self.base {
                    Base::Niece => "NIECE",
                    Base::Nephew => "NEPHEW",
                    _ => "NIENEPH",
                };
                format!("{}{}", g(self.depth), noun)
            }
            Base::Cousin => format!("{}COUSN", self.side.prefix()),
        }
    }
}

/// The classifier result: a partial role assignment over person vertices.
#[derive(Debug)]
pub struct KinshipRoles {
    roles: HashMap<VertexId, RoleToken>,
}

impl KinshipRoles {
    pub fn get(&self, id: VertexId) -> Option<&RoleToken> {
        self.roles.get(&id)
    }

    pub fn code(&self, id: VertexId) -> Option<String> {
        self.roles.get(&id).map(RoleToken::code)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Computes kinship roles for every classifiable person, relative to the
/// proband. Deterministic for a fixed graph; terminates in at most one
/// worklist pass per vertex.
pub fn classify(graph: &PedigreeGraph, proband: VertexId) -> KinshipRoles {
    let mut ctx = Classifier {
        graph,
        proband,
        roles: HashMap::new(),
    };
    ctx.run();
    KinshipRoles { roles: ctx.roles }
}

struct Classifier<'a> {
    graph: &'a PedigreeGraph,
    proband: VertexId,
    roles: HashMap<VertexId, RoleToken>,
}

impl<'a> Classifier<'a> {
    fn run(&mut self) {
        self.roles.insert(self.proband, RoleToken::oneself());

        let adopted = self.person_adopted(self.proband);
        let (mother, father) = self.resolve_mother_father(self.proband);
        let parents = self.graph.get_parents(self.proband);

        if let Some(m) = mother {
            self.roles.insert(m, RoleToken::parent(Gender::F, adopted));
            self.fill_ancestors(Side::Maternal, 1, m);
        }
        if let Some(f) = father {
            self.roles.insert(f, RoleToken::parent(Gender::M, adopted));
            self.fill_ancestors(Side::Paternal, 1, f);
        }
        for &p in &parents {
            if !self.roles.contains_key(&p) {
                self.roles.insert(p, RoleToken::parent(Gender::U, adopted));
                self.fill_ancestors(Side::Unknown, 1, p);
            }
        }

        // partners and parents in-law
        for partner in self.graph.get_all_partners(self.proband) {
            self.roles.insert(partner, RoleToken::significant_other());
            let (in_mother, in_father) = self.resolve_mother_father(partner);
            if let Some(m) = in_mother {
                self.roles.entry(m).or_insert(RoleToken::parent_in_law(Gender::F));
            }
            if let Some(f) = in_father {
                self.roles.entry(f).or_insert(RoleToken::parent_in_law(Gender::M));
            }
            for p in self.graph.get_parents(partner) {
                self.roles.entry(p).or_insert(RoleToken::parent_in_law(Gender::U));
            }
        }

        for &p in &parents {
            self.fill_step_parents(p);
        }

        // Worklist fixpoint over the remaining vertices: each pass settles
        // everyone whose parents already carry a role; a pass with no
        // progress means the leftovers are unclassifiable.
        let mut still: Vec<VertexId> = self
            .graph
            .person_ids()
            .filter(|id| !self.roles.contains_key(id))
            .collect();
        loop {
            let before = still.len();
            still.retain(|&id| !self.fill_extended(id));
            if still.is_empty() || still.len() == before {
                break;
            }
        }
        for id in &still {
            debug!("vertex {} left unclassified", id);
        }
    }

    fn person_gender(&self, id: VertexId) -> Gender {
        self.graph.person(id).map(|p| p.gender).unwrap_or_default()
    }

    fn person_adopted(&self, id: VertexId) -> bool {
        self.graph.person(id).is_some_and(|p| p.adopted)
    }

    fn resolve_mother_father(&self, id: VertexId) -> (Option<VertexId>, Option<VertexId>) {
        self.graph.mother_father_slots(id)
    }

    /// Walks upward assigning grandparent roles with a growing depth
    /// prefix; the side marker is inherited from the first step.
    fn fill_ancestors(&mut self, side: Side, depth: u8, node: VertexId) {
        if depth as usize > self.graph.vertex_count() {
            return;
        }
        let (mother, father) = self.resolve_mother_father(node);
        let parents = self.graph.get_parents(node);
        if let Some(m) = mother {
            self.roles.insert(m, RoleToken::ancestor(side, depth, Gender::F));
            self.fill_ancestors(side, depth + 1, m);
        }
        if let Some(f) = father {
            self.roles.insert(f, RoleToken::ancestor(side, depth, Gender::M));
            self.fill_ancestors(side, depth + 1, f);
        }
        for p in parents {
            if !self.roles.contains_key(&p) {
                self.roles.insert(p, RoleToken::ancestor(side, depth, Gender::U));
                self.fill_ancestors(side, depth + 1, p);
            }
        }
    }

    /// Other partners of a classified parent become step-parents.
    fn fill_step_parents(&mut self, parent: VertexId) {
        let Some(parent_role) = self.roles.get(&parent).copied() else {
            return;
        };
        let partners = self.graph.get_all_partners(parent);
        if partners.len() <= 1 {
            return;
        }
        let step = match parent_role.base {
            Base::Mother => RoleToken::step_parent(Base::Father),
            Base::Father => RoleToken::step_parent(Base::Mother),
            _ => RoleToken::step_parent(Base::Parent),
        };
        for partner in partners {
            self.roles.entry(partner).or_insert(step);
        }
    }

    fn backfill_partner_roles(&mut self, node: VertexId, token: RoleToken) {
        for partner in self.graph.get_all_partners(node) {
            self.roles.entry(partner).or_insert(token);
        }
    }

    /// One worklist step; true when the vertex received a role.
    fn fill_extended(&mut self, node: VertexId) -> bool {
        if self.roles.contains_key(&node) {
            return true;
        }
        let parents = self.graph.get_parents(node);
        if parents.is_empty() {
            return false;
        }
        let p1 = self.roles.get(&parents[0]).copied();
        let p2 = parents.get(1).and_then(|p| self.roles.get(p)).copied();
        if p1.is_none() && p2.is_none() {
            return false;
        }
        let parent_roles: Vec<RoleToken> = [p1, p2].into_iter().flatten().collect();

        let v_gender = self.person_gender(node);
        let p_gender = self.person_gender(self.proband);

        // children of the proband
        if parent_roles.iter().any(|r| r.base == Base::Oneself) {
            let status = if self.person_adopted(node) {
                Status::Adoptive
            } else {
                Status::Natural
            };
            self.roles.insert(node, RoleToken::child(v_gender, status));
            self.backfill_partner_roles(node, RoleToken::child_in_law(v_gender));
            return true;
        }

        // children of a partner: step children
        if parent_roles.iter().any(|r| r.base == Base::SigOthr) {
            let status = if self.person_adopted(node) {
                Status::Adoptive
            } else {
                Status::Step
            };
            self.roles.insert(node, RoleToken::child(v_gender, status));
            self.backfill_partner_roles(node, RoleToken::child_in_law(v_gender));
            return true;
        }

        // siblings, by number of shared natural parents
        let natural_parents = parent_roles
            .iter()
            .filter(|r| {
                r.base.is_parent() && r.depth == 0 && !r.inlaw && r.status == Status::Natural
            })
            .count();
        let mut sibling: Option<RoleToken> = None;
        if natural_parents == 2 {
            let same_twin_group = match (
                self.graph.get_twin_group_id(self.proband),
                self.graph.get_twin_group_id(node),
            ) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            };
            if same_twin_group {
                let identical =
                    p_gender == Gender::U || v_gender == Gender::U || v_gender == p_gender;
                let status = if identical { Status::Twin } else { Status::FraternalTwin };
                sibling = Some(RoleToken::sibling(v_gender, status));
            } else {
                sibling = Some(RoleToken::sibling(v_gender, Status::Natural));
            }
        } else if natural_parents == 1 {
            sibling = Some(RoleToken::sibling(v_gender, Status::Half));
        }
        if sibling.is_none()
            && parent_roles
                .iter()
                .any(|r| r.base.is_parent() && r.depth == 0 && !r.inlaw && r.status == Status::Step)
        {
            sibling = Some(RoleToken::sibling(v_gender, Status::Step));
        }
        if let Some(token) = sibling {
            self.roles.insert(node, token);
            self.backfill_partner_roles(node, RoleToken::sibling_in_law(v_gender));
            return true;
        }

        // children of children: grandchildren
        if parent_roles
            .iter()
            .any(|r| r.base.is_child() && r.depth == 0 && !r.inlaw)
        {
            self.roles.insert(node, RoleToken::grandchild(v_gender, 1));
            return true;
        }

        // children of siblings: nieces and nephews
        if parent_roles.iter().any(|r| r.base.is_sibling() && !r.inlaw) {
            self.roles.insert(node, RoleToken::nibling(v_gender, 0));
            return true;
        }

        // children of grandchildren
        if let Some(depth) = parent_roles
            .iter()
            .filter(|r| r.base.is_child() && r.depth > 0)
            .map(|r| r.depth)
            .min()
        {
            self.roles
                .insert(node, RoleToken::grandchild(v_gender, depth + 1));
            return true;
        }

        // children of grandparents: aunts and uncles
        let grandparents: Vec<&RoleToken> = parent_roles
            .iter()
            .filter(|r| r.base.is_parent() && r.depth > 0)
            .collect();
        if !grandparents.is_empty() {
            let side = grandparents
                .iter()
                .map(|r| r.side)
                .reduce(Side::reconcile)
                .unwrap_or_default();
            let depth = grandparents.iter().map(|r| r.depth).max().unwrap_or(1);
            self.roles
                .insert(node, RoleToken::pibling(side, depth - 1, v_gender));
            return true;
        }

        // children of aunts and uncles: cousins
        let piblings: Vec<&RoleToken> = parent_roles
            .iter()
            .filter(|r| r.base.is_pibling())
            .collect();
        if !piblings.is_empty() {
            let side = piblings
                .iter()
                .map(|r| r.side)
                .reduce(Side::reconcile)
                .unwrap_or_default();
            self.roles.insert(node, RoleToken::cousin(side));
            return true;
        }

        // children of nieces and nephews
        if let Some(depth) = parent_roles
            .iter()
            .filter(|r| r.base.is_nibling())
            .map(|r| r.depth)
            .min()
        {
            self.roles
                .insert(node, RoleToken::nibling(v_gender, depth + 1));
            return true;
        }

        // children of cousins stay cousins on the same side
        let cousins: Vec<&RoleToken> = parent_roles
            .iter()
            .filter(|r| r.base == Base::Cousin)
            .collect();
        if !cousins.is_empty() {
            let side = cousins
                .iter()
                .map(|r| r.side)
                .reduce(Side::reconcile)
                .unwrap_or_default();
            self.roles.insert(node, RoleToken::cousin(side));
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_engine::RelationshipTracker;
    use models::edges::DEFAULT_EDGE_WEIGHT;
    use models::properties::PersonProperties;

    struct Builder {
        graph: PedigreeGraph,
        tracker: RelationshipTracker,
    }

    impl Builder {
        fn new() -> Self {
            Builder {
                graph: PedigreeGraph::new(),
                tracker: RelationshipTracker::new(DEFAULT_EDGE_WEIGHT),
            }
        }

        fn person(&mut self, gender: Gender) -> VertexId {
            self.graph.add_person(PersonProperties::with_gender(gender))
        }

        fn link_child(&mut self, mother: VertexId, father: VertexId, child: VertexId) {
            let hub = self
                .tracker
                .create_or_get_childhub(&mut self.graph, mother, father)
                .unwrap();
            self.graph.add_edge(hub, child, DEFAULT_EDGE_WEIGHT).unwrap();
        }

        fn partner(&mut self, a: VertexId, b: VertexId) {
            // a partnership with no children still needs its hub
            self.tracker
                .create_or_get_childhub(&mut self.graph, a, b)
                .unwrap();
        }
    }

    fn code_of(roles: &KinshipRoles, id: VertexId) -> String {
        roles.code(id).unwrap_or_default()
    }

    #[test]
    fn should_label_maternal_grandparents() {
        let mut b = Builder::new();
        let proband = b.person(Gender::M);
        let mother = b.person(Gender::F);
        let father = b.person(Gender::M);
        let grandma = b.person(Gender::F);
        let grandpa = b.person(Gender::M);
        b.link_child(mother, father, proband);
        b.link_child(grandma, grandpa, mother);

        let roles = classify(&b.graph, proband);
        assert_eq!(code_of(&roles, proband), "ONESELF");
        assert_eq!(code_of(&roles, mother), "NMTH");
        assert_eq!(code_of(&roles, father), "NFTH");
        assert_eq!(code_of(&roles, grandma), "MGRMTH");
        assert_eq!(code_of(&roles, grandpa), "MGRFTH");
    }

    #[test]
    fn should_label_great_grandparents_with_depth_prefix() {
        let mut b = Builder::new();
        let proband = b.person(Gender::F);
        let mother = b.person(Gender::F);
        let father = b.person(Gender::M);
        let gm = b.person(Gender::F);
        let gf = b.person(Gender::M);
        let ggm = b.person(Gender::F);
        let ggf = b.person(Gender::M);
        b.link_child(mother, father, proband);
        b.link_child(gm, gf, father);
        b.link_child(ggm, ggf, gf);

        let roles = classify(&b.graph, proband);
        assert_eq!(code_of(&roles, gm), "PGRMTH");
        assert_eq!(code_of(&roles, ggm), "PGGRMTH");
        assert_eq!(code_of(&roles, ggf), "PGGRFTH");
    }

    #[test]
    fn should_classify_siblings_children_and_extended_family() {
        let mut b = Builder::new();
        let proband = b.person(Gender::M);
        let mother = b.person(Gender::F);
        let father = b.person(Gender::M);
        let sister = b.person(Gender::F);
        b.link_child(mother, father, proband);
        b.link_child(mother, father, sister);

        // proband's wife and daughter
        let wife = b.person(Gender::F);
        b.partner(proband, wife);
        let daughter = b.person(Gender::F);
        b.link_child(wife, proband, daughter);

        // sister's son
        let brother_in_law = b.person(Gender::M);
        let nephew = b.person(Gender::M);
        b.link_child(sister, brother_in_law, nephew);

        // maternal aunt and her daughter (cousin)
        let grandma = b.person(Gender::F);
        let grandpa = b.person(Gender::M);
        b.link_child(grandma, grandpa, mother);
        let aunt = b.person(Gender::F);
        b.link_child(grandma, grandpa, aunt);
        let uncle_by_marriage = b.person(Gender::M);
        let cousin = b.person(Gender::U);
        b.link_child(aunt, uncle_by_marriage, cousin);

        let roles = classify(&b.graph, proband);
        assert_eq!(code_of(&roles, sister), "NSIS");
        assert_eq!(code_of(&roles, wife), "SIGOTHR");
        assert_eq!(code_of(&roles, daughter), "DAU");
        assert_eq!(code_of(&roles, nephew), "NEPHEW");
        assert_eq!(code_of(&roles, brother_in_law), "BROINLAW");
        assert_eq!(code_of(&roles, aunt), "MAUNT");
        assert_eq!(code_of(&roles, cousin), "MCOUSN");
    }

    #[test]
    fn should_use_twin_variants_for_co_twins() {
        let mut b = Builder::new();
        let proband = b.person(Gender::M);
        let mother = b.person(Gender::F);
        let father = b.person(Gender::M);
        let twin = b.person(Gender::M);
        let fraternal = b.person(Gender::F);
        b.link_child(mother, father, proband);
        b.link_child(mother, father, twin);
        b.link_child(mother, father, fraternal);
        for id in [proband, twin, fraternal] {
            b.graph.person_mut(id).unwrap().twin_group = Some(1);
        }

        let roles = classify(&b.graph, proband);
        assert_eq!(code_of(&roles, twin), "TWINBRO");
        assert_eq!(code_of(&roles, fraternal), "FTWINSIS");
    }

    #[test]
    fn classification_is_deterministic() {
        let mut b = Builder::new();
        let proband = b.person(Gender::M);
        let mother = b.person(Gender::F);
        let father = b.person(Gender::M);
        let sib = b.person(Gender::U);
        b.link_child(mother, father, proband);
        b.link_child(mother, father, sib);

        let first = classify(&b.graph, proband);
        let second = classify(&b.graph, proband);
        assert_eq!(first.len(), second.len());
        for id in b.graph.person_ids() {
            assert_eq!(first.code(id), second.code(id));
        }
        assert!(!first.is_empty());
    }

    #[test]
    fn unconnected_person_stays_unclassified() {
        let mut b = Builder::new();
        let proband = b.person(Gender::M);
        let stranger = b.person(Gender::F);
        let roles = classify(&b.graph, proband);
        assert_eq!(roles.code(proband).as_deref(), Some("ONESELF"));
        assert!(roles.get(stranger).is_none());
    }

    #[test]
    fn grandchildren_and_deeper_generations() {
        let mut b = Builder::new();
        let proband = b.person(Gender::F);
        let husband = b.person(Gender::M);
        let son = b.person(Gender::M);
        b.link_child(proband, husband, son);
        let daughter_in_law = b.person(Gender::F);
        let grandson = b.person(Gender::M);
        b.link_child(daughter_in_law, son, grandson);
        let gs_wife = b.person(Gender::F);
        let great_granddaughter = b.person(Gender::F);
        b.link_child(gs_wife, grandson, great_granddaughter);

        let roles = classify(&b.graph, proband);
        assert_eq!(code_of(&roles, son), "SON");
        assert_eq!(code_of(&roles, grandson), "GRNDSON");
        assert_eq!(code_of(&roles, great_granddaughter), "GGRNDDAU");
    }
}

// converters/src/ga4gh.rs
//! GA4GH pedigree-profile front end.
//!
//! A Composition tagged with the GA4GH Pedigree profile bundles Patient
//! resources for the individuals and pairwise FamilyMemberHistory
//! resources carrying `REL:0xx` codes; Conditions and Observations hang
//! off the individuals. Compositions without the profile fall through to
//! the clinical front end.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Local, NaiveDate, Utc};
use graph_engine::PedigreeGraph;
use log::debug;
use models::errors::{GraphError, GraphResult};
use models::identifiers::VertexId;
use models::properties::{
    CarrierStatus, ChildlessStatus, Consanguinity, Gender, LifeStatus, PersonProperties,
};
use serde_json::{json, Value};
use terminology::role_codes::{GA4GH_REL_CODES, ROLE_TO_REL};
use terminology::systems;
use terminology::TerminologyResolver;

use crate::dates::{mdy_to_fhir, parse_deceased_string, parse_fhir_date};
use crate::json_util::{
    code_in_system, codings, contained_of_type, get_array, get_bool, get_i64, get_str,
    reference_str,
};
use crate::name_splitter::split_display_name;
use crate::reconcile::{ChildLinker, ParentLink, ReferenceMaps};
use crate::{fhir, Privacy};

/// HumanName `use` preference, least preferred first; names whose period
/// has ended are demoted below current ones.
const NAME_USE_ORDER: [&str; 12] = [
    "anonymous",
    "temp",
    "expired_nickname",
    "expired_",
    "expired_usual",
    "expired_official",
    "maiden",
    "old",
    "nickname",
    "",
    "usual",
    "official",
];

fn name_use_rank(use_value: &str) -> i32 {
    NAME_USE_ORDER
        .iter()
        .position(|&u| u == use_value)
        .map_or(-1, |p| p as i32)
}

/// One individual extracted from a contained Patient resource.
#[derive(Debug, Default)]
struct GaNode {
    record_id: String,
    props: PersonProperties,
    mother: Option<usize>,
    father: Option<usize>,
    partners: Vec<usize>,
    cpartners: Vec<usize>,
    vertex: VertexId,
}

/// Lazily allocated twin groups merged by union.
#[derive(Debug, Default)]
struct TwinTracker {
    next_group_id: u32,
    group_of: HashMap<usize, u32>,
    members: HashMap<u32, Vec<usize>>,
}

impl TwinTracker {
    fn new() -> Self {
        TwinTracker {
            next_group_id: 1,
            ..TwinTracker::default()
        }
    }

    fn join(&mut self, a: usize, b: usize) {
        match (self.group_of.get(&a).copied(), self.group_of.get(&b).copied()) {
            (None, None) => {
                let group = self.next_group_id;
                self.next_group_id += 1;
                self.group_of.insert(a, group);
                self.group_of.insert(b, group);
                self.members.insert(group, vec![a, b]);
            }
            (None, Some(group)) => {
                self.group_of.insert(a, group);
                self.members.entry(group).or_default().push(a);
            }
            (Some(group), None) => {
                self.group_of.insert(b, group);
                self.members.entry(group).or_default().push(b);
            }
            (Some(ga), Some(gb)) if ga != gb => {
                // merge the second group into the first
                let moved = self.members.remove(&gb).unwrap_or_default();
                for node in moved {
                    self.group_of.insert(node, ga);
                    self.members.entry(ga).or_default().push(node);
                }
            }
            _ => {}
        }
    }

    fn group_of(&self, node: usize) -> Option<u32> {
        self.group_of.get(&node).copied()
    }
}

fn has_pedigree_profile(resource: &Value) -> bool {
    resource
        .get("meta")
        .map(|meta| {
            get_array(meta, "profile")
                .iter()
                .any(|p| p.as_str() == Some(systems::PEDIGREE_PROFILE))
        })
        .unwrap_or(false)
}

/// Creates a pedigree graph from a GA4GH pedigree Composition; plain
/// Compositions and Lists fall back to the clinical importer.
pub fn import(input: &str, terminology: &dyn TerminologyResolver) -> GraphResult<PedigreeGraph> {
    let resource: Value =
        serde_json::from_str(input).map_err(|e| GraphError::MalformedInput(e.to_string()))?;

    match get_str(&resource, "resourceType") {
        Some("Composition") | Some("List") if !has_pedigree_profile(&resource) => {
            return fhir::import_value(&resource, terminology);
        }
        Some("Composition") => {}
        _ => return Err(GraphError::UnsupportedResource),
    }

    let patients = contained_of_type(&resource, "Patient");
    let family_histories = contained_of_type(&resource, "FamilyMemberHistory");
    let conditions = contained_of_type(&resource, "Condition");
    let observations = contained_of_type(&resource, "Observation");

    let mut nodes: Vec<GaNode> = Vec::new();
    let mut node_lookup: HashMap<String, usize> = HashMap::new();
    for patient in &patients {
        let node = extract_patient(patient);
        node_lookup.insert(format!("#{}", node.record_id), nodes.len());
        nodes.push(node);
    }

    let mut twins = TwinTracker::new();
    for fmh in &family_histories {
        apply_relationship(fmh, &mut nodes, &node_lookup, &mut twins);
    }
    for condition in &conditions {
        apply_condition(condition, &mut nodes, &node_lookup, terminology);
    }
    for observation in &observations {
        apply_observation(observation, &mut nodes, &node_lookup, terminology);
    }

    let mut graph = PedigreeGraph::new();
    let mut maps = ReferenceMaps::new();

    // first pass: add all vertices and assign vertex ids
    for (index, node) in nodes.iter_mut().enumerate() {
        if let Some(group) = twins.group_of(index) {
            node.props.twin_group = Some(group);
        }
        if node.record_id.is_empty() && !node.props.has_identity() {
            return Err(GraphError::MissingIdentity);
        }
        node.vertex = graph.add_person(node.props.clone());
        maps.register(
            Some(node.record_id.as_str()),
            node.props.first_name.as_deref(),
            node.props.external_id.as_deref(),
            node.vertex,
        )?;
    }

    // second pass: attach children through their parents' child hubs
    let mut linker = ChildLinker::new();
    for index in 0..nodes.len() {
        let (mother, father) = {
            let node = &nodes[index];
            (node.mother, node.father)
        };
        let to_link = |parent: Option<usize>, role: &str| -> GraphResult<Option<ParentLink>> {
            parent
                .map(|p| {
                    let reference = nodes[p].record_id.clone();
                    maps.resolve(&reference, role)
                        .map(|vertex| ParentLink { vertex, reference })
                })
                .transpose()
        };
        let mother = to_link(mother, "mother")?;
        let father = to_link(father, "father")?;
        linker.attach(&mut graph, nodes[index].vertex, mother, father)?;
    }

    // childless partner pairs still become Relationship vertices so the
    // partnership survives a round trip
    let mut pair_tracker = graph_engine::RelationshipTracker::new(models::edges::DEFAULT_EDGE_WEIGHT);
    for index in 0..nodes.len() {
        for &partner in &nodes[index].partners.clone() {
            if partner <= index {
                continue;
            }
            let (a, b) = (nodes[index].vertex, nodes[partner].vertex);
            if graph.get_relationship_node(a, b).is_none() {
                pair_tracker.create_or_get_childhub(&mut graph, a, b)?;
            }
        }
    }

    // consanguinity: explicit REL:030 pairs are confirmed
    for index in 0..nodes.len() {
        for &partner in &nodes[index].cpartners.clone() {
            if partner < index {
                continue;
            }
            let (a, b) = (nodes[index].vertex, nodes[partner].vertex);
            if let Some(rel) = graph.get_relationship_node(a, b) {
                if let Some(props) = graph.relationship_mut(rel) {
                    props.consangr = Consanguinity::Confirmed;
                }
            } else {
                debug!(
                    "consanguineous partners {} and {} have no relationship vertex",
                    a, b
                );
            }
        }
    }

    // partnerships sharing an ancestor within three generations default
    // to "possible" when not explicitly confirmed
    let rel_ids: Vec<VertexId> = graph.relationship_ids().collect();
    for rel in rel_ids {
        if graph.relationship(rel).map(|p| p.consangr) != Some(Consanguinity::None) {
            continue;
        }
        let partners = graph.partners_of(rel);
        if partners.len() == 2 && graph.shares_recent_ancestor(partners[0], partners[1], 3) {
            if let Some(props) = graph.relationship_mut(rel) {
                props.consangr = Consanguinity::Possible;
            }
        }
    }

    graph.validate()?;
    Ok(graph)
}

fn extract_patient(patient: &Value) -> GaNode {
    let mut node = GaNode {
        record_id: get_str(patient, "id").unwrap_or_default().to_string(),
        ..GaNode::default()
    };
    let props = &mut node.props;

    props.gender = match get_str(patient, "gender") {
        Some(code) => Gender::from_fhir_code(code),
        None => Gender::U,
    };

    // pick the most official current name
    let mut max_first_rank = -2;
    let mut max_last_rank = -2;
    let mut max_text_rank = -2;
    let mut name_text = String::new();
    let now = Utc::now();
    for human_name in get_array(patient, "name") {
        let mut use_value = get_str(human_name, "use").unwrap_or("").to_string();
        if let Some(end) = human_name.get("period").and_then(|p| get_str(p, "end")) {
            if period_ended(end, now) {
                use_value = format!("expired_{}", use_value);
            }
        }
        let rank = name_use_rank(&use_value);
        if let Some(family) = get_str(human_name, "family") {
            if rank > max_last_rank {
                props.last_name = Some(family.to_string());
                max_last_rank = rank;
            }
        }
        let given: Vec<&str> = get_array(human_name, "given")
            .iter()
            .filter_map(Value::as_str)
            .collect();
        if !given.is_empty() && rank > max_first_rank {
            props.first_name = Some(given.join(" "));
            max_first_rank = rank;
        }
        if let Some(text) = get_str(human_name, "text") {
            if rank > max_text_rank {
                name_text = text.to_string();
                max_text_rank = rank;
            }
        }
    }
    if (max_first_rank == -2 || max_last_rank == -2) && max_text_rank > -2 {
        let (first, last, maiden) = split_display_name(&name_text);
        if max_first_rank == -2 {
            props.first_name = first;
        }
        if max_last_rank == -2 {
            props.last_name = last;
        }
        if props.last_name_at_birth.is_none() {
            props.last_name_at_birth = maiden;
        }
    }

    for identifier in get_array(patient, "identifier") {
        if get_str(identifier, "system") == Some(systems::OPEN_PEDIGREE_EXTERNAL_ID) {
            props.external_id = get_str(identifier, "value").map(str::to_string);
            break;
        }
    }

    if let Some(born) = get_str(patient, "birthDate") {
        props.dob = parse_fhir_date(born);
    }
    if let Some(deceased) = get_str(patient, "deceasedDateTime") {
        props.dod = parse_fhir_date(deceased);
    }
    if get_bool(patient, "deceasedBoolean") {
        props.life_status = Some(LifeStatus::Deceased);
    }
    let mut check_unborn_extension = true;
    if let Some(text) = get_str(patient, "deceasedString") {
        let (status, weeks) = parse_deceased_string(text);
        if status.is_fetal() {
            check_unborn_extension = false;
        }
        props.life_status = Some(status);
        props.gestation_age = weeks;
    }
    if check_unborn_extension {
        for extension in get_array(patient, "extension") {
            if get_str(extension, "url") == Some(systems::PATIENT_UNBORN_EXTENSION) {
                if get_bool(extension, "valueBoolean") {
                    props.life_status = Some(LifeStatus::Unborn);
                }
                break;
            }
        }
    }

    node
}

fn period_ended(end: &str, now: DateTime<Utc>) -> bool {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(end) {
        return parsed.with_timezone(&Utc) < now;
    }
    if let Ok(date) = NaiveDate::parse_from_str(end, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return midnight.and_utc() < now;
        }
    }
    false
}

/// Applies one pairwise FamilyMemberHistory REL record to the node set.
fn apply_relationship(
    fmh: &Value,
    nodes: &mut [GaNode],
    node_lookup: &HashMap<String, usize>,
    twins: &mut TwinTracker,
) {
    let Some(first_ref) = fmh.get("patient").and_then(reference_str) else {
        return;
    };
    let mut second_ref: Option<&str> = None;
    for extension in get_array(fmh, "extension") {
        if get_str(extension, "url") == Some(systems::PATIENT_RECORD_EXTENSION) {
            second_ref = extension.get("valueReference").and_then(reference_str);
            break;
        }
    }
    let Some(second_ref) = second_ref else {
        return;
    };
    let rel = fmh
        .get("relationship")
        .and_then(|r| code_in_system(r, systems::GA4GH_REL));
    let Some(rel) = rel else {
        return;
    };
    let (Some(&first), Some(&second)) = (node_lookup.get(first_ref), node_lookup.get(second_ref))
    else {
        return;
    };

    match rel {
        "REL:027" => {
            // biological mother; an earlier lone mother was probably a
            // genderless parent, slide it into the father slot
            if nodes[first].mother.is_some() && nodes[first].father.is_none() {
                nodes[first].father = nodes[first].mother;
            }
            nodes[first].mother = Some(second);
        }
        "REL:028" => {
            if nodes[first].father.is_some() && nodes[first].mother.is_none() {
                nodes[first].mother = nodes[first].father;
            }
            nodes[first].father = Some(second);
        }
        "REL:003" | "REL:022" => {
            let gender = nodes[second].props.gender;
            if gender == Gender::M && nodes[first].father.is_none() {
                nodes[first].father = Some(second);
            } else if gender == Gender::F && nodes[first].mother.is_none() {
                nodes[first].mother = Some(second);
            } else if nodes[first].father.is_none() {
                nodes[first].father = Some(second);
            } else if nodes[first].mother.is_none() {
                nodes[first].mother = Some(second);
            }
        }
        "REL:026" => {
            nodes[first].partners.push(second);
            nodes[second].partners.push(first);
        }
        "REL:030" => {
            nodes[first].cpartners.push(second);
            nodes[second].cpartners.push(first);
        }
        "REL:009" | "REL:010" | "REL:011" => {
            let monozygotic = rel == "REL:010";
            nodes[first].props.monozygotic = monozygotic;
            nodes[second].props.monozygotic = monozygotic;
            twins.join(first, second);
        }
        _ => {}
    }
}

fn apply_condition(
    condition: &Value,
    nodes: &mut [GaNode],
    node_lookup: &HashMap<String, usize>,
    terminology: &dyn TerminologyResolver,
) {
    let Some(subject) = condition.get("subject").and_then(reference_str) else {
        return;
    };
    let Some(&index) = node_lookup.get(subject) else {
        return;
    };
    let Some(code) = condition.get("code") else {
        return;
    };
    let to_add = code_in_system(code, terminology.disorder_system())
        .or_else(|| get_str(code, "text"));
    if let Some(disorder) = to_add {
        nodes[index].props.disorders.push(disorder.to_string());
    }
}

fn apply_observation(
    observation: &Value,
    nodes: &mut [GaNode],
    node_lookup: &HashMap<String, usize>,
    terminology: &dyn TerminologyResolver,
) {
    let Some(subject) = observation.get("subject").and_then(reference_str) else {
        return;
    };
    let Some(&index) = node_lookup.get(subject) else {
        return;
    };
    let props = &mut nodes[index].props;

    let mut found = false;
    if let Some(concept) = observation.get("valueCodeableConcept") {
        for coding in codings(concept) {
            let system = get_str(coding, "system");
            let code = get_str(coding, "code");
            if system == Some(systems::SNOMED_CT) && code == Some(systems::SNOMED_CARRIER) {
                props.carrier_status = Some(CarrierStatus::Carrier);
                found = true;
                break;
            }
            if system == Some(systems::SNOMED_CT) && code == Some(systems::SNOMED_PRESYMPTOMATIC) {
                props.carrier_status = Some(CarrierStatus::Presymptomatic);
                found = true;
                break;
            }
            if system == Some(terminology.gene_system()) {
                if let Some(code) = code {
                    props.candidate_genes.push(code.to_string());
                }
                found = true;
                break;
            }
            if system == Some(terminology.phenotype_system()) {
                if let Some(code) = code {
                    props.hpo_terms.push(code.to_string());
                }
                found = true;
                break;
            }
        }
    }
    if !found {
        if let Some(code) = observation.get("code") {
            for coding in codings(code) {
                let system = get_str(coding, "system");
                let code_value = get_str(coding, "code");
                if system == Some(systems::SNOMED_CT)
                    && code_value == Some(systems::SNOMED_INFERTILE)
                {
                    props.childless_status = Some(ChildlessStatus::Infertile);
                    found = true;
                    break;
                }
                if system == Some(systems::SNOMED_CT)
                    && code_value == Some(systems::SNOMED_NUMBER_OF_OFFSPRING)
                    && get_i64(observation, "valueInteger") == Some(0)
                {
                    props.childless_status = Some(ChildlessStatus::Childless);
                    found = true;
                    break;
                }
            }
        }
    }
    if !found {
        if let Some(text) = get_str(observation, "valueString") {
            let id = get_str(observation, "id").unwrap_or_default();
            if id.contains("_clinical_") {
                props.hpo_terms.push(text.to_string());
            } else if id.contains("_gene_") {
                props.candidate_genes.push(text.to_string());
            }
        }
    }
}

// ---------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------

fn pat_ref_as_id(reference: &str) -> &str {
    reference.strip_prefix("Patient/").unwrap_or(reference)
}

fn pat_ref_as_ref(reference: &str) -> String {
    if reference.starts_with("Patient/") {
        reference.to_string()
    } else {
        format!("#{}", reference)
    }
}

struct Exporter<'a> {
    graph: &'a PedigreeGraph,
    privacy: Privacy,
    known_refs: Option<&'a HashMap<String, String>>,
    terminology: &'a dyn TerminologyResolver,
    individuals: HashMap<VertexId, Value>,
    relationships: Vec<Value>,
    conditions: HashMap<String, Vec<Value>>,
    observations: HashMap<String, Vec<Value>>,
    node_ref: HashMap<VertexId, String>,
}

/// Serializes the graph as a GA4GH pedigree Composition.
///
/// `known_patient_refs` maps external ids to existing FHIR Patient
/// references; `pedigree_image` embeds an SVG diagram as a contained
/// DocumentReference.
pub fn export(
    graph: &PedigreeGraph,
    privacy: Privacy,
    known_patient_refs: Option<&HashMap<String, String>>,
    pedigree_image: Option<&str>,
    terminology: &dyn TerminologyResolver,
) -> GraphResult<String> {
    let mut exporter = Exporter {
        graph,
        privacy,
        known_refs: known_patient_refs,
        terminology,
        individuals: HashMap::new(),
        relationships: Vec::new(),
        conditions: HashMap::new(),
        observations: HashMap::new(),
        node_ref: HashMap::new(),
    };

    let proband_ref = exporter.process_tree_node(VertexId::PROBAND);
    // the recursion only climbs the tree; sweep up anything unreached
    for person in graph.person_ids() {
        exporter.process_tree_node(person);
    }

    let proband_reference = json!({
        "type": "Patient",
        "reference": pat_ref_as_ref(&proband_ref),
    });

    let mut contained: Vec<Value> = Vec::new();

    let mut reason_entries: Vec<Value> = Vec::new();
    for condition in exporter.conditions.get(&proband_ref).into_iter().flatten() {
        reason_entries.push(json!({
            "type": "Condition",
            "reference": format!("#{}", get_str(condition, "id").unwrap_or_default()),
        }));
    }

    let mut individual_entries: Vec<Value> = Vec::new();
    let mut individual_ids: Vec<VertexId> = exporter.individuals.keys().copied().collect();
    individual_ids.sort_unstable();
    for id in individual_ids {
        contained.push(exporter.individuals.remove(&id).expect("individual"));
        individual_entries.push(json!({
            "type": "Patient",
            "reference": pat_ref_as_ref(&exporter.node_ref[&id]),
        }));
    }

    let mut relationship_entries: Vec<Value> = Vec::new();
    for relation in &exporter.relationships {
        relationship_entries.push(json!({
            "type": "FamilyMemberHistory",
            "reference": format!("#{}", get_str(relation, "id").unwrap_or_default()),
        }));
        contained.push(relation.clone());
    }

    let mut other_entries: Vec<Value> = Vec::new();
    let mut condition_refs: Vec<&String> = exporter.conditions.keys().collect();
    condition_refs.sort();
    for key in condition_refs {
        for condition in &exporter.conditions[key] {
            other_entries.push(json!({
                "type": "Condition",
                "reference": format!("#{}", get_str(condition, "id").unwrap_or_default()),
            }));
            contained.push(condition.clone());
        }
    }
    let mut observation_refs: Vec<&String> = exporter.observations.keys().collect();
    observation_refs.sort();
    for key in observation_refs {
        for observation in &exporter.observations[key] {
            other_entries.push(json!({
                "type": "Observation",
                "reference": format!("#{}", get_str(observation, "id").unwrap_or_default()),
            }));
            contained.push(observation.clone());
        }
    }

    let mut sections = vec![
        json!({
            "title": "Proband",
            "code": { "coding": [{ "system": systems::PEDIGREE_SECTION_TYPE, "code": "proband" }] },
            "entry": [proband_reference.clone()],
        }),
        json!({
            "title": "Reason collected",
            "code": { "coding": [{ "system": systems::PEDIGREE_SECTION_TYPE, "code": "reasonCollected" }] },
            "entry": reason_entries,
        }),
        json!({
            "title": "Individuals",
            "code": { "coding": [{ "system": systems::PEDIGREE_SECTION_TYPE, "code": "individuals" }] },
            "entry": individual_entries,
        }),
        json!({
            "title": "Relationships",
            "code": { "coding": [{ "system": systems::PEDIGREE_SECTION_TYPE, "code": "relationships" }] },
            "entry": relationship_entries,
        }),
        json!({
            "title": "Other",
            "code": { "coding": [{ "system": systems::PEDIGREE_SECTION_TYPE, "code": "other" }] },
            "entry": other_entries,
        }),
    ];

    if let Some(image) = pedigree_image {
        sections.push(json!({
            "title": "Pedigree Diagram",
            "code": { "coding": [{ "system": systems::PEDIGREE_SECTION_TYPE, "code": "pedigreeImage" }] },
            "entry": [{ "type": "DocumentReference", "reference": "#pedigreeImage" }],
        }));
        contained.push(json!({
            "id": "pedigreeImage",
            "resourceType": "DocumentReference",
            "status": "current",
            "docStatus": "preliminary",
            "subject": proband_reference,
            "description": "Pedigree Diagram of Family in SVG format",
            "content": {
                "attachment": {
                    "contentType": "image/svg+xml",
                    "data": BASE64.encode(image),
                }
            },
        }));
    }

    let composition = json!({
        "resourceType": "Composition",
        "meta": { "profile": [systems::PEDIGREE_PROFILE] },
        "status": "final",
        "type": { "coding": [{ "system": systems::SNOMED_CT, "code": "422432008" }] },
        "subject": json!({
            "type": "Patient",
            "reference": pat_ref_as_ref(&proband_ref),
        }),
        "date": Local::now().format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
        "title": "Pedigree",
        "section": sections,
        "contained": contained,
    });

    Ok(serde_json::to_string_pretty(&composition)?)
}

impl<'a> Exporter<'a> {
    /// Builds the individual for one person and the relationship records
    /// to every immediate relative, recursing into relatives first so
    /// their references exist. Memoized by vertex id.
    fn process_tree_node(&mut self, index: VertexId) -> String {
        if let Some(reference) = self.node_ref.get(&index) {
            return reference.clone();
        }
        let props = self.graph.person(index).expect("person vertex").clone();
        let reference = match (self.known_refs, &props.external_id) {
            (Some(refs), Some(external_id)) => refs
                .get(external_id)
                .cloned()
                .unwrap_or_else(|| format!("PI_{}", index.index())),
            _ => format!("PI_{}", index.index()),
        };
        self.node_ref.insert(index, reference.clone());
        self.individuals
            .insert(index, self.build_individual(&reference, &props));
        self.add_conditions(&reference, &props);
        self.add_observations(&reference, &props);

        let mut to_build: Vec<(VertexId, &'static str)> = Vec::new();

        let adopted = props.adopted;
        let (mother, father) = self.graph.mother_father_slots(index);
        if let Some(m) = mother {
            to_build.push((m, if adopted { "ADOPTMTH" } else { "NMTH" }));
        }
        if let Some(f) = father {
            to_build.push((f, if adopted { "ADOPTFTH" } else { "NFTH" }));
        }
        for parent in self.graph.get_parents(index) {
            if Some(parent) != mother && Some(parent) != father {
                to_build.push((parent, if adopted { "ADOPTPRN" } else { "NPRN" }));
            }
        }

        for partner in self.graph.get_all_partners(index) {
            if self.node_ref.contains_key(&partner) {
                continue;
            }
            let mut role = "SIGOTHR";
            if let Some(rel) = self.graph.get_relationship_node(index, partner) {
                let consangr = self
                    .graph
                    .relationship(rel)
                    .map(|p| p.consangr)
                    .unwrap_or_default();
                // "possible" means second cousins or closer: look for a
                // shared ancestor within three generations
                let consanguineous = match consangr {
                    Consanguinity::Confirmed => true,
                    _ => self.graph.shares_recent_ancestor(index, partner, 3),
                };
                if consanguineous {
                    role = "CONSANG";
                }
            }
            to_build.push((partner, role));
        }

        if self.graph.get_twin_group_id(index).is_some() {
            for twin in self.graph.get_all_twins_of(index) {
                if twin == index || self.node_ref.contains_key(&twin) {
                    continue;
                }
                let twin_props = self.graph.person(twin).expect("person vertex");
                let role = match (twin_props.gender, twin_props.monozygotic) {
                    (Gender::F, true) => "TWINSIS",
                    (Gender::F, false) => "FTWINSIS",
                    (Gender::M, true) => "TWINBRO",
                    (Gender::M, false) => "FTWINBRO",
                    _ => "TWIN",
                };
                to_build.push((twin, role));
            }
        }

        for (relative, role) in to_build {
            let relative_ref = self.process_tree_node(relative);
            self.relationships
                .push(build_relation(&reference, &relative_ref, role));
        }

        reference
    }

    fn build_individual(&self, reference: &str, props: &PersonProperties) -> Value {
        let mut patient = json!({
            "id": pat_ref_as_id(reference),
            "resourceType": "Patient",
            "meta": { "profile": [systems::PEDIGREE_INDIVIDUAL_PROFILE] },
            "gender": props.gender.fhir_code(),
        });
        let target = patient.as_object_mut().expect("patient object");

        let mut unborn = false;
        if self.privacy.include_personal() {
            if let Some(dob) = props.dob.as_deref().and_then(mdy_to_fhir) {
                target.insert("birthDate".to_string(), json!(dob));
            }
            if let Some(dod) = props.dod.as_deref().and_then(mdy_to_fhir) {
                target.insert("deceasedDateTime".to_string(), json!(dod));
            } else if let Some(status) = props.life_status {
                if status.is_fetal() {
                    unborn = true;
                    let text = match &props.gestation_age {
                        Some(weeks) => format!("{} {} weeks", status.as_str(), weeks),
                        None => status.as_str().to_string(),
                    };
                    target.insert("deceasedString".to_string(), json!(text));
                } else {
                    target.insert("deceasedBoolean".to_string(), json!(true));
                }
            }
        } else if props.dod.is_some() {
            target.insert("deceasedBoolean".to_string(), json!(true));
        } else if let Some(status) = props.life_status {
            if status.is_fetal() {
                unborn = true;
                let text = match &props.gestation_age {
                    Some(weeks) => format!("{} {} weeks", status.as_str(), weeks),
                    None => status.as_str().to_string(),
                };
                target.insert("deceasedString".to_string(), json!(text));
            } else {
                target.insert("deceasedBoolean".to_string(), json!(true));
            }
        }

        target.insert(
            "extension".to_string(),
            json!([{
                "url": systems::PATIENT_UNBORN_EXTENSION,
                "valueBoolean": unborn,
            }]),
        );

        if props.twin_group.is_some() {
            target.insert("multipleBirthBoolean".to_string(), json!(true));
        }

        if let Some(external_id) = &props.external_id {
            target.insert(
                "identifier".to_string(),
                json!([{
                    "system": systems::OPEN_PEDIGREE_EXTERNAL_ID,
                    "value": external_id,
                }]),
            );
        }

        if self.privacy.include_personal() {
            let mut names: Vec<Value> = Vec::new();
            if props.last_name.is_some() || props.first_name.is_some() {
                let mut name = serde_json::Map::new();
                if let Some(last) = &props.last_name {
                    name.insert("family".to_string(), json!(last));
                }
                if let Some(first) = &props.first_name {
                    name.insert("given".to_string(), json!([first]));
                }
                names.push(Value::Object(name));
            }
            if let Some(maiden) = &props.last_name_at_birth {
                if props.last_name.as_deref() != Some(maiden.as_str()) {
                    names.push(json!({ "use": "old", "family": maiden }));
                }
            }
            if !names.is_empty() {
                target.insert("name".to_string(), Value::Array(names));
            }
        }

        patient
    }

    fn add_conditions(&mut self, reference: &str, props: &PersonProperties) {
        let mut conditions: Vec<Value> = Vec::new();
        let disorder_system = self.terminology.disorder_system();
        for (i, disorder) in props.disorders.iter().enumerate() {
            let code = if self.terminology.has_display(disorder_system, disorder) {
                json!({
                    "coding": [{
                        "system": disorder_system,
                        "code": disorder,
                        "display": self.terminology.display_or_code(disorder_system, disorder),
                    }]
                })
            } else {
                json!({ "text": disorder })
            };
            conditions.push(json!({
                "resourceType": "Condition",
                "id": format!("{}_cond_{}", pat_ref_as_id(reference), i),
                "subject": pat_ref_as_ref(reference),
                "code": code,
            }));
        }
        self.conditions.insert(reference.to_string(), conditions);
    }

    fn add_observations(&mut self, reference: &str, props: &PersonProperties) {
        let mut observations: Vec<Value> = Vec::new();
        let ref_id = pat_ref_as_id(reference).to_string();
        let subject = pat_ref_as_ref(reference);

        let phenotype_system = self.terminology.phenotype_system();
        for (j, term) in props.hpo_terms.iter().enumerate() {
            let mut observation = json!({
                "resourceType": "Observation",
                "id": format!("{}_clinical_{}", ref_id, j),
                "status": "preliminary",
                "subject": subject.as_str(),
            });
            let value = if self.terminology.has_display(phenotype_system, term) {
                json!({ "valueCodeableConcept": { "coding": [{
                    "system": phenotype_system,
                    "code": term,
                    "display": self.terminology.display_or_code(phenotype_system, term),
                }]}})
            } else {
                json!({ "valueString": term })
            };
            merge(&mut observation, value);
            observations.push(observation);
        }

        let gene_system = self.terminology.gene_system();
        for (j, gene) in props.candidate_genes.iter().enumerate() {
            let mut observation = json!({
                "resourceType": "Observation",
                "id": format!("{}_gene_{}", ref_id, j),
                "status": "preliminary",
                "subject": subject.as_str(),
            });
            let value = if self.terminology.has_display(gene_system, gene) {
                json!({ "valueCodeableConcept": { "coding": [{
                    "system": gene_system,
                    "code": gene,
                    "display": self.terminology.display_or_code(gene_system, gene),
                }]}})
            } else {
                json!({ "valueString": gene })
            };
            merge(&mut observation, value);
            observations.push(observation);
        }

        if let Some(carrier) = props.carrier_status {
            let (code, display) = match carrier {
                CarrierStatus::Carrier => {
                    (systems::SNOMED_CARRIER, "Carrier state, disease expressed")
                }
                CarrierStatus::Presymptomatic => (
                    systems::SNOMED_PRESYMPTOMATIC,
                    "Carrier state, disease not expressed",
                ),
            };
            observations.push(json!({
                "resourceType": "Observation",
                "id": format!("{}_carrierStatus", ref_id),
                "status": "preliminary",
                "valueCodeableConcept": {
                    "coding": [{ "system": systems::SNOMED_CT, "code": code, "display": display }]
                },
                "subject": subject.as_str(),
            }));
        }

        if let Some(childless) = props.childless_status {
            let observation = match childless {
                ChildlessStatus::Childless => json!({
                    "resourceType": "Observation",
                    "id": format!("{}_childlessStatus", ref_id),
                    "status": "preliminary",
                    "code": {
                        "coding": [{
                            "system": systems::SNOMED_CT,
                            "code": systems::SNOMED_NUMBER_OF_OFFSPRING,
                            "display": "Number of offspring",
                        }]
                    },
                    "valueInteger": 0,
                    "subject": subject.as_str(),
                }),
                ChildlessStatus::Infertile => json!({
                    "resourceType": "Observation",
                    "id": format!("{}_childlessStatus", ref_id),
                    "status": "preliminary",
                    "code": {
                        "coding": [{
                            "system": systems::SNOMED_CT,
                            "code": systems::SNOMED_INFERTILE,
                            "display": "Infertile",
                        }]
                    },
                    "subject": subject.as_str(),
                }),
            };
            observations.push(observation);
        }

        self.observations.insert(reference.to_string(), observations);
    }
}

fn merge(target: &mut Value, addition: Value) {
    if let (Some(target), Some(addition)) = (target.as_object_mut(), addition.as_object()) {
        for (key, value) in addition {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn build_relation(reference: &str, relative_ref: &str, role: &str) -> Value {
    let rel_code = ROLE_TO_REL.get(role).copied().unwrap_or("REL:001");
    let coding = GA4GH_REL_CODES
        .get(rel_code)
        .unwrap_or(&GA4GH_REL_CODES["REL:001"]);
    json!({
        "resourceType": "FamilyMemberHistory",
        "id": format!(
            "{}_{}_Relationship",
            pat_ref_as_id(reference),
            pat_ref_as_id(relative_ref)
        ),
        "meta": { "profile": [systems::PEDIGREE_RELATIONSHIP_PROFILE] },
        "extension": [{
            "url": systems::PATIENT_RECORD_EXTENSION,
            "valueReference": { "reference": pat_ref_as_ref(relative_ref) },
        }],
        "status": "completed",
        "patient": { "reference": pat_ref_as_ref(reference) },
        "relationship": { "coding": [coding.to_json()] },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use terminology::NullResolver;

    fn patient(id: &str, gender: &str, given: &str) -> Value {
        json!({
            "resourceType": "Patient",
            "id": id,
            "meta": { "profile": [systems::PEDIGREE_INDIVIDUAL_PROFILE] },
            "gender": gender,
            "name": [{ "given": [given] }],
        })
    }

    fn relation(id: &str, patient_ref: &str, relative_ref: &str, rel: &str) -> Value {
        json!({
            "resourceType": "FamilyMemberHistory",
            "id": id,
            "status": "completed",
            "patient": { "reference": patient_ref },
            "extension": [{
                "url": systems::PATIENT_RECORD_EXTENSION,
                "valueReference": { "reference": relative_ref },
            }],
            "relationship": {
                "coding": [{ "system": systems::GA4GH_REL, "code": rel }]
            },
        })
    }

    fn composition(contained: Vec<Value>) -> String {
        json!({
            "resourceType": "Composition",
            "meta": { "profile": [systems::PEDIGREE_PROFILE] },
            "status": "final",
            "contained": contained,
        })
        .to_string()
    }

    #[test]
    fn should_import_parents_via_rel_codes() {
        let input = composition(vec![
            patient("p0", "male", "Kim"),
            patient("p1", "female", "Ann"),
            patient("p2", "male", "Bob"),
            relation("r0", "#p0", "#p1", "REL:027"),
            relation("r1", "#p0", "#p2", "REL:028"),
        ]);
        let graph = import(&input, &NullResolver).unwrap();
        assert_eq!(graph.person_ids().count(), 3);
        let mother = graph.get_mother(VertexId::PROBAND).unwrap();
        assert_eq!(graph.person(mother).unwrap().first_name.as_deref(), Some("Ann"));
    }

    #[test]
    fn twin_groups_merge_transitively() {
        let input = composition(vec![
            patient("p0", "male", "Kim"),
            patient("p1", "female", "Ann"),
            patient("p2", "male", "Bob"),
            patient("a", "male", "Al"),
            patient("b", "male", "Ben"),
            patient("c", "male", "Cal"),
            relation("r0", "#a", "#p1", "REL:027"),
            relation("r1", "#a", "#p2", "REL:028"),
            relation("r2", "#b", "#p1", "REL:027"),
            relation("r3", "#b", "#p2", "REL:028"),
            relation("r4", "#c", "#p1", "REL:027"),
            relation("r5", "#c", "#p2", "REL:028"),
            relation("t0", "#a", "#b", "REL:009"),
            relation("t1", "#b", "#c", "REL:009"),
        ]);
        let graph = import(&input, &NullResolver).unwrap();
        let a = VertexId::new(3);
        let c = VertexId::new(5);
        assert_eq!(graph.get_twin_group_id(a), graph.get_twin_group_id(c));
        assert!(graph.get_twin_group_id(a).is_some());
        assert!(graph.get_all_twins_of(a).contains(&c));
        assert_eq!(graph.get_all_twins_of(a).len(), 3);
    }

    #[test]
    fn rel030_confirms_consanguinity() {
        let input = composition(vec![
            patient("p0", "male", "Kim"),
            patient("p1", "female", "Ann"),
            patient("k", "female", "Kid"),
            relation("r0", "#p0", "#p1", "REL:026"),
            relation("r1", "#p0", "#p1", "REL:030"),
            relation("r2", "#k", "#p1", "REL:027"),
            relation("r3", "#k", "#p0", "REL:028"),
        ]);
        let graph = import(&input, &NullResolver).unwrap();
        let rel = graph
            .get_relationship_node(VertexId::new(0), VertexId::new(1))
            .unwrap();
        assert_eq!(
            graph.relationship(rel).unwrap().consangr,
            Consanguinity::Confirmed
        );
    }

    #[test]
    fn falls_back_to_clinical_importer_without_profile() {
        let input = json!({
            "resourceType": "Composition",
            "status": "preliminary",
            "contained": [{
                "resourceType": "FamilyMemberHistory",
                "id": "FMH_0",
                "name": "John Doe",
            }],
        })
        .to_string();
        let graph = import(&input, &NullResolver).unwrap();
        assert_eq!(graph.person_ids().count(), 1);
    }

    #[test]
    fn should_reject_non_composition_resources() {
        let err = import(
            &json!({ "resourceType": "Bundle" }).to_string(),
            &NullResolver,
        )
        .unwrap_err();
        assert!(matches!(err, GraphError::UnsupportedResource));
    }

    #[test]
    fn round_trips_a_nuclear_family() {
        let input = composition(vec![
            patient("p0", "male", "Kim"),
            patient("p1", "female", "Ann"),
            patient("p2", "male", "Bob"),
            patient("p3", "female", "Sue"),
            relation("r0", "#p0", "#p1", "REL:027"),
            relation("r1", "#p0", "#p2", "REL:028"),
            relation("r2", "#p3", "#p1", "REL:027"),
            relation("r3", "#p3", "#p2", "REL:028"),
        ]);
        let graph = import(&input, &NullResolver).unwrap();
        let output = export(&graph, Privacy::All, None, None, &NullResolver).unwrap();
        let reimported = import(&output, &NullResolver).unwrap();

        assert_eq!(reimported.person_ids().count(), 4);
        let proband = VertexId::PROBAND;
        let mother = reimported.get_mother(proband).unwrap();
        let father = reimported.get_father(proband).unwrap();
        assert_eq!(
            reimported.person(mother).unwrap().first_name.as_deref(),
            Some("Ann")
        );
        assert_eq!(
            reimported.person(father).unwrap().first_name.as_deref(),
            Some("Bob")
        );
        // the sibling shares both parent edges
        let sibling = reimported
            .person_ids()
            .find(|&id| {
                reimported.person(id).unwrap().first_name.as_deref() == Some("Sue")
            })
            .unwrap();
        assert_eq!(reimported.get_mother(sibling), Some(mother));
        assert_eq!(reimported.get_father(sibling), Some(father));
    }

    #[test]
    fn shared_great_grandparents_mark_partnership_possible() {
        // partners p0 and p1 both descend from the couple (g, h)
        let mut contained = vec![
            patient("p0", "male", "Kim"),
            patient("p1", "female", "Ann"),
            patient("k", "male", "Kid"),
            patient("m0", "female", "M0"),
            patient("m1", "female", "M1"),
            patient("gm0", "female", "GM0"),
            patient("gm1", "female", "GM1"),
            patient("g", "female", "Great"),
            patient("h", "male", "Grand"),
        ];
        contained.extend(vec![
            // child links proband/partner so a relationship vertex exists
            relation("r0", "#k", "#p0", "REL:028"),
            relation("r1", "#k", "#p1", "REL:027"),
            // p0's line: m0 -> gm0 -> (g, h)
            relation("r2", "#p0", "#m0", "REL:027"),
            relation("r3", "#m0", "#gm0", "REL:027"),
            relation("r4", "#gm0", "#g", "REL:027"),
            relation("r5", "#gm0", "#h", "REL:028"),
            // p1's line: m1 -> gm1 -> (g, h)
            relation("r6", "#p1", "#m1", "REL:027"),
            relation("r7", "#m1", "#gm1", "REL:027"),
            relation("r8", "#gm1", "#g", "REL:027"),
            relation("r9", "#gm1", "#h", "REL:028"),
        ]);
        let graph = import(&composition(contained), &NullResolver).unwrap();
        let rel = graph
            .get_relationship_node(VertexId::new(0), VertexId::new(1))
            .unwrap();
        assert_eq!(
            graph.relationship(rel).unwrap().consangr,
            Consanguinity::Possible
        );
    }

    #[test]
    fn embeds_the_pedigree_image_as_base64() {
        let mut graph = PedigreeGraph::new();
        graph.add_person(PersonProperties::with_gender(Gender::F));
        let output = export(
            &graph,
            Privacy::All,
            None,
            Some("<svg></svg>"),
            &NullResolver,
        )
        .unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        let doc = get_array(&value, "contained")
            .iter()
            .find(|r| get_str(r, "resourceType") == Some("DocumentReference"))
            .unwrap()
            .clone();
        let data = doc["content"]["attachment"]["data"].as_str().unwrap();
        assert_eq!(BASE64.decode(data).unwrap(), b"<svg></svg>");
    }
}

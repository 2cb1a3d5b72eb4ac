// converters/src/fhir.rs
//! Clinical FHIR front end: a Composition (or List) bundling
//! FamilyMemberHistory resources with genetics-parent and
//! genetics-observation extensions.

use std::collections::HashMap;

use chrono::Local;
use graph_engine::PedigreeGraph;
use models::errors::{GraphError, GraphResult};
use models::identifiers::VertexId;
use models::properties::{
    CarrierStatus, ChildlessStatus, Gender, LifeStatus, PersonProperties,
};
use serde_json::{json, Value};
use terminology::role_codes::{role_coding, SEX_CODES};
use terminology::systems;
use terminology::TerminologyResolver;

use crate::dates::{mdy_to_fhir, parse_deceased_string, parse_fhir_date};
use crate::json_util::{
    code_in_system, codings, contained_lookup, contained_of_type, get_array, get_bool, get_i64,
    get_str, reference_str,
};
use crate::kinship::classify;
use crate::name_splitter::split_display_name;
use crate::reconcile::{ChildLinker, ParentLink, ReferenceMaps};
use crate::Privacy;

const MOTHER_CODES: [&str; 4] = ["NMTH", "MTH", "STPMTH", "ADOPTM"];
const FATHER_CODES: [&str; 4] = ["NFTH", "FTH", "STPFTH", "ADOPTF"];

/// One extracted FamilyMemberHistory record, before cross-references are
/// resolved.
#[derive(Debug, Default)]
struct FmhNode {
    record_id: Option<String>,
    props: PersonProperties,
    mother: Option<String>,
    father: Option<String>,
    vertex: VertexId,
}

/// Creates a pedigree graph from a clinical FHIR Composition or List.
pub fn import(input: &str, terminology: &dyn TerminologyResolver) -> GraphResult<PedigreeGraph> {
    let resource: Value =
        serde_json::from_str(input).map_err(|e| GraphError::MalformedInput(e.to_string()))?;
    import_value(&resource, terminology)
}

pub(crate) fn import_value(
    resource: &Value,
    terminology: &dyn TerminologyResolver,
) -> GraphResult<PedigreeGraph> {
    match get_str(resource, "resourceType") {
        Some("Composition") | Some("List") => {}
        _ => return Err(GraphError::UnsupportedResource),
    }

    let contained = contained_lookup(resource);
    let family_histories = contained_of_type(resource, "FamilyMemberHistory");

    let subject_resource = resource
        .get("subject")
        .and_then(reference_str)
        .filter(|r| r.starts_with('#'))
        .and_then(|r| contained.get(r).copied());

    let mut graph = PedigreeGraph::new();
    let mut maps = ReferenceMaps::new();
    let mut nodes: Vec<FmhNode> = Vec::new();

    // first pass: add all vertices and assign vertex ids
    for fmh in &family_histories {
        let mut node = extract_family_member(fmh, subject_resource, &contained, terminology);
        if node.record_id.is_none() && !node.props.has_identity() {
            return Err(GraphError::MissingIdentity);
        }
        node.vertex = graph.add_person(node.props.clone());
        maps.register(
            node.record_id.as_deref(),
            node.props.first_name.as_deref(),
            node.props.external_id.as_deref(),
            node.vertex,
        )?;
        nodes.push(node);
    }

    // second pass: resolve parents and attach children
    let mut linker = ChildLinker::new();
    for node in &nodes {
        let mother = node
            .mother
            .as_deref()
            .map(|reference| {
                maps.resolve(reference, "mother").map(|vertex| ParentLink {
                    vertex,
                    reference: reference.to_string(),
                })
            })
            .transpose()?;
        let father = node
            .father
            .as_deref()
            .map(|reference| {
                maps.resolve(reference, "father").map(|vertex| ParentLink {
                    vertex,
                    reference: reference.to_string(),
                })
            })
            .transpose()?;
        linker.attach(&mut graph, node.vertex, mother, father)?;
    }

    graph.validate()?;
    Ok(graph)
}

fn parse_sex(resource: &Value) -> Option<Gender> {
    let sex = resource.get("sex")?;
    if let Some(code) = code_in_system(sex, systems::ADMINISTRATIVE_GENDER) {
        return match code {
            "male" => Some(Gender::M),
            "female" => Some(Gender::F),
            _ => Some(Gender::U),
        };
    }
    match get_str(sex, "text").map(str::to_lowercase).as_deref() {
        Some("male") => Some(Gender::M),
        Some("female") => Some(Gender::F),
        _ => None,
    }
}

/// Disorder extraction: the disorder-system code wins, then any coded
/// entry with a display, then plain text.
fn extract_conditions(fmh: &Value, disorder_system: &str) -> Vec<String> {
    let mut disorders = Vec::new();
    for condition in get_array(fmh, "condition") {
        let Some(code) = condition.get("code") else {
            continue;
        };
        let coded = codings(code);
        if !coded.is_empty() {
            if let Some(found) = code_in_system(code, disorder_system) {
                disorders.push(found.to_string());
                continue;
            }
            let first = &coded[0];
            if get_str(first, "display").is_some() {
                if let Some(c) = get_str(first, "code") {
                    disorders.push(c.to_string());
                    continue;
                }
            }
        }
        if let Some(text) = get_str(code, "text") {
            disorders.push(text.to_string());
        }
    }
    disorders
}

/// Classifies one genetics-parent extension as mother/father/parent plus
/// the resource reference it points at.
fn parse_parent_extension(
    extension: &Value,
    contained: &HashMap<String, &Value>,
) -> Option<(String, String)> {
    let mut parent_type: Option<&str> = None;
    let mut reference: Option<&str> = None;
    for sub in get_array(extension, "extension") {
        match get_str(sub, "url") {
            Some("type") => {
                let Some(concept) = sub.get("valueCodeableConcept") else {
                    continue;
                };
                for coding in codings(concept) {
                    if get_str(coding, "system") == Some(systems::V3_ROLE_CODE) {
                        let code = get_str(coding, "code").unwrap_or_default();
                        parent_type = Some(if MOTHER_CODES.contains(&code) {
                            "mother"
                        } else if FATHER_CODES.contains(&code) {
                            "father"
                        } else {
                            "parent"
                        });
                        break;
                    } else if let Some(display) = get_str(coding, "display") {
                        let lower = display.to_lowercase();
                        if lower.contains("mother") {
                            parent_type = Some("mother");
                        } else if lower.contains("father") {
                            parent_type = Some("father");
                        }
                    }
                }
                if parent_type.is_none() {
                    if let Some(text) = get_str(concept, "text") {
                        let lower = text.to_lowercase();
                        if lower.contains("mother") {
                            parent_type = Some("mother");
                        } else if lower.contains("father") {
                            parent_type = Some("father");
                        }
                    }
                }
                if parent_type.is_none() {
                    parent_type = Some("parent");
                }
            }
            Some("reference") => {
                reference = sub.get("valueReference").and_then(reference_str);
            }
            _ => {}
        }
    }
    let reference = reference?;
    let mut parent_type = parent_type.unwrap_or("parent").to_string();
    if parent_type == "parent" {
        // fall back to the referenced resource's recorded sex
        if let Some(parent_resource) = contained.get(reference) {
            match parse_sex(parent_resource) {
                Some(Gender::M) => parent_type = "father".to_string(),
                Some(Gender::F) => parent_type = "mother".to_string(),
                _ => {}
            }
        }
    }
    Some((parent_type, reference.trim_start_matches('#').to_string()))
}

/// Applies one referenced genetics observation to the person properties.
fn apply_observation(
    observation: &Value,
    props: &mut PersonProperties,
    terminology: &dyn TerminologyResolver,
) {
    let id = get_str(observation, "id").unwrap_or_default();

    if id.starts_with("fmh_carrierStatus") {
        if let Some(concept) = observation.get("valueCodeableConcept") {
            for coding in codings(concept) {
                if get_str(coding, "system") != Some(systems::SNOMED_CT) {
                    continue;
                }
                match get_str(coding, "code") {
                    Some(systems::SNOMED_CARRIER) => {
                        props.carrier_status = Some(CarrierStatus::Carrier);
                        break;
                    }
                    Some(systems::SNOMED_PRESYMPTOMATIC) => {
                        props.carrier_status = Some(CarrierStatus::Presymptomatic);
                        break;
                    }
                    _ => {}
                }
            }
        }
        return;
    }
    if id.starts_with("fmh_childlessStatus") {
        if let Some(code) = observation.get("code") {
            for coding in codings(code) {
                if get_str(coding, "system") != Some(systems::SNOMED_CT) {
                    continue;
                }
                match get_str(coding, "code") {
                    Some(systems::SNOMED_INFERTILE) => {
                        props.childless_status = Some(ChildlessStatus::Infertile);
                        break;
                    }
                    Some(systems::SNOMED_NUMBER_OF_OFFSPRING)
                        if get_i64(observation, "valueInteger") == Some(0) =>
                    {
                        props.childless_status = Some(ChildlessStatus::Childless);
                        break;
                    }
                    _ => {}
                }
            }
        }
        return;
    }

    let mut is_symptom = id.starts_with("fmh_clinical");
    let mut is_gene = id.starts_with("fmh_genes");
    let mut value: Option<String> = None;

    if let Some(text) = get_str(observation, "valueString") {
        value = Some(text.to_string());
    } else if let Some(concept) = observation.get("valueCodeableConcept") {
        for coding in codings(concept) {
            let system = get_str(coding, "system");
            if system == Some(terminology.gene_system()) {
                is_gene = true;
                value = get_str(coding, "code").map(str::to_string);
                break;
            }
            if system == Some(terminology.phenotype_system()) {
                is_symptom = true;
                value = get_str(coding, "code").map(str::to_string);
                break;
            }
        }
        if value.is_none() {
            value = get_str(concept, "text").map(str::to_string);
        }
    }

    if let Some(value) = value {
        if is_symptom {
            props.hpo_terms.push(value);
        } else if is_gene {
            props.candidate_genes.push(value);
        }
    }
}

fn extract_family_member(
    fmh: &Value,
    subject_resource: Option<&Value>,
    contained: &HashMap<String, &Value>,
    terminology: &dyn TerminologyResolver,
) -> FmhNode {
    let mut node = FmhNode {
        record_id: get_str(fmh, "id").map(str::to_string),
        ..FmhNode::default()
    };
    let props = &mut node.props;

    if let Some(gender) = parse_sex(fmh) {
        props.gender = gender;
    }

    if let Some(name) = get_str(fmh, "name") {
        let (first, last, maiden) = split_display_name(name);
        props.first_name = first;
        props.last_name = last;
        props.last_name_at_birth = maiden;
    }

    for identifier in get_array(fmh, "identifier") {
        if get_str(identifier, "system") == Some(systems::OPEN_PEDIGREE_EXTERNAL_ID) {
            props.external_id = get_str(identifier, "value").map(str::to_string);
            break;
        }
    }

    if let Some(born) = get_str(fmh, "bornDate") {
        props.dob = parse_fhir_date(born);
    }
    if let Some(deceased) = get_str(fmh, "deceasedDate") {
        props.dod = parse_fhir_date(deceased);
    }
    if get_bool(fmh, "deceasedBoolean") {
        props.life_status = Some(LifeStatus::Deceased);
    }
    if let Some(text) = get_str(fmh, "deceasedString") {
        let (status, weeks) = parse_deceased_string(text);
        props.life_status = Some(status);
        props.gestation_age = weeks;
    }

    if let Some(text) = get_array(fmh, "note").first().and_then(|n| get_str(n, "text")) {
        props.comments = Some(text.to_string());
    }

    props.disorders = extract_conditions(fmh, terminology.disorder_system());

    let mut possible_mother: Vec<String> = Vec::new();
    let mut possible_father: Vec<String> = Vec::new();
    let mut possible_parent: Vec<String> = Vec::new();
    for extension in get_array(fmh, "extension") {
        match get_str(extension, "url") {
            Some(systems::GENETICS_PARENT_EXTENSION) => {
                if let Some((parent_type, reference)) = parse_parent_extension(extension, contained)
                {
                    match parent_type.as_str() {
                        "mother" => possible_mother.push(reference),
                        "father" => possible_father.push(reference),
                        _ => possible_parent.push(reference),
                    }
                }
            }
            Some(systems::GENETICS_OBSERVATION_EXTENSION) => {
                if let Some(observation) = extension
                    .get("valueReference")
                    .and_then(reference_str)
                    .and_then(|r| contained.get(r).copied())
                {
                    apply_observation(observation, props, terminology);
                }
            }
            _ => {}
        }
    }
    let mut possible_mother = possible_mother.into_iter();
    let mut possible_father = possible_father.into_iter();
    node.mother = possible_mother.next();
    node.father = possible_father.next();
    if node.father.is_none() {
        node.father = possible_mother.next();
    }
    if node.mother.is_none() {
        node.mother = possible_father.next();
    }
    for parent in possible_parent {
        if node.mother.is_none() {
            node.mother = Some(parent);
        } else if node.father.is_none() {
            node.father = Some(parent);
        } else {
            break;
        }
    }

    // the ONESELF record is the patient; prefer the subject resource gender
    let is_oneself = fmh
        .get("relationship")
        .map(|rel| {
            get_str(rel, "code") == Some("ONESELF")
                || codings(rel)
                    .iter()
                    .any(|c| get_str(c, "code") == Some("ONESELF"))
        })
        .unwrap_or(false);
    if is_oneself {
        if let Some(subject) = subject_resource {
            match get_str(subject, "gender") {
                Some("male") => props.gender = Gender::M,
                Some("female") => props.gender = Gender::F,
                _ => {}
            }
        }
    }

    node
}

// ---------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------

/// Serializes the graph as a clinical FHIR Composition.
///
/// `fhir_patient_reference` points the Composition at an existing Patient
/// resource; without it a contained `#pat` Patient is built from the
/// proband.
pub fn export(
    graph: &PedigreeGraph,
    privacy: Privacy,
    fhir_patient_reference: Option<&str>,
    terminology: &dyn TerminologyResolver,
) -> GraphResult<String> {
    let patient_reference = json!({
        "type": "Patient",
        "reference": fhir_patient_reference.unwrap_or("#pat"),
    });

    let mut contained: Vec<Value> = Vec::new();
    let mut patient_entries: Vec<Value> = Vec::new();
    let mut family_history_entries: Vec<Value> = Vec::new();

    if fhir_patient_reference.is_none() {
        if let Some(props) = graph.person(VertexId::PROBAND) {
            contained.push(build_fhir_patient("pat", props, privacy));
        }
    }

    // proband conditions feed the patient section
    if let Some(props) = graph.person(VertexId::PROBAND) {
        for (i, disorder) in props.disorders.iter().enumerate() {
            let condition = build_condition(
                &format!("cond_{}", i),
                disorder,
                &patient_reference,
                terminology,
            );
            patient_entries.push(json!({
                "type": "Condition",
                "reference": format!("#{}", get_str(&condition, "id").unwrap_or_default()),
            }));
            contained.push(condition);
        }
    }

    let roles = classify(graph, VertexId::PROBAND);

    for person_id in graph.person_ids() {
        let index = person_id.index();
        let role = if person_id == VertexId::PROBAND {
            Some("ONESELF".to_string())
        } else {
            roles.code(person_id)
        };
        let mut fmh = build_fhir_fmh(person_id, graph, privacy, role.as_deref(), &patient_reference, terminology);
        let fmh_ref = json!({
            "type": "FamilyMemberHistory",
            "reference": format!("#FMH_{}", index),
        });

        let props = graph.person(person_id).expect("person vertex");
        let mut observations: Vec<Value> = Vec::new();
        for (j, term) in props.hpo_terms.iter().enumerate() {
            observations.push(build_value_observation(
                &format!("fmh_clinical_{}_{}", index, j),
                term,
                terminology.phenotype_system(),
                person_id,
                &patient_reference,
                &fmh_ref,
                terminology,
            ));
        }
        for (j, gene) in props.candidate_genes.iter().enumerate() {
            observations.push(build_value_observation(
                &format!("fmh_genes_{}_{}", index, j),
                gene,
                terminology.gene_system(),
                person_id,
                &patient_reference,
                &fmh_ref,
                terminology,
            ));
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
            let mut observation = json!({
                "resourceType": "Observation",
                "id": format!("fmh_carrierStatus_{}", index),
                "status": "preliminary",
                "valueCodeableConcept": {
                    "coding": [{
                        "system": systems::SNOMED_CT,
                        "code": code,
                        "display": display,
                    }]
                },
            });
            add_observation_subject(&mut observation, person_id, &patient_reference, &fmh_ref);
            observations.push(observation);
        }
        if let Some(childless) = props.childless_status {
            let mut observation = match childless {
                ChildlessStatus::Childless => json!({
                    "resourceType": "Observation",
                    "id": format!("fmh_childlessStatus_{}", index),
                    "status": "preliminary",
                    "code": {
                        "coding": [{
                            "system": systems::SNOMED_CT,
                            "code": systems::SNOMED_NUMBER_OF_OFFSPRING,
                            "display": "Number of offspring",
                        }]
                    },
                    "valueInteger": 0,
                }),
                ChildlessStatus::Infertile => json!({
                    "resourceType": "Observation",
                    "id": format!("fmh_childlessStatus_{}", index),
                    "status": "preliminary",
                    "code": {
                        "coding": [{
                            "system": systems::SNOMED_CT,
                            "code": systems::SNOMED_INFERTILE,
                            "display": "Infertile",
                        }]
                    },
                }),
            };
            add_observation_subject(&mut observation, person_id, &patient_reference, &fmh_ref);
            observations.push(observation);
        }

        if !observations.is_empty() {
            let extensions = fmh
                .as_object_mut()
                .expect("fmh is an object")
                .entry("extension")
                .or_insert_with(|| Value::Array(Vec::new()));
            for observation in &observations {
                let observation_ref = json!({
                    "type": "Observation",
                    "reference": format!("#{}", get_str(observation, "id").unwrap_or_default()),
                });
                extensions.as_array_mut().expect("extension array").push(json!({
                    "url": systems::GENETICS_OBSERVATION_EXTENSION,
                    "valueReference": observation_ref.clone(),
                }));
                if person_id == VertexId::PROBAND {
                    patient_entries.push(observation_ref);
                } else {
                    family_history_entries.push(observation_ref);
                }
            }
            contained.extend(observations);
        }

        contained.push(fmh);
        family_history_entries.push(fmh_ref);
    }

    let composition = json!({
        "resourceType": "Composition",
        "status": "preliminary",
        "type": {
            "coding": {
                "system": systems::LOINC,
                "code": "11488-4",
                "display": "Consult note",
            }
        },
        "subject": patient_reference,
        "date": Local::now().format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
        "title": "Pedigree Details",
        "section": [
            {
                "title": "Patient Condition",
                "entry": patient_entries,
            },
            {
                "title": "Family History",
                "code": {
                    "coding": {
                        "system": systems::LOINC,
                        "code": "10157-6",
                        "display": "History of family member diseases",
                    }
                },
                "entry": family_history_entries,
            },
        ],
        "contained": contained,
    });

    Ok(serde_json::to_string_pretty(&composition)?)
}

fn add_observation_subject(
    observation: &mut Value,
    person_id: VertexId,
    patient_reference: &Value,
    fmh_ref: &Value,
) {
    let target = observation.as_object_mut().expect("observation object");
    if person_id == VertexId::PROBAND {
        target.insert("subject".to_string(), patient_reference.clone());
    } else {
        target.insert("focus".to_string(), fmh_ref.clone());
    }
}

fn build_value_observation(
    id: &str,
    code: &str,
    system: &str,
    person_id: VertexId,
    patient_reference: &Value,
    fmh_ref: &Value,
    terminology: &dyn TerminologyResolver,
) -> Value {
    let mut observation = json!({
        "resourceType": "Observation",
        "id": id,
        "status": "preliminary",
    });
    let value = if terminology.has_display(system, code) {
        json!({
            "coding": [{
                "system": system,
                "code": code,
                "display": terminology.display_or_code(system, code),
            }]
        })
    } else {
        Value::Null
    };
    {
        let target = observation.as_object_mut().expect("observation object");
        if value.is_null() {
            target.insert("valueString".to_string(), json!(code));
        } else {
            target.insert("valueCodeableConcept".to_string(), value);
        }
    }
    add_observation_subject(&mut observation, person_id, patient_reference, fmh_ref);
    observation
}

fn build_condition(
    id: &str,
    disorder: &str,
    subject: &Value,
    terminology: &dyn TerminologyResolver,
) -> Value {
    let disorder_system = terminology.disorder_system();
    let code = if terminology.has_display(disorder_system, disorder) {
        json!({
            "coding": [{
                "system": disorder_system,
                "code": disorder,
                "display": terminology.display_or_code(disorder_system, disorder),
            }]
        })
    } else {
        json!({ "text": disorder })
    };
    json!({
        "resourceType": "Condition",
        "id": id,
        "subject": subject.clone(),
        "code": code,
    })
}

fn build_fhir_patient(contained_id: &str, props: &PersonProperties, privacy: Privacy) -> Value {
    let mut patient = json!({
        "id": contained_id,
        "resourceType": "Patient",
        "gender": props.gender.fhir_code(),
    });
    let target = patient.as_object_mut().expect("patient object");
    if props.twin_group.is_some() {
        target.insert("multipleBirthBoolean".to_string(), json!(true));
    }
    if props.dod.is_some() && !privacy.include_personal() {
        target.insert("deceasedBoolean".to_string(), json!(true));
    }
    if privacy.include_personal() {
        if let Some(dob) = props.dob.as_deref().and_then(mdy_to_fhir) {
            target.insert("birthDate".to_string(), json!(dob));
        }
        if let Some(dod) = props.dod.as_deref().and_then(mdy_to_fhir) {
            target.insert("deceasedDateTime".to_string(), json!(dod));
        }
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
            if props.last_name.as_deref() != Some(maiden) {
                names.push(json!({ "use": "old", "family": maiden }));
            }
        }
        if !names.is_empty() {
            target.insert("name".to_string(), Value::Array(names));
        }
    }
    patient
}

fn build_genetics_parent_extension(parent_index: usize, role: &str) -> Value {
    json!({
        "url": systems::GENETICS_PARENT_EXTENSION,
        "extension": [
            {
                "url": "type",
                "valueCodeableConcept": {
                    "coding": [role_coding(Some(role)).to_json()]
                }
            },
            {
                "url": "reference",
                "valueReference": { "reference": format!("#FMH_{}", parent_index) }
            }
        ]
    })
}

fn build_fhir_fmh(
    person_id: VertexId,
    graph: &PedigreeGraph,
    privacy: Privacy,
    role: Option<&str>,
    patient_reference: &Value,
    terminology: &dyn TerminologyResolver,
) -> Value {
    let props = graph.person(person_id).expect("person vertex");
    let index = person_id.index();

    let mut extensions: Vec<Value> = Vec::new();
    let (mother, father) = graph.mother_father_slots(person_id);
    for parent in graph.get_parents(person_id) {
        let role = if Some(parent) == mother {
            if props.adopted { "ADOPTMTH" } else { "NMTH" }
        } else if Some(parent) == father {
            if props.adopted { "ADOPTFTH" } else { "NFTH" }
        } else if props.adopted {
            "ADOPTPRN"
        } else {
            "NPRN"
        };
        extensions.push(build_genetics_parent_extension(parent.index(), role));
    }

    let mut name = format!("Family member {}", index);
    if privacy.include_personal() {
        let first = props.first_name.as_deref().unwrap_or("");
        let last = props.last_name.as_deref().unwrap_or("");
        let display = match (first.is_empty(), last.is_empty()) {
            (false, false) => format!("{} {}", first, last),
            (false, true) => first.to_string(),
            (true, false) => last.to_string(),
            (true, true) => name.clone(),
        };
        name = display;
        if let Some(maiden) = &props.last_name_at_birth {
            if props.last_name.as_deref() != Some(maiden.as_str()) {
                name = format!("{} ({})", name, maiden);
            }
        }
    }

    let sex_code = props.gender.fhir_code();
    let mut fmh = json!({
        "resourceType": "FamilyMemberHistory",
        "id": format!("FMH_{}", index),
        "status": "completed",
        "patient": patient_reference.clone(),
        "name": name,
        "sex": { "coding": [SEX_CODES[sex_code].to_json()] },
        "relationship": { "coding": [role_coding(role).to_json()] },
    });
    let target = fmh.as_object_mut().expect("fmh object");
    if !extensions.is_empty() {
        target.insert("extension".to_string(), Value::Array(extensions));
    }
    if privacy.include_personal() {
        if let Some(dob) = props.dob.as_deref().and_then(mdy_to_fhir) {
            target.insert("bornDate".to_string(), json!(dob));
        }
        if let Some(dod) = props.dod.as_deref().and_then(mdy_to_fhir) {
            target.insert("deceasedDate".to_string(), json!(dod));
        }
    }
    if let Some(status) = props.life_status {
        if props.dod.is_none() {
            match status {
                LifeStatus::Deceased => {
                    target.insert("deceasedBoolean".to_string(), json!(true));
                }
                fetal => {
                    let text = match &props.gestation_age {
                        Some(weeks) => format!("{} {} weeks", fetal.as_str(), weeks),
                        None => fetal.as_str().to_string(),
                    };
                    target.insert("deceasedString".to_string(), json!(text));
                }
            }
        }
    }
    if privacy.include_comments() {
        if let Some(comments) = &props.comments {
            target.insert("note".to_string(), json!([{ "text": comments }]));
        }
    }
    if !props.disorders.is_empty() {
        let disorder_system = terminology.disorder_system();
        let conditions: Vec<Value> = props
            .disorders
            .iter()
            .map(|disorder| {
                if terminology.has_display(disorder_system, disorder) {
                    json!({
                        "code": {
                            "coding": [{
                                "system": disorder_system,
                                "code": disorder,
                                "display": terminology.display_or_code(disorder_system, disorder),
                            }]
                        }
                    })
                } else {
                    json!({ "code": { "text": disorder } })
                }
            })
            .collect();
        target.insert("condition".to_string(), Value::Array(conditions));
    }
    fmh
}

#[cfg(test)]
mod tests {
    use super::*;
    use terminology::NullResolver;

    fn fmh(id: &str, name: &str, sex: &str, extra: Value) -> Value {
        let mut base = json!({
            "resourceType": "FamilyMemberHistory",
            "id": id,
            "name": name,
            "sex": { "coding": [{ "system": systems::ADMINISTRATIVE_GENDER, "code": sex }] },
        });
        base.as_object_mut()
            .unwrap()
            .extend(extra.as_object().cloned().unwrap_or_default());
        base
    }

    fn parent_extension(kind: &str, reference: &str) -> Value {
        json!({
            "url": systems::GENETICS_PARENT_EXTENSION,
            "extension": [
                {
                    "url": "type",
                    "valueCodeableConcept": {
                        "coding": [{ "system": systems::V3_ROLE_CODE, "code": kind }]
                    }
                },
                { "url": "reference", "valueReference": { "reference": reference } }
            ]
        })
    }

    fn composition(contained: Vec<Value>) -> String {
        json!({
            "resourceType": "Composition",
            "status": "preliminary",
            "contained": contained,
        })
        .to_string()
    }

    #[test]
    fn should_import_a_nuclear_family() {
        let input = composition(vec![
            fmh(
                "FMH_0",
                "John Doe",
                "male",
                json!({
                    "relationship": { "coding": [{ "code": "ONESELF" }] },
                    "extension": [
                        parent_extension("NMTH", "#FMH_1"),
                        parent_extension("NFTH", "#FMH_2"),
                    ],
                    "bornDate": "1990-04-02",
                }),
            ),
            fmh("FMH_1", "Jane Doe (Smith)", "female", json!({})),
            fmh("FMH_2", "Jim Doe", "male", json!({})),
        ]);
        let graph = import(&input, &NullResolver).unwrap();
        assert_eq!(graph.person_ids().count(), 3);
        let proband = VertexId::PROBAND;
        let mother = graph.get_mother(proband).unwrap();
        let father = graph.get_father(proband).unwrap();
        assert_eq!(graph.person(mother).unwrap().first_name.as_deref(), Some("Jane"));
        assert_eq!(
            graph.person(mother).unwrap().last_name_at_birth.as_deref(),
            Some("Smith")
        );
        assert_eq!(graph.person(father).unwrap().first_name.as_deref(), Some("Jim"));
        assert_eq!(
            graph.person(proband).unwrap().dob.as_deref(),
            Some("04/02/1990")
        );
    }

    #[test]
    fn should_reject_unknown_resource_types() {
        let input = json!({ "resourceType": "Patient" }).to_string();
        let err = import(&input, &NullResolver).unwrap_err();
        assert!(matches!(err, GraphError::UnsupportedResource));
    }

    #[test]
    fn should_reject_invalid_json() {
        let err = import("{truncated", &NullResolver).unwrap_err();
        assert!(matches!(err, GraphError::MalformedInput(_)));
    }

    #[test]
    fn shared_first_name_reference_is_ambiguous() {
        // two unidentified records share a first name; a third record
        // referencing that name must fail rather than pick one
        let input = composition(vec![
            json!({ "resourceType": "FamilyMemberHistory", "name": "Alex Doe" }),
            json!({ "resourceType": "FamilyMemberHistory", "name": "Alex Roe" }),
            fmh(
                "FMH_2",
                "Kid Doe",
                "male",
                json!({ "extension": [parent_extension("NMTH", "#Alex")] }),
            ),
        ]);
        let err = import(&input, &NullResolver).unwrap_err();
        assert!(matches!(err, GraphError::AmbiguousReference(_)));
    }

    #[test]
    fn should_reject_self_parenthood() {
        let input = composition(vec![fmh(
            "FMH_0",
            "John Doe",
            "male",
            json!({ "extension": [parent_extension("NFTH", "#FMH_0")] }),
        )]);
        let err = import(&input, &NullResolver).unwrap_err();
        assert!(matches!(err, GraphError::SelfParent));
    }

    #[test]
    fn should_reject_female_father() {
        let input = composition(vec![
            fmh(
                "FMH_0",
                "John Doe",
                "male",
                json!({ "extension": [parent_extension("NFTH", "#FMH_1")] }),
            ),
            fmh("FMH_1", "Jane Doe", "female", json!({})),
        ]);
        let err = import(&input, &NullResolver).unwrap_err();
        assert!(matches!(err, GraphError::ParentGenderContradiction { .. }));
    }

    #[test]
    fn should_synthesize_a_missing_mother() {
        let input = composition(vec![
            fmh(
                "FMH_0",
                "John Doe",
                "male",
                json!({ "extension": [parent_extension("NFTH", "#FMH_1")] }),
            ),
            fmh("FMH_1", "Jim Doe", "male", json!({})),
        ]);
        let graph = import(&input, &NullResolver).unwrap();
        let mother = graph.get_mother(VertexId::PROBAND).unwrap();
        assert_eq!(
            graph.person(mother).unwrap().comments.as_deref(),
            Some("unknown")
        );
    }

    #[test]
    fn export_labels_the_maternal_grandmother() {
        let mut graph = PedigreeGraph::new();
        let mut linker = ChildLinker::new();
        let proband = graph.add_person(PersonProperties::with_gender(Gender::M));
        let mother = graph.add_person(PersonProperties::with_gender(Gender::F));
        let father = graph.add_person(PersonProperties::with_gender(Gender::M));
        let grandma = graph.add_person(PersonProperties::with_gender(Gender::F));
        let grandpa = graph.add_person(PersonProperties::with_gender(Gender::M));
        let link = |v: VertexId| {
            Some(ParentLink {
                vertex: v,
                reference: v.to_string(),
            })
        };
        linker.attach(&mut graph, proband, link(mother), link(father)).unwrap();
        linker.attach(&mut graph, mother, link(grandma), link(grandpa)).unwrap();
        graph.validate().unwrap();

        let output = export(&graph, Privacy::All, None, &NullResolver).unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        let fmhs: Vec<&Value> = get_array(&value, "contained")
            .iter()
            .filter(|r| get_str(r, "resourceType") == Some("FamilyMemberHistory"))
            .collect();
        let grandma_fmh = fmhs
            .iter()
            .find(|r| get_str(r, "id") == Some("FMH_3"))
            .unwrap();
        assert_eq!(
            code_in_system(&grandma_fmh["relationship"], systems::V3_ROLE_CODE),
            Some("MGRMTH")
        );
    }

    #[test]
    fn export_then_import_round_trips_structure() {
        let mut graph = PedigreeGraph::new();
        let mut linker = ChildLinker::new();
        let proband = graph.add_person(PersonProperties {
            first_name: Some("Kim".to_string()),
            gender: Gender::F,
            ..Default::default()
        });
        let mother = graph.add_person(PersonProperties {
            first_name: Some("Ann".to_string()),
            gender: Gender::F,
            ..Default::default()
        });
        let father = graph.add_person(PersonProperties {
            first_name: Some("Bob".to_string()),
            gender: Gender::M,
            ..Default::default()
        });
        let link = |v: VertexId| {
            Some(ParentLink {
                vertex: v,
                reference: v.to_string(),
            })
        };
        linker.attach(&mut graph, proband, link(mother), link(father)).unwrap();
        graph.validate().unwrap();

        let output = export(&graph, Privacy::All, None, &NullResolver).unwrap();
        let reimported = import(&output, &NullResolver).unwrap();
        assert_eq!(reimported.person_ids().count(), 3);
        let new_mother = reimported.get_mother(VertexId::PROBAND).unwrap();
        assert_eq!(
            reimported.person(new_mother).unwrap().first_name.as_deref(),
            Some("Ann")
        );
    }

    #[test]
    fn minimal_privacy_strips_names_and_dates() {
        let mut graph = PedigreeGraph::new();
        graph.add_person(PersonProperties {
            first_name: Some("Kim".to_string()),
            dob: Some("1/2/1980".to_string()),
            comments: Some("private note".to_string()),
            gender: Gender::F,
            ..Default::default()
        });
        graph.validate().unwrap();
        let output = export(&graph, Privacy::Minimal, None, &NullResolver).unwrap();
        assert!(!output.contains("Kim"));
        assert!(!output.contains("1980"));
        assert!(!output.contains("private note"));
    }
}

// converters/tests/roundtrip.rs
//! Cross-format scenarios: a family entered through one front end must
//! survive re-export and re-import through the others with its relative
//! structure intact.

use converters::name_splitter::WhitespaceNameSplitter;
use converters::questionnaire::{self, QuestionnaireOptions};
use converters::{fhir, ga4gh, Privacy};
use models::identifiers::VertexId;
use terminology::NullResolver;

fn questionnaire_family() -> graph_engine::PedigreeGraph {
    let records = serde_json::json!([
        { "tag": "proband", "name": "Kim Doe", "sex": "F", "dob": "1990-04-02",
          "problem": ["cardiomyopathy"] },
        { "tag": "mother", "name": "Ann Doe (Smith)", "sex": "F" },
        { "tag": "father", "name": "Bob Doe", "sex": "M", "deceased": true },
        { "tag": "sibling_1", "name": "Sue Doe", "sex": "F", "sibling_type": "full" },
    ]);
    questionnaire::import(
        &records.to_string(),
        &WhitespaceNameSplitter,
        &QuestionnaireOptions::default(),
    )
    .expect("questionnaire import")
    .graph
}

fn first_name(graph: &graph_engine::PedigreeGraph, id: VertexId) -> Option<String> {
    graph.person(id).and_then(|p| p.first_name.clone())
}

#[test]
fn questionnaire_to_ga4gh_and_back_keeps_structure() {
    let graph = questionnaire_family();

    let exported = ga4gh::export(&graph, Privacy::All, None, None, &NullResolver).unwrap();
    let reimported = ga4gh::import(&exported, &NullResolver).unwrap();

    assert_eq!(reimported.person_ids().count(), 4);
    let proband = VertexId::PROBAND;
    let mother = reimported.get_mother(proband).expect("mother");
    let father = reimported.get_father(proband).expect("father");
    assert_eq!(first_name(&reimported, mother).as_deref(), Some("Ann"));
    assert_eq!(first_name(&reimported, father).as_deref(), Some("Bob"));

    let sibling = reimported
        .person_ids()
        .find(|&id| first_name(&reimported, id).as_deref() == Some("Sue"))
        .expect("sibling survived the round trip");
    assert_eq!(reimported.get_mother(sibling), Some(mother));
    assert_eq!(reimported.get_father(sibling), Some(father));

    // medical data survives too
    assert_eq!(
        reimported.person(proband).unwrap().disorders,
        vec!["cardiomyopathy".to_string()]
    );
}

#[test]
fn questionnaire_to_clinical_fhir_and_back_keeps_structure() {
    let graph = questionnaire_family();

    let exported = fhir::export(&graph, Privacy::All, None, &NullResolver).unwrap();
    let reimported = fhir::import(&exported, &NullResolver).unwrap();

    assert_eq!(reimported.person_ids().count(), 4);
    let mother = reimported.get_mother(VertexId::PROBAND).expect("mother");
    assert_eq!(first_name(&reimported, mother).as_deref(), Some("Ann"));
}

#[test]
fn graph_round_trips_back_to_questionnaire_records() {
    let graph = questionnaire_family();
    let records = questionnaire::export_records(&graph, Privacy::All);

    let tags: Vec<&str> = records.iter().map(|r| r.tag.as_str()).collect();
    for expected in ["proband", "mother", "father", "sibling_1"] {
        assert!(tags.contains(&expected), "missing tag {}", expected);
    }

    let reimported = questionnaire::import_records(
        &records,
        &WhitespaceNameSplitter,
        &QuestionnaireOptions::default(),
    )
    .unwrap();
    assert_eq!(reimported.graph.person_ids().count(), 4);
}

#[test]
fn ga4gh_export_carries_the_pedigree_profile() {
    let graph = questionnaire_family();
    let exported = ga4gh::export(&graph, Privacy::All, None, None, &NullResolver).unwrap();
    let value: serde_json::Value = serde_json::from_str(&exported).unwrap();
    let profiles = value["meta"]["profile"]
        .as_array()
        .expect("profile array")
        .clone();
    assert!(profiles
        .iter()
        .any(|p| p.as_str().is_some_and(|s| s.contains("Pedigree"))));
}

use std::sync::Arc;

use ficha_core::{Path, Value};
use ficha_forms::definition::CURRENT_VERSION;
use ficha_forms::rules::{Rule, Trigger};
use ficha_forms::{FieldErrorKind, FormsError, Wizard, WizardDefinition};
use ficha_masks::MaskKind;

const DEFINITION: &str = r#"{
    "definition_version": 1,
    "name": "terapeuta",
    "steps": [{ "title": "Identificação" }, { "title": "Endereço" }],
    "descriptors": [
        {
            "path": "cpf",
            "step": 1,
            "mask": "cpf",
            "rules": [
                { "type": "required" },
                { "type": "format", "check": "complete", "kind": "cpf", "on": "blur" },
                { "type": "checksum", "document": "cpf", "on": "blur", "message": "Documento inválido" }
            ]
        },
        {
            "path": "placa",
            "step": 1,
            "rules": [
                {
                    "type": "required_if",
                    "when": { "op": "equals", "field": "sibling:possuiVeiculo", "value": "sim" }
                }
            ]
        },
        { "path": "enderecos", "step": 2, "rules": [{ "type": "min_items", "min": 1 }] },
        { "path": "enderecos.*.cep", "step": 2, "mask": "cep" }
    ],
    "templates": [{ "path": "enderecos", "template": { "principal": false } }],
    "lookups": [{ "trigger": "enderecos.*.cep" }],
    "conflicts": { "cpf": { "path": "cpf", "message": "CPF já cadastrado" } }
}"#;

#[test]
fn parses_a_full_definition() {
    let definition = WizardDefinition::from_json_str(DEFINITION).unwrap();

    assert_eq!(definition.name, "terapeuta");
    assert_eq!(definition.step_count(), 2);
    assert_eq!(definition.descriptors.len(), 4);

    let cpf = &definition.descriptors[0];
    assert_eq!(cpf.mask, Some(MaskKind::Cpf));
    assert_eq!(cpf.tier(), Trigger::Blur);
    assert_eq!(cpf.rules[2].message.as_deref(), Some("Documento inválido"));
    assert!(matches!(cpf.rules[0].rule, Rule::Required));

    assert_eq!(definition.step_of(&Path::parse("enderecos.3.cep").unwrap()), Some(2));
    assert!(definition.lookup_for(&Path::parse("enderecos.0.cep").unwrap()).is_some());
    assert_eq!(
        definition.lookups[0].targets.values().cloned().collect::<Vec<_>>(),
        vec!["logradouro", "bairro", "cidade", "uf"]
    );
}

#[test]
fn loaded_rules_drive_a_wizard() {
    let definition = Arc::new(WizardDefinition::from_json_str(DEFINITION).unwrap());
    let mut wizard = Wizard::new(definition);

    wizard.update("cpf", "11144477736").unwrap();
    wizard.blur("cpf").unwrap();
    assert_eq!(
        wizard.errors().get("cpf").map(|e| e.message.as_str()),
        Some("Documento inválido")
    );

    wizard.insert_item("enderecos").unwrap();
    assert_eq!(
        wizard.record().get(&Path::parse("enderecos.0.principal").unwrap()),
        Some(&Value::Bool(false))
    );
}

#[test]
fn conflict_table_is_loaded() {
    let definition = WizardDefinition::from_json_str(DEFINITION).unwrap();

    let target = definition.conflicts.get("cpf").unwrap();
    assert_eq!(target.path, Path::parse("cpf").unwrap());
    assert_eq!(definition.step_of(&target.path), Some(1));
}

#[test]
fn migrates_unversioned_definitions() {
    let legacy = r#"{
        "name": "legado",
        "steps": [{ "title": "Único" }],
        "fields": [{ "path": "nome", "step": 1, "rules": [{ "type": "required" }] }]
    }"#;

    let definition = WizardDefinition::from_json_str(legacy).unwrap();

    assert_eq!(definition.definition_version, CURRENT_VERSION);
    assert_eq!(definition.descriptors.len(), 1);
    assert_eq!(definition.descriptors[0].path.to_string(), "nome");
}

#[test]
fn rejects_newer_definitions() {
    let future = r#"{ "definition_version": 99, "name": "novo", "steps": [{ "title": "A" }] }"#;

    let err = WizardDefinition::from_json_str(future).unwrap_err();

    assert!(matches!(err, FormsError::Definition(_)));
}

#[test]
fn rejects_out_of_range_steps() {
    let bad = r#"{
        "definition_version": 1,
        "name": "quebrado",
        "steps": [{ "title": "A" }],
        "descriptors": [{ "path": "nome", "step": 2 }]
    }"#;

    let err = WizardDefinition::from_json_str(bad).unwrap_err();

    assert!(matches!(err, FormsError::Definition(_)));
}

#[test]
fn rejects_unbound_condition_wildcards() {
    let bad = r#"{
        "definition_version": 1,
        "name": "quebrado",
        "steps": [{ "title": "A" }],
        "descriptors": [{
            "path": "placa",
            "step": 1,
            "rules": [{
                "type": "required_if",
                "when": { "op": "filled", "field": "veiculos.*.modelo" }
            }]
        }]
    }"#;

    let err = WizardDefinition::from_json_str(bad).unwrap_err();

    assert!(matches!(err, FormsError::Definition(_)));
}

#[test]
fn rejects_malformed_paths() {
    let bad = r#"{
        "name": "quebrado",
        "steps": [{ "title": "A" }],
        "descriptors": [{ "path": "itens..nome", "step": 1 }]
    }"#;

    let err = WizardDefinition::from_json_str(bad).unwrap_err();

    assert!(matches!(err, FormsError::Serialization(_)));
}

#[test]
fn loads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("terapeuta.json");
    std::fs::write(&file, DEFINITION).unwrap();

    let definition = WizardDefinition::load(&file).unwrap();

    assert_eq!(definition.name, "terapeuta");
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();

    let err = WizardDefinition::load(&dir.path().join("nada.json")).unwrap_err();

    assert!(matches!(err, FormsError::Io(_)));
}

#[test]
fn serialized_definition_loads_back() {
    let definition = WizardDefinition::from_json_str(DEFINITION).unwrap();

    let json = serde_json::to_string(&definition).unwrap();
    let reloaded = WizardDefinition::from_json_str(&json).unwrap();

    assert_eq!(reloaded.descriptors.len(), definition.descriptors.len());
    assert_eq!(reloaded.conflicts.len(), 1);
    assert_eq!(
        serde_json::to_value(&reloaded).unwrap(),
        serde_json::to_value(&definition).unwrap()
    );
}

#[test]
fn error_kinds_serialize_snake_case() {
    let json = serde_json::to_string(&FieldErrorKind::ConditionalRequired).unwrap();

    assert_eq!(json, "\"conditional_required\"");
}

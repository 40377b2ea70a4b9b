use ficha_core::{Path, PathError, Record, Value, ValueKind};

fn p(raw: &str) -> Path {
    Path::parse(raw).unwrap()
}

fn sample() -> Record {
    let json = serde_json::json!({
        "nome": "Ana",
        "endereco": { "cep": "01001-000", "cidade": "São Paulo" },
        "contatos": [
            { "nome": "Bia", "telefone": "(11) 91234-5678" },
            { "nome": "Caio" }
        ]
    });
    match Value::from(json) {
        Value::Record(record) => record,
        other => panic!("expected record, got {other:?}"),
    }
}

#[test]
fn get_reads_nested_values() {
    let record = sample();
    assert_eq!(record.get_str(&p("endereco.cidade")), Some("São Paulo"));
    assert_eq!(record.get_str(&p("contatos.1.nome")), Some("Caio"));
}

#[test]
fn get_on_missing_paths_is_none() {
    let record = sample();
    assert_eq!(record.get(&p("contatos.1.telefone")), None);
    assert_eq!(record.get(&p("contatos.7.nome")), None);
    assert_eq!(record.get(&p("dependentes.0.nome")), None);
    assert_eq!(record.get(&p("nome.primeiro")), None);
    assert_eq!(record.get(&p("endereco.0")), None);
}

#[test]
fn set_then_get_returns_the_value() {
    let record = sample();
    let cases = [
        ("nome", Value::text("Ana Paula")),
        ("endereco.numero", Value::Number(42.0)),
        ("contatos.1.telefone", Value::text("(11) 3333-4444")),
        ("responsavel.documentos.rg", Value::text("12.345.678-9")),
        ("ativo", Value::Bool(true)),
    ];
    for (raw, value) in cases {
        let updated = record.set(&p(raw), value.clone()).unwrap();
        assert_eq!(updated.get(&p(raw)), Some(&value), "{raw}");
    }
}

#[test]
fn set_does_not_touch_the_input() {
    let record = sample();
    let _ = record.set(&p("endereco.cep"), Value::text("20000-000")).unwrap();
    assert_eq!(record.get_str(&p("endereco.cep")), Some("01001-000"));
}

#[test]
fn untouched_subtrees_are_shared() {
    let record = sample();
    let updated = record.set(&p("contatos.0.nome"), Value::text("Beatriz")).unwrap();

    let before = record.get(&p("endereco")).and_then(Value::as_record).unwrap();
    let after = updated.get(&p("endereco")).and_then(Value::as_record).unwrap();
    assert!(before.ptr_eq(after));

    let sibling_before = record.get(&p("contatos.1")).and_then(Value::as_record).unwrap();
    let sibling_after = updated.get(&p("contatos.1")).and_then(Value::as_record).unwrap();
    assert!(sibling_before.ptr_eq(sibling_after));

    let edited_before = record.get(&p("contatos.0")).and_then(Value::as_record).unwrap();
    let edited_after = updated.get(&p("contatos.0")).and_then(Value::as_record).unwrap();
    assert!(!edited_before.ptr_eq(edited_after));
    assert!(!record.ptr_eq(&updated));
}

#[test]
fn set_creates_missing_records() {
    let record = Record::new();
    let updated = record.set(&p("endereco.cep"), Value::text("01001-000")).unwrap();
    assert_eq!(updated.get_str(&p("endereco.cep")), Some("01001-000"));
    assert!(record.is_empty());
}

#[test]
fn set_null_removes_the_key() {
    let record = sample();
    let updated = record.set(&p("endereco.cidade"), Value::Null).unwrap();
    assert_eq!(updated.get(&p("endereco.cidade")), None);
    let endereco = updated.get(&p("endereco")).and_then(Value::as_record).unwrap();
    assert_eq!(endereco.len(), 1);
}

#[test]
fn set_past_the_end_is_out_of_range() {
    let record = sample();
    let err = record.set(&p("contatos.2.nome"), Value::text("Davi")).unwrap_err();
    assert_eq!(
        err,
        PathError::IndexOutOfRange {
            path: "contatos".to_string(),
            index: 2,
            len: 2,
        }
    );
}

#[test]
fn writes_through_a_vivified_sequence_are_out_of_range() {
    let err = Record::new()
        .set(&p("dependentes.0.nome"), Value::text("Eva"))
        .unwrap_err();
    assert!(matches!(err, PathError::IndexOutOfRange { index: 0, len: 0, .. }));
}

#[test]
fn kind_mismatches_are_reported() {
    let record = sample();
    let err = record.set(&p("nome.primeiro"), Value::text("x")).unwrap_err();
    assert_eq!(
        err,
        PathError::KindMismatch {
            path: "nome".to_string(),
            expected: ValueKind::Record,
            found: ValueKind::Text,
        }
    );
    assert!(matches!(
        record.set(&p("contatos.nome"), Value::text("x")),
        Err(PathError::KindMismatch { .. })
    ));
    assert!(matches!(
        record.set(&p("endereco.0"), Value::text("x")),
        Err(PathError::KindMismatch { .. })
    ));
}

#[test]
fn json_round_trip_preserves_shape() {
    let record = sample();
    let json = serde_json::Value::from(&record);
    assert_eq!(json["contatos"][0]["nome"], "Bia");
    let back = match Value::from(json) {
        Value::Record(r) => r,
        other => panic!("expected record, got {other:?}"),
    };
    assert_eq!(back, record);
}

#[test]
fn blank_values() {
    assert!(Value::Null.is_blank());
    assert!(Value::text("   ").is_blank());
    assert!(Value::list(vec![]).is_blank());
    assert!(!Value::text("a").is_blank());
    assert!(!Value::Number(0.0).is_blank());
}

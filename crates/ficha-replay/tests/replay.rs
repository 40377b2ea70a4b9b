use std::sync::Arc;
use std::time::Duration;

use ficha_core::{Path, Record, Value};
use ficha_forms::collaborators::{CollaboratorError, SubmitOutcome};
use ficha_forms::{Phase, Transition, WizardDefinition};
use ficha_replay::replay::{self, Replay};
use ficha_replay::session::{Event, ScriptedResponse, Session};

const DEFINITION: &str = include_str!("../../../demos/cadastro-cliente.json");
const SESSION: &str = include_str!("../../../demos/sessao-cliente.json");

const WINDOW: Duration = Duration::from_millis(300);

fn definition() -> Arc<WizardDefinition> {
    Arc::new(WizardDefinition::from_json_str(DEFINITION).unwrap())
}

fn path(raw: &str) -> Path {
    Path::parse(raw).unwrap()
}

fn minimal() -> Arc<WizardDefinition> {
    let definition = r#"{
        "definition_version": 1,
        "name": "minimo",
        "steps": [{ "title": "Único" }],
        "descriptors": [{ "path": "nome", "step": 1, "mask": "name", "rules": [{ "type": "required" }] }]
    }"#;
    Arc::new(WizardDefinition::from_json_str(definition).unwrap())
}

#[tokio::test(start_paused = true)]
async fn demo_session_reaches_done() {
    let session = Session::from_json_str(SESSION).unwrap();

    let report = replay::run(definition(), session, WINDOW).await.unwrap();

    assert_eq!(report.wizard, "cadastro-cliente");
    assert_eq!(report.phase, Phase::Done);
    assert_eq!(report.submitted_id.as_deref(), Some("cli-0042"));
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.completed_steps, vec![3]);
    assert_eq!(report.highest_reached, 3);

    let record = &report.record;
    assert_eq!(record.get_str(&path("nome")), Some("Maria das Dores"));
    assert_eq!(record.get_str(&path("cpf")), Some("529.982.247-25"));
    assert_eq!(record.get_str(&path("endereco.logradouro")), Some("Avenida Paulista"));
    assert_eq!(record.get_str(&path("endereco.uf")), Some("SP"));
    assert_eq!(record.get_str(&path("contatos.0.telefone")), Some("(11) 98765-4321"));
    assert_eq!(record.get(&path("contatos")).and_then(Value::as_list).map(<[Value]>::len), Some(1));
    assert_eq!(record.get_str(&path("valorSessao")), Some("R$ 180,00"));
    assert_eq!(record.get_str(&path("pix.chave")), Some("(11) 98765-4321"));
}

#[tokio::test(start_paused = true)]
async fn demo_session_logs_the_conflict_round_trip() {
    let session = Session::from_json_str(SESSION).unwrap();

    let report = replay::run(definition(), session, WINDOW).await.unwrap();

    assert_eq!(
        report.events[0].transition,
        Some(Transition::Blocked { errors: 2 })
    );
    let submits: Vec<_> = report
        .events
        .iter()
        .filter(|entry| entry.action == "submit")
        .map(|entry| entry.transition)
        .collect();
    assert_eq!(
        submits,
        vec![
            Some(Transition::Moved { to: Phase::Step(1) }),
            Some(Transition::Moved { to: Phase::Done }),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn refused_events_do_not_stop_the_replay() {
    let session = Session {
        events: vec![
            Event::Update {
                path: "a..b".to_string(),
                value: serde_json::json!("x"),
            },
            Event::Update {
                path: "nome".to_string(),
                value: serde_json::json!("ana"),
            },
            Event::Next,
        ],
        ..Session::default()
    };

    let report = replay::run(minimal(), session, WINDOW).await.unwrap();

    assert!(report.events[0].error.is_some());
    assert_eq!(report.events[1].error, None);
    assert_eq!(report.phase, Phase::Submitting);
    assert_eq!(report.record.get_str(&path("nome")), Some("Ana"));
}

#[tokio::test(start_paused = true)]
async fn transport_failure_is_logged_and_returns_to_last_step() {
    let mut session = Session::from_json_str(
        r#"{
            "collaborators": { "submissions": [{ "unavailable": "timeout" }] },
            "events": [
                { "action": "update", "path": "nome", "value": "ana" },
                { "action": "next" },
                { "action": "submit" }
            ]
        }"#,
    )
    .unwrap();
    session.record = Some(Record::new().with("origem", "indicação"));

    let report = replay::run(minimal(), session, WINDOW).await.unwrap();

    assert_eq!(report.phase, Phase::Step(1));
    assert_eq!(report.step_title.as_deref(), Some("Único"));
    assert!(report.events[2].error.as_deref().unwrap().contains("timeout"));
    assert_eq!(report.record.get_str(&path("origem")), Some("indicação"));
}

#[tokio::test(start_paused = true)]
async fn lookups_settle_before_submission() {
    let session = Session::from_json_str(
        r#"{
            "collaborators": {
                "addresses": { "addresses": { "01310100": {
                    "street": "Avenida Paulista", "neighborhood": "Bela Vista",
                    "city": "São Paulo", "state": "SP"
                } } }
            },
            "events": [{ "action": "update", "path": "endereco.cep", "value": "01310100" }]
        }"#,
    )
    .unwrap();
    let mut replay = Replay::new(definition(), &session, WINDOW);

    for event in session.events.clone() {
        replay.apply(event).await.unwrap();
    }
    assert_eq!(replay.wizard().record().get(&path("endereco.logradouro")), None);

    replay.settle().await.unwrap();
    assert_eq!(
        replay.wizard().record().get_str(&path("endereco.cidade")),
        Some("São Paulo")
    );
}

#[test]
fn scripted_responses_parse_both_shapes() {
    let responses: Vec<ScriptedResponse> = serde_json::from_str(
        r#"[{ "status": "ok", "id": "x" }, { "unavailable": "fora do ar" }]"#,
    )
    .unwrap();

    let results: Vec<_> = responses.into_iter().map(ScriptedResponse::into_result).collect();

    assert!(matches!(&results[0], Ok(SubmitOutcome::Ok { id }) if id == "x"));
    assert!(matches!(&results[1], Err(CollaboratorError::Unavailable(msg)) if msg == "fora do ar"));
}

#[test]
fn event_names_match_their_tags() {
    let events: Vec<Event> = serde_json::from_str(
        r#"[{ "action": "goto", "step": 2 }, { "action": "settle" }, { "action": "wait", "ms": 5 }]"#,
    )
    .unwrap();

    let names: Vec<_> = events.iter().map(Event::name).collect();

    assert_eq!(names, vec!["goto", "settle", "wait"]);
}

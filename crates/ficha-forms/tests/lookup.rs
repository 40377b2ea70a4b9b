use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ficha_core::{Path, PathPattern};
use ficha_forms::collaborators::{AddressFields, MemoryAddressBook};
use ficha_forms::lookup::{LookupBinding, LookupDebouncer, LookupOutcome};
use ficha_forms::rules::{FormatCheck, Rule};
use ficha_forms::{FieldDescriptor, FieldErrorKind, Transition, Wizard, WizardDefinition};
use ficha_masks::MaskKind;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_millis(300);

fn path(raw: &str) -> Path {
    Path::parse(raw).unwrap()
}

fn definition() -> Arc<WizardDefinition> {
    let definition = WizardDefinition::new("endereco", &["Endereço"])
        .descriptor(
            FieldDescriptor::new("endereco.cep", 1)
                .unwrap()
                .mask(MaskKind::Cep)
                .on_blur(Rule::Format(FormatCheck::Complete { kind: MaskKind::Cep })),
        )
        .descriptor(
            FieldDescriptor::new("endereco.logradouro", 1)
                .unwrap()
                .rule(Rule::Required),
        )
        .descriptor(
            FieldDescriptor::new("cuidadores.*.endereco.cep", 1)
                .unwrap()
                .mask(MaskKind::Cep),
        )
        .lookup(LookupBinding::new(PathPattern::parse("endereco.cep").unwrap()))
        .lookup(LookupBinding::new(
            PathPattern::parse("cuidadores.*.endereco.cep").unwrap(),
        ));
    Arc::new(definition)
}

fn address(street: &str) -> AddressFields {
    AddressFields {
        street: street.to_string(),
        neighborhood: "Bela Vista".to_string(),
        city: "São Paulo".to_string(),
        state: "SP".to_string(),
        complement: None,
    }
}

fn address_book() -> MemoryAddressBook {
    MemoryAddressBook {
        addresses: BTreeMap::from([
            ("01310100".to_string(), address("Avenida Paulista")),
            ("01310200".to_string(), address("Rua Augusta")),
        ]),
    }
}

#[tokio::test(start_paused = true)]
async fn last_edit_wins() {
    let mut wizard = Wizard::new(definition());
    let debouncer = LookupDebouncer::new(WINDOW);
    let book = address_book();

    wizard.update("endereco.cep", "01310100").unwrap();
    wizard.update("endereco.cep", "01310200").unwrap();
    let tickets = wizard.take_lookup_requests();
    assert_eq!(tickets.len(), 2);
    for ticket in &tickets {
        debouncer.register(ticket);
    }

    let (first, second) = tokio::join!(
        debouncer.run(&book, tickets[0].clone()),
        debouncer.run(&book, tickets[1].clone()),
    );

    assert!(matches!(first, LookupOutcome::Superseded(_)));
    assert!(!wizard.apply_lookup(first).unwrap());
    assert!(wizard.apply_lookup(second).unwrap());
    assert_eq!(
        wizard.record().get_str(&path("endereco.logradouro")),
        Some("Rua Augusta")
    );
    assert_eq!(wizard.record().get_str(&path("endereco.uf")), Some("SP"));
}

#[tokio::test(start_paused = true)]
async fn stale_response_is_discarded() {
    let mut wizard = Wizard::new(definition());
    let debouncer = LookupDebouncer::new(WINDOW);
    let book = address_book();

    wizard.update("endereco.cep", "01310100").unwrap();
    let ticket = wizard.take_lookup_requests().remove(0);
    debouncer.register(&ticket);
    let outcome = debouncer.run(&book, ticket).await;
    assert!(matches!(outcome, LookupOutcome::Completed { .. }));

    // The user kept typing before the answer was applied.
    wizard.update("endereco.cep", "0131020").unwrap();

    assert!(!wizard.apply_lookup(outcome).unwrap());
    assert_eq!(wizard.record().get(&path("endereco.logradouro")), None);
}

#[tokio::test(start_paused = true)]
async fn lookup_waits_for_the_window() {
    let mut wizard = Wizard::new(definition());
    let debouncer = LookupDebouncer::new(WINDOW);

    wizard.update("endereco.cep", "01310-100").unwrap();
    let ticket = wizard.take_lookup_requests().remove(0);
    debouncer.register(&ticket);

    let start = Instant::now();
    debouncer.run(&address_book(), ticket).await;

    assert!(start.elapsed() >= WINDOW);
}

#[tokio::test(start_paused = true)]
async fn incomplete_postal_code_never_calls_the_service() {
    let mut wizard = Wizard::new(definition());
    let debouncer = LookupDebouncer::new(WINDOW);

    wizard.update("endereco.cep", "0131").unwrap();
    let ticket = wizard.take_lookup_requests().remove(0);
    assert!(!ticket.ready);
    debouncer.register(&ticket);

    let outcome = debouncer.run(&address_book(), ticket).await;

    assert!(matches!(outcome, LookupOutcome::Superseded(_)));
}

#[tokio::test(start_paused = true)]
async fn unknown_postal_code_is_reported_on_the_field() {
    let mut wizard = Wizard::new(definition());
    let debouncer = LookupDebouncer::new(WINDOW);

    wizard.update("endereco.cep", "99999999").unwrap();
    let ticket = wizard.take_lookup_requests().remove(0);
    debouncer.register(&ticket);
    let outcome = debouncer.run(&address_book(), ticket).await;

    assert!(!wizard.apply_lookup(outcome).unwrap());
    let error = wizard.errors().get("endereco.cep").unwrap();
    assert_eq!(error.kind, FieldErrorKind::NotFound);
    assert_eq!(error.message, "CEP não encontrado");
}

#[tokio::test(start_paused = true)]
async fn filled_fields_clear_step_errors() {
    let mut wizard = Wizard::new(definition());
    let debouncer = LookupDebouncer::new(WINDOW);

    assert_eq!(wizard.go_next(), Transition::Blocked { errors: 1 });
    assert!(wizard.errors().contains("endereco.logradouro"));

    wizard.update("endereco.cep", "01310100").unwrap();
    let ticket = wizard.take_lookup_requests().remove(0);
    debouncer.register(&ticket);
    let outcome = debouncer.run(&address_book(), ticket).await;
    assert!(wizard.apply_lookup(outcome).unwrap());

    assert!(wizard.errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn nested_lookup_writes_next_to_its_trigger() {
    let mut wizard = Wizard::new(definition());
    let debouncer = LookupDebouncer::new(WINDOW);
    wizard.insert_item("cuidadores").unwrap();
    wizard.insert_item("cuidadores").unwrap();

    wizard.update("cuidadores.1.endereco.cep", "01310100").unwrap();
    let ticket = wizard.take_lookup_requests().remove(0);
    assert_eq!(ticket.path, path("cuidadores.1.endereco.cep"));
    debouncer.register(&ticket);
    let outcome = debouncer.run(&address_book(), ticket).await;
    assert!(wizard.apply_lookup(outcome).unwrap());

    assert_eq!(
        wizard.record().get_str(&path("cuidadores.1.endereco.logradouro")),
        Some("Avenida Paulista")
    );
    assert_eq!(wizard.record().get(&path("cuidadores.0.endereco")), None);
}

#[tokio::test(start_paused = true)]
async fn removing_an_item_drops_its_pending_lookups() {
    let mut wizard = Wizard::new(definition());
    let debouncer = LookupDebouncer::new(WINDOW);
    wizard.insert_item("cuidadores").unwrap();

    wizard.update("cuidadores.0.endereco.cep", "01310100").unwrap();
    let ticket = wizard.take_lookup_requests().remove(0);
    debouncer.register(&ticket);
    let outcome = debouncer.run(&address_book(), ticket).await;
    wizard.remove_item("cuidadores", 0).unwrap();

    assert!(!wizard.apply_lookup(outcome).unwrap());
}

#[tokio::test(start_paused = true)]
async fn removing_an_item_keeps_later_lookups_of_its_slot_current() {
    let mut wizard = Wizard::new(definition());
    let debouncer = LookupDebouncer::new(WINDOW);
    wizard.insert_item("cuidadores").unwrap();
    wizard.insert_item("cuidadores").unwrap();

    for raw in ["0", "01", "013", "0131"] {
        wizard.update("cuidadores.1.endereco.cep", raw).unwrap();
    }
    let earlier = wizard.take_lookup_requests();
    for ticket in &earlier {
        debouncer.register(ticket);
    }

    wizard.remove_item("cuidadores", 1).unwrap();
    wizard.insert_item("cuidadores").unwrap();
    wizard.update("cuidadores.1.endereco.cep", "01310100").unwrap();
    let ticket = wizard.take_lookup_requests().remove(0);
    assert!(earlier.iter().all(|old| old.generation < ticket.generation));
    debouncer.register(&ticket);

    let outcome = debouncer.run(&address_book(), ticket).await;
    assert!(matches!(outcome, LookupOutcome::Completed { .. }));
    assert!(wizard.apply_lookup(outcome).unwrap());
    assert_eq!(
        wizard.record().get_str(&path("cuidadores.1.endereco.logradouro")),
        Some("Avenida Paulista")
    );
}

#[tokio::test(start_paused = true)]
async fn removing_a_later_item_keeps_an_earlier_lookup_in_flight() {
    let mut wizard = Wizard::new(definition());
    let debouncer = LookupDebouncer::new(WINDOW);
    wizard.insert_item("cuidadores").unwrap();
    wizard.insert_item("cuidadores").unwrap();

    wizard.update("cuidadores.0.endereco.cep", "01310100").unwrap();
    let ticket = wizard.take_lookup_requests().remove(0);
    debouncer.register(&ticket);
    let outcome = debouncer.run(&address_book(), ticket).await;

    wizard.remove_item("cuidadores", 1).unwrap();

    assert!(wizard.apply_lookup(outcome).unwrap());
    assert_eq!(
        wizard.record().get_str(&path("cuidadores.0.endereco.logradouro")),
        Some("Avenida Paulista")
    );
}

#[tokio::test(start_paused = true)]
async fn pending_lookup_follows_its_item_down() {
    let mut wizard = Wizard::new(definition());
    let debouncer = LookupDebouncer::new(WINDOW);
    wizard.insert_item("cuidadores").unwrap();
    wizard.insert_item("cuidadores").unwrap();

    wizard.update("cuidadores.0.endereco.cep", "01310200").unwrap();
    debouncer.register(&wizard.take_lookup_requests().remove(0));
    wizard.update("cuidadores.1.endereco.cep", "01310100").unwrap();

    wizard.remove_item("cuidadores", 0).unwrap();
    let ticket = wizard.take_lookup_requests().remove(0);
    assert_eq!(ticket.path, path("cuidadores.0.endereco.cep"));
    debouncer.register(&ticket);

    let outcome = debouncer.run(&address_book(), ticket).await;
    assert!(wizard.apply_lookup(outcome).unwrap());
    assert_eq!(
        wizard.record().get_str(&path("cuidadores.0.endereco.logradouro")),
        Some("Avenida Paulista")
    );
}

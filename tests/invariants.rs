//! Contract Invariant Tests
//!
//! These tests verify the engine's guarantees through the public API.

use gridcard_core::{
    layout::{CardConfig, CardId, DashboardLayout, PropBag, PropValue, Span},
    registry::{CardRegistry, ControlKind, VisibilityTier},
    resize::{pixel_widths, CardGeometry, PointerCapture, ResizeEffect, ResizeMachine, Viewport},
    state::DashboardState,
    templates::{serialize_template, TemplateError, TemplateImporter, TemplateVendor},
    validation::{CardError, SuggestedAction, ValidationResult, Validator},
};

struct NoCapture;

impl PointerCapture for NoCapture {
    fn attach(&mut self) {}
    fn detach(&mut self) {}
}

fn card(name: &str, span: u8, props: PropBag) -> CardConfig {
    CardConfig {
        id: CardId::generate(),
        name: name.to_string(),
        span: Span::new(span).unwrap(),
        props,
    }
}

#[test]
fn invariant_default_configs_validate() {
    let registry = CardRegistry::builtin();
    let validator = Validator::new();

    for descriptor in registry.iter() {
        let config = CardConfig::from_descriptor(descriptor);
        assert!(
            validator.validate(&config, &registry).is_valid(),
            "defaults of {} must validate",
            descriptor.name
        );
    }
}

#[test]
fn invariant_unknown_type_is_one_error_with_remove_action() {
    let registry = CardRegistry::builtin();
    let mut noisy = PropBag::new();
    noisy.insert("duration".into(), "abc".into());
    noisy.insert("x".into(), PropValue::Null);

    for props in [PropBag::new(), noisy] {
        let result = Validator::new().validate(&card("Sparkline", 4, props), &registry);
        match result {
            ValidationResult::Invalid { errors, suggested_action } => {
                assert_eq!(errors, vec![CardError::UnknownCardType { name: "Sparkline".into() }]);
                assert_eq!(suggested_action, SuggestedAction::RemoveCard);
            }
            ValidationResult::Valid => panic!("unknown card type validated"),
        }
    }
}

#[test]
fn invariant_numeric_bounds_inclusive() {
    let registry = CardRegistry::builtin();
    let defaults = registry.lookup_by_name("Chart").unwrap().default_props();

    let check = |value: f64| {
        let mut props = defaults.clone();
        props.insert("duration".into(), value.into());
        Validator::new().validate(&card("Chart", 6, props), &registry)
    };

    assert!(check(1.0).is_valid());
    assert!(check(300.0).is_valid());
    assert!(matches!(check(0.0).errors(), [CardError::PropertyOutOfRange { .. }]));
    assert!(matches!(check(300.5).errors(), [CardError::PropertyOutOfRange { .. }]));
}

#[test]
fn invariant_every_numeric_bound_is_inclusive() {
    let registry = CardRegistry::builtin();
    let validator = Validator::new();
    let mut checked = 0;

    for descriptor in registry.iter() {
        for control in &descriptor.controls {
            let ControlKind::Number { min: Some(min), max: Some(max) } = control.kind else {
                continue;
            };
            let check = |value: f64| {
                let mut props = descriptor.default_props();
                props.insert(control.key.clone(), value.into());
                validator.validate(&card(&descriptor.name, descriptor.span.default.get(), props), &registry)
            };

            for edge in [min, max] {
                assert!(check(edge).is_valid(), "{}.{} = {}", descriptor.name, control.key, edge);
            }
            for outside in [min - 1.0, max + 1.0] {
                assert!(
                    matches!(
                        check(outside).errors(),
                        [CardError::PropertyOutOfRange { key, .. }] if *key == control.key
                    ),
                    "{}.{} = {}",
                    descriptor.name,
                    control.key,
                    outside
                );
            }
            checked += 1;
        }
    }

    assert_eq!(checked, 4);
}

#[test]
fn invariant_state_with_overflowing_current_index_loads() {
    let state: DashboardState = serde_json::from_str(
        r#"{"layouts": [{"name": "ops"}], "current": 18446744073709551615}"#,
    )
    .unwrap();

    assert_eq!(state.current_layout().name, "default");
    assert!(state.layout("ops").is_some());
}

#[test]
fn invariant_non_numeric_duration_is_invalid() {
    let registry = CardRegistry::builtin();
    let mut props = PropBag::new();
    props.insert("duration".into(), "abc".into());

    let result = Validator::new().validate(&card("Chart", 3, props), &registry);

    assert!(!result.is_valid());
    assert!(result.errors().iter().any(|e| matches!(
        e,
        CardError::InvalidPropertyValue { key, .. } if key == "duration"
    )));
}

#[test]
fn invariant_resize_extremes() {
    let registry = CardRegistry::builtin();
    let descriptor = registry.lookup_by_name("Stat").unwrap();
    let config = card("Stat", 3, PropBag::new());

    let geometry = CardGeometry { left: 40.0, width: 240.0 };
    let viewport = Viewport { width: 3000.0 };
    let (min_width, max_width) = pixel_widths(geometry.width, config.span, &descriptor.span);
    let min_right = geometry.left + min_width;
    let max_right = geometry.left + max_width;

    let mut machine = ResizeMachine::default();
    machine.pointer_down(&config, descriptor, &mut NoCapture);

    let span_at = |machine: &mut ResizeMachine, x: f64| match machine.pointer_move(x, geometry, viewport) {
        ResizeEffect::Resized { intent } => intent.span,
        other => panic!("unexpected {:?}", other),
    };

    assert_eq!(span_at(&mut machine, min_right), descriptor.span.minimum);
    assert_eq!(span_at(&mut machine, max_right), descriptor.span.maximum);
    assert_eq!(span_at(&mut machine, min_right - 500.0), descriptor.span.minimum);
    assert_eq!(span_at(&mut machine, max_right + 500.0), descriptor.span.maximum);
}

#[test]
fn invariant_template_round_trip() {
    let registry = CardRegistry::builtin();
    let mut layout = DashboardLayout::new("ops");
    for name in ["Chart", "Notes", "Alerts"] {
        layout.add_card(CardConfig::from_descriptor(registry.lookup_by_name(name).unwrap()));
    }
    layout.cards[0].props.insert("futureKnob".into(), PropValue::Other(serde_json::json!([1, 2])));

    let bytes = serialize_template(&layout, "Name", "Desc").unwrap();
    let template = TemplateImporter::new(&registry, Vec::<String>::new())
        .parse_template(&bytes)
        .unwrap();

    assert_eq!(template.name, "Name");
    assert_eq!(template.description, "Desc");
    assert_eq!(template.vendor, TemplateVendor::UserSubmitted);
    assert_eq!(template.cards, layout.serial_cards());
}

#[test]
fn invariant_upload_name_collision_rejected() {
    let registry = CardRegistry::builtin();
    let mut state = DashboardState::new();
    let existing = gridcard_core::LayoutTemplate::from_layout(&DashboardLayout::new("a"), "My Dash", "Old one.").unwrap();
    state.save_template(existing).unwrap();

    let mut other = DashboardLayout::new("b");
    other.add_card(CardConfig::from_descriptor(registry.lookup_by_name("Stat").unwrap()));
    let upload = serialize_template(&other, "My Dash", "Different cards.").unwrap();

    let catalog = state.catalog(&registry);
    let result = TemplateImporter::from_catalog(&registry, &catalog).parse_template(&upload);
    assert!(matches!(result, Err(TemplateError::NameTaken(name)) if name == "My Dash"));
}

#[test]
fn invariant_uploaded_vendor_is_ignored() {
    let registry = CardRegistry::builtin();
    let upload = br#"{"name": "Sneaky", "description": "Claims to be official.", "cards": [], "version": "1.0.0", "vendor": "vendor-provided"}"#;
    let result = TemplateImporter::new(&registry, Vec::<String>::new()).parse_template(upload);
    assert!(matches!(result, Err(TemplateError::StructuralMismatch(_))));
}

#[test]
fn invariant_visibility_tiers() {
    let registry = CardRegistry::builtin();

    let production = registry.list_available(VisibilityTier::Production);
    assert!(production.iter().all(|d| d.stability == VisibilityTier::Production));

    assert_eq!(registry.list_available(VisibilityTier::Development).len(), registry.len());
}

#[test]
fn invariant_resize_intent_commits_to_state() {
    let registry = CardRegistry::builtin();
    let mut state = DashboardState::new();
    let id = state.add_card("Chart", &registry).unwrap();
    let config = state.current_layout().card(&id).unwrap().clone();
    let descriptor = registry.lookup_by_name("Chart").unwrap();

    let mut machine = ResizeMachine::default();
    machine.pointer_down(&config, descriptor, &mut NoCapture);
    let effect = machine.pointer_move(
        10_000.0,
        CardGeometry { left: 0.0, width: 600.0 },
        Viewport { width: 20_000.0 },
    );
    machine.pointer_up(&mut NoCapture);

    let ResizeEffect::Resized { intent } = effect else {
        panic!("expected a resize intent");
    };
    state.apply_resize(&intent).unwrap();
    assert_eq!(state.current_layout().card(&id).unwrap().span, Span::MAX);
}

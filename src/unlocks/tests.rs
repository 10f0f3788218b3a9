use super::*;
use crate::catalog::fixtures::{collectible_id, sample_world, world_from, SAMPLE_CATALOG};
use crate::catalog::Catalog;
use crate::rules::{PrototypeBinding, PrototypeRule};

const ALL: [&str; 10] = [
    "dingo",
    "condor",
    "budino d'acqua",
    "deinonychus",
    "ape killer",
    "splasher",
    "aquelous",
    "echeneis",
    "mal bernardo",
    "larva",
];

fn collectible(conn: &Connection, name: &str) -> Collectible {
    db::get_collectible(conn, collectible_id(conn, name))
        .unwrap()
        .unwrap()
}

fn set_captures(conn: &Connection, names: &[&str], count: i64) {
    for name in names {
        db::set_capture_count(conn, collectible_id(conn, name), count).unwrap();
    }
}

fn evaluate(conn: &Connection, touched: &[&str], negative_check: bool) -> UnlockReport {
    let rules = RuleBook::default();
    let touched: Vec<Collectible> = touched.iter().map(|name| collectible(conn, name)).collect();
    UnlockEvaluator::new(conn, &rules, negative_check)
        .evaluate(&touched)
        .unwrap()
}

fn names(events: &Option<Vec<UnlockEvent>>) -> Vec<&str> {
    events
        .iter()
        .flatten()
        .map(|event| event.name.as_str())
        .collect()
}

fn is_created(conn: &Connection, kind: ChampionKind, name: &str) -> bool {
    db::get_unlockable_by_name(conn, kind, name)
        .unwrap()
        .unwrap()
        .created
}

fn defeat_all_except(conn: &Connection, except: Option<(ChampionKind, &str)>) {
    for kind in ChampionKind::ALL {
        for entity in db::get_unlockables(conn, kind).unwrap() {
            if entity.name == "il supremo" || except == Some((kind, entity.name.as_str())) {
                continue;
            }
            db::set_defeated(conn, kind, entity.id, true).unwrap();
        }
    }
}

// ============================================================================
// AREA CHAMPIONS
// ============================================================================

#[test]
fn test_area_champion_created_when_zone_complete() {
    let conn = sample_world();

    set_captures(&conn, &["dingo", "condor"], 1);
    let report = evaluate(&conn, &["dingo", "condor"], false);
    assert!(report.area_champions.is_none(), "2 of 3 captured: no area event");

    set_captures(&conn, &["budino d'acqua"], 1);
    let report = evaluate(&conn, &["budino d'acqua"], false);

    let events = report.area_champions.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "trusthevis");
    assert!(events[0].created);
    assert_eq!(
        events[0].image_url.as_deref(),
        Some("../images/area_champions/trusthevis.png")
    );
    assert_eq!(
        events[0].reward,
        Some(Reward {
            item: "coda di fenice".to_string(),
            quantity: 5
        })
    );
    assert!(is_created(&conn, ChampionKind::Area, "trusthevis"));
}

#[test]
fn test_evaluate_is_idempotent() {
    let conn = sample_world();
    let besaid = ["dingo", "condor", "budino d'acqua"];

    set_captures(&conn, &besaid, 1);
    let first = evaluate(&conn, &besaid, false);
    assert!(!first.is_empty());

    let second = evaluate(&conn, &besaid, false);
    assert!(second.is_empty(), "no new deltas: {:?}", second);

    let third = evaluate(&conn, &besaid, true);
    assert!(third.is_empty(), "negative check on unchanged state: {:?}", third);
}

#[test]
fn test_zone_without_champion_is_skipped() {
    let conn = sample_world();

    set_captures(&conn, &["larva"], 1);
    let report = evaluate(&conn, &["larva"], false);

    assert!(report.is_empty());
}

#[test]
fn test_positive_only_batch_never_retracts() {
    let conn = sample_world();
    let besaid = ["dingo", "condor", "budino d'acqua"];

    set_captures(&conn, &besaid, 1);
    evaluate(&conn, &besaid, false);
    assert!(is_created(&conn, ChampionKind::Area, "trusthevis"));

    // Predicate no longer holds, but the batch only went up
    set_captures(&conn, &["dingo"], 0);
    set_captures(&conn, &["condor"], 2);
    let report = evaluate(&conn, &["dingo", "condor"], false);

    assert!(report.area_champions.is_none());
    assert!(is_created(&conn, ChampionKind::Area, "trusthevis"));
}

#[test]
fn test_area_champion_retracted_with_negative_check() {
    let conn = sample_world();
    let besaid = ["dingo", "condor", "budino d'acqua"];

    set_captures(&conn, &besaid, 1);
    evaluate(&conn, &besaid, false);

    set_captures(&conn, &["condor"], 0);
    let report = evaluate(&conn, &["condor"], true);

    let events = report.area_champions.unwrap();
    assert_eq!(events[0].name, "trusthevis");
    assert!(!events[0].created);
    assert_eq!(events[0].reward, None);
    assert!(!is_created(&conn, ChampionKind::Area, "trusthevis"));
}

// ============================================================================
// SPECIES CHAMPIONS
// ============================================================================

#[test]
fn test_species_champion_created_at_required_count() {
    let conn = sample_world();

    set_captures(&conn, &["condor", "ape killer"], 1);
    let report = evaluate(&conn, &["condor", "ape killer"], false);
    assert!(report.species_champions.is_none());

    set_captures(&conn, &["condor", "ape killer"], 2);
    let report = evaluate(&conn, &["condor", "ape killer"], false);

    // Two members of the same group produce a single event
    assert_eq!(names(&report.species_champions), vec!["pterix"]);
}

#[test]
fn test_species_retraction_with_negative_check() {
    let conn = sample_world();

    set_captures(&conn, &["condor", "ape killer"], 2);
    evaluate(&conn, &["condor", "ape killer"], false);
    assert!(is_created(&conn, ChampionKind::Species, "pterix"));

    set_captures(&conn, &["condor"], 1);
    let report = evaluate(&conn, &["condor"], true);

    let events = report.species_champions.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "pterix");
    assert!(!events[0].created);
    assert_eq!(events[0].reward, None);
    assert!(!is_created(&conn, ChampionKind::Species, "pterix"));
}

#[test]
fn test_species_kept_without_negative_check() {
    let conn = sample_world();

    set_captures(&conn, &["condor", "ape killer"], 2);
    evaluate(&conn, &["condor", "ape killer"], false);

    set_captures(&conn, &["condor"], 1);
    let report = evaluate(&conn, &["condor"], false);

    assert!(report.species_champions.is_none());
    assert!(is_created(&conn, ChampionKind::Species, "pterix"));
}

#[test]
fn test_collectible_without_species_is_ignored() {
    let conn = sample_world();

    set_captures(&conn, &["deinonychus"], 3);
    let report = evaluate(&conn, &["deinonychus"], false);

    assert!(report.species_champions.is_none());
}

// ============================================================================
// PROTOTYPES
// ============================================================================

#[test]
fn test_prototype_sees_champions_toggled_in_same_pass() {
    let conn = sample_world();
    let batch = ["dingo", "condor", "budino d'acqua", "deinonychus", "ape killer"];

    set_captures(&conn, &batch, 1);
    let report = evaluate(&conn, &batch, false);

    assert_eq!(names(&report.area_champions), vec!["trusthevis", "molboro beta"]);
    assert_eq!(names(&report.species_champions), vec!["budino jumbo"]);
    assert_eq!(names(&report.prototypes), vec!["mangiaterra"]);

    let mangiaterra = &report.prototypes.unwrap()[0];
    assert_eq!(
        mangiaterra.reward,
        Some(Reward {
            item: "megaelisir".to_string(),
            quantity: 1
        })
    );
}

#[test]
fn test_all_captured_five_fires_on_exact_batch() {
    let conn = sample_world();

    set_captures(&conn, &ALL, 5);
    set_captures(&conn, &["larva"], 4);
    let report = evaluate(&conn, &ALL, false);

    assert_eq!(
        names(&report.prototypes),
        vec!["mangiaterra", "titanosfera", "gasteropodos", "shinryu"]
    );
    assert!(!is_created(&conn, ChampionKind::Prototype, "ultima x"));

    set_captures(&conn, &["larva"], 5);
    let report = evaluate(&conn, &["larva"], false);

    assert_eq!(names(&report.prototypes), vec!["ultima x"]);
    assert!(report.area_champions.is_none());
    assert!(report.species_champions.is_none());
}

#[test]
fn test_prototype_retracted_with_negative_check() {
    let conn = sample_world();

    set_captures(&conn, &ALL, 5);
    evaluate(&conn, &ALL, false);
    assert!(is_created(&conn, ChampionKind::Prototype, "ultima x"));

    set_captures(&conn, &["larva"], 4);
    let report = evaluate(&conn, &["larva"], true);

    let events = report.prototypes.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "ultima x");
    assert!(!events[0].created);
    assert_eq!(events[0].reward, None);
}

#[test]
fn test_zone_collectibles_rule() {
    let conn = sample_world();

    set_captures(&conn, &["splasher", "aquelous"], 2);
    let report = evaluate(&conn, &["splasher", "aquelous"], false);
    assert!(!names(&report.prototypes).contains(&"shinryu"));

    set_captures(&conn, &["echeneis"], 2);
    let report = evaluate(&conn, &["echeneis"], false);
    assert!(names(&report.prototypes).contains(&"shinryu"));
}

#[test]
fn test_champion_count_thresholds() {
    let conn = sample_world();
    let rules = RuleBook::from_json(
        r#"{"prototypes": [
            {"prototype": "Catastrophe", "rule": {"kind": "area_champions_created", "at_least": 3}},
            {"prototype": "Vlakorados", "rule": {"kind": "species_champions_created", "at_least": 3}}
        ]}"#,
    )
    .unwrap();
    let run = |touched: &[&str]| {
        let touched: Vec<Collectible> = touched.iter().map(|name| collectible(&conn, name)).collect();
        UnlockEvaluator::new(&conn, &rules, false)
            .evaluate(&touched)
            .unwrap()
    };

    // Besaid and Kilika complete, budino jumbo reached
    let batch = ["dingo", "condor", "budino d'acqua", "deinonychus", "ape killer"];
    set_captures(&conn, &batch, 1);
    let report = run(&batch);
    assert_eq!(names(&report.area_champions).len(), 2);
    assert!(report.prototypes.is_none(), "two of each: {:?}", report.prototypes);

    let gagazet = ["splasher", "aquelous", "echeneis", "mal bernardo"];
    set_captures(&conn, &gagazet, 1);
    let report = run(&gagazet);
    assert_eq!(names(&report.area_champions), vec!["catoblepas"]);
    assert_eq!(names(&report.prototypes), vec!["catastrophe"]);

    set_captures(&conn, &["condor", "ape killer"], 2);
    let report = run(&["condor", "ape killer"]);
    assert_eq!(names(&report.species_champions), vec!["pterix"]);
    assert!(report.prototypes.is_none(), "only two species champions");

    set_captures(&conn, &["dingo", "mal bernardo"], 3);
    let report = run(&["dingo", "mal bernardo"]);
    assert_eq!(names(&report.species_champions), vec!["fenril"]);
    assert_eq!(names(&report.prototypes), vec!["vlakorados"]);
}

#[test]
fn test_zone_rule_with_repeated_collectible() {
    let conn = sample_world();
    let rules = RuleBook {
        prototypes: vec![PrototypeBinding {
            prototype: "shinryu".to_string(),
            rule: PrototypeRule::ZoneCollectiblesCaptured {
                zone: "monte gagazet".to_string(),
                collectibles: vec!["splasher".to_string(), "splasher".to_string()],
                at_least: 2,
            },
        }],
        ..RuleBook::default()
    };

    set_captures(&conn, &["splasher"], 1);
    let report = UnlockEvaluator::new(&conn, &rules, false)
        .check_prototypes()
        .unwrap();
    assert!(report.is_none());

    set_captures(&conn, &["splasher"], 2);
    let report = UnlockEvaluator::new(&conn, &rules, false)
        .check_prototypes()
        .unwrap();
    assert_eq!(names(&report), vec!["shinryu"]);
}

#[test]
fn test_missing_prototype_row_fails_loudly() {
    let mut catalog = Catalog::from_json(SAMPLE_CATALOG).unwrap();
    catalog.prototypes.retain(|p| p.name != "Ultima X");
    let conn = world_from(catalog);

    set_captures(&conn, &["dingo"], 1);
    let rules = RuleBook::default();
    let err = UnlockEvaluator::new(&conn, &rules, false)
        .evaluate(&[collectible(&conn, "dingo")])
        .unwrap_err();

    assert!(err.is_not_found(), "unexpected error: {}", err);
}

#[test]
fn test_missing_rule_zone_fails_loudly() {
    let conn = sample_world();
    let mut rules = RuleBook::default();
    rules.prototypes.retain(|b| b.prototype != "shinryu");
    rules.prototypes.push(PrototypeBinding {
        prototype: "shinryu".to_string(),
        rule: PrototypeRule::ZoneCollectiblesCaptured {
            zone: "zanarkand".to_string(),
            collectibles: vec!["splasher".to_string()],
            at_least: 2,
        },
    });

    let err = UnlockEvaluator::new(&conn, &rules, false)
        .check_prototypes()
        .unwrap_err();

    assert!(matches!(err, UnlockError::NotFound { kind: "zone", .. }));
}

#[test]
fn test_missing_creation_reward_fails_loudly() {
    let mut catalog = Catalog::from_json(SAMPLE_CATALOG).unwrap();
    catalog.area_champions[0].reward = None;
    let conn = world_from(catalog);
    let besaid = ["dingo", "condor", "budino d'acqua"];

    set_captures(&conn, &besaid, 1);
    let rules = RuleBook::default();
    let touched: Vec<Collectible> = besaid.iter().map(|n| collectible(&conn, n)).collect();
    let err = UnlockEvaluator::new(&conn, &rules, false)
        .evaluate(&touched)
        .unwrap_err();

    assert!(matches!(
        err,
        UnlockError::NotFound {
            kind: "creation reward",
            ..
        }
    ));
}

// ============================================================================
// CAPSTONE
// ============================================================================

#[test]
fn test_capstone_never_fires_from_capture_path() {
    let conn = sample_world();

    set_captures(&conn, &ALL, 10);
    defeat_all_except(&conn, None);
    let report = evaluate(&conn, &ALL, false);

    assert!(!names(&report.prototypes).contains(&"il supremo"));
    assert!(!is_created(&conn, ChampionKind::Prototype, "il supremo"));
}

#[test]
fn test_capstone_fires_on_last_defeat() {
    let conn = sample_world();
    let rules = RuleBook::default();

    set_captures(&conn, &ALL, 10);
    evaluate(&conn, &ALL, false);
    defeat_all_except(&conn, Some((ChampionKind::Species, "fenril")));

    let capstone = UnlockEvaluator::new(&conn, &rules, false)
        .evaluate_capstone()
        .unwrap();
    assert!(capstone.is_none(), "fenril still undefeated");

    let fenril = db::get_unlockable_by_name(&conn, ChampionKind::Species, "fenril")
        .unwrap()
        .unwrap();
    db::set_defeated(&conn, ChampionKind::Species, fenril.id, true).unwrap();

    let capstone = UnlockEvaluator::new(&conn, &rules, false)
        .evaluate_capstone()
        .unwrap()
        .unwrap();
    assert_eq!(capstone.name, "il supremo");
    assert!(capstone.created);
    assert_eq!(
        capstone.reward,
        Some(Reward {
            item: "porta sul domani".to_string(),
            quantity: 1
        })
    );

    // Already created: a second evaluation is a no-op
    let again = UnlockEvaluator::new(&conn, &rules, false)
        .evaluate_capstone()
        .unwrap();
    assert!(again.is_none());
}

#[test]
fn test_capstone_requires_maximum_captures() {
    let conn = sample_world();
    let rules = RuleBook::default();

    set_captures(&conn, &ALL, 10);
    set_captures(&conn, &["larva"], 9);
    defeat_all_except(&conn, None);

    let capstone = UnlockEvaluator::new(&conn, &rules, false)
        .evaluate_capstone()
        .unwrap();
    assert!(capstone.is_none());
}

#[test]
fn test_capstone_retracted_when_defeat_undone() {
    let conn = sample_world();
    let rules = RuleBook::default();

    set_captures(&conn, &ALL, 10);
    defeat_all_except(&conn, None);
    UnlockEvaluator::new(&conn, &rules, false)
        .evaluate_capstone()
        .unwrap()
        .unwrap();

    let trusthevis = db::get_unlockable_by_name(&conn, ChampionKind::Area, "trusthevis")
        .unwrap()
        .unwrap();
    db::set_defeated(&conn, ChampionKind::Area, trusthevis.id, false).unwrap();

    let capstone = UnlockEvaluator::new(&conn, &rules, true)
        .evaluate_capstone()
        .unwrap()
        .unwrap();
    assert!(!capstone.created);
    assert_eq!(capstone.reward, None);
}

// ============================================================================
// AUDIT
// ============================================================================

#[test]
fn test_toggles_are_recorded_in_event_log() {
    let conn = sample_world();
    let besaid = ["dingo", "condor", "budino d'acqua"];

    set_captures(&conn, &besaid, 1);
    let report = evaluate(&conn, &besaid, false);
    let trusthevis = &report.area_champions.unwrap()[0];

    let events =
        db::get_events_for_entity(&conn, "area_champion", &trusthevis.id.to_string()).unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "area_champion_created");
    assert_eq!(events[0].actor, "unlock_evaluator");
    assert_eq!(events[0].data["reward"]["item"], "coda di fenice");
}

#[test]
fn test_prototype_events_named_after_kind() {
    let conn = sample_world();
    let rules = RuleBook::default();

    set_captures(&conn, &ALL, 10);
    defeat_all_except(&conn, None);
    let capstone = UnlockEvaluator::new(&conn, &rules, false)
        .evaluate_capstone()
        .unwrap()
        .unwrap();

    let trusthevis = db::get_unlockable_by_name(&conn, ChampionKind::Area, "trusthevis")
        .unwrap()
        .unwrap();
    db::set_defeated(&conn, ChampionKind::Area, trusthevis.id, false).unwrap();
    UnlockEvaluator::new(&conn, &rules, true)
        .evaluate_capstone()
        .unwrap()
        .unwrap();

    let events = db::get_events_for_entity(&conn, "prototype", &capstone.id.to_string()).unwrap();
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();

    assert_eq!(types, vec!["prototype_retracted", "prototype_created"]);
}

use std::collections::BTreeMap;

use proptest::prelude::*;
use turnforge::data::SkillConfig;
use turnforge::error::PlanningError;
use turnforge::planning::{AssignRequest, PlanningDraft, Side, SlotKey, SlotLayout, TurnBudget, TurnPlanner};

const SKILLS: [&str; 3] = ["slash", "volley", "guard"];
const PARTS: [&str; 3] = ["head", "chest", "legs"];

fn catalog() -> BTreeMap<String, SkillConfig> {
    serde_yaml::from_str(
        r#"
slash: { id: slash, cost: 2, value: 20 }
volley: { id: volley, cost: 1, value: 5, target: { selection: { mode: multiple, selectCount: 3 } } }
guard: { id: guard, type: buff, cost: 1, target: { subject: SELF } }
"#,
    )
    .expect("catalog parses")
}

fn layout() -> SlotLayout {
    SlotLayout::new()
        .with_part("head", 1, 1)
        .with_part("chest", 1, 2)
        .with_part("legs", 0, 2)
}

fn planner(ap: u32) -> TurnPlanner {
    let mut planner = TurnPlanner::new("player", Some(layout()));
    planner.set_budget(TurnBudget {
        available_ap: ap,
        costs: BTreeMap::from([
            ("slash".to_string(), 2),
            ("volley".to_string(), 1),
            ("guard".to_string(), 1),
        ]),
        actor_speed: 10.0,
        player_target: "player".into(),
        enemy_target: Some("goblin".into()),
    });
    planner
}

#[derive(Debug, Clone)]
enum Op {
    Assign {
        skill: usize,
        side: Side,
        part: usize,
        index: u32,
        replace: bool,
    },
    Unassign {
        side: Side,
        part: usize,
        index: u32,
    },
}

fn side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Player), Just(Side::Enemy)]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..SKILLS.len(), side(), 0..PARTS.len(), 0u32..3, any::<bool>()).prop_map(
            |(skill, side, part, index, replace)| Op::Assign { skill, side, part, index, replace }
        ),
        1 => (side(), 0..PARTS.len(), 0u32..3).prop_map(|(side, part, index)| Op::Unassign { side, part, index }),
    ]
}

fn target_for(side: Side) -> &'static str {
    match side {
        Side::Player => "player",
        Side::Enemy => "goblin",
    }
}

proptest! {
    #[test]
    fn capacity_budget_and_select_count_always_hold(ap in 0u32..8, ops in prop::collection::vec(op(), 1..40)) {
        let skills = catalog();
        let layout = layout();
        let mut planner = planner(ap);

        for op in ops {
            let before = planner.snapshot();
            match op {
                Op::Assign { skill, side, part, index, replace } => {
                    let skill_id = SKILLS[skill];
                    let cost = planner.budget().costs[skill_id];
                    let mut request = AssignRequest::new(SlotKey::new(side, PARTS[part], index), skill_id, target_for(side))
                        .cost(cost);
                    if replace {
                        request = request.replacing();
                    }
                    if planner.assign(request, &skills).is_err() {
                        prop_assert_eq!(&planner.snapshot(), &before);
                    }
                }
                Op::Unassign { side, part, index } => {
                    if planner.unassign(&SlotKey::new(side, PARTS[part], index)).is_err() {
                        prop_assert_eq!(&planner.snapshot(), &before);
                    }
                }
            }

            prop_assert!(planner.used_ap() <= ap);
            for skill_id in SKILLS {
                let max = skills[skill_id].select_count();
                prop_assert!(planner.placements_for_skill(skill_id) <= max);
            }
            for action in planner.planned_actions() {
                let slot = action.slot_key.clone().expect("player actions carry their slot");
                prop_assert!(slot.index < layout.capacity(slot.side, &slot.part));
                prop_assert_eq!(planner.action_for_slot(&slot), Some(&action));
            }
            let snapshot = planner.snapshot();
            prop_assert_eq!(snapshot.assigned.len(), snapshot.order.len());
            prop_assert_eq!(snapshot.actions_by_id.len(), snapshot.order.len());
        }
    }

    #[test]
    fn slot_keys_parse_what_they_print(part in "[a-z]{1,8}", index in 0u32..1000, enemy in any::<bool>()) {
        let side = if enemy { Side::Enemy } else { Side::Player };
        let key = SlotKey::new(side, part, index);
        prop_assert_eq!(SlotKey::parse(&key.to_string()), Ok(key));
    }
}

#[test]
fn malformed_slot_keys_are_rejected() {
    for raw in ["", "enemy", "enemy:head", "enemy:head:x", "enemy::0", "boss:head:0", "enemy:head:0:1", "enemy:head:-1"] {
        assert_eq!(
            SlotKey::parse(raw),
            Err(PlanningError::InvalidSlotKey(raw.to_string())),
            "{raw:?} should not parse"
        );
    }
}

#[test]
fn plan_many_collects_failures_without_stopping() {
    let skills = catalog();
    let mut planner = planner(3);
    let draft = PlanningDraft::default()
        .with_skill("volley", ["enemy:head:0", "enemy:chest:0", "enemy:legs:0", "enemy:legs:1"])
        .with_skill("ghost", ["enemy:chest:1"]);

    let report = planner.plan_many(&draft, &skills);

    assert_eq!(report.placed.len(), 3);
    assert_eq!(planner.used_ap(), 3);
    let reasons: Vec<&PlanningError> = report.errors.iter().map(|failure| &failure.error).collect();
    assert!(reasons.contains(&&PlanningError::UnknownSkill("ghost".into())));
    assert!(reasons.iter().any(|err| matches!(err, PlanningError::ExceedsSelectCount { max: 3, .. })));
}

#[test]
fn no_capacity_on_side_is_reported_per_side() {
    let skills = catalog();
    let mut planner = planner(5);
    assert_eq!(
        planner.assign(AssignRequest::new(SlotKey::new(Side::Player, "legs", 0), "guard", "player").cost(1), &skills),
        Err(PlanningError::NoCapacity {
            side: Side::Player,
            part: "legs".into()
        })
    );
    assert!(planner
        .assign(AssignRequest::new(SlotKey::new(Side::Enemy, "legs", 1), "volley", "goblin").cost(1), &skills)
        .is_ok());
}

#[test]
fn reset_keeps_layout_and_budget() {
    let skills = catalog();
    let mut planner = planner(4);
    planner
        .assign(AssignRequest::new(SlotKey::new(Side::Enemy, "head", 0), "slash", "goblin").cost(2), &skills)
        .unwrap();
    planner.reset();

    assert!(planner.is_empty());
    assert_eq!(planner.remaining_ap(), 4);
    assert!(planner.layout().is_some());
    let id = planner
        .assign(AssignRequest::new(SlotKey::new(Side::Enemy, "head", 0), "slash", "goblin").cost(2), &skills)
        .unwrap();
    assert_eq!(id, "a_1");
}

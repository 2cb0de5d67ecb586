use super::*;
use crate::error::ErrorKind;

fn loc() -> SiteLocation {
    SiteLocation::new("concat_test", 3)
}

fn bulk(cap: usize) -> ConcatSelector {
    ConcatSelector::new(JoinCapability::new(true, cap), 1_000)
}

fn texts(items: &[&str]) -> Vec<Val> {
    items.iter().map(|s| Val::from(*s)).collect()
}

#[test]
fn three_operands_with_cap_two_fold_left() {
    let plan = bulk(2).plan(&loc(), &vec![ScriptType::Text; 3]).unwrap();
    assert_eq!(plan.strategy(), ConcatStrategy::BulkJoin { cap: 2 });
    assert_eq!(
        plan.groups(),
        &[
            JoinGroup {
                carries_previous: false,
                operands: 0..2
            },
            JoinGroup {
                carries_previous: true,
                operands: 2..3
            },
        ]
    );
    let values = texts(&["a", "b", "c"]);
    assert_eq!(plan.execute(&values).unwrap(), Val::from("abc"));
    let single = join(&values.iter().map(render_text).collect::<Vec<_>>());
    assert_eq!(single.as_ref(), "abc");
}

#[test]
fn no_group_exceeds_the_cap() {
    for cap in 2..7 {
        for len in 0..40 {
            let groups = chunk(len, cap);
            assert!(groups.iter().all(|g| g.width() <= cap), "cap {cap} len {len}");
            let covered: usize = groups.iter().map(|g| g.operands.len()).sum();
            assert_eq!(covered, len);
            assert!(groups.windows(2).all(|w| w[0].operands.end == w[1].operands.start));
        }
    }
}

#[test]
fn chunked_join_equals_single_join() {
    let words: Vec<String> = (0..57).map(|i| format!("w{i}-")).collect();
    let values: Vec<Val> = words.iter().map(|w| Val::from(w.as_str())).collect();
    let expected: String = words.concat();
    for cap in [2, 3, 10, 56, 57, 200] {
        let plan = bulk(cap).plan(&loc(), &vec![ScriptType::Text; values.len()]).unwrap();
        assert_eq!(plan.execute(&values).unwrap(), Val::from(expected.as_str()), "cap {cap}");
    }
}

#[test]
fn accumulator_matches_bulk_for_mixed_operands() {
    let types = [
        ScriptType::Text,
        ScriptType::INT,
        ScriptType::DOUBLE,
        ScriptType::BOOL,
        ScriptType::CHAR,
        ScriptType::Def,
    ];
    let values = vec![
        Val::from("n="),
        Val::Int(-4),
        Val::Double(2.5),
        Val::Bool(true),
        Val::Char('!'),
        Val::Null,
    ];
    let accumulator = ConcatSelector::new(JoinCapability::new(false, 200), 1_000);
    let acc_plan = accumulator.plan(&loc(), &types).unwrap();
    assert_eq!(acc_plan.strategy(), ConcatStrategy::Accumulator);
    assert!(acc_plan.groups().is_empty());
    let bulk_plan = bulk(4).plan(&loc(), &types).unwrap();
    let acc = acc_plan.execute(&values).unwrap();
    assert_eq!(acc, bulk_plan.execute(&values).unwrap());
    assert_eq!(acc, Val::from("n=-42.5true!null"));
}

#[test]
fn accumulator_uses_per_tag_appends() {
    let selector = ConcatSelector::new(JoinCapability::new(false, 0), 1_000);
    let plan = selector
        .plan(&loc(), &[ScriptType::Text, ScriptType::LONG, ScriptType::Def])
        .unwrap();
    let names: Vec<String> = plan.appends().iter().map(|d| d.to_string()).collect();
    assert_eq!(
        names,
        [
            "append_String(String,String)String",
            "append_long(String,long)String",
            "append_Object(String,def)String"
        ]
    );
}

#[test]
fn tiny_cap_falls_back_to_accumulator() {
    let selector = ConcatSelector::new(JoinCapability::new(true, 1), 1_000);
    assert_eq!(selector.strategy(), ConcatStrategy::Accumulator);
    assert!(!JoinCapability::detect(&ConcatConfig {
        bulk_join: None,
        max_group_operands: 1,
        max_total_operands: 10,
    })
    .available);
}

#[test]
fn over_ceiling_is_rejected_before_execution() {
    let selector = ConcatSelector::new(JoinCapability::new(true, 200), 4);
    let err = selector.plan(&loc(), &vec![ScriptType::Text; 5]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BuildRejected);
    let message = err.to_string();
    assert!(message.contains("concat_test@3"), "{message}");
    assert!(message.contains("at most 4"), "{message}");
    assert!(selector.plan(&loc(), &vec![ScriptType::Text; 4]).is_ok());
}

#[test]
fn empty_and_single_operand() {
    let plan = bulk(2).plan(&loc(), &[]).unwrap();
    assert_eq!(plan.execute(&[]).unwrap(), Val::from(""));
    let plan = bulk(2).plan(&loc(), &[ScriptType::INT]).unwrap();
    assert_eq!(plan.execute(&[Val::Int(7)]).unwrap(), Val::from("7"));
    assert!(plan.execute(&[]).is_err());
}

#[test]
fn detect_honours_configuration() {
    let mut config = ConcatConfig::default();
    assert_eq!(JoinCapability::detect(&config), JoinCapability::new(true, 200));
    config.bulk_join = Some(false);
    assert!(!JoinCapability::detect(&config).available);
}

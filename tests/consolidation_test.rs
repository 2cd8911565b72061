// ==========================================
// 订单合并集成测试
// ==========================================
// 测试范围:
// 1. 候选分组识别 (只读)
// 2. 按分组确认合并: 数量求和, 删除被并入订单, 一条合并日志
// 3. 人工勾选合并: 拒绝条件
// 4. 合并后子订单号不复用
// ==========================================

mod test_helpers;

use poultry_settlement::domain::{BirdTypeLabel, OrderState};
use poultry_settlement::{ApiError, ChangeKind};
use test_helpers::*;

#[test]
fn test_el_sabor_50_plus_30_becomes_80() {
    let env = create_seeded_env();
    let orders = &env.state.order_api;
    let consolidation = &env.state.consolidation_api;

    let a = orders.create_order(&request("ElSabor", "Vivo", 50)).unwrap();
    let b = orders.create_order(&request("ElSabor", "Vivo", 30)).unwrap();
    orders.create_order(&request("DonPepe", "Vivo", 10)).unwrap();

    let groups = consolidation.propose_consolidations(day()).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].order_numbers, vec!["C001.1", "C001.2"]);
    assert_eq!(groups[0].total_quantity, 80);
    // 只读: 尚未合并
    assert_eq!(orders.list_orders(day()).unwrap().len(), 3);

    let survivor = consolidation
        .apply_consolidation(day(), &groups[0].group_id)
        .unwrap();
    assert_eq!(survivor.order_id, a.order_id);
    assert_eq!(survivor.quantity, 80);
    assert_eq!(survivor.order_number, "C001.1");

    assert_eq!(orders.get_order(&a.order_id).unwrap().quantity, 80);
    assert!(matches!(orders.get_order(&b.order_id), Err(ApiError::NotFound(_))));
    assert_eq!(orders.list_orders(day()).unwrap().len(), 2);

    let log = orders.change_log_by_kind(ChangeKind::Consolidation).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].order_id, a.order_id);
    assert_eq!((log[0].quantity_before, log[0].quantity_after), (Some(50), Some(80)));
    assert_eq!(log[0].affected_order_numbers, vec!["C001.1", "C001.2"]);

    assert!(consolidation.propose_consolidations(day()).unwrap().is_empty());
}

#[test]
fn test_stale_or_unknown_group_rejected() {
    let env = create_seeded_env();
    let orders = &env.state.order_api;
    let consolidation = &env.state.consolidation_api;

    let a = orders.create_order(&request("ElSabor", "Vivo", 50)).unwrap();
    orders.create_order(&request("ElSabor", "Vivo", 30)).unwrap();
    let group = consolidation.propose_consolidations(day()).unwrap().remove(0);

    // 成员进入生产后, 分组不再成立
    orders.transition(&a.order_id, OrderState::InProduction, None).unwrap();
    assert!(matches!(
        consolidation.apply_consolidation(day(), &group.group_id),
        Err(ApiError::ConsolidationRejected(_))
    ));
    assert!(matches!(
        consolidation.apply_consolidation(day(), "no|such|group|id"),
        Err(ApiError::ConsolidationRejected(_))
    ));
    assert!(orders.change_log_by_kind(ChangeKind::Consolidation).unwrap().is_empty());
}

#[test]
fn test_manual_consolidation_rules() {
    let env = create_seeded_env();
    let orders = &env.state.order_api;
    let consolidation = &env.state.consolidation_api;

    let a = orders.create_order(&request("ElSabor", "Vivo", 50)).unwrap();
    let b = orders.create_order(&request("ElSabor", "Pelado", 30)).unwrap();
    let c = orders.create_order(&request("ElSabor", "Vivo", 20)).unwrap();

    // 单个订单
    assert!(matches!(
        consolidation.consolidate_manual(&[a.order_id.clone()]),
        Err(ApiError::ConsolidationRejected(_))
    ));
    // 品相不同
    assert!(matches!(
        consolidation.consolidate_manual(&[a.order_id.clone(), b.order_id.clone()]),
        Err(ApiError::ConsolidationRejected(_))
    ));
    // 重复选择
    assert!(matches!(
        consolidation.consolidate_manual(&[a.order_id.clone(), a.order_id.clone()]),
        Err(ApiError::ConsolidationRejected(_))
    ));

    // 选择顺序不影响保留单
    let survivor = consolidation
        .consolidate_manual(&[c.order_id.clone(), a.order_id.clone()])
        .unwrap();
    assert_eq!(survivor.order_id, a.order_id);
    assert_eq!(survivor.quantity, 70);
}

#[test]
fn test_sex_counts_summed_on_merge() {
    let env = create_seeded_env();
    let orders = &env.state.order_api;

    let mut r1 = request("ElSabor", "Vivo", 30);
    r1.bird_type = BirdTypeLabel::plain("Pollo").with_sex_counts(10, 20);
    let mut r2 = request("ElSabor", "Vivo", 15);
    r2.bird_type = BirdTypeLabel::plain("Pollo").with_variety("Roja").with_sex_counts(5, 10);

    let a = orders.create_order(&r1).unwrap();
    let b = orders.create_order(&r2).unwrap();

    let survivor = env
        .state
        .consolidation_api
        .consolidate_manual(&[a.order_id, b.order_id])
        .unwrap();
    let counts = survivor.bird_type.sex_counts.unwrap();
    assert_eq!((counts.male, counts.female), (15, 30));
    assert_eq!(survivor.quantity, 45);
}

#[test]
fn test_sub_seq_not_reused_after_consolidation() {
    let env = create_seeded_env();
    let orders = &env.state.order_api;

    let a = orders.create_order(&request("ElSabor", "Vivo", 50)).unwrap();
    let b = orders.create_order(&request("ElSabor", "Vivo", 30)).unwrap();
    env.state
        .consolidation_api
        .consolidate_manual(&[a.order_id, b.order_id])
        .unwrap();

    let next = orders.create_order(&request("ElSabor", "Pelado", 5)).unwrap();
    assert_eq!(next.order_number, "C001.3");
}

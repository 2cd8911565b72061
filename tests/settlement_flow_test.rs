// ==========================================
// 结算流程集成测试
// ==========================================
// 测试范围:
// 1. 称重接入 → 当日结算行 (参考算例 1657.50)
// 2. 非当日出磅 / sync_day 补建
// 3. 人工修改、确认锁定、退回编辑
// 4. 价格级联与规则顺序无关, 未匹配价格告警
// 5. 导出筛选/排序, 整日保存 (已确认行不可改写)
// 6. 订单须进入称重后才接收称重, 取消单不开票
// 7. 客户改名级联到未确认结算行
// ==========================================

mod test_helpers;

use chrono::Duration;
use poultry_settlement::domain::{
    BirdTypeLabel, CatalogEvent, Client, ExportFilter, ExportSort, OrderState, SettlementEdit,
    SettlementWarning,
};
use poultry_settlement::ApiError;
use test_helpers::*;

// ==========================================
// 称重接入
// ==========================================

#[test]
fn test_reference_example_total_1657_50() {
    let env = create_seeded_env();
    let order = weighing_order(&env.state, &request("ElSabor", "Vivo", 100));

    let outcome = env
        .state
        .settlement_api
        .apply_weighing(&feed(&order.order_id, 220.0, Some(20.0), 5.0), day())
        .unwrap()
        .unwrap();

    let row = &outcome.row;
    assert!(outcome.warnings.is_empty());
    assert_eq!(row.settle_date, day());
    assert_eq!(row.shrink_total_kg, 0.0);
    assert_eq!(row.net_weight_kg, 195.0);
    assert_eq!(row.price_per_kg, 8.5);
    assert_eq!(row.total_amount, 1657.50);
    assert_eq!(row.ticket_number.as_deref(), Some(format!("T-{}", order.order_id).as_str()));
    assert!(!row.confirmed);

    assert!(env.state.order_api.get_order(&order.order_id).unwrap().ticket_issued());
    assert_eq!(env.state.settlement_api.load_day(day()).unwrap(), vec![row.clone()]);
}

#[test]
fn test_container_weight_falls_back_to_tare() {
    let env = create_seeded_env();
    let order = weighing_order(&env.state, &request("ElSabor", "Vivo", 10));

    let row = env
        .state
        .settlement_api
        .apply_weighing(&feed(&order.order_id, 100.0, None, 0.0), day())
        .unwrap()
        .unwrap()
        .row;
    // Javas 2.5 × 10
    assert_eq!(row.container_weight_kg, 25.0);
    assert_eq!(row.net_weight_kg, 75.0);
    assert_eq!(row.total_amount, 637.5);
}

#[test]
fn test_weighing_on_other_day_then_sync() {
    let env = create_seeded_env();
    let api = &env.state.settlement_api;
    let order = weighing_order(&env.state, &request("ElSabor", "Vivo", 100));

    let next_day = day() + Duration::days(1);
    let mut weighing = feed(&order.order_id, 220.0, Some(20.0), 5.0);
    weighing.ticket_date = next_day;

    assert!(api.apply_weighing(&weighing, day()).unwrap().is_none());
    assert!(api.load_day(day()).unwrap().is_empty());
    assert!(api.load_day(next_day).unwrap().is_empty());

    let created = api.sync_day(next_day).unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].row.settle_date, next_day);
    assert_eq!(created[0].row.total_amount, 1657.50);

    // 已有结算行时不重复补建
    assert!(api.sync_day(next_day).unwrap().is_empty());
    assert_eq!(api.load_day(next_day).unwrap().len(), 1);
}

#[test]
fn test_weighing_feed_validation() {
    let env = create_seeded_env();
    let order = weighing_order(&env.state, &request("ElSabor", "Vivo", 100));

    let mut bad = feed(&order.order_id, -1.0, Some(20.0), 5.0);
    assert!(matches!(
        env.state.settlement_api.apply_weighing(&bad, day()),
        Err(ApiError::ValidationError(_))
    ));
    bad.gross_weight_kg = 220.0;
    bad.ticket_number = " ".to_string();
    assert!(matches!(
        env.state.settlement_api.apply_weighing(&bad, day()),
        Err(ApiError::ValidationError(_))
    ));
    assert!(matches!(
        env.state.settlement_api.apply_weighing(&feed("missing", 1.0, None, 0.0), day()),
        Err(ApiError::NotFound(_))
    ));
}

// ==========================================
// 人工修改 / 确认
// ==========================================

#[test]
fn test_edit_confirm_and_reopen() {
    let env = create_seeded_env();
    let api = &env.state.settlement_api;
    let order = weighing_order(&env.state, &request("ElSabor", "Vivo", 100));
    api.apply_weighing(&feed(&order.order_id, 220.0, Some(20.0), 5.0), day())
        .unwrap();

    let edited = api
        .edit_field(day(), &order.order_id, SettlementEdit::Reweigh(210.0))
        .unwrap();
    assert_eq!(edited.row.net_weight_kg, 185.0);
    assert_eq!(edited.row.total_amount, 1572.5);

    assert!(matches!(
        api.edit_field(day(), &order.order_id, SettlementEdit::ReturnWeight(-1.0)),
        Err(ApiError::ValidationError(_))
    ));

    let confirmed = api.confirm(day(), &order.order_id).unwrap();
    assert!(confirmed.confirmed);
    // 幂等
    assert_eq!(api.confirm(day(), &order.order_id).unwrap(), confirmed);

    let err = api
        .edit_field(day(), &order.order_id, SettlementEdit::Price(9.0))
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::LockedRow { ref order_id, date } if order_id == &order.order_id && date == day()
    ));
    assert_eq!(api.load_day(day()).unwrap()[0].total_amount, 1572.5);

    api.reopen(day(), &order.order_id).unwrap();
    let repriced = api
        .edit_field(day(), &order.order_id, SettlementEdit::Price(9.0))
        .unwrap();
    assert_eq!(repriced.row.total_amount, 1665.0);
}

#[test]
fn test_refresh_keeps_addition_and_skips_confirmed() {
    let env = create_seeded_env();
    let api = &env.state.settlement_api;
    let order = weighing_order(&env.state, &request("ElSabor", "Vivo", 100));
    api.apply_weighing(&feed(&order.order_id, 220.0, Some(20.0), 5.0), day())
        .unwrap();
    api.edit_field(day(), &order.order_id, SettlementEdit::AdditionWeight(2.0))
        .unwrap();

    let refreshed = api
        .apply_weighing(&feed(&order.order_id, 230.0, Some(20.0), 5.0), day())
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.row.addition_kg, 2.0);
    assert_eq!(refreshed.row.net_weight_kg, 207.0);

    api.confirm(day(), &order.order_id).unwrap();
    let skipped = api
        .apply_weighing(&feed(&order.order_id, 300.0, Some(20.0), 5.0), day())
        .unwrap()
        .unwrap();
    assert_eq!(skipped.row.gross_weight_kg, 230.0);
    assert!(skipped.row.confirmed);
}

// ==========================================
// 价格
// ==========================================

fn roja_hembra_pelado(env: &TestEnv) -> String {
    let mut r = request("ElSabor", "Pelado", 10);
    r.bird_type = BirdTypeLabel::plain("Pollo").with_variety("Roja").with_sex_counts(0, 10);
    weighing_order(&env.state, &r).order_id
}

#[test]
fn test_price_cascade_independent_of_rule_order() {
    let env = create_seeded_env();
    let order_id = roja_hembra_pelado(&env);
    let first = env
        .state
        .settlement_api
        .apply_weighing(&feed(&order_id, 100.0, Some(5.0), 0.0), day())
        .unwrap()
        .unwrap()
        .row;
    // 损耗: Pelado/Roja 0.3 × 10; 价格: Roja/H 9.5
    assert_eq!(first.shrink_total_kg, 3.0);
    assert_eq!(first.net_weight_kg, 98.0);
    assert_eq!(first.price_per_kg, 9.5);
    assert_eq!(first.total_amount, 931.0);

    // 规则倒序后重新生成, 结果不变
    env.state
        .catalog_api
        .apply(CatalogEvent::ReplacePriceRules(vec![
            price_rule("P2", Some("Roja"), Some(poultry_settlement::Sex::H), 9.5, None),
            price_rule("P1", None, None, 8.0, Some(8.5)),
        ]))
        .unwrap();
    let second = env
        .state
        .settlement_api
        .apply_weighing(&feed(&order_id, 100.0, Some(5.0), 0.0), day())
        .unwrap()
        .unwrap()
        .row;
    assert_eq!(second.price_per_kg, first.price_per_kg);
    assert_eq!(second.total_amount, first.total_amount);
}

#[test]
fn test_unresolved_price_warns_and_manual_price_clears_flag() {
    let env = create_seeded_env();
    let api = &env.state.settlement_api;
    let order = weighing_order(&env.state, &request("DonPepe", "Vivo", 10));

    let outcome = api
        .apply_weighing(&feed(&order.order_id, 100.0, Some(5.0), 0.0), day())
        .unwrap()
        .unwrap();
    assert!(outcome.row.price_unresolved);
    assert_eq!(outcome.row.total_amount, 0.0);
    assert!(matches!(
        outcome.warnings.as_slice(),
        [SettlementWarning::UnresolvedPrice { client, .. }] if client == "DonPepe"
    ));

    let priced = api
        .edit_field(day(), &order.order_id, SettlementEdit::Price(7.0))
        .unwrap();
    assert!(!priced.row.price_unresolved);
    assert!(priced.warnings.is_empty());
    assert_eq!(priced.row.total_amount, 665.0);
}

// ==========================================
// 导出 / 整日保存
// ==========================================

#[test]
fn test_export_filter_and_sort() {
    let env = create_seeded_env();
    let api = &env.state.settlement_api;

    let a = weighing_order(&env.state, &request("ElSabor", "Vivo", 10));
    let b = weighing_order(&env.state, &request("DonPepe", "Vivo", 10));
    let c = weighing_order(&env.state, &request("ElSabor", "Vivo", 100));
    for (id, gross) in [(&c.order_id, 220.0), (&b.order_id, 50.0), (&a.order_id, 100.0)] {
        api.apply_weighing(&feed(id, gross, Some(5.0), 0.0), day()).unwrap();
    }

    let by_number: Vec<String> = api
        .export_day(day(), &ExportFilter::default(), ExportSort::OrderNumber)
        .unwrap()
        .into_iter()
        .map(|r| r.order_number)
        .collect();
    assert_eq!(by_number, vec!["C001.1", "C001.2", "C002.1"]);

    let by_total = api
        .export_day(day(), &ExportFilter::default(), ExportSort::TotalDesc)
        .unwrap();
    assert_eq!(by_total[0].order_number, "C001.2");
    assert_eq!(by_total[2].order_number, "C002.1");

    let filter = ExportFilter {
        client: Some("ElSabor".to_string()),
        ..Default::default()
    };
    let only = api.export_day(day(), &filter, ExportSort::Client).unwrap();
    assert_eq!(only.len(), 2);
    assert!(only
        .iter()
        .all(|r| r.client == "ElSabor" && r.delivery_zone.as_deref() == Some("Norte")));
}

#[test]
fn test_save_day_recomputes_open_rows() {
    let env = create_seeded_env();
    let api = &env.state.settlement_api;
    let a = weighing_order(&env.state, &request("ElSabor", "Vivo", 10));
    let b = weighing_order(&env.state, &request("DonPepe", "Vivo", 10));
    api.apply_weighing(&feed(&a.order_id, 100.0, Some(5.0), 0.0), day()).unwrap();
    api.apply_weighing(&feed(&b.order_id, 100.0, Some(5.0), 0.0), day()).unwrap();

    let mut rows = api.load_day(day()).unwrap();
    rows.retain(|r| r.order_id == a.order_id);
    // 净重/金额由引擎重算, 传入值不生效
    rows[0].addition_kg = 5.0;
    rows[0].net_weight_kg = 1.0;
    rows[0].total_amount = 1.0;
    assert_eq!(api.save_day(day(), &rows).unwrap(), 1);

    let stored = api.load_day(day()).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].net_weight_kg, 100.0);
    assert_eq!(stored[0].total_amount, 850.0);
    assert!(!stored[0].confirmed);

    // 不能借整日保存确认
    let mut confirming = stored.clone();
    confirming[0].confirmed = true;
    assert!(matches!(
        api.save_day(day(), &confirming),
        Err(ApiError::ValidationError(_))
    ));
    assert!(!api.load_day(day()).unwrap()[0].confirmed);
}

#[test]
fn test_confirmed_row_survives_save_day() {
    let env = create_seeded_env();
    let api = &env.state.settlement_api;
    let a = weighing_order(&env.state, &request("ElSabor", "Vivo", 100));
    let b = weighing_order(&env.state, &request("DonPepe", "Vivo", 10));
    api.apply_weighing(&feed(&a.order_id, 220.0, Some(20.0), 5.0), day()).unwrap();
    api.apply_weighing(&feed(&b.order_id, 100.0, Some(5.0), 0.0), day()).unwrap();
    let locked = api.confirm(day(), &a.order_id).unwrap();
    assert_eq!(locked.total_amount, 1657.5);

    let is_locked = |result: Result<usize, ApiError>| {
        matches!(result, Err(ApiError::LockedRow { ref order_id, .. }) if order_id == &a.order_id)
    };

    // 改写已确认行
    let mut tampered = api.load_day(day()).unwrap();
    for row in tampered.iter_mut().filter(|r| r.order_id == a.order_id) {
        row.price_per_kg = 0.01;
        row.total_amount = 1.0;
    }
    assert!(is_locked(api.save_day(day(), &tampered)));

    // 丢弃已确认行
    assert!(is_locked(api.save_day(day(), &[])));

    // 退回编辑同样只能走 reopen
    let mut reopened = api.load_day(day()).unwrap();
    for row in reopened.iter_mut() {
        row.confirmed = false;
    }
    assert!(is_locked(api.save_day(day(), &reopened)));

    // 原样行之后再带一份改写副本
    let mut doubled = api.load_day(day()).unwrap();
    let mut copy = doubled[0].clone();
    copy.confirmed = false;
    copy.price_per_kg = 0.01;
    doubled.push(copy);
    assert!(matches!(
        api.save_day(day(), &doubled),
        Err(ApiError::ValidationError(_))
    ));

    let stored = api.load_day(day()).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored.iter().find(|r| r.order_id == a.order_id), Some(&locked));

    // 原样带回已确认行时, 其余行可正常保存
    let kept: Vec<_> = stored.into_iter().filter(|r| r.order_id == a.order_id).collect();
    assert_eq!(api.save_day(day(), &kept).unwrap(), 1);
    assert_eq!(api.load_day(day()).unwrap(), vec![locked]);
}

// ==========================================
// 订单状态与称重
// ==========================================

#[test]
fn test_weighing_rejected_before_weighing_stage() {
    let env = create_seeded_env();
    let api = &env.state.settlement_api;
    let order = env
        .state
        .order_api
        .create_order(&request("ElSabor", "Vivo", 100))
        .unwrap();

    let weighing = feed(&order.order_id, 220.0, Some(20.0), 5.0);
    assert!(matches!(
        api.apply_weighing(&weighing, day()),
        Err(ApiError::ValidationError(_))
    ));
    env.state
        .order_api
        .transition(&order.order_id, OrderState::InProduction, None)
        .unwrap();
    assert!(matches!(
        api.apply_weighing(&weighing, day()),
        Err(ApiError::ValidationError(_))
    ));
    assert!(!env.state.order_api.get_order(&order.order_id).unwrap().ticket_issued());
    assert!(api.load_day(day()).unwrap().is_empty());
}

#[test]
fn test_cancelled_order_is_not_billed() {
    let env = create_seeded_env();
    let api = &env.state.settlement_api;
    let order = weighing_order(&env.state, &request("ElSabor", "Vivo", 100));
    env.state.order_api.cancel(&order.order_id, "cliente anuló").unwrap();

    assert!(matches!(
        api.apply_weighing(&feed(&order.order_id, 220.0, Some(20.0), 5.0), day()),
        Err(ApiError::ValidationError(_))
    ));
    assert!(api.load_day(day()).unwrap().is_empty());

    // 出磅后再取消: 补建时跳过
    let late = weighing_order(&env.state, &request("DonPepe", "Vivo", 10));
    let next_day = day() + Duration::days(1);
    let mut weighing = feed(&late.order_id, 100.0, Some(5.0), 0.0);
    weighing.ticket_date = next_day;
    assert!(api.apply_weighing(&weighing, day()).unwrap().is_none());
    env.state.order_api.cancel(&late.order_id, "devuelto").unwrap();
    assert!(api.sync_day(next_day).unwrap().is_empty());
    assert!(api.load_day(next_day).unwrap().is_empty());
}

#[test]
fn test_weighed_order_leaves_consolidation_candidates() {
    let env = create_seeded_env();
    let orders = &env.state.order_api;
    let first = orders.create_order(&request("ElSabor", "Vivo", 50)).unwrap();
    let second = orders.create_order(&request("ElSabor", "Vivo", 30)).unwrap();
    assert_eq!(second.order_number, "C001.2");

    // Pending 订单不接收称重, 不会留下无主结算行
    assert!(env
        .state
        .settlement_api
        .apply_weighing(&feed(&second.order_id, 100.0, Some(5.0), 0.0), day())
        .is_err());

    start_weighing(&env.state, &second.order_id);
    env.state
        .settlement_api
        .apply_weighing(&feed(&second.order_id, 100.0, Some(5.0), 0.0), day())
        .unwrap();

    let consolidation = &env.state.consolidation_api;
    assert!(consolidation.propose_consolidations(day()).unwrap().is_empty());
    assert!(consolidation
        .consolidate_manual(&[first.order_id.clone(), second.order_id.clone()])
        .is_err());

    let rows = env.state.settlement_api.load_day(day()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].order_id, second.order_id);
    assert!(orders.get_order(&second.order_id).is_ok());
    assert_eq!(orders.get_order(&first.order_id).unwrap().quantity, 50);
}

// ==========================================
// 改名级联
// ==========================================

#[test]
fn test_client_rename_cascades_to_unconfirmed_rows() {
    let env = create_seeded_env();
    let api = &env.state.settlement_api;
    let a = weighing_order(&env.state, &request("ElSabor", "Vivo", 10));
    let b = weighing_order(&env.state, &request("DonPepe", "Vivo", 10));
    api.apply_weighing(&feed(&a.order_id, 100.0, Some(5.0), 0.0), day()).unwrap();
    api.apply_weighing(&feed(&b.order_id, 100.0, Some(5.0), 0.0), day()).unwrap();
    api.confirm(day(), &a.order_id).unwrap();

    let rename = |id: &str, name: &str| {
        env.state
            .catalog_api
            .update_client(&Client {
                client_id: id.to_string(),
                name: name.to_string(),
                delivery_zone: None,
                active: true,
            })
            .unwrap()
    };
    let cascade = rename("CL1", "El Sabor");
    assert_eq!((cascade.orders, cascade.sequences, cascade.settlement_rows), (1, 1, 0));
    let cascade = rename("CL2", "Don Pepe");
    assert_eq!(cascade.settlement_rows, 1);

    let rows = api.load_day(day()).unwrap();
    let client_of = |id: &str| rows.iter().find(|r| r.order_id == id).unwrap().client.clone();
    // 已确认行保持开票时的名称
    assert_eq!(client_of(&a.order_id), "ElSabor");
    assert_eq!(client_of(&b.order_id), "Don Pepe");

    assert_eq!(env.state.order_api.get_order(&a.order_id).unwrap().client_name, "El Sabor");
    // 改名后同一客户继续沿用原优先级
    let next = env
        .state
        .order_api
        .create_order(&request("El Sabor", "Vivo", 5))
        .unwrap();
    assert_eq!(next.order_number, "C001.2");
}

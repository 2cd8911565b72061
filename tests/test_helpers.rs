// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、基础资料种子数据、订单/称重构造
// ==========================================

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveTime};
use tempfile::NamedTempFile;

use poultry_settlement::app::AppState;
use poultry_settlement::domain::{
    BirdType, BirdTypeLabel, CatalogEvent, Client, ContainerRule, NewOrderRequest, Order,
    OrderState, PresentationRule, PriceRule, WeighingFeed,
};

/// 测试环境 (临时文件需与 AppState 同生命周期)
pub struct TestEnv {
    pub state: AppState,
    _temp_file: NamedTempFile,
}

/// 创建临时数据库并装配 AppState (空基础资料)
pub fn create_test_env() -> TestEnv {
    poultry_settlement::logging::init_test();
    let temp_file = NamedTempFile::new().unwrap();
    let db_path = temp_file.path().to_str().unwrap().to_string();
    let state = AppState::new(db_path).unwrap();
    TestEnv {
        state,
        _temp_file: temp_file,
    }
}

/// 创建临时数据库并写入标准基础资料
pub fn create_seeded_env() -> TestEnv {
    let env = create_test_env();
    seed_catalog(&env.state);
    env
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

pub fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// 标准基础资料
///
/// - 客户: ElSabor, DonPepe
/// - 禽类: Pollo (区分公母/品种 Roja), Pato
/// - 品相: Pollo/Vivo 0, Pollo/Pelado 0.2, Pollo/Pelado/Roja 0.3
/// - 容器: Javas 2.5, Cajas 1.0
/// - 价格: ElSabor/Pollo 通用 8.0 活禽 8.5; ElSabor/Pollo/Roja/H 9.5
pub fn seed_catalog(state: &AppState) {
    let api = &state.catalog_api;
    for (id, name) in [("CL1", "ElSabor"), ("CL2", "DonPepe")] {
        api.apply(CatalogEvent::UpsertClient(Client {
            client_id: id.to_string(),
            name: name.to_string(),
            delivery_zone: None,
            active: true,
        }))
        .unwrap();
    }

    api.apply(CatalogEvent::UpsertBirdType(BirdType {
        bird_type_id: "BT1".to_string(),
        name: "Pollo".to_string(),
        has_sex: true,
        has_variety: true,
        varieties: vec!["Roja".to_string()],
    }))
    .unwrap();
    api.apply(CatalogEvent::UpsertBirdType(BirdType {
        bird_type_id: "BT2".to_string(),
        name: "Pato".to_string(),
        has_sex: false,
        has_variety: false,
        varieties: vec![],
    }))
    .unwrap();

    api.apply(CatalogEvent::ReplacePresentations(vec![
        presentation_rule("PR1", "Vivo", None, 0.0),
        presentation_rule("PR2", "Pelado", None, 0.2),
        presentation_rule("PR3", "Pelado", Some("Roja"), 0.3),
    ]))
    .unwrap();

    api.apply(CatalogEvent::ReplaceContainers(vec![
        ContainerRule {
            container_id: "CT1".to_string(),
            container_type: "Javas".to_string(),
            tare_kg: 2.5,
        },
        ContainerRule {
            container_id: "CT2".to_string(),
            container_type: "Cajas".to_string(),
            tare_kg: 1.0,
        },
    ]))
    .unwrap();

    api.apply(CatalogEvent::ReplacePriceRules(vec![
        price_rule("P1", None, None, 8.0, Some(8.5)),
        price_rule("P2", Some("Roja"), Some(poultry_settlement::Sex::H), 9.5, None),
    ]))
    .unwrap();
}

pub fn presentation_rule(
    id: &str,
    presentation: &str,
    variety: Option<&str>,
    shrink: f64,
) -> PresentationRule {
    PresentationRule {
        rule_id: id.to_string(),
        bird_type_id: "BT1".to_string(),
        presentation: presentation.to_string(),
        variety: variety.map(str::to_string),
        sex: None,
        shrink_per_unit_kg: shrink,
    }
}

pub fn price_rule(
    id: &str,
    variety: Option<&str>,
    sex: Option<poultry_settlement::Sex>,
    per_kg: f64,
    alive: Option<f64>,
) -> PriceRule {
    PriceRule {
        price_id: id.to_string(),
        client_id: "CL1".to_string(),
        bird_type_id: "BT1".to_string(),
        variety: variety.map(str::to_string),
        sex,
        price_per_kg: per_kg,
        price_alive: alive,
        price_plucked: None,
        price_eviscerated: None,
    }
}

/// 订单录入请求
pub fn request(client: &str, presentation: &str, quantity: i64) -> NewOrderRequest {
    NewOrderRequest {
        client_name: client.to_string(),
        bird_type: BirdTypeLabel::plain("Pollo"),
        presentation: presentation.to_string(),
        quantity,
        container_type: "Javas".to_string(),
        order_date: day(),
        order_time: t(8, 0),
    }
}

/// 推进到称重中 (Pending → InProduction → InWeighing)
pub fn start_weighing(state: &AppState, order_id: &str) -> Order {
    state
        .order_api
        .transition(order_id, OrderState::InProduction, None)
        .unwrap();
    state
        .order_api
        .transition(order_id, OrderState::InWeighing, None)
        .unwrap()
}

/// 录入订单并推进到称重中
pub fn weighing_order(state: &AppState, request: &NewOrderRequest) -> Order {
    let order = state.order_api.create_order(request).unwrap();
    start_weighing(state, &order.order_id)
}

/// 称重数据 (当日出磅)
pub fn feed(order_id: &str, gross: f64, container_total: Option<f64>, ret: f64) -> WeighingFeed {
    WeighingFeed {
        order_id: order_id.to_string(),
        gross_weight_kg: gross,
        container_weight_total_kg: container_total,
        containers_count: None,
        reweigh_weight_kg: None,
        return_weight_kg: Some(ret),
        driver: Some("Luis".to_string()),
        delivery_zone: Some("Norte".to_string()),
        ticket_number: format!("T-{}", order_id),
        ticket_date: day(),
    }
}

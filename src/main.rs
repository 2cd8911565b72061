// ==========================================
// 禽类订单结算引擎 - 命令行入口
// ==========================================
// 用法: poultry-settlement <命令> [YYYY-MM-DD]
//   day     当日结算视图 (默认)
//   sync    补建当日结算行后输出结算视图
//   queue   当日生产队列
//   groups  当日合并候选
//   log     当日变更日志
// 输出: JSON (stdout)
// ==========================================

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;

use poultry_settlement::app::{get_default_db_path, AppState};
use poultry_settlement::logging;

fn parse_date(arg: Option<&String>) -> Result<NaiveDate> {
    match arg {
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("日期格式应为 YYYY-MM-DD: {}", s)),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn main() -> Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("day");
    let date = parse_date(args.get(1))?;

    tracing::info!("{} v{}", poultry_settlement::APP_NAME, poultry_settlement::VERSION);
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).map_err(anyhow::Error::msg)?;

    let output = match command {
        "day" => serde_json::to_string_pretty(&state.settlement_api.load_day(date)?)?,
        "sync" => {
            let created = state.settlement_api.sync_day(date)?;
            tracing::info!(created = created.len(), "结算行同步完成");
            serde_json::to_string_pretty(&state.settlement_api.load_day(date)?)?
        }
        "queue" => serde_json::to_string_pretty(&state.order_api.production_queue(date)?)?,
        "groups" => {
            serde_json::to_string_pretty(&state.consolidation_api.propose_consolidations(date)?)?
        }
        "log" => serde_json::to_string_pretty(&state.order_api.change_log_for_date(date)?)?,
        other => bail!("未知命令: {} (可用: day, sync, queue, groups, log)", other),
    };
    println!("{}", output);
    Ok(())
}

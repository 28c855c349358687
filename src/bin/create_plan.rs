//! Create a trade plan in the audit database without running it.
//!
//! Usage: `pankow-create-plan <user_id> <loop-json> <amount-json> <exec_type> <check_balance>`
//!
//! ```text
//! pankow-create-plan 1 '[["gdax","USD","BTC"],["gdax","BTC","USD"]]' '[["gdax","250"]]' sequential true
//! ```
//!
//! The request goes through the same validation as a session request. The
//! database is read from `DATABASE_URL`.

use std::process::ExitCode;

use pankow::domain::entities::trade_plan::TradePlan;
use pankow::domain::repositories::audit_store::AuditStore;
use pankow::domain::services::trade_plan_compiler::{TradePlanCompiler, TradeRequest};
use pankow::persistence::repository::SqliteAuditStore;
use pankow::persistence::{init_database, DatabaseConfig};
use serde_json::{json, Value};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str =
    "usage: pankow-create-plan <user_id> <loop-json> <amount-json> <exec_type> <check_balance>";

/// Build a trade request from the five positional arguments.
fn request_from_args(args: &[String]) -> Result<TradeRequest, String> {
    let [user_id, loop_json, amount_json, exec_type, check_balance] = args else {
        return Err(format!("expected 5 arguments, got {}", args.len()));
    };

    let user_id: i64 = user_id
        .parse()
        .map_err(|_| format!("user_id must be an integer, got '{}'", user_id))?;
    let loop_hops: Value =
        serde_json::from_str(loop_json).map_err(|e| format!("invalid loop JSON: {}", e))?;
    let amounts: Value =
        serde_json::from_str(amount_json).map_err(|e| format!("invalid amount JSON: {}", e))?;

    let payload = json!({
        "loop": loop_hops,
        "amount": amounts,
        "exec_type": exec_type,
        "check_balance": check_balance.eq_ignore_ascii_case("true"),
        "user_id": user_id,
    });
    TradeRequest::from_json(&payload.to_string()).map_err(|e| e.to_string())
}

async fn create_plan(store: &dyn AuditStore, args: &[String]) -> Result<TradePlan, String> {
    let request = request_from_args(args)?;
    let compiled = TradePlanCompiler::compile(&request).map_err(|e| e.to_string())?;
    store
        .create_trade_plan(compiled.plan)
        .await
        .map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pankow_create_plan=info,pankow=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() != 5 {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    }

    let pool = match init_database(&DatabaseConfig::from_env()).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let store = SqliteAuditStore::new(pool);

    match create_plan(&store, &args).await {
        Ok(plan) => {
            info!("Trade plan {} created for user {}", plan.id, plan.owner_id);
            println!("{} {}", plan.id, plan.auth_token);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Invalid arguments: {}", e);
            ExitCode::FAILURE
        }
    }
}

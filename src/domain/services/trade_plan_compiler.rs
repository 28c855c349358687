//! TradePlanCompiler - validates a trade request and splits its loop into
//! per-exchange sub-loops.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::entities::exchange::Exchange;
use crate::domain::entities::hop::Hop;
use crate::domain::entities::trade_plan::{AmountEntry, ExecutionMode, NewTradePlan, SubLoop};
use crate::domain::errors::ValidationError;
use crate::domain::value_objects::amount::Amount;

/// Amount as sent by the client: `"100"` or `100`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AmountLiteral {
    Text(String),
    Number(serde_json::Number),
}

impl AmountLiteral {
    pub fn literal(&self) -> String {
        match self {
            AmountLiteral::Text(text) => text.clone(),
            AmountLiteral::Number(number) => number.to_string(),
        }
    }
}

/// Raw trade request received from the client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TradeRequest {
    #[serde(rename = "loop")]
    pub loop_hops: Vec<Hop>,
    #[serde(rename = "amount")]
    pub amounts: Vec<(Exchange, AmountLiteral)>,
    #[serde(default)]
    pub exec_type: ExecutionMode,
    #[serde(default)]
    pub check_balance: bool,
    pub user_id: i64,
}

impl TradeRequest {
    pub fn from_json(payload: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(payload).map_err(|e| ValidationError::MalformedPayload(e.to_string()))
    }
}

/// Validated plan plus its execution units, in loop order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPlan {
    pub plan: NewTradePlan,
    pub sub_loops: Vec<SubLoop>,
}

pub struct TradePlanCompiler;

impl TradePlanCompiler {
    pub fn compile(request: &TradeRequest) -> Result<CompiledPlan, ValidationError> {
        if request.loop_hops.len() < 2 {
            return Err(ValidationError::LoopTooShort(request.loop_hops.len()));
        }
        if request.amounts.is_empty() {
            return Err(ValidationError::NoAmounts);
        }

        for (index, hop) in request.loop_hops.iter().enumerate() {
            hop.validate(index)?;
        }

        let amounts = Self::validate_amounts(&request.amounts)?;
        let groups = split_by_exchange(&request.loop_hops);

        let mut sub_loops = Vec::with_capacity(groups.len());
        for (index, hops) in groups.into_iter().enumerate() {
            let exchange = hops[0].exchange.clone();
            let entry = amounts
                .get(index)
                .ok_or_else(|| ValidationError::MissingAmount {
                    index,
                    exchange: exchange.to_string(),
                })?;

            if entry.exchange != exchange {
                warn!(
                    "Amount entry {} names {} but sub-loop {} runs on {}; using {}",
                    index, entry.exchange, index, exchange, exchange
                );
            }

            sub_loops.push(SubLoop {
                index,
                currency: hops[0].from_currency.clone(),
                exchange,
                hops,
                starting_amount: entry.amount.clone(),
            });
        }

        if amounts.len() > sub_loops.len() {
            warn!(
                "Ignoring {} surplus amount entries",
                amounts.len() - sub_loops.len()
            );
        }

        debug!(
            "Compiled loop of {} hops into {} sub-loops",
            request.loop_hops.len(),
            sub_loops.len()
        );

        Ok(CompiledPlan {
            plan: NewTradePlan {
                owner_id: request.user_id,
                loop_hops: request.loop_hops.clone(),
                amounts,
                execution_mode: request.exec_type,
                check_balance: request.check_balance,
            },
            sub_loops,
        })
    }

    fn validate_amounts(
        raw: &[(Exchange, AmountLiteral)],
    ) -> Result<Vec<AmountEntry>, ValidationError> {
        raw.iter()
            .enumerate()
            .map(|(index, (exchange, literal))| {
                if exchange.is_empty() {
                    return Err(ValidationError::EmptyAmountExchange { index });
                }
                let text = literal.literal();
                let amount = match Amount::parse(&text) {
                    Ok(amount) if amount.is_positive() => amount,
                    Ok(_) | Err(ValidationError::MustBeNonNegative) => {
                        return Err(ValidationError::NonPositiveAmount { index, value: text })
                    }
                    Err(e) => return Err(e),
                };
                Ok(AmountEntry::new(exchange.clone(), amount))
            })
            .collect()
    }
}

/// Group consecutive hops sharing an exchange, preserving order.
pub fn split_by_exchange(hops: &[Hop]) -> Vec<Vec<Hop>> {
    let mut groups: Vec<Vec<Hop>> = Vec::new();
    for hop in hops {
        match groups.last_mut() {
            Some(group) if group[0].exchange == hop.exchange => group.push(hop.clone()),
            _ => groups.push(vec![hop.clone()]),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(loop_json: &str, amount_json: &str) -> TradeRequest {
        TradeRequest::from_json(&format!(
            r#"{{"loop": {}, "amount": {}, "exec_type": "sequential", "check_balance": false, "user_id": 1}}"#,
            loop_json, amount_json
        ))
        .unwrap()
    }

    const FOUR_HOPS: &str =
        r#"[["ex1","USD","BTC"],["ex1","BTC","USD"],["ex2","USD","BTC"],["ex2","BTC","USD"]]"#;

    #[test]
    fn test_compile_splits_by_exchange() {
        let compiled =
            TradePlanCompiler::compile(&request(FOUR_HOPS, r#"[["ex1","100"],["ex2",50]]"#))
                .unwrap();

        assert_eq!(compiled.sub_loops.len(), 2);
        let first = &compiled.sub_loops[0];
        assert_eq!(first.exchange, Exchange::new("ex1"));
        assert_eq!(first.currency, "USD");
        assert_eq!(first.starting_amount, Amount::parse("100").unwrap());
        assert_eq!(first.hops.len(), 2);

        let second = &compiled.sub_loops[1];
        assert_eq!(second.index, 1);
        assert_eq!(second.exchange, Exchange::new("ex2"));
        assert_eq!(second.starting_amount, Amount::parse("50").unwrap());
    }

    #[test]
    fn test_split_then_concat_reproduces_loop() {
        let loops = vec![
            vec![Hop::new("a", "USD", "BTC"), Hop::new("a", "BTC", "USD")],
            vec![
                Hop::new("a", "USD", "BTC"),
                Hop::new("b", "BTC", "ETH"),
                Hop::new("b", "ETH", "USD"),
                Hop::new("a", "USD", "LTC"),
                Hop::new("c", "LTC", "USD"),
            ],
            vec![
                Hop::new("x", "USD", "BTC"),
                Hop::new("y", "BTC", "USD"),
                Hop::new("x", "USD", "BTC"),
            ],
        ];

        for hops in loops {
            let groups = split_by_exchange(&hops);
            for group in &groups {
                assert!(group.iter().all(|h| h.exchange == group[0].exchange));
            }
            for pair in groups.windows(2) {
                assert_ne!(pair[0][0].exchange, pair[1][0].exchange);
            }
            let rejoined: Vec<Hop> = groups.into_iter().flatten().collect();
            assert_eq!(rejoined, hops);
        }
    }

    #[test]
    fn test_non_adjacent_hops_on_same_exchange_form_separate_sub_loops() {
        let compiled = TradePlanCompiler::compile(&request(
            r#"[["a","USD","BTC"],["b","BTC","USD"],["a","USD","ETH"]]"#,
            r#"[["a","1"],["b","2"],["a","3"]]"#,
        ))
        .unwrap();
        assert_eq!(compiled.sub_loops.len(), 3);
        assert_eq!(compiled.sub_loops[2].currency, "USD");
        assert_eq!(
            compiled.sub_loops[2].starting_amount,
            Amount::parse("3").unwrap()
        );
    }

    #[test]
    fn test_rejects_short_loop() {
        let result =
            TradePlanCompiler::compile(&request(r#"[["ex1","USD","BTC"]]"#, r#"[["ex1","1"]]"#));
        assert_eq!(result, Err(ValidationError::LoopTooShort(1)));
    }

    #[test]
    fn test_rejects_empty_amounts() {
        let result = TradePlanCompiler::compile(&request(FOUR_HOPS, "[]"));
        assert_eq!(result, Err(ValidationError::NoAmounts));
    }

    #[test]
    fn test_rejects_same_currency_hop() {
        let result = TradePlanCompiler::compile(&request(
            r#"[["ex1","USD","BTC"],["ex1","BTC","BTC"]]"#,
            r#"[["ex1","1"]]"#,
        ));
        assert!(matches!(result, Err(ValidationError::SameCurrency { index: 1, .. })));
    }

    #[test]
    fn test_rejects_empty_hop_exchange() {
        let result = TradePlanCompiler::compile(&request(
            r#"[["","USD","BTC"],["ex1","BTC","USD"]]"#,
            r#"[["ex1","1"]]"#,
        ));
        assert_eq!(result, Err(ValidationError::EmptyExchange { index: 0 }));
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        for amount in [r#"[["ex1","0"],["ex2","5"]]"#, r#"[["ex1",-3],["ex2","5"]]"#] {
            let result = TradePlanCompiler::compile(&request(FOUR_HOPS, amount));
            assert!(matches!(
                result,
                Err(ValidationError::NonPositiveAmount { index: 0, .. })
            ));
        }
    }

    #[test]
    fn test_rejects_empty_amount_exchange() {
        let result = TradePlanCompiler::compile(&request(FOUR_HOPS, r#"[["ex1","1"],["","5"]]"#));
        assert_eq!(result, Err(ValidationError::EmptyAmountExchange { index: 1 }));
    }

    #[test]
    fn test_rejects_unparseable_amount() {
        let result =
            TradePlanCompiler::compile(&request(FOUR_HOPS, r#"[["ex1","lots"],["ex2","5"]]"#));
        assert!(matches!(result, Err(ValidationError::InvalidAmount(_))));
    }

    #[test]
    fn test_rejects_exponent_and_oversized_amounts() {
        let too_precise = format!(r#"[["ex1","0.{}"],["ex2","5"]]"#, "1".repeat(19));
        for amounts in [
            r#"[["ex1","1e-2000000"],["ex2","5"]]"#.to_string(),
            r#"[["ex1","5"],["ex2","1e400000000"]]"#.to_string(),
            r#"[["ex1",1e300],["ex2","5"]]"#.to_string(),
            too_precise,
        ] {
            let result = TradePlanCompiler::compile(&request(FOUR_HOPS, &amounts));
            assert!(
                matches!(result, Err(ValidationError::InvalidAmount(_))),
                "{amounts}: {result:?}"
            );
        }
    }

    #[test]
    fn test_rejects_missing_amount_for_sub_loop() {
        let result = TradePlanCompiler::compile(&request(FOUR_HOPS, r#"[["ex1","1"]]"#));
        assert_eq!(
            result,
            Err(ValidationError::MissingAmount {
                index: 1,
                exchange: "ex2".to_string()
            })
        );
    }

    #[test]
    fn test_surplus_amounts_are_ignored() {
        let compiled = TradePlanCompiler::compile(&request(
            FOUR_HOPS,
            r#"[["ex1","1"],["ex2","2"],["ex3","3"]]"#,
        ))
        .unwrap();
        assert_eq!(compiled.sub_loops.len(), 2);
        assert_eq!(compiled.plan.amounts.len(), 3);
    }

    #[test]
    fn test_request_defaults() {
        let request = TradeRequest::from_json(
            r#"{"loop": [["a","USD","BTC"],["a","BTC","USD"]], "amount": [["a","1"]], "user_id": 9}"#,
        )
        .unwrap();
        assert_eq!(request.exec_type, ExecutionMode::Sequential);
        assert!(!request.check_balance);
    }

    #[test]
    fn test_request_rejects_malformed_json() {
        assert!(matches!(
            TradeRequest::from_json("{not json"),
            Err(ValidationError::MalformedPayload(_))
        ));
        assert!(matches!(
            TradeRequest::from_json(r#"{"loop": [["a","USD"]], "amount": [], "user_id": 1}"#),
            Err(ValidationError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_plan_carries_request_flags() {
        let request = TradeRequest::from_json(&format!(
            r#"{{"loop": {}, "amount": [["ex1","1"],["ex2","2"]], "exec_type": "parallel", "check_balance": true, "user_id": 4}}"#,
            FOUR_HOPS
        ))
        .unwrap();
        let compiled = TradePlanCompiler::compile(&request).unwrap();
        assert_eq!(compiled.plan.owner_id, 4);
        assert_eq!(compiled.plan.execution_mode, ExecutionMode::Parallel);
        assert!(compiled.plan.check_balance);
        assert_eq!(compiled.plan.loop_hops.len(), 4);
    }
}

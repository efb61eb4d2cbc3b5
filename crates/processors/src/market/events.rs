//! `trademodule.TradeCreated` processor.

use async_trait::async_trait;

use harvester_core::error::HarvesterResult;
use harvester_core::models::Trade;
use harvester_core::ports::{
    BlockAccumulation, EventContext, EventKey, EventProcessor, FactTx, Prefetched,
};

use crate::utils::{attribute, extract_field, parse_account, parse_amount, parse_identifier};

/// Order side and amounts carried in the last attribute of `TradeCreated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeDetails {
    pub buyer: String,
    pub seller: String,
    pub maker: String,
    pub taker: String,
    pub otype: i16,
    pub price: u128,
    pub base_amount: u128,
    pub quote_amount: u128,
}

/// `trademodule.TradeCreated [AccountId, Hash, Hash, Hash, Trade]`.
///
/// Attribute types vary between runtime versions, so only the count is
/// checked.
pub struct TradeCreatedProcessor;

#[async_trait]
impl EventProcessor for TradeCreatedProcessor {
    fn key(&self) -> EventKey {
        EventKey::new("trademodule", "TradeCreated")
    }

    fn shape(&self) -> &'static [&'static str] {
        &["_", "_", "_", "_", "_"]
    }

    async fn accumulation_hook(
        &self,
        ctx: &EventContext<'_>,
        _prefetched: &Prefetched,
        acc: &mut BlockAccumulation,
        tx: &mut dyn FactTx,
    ) -> HarvesterResult<()> {
        let Some(base) = attribute(ctx, 1, "base", parse_identifier) else {
            return Ok(());
        };
        let Some(quote) = attribute(ctx, 2, "quote", parse_identifier) else {
            return Ok(());
        };
        let Some(trade_hash) = attribute(ctx, 3, "trade_hash", parse_identifier) else {
            return Ok(());
        };
        let Some(details) = attribute(ctx, 4, "trade", parse_trade_details) else {
            return Ok(());
        };

        tx.insert_trade(&Trade {
            trade_hash,
            block_id: acc.block.id,
            extrinsic_idx: ctx.event.extrinsic_idx,
            event_idx: ctx.event.event_idx,
            base,
            quote,
            buyer: details.buyer,
            seller: details.seller,
            maker: details.maker,
            taker: details.taker,
            otype: details.otype,
            price: details.price,
            base_amount: details.base_amount,
            quote_amount: details.quote_amount,
        })
        .await?;
        Ok(())
    }

    async fn accumulation_revert(&self, block_id: u64, tx: &mut dyn FactTx) -> HarvesterResult<()> {
        tx.delete_trades(block_id).await?;
        Ok(())
    }
}

fn parse_party(value: &serde_json::Value) -> Option<String> {
    parse_account(value).or_else(|| parse_identifier(value))
}

/// Parse the trade struct of a `TradeCreated` event.
///
/// Every field is required; amounts are unscaled integers.
pub fn parse_trade_details(value: &serde_json::Value) -> Option<TradeDetails> {
    Some(TradeDetails {
        buyer: extract_field(value, &["buyer"], parse_party)?,
        seller: extract_field(value, &["seller"], parse_party)?,
        maker: extract_field(value, &["maker"], parse_party)?,
        taker: extract_field(value, &["taker"], parse_party)?,
        otype: extract_field(value, &["otype", "order_type"], parse_order_type)?,
        price: extract_field(value, &["price"], parse_amount)?,
        base_amount: extract_field(value, &["base_amount", "baseAmount"], parse_amount)?,
        quote_amount: extract_field(value, &["quote_amount", "quoteAmount"], parse_amount)?,
    })
}

/// Order side: 0 = buy, 1 = sell.
///
/// Handles `"Buy"`/`"Sell"`, the numeric discriminant and `{ "Buy": .. }`.
pub fn parse_order_type(value: &serde_json::Value) -> Option<i16> {
    let side = |s: &str| match s {
        "Buy" | "buy" => Some(0),
        "Sell" | "sell" => Some(1),
        _ => None,
    };

    match value {
        serde_json::Value::String(s) => side(s),
        serde_json::Value::Number(n) => n.as_u64().filter(|v| *v <= 1).map(|v| v as i16),
        serde_json::Value::Object(obj) if obj.len() == 1 => {
            obj.keys().next().and_then(|k| side(k))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn account(byte: &str) -> String {
        "0x".to_string() + &byte.repeat(32)
    }

    #[test]
    fn test_parse_trade_details() {
        let value = json!({
            "buyer": account("01"),
            "seller": account("02"),
            "maker": account("01"),
            "taker": account("02"),
            "otype": "Sell",
            "price": "1000000000000000000000",
            "base_amount": 5,
            "quote_amount": "0x0a",
        });

        let details = parse_trade_details(&value).unwrap();
        assert_eq!(details.buyer, "01".repeat(32));
        assert_eq!(details.taker, "02".repeat(32));
        assert_eq!(details.otype, 1);
        assert_eq!(details.price, 1_000_000_000_000_000_000_000);
        assert_eq!(details.base_amount, 5);
        assert_eq!(details.quote_amount, 10);
    }

    // Test critique: un champ manquant fait ignorer le trade entier
    #[test]
    fn test_parse_trade_details_requires_every_field() {
        let value = json!({
            "buyer": account("01"),
            "seller": account("02"),
            "maker": account("01"),
            "taker": account("02"),
            "otype": 0,
            "price": 10,
            "base_amount": 5,
        });
        assert!(parse_trade_details(&value).is_none());
    }

    #[test]
    fn test_parse_order_type_forms() {
        assert_eq!(parse_order_type(&json!("Buy")), Some(0));
        assert_eq!(parse_order_type(&json!("Sell")), Some(1));
        assert_eq!(parse_order_type(&json!(1)), Some(1));
        assert_eq!(parse_order_type(&json!({ "Buy": null })), Some(0));
        assert_eq!(parse_order_type(&json!(2)), None);
        assert_eq!(parse_order_type(&json!("Hold")), None);
    }
}

//! Random order feeds: synthesis and the CSV feed file.

use crate::error::CliError;
use chrono::{Local, NaiveDateTime, SubsecRound};
use engine_config::settings::Settings;
use model::records::order::NewOrder;
use rand::Rng;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use std::path::Path;

pub struct FeedGenerator {
    customer_ids: (i32, i32),
    amount_cents: (i64, i64),
}

impl FeedGenerator {
    pub fn new(customer_ids: (i32, i32), amounts: (Decimal, Decimal)) -> Result<Self, CliError> {
        let to_cents = |amount: Decimal| {
            (amount * Decimal::ONE_HUNDRED)
                .round()
                .to_i64()
                .ok_or_else(|| CliError::InvalidFeed(format!("amount {amount} is out of range")))
        };

        let amount_cents = (to_cents(amounts.0)?, to_cents(amounts.1)?);
        if customer_ids.0 > customer_ids.1 || amount_cents.0 > amount_cents.1 {
            return Err(CliError::InvalidFeed("range min exceeds max".into()));
        }

        Ok(Self {
            customer_ids,
            amount_cents,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, CliError> {
        Self::new(settings.customer_id_range, settings.amount_range)
    }

    /// `count` orders stamped with the current local time.
    pub fn generate(&self, count: usize) -> Vec<NewOrder> {
        let mut rng = rand::thread_rng();
        (0..count)
            .map(|_| self.order(&mut rng, now()))
            .collect()
    }

    fn order<R: Rng>(&self, rng: &mut R, timestamp: NaiveDateTime) -> NewOrder {
        NewOrder {
            customer_id: rng.gen_range(self.customer_ids.0..=self.customer_ids.1),
            amount: Decimal::new(
                rng.gen_range(self.amount_cents.0..=self.amount_cents.1),
                2,
            ),
            timestamp,
        }
    }
}

// Postgres keeps microseconds.
fn now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(6)
}

/// Writes `orders` with a `customer_id,amount,timestamp` header.
pub fn write_feed(path: &Path, orders: &[NewOrder]) -> Result<(), CliError> {
    let mut writer = csv::Writer::from_path(path)?;
    for order in orders {
        writer.serialize(order)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_feed(path: &Path) -> Result<Vec<NewOrder>, CliError> {
    let mut reader = csv::Reader::from_path(path)?;
    let orders = reader.deserialize().collect::<Result<Vec<NewOrder>, _>>()?;
    Ok(orders)
}

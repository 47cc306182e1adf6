//! License entity
//!
//! One issued key. `current_uses` only ever moves through the atomic
//! conditional increment in the store; admin updates cannot touch it.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Offset from midnight to the last whole second of a day
const LAST_SECOND_OF_DAY: i64 = 86_399;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "licenses")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Canonical (upper-case) key
    #[sea_orm(column_type = "Text", unique)]
    pub key: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub supplier: Option<String>,

    #[sea_orm(column_type = "Double", nullable)]
    pub cost: Option<f64>,

    /// Free-form list of machines the key was handed out to
    #[sea_orm(column_type = "Text", nullable)]
    pub activated_on: Option<String>,

    /// Valid through the end of this day, server-local time
    pub expiry_date: NaiveDate,

    pub max_uses: i32,

    pub current_uses: i32,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Last instant (to the second) at which the license still activates
    pub fn valid_until(&self) -> NaiveDateTime {
        self.expiry_date.and_time(NaiveTime::MIN) + TimeDelta::seconds(LAST_SECOND_OF_DAY)
    }

    /// Check if the license is past its inclusive expiry boundary
    pub fn is_expired_at(&self, now: NaiveDateTime) -> bool {
        now > self.valid_until()
    }

    /// Check if the quota has room for another activation
    pub fn has_remaining_uses(&self) -> bool {
        self.current_uses < self.max_uses
    }

    /// Uses left before the quota is exhausted, never negative
    pub fn remaining_uses(&self) -> i32 {
        (self.max_uses - self.current_uses).max(0)
    }

    /// Not expired as of `today` and still has quota
    pub fn is_active_on(&self, today: NaiveDate) -> bool {
        self.expiry_date >= today && self.has_remaining_uses()
    }

    /// Expiry falls inside `[today, horizon]`
    pub fn expires_between(&self, today: NaiveDate, horizon: NaiveDate) -> bool {
        self.expiry_date >= today && self.expiry_date <= horizon
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Activation log entity
//!
//! Append-only audit trail. Rows reference the license by its key string,
//! not by id, so they outlive the license they describe.

use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activation_log")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "Text", indexed)]
    pub license_key: String,

    /// Server-local wall clock time of the activation
    #[sea_orm(indexed)]
    pub activated_at: NaiveDateTime,

    #[sea_orm(column_type = "Text", nullable)]
    pub device_name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub browser: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! SeaORM entity models
//!
//! Database entities for LicenseCore

mod activation_log;
mod license;

pub use license::{
    Entity as LicenseEntity,
    Model as License,
    ActiveModel as LicenseActiveModel,
    Column as LicenseColumn,
};

pub use activation_log::{
    Entity as ActivationLogEntity,
    Model as ActivationLogEntry,
    ActiveModel as ActivationLogActiveModel,
    Column as ActivationLogColumn,
};

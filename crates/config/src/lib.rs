pub mod error;
mod seed;
mod settings;

pub use crate::seed::{Entities, Entity, SeedConfig, SeedFlags};
pub use crate::settings::{
    DEFAULT_UPLOAD_TEMPLATE, ENV_PREFIX, Overrides, Settings, Sources, UploadSettings, default_config_file,
};

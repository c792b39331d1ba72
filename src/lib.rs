mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod pagination;
    pub mod schema;
}
mod normalization {
    pub mod card;
    pub mod normalizer;
    pub mod parser;
    pub mod tables;
}
mod services {
    pub mod import;
    pub mod normalisation;
}
pub mod config;
mod constants;

pub use constants::*;
pub use database::*;
pub use normalization::*;
pub use services::*;

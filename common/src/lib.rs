#![allow(clippy::module_inception)]
#![allow(clippy::upper_case_acronyms)]

pub mod api;
pub mod config;
pub mod contract;
pub mod crypto;
pub mod kyc;
pub mod time;

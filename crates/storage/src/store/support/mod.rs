#![forbid(unsafe_code)]

mod columns;
mod counters;
mod schema;
mod time;

pub(super) use columns::*;
pub(super) use counters::*;
pub(super) use schema::install_schema;
pub(super) use time::now_ms;

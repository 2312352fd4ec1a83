#![allow(clippy::too_many_lines)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::similar_names)]

pub mod errors;
pub mod fitbit_auth;
pub mod fitbit_client;
pub mod fitbit_config;
pub mod fitbit_heartrate;
pub mod fitbit_sleep;
pub mod fitbit_sync;
pub mod pgpool;
pub mod sleep_score;

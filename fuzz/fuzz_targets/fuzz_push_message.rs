//! Fuzz target for push notification validation.
//!
//! Any broker body must validate to a push or a skip reason.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mirror_lag_monitor::message::{validate, Validation};

fuzz_target!(|body: &[u8]| {
    if let Validation::Skip(reason) = validate(body) {
        let _ = reason.to_string();
        let _ = reason.label();
    }
});

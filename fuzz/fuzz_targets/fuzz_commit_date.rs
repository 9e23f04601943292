//! Fuzz target for commit metadata decoding.
//!
//! `parse_json_rev` and `utc_publication_time` must never panic, whatever
//! the source host returns.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mirror_lag_monitor::repository::{parse_json_rev, parse_push_log, utc_publication_time, HgDate};

fuzz_target!(|data: (&[u8], f64, i64)| {
    let (body, epoch, offset) = data;

    // Should never panic
    let _ = parse_json_rev(body);
    let _ = parse_push_log(body, 1, "fuzz");
    let _ = utc_publication_time(HgDate(epoch, offset));
});

#![no_main]

use libfuzzer_sys::fuzz_target;
use wit_migrate::sync::path::{PathPolicy, rewrite_query_text};

fuzz_target!(|data: (&str, &str, &str)| {
    let (text, source, target) = data;
    let _ = rewrite_query_text(text, source, target);

    for policy in [PathPolicy::Substitute, PathPolicy::Prefix] {
        let _ = policy.rewrite(text, source, target);
    }
});

#![no_main]

use libfuzzer_sys::fuzz_target;
use wit_migrate::{compute_identity, parse_identity};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(id) = parse_identity(text) {
        // Whatever parses must survive a re-encode under a fixed locator.
        let encoded = compute_identity("https://host/tfs", "Project", id);
        assert_eq!(parse_identity(encoded.as_str()).ok(), Some(id));
    }
});

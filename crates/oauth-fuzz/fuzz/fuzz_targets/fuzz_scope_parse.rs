#![no_main]

use libfuzzer_sys::fuzz_target;
use oauth_core::models::Scopes;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data) {
        let scopes = Scopes::parse(raw);
        // Rendering and re-parsing is a fixed point.
        assert_eq!(Scopes::parse(&scopes.to_string()), scopes);
        assert!(scopes.is_subset_of(&scopes));
    }
});

#![no_main]

use std::sync::{Arc, LazyLock};

use libfuzzer_sys::fuzz_target;
use oauth_core::clock::SystemClock;
use oauth_core::token::TokenCodec;

static CODEC: LazyLock<TokenCodec> = LazyLock::new(|| {
    TokenCodec::new(b"fuzz-secret-0123456789abcdef012345", "oauth-core", Arc::new(SystemClock))
});

fuzz_target!(|data: &[u8]| {
    // Arbitrary bearer strings must be rejected, never accepted or panicking.
    if let Ok(token) = std::str::from_utf8(data) {
        assert!(CODEC.validate(token).is_err());
    }
});

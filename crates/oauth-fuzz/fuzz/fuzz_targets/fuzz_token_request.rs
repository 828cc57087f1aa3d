#![no_main]

use libfuzzer_sys::fuzz_target;
use oauth_core::models::{ClientType, ClientUpdate, NewClient};
use oauth_core::server::oauth::types::{AuthorizeRequest, TokenRequest};

fuzz_target!(|data: &[u8]| {
    let _ = serde_json::from_slice::<TokenRequest>(data);
    let _ = serde_json::from_slice::<AuthorizeRequest>(data);
    if let Ok(new) = serde_json::from_slice::<NewClient>(data) {
        let _ = new.validate();
    }
    if let Ok(update) = serde_json::from_slice::<ClientUpdate>(data) {
        let _ = update.validate(ClientType::Public);
        let _ = update.validate(ClientType::Confidential);
    }
});

#![no_main]

use dek_envelope::{Dek, Nonce};
use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;

static KEY: Lazy<(Dek, Nonce)> = Lazy::new(|| {
    let dek = dek_envelope::generate_key().unwrap();
    let nonce = dek_envelope::generate_nonce().unwrap();
    (dek, nonce)
});

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let i = (data[0] as usize) % (data.len() + 1);
    let blob = &data[..i];
    let aad = &data[i..];

    let (dek, nonce) = &*KEY;
    let aad = if aad.is_empty() { None } else { Some(aad) };

    // Random bytes must never authenticate.
    assert!(dek_envelope::decrypt(dek, nonce, blob, aad).is_err());
});

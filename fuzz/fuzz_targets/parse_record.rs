#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(record) = dek_envelope::BackupRecord::from_json(s) {
        let _ = record.info();
        let _ = record.nonce();
        let _ = record.wrapped_dek();
    }
});

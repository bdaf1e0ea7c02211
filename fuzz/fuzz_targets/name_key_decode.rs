#![no_main]

use kevadb::name_key::NameKey;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(name) = NameKey::decode(data) {
        assert_eq!(name.encode_to_vec().unwrap(), data);
    }
});

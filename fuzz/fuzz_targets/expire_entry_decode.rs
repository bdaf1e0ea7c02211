#![no_main]

use kevadb::expiry::ExpireEntry;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = ExpireEntry::decode(data);
});

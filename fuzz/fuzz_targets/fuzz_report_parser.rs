#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Reports are read lossily; any text must parse without panicking
    let content = String::from_utf8_lossy(data);
    let features = mzinfer::report::parse_report("fuzz.mzML", &content);

    // Every field must survive conversion to a table row
    let _ = features.to_row();
});

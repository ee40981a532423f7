#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Malformed XML must surface as an error, never a panic
    if let Ok(hits) = mzinfer::ident::read_hits(Cursor::new(data)) {
        let _ = mzinfer::ident::IdentificationStats::summarize(
            "fuzz.mzML",
            &hits,
            mzinfer::ident::DEFAULT_SCORE_THRESHOLD,
        );
    }
});

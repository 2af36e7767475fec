use chrono::{DateTime, TimeZone, Utc};

pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .expect("test timestamp should be valid")
}

pub fn fixture(path: &str) -> String {
    format!("{}/testdata/{path}", env!("CARGO_MANIFEST_DIR").replace('\\', "/"))
}

pub fn fixture_text(path: &str) -> String {
    std::fs::read_to_string(fixture(path)).expect("fixture should be readable")
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

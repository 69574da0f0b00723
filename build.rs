use time::format_description;
use time::OffsetDateTime;

/// Stamp `NGP_BUILD_DATE` / `NGP_BUILD_TIME` into the binary. A value already
/// set in the environment wins.
fn main() {
    let now = OffsetDateTime::now_utc();
    let stamps = [
        ("NGP_BUILD_DATE", "[year]-[month]-[day]"),
        ("NGP_BUILD_TIME", "[hour]:[minute]:[second] UTC"),
    ];

    for (var, pattern) in stamps {
        println!("cargo:rerun-if-env-changed={var}");
        let value = std::env::var(var).unwrap_or_else(|_| stamp(&now, pattern));
        println!("cargo:rustc-env={var}={value}");
    }
}

fn stamp(now: &OffsetDateTime, pattern: &str) -> String {
    let items = match format_description::parse(pattern) {
        Ok(items) => items,
        Err(_) => return "unknown".to_string(),
    };
    now.format(&items).unwrap_or_else(|_| "unknown".to_string())
}

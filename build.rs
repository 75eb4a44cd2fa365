//! Stamps the build date and time into the binary for `facemesh-viewer version`.

use time::format_description;

fn stamp(var: &str, pattern: &str, now: time::OffsetDateTime) {
    println!("cargo:rerun-if-env-changed={var}");
    let value = std::env::var(var).unwrap_or_else(|_| {
        format_description::parse(pattern)
            .ok()
            .and_then(|fmt| now.format(&fmt).ok())
            .unwrap_or_else(|| "unknown".to_string())
    });
    println!("cargo:rustc-env={var}={value}");
}

fn main() {
    let now = time::OffsetDateTime::now_utc();
    stamp("FACEMESH_BUILD_DATE", "[month repr:short] [day padding:space] [year]", now);
    stamp("FACEMESH_BUILD_TIME", "[hour]:[minute]:[second]", now);
}

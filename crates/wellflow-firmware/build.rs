//! Loads device settings from `.env` and exposes them to `env!`.

const SETTINGS: [&str; 4] = [
    "WELLFLOW_WIFI_SSID",
    "WELLFLOW_WIFI_PASSWORD",
    "WELLFLOW_UTC_OFFSET_HOURS",
    "WELLFLOW_COUNTRY_CODE",
];

fn main() {
    println!("cargo:rerun-if-changed=.env");

    // Values already in the environment win over `.env`
    if let Err(err) = dotenvy::dotenv() {
        println!("cargo:warning=no .env loaded ({err}), using the process environment");
    }

    for key in SETTINGS {
        println!("cargo:rerun-if-env-changed={key}");
        let value = std::env::var(key)
            .unwrap_or_else(|_| panic!("{key} must be set in .env or the environment"));
        println!("cargo:rustc-env={key}={value}");
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}

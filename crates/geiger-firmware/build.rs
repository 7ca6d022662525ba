//! Bakes the default alarm thresholds from `.env` (or the build environment)
//! into the firmware image.

const ALARM_VARS: [&str; 3] = ["GEIGER_ALARM_RATE", "GEIGER_ALARM_DOSE", "GEIGER_ALARM_ENABLED"];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    for var in ALARM_VARS {
        println!("cargo:rerun-if-env-changed={var}");
    }

    // A missing .env file simply means no baked-in thresholds
    let _ = dotenvy::dotenv();

    for var in ALARM_VARS {
        if let Ok(value) = std::env::var(var) {
            println!("cargo:rustc-env={var}={value}");
        }
    }
}

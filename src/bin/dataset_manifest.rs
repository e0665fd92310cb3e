use stance_analytics::manifest::{analyze_records, default_manifest_path};
use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: dataset_manifest <records.json>");
        std::process::exit(2);
    };
    let path = PathBuf::from(path);
    let generated_at = chrono::Utc::now().to_rfc3339();

    let manifest = match analyze_records(&path, &generated_at) {
        Ok(m) => m,
        Err(err) => {
            eprintln!("analysis failed: {}", err);
            std::process::exit(3);
        }
    };
    for warning in &manifest.warnings {
        eprintln!("warning: {}", warning);
    }

    let out_path = default_manifest_path(&path);
    let payload = match serde_json::to_string_pretty(&manifest) {
        Ok(p) => p,
        Err(err) => {
            eprintln!("failed to encode manifest: {}", err);
            std::process::exit(4);
        }
    };
    if let Err(err) = fs::write(&out_path, payload) {
        eprintln!("failed to write {}: {}", out_path.display(), err);
        std::process::exit(4);
    }
    println!("wrote manifest {}", out_path.display());
}

//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document served at `/api-docs/openapi.json` to disk,
//! so clients can be generated without starting the server.
//!
//! Usage: `openapi [OUTPUT]` (defaults to `openapi.json`).

use std::path::PathBuf;

use polls_api::web::docs;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi.json"));

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let doc = docs::document();
    std::fs::write(&output, doc.to_pretty_json()?)?;
    println!(
        "Wrote {} v{} ({} paths) to {}",
        doc.info.title,
        doc.info.version,
        doc.paths.paths.len(),
        output.display()
    );
    Ok(())
}

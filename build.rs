use std::fs;

fn main() {
    // Validate default config at compile time
    let config_path = "src/default_config.toml";
    println!("cargo:rerun-if-changed={}", config_path);

    let content = fs::read_to_string(config_path).expect("Failed to read default_config.toml");

    let table = match content.parse::<toml::Table>() {
        Ok(table) => table,
        Err(e) => panic!("Invalid default_config.toml: {}", e),
    };

    for section in ["render", "html", "pdf"] {
        if !table.contains_key(section) {
            panic!("default_config.toml is missing the [{}] section", section);
        }
    }

    if let Some(mode) = table
        .get("render")
        .and_then(|render| render.get("mode"))
        .and_then(|mode| mode.as_str())
    {
        if !["normal", "math", "code"].contains(&mode) {
            panic!("default_config.toml has an unknown render mode: {}", mode);
        }
    }
}

/// Example program to print the loaded configuration
///
/// Run with: cargo run -p vfx-config --example print_config

fn main() {
    // Load configuration from vfx.toml
    let config = vfx_config::VfxConfig::load();

    println!("=== vfx Configuration ===\n");

    println!("Timing Settings:");
    println!("  Fixed Step: {:?}", config.timing.fixed_step());
    println!("  Max Delta: {:?}", config.timing.max_delta());
    println!();

    println!("Host Settings:");
    println!("  Refresh Hz: {}", config.host.refresh_hz);
    println!();

    println!("Easing Settings:");
    println!("  Default: {}", config.easing.default);
    println!();

    println!("Cache Settings:");
    println!("  Enabled: {}", config.cache.enabled);
    println!("  Cache Reverse: {}", config.cache.cache_reverse);
    println!();

    println!("Write Settings:");
    println!("  Mode: {:?}", config.writes.mode);
    println!("  Queue Depth: {}", config.writes.queue_depth);
    println!();

    match toml::to_string_pretty(&config) {
        Ok(toml_str) => {
            println!("=== Serialized Configuration ===");
            println!("{}", toml_str);
        }
        Err(e) => {
            eprintln!("Failed to serialize config: {}", e);
        }
    }
}

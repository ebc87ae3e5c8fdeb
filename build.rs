use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Default)]
struct Config {
    alignment: Option<usize>,
    page_size: Option<usize>,
    large_block_threshold: Option<usize>,
}

struct ResolvedConfig {
    alignment: usize,
    page_size: usize,
    large_block_threshold: usize,
}

fn resolve_config(cfg: &Config) -> ResolvedConfig {
    let alignment = cfg.alignment.unwrap_or(8);
    assert!(
        alignment == 8 || alignment == 16,
        "alignment ({}) must be 8 or 16",
        alignment
    );

    let page_size = cfg.page_size.unwrap_or(4096);
    assert!(
        page_size > 0 && page_size.is_power_of_two(),
        "page_size ({}) must be a power of 2",
        page_size
    );
    assert!(
        page_size >= 4096,
        "page_size ({}) must be >= 4096",
        page_size
    );

    let large_block_threshold = cfg.large_block_threshold.unwrap_or(128);
    assert!(
        large_block_threshold.is_multiple_of(alignment),
        "large_block_threshold ({}) must be a multiple of alignment ({})",
        large_block_threshold,
        alignment
    );

    ResolvedConfig {
        alignment,
        page_size,
        large_block_threshold,
    }
}

fn default_config_path() -> String {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    format!("{}/rtalloc.toml", manifest_dir)
}

fn generate_config(cfg: &ResolvedConfig, out_path: &Path) {
    let code = format!(
        "// Auto-generated by build.rs. Do not edit.\n\n\
         pub const ALIGNMENT: usize = {};\n\
         pub const PAGE_SIZE: usize = {};\n\
         pub const LARGE_BLOCK_THRESHOLD: usize = {};\n",
        cfg.alignment, cfg.page_size, cfg.large_block_threshold,
    );
    fs::write(out_path, code).expect("failed to write config_gen.rs");
}

fn main() {
    println!("cargo:rerun-if-env-changed=RTALLOC_CONFIG");

    let out_dir = env::var("OUT_DIR").unwrap();

    let config_path = env::var("RTALLOC_CONFIG").unwrap_or_else(|_| default_config_path());
    println!("cargo:rerun-if-changed={}", config_path);

    let config: Config = match fs::read_to_string(&config_path) {
        Ok(content) => toml::from_str(&content).expect("failed to parse TOML config"),
        Err(_) => Config::default(),
    };

    let resolved = resolve_config(&config);
    generate_config(&resolved, &Path::new(&out_dir).join("config_gen.rs"));
}

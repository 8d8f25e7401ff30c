// build.rs - TOML-driven compile-time limit generation
use std::env;
use std::fs;
use std::path::Path;

#[derive(serde::Deserialize)]
struct CompileTimeConfig {
    lexical: LexicalLimits,
    path: PathLimits,
    query_options: QueryOptionLimits,
    select_expand: SelectExpandLimits,
    apply: ApplyLimits,
    logging: LoggingLimits,
}

#[derive(serde::Deserialize)]
struct LexicalLimits {
    max_token_count: usize,
    max_identifier_length: usize,
    max_string_size: usize,
}

#[derive(serde::Deserialize)]
struct PathLimits {
    max_segment_count: usize,
    max_key_values: usize,
}

#[derive(serde::Deserialize)]
struct QueryOptionLimits {
    max_query_length: usize,
    max_custom_options: usize,
}

#[derive(serde::Deserialize)]
struct SelectExpandLimits {
    max_expand_depth: usize,
    max_expand_count: usize,
    max_select_items: usize,
}

#[derive(serde::Deserialize)]
struct ApplyLimits {
    max_transformations: usize,
    max_aggregate_statements: usize,
    max_nesting_depth: usize,
}

#[derive(serde::Deserialize)]
struct LoggingLimits {
    log_buffer_size: usize,
    max_log_message_length: usize,
    security_min_log_level: u8,
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=ODATA_BUILD_PROFILE");
    println!("cargo:rerun-if-env-changed=ODATA_CONFIG_DIR");

    let profile = env::var("ODATA_BUILD_PROFILE").unwrap_or_else(|_| "development".to_string());
    let config_dir = env::var("ODATA_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

    // Config lives at the workspace root (parent of odata_uri)
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let workspace_root = Path::new(&manifest_dir)
        .parent()
        .expect("Could not find workspace root (parent directory)");

    let config_path = workspace_root
        .join(&config_dir)
        .join(format!("{}.toml", profile));

    println!("cargo:rerun-if-changed={}", config_path.display());

    if !config_path.exists() {
        panic!(
            "Configuration file not found: {}\nWorkspace root: {}\nLooking for: {}/{}/{}.toml",
            config_path.display(),
            workspace_root.display(),
            workspace_root.display(),
            config_dir,
            profile
        );
    }

    let config_content = fs::read_to_string(&config_path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", config_path.display(), e));

    let config: CompileTimeConfig = toml::from_str(&config_content)
        .unwrap_or_else(|e| panic!("Invalid TOML in {}: {}", config_path.display(), e));

    validate_limits(&config, &profile);
    generate_constants(&config, &profile);
}

fn validate_limits(config: &CompileTimeConfig, profile: &str) {
    const ABSOLUTE_MAX_EXPAND_DEPTH: usize = 256;
    const ABSOLUTE_MAX_SEGMENT_COUNT: usize = 1_000;
    const ABSOLUTE_MAX_QUERY_LENGTH: usize = 1_048_576;

    if config.select_expand.max_expand_depth > ABSOLUTE_MAX_EXPAND_DEPTH {
        panic!("LIMIT: max_expand_depth exceeds absolute maximum");
    }

    if config.path.max_segment_count > ABSOLUTE_MAX_SEGMENT_COUNT {
        panic!("LIMIT: max_segment_count exceeds absolute maximum");
    }

    if config.query_options.max_query_length > ABSOLUTE_MAX_QUERY_LENGTH {
        panic!("LIMIT: max_query_length exceeds absolute maximum");
    }

    if config.apply.max_nesting_depth == 0 || config.select_expand.max_expand_depth == 0 {
        panic!("LIMIT: nesting depths must be at least 1");
    }

    if config.logging.security_min_log_level > 2 {
        panic!("LIMIT: security_min_log_level too high (max: 2)");
    }

    if profile == "production" && config.select_expand.max_expand_depth > 32 {
        panic!("PRODUCTION: max_expand_depth too high for production");
    }
}

fn generate_constants(config: &CompileTimeConfig, profile: &str) {
    let out_dir = env::var("OUT_DIR").unwrap();
    let output_path = Path::new(&out_dir).join("constants.rs");

    let constants_code = format!(
        r#"
// Generated compile-time constants from TOML configuration
// Profile: {}
// DO NOT EDIT - Generated by build.rs

pub mod compile_time {{
    pub mod lexical {{
        pub const MAX_TOKEN_COUNT: usize = {};
        pub const MAX_IDENTIFIER_LENGTH: usize = {};
        pub const MAX_STRING_SIZE: usize = {};
    }}

    pub mod path {{
        pub const MAX_SEGMENT_COUNT: usize = {};
        pub const MAX_KEY_VALUES: usize = {};
    }}

    pub mod query_options {{
        pub const MAX_QUERY_LENGTH: usize = {};
        pub const MAX_CUSTOM_OPTIONS: usize = {};
    }}

    pub mod select_expand {{
        pub const MAX_EXPAND_DEPTH: usize = {};
        pub const MAX_EXPAND_COUNT: usize = {};
        pub const MAX_SELECT_ITEMS: usize = {};
    }}

    pub mod apply {{
        pub const MAX_TRANSFORMATIONS: usize = {};
        pub const MAX_AGGREGATE_STATEMENTS: usize = {};
        pub const MAX_NESTING_DEPTH: usize = {};
    }}

    pub mod logging {{
        pub const LOG_BUFFER_SIZE: usize = {};
        pub const MAX_LOG_MESSAGE_LENGTH: usize = {};
        pub const SECURITY_MIN_LOG_LEVEL: u8 = {};
    }}
}}
"#,
        profile,
        config.lexical.max_token_count,
        config.lexical.max_identifier_length,
        config.lexical.max_string_size,
        config.path.max_segment_count,
        config.path.max_key_values,
        config.query_options.max_query_length,
        config.query_options.max_custom_options,
        config.select_expand.max_expand_depth,
        config.select_expand.max_expand_count,
        config.select_expand.max_select_items,
        config.apply.max_transformations,
        config.apply.max_aggregate_statements,
        config.apply.max_nesting_depth,
        config.logging.log_buffer_size,
        config.logging.max_log_message_length,
        config.logging.security_min_log_level,
    );

    fs::write(output_path, constants_code).unwrap();
}

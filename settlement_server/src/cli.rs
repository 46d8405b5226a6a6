use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 22] = [
        "RUST_LOG",
        "SRE_HOST",
        "SRE_PORT",
        "SRE_DATABASE_URL",
        "SRE_PAYMENT_HMAC_CHECKS",
        "SRE_TOKEN_REGISTRY",
        "SRE_EXPIRY_INTERVAL",
        "SRE_ENABLE_LIQUIDITY_CHECK",
        "SRE_ENABLE_DUPLICATE_GUARD",
        "SRE_MIN_SETTLEMENT_VALUE",
        "SRE_ORDER_EXPIRY",
        "SRE_REQUIRED_CONFIRMATIONS",
        "SRE_HTTP_TIMEOUT",
        "SRE_STATIC_RATE",
        "SRE_EMERGENCY_RATE",
        "SRE_PRIMARY_RATE_URL",
        "SRE_SECONDARY_RATE_URL",
        "SRE_CHAIN_QUOTER_URL",
        "SRE_AGGREGATOR_URL",
        "SRE_PROVIDER_ROSTER_URL",
        "SRE_SETTLEMENT_EXECUTOR_URL",
        "SRE_PAYMENT_GATEWAY_URL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}

//! User-Agent header for all outbound HTTP.

/// `Runpod Flash/<version> (Rust; <OS>)`
pub fn user_agent() -> String {
    format!(
        "Runpod Flash/{} (Rust; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_version_and_os() {
        let ua = user_agent();
        assert!(ua.starts_with("Runpod Flash/"));
        assert!(ua.contains(env!("CARGO_PKG_VERSION")));
        assert!(ua.contains(std::env::consts::OS));
    }

    #[test]
    fn is_a_single_header_line() {
        assert!(!user_agent().contains('\n'));
    }
}

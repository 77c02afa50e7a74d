//! Human-readable console banner, distinct from the structured `tracing`
//! event stream `logging::init` sets up. Grounded in the teacher's
//! `StartupLogger` (`neomind-api::startup`) — same phase tracker and icon
//! conventions, trimmed to the phases `emberd` actually goes through and
//! with the LLM/API-key-specific banners dropped.

use std::sync::OnceLock;

const ANSI_RESET: &str = "\x1b[0m";
const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_DIM: &str = "\x1b[2m";
const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_BLUE: &str = "\x1b[34m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_RED: &str = "\x1b[31m";
const ANSI_CYAN: &str = "\x1b[36m";
const ANSI_GRAY: &str = "\x1b[90m";

fn colors_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        if std::env::var("NO_COLOR").is_ok() {
            return false;
        }
        if std::env::var("EMBER_COLOR").ok().and_then(|v| v.parse().ok()).unwrap_or(false) {
            return true;
        }
        atty::is(atty::Stream::Stderr)
    })
}

fn color(s: impl AsRef<str>, ansi: &str) -> String {
    if colors_enabled() {
        format!("{}{}{}", ansi, s.as_ref(), ANSI_RESET)
    } else {
        s.as_ref().to_string()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StartupPhase {
    Banner,
    Initialization,
    Services,
    Ready,
}

/// Tracks which startup phase we're in so repeated calls to `phase_*`
/// don't print the same section header twice.
pub struct StartupLogger {
    phase: StartupPhase,
    quiet: bool,
}

impl StartupLogger {
    pub fn new() -> Self {
        Self { phase: StartupPhase::Banner, quiet: false }
    }

    pub fn quiet() -> Self {
        Self { phase: StartupPhase::Banner, quiet: true }
    }

    pub fn banner(&mut self) {
        if self.quiet {
            return;
        }
        self.phase = StartupPhase::Banner;
        println!();
        println!("{}", color("┌─────────────────────────────┐", ANSI_CYAN));
        println!("{}{}{}", color("│ ", ANSI_CYAN), color("ember", ANSI_BOLD), color("                       │", ANSI_CYAN));
        println!("{}{}{}", color("│ ", ANSI_CYAN), color("IoT automation server", ANSI_DIM), color("       │", ANSI_CYAN));
        println!("{}", color("└─────────────────────────────┘", ANSI_CYAN));
        println!();
    }

    pub fn phase_init(&mut self) {
        self.section("Initialization", StartupPhase::Initialization);
    }

    pub fn phase_services(&mut self) {
        self.section("Services", StartupPhase::Services);
    }

    fn section(&mut self, label: &str, phase: StartupPhase) {
        if self.quiet || self.phase == phase {
            return;
        }
        println!("{} {} {}", color("›", ANSI_BOLD), color(label, ANSI_BLUE), color("━━━━━━━━━━━━━━━━━━━━━━━━━━━", ANSI_DIM));
        self.phase = phase;
    }

    pub fn phase_ready(&mut self) {
        if self.quiet || self.phase == StartupPhase::Ready {
            return;
        }
        println!();
        println!("{} {}", color("✓", ANSI_GREEN), color("server ready", ANSI_BOLD));
        self.phase = StartupPhase::Ready;
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("  {} {}", color("●", ANSI_BLUE), message);
        }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("  {} {}", color("✓", ANSI_GREEN), message);
        }
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("  {} {}", color("⚠", ANSI_YELLOW), message);
        }
    }

    pub fn error(&self, message: &str) {
        if !self.quiet {
            println!("  {} {}", color("✗", ANSI_RED), message);
        }
    }

    /// Print the two listening addresses once both transports are up.
    pub fn ready_info(&self, tcp_addr: &str, ws_addr: &str) {
        if self.quiet {
            return;
        }
        println!();
        println!("  {} {}", color("tcp:", ANSI_BOLD), color(tcp_addr, ANSI_CYAN));
        println!("  {} {}", color("ws: ", ANSI_BOLD), color(format!("http://{ws_addr}/rpc/ws"), ANSI_CYAN));
        println!("  {} {}", color("gray:", ANSI_DIM), color(format!("http://{ws_addr}/metrics, /introspect"), ANSI_GRAY));
        println!();
        println!("{} {}", color("press", ANSI_BOLD), color("ctrl-c to stop.", ANSI_DIM));
        println!();
    }
}

impl Default for StartupLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_enabled_does_not_panic() {
        let _ = colors_enabled();
    }

    #[test]
    fn quiet_logger_prints_nothing_observable() {
        let logger = StartupLogger::quiet();
        logger.info("should not print");
    }
}

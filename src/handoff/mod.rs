//! Usage: Redirect completion pipeline (parse, discover, exchange, onboard, route).

pub mod deep_link;
pub mod exchange;
pub mod loopback;
pub mod onboarding;
pub mod orchestrator;
pub mod parser;
pub mod pending;
pub mod scrub;
pub mod source;

use clap::Parser;
use std::net::SocketAddr;

use crate::registration::service::{DEFAULT_MAX_CLAIM_RETRIES, ServiceSettings};
use crate::tree::propagation::CountRule;

/// Server configuration. Every flag can also be set through the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "referral-tree", about = "Binary referral tree service")]
pub struct Config {
    /// Address the HTTP API listens on.
    #[arg(long, env = "REFERRAL_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Tracing filter, e.g. `info` or `referral_tree=debug`.
    #[arg(long, env = "REFERRAL_LOG", default_value = "info")]
    pub log_level: String,

    /// How often a lost slot race is re-resolved before giving up.
    #[arg(long, env = "REFERRAL_MAX_CLAIM_RETRIES", default_value_t = DEFAULT_MAX_CLAIM_RETRIES)]
    pub max_claim_retries: usize,

    /// Ancestor counting: `subtree` keeps exact subtree sizes,
    /// `insertion-side` applies the insertion side to every ancestor.
    #[arg(long, env = "REFERRAL_COUNT_RULE", default_value_t = CountRule::Subtree)]
    pub count_rule: CountRule,
}

impl Config {
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            max_claim_retries: self.max_claim_retries,
            count_rule: self.count_rule,
        }
    }
}

//! Model-tier routing.
//!
//! Exchanges default to the remote tier; sensitivity always forces local,
//! regardless of any per-task override. The route table itself is
//! configuration data, not code.

use std::collections::HashMap;

use crate::config::ProviderConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Local,
    Remote,
}

#[derive(Debug, Clone)]
pub struct ModelRouter {
    local_model: String,
    remote_model: String,
    routes: HashMap<String, Tier>,
}

impl ModelRouter {
    pub fn from_config(cfg: &ProviderConfig) -> Self {
        let routes = cfg
            .routes
            .iter()
            .map(|(label, tier)| {
                let tier = if tier.eq_ignore_ascii_case("local") {
                    Tier::Local
                } else {
                    Tier::Remote
                };
                (label.clone(), tier)
            })
            .collect();
        Self {
            local_model: cfg.local_model.clone(),
            remote_model: cfg.remote_model.clone(),
            routes,
        }
    }

    /// Pick the tier for a task label. A sensitive exchange is pinned local
    /// no matter what the table says.
    pub fn select(&self, task_label: &str, sensitive: bool) -> Tier {
        if sensitive {
            return Tier::Local;
        }
        self.routes
            .get(task_label)
            .copied()
            .unwrap_or(Tier::Remote)
    }

    pub fn model_for(&self, tier: Tier) -> &str {
        match tier {
            Tier::Local => &self.local_model,
            Tier::Remote => &self.remote_model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> ModelRouter {
        let mut cfg = ProviderConfig::default();
        cfg.local_model = "local-m".into();
        cfg.remote_model = "remote-m".into();
        cfg.routes.insert("classify".into(), "local".into());
        ModelRouter::from_config(&cfg)
    }

    #[test]
    fn defaults_to_remote() {
        assert_eq!(router().select("chat", false), Tier::Remote);
    }

    #[test]
    fn table_override_applies() {
        assert_eq!(router().select("classify", false), Tier::Local);
    }

    #[test]
    fn sensitive_always_forces_local() {
        let r = router();
        assert_eq!(r.select("chat", true), Tier::Local);
        assert_eq!(r.select("classify", true), Tier::Local);
    }

    #[test]
    fn model_names_follow_tier() {
        let r = router();
        assert_eq!(r.model_for(Tier::Local), "local-m");
        assert_eq!(r.model_for(Tier::Remote), "remote-m");
    }
}

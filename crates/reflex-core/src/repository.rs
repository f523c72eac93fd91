use crate::error::Result;
use crate::models::ReflexRule;

/// Persistence seam for whole reflex rules.
///
/// `save` replaces everything the rule owns (triggers, decisions, groups,
/// rules, actions, layout) atomically; `delete` removes the subtree with it.
pub trait RuleRepository: Send + Sync {
    fn load(&self, uid: &str) -> Result<Option<ReflexRule>>;
    fn save(&self, rule: &ReflexRule) -> Result<()>;
    fn delete(&self, uid: &str) -> Result<bool>;
    fn list(&self) -> Result<Vec<ReflexRule>>;
}

//! Plans
//!
//! A plan is the ordered list of effects that converges recorded state to the
//! synthesized stack. Creates and updates come in dependency order, deletes in
//! reverse. Building one touches nothing.

use std::collections::BTreeMap;

use crate::effect::Effect;

/// Group name for effects whose construct path is unknown
pub const UNGROUPED: &str = "(stack)";

#[derive(Debug, Clone, Default)]
pub struct Plan {
    effects: Vec<Effect>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Everything but reads
    pub fn mutation_count(&self) -> usize {
        self.effects.iter().filter(|e| e.is_mutating()).count()
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for effect in &self.effects {
            match effect {
                Effect::Read(_) => summary.read += 1,
                Effect::Create(_) => summary.create += 1,
                Effect::Update { .. } => summary.update += 1,
                Effect::Delete { retain: true, .. } => summary.retain += 1,
                Effect::Delete { .. } => summary.delete += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub read: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub retain: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Plan: {} to create, {} to update, {} to delete",
            self.create, self.update, self.delete
        )?;
        if self.retain > 0 {
            write!(f, ", {} to retain", self.retain)?;
        }
        Ok(())
    }
}

/// A Plan with its effects grouped by top-level construct
///
/// Effect order inside a group follows the plan order.
#[derive(Debug, Clone, Default)]
pub struct GroupedPlan {
    pub plan: Plan,
    /// Top-level construct -> indices into the plan's effects
    pub groups: BTreeMap<String, Vec<usize>>,
}

impl GroupedPlan {
    pub fn from_plan(plan: Plan) -> Self {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, effect) in plan.effects().iter().enumerate() {
            let group = effect
                .path()
                .filter(|p| p.components().len() > 1)
                .and_then(|p| p.top_level().map(str::to_string))
                .unwrap_or_else(|| UNGROUPED.to_string());
            groups.entry(group).or_default().push(idx);
        }
        Self { plan, groups }
    }

    pub fn effects_in(&self, group: &str) -> Vec<&Effect> {
        self.groups
            .get(group)
            .map(|indices| indices.iter().map(|i| &self.plan.effects()[*i]).collect())
            .unwrap_or_default()
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::ConstructPath;
    use crate::resource::{Resource, ResourceId};

    fn create(name: &str, path: &str) -> Effect {
        Effect::Create(Resource::new("test", name).with_path(&ConstructPath::parse(path)))
    }

    #[test]
    fn summary_counts_retains_separately() {
        let mut plan = Plan::new();
        plan.add(create("A", "Networking/Vpc"));
        plan.add(Effect::Delete {
            id: ResourceId::new("s3.bucket", "Logs"),
            identifier: "logs".to_string(),
            retain: true,
            path: None,
        });
        plan.add(Effect::Read(ResourceId::new("ec2.vpc", "Vpc")));

        let summary = plan.summary();
        assert_eq!(summary.create, 1);
        assert_eq!(summary.retain, 1);
        assert_eq!(summary.delete, 0);
        assert_eq!(plan.mutation_count(), 2);
        assert_eq!(
            summary.to_string(),
            "Plan: 1 to create, 0 to update, 0 to delete, 1 to retain"
        );
    }

    #[test]
    fn groups_by_top_level_construct() {
        let mut plan = Plan::new();
        plan.add(create("Vpc", "Networking/Vpc"));
        plan.add(create("AlbSg", "ALBSg"));
        plan.add(create("Subnet", "Networking/Vpc/PublicSubnet1"));
        plan.add(create("Role", "MCPOne/ECSService/TaskRole"));

        let grouped = GroupedPlan::from_plan(plan);
        let names: Vec<_> = grouped.group_names().collect();
        assert_eq!(names, vec![UNGROUPED, "MCPOne", "Networking"]);
        let networking: Vec<_> = grouped
            .effects_in("Networking")
            .iter()
            .map(|e| e.resource_id().name.clone())
            .collect();
        assert_eq!(networking, vec!["Vpc", "Subnet"]);
    }
}

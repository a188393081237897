use crate::domain::model::{Limit, Plan, Tool};
use crate::utils::error::{QuotaError, Result};
use std::collections::HashMap;

const TOOL_COUNT: usize = Tool::ALL.len();
const PLAN_COUNT: usize = Plan::ALL.len();

/// Static (plan, tool) -> limit table.
///
/// Every pair is filled at construction time, so `limit_for` cannot fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanPolicy {
    table: [[Limit; TOOL_COUNT]; PLAN_COUNT],
}

impl PlanPolicy {
    /// The product's published limits.
    pub fn standard() -> Self {
        let mut table = [[Limit::Unlimited; TOOL_COUNT]; PLAN_COUNT];
        for tool in Tool::ALL {
            table[Plan::Free.index()][tool.index()] = standard_limit(Plan::Free, tool);
            table[Plan::Premium.index()][tool.index()] = standard_limit(Plan::Premium, tool);
        }
        Self { table }
    }

    /// Builds a policy from a complete list of entries. Fails with
    /// `UnknownPlanOrTool` naming the first uncovered pair.
    pub fn from_entries(entries: impl IntoIterator<Item = (Plan, Tool, Limit)>) -> Result<Self> {
        let mut slots: [[Option<Limit>; TOOL_COUNT]; PLAN_COUNT] = [[None; TOOL_COUNT]; PLAN_COUNT];
        for (plan, tool, limit) in entries {
            slots[plan.index()][tool.index()] = Some(limit);
        }

        let mut table = [[Limit::Unlimited; TOOL_COUNT]; PLAN_COUNT];
        for plan in Plan::ALL {
            for tool in Tool::ALL {
                table[plan.index()][tool.index()] =
                    slots[plan.index()][tool.index()].ok_or_else(|| QuotaError::UnknownPlanOrTool {
                        plan: plan.to_string(),
                        tool: tool.to_string(),
                    })?;
            }
        }
        Ok(Self { table })
    }

    /// Applies `[limits.<plan>] <tool> = <limit>` overrides on top of the
    /// standard table. Names are matched the way the CLI parses them.
    pub fn with_overrides(overrides: &HashMap<String, HashMap<String, Limit>>) -> Result<Self> {
        let mut policy = Self::standard();
        for (plan_name, tools) in overrides {
            for (tool_name, limit) in tools {
                let unknown = || QuotaError::UnknownPlanOrTool {
                    plan: plan_name.clone(),
                    tool: tool_name.clone(),
                };
                let plan: Plan = plan_name.parse().map_err(|_| unknown())?;
                let tool: Tool = tool_name.parse().map_err(|_| unknown())?;
                policy.table[plan.index()][tool.index()] = *limit;
            }
        }
        Ok(policy)
    }

    pub fn limit_for(&self, plan: Plan, tool: Tool) -> Limit {
        self.table[plan.index()][tool.index()]
    }

    pub fn entries(&self) -> impl Iterator<Item = (Plan, Tool, Limit)> + '_ {
        Plan::ALL.into_iter().flat_map(move |plan| {
            Tool::ALL
                .into_iter()
                .map(move |tool| (plan, tool, self.limit_for(plan, tool)))
        })
    }
}

impl Default for PlanPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_limit(plan: Plan, tool: Tool) -> Limit {
    match (plan, tool) {
        (Plan::Premium, _) => Limit::Unlimited,
        (Plan::Free, Tool::Menus) => Limit::Finite(3),
        (Plan::Free, Tool::Recipes) => Limit::Finite(10),
        (Plan::Free, Tool::Nutrition) => Limit::Finite(10),
        (Plan::Free, Tool::Exports) => Limit::Finite(5),
        (Plan::Free, Tool::Inventory) => Limit::Finite(100),
        (Plan::Free, Tool::CostEntries) => Limit::Finite(50),
    }
}

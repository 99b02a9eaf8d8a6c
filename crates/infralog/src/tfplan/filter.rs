use super::plan::{Action, Plan};
use crate::config::FilterConfig;

/// Keep only the changes worth notifying about.
///
/// Resources must match the type filter and outputs the name filter. Changes
/// with no actions, or whose actions include `no-op` or `read`, are dropped.
#[must_use]
pub fn apply_filter(plan: &Plan, filter: &FilterConfig) -> Plan {
    Plan {
        format_version: plan.format_version.clone(),
        terraform_version: plan.terraform_version.clone(),
        configuration: plan.configuration.clone(),
        planning_options: plan.planning_options.clone(),
        resource_changes: plan
            .resource_changes
            .iter()
            .filter(|rc| filter.matches_resource_type(&rc.resource_type))
            .filter(|rc| should_include_actions(&rc.change.actions))
            .cloned()
            .collect(),
        output_changes: plan
            .output_changes
            .iter()
            .filter(|(name, _)| filter.matches_output(name))
            .filter(|(_, oc)| should_include_actions(&oc.change.actions))
            .map(|(name, oc)| (name.clone(), oc.clone()))
            .collect(),
    }
}

fn should_include_actions(actions: &[Action]) -> bool {
    !actions.is_empty()
        && !actions
            .iter()
            .any(|a| matches!(a, Action::NoOp | Action::Read))
}

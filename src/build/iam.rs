// ABOUTME: IAM policy helpers for making a service publicly invokable.
// ABOUTME: Used by the ensure-public-invoke pipeline step after service creation.

use crate::model::Environment;
use crate::provider::{IamBinding, IamPolicy, ServiceLocation};
use crate::types::SlugError;

pub const INVOKER_ROLE: &str = "roles/run.invoker";
pub const ALL_USERS: &str = "allUsers";

/// Where the environment's service lives, for IAM calls.
pub fn service_location(environment: &Environment) -> Result<ServiceLocation, SlugError> {
    Ok(ServiceLocation {
        cloud_project_id: environment.cloud_project_id().to_string(),
        region: environment.region().to_string(),
        service: environment.slug()?.to_string(),
    })
}

/// Add the public-invoker binding to a policy if it is not already present.
/// Returns whether the policy changed, so callers can skip the write-back.
pub fn ensure_public_invoker(policy: &mut IamPolicy) -> bool {
    if let Some(binding) = policy.bindings.iter_mut().find(|b| b.role == INVOKER_ROLE) {
        if binding.members.iter().any(|m| m == ALL_USERS) {
            return false;
        }
        binding.members.push(ALL_USERS.to_string());
        return true;
    }

    policy.bindings.push(IamBinding {
        role: INVOKER_ROLE.to_string(),
        members: vec![ALL_USERS.to_string()],
    });
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_binding_to_empty_policy() {
        let mut policy = IamPolicy::default();
        assert!(ensure_public_invoker(&mut policy));
        assert_eq!(policy.bindings.len(), 1);
        assert_eq!(policy.bindings[0].role, INVOKER_ROLE);
        assert_eq!(policy.bindings[0].members, vec![ALL_USERS.to_string()]);
    }

    #[test]
    fn is_idempotent() {
        let mut policy = IamPolicy::default();
        assert!(ensure_public_invoker(&mut policy));
        assert!(!ensure_public_invoker(&mut policy));
        assert_eq!(policy.bindings.len(), 1);
        assert_eq!(policy.bindings[0].members.len(), 1);
    }

    #[test]
    fn extends_existing_invoker_binding() {
        let mut policy = IamPolicy {
            bindings: vec![IamBinding {
                role: INVOKER_ROLE.to_string(),
                members: vec!["serviceAccount:ops@acme.test".to_string()],
            }],
        };
        assert!(ensure_public_invoker(&mut policy));
        assert_eq!(policy.bindings[0].members.len(), 2);
    }
}

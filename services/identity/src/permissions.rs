//! Permission aggregation
//!
//! - No IO
//! - No panics
//! - Order of grants does not matter

use std::collections::HashMap;

use crate::models::{AggregatedPermission, ResourcePermission};

/// Merge role grants into one permission per resource.
///
/// Flags are OR-ed and the scope is the widest one seen. Resources no role
/// grants are absent from the result.
pub fn aggregate<'a, I>(grants: I) -> HashMap<String, AggregatedPermission>
where
    I: IntoIterator<Item = &'a ResourcePermission>,
{
    let mut merged: HashMap<String, AggregatedPermission> = HashMap::new();

    for grant in grants {
        merged
            .entry(grant.resource.clone())
            .and_modify(|acc| {
                acc.can_create |= grant.can_create;
                acc.can_edit |= grant.can_edit;
                acc.can_delete |= grant.can_delete;
                acc.scope = acc.scope.max(grant.scope);
            })
            .or_insert_with(|| AggregatedPermission {
                resource: grant.resource.clone(),
                can_create: grant.can_create,
                can_edit: grant.can_edit,
                can_delete: grant.can_delete,
                scope: grant.scope,
            });
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scope;
    use uuid::Uuid;

    fn grant(
        role_id: Uuid,
        resource: &str,
        (can_create, can_edit, can_delete): (bool, bool, bool),
        scope: Scope,
    ) -> ResourcePermission {
        ResourcePermission {
            role_id,
            resource: resource.to_string(),
            can_create,
            can_edit,
            can_delete,
            scope,
        }
    }

    #[test]
    fn test_two_roles_on_same_resource() {
        let a = grant(Uuid::new_v4(), "EMPLOYEES", (true, false, false), Scope::Section);
        let b = grant(Uuid::new_v4(), "EMPLOYEES", (false, true, false), Scope::Own);

        let merged = aggregate([&a, &b]);

        assert_eq!(
            merged.get("EMPLOYEES"),
            Some(&AggregatedPermission {
                resource: "EMPLOYEES".to_string(),
                can_create: true,
                can_edit: true,
                can_delete: false,
                scope: Scope::Section,
            })
        );
    }

    #[test]
    fn test_order_independent() {
        let grants = vec![
            grant(Uuid::new_v4(), "MACHINERY", (false, false, true), Scope::Own),
            grant(Uuid::new_v4(), "MACHINERY", (false, false, false), Scope::Global),
            grant(Uuid::new_v4(), "MENUS", (true, true, true), Scope::Section),
        ];
        let mut reversed = grants.clone();
        reversed.reverse();

        assert_eq!(aggregate(&grants), aggregate(&reversed));

        let merged = aggregate(&grants);
        let machinery = &merged["MACHINERY"];
        assert!(machinery.can_delete);
        assert!(!machinery.can_create);
        assert_eq!(machinery.scope, Scope::Global);
    }

    #[test]
    fn test_or_max_law_over_many_roles() {
        let scopes = [Scope::Own, Scope::Section, Scope::Own, Scope::Global, Scope::Section];
        let flags = [
            (false, false, false),
            (false, true, false),
            (false, false, false),
            (false, false, false),
            (true, false, false),
        ];

        let grants: Vec<_> = scopes
            .iter()
            .zip(flags)
            .map(|(scope, flags)| grant(Uuid::new_v4(), "EMPLOYEES", flags, *scope))
            .collect();

        let all = aggregate(&grants);
        let merged = &all["EMPLOYEES"];
        assert_eq!(merged.can_create, flags.iter().any(|f| f.0));
        assert_eq!(merged.can_edit, flags.iter().any(|f| f.1));
        assert_eq!(merged.can_delete, flags.iter().any(|f| f.2));
        assert_eq!(merged.scope, *scopes.iter().max().unwrap());
    }

    #[test]
    fn test_no_grants_means_nothing() {
        let merged = aggregate(&Vec::<ResourcePermission>::new());
        assert!(merged.is_empty());
    }
}

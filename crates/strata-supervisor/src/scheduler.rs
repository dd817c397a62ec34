use strata_domain::{Cluster, ClusterId, Group, GroupId, Installation};

use crate::error::SupervisorError;

/// Chooses a compatible Cluster for a new Installation (§4.4). Candidate
/// set = non-deleted Clusters accepting installations; affinity and
/// annotation rules narrow it from there. `is_eligible` applies any
/// additional per-cluster constraint the caller can check but this pure
/// function can't — isolation affinity's live-CI-count requirement, most
/// notably — over the *whole* candidate set before one is picked, rather
/// than only checking whichever candidate happened to sort first.
pub fn select_cluster(
    clusters: &[Cluster],
    installation: &Installation,
    is_eligible: impl Fn(&ClusterId) -> bool,
) -> Result<ClusterId, SupervisorError> {
    clusters
        .iter()
        .filter(|c| !c.is_deleted())
        .filter(|c| c.allow_installations)
        .filter(|c| c.state.accepts_installations())
        .filter(|c| c.annotations_match(&installation.annotations))
        .filter(|c| is_eligible(&c.id))
        .map(|c| c.id.clone())
        .next()
        .ok_or_else(|| SupervisorError::Scheduling("no compatible clusters".into()))
}

/// An isolated Installation requires a Cluster with zero active
/// ClusterInstallations of any Installation. The caller supplies the
/// current active-CI count per cluster because that requires a Store scan
/// this pure function has no access to.
pub fn is_isolated_eligible(cluster_id: &ClusterId, active_ci_counts: &std::collections::HashMap<ClusterId, u32>) -> bool {
    active_ci_counts.get(cluster_id).copied().unwrap_or(0) == 0
}

/// Picks the unique Group whose annotations are a superset of the supplied
/// selection annotations. Zero or multiple matches is a caller-visible
/// `BadRequest`.
pub fn select_group(groups: &[Group], selection_annotations: &[String]) -> Result<GroupId, SupervisorError> {
    let matches: Vec<&Group> = groups
        .iter()
        .filter(|g| !g.is_deleted())
        .filter(|g| selection_annotations.iter().all(|a| g.annotations.contains(a)))
        .collect();
    match matches.as_slice() {
        [one] => Ok(one.id.clone()),
        [] => Err(SupervisorError::Scheduling("no group matches selection annotations".into())),
        _ => Err(SupervisorError::Scheduling("multiple groups match selection annotations".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;
    use strata_domain::{Affinity, CloudProvider, ClusterState, InstallationState, Lease};

    fn cluster(allow: bool, state: ClusterState, annotations: Vec<String>) -> Cluster {
        Cluster {
            id: ClusterId::new(),
            provider: CloudProvider::Aws,
            provisioner: "kops".into(),
            provider_metadata: serde_json::json!({}),
            provisioner_metadata: serde_json::json!({}),
            state,
            allow_installations: allow,
            utility_metadata: serde_json::json!({}),
            annotations,
            api_security_lock: false,
            create_at: 0,
            delete_at: 0,
            lock: Lease::default(),
        }
    }

    fn installation(affinity: Affinity, annotations: Vec<String>) -> Installation {
        Installation {
            id: strata_domain::InstallationId::new(),
            owner_id: "o".into(),
            group_id: None,
            group_sequence: None,
            version: "stable".into(),
            image: "mattermost/mattermost".into(),
            dns: "t.example.com".into(),
            dns_records: vec![],
            size: "100users".into(),
            affinity,
            state: InstallationState::CreationRequested,
            database: "aurora-postgres".into(),
            filestore: "bifrost".into(),
            mattermost_env: Map::new(),
            priority_env: Map::new(),
            annotations,
            cr_version: "v1".into(),
            api_security_lock: false,
            deletion_lock: false,
            create_at: 0,
            delete_at: 0,
            lock: Lease::default(),
        }
    }

    #[test]
    fn picks_cluster_with_matching_annotations() {
        let c = cluster(true, ClusterState::Stable, vec!["zone=a".into()]);
        let clusters = vec![c.clone()];
        let inst = installation(Affinity::MultiTenant, vec!["zone=a".into()]);
        let picked = select_cluster(&clusters, &inst, |_| true).unwrap();
        assert_eq!(picked, c.id);
    }

    #[test]
    fn rejects_when_no_cluster_has_required_annotation() {
        let clusters = vec![cluster(true, ClusterState::Stable, vec![])];
        let inst = installation(Affinity::MultiTenant, vec!["zone=a".into()]);
        assert!(select_cluster(&clusters, &inst, |_| true).is_err());
    }

    #[test]
    fn isolated_affinity_skips_occupied_clusters_to_find_an_empty_one() {
        let occupied = cluster(true, ClusterState::Stable, vec![]);
        let empty = cluster(true, ClusterState::Stable, vec![]);
        let clusters = vec![occupied.clone(), empty.clone()];
        let inst = installation(Affinity::Isolated, vec![]);
        let mut counts = Map::new();
        counts.insert(occupied.id.clone(), 3u32);
        let picked = select_cluster(&clusters, &inst, |id| is_isolated_eligible(id, &counts)).unwrap();
        assert_eq!(picked, empty.id);
    }

    #[test]
    fn isolated_affinity_fails_when_every_candidate_is_occupied() {
        let a = cluster(true, ClusterState::Stable, vec![]);
        let b = cluster(true, ClusterState::Stable, vec![]);
        let clusters = vec![a.clone(), b.clone()];
        let inst = installation(Affinity::Isolated, vec![]);
        let mut counts = Map::new();
        counts.insert(a.id.clone(), 1u32);
        counts.insert(b.id.clone(), 2u32);
        assert!(select_cluster(&clusters, &inst, |id| is_isolated_eligible(id, &counts)).is_err());
    }

    #[test]
    fn group_selection_requires_unique_match() {
        let mut g1 = group();
        g1.annotations = vec!["team=a".into()];
        let mut g2 = group();
        g2.annotations = vec!["team=a".into()];
        let err = select_group(&[g1, g2], &["team=a".to_string()]).unwrap_err();
        assert!(matches!(err, SupervisorError::Scheduling(_)));
    }

    fn group() -> Group {
        Group {
            id: strata_domain::GroupId::new(),
            name: "g".into(),
            description: "".into(),
            version: "1".into(),
            image: "mattermost/mattermost".into(),
            mattermost_env: Map::new(),
            max_rolling: 2,
            scheduling: strata_domain::Scheduling { priority_env: Map::new() },
            annotations: vec![],
            sequence: 1,
            api_security_lock: false,
            delete_at: 0,
            lock: Lease::default(),
        }
    }
}

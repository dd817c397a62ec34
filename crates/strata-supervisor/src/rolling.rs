use strata_domain::{Group, GroupStatus, Installation, InstallationId, InstallationState};

/// Selects up to `group.maxRolling - rolling` stale Installations (oldest
/// first) to kick into `update-requested`, per §4.5's exact algorithm. The
/// caller is responsible for actually writing the new state — this
/// function only decides which Installations are eligible this pass.
pub fn select_rollout_batch(group: &Group, installations: &[Installation]) -> Vec<InstallationId> {
    let rolling = installations
        .iter()
        .filter(|i| i.group_id.as_ref() == Some(&group.id))
        .filter(|i| i.state.is_pending())
        .count() as u32;

    if rolling >= group.max_rolling {
        return Vec::new();
    }

    let mut stale: Vec<&Installation> = installations
        .iter()
        .filter(|i| i.group_id.as_ref() == Some(&group.id))
        .filter(|i| i.state == InstallationState::Stable)
        .filter(|i| i.is_stale_against(group.sequence))
        .collect();

    stale.sort_by(|a, b| (a.create_at, a.id.as_str()).cmp(&(b.create_at, b.id.as_str())));

    let slots = (group.max_rolling - rolling) as usize;
    stale.into_iter().take(slots).map(|i| i.id.clone()).collect()
}

pub fn group_status(group: &Group, installations: &[Installation]) -> GroupStatus {
    let members: Vec<&Installation> = installations
        .iter()
        .filter(|i| i.group_id.as_ref() == Some(&group.id))
        .collect();
    let rolling = members.iter().filter(|i| i.state.is_pending()).count() as u64;
    let stale = members.iter().filter(|i| i.is_stale_against(group.sequence)).count() as u64;
    GroupStatus {
        total: members.len() as u64,
        rolling,
        stale,
        up_to_date: members.len() as u64 - stale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;
    use strata_domain::{Affinity, GroupId, InstallationId as IId, Lease, Scheduling};

    fn group(max_rolling: u32, sequence: u64) -> Group {
        Group {
            id: GroupId::new(),
            name: "g".into(),
            description: "".into(),
            version: "2".into(),
            image: "mattermost/mattermost".into(),
            mattermost_env: Map::new(),
            max_rolling,
            scheduling: Scheduling { priority_env: Map::new() },
            annotations: vec![],
            sequence,
            api_security_lock: false,
            delete_at: 0,
            lock: Lease::default(),
        }
    }

    fn stale_installation(group_id: &GroupId, create_at: i64) -> Installation {
        Installation {
            id: IId::new(),
            owner_id: "o".into(),
            group_id: Some(group_id.clone()),
            group_sequence: Some(1),
            version: "stable".into(),
            image: "mattermost/mattermost".into(),
            dns: format!("{}.example.com", create_at),
            dns_records: vec![],
            size: "100users".into(),
            affinity: Affinity::MultiTenant,
            state: InstallationState::Stable,
            database: "aurora-postgres".into(),
            filestore: "bifrost".into(),
            mattermost_env: Map::new(),
            priority_env: Map::new(),
            annotations: vec![],
            cr_version: "v1".into(),
            api_security_lock: false,
            deletion_lock: false,
            create_at,
            delete_at: 0,
            lock: Lease::default(),
        }
    }

    #[test]
    fn caps_rollout_at_max_rolling() {
        let g = group(2, 2);
        let installations: Vec<Installation> = (0..5).map(|i| stale_installation(&g.id, i)).collect();
        let batch = select_rollout_batch(&g, &installations);
        assert_eq!(batch.len(), 2);
        // Oldest-first by createAt.
        assert_eq!(batch[0], installations[0].id);
        assert_eq!(batch[1], installations[1].id);
    }

    #[test]
    fn skips_installations_already_up_to_date() {
        let g = group(5, 1);
        let installations: Vec<Installation> = (0..3).map(|i| stale_installation(&g.id, i)).collect();
        // group.sequence == 1 matches installation.group_sequence, so nothing is stale.
        assert!(select_rollout_batch(&g, &installations).is_empty());
    }
}
